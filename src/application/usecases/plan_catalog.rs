use std::sync::Arc;

use axum::http::StatusCode;
use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::authorization::{AccessError, require_admin},
    config::config_model::Application,
    domain::{
        entities::plans::{InsertPlanEntity, PlanEntity, UpdatePlanEntity},
        repositories::{plans::PlanRepository, users::UserRepository},
        value_objects::{
            plans::{
                PLANS_PER_PAGE, PlanDto, PlanFormDto, PlanInput, PlanPageDto, PlanSavedDto,
                ValidatedPlan, ValidationErrors, strip_tags,
            },
            subscriptions::FlashMessage,
        },
    },
};

#[derive(Debug, Error)]
pub enum PlanCatalogError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Plan management requires the extended edition.")]
    ExtendedRequired,
    #[error("plan not found")]
    PlanNotFound,
    #[error("The given data was invalid.")]
    Validation(ValidationErrors),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PlanCatalogError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PlanCatalogError::Access(err) => err.status_code(),
            PlanCatalogError::ExtendedRequired => StatusCode::PAYMENT_REQUIRED,
            PlanCatalogError::PlanNotFound => StatusCode::NOT_FOUND,
            PlanCatalogError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PlanCatalogError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type CatalogResult<T> = std::result::Result<T, PlanCatalogError>;

/// Admin-only management of the plan catalog.
pub struct PlanCatalogUseCase<P, U>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    user_repo: Arc<U>,
    settings: Arc<Application>,
}

impl<P, U> PlanCatalogUseCase<P, U>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
{
    pub fn new(plan_repo: Arc<P>, user_repo: Arc<U>, settings: Arc<Application>) -> Self {
        Self {
            plan_repo,
            user_repo,
            settings,
        }
    }

    pub async fn index(&self, user_id: Uuid, page: i64) -> CatalogResult<PlanPageDto> {
        self.authorize_admin(user_id).await?;

        if !self.settings.plans_extended {
            let err = PlanCatalogError::ExtendedRequired;
            warn!(
                %user_id,
                status = err.status_code().as_u16(),
                "plan_catalog: extended edition required for plan listing"
            );
            return Err(err);
        }

        let page = page.max(1);
        let (plans, total) = self
            .plan_repo
            .paginate_plans(page, PLANS_PER_PAGE)
            .await
            .map_err(|err| {
                error!(%user_id, page, db_error = ?err, "plan_catalog: failed to paginate plans");
                PlanCatalogError::Internal(err)
            })?;

        info!(%user_id, page, total, "plan_catalog: plans listed");
        Ok(PlanPageDto::new(
            plans.into_iter().map(PlanDto::from).collect(),
            page,
            PLANS_PER_PAGE,
            total,
        ))
    }

    pub async fn create_form(&self, user_id: Uuid) -> CatalogResult<PlanFormDto> {
        self.authorize_admin(user_id).await?;

        Ok(PlanFormDto {
            plugins: self.settings.available_plugins.clone(),
            subscription_processor: self.settings.subscription_processor.to_string(),
            plan: None,
        })
    }

    pub async fn store(&self, user_id: Uuid, input: PlanInput) -> CatalogResult<PlanSavedDto> {
        self.authorize_admin(user_id).await?;

        let validated = Self::validate(user_id, &input)?;
        let mut insert_plan_entity = InsertPlanEntity::from(validated);
        if let Some(stripe_id) = Self::top_level_stripe_id(&input) {
            insert_plan_entity.stripe_id = Some(stripe_id);
        }

        let plan_id = self
            .plan_repo
            .create_plan(insert_plan_entity)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "plan_catalog: failed to create plan");
                PlanCatalogError::Internal(err)
            })?;

        info!(%user_id, %plan_id, "plan_catalog: plan created");
        Ok(PlanSavedDto {
            plan_id,
            status: "Plan successfully created!".to_string(),
        })
    }

    pub async fn edit(&self, user_id: Uuid, plan_id: Uuid) -> CatalogResult<PlanFormDto> {
        self.authorize_admin(user_id).await?;

        let plan = self.load_plan(user_id, plan_id).await?;

        Ok(PlanFormDto {
            plugins: self.settings.available_plugins.clone(),
            subscription_processor: self.settings.subscription_processor.to_string(),
            plan: Some(PlanDto::from(plan)),
        })
    }

    pub async fn update(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        input: PlanInput,
    ) -> CatalogResult<PlanSavedDto> {
        self.authorize_admin(user_id).await?;

        self.load_plan(user_id, plan_id).await?;
        let validated = Self::validate(user_id, &input)?;

        let enable_ordering = input.ordering_enabled();

        let stripe_id =
            Self::top_level_stripe_id(&input).or(validated.processor_ids.stripe_id.clone());

        let update_plan_entity = UpdatePlanEntity {
            name: validated.name,
            price_minor: validated.price_minor,
            description: validated.description,
            features: validated.features,
            limit_items: validated.limit_items,
            limit_views: validated.limit_views,
            limit_orders: validated.limit_orders,
            enable_ordering,
            period: validated.period.to_string(),
            stripe_id,
            epayco_id: validated.processor_ids.epayco_id,
            plugins: Some(validated.plugins.map(|selected| serde_json::json!(selected))),
            updated_at: Utc::now(),
        };

        self.plan_repo
            .update_plan(plan_id, update_plan_entity)
            .await
            .map_err(|err| {
                error!(%user_id, %plan_id, db_error = ?err, "plan_catalog: failed to update plan");
                PlanCatalogError::Internal(err)
            })?;

        info!(%user_id, %plan_id, enable_ordering, "plan_catalog: plan updated");
        Ok(PlanSavedDto {
            plan_id,
            status: "Plan successfully updated!".to_string(),
        })
    }

    pub async fn destroy(&self, user_id: Uuid, plan_id: Uuid) -> CatalogResult<FlashMessage> {
        self.authorize_admin(user_id).await?;

        self.load_plan(user_id, plan_id).await?;

        self.plan_repo
            .soft_delete_plan(plan_id)
            .await
            .map_err(|err| {
                error!(%user_id, %plan_id, db_error = ?err, "plan_catalog: failed to delete plan");
                PlanCatalogError::Internal(err)
            })?;

        info!(%user_id, %plan_id, "plan_catalog: plan soft-deleted");
        Ok(FlashMessage::new("Plan successfully deleted!"))
    }

    async fn authorize_admin(&self, user_id: Uuid) -> CatalogResult<()> {
        let user = self.user_repo.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "plan_catalog: failed to load user");
            PlanCatalogError::Internal(err)
        })?;

        require_admin(user_id, user)?;
        Ok(())
    }

    async fn load_plan(&self, user_id: Uuid, plan_id: Uuid) -> CatalogResult<PlanEntity> {
        self.plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%user_id, %plan_id, db_error = ?err, "plan_catalog: failed to load plan");
                PlanCatalogError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = PlanCatalogError::PlanNotFound;
                warn!(
                    %user_id,
                    %plan_id,
                    status = err.status_code().as_u16(),
                    "plan_catalog: plan not found"
                );
                err
            })
    }

    fn validate(user_id: Uuid, input: &PlanInput) -> CatalogResult<ValidatedPlan> {
        input.validate().map_err(|errors| {
            warn!(
                %user_id,
                status = StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
                invalid_fields = ?errors.keys().collect::<Vec<_>>(),
                "plan_catalog: invalid plan input"
            );
            PlanCatalogError::Validation(errors)
        })
    }

    fn top_level_stripe_id(input: &PlanInput) -> Option<String> {
        input
            .stripe_id
            .as_deref()
            .map(|value| strip_tags(value).trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
