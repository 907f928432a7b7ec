use std::sync::Arc;

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    application::authorization::{AccessError, require_owner},
    config::config_model::Application,
    domain::{
        entities::users::UserEntity,
        repositories::{plans::PlanRepository, users::UserRepository},
        value_objects::{
            enums::processor_kinds::ProcessorKind,
            plans::{PlanDto, column_width},
            subscriptions::CurrentPlanDto,
        },
    },
    payments::gateway::{ProcessorError, SubscriptionGateway},
};

#[derive(Debug, Error)]
pub enum CurrentPlanError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Payment provider is unavailable.")]
    Processor(#[source] ProcessorError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CurrentPlanError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CurrentPlanError::Access(err) => err.status_code(),
            CurrentPlanError::Processor(_) => StatusCode::BAD_GATEWAY,
            CurrentPlanError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub struct CurrentPlanUseCase<P, U, G>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    user_repo: Arc<U>,
    gateway: Arc<G>,
    settings: Arc<Application>,
}

impl<P, U, G> CurrentPlanUseCase<P, U, G>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        user_repo: Arc<U>,
        gateway: Arc<G>,
        settings: Arc<Application>,
    ) -> Self {
        Self {
            plan_repo,
            user_repo,
            gateway,
            settings,
        }
    }

    /// Builds the owner's plan picker: the plans on offer, the plan they are on
    /// and, for Stripe, a setup-intent secret for collecting a card.
    pub async fn current(&self, user_id: Uuid) -> Result<CurrentPlanDto, CurrentPlanError> {
        let user = self.user_repo.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "current_plan: failed to load user");
            CurrentPlanError::Internal(err)
        })?;
        let user = require_owner(user_id, user)?;

        self.validate_with_processor(&user).await?;

        let free_plan_id = self.settings.free_plan_id;
        let plans: Vec<PlanDto> = self
            .plan_repo
            .list_plans()
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "current_plan: failed to list plans");
                CurrentPlanError::Internal(err)
            })?
            .into_iter()
            .filter(|plan| !(self.settings.force_user_to_pay && plan.id == free_plan_id))
            .map(PlanDto::from)
            .collect();

        let effective_plan_id = user.effective_plan_id(free_plan_id);
        let current_plan = self
            .plan_repo
            .find_with_trashed(effective_plan_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    plan_id = %effective_plan_id,
                    db_error = ?err,
                    "current_plan: failed to load current plan"
                );
                CurrentPlanError::Internal(err)
            })?
            .map(PlanDto::from);

        let intent = if self.settings.subscription_processor == ProcessorKind::Stripe
            && self.settings.provider_calls_enabled()
        {
            let secret = self
                .gateway
                .create_setup_intent(&user)
                .await
                .map_err(|err| {
                    error!(%user_id, processor_error = ?err, "current_plan: failed to create setup intent");
                    CurrentPlanError::Processor(err)
                })?;
            Some(secret)
        } else {
            None
        };

        info!(
            %user_id,
            plan_id = %effective_plan_id,
            plans = plans.len(),
            "current_plan: plan picker built"
        );

        Ok(CurrentPlanDto {
            col: column_width(plans.len()),
            plans,
            current_plan,
            intent,
            subscription_processor: self.settings.subscription_processor.to_string(),
        })
    }

    async fn validate_with_processor(&self, user: &UserEntity) -> Result<(), CurrentPlanError> {
        if !self.settings.subscription_processor.is_external()
            || user.plan_set_by_admin()
            || !self.settings.provider_calls_enabled()
        {
            return Ok(());
        }

        self.gateway.validate_user(user).await.map_err(|err| {
            warn!(
                user_id = %user.id,
                processor = %self.settings.subscription_processor,
                processor_error = ?err,
                "current_plan: processor validation failed"
            );
            CurrentPlanError::Processor(err)
        })
    }
}
