use std::{collections::HashMap, sync::Arc};

use axum::http::StatusCode;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    application::authorization::{AccessError, require_user},
    config::config_model::Application,
    domain::{
        entities::{
            plans::PlanEntity,
            subscriptions::{InsertSubscriptionEntity, MAIN_SUBSCRIPTION, SubscriptionEntity},
            users::{AssignPlanEntity, UserEntity},
        },
        repositories::{
            plans::PlanRepository, subscriptions::SubscriptionRepository, users::UserRepository,
        },
        value_objects::{
            enums::{processor_kinds::ProcessorKind, subscription_statuses::SubscriptionStatus},
            subscriptions::{FlashMessage, SubscribeRequest, ThreeDSecureResult},
        },
    },
    payments::gateway::{
        PaymentIntentRef, PendingPayment, PendingPaymentKind, ProcessorError,
        ProcessorSubscription, SubscriptionGateway,
    },
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("plan not found")]
    PlanNotFound,
    #[error("The selected plan has no price configured for {0}.")]
    MissingPrice(String),
    #[error("Error while creating subscription: {0}")]
    SubscriptionFailed(String),
    #[error("Payment failed: {message}")]
    PaymentFailed {
        message: String,
        payment_intent: Option<PaymentIntentRef>,
    },
    #[error("Payment action required: {message}")]
    PaymentActionRequired {
        message: String,
        payment_intent: Option<PaymentIntentRef>,
    },
    #[error("Payment incomplete: {message}")]
    PaymentIncomplete {
        message: String,
        payment_intent: Option<PaymentIntentRef>,
    },
    #[error("{0}")]
    ThreeDSecureFailed(String),
    #[error("no subscription to cancel")]
    SubscriptionNotFound,
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("Payment provider is unavailable.")]
    Provider(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::Access(err) => err.status_code(),
            SubscriptionError::PlanNotFound | SubscriptionError::SubscriptionNotFound => {
                StatusCode::NOT_FOUND
            }
            SubscriptionError::MissingPrice(_)
            | SubscriptionError::SubscriptionFailed(_)
            | SubscriptionError::ThreeDSecureFailed(_)
            | SubscriptionError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::PaymentFailed { .. }
            | SubscriptionError::PaymentActionRequired { .. }
            | SubscriptionError::PaymentIncomplete { .. } => StatusCode::PAYMENT_REQUIRED,
            SubscriptionError::Provider(_) => StatusCode::BAD_GATEWAY,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProcessorError> for SubscriptionError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::InvalidRequest(message) => SubscriptionError::SubscriptionFailed(message),
            ProcessorError::PaymentFailure(message) => SubscriptionError::PaymentFailed {
                message,
                payment_intent: None,
            },
            ProcessorError::InvalidSignature(message) => SubscriptionError::InvalidWebhook(message),
            ProcessorError::Transport(err) => SubscriptionError::Provider(err),
        }
    }
}

impl From<PendingPayment> for SubscriptionError {
    fn from(pending: PendingPayment) -> Self {
        let PendingPayment {
            kind,
            message,
            payment_intent,
        } = pending;

        match kind {
            PendingPaymentKind::ActionRequired => SubscriptionError::PaymentActionRequired {
                message,
                payment_intent,
            },
            PendingPaymentKind::Failed => SubscriptionError::PaymentFailed {
                message,
                payment_intent,
            },
            PendingPaymentKind::Incomplete => SubscriptionError::PaymentIncomplete {
                message,
                payment_intent,
            },
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

pub struct SubscriptionUseCase<P, U, S, G>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    plan_repo: Arc<P>,
    user_repo: Arc<U>,
    subscription_repo: Arc<S>,
    gateway: Arc<G>,
    settings: Arc<Application>,
}

impl<P, U, S, G> SubscriptionUseCase<P, U, S, G>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    G: SubscriptionGateway + Send + Sync + 'static,
{
    pub fn new(
        plan_repo: Arc<P>,
        user_repo: Arc<U>,
        subscription_repo: Arc<S>,
        gateway: Arc<G>,
        settings: Arc<Application>,
    ) -> Self {
        Self {
            plan_repo,
            user_repo,
            subscription_repo,
            gateway,
            settings,
        }
    }

    pub async fn subscribe(
        &self,
        user_id: Uuid,
        request: SubscribeRequest,
    ) -> UseCaseResult<FlashMessage> {
        let user = self.load_user(user_id).await?;
        let plan = self.load_plan(user_id, request.plan_id).await?;

        if self.settings.subscription_processor != ProcessorKind::Stripe {
            info!(
                %user_id,
                plan_id = %plan.id,
                processor = %self.settings.subscription_processor,
                "subscriptions: processor manages its own subscriptions, nothing to change"
            );
            return Ok(FlashMessage::new("Subscription updated!"));
        }

        let price_id = plan.processor_ids.stripe_id.clone().ok_or_else(|| {
            let err = SubscriptionError::MissingPrice(self.gateway.provider_name());
            warn!(
                %user_id,
                plan_id = %plan.id,
                status = err.status_code().as_u16(),
                "subscriptions: plan has no stripe price"
            );
            err
        })?;

        let existing = self
            .subscription_repo
            .find_main_subscription(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load main subscription");
                SubscriptionError::Internal(err)
            })?;

        match existing {
            Some(subscription) if subscription.status().is_subscribed() => {
                let swapped = self
                    .gateway
                    .swap_subscription(&subscription.provider_subscription_id, &price_id)
                    .await
                    .map_err(|err| self.processor_failure(user_id, plan.id, err))?;

                self.subscription_repo
                    .update_price(subscription.id, &swapped.price_id, swapped.status)
                    .await
                    .map_err(|err| {
                        error!(
                            %user_id,
                            subscription_id = %subscription.id,
                            db_error = ?err,
                            "subscriptions: failed to store swapped price"
                        );
                        SubscriptionError::Internal(err)
                    })?;

                if let Some(pending) = swapped.pending_payment {
                    return Err(self.pending_payment_failure(user_id, plan.id, pending));
                }

                info!(
                    %user_id,
                    plan_id = %plan.id,
                    provider_subscription_id = %swapped.id,
                    "subscriptions: subscription swapped"
                );
            }
            existing => {
                if let Some(stale) = existing
                    .filter(|subscription| subscription.status() == SubscriptionStatus::Incomplete)
                {
                    self.abandon_incomplete(&stale).await?;
                }

                let created = self
                    .create_main_subscription(&user, &plan, &price_id, request.payment_method)
                    .await?;

                info!(
                    %user_id,
                    plan_id = %plan.id,
                    provider_subscription_id = %created.id,
                    status = %created.status,
                    "subscriptions: subscription created"
                );

                if let Some(pending) = created.pending_payment {
                    return Err(self.pending_payment_failure(user_id, plan.id, pending));
                }
            }
        }

        self.assign_plan(user_id, Some(plan.id), Some(self.settings.cancel_url()))
            .await?;

        Ok(FlashMessage::new("Subscription updated!"))
    }

    /// Return leg of a 3-D Secure challenge started by `subscribe`.
    pub async fn confirm_3d_secure(
        &self,
        caller_id: Uuid,
        plan_id: Uuid,
        user_id: Uuid,
        result: ThreeDSecureResult,
    ) -> UseCaseResult<FlashMessage> {
        if caller_id != user_id {
            let err = SubscriptionError::Access(AccessError::Forbidden);
            warn!(
                %caller_id,
                %user_id,
                status = err.status_code().as_u16(),
                "subscriptions: 3-D Secure confirmation for another user"
            );
            return Err(err);
        }
        self.load_user(user_id).await?;

        if !result.succeeded() {
            let message = result
                .message
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| "Payment was not confirmed.".to_string());
            let err = SubscriptionError::ThreeDSecureFailed(message);
            warn!(
                %user_id,
                %plan_id,
                status = err.status_code().as_u16(),
                "subscriptions: 3-D Secure challenge failed"
            );
            return Err(err);
        }

        let plan = self.load_plan(user_id, plan_id).await?;

        let pending = self
            .subscription_repo
            .find_main_subscription(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load main subscription");
                SubscriptionError::Internal(err)
            })?
            .filter(|subscription| subscription.status() == SubscriptionStatus::Incomplete);
        if let Some(subscription) = pending {
            self.update_status(&subscription, SubscriptionStatus::Active)
                .await?;
        }

        self.assign_plan(user_id, Some(plan.id), Some(self.settings.cancel_url()))
            .await?;

        info!(%user_id, %plan_id, "subscriptions: plan confirmed after 3-D Secure");
        Ok(FlashMessage::new("Plan update!"))
    }

    pub async fn cancel(&self, user_id: Uuid) -> UseCaseResult<FlashMessage> {
        self.load_user(user_id).await?;

        let subscription = self
            .subscription_repo
            .find_main_subscription(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to load main subscription");
                SubscriptionError::Internal(err)
            })?
            .filter(|subscription| subscription.status() != SubscriptionStatus::Canceled)
            .ok_or_else(|| {
                let err = SubscriptionError::SubscriptionNotFound;
                warn!(
                    %user_id,
                    status = err.status_code().as_u16(),
                    "subscriptions: nothing to cancel"
                );
                err
            })?;

        self.gateway
            .cancel_now(&subscription.provider_subscription_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    provider_subscription_id = %subscription.provider_subscription_id,
                    processor_error = ?err,
                    "subscriptions: provider cancellation failed"
                );
                SubscriptionError::from(err)
            })?;

        self.mark_canceled(&subscription).await?;

        info!(
            %user_id,
            subscription_id = %subscription.id,
            "subscriptions: subscription canceled"
        );
        Ok(FlashMessage::new("Subscription canceled"))
    }

    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> UseCaseResult<()> {
        let event = self
            .gateway
            .verify_webhook(payload, signature)
            .map_err(|err| {
                warn!(processor_error = ?err, "subscriptions: rejected webhook");
                match err {
                    ProcessorError::Transport(inner) => {
                        SubscriptionError::InvalidWebhook(inner.to_string())
                    }
                    other => SubscriptionError::from(other),
                }
            })?;

        let object = &event.data.object;
        debug!(event_type = %event.type_, event_id = ?event.id, "subscriptions: webhook received");

        match event.type_.as_str() {
            "customer.subscription.deleted" => {
                let provider_subscription_id = required_str(object, "id")?;
                if let Some(subscription) = self.find_by_provider_id(provider_subscription_id).await? {
                    self.mark_canceled(&subscription).await?;
                    info!(
                        user_id = %subscription.user_id,
                        provider_subscription_id,
                        "subscriptions: subscription ended by provider"
                    );
                }
            }
            "customer.subscription.updated" => {
                let provider_subscription_id = required_str(object, "id")?;
                let status = SubscriptionStatus::from_str(required_str(object, "status")?);
                let price_id = object
                    .pointer("/items/data/0/price/id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        SubscriptionError::InvalidWebhook("missing subscription price".to_string())
                    })?;

                if let Some(subscription) = self.find_by_provider_id(provider_subscription_id).await? {
                    self.apply_provider_update(&subscription, price_id, status)
                        .await?;
                }
            }
            "invoice.payment_failed" => {
                if let Some(provider_subscription_id) =
                    object.get("subscription").and_then(Value::as_str)
                {
                    if let Some(subscription) =
                        self.find_by_provider_id(provider_subscription_id).await?
                    {
                        self.update_status(&subscription, SubscriptionStatus::PastDue)
                            .await?;
                        warn!(
                            user_id = %subscription.user_id,
                            provider_subscription_id,
                            "subscriptions: invoice payment failed"
                        );
                    }
                }
            }
            other => {
                debug!(event_type = other, "subscriptions: ignoring webhook event");
            }
        }

        Ok(())
    }

    async fn create_main_subscription(
        &self,
        user: &UserEntity,
        plan: &PlanEntity,
        price_id: &str,
        payment_method: Option<String>,
    ) -> UseCaseResult<ProcessorSubscription> {
        let customer_id = match user.provider_customer_id.clone() {
            Some(customer_id) => customer_id,
            None => {
                let customer_id = self
                    .gateway
                    .create_customer(user.id, user.email.clone())
                    .await
                    .map_err(|err| self.processor_failure(user.id, plan.id, err))?;
                self.user_repo
                    .set_provider_customer_id(user.id, &customer_id)
                    .await
                    .map_err(|err| {
                        error!(user_id = %user.id, db_error = ?err, "subscriptions: failed to store customer id");
                        SubscriptionError::Internal(err)
                    })?;
                customer_id
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert("plan_id".to_string(), plan.id.to_string());
        metadata.insert("user_id".to_string(), user.id.to_string());

        let created = self
            .gateway
            .create_subscription(&customer_id, price_id, payment_method, metadata)
            .await
            .map_err(|err| self.processor_failure(user.id, plan.id, err))?;

        self.subscription_repo
            .upsert_main_subscription(InsertSubscriptionEntity {
                user_id: user.id,
                name: MAIN_SUBSCRIPTION.to_string(),
                provider: self.gateway.provider_name(),
                provider_subscription_id: created.id.clone(),
                provider_price_id: created.price_id.clone(),
                status: created.status.to_string(),
            })
            .await
            .map_err(|err| {
                error!(user_id = %user.id, db_error = ?err, "subscriptions: failed to store subscription");
                SubscriptionError::Internal(err)
            })?;

        Ok(created)
    }

    /// Drops an unpaid subscription so a new attempt does not bill twice.
    async fn abandon_incomplete(&self, subscription: &SubscriptionEntity) -> UseCaseResult<()> {
        self.gateway
            .cancel_now(&subscription.provider_subscription_id)
            .await
            .map_err(|err| {
                error!(
                    user_id = %subscription.user_id,
                    provider_subscription_id = %subscription.provider_subscription_id,
                    processor_error = ?err,
                    "subscriptions: failed to cancel incomplete subscription"
                );
                SubscriptionError::from(err)
            })?;
        self.update_status(subscription, SubscriptionStatus::Canceled)
            .await?;

        info!(
            user_id = %subscription.user_id,
            provider_subscription_id = %subscription.provider_subscription_id,
            "subscriptions: incomplete subscription abandoned"
        );
        Ok(())
    }

    async fn apply_provider_update(
        &self,
        subscription: &SubscriptionEntity,
        price_id: &str,
        status: SubscriptionStatus,
    ) -> UseCaseResult<()> {
        if status == SubscriptionStatus::Canceled {
            return self.mark_canceled(subscription).await;
        }

        self.subscription_repo
            .update_price(subscription.id, price_id, status)
            .await
            .map_err(|err| {
                error!(
                    subscription_id = %subscription.id,
                    db_error = ?err,
                    "subscriptions: failed to update subscription from webhook"
                );
                SubscriptionError::Internal(err)
            })?;

        if !status.is_subscribed() {
            return Ok(());
        }

        let plan = self
            .plan_repo
            .find_by_stripe_id(price_id)
            .await
            .map_err(|err| {
                error!(price_id, db_error = ?err, "subscriptions: failed to look up plan by price");
                SubscriptionError::Internal(err)
            })?;

        match plan {
            Some(plan) => {
                self.assign_plan(
                    subscription.user_id,
                    Some(plan.id),
                    Some(self.settings.cancel_url()),
                )
                .await?;
                info!(
                    user_id = %subscription.user_id,
                    plan_id = %plan.id,
                    "subscriptions: plan synced from provider"
                );
            }
            None => {
                warn!(
                    user_id = %subscription.user_id,
                    price_id,
                    "subscriptions: no plan uses the provider price"
                );
            }
        }

        Ok(())
    }

    async fn mark_canceled(&self, subscription: &SubscriptionEntity) -> UseCaseResult<()> {
        self.update_status(subscription, SubscriptionStatus::Canceled)
            .await?;

        let free_plan_id = self.settings.free_plan_id;
        let free_plan_id = (!free_plan_id.is_nil()).then_some(free_plan_id);
        self.assign_plan(subscription.user_id, free_plan_id, None)
            .await
    }

    async fn update_status(
        &self,
        subscription: &SubscriptionEntity,
        status: SubscriptionStatus,
    ) -> UseCaseResult<()> {
        self.subscription_repo
            .update_status(subscription.id, status)
            .await
            .map_err(|err| {
                error!(
                    subscription_id = %subscription.id,
                    %status,
                    db_error = ?err,
                    "subscriptions: failed to update subscription status"
                );
                SubscriptionError::Internal(err)
            })
    }

    async fn assign_plan(
        &self,
        user_id: Uuid,
        plan_id: Option<Uuid>,
        cancel_url: Option<String>,
    ) -> UseCaseResult<()> {
        self.user_repo
            .assign_plan(
                user_id,
                AssignPlanEntity {
                    plan_id,
                    cancel_url,
                    updated_at: Utc::now(),
                },
            )
            .await
            .map_err(|err| {
                error!(%user_id, plan_id = ?plan_id, db_error = ?err, "subscriptions: failed to assign plan");
                SubscriptionError::Internal(err)
            })
    }

    async fn find_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        let subscription = self
            .subscription_repo
            .find_by_provider_subscription_id(provider_subscription_id)
            .await
            .map_err(|err| {
                error!(
                    provider_subscription_id,
                    db_error = ?err,
                    "subscriptions: failed to load subscription by provider id"
                );
                SubscriptionError::Internal(err)
            })?;

        if subscription.is_none() {
            debug!(provider_subscription_id, "subscriptions: webhook for unknown subscription");
        }
        Ok(subscription)
    }

    async fn load_user(&self, user_id: Uuid) -> UseCaseResult<UserEntity> {
        let user = self.user_repo.find_by_id(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "subscriptions: failed to load user");
            SubscriptionError::Internal(err)
        })?;
        Ok(require_user(user_id, user)?)
    }

    async fn load_plan(&self, user_id: Uuid, plan_id: Uuid) -> UseCaseResult<PlanEntity> {
        self.plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%user_id, %plan_id, db_error = ?err, "subscriptions: failed to load plan");
                SubscriptionError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = SubscriptionError::PlanNotFound;
                warn!(
                    %user_id,
                    %plan_id,
                    status = err.status_code().as_u16(),
                    "subscriptions: plan not found"
                );
                err
            })
    }

    fn pending_payment_failure(
        &self,
        user_id: Uuid,
        plan_id: Uuid,
        pending: PendingPayment,
    ) -> SubscriptionError {
        let err = SubscriptionError::from(pending);
        warn!(
            %user_id,
            %plan_id,
            status = err.status_code().as_u16(),
            message = %err,
            "subscriptions: subscription stored while its payment is pending"
        );
        err
    }

    fn processor_failure(&self, user_id: Uuid, plan_id: Uuid, err: ProcessorError) -> SubscriptionError {
        let err = SubscriptionError::from(err);
        warn!(
            %user_id,
            %plan_id,
            status = err.status_code().as_u16(),
            message = %err,
            "subscriptions: processor rejected subscription change"
        );
        err
    }
}

fn required_str<'a>(object: &'a Value, field: &str) -> UseCaseResult<&'a str> {
    object
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| SubscriptionError::InvalidWebhook(format!("missing {field}")))
}
