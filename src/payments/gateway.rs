use std::collections::HashMap;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    entities::users::UserEntity, value_objects::enums::subscription_statuses::SubscriptionStatus,
};

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    PaymentFailure(String),
    #[error("invalid webhook signature: {0}")]
    InvalidSignature(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl From<reqwest::Error> for ProcessorError {
    fn from(err: reqwest::Error) -> Self {
        ProcessorError::Transport(anyhow::Error::new(err))
    }
}

pub type ProcessorResult<T> = std::result::Result<T, ProcessorError>;

/// A subscription as reported by the processor after create or swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorSubscription {
    pub id: String,
    pub status: SubscriptionStatus,
    pub price_id: String,
    /// Set when the provider kept the subscription but its first payment did not go through.
    pub pending_payment: Option<PendingPayment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPaymentKind {
    ActionRequired,
    Failed,
    Incomplete,
}

/// Payment intent the client needs to finish a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentIntentRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPayment {
    pub kind: PendingPaymentKind,
    pub message: String,
    pub payment_intent: Option<PaymentIntentRef>,
}

/// A verified webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: ProcessorEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorEventData {
    pub object: serde_json::Value,
}

/// Recurring-billing operations of a payment provider.
#[automock]
#[async_trait]
pub trait SubscriptionGateway {
    fn provider_name(&self) -> String;

    /// Re-checks the user's billing state with the provider.
    async fn validate_user(&self, user: &UserEntity) -> ProcessorResult<()>;

    /// Returns the client secret of a new setup intent for collecting a card.
    async fn create_setup_intent(&self, user: &UserEntity) -> ProcessorResult<String>;

    async fn create_customer(&self, user_id: Uuid, email: Option<String>)
    -> ProcessorResult<String>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        payment_method: Option<String>,
        metadata: HashMap<String, String>,
    ) -> ProcessorResult<ProcessorSubscription>;

    async fn swap_subscription(
        &self,
        provider_subscription_id: &str,
        price_id: &str,
    ) -> ProcessorResult<ProcessorSubscription>;

    async fn cancel_now(&self, provider_subscription_id: &str) -> ProcessorResult<()>;

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> ProcessorResult<ProcessorEvent>;
}
