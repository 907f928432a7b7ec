pub mod gateway;
pub mod local;
pub mod stripe_client;

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    config::config_model::DotEnvyConfig,
    domain::{
        entities::users::UserEntity, value_objects::enums::processor_kinds::ProcessorKind,
    },
};
use gateway::{
    ProcessorEvent, ProcessorResult, ProcessorSubscription, SubscriptionGateway,
};
use local::LocalProcessor;
use stripe_client::StripeClient;

/// The processor selected by `SUBSCRIPTION_PROCESSOR`.
pub enum ConfiguredProcessor {
    Stripe(StripeClient),
    Local(LocalProcessor),
}

impl ConfiguredProcessor {
    pub fn from_config(config: &DotEnvyConfig) -> Result<Self> {
        match &config.application.subscription_processor {
            ProcessorKind::Stripe => {
                let stripe = config
                    .stripe
                    .as_ref()
                    .context("stripe settings are required for the stripe processor")?;
                Ok(Self::Stripe(StripeClient::new(
                    stripe.api_base.clone(),
                    stripe.secret_key.clone(),
                    stripe.webhook_secret.clone(),
                )))
            }
            kind => Ok(Self::Local(LocalProcessor::new(kind.clone()))),
        }
    }

    fn inner(&self) -> &(dyn SubscriptionGateway + Send + Sync) {
        match self {
            Self::Stripe(client) => client,
            Self::Local(processor) => processor,
        }
    }
}

#[async_trait]
impl SubscriptionGateway for ConfiguredProcessor {
    fn provider_name(&self) -> String {
        self.inner().provider_name()
    }

    async fn validate_user(&self, user: &UserEntity) -> ProcessorResult<()> {
        self.inner().validate_user(user).await
    }

    async fn create_setup_intent(&self, user: &UserEntity) -> ProcessorResult<String> {
        self.inner().create_setup_intent(user).await
    }

    async fn create_customer(
        &self,
        user_id: Uuid,
        email: Option<String>,
    ) -> ProcessorResult<String> {
        self.inner().create_customer(user_id, email).await
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        payment_method: Option<String>,
        metadata: HashMap<String, String>,
    ) -> ProcessorResult<ProcessorSubscription> {
        self.inner()
            .create_subscription(customer_id, price_id, payment_method, metadata)
            .await
    }

    async fn swap_subscription(
        &self,
        provider_subscription_id: &str,
        price_id: &str,
    ) -> ProcessorResult<ProcessorSubscription> {
        self.inner()
            .swap_subscription(provider_subscription_id, price_id)
            .await
    }

    async fn cancel_now(&self, provider_subscription_id: &str) -> ProcessorResult<()> {
        self.inner().cancel_now(provider_subscription_id).await
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> ProcessorResult<ProcessorEvent> {
        self.inner().verify_webhook(payload, signature)
    }
}
