use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::{
    domain::{
        entities::users::UserEntity,
        value_objects::enums::{
            processor_kinds::ProcessorKind, subscription_statuses::SubscriptionStatus,
        },
    },
    payments::gateway::{
        ProcessorError, ProcessorEvent, ProcessorResult, ProcessorSubscription,
        SubscriptionGateway,
    },
};

/// Processor used when billing is handled outside of this service.
///
/// Every provider call succeeds locally. External processor modules are not
/// bundled, so their user validation is a logged no-op.
pub struct LocalProcessor {
    kind: ProcessorKind,
}

impl LocalProcessor {
    pub fn new(kind: ProcessorKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl SubscriptionGateway for LocalProcessor {
    fn provider_name(&self) -> String {
        self.kind.to_string()
    }

    async fn validate_user(&self, user: &UserEntity) -> ProcessorResult<()> {
        debug!(
            user_id = %user.id,
            processor = %self.kind,
            "local_processor: no validation module bundled for processor"
        );
        Ok(())
    }

    async fn create_setup_intent(&self, _user: &UserEntity) -> ProcessorResult<String> {
        Err(ProcessorError::InvalidRequest(format!(
            "setup intents are not supported by the {} processor",
            self.kind
        )))
    }

    async fn create_customer(
        &self,
        _user_id: Uuid,
        _email: Option<String>,
    ) -> ProcessorResult<String> {
        Ok(format!("local_cus_{}", Uuid::new_v4().simple()))
    }

    async fn create_subscription(
        &self,
        _customer_id: &str,
        price_id: &str,
        _payment_method: Option<String>,
        _metadata: HashMap<String, String>,
    ) -> ProcessorResult<ProcessorSubscription> {
        Ok(ProcessorSubscription {
            id: format!("local_sub_{}", Uuid::new_v4().simple()),
            status: SubscriptionStatus::Active,
            price_id: price_id.to_string(),
            pending_payment: None,
        })
    }

    async fn swap_subscription(
        &self,
        provider_subscription_id: &str,
        price_id: &str,
    ) -> ProcessorResult<ProcessorSubscription> {
        Ok(ProcessorSubscription {
            id: provider_subscription_id.to_string(),
            status: SubscriptionStatus::Active,
            price_id: price_id.to_string(),
            pending_payment: None,
        })
    }

    async fn cancel_now(&self, _provider_subscription_id: &str) -> ProcessorResult<()> {
        Ok(())
    }

    fn verify_webhook(&self, _payload: &[u8], _signature: &str) -> ProcessorResult<ProcessorEvent> {
        Err(ProcessorError::InvalidSignature(format!(
            "webhooks are not supported by the {} processor",
            self.kind
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriptions_always_succeed_with_local_ids() {
        let processor = LocalProcessor::new(ProcessorKind::Local);

        let created = processor
            .create_subscription("local_cus_1", "price_pro", None, HashMap::new())
            .await
            .unwrap();
        assert!(created.id.starts_with("local_sub_"));
        assert_eq!(created.status, SubscriptionStatus::Active);

        let swapped = processor
            .swap_subscription(&created.id, "price_team")
            .await
            .unwrap();
        assert_eq!(swapped.id, created.id);
        assert_eq!(swapped.price_id, "price_team");
    }

    #[test]
    fn reports_external_processor_name() {
        let processor = LocalProcessor::new(ProcessorKind::External("epayco".to_string()));

        assert_eq!(processor.provider_name(), "epayco");
    }
}
