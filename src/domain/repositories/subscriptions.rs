use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
    value_objects::enums::subscription_statuses::SubscriptionStatus,
};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn find_main_subscription(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn find_by_provider_subscription_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<SubscriptionEntity>>;

    /// Inserts the user's main subscription, replacing any previous one.
    async fn upsert_main_subscription(
        &self,
        insert_subscription_entity: InsertSubscriptionEntity,
    ) -> Result<Uuid>;

    async fn update_price(
        &self,
        subscription_id: Uuid,
        provider_price_id: &str,
        status: SubscriptionStatus,
    ) -> Result<()>;

    async fn update_status(&self, subscription_id: Uuid, status: SubscriptionStatus)
    -> Result<()>;
}
