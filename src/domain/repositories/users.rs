use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::users::{AssignPlanEntity, UserEntity};

#[automock]
#[async_trait]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>>;
    async fn assign_plan(&self, user_id: Uuid, assign_plan_entity: AssignPlanEntity) -> Result<()>;
    async fn set_provider_customer_id(&self, user_id: Uuid, customer_id: &str) -> Result<()>;
}
