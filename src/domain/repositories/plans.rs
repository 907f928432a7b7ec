use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::plans::{InsertPlanEntity, PlanEntity, UpdatePlanEntity};

#[automock]
#[async_trait]
pub trait PlanRepository {
    /// Non-deleted plans ordered by price, then name.
    async fn list_plans(&self) -> Result<Vec<PlanEntity>>;
    async fn paginate_plans(&self, page: i64, per_page: i64) -> Result<(Vec<PlanEntity>, i64)>;
    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>>;
    async fn find_with_trashed(&self, plan_id: Uuid) -> Result<Option<PlanEntity>>;
    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<PlanEntity>>;
    async fn create_plan(&self, insert_plan_entity: InsertPlanEntity) -> Result<Uuid>;
    async fn update_plan(&self, plan_id: Uuid, update_plan_entity: UpdatePlanEntity)
    -> Result<()>;
    async fn soft_delete_plan(&self, plan_id: Uuid) -> Result<()>;
}
