use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{OptionalExtension, RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::plans::{InsertPlanEntity, PlanEntity, PlanRow, UpdatePlanEntity},
        repositories::plans::PlanRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::plans},
};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn list_plans(&self) -> Result<Vec<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = plans::table
            .filter(plans::deleted_at.is_null())
            .order((plans::price_minor.asc(), plans::name.asc()))
            .select(PlanRow::as_select())
            .load::<PlanRow>(&mut conn)?;

        Ok(rows.into_iter().map(PlanEntity::from).collect())
    }

    async fn paginate_plans(&self, page: i64, per_page: i64) -> Result<(Vec<PlanEntity>, i64)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = plans::table
            .filter(plans::deleted_at.is_null())
            .count()
            .get_result::<i64>(&mut conn)?;

        let rows = plans::table
            .filter(plans::deleted_at.is_null())
            .order((plans::price_minor.asc(), plans::name.asc()))
            .limit(per_page)
            .offset((page - 1) * per_page)
            .select(PlanRow::as_select())
            .load::<PlanRow>(&mut conn)?;

        Ok((rows.into_iter().map(PlanEntity::from).collect(), total))
    }

    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = plans::table
            .filter(plans::id.eq(plan_id))
            .filter(plans::deleted_at.is_null())
            .select(PlanRow::as_select())
            .first::<PlanRow>(&mut conn)
            .optional()?;

        Ok(row.map(PlanEntity::from))
    }

    async fn find_with_trashed(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = plans::table
            .filter(plans::id.eq(plan_id))
            .select(PlanRow::as_select())
            .first::<PlanRow>(&mut conn)
            .optional()?;

        Ok(row.map(PlanEntity::from))
    }

    async fn find_by_stripe_id(&self, stripe_id: &str) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = plans::table
            .filter(plans::stripe_id.eq(stripe_id))
            .filter(plans::deleted_at.is_null())
            .select(PlanRow::as_select())
            .first::<PlanRow>(&mut conn)
            .optional()?;

        Ok(row.map(PlanEntity::from))
    }

    async fn create_plan(&self, insert_plan_entity: InsertPlanEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let plan_id = insert_into(plans::table)
            .values(&insert_plan_entity)
            .returning(plans::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(plan_id)
    }

    async fn update_plan(
        &self,
        plan_id: Uuid,
        update_plan_entity: UpdatePlanEntity,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(plans::table)
            .filter(plans::id.eq(plan_id))
            .filter(plans::deleted_at.is_null())
            .set(&update_plan_entity)
            .execute(&mut conn)?;

        Ok(())
    }

    async fn soft_delete_plan(&self, plan_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        update(plans::table)
            .filter(plans::id.eq(plan_id))
            .filter(plans::deleted_at.is_null())
            .set((plans::deleted_at.eq(Some(now)), plans::updated_at.eq(now)))
            .execute(&mut conn)?;

        Ok(())
    }
}
