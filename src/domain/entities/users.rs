use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::roles::Role, infrastructure::postgres::schema::app_users,
};

/// Marks a plan assigned manually by an admin; such users skip processor validation.
pub const PLAN_STATUS_SET_BY_ADMIN: &str = "set_by_admin";

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = app_users)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: Option<String>,
    pub role: String,
    pub plan_id: Option<Uuid>,
    pub plan_status: Option<String>,
    pub cancel_url: Option<String>,
    pub provider_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserEntity {
    pub fn role(&self) -> Option<Role> {
        Role::from_str(&self.role)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    /// The assigned plan, falling back to the free plan.
    pub fn effective_plan_id(&self, free_plan_id: Uuid) -> Uuid {
        self.plan_id.unwrap_or(free_plan_id)
    }

    pub fn plan_set_by_admin(&self) -> bool {
        self.plan_status.as_deref() == Some(PLAN_STATUS_SET_BY_ADMIN)
    }
}

/// `None` values are written as NULL.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = app_users, treat_none_as_null = true)]
pub struct AssignPlanEntity {
    pub plan_id: Option<Uuid>,
    pub cancel_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}
