use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::billing_periods::BillingPeriod,
        plans::{PlanProcessorIds, ValidatedPlan},
    },
    infrastructure::postgres::schema::plans,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntity {
    pub id: Uuid,
    pub name: String,
    pub price_minor: i32,
    pub description: String,
    pub features: String,
    pub limit_items: i32,
    pub limit_views: i32,
    pub limit_orders: i32,
    pub enable_ordering: bool,
    pub period: BillingPeriod,
    pub processor_ids: PlanProcessorIds,
    pub plugins: Option<Vec<String>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row used for Diesel queries. Period stays as text and plugins as JSON.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = plans)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub price_minor: i32,
    pub description: String,
    pub features: String,
    pub limit_items: i32,
    pub limit_views: i32,
    pub limit_orders: i32,
    pub enable_ordering: bool,
    pub period: String,
    pub stripe_id: Option<String>,
    pub epayco_id: Option<String>,
    pub plugins: Option<serde_json::Value>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PlanRow> for PlanEntity {
    fn from(value: PlanRow) -> Self {
        let plugins = value
            .plugins
            .and_then(|raw| serde_json::from_value::<Vec<String>>(raw).ok());

        Self {
            id: value.id,
            name: value.name,
            price_minor: value.price_minor,
            description: value.description,
            features: value.features,
            limit_items: value.limit_items,
            limit_views: value.limit_views,
            limit_orders: value.limit_orders,
            enable_ordering: value.enable_ordering,
            period: BillingPeriod::from_str(&value.period),
            processor_ids: PlanProcessorIds {
                stripe_id: value.stripe_id,
                epayco_id: value.epayco_id,
            },
            plugins,
            deleted_at: value.deleted_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = plans)]
pub struct InsertPlanEntity {
    pub name: String,
    pub price_minor: i32,
    pub description: String,
    pub features: String,
    pub limit_items: i32,
    pub limit_views: i32,
    pub limit_orders: i32,
    pub enable_ordering: bool,
    pub period: String,
    pub stripe_id: Option<String>,
    pub epayco_id: Option<String>,
    pub plugins: Option<serde_json::Value>,
}

impl From<ValidatedPlan> for InsertPlanEntity {
    fn from(value: ValidatedPlan) -> Self {
        Self {
            name: value.name,
            price_minor: value.price_minor,
            description: value.description,
            features: value.features,
            limit_items: value.limit_items,
            limit_views: value.limit_views,
            limit_orders: 0,
            enable_ordering: false,
            period: value.period.to_string(),
            stripe_id: value.processor_ids.stripe_id,
            epayco_id: value.processor_ids.epayco_id,
            plugins: value.plugins.map(|selected| serde_json::json!(selected)),
        }
    }
}

/// Changes applied by a plan update. `None` processor ids leave the column untouched;
/// `Some(None)` plugins clears the selection.
#[derive(Debug, Clone, PartialEq, AsChangeset)]
#[diesel(table_name = plans)]
pub struct UpdatePlanEntity {
    pub name: String,
    pub price_minor: i32,
    pub description: String,
    pub features: String,
    pub limit_items: i32,
    pub limit_views: i32,
    pub limit_orders: i32,
    pub enable_ordering: bool,
    pub period: String,
    pub stripe_id: Option<String>,
    pub epayco_id: Option<String>,
    pub plugins: Option<Option<serde_json::Value>>,
    pub updated_at: DateTime<Utc>,
}
