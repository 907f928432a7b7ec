use std::{
    collections::{BTreeMap, HashMap},
    sync::LazyLock,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    config::config_model::PluginOption,
    domain::{entities::plans::PlanEntity, value_objects::enums::billing_periods::BillingPeriod},
};

pub const PLANS_PER_PAGE: i64 = 10;

/// Column width used by the plan cards, indexed by the number of plans on display.
pub const PLAN_COLUMN_WIDTHS: [u8; 17] = [4, 12, 6, 4, 3, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4, 4];

const DEFAULT_COLUMN_WIDTH: u8 = 4;
const EPAYCO_ID_MAX_LEN: usize = 191;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// Removes HTML tags from user supplied text.
pub fn strip_tags(value: &str) -> String {
    TAG_PATTERN.replace_all(value, "").into_owned()
}

pub fn column_width(plan_count: usize) -> u8 {
    PLAN_COLUMN_WIDTHS
        .get(plan_count)
        .copied()
        .unwrap_or(DEFAULT_COLUMN_WIDTH)
}

/// Processor-specific price or plan ids carried by a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanProcessorIds {
    pub stripe_id: Option<String>,
    pub epayco_id: Option<String>,
}

/// Plan form payload as submitted by an admin.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlanInput {
    pub name: Option<String>,
    pub price: Option<Value>,
    pub description: Option<String>,
    pub features: Option<String>,
    pub limit_items: Option<Value>,
    pub limit_views: Option<Value>,
    pub limit_orders: Option<Value>,
    pub period: Option<String>,
    pub ordering: Option<String>,
    pub stripe_id: Option<String>,
    #[serde(default)]
    pub subscribe: Option<HashMap<String, String>>,
    #[serde(default, alias = "pluginsSelector")]
    pub plugins: Option<Vec<String>>,
}

/// Sanitised plan fields shared by create and update.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    pub name: String,
    pub price_minor: i32,
    pub description: String,
    pub features: String,
    pub limit_items: i32,
    pub limit_views: i32,
    /// Zero unless ordering is enabled.
    pub limit_orders: i32,
    pub period: BillingPeriod,
    pub processor_ids: PlanProcessorIds,
    pub plugins: Option<Vec<String>>,
}

pub type ValidationErrors = BTreeMap<String, String>;

impl PlanInput {
    pub fn validate(&self) -> Result<ValidatedPlan, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = required_text(self.name.as_deref())
            .map(|value| strip_tags(&value).trim().to_string());
        if name.as_deref().is_none_or(str::is_empty) {
            errors.insert("name".to_string(), "The name field is required.".to_string());
        }

        let price_minor = match self.price.as_ref() {
            None | Some(Value::Null) => {
                errors.insert("price".to_string(), "The price field is required.".to_string());
                None
            }
            Some(raw) => match parse_price_minor(raw) {
                Some(value) => Some(value),
                None => {
                    errors.insert("price".to_string(), "The price must be a number.".to_string());
                    None
                }
            },
        };

        let description = required_text(self.description.as_deref());
        if description.is_none() {
            errors.insert(
                "description".to_string(),
                "The description field is required.".to_string(),
            );
        }

        let features = required_text(self.features.as_deref());
        if features.is_none() {
            errors.insert(
                "features".to_string(),
                "The features field is required.".to_string(),
            );
        }

        let limit_items = parse_limit("limit_items", self.limit_items.as_ref(), &mut errors);
        let limit_views = parse_limit("limit_views", self.limit_views.as_ref(), &mut errors);
        let limit_orders = if self.ordering_enabled() {
            parse_limit("limit_orders", self.limit_orders.as_ref(), &mut errors)
        } else {
            0
        };

        let mut processor_ids = PlanProcessorIds::default();
        if let Some(subscribe) = self.subscribe.as_ref() {
            for (key, value) in subscribe {
                let value = strip_tags(value).trim().to_string();
                let value = (!value.is_empty()).then_some(value);
                match key.as_str() {
                    "stripe_id" => processor_ids.stripe_id = value,
                    "epayco_id" => {
                        if value.as_ref().is_some_and(|v| v.chars().count() > EPAYCO_ID_MAX_LEN) {
                            errors.insert(
                                "subscribe.epayco_id".to_string(),
                                format!(
                                    "The epayco id may not be greater than {EPAYCO_ID_MAX_LEN} characters."
                                ),
                            );
                        }
                        processor_ids.epayco_id = value;
                    }
                    other => {
                        errors.insert(
                            format!("subscribe.{other}"),
                            "Unknown subscription processor field.".to_string(),
                        );
                    }
                }
            }
        }

        let plugins = self
            .plugins
            .as_ref()
            .map(|selected| {
                selected
                    .iter()
                    .map(|alias| alias.trim().to_string())
                    .filter(|alias| !alias.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|selected| !selected.is_empty());

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidatedPlan {
            name: name.unwrap_or_default(),
            price_minor: price_minor.unwrap_or_default(),
            description: description.unwrap_or_default(),
            features: features.unwrap_or_default(),
            limit_items,
            limit_views,
            limit_orders,
            period: BillingPeriod::from_input(self.period.as_deref()),
            processor_ids,
            plugins,
        })
    }

    pub fn ordering_enabled(&self) -> bool {
        self.ordering.as_deref() == Some("enabled")
    }
}

fn required_text(value: Option<&str>) -> Option<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
}

fn parse_price_minor(raw: &Value) -> Option<i32> {
    let amount = match raw {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => strip_tags(text).trim().parse::<f64>().ok()?,
        _ => return None,
    };

    if !amount.is_finite() || amount < 0.0 {
        return None;
    }

    let minor = (amount * 100.0).round();
    if minor > f64::from(i32::MAX) {
        return None;
    }

    Some(minor as i32)
}

fn parse_integer(raw: &Value) -> Option<i32> {
    match raw {
        Value::Number(number) => number.as_i64().and_then(|v| i32::try_from(v).ok()),
        Value::String(text) => {
            let text = strip_tags(text);
            let text = text.trim();
            if text.is_empty() {
                Some(0)
            } else {
                text.parse().ok()
            }
        }
        Value::Null => Some(0),
        _ => None,
    }
}

fn parse_limit(field: &str, raw: Option<&Value>, errors: &mut ValidationErrors) -> i32 {
    let Some(raw) = raw else {
        return 0;
    };

    match parse_integer(raw) {
        Some(value) if value >= 0 => value,
        _ => {
            errors.insert(
                field.to_string(),
                format!("The {} must be a non-negative integer.", field.replace('_', " ")),
            );
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanDto {
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
    pub stripe_id: Option<String>,
    pub epayco_id: Option<String>,
    pub plugins: Option<Vec<String>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
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
            period: value.period,
            stripe_id: value.processor_ids.stripe_id,
            epayco_id: value.processor_ids.epayco_id,
            plugins: value.plugins,
            deleted_at: value.deleted_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanPageDto {
    pub data: Vec<PlanDto>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl PlanPageDto {
    pub fn new(data: Vec<PlanDto>, page: i64, per_page: i64, total: i64) -> Self {
        let last_page = ((total + per_page - 1) / per_page).max(1);
        Self {
            data,
            page,
            per_page,
            total,
            last_page,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PlanSavedDto {
    pub plan_id: Uuid,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct PlanFormDto {
    pub plugins: Vec<PluginOption>,
    pub subscription_processor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanDto>,
}
