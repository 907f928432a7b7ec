pub mod current_plan;
pub mod plan_catalog;
pub mod subscriptions;
