pub mod current_plan;
pub mod plans;
pub mod subscriptions;
