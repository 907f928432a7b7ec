pub mod billing_periods;
pub mod processor_kinds;
pub mod roles;
pub mod subscription_statuses;
