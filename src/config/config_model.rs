use uuid::Uuid;

use crate::domain::value_objects::enums::processor_kinds::ProcessorKind;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub auth: Auth,
    pub application: Application,
    pub stripe: Option<Stripe>,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

/// Plan-management settings of the hosting application.
#[derive(Debug, Clone)]
pub struct Application {
    pub app_url: String,
    pub subscription_processor: ProcessorKind,
    pub free_plan_id: Uuid,
    pub force_user_to_pay: bool,
    pub is_demo: bool,
    pub plans_extended: bool,
    pub available_plugins: Vec<PluginOption>,
}

impl Application {
    /// Provider calls are skipped on demo installs and local development hosts.
    pub fn provider_calls_enabled(&self) -> bool {
        !self.is_demo && self.app_url != LOCALHOST_URL
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/api/v1/plans/cancel", self.app_url.trim_end_matches('/'))
    }
}

pub const LOCALHOST_URL: &str = "http://localhost";

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PluginOption {
    pub alias: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
}
