use anyhow::{Context, Result};
use uuid::Uuid;

use super::config_model::{
    Application, Auth, Database, DotEnvyConfig, LOCALHOST_URL, PluginOption, Server, Stripe,
};
use crate::domain::value_objects::enums::processor_kinds::ProcessorKind;

const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let server = Server {
        port: required("SERVER_PORT")?
            .parse()
            .context("SERVER_PORT is invalid")?,
        body_limit: required("SERVER_BODY_LIMIT")?
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: required("SERVER_TIMEOUT")?
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: required("DATABASE_URL")?,
    };

    let auth = Auth {
        jwt_secret: get_jwt_secret()?,
    };

    let subscription_processor =
        ProcessorKind::from_str(&optional("SUBSCRIPTION_PROCESSOR").unwrap_or_default());

    let free_plan_id = match optional("FREE_PLAN_ID") {
        Some(raw) => Uuid::parse_str(&raw).context("FREE_PLAN_ID is invalid")?,
        None => Uuid::nil(),
    };

    let application = Application {
        app_url: optional("APP_URL").unwrap_or_else(|| LOCALHOST_URL.to_string()),
        subscription_processor: subscription_processor.clone(),
        free_plan_id,
        force_user_to_pay: flag("FORCE_USER_TO_PAY", false)?,
        is_demo: flag("IS_DEMO", false)?,
        plans_extended: flag("PLANS_EXTENDED", true)?,
        available_plugins: parse_plugins(&optional("AVAILABLE_PLUGINS").unwrap_or_default()),
    };

    let stripe = if subscription_processor == ProcessorKind::Stripe {
        Some(Stripe {
            secret_key: required("STRIPE_SECRET_KEY")?,
            webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
            api_base: optional("STRIPE_API_BASE")
                .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
        })
    } else {
        None
    };

    Ok(DotEnvyConfig {
        server,
        database,
        auth,
        application,
        stripe,
    })
}

pub fn get_jwt_secret() -> Result<String> {
    dotenvy::dotenv().ok();

    required("JWT_SECRET")
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} is invalid"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn flag(key: &str, default: bool) -> Result<bool> {
    let Some(raw) = optional(key) else {
        return Ok(default);
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("{key} is invalid: expected a boolean, got {raw}"),
    }
}

/// Parses `alias:Display Name` pairs separated by commas. A bare alias is its own name.
pub fn parse_plugins(raw: &str) -> Vec<PluginOption> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((alias, name)) => PluginOption {
                alias: alias.trim().to_string(),
                name: name.trim().to_string(),
            },
            None => PluginOption {
                alias: entry.to_string(),
                name: entry.to_string(),
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plugin_list_with_and_without_names() {
        let plugins = parse_plugins("qr:QR Menu, delivery ,,");

        assert_eq!(
            plugins,
            vec![
                PluginOption {
                    alias: "qr".to_string(),
                    name: "QR Menu".to_string(),
                },
                PluginOption {
                    alias: "delivery".to_string(),
                    name: "delivery".to_string(),
                },
            ]
        );
    }

    #[test]
    fn empty_plugin_list_is_empty() {
        assert!(parse_plugins("").is_empty());
    }
}
