//! Runtime configuration, read once from the environment at startup.

use std::str::FromStr;
use std::time::Duration;

use lumen_billing::PricingSettings;
use lumen_core::retry::RetryPolicy;
use lumen_purchase::application::command_handlers::CheckoutSettings;
use lumen_quota::domain::plans::InMemoryPlanCatalog;

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Commercial parameters for overage purchases.
    pub pricing: PricingSettings,
    /// Payment window and gateway retry policy.
    pub checkout: CheckoutSettings,
    /// Period of the expiry and re-application sweep.
    pub sweep_interval: Duration,
    /// Plans offered to organizers.
    pub plans: InMemoryPlanCatalog,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
    }
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or any
    /// value fails to parse or validate.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value.
    ///
    /// # Errors
    ///
    /// See [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned());
        let port = parse_or(&lookup, "PORT", 3000_u16)?;

        let defaults = PricingSettings::default();
        let pricing = PricingSettings {
            price_per_gb: parse_or(&lookup, "PRICE_PER_GB", defaults.price_per_gb)?,
            max_installments: parse_or(&lookup, "MAX_INSTALLMENTS", defaults.max_installments)?,
            free_installments: parse_or(&lookup, "FREE_INSTALLMENTS", defaults.free_installments)?,
            monthly_interest_rate: parse_or(
                &lookup,
                "MONTHLY_INTEREST_RATE",
                defaults.monthly_interest_rate,
            )?,
        };
        pricing
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let expiry_secs = parse_or(&lookup, "PAYMENT_EXPIRY_SECS", 600_i64)?;
        if expiry_secs <= 0 {
            return Err(AppError::Config("PAYMENT_EXPIRY_SECS must be positive".into()));
        }
        let sweep_secs = parse_or(&lookup, "SWEEP_INTERVAL_SECS", 30_u64)?;
        if sweep_secs == 0 {
            return Err(AppError::Config("SWEEP_INTERVAL_SECS must be positive".into()));
        }

        let retry_defaults = RetryPolicy::default();
        let gateway_retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "GATEWAY_MAX_ATTEMPTS", retry_defaults.max_attempts)?
                .max(1),
            base_delay: Duration::from_millis(parse_or(&lookup, "GATEWAY_BASE_DELAY_MS", 200_u64)?),
            max_delay: retry_defaults.max_delay,
        };

        let plans = match lookup("PLANS_JSON") {
            Some(json) => InMemoryPlanCatalog::from_json(&json)
                .map_err(|e| AppError::Config(format!("PLANS_JSON: {e}")))?,
            None => InMemoryPlanCatalog::with_defaults(),
        };

        Ok(Self {
            database_url,
            host,
            port,
            pricing,
            checkout: CheckoutSettings {
                payment_expiry: chrono::Duration::seconds(expiry_secs),
                gateway_retry,
            },
            sweep_interval: Duration::from_secs(sweep_secs),
            plans,
        })
    }
}
