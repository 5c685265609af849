use serde::Deserialize;
use std::env;

use gala_core::WorkflowError;
use gala_workflow::cancellation::{RefundSchedule, RefundTier};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// Untouched requests expire this many days after creation.
    #[serde(default = "default_request_expiry_days")]
    pub request_expiry_days: i64,
    /// Quote validity when the vendor does not pick one.
    #[serde(default = "default_quote_validity_days")]
    pub quote_validity_days: i64,
    /// Interval of the request-expiry sweep.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,
    /// Refund tiers applied to new bookings; whole percentages.
    #[serde(default)]
    pub refund_tiers: Vec<RefundTierRule>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefundTierRule {
    pub min_lead_days: i64,
    pub refund_percentage: u32,
}

fn default_request_expiry_days() -> i64 {
    30
}

fn default_quote_validity_days() -> i64 {
    14
}

fn default_sweep_interval_seconds() -> u64 {
    300
}

impl BusinessRules {
    /// The configured tier table, or the platform default when none given.
    pub fn refund_schedule(&self) -> Result<RefundSchedule, WorkflowError> {
        if self.refund_tiers.is_empty() {
            return Ok(RefundSchedule::default());
        }
        RefundSchedule::new(
            self.refund_tiers
                .iter()
                .map(|rule| RefundTier {
                    min_lead_days: rule.min_lead_days,
                    refund_percentage: rule.refund_percentage.into(),
                })
                .collect(),
        )
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // Eg. `GALA__SERVER__PORT=8080` overrides server.port
            .add_source(config::Environment::with_prefix("GALA").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
