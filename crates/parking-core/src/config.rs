//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use crate::error::AppError;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    30
}

/// Authentication configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret
    pub jwt_secret: String,

    /// JWT token expiration in minutes
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_minutes: i64,
}

fn default_jwt_expiration() -> i64 {
    120
}

/// Fare computation settings
#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    /// Length of one billing unit. Elapsed time is rounded up to whole units.
    #[serde(default = "default_billing_unit")]
    pub billing_unit_minutes: i64,

    /// Floor on the number of billed units, applied after rounding
    #[serde(default)]
    pub minimum_billable_units: i64,

    /// ISO 4217 currency of all amounts
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_billing_unit() -> i64 {
    60
}

fn default_currency() -> String {
    "EUR".to_string()
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            billing_unit_minutes: default_billing_unit(),
            minimum_billable_units: 0,
            currency: default_currency(),
        }
    }
}

/// Allocation and accounting policies
#[derive(Debug, Deserialize, Clone)]
pub struct PolicyConfig {
    /// Reject an entry while the client already has an open ticket
    #[serde(default = "default_true")]
    pub single_open_ticket_per_client: bool,

    /// PMR clients fall back to a standard place when no PMR place is free
    #[serde(default)]
    pub pmr_may_use_standard: bool,

    /// Standard clients fall back to a PMR place when no standard place is free
    #[serde(default)]
    pub standard_may_use_pmr: bool,

    /// Attempts made by an entry when concurrent allocations collide
    #[serde(default = "default_allocation_retries")]
    pub allocation_retries: u32,

    /// IANA time zone defining the calendar day for revenue and date filters
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_true() -> bool {
    true
}

fn default_allocation_retries() -> u32 {
    3
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            single_open_ticket_per_client: true,
            pmr_may_use_standard: false,
            standard_may_use_pmr: false,
            allocation_retries: default_allocation_retries(),
            timezone: default_timezone(),
        }
    }
}

impl PolicyConfig {
    /// Parse the configured time zone
    pub fn tz(&self) -> Result<Tz, AppError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::Config(format!("invalid timezone {}: {}", self.timezone, e)))
    }
}

/// Initial inventory, applied only to an empty database
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InventoryConfig {
    /// Number of standard places to create
    #[serde(default)]
    pub standard_places: u32,

    /// Number of PMR places to create
    #[serde(default)]
    pub pmr_places: u32,

    /// Initial subscriber hourly rate
    pub subscriber_rate: Option<Decimal>,

    /// Initial non-subscriber hourly rate
    pub non_subscriber_rate: Option<Decimal>,
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("database.max_connections", 10)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("auth.jwt_expiration_minutes", 120)?
            .set_default("billing.billing_unit_minutes", 60)?
            .set_default("billing.minimum_billable_units", 0)?
            .set_default("policy.single_open_ticket_per_client", true)?
            .set_default("policy.allocation_retries", 3)?
            .set_default("policy.timezone", "UTC")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with PARKING_ prefix
            .add_source(
                Environment::with_prefix("PARKING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("PARKING").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_billing_config() {
        let config = BillingConfig::default();
        assert_eq!(config.billing_unit_minutes, 60);
        assert_eq!(config.minimum_billable_units, 0);
    }

    #[test]
    fn test_default_policy() {
        let policy = PolicyConfig::default();
        assert!(policy.single_open_ticket_per_client);
        assert!(!policy.pmr_may_use_standard);
        assert_eq!(policy.tz().unwrap(), chrono_tz::UTC);
    }

    #[test]
    fn test_invalid_timezone() {
        let policy = PolicyConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(matches!(policy.tz(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_deserialize_from_sources() {
        let config = Config::builder()
            .set_override("server.port", 9000)
            .unwrap()
            .set_override("database.url", "postgresql://localhost/parking")
            .unwrap()
            .set_override("auth.jwt_secret", "secret")
            .unwrap()
            .set_override("billing.billing_unit_minutes", 15)
            .unwrap()
            .set_override("policy.timezone", "Europe/Paris")
            .unwrap()
            .build()
            .unwrap();

        let app: AppConfig = config.try_deserialize().unwrap();
        assert_eq!(app.server.port, 9000);
        assert_eq!(app.billing.billing_unit_minutes, 15);
        assert_eq!(app.policy.tz().unwrap(), chrono_tz::Europe::Paris);
        assert_eq!(app.auth.jwt_expiration_minutes, 120);
    }
}
