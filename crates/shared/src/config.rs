//! Application configuration management.
//!
//! Sources are layered in order: `config/default.toml`, `config/{RUN_MODE}.toml`,
//! then `REFERRA__SECTION__KEY` environment variables.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Commission program policy.
    #[serde(default)]
    pub commission: CommissionConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT validation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key shared with the token issuer.
    pub secret: String,
    /// Access token expiration in seconds (used when minting tokens for tooling).
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Commission program policy knobs.
///
/// These are program-wide; they are not varied per tier or per region.
#[derive(Debug, Clone, Deserialize)]
pub struct CommissionConfig {
    /// Days between a sale closing and its commission becoming approved.
    #[serde(default = "default_hold_period_days")]
    pub hold_period_days: u32,
    /// Minimum approved balance for a partner to be included in a payout batch.
    #[serde(default = "default_payout_threshold")]
    pub payout_threshold: Decimal,
    /// Fixed academy completion bonus.
    #[serde(default = "default_academy_bonus")]
    pub academy_bonus_amount: Decimal,
    /// Cumulative referred revenue that promotes a partner to the agency tier.
    #[serde(default = "default_agency_threshold")]
    pub agency_revenue_threshold: Decimal,
    /// Cumulative referred revenue that promotes a partner to the enterprise tier.
    #[serde(default = "default_enterprise_threshold")]
    pub enterprise_revenue_threshold: Decimal,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            hold_period_days: default_hold_period_days(),
            payout_threshold: default_payout_threshold(),
            academy_bonus_amount: default_academy_bonus(),
            agency_revenue_threshold: default_agency_threshold(),
            enterprise_revenue_threshold: default_enterprise_threshold(),
        }
    }
}

fn default_hold_period_days() -> u32 {
    14
}

fn default_payout_threshold() -> Decimal {
    Decimal::new(5000, 2)
}

fn default_academy_bonus() -> Decimal {
    Decimal::new(10000, 2)
}

fn default_agency_threshold() -> Decimal {
    Decimal::new(10_000, 0)
}

fn default_enterprise_threshold() -> Decimal {
    Decimal::new(50_000, 0)
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("REFERRA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
