use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::str::FromStr;
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 3000;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAYMENT_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_API_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_STOREFRONT_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_CURRENCY: &str = "inr";
const DEFAULT_SHIPPING_COUNTRY: &str = "IN";

/// Which payment gateway backs checkout sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumString)]
pub enum PaymentGatewayKind {
    #[strum(serialize = "stripe")]
    Stripe,
    #[strum(serialize = "in-memory")]
    InMemory,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins (production)
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS fallback
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB pool: connect timeout (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// DB pool: acquire timeout (seconds)
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// DB pool: idle timeout (seconds)
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Payment gateway backend: "stripe" or "in-memory"
    #[serde(default = "default_payment_gateway")]
    #[validate(custom = "validate_payment_gateway")]
    pub payment_gateway: String,

    /// Gateway secret key (server side only)
    #[serde(default)]
    pub payment_secret_key: Option<String>,

    /// Publishable key handed to the browser SDK
    #[serde(default)]
    pub payment_publishable_key: Option<String>,

    /// Gateway REST base URL
    #[serde(default = "default_payment_api_base")]
    #[validate(length(min = 1))]
    pub payment_api_base: String,

    /// Base API origin advertised to the browser
    #[serde(default = "default_api_origin")]
    pub api_origin: String,

    /// Redirect origin used when a request carries no Origin header
    #[serde(default = "default_storefront_origin")]
    pub storefront_origin: String,

    /// Currency for gateway line items
    #[serde(default = "default_currency")]
    #[validate(custom = "validate_currency")]
    pub checkout_currency: String,

    /// The only country accepted by shipping address collection
    #[serde(default = "default_shipping_country")]
    #[validate(custom = "validate_country")]
    pub shipping_country: String,

    /// Domain event channel capacity
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: default_true_bool(),
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            payment_gateway: default_payment_gateway(),
            payment_secret_key: None,
            payment_publishable_key: None,
            payment_api_base: default_payment_api_base(),
            api_origin: default_api_origin(),
            storefront_origin: default_storefront_origin(),
            checkout_currency: default_currency(),
            shipping_country: default_shipping_country(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Whether we should fall back to permissive CORS
    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    /// Parsed gateway backend. Validation guarantees the string is known.
    pub fn payment_gateway_kind(&self) -> PaymentGatewayKind {
        PaymentGatewayKind::from_str(&self.payment_gateway.to_ascii_lowercase())
            .unwrap_or(PaymentGatewayKind::Stripe)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        let has_secret = self
            .payment_secret_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);
        if self.payment_gateway_kind() == PaymentGatewayKind::Stripe && !has_secret {
            let mut err = ValidationError::new("payment_secret_key_required");
            err.message = Some(
                "Set APP__PAYMENT_SECRET_KEY or switch APP__PAYMENT_GATEWAY to in-memory".into(),
            );
            errors.add("payment_secret_key", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true_bool() -> bool {
    true
}

fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_payment_gateway() -> String {
    PaymentGatewayKind::Stripe.to_string()
}

fn default_payment_api_base() -> String {
    DEFAULT_PAYMENT_API_BASE.to_string()
}

fn default_api_origin() -> String {
    DEFAULT_API_ORIGIN.to_string()
}

fn default_storefront_origin() -> String {
    DEFAULT_STOREFRONT_ORIGIN.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_shipping_country() -> String {
    DEFAULT_SHIPPING_COUNTRY.to_string()
}

fn default_event_channel_capacity() -> usize {
    256
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_payment_gateway(value: &str) -> Result<(), ValidationError> {
    match PaymentGatewayKind::from_str(&value.to_ascii_lowercase()) {
        Ok(_) => Ok(()),
        Err(_) => {
            let mut err = ValidationError::new("payment_gateway");
            err.message = Some("Must be one of: stripe, in-memory".into());
            Err(err)
        }
    }
}

fn validate_currency(code: &str) -> Result<(), ValidationError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("checkout_currency");
        err.message = Some("Must be a three-letter currency code".into());
        Err(err)
    }
}

fn validate_country(code: &str) -> Result<(), ValidationError> {
    if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("shipping_country");
        err.message = Some("Must be a two-letter country code".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(CONFIG_DIR, &run_env)
}

/// Same as [`load_config`] but reads files from an explicit directory.
pub fn load_config_from(config_dir: &str, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(config_dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", config_dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", config_dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
