//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `DUEBOOK_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `DUEBOOK_` override YAML values
//! 3. **DATABASE_URL** - Special case: switches storage to Postgres with that connection string
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `DUEBOOK_BILLING__SCHEDULER_ENABLED=false` sets the `billing.scheduler_enabled` field.
//!
//! ## Configuration Structure
//!
//! See `config.example.yaml` for a complete example. Key sections:
//!
//! - **Server**: `host`, `port` - HTTP server binding configuration
//! - **Storage**: `storage.type` - in-memory or external PostgreSQL
//! - **Admin**: `admin_email`, `admin_password` - initial operator account created on startup
//! - **Gateway**: `gateway.provider` - payment link provider (`razorpay` or `dummy`)
//! - **Billing**: `billing.scheduler_enabled`, `billing.scheduler_interval` - automatic dues generation
//! - **Security**: `secret_key`, `auth.session`, `auth.password`, `cors`

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "DUEBOOK_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines to catch config errors before deployment.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Email address for the initial admin operator (created on first startup)
    pub admin_email: String,
    /// Password for the initial admin operator. When unset, no account is
    /// created and an existing one is left alone.
    pub admin_password: Option<String>,
    /// Secret key for session token signing. When unset, an ephemeral key is
    /// generated at startup and sessions do not survive restarts.
    pub secret_key: Option<String>,
    /// Shortcut: a plain connection string. Overrides `storage` with an
    /// external Postgres configuration. Populated by `DATABASE_URL`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    /// Ledger storage backend
    pub storage: StorageConfig,
    /// Payment link provider
    pub gateway: GatewayConfig,
    /// Dues generation settings
    pub billing: BillingConfig,
    /// Session and password settings
    pub auth: AuthConfig,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            admin_email: "admin@localhost".to_string(),
            admin_password: None,
            secret_key: None,
            database_url: None,
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
            billing: BillingConfig::default(),
            auth: AuthConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

/// Ledger storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Everything in process memory; lost on restart
    Memory,
    /// External PostgreSQL
    Postgres {
        url: String,
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Memory
    }
}

fn default_max_connections() -> u32 {
    10
}

/// Payment link provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum GatewayConfig {
    /// Razorpay payment links
    Razorpay(RazorpayConfig),
    /// Fabricated links for development and tests; never charges anyone
    Dummy(DummyConfig),
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig::Dummy(DummyConfig::default())
    }
}

/// Razorpay API credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RazorpayConfig {
    /// API key id (`rzp_test_...` or `rzp_live_...`)
    pub key_id: String,
    /// API key secret
    pub key_secret: String,
    /// Shared secret the provider signs webhook deliveries with
    pub webhook_secret: String,
    /// API base URL, overridable for testing. Keep the trailing slash.
    #[serde(default = "default_razorpay_api_base")]
    pub api_base: Url,
}

fn default_razorpay_api_base() -> Url {
    // Static string, parse cannot fail.
    Url::parse("https://api.razorpay.com/v1/").unwrap()
}

/// Dummy gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DummyConfig {
    /// Webhook secret so signed test deliveries can still be verified
    pub webhook_secret: String,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            webhook_secret: "dummy-webhook-secret".to_string(),
        }
    }
}

/// Automatic dues generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct BillingConfig {
    /// Run the billing generator periodically in the background
    pub scheduler_enabled: bool,
    /// How often the scheduler re-runs the generator. Generation is
    /// idempotent per period, so a daily cadence just picks up new months
    /// and newly enrolled members promptly.
    #[serde(with = "humantime_serde")]
    pub scheduler_interval: Duration,
    /// Fee shown on read-only views when no settings row exists yet.
    /// Money-moving operations never fall back to this.
    pub default_display_fee: Decimal,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            scheduler_enabled: true,
            scheduler_interval: Duration::from_secs(60 * 60 * 24),
            default_display_fee: Decimal::from(500),
        }
    }
}

/// Session and password configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Session cookie configuration
    pub session: SessionConfig,
    /// Password validation rules
    pub password: PasswordConfig,
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Session timeout duration
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Cookie name for session token
    pub cookie_name: String,
    /// Set Secure flag on cookies (HTTPS only)
    pub cookie_secure: bool,
    /// SameSite cookie attribute ("strict", "lax", or "none")
    pub cookie_same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60 * 60 * 24),
            cookie_name: "duebook_session".to_string(),
            cookie_secure: true,
            cookie_same_site: "strict".to_string(),
        }
    }
}

/// Password validation rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PasswordConfig {
    /// Minimum password length
    pub min_length: usize,
    /// Maximum password length
    pub max_length: usize,
    /// Argon2 memory cost in KiB (default: 19456 KiB = 19 MB, secure for production)
    pub argon2_memory_kib: u32,
    /// Argon2 iterations (default: 2, secure for production)
    pub argon2_iterations: u32,
    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
            argon2_memory_kib: 19456,
            argon2_iterations: 2,
            argon2_parallelism: 1,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            // Development frontend
            allowed_origins: vec![CorsOrigin::Url(
                Url::parse("http://localhost:5173").unwrap(),
            )],
            allow_credentials: true,
            max_age: None,
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://dues.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        // DATABASE_URL trumps whatever the storage section says, preserving
        // an explicitly configured pool size.
        if let Some(url) = config.database_url.take() {
            let max_connections = match &config.storage {
                StorageConfig::Postgres { max_connections, .. } => *max_connections,
                StorageConfig::Memory => default_max_connections(),
            };
            config.storage = StorageConfig::Postgres {
                url,
                max_connections,
            };
        }

        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("DUEBOOK_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.auth.password.min_length > self.auth.password.max_length {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: Invalid password configuration: min_length ({}) cannot be greater than max_length ({})",
                    self.auth.password.min_length, self.auth.password.max_length
                ),
            });
        }

        if self.auth.password.min_length < 1 {
            return Err(Error::Internal {
                operation: "Config validation: Invalid password configuration: min_length must be at least 1"
                    .to_string(),
            });
        }

        if self.auth.session.timeout.as_secs() < 300 {
            // Less than 5 minutes
            return Err(Error::Internal {
                operation: "Config validation: Session timeout is too short (minimum 5 minutes)".to_string(),
            });
        }

        if self.auth.session.timeout.as_secs() > 86400 * 30 {
            // More than 30 days
            return Err(Error::Internal {
                operation: "Config validation: Session timeout is too long (maximum 30 days)".to_string(),
            });
        }

        if self.billing.scheduler_interval.as_secs() < 60 {
            return Err(Error::Internal {
                operation: "Config validation: Billing scheduler interval is too short (minimum 1 minute)"
                    .to_string(),
            });
        }

        if let GatewayConfig::Razorpay(razorpay) = &self.gateway {
            if razorpay.key_id.is_empty()
                || razorpay.key_secret.is_empty()
                || razorpay.webhook_secret.is_empty()
            {
                return Err(Error::Internal {
                    operation:
                        "Config validation: Razorpay gateway requires key_id, key_secret, and webhook_secret"
                            .to_string(),
                });
            }
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin."
                    .to_string(),
            });
        }

        // Validate that wildcard is not used with credentials
        let has_wildcard = self
            .cors
            .allowed_origins
            .iter()
            .any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }
}
