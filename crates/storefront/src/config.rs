//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `IDENTITY_BASE_URL` - Identity provider endpoint
//! - `IDENTITY_API_KEY` - Identity provider API key
//! - `SHIPPING_BASE_URL` - Rate provider endpoint
//! - `SHIPPING_CLIENT_ID` - Rate provider client id
//! - `SHIPPING_CLIENT_SECRET` - Rate provider client secret
//! - `SHIPPING_ORIGIN_ZIP` / `_CITY` / `_STATE` / `_COUNTRY` - Warehouse origin
//! - `PAYMENTS_BASE_URL` - Payment provider endpoint
//! - `PAYMENTS_ACCESS_TOKEN` - Payment provider access token
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: http://localhost:3000)
//! - `FREE_SHIPPING_THRESHOLD` - Subtotal at which shipping is free (default: 999)
//! - `TAX_RATE` - Fractional tax rate applied at checkout (default: 0)
//! - `GUEST_STORE_PATH` - Guest cart file (default: guest-store.json)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use crate::shipping::Waypoint;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Identity provider configuration
    pub identity: IdentityConfig,
    /// Shipping-rate provider configuration
    pub shipping: ShippingConfig,
    /// Payment provider configuration
    pub payments: PaymentsConfig,
    /// Fractional tax rate applied to the subtotal at checkout
    pub tax_rate: Decimal,
    /// Guest cart/favorites file path
    pub guest_store_path: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Identity provider configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: SecretString,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Shipping-rate provider configuration.
#[derive(Clone)]
pub struct ShippingConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Warehouse the parcels ship from.
    pub origin: Waypoint,
    /// Cart subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
}

impl std::fmt::Debug for ShippingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippingConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("origin", &self.origin)
            .field("free_shipping_threshold", &self.free_shipping_threshold)
            .finish()
    }
}

/// Payment provider configuration.
#[derive(Clone)]
pub struct PaymentsConfig {
    pub base_url: String,
    pub access_token: SecretString,
}

impl std::fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_owned(), e.to_string()))?;
        let base_url = get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:3000");

        let tax_rate = parse_decimal("TAX_RATE", "0")?;
        let guest_store_path = PathBuf::from(get_env_or_default(
            "GUEST_STORE_PATH",
            "guest-store.json",
        ));
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            host,
            port,
            base_url,
            identity: IdentityConfig::from_env()?,
            shipping: ShippingConfig::from_env()?,
            payments: PaymentsConfig::from_env()?,
            tax_rate,
            guest_store_path,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether the public URL is served over HTTPS (controls cookie flags).
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_required_env("IDENTITY_BASE_URL")?,
            api_key: get_validated_secret("IDENTITY_API_KEY")?,
        })
    }
}

impl ShippingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_required_env("SHIPPING_BASE_URL")?,
            client_id: get_required_env("SHIPPING_CLIENT_ID")?,
            client_secret: get_validated_secret("SHIPPING_CLIENT_SECRET")?,
            origin: Waypoint {
                zipcode: get_required_env("SHIPPING_ORIGIN_ZIP")?,
                city: get_required_env("SHIPPING_ORIGIN_CITY")?,
                state: get_required_env("SHIPPING_ORIGIN_STATE")?,
                country: get_env_or_default("SHIPPING_ORIGIN_COUNTRY", "MX"),
            },
            free_shipping_threshold: parse_decimal("FREE_SHIPPING_THRESHOLD", "999")?,
        })
    }
}

impl PaymentsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: get_required_env("PAYMENTS_BASE_URL")?,
            access_token: get_validated_secret("PAYMENTS_ACCESS_TOKEN")?,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse a decimal-valued variable with a default.
fn parse_decimal(key: &str, default: &str) -> Result<Decimal, ConfigError> {
    get_env_or_default(key, default)
        .parse::<Decimal>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_owned(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_owned(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the real provider credential."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_shannon_entropy_extremes() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!(shannon_entropy("aB3$xY9!mK2@nL5#") > 3.0);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_socket_addr_and_is_secure() {
        let config = StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "https://shop.verbena.test".to_owned(),
            identity: IdentityConfig {
                base_url: "https://id.test".to_owned(),
                api_key: SecretString::from("key"),
            },
            shipping: ShippingConfig {
                base_url: "https://rates.test".to_owned(),
                client_id: "client".to_owned(),
                client_secret: SecretString::from("secret-value"),
                origin: Waypoint {
                    zipcode: "68000".to_owned(),
                    city: "Oaxaca".to_owned(),
                    state: "OAX".to_owned(),
                    country: "MX".to_owned(),
                },
                free_shipping_threshold: dec!(999),
            },
            payments: PaymentsConfig {
                base_url: "https://pay.test".to_owned(),
                access_token: SecretString::from("token-value"),
            },
            tax_rate: Decimal::ZERO,
            guest_store_path: PathBuf::from("guest-store.json"),
            sentry_dsn: None,
        };

        assert_eq!(config.socket_addr().port(), 3000);
        assert!(config.is_secure());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PaymentsConfig {
            base_url: "https://pay.test".to_owned(),
            access_token: SecretString::from("super_secret_token"),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_token"));
    }
}
