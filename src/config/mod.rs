use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_JWT_SECRET: &str = "transportpro-secret-key-2024";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub payments: PaymentsConfig,
    pub subscriptions: SubscriptionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "8001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = LogFormat::from_str(
            &env::var("APP_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string()),
        )?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment.is_production() => return Err(ConfigError::MissingJwtSecret),
            _ => DEFAULT_JWT_SECRET.to_string(),
        };
        let token_ttl_hours = env::var("JWT_EXPIRATION_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()
            .ok()
            .filter(|hours| *hours > 0)
            .ok_or(ConfigError::InvalidTokenLifetime)?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let backend_url =
            env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:8001".to_string());
        let merchant_id = env::var("FONDY_MERCHANT_ID")
            .unwrap_or_else(|_| "1396424".to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidMerchantId)?;

        let payments = PaymentsConfig {
            merchant_id,
            merchant_password: env::var("FONDY_MERCHANT_PASSWORD")
                .unwrap_or_else(|_| "test".to_string()),
            api_url: env::var("FONDY_API_URL")
                .unwrap_or_else(|_| "https://pay.fondy.eu/api".to_string()),
            currency: "UAH".to_string(),
            response_url: format!("{}/payment/success", frontend_url.trim_end_matches('/')),
            callback_url: format!("{}/api/payments/webhook", backend_url.trim_end_matches('/')),
        };

        let demo_activation = match env::var("DEMO_ACTIVATION") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag("DEMO_ACTIVATION"))?,
            Err(_) => !environment.is_production(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours,
            },
            payments,
            subscriptions: SubscriptionConfig {
                demo_activation,
                ..SubscriptionConfig::default()
            },
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Output shape for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat(value.to_string())),
        }
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Bearer token signing settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .finish()
    }
}

/// Checkout gateway credentials and redirect targets.
#[derive(Clone)]
pub struct PaymentsConfig {
    pub merchant_id: u64,
    pub merchant_password: String,
    pub api_url: String,
    pub currency: String,
    pub response_url: String,
    pub callback_url: String,
}

impl fmt::Debug for PaymentsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentsConfig")
            .field("merchant_id", &self.merchant_id)
            .field("merchant_password", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("currency", &self.currency)
            .field("response_url", &self.response_url)
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

/// Subscription window rules.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub demo_activation: bool,
    pub demo_period_days: i64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            demo_activation: true,
            demo_period_days: 30,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    MissingJwtSecret,
    InvalidTokenLifetime,
    InvalidMerchantId,
    InvalidFlag(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'json' (got '{value}')")
            }
            ConfigError::MissingJwtSecret => {
                write!(f, "JWT_SECRET must be set when APP_ENV=production")
            }
            ConfigError::InvalidTokenLifetime => {
                write!(f, "JWT_EXPIRATION_HOURS must be a positive integer")
            }
            ConfigError::InvalidMerchantId => write!(f, "FONDY_MERCHANT_ID must be numeric"),
            ConfigError::InvalidFlag(name) => write!(f, "{name} must be true or false"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_LOG_FORMAT",
            "JWT_SECRET",
            "JWT_EXPIRATION_HOURS",
            "FONDY_MERCHANT_ID",
            "FRONTEND_URL",
            "BACKEND_URL",
            "DEMO_ACTIVATION",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert_eq!(config.payments.merchant_id, 1396424);
        assert_eq!(
            config.payments.callback_url,
            "http://localhost:8001/api/payments/webhook"
        );
        assert!(config.subscriptions.demo_activation);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 8001));
    }

    #[test]
    fn production_requires_jwt_secret_and_disables_demo() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "production");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::MissingJwtSecret)
        ));

        env::set_var("JWT_SECRET", "prod-secret");
        let config = AppConfig::load().expect("config loads");
        assert!(!config.subscriptions.demo_activation);
        reset_env();
    }

    #[test]
    fn rejects_unknown_log_format() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_LOG_FORMAT", "xml");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidLogFormat(_))
        ));
        reset_env();
    }
}
