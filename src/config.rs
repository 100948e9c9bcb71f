/// Configuration management for the auth service
use crate::error::{AuthError, AuthResult};
use jsonwebtoken::Algorithm;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(AuthError::validation(format!(
                "invalid environment: {} (must be development, staging, or production)",
                other
            ))),
        }
    }
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub max_body_bytes: usize,
    pub cors_allowed_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Token signing configuration
///
/// Access and refresh tokens are signed with different secrets.
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_expiry: Duration,
    pub refresh_expiry: Duration,
    pub issuer: String,
    pub algorithm: Algorithm,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_expiry", &self.access_expiry)
            .field("refresh_expiry", &self.refresh_expiry)
            .field("issuer", &self.issuer)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        // OWASP baseline for Argon2id
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Session bookkeeping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How often the reaper deletes expired session rows
    pub cleanup_interval: Duration,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
    pub burst_size: u32,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AuthResult<Self> {
        dotenv::dotenv().ok();

        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AuthError::validation("Invalid port number"))?;
        let environment: Environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .parse()?;
        let request_timeout = duration_var("SERVER_REQUEST_TIMEOUT", "30s")?;
        let shutdown_timeout = duration_var("SERVER_SHUTDOWN_TIMEOUT", "5s")?;
        let max_body_bytes = env::var("SERVER_MAX_BODY_BYTES")
            .unwrap_or_else(|_| "1048576".to_string())
            .parse()
            .unwrap_or(1 << 20);
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let path = env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/auth.sqlite"));
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let access_secret = env::var("JWT_ACCESS_SECRET")
            .map_err(|_| AuthError::validation("JWT_ACCESS_SECRET is required"))?;
        let refresh_secret = env::var("JWT_REFRESH_SECRET")
            .map_err(|_| AuthError::validation("JWT_REFRESH_SECRET is required"))?;
        let access_expiry = duration_var("JWT_ACCESS_EXPIRY", "15m")?;
        let refresh_expiry = duration_var("JWT_REFRESH_EXPIRY", "7d")?;
        let issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "auth-service".to_string());
        let algorithm_name = env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string());
        let algorithm = Algorithm::from_str(&algorithm_name).map_err(|_| {
            AuthError::validation(format!("invalid JWT algorithm: {}", algorithm_name))
        })?;

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env::var("PASSWORD_HASH_MEMORY_KIB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.memory_kib),
            iterations: env::var("PASSWORD_HASH_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.iterations),
            parallelism: env::var("PASSWORD_HASH_PARALLELISM")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.parallelism),
        };

        let cleanup_interval = duration_var("SESSION_CLEANUP_INTERVAL", "1h")?;

        let rate_limit_enabled = env::var("RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let default_rpm = if environment == Environment::Production {
            100
        } else {
            1000
        };
        let requests_per_minute = env::var("RATE_LIMIT_REQUESTS_PER_MINUTE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_rpm);
        let burst_size = env::var("RATE_LIMIT_BURST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(20);

        let level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "json".to_string())
            .as_str()
        {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(AuthError::validation(format!(
                    "invalid log format: {} (must be json or text)",
                    other
                )))
            }
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                host,
                port,
                environment,
                request_timeout,
                shutdown_timeout,
                max_body_bytes,
                cors_allowed_origins,
            },
            database: DatabaseConfig {
                path,
                max_connections,
            },
            jwt: JwtConfig {
                access_secret,
                refresh_secret,
                access_expiry,
                refresh_expiry,
                issuer,
                algorithm,
            },
            password,
            session: SessionConfig { cleanup_interval },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                requests_per_minute,
                burst_size,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Validate configuration
    ///
    /// Token invariants are checked here once at startup, never per call.
    pub fn validate(&self) -> AuthResult<()> {
        let jwt = &self.jwt;

        if jwt.access_secret.len() < 32 {
            return Err(AuthError::validation(
                "JWT_ACCESS_SECRET must be at least 32 characters",
            ));
        }
        if jwt.refresh_secret.len() < 32 {
            return Err(AuthError::validation(
                "JWT_REFRESH_SECRET must be at least 32 characters",
            ));
        }
        if jwt.access_secret == jwt.refresh_secret {
            return Err(AuthError::validation(
                "JWT_ACCESS_SECRET and JWT_REFRESH_SECRET must be different",
            ));
        }
        if jwt.access_expiry < Duration::from_secs(60) {
            return Err(AuthError::validation(
                "JWT_ACCESS_EXPIRY must be at least 1 minute",
            ));
        }
        if jwt.refresh_expiry < Duration::from_secs(3600) {
            return Err(AuthError::validation(
                "JWT_REFRESH_EXPIRY must be at least 1 hour",
            ));
        }
        if jwt.access_expiry >= jwt.refresh_expiry {
            return Err(AuthError::validation(
                "JWT_REFRESH_EXPIRY must be longer than JWT_ACCESS_EXPIRY",
            ));
        }
        if jwt.issuer.is_empty() {
            return Err(AuthError::validation("JWT_ISSUER is required"));
        }
        if !matches!(
            jwt.algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            return Err(AuthError::validation(format!(
                "invalid JWT algorithm: {:?} (must be HS256, HS384, or HS512)",
                jwt.algorithm
            )));
        }

        if self.service.host.is_empty() {
            return Err(AuthError::validation("SERVER_HOST is required"));
        }
        if self.service.port == 0 {
            return Err(AuthError::validation("SERVER_PORT must be between 1-65535"));
        }
        if self.service.request_timeout < Duration::from_secs(1) {
            return Err(AuthError::validation(
                "SERVER_REQUEST_TIMEOUT must be at least 1 second",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(AuthError::validation(
                "DATABASE_MAX_CONNECTIONS must be at least 1",
            ));
        }
        if self.session.cleanup_interval < Duration::from_secs(1) {
            return Err(AuthError::validation(
                "SESSION_CLEANUP_INTERVAL must be at least 1 second",
            ));
        }
        if self.rate_limit.enabled && self.rate_limit.requests_per_minute == 0 {
            return Err(AuthError::validation(
                "RATE_LIMIT_REQUESTS_PER_MINUTE must be positive",
            ));
        }

        if !matches!(self.logging.level.as_str(), "debug" | "info" | "warn" | "error") {
            return Err(AuthError::validation(format!(
                "invalid log level: {} (must be debug, info, warn, or error)",
                self.logging.level
            )));
        }

        // Argon2 rejects out-of-range costs; fail at startup rather than on first login
        argon2::Params::new(
            self.password.memory_kib,
            self.password.iterations,
            self.password.parallelism,
            None,
        )
        .map_err(|e| AuthError::validation(format!("invalid password hash parameters: {}", e)))?;

        if self.is_production() && jwt.access_expiry > Duration::from_secs(3600) {
            return Err(AuthError::validation(
                "in production, JWT_ACCESS_EXPIRY must not exceed 1 hour",
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.service.environment == Environment::Production
    }

    /// Socket address string the server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.port)
    }
}

/// Read a duration variable, falling back to `default` when unset
fn duration_var(key: &str, default: &str) -> AuthResult<Duration> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_duration(&raw)
        .ok_or_else(|| AuthError::validation(format!("{} is not a valid duration: {}", key, raw)))
}

/// Parse `90`, `90s`, `15m`, `12h` or `7d`
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (digits, multiplier) = match raw.chars().last()? {
        's' => (&raw[..raw.len() - 1], 1),
        'm' => (&raw[..raw.len() - 1], 60),
        'h' => (&raw[..raw.len() - 1], 3600),
        'd' => (&raw[..raw.len() - 1], 86400),
        c if c.is_ascii_digit() => (raw, 1),
        _ => return None,
    };

    let value: u64 = digits.parse().ok()?;
    value.checked_mul(multiplier).map(Duration::from_secs)
}

#[cfg(test)]
impl ServerConfig {
    /// Minimal configuration for tests: cheap hashing, in-memory friendly
    pub fn for_testing() -> Self {
        ServerConfig {
            service: ServiceConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                environment: Environment::Development,
                request_timeout: Duration::from_secs(30),
                shutdown_timeout: Duration::from_secs(5),
                max_body_bytes: 1 << 20,
                cors_allowed_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            jwt: JwtConfig {
                access_secret: "test-access-secret-key-for-testing-only".to_string(),
                refresh_secret: "test-refresh-secret-key-for-testing-only".to_string(),
                access_expiry: Duration::from_secs(15 * 60),
                refresh_expiry: Duration::from_secs(7 * 86400),
                issuer: "auth-service".to_string(),
                algorithm: Algorithm::HS256,
            },
            password: PasswordConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
            session: SessionConfig {
                cleanup_interval: Duration::from_secs(3600),
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                requests_per_minute: 1000,
                burst_size: 20,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Text,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("15m"), Some(Duration::from_secs(900)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("7d"), Some(Duration::from_secs(604800)));
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("5w"), None);
    }

    #[test]
    fn test_testing_config_is_valid() {
        assert!(ServerConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = ServerConfig::for_testing();
        config.jwt.access_secret = "too-short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identical_secrets_rejected() {
        let mut config = ServerConfig::for_testing();
        config.jwt.refresh_secret = config.jwt.access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_must_outlive_access() {
        let mut config = ServerConfig::for_testing();
        config.jwt.access_expiry = Duration::from_secs(2 * 3600);
        config.jwt.refresh_expiry = Duration::from_secs(3600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_asymmetric_algorithm_rejected() {
        let mut config = ServerConfig::for_testing();
        config.jwt.algorithm = Algorithm::RS256;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_production_caps_access_expiry() {
        let mut config = ServerConfig::for_testing();
        config.service.environment = Environment::Production;
        config.jwt.access_expiry = Duration::from_secs(2 * 3600);
        config.jwt.refresh_expiry = Duration::from_secs(86400);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = ServerConfig::for_testing();
        let rendered = format!("{:?}", config.jwt);
        assert!(!rendered.contains(&config.jwt.access_secret));
        assert!(!rendered.contains(&config.jwt.refresh_secret));
    }
}
