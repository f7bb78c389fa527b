use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub auth: AuthConfig,
    pub directory: DirectoryConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub letter: LetterConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let email_domain =
            env::var("APP_EMAIL_DOMAIN").unwrap_or_else(|_| DEFAULT_EMAIL_DOMAIN.to_string());
        let bcrypt_cost = parse_number("APP_BCRYPT_COST", DEFAULT_BCRYPT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidNumber {
                key: "APP_BCRYPT_COST",
            });
        }

        let max_leave_days = parse_number("APP_MAX_LEAVE_DAYS", DEFAULT_MAX_LEAVE_DAYS)?;
        if max_leave_days == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "APP_MAX_LEAVE_DAYS",
            });
        }

        let poll_secs = parse_number("APP_SYNC_POLL_SECS", 5u64)?;
        let timeout_ms = parse_number("LETTER_TIMEOUT_MS", 8_000u64)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth: AuthConfig {
                email_domain,
                bcrypt_cost,
                max_leave_days,
            },
            directory: DirectoryConfig {
                staff_csv: optional_path("APP_DIRECTORY_STAFF_CSV"),
                departments_csv: optional_path("APP_DIRECTORY_DEPARTMENTS_CSV"),
            },
            storage: StorageConfig {
                snapshot_path: optional_path("APP_SNAPSHOT_PATH"),
            },
            sync: SyncConfig {
                poll_interval: Duration::from_secs(poll_secs.max(1)),
            },
            letter: LetterConfig {
                api_key: optional_value("LETTER_API_KEY"),
                endpoint: env::var("LETTER_API_URL")
                    .unwrap_or_else(|_| DEFAULT_LETTER_ENDPOINT.to_string()),
                model: env::var("LETTER_MODEL")
                    .unwrap_or_else(|_| DEFAULT_LETTER_MODEL.to_string()),
                timeout: Duration::from_millis(timeout_ms),
            },
        })
    }
}

const DEFAULT_EMAIL_DOMAIN: &str = "sankara.ac.in";
const DEFAULT_BCRYPT_COST: u32 = 12;
const DEFAULT_MAX_LEAVE_DAYS: u32 = 60;
const DEFAULT_LETTER_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_LETTER_MODEL: &str = "gemini-2.0-flash";

fn parse_number<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn optional_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn optional_path(key: &str) -> Option<PathBuf> {
    optional_value(key).map(PathBuf::from)
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Registration and login policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Institutional e-mail domain, without the leading `@`.
    pub email_domain: String,
    pub bcrypt_cost: u32,
    /// Longest leave, in calendar days including both ends, a form may ask for.
    pub max_leave_days: u32,
}

impl AuthConfig {
    pub fn accepts_email(&self, email: &str) -> bool {
        let domain = self.email_domain.trim().trim_start_matches('@');
        let email = email.trim().to_ascii_lowercase();
        email.ends_with(&format!("@{}", domain.to_ascii_lowercase()))
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            max_leave_days: DEFAULT_MAX_LEAVE_DAYS,
        }
    }
}

/// Optional CSV overrides for the bundled staff directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    pub staff_csv: Option<PathBuf>,
    pub departments_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
}

/// External letter generation settings. Without an API key the composer only
/// uses its template.
#[derive(Debug, Clone)]
pub struct LetterConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LetterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_LETTER_ENDPOINT.to_string(),
            model: DEFAULT_LETTER_MODEL.to_string(),
            timeout: Duration::from_millis(8_000),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a valid number in the supported range")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
