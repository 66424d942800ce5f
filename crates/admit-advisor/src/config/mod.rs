use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::admissions::ranking::RankOptions;
use crate::admissions::scoring::ScoringConfig;

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
    pub catalog: CatalogConfig,
    pub scoring: ScoringConfig,
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

        let admin_token = env::var("APP_ADMIN_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        let cache_ttl_secs = numeric_var("APP_CACHE_TTL_SECS", 3600)?;
        let rolling_limit = numeric_var("APP_ROLLING_LIMIT", 20)?;
        let sub_group_limit = numeric_var("APP_SUB_GROUP_LIMIT", 5)?;
        let sessions = session_tokens(&env::var("APP_SESSION_TOKENS").unwrap_or_default())?;

        let scoring = match env::var("APP_SCORING_CONFIG") {
            Ok(path) if !path.trim().is_empty() => ScoringConfig::from_path(path.trim())
                .map_err(|source| ConfigError::ScoringFile {
                    path: PathBuf::from(path.trim()),
                    source,
                })?,
            _ => ScoringConfig::standard(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            catalog: CatalogConfig {
                admin_token,
                cache_ttl_secs: cache_ttl_secs as i64,
                rolling_limit: rolling_limit as usize,
                sub_group_limit: sub_group_limit as usize,
                sessions,
            },
            scoring,
        })
    }
}

fn numeric_var(name: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber { name }),
        _ => Ok(default),
    }
}

/// Parses `token=user` pairs separated by commas.
fn session_tokens(raw: &str) -> Result<Vec<(String, String)>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
                Ok((token.trim().to_string(), user.trim().to_string()))
            }
            _ => Err(ConfigError::InvalidSessions),
        })
        .collect()
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

/// Catalog ingestion, caching, and result-size settings.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Shared admin capability token; uploads are refused while unset.
    pub admin_token: Option<String>,
    pub cache_ttl_secs: i64,
    pub rolling_limit: usize,
    pub sub_group_limit: usize,
    /// Pre-issued `(token, user id)` sessions accepted by the score endpoints.
    pub sessions: Vec<(String, String)>,
}

impl CatalogConfig {
    pub fn rank_options(&self) -> RankOptions {
        RankOptions {
            limit_total: self.rolling_limit,
            sub_group_limit: self.sub_group_limit,
            ..RankOptions::default()
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            admin_token: None,
            cache_ttl_secs: 3600,
            rolling_limit: 20,
            sub_group_limit: 5,
            sessions: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidNumber {
        name: &'static str,
    },
    InvalidSessions,
    ScoringFile {
        path: PathBuf,
        source: crate::admissions::scoring::ScoringConfigError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { name } => {
                write!(f, "{name} must be a non-negative integer")
            }
            ConfigError::InvalidSessions => {
                write!(f, "APP_SESSION_TOKENS must be comma-separated token=user pairs")
            }
            ConfigError::ScoringFile { path, .. } => {
                write!(f, "unable to load scoring config from {}", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidSessions => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::ScoringFile { source, .. } => Some(source),
        }
    }
}
