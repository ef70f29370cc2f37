use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use url::Url;

const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com/v1";
const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
const DEFAULT_STORAGE_BUCKET: &str = "ASSESSMENT-FILES";

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

/// Top-level configuration for the portal.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub notion: NotionConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&optional("APP_ENV", "development"));

        let host = optional("APP_HOST", "127.0.0.1");
        let port = optional("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = optional("APP_LOG_LEVEL", "info");

        let notion = NotionConfig {
            api_url: parse_url("NOTION_API_URL", &optional("NOTION_API_URL", DEFAULT_NOTION_API_URL))?,
            api_key: required("NOTION_API_KEY")?,
            database_id: required("NOTION_DATABASE_ID")?,
            version: optional("NOTION_VERSION", DEFAULT_NOTION_VERSION),
        };

        let storage = StorageConfig {
            url: parse_url("SUPABASE_URL", &required("SUPABASE_URL")?)?,
            anon_key: required("SUPABASE_ANON_KEY")?,
            bucket: optional("SUPABASE_BUCKET", DEFAULT_STORAGE_BUCKET),
        };

        let admin = AdminConfig {
            password: required("ADMIN_PASSWORD")?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            notion,
            storage,
            admin,
        })
    }
}

/// Reads a variable, trimming stray whitespace picked up from pasted secrets.
fn read(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn optional(name: &str, default: &str) -> String {
    read(name).unwrap_or_else(|| default.to_string())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    read(name).ok_or(ConfigError::Missing(name))
}

fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|source| ConfigError::InvalidUrl { name, source })
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

/// Credentials and endpoint for the Notion database holding applicant records.
#[derive(Clone)]
pub struct NotionConfig {
    pub api_url: Url,
    pub api_key: String,
    pub database_id: String,
    pub version: String,
}

impl fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_url", &self.api_url.as_str())
            .field("database_id", &self.database_id)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Supabase Storage project and bucket receiving assessment files.
#[derive(Clone)]
pub struct StorageConfig {
    pub url: Url,
    pub anon_key: String,
    pub bucket: String,
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url.as_str())
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

/// Shared secret guarding the review endpoints.
#[derive(Clone)]
pub struct AdminConfig {
    pub password: String,
}

impl fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminConfig { .. }")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    Missing(&'static str),
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::Missing(name) => write!(f, "{name} must be set"),
            ConfigError::InvalidUrl { name, .. } => write!(f, "{name} must be an absolute URL"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::Missing(_) => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidUrl { source, .. } => Some(source),
        }
    }
}
