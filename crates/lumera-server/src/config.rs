use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lumera_booking::client::BookingConfig;
use lumera_cms::config::CmsConfig;
use lumera_core::transport::RetryPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cms: CmsSettings,
    #[serde(default)]
    pub booking: BookingSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }

        require_url("cms.base_url", &self.cms.base_url)?;
        require_non_empty("cms.app_name", &self.cms.app_name)?;
        require_non_empty("cms.client_id", &self.cms.client_id)?;
        require_non_empty("cms.client_secret", &self.cms.client_secret)?;
        require_non_empty("cms.location_schema", &self.cms.location_schema)?;
        require_non_empty("cms.blog_schema", &self.cms.blog_schema)?;
        if self.cms.full_page_size == 0 {
            return Err("cms.full_page_size must be > 0".into());
        }
        if self.cms.chunk_size == 0 {
            return Err("cms.chunk_size must be > 0".into());
        }
        if self.cms.fan_out == 0 {
            return Err("cms.fan_out must be > 0".into());
        }
        if self.cms.per_try_timeout_ms == 0 {
            return Err("cms.per_try_timeout_ms must be > 0".into());
        }

        require_url("booking.base_url", &self.booking.base_url)?;
        require_non_empty("booking.public_token", &self.booking.public_token)?;
        if self.booking.per_try_timeout_ms == 0 {
            return Err("booking.per_try_timeout_ms must be > 0".into());
        }

        let level = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&level.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

fn require_non_empty(name: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{name} must not be empty"));
    }
    Ok(())
}

fn require_url(name: &str, value: &str) -> Result<(), String> {
    require_non_empty(name, value)?;
    url::Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Content-backend section of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmsSettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_location_schema")]
    pub location_schema: String,
    #[serde(default = "default_blog_schema")]
    pub blog_schema: String,
    #[serde(default = "default_hour_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_hour_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_full_page_size")]
    pub full_page_size: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_per_try_timeout_ms")]
    pub per_try_timeout_ms: u64,
}

fn default_scope() -> String {
    "squidex-api".into()
}
fn default_location_schema() -> String {
    "location".into()
}
fn default_blog_schema() -> String {
    "blog".into()
}
fn default_hour_secs() -> u64 {
    3600
}
fn default_full_page_size() -> u32 {
    200
}
fn default_chunk_size() -> usize {
    50
}
fn default_fan_out() -> usize {
    8
}
fn default_max_retries() -> u32 {
    3
}
fn default_per_try_timeout_ms() -> u64 {
    4000
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            app_name: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            scope: default_scope(),
            location_schema: default_location_schema(),
            blog_schema: default_blog_schema(),
            token_ttl_secs: default_hour_secs(),
            cache_ttl_secs: default_hour_secs(),
            full_page_size: default_full_page_size(),
            chunk_size: default_chunk_size(),
            fan_out: default_fan_out(),
            max_retries: default_max_retries(),
            per_try_timeout_ms: default_per_try_timeout_ms(),
        }
    }
}

impl CmsSettings {
    pub fn to_cms_config(&self) -> CmsConfig {
        let mut config = CmsConfig::new(
            self.base_url.clone(),
            self.app_name.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
        )
        .with_scope(self.scope.clone())
        .with_schemas(self.location_schema.clone(), self.blog_schema.clone())
        .with_token_ttl(Duration::from_secs(self.token_ttl_secs))
        .with_cache_ttl(Duration::from_secs(self.cache_ttl_secs))
        .with_full_page_size(self.full_page_size)
        .with_chunk_size(self.chunk_size);
        config.fan_out = self.fan_out;
        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.max_retries)
            .with_per_try_timeout(Duration::from_millis(self.per_try_timeout_ms))
    }
}

/// Booking-backend section of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub public_token: String,
    #[serde(default = "default_franchise_identifier")]
    pub franchise_identifier: u32,
    #[serde(default = "default_franchises_cache_ttl_secs")]
    pub franchises_cache_ttl_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_per_try_timeout_ms")]
    pub per_try_timeout_ms: u64,
}

fn default_franchise_identifier() -> u32 {
    2
}
fn default_franchises_cache_ttl_secs() -> u64 {
    600
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            public_token: String::new(),
            franchise_identifier: default_franchise_identifier(),
            franchises_cache_ttl_secs: default_franchises_cache_ttl_secs(),
            max_retries: default_max_retries(),
            per_try_timeout_ms: default_per_try_timeout_ms(),
        }
    }
}

impl BookingSettings {
    pub fn to_booking_config(&self) -> BookingConfig {
        BookingConfig::new(self.base_url.clone(), self.public_token.clone())
            .with_franchise_identifier(self.franchise_identifier)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(self.max_retries)
            .with_per_try_timeout(Duration::from_millis(self.per_try_timeout_ms))
    }

    pub fn franchises_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.franchises_cache_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads configuration from an optional TOML file (default
    /// `lumera.toml`) with `LUMERA__`-prefixed environment overrides, e.g.
    /// `LUMERA__SERVER__PORT=9090`.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("lumera.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            return Err(format!("config file not found: {}", pathbuf.display()));
        }
        builder = builder.add_source(
            Environment::with_prefix("LUMERA")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
