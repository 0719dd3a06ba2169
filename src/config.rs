//! Unified Configuration Module
//!
//! Consolidates every component's configuration into one coherent tree with
//! defaults and builder-time validation, following the teacher's
//! `CommyConfig`/`ConfigBuilder` shape (spec §6 "Environment").

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::StorageType;

/// Unified configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
    pub proxy: ProxyConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            database: DatabaseConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

/// HTTP surface configuration (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind_address: String,
    pub listen_port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            listen_port: 8080,
        }
    }
}

/// `storage.type` selection and both backend configurations (spec §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub storage_type: StorageType,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub local: LocalStorageConfig,
    pub object: ObjectStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: StorageType::Local,
            max_file_size: 100 * 1024 * 1024,
            allowed_extensions: crate::validator::ValidatorConfig::default().allowed_extensions,
            local: LocalStorageConfig::default(),
            object: ObjectStorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    pub base_path: PathBuf,
    pub auto_create: bool,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./gateway_data"),
            auto_create: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    pub endpoint: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket_prefix: String,
    pub auto_create_bucket: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_string(),
            access_key: None,
            secret_key: None,
            bucket_prefix: "family-storage".to_string(),
            auto_create_bucket: true,
        }
    }
}

/// Metadata cache TTLs, one per key family (spec §4.3/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_file: Duration,
    pub ttl_search: Duration,
    pub ttl_list: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_file: Duration::from_secs(60),
            ttl_search: Duration::from_secs(30),
            ttl_list: Duration::from_secs(30),
        }
    }
}

/// Postgres metadata store connection (spec §9 Open Question ii).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/family_storage_gateway".to_string(),
            max_connections: 10,
        }
    }
}

/// TCP Protocol Proxy configuration (spec §4.8/§6). Only the Postgres
/// backend is wired up end to end; the other three are recognized targets
/// for a future proxy listener, per spec §1's "representative" framing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub postgres: BackendProxyConfig,
    pub deny_patterns: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            postgres: BackendProxyConfig {
                listen_port: 5432,
                backend_host: "127.0.0.1".to_string(),
                backend_port: 5432,
            },
            deny_patterns: [
                "DROP DATABASE",
                "DROP SCHEMA",
                "TRUNCATE TABLE",
                "DELETE FROM",
                "ALTER SYSTEM",
                "CREATE ROLE",
                "DROP ROLE",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendProxyConfig {
    pub listen_port: u16,
    pub backend_host: String,
    pub backend_port: u16,
}

/// Configuration builder with validation and defaults, mirroring the
/// teacher's `ConfigBuilder`.
#[derive(Default)]
pub struct ConfigBuilder {
    config: GatewayConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
        }
    }

    /// Loads overrides from the environment variables named in spec §6,
    /// starting from [`GatewayConfig::default`] for anything unset. Env var
    /// names follow the dotted property names from spec §6 upper-cased with
    /// `.` replaced by `_` (e.g. `storage.local.basePath` →
    /// `STORAGE_LOCAL_BASE_PATH`).
    pub fn from_env() -> Self {
        let mut config = GatewayConfig::default();

        if let Ok(v) = env_var("STORAGE_TYPE") {
            if let Some(t) = match v.to_ascii_lowercase().as_str() {
                "local" => Some(StorageType::Local),
                "object" => Some(StorageType::Object),
                _ => None,
            } {
                config.storage.storage_type = t;
            }
        }
        if let Some(v) = env_u64("STORAGE_MAX_FILE_SIZE") {
            config.storage.max_file_size = v;
        }
        if let Ok(v) = env_var("STORAGE_ALLOWED_EXTENSIONS") {
            config.storage.allowed_extensions =
                v.split(',').map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env_var("STORAGE_LOCAL_BASE_PATH") {
            config.storage.local.base_path = PathBuf::from(v);
        }
        if let Some(v) = env_bool("STORAGE_LOCAL_AUTO_CREATE") {
            config.storage.local.auto_create = v;
        }
        if let Ok(v) = env_var("STORAGE_OBJECT_ENDPOINT") {
            config.storage.object.endpoint = v;
        }
        if let Ok(v) = env_var("STORAGE_OBJECT_ACCESS_KEY") {
            config.storage.object.access_key = Some(v);
        }
        if let Ok(v) = env_var("STORAGE_OBJECT_SECRET_KEY") {
            config.storage.object.secret_key = Some(v);
        }
        if let Ok(v) = env_var("STORAGE_OBJECT_BUCKET_PREFIX") {
            config.storage.object.bucket_prefix = v;
        }
        if let Some(v) = env_bool("STORAGE_OBJECT_AUTO_CREATE_BUCKET") {
            config.storage.object.auto_create_bucket = v;
        }

        if let Some(v) = env_u64("CACHE_TTL_FILE") {
            config.cache.ttl_file = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("CACHE_TTL_SEARCH") {
            config.cache.ttl_search = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("CACHE_TTL_LIST") {
            config.cache.ttl_list = Duration::from_secs(v);
        }

        if let Ok(v) = env_var("PROXY_POSTGRES_LISTEN_PORT") {
            if let Ok(p) = v.parse() {
                config.proxy.postgres.listen_port = p;
            }
        }
        if let Ok(v) = env_var("PROXY_POSTGRES_BACKEND_HOST") {
            config.proxy.postgres.backend_host = v;
        }
        if let Ok(v) = env_var("PROXY_POSTGRES_BACKEND_PORT") {
            if let Ok(p) = v.parse() {
                config.proxy.postgres.backend_port = p;
            }
        }
        if let Ok(v) = env_var("PROXY_DENY_PATTERNS") {
            config.proxy.deny_patterns = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }

        if let Ok(v) = env_var("HTTP_BIND_ADDRESS") {
            config.http.bind_address = v;
        }
        if let Ok(v) = env_var("HTTP_LISTEN_PORT") {
            if let Ok(p) = v.parse() {
                config.http.listen_port = p;
            }
        }

        if let Ok(v) = env_var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Some(v) = env_u64("DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = v as u32;
        }

        Self { config }
    }

    pub fn http(mut self, http: HttpConfig) -> Self {
        self.config.http = http;
        self
    }

    pub fn storage(mut self, storage: StorageConfig) -> Self {
        self.config.storage = storage;
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    pub fn database(mut self, database: DatabaseConfig) -> Self {
        self.config.database = database;
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = proxy;
        self
    }

    pub fn build(self) -> Result<GatewayConfig> {
        self.validate()?;
        Ok(self.config)
    }

    fn validate(&self) -> Result<()> {
        if self.config.http.listen_port == 0 {
            return Err(anyhow::anyhow!("HTTP listen port cannot be 0"));
        }
        if self.config.storage.max_file_size == 0 {
            return Err(anyhow::anyhow!("Max file size cannot be 0"));
        }
        if self.config.storage.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one allowed extension is required"));
        }
        if self.config.proxy.postgres.listen_port == 0 {
            return Err(anyhow::anyhow!("Proxy listen port cannot be 0"));
        }
        if self.config.database.max_connections == 0 {
            return Err(anyhow::anyhow!("Database max_connections cannot be 0"));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Result<String, std::env::VarError> {
    std::env::var(name)
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|v| match v.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = ConfigBuilder::new().build().unwrap();
        assert_eq!(config.http.listen_port, 8080);
    }

    #[test]
    fn zero_listen_port_is_rejected() {
        let result = ConfigBuilder::new()
            .http(HttpConfig {
                bind_address: "0.0.0.0".into(),
                listen_port: 0,
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn empty_allowed_extensions_is_rejected() {
        let mut storage = StorageConfig::default();
        storage.allowed_extensions.clear();
        let result = ConfigBuilder::new().storage(storage).build();
        assert!(result.is_err());
    }

    #[test]
    fn from_env_overrides_only_set_variables() {
        std::env::set_var("HTTP_LISTEN_PORT", "9999");
        let config = ConfigBuilder::from_env().build().unwrap();
        assert_eq!(config.http.listen_port, 9999);
        assert_eq!(config.storage.max_file_size, StorageConfig::default().max_file_size);
        std::env::remove_var("HTTP_LISTEN_PORT");
    }
}
