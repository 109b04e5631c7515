//! Layered configuration: compiled-in defaults, an optional TOML file, then
//! environment variables, in that order of increasing precedence.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

fn default_database_url() -> String {
    "postgres://localhost/biblio_enrichment".to_string()
}

fn default_max_connections() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            log_level: default_log_level(),
            metrics_enabled: true,
        }
    }
}

fn default_hard_limit() -> i64 {
    15_000
}

fn default_buffer() -> i64 {
    2_000
}

/// Quota policy constants. `safety_limit` is derived, not
/// independently configurable, so that `hard_limit - buffer` can never
/// drift out of sync with the persisted counter's bound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    #[serde(default = "default_hard_limit")]
    pub hard_limit: i64,
    #[serde(default = "default_buffer")]
    pub buffer: i64,
}

impl QuotaConfig {
    pub fn safety_limit(&self) -> i64 {
        self.hard_limit - self.buffer
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            hard_limit: default_hard_limit(),
            buffer: default_buffer(),
        }
    }
}

fn default_short_ttl() -> u64 {
    300
}

fn default_medium_ttl() -> u64 {
    3_600
}

fn default_long_ttl() -> u64 {
    86_400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_short_ttl")]
    pub short_ttl_seconds: u64,
    #[serde(default = "default_medium_ttl")]
    pub medium_ttl_seconds: u64,
    #[serde(default = "default_long_ttl")]
    pub long_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            short_ttl_seconds: default_short_ttl(),
            medium_ttl_seconds: default_medium_ttl(),
            long_ttl_seconds: default_long_ttl(),
        }
    }
}

fn default_cover_batch_size() -> usize {
    10
}

fn default_enrichment_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_cover_batch_size")]
    pub cover_batch_size: usize,
    #[serde(default = "default_enrichment_batch_size")]
    pub enrichment_batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            cover_batch_size: default_cover_batch_size(),
            enrichment_batch_size: default_enrichment_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_blob_bucket() -> String {
    "biblio-covers".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_blob_bucket")]
    pub bucket: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            bucket: default_blob_bucket(),
        }
    }
}

/// Top-level aggregate configuration for the whole engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub blob: BlobConfig,
}

/// Load any `T: Default + Serialize + Deserialize` section with the
/// defaults → TOML file → env-with-prefix precedence chain.
pub fn load_config<T>(prefix: &str, config_file: Option<&str>) -> Result<T, figment::Error>
where
    T: serde::de::DeserializeOwned + Serialize + Default,
{
    let mut figment = Figment::new().merge(Serialized::defaults(T::default()));

    if let Some(path) = config_file {
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(prefix).split("_"));
    figment.extract()
}

/// Load the full engine configuration under the `BIBLIO_` environment
/// prefix, e.g. `BIBLIO_QUOTA_HARD_LIMIT=20000`.
pub fn load_engine_config(config_file: Option<&str>) -> Result<EngineConfig, figment::Error> {
    load_config("BIBLIO_", config_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quota_safety_limit_is_13000() {
        let cfg = QuotaConfig::default();
        assert_eq!(cfg.safety_limit(), 13_000);
    }

    #[test]
    fn default_engine_config_builds() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.queue.cover_batch_size, 10);
        assert_eq!(cfg.queue.enrichment_batch_size, 100);
    }
}
