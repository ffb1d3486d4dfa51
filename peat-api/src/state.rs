//! App state: scanner, adapters, config.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use peat_cache::{CacheConfig, EphemeralCache};
use peat_core::constants::{EPHEMERAL_MAX_ENTRIES, EPHEMERAL_TTL_SECS};
use peat_core::error::Result;
use peat_core::traits::{DurableStore, NarrativeGenerator};
use peat_scanner::{Adapters, ExposureScanner};
use peat_sources::{
    HibpClient, HibpConfig, HoleheProbe, OpenAiConfig, OpenAiNarrator, ProbeConfig, SherlockProbe,
    TemplateNarrator,
};
use peat_store::{DurableCache, FileStore, MemoryStore};

/// Server and adapter configuration.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Have I Been Pwned API key
    pub hibp_api_key: Option<String>,
    /// OpenAI API key; the template narrator is used without one
    pub openai_api_key: Option<String>,
    /// OpenAI chat model
    pub openai_model: Option<String>,
    /// Python interpreter for the probes
    pub python_bin: Option<String>,
    /// Holehe runner script
    pub holehe_script: Option<PathBuf>,
    /// Sherlock working directory
    pub sherlock_dir: Option<PathBuf>,
    /// Durable store file; an in-memory store is used without one
    pub store_path: Option<PathBuf>,
    /// Ephemeral cache capacity
    pub cache_max_entries: usize,
    /// Ephemeral entry lifetime in seconds
    pub cache_ttl_seconds: u64,
    /// Whether email results are persisted to the durable tier
    pub durable_cache: bool,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3001;

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            hibp_api_key: None,
            openai_api_key: None,
            openai_model: None,
            python_bin: None,
            holehe_script: None,
            sherlock_dir: None,
            store_path: None,
            cache_max_entries: EPHEMERAL_MAX_ENTRIES,
            cache_ttl_seconds: EPHEMERAL_TTL_SECS,
            durable_cache: true,
        }
    }
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env_opt(name) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "invalid value, using default");
            default
        }),
        None => default,
    }
}

impl ApiConfig {
    /// Loads `.env` and reads the configuration from the environment.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Self {
            host: env_opt("PEAT_HOST").unwrap_or(defaults.host),
            port: env_parse("PORT", defaults.port),
            hibp_api_key: env_opt("HIBP_API_KEY"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_model: env_opt("OPENAI_MODEL"),
            python_bin: env_opt("PYTHON_BIN"),
            holehe_script: env_opt("HOLEHE_SCRIPT").map(PathBuf::from),
            sherlock_dir: env_opt("SHERLOCK_DIR").map(PathBuf::from),
            store_path: env_opt("PEAT_STORE_PATH").map(PathBuf::from),
            cache_max_entries: env_parse("PEAT_CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttl_seconds: env_parse("PEAT_CACHE_TTL_SECS", defaults.cache_ttl_seconds),
            durable_cache: env_opt("PEAT_DURABLE_CACHE")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(defaults.durable_cache),
        }
    }

    fn probe_config(&self) -> ProbeConfig {
        let mut probes = ProbeConfig::default();
        if let Some(python) = &self.python_bin {
            probes = probes.with_python_bin(python);
        }
        if let Some(script) = &self.holehe_script {
            probes = probes.with_holehe_script(script);
        }
        if let Some(dir) = &self.sherlock_dir {
            probes = probes.with_sherlock_dir(dir);
        }
        probes
    }

    /// Builds the production adapters.
    pub fn build_adapters(&self) -> Result<Adapters> {
        let hibp = match &self.hibp_api_key {
            Some(key) => HibpConfig::new(key),
            None => {
                warn!("HIBP_API_KEY is not set, breach lookups will degrade");
                HibpConfig::default()
            }
        };

        let narrator: Arc<dyn NarrativeGenerator> = match &self.openai_api_key {
            Some(key) => {
                let mut openai = OpenAiConfig::new(key);
                if let Some(model) = &self.openai_model {
                    openai = openai.with_model(model);
                }
                Arc::new(OpenAiNarrator::new(openai)?)
            }
            None => {
                info!("OPENAI_API_KEY is not set, using template narratives");
                Arc::new(TemplateNarrator::new())
            }
        };

        let probes = self.probe_config();
        Ok(Adapters {
            breach: Arc::new(HibpClient::new(hibp)?),
            registration: Arc::new(HoleheProbe::new(probes.clone())),
            presence: Arc::new(SherlockProbe::new(probes)),
            narrator,
        })
    }

    /// Opens the durable tier, if enabled.
    pub async fn open_durable(&self) -> Result<Option<DurableCache>> {
        if !self.durable_cache {
            return Ok(None);
        }
        let store: Arc<dyn DurableStore> = match &self.store_path {
            Some(path) => {
                info!(path = %path.display(), "opening durable store");
                Arc::new(FileStore::open(path).await?)
            }
            None => Arc::new(MemoryStore::new()),
        };
        Ok(Some(DurableCache::new(store)))
    }

    /// Ephemeral cache sized from this config.
    pub fn ephemeral_cache(&self) -> EphemeralCache {
        EphemeralCache::with_config(
            CacheConfig::default()
                .with_max_entries(self.cache_max_entries)
                .with_ttl_seconds(self.cache_ttl_seconds),
        )
    }

    /// Builds a scanner with the production adapters.
    pub async fn build_scanner(&self) -> Result<ExposureScanner> {
        let mut scanner = ExposureScanner::new(self.build_adapters()?, Arc::new(self.ephemeral_cache()));
        if let Some(durable) = self.open_durable().await? {
            scanner = scanner.with_durable(durable);
        }
        Ok(scanner)
    }
}

/// Shared handler state.
pub struct AppState {
    /// Active configuration
    pub config: ApiConfig,
    /// The exposure scanner
    pub scanner: ExposureScanner,
    started_at: Instant,
}

impl AppState {
    /// Creates state around an existing scanner.
    pub fn new(config: ApiConfig, scanner: ExposureScanner) -> Self {
        Self {
            config,
            scanner,
            started_at: Instant::now(),
        }
    }

    /// Creates state with the production adapters.
    pub async fn from_config(config: ApiConfig) -> Result<Self> {
        let scanner = config.build_scanner().await?;
        Ok(Self::new(config, scanner))
    }

    /// Seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_builds_scanner() {
        let scanner = ApiConfig::default().build_scanner().await.unwrap();
        assert!(scanner.has_durable());
        assert_eq!(scanner.ephemeral().config().max_entries, EPHEMERAL_MAX_ENTRIES);
    }

    #[tokio::test]
    async fn test_durable_tier_can_be_disabled() {
        let config = ApiConfig {
            durable_cache: false,
            cache_max_entries: 10,
            ..ApiConfig::default()
        };
        let scanner = config.build_scanner().await.unwrap();
        assert!(!scanner.has_durable());
        assert_eq!(scanner.ephemeral().config().max_entries, 10);
    }

    #[tokio::test]
    async fn test_file_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            store_path: Some(dir.path().join("records.peat")),
            ..ApiConfig::default()
        };
        assert!(config.open_durable().await.unwrap().is_some());
    }

    #[test]
    fn test_empty_openai_key_is_rejected() {
        let config = ApiConfig {
            openai_api_key: Some("   ".into()),
            ..ApiConfig::default()
        };
        assert!(config.build_adapters().is_err());
    }
}
