//! Configuration for assembling a generator and its entropy sources

use crate::generator::{HmacRng, ReseedPolicy, RESEED_INTERVAL, STIR_INTERVAL};
use crate::mac::{HmacSha256, HmacSha384, HmacSha512, MessageAuthCode};
use crate::retry::RetryPolicy;
use crate::source::POLL_BUFFER_SIZE;
use crate::sources::{OsEntropySource, QrngEntropySource, QrngSourceConfig, TimerEntropySource};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Environment variable prefix shared by `from_env` and `from_file`
pub const ENV_PREFIX: &str = "HMAC_RNG_";

/// Hash function underlying an HMAC instance
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MacAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl MacAlgorithm {
    pub fn output_length(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    pub fn instantiate(&self) -> Box<dyn MessageAuthCode> {
        match self {
            Self::Sha256 => Box::new(HmacSha256::sha256()),
            Self::Sha384 => Box::new(HmacSha384::sha384()),
            Self::Sha512 => Box::new(HmacSha512::sha512()),
        }
    }
}

/// Generator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    /// MAC used as the extractor
    #[serde(default = "default_extractor")]
    pub extractor: MacAlgorithm,

    /// MAC used as the PRF
    #[serde(default = "default_prf")]
    pub prf: MacAlgorithm,

    /// Register the operating system source
    #[serde(default = "default_true")]
    pub os_source: bool,

    /// Register the timer/jitter source
    #[serde(default = "default_true")]
    pub timer_source: bool,

    /// QRNG gateway endpoints, one source each
    #[serde(default)]
    pub qrng_urls: Vec<String>,

    /// Bearer token for the QRNG gateways
    #[serde(default)]
    pub qrng_api_key: Option<String>,

    /// Bytes requested from a gateway per slow poll
    #[serde(default = "default_qrng_chunk_size")]
    pub qrng_chunk_size: usize,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_qrng_timeout_ms")]
    pub qrng_timeout_ms: u64,

    /// Permit plain-HTTP gateway URLs
    #[serde(default)]
    pub qrng_allow_http: bool,

    /// Maximum attempts per gateway poll
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// PRF steps between forced reseeds
    #[serde(default = "default_reseed_interval")]
    pub reseed_interval: u32,

    /// PRF steps between incidental stir polls
    #[serde(default = "default_stir_interval")]
    pub stir_interval: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            extractor: default_extractor(),
            prf: default_prf(),
            os_source: true,
            timer_source: true,
            qrng_urls: Vec::new(),
            qrng_api_key: None,
            qrng_chunk_size: default_qrng_chunk_size(),
            qrng_timeout_ms: default_qrng_timeout_ms(),
            qrng_allow_http: false,
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            reseed_interval: default_reseed_interval(),
            stir_interval: default_stir_interval(),
        }
    }
}

impl GeneratorConfig {
    /// Load configuration from `HMAC_RNG_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();
        let mut config: Self = envy::prefixed(ENV_PREFIX).from_iter(vars.iter().cloned())?;

        // Handle comma-separated QRNG_URLS however envy split them
        if !config.qrng_urls.is_empty() {
            config.qrng_urls = config.qrng_urls.iter().flat_map(|u| split_list(u)).collect();
        } else {
            let key = format!("{}QRNG_URLS", ENV_PREFIX);
            if let Some((_, urls)) = vars.iter().find(|(k, _)| *k == key) {
                config.qrng_urls = split_list(urls);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML, TOML or JSON file, with
    /// `HMAC_RNG_*` environment variables taking precedence
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX.trim_end_matches('_'))
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("qrng_urls"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extractor.output_length() < self.prf.output_length() {
            return Err(Error::Config(format!(
                "extractor {:?} is narrower than prf {:?}; the generator could never become seeded",
                self.extractor, self.prf
            )));
        }

        if self.reseed_interval == 0 || self.stir_interval == 0 {
            return Err(Error::Config(
                "reseed_interval and stir_interval must be > 0".to_string(),
            ));
        }

        if self.qrng_chunk_size == 0 || self.qrng_chunk_size > POLL_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "qrng_chunk_size must be between 1 and {}",
                POLL_BUFFER_SIZE
            )));
        }

        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be >= 1".to_string()));
        }

        for url in &self.qrng_urls {
            let parsed = Url::parse(url)
                .map_err(|e| Error::Config(format!("Invalid QRNG URL '{}': {}", url, e)))?;
            if parsed.scheme() != "https" && !self.qrng_allow_http {
                return Err(Error::Config(format!(
                    "QRNG URL '{}' is not HTTPS; set qrng_allow_http to permit it",
                    url
                )));
            }
        }

        Ok(())
    }

    pub fn policy(&self) -> Result<ReseedPolicy> {
        ReseedPolicy::new(self.reseed_interval, self.stir_interval)
    }

    pub fn qrng_timeout(&self) -> Duration {
        Duration::from_millis(self.qrng_timeout_ms)
    }

    /// Source configuration for one gateway URL
    pub fn qrng_source_config(&self, url: &str) -> Result<QrngSourceConfig> {
        let url = Url::parse(url)
            .map_err(|e| Error::Config(format!("Invalid QRNG URL '{}': {}", url, e)))?;

        let mut config = QrngSourceConfig::new(url, self.qrng_chunk_size);
        config.api_key = self.qrng_api_key.clone();
        config.timeout = self.qrng_timeout();
        config.https_only = !self.qrng_allow_http;
        config.retry_policy = RetryPolicy {
            max_attempts: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            ..Default::default()
        };
        Ok(config)
    }

    /// Assemble an unseeded generator with every enabled source registered.
    ///
    /// Builds blocking HTTP clients for QRNG sources, so call it outside any
    /// async runtime.
    pub fn build(&self) -> Result<HmacRng> {
        self.validate()?;

        let mut rng = HmacRng::new(self.extractor.instantiate(), self.prf.instantiate())
            .with_policy(self.policy()?);

        if self.os_source {
            rng.add_entropy_source(Box::new(OsEntropySource::new()));
        }
        if self.timer_source {
            rng.add_entropy_source(Box::new(TimerEntropySource::new()));
        }
        for url in &self.qrng_urls {
            let source = QrngEntropySource::new(self.qrng_source_config(url)?)?;
            rng.add_entropy_source(Box::new(source));
        }

        info!(
            generator = %rng.name(),
            sources = ?rng.source_names(),
            "Generator assembled"
        );
        Ok(rng)
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Default value functions
fn default_extractor() -> MacAlgorithm {
    MacAlgorithm::Sha512
}

fn default_prf() -> MacAlgorithm {
    MacAlgorithm::Sha256
}

fn default_qrng_chunk_size() -> usize {
    64
}

fn default_qrng_timeout_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    50
}

fn default_reseed_interval() -> u32 {
    RESEED_INTERVAL
}

fn default_stir_interval() -> u32 {
    STIR_INTERVAL
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_default_config_validation() {
        let config = GeneratorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.extractor, MacAlgorithm::Sha512);
        assert_eq!(config.prf, MacAlgorithm::Sha256);
        assert_eq!(config.policy().unwrap(), ReseedPolicy::default());
    }

    #[test]
    fn test_narrow_extractor_rejected() {
        let config = GeneratorConfig {
            extractor: MacAlgorithm::Sha256,
            prf: MacAlgorithm::Sha512,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let zero_interval = GeneratorConfig {
            stir_interval: 0,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let big_chunk = GeneratorConfig {
            qrng_chunk_size: POLL_BUFFER_SIZE + 1,
            ..Default::default()
        };
        assert!(big_chunk.validate().is_err());

        let bad_url = GeneratorConfig {
            qrng_urls: vec!["not a url".to_string()],
            ..Default::default()
        };
        assert!(bad_url.validate().is_err());
    }

    #[test]
    fn test_plain_http_needs_opt_in() {
        let mut config = GeneratorConfig {
            qrng_urls: vec!["http://gateway.local/api/random".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.qrng_allow_http = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars() {
        let config = GeneratorConfig::from_vars(vars(&[
            ("HMAC_RNG_EXTRACTOR", "sha384"),
            ("HMAC_RNG_TIMER_SOURCE", "false"),
            ("HMAC_RNG_QRNG_URLS", "https://a.example/api/random, https://b.example/api/random"),
            ("HMAC_RNG_RESEED_INTERVAL", "4096"),
            ("UNRELATED", "ignored"),
        ]))
        .unwrap();

        assert_eq!(config.extractor, MacAlgorithm::Sha384);
        assert_eq!(config.prf, MacAlgorithm::Sha256);
        assert!(!config.timer_source);
        assert!(config.os_source);
        assert_eq!(config.qrng_urls.len(), 2);
        assert_eq!(config.reseed_interval, 4096);
        assert_eq!(config.stir_interval, STIR_INTERVAL);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("hmac-rng-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "extractor: sha512\nprf: sha384\nos_source: false\nqrng_chunk_size: 32\nstir_interval: 128\n",
        )
        .unwrap();

        let config = GeneratorConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.prf, MacAlgorithm::Sha384);
        assert!(!config.os_source);
        assert!(config.timer_source);
        assert_eq!(config.qrng_chunk_size, 32);
        assert_eq!(config.stir_interval, 128);
    }

    #[test]
    fn test_qrng_source_config() {
        let config = GeneratorConfig {
            qrng_api_key: Some("key".to_string()),
            max_retries: 5,
            ..Default::default()
        };
        let source = config
            .qrng_source_config("https://gateway.example/api/random")
            .unwrap();
        assert_eq!(source.api_key.as_deref(), Some("key"));
        assert_eq!(source.retry_policy.max_attempts, 5);
        assert!(source.https_only);
        assert_eq!(source.chunk_size, 64);
    }

    #[test]
    fn test_build_registers_sources() {
        let config = GeneratorConfig {
            stir_interval: 256,
            ..Default::default()
        };
        let mut rng = config.build().unwrap();

        assert_eq!(rng.source_names(), vec!["os", "timer"]);
        assert_eq!(rng.name(), "HMAC_RNG(HMAC(SHA-512),HMAC(SHA-256))");
        assert_eq!(rng.policy().stir_interval(), 256);

        // os (16 + 128) and timer (16 + 128) bytes credit 288 bits
        rng.reseed();
        assert!(rng.is_seeded());

        let mut out = [0u8; 64];
        rng.randomize(&mut out).unwrap();
    }

    #[test]
    fn test_build_without_sources_stays_unseeded() {
        let config = GeneratorConfig {
            os_source: false,
            timer_source: false,
            ..Default::default()
        };
        let mut rng = config.build().unwrap();
        assert_eq!(rng.source_count(), 0);

        let mut out = [0u8; 8];
        assert!(rng.randomize(&mut out).unwrap_err().is_unseeded());
    }
}
