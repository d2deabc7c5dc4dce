//! Blocking HTTPS client for a QRNG entropy gateway
//!
//! Pulls raw bytes from `GET <url>?bytes=N&encoding=binary`. Network round
//! trips are far too slow for the fast path, so only slow polls touch the
//! network, under a retry policy and a circuit breaker that keeps a dead
//! gateway from stalling every reseed.

use crate::retry::{CircuitBreaker, RetryPolicy};
use crate::source::EntropySource;
use crate::{Error, Result};
use reqwest::blocking::{Client, ClientBuilder};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Configuration for the QRNG source
#[derive(Debug, Clone)]
pub struct QrngSourceConfig {
    /// Random-data endpoint of the gateway
    pub url: Url,
    /// Bearer token, if the gateway requires one
    pub api_key: Option<String>,
    /// Number of bytes to request per slow poll
    pub chunk_size: usize,
    /// Request timeout
    pub timeout: Duration,
    /// Retry policy
    pub retry_policy: RetryPolicy,
    /// Refuse plain-HTTP endpoints
    pub https_only: bool,
    /// Consecutive failed polls before the breaker opens
    pub failure_threshold: u32,
    /// How long an open breaker skips the network
    pub reset_timeout: Duration,
}

impl QrngSourceConfig {
    pub fn new(url: Url, chunk_size: usize) -> Self {
        Self {
            url,
            api_key: None,
            chunk_size,
            timeout: Duration::from_secs(5),
            retry_policy: RetryPolicy::default(),
            https_only: true,
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

pub struct QrngEntropySource {
    client: Client,
    config: QrngSourceConfig,
    breaker: CircuitBreaker,
    label: String,
}

impl QrngEntropySource {
    /// Build the HTTP client. Must not be called from inside an async runtime.
    pub fn new(config: QrngSourceConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .pool_max_idle_per_host(2)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .use_rustls_tls()
            .https_only(config.https_only)
            .build()
            .map_err(Error::Network)?;

        let breaker = CircuitBreaker::new(config.failure_threshold, config.reset_timeout);
        let label = format!("qrng:{}", config.url.host_str().unwrap_or("unknown"));

        Ok(Self {
            client,
            config,
            breaker,
            label,
        })
    }

    /// Fetch up to `want` bytes, retrying transient failures
    #[instrument(skip(self), fields(source = %self.label))]
    pub fn fetch(&self, want: usize) -> Result<Vec<u8>> {
        self.config.retry_policy.execute(|| self.fetch_once(want))
    }

    fn fetch_once(&self, want: usize) -> Result<Vec<u8>> {
        let url = self.build_request_url(want);

        debug!("Fetching {} bytes from {}", want, url);

        let mut request = self.client.get(url.clone());
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            warn!("Failed to fetch from {}: {}", url, e);
            if e.is_timeout() {
                Error::Timeout
            } else {
                Error::Network(e)
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(Error::Validation(format!("HTTP {}: {}", status, body)));
        }

        let data = response.bytes().map_err(Error::Network)?.to_vec();
        self.validate_response(&data, want)?;

        debug!("Successfully fetched {} bytes", data.len());
        Ok(data)
    }

    fn build_request_url(&self, want: usize) -> Url {
        let mut url = self.config.url.clone();
        url.query_pairs_mut()
            .append_pair("bytes", &want.to_string())
            .append_pair("encoding", "binary");
        url
    }

    fn validate_response(&self, data: &[u8], want: usize) -> Result<()> {
        if data.is_empty() {
            return Err(Error::Validation("Received empty response".to_string()));
        }

        if data.len() != want {
            warn!("Received {} bytes, expected {}", data.len(), want);
        }

        if data.len() > 1 && data.iter().all(|&b| b == data[0]) {
            warn!("All bytes have the same value ({})", data[0]);
        }

        Ok(())
    }
}

impl EntropySource for QrngEntropySource {
    fn name(&self) -> &str {
        &self.label
    }

    fn fast_poll(&mut self, _buf: &mut [u8]) -> usize {
        0
    }

    fn slow_poll(&mut self, buf: &mut [u8]) -> usize {
        if self.breaker.is_open() {
            debug!(source = %self.label, "Circuit open, skipping QRNG poll");
            return 0;
        }

        let want = self.config.chunk_size.min(buf.len());
        if want == 0 {
            return 0;
        }

        match self.fetch(want) {
            Ok(data) => {
                self.breaker.record_success();
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                n
            }
            Err(e) => {
                self.breaker.record_failure();
                warn!(source = %self.label, "QRNG poll failed: {}", e);
                0
            }
        }
    }
}
