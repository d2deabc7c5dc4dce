//! The HMAC_RNG generator
//!
//! An extract-then-expand construction: an extractor MAC compresses poll
//! output, caller input and feedback from the previous key into a fresh PRK,
//! and a PRF MAC keyed with that PRK expands it into output in counter mode.
//!
//! # Entropy accounting
//!
//! Every absorbed byte (poll output or caller input) is credited with exactly
//! one bit. This is a fixed lower-bound convention, not a measurement: the
//! quantity that matters is entropy conditional on what an attacker already
//! knows, which cannot be computed locally. The estimate only gates the
//! seeded/unseeded decision and is capped at the extractor's output size on
//! every reseed.
//!
//! # Concurrency
//!
//! A generator is not internally synchronized. It is `Send`, so it can be
//! moved to another thread, but callers sharing one instance must serialize
//! access themselves (for example behind a `parking_lot::Mutex`).

use crate::extractor::Extractor;
use crate::mac::MessageAuthCode;
use crate::metrics::Metrics;
use crate::prf::{self, LABEL_RESEED, LABEL_RNG, LABEL_XTS};
use crate::source::{EntropySource, PollKind, SourceRegistry};
use crate::{Error, Result};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use zeroize::{Zeroize, Zeroizing};

/// Number of PRF steps after which `randomize` forces a reseed
pub const RESEED_INTERVAL: u32 = 1 << 20;

/// Every this many PRF steps, output generation stirs in one fast poll
pub const STIR_INTERVAL: u32 = 1 << 16;

/// Bits credited to the entropy estimate per absorbed input byte
pub const BITS_PER_INPUT_BYTE: u64 = 1;

/// Public placeholder key for the PRF before the first reseed
pub const PRF_INITIAL_KEY: &[u8] = b"Botan HMAC_RNG PRF";

/// Public placeholder salt for the extractor before the first reseed
pub const XTS_INITIAL_KEY: &[u8] = b"Botan HMAC_RNG XTS";

/// Output-volume thresholds driving forced reseeds and stir polls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReseedPolicy {
    reseed_interval: u32,
    stir_interval: u32,
}

impl Default for ReseedPolicy {
    fn default() -> Self {
        Self {
            reseed_interval: RESEED_INTERVAL,
            stir_interval: STIR_INTERVAL,
        }
    }
}

impl ReseedPolicy {
    pub fn new(reseed_interval: u32, stir_interval: u32) -> Result<Self> {
        if reseed_interval == 0 || stir_interval == 0 {
            return Err(Error::Config(
                "reseed_interval and stir_interval must be > 0".to_string(),
            ));
        }
        Ok(Self {
            reseed_interval,
            stir_interval,
        })
    }

    pub fn reseed_interval(&self) -> u32 {
        self.reseed_interval
    }

    pub fn stir_interval(&self) -> u32 {
        self.stir_interval
    }
}

/// HMAC-based random bit generator
pub struct HmacRng {
    extractor: Extractor,
    prf: Box<dyn MessageAuthCode>,
    k: Zeroizing<Vec<u8>>,
    counter: u32,
    entropy: u64,
    sources: SourceRegistry,
    policy: ReseedPolicy,
    metrics: Metrics,
}

impl HmacRng {
    /// Create an unseeded generator that takes ownership of both MACs.
    ///
    /// Both are keyed with public placeholder constants; nothing is output
    /// until the entropy estimate reaches the PRF key size, which can only
    /// happen through a reseed.
    pub fn new(extractor_mac: Box<dyn MessageAuthCode>, mut prf_mac: Box<dyn MessageAuthCode>) -> Self {
        prf_mac.set_key(PRF_INITIAL_KEY);
        let extractor = Extractor::new(extractor_mac, XTS_INITIAL_KEY);

        if extractor.output_length() < prf_mac.output_length() {
            warn!(
                extractor = %extractor.name(),
                prf = %prf_mac.name(),
                "Extractor output is shorter than the PRF key; the generator can never become seeded"
            );
        }

        let k = Zeroizing::new(vec![0u8; prf_mac.output_length()]);

        Self {
            extractor,
            prf: prf_mac,
            k,
            counter: 0,
            entropy: 0,
            sources: SourceRegistry::new(),
            policy: ReseedPolicy::default(),
            metrics: Metrics::new(),
        }
    }

    pub fn with_policy(mut self, policy: ReseedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report into an existing metrics handle instead of a private one
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Hand a source over to the generator; it is polled on every reseed
    pub fn add_entropy_source(&mut self, source: Box<dyn EntropySource>) {
        debug!(source = source.name(), "Registered entropy source");
        self.sources.add(source);
    }

    /// Mix caller input into the state. Always triggers a full reseed.
    pub fn add_entropy(&mut self, input: &[u8]) {
        self.reseed_with_input(input, false);
    }

    /// Reseed from the registered sources alone
    pub fn reseed(&mut self) {
        self.reseed_with_input(&[], false);
    }

    /// Fill `out` with generator output.
    ///
    /// Reseeds first when unseeded or when the step counter has reached the
    /// reseed interval. Fails only if the generator is still unseeded after
    /// that attempt.
    pub fn randomize(&mut self, out: &mut [u8]) -> Result<()> {
        if out.is_empty() {
            return Ok(());
        }

        let forced = self.counter >= self.policy.reseed_interval;
        if !self.is_seeded() || forced {
            self.reseed_with_input(&[], forced);

            if !self.is_seeded() {
                self.metrics.record_unseeded();
                warn!(
                    entropy_bits = self.entropy,
                    required_bits = self.seed_threshold(),
                    sources = self.sources.len(),
                    "Refusing to generate output from an unseeded generator"
                );
                return Err(Error::Unseeded(format!(
                    "{} seeding attempt failed",
                    self.name()
                )));
            }
        }

        let block = self.k.len();
        for chunk in out.chunks_mut(block) {
            prf::step(&mut *self.prf, &mut self.k, &mut self.counter, LABEL_RNG);
            chunk.copy_from_slice(&self.k[..chunk.len()]);
        }

        // Stir poll: absorbed, never credited
        if !self.sources.is_empty() && self.counter % self.policy.stir_interval == 0 {
            let extractor = &mut self.extractor;
            if let Some(got) = self.sources.fast_poll_next(|data| extractor.absorb(data)) {
                trace!(bytes = got, counter = self.counter, "Stirred in fast poll");
                self.metrics.record_stir_poll(got);
            }
        }

        self.metrics.record_request(out.len());
        Ok(())
    }

    /// Whether the entropy estimate covers the full PRF key size
    pub fn is_seeded(&self) -> bool {
        self.entropy >= self.seed_threshold()
    }

    /// Wipe all secret state, leaving an unseeded generator.
    ///
    /// Both MACs end up with cleared keys rather than the initial
    /// placeholders. Registered sources are kept.
    pub fn clear(&mut self) {
        self.extractor.clear();
        self.prf.clear();
        self.k.as_mut_slice().zeroize();
        self.entropy = 0;
        self.counter = 0;
        self.sources.reset_cursor();
    }

    /// `HMAC_RNG(<extractor>,<prf>)`
    pub fn name(&self) -> String {
        format!("HMAC_RNG({},{})", self.extractor.name(), self.prf.name())
    }

    /// PRF steps since the last reseed
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Current entropy estimate, in bits
    pub fn entropy_estimate(&self) -> u64 {
        self.entropy
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.names()
    }

    pub fn policy(&self) -> ReseedPolicy {
        self.policy
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn seed_threshold(&self) -> u64 {
        8 * self.prf.output_length() as u64
    }

    fn credit(&mut self, bytes: usize) {
        self.entropy = self
            .entropy
            .saturating_add(bytes as u64 * BITS_PER_INPUT_BYTE);
    }

    fn reseed_with_input(&mut self, input: &[u8], forced: bool) {
        let was_seeded = self.is_seeded();

        // Poll data: one fast sweep then one slow sweep, in registry order
        if !self.sources.is_empty() {
            let mut polled = 0usize;

            {
                let extractor = &mut self.extractor;
                let metrics = &self.metrics;
                self.sources.poll_all(PollKind::Fast, |data| {
                    extractor.absorb(data);
                    metrics.record_fast_poll(data.len());
                    polled += data.len();
                });

                let mut started = Instant::now();
                self.sources.poll_all(PollKind::Slow, |data| {
                    metrics.record_slow_poll(data.len(), started.elapsed().as_micros() as u64);
                    extractor.absorb(data);
                    polled += data.len();
                    started = Instant::now();
                });
            }

            self.credit(polled);
        }

        if !input.is_empty() {
            self.extractor.absorb(input);
            self.credit(input.len());
        }

        // Feedback from the previous key
        prf::step(&mut *self.prf, &mut self.k, &mut self.counter, LABEL_RNG);
        self.extractor.absorb(&self.k);
        prf::step(&mut *self.prf, &mut self.k, &mut self.counter, LABEL_RESEED);
        self.extractor.absorb(&self.k);

        let prk = self.extractor.extract();
        self.prf.set_key(&prk);

        prf::step(&mut *self.prf, &mut self.k, &mut self.counter, LABEL_XTS);
        self.extractor.rekey(&self.k);

        self.k.as_mut_slice().zeroize();
        self.counter = 0;

        self.entropy = self.entropy.min(self.extractor.output_bits());

        self.metrics.record_reseed(forced);
        debug!(
            forced,
            sources = self.sources.len(),
            input_bytes = input.len(),
            entropy_bits = self.entropy,
            "Reseeded"
        );

        if !was_seeded && self.is_seeded() {
            info!(generator = %self.name(), entropy_bits = self.entropy, "Generator seeded");
        }
    }
}

impl Drop for HmacRng {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for HmacRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacRng")
            .field("name", &self.name())
            .field("counter", &self.counter)
            .field("entropy_bits", &self.entropy)
            .field("sources", &self.sources.names())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl rand::RngCore for HmacRng {
    fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill_bytes(&mut buf);
        u32::from_le_bytes(buf)
    }

    fn next_u64(&mut self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    /// Panics if the generator cannot be seeded; use `try_fill_bytes` to
    /// handle that case.
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if let Err(e) = self.randomize(dest) {
            panic!("HmacRng: {}", e);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.randomize(dest).map_err(rand::Error::new)
    }
}

impl rand::CryptoRng for HmacRng {}
