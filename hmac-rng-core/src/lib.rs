// SPDX-License-Identifier: MIT
//
// HMAC_RNG: extract-then-expand random bit generator
// Copyright (c) 2025 HMAC_RNG Contributors

//! HMAC_RNG Core Library
//!
//! A deterministic random bit generator built from two keyed MACs: an
//! extractor that condenses entropy pooled from registered sources into a
//! pseudorandom key, and a PRF that expands that key in counter mode.
//!
//! # Architecture
//!
//! - `mac`: keyed MAC abstraction and HMAC-SHA-2 instances
//! - `extractor`: entropy accumulator keyed with a salt
//! - `prf`: labelled counter-mode step function
//! - `source`: entropy source trait and round-robin registry
//! - `sources`: OS, timer and QRNG gateway sources
//! - `generator`: the `HmacRng` state machine (reseed, randomize, clear)
//! - `config`: assembling a generator from file or environment
//! - `metrics`, `retry`, `encoding`, `error`: supporting concerns
//!
//! # Example
//!
//! ```
//! use hmac_rng_core::{HmacRng, mac::{HmacSha256, HmacSha512}};
//! use hmac_rng_core::sources::{OsEntropySource, TimerEntropySource};
//!
//! let mut rng = HmacRng::new(Box::new(HmacSha512::sha512()), Box::new(HmacSha256::sha256()));
//! rng.add_entropy_source(Box::new(OsEntropySource::new()));
//! rng.add_entropy_source(Box::new(TimerEntropySource::new()));
//!
//! let mut key = [0u8; 32];
//! rng.randomize(&mut key).unwrap();
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod extractor;
pub mod generator;
pub mod mac;
pub mod metrics;
pub mod prf;
pub mod retry;
pub mod source;
pub mod sources;

pub use config::{GeneratorConfig, MacAlgorithm};
pub use encoding::EncodingFormat;
pub use error::{Error, Result};
pub use generator::{HmacRng, ReseedPolicy};
pub use mac::MessageAuthCode;
pub use metrics::Metrics;
pub use source::EntropySource;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest single request the CLI accepts (1 MiB)
pub const MAX_REQUEST_SIZE: usize = 1024 * 1024;
