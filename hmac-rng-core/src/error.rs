// SPDX-License-Identifier: MIT
//
// HMAC_RNG: extract-then-expand random bit generator
// Copyright (c) 2025 HMAC_RNG Contributors

//! Error types for the generator and its collaborators
//!
//! Provides a unified error taxonomy using `thiserror` for ergonomic error handling.

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for generator operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Output was requested but the generator could not reach its seeding
    /// threshold, even after an attempted reseed
    #[error("PRNG not seeded: {0}")]
    Unseeded(String),

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network communication failed
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Data validation failed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation timed out
    #[error("Operation timed out")]
    Timeout,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if error is transient and retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout)
    }

    /// Check if error is the generator refusing to produce unseeded output
    pub fn is_unseeded(&self) -> bool {
        matches!(self, Error::Unseeded(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<envy::Error> for Error {
    fn from(e: envy::Error) -> Self {
        Error::Config(format!("Failed to parse environment variables: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(Error::Timeout.is_retryable());
        assert!(!Error::Validation("bad".to_string()).is_retryable());
        assert!(Error::Unseeded("HMAC_RNG".to_string()).is_unseeded());
        assert!(!Error::Config("x".to_string()).is_unseeded());
    }

    #[test]
    fn test_unseeded_message() {
        let err = Error::Unseeded("HMAC_RNG(HMAC(SHA-512),HMAC(SHA-256)) seeding attempt failed".into());
        assert!(err.to_string().starts_with("PRNG not seeded"));
    }
}
