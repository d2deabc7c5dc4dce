//! Concrete entropy sources
//!
//! - `os`: the operating system CSPRNG
//! - `timer`: clock readings and timing jitter
//! - `qrng`: a remote QRNG gateway over HTTPS

pub mod os;
pub mod qrng;
pub mod timer;

pub use os::OsEntropySource;
pub use qrng::{QrngEntropySource, QrngSourceConfig};
pub use timer::TimerEntropySource;
