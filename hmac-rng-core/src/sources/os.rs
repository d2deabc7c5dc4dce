//! Operating system randomness

use crate::source::EntropySource;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::warn;

/// Bytes requested by a fast poll
pub const OS_FAST_POLL_BYTES: usize = 16;

/// Reads from the OS CSPRNG (`getrandom(2)`, `BCryptGenRandom`, ...)
#[derive(Debug, Default)]
pub struct OsEntropySource;

impl OsEntropySource {
    pub fn new() -> Self {
        Self
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        match OsRng.try_fill_bytes(buf) {
            Ok(()) => buf.len(),
            Err(e) => {
                warn!("OS entropy source failed: {}", e);
                0
            }
        }
    }
}

impl EntropySource for OsEntropySource {
    fn name(&self) -> &str {
        "os"
    }

    fn fast_poll(&mut self, buf: &mut [u8]) -> usize {
        let n = OS_FAST_POLL_BYTES.min(buf.len());
        self.read(&mut buf[..n])
    }

    fn slow_poll(&mut self, buf: &mut [u8]) -> usize {
        self.read(buf)
    }
}
