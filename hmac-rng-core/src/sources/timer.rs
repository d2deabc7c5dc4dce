//! Clock readings and execution-timing jitter
//!
//! Low quality on its own; useful as one more independent input next to the
//! OS source.

use crate::source::EntropySource;
use std::hint::black_box;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Iterations of busy work between two jitter samples
const JITTER_ROUNDS: u32 = 64;

#[derive(Debug)]
pub struct TimerEntropySource {
    epoch: Instant,
}

impl Default for TimerEntropySource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerEntropySource {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    fn jitter_sample(&self) -> u8 {
        let start = Instant::now();
        let mut acc = 0u64;
        for i in 0..JITTER_ROUNDS {
            acc = black_box(acc.rotate_left(5) ^ u64::from(i));
        }
        let elapsed = start.elapsed().as_nanos() as u64;
        (elapsed ^ (elapsed >> 8) ^ acc) as u8
    }
}

impl EntropySource for TimerEntropySource {
    fn name(&self) -> &str {
        "timer"
    }

    /// Wall-clock nanoseconds followed by monotonic nanoseconds since creation
    fn fast_poll(&mut self, buf: &mut [u8]) -> usize {
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let mono = self.epoch.elapsed().as_nanos() as u64;

        let mut sample = [0u8; 16];
        sample[..8].copy_from_slice(&wall.to_le_bytes());
        sample[8..].copy_from_slice(&mono.to_le_bytes());

        let n = sample.len().min(buf.len());
        buf[..n].copy_from_slice(&sample[..n]);
        n
    }

    /// One jitter sample per output byte
    fn slow_poll(&mut self, buf: &mut [u8]) -> usize {
        for byte in buf.iter_mut() {
            *byte = self.jitter_sample();
        }
        buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_poll_writes_clock_readings() {
        let mut source = TimerEntropySource::new();
        let mut buf = [0u8; 128];
        assert_eq!(source.fast_poll(&mut buf), 16);

        let wall = u64::from_le_bytes(buf[..8].try_into().unwrap());
        assert!(wall > 0);
    }

    #[test]
    fn test_fast_poll_respects_small_buffer() {
        let mut source = TimerEntropySource::new();
        let mut buf = [0u8; 4];
        assert_eq!(source.fast_poll(&mut buf), 4);
    }

    #[test]
    fn test_slow_poll_fills_buffer() {
        let mut source = TimerEntropySource::new();
        let mut buf = [0u8; 64];
        assert_eq!(source.slow_poll(&mut buf), 64);
        assert_eq!(source.name(), "timer");
    }
}
