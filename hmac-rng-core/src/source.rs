//! Entropy sources and the registry that polls them
//!
//! The registry owns every source handed to it together with a single
//! fixed-capacity scratch buffer that all polls write into. Poll output is
//! only ever lent to the caller through a callback so it cannot escape the
//! generator.

use tracing::trace;
use zeroize::Zeroizing;

/// Capacity of the scratch buffer shared by all polls
pub const POLL_BUFFER_SIZE: usize = 128;

/// A pollable source of unpredictability.
///
/// Both poll methods write into `buf` and return the number of bytes written.
/// Returning 0 is always legitimate and simply means nothing was available.
pub trait EntropySource: Send {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Cheap, low-latency sample; may be of lower quality
    fn fast_poll(&mut self, buf: &mut [u8]) -> usize;

    /// Costlier, higher-quality sample
    fn slow_poll(&mut self, buf: &mut [u8]) -> usize;
}

/// Which sampling path to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollKind {
    Fast,
    Slow,
}

/// Ordered collection of owned entropy sources
pub struct SourceRegistry {
    sources: Vec<Box<dyn EntropySource>>,
    next: usize,
    io_buffer: Zeroizing<Vec<u8>>,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            next: 0,
            io_buffer: Zeroizing::new(vec![0u8; POLL_BUFFER_SIZE]),
        }
    }

    /// Append a source; registry order drives both polling orders
    pub fn add(&mut self, source: Box<dyn EntropySource>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Names of the registered sources, in registry order
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Restart the round-robin at the first source
    pub fn reset_cursor(&mut self) {
        self.next = 0;
    }

    /// Fast-poll the source under the round-robin cursor and advance it.
    ///
    /// Returns the number of bytes handed to `sink`, or `None` when the
    /// registry is empty.
    pub fn fast_poll_next<F>(&mut self, sink: F) -> Option<usize>
    where
        F: FnOnce(&[u8]),
    {
        if self.sources.is_empty() {
            return None;
        }

        let index = self.next;
        self.next = (self.next + 1) % self.sources.len();

        let got = Self::poll_one(&mut *self.sources[index], PollKind::Fast, &mut self.io_buffer);
        sink(&self.io_buffer[..got]);
        Some(got)
    }

    /// Poll every source once, in registry order, handing each result to
    /// `sink`. Does not move the round-robin cursor.
    pub fn poll_all<F>(&mut self, kind: PollKind, mut sink: F)
    where
        F: FnMut(&[u8]),
    {
        for source in self.sources.iter_mut() {
            let got = Self::poll_one(&mut **source, kind, &mut self.io_buffer);
            sink(&self.io_buffer[..got]);
        }
    }

    fn poll_one(source: &mut dyn EntropySource, kind: PollKind, buf: &mut [u8]) -> usize {
        let reported = match kind {
            PollKind::Fast => source.fast_poll(buf),
            PollKind::Slow => source.slow_poll(buf),
        };
        let got = reported.min(buf.len());

        trace!(source = source.name(), ?kind, bytes = got, "Polled entropy source");
        got
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FixedSource;
    use super::*;
    use std::sync::atomic::Ordering;

    struct Liar;

    impl EntropySource for Liar {
        fn name(&self) -> &str {
            "liar"
        }

        fn fast_poll(&mut self, _buf: &mut [u8]) -> usize {
            10_000
        }

        fn slow_poll(&mut self, _buf: &mut [u8]) -> usize {
            10_000
        }
    }

    #[test]
    fn test_empty_registry_is_noop() {
        let mut registry = SourceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.fast_poll_next(|_| panic!("no sources")), None);

        let mut calls = 0;
        registry.poll_all(PollKind::Slow, |_| calls += 1);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_round_robin_cursor() {
        let mut registry = SourceRegistry::new();
        let a = FixedSource::new("a", 0xAA, 4, 0);
        let b = FixedSource::new("b", 0xBB, 4, 0);
        let (a_fast, _) = a.counters();
        let (b_fast, _) = b.counters();
        registry.add(Box::new(a));
        registry.add(Box::new(b));

        let mut seen = Vec::new();
        for _ in 0..3 {
            registry.fast_poll_next(|data| seen.push(data[0]));
        }

        assert_eq!(seen, vec![0xAA, 0xBB, 0xAA]);
        assert_eq!(a_fast.load(Ordering::Relaxed), 2);
        assert_eq!(b_fast.load(Ordering::Relaxed), 1);
        assert_eq!(registry.next, 1);
    }

    #[test]
    fn test_poll_all_in_registry_order() {
        let mut registry = SourceRegistry::new();
        registry.add(Box::new(FixedSource::new("a", 1, 0, 3)));
        registry.add(Box::new(FixedSource::new("b", 2, 0, 5)));
        registry.add(Box::new(FixedSource::new("c", 3, 0, 0)));

        let mut seen = Vec::new();
        registry.poll_all(PollKind::Slow, |data| seen.push(data.to_vec()));

        assert_eq!(seen, vec![vec![1; 3], vec![2; 5], vec![]]);
        assert_eq!(registry.next, 0);
    }

    #[test]
    fn test_oversized_report_is_clamped() {
        let mut registry = SourceRegistry::new();
        registry.add(Box::new(Liar));

        let got = registry.fast_poll_next(|data| assert_eq!(data.len(), POLL_BUFFER_SIZE));
        assert_eq!(got, Some(POLL_BUFFER_SIZE));
    }

    #[test]
    fn test_names() {
        let mut registry = SourceRegistry::new();
        registry.add(Box::new(FixedSource::new("first", 0, 0, 0)));
        registry.add(Box::new(Liar));
        assert_eq!(registry.names(), vec!["first", "liar"]);
    }
}
