//! Extractor stage
//!
//! A keyed MAC (keyed with the XTS salt) that absorbs everything gathered
//! during a reseed and compresses it into the next PRF key.

use crate::mac::MessageAuthCode;
use zeroize::Zeroizing;

pub struct Extractor {
    mac: Box<dyn MessageAuthCode>,
}

impl Extractor {
    /// Wrap `mac` and key it with the initial salt
    pub fn new(mut mac: Box<dyn MessageAuthCode>, salt: &[u8]) -> Self {
        mac.set_key(salt);
        Self { mac }
    }

    pub fn name(&self) -> String {
        self.mac.name()
    }

    pub fn output_length(&self) -> usize {
        self.mac.output_length()
    }

    /// Upper bound on the entropy a single extraction can carry forward
    pub fn output_bits(&self) -> u64 {
        8 * self.output_length() as u64
    }

    pub fn absorb(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.mac.update(data);
    }

    /// Compress all absorbed material into a pseudorandom key
    pub fn extract(&mut self) -> Zeroizing<Vec<u8>> {
        self.mac.finalize()
    }

    /// Install a new salt
    pub fn rekey(&mut self, salt: &[u8]) {
        self.mac.set_key(salt);
    }

    pub fn clear(&mut self) {
        self.mac.clear();
    }
}
