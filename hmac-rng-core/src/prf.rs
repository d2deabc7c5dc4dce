//! Keyed-PRF stepping function
//!
//! One step computes `K = PRF(K || label || counter_le32)` and bumps the
//! counter. The same step produces output keystream, reseed feedback and the
//! next extractor salt; only the label differs.

use crate::mac::MessageAuthCode;

/// Label for keystream blocks and the first reseed feedback block
pub const LABEL_RNG: &str = "rng";

/// Label for the second reseed feedback block
pub const LABEL_RESEED: &str = "reseed";

/// Label for the block that becomes the next extractor salt
pub const LABEL_XTS: &str = "xts";

/// Advance `k` in place and increment `counter`.
///
/// `k` must be exactly `prf.output_length()` bytes long.
pub fn step(prf: &mut dyn MessageAuthCode, k: &mut [u8], counter: &mut u32, label: &str) {
    prf.update(k);
    prf.update(label.as_bytes());
    prf.update(&counter.to_le_bytes());
    prf.finalize_into(k);

    *counter = counter.wrapping_add(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::HmacSha256;

    #[test]
    fn test_step_matches_manual_mac() {
        let mut prf = HmacSha256::sha256();
        prf.set_key(b"prf key");

        let mut k = vec![0u8; 32];
        let mut counter = 7u32;
        step(&mut prf, &mut k, &mut counter, LABEL_RNG);

        let mut reference = HmacSha256::sha256();
        reference.set_key(b"prf key");
        reference.update(&[0u8; 32]);
        reference.update(b"rng");
        reference.update(&[7, 0, 0, 0]);

        assert_eq!(k.as_slice(), reference.finalize().as_slice());
        assert_eq!(counter, 8);
    }

    #[test]
    fn test_counter_is_little_endian() {
        let mut prf = HmacSha256::sha256();
        let mut k = vec![0u8; 32];
        let mut counter = 0x0102_0304u32;
        step(&mut prf, &mut k, &mut counter, LABEL_XTS);

        let mut reference = HmacSha256::sha256();
        reference.update(&[0u8; 32]);
        reference.update(b"xts");
        reference.update(&[0x04, 0x03, 0x02, 0x01]);

        assert_eq!(k.as_slice(), reference.finalize().as_slice());
    }

    #[test]
    fn test_labels_separate_domains() {
        let mut prf = HmacSha256::sha256();
        let mut a = vec![0u8; 32];
        let mut b = vec![0u8; 32];
        let (mut ca, mut cb) = (0u32, 0u32);

        step(&mut prf, &mut a, &mut ca, LABEL_RNG);
        step(&mut prf, &mut b, &mut cb, LABEL_RESEED);

        assert_ne!(a, b);
        assert_eq!(ca, cb);
    }

    #[test]
    fn test_successive_steps_chain() {
        let mut prf = HmacSha256::sha256();
        let mut k = vec![0u8; 32];
        let mut counter = 0u32;

        step(&mut prf, &mut k, &mut counter, LABEL_RNG);
        let first = k.clone();
        step(&mut prf, &mut k, &mut counter, LABEL_RNG);

        assert_ne!(first, k);
        assert_eq!(counter, 2);
    }
}
