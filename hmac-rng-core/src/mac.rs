//! Keyed MAC primitives used as the generator's extractor and PRF

use hmac::digest::core_api::{Block, BlockSizeUser};
use hmac::digest::Digest;
use hmac::{Mac, SimpleHmac};
use sha2::{Sha256, Sha384, Sha512};
use zeroize::{Zeroize, Zeroizing};

/// A keyed message authentication code.
///
/// `finalize` consumes everything passed to `update` since the last
/// finalization (or keying) and leaves the primitive ready for a new message
/// under the same key.
pub trait MessageAuthCode: Send {
    /// Algorithm name, e.g. `HMAC(SHA-256)`
    fn name(&self) -> String;

    /// Size of every `finalize` output, in bytes
    fn output_length(&self) -> usize;

    /// Replace the key, discarding any accumulated input
    fn set_key(&mut self, key: &[u8]);

    fn update(&mut self, data: &[u8]);

    /// Write exactly `output_length()` bytes of tag into `out`
    fn finalize_into(&mut self, out: &mut [u8]);

    fn finalize(&mut self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(vec![0u8; self.output_length()]);
        self.finalize_into(&mut out);
        out
    }

    /// Wipe the key and internal state
    fn clear(&mut self);
}

/// HMAC over any block-oriented digest
pub struct HmacMac<D>
where
    D: Digest + BlockSizeUser,
{
    hash_name: &'static str,
    key: Block<D>,
    inner: SimpleHmac<D>,
}

pub type HmacSha256 = HmacMac<Sha256>;
pub type HmacSha384 = HmacMac<Sha384>;
pub type HmacSha512 = HmacMac<Sha512>;

impl<D> HmacMac<D>
where
    D: Digest + BlockSizeUser,
{
    /// Create an instance keyed with the empty key
    pub fn new(hash_name: &'static str) -> Self {
        let key = Block::<D>::default();
        let inner = <SimpleHmac<D> as hmac::digest::KeyInit>::new(&key);
        Self { hash_name, key, inner }
    }

    // HMAC pads short keys with zeros and hashes long ones; doing it here
    // lets keying go through the infallible block-sized constructor.
    fn normalize_key(key: &[u8]) -> Block<D> {
        let mut block = Block::<D>::default();
        if key.len() <= block.len() {
            block[..key.len()].copy_from_slice(key);
        } else {
            let mut digest = D::digest(key);
            block[..digest.len()].copy_from_slice(&digest);
            digest.as_mut_slice().zeroize();
        }
        block
    }

    fn fresh(&self) -> SimpleHmac<D> {
        <SimpleHmac<D> as hmac::digest::KeyInit>::new(&self.key)
    }
}

impl HmacSha256 {
    pub fn sha256() -> Self {
        Self::new("SHA-256")
    }
}

impl HmacSha384 {
    pub fn sha384() -> Self {
        Self::new("SHA-384")
    }
}

impl HmacSha512 {
    pub fn sha512() -> Self {
        Self::new("SHA-512")
    }
}

impl<D> MessageAuthCode for HmacMac<D>
where
    D: Digest + BlockSizeUser + Send,
{
    fn name(&self) -> String {
        format!("HMAC({})", self.hash_name)
    }

    fn output_length(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn set_key(&mut self, key: &[u8]) {
        self.key.as_mut_slice().zeroize();
        self.key = Self::normalize_key(key);
        self.inner = self.fresh();
    }

    fn update(&mut self, data: &[u8]) {
        Mac::update(&mut self.inner, data);
    }

    fn finalize_into(&mut self, out: &mut [u8]) {
        let fresh = self.fresh();
        let mac = std::mem::replace(&mut self.inner, fresh);
        let mut tag = Mac::finalize(mac).into_bytes();
        out.copy_from_slice(&tag);
        tag.as_mut_slice().zeroize();
    }

    fn clear(&mut self) {
        self.key.as_mut_slice().zeroize();
        self.inner = self.fresh();
    }
}

impl<D> Drop for HmacMac<D>
where
    D: Digest + BlockSizeUser,
{
    fn drop(&mut self) {
        self.key.as_mut_slice().zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(data: &[u8]) -> String {
        crate::encoding::encode_hex(data)
    }

    #[test]
    fn test_rfc4231_case_1() {
        let mut mac = HmacSha256::sha256();
        mac.set_key(&[0x0b; 20]);
        mac.update(b"Hi There");
        assert_eq!(
            hex(&mac.finalize()),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }

    #[test]
    fn test_rfc4231_case_2_incremental() {
        let mut mac = HmacSha512::sha512();
        mac.set_key(b"Jefe");
        mac.update(b"what do ya want ");
        mac.update(b"for nothing?");
        assert_eq!(
            hex(&mac.finalize()),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea250554\
             9758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_long_key_is_hashed() {
        // RFC 4231 test case 6: 131-byte key
        let mut mac = HmacSha256::sha256();
        mac.set_key(&[0xaa; 131]);
        mac.update(b"Test Using Larger Than Block-Size Key - Hash Key First");
        assert_eq!(
            hex(&mac.finalize()),
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    #[test]
    fn test_finalize_resets_accumulation() {
        let mut mac = HmacSha256::sha256();
        mac.set_key(b"key");
        mac.update(b"first");
        let first = mac.finalize();
        mac.update(b"first");
        assert_eq!(first, mac.finalize());
    }

    #[test]
    fn test_set_key_discards_pending_input() {
        let mut a = HmacSha256::sha256();
        a.update(b"stale");
        a.set_key(b"key");
        a.update(b"msg");

        let mut b = HmacSha256::sha256();
        b.set_key(b"key");
        b.update(b"msg");

        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn test_clear_reverts_to_empty_key() {
        let mut cleared = HmacSha384::sha384();
        cleared.set_key(b"secret");
        cleared.clear();
        cleared.update(b"msg");

        let mut empty = HmacSha384::sha384();
        empty.update(b"msg");

        assert_eq!(cleared.finalize(), empty.finalize());
    }

    #[test]
    fn test_names_and_lengths() {
        assert_eq!(HmacSha256::sha256().name(), "HMAC(SHA-256)");
        assert_eq!(HmacSha256::sha256().output_length(), 32);
        assert_eq!(HmacSha384::sha384().output_length(), 48);
        assert_eq!(HmacSha512::sha512().output_length(), 64);
    }
}
