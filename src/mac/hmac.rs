//! Generic HMAC over any [`crate::hash::Hash`] implementation.

use crate::hash::Hash;
use crate::util::secure_zero;

/// Largest block size among the hashes this crate supports (SHA-512's 128
/// bytes); `Hmac` keeps a fixed buffer this large and only uses the
/// `H::BLOCK`-byte prefix, since stable Rust cannot size an array from a
/// generic trait constant.
const MAX_BLOCK: usize = 128;

/// HMAC, parameterized by the inner hash `H`.
pub struct Hmac<H: Hash> {
    key_block: [u8; MAX_BLOCK],
    inner: H,
}

impl<H: Hash> Hmac<H> {
    /// Initialize with `key` of arbitrary length.
    pub fn new(key: &[u8]) -> Self {
        let mut key_block = [0u8; MAX_BLOCK];

        if key.len() > H::BLOCK {
            let mut h = H::default();
            h.update(key);
            h.finish_into(&mut key_block[..H::OUTPUT]);
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut ipad = [0u8; MAX_BLOCK];
        for i in 0..H::BLOCK {
            ipad[i] = key_block[i] ^ 0x36;
        }

        let mut inner = H::default();
        inner.update(&ipad[..H::BLOCK]);
        secure_zero(&mut ipad[..H::BLOCK]);

        Hmac { key_block, inner }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize into `out`, which must be exactly `H::OUTPUT` bytes.
    pub fn finish(mut self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), H::OUTPUT);

        let mut inner_digest = [0u8; 64];
        self.inner.finish_into(&mut inner_digest[..H::OUTPUT]);

        let mut opad = [0u8; MAX_BLOCK];
        for i in 0..H::BLOCK {
            opad[i] = self.key_block[i] ^ 0x36 ^ 0x5C;
        }

        let mut outer = H::default();
        outer.update(&opad[..H::BLOCK]);
        outer.update(&inner_digest[..H::OUTPUT]);
        outer.finish_into(out);

        secure_zero(&mut opad[..H::BLOCK]);
        secure_zero(&mut inner_digest[..H::OUTPUT]);
        secure_zero(&mut self.key_block);
    }
}

impl<H: Hash> Drop for Hmac<H> {
    fn drop(&mut self) {
        secure_zero(&mut self.key_block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha256;

    #[test]
    fn rfc4231_test_case_1() {
        let key = [0x0bu8; 20];
        let data = b"Hi There";
        let mut mac = Hmac::<Sha256>::new(&key);
        mac.update(data);
        let mut out = [0u8; 32];
        mac.finish(&mut out);

        let expected = [
            0xb0, 0x34, 0x4c, 0x61, 0xd8, 0xdb, 0x38, 0x53, 0x5c, 0xa8, 0xaf, 0xce, 0xaf, 0x0b,
            0xf1, 0x2b, 0x88, 0x1d, 0xc2, 0x00, 0xc9, 0x83, 0x3d, 0xa7, 0x26, 0xe9, 0x37, 0x6c,
            0x2e, 0x32, 0xcf, 0xf7,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn handles_keys_longer_than_block_size() {
        let key = [0xaa; 200];
        let mut a = Hmac::<Sha256>::new(&key);
        a.update(b"data");
        let mut out_a = [0u8; 32];
        a.finish(&mut out_a);

        // a key longer than the block size must be hashed down first;
        // re-deriving it manually should match.
        let hashed_key = Sha256::digest(&key);
        let mut b = Hmac::<Sha256>::new(&hashed_key);
        b.update(b"data");
        let mut out_b = [0u8; 32];
        b.finish(&mut out_b);

        assert_eq!(out_a, out_b);
    }
}
