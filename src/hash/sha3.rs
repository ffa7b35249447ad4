//! SHA-3, SHAKE and KMAC, all built over the [`super::keccak`] sponge core.

use super::keccak::KeccakState;

/// Fixed-output SHA-3 instance, parameterized by digest length in bytes.
pub struct Sha3<const DIGEST: usize> {
    k: KeccakState,
    ptr: usize,
}

const fn sha3_rate(digest: usize) -> usize {
    200 - 2 * digest
}

impl<const DIGEST: usize> Sha3<DIGEST> {
    pub const fn new() -> Self {
        Sha3 { k: KeccakState::new(), ptr: 0 }
    }

    pub fn reset(&mut self) {
        self.k.reset();
        self.ptr = 0;
    }

    pub fn update(&mut self, data: &[u8]) {
        self.k.consume(&mut self.ptr, sha3_rate(DIGEST), data);
    }

    pub fn finish(mut self, digest: &mut [u8; DIGEST]) {
        self.k.finish(&mut self.ptr, sha3_rate(DIGEST), 0x06);
        self.k.produce(&mut self.ptr, sha3_rate(DIGEST), digest);
    }

    pub fn digest(data: &[u8]) -> [u8; DIGEST] {
        let mut ctx = Self::new();
        ctx.update(data);
        let mut out = [0u8; DIGEST];
        ctx.finish(&mut out);
        out
    }
}

pub type Sha3_256 = Sha3<32>;
pub type Sha3_512 = Sha3<64>;

/// SHAKE extensible-output function, parameterized by the security level in
/// bytes (16 for SHAKE128, 32 for SHAKE256).
pub struct Shake<const SECURITY: usize> {
    k: KeccakState,
    ptr: usize,
    generating: bool,
}

const fn shake_rate(security: usize) -> usize {
    200 - 2 * security
}

impl<const SECURITY: usize> Shake<SECURITY> {
    pub const fn new() -> Self {
        Shake { k: KeccakState::new(), ptr: 0, generating: false }
    }

    pub fn reset(&mut self) {
        self.k.reset();
        self.ptr = 0;
        self.generating = false;
    }

    /// Absorb more input. Only valid before the first call to `generate`.
    pub fn update(&mut self, data: &[u8]) {
        debug_assert!(!self.generating, "SHAKE update() after generate() has started");
        self.k.consume(&mut self.ptr, shake_rate(SECURITY), data);
    }

    /// Squeeze the next `output.len()` bytes. The first call transitions
    /// from absorbing to squeezing; any prefix of a longer `generate` call
    /// equals the same prefix split across several shorter calls.
    pub fn generate(&mut self, output: &mut [u8]) {
        if !self.generating {
            self.k.finish(&mut self.ptr, shake_rate(SECURITY), 0x1F);
            self.generating = true;
        }
        self.k.produce(&mut self.ptr, shake_rate(SECURITY), output);
    }
}

pub type Shake128 = Shake<16>;
pub type Shake256 = Shake<32>;

fn cshake_rate(variant_security: usize) -> usize {
    200 - 2 * variant_security
}

/// cSHAKE-prefixed absorb of `bytepad(encode_string("KMAC") || encode_string(""), rate)`.
fn kmac_prefix(k: &mut KeccakState, ptr: &mut usize, rate: usize) {
    push_rate(k, ptr, rate);
    // encode_string("KMAC") || encode_string("")
    const PREFIX: [u8; 8] = [0x01, 0x20, 0x4B, 0x4D, 0x41, 0x43, 0x01, 0x00];
    k.consume(ptr, rate, &PREFIX);
    k.finish_no_pad_permute();
    *ptr = 0;
}

fn push_rate(k: &mut KeccakState, ptr: &mut usize, rate: usize) {
    let buf = [0x01u8, rate as u8];
    k.consume(ptr, rate, &buf);
}

fn encoded_length(x: u64) -> u8 {
    let mut x = x | 1;
    let mut r = 0u8;
    while x != 0 {
        r += 1;
        x >>= 8;
    }
    r
}

fn left_encode(k: &mut KeccakState, ptr: &mut usize, rate: usize, x: u64) {
    let l = encoded_length(x) as usize;
    let mut buf = [0u8; 9];
    buf[0] = l as u8;
    let mut v = x;
    for i in (1..=l).rev() {
        buf[i] = v as u8;
        v >>= 8;
    }
    k.consume(ptr, rate, &buf[..=l]);
}

fn right_encode(k: &mut KeccakState, ptr: &mut usize, rate: usize, x: u64) {
    let l = encoded_length(x) as usize;
    let mut buf = [0u8; 9];
    buf[l] = l as u8;
    let mut v = x;
    for i in (0..l).rev() {
        buf[i] = v as u8;
        v >>= 8;
    }
    k.consume(ptr, rate, &buf[..=l]);
}

/// KMAC, parameterized by the underlying cSHAKE security level in bytes
/// (16 for KMAC128, 32 for KMAC256).
pub struct Kmac<const SECURITY: usize> {
    k: KeccakState,
    ptr: usize,
    mac_len: usize,
}

impl<const SECURITY: usize> Kmac<SECURITY> {
    /// Initialize with `key` and a target MAC length in bytes.
    pub fn new(key: &[u8], mac_len: usize) -> Self {
        let rate = cshake_rate(SECURITY);
        let mut k = KeccakState::new();
        let mut ptr = 0usize;

        kmac_prefix(&mut k, &mut ptr, rate);

        push_rate(&mut k, &mut ptr, rate);
        left_encode(&mut k, &mut ptr, rate, (key.len() as u64) * 8);
        k.consume(&mut ptr, rate, key);
        if ptr != 0 {
            k.finish_no_pad_permute();
            ptr = 0;
        }

        Kmac { k, ptr, mac_len }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.k.consume(&mut self.ptr, cshake_rate(SECURITY), data);
    }

    pub fn finish(mut self, mac: &mut [u8]) {
        debug_assert_eq!(mac.len(), self.mac_len);
        let rate = cshake_rate(SECURITY);
        right_encode(&mut self.k, &mut self.ptr, rate, (self.mac_len as u64) * 8);
        self.k.finish(&mut self.ptr, rate, 0x04);
        self.k.produce(&mut self.ptr, rate, mac);
    }
}

pub type Kmac128 = Kmac<16>;
pub type Kmac256 = Kmac<32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha3_256_empty() {
        let d = Sha3_256::digest(b"");
        let expected = [
            0xa7, 0xff, 0xc6, 0xf8, 0xbf, 0x1e, 0xd7, 0x66, 0x51, 0xc1, 0x47, 0x56, 0xa0, 0x61,
            0xd6, 0x62, 0xf5, 0x80, 0xff, 0x4d, 0xe4, 0x3b, 0x49, 0xfa, 0x82, 0xd8, 0x0a, 0x4b,
            0x80, 0xf8, 0x43, 0x4a,
        ];
        assert_eq!(d, expected);
    }

    #[test]
    fn shake128_chunked_matches_single_shot() {
        let mut one = Shake128::new();
        one.update(b"abc");
        let mut out_one = [0u8; 64];
        one.generate(&mut out_one);

        let mut chunked = Shake128::new();
        chunked.update(b"abc");
        let mut out_chunked = [0u8; 64];
        chunked.generate(&mut out_chunked[..20]);
        chunked.generate(&mut out_chunked[20..]);

        assert_eq!(out_one, out_chunked);
    }
}
