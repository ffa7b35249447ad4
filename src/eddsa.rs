//! Ed25519 and Ed448 signatures (RFC 8032).
//!
//! Signature verification is a public procedure operating on public
//! inputs; unlike the rest of this crate's scalar arithmetic, it is not
//! built to run in constant time.

use crate::curve::{ed25519, ed448};
use crate::eddh::{x25519_clamp, x448_clamp};
use crate::field::scalar::{self, C25519_ORDER, C448_ORDER};
use crate::hash::{Shake256, Sha512};
use crate::util::secure_zero;

/// Ed25519 signatures, keyed with SHA-512.
pub mod ed25519_impl {
    use super::*;

    /// Seed / private key length, in bytes.
    pub const KEY_LENGTH: usize = 32;
    /// Signature length, in bytes.
    pub const SIGNATURE_LENGTH: usize = 64;

    const PH_DOMAIN: &[u8] = b"SigEd25519 no Ed25519 collisions\x01\x00";

    fn sha512(parts: &[&[u8]]) -> [u8; 64] {
        let mut hasher = Sha512::new();
        for part in parts {
            hasher.update(part);
        }
        let mut out = [0u8; 64];
        hasher.finish(&mut out);
        out
    }

    fn reduce_to_scalar(wide: &[u8]) -> [u8; 32] {
        let mut r = [0u8; 32];
        scalar::load(&mut r, wide, &C25519_ORDER);
        r
    }

    fn expand_key(seed: &[u8; KEY_LENGTH]) -> ([u8; 32], [u8; 32]) {
        let mut digest = sha512(&[seed.as_slice()]);
        let mut clamped = [0u8; 32];
        clamped.copy_from_slice(&digest[0..32]);
        x25519_clamp(&mut clamped);

        let s = reduce_to_scalar(&clamped);
        let mut prefix = [0u8; 32];
        prefix.copy_from_slice(&digest[32..64]);
        secure_zero(&mut digest);
        secure_zero(&mut clamped);
        (s, prefix)
    }

    /// Derive the public key matching a private seed.
    pub fn to_public(seed: &[u8; KEY_LENGTH]) -> [u8; 32] {
        let (mut s, mut prefix) = expand_key(seed);
        let public_key = ed25519::Point::base().scalar_mul(&s).compress();
        secure_zero(&mut s);
        secure_zero(&mut prefix);
        public_key
    }

    fn sign_with_domain(
        seed: &[u8; KEY_LENGTH],
        domain: &[u8],
        message: &[u8],
    ) -> [u8; SIGNATURE_LENGTH] {
        let (mut s, mut prefix) = expand_key(seed);
        let public_key = ed25519::Point::base().scalar_mul(&s).compress();

        let mut r = reduce_to_scalar(&sha512(&[domain, prefix.as_slice(), message]));
        secure_zero(&mut prefix);
        let r_point = ed25519::Point::base().scalar_mul(&r).compress();

        let k = reduce_to_scalar(&sha512(&[
            domain,
            r_point.as_slice(),
            public_key.as_slice(),
            message,
        ]));

        let mut sk = [0u8; 32];
        scalar::mul(&mut sk, &s, &k, &C25519_ORDER);
        scalar::add(&mut sk, &r, &C25519_ORDER);
        secure_zero(&mut s);
        secure_zero(&mut r);

        let mut signature = [0u8; SIGNATURE_LENGTH];
        signature[0..32].copy_from_slice(&r_point);
        signature[32..64].copy_from_slice(&sk);
        secure_zero(&mut sk);
        signature
    }

    fn verify_with_domain(
        public_key: &[u8; 32],
        domain: &[u8],
        message: &[u8],
        signature: &[u8; SIGNATURE_LENGTH],
    ) -> bool {
        let a = match ed25519::Point::decompress(public_key) {
            Some(p) => p,
            None => return false,
        };
        let r_point = match ed25519::Point::decompress(&signature[0..32].try_into().unwrap()) {
            Some(p) => p,
            None => return false,
        };
        let s: [u8; 32] = signature[32..64].try_into().unwrap();
        if !scalar::is_reduced(&s, &C25519_ORDER) {
            return false;
        }

        let k = reduce_to_scalar(&sha512(&[
            domain,
            &signature[0..32],
            public_key.as_slice(),
            message,
        ]));

        let lhs = ed25519::Point::base().scalar_mul(&s);
        let rhs = a.scalar_mul(&k).add(&r_point);
        lhs.equals(&rhs)
    }

    /// Sign `message` directly (the "pure" Ed25519 variant).
    pub fn sign(seed: &[u8; KEY_LENGTH], message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        sign_with_domain(seed, &[], message)
    }

    /// Sign a SHA-512 digest of the actual message (the "ph", pre-hashed,
    /// Ed25519 variant).
    pub fn sign_hash(seed: &[u8; KEY_LENGTH], prehashed: &[u8; 64]) -> [u8; SIGNATURE_LENGTH] {
        sign_with_domain(seed, PH_DOMAIN, prehashed)
    }

    /// Verify a "pure" Ed25519 signature over `message`.
    pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; SIGNATURE_LENGTH]) -> bool {
        verify_with_domain(public_key, &[], message, signature)
    }

    /// Verify a "ph" Ed25519 signature over a SHA-512 digest of the
    /// message.
    pub fn verify_hash(
        public_key: &[u8; 32],
        prehashed: &[u8; 64],
        signature: &[u8; SIGNATURE_LENGTH],
    ) -> bool {
        verify_with_domain(public_key, PH_DOMAIN, prehashed, signature)
    }
}

/// Ed448 signatures, keyed with SHAKE256.
pub mod ed448_impl {
    use super::*;

    /// Seed / private key length, in bytes.
    pub const KEY_LENGTH: usize = 57;
    /// Signature length, in bytes.
    pub const SIGNATURE_LENGTH: usize = 114;
    /// Length of the pre-hash digest accepted by [`sign_hash`]/[`verify_hash`].
    pub const HASH_LENGTH: usize = 64;

    const HASH_LEN: usize = 2 * KEY_LENGTH;
    const PH_DOMAIN: &[u8] = b"SigEd448\x01\x00";

    fn shake256(parts: &[&[u8]]) -> [u8; HASH_LEN] {
        let mut hasher = Shake256::new();
        for part in parts {
            hasher.update(part);
        }
        let mut out = [0u8; HASH_LEN];
        hasher.generate(&mut out);
        out
    }

    fn reduce_to_scalar(wide: &[u8]) -> [u8; 56] {
        let mut r = [0u8; 56];
        scalar::load(&mut r, wide, &C448_ORDER);
        r
    }

    fn expand_key(seed: &[u8; KEY_LENGTH]) -> ([u8; 56], [u8; KEY_LENGTH]) {
        let mut digest = shake256(&[seed.as_slice()]);
        let mut clamped = [0u8; 56];
        clamped.copy_from_slice(&digest[0..56]);
        x448_clamp(&mut clamped);

        let s = reduce_to_scalar(&clamped);
        let mut prefix = [0u8; KEY_LENGTH];
        prefix.copy_from_slice(&digest[56..HASH_LEN]);
        secure_zero(&mut digest);
        secure_zero(&mut clamped);
        (s, prefix)
    }

    fn point_from_scalar(s: &[u8; 56]) -> ed448::Point {
        ed448::Point::base().scalar_mul(s)
    }

    /// Derive the public key matching a private seed.
    pub fn to_public(seed: &[u8; KEY_LENGTH]) -> [u8; KEY_LENGTH] {
        let (mut s, mut prefix) = expand_key(seed);
        let public_key = point_from_scalar(&s).compress();
        secure_zero(&mut s);
        secure_zero(&mut prefix);
        public_key
    }

    fn sign_with_domain(
        seed: &[u8; KEY_LENGTH],
        domain: &[u8],
        message: &[u8],
    ) -> [u8; SIGNATURE_LENGTH] {
        let (mut s, mut prefix) = expand_key(seed);
        let public_key = point_from_scalar(&s).compress();

        let mut r = reduce_to_scalar(&shake256(&[domain, prefix.as_slice(), message]));
        secure_zero(&mut prefix);
        let r_point = point_from_scalar(&r).compress();

        let k = reduce_to_scalar(&shake256(&[
            domain,
            r_point.as_slice(),
            public_key.as_slice(),
            message,
        ]));

        let mut sk = [0u8; 56];
        scalar::mul(&mut sk, &s, &k, &C448_ORDER);
        scalar::add(&mut sk, &r, &C448_ORDER);
        secure_zero(&mut s);
        secure_zero(&mut r);

        let mut signature = [0u8; SIGNATURE_LENGTH];
        signature[0..KEY_LENGTH].copy_from_slice(&r_point);
        signature[KEY_LENGTH..KEY_LENGTH + 56].copy_from_slice(&sk);
        signature[SIGNATURE_LENGTH - 1] = 0x00;
        secure_zero(&mut sk);
        signature
    }

    fn verify_with_domain(
        public_key: &[u8; KEY_LENGTH],
        domain: &[u8],
        message: &[u8],
        signature: &[u8; SIGNATURE_LENGTH],
    ) -> bool {
        if signature[SIGNATURE_LENGTH - 1] & 0xFE != 0 {
            return false;
        }

        let r_bytes: [u8; KEY_LENGTH] = signature[0..KEY_LENGTH].try_into().unwrap();
        let a = match ed448::Point::decompress(public_key) {
            Some(p) => p,
            None => return false,
        };
        let r_point = match ed448::Point::decompress(&r_bytes) {
            Some(p) => p,
            None => return false,
        };
        let mut s = [0u8; 56];
        s.copy_from_slice(&signature[KEY_LENGTH..KEY_LENGTH + 56]);
        if !scalar::is_reduced(&s, &C448_ORDER) {
            return false;
        }

        let k = reduce_to_scalar(&shake256(&[
            domain,
            r_bytes.as_slice(),
            public_key.as_slice(),
            message,
        ]));

        let lhs = point_from_scalar(&s);
        let rhs = a.scalar_mul(&k).add(&r_point);
        lhs.equals(&rhs)
    }

    /// Sign `message` directly (the "pure" Ed448 variant).
    pub fn sign(seed: &[u8; KEY_LENGTH], message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        sign_with_domain(seed, &[], message)
    }

    /// Sign a SHAKE256 pre-hash of the actual message (the "ph" Ed448
    /// variant).
    pub fn sign_hash(
        seed: &[u8; KEY_LENGTH],
        prehashed: &[u8; HASH_LENGTH],
    ) -> [u8; SIGNATURE_LENGTH] {
        sign_with_domain(seed, PH_DOMAIN, prehashed)
    }

    /// Verify a "pure" Ed448 signature over `message`.
    pub fn verify(
        public_key: &[u8; KEY_LENGTH],
        message: &[u8],
        signature: &[u8; SIGNATURE_LENGTH],
    ) -> bool {
        verify_with_domain(public_key, &[], message, signature)
    }

    /// Verify a "ph" Ed448 signature over a SHAKE256 pre-hash of the
    /// message.
    pub fn verify_hash(
        public_key: &[u8; KEY_LENGTH],
        prehashed: &[u8; HASH_LENGTH],
        signature: &[u8; SIGNATURE_LENGTH],
    ) -> bool {
        verify_with_domain(public_key, PH_DOMAIN, prehashed, signature)
    }
}

pub use ed25519_impl as ed25519_sig;
pub use ed448_impl as ed448_sig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ed25519_sign_then_verify_round_trips() {
        let seed = [0x42u8; 32];
        let public_key = ed25519_impl::to_public(&seed);
        let message = b"the quick brown fox";

        let signature = ed25519_impl::sign(&seed, message);
        assert!(ed25519_impl::verify(&public_key, message, &signature));
    }

    #[test]
    fn ed25519_verify_rejects_tampered_message() {
        let seed = [0x07u8; 32];
        let public_key = ed25519_impl::to_public(&seed);
        let signature = ed25519_impl::sign(&seed, b"original message");

        assert!(!ed25519_impl::verify(&public_key, b"tampered message", &signature));
    }

    #[test]
    fn ed25519_ph_sign_then_verify_round_trips() {
        let seed = [0x11u8; 32];
        let public_key = ed25519_impl::to_public(&seed);
        let prehashed = [0x99u8; 64];

        let signature = ed25519_impl::sign_hash(&seed, &prehashed);
        assert!(ed25519_impl::verify_hash(&public_key, &prehashed, &signature));
    }

    #[test]
    fn ed448_sign_then_verify_round_trips() {
        let seed = [0x5Au8; 57];
        let public_key = ed448_impl::to_public(&seed);
        let message = b"lorem ipsum dolor sit amet";

        let signature = ed448_impl::sign(&seed, message);
        assert!(ed448_impl::verify(&public_key, message, &signature));
    }

    #[test]
    fn ed25519_verify_rejects_unreduced_s() {
        let seed = [0x21u8; 32];
        let public_key = ed25519_impl::to_public(&seed);
        let mut signature = ed25519_impl::sign(&seed, b"message");
        // Adding the group order to S keeps R unchanged but violates S < L.
        signature[32..64].copy_from_slice(&C25519_ORDER);

        assert!(!ed25519_impl::verify(&public_key, b"message", &signature));
    }

    #[test]
    fn ed448_verify_rejects_nonzero_top_bits_in_last_byte() {
        let seed = [0x44u8; 57];
        let public_key = ed448_impl::to_public(&seed);
        let mut signature = ed448_impl::sign(&seed, b"message");
        signature[113] = 0x02;

        assert!(!ed448_impl::verify(&public_key, b"message", &signature));
    }

    #[test]
    fn ed448_verify_rejects_tampered_signature() {
        let seed = [0x33u8; 57];
        let public_key = ed448_impl::to_public(&seed);
        let mut signature = ed448_impl::sign(&seed, b"message");
        signature[0] ^= 1;

        assert!(!ed448_impl::verify(&public_key, b"message", &signature));
    }
}
