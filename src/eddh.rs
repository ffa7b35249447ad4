//! X25519 and X448 Diffie-Hellman key agreement (RFC 7748), via the
//! Montgomery ladder over the `u`-coordinate.

use crate::bigint::{Bigint256, Bigint448};
use crate::field::{fp25519, fp448};
use crate::util::secure_zero;

/// `a24 = (A-2)/4` for Curve25519's Montgomery form (`A = 486662`).
const X25519_A24: u32 = 121665;
/// `u`-coordinate of the Curve25519 base point.
const X25519_U: u32 = 9;
const X25519_BITS: usize = 255;

/// `a24 = (A-2)/4` for Curve448's Montgomery form (`A = 156326`).
const X448_A24: u32 = 39081;
/// `u`-coordinate of the Curve448 base point.
const X448_U: u32 = 5;
const X448_BITS: usize = 448;

/// Key/shared-secret length for X25519, in bytes.
pub const X25519_KEY_LENGTH: usize = 32;
/// Key/shared-secret length for X448, in bytes.
pub const X448_KEY_LENGTH: usize = 56;

fn x25519_ladder(scalar: &[u8; 32], u: &Bigint256) -> Bigint256 {
    let x1 = u.clone();
    let mut x2 = Bigint256::from_u32(1);
    let mut z2 = Bigint256::zero();
    let mut x3 = u.clone();
    let mut z3 = Bigint256::from_u32(1);
    let mut swap = false;

    for t in (0..X25519_BITS).rev() {
        let bit = ((scalar[t / 8] >> (t % 8)) & 1) == 1;
        swap ^= bit;
        Bigint256::cswap(swap, &mut x2, &mut x3);
        Bigint256::cswap(swap, &mut z2, &mut z3);
        swap = bit;

        let mut a = Bigint256::zero();
        fp25519::add(&mut a, &x2, &z2);
        let mut aa = Bigint256::zero();
        fp25519::mul(&mut aa, &a, &a);

        let mut b = Bigint256::zero();
        fp25519::sub(&mut b, &x2, &z2);
        let mut bb = Bigint256::zero();
        fp25519::mul(&mut bb, &b, &b);

        let mut e = Bigint256::zero();
        fp25519::sub(&mut e, &aa, &bb);

        let mut c = Bigint256::zero();
        fp25519::add(&mut c, &x3, &z3);
        let mut d = Bigint256::zero();
        fp25519::sub(&mut d, &x3, &z3);

        let mut da = Bigint256::zero();
        fp25519::mul(&mut da, &d, &a);
        let mut cb = Bigint256::zero();
        fp25519::mul(&mut cb, &c, &b);

        let mut sum = Bigint256::zero();
        fp25519::add(&mut sum, &da, &cb);
        fp25519::mul(&mut x3, &sum, &sum);

        let mut diff = Bigint256::zero();
        fp25519::sub(&mut diff, &da, &cb);
        let mut diff_sq = Bigint256::zero();
        fp25519::mul(&mut diff_sq, &diff, &diff);
        fp25519::mul(&mut z3, &x1.clone(), &diff_sq);

        fp25519::mul(&mut x2, &aa, &bb);

        let mut a24e = Bigint256::zero();
        fp25519::mul(&mut a24e, &Bigint256::from_u32(X25519_A24), &e);
        let mut inner = Bigint256::zero();
        fp25519::add(&mut inner, &aa, &a24e);
        fp25519::mul(&mut z2, &e, &inner);
    }

    Bigint256::cswap(swap, &mut x2, &mut x3);
    Bigint256::cswap(swap, &mut z2, &mut z3);

    let mut z_inv = Bigint256::zero();
    fp25519::inv(&mut z_inv, &z2);
    let mut out = Bigint256::zero();
    fp25519::mul(&mut out, &x2, &z_inv);
    fp25519::normalize(&mut out);
    out
}

pub(crate) fn x25519_clamp(scalar: &mut [u8; 32]) {
    scalar[0] &= 0xF8;
    scalar[31] = (scalar[31] & 0x3F) | 0x40;
}

/// Derive the public key matching a X25519 private scalar.
pub fn x25519_to_public(private: &[u8; 32]) -> [u8; 32] {
    let mut scalar = *private;
    x25519_clamp(&mut scalar);
    let u = Bigint256::from_u32(X25519_U);
    let result = x25519_ladder(&scalar, &u);
    secure_zero(&mut scalar);
    let mut out = [0u8; 32];
    result.to_le_bytes(&mut out);
    out
}

/// Compute an X25519 shared secret from a private scalar and a peer's
/// public `u`-coordinate.
pub fn x25519_compute(private: &[u8; 32], peer_public: &[u8; 32]) -> [u8; 32] {
    let mut scalar = *private;
    x25519_clamp(&mut scalar);
    let u = Bigint256::from_le_bytes(peer_public);
    let result = x25519_ladder(&scalar, &u);
    secure_zero(&mut scalar);
    let mut out = [0u8; 32];
    result.to_le_bytes(&mut out);
    out
}

fn x448_ladder(scalar: &[u8; 56], u: &Bigint448) -> Bigint448 {
    let x1 = u.clone();
    let mut x2 = Bigint448::from_u32(1);
    let mut z2 = Bigint448::zero();
    let mut x3 = u.clone();
    let mut z3 = Bigint448::from_u32(1);
    let mut swap = false;

    for t in (0..X448_BITS).rev() {
        let bit = ((scalar[t / 8] >> (t % 8)) & 1) == 1;
        swap ^= bit;
        Bigint448::cswap(swap, &mut x2, &mut x3);
        Bigint448::cswap(swap, &mut z2, &mut z3);
        swap = bit;

        let mut a = Bigint448::zero();
        fp448::add(&mut a, &x2, &z2);
        let mut aa = Bigint448::zero();
        fp448::mul(&mut aa, &a, &a);

        let mut neg_z2 = Bigint448::zero();
        fp448::neg(&mut neg_z2, &z2);
        let mut b = Bigint448::zero();
        fp448::add(&mut b, &x2, &neg_z2);
        let mut bb = Bigint448::zero();
        fp448::mul(&mut bb, &b, &b);

        let mut neg_bb = Bigint448::zero();
        fp448::neg(&mut neg_bb, &bb);
        let mut e = Bigint448::zero();
        fp448::add(&mut e, &aa, &neg_bb);

        let mut c = Bigint448::zero();
        fp448::add(&mut c, &x3, &z3);
        let mut neg_z3 = Bigint448::zero();
        fp448::neg(&mut neg_z3, &z3);
        let mut d = Bigint448::zero();
        fp448::add(&mut d, &x3, &neg_z3);

        let mut da = Bigint448::zero();
        fp448::mul(&mut da, &d, &a);
        let mut cb = Bigint448::zero();
        fp448::mul(&mut cb, &c, &b);

        let mut sum = Bigint448::zero();
        fp448::add(&mut sum, &da, &cb);
        fp448::mul(&mut x3, &sum, &sum);

        let mut neg_cb = Bigint448::zero();
        fp448::neg(&mut neg_cb, &cb);
        let mut diff = Bigint448::zero();
        fp448::add(&mut diff, &da, &neg_cb);
        let mut diff_sq = Bigint448::zero();
        fp448::mul(&mut diff_sq, &diff, &diff);
        fp448::mul(&mut z3, &x1.clone(), &diff_sq);

        fp448::mul(&mut x2, &aa, &bb);

        let mut a24e = Bigint448::zero();
        fp448::mul(&mut a24e, &Bigint448::from_u32(X448_A24), &e);
        let mut inner = Bigint448::zero();
        fp448::add(&mut inner, &aa, &a24e);
        fp448::mul(&mut z2, &e, &inner);
    }

    Bigint448::cswap(swap, &mut x2, &mut x3);
    Bigint448::cswap(swap, &mut z2, &mut z3);

    let mut z_inv = Bigint448::zero();
    fp448::inv(&mut z_inv, &z2);
    let mut out = Bigint448::zero();
    fp448::mul(&mut out, &x2, &z_inv);
    let (out, _) = fp448::normalize(&out);
    out
}

pub(crate) fn x448_clamp(scalar: &mut [u8; 56]) {
    scalar[0] &= 0xFC;
    scalar[55] |= 0x80;
}

pub(crate) fn bigint448_from_bytes(bytes: &[u8; 56]) -> Bigint448 {
    let mut w = [0u32; 14];
    for i in 0..14 {
        w[i] = u32::from_le_bytes([
            bytes[4 * i],
            bytes[4 * i + 1],
            bytes[4 * i + 2],
            bytes[4 * i + 3],
        ]);
    }
    Bigint448 { w }
}

pub(crate) fn bigint448_to_bytes(x: &Bigint448, out: &mut [u8; 56]) {
    for i in 0..14 {
        out[4 * i..4 * i + 4].copy_from_slice(&x.w[i].to_le_bytes());
    }
}

/// Derive the public key matching a X448 private scalar.
pub fn x448_to_public(private: &[u8; 56]) -> [u8; 56] {
    let mut scalar = *private;
    x448_clamp(&mut scalar);
    let u = Bigint448::from_u32(X448_U);
    let result = x448_ladder(&scalar, &u);
    secure_zero(&mut scalar);
    let mut out = [0u8; 56];
    bigint448_to_bytes(&result, &mut out);
    out
}

/// Compute an X448 shared secret from a private scalar and a peer's
/// public `u`-coordinate.
pub fn x448_compute(private: &[u8; 56], peer_public: &[u8; 56]) -> [u8; 56] {
    let mut scalar = *private;
    x448_clamp(&mut scalar);
    let u = bigint448_from_bytes(peer_public);
    let result = x448_ladder(&scalar, &u);
    secure_zero(&mut scalar);
    let mut out = [0u8; 56];
    bigint448_to_bytes(&result, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x25519_shared_secret_is_symmetric() {
        let mut alice_private = [0u8; 32];
        for (i, b) in alice_private.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut bob_private = [0u8; 32];
        for (i, b) in bob_private.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(3);
        }

        let alice_public = x25519_to_public(&alice_private);
        let bob_public = x25519_to_public(&bob_private);

        let shared_from_alice = x25519_compute(&alice_private, &bob_public);
        let shared_from_bob = x25519_compute(&bob_private, &alice_public);

        assert_eq!(shared_from_alice, shared_from_bob);
    }

    #[test]
    fn x448_shared_secret_is_symmetric() {
        let mut alice_private = [0u8; 56];
        for (i, b) in alice_private.iter_mut().enumerate() {
            *b = i as u8;
        }
        let mut bob_private = [0u8; 56];
        for (i, b) in bob_private.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(11).wrapping_add(5);
        }

        let alice_public = x448_to_public(&alice_private);
        let bob_public = x448_to_public(&bob_private);

        let shared_from_alice = x448_compute(&alice_private, &bob_public);
        let shared_from_bob = x448_compute(&bob_private, &alice_public);

        assert_eq!(shared_from_alice, shared_from_bob);
    }

    #[test]
    fn x25519_clamping_normalizes_low_order_scalar() {
        let zero_private = [0u8; 32];
        let public = x25519_to_public(&zero_private);
        // A clamped all-zero scalar is still a valid, nonzero multiplier.
        assert!(public.iter().any(|&b| b != 0));
    }
}
