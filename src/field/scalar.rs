//! Arithmetic modulo an arbitrary runtime modulus, used for the Curve25519
//! and Curve448 scalar (group order) fields.
//!
//! Unlike [`super::fp25519`] and [`super::fp448`], the modulus here is not
//! baked into the implementation: it is passed in as a little-endian byte
//! slice so the same code serves both curves' orders.

use crate::util::secure_zero;

/// Largest modulus this module supports, in bytes (Curve448's order).
const MAX_LEN: usize = 56;

fn select(out: &mut [u8], condition: bool, v_false: &[u8], v_true: &[u8]) {
    let mask = 0u8.wrapping_sub(condition as u8);
    for i in 0..out.len() {
        let diff = v_false[i] ^ v_true[i];
        out[i] = v_false[i] ^ (diff & mask);
    }
}

fn try_sub(x: &mut [u8], modulus: &[u8]) {
    let len = x.len();
    let mut minus = [0u8; MAX_LEN];
    let mut borrow: i32 = 0;
    for i in 0..len {
        let diff = x[i] as i32 - modulus[i] as i32 - borrow;
        minus[i] = diff as u8;
        borrow = if diff < 0 { 1 } else { 0 };
    }

    let take_minus = borrow == 0;
    let mut result = [0u8; MAX_LEN];
    select(&mut result[..len], take_minus, x, &minus[..len]);
    x.copy_from_slice(&result[..len]);
    secure_zero(&mut minus[..len]);
}

/// `true` if `x < modulus`, both read as little-endian integers of equal
/// length. Used to range-check scalars parsed off the wire (signature `S`
/// values) before they are used; variable-time, since the inputs here are
/// public by construction.
pub fn is_reduced(x: &[u8], modulus: &[u8]) -> bool {
    let mut borrow: i32 = 0;
    for i in 0..x.len() {
        let diff = x[i] as i32 - modulus[i] as i32 - borrow;
        borrow = if diff < 0 { 1 } else { 0 };
    }
    borrow == 1
}

fn raw_add(x: &mut [u8], a: &[u8]) {
    let mut carry: u32 = 0;
    for i in 0..x.len() {
        let sum = x[i] as u32 + a[i] as u32 + carry;
        x[i] = sum as u8;
        carry = sum >> 8;
    }
}

fn shift_left_one(x: &mut [u8]) {
    let mut carry: u8 = 0;
    for b in x.iter_mut() {
        let next_carry = *b >> 7;
        *b = (*b << 1) | carry;
        carry = next_carry;
    }
}

/// Index (from 0) of the highest set bit of `modulus`, scanning in
/// variable time: the modulus is a public constant, never secret.
fn msb_index(modulus: &[u8]) -> i32 {
    let mut i = modulus.len() as isize - 1;
    while i >= 0 && modulus[i as usize] == 0 {
        i -= 1;
    }
    let mut x = modulus[i as usize];
    let mut bit = (i as i32) << 3;
    while x != 0 {
        x >>= 1;
        bit += 1;
    }
    bit - 1
}

/// `r = (r + a) mod modulus`.
pub fn add(r: &mut [u8], a: &[u8], modulus: &[u8]) {
    raw_add(r, a);
    try_sub(r, modulus);
}

/// Load an arbitrary-length big-endian-free (little-endian, arbitrarily
/// long) integer `data`, reducing it modulo `modulus` one bit at a time.
/// `r.len()` must equal `modulus.len()`.
pub fn load(r: &mut [u8], data: &[u8], modulus: &[u8]) {
    for b in r.iter_mut() {
        *b = 0;
    }

    let total_bits = data.len() * 8;
    for i in (0..total_bits).rev() {
        let bit = (data[i / 8] >> (i % 8)) & 1;

        shift_left_one(r);
        r[0] |= bit;
        try_sub(r, modulus);
    }
}

/// `r = (a * b) mod modulus`. `r` must not alias `a` or `b`.
pub fn mul(r: &mut [u8], a: &[u8], b: &[u8], modulus: &[u8]) {
    let len = modulus.len();
    for w in r.iter_mut() {
        *w = 0;
    }

    let msb = msb_index(modulus);
    for i in (0..=msb).rev() {
        let bit = (b[(i >> 3) as usize] >> (i & 7)) & 1;

        shift_left_one(r);
        try_sub(r, modulus);

        let mut plus_a = [0u8; MAX_LEN];
        plus_a[..len].copy_from_slice(&r[..len]);
        add(&mut plus_a[..len], a, modulus);

        let mut selected = [0u8; MAX_LEN];
        select(&mut selected[..len], bit == 1, r, &plus_a[..len]);
        r[..len].copy_from_slice(&selected[..len]);
    }
}

/// Order of the Curve25519 elliptic curve group (`L`, little-endian).
pub const C25519_ORDER: [u8; 32] = [
    0xED, 0xD3, 0xF5, 0x5C, 0x1A, 0x63, 0x12, 0x58, 0xD6, 0x9C, 0xF7, 0xA2, 0xDE, 0xF9, 0xDE, 0x14,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
];

/// Order of the Curve448 elliptic curve group (little-endian).
pub const C448_ORDER: [u8; 56] = [
    0xF3, 0x44, 0x58, 0xAB, 0x92, 0xC2, 0x78, 0x23, 0x55, 0x8F, 0xC5, 0x8D, 0x72, 0xC2, 0x6C, 0x21,
    0x90, 0x36, 0xD6, 0xAE, 0x49, 0xDB, 0x4E, 0xC4, 0xE9, 0x23, 0xCA, 0x7C, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x3F,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_wraps_at_modulus() {
        let modulus = [5u8, 0, 0, 0];
        let mut r = [4u8, 0, 0, 0];
        add(&mut r, &[2, 0, 0, 0], &modulus);
        assert_eq!(r, [1u8, 0, 0, 0]);
    }

    #[test]
    fn load_reduces_large_input() {
        let modulus = [5u8, 0, 0, 0];
        let mut r = [0u8; 4];
        load(&mut r, &[23u8], &modulus);
        assert_eq!(r, [3u8, 0, 0, 0]);
    }

    #[test]
    fn mul_matches_repeated_addition() {
        let modulus = [7u8, 0, 0, 0];
        let a = [3u8, 0, 0, 0];
        let b = [5u8, 0, 0, 0];

        let mut r = [0u8; 4];
        mul(&mut r, &a, &b, &modulus);

        assert_eq!(r, [1u8, 0, 0, 0]); // 15 mod 7 == 1
    }

    #[test]
    fn curve25519_order_load_reduces_to_zero() {
        let mut r = [1u8; 32];
        load(&mut r, &C25519_ORDER, &C25519_ORDER);
        assert_eq!(r, [0u8; 32]);
    }

    #[test]
    fn is_reduced_rejects_value_at_or_above_modulus() {
        let modulus = [5u8, 0, 0, 0];
        assert!(is_reduced(&[4, 0, 0, 0], &modulus));
        assert!(!is_reduced(&[5, 0, 0, 0], &modulus));
        assert!(!is_reduced(&[9, 0, 0, 0], &modulus));
    }
}
