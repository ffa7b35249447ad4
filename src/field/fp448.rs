//! Arithmetic in `Fp(2**448 - 2**224 - 1)`, the base field of Curve448.

use crate::bigint::Bigint448;
use crate::util::secure_zero;

const WORDS: usize = 14;
const U32_224: usize = 7;

/// `P`, as a 448-bit little-endian word array.
const P: [u32; WORDS] = [
    0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
    0xFFFFFFFE, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
];

/// `2 * P mod 2**448`.
const TWO_P: [u32; WORDS] = [
    0xFFFFFFFE, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
    0xFFFFFFFD, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
];

/// `P - 2`, the fixed exponent used by [`inv`].
const P_MINUS_2: [u32; WORDS] = [
    0xFFFFFFFD, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
    0xFFFFFFFE, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
];

/// `(P - 3) / 4`, the fixed exponent used by [`pow_p34`].
const P_MINUS_3_OVER_4: [u32; WORDS] = [
    0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xBFFFFFFF,
    0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0x3FFFFFFF,
];

/// Reduction constant: `2**448 = 2**224 + 1 (mod P)`, so any carry bit out
/// of the top word is folded back in at word 0 and word 7.
fn reduce(r: &mut Bigint448, carry: u32) -> u32 {
    let mut c = carry;
    let mut rc0 = 0u32;
    for i in 0..WORDS {
        let sum = r.w[i] as u64 + c as u64;
        r.w[i] = sum as u32;
        c = (sum >> 32) as u32;
    }
    rc0 |= c;

    let mut c = carry;
    for i in U32_224..WORDS {
        let sum = r.w[i] as u64 + c as u64;
        r.w[i] = sum as u32;
        c = (sum >> 32) as u32;
    }
    rc0 |= c;

    rc0
}

/// Reduce `x` to the canonical representative in `[0, P)`, returning
/// whether reduction actually subtracted `P`.
pub fn normalize(x: &Bigint448) -> (Bigint448, bool) {
    let mut minus_p = Bigint448::zero();
    let mut borrow: i64 = 0;
    for i in 0..WORDS {
        let diff = x.w[i] as i64 - P[i] as i64 - borrow;
        minus_p.w[i] = diff as u32;
        borrow = if diff < 0 { 1 } else { 0 };
    }

    let overflow = borrow == 0;
    let mut r = Bigint448::zero();
    r.select(overflow, x, &minus_p);
    (r, overflow)
}

/// Load a small signed integer, representing negative values as `P + x`.
pub fn load(x: i32) -> Bigint448 {
    let mut r = Bigint448::zero();
    if x < 0 {
        r.w[0] = (x - 1) as u32;
        r.w[1..].copy_from_slice(&P[1..]);
    } else {
        r.w[0] = x as u32;
    }
    r
}

/// `r = a + b`.
pub fn add(r: &mut Bigint448, a: &Bigint448, b: &Bigint448) {
    let mut carry: u64 = 0;
    for i in 0..WORDS {
        let sum = a.w[i] as u64 + b.w[i] as u64 + carry;
        r.w[i] = sum as u32;
        carry = sum >> 32;
    }
    reduce(r, carry as u32);
}

/// `r = P - x` (equivalently `-x mod P`, computed via `2P - x`).
pub fn neg(r: &mut Bigint448, x: &Bigint448) {
    let mut borrow: i64 = 0;
    for i in 0..WORDS {
        let diff = TWO_P[i] as i64 - x.w[i] as i64 - borrow;
        r.w[i] = diff as u32;
        borrow = if diff < 0 { 1 } else { 0 };
    }
    reduce(r, (1 - borrow) as u32);
}

fn mul_acc(acc: &mut [u32; 2 * WORDS], offset: usize, a: u32, b: u32) {
    let mut carry = a as u64 * b as u64;
    let mut i = offset;
    while carry != 0 {
        let sum = acc[i] as u64 + (carry & 0xFFFF_FFFF);
        acc[i] = sum as u32;
        carry = (carry >> 32) + (sum >> 32);
        i += 1;
    }
}

fn add_buffer_into(acc: &mut [u32; 2 * WORDS], offset: usize, buf: &[u32; WORDS]) {
    let mut carry: u64 = 0;
    for i in 0..WORDS {
        let sum = acc[offset + i] as u64 + buf[i] as u64 + carry;
        acc[offset + i] = sum as u32;
        carry = sum >> 32;
    }
    let mut idx = offset + WORDS;
    while carry != 0 {
        let sum = acc[idx] as u64 + carry;
        acc[idx] = sum as u32;
        carry = sum >> 32;
        idx += 1;
    }
}

/// `r = a * b`. `r` must not alias `a` or `b`.
///
/// Computes the full 896-bit product, then folds the high half back twice
/// using `2**448 = 2**224 + 1 (mod P)` before a final pair of single-bit
/// carry reductions.
pub fn mul(r: &mut Bigint448, a: &Bigint448, b: &Bigint448) {
    let mut acc = [0u32; 2 * WORDS];
    for i in 0..WORDS {
        for j in 0..WORDS {
            mul_acc(&mut acc, i + j, a.w[i], b.w[j]);
        }
    }

    for _ in 0..2 {
        let mut high = [0u32; WORDS];
        high.copy_from_slice(&acc[WORDS..2 * WORDS]);
        for w in acc[WORDS..2 * WORDS].iter_mut() {
            *w = 0;
        }

        add_buffer_into(&mut acc, 0, &high);
        add_buffer_into(&mut acc, U32_224, &high);
    }

    r.w.copy_from_slice(&acc[0..WORDS]);
    let carry = acc[WORDS];
    let c = reduce(r, carry);
    reduce(r, c);

    secure_zero(unsafe {
        core::slice::from_raw_parts_mut(acc.as_mut_ptr() as *mut u8, acc.len() * 4)
    });
}

fn pow_fixed(r: &mut Bigint448, x: &Bigint448, exponent: &[u32; WORDS]) {
    let mut result = x.clone();
    let mut started = false;

    for bit in (0..32 * WORDS).rev() {
        let word = exponent[bit / 32];
        let set = (word >> (bit % 32)) & 1 == 1;

        if !started {
            if set {
                started = true;
            }
            continue;
        }

        let squared = result.clone();
        mul(&mut result, &squared, &squared);

        if set {
            let partial = result.clone();
            mul(&mut result, &partial, x);
        }
    }

    *r = result;
}

/// `r = x^-1 mod P`.
pub fn inv(r: &mut Bigint448, x: &Bigint448) {
    pow_fixed(r, x, &P_MINUS_2);
}

/// `r = x^((P-3)/4) mod P`, used by the Curve448 compressed point decoder.
pub fn pow_p34(r: &mut Bigint448, x: &Bigint448) {
    pow_fixed(r, x, &P_MINUS_3_OVER_4);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_negative_matches_p_plus_x() {
        let neg_one = load(-1);
        let (normalized, overflow) = normalize(&neg_one);
        assert!(!overflow);

        let mut expected = Bigint448::zero();
        neg(&mut expected, &Bigint448::from_u32(1));
        let (expected, _) = normalize(&expected);

        assert!(normalized.ct_eq(&expected));
    }

    #[test]
    fn add_then_neg_cancels() {
        let x = Bigint448::from_u32(55);
        let mut neg_x = Bigint448::zero();
        neg(&mut neg_x, &x);

        let mut sum = Bigint448::zero();
        add(&mut sum, &x, &neg_x);

        let (normalized, _) = normalize(&sum);
        assert!(normalized.ct_eq(&Bigint448::zero()));
    }

    #[test]
    fn inv_then_mul_yields_one() {
        let x = Bigint448::from_u32(9);
        let mut inv_x = Bigint448::zero();
        inv(&mut inv_x, &x);

        let mut product = Bigint448::zero();
        mul(&mut product, &x, &inv_x);

        let (normalized, _) = normalize(&product);
        assert!(normalized.ct_eq(&Bigint448::from_u32(1)));
    }
}
