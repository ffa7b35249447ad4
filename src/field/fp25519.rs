//! Arithmetic in `Fp(2**255 - 19)`, the base field of Curve25519.

use crate::bigint::Bigint256;

/// `2 * P = 2**256 - 38`, as a 256-bit little-endian word array.
const TWO_P: [u32; 8] = [
    0xFFFFFFDA, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
    0xFFFFFFFF,
];

/// `P - 2`, the fixed exponent used by [`inv`].
const P_MINUS_2: [u32; 8] = [
    0xFFFFFFEB, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
    0x7FFFFFFF,
];

/// `(P - 5) / 8`, the fixed exponent used by [`pow58`].
const P_MINUS_5_OVER_8: [u32; 8] = [
    0xFFFFFFFD, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF,
    0x0FFFFFFF,
];

fn reduce_single(x: &mut Bigint256, carry: u64) {
    let mut carry = carry << 1;
    carry |= (x.w[7] >> 31) as u64;
    carry *= 19;

    x.w[7] &= 0x7FFF_FFFF;

    for w in x.w.iter_mut() {
        carry += *w as u64;
        *w = carry as u32;
        carry >>= 32;
    }
}

/// Reduce `x` to the canonical representative in `[0, P)`.
pub fn normalize(x: &mut Bigint256) {
    reduce_single(x, 0);

    let mut minus_p = Bigint256::zero();
    let mut carry: u64 = 19;
    for i in 0..7 {
        carry += x.w[i] as u64;
        minus_p.w[i] = carry as u32;
        carry >>= 32;
    }
    let c = (carry as u32).wrapping_add(x.w[7]).wrapping_sub(0x8000_0000);
    minus_p.w[7] = c;

    let subtract = (c >> 31) & 1 == 0;
    let mut result = Bigint256::zero();
    result.select(subtract, x, &minus_p);
    *x = result;
}

/// `r = a + b`.
pub fn add(r: &mut Bigint256, a: &Bigint256, b: &Bigint256) {
    let mut carry: u32 = 0;
    for i in 0..8 {
        let sum = a.w[i] as u64 + b.w[i] as u64 + carry as u64;
        r.w[i] = sum as u32;
        carry = (sum >> 32) as u32;
    }
    reduce_single(r, carry as u64);
}

/// `r = a - b`.
pub fn sub(r: &mut Bigint256, a: &Bigint256, b: &Bigint256) {
    let mut t = Bigint256::zero();
    let mut carry: u32 = 0;
    for i in 0..8 {
        let sum = a.w[i] as u64 + TWO_P[i] as u64 + carry as u64;
        t.w[i] = sum as u32;
        carry = (sum >> 32) as u32;
    }
    let extra_carry = carry;

    let mut borrow: i64 = 0;
    for i in 0..8 {
        let diff = t.w[i] as i64 - b.w[i] as i64 - borrow;
        r.w[i] = diff as u32;
        borrow = if diff < 0 { 1 } else { 0 };
    }

    reduce_single(r, extra_carry as u64);
}

/// `r = -x mod P`.
pub fn neg(r: &mut Bigint256, x: &Bigint256) {
    sub(r, &Bigint256::zero(), x);
}

/// `r = a * b`. `r` must not alias `a` or `b`.
pub fn mul(r: &mut Bigint256, a: &Bigint256, b: &Bigint256) {
    let mut c1: u64 = 0;

    for i in 0..8 {
        let mut c0 = c1 as u32;
        c1 >>= 32;

        let mut j = 0;
        while j <= i {
            let x = a.w[j] as u64 * b.w[i - j] as u64;
            let y = c0 as u64 + (x as u32) as u64;
            c0 = y as u32;
            c1 = c1 + (x >> 32) + (y >> 32);
            j += 1;
        }

        while j < 8 {
            let x = a.w[j] as u64 * b.w[i + 8 - j] as u64;
            let y = c0 as u64 + (x as u32 as u64) * 38;
            c0 = y as u32;
            c1 = c1 + (x >> 32) * 38 + (y >> 32);
            j += 1;
        }

        r.w[i] = c0;
    }

    reduce_single(r, c1);
}

/// Plain left-to-right square-and-multiply with a fixed, public exponent.
/// The exponent's leading bit is assumed to be set.
fn pow_fixed(r: &mut Bigint256, x: &Bigint256, exponent: &[u32; 8]) {
    let mut result = x.clone();
    let mut started = false;

    for bit in (0..256).rev() {
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
pub fn inv(r: &mut Bigint256, x: &Bigint256) {
    pow_fixed(r, x, &P_MINUS_2);
}

/// `r = x^((P-5)/8) mod P`, used by the Curve25519 compressed point decoder
/// to extract a square root.
pub fn pow58(r: &mut Bigint256, x: &Bigint256) {
    pow_fixed(r, x, &P_MINUS_5_OVER_8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_sub_round_trips() {
        let a = Bigint256::from_u32(123456);
        let b = Bigint256::from_u32(987654);

        let mut sum = Bigint256::zero();
        add(&mut sum, &a, &b);

        let mut back = Bigint256::zero();
        sub(&mut back, &sum, &b);
        normalize(&mut back);

        let mut expected = a.clone();
        normalize(&mut expected);

        assert!(back.ct_eq(&expected));
    }

    #[test]
    fn neg_is_additive_inverse() {
        let x = Bigint256::from_u32(42);
        let mut neg_x = Bigint256::zero();
        neg(&mut neg_x, &x);

        let mut sum = Bigint256::zero();
        add(&mut sum, &x, &neg_x);
        normalize(&mut sum);

        assert!(sum.ct_eq(&Bigint256::zero()));
    }

    #[test]
    fn inv_of_one_is_one() {
        let one = Bigint256::from_u32(1);
        let mut r = Bigint256::zero();
        inv(&mut r, &one);
        normalize(&mut r);
        assert!(r.ct_eq(&one));
    }

    #[test]
    fn inv_then_mul_yields_one() {
        let x = Bigint256::from_u32(7);
        let mut inv_x = Bigint256::zero();
        inv(&mut inv_x, &x);

        let mut product = Bigint256::zero();
        mul(&mut product, &x, &inv_x);
        normalize(&mut product);

        assert!(product.ct_eq(&Bigint256::from_u32(1)));
    }
}
