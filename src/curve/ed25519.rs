//! Group law and point encoding for the Curve25519 twisted Edwards curve
//! (`-x^2 + y^2 = 1 + d*x^2*y^2` over `Fp(2**255-19)`).

use crate::bigint::Bigint256;
use crate::field::fp25519::{add, inv, mul, neg, normalize, pow58, sub};

/// `d = -121665/121666 mod p`.
const D: [u32; 8] = [
    0x135978A3, 0x75EB4DCA, 0x4141D8AB, 0x00700A4D, 0x7779E898, 0x8CC74079, 0x2B6FFE73, 0x52036CEE,
];

/// Curve25519 base point x-coordinate.
const BASE_X: [u32; 8] = [
    0x8F25D51A, 0xC9562D60, 0x9525A7B2, 0x692CC760, 0xFDD6DC5C, 0xC0A4E231, 0xCD6E53FE, 0x216936D3,
];

/// Curve25519 base point y-coordinate (`4/5 mod p`).
const BASE_Y: [u32; 8] = [
    0x66666658, 0x66666666, 0x66666666, 0x66666666, 0x66666666, 0x66666666, 0x66666666, 0x66666666,
];

/// `2**((p-1)/4) mod p`, a square root of `-1`, used to recover the other
/// candidate square root during point decompression.
const SQRT_MINUS_ONE: [u32; 8] = [
    0x4A0EA0B0, 0xC4EE1B27, 0xAD2FE478, 0x2F431806, 0x3DFBD7A7, 0x2B4D0099, 0x4FC1DF0B, 0x2B832480,
];

fn from_words(w: [u32; 8]) -> Bigint256 {
    let mut bytes = [0u8; 32];
    for i in 0..8 {
        bytes[4 * i..4 * i + 4].copy_from_slice(&w[i].to_le_bytes());
    }
    Bigint256::from_le_bytes(&bytes)
}

fn square(r: &mut Bigint256, x: &Bigint256) {
    let t = x.clone();
    mul(r, &t, x);
}

/// A point on the curve in extended homogeneous coordinates `(X:Y:Z:T)`
/// with `x = X/Z`, `y = Y/Z`, `xy = T/Z`.
#[derive(Clone)]
pub struct Point {
    pub x: Bigint256,
    pub y: Bigint256,
    pub z: Bigint256,
    pub t: Bigint256,
}

impl Point {
    /// The group identity, `(0, 1)`.
    pub fn neutral() -> Self {
        Point {
            x: Bigint256::zero(),
            y: Bigint256::from_u32(1),
            z: Bigint256::from_u32(1),
            t: Bigint256::zero(),
        }
    }

    /// The canonical generator.
    pub fn base() -> Self {
        let x = from_words(BASE_X);
        let y = from_words(BASE_Y);
        let mut t = Bigint256::zero();
        mul(&mut t, &x, &y);
        Point { x, y, z: Bigint256::from_u32(1), t }
    }

    /// Decode a 32-byte compressed point (`y` with the sign of `x` folded
    /// into the top bit). Returns `None` if the bytes do not encode a
    /// point on the curve.
    pub fn decompress(bytes: &[u8; 32]) -> Option<Self> {
        let sign = (bytes[31] >> 7) & 1;
        let mut y_bytes = *bytes;
        y_bytes[31] &= 0x7F;
        let mut y = Bigint256::from_le_bytes(&y_bytes);
        normalize(&mut y);

        let d = from_words(D);
        let mut y2 = Bigint256::zero();
        square(&mut y2, &y);

        let mut u = Bigint256::zero();
        sub(&mut u, &y2, &Bigint256::from_u32(1));

        let mut v = Bigint256::zero();
        mul(&mut v, &d, &y2);
        add(&mut v, &v.clone(), &Bigint256::from_u32(1));

        let mut v3 = Bigint256::zero();
        square(&mut v3, &v);
        mul(&mut v3, &v3.clone(), &v);

        let mut uv7 = Bigint256::zero();
        square(&mut uv7, &v3);
        mul(&mut uv7, &uv7.clone(), &v);
        mul(&mut uv7, &uv7.clone(), &u);

        let mut root = Bigint256::zero();
        pow58(&mut root, &uv7);

        let mut x = Bigint256::zero();
        mul(&mut x, &u, &v3);
        mul(&mut x, &x.clone(), &root);

        let check = |x: &Bigint256, v: &Bigint256, u: &Bigint256| -> bool {
            let mut vx2 = Bigint256::zero();
            square(&mut vx2, x);
            mul(&mut vx2, &vx2.clone(), v);
            let mut diff = Bigint256::zero();
            sub(&mut diff, &vx2, u);
            normalize(&mut diff);
            diff.ct_eq(&Bigint256::zero())
        };

        if !check(&x, &v, &u) {
            let sqrt_m1 = from_words(SQRT_MINUS_ONE);
            mul(&mut x, &x.clone(), &sqrt_m1);
            if !check(&x, &v, &u) {
                return None;
            }
        }

        normalize(&mut x);
        if x.ct_eq(&Bigint256::zero()) && sign == 1 {
            return None;
        }

        let parity = (x.w[0] & 1) as u8;
        if parity != sign {
            let mut negated = Bigint256::zero();
            neg(&mut negated, &x);
            x = negated;
        }

        let mut t = Bigint256::zero();
        mul(&mut t, &x, &y);

        Some(Point { x, y, z: Bigint256::from_u32(1), t })
    }

    /// Encode as a 32-byte compressed point.
    pub fn compress(&self) -> [u8; 32] {
        let (x, y) = self.unproject();
        let mut out = [0u8; 32];
        y.to_le_bytes(&mut out);
        out[31] = (out[31] & 0x7F) | ((x.w[0] & 1) as u8) << 7;
        out
    }

    /// Recover affine `(x, y)` coordinates.
    pub fn unproject(&self) -> (Bigint256, Bigint256) {
        let mut z_inv = Bigint256::zero();
        inv(&mut z_inv, &self.z);

        let mut x = Bigint256::zero();
        mul(&mut x, &self.x, &z_inv);
        normalize(&mut x);

        let mut y = Bigint256::zero();
        mul(&mut y, &self.y, &z_inv);
        normalize(&mut y);

        (x, y)
    }

    /// Projective equality, avoiding a field inversion.
    pub fn equals(&self, other: &Self) -> bool {
        let mut lhs = Bigint256::zero();
        mul(&mut lhs, &self.x, &other.z);
        let mut rhs = Bigint256::zero();
        mul(&mut rhs, &other.x, &self.z);
        normalize(&mut lhs);
        normalize(&mut rhs);
        let x_eq = lhs.ct_eq(&rhs);

        let mut lhs_y = Bigint256::zero();
        mul(&mut lhs_y, &self.y, &other.z);
        let mut rhs_y = Bigint256::zero();
        mul(&mut rhs_y, &other.y, &self.z);
        normalize(&mut lhs_y);
        normalize(&mut rhs_y);

        x_eq && lhs_y.ct_eq(&rhs_y)
    }

    /// Unified extended-coordinate addition (`a = -1`).
    pub fn add(&self, other: &Self) -> Self {
        let d = from_words(D);
        let mut two_d = Bigint256::zero();
        add(&mut two_d, &d, &d);

        let mut y1_minus_x1 = Bigint256::zero();
        sub(&mut y1_minus_x1, &self.y, &self.x);
        let mut y2_minus_x2 = Bigint256::zero();
        sub(&mut y2_minus_x2, &other.y, &other.x);
        let mut a = Bigint256::zero();
        mul(&mut a, &y1_minus_x1, &y2_minus_x2);

        let mut y1_plus_x1 = Bigint256::zero();
        add(&mut y1_plus_x1, &self.y, &self.x);
        let mut y2_plus_x2 = Bigint256::zero();
        add(&mut y2_plus_x2, &other.y, &other.x);
        let mut b = Bigint256::zero();
        mul(&mut b, &y1_plus_x1, &y2_plus_x2);

        let mut c = Bigint256::zero();
        mul(&mut c, &self.t, &two_d);
        mul(&mut c, &c.clone(), &other.t);

        let mut d_val = Bigint256::zero();
        mul(&mut d_val, &self.z, &other.z);
        add(&mut d_val, &d_val.clone(), &d_val.clone());

        let mut e = Bigint256::zero();
        sub(&mut e, &b, &a);
        let mut f = Bigint256::zero();
        sub(&mut f, &d_val, &c);
        let mut g = Bigint256::zero();
        add(&mut g, &d_val, &c);
        let mut h = Bigint256::zero();
        add(&mut h, &b, &a);

        let mut x3 = Bigint256::zero();
        mul(&mut x3, &e, &f);
        let mut y3 = Bigint256::zero();
        mul(&mut y3, &g, &h);
        let mut t3 = Bigint256::zero();
        mul(&mut t3, &e, &h);
        let mut z3 = Bigint256::zero();
        mul(&mut z3, &f, &g);

        Point { x: x3, y: y3, z: z3, t: t3 }
    }

    /// Dedicated doubling formula (`a = -1`).
    pub fn double(&self) -> Self {
        let mut a = Bigint256::zero();
        square(&mut a, &self.x);
        let mut b = Bigint256::zero();
        square(&mut b, &self.y);
        let mut c = Bigint256::zero();
        square(&mut c, &self.z);
        add(&mut c, &c.clone(), &c.clone());

        let mut neg_a = Bigint256::zero();
        neg(&mut neg_a, &a);

        let mut sum_xy = Bigint256::zero();
        add(&mut sum_xy, &self.x, &self.y);
        let mut e = Bigint256::zero();
        square(&mut e, &sum_xy);
        sub(&mut e, &e.clone(), &a);
        sub(&mut e, &e.clone(), &b);

        let mut g = Bigint256::zero();
        add(&mut g, &neg_a, &b);
        let mut f = Bigint256::zero();
        sub(&mut f, &g, &c);
        let mut h = Bigint256::zero();
        sub(&mut h, &neg_a, &b);

        let mut x3 = Bigint256::zero();
        mul(&mut x3, &e, &f);
        let mut y3 = Bigint256::zero();
        mul(&mut y3, &g, &h);
        let mut t3 = Bigint256::zero();
        mul(&mut t3, &e, &h);
        let mut z3 = Bigint256::zero();
        mul(&mut z3, &f, &g);

        Point { x: x3, y: y3, z: z3, t: t3 }
    }

    fn select(condition: bool, v_false: &Self, v_true: &Self) -> Self {
        let mut x = Bigint256::zero();
        x.select(condition, &v_false.x, &v_true.x);
        let mut y = Bigint256::zero();
        y.select(condition, &v_false.y, &v_true.y);
        let mut z = Bigint256::zero();
        z.select(condition, &v_false.z, &v_true.z);
        let mut t = Bigint256::zero();
        t.select(condition, &v_false.t, &v_true.t);
        Point { x, y, z, t }
    }

    /// Scalar multiplication via double-and-add with a constant-time
    /// select at every bit, scanning all 256 bits regardless of the
    /// scalar's actual bit length.
    pub fn scalar_mul(&self, scalar: &[u8; 32]) -> Self {
        let mut r = Point::neutral();
        for i in (0..256).rev() {
            let bit = (scalar[i / 8] >> (i % 8)) & 1;
            let doubled = r.double();
            let added = doubled.add(self);
            r = Point::select(bit == 1, &doubled, &added);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_point_round_trips_through_compression() {
        let base = Point::base();
        let compressed = base.compress();
        let decoded = Point::decompress(&compressed).expect("base point must decompress");
        assert!(decoded.equals(&base));
    }

    #[test]
    fn neutral_is_additive_identity() {
        let base = Point::base();
        let neutral = Point::neutral();
        let sum = base.add(&neutral);
        assert!(sum.equals(&base));
    }

    #[test]
    fn doubling_matches_self_addition() {
        let base = Point::base();
        let doubled = base.double();
        let added = base.add(&base);
        assert!(doubled.equals(&added));
    }

    #[test]
    fn scalar_mul_by_two_matches_doubling() {
        let base = Point::base();
        let mut two = [0u8; 32];
        two[0] = 2;
        let via_scalar = base.scalar_mul(&two);
        let via_double = base.double();
        assert!(via_scalar.equals(&via_double));
    }

    #[test]
    fn scalar_mul_by_zero_is_neutral() {
        let base = Point::base();
        let zero = [0u8; 32];
        let r = base.scalar_mul(&zero);
        assert!(r.equals(&Point::neutral()));
    }
}
