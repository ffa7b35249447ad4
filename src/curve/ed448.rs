//! Group law and point encoding for the Curve448 (Edwards448) curve
//! (`x^2 + y^2 = 1 + d*x^2*y^2`, `d = -39081`, over `Fp(2**448-2**224-1)`).

use crate::bigint::Bigint448;
use crate::field::fp448::{add, inv, load, mul, neg, normalize, pow_p34};

fn square(r: &mut Bigint448, x: &Bigint448) {
    let t = x.clone();
    mul(r, &t, x);
}

/// Curve448 base point, as 57 little-endian bytes (the final byte carries
/// only the parity bit on compressed points; the base point's is zero).
const BASE: [u8; 57] = [
    0x14, 0xFA, 0x30, 0xF2, 0x5B, 0x79, 0x08, 0x98, 0xAD, 0xC8, 0xD7, 0x4E, 0x2C, 0x13, 0xBD, 0xFD,
    0xC4, 0x39, 0x7C, 0xE6, 0x1C, 0xFF, 0xD3, 0x3A, 0xD7, 0xC2, 0xA0, 0x05, 0x1E, 0x9C, 0x78, 0x87,
    0x40, 0x98, 0xA3, 0x6C, 0x73, 0x73, 0xEA, 0x4B, 0x62, 0xC7, 0xC9, 0x56, 0x37, 0x20, 0x76, 0x88,
    0x24, 0xBC, 0xB6, 0x6E, 0x71, 0x46, 0x3F, 0x69, 0x00, 0x00,
];

/// Byte index of the compressed-point sign/parity byte.
const PARITY_POS: usize = 56;

fn bigint_from_bytes56(bytes: &[u8]) -> Bigint448 {
    let mut buf = [0u8; 56];
    buf.copy_from_slice(&bytes[..56]);
    let mut w = [0u32; 14];
    for i in 0..14 {
        w[i] = u32::from_le_bytes([buf[4 * i], buf[4 * i + 1], buf[4 * i + 2], buf[4 * i + 3]]);
    }
    Bigint448 { w }
}

/// A point on the curve in projective coordinates `(X:Y:Z)` with
/// `x = X/Z`, `y = Y/Z`.
#[derive(Clone)]
pub struct Point {
    pub x: Bigint448,
    pub y: Bigint448,
    pub z: Bigint448,
}

impl Point {
    /// The group identity, `(0, 1)`.
    pub fn neutral() -> Self {
        Point { x: Bigint448::zero(), y: Bigint448::from_u32(1), z: Bigint448::from_u32(1) }
    }

    /// The canonical generator.
    pub fn base() -> Self {
        Self::decompress(&BASE).expect("base point literal must decode")
    }

    /// Decode a 57-byte compressed point.
    pub fn decompress(bytes: &[u8; 57]) -> Option<Self> {
        let sign = bytes[PARITY_POS] & 1;
        let y = bigint_from_bytes56(&bytes[..56]);
        let (y, _) = normalize(&y);

        let d = load(-39081);

        let mut y2 = Bigint448::zero();
        square(&mut y2, &y);

        let mut u = Bigint448::zero();
        {
            let mut neg_one = Bigint448::zero();
            neg(&mut neg_one, &Bigint448::from_u32(1));
            add(&mut u, &y2, &neg_one);
        }

        let mut v = Bigint448::zero();
        mul(&mut v, &d, &y2);
        {
            let mut neg_one = Bigint448::zero();
            neg(&mut neg_one, &Bigint448::from_u32(1));
            add(&mut v, &v.clone(), &neg_one);
        }

        let mut u3 = Bigint448::zero();
        square(&mut u3, &u);
        mul(&mut u3, &u3.clone(), &u);

        let mut u5 = Bigint448::zero();
        mul(&mut u5, &u3, &u);
        mul(&mut u5, &u5.clone(), &u);

        let mut v3 = Bigint448::zero();
        square(&mut v3, &v);
        mul(&mut v3, &v3.clone(), &v);

        let mut w = Bigint448::zero();
        mul(&mut w, &u5, &v3);

        let mut root = Bigint448::zero();
        pow_p34(&mut root, &w);

        let mut x = Bigint448::zero();
        mul(&mut x, &u3, &v);
        mul(&mut x, &x.clone(), &root);

        let mut vx2 = Bigint448::zero();
        square(&mut vx2, &x);
        mul(&mut vx2, &vx2.clone(), &v);
        let mut diff = Bigint448::zero();
        {
            let mut neg_u = Bigint448::zero();
            neg(&mut neg_u, &u);
            add(&mut diff, &vx2, &neg_u);
        }
        let (diff, _) = normalize(&diff);
        if !diff.ct_eq(&Bigint448::zero()) {
            return None;
        }

        let (mut x, _) = normalize(&x);
        if x.ct_eq(&Bigint448::zero()) && sign == 1 {
            return None;
        }

        let parity = (x.w[0] & 1) as u8;
        if parity != sign {
            let mut negated = Bigint448::zero();
            neg(&mut negated, &x);
            x = negated;
        }

        Some(Point { x, y, z: Bigint448::from_u32(1) })
    }

    /// Encode as a 57-byte compressed point.
    pub fn compress(&self) -> [u8; 57] {
        let (x, y) = self.unproject();
        let mut out = [0u8; 57];
        let mut y_bytes = [0u8; 56];
        for i in 0..14 {
            y_bytes[4 * i..4 * i + 4].copy_from_slice(&y.w[i].to_le_bytes());
        }
        out[..56].copy_from_slice(&y_bytes);
        out[PARITY_POS] = (x.w[0] & 1) as u8;
        out
    }

    /// Recover affine `(x, y)` coordinates.
    pub fn unproject(&self) -> (Bigint448, Bigint448) {
        let mut z_inv = Bigint448::zero();
        inv(&mut z_inv, &self.z);

        let mut x = Bigint448::zero();
        mul(&mut x, &self.x, &z_inv);
        let (x, _) = normalize(&x);

        let mut y = Bigint448::zero();
        mul(&mut y, &self.y, &z_inv);
        let (y, _) = normalize(&y);

        (x, y)
    }

    /// Projective equality, avoiding a field inversion.
    pub fn equals(&self, other: &Self) -> bool {
        let mut lhs = Bigint448::zero();
        mul(&mut lhs, &self.x, &other.z);
        let mut rhs = Bigint448::zero();
        mul(&mut rhs, &other.x, &self.z);
        let (lhs, _) = normalize(&lhs);
        let (rhs, _) = normalize(&rhs);
        let x_eq = lhs.ct_eq(&rhs);

        let mut lhs_y = Bigint448::zero();
        mul(&mut lhs_y, &self.y, &other.z);
        let mut rhs_y = Bigint448::zero();
        mul(&mut rhs_y, &other.y, &self.z);
        let (lhs_y, _) = normalize(&lhs_y);
        let (rhs_y, _) = normalize(&rhs_y);

        x_eq && lhs_y.ct_eq(&rhs_y)
    }

    /// Unified projective addition for `a = 1` twisted Edwards curves.
    pub fn add(&self, other: &Self) -> Self {
        let d = load(-39081);

        let mut a = Bigint448::zero();
        mul(&mut a, &self.z, &other.z);
        let mut b = Bigint448::zero();
        square(&mut b, &a);

        let mut c = Bigint448::zero();
        mul(&mut c, &self.x, &other.x);
        let mut dd = Bigint448::zero();
        mul(&mut dd, &self.y, &other.y);

        let mut e = Bigint448::zero();
        mul(&mut e, &d, &c);
        mul(&mut e, &e.clone(), &dd);

        let mut f = Bigint448::zero();
        {
            let mut neg_e = Bigint448::zero();
            neg(&mut neg_e, &e);
            add(&mut f, &b, &neg_e);
        }
        let mut g = Bigint448::zero();
        add(&mut g, &b, &e);

        let mut sum_x = Bigint448::zero();
        add(&mut sum_x, &self.x, &self.y);
        let mut sum_y = Bigint448::zero();
        add(&mut sum_y, &other.x, &other.y);
        let mut cross = Bigint448::zero();
        mul(&mut cross, &sum_x, &sum_y);
        {
            let mut neg_c = Bigint448::zero();
            neg(&mut neg_c, &c);
            add(&mut cross, &cross.clone(), &neg_c);
            let mut neg_d = Bigint448::zero();
            neg(&mut neg_d, &dd);
            add(&mut cross, &cross.clone(), &neg_d);
        }

        let mut x3 = Bigint448::zero();
        mul(&mut x3, &a, &f);
        mul(&mut x3, &x3.clone(), &cross);

        let mut y3 = Bigint448::zero();
        mul(&mut y3, &a, &g);
        let mut d_minus_c = Bigint448::zero();
        {
            let mut neg_c = Bigint448::zero();
            neg(&mut neg_c, &c);
            add(&mut d_minus_c, &dd, &neg_c);
        }
        mul(&mut y3, &y3.clone(), &d_minus_c);

        let mut z3 = Bigint448::zero();
        mul(&mut z3, &f, &g);

        Point { x: x3, y: y3, z: z3 }
    }

    /// Dedicated doubling formula for `a = 1` twisted Edwards curves.
    pub fn double(&self) -> Self {
        let mut sum_xy = Bigint448::zero();
        add(&mut sum_xy, &self.x, &self.y);
        let mut b = Bigint448::zero();
        square(&mut b, &sum_xy);

        let mut c = Bigint448::zero();
        square(&mut c, &self.x);
        let mut d = Bigint448::zero();
        square(&mut d, &self.y);

        let mut e = Bigint448::zero();
        add(&mut e, &c, &d);

        let mut h = Bigint448::zero();
        square(&mut h, &self.z);

        let mut j = Bigint448::zero();
        {
            let mut two_h = Bigint448::zero();
            add(&mut two_h, &h, &h);
            let mut neg_two_h = Bigint448::zero();
            neg(&mut neg_two_h, &two_h);
            add(&mut j, &e, &neg_two_h);
        }

        let mut b_minus_e = Bigint448::zero();
        {
            let mut neg_e = Bigint448::zero();
            neg(&mut neg_e, &e);
            add(&mut b_minus_e, &b, &neg_e);
        }
        let mut x3 = Bigint448::zero();
        mul(&mut x3, &b_minus_e, &j);

        let mut c_minus_d = Bigint448::zero();
        {
            let mut neg_d = Bigint448::zero();
            neg(&mut neg_d, &d);
            add(&mut c_minus_d, &c, &neg_d);
        }
        let mut y3 = Bigint448::zero();
        mul(&mut y3, &e, &c_minus_d);

        let mut z3 = Bigint448::zero();
        mul(&mut z3, &e, &j);

        Point { x: x3, y: y3, z: z3 }
    }

    fn select(condition: bool, v_false: &Self, v_true: &Self) -> Self {
        let mut x = Bigint448::zero();
        x.select(condition, &v_false.x, &v_true.x);
        let mut y = Bigint448::zero();
        y.select(condition, &v_false.y, &v_true.y);
        let mut z = Bigint448::zero();
        z.select(condition, &v_false.z, &v_true.z);
        Point { x, y, z }
    }

    /// Scalar multiplication via double-and-add with a constant-time
    /// select at every bit, scanning all 448 bits regardless of the
    /// scalar's actual bit length.
    pub fn scalar_mul(&self, scalar: &[u8; 56]) -> Self {
        let mut r = Point::neutral();
        for i in (0..448).rev() {
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
    fn scalar_mul_by_zero_is_neutral() {
        let base = Point::base();
        let zero = [0u8; 56];
        let r = base.scalar_mul(&zero);
        assert!(r.equals(&Point::neutral()));
    }
}
