//! Fixed-width, constant-time big integers.
//!
//! `Bigint<N>` stores an `N`-word (32-bit lane) little-endian integer. The
//! only data-dependent operations it exposes are [`Bigint::select`] and
//! [`Bigint::cswap`], both built from an arithmetic 0/1 mask rather than a
//! branch, so that code built on top of this type can manipulate secret
//! values (field elements, scalars) without a timing side channel. There is
//! deliberately no `Ord`, no indexing operator, and no non-constant-time
//! comparison - those would give a caller an easy way to leak secret bits.
//!
//! Unlike the type this is grounded on, `Bigint` is not `Copy`: its `Drop`
//! impl unconditionally zeroizes the backing words, so a caller cannot
//! accidentally duplicate a secret and leave one copy unzeroized.

/// An `N`-word (`32 * N`-bit) little-endian unsigned integer.
#[derive(Clone)]
pub struct Bigint<const N: usize> {
    pub(crate) w: [u32; N],
}

impl<const N: usize> Bigint<N> {
    /// The zero value.
    pub const fn zero() -> Self {
        Bigint { w: [0u32; N] }
    }

    /// Load a small value into the least-significant word.
    pub fn from_u32(v: u32) -> Self {
        let mut r = Self::zero();
        r.w[0] = v;
        r
    }

    /// Load from a little-endian byte slice. `bytes.len()` must be `4 * N`.
    pub fn from_le_bytes(bytes: &[u8]) -> Self {
        debug_assert_eq!(bytes.len(), 4 * N);
        let mut r = Self::zero();
        for i in 0..N {
            r.w[i] = u32::from_le_bytes([
                bytes[4 * i],
                bytes[4 * i + 1],
                bytes[4 * i + 2],
                bytes[4 * i + 3],
            ]);
        }
        r
    }

    /// Write out as little-endian bytes. `out.len()` must be `4 * N`.
    pub fn to_le_bytes(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), 4 * N);
        for i in 0..N {
            out[4 * i..4 * i + 4].copy_from_slice(&self.w[i].to_le_bytes());
        }
    }

    /// Constant-time equality.
    ///
    /// Accumulates the bitwise OR of all per-word XORs and reduces to a
    /// single boolean at the end, the same pattern as
    /// [`crate::util::secure_compare`] applied word-at-a-time instead of
    /// byte-at-a-time (there is no way to reborrow `[u32; N]` as `&[u8]`
    /// without unsafe and a const-generic byte length, which stable Rust
    /// cannot express here).
    pub fn ct_eq(&self, other: &Self) -> bool {
        let mut acc: u32 = 0;
        for i in 0..N {
            acc |= self.w[i] ^ other.w[i];
        }
        acc == 0
    }

    /// If `condition` is `false`, copy `v_false`'s words into `self`;
    /// otherwise copy `v_true`'s. Implemented with an arithmetic mask so
    /// the branch does not depend on `condition`'s value at the
    /// instruction level.
    pub fn select(&mut self, condition: bool, v_false: &Self, v_true: &Self) {
        let mask = 0u32.wrapping_sub(condition as u32);
        for i in 0..N {
            let diff = v_false.w[i] ^ v_true.w[i];
            self.w[i] = v_false.w[i] ^ (diff & mask);
        }
    }

    /// Conditionally swap `u` and `v` in place.
    pub fn cswap(condition: bool, u: &mut Self, v: &mut Self) {
        let mask = 0u32.wrapping_sub(condition as u32);
        for i in 0..N {
            let diff = (u.w[i] ^ v.w[i]) & mask;
            u.w[i] ^= diff;
            v.w[i] ^= diff;
        }
    }

    /// Number of bits a value of this width can hold.
    pub const fn bits() -> usize {
        32 * N
    }
}

impl<const N: usize> Drop for Bigint<N> {
    fn drop(&mut self) {
        for w in self.w.iter_mut() {
            unsafe { core::ptr::write_volatile(w, 0) };
        }
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }
}

/// 256-bit big integer, used for Curve25519 field elements and scalars.
pub type Bigint256 = Bigint<8>;

/// 448-bit big integer, used for Curve448 field elements and scalars.
pub type Bigint448 = Bigint<14>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_picks_the_right_branch() {
        let f = Bigint256::from_u32(1);
        let t = Bigint256::from_u32(2);
        let mut r = Bigint256::zero();

        r.select(false, &f, &t);
        assert!(r.ct_eq(&f));

        r.select(true, &f, &t);
        assert!(r.ct_eq(&t));
    }

    #[test]
    fn cswap_respects_condition() {
        let mut a = Bigint256::from_u32(1);
        let mut b = Bigint256::from_u32(2);

        Bigint256::cswap(false, &mut a, &mut b);
        assert!(a.ct_eq(&Bigint256::from_u32(1)));
        assert!(b.ct_eq(&Bigint256::from_u32(2)));

        Bigint256::cswap(true, &mut a, &mut b);
        assert!(a.ct_eq(&Bigint256::from_u32(2)));
        assert!(b.ct_eq(&Bigint256::from_u32(1)));
    }

    #[test]
    fn round_trips_through_bytes() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let n = Bigint256::from_le_bytes(&bytes);
        let mut out = [0u8; 32];
        n.to_le_bytes(&mut out);
        assert_eq!(bytes, out);
    }
}
