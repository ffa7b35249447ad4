//! Hash functions: the Keccak-f\[1600\] sponge core, SHA-2, and the
//! SHA-3/SHAKE/KMAC family built over it.

mod keccak;
pub mod sha2;
pub mod sha3;

pub use sha2::{Sha256, Sha512};
pub use sha3::{Kmac128, Kmac256, Sha3_256, Sha3_512, Shake128, Shake256};

/// A hash function that can be driven generically, e.g. from [`crate::mac::hmac`].
pub trait Hash: Default {
    /// Compression block size in bytes.
    const BLOCK: usize;
    /// Digest size in bytes.
    const OUTPUT: usize;

    fn update(&mut self, data: &[u8]);

    /// Finalize into `out`, which must be exactly `OUTPUT` bytes.
    fn finish_into(self, out: &mut [u8]);
}

impl Default for Sha256 {
    fn default() -> Self {
        Sha256::new()
    }
}

impl Hash for Sha256 {
    const BLOCK: usize = Sha256::BLOCK;
    const OUTPUT: usize = Sha256::OUTPUT;

    fn update(&mut self, data: &[u8]) {
        Sha256::update(self, data)
    }

    fn finish_into(self, out: &mut [u8]) {
        let mut digest = [0u8; 32];
        self.finish(&mut digest);
        out.copy_from_slice(&digest);
    }
}

impl Default for Sha512 {
    fn default() -> Self {
        Sha512::new()
    }
}

impl Hash for Sha512 {
    const BLOCK: usize = Sha512::BLOCK;
    const OUTPUT: usize = Sha512::OUTPUT;

    fn update(&mut self, data: &[u8]) {
        Sha512::update(self, data)
    }

    fn finish_into(self, out: &mut [u8]) {
        let mut digest = [0u8; 64];
        self.finish(&mut digest);
        out.copy_from_slice(&digest);
    }
}
