//! AES in counter (CTR) mode.
//!
//! Only AES encryption is implemented ([`super::aes`]): CTR mode turns the
//! block cipher into a keystream generator, and both encryption and
//! decryption XOR that keystream against the data, so the same forward
//! direction serves both.

use super::aes::Aes;
use crate::util::{secure_zero, xor_in_place};

/// AES-CTR streaming cipher state.
pub struct AesCtr {
    cipher: Aes,
    counter: [u8; 16],
    keystream: [u8; 16],
    pos: usize,
}

impl AesCtr {
    /// Reject `key` lengths other than 16/24/32 bytes, matching
    /// [`Aes::new`]. `counter` seeds the initial 128-bit big-endian
    /// counter value (typically nonce || 0).
    pub fn new(key: &[u8], counter: [u8; 16]) -> Option<Self> {
        let cipher = Aes::new(key)?;
        Some(AesCtr { cipher, counter, keystream: [0u8; 16], pos: 0 })
    }

    fn increment_counter(&mut self) {
        for byte in self.counter.iter_mut().rev() {
            *byte = byte.wrapping_add(1);
            if *byte != 0 {
                break;
            }
        }
    }

    /// XOR `src` with the keystream into `dst`, which must be the same
    /// length as `src`. Calling this again continues the stream from
    /// where the previous call left off.
    pub fn process(&mut self, dst: &mut [u8], src: &[u8]) {
        debug_assert_eq!(dst.len(), src.len());
        let mut off = 0;
        while off < src.len() {
            if self.pos == 0 {
                self.keystream = self.counter;
                self.cipher.encrypt_block(&mut self.keystream);
                self.increment_counter();
            }

            let n = (16 - self.pos).min(src.len() - off);
            for i in 0..n {
                dst[off + i] = src[off + i] ^ self.keystream[self.pos + i];
            }

            self.pos += n;
            off += n;
            if self.pos == 16 {
                self.pos = 0;
            }
        }
    }

    /// XOR `buf` with the keystream in place.
    pub fn process_in_place(&mut self, buf: &mut [u8]) {
        let mut off = 0;
        while off < buf.len() {
            if self.pos == 0 {
                self.keystream = self.counter;
                self.cipher.encrypt_block(&mut self.keystream);
                self.increment_counter();
            }

            let n = (16 - self.pos).min(buf.len() - off);
            xor_in_place(&mut buf[off..off + n], &self.keystream[self.pos..self.pos + n]);

            self.pos += n;
            off += n;
            if self.pos == 16 {
                self.pos = 0;
            }
        }
    }
}

impl Drop for AesCtr {
    fn drop(&mut self) {
        secure_zero(&mut self.counter);
        secure_zero(&mut self.keystream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_is_an_involution() {
        let key = [0x2bu8; 16];
        let plaintext: [u8; 40] = core::array::from_fn(|i| i as u8);

        let mut enc = AesCtr::new(&key, [0u8; 16]).unwrap();
        let mut ciphertext = [0u8; 40];
        enc.process(&mut ciphertext, &plaintext);

        let mut dec = AesCtr::new(&key, [0u8; 16]).unwrap();
        let mut roundtrip = [0u8; 40];
        dec.process(&mut roundtrip, &ciphertext);

        assert_eq!(plaintext, roundtrip);
    }

    #[test]
    fn chunked_processing_matches_single_shot() {
        let key = [0x11u8; 16];
        let plaintext: [u8; 50] = core::array::from_fn(|i| (i * 3) as u8);

        let mut whole = AesCtr::new(&key, [0u8; 16]).unwrap();
        let mut out_whole = [0u8; 50];
        whole.process(&mut out_whole, &plaintext);

        let mut chunked = AesCtr::new(&key, [0u8; 16]).unwrap();
        let mut out_chunked = [0u8; 50];
        chunked.process(&mut out_chunked[..17], &plaintext[..17]);
        chunked.process(&mut out_chunked[17..33], &plaintext[17..33]);
        chunked.process(&mut out_chunked[33..], &plaintext[33..]);

        assert_eq!(out_whole, out_chunked);
    }
}
