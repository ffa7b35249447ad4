//! Fast-key-erasure CSPRNG built on the ChaCha20 block permutation.
//!
//! Output is not intended to be reproducible across crate versions; do not
//! rely on it to derive deterministic values from a fixed seed. Instances
//! start with an all-zero key and must be seeded through [`SecureRandom::push_entropy`]
//! before [`SecureRandom::generate`] is used.

use crate::cipher::chacha20::process_block;
use crate::util::{secure_zero, xor_in_place};

const CONSTANTS: [u32; 4] = [0x61707865, 0x3320646E, 0x79622D32, 0x6B206574];

const KEY_WORDS: usize = 8;
const KEY_BYTES: usize = KEY_WORDS * 4;
const BLOCK_BYTES: usize = 64;
const OUTPUT_PER_BLOCK: usize = BLOCK_BYTES - KEY_BYTES;

fn words_to_le_bytes(words: &[u32], out: &mut [u8]) {
    for (i, w) in words.iter().enumerate() {
        out[4 * i..4 * i + 4].copy_from_slice(&w.to_le_bytes());
    }
}

fn le_bytes_to_words(bytes: &[u8], words: &mut [u32]) {
    for (i, w) in words.iter_mut().enumerate() {
        *w = u32::from_le_bytes(bytes[4 * i..4 * i + 4].try_into().unwrap());
    }
}

/// CSPRNG state: a ChaCha20 register that re-keys itself from its own
/// output before ever revealing that output.
pub struct SecureRandom {
    state: [u32; 16],
    stream: [u32; 16],
}

impl SecureRandom {
    /// Build an unseeded instance. Push entropy before calling `generate`.
    pub fn new() -> Self {
        let mut state = [0u32; 16];
        state[0..4].copy_from_slice(&CONSTANTS);
        SecureRandom { state, stream: [0u32; 16] }
    }

    fn xor_into_key(&mut self, data: &[u8]) {
        let mut key_bytes = [0u8; KEY_BYTES];
        words_to_le_bytes(&self.state[4..4 + KEY_WORDS], &mut key_bytes);
        xor_in_place(&mut key_bytes[..data.len()], data);
        le_bytes_to_words(&key_bytes, &mut self.state[4..4 + KEY_WORDS]);
        secure_zero(&mut key_bytes);
    }

    fn zero_stream(&mut self) {
        secure_zero(unsafe {
            core::slice::from_raw_parts_mut(self.stream.as_mut_ptr() as *mut u8, BLOCK_BYTES)
        });
    }

    /// Run the block permutation, fold the first half of the output back
    /// into the key, and advance the counter. The second half is left in
    /// `self.stream` for the caller to consume or discard.
    fn advance_block(&mut self) {
        process_block(&mut self.stream, &self.state);

        for i in 0..KEY_WORDS {
            self.state[4 + i] ^= self.stream[i];
        }

        self.state[12] = self.state[12].wrapping_add(1);
        if self.state[12] == 0 {
            self.state[13] = self.state[13].wrapping_add(1);
        }
    }

    /// Mix `data` into the entropy pool, re-keying after every 32-byte
    /// chunk so no single block's output ever depends on more than one
    /// chunk of fresh entropy.
    pub fn push_entropy(&mut self, data: &[u8]) {
        let mut off = 0;
        while off < data.len() {
            let n = KEY_BYTES.min(data.len() - off);
            self.xor_into_key(&data[off..off + n]);

            self.advance_block();

            let mut stream_bytes = [0u8; BLOCK_BYTES];
            words_to_le_bytes(&self.stream, &mut stream_bytes);
            self.xor_into_key(&stream_bytes[KEY_BYTES..]);
            secure_zero(&mut stream_bytes);
            self.zero_stream();

            off += n;
        }
    }

    /// Fill `buffer` with random bytes. Each 32-byte (or shorter, for the
    /// final chunk) segment costs one block permutation and re-key; any
    /// unused tail of a block is discarded rather than cached.
    pub fn generate(&mut self, buffer: &mut [u8]) {
        let mut off = 0;
        while off < buffer.len() {
            let n = OUTPUT_PER_BLOCK.min(buffer.len() - off);
            self.advance_block();

            let mut stream_bytes = [0u8; BLOCK_BYTES];
            words_to_le_bytes(&self.stream, &mut stream_bytes);
            buffer[off..off + n].copy_from_slice(&stream_bytes[KEY_BYTES..KEY_BYTES + n]);
            secure_zero(&mut stream_bytes);
            self.zero_stream();

            off += n;
        }
    }
}

impl Default for SecureRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SecureRandom {
    fn drop(&mut self) {
        secure_zero(unsafe {
            core::slice::from_raw_parts_mut(self.state.as_mut_ptr() as *mut u8, 64)
        });
        self.zero_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_seed_produces_identical_output() {
        let mut a = SecureRandom::new();
        let mut b = SecureRandom::new();
        a.push_entropy(b"some shared seed material");
        b.push_entropy(b"some shared seed material");

        let mut out_a = [0u8; 48];
        let mut out_b = [0u8; 48];
        a.generate(&mut out_a);
        b.generate(&mut out_b);

        assert_eq!(out_a, out_b);
    }

    #[test]
    fn different_seed_produces_different_output() {
        let mut a = SecureRandom::new();
        let mut b = SecureRandom::new();
        a.push_entropy(b"seed one");
        b.push_entropy(b"seed two");

        let mut out_a = [0u8; 48];
        let mut out_b = [0u8; 48];
        a.generate(&mut out_a);
        b.generate(&mut out_b);

        assert_ne!(out_a, out_b);
    }

    #[test]
    fn successive_outputs_differ() {
        let mut rng = SecureRandom::new();
        rng.push_entropy(b"entropy");

        let mut first = [0u8; 32];
        let mut second = [0u8; 32];
        rng.generate(&mut first);
        rng.generate(&mut second);

        assert_ne!(first, second);
    }

    #[test]
    fn output_is_not_degenerate() {
        let mut rng = SecureRandom::new();
        rng.push_entropy(b"entropy");

        let mut out = [0u8; 64];
        rng.generate(&mut out);

        assert!(out.iter().any(|&b| b != 0));
    }

    #[test]
    fn long_entropy_pushes_in_multiple_chunks() {
        let mut a = SecureRandom::new();
        let mut b = SecureRandom::new();

        let long_seed = [0x5Au8; 100];
        a.push_entropy(&long_seed);

        for chunk in long_seed.chunks(KEY_BYTES) {
            b.push_entropy(chunk);
        }

        let mut out_a = [0u8; 16];
        let mut out_b = [0u8; 16];
        a.generate(&mut out_a);
        b.generate(&mut out_b);

        assert_eq!(out_a, out_b);
    }
}
