//! ChaCha20 stream cipher and standalone block permutation.

use crate::util::{secure_zero, xor_with};

/// `"expand 32-byte k"` as four little-endian words.
const CONSTANTS: [u32; 4] = [0x61707865, 0x3320646E, 0x79622D32, 0x6B206574];

/// Quarter-round operand indices packed as four nibbles (a<<12 | b<<8 | c<<4 | d).
const QR_INDICES: [u16; 8] = [
    0x048C, 0x159D, 0x26AE, 0x37BF, 0x05AF, 0x16BC, 0x278D, 0x349E,
];

const ROUNDS: usize = 10;

const KEY_LENGTH: usize = 32;

fn quarter_round(state: &mut [u32; 16], indices: u16) {
    let ai = ((indices >> 12) & 0xF) as usize;
    let bi = ((indices >> 8) & 0xF) as usize;
    let ci = ((indices >> 4) & 0xF) as usize;
    let di = (indices & 0xF) as usize;

    let mut a = state[ai];
    let mut b = state[bi];
    let mut c = state[ci];
    let mut d = state[di];

    a = a.wrapping_add(b);
    d ^= a;
    d = d.rotate_left(16);
    c = c.wrapping_add(d);
    b ^= c;
    b = b.rotate_left(12);
    a = a.wrapping_add(b);
    d ^= a;
    d = d.rotate_left(8);
    c = c.wrapping_add(d);
    b ^= c;
    b = b.rotate_left(7);

    state[ai] = a;
    state[bi] = b;
    state[ci] = c;
    state[di] = d;
}

/// Apply the ChaCha20 block function to `src`, writing the result to `out`.
pub fn process_block(out: &mut [u32; 16], src: &[u32; 16]) {
    let mut state = *src;
    for _ in 0..ROUNDS {
        for &idx in QR_INDICES.iter() {
            quarter_round(&mut state, idx);
        }
    }
    for i in 0..16 {
        out[i] = state[i].wrapping_add(src[i]);
    }
}

/// ChaCha20 streaming cipher state.
pub struct ChaCha20 {
    state: [u32; 16],
    stream: [u8; 64],
    ptr: usize,
}

impl ChaCha20 {
    /// Initialize with a 32-byte key and a 12-byte (96-bit) nonce, counter
    /// implicitly 0.
    pub fn new(key: &[u8; KEY_LENGTH], nonce: &[u8; 12]) -> Self {
        let mut ctx = Self::with_constants(key);
        ctx.state[12] = 0;
        ctx.state[13] = u32::from_le_bytes(nonce[0..4].try_into().unwrap());
        ctx.state[14] = u32::from_le_bytes(nonce[4..8].try_into().unwrap());
        ctx.state[15] = u32::from_le_bytes(nonce[8..12].try_into().unwrap());
        ctx.refill();
        ctx
    }

    /// Initialize with a 32-byte key and a 64-bit nonce: the nonce is
    /// encoded as `0 || (nonce>>32) || (nonce&0xFFFFFFFF)` in the top
    /// three state words, equivalent to `new` with that 12-byte nonce.
    pub fn new_with_u64_nonce(key: &[u8; KEY_LENGTH], nonce: u64) -> Self {
        let mut ctx = Self::with_constants(key);
        ctx.state[12] = 0;
        ctx.state[13] = 0;
        ctx.state[14] = (nonce >> 32) as u32;
        ctx.state[15] = nonce as u32;
        ctx.refill();
        ctx
    }

    fn with_constants(key: &[u8; KEY_LENGTH]) -> Self {
        let mut state = [0u32; 16];
        state[0..4].copy_from_slice(&CONSTANTS);
        for i in 0..8 {
            state[4 + i] = u32::from_le_bytes(key[4 * i..4 * i + 4].try_into().unwrap());
        }
        ChaCha20 { state, stream: [0u8; 64], ptr: 0 }
    }

    fn refill(&mut self) {
        let mut out = [0u32; 16];
        process_block(&mut out, &self.state);
        for i in 0..16 {
            self.stream[4 * i..4 * i + 4].copy_from_slice(&out[i].to_le_bytes());
        }
        self.ptr = 0;
        self.state[12] = self.state[12].wrapping_add(1);
    }

    /// XOR `src` with the keystream into `dst` (same length), streaming
    /// across arbitrary chunk boundaries.
    pub fn process(&mut self, dst: &mut [u8], src: &[u8]) {
        debug_assert_eq!(dst.len(), src.len());
        let mut off = 0;
        while off < src.len() {
            let n = (64 - self.ptr).min(src.len() - off);
            xor_with(
                &mut dst[off..off + n],
                &src[off..off + n],
                &self.stream[self.ptr..self.ptr + n],
            );

            self.ptr += n;
            off += n;
            if self.ptr == 64 {
                self.refill();
            }
        }
    }
}

impl Drop for ChaCha20 {
    fn drop(&mut self) {
        secure_zero(unsafe {
            core::slice::from_raw_parts_mut(self.state.as_mut_ptr() as *mut u8, 64)
        });
        secure_zero(&mut self.stream);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc7539_test_vector() {
        let key: [u8; 32] = core::array::from_fn(|i| i as u8);
        let nonce = [0u8; 12];
        let mut cipher = ChaCha20::new(&key, &nonce);

        let plaintext = [0u8; 64];
        let mut out = [0u8; 64];
        cipher.process(&mut out, &plaintext);

        let expected: [u8; 64] = [
            0x76, 0xb8, 0xe0, 0xad, 0xa0, 0xf1, 0x3d, 0x90, 0x40, 0x5d, 0x6a, 0xe5, 0x53, 0x86,
            0xbd, 0x28, 0xbd, 0xd2, 0x19, 0xb8, 0xa0, 0x8d, 0xed, 0x1a, 0xa8, 0x36, 0xef, 0xcc,
            0x8b, 0x77, 0x0d, 0xc7, 0xda, 0x41, 0x59, 0x7c, 0x51, 0x57, 0x48, 0x8d, 0x77, 0x24,
            0xe0, 0x3f, 0xb8, 0xd8, 0x4a, 0x37, 0x6a, 0x43, 0xb8, 0xf4, 0x15, 0x18, 0xa1, 0x1c,
            0xc3, 0x87, 0xb6, 0x69, 0xb2, 0xee, 0x65, 0x86,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn u64_nonce_matches_equivalent_12_byte_nonce() {
        let key = [0x42u8; 32];
        let nonce: u64 = 0x1122_3344_5566_7788;

        let mut a = ChaCha20::new_with_u64_nonce(&key, nonce);
        let mut expanded_nonce = [0u8; 12];
        expanded_nonce[4..8].copy_from_slice(&((nonce >> 32) as u32).to_le_bytes());
        expanded_nonce[8..12].copy_from_slice(&(nonce as u32).to_le_bytes());
        let mut b = ChaCha20::new(&key, &expanded_nonce);

        let input = [0xAAu8; 80];
        let mut out_a = [0u8; 80];
        let mut out_b = [0u8; 80];
        a.process(&mut out_a, &input);
        b.process(&mut out_b, &input);

        assert_eq!(out_a, out_b);
    }

    #[test]
    fn chunked_processing_matches_single_shot() {
        let key = [0x07u8; 32];
        let nonce = [0x01u8; 12];
        let input: [u8; 200] = core::array::from_fn(|i| i as u8);

        let mut whole = ChaCha20::new(&key, &nonce);
        let mut out_whole = [0u8; 200];
        whole.process(&mut out_whole, &input);

        let mut chunked = ChaCha20::new(&key, &nonce);
        let mut out_chunked = [0u8; 200];
        chunked.process(&mut out_chunked[..9], &input[..9]);
        chunked.process(&mut out_chunked[9..130], &input[9..130]);
        chunked.process(&mut out_chunked[130..], &input[130..]);

        assert_eq!(out_whole, out_chunked);
    }
}
