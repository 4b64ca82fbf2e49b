//! MD4 (RFC 1320) block compression.
//!
//! Only what NTLM needs: the compression function over a single 64-byte block
//! and the standard message framing on top of it. MD4 is broken as a general
//! purpose hash and is kept here solely as the NTLM building block.

/// MD4 initial chaining value.
pub const IV: [u32; 4] = [0x67452301, 0xefcdab89, 0x98badcfe, 0x10325476];

pub const BLOCK_SIZE: usize = 64;

const ROUND2_CONSTANT: u32 = 0x5a827999;
const ROUND3_CONSTANT: u32 = 0x6ed9eba1;

const ROUND1_SHIFTS: [u32; 4] = [3, 7, 11, 19];
const ROUND2_SHIFTS: [u32; 4] = [3, 5, 9, 13];
const ROUND3_SHIFTS: [u32; 4] = [3, 9, 11, 15];

const ROUND2_ORDER: [usize; 16] = [0, 4, 8, 12, 1, 5, 9, 13, 2, 6, 10, 14, 3, 7, 11, 15];
const ROUND3_ORDER: [usize; 16] = [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15];

#[inline]
fn f(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (!x & z)
}

#[inline]
fn g(x: u32, y: u32, z: u32) -> u32 {
    (x & y) | (x & z) | (y & z)
}

#[inline]
fn h(x: u32, y: u32, z: u32) -> u32 {
    x ^ y ^ z
}

/// Runs one 16-step round over the working variables `v = [a, b, c, d]`.
///
/// Step `i` updates `a`, `d`, `c`, `b` in turn (indices 0, 3, 2, 1), feeding
/// the other three variables to `func` in rotated order.
#[inline(always)]
fn round(
    v: &mut [u32; 4],
    x: &[u32; 16],
    func: fn(u32, u32, u32) -> u32,
    order: impl Fn(usize) -> usize,
    shifts: &[u32; 4],
    constant: u32,
) {
    for i in 0..16 {
        let target = (4 - i % 4) % 4;
        let (p, q, r) = (
            v[(target + 1) % 4],
            v[(target + 2) % 4],
            v[(target + 3) % 4],
        );
        v[target] = v[target]
            .wrapping_add(func(p, q, r))
            .wrapping_add(x[order(i)])
            .wrapping_add(constant)
            .rotate_left(shifts[i % 4]);
    }
}

/// Compresses one 64-byte block into `state`, returning the new state.
pub fn compress(state: [u32; 4], block: &[u8; BLOCK_SIZE]) -> [u32; 4] {
    let mut x = [0u32; 16];
    for (word, chunk) in x.iter_mut().zip(block.chunks_exact(4)) {
        *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    let mut v = state;
    round(&mut v, &x, f, |i| i, &ROUND1_SHIFTS, 0);
    round(&mut v, &x, g, |i| ROUND2_ORDER[i], &ROUND2_SHIFTS, ROUND2_CONSTANT);
    round(&mut v, &x, h, |i| ROUND3_ORDER[i], &ROUND3_SHIFTS, ROUND3_CONSTANT);

    [
        state[0].wrapping_add(v[0]),
        state[1].wrapping_add(v[1]),
        state[2].wrapping_add(v[2]),
        state[3].wrapping_add(v[3]),
    ]
}

/// Appends the MD4 trailer: `0x80`, zeros up to 56 mod 64, then the original
/// bit length as a little-endian `u64`.
pub(crate) fn pad(message: &mut Vec<u8>) {
    let bit_len = (message.len() as u64).wrapping_mul(8);
    message.push(0x80);
    while message.len() % BLOCK_SIZE != BLOCK_SIZE - 8 {
        message.push(0);
    }
    message.extend_from_slice(&bit_len.to_le_bytes());
}

/// Feeds an already padded buffer through [`compress`] and serializes the
/// final state as four little-endian words.
pub(crate) fn digest_padded(padded: &[u8]) -> [u8; 16] {
    let mut state = IV;
    for chunk in padded.chunks_exact(BLOCK_SIZE) {
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(chunk);
        state = compress(state, &block);
    }

    let mut out = [0u8; 16];
    for (bytes, word) in out.chunks_exact_mut(4).zip(state) {
        bytes.copy_from_slice(&word.to_le_bytes());
    }
    out
}

/// MD4 digest of an arbitrary byte message.
pub fn digest(message: &[u8]) -> [u8; 16] {
    let mut buffer = Vec::with_capacity(message.len() + BLOCK_SIZE + 8);
    buffer.extend_from_slice(message);
    pad(&mut buffer);
    digest_padded(&buffer)
}
