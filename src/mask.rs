use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Below this length the setup cost of the vector path outweighs the win
const SIMD_CUTOFF: usize = 16;

/// Generates the 4-byte masking key for one outbound frame.
///
/// According to the Websockets RFC, every frame sent from a client must be
/// masked with a fresh key that an observer of prior traffic can't predict,
/// so the key comes from a cryptographically seeded RNG rather than a plain
/// counter or a time-seeded generator.
pub fn generate_masking_key() -> [u8; 4] {
    let mut rng = StdRng::from_rng(&mut rand::rng());
    rng.random::<[u8; 4]>()
}

/// XORs `buf` in place against the repeating 4-byte `key`.
///
/// Masking and unmasking are the same transform: each payload byte is
/// XOR'd with `key[i % 4]`, so applying it twice restores the input.
/// Payloads of 16 bytes or more go through a 128-bit SIMD loop where the
/// platform has one; the scalar loop handles short payloads and the tail
/// left over after the 16-byte chunks.
pub fn apply_mask(key: [u8; 4], buf: &mut [u8]) {
    if buf.len() >= SIMD_CUTOFF {
        #[cfg(target_arch = "x86_64")]
        {
            // SSE2 is part of the x86_64 baseline
            unsafe { apply_mask_sse2(key, buf) };
            return;
        }
        #[cfg(target_arch = "aarch64")]
        {
            unsafe { apply_mask_neon(key, buf) };
            return;
        }
    }
    apply_mask_fallback(key, buf);
}

// Callers hand this whole buffers or tails starting at a multiple of 4,
// so indexing the key from zero keeps the phase right.
fn apply_mask_fallback(key: [u8; 4], buf: &mut [u8]) {
    for (i, byte) in buf.iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

// The key is splatted into a 16-byte block (repeated 4 times) so one
// 128-bit XOR covers 4 key cycles. Loads and stores are unaligned since
// payload buffers carry no alignment guarantee.
#[cfg(target_arch = "x86_64")]
unsafe fn apply_mask_sse2(key: [u8; 4], buf: &mut [u8]) {
    use std::arch::x86_64::{_mm_loadu_si128, _mm_storeu_si128, _mm_xor_si128, __m128i};

    let mut block = [0u8; 16];
    for chunk in block.chunks_exact_mut(4) {
        chunk.copy_from_slice(&key);
    }
    let mask_vec = _mm_loadu_si128(block.as_ptr() as *const __m128i);

    let mut chunks = buf.chunks_exact_mut(16);
    for chunk in &mut chunks {
        let src = _mm_loadu_si128(chunk.as_ptr() as *const __m128i);
        let masked = _mm_xor_si128(src, mask_vec);
        _mm_storeu_si128(chunk.as_mut_ptr() as *mut __m128i, masked);
    }
    // 16 is a multiple of the key length, so the tail starts in phase
    apply_mask_fallback(key, chunks.into_remainder());
}

#[cfg(target_arch = "aarch64")]
unsafe fn apply_mask_neon(key: [u8; 4], buf: &mut [u8]) {
    use std::arch::aarch64::{veorq_u8, vld1q_u8, vst1q_u8};

    let mut block = [0u8; 16];
    for chunk in block.chunks_exact_mut(4) {
        chunk.copy_from_slice(&key);
    }
    let mask_vec = vld1q_u8(block.as_ptr());

    let mut chunks = buf.chunks_exact_mut(16);
    for chunk in &mut chunks {
        let src = vld1q_u8(chunk.as_ptr());
        let masked = veorq_u8(src, mask_vec);
        vst1q_u8(chunk.as_mut_ptr(), masked);
    }
    apply_mask_fallback(key, chunks.into_remainder());
}
