//! Client-to-server payload masking (RFC 6455 Section 5.3).

/// XOR `data` with `mask`, cycling the key every four bytes.
///
/// Masking is an involution: applying the same key twice restores the input.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Same result as [`apply_mask`], processing four bytes per step.
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);
    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }
    for (byte, key) in chunks.into_remainder().iter_mut().zip(mask) {
        *byte ^= key;
    }
}

/// Seed for a mask generator.
/// Falls back to system time if getrandom fails.
fn random_mask_seed() -> u32 {
    let mut buf = [0u8; 4];
    if getrandom::getrandom(&mut buf).is_ok() {
        u32::from_le_bytes(buf)
    } else {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u32)
            .unwrap_or(0x1234_5678)
    }
}

/// Per-connection source of masking keys.
///
/// Keys only need to vary between frames for protocol compliance, so a
/// cheap mixing counter seeded once from the OS is enough.
#[derive(Debug, Clone)]
pub struct MaskGenerator {
    counter: u32,
}

impl MaskGenerator {
    /// Create a generator seeded from the OS random source.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(random_mask_seed())
    }

    /// Create a generator with a fixed seed.
    #[must_use]
    pub const fn with_seed(seed: u32) -> Self {
        Self { counter: seed }
    }

    /// Produce the next 4-byte masking key.
    pub fn next_mask(&mut self) -> [u8; 4] {
        self.counter = self.counter.wrapping_add(0x9E37_79B9);
        let a = self.counter;
        let b = a.wrapping_mul(0x85EB_CA6B);
        let c = b ^ (b >> 13);
        let d = c.wrapping_mul(0xC2B2_AE35);
        d.to_le_bytes()
    }
}

impl Default for MaskGenerator {
    fn default() -> Self {
        Self::new()
    }
}
