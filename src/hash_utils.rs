//! Hash-related utils.
//!
//! The filter relies on two cheap 32-bit string hashes evaluated over the little-endian bytes of a
//! 64-bit key. One of them derives fingerprints, the other one bucket indices.

/// Multiplicative hash (RS hash).
///
/// For every byte: `h = h * a + byte`, then `a = a * b`.
pub fn multiplicative_hash(key: u64) -> u32 {
    const B: u32 = 378_551;
    let mut a: u32 = 63_689;
    let mut h: u32 = 0;
    for byte in key.to_le_bytes() {
        h = h.wrapping_mul(a).wrapping_add(u32::from(byte));
        a = a.wrapping_mul(B);
    }
    h
}

/// Shift-XOR hash (JS hash).
///
/// For every byte: `h ^= (h << 5) + byte + (h >> 2)`.
pub fn shift_xor_hash(key: u64) -> u32 {
    let mut h: u32 = 1_315_423_911;
    for byte in key.to_le_bytes() {
        h ^= (h << 5).wrapping_add(u32::from(byte)).wrapping_add(h >> 2);
    }
    h
}

/// Selects one member of the hash family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashVariant {
    /// [`shift_xor_hash`], used for fingerprints.
    ShiftXor,

    /// [`multiplicative_hash`], used for bucket indices.
    Multiplicative,

    /// `multiplicative_hash + i * shift_xor_hash` (wrapping).
    Combined(u32),
}

impl HashVariant {
    fn raw(self, key: u64) -> u32 {
        match self {
            Self::ShiftXor => shift_xor_hash(key),
            Self::Multiplicative => multiplicative_hash(key),
            Self::Combined(i) => {
                multiplicative_hash(key).wrapping_add(i.wrapping_mul(shift_xor_hash(key)))
            }
        }
    }
}

/// Hash `key` with the given `variant` and reduce the result into `0..modulus`.
///
/// # Panics
/// Panics if `modulus` is 0.
pub fn hash(key: u64, variant: HashVariant, modulus: u32) -> u32 {
    assert!(modulus > 0, "modulus must be greater than 0");
    variant.raw(key) % modulus
}
