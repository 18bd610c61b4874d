//! # Goldilocks Field
//!
//! Prime field with p = 2^64 - 2^32 + 1.
//!
//! ## Properties
//!
//! - 64-bit elements, products reduced through `u128`
//! - Multiplicative group has order divisible by 2^32, so every power-of-two
//!   domain up to 2^32 has a root of unity
//! - Elements are exchanged as 8 little-endian bytes, canonical (< p)

use std::ops::{Add, Mul, Sub};

/// Goldilocks prime: p = 2^64 - 2^32 + 1
pub const GOLDILOCKS_PRIME: u64 = 0xFFFF_FFFF_0000_0001;

/// Largest power-of-two subgroup: 2^32.
pub const TWO_ADICITY: u32 = 32;

/// Encoded element width in bytes.
pub const ELEMENT_BYTES: usize = 8;

/// Element in the Goldilocks field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldElement(u64);

impl FieldElement {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    /// Multiplicative generator.
    pub const GENERATOR: Self = Self(7);

    /// Create new field element (reduces mod p).
    pub fn new(value: u64) -> Self {
        Self(value % GOLDILOCKS_PRIME)
    }

    fn from_u128(value: u128) -> Self {
        Self((value % GOLDILOCKS_PRIME as u128) as u64)
    }

    /// Get the raw value.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Decode one canonical element; `None` if `bytes` is not 8 bytes or the
    /// value is not reduced.
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        let raw = u64::from_le_bytes(bytes.try_into().ok()?);
        (raw < GOLDILOCKS_PRIME).then_some(Self(raw))
    }

    pub fn to_le_bytes(self) -> [u8; ELEMENT_BYTES] {
        self.0.to_le_bytes()
    }

    /// Exponentiation by squaring.
    pub fn pow(&self, mut exp: u64) -> Self {
        let mut base = *self;
        let mut result = Self::ONE;

        while exp > 0 {
            if exp & 1 == 1 {
                result = result * base;
            }
            base = base * base;
            exp >>= 1;
        }
        result
    }

    /// Primitive `size`-th root of unity. `size` must be a power of two no
    /// larger than 2^32.
    pub fn root_of_unity(size: u64) -> Option<Self> {
        if !size.is_power_of_two() || size.trailing_zeros() > TWO_ADICITY {
            return None;
        }
        Some(Self::GENERATOR.pow((GOLDILOCKS_PRIME - 1) / size))
    }
}

impl Add for FieldElement {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_u128(self.0 as u128 + rhs.0 as u128)
    }
}

impl Sub for FieldElement {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        if self.0 >= rhs.0 {
            Self(self.0 - rhs.0)
        } else {
            Self(GOLDILOCKS_PRIME - rhs.0 + self.0)
        }
    }
}

impl Mul for FieldElement {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::from_u128(self.0 as u128 * rhs.0 as u128)
    }
}

impl std::iter::Sum for FieldElement {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, x| acc + x)
    }
}

/// Decode a packed buffer of elements.
pub fn decode_elements(bytes: &[u8]) -> Option<Vec<FieldElement>> {
    if bytes.len() % ELEMENT_BYTES != 0 {
        return None;
    }
    bytes
        .chunks_exact(ELEMENT_BYTES)
        .map(FieldElement::from_le_bytes)
        .collect()
}

/// Pack elements into a byte buffer.
pub fn encode_elements(elements: &[FieldElement]) -> Vec<u8> {
    elements.iter().flat_map(|e| e.to_le_bytes()).collect()
}
