//! Decimal Codec - fixed-point exchange prices to floating point.
//!
//! The order log carries prices as an integer mantissa plus a decimal
//! scale. Decoding divides by a precomputed power of ten; there is no
//! fallback for scales the table does not cover.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use rust_decimal::Decimal;

use crate::error::DecodeError;

/// Divisors for scales 0..=7
pub const POWERS_OF_10: [f64; 8] = [
    1.0,
    10.0,
    100.0,
    1_000.0,
    10_000.0,
    100_000.0,
    1_000_000.0,
    10_000_000.0,
];

/// Largest scale the codec accepts.
pub const MAX_SCALE: u8 = (POWERS_OF_10.len() - 1) as u8;

/// Size of the raw binary form: 8 mantissa bytes + 1 scale byte.
pub const BCD_WIRE_LEN: usize = 9;

/// A fixed-point decimal field as delivered by the feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Bcd {
    /// Signed integer mantissa
    pub mantissa: i64,
    /// Number of decimal digits after the point
    pub scale: u8,
}

impl Bcd {
    #[inline]
    pub const fn new(mantissa: i64, scale: u8) -> Self {
        Self { mantissa, scale }
    }

    /// Parse the raw binary form (little-endian mantissa, then scale).
    #[inline]
    pub fn from_le_bytes(bytes: [u8; BCD_WIRE_LEN]) -> Self {
        let mut mantissa = [0u8; 8];
        mantissa.copy_from_slice(&bytes[..8]);
        Self {
            mantissa: i64::from_le_bytes(mantissa),
            scale: bytes[8],
        }
    }

    /// Serialize to the raw binary form.
    #[inline]
    pub fn to_le_bytes(self) -> [u8; BCD_WIRE_LEN] {
        let mut out = [0u8; BCD_WIRE_LEN];
        out[..8].copy_from_slice(&self.mantissa.to_le_bytes());
        out[8] = self.scale;
        out
    }

    /// Lift a parsed decimal into mantissa/scale form.
    ///
    /// The scale is not checked here; [`Bcd::decode`] rejects it.
    pub fn from_decimal(value: Decimal) -> Result<Self, DecodeError> {
        let mantissa = i64::try_from(value.mantissa()).map_err(|_| DecodeError::MantissaOverflow)?;
        let scale = u8::try_from(value.scale()).map_err(|_| DecodeError::ScaleOutOfRange(u8::MAX))?;
        Ok(Self { mantissa, scale })
    }

    /// Decode to a floating-point price.
    ///
    /// # Errors
    /// `DecodeError::ScaleOutOfRange` when `scale > MAX_SCALE`.
    #[inline]
    pub fn decode(self) -> Result<Price, DecodeError> {
        let divisor = POWERS_OF_10
            .get(self.scale as usize)
            .ok_or(DecodeError::ScaleOutOfRange(self.scale))?;
        Ok(Price(self.mantissa as f64 / divisor))
    }
}

/// A decoded price.
///
/// Totally ordered (via `f64::total_cmp`) so it can key a sorted ladder.
/// `Price::ZERO` doubles as the "no resting interest" sentinel in snapshots.
#[derive(Clone, Copy, Default)]
pub struct Price(f64);

impl Price {
    pub const ZERO: Price = Price(0.0);

    #[inline]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn value(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl PartialEq for Price {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Price {}

impl PartialOrd for Price {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Price {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

// total_cmp equality is bitwise equality, so hashing the bits agrees with Eq
impl Hash for Price {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price({})", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<Price> for f64 {
    fn from(price: Price) -> f64 {
        price.0
    }
}
