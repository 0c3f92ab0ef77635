use std::fmt;

/// Raw 64-bit property payload
///
/// The logical type of a value is owned by the registry entry of its kind.
/// Equality and hashing compare raw bits, so `-0.0` and `0.0` are different
/// values and a NaN equals itself.
///
/// Encoding is typed, so only canonical bit patterns survive a round trip:
/// a Boolean comes back as 0 or 1 and a Real keeps only its low 32 bits.
/// Values built with [`PropertyValue::from_raw`] may compare unequal after
/// decoding.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct PropertyValue {
    raw: u64,
}

impl PropertyValue {
    pub const ZERO: PropertyValue = PropertyValue { raw: 0 };

    pub const fn from_raw(raw: u64) -> Self {
        Self { raw }
    }

    pub const fn raw(&self) -> u64 {
        self.raw
    }

    pub const fn from_i64(value: i64) -> Self {
        Self { raw: value as u64 }
    }

    pub fn from_f32(value: f32) -> Self {
        Self {
            raw: value.to_bits() as u64,
        }
    }

    pub const fn from_bool(value: bool) -> Self {
        Self { raw: value as u64 }
    }

    pub const fn from_time_ms(millis: i64) -> Self {
        Self::from_i64(millis)
    }

    /// Entity, prototype or asset reference
    pub const fn from_ref_id(id: u64) -> Self {
        Self { raw: id }
    }

    pub const fn as_i64(&self) -> i64 {
        self.raw as i64
    }

    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.raw as u32)
    }

    pub const fn as_bool(&self) -> bool {
        self.raw != 0
    }

    pub const fn as_time_ms(&self) -> i64 {
        self.raw as i64
    }

    pub const fn as_ref_id(&self) -> u64 {
        self.raw
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::from_i64(value as i64)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::from_f32(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PropertyValue({:#x})", self.raw)
    }
}
