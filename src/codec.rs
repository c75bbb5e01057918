use core::mem::size_of;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Width in bytes of a variable addressed by a frame. The raw value is the
/// frame's length byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = WidthError, constructor = WidthError::Unsupported))]
#[repr(u8)]
pub enum Width {
    One = 1,
    Two = 2,
    Four = 4,
}

impl Width {
    pub const fn num_bytes(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WidthError {
    #[error("Variable length ({0:?}) is not one of 1, 2 or 4")]
    Unsupported(u8),
}

/* Payload (big-endian word) */

/// Reads a value out of a frame payload. The payload is one big-endian word
/// and a field of `width` bytes sits in its least significant bytes, so
/// `[0x00, 0x00, 0x01, 0x02]` at [`Width::Two`] is `0x0102`.
pub fn decode_field(payload: &[u8; 4], width: Width) -> u32 {
    let word = u32::from_be_bytes(*payload);

    match width {
        Width::One => word & 0xFF,
        Width::Two => word & 0xFFFF,
        Width::Four => word,
    }
}

/// Inverse of [`decode_field`]. Bits above `width` are dropped.
pub fn encode_field(value: u32, width: Width) -> [u8; 4] {
    let masked = match width {
        Width::One => value & 0xFF,
        Width::Two => value & 0xFFFF,
        Width::Four => value,
    };

    masked.to_be_bytes()
}

/* Memory (native order) */

/// Native-order bytes of `value` truncated to `width`. Only the first
/// `width.num_bytes()` bytes are meaningful.
pub fn native_field_bytes(value: u32, width: Width) -> [u8; 4] {
    let mut out = [0u8; 4];

    match width {
        Width::One => out[0] = value as u8,
        Width::Two => out[..2].copy_from_slice(&(value as u16).to_ne_bytes()),
        Width::Four => out.copy_from_slice(&value.to_ne_bytes()),
    }

    out
}

/// A fixed-width scalar that can live inside a calibration region. Values are
/// stored in native byte order, packed, with no alignment.
pub trait Field: Copy {
    const WIDTH: usize;

    /// Builds the value from the first `WIDTH` bytes of `bytes`.
    fn from_ne_prefix(bytes: &[u8; 4]) -> Self;

    /// Native-order bytes of the value, left aligned.
    fn to_ne_prefix(self) -> [u8; 4];
}

macro_rules! impl_field {
    ($($ty:ty),*) => {
        $(
            impl Field for $ty {
                const WIDTH: usize = size_of::<$ty>();

                fn from_ne_prefix(bytes: &[u8; 4]) -> Self {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_ne_bytes(raw)
                }

                fn to_ne_prefix(self) -> [u8; 4] {
                    let mut out = [0u8; 4];
                    out[..size_of::<$ty>()].copy_from_slice(&self.to_ne_bytes());
                    out
                }
            }
        )*
    };
}

impl_field!(u8, i8, u16, i16, u32, i32, f32);
