use num_enum::{FromPrimitive, IntoPrimitive};

use crate::{codec::Field, PAYLOAD_LEN};

/// Status byte plus a 4-byte value, packed.
pub const OVERRIDE_RECORD_LEN: usize = 1 + PAYLOAD_LEN;

/// Whether an output follows its computed value or a forced one. Any status
/// byte other than 0 counts as overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OverrideStatus {
    Passthrough = 0,
    #[num_enum(default)]
    Overridden = 1,
}

/// One override record as laid out in the overrides region:
///
/// ```text
/// [ status, value[0..4] ]
/// ```
///
/// The value is stored in native byte order and is read as whichever scalar
/// type the channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Override {
    pub status: OverrideStatus,
    pub value: [u8; PAYLOAD_LEN],
}

impl Override {
    pub const PASSTHROUGH: Self = Self {
        status: OverrideStatus::Passthrough,
        value: [0; PAYLOAD_LEN],
    };

    pub fn from_bytes(bytes: &[u8; OVERRIDE_RECORD_LEN]) -> Self {
        Self {
            status: bytes[0].into(),
            value: [bytes[1], bytes[2], bytes[3], bytes[4]],
        }
    }

    pub fn as_bytes(&self) -> [u8; OVERRIDE_RECORD_LEN] {
        [
            self.status.into(),
            self.value[0],
            self.value[1],
            self.value[2],
            self.value[3],
        ]
    }

    pub fn is_overridden(&self) -> bool {
        self.status == OverrideStatus::Overridden
    }

    /// The forced value, read as `F`.
    pub fn value<F: Field>(&self) -> F {
        F::from_ne_prefix(&self.value)
    }

    /// Returns the forced value when overridden, `computed` otherwise.
    pub fn apply<F: Field>(&self, computed: F) -> F {
        match self.status {
            OverrideStatus::Overridden => self.value(),
            OverrideStatus::Passthrough => computed,
        }
    }
}
