use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    codec::{decode_field, encode_field, Width, WidthError},
    FrameParseError, Message, PAYLOAD_LEN,
};

/// The 4-bit tag in the low nibble of every frame's first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = FrameParseError, constructor = FrameParseError::UnrecognizedCommand))]
#[repr(u8)]
pub enum CommandKind {
    UpdateSetting = 0,
    ReadSetting = 1,
    OverrideOn = 2,
    OverrideOff = 3,
    ReadOverride = 4,
    ReadMeasurement = 5,
    SaveSettings = 6,
    Hello = 7,
    /// Only ever sent by a node
    Ack = 8,
}

/// A decoded request addressed to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Write `value` into the settings region
    UpdateSetting { offset: u16, width: Width, value: u32 },
    ReadSetting { offset: u16, width: Width },
    /// Force the override record at `offset` to `value`
    OverrideOn { offset: u16, value: u32 },
    /// Release the override record at `offset`, still storing `value`
    OverrideOff { offset: u16, value: u32 },
    ReadOverride { offset: u16, width: Width },
    ReadMeasurement { offset: u16, width: Width },
    SaveSettings,
    Hello,
}

/// Various errors which can arise while interpreting a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandParseError {
    #[error("Received a response-only tag ({0:?}) as a request")]
    ResponseOnly(CommandKind),
    #[error("Received a command ({0:?}) with an unsupported length")]
    InvalidWidth(CommandKind, #[source] WidthError),

    /* Frame Parsing */
    #[error("Failed to parse frame content")]
    InvalidFrameContent(#[from] FrameParseError),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::UpdateSetting { .. } => CommandKind::UpdateSetting,
            Self::ReadSetting { .. } => CommandKind::ReadSetting,
            Self::OverrideOn { .. } => CommandKind::OverrideOn,
            Self::OverrideOff { .. } => CommandKind::OverrideOff,
            Self::ReadOverride { .. } => CommandKind::ReadOverride,
            Self::ReadMeasurement { .. } => CommandKind::ReadMeasurement,
            Self::SaveSettings => CommandKind::SaveSettings,
            Self::Hello => CommandKind::Hello,
        }
    }

    pub fn from_message(message: &Message) -> Result<Self, CommandParseError> {
        let kind = message.command;
        let offset = message.offset;
        let width = || {
            Width::try_from(message.length).map_err(|e| CommandParseError::InvalidWidth(kind, e))
        };

        Ok(match kind {
            CommandKind::UpdateSetting => {
                let width = width()?;

                Self::UpdateSetting {
                    offset,
                    width,
                    value: decode_field(&message.payload, width),
                }
            }
            CommandKind::ReadSetting => Self::ReadSetting {
                offset,
                width: width()?,
            },
            // The override value is always a full word, whatever length was sent
            CommandKind::OverrideOn => Self::OverrideOn {
                offset,
                value: decode_field(&message.payload, Width::Four),
            },
            CommandKind::OverrideOff => Self::OverrideOff {
                offset,
                value: decode_field(&message.payload, Width::Four),
            },
            CommandKind::ReadOverride => Self::ReadOverride {
                offset,
                width: width()?,
            },
            CommandKind::ReadMeasurement => Self::ReadMeasurement {
                offset,
                width: width()?,
            },
            CommandKind::SaveSettings => Self::SaveSettings,
            CommandKind::Hello => Self::Hello,
            CommandKind::Ack => return Err(CommandParseError::ResponseOnly(kind)),
        })
    }

    pub fn from_bytes(buffer: &[u8]) -> Result<(u8, Self), CommandParseError> {
        let message = Message::from_bytes(buffer)?;

        Ok((message.device_id, Self::from_message(&message)?))
    }

    /// Builds the request frame a calibration tool sends to `device_id`.
    pub fn as_message(&self, device_id: u8) -> Message {
        let message = Message::new(device_id, self.kind());

        match *self {
            Self::UpdateSetting {
                offset,
                width,
                value,
            } => message
                .with_variable(offset, width.into())
                .with_payload(encode_field(value, width)),
            Self::OverrideOn { offset, value } | Self::OverrideOff { offset, value } => message
                .with_variable(offset, Width::Four.into())
                .with_payload(encode_field(value, Width::Four)),
            Self::ReadSetting { offset, width }
            | Self::ReadOverride { offset, width }
            | Self::ReadMeasurement { offset, width } => {
                message.with_variable(offset, width.into())
            }
            Self::SaveSettings | Self::Hello => message.with_payload([0; PAYLOAD_LEN]),
        }
    }
}
