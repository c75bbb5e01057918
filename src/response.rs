use crate::{
    codec::{Field, Width, WidthError},
    CommandKind, FrameParseError, Message, OverrideStatus, PAYLOAD_LEN,
};

/// Value of the first payload byte of every acknowledgment. No failure value
/// is ever sent.
pub const ACK_SUCCESS: u8 = 1;

/// A frame sent by a node back to the calibration tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Discovery reply, sent whatever device ID the request carried
    Hello(HelloInfo),
    /// The request was applied
    Ack,
    /// Bytes read from the settings region
    Setting(Readout),
    /// Bytes read from the measurements region
    Measurement(Readout),
    /// Bytes read from an override value. The status travels in the tag:
    /// `OverrideOn` when overridden, `OverrideOff` when passing through.
    Override(OverrideStatus, Readout),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HelloInfo {
    pub firmware_version: u8,
    pub product_id: u8,
    pub schema_revision: u8,
    pub protocol_version: u8,
}

/// A copy of `width` bytes taken from a region, exactly as they sit in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Readout {
    pub offset: u16,
    pub width: Width,
    /// Region bytes, left aligned and zero filled
    pub bytes: [u8; PAYLOAD_LEN],
}

impl Readout {
    pub fn new(offset: u16, width: Width, region_bytes: &[u8]) -> Self {
        let mut bytes = [0u8; PAYLOAD_LEN];
        let len = region_bytes.len().min(width.num_bytes());
        bytes[..len].copy_from_slice(&region_bytes[..len]);

        Self {
            offset,
            width,
            bytes,
        }
    }

    /// Interprets the bytes as `F`, or `None` when `F` is not as wide as the
    /// readout.
    pub fn value<F: Field>(&self) -> Option<F> {
        (F::WIDTH == self.width.num_bytes()).then(|| F::from_ne_prefix(&self.bytes))
    }
}

/// Various errors which can arise while parsing a response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseParseError {
    #[error("Received a request-only tag ({0:?}) as a response")]
    RequestOnly(CommandKind),
    #[error("Received a response ({0:?}) with an unsupported length")]
    InvalidWidth(CommandKind, #[source] WidthError),

    /* Frame Parsing */
    #[error("Failed to parse frame content")]
    InvalidFrameContent(#[from] FrameParseError),
}

impl Response {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Hello(_) => CommandKind::Hello,
            Self::Ack => CommandKind::Ack,
            Self::Setting(_) => CommandKind::ReadSetting,
            Self::Measurement(_) => CommandKind::ReadMeasurement,
            Self::Override(OverrideStatus::Passthrough, _) => CommandKind::OverrideOff,
            Self::Override(OverrideStatus::Overridden, _) => CommandKind::OverrideOn,
        }
    }

    /// Lays the response out as a frame from node `device_id`.
    pub fn as_message(&self, device_id: u8) -> Message {
        let message = Message::new(device_id, self.kind());

        match self {
            Self::Hello(hello) => message.with_payload([
                hello.firmware_version,
                hello.product_id,
                hello.schema_revision,
                hello.protocol_version,
            ]),
            Self::Ack => message.with_payload([ACK_SUCCESS, 0, 0, 0]),
            Self::Setting(readout) | Self::Measurement(readout) | Self::Override(_, readout) => {
                message
                    .with_variable(readout.offset, readout.width.into())
                    .with_payload(readout.bytes)
            }
        }
    }

    pub fn from_message(message: &Message) -> Result<Self, ResponseParseError> {
        let kind = message.command;
        let readout = || -> Result<Readout, ResponseParseError> {
            let width = Width::try_from(message.length)
                .map_err(|e| ResponseParseError::InvalidWidth(kind, e))?;

            Ok(Readout::new(message.offset, width, &message.payload))
        };

        Ok(match kind {
            CommandKind::Hello => Self::Hello(HelloInfo {
                firmware_version: message.payload[0],
                product_id: message.payload[1],
                schema_revision: message.payload[2],
                protocol_version: message.payload[3],
            }),
            CommandKind::Ack => Self::Ack,
            CommandKind::ReadSetting => Self::Setting(readout()?),
            CommandKind::ReadMeasurement => Self::Measurement(readout()?),
            CommandKind::OverrideOn => Self::Override(OverrideStatus::Overridden, readout()?),
            CommandKind::OverrideOff => Self::Override(OverrideStatus::Passthrough, readout()?),
            CommandKind::UpdateSetting | CommandKind::ReadOverride | CommandKind::SaveSettings => {
                return Err(ResponseParseError::RequestOnly(kind))
            }
        })
    }

    pub fn from_bytes(buffer: &[u8]) -> Result<(u8, Self), ResponseParseError> {
        let message = Message::from_bytes(buffer)?;

        Ok((message.device_id, Self::from_message(&message)?))
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        codec::{Field, Width},
        CommandKind, HelloInfo, OverrideStatus, Readout, Response, ResponseParseError,
    };

    #[test]
    fn encode_responses() {
        let hello = Response::Hello(HelloInfo {
            firmware_version: 3,
            product_id: 0x42,
            schema_revision: 9,
            protocol_version: 1,
        });

        assert_eq!(
            hello.as_message(5).as_bytes(),
            [0x57, 0, 0, 0, 3, 0x42, 9, 1]
        );

        assert_eq!(Response::Ack.as_message(5).as_bytes(), [0x58, 0, 0, 0, 1, 0, 0, 0]);

        let readout = Readout::new(0x0203, Width::Two, &[0xAA, 0xBB]);
        assert_eq!(
            Response::Setting(readout).as_message(1).as_bytes(),
            [0x11, 0x03, 0x02, 0x02, 0xAA, 0xBB, 0, 0]
        );

        assert_eq!(
            Response::Override(OverrideStatus::Overridden, readout)
                .as_message(1)
                .as_bytes()[0],
            0x12
        );

        assert_eq!(
            Response::Override(OverrideStatus::Passthrough, readout)
                .as_message(1)
                .as_bytes()[0],
            0x13
        );
    }

    #[test]
    fn parse_responses() {
        assert_eq!(
            Response::from_bytes(&[0x35, 0x04, 0x00, 0x04, 1, 2, 3, 4]),
            Ok((
                3,
                Response::Measurement(Readout::new(4, Width::Four, &[1, 2, 3, 4]))
            ))
        );

        assert_eq!(
            Response::from_bytes(&[0x33, 0x00, 0x00, 0x01, 9, 0, 0, 0]),
            Ok((
                3,
                Response::Override(
                    OverrideStatus::Passthrough,
                    Readout::new(0, Width::One, &[9])
                )
            ))
        );

        assert_eq!(
            Response::from_bytes(&[0x36, 0, 0, 0, 0, 0, 0, 0]),
            Err(ResponseParseError::RequestOnly(CommandKind::SaveSettings))
        );
    }

    #[test]
    fn readout_values() {
        let readout = Readout::new(0, Width::Two, &0x0102u16.to_ne_prefix()[..2]);

        assert_eq!(readout.value::<u16>(), Some(0x0102));
        assert_eq!(readout.value::<u32>(), None);
        assert_eq!(readout.value::<u8>(), None);
    }
}
