use embedded_can::Id;
use heapless::Vec;

use crate::{CommandKind, FRAME_LEN, PAYLOAD_LEN};

/// A classic CAN 2.0 frame as handed over by a transport.
///
/// The DLC can be up to 8 bytes, and the data if absent means that it is an
/// RTR frame.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    id: Id,
    dlc: usize,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    data: Option<Vec<u8, FRAME_LEN>>,
}

impl CanFrame {
    /// Creates a new CAN 2.0 data frame. `data` must have a length in the
    /// range 0..=8 or else `None` will be returned instead.
    pub fn new_data(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let data = Vec::from_slice(data).ok()?;

        Some(Self {
            id: id.into(),
            dlc: data.len(),
            data: Some(data),
        })
    }

    /// Creates a new CAN 2.0 remote frame. `dlc` must be in the range 0..=8 or
    /// else `None` will be returned instead.
    pub fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        if dlc > FRAME_LEN {
            return None;
        }

        Some(Self {
            id: id.into(),
            dlc,
            data: None,
        })
    }

    /// Gets the message ID of the frame
    pub fn id(&self) -> Id {
        self.id
    }

    /// Gets the DLC (Data Length Code) of the frame
    pub fn dlc(&self) -> usize {
        self.dlc
    }

    /// Gets the data associated with the frame. Will return `None` if it is an
    /// RTR frame.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn is_remote(&self) -> bool {
        self.data.is_none()
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        Self::new_data(id, data)
    }

    fn new_remote(id: impl Into<Id>, dlc: usize) -> Option<Self> {
        CanFrame::new_remote(id, dlc)
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        self.is_remote()
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        self.data.as_deref().unwrap_or(&[])
    }
}

/// Raw 32-bit value of an arbitration ID, used when logging.
pub(crate) fn raw_id(id: Id) -> u32 {
    match id {
        Id::Standard(standard_id) => standard_id.as_raw() as u32,
        Id::Extended(extended_id) => extended_id.as_raw(),
    }
}

/// The fixed 8-byte layout shared by every request and response:
///
/// ```text
/// [ (device_id << 4) | command, offset_lo, offset_hi, length, payload[0..4] ]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// 4-bit node address (high nibble of byte 0)
    pub device_id: u8,
    /// Command or response tag (low nibble of byte 0)
    pub command: CommandKind,
    /// Byte offset of the variable inside its region
    pub offset: u16,
    /// Raw length byte; only 1, 2 and 4 are meaningful
    pub length: u8,
    pub payload: [u8; PAYLOAD_LEN],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameParseError {
    #[error("Received a frame with ({0:?}) data bytes (should be 8)")]
    InvalidFrameLength(usize),
    #[error("Received a remote frame where a data frame was expected")]
    RemoteFrame,
    #[error("Received a frame with an unrecognized command tag ({0:?})")]
    UnrecognizedCommand(u8),
}

impl Message {
    pub fn new(device_id: u8, command: CommandKind) -> Self {
        Self {
            device_id: device_id & 0x0F,
            command,
            offset: 0,
            length: 0,
            payload: [0; PAYLOAD_LEN],
        }
    }

    pub fn with_variable(mut self, offset: u16, length: u8) -> Self {
        self.offset = offset;
        self.length = length;
        self
    }

    pub fn with_payload(mut self, payload: [u8; PAYLOAD_LEN]) -> Self {
        self.payload = payload;
        self
    }

    pub fn from_bytes(buffer: &[u8]) -> Result<Self, FrameParseError> {
        let buffer: &[u8; FRAME_LEN] = buffer
            .try_into()
            .map_err(|_| FrameParseError::InvalidFrameLength(buffer.len()))?;

        let command: CommandKind = (buffer[0] & 0x0F).try_into()?;

        Ok(Self {
            device_id: buffer[0] >> 4,
            command,
            offset: u16::from_le_bytes([buffer[1], buffer[2]]),
            length: buffer[3],
            payload: [buffer[4], buffer[5], buffer[6], buffer[7]],
        })
    }

    pub fn from_frame(frame: &CanFrame) -> Result<Self, FrameParseError> {
        match frame.data() {
            Some(data) => Self::from_bytes(data),
            None => Err(FrameParseError::RemoteFrame),
        }
    }

    pub fn as_bytes(&self) -> [u8; FRAME_LEN] {
        let offset = self.offset.to_le_bytes();
        let command: u8 = self.command.into();

        [
            ((self.device_id & 0x0F) << 4) | command,
            offset[0],
            offset[1],
            self.length,
            self.payload[0],
            self.payload[1],
            self.payload[2],
            self.payload[3],
        ]
    }
}
