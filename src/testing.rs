//! In-memory doubles for the bus and the non-volatile memory.

use embedded_can::{ErrorKind, Id};
use heapless::{Deque, Vec};

use crate::{CanFrame, CanTransport, NvmStore, FRAME_LEN};

/// Byte-addressable memory that starts out zeroed. Reads past the end return
/// 0xFF like erased flash; writes past the end are lost.
pub struct RamNvm {
    pub bytes: [u8; 64],
    pub commits: usize,
}

impl RamNvm {
    pub fn new() -> Self {
        Self {
            bytes: [0; 64],
            commits: 0,
        }
    }
}

impl Default for RamNvm {
    fn default() -> Self {
        Self::new()
    }
}

impl NvmStore for RamNvm {
    fn read_byte(&mut self, addr: u16) -> u8 {
        self.bytes.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        if let Some(byte) = self.bytes.get_mut(addr as usize) {
            *byte = value;
        }
    }

    fn commit(&mut self) {
        self.commits += 1;
    }
}

/// Frames queued in `rx` are received in order; sent frames pile up in `tx`.
/// Setting `fault` fails the next send.
#[derive(Default)]
pub struct MockBus {
    pub rx: Deque<CanFrame, 8>,
    pub tx: Vec<(Id, [u8; FRAME_LEN]), 8>,
    pub fault: Option<ErrorKind>,
}

impl MockBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CanTransport for MockBus {
    type Error = ErrorKind;

    fn send_frame(&mut self, id: Id, data: &[u8; FRAME_LEN]) -> Result<(), ErrorKind> {
        if let Some(fault) = self.fault.take() {
            return Err(fault);
        }

        self.tx.push((id, *data)).map_err(|_| ErrorKind::Overrun)
    }

    fn receive_frame(&mut self) -> Result<Option<CanFrame>, ErrorKind> {
        Ok(self.rx.pop_front())
    }
}
