use embedded_can::{Frame, Id};

use crate::{CanFrame, FRAME_LEN};

/// The CAN peripheral as seen by a node. One implementation exists per
/// deployment target; the protocol never touches mailboxes or filters.
pub trait CanTransport {
    type Error;

    /// Queues one frame for transmission. May wait for a free mailbox.
    fn send_frame(&mut self, id: Id, data: &[u8; FRAME_LEN]) -> Result<(), Self::Error>;

    /// Returns the next received frame, or `None` when nothing is pending.
    fn receive_frame(&mut self) -> Result<Option<CanFrame>, Self::Error>;
}

impl<T: CanTransport + ?Sized> CanTransport for &mut T {
    type Error = T::Error;

    fn send_frame(&mut self, id: Id, data: &[u8; FRAME_LEN]) -> Result<(), Self::Error> {
        (**self).send_frame(id, data)
    }

    fn receive_frame(&mut self) -> Result<Option<CanFrame>, Self::Error> {
        (**self).receive_frame()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError<E> {
    #[error("CAN driver reported an error ({0:?})")]
    Bus(E),
    #[error("Frame cannot be represented by the driver or as a classic CAN frame")]
    Unrepresentable,
}

/// Drives any non-blocking [`embedded_can`] driver as a [`CanTransport`].
///
/// Transmission spins while every mailbox is full. Reception never waits:
/// an empty FIFO reads as no frame.
#[derive(Debug)]
pub struct NbCan<C> {
    can: C,
}

impl<C> NbCan<C> {
    pub fn new(can: C) -> Self {
        Self { can }
    }

    pub fn inner(&mut self) -> &mut C {
        &mut self.can
    }

    pub fn into_inner(self) -> C {
        self.can
    }
}

impl<C: embedded_can::nb::Can> CanTransport for NbCan<C> {
    type Error = TransportError<C::Error>;

    fn send_frame(&mut self, id: Id, data: &[u8; FRAME_LEN]) -> Result<(), Self::Error> {
        let frame = C::Frame::new(id, data).ok_or(TransportError::Unrepresentable)?;

        // A lower priority frame pushed out of its mailbox is dropped
        let _displaced = nb::block!(self.can.transmit(&frame)).map_err(TransportError::Bus)?;

        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Option<CanFrame>, Self::Error> {
        let frame = match self.can.receive() {
            Ok(frame) => frame,
            Err(nb::Error::WouldBlock) => return Ok(None),
            Err(nb::Error::Other(e)) => return Err(TransportError::Bus(e)),
        };

        let converted = if frame.is_remote_frame() {
            CanFrame::new_remote(frame.id(), frame.dlc())
        } else {
            CanFrame::new_data(frame.id(), frame.data())
        };

        converted.map(Some).ok_or(TransportError::Unrepresentable)
    }
}
