#![no_std]

#[macro_use]
mod fmt;

pub mod codec;

mod calibration;
mod command;
mod config;
mod dispatch;
mod frame;
mod node;
mod overrides;
mod persist;
mod region;
mod response;
mod transport;

#[cfg(test)]
mod testing;

/// Every request and response is exactly one classic CAN frame of this size.
pub const FRAME_LEN: usize = 8;
pub const PAYLOAD_LEN: usize = 4;

/// Reported in the hello reply.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default arbitration ID of requests from the calibration tool.
pub const COMMAND_ID: StandardId = config::standard_id(0x100);
/// Default arbitration ID of node replies.
pub const RESPONSE_ID: StandardId = config::standard_id(0x101);

pub use calibration::*;
pub use command::*;
pub use config::NodeConfig;
pub use dispatch::{dispatch, Ignored, MalformedCommand, Outcome};
pub use frame::{CanFrame, FrameParseError, Message};
pub use node::*;
pub use overrides::*;
pub use persist::*;
pub use region::*;
pub use response::*;
pub use transport::*;

pub use embedded_can::{ExtendedId, Id, StandardId};
