use embedded_can::{Id, StandardId};

use crate::{COMMAND_ID, RESPONSE_ID};

/// Identity and bus wiring of a node. The device ID itself is a setting and
/// lives in the calibration image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// Reported in the hello reply
    pub firmware_version: u8,
    /// Reported in the hello reply
    pub product_id: u8,
    /// Arbitration ID the calibration tool sends requests on
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub command_id: Id,
    /// Arbitration ID every reply is sent on
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub response_id: Id,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            firmware_version: 0,
            product_id: 0,
            command_id: Id::Standard(COMMAND_ID),
            response_id: Id::Standard(RESPONSE_ID),
        }
    }
}

impl NodeConfig {
    pub fn new(firmware_version: u8, product_id: u8) -> Self {
        Self {
            firmware_version,
            product_id,
            ..Default::default()
        }
    }

    /// Consumes self and returns a new self listening on `command_id`
    pub fn with_command_id(mut self, command_id: impl Into<Id>) -> Self {
        self.command_id = command_id.into();
        self
    }

    /// Consumes self and returns a new self replying on `response_id`
    pub fn with_response_id(mut self, response_id: impl Into<Id>) -> Self {
        self.response_id = response_id.into();
        self
    }
}

/// `StandardId::new` for constants; values past 0x7FF saturate.
pub(crate) const fn standard_id(raw: u16) -> StandardId {
    match StandardId::new(raw) {
        Some(id) => id,
        None => StandardId::MAX,
    }
}

#[cfg(test)]
mod tests {
    use embedded_can::{ExtendedId, Id, StandardId};

    use super::NodeConfig;

    #[test]
    fn defaults_and_builders() {
        let config = NodeConfig::default();
        assert_eq!(config.command_id, Id::Standard(StandardId::new(0x100).unwrap()));
        assert_eq!(config.response_id, Id::Standard(StandardId::new(0x101).unwrap()));

        let config = NodeConfig::new(3, 0x42)
            .with_command_id(ExtendedId::new(0x18DA_0100).unwrap())
            .with_response_id(StandardId::new(0x7E8).unwrap());

        assert_eq!(config.firmware_version, 3);
        assert_eq!(config.product_id, 0x42);
        assert_eq!(
            config.command_id,
            Id::Extended(ExtendedId::new(0x18DA_0100).unwrap())
        );
        assert_eq!(config.response_id, Id::Standard(StandardId::new(0x7E8).unwrap()));
    }
}
