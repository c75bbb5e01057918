use crate::{
    codec::native_field_bytes, Calibration, Command, CommandKind, CommandParseError,
    FrameParseError, HelloInfo, Message, NodeConfig, NvmStore, OverrideStatus, Readout,
    RegionError, Response, SettingsStore, PROTOCOL_VERSION,
};

/// What became of one received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// The frame was acted on and this reply goes back on the bus
    Reply(Response),
    /// The frame was dropped without a reply or any state change
    Ignored(Ignored),
}

/// Why a frame was dropped. None of these are reported on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ignored {
    /// Arrived on an arbitration ID other than the command ID
    ForeignId,
    /// Addressed to another node sharing the bus
    NotAddressed { device_id: u8 },
    Malformed(MalformedCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MalformedCommand {
    #[error("Failed to parse frame content")]
    InvalidFrame(#[from] FrameParseError),
    #[error("Failed to interpret request")]
    InvalidCommand(#[from] CommandParseError),
    #[error("Request addresses bytes outside its region")]
    OutOfBounds(#[from] RegionError),
}

impl From<MalformedCommand> for Outcome {
    fn from(malformed: MalformedCommand) -> Self {
        Self::Ignored(Ignored::Malformed(malformed))
    }
}

pub(crate) fn hello_info<const M: usize, const S: usize, const O: usize>(
    config: &NodeConfig,
    calibration: &Calibration<M, S, O>,
) -> HelloInfo {
    HelloInfo {
        firmware_version: config.firmware_version,
        product_id: config.product_id,
        schema_revision: calibration.compiled_revision(),
        protocol_version: PROTOCOL_VERSION,
    }
}

/// Runs one request against the calibration image.
///
/// Hello is answered whatever device ID it carries. Anything else addressed to
/// another device is dropped before it is even interpreted.
pub fn dispatch<N: NvmStore, const M: usize, const S: usize, const O: usize>(
    calibration: &mut Calibration<M, S, O>,
    store: &mut SettingsStore<N>,
    config: &NodeConfig,
    message: &Message,
) -> Outcome {
    trace!(
        "dispatch: device {=u8} command {} offset {=u16} length {=u8}",
        message.device_id,
        message.command,
        message.offset,
        message.length
    );

    if message.command != CommandKind::Hello && message.device_id != calibration.device_id() {
        return Outcome::Ignored(Ignored::NotAddressed {
            device_id: message.device_id,
        });
    }

    let result = Command::from_message(message)
        .map_err(MalformedCommand::from)
        .and_then(|command| execute(calibration, store, config, command));

    match result {
        Ok(response) => Outcome::Reply(response),
        Err(malformed) => {
            debug!("dispatch: dropping malformed request: {}", malformed);
            malformed.into()
        }
    }
}

fn execute<N: NvmStore, const M: usize, const S: usize, const O: usize>(
    calibration: &mut Calibration<M, S, O>,
    store: &mut SettingsStore<N>,
    config: &NodeConfig,
    command: Command,
) -> Result<Response, MalformedCommand> {
    Ok(match command {
        Command::UpdateSetting {
            offset,
            width,
            value,
        } => {
            let bytes = native_field_bytes(value, width);
            calibration
                .settings
                .write_bytes(offset, &bytes[..width.num_bytes()])?;

            Response::Ack
        }
        Command::ReadSetting { offset, width } => {
            let bytes = calibration.settings.read_bytes(offset, width.num_bytes())?;

            Response::Setting(Readout::new(offset, width, bytes))
        }
        Command::OverrideOn { offset, value } => {
            calibration.set_override(offset, OverrideStatus::Overridden, value)?;

            Response::Ack
        }
        Command::OverrideOff { offset, value } => {
            calibration.set_override(offset, OverrideStatus::Passthrough, value)?;

            Response::Ack
        }
        Command::ReadOverride { offset, width } => {
            let record = calibration.override_at(offset)?;

            Response::Override(record.status, Readout::new(offset, width, &record.value))
        }
        Command::ReadMeasurement { offset, width } => {
            let bytes = calibration.measurements.read_bytes(offset, width.num_bytes())?;

            Response::Measurement(Readout::new(offset, width, bytes))
        }
        Command::SaveSettings => {
            store.save(&calibration.settings);

            Response::Ack
        }
        Command::Hello => Response::Hello(hello_info(config, calibration)),
    })
}
