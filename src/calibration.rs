use crate::{
    codec::{native_field_bytes, Width},
    Override, OverrideStatus, Region, RegionError, OVERRIDE_RECORD_LEN,
};

/// Settings offset of the node's device ID byte.
pub const DEVICE_ID_OFFSET: u16 = 0;
/// Settings offset of the schema revision tag.
pub const REVISION_OFFSET: u16 = 1;
/// Every settings layout starts with the device ID and the revision.
pub const SETTINGS_HEADER_LEN: usize = 2;

/// The calibration image of one node: `M` bytes of measurements, `S` bytes of
/// settings and `O` bytes of override records.
///
/// The layout of each region is generated per project; this type only knows
/// the sizes and the two-byte settings header. `defaults` is the compiled-in
/// settings image and its revision byte is the revision the firmware expects
/// to find in non-volatile memory.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration<const M: usize, const S: usize, const O: usize> {
    pub(crate) measurements: Region<M>,
    pub(crate) settings: Region<S>,
    pub(crate) overrides: Region<O>,
    defaults: [u8; S],
}

impl<const M: usize, const S: usize, const O: usize> Calibration<M, S, O> {
    const LAYOUT_CHECK: () = assert!(
        S >= SETTINGS_HEADER_LEN,
        "settings must hold the device ID and revision header"
    );

    /// Creates the boot-time image: settings at their defaults, measurements
    /// zeroed and every override passing through.
    pub fn new(defaults: [u8; S]) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::LAYOUT_CHECK;

        Self {
            measurements: Region::zeroed(),
            settings: Region::new(defaults),
            overrides: Region::zeroed(),
            defaults,
        }
    }

    pub fn defaults(&self) -> &[u8; S] {
        &self.defaults
    }

    pub fn load_defaults(&mut self) {
        self.settings.copy_from(&self.defaults);
    }

    pub fn measurements(&self) -> &Region<M> {
        &self.measurements
    }

    /// Measurement producers publish through here; the bus can only read.
    pub fn measurements_mut(&mut self) -> &mut Region<M> {
        &mut self.measurements
    }

    pub fn settings(&self) -> &Region<S> {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Region<S> {
        &mut self.settings
    }

    pub fn overrides(&self) -> &Region<O> {
        &self.overrides
    }

    /// The whole device ID byte. Only values up to 0x0F can match a frame's
    /// 4-bit address, so a wider value leaves the node answering Hello only.
    pub fn device_id(&self) -> u8 {
        self.settings.as_bytes()[DEVICE_ID_OFFSET as usize]
    }

    pub fn revision(&self) -> u8 {
        self.settings.as_bytes()[REVISION_OFFSET as usize]
    }

    pub fn compiled_revision(&self) -> u8 {
        self.defaults[REVISION_OFFSET as usize]
    }

    pub fn override_at(&self, offset: u16) -> Result<Override, RegionError> {
        let mut record = [0u8; OVERRIDE_RECORD_LEN];
        record.copy_from_slice(self.overrides.read_bytes(offset, OVERRIDE_RECORD_LEN)?);

        Ok(Override::from_bytes(&record))
    }

    /// Writes the status and the value of the record at `offset` together, or
    /// neither when the record does not fit.
    pub fn set_override(
        &mut self,
        offset: u16,
        status: OverrideStatus,
        value: u32,
    ) -> Result<(), RegionError> {
        let record = Override {
            status,
            value: native_field_bytes(value, Width::Four),
        };

        self.overrides.write_bytes(offset, &record.as_bytes())
    }

    pub fn reset_overrides(&mut self) {
        self.overrides.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestCalibration = Calibration<4, 6, 10>;

    #[test]
    fn boot_image() {
        let calibration = TestCalibration::new([0x13, 7, 0, 0, 0, 0]);

        // Kept whole; no frame can address 0x13
        assert_eq!(calibration.device_id(), 0x13);
        assert_eq!(calibration.revision(), 7);
        assert_eq!(calibration.compiled_revision(), 7);
        assert_eq!(calibration.override_at(5), Ok(Override::PASSTHROUGH));
        assert_eq!(calibration.measurements().as_bytes(), &[0; 4]);
    }

    #[test]
    fn defaults_reload() {
        let mut calibration = TestCalibration::new([1, 7, 0, 0, 0, 0]);

        calibration.settings_mut().write(2, 0xAABBu16).unwrap();
        calibration.load_defaults();

        assert_eq!(calibration.settings().as_bytes(), calibration.defaults());
        assert_eq!(calibration.defaults(), &[1, 7, 0, 0, 0, 0]);
    }

    #[test]
    fn override_records() {
        let mut calibration = TestCalibration::new([1, 7, 0, 0, 0, 0]);

        calibration
            .set_override(5, OverrideStatus::Overridden, 0x0000_0102)
            .unwrap();

        let record = calibration.override_at(5).unwrap();
        assert!(record.is_overridden());
        assert_eq!(record.value::<u32>(), 0x0102);
        assert_eq!(record.value, 0x0102u32.to_ne_bytes());

        // The record at 6 would run past the end of the region
        assert_eq!(
            calibration.set_override(6, OverrideStatus::Overridden, 1),
            Err(RegionError::OutOfBounds {
                offset: 6,
                len: 5,
                size: 10
            })
        );

        calibration.reset_overrides();
        assert_eq!(calibration.override_at(5), Ok(Override::PASSTHROUGH));
    }
}
