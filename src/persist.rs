//! CRC-guarded storage of the settings region.
//!
//! Non-volatile layout:
//!
//! ```text
//! [ crc32 (little-endian, 4 bytes) ][ settings image, byte for byte ]
//! ```
//!
//! The CRC covers exactly the settings bytes. On boot a bad CRC leaves the
//! compiled defaults in place; a good CRC with a foreign schema revision
//! resets the settings to the defaults and writes them straight back so the
//! next boot is clean.

use crate::{Calibration, Region};

pub const CRC_OFFSET: u16 = 0;
pub const CRC_LEN: usize = 4;
pub const SETTINGS_OFFSET: u16 = CRC_OFFSET + CRC_LEN as u16;

/// Compile-time bound on the settings size a [`SettingsStore`] can address.
struct Layout<const S: usize>;

impl<const S: usize> Layout<S> {
    const FITS: () = assert!(
        SETTINGS_OFFSET as usize + S <= u16::MAX as usize + 1,
        "settings must fit the 16-bit NVM address space after the CRC"
    );
}

/// Byte-wide access to a node's non-volatile memory (EEPROM, emulated
/// EEPROM, flash-backed RAM...). Implementations wait for the device to be
/// ready inside each call.
pub trait NvmStore {
    fn read_byte(&mut self, addr: u16) -> u8;

    fn write_byte(&mut self, addr: u16, value: u8);

    /// Flushes buffered writes. Devices that write through can leave this
    /// empty.
    fn commit(&mut self);
}

impl<T: NvmStore + ?Sized> NvmStore for &mut T {
    fn read_byte(&mut self, addr: u16) -> u8 {
        (**self).read_byte(addr)
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        (**self).write_byte(addr, value)
    }

    fn commit(&mut self) {
        (**self).commit()
    }
}

const CRC_TABLE: [u32; 16] = [
    0x0000_0000, 0x1db7_1064, 0x3b6e_20c8, 0x26d9_30ac, 0x76dc_4190, 0x6b6b_51f4, 0x4db2_6158,
    0x5005_713c, 0xedb8_8320, 0xf00f_9344, 0xd6d6_a3e8, 0xcb61_b38c, 0x9b64_c2b0, 0x86d3_d2d4,
    0xa00a_e278, 0xbdbd_f21c,
];

/// Half-byte table CRC-32 over `bytes`.
///
/// Each byte is folded in low nibble first, then the running value is
/// inverted. This is not the textbook CRC-32 for inputs longer than one byte
/// and must stay bit-exact: stored images from existing nodes depend on it.
pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = !0u32;

    for &byte in bytes {
        crc = CRC_TABLE[((crc ^ byte as u32) & 0x0F) as usize] ^ (crc >> 4);
        crc = CRC_TABLE[((crc ^ (byte >> 4) as u32) & 0x0F) as usize] ^ (crc >> 4);
        crc = !crc;
    }

    crc
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IntegrityError {
    #[error("Stored settings CRC ({stored:#010x}) does not match their content ({computed:#010x})")]
    CrcMismatch { stored: u32, computed: u32 },
    #[error("Stored settings revision ({stored:?}) does not match the firmware ({expected:?})")]
    RevisionMismatch { stored: u8, expected: u8 },
}

/// Sticky record of the integrity failures seen since boot, for the
/// application to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IntegrityFlags {
    pub crc_mismatch: bool,
    pub revision_mismatch: bool,
}

impl IntegrityFlags {
    pub fn record(&mut self, error: &IntegrityError) {
        match error {
            IntegrityError::CrcMismatch { .. } => self.crc_mismatch = true,
            IntegrityError::RevisionMismatch { .. } => self.revision_mismatch = true,
        }
    }

    pub fn any(&self) -> bool {
        self.crc_mismatch || self.revision_mismatch
    }
}

/// Loads and saves a settings region through an [`NvmStore`].
#[derive(Debug)]
pub struct SettingsStore<N> {
    nvm: N,
}

impl<N: NvmStore> SettingsStore<N> {
    pub fn new(nvm: N) -> Self {
        Self { nvm }
    }

    pub fn nvm(&mut self) -> &mut N {
        &mut self.nvm
    }

    pub fn into_inner(self) -> N {
        self.nvm
    }

    fn read_crc(&mut self) -> u32 {
        let mut raw = [0u8; CRC_LEN];
        for (i, byte) in raw.iter_mut().enumerate() {
            *byte = self.nvm.read_byte(CRC_OFFSET + i as u16);
        }

        u32::from_le_bytes(raw)
    }

    /// Restores the settings of `calibration` from non-volatile memory.
    ///
    /// On [`IntegrityError::CrcMismatch`] the settings are left untouched. On
    /// [`IntegrityError::RevisionMismatch`] they are reset to the defaults,
    /// which are saved before returning.
    pub fn load<const M: usize, const S: usize, const O: usize>(
        &mut self,
        calibration: &mut Calibration<M, S, O>,
    ) -> Result<(), IntegrityError> {
        #[allow(clippy::let_unit_value)]
        let () = Layout::<S>::FITS;

        let stored = self.read_crc();

        let mut image = [0u8; S];
        for (i, byte) in image.iter_mut().enumerate() {
            *byte = self.nvm.read_byte(SETTINGS_OFFSET + i as u16);
        }

        let computed = crc32(&image);
        if stored != computed {
            warn!("persist: CRC mismatch, keeping defaults");
            return Err(IntegrityError::CrcMismatch { stored, computed });
        }

        calibration.settings.copy_from(&image);

        let stored = calibration.revision();
        let expected = calibration.compiled_revision();
        if stored != expected {
            warn!(
                "persist: revision {=u8} stored, {=u8} expected; restoring defaults",
                stored,
                expected
            );

            calibration.settings.clear();
            calibration.load_defaults();
            self.save(&calibration.settings);

            return Err(IntegrityError::RevisionMismatch { stored, expected });
        }

        debug!("persist: loaded {=usize} settings bytes", S);

        Ok(())
    }

    /// Writes `settings` and its CRC, then commits. Saving the same image
    /// twice leaves identical bytes behind.
    pub fn save<const S: usize>(&mut self, settings: &Region<S>) {
        #[allow(clippy::let_unit_value)]
        let () = Layout::<S>::FITS;

        let image = settings.as_bytes();

        for (i, byte) in image.iter().enumerate() {
            self.nvm.write_byte(SETTINGS_OFFSET + i as u16, *byte);
        }

        let crc = crc32(image);
        for (i, byte) in crc.to_le_bytes().into_iter().enumerate() {
            self.nvm.write_byte(CRC_OFFSET + i as u16, byte);
        }

        self.nvm.commit();

        info!("persist: saved {=usize} settings bytes", S);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RamNvm;

    type TestCalibration = Calibration<4, 6, 10>;

    const DEFAULTS: [u8; 6] = [1, 7, 0, 0, 0, 0];

    #[test]
    fn crc_reference_values() {
        assert_eq!(crc32(&[]), 0xFFFF_FFFF);
        // A single byte matches textbook CRC-32, longer inputs do not
        assert_eq!(crc32(&[0x00]), 0xD202_EF8D);
        assert_eq!(crc32(b"123456789"), 0x0984_94F3);
        assert_eq!(crc32(&DEFAULTS), 0xBCBD_5D88);
    }

    #[test]
    fn save_layout() {
        let mut store = SettingsStore::new(RamNvm::new());
        store.save(&Region::new(DEFAULTS));

        let nvm = store.into_inner();
        assert_eq!(&nvm.bytes[..4], &0xBCBD_5D88u32.to_le_bytes());
        assert_eq!(&nvm.bytes[4..10], &DEFAULTS);
        assert_eq!(nvm.commits, 1);
    }

    #[test]
    fn save_is_idempotent() {
        let mut store = SettingsStore::new(RamNvm::new());
        let settings = Region::new([1, 7, 9, 8, 7, 6]);

        store.save(&settings);
        let first = store.nvm().bytes;
        store.save(&settings);

        assert_eq!(store.nvm().bytes, first);
    }

    #[test]
    fn round_trip() {
        let mut store = SettingsStore::new(RamNvm::new());

        let mut saved = TestCalibration::new(DEFAULTS);
        saved.settings_mut().write_bytes(2, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        store.save(saved.settings());

        let mut loaded = TestCalibration::new(DEFAULTS);
        assert_eq!(store.load(&mut loaded), Ok(()));
        assert_eq!(loaded.settings(), saved.settings());
    }

    #[test]
    fn blank_memory_keeps_defaults() {
        let mut store = SettingsStore::new(RamNvm::new());
        let mut calibration = TestCalibration::new(DEFAULTS);

        assert_eq!(
            store.load(&mut calibration),
            Err(IntegrityError::CrcMismatch {
                stored: 0,
                computed: crc32(&[0; 6])
            })
        );
        assert_eq!(calibration.settings().as_bytes(), &DEFAULTS);
        assert_eq!(store.nvm().commits, 0);
    }

    #[test]
    fn any_bit_flip_is_detected() {
        let mut saved = TestCalibration::new(DEFAULTS);
        saved.settings_mut().write_bytes(2, &[0x11, 0x22, 0x33, 0x44]).unwrap();

        for byte in 0..6 {
            for bit in 0..8 {
                let mut store = SettingsStore::new(RamNvm::new());
                store.save(saved.settings());
                store.nvm().bytes[SETTINGS_OFFSET as usize + byte] ^= 1 << bit;

                let mut calibration = TestCalibration::new(DEFAULTS);
                assert!(matches!(
                    store.load(&mut calibration),
                    Err(IntegrityError::CrcMismatch { .. })
                ));
                assert_eq!(calibration.settings().as_bytes(), &DEFAULTS);
            }
        }
    }

    #[test]
    fn revision_mismatch_restores_and_saves_defaults() {
        let mut store = SettingsStore::new(RamNvm::new());

        // Valid CRC, revision 6 from an older firmware
        store.save(&Region::new([1, 6, 0xAA, 0xAA, 0xAA, 0xAA]));

        let mut calibration = TestCalibration::new(DEFAULTS);
        assert_eq!(
            store.load(&mut calibration),
            Err(IntegrityError::RevisionMismatch {
                stored: 6,
                expected: 7
            })
        );
        assert_eq!(calibration.settings().as_bytes(), &DEFAULTS);
        assert_eq!(&store.nvm().bytes[4..10], &DEFAULTS);
        assert_eq!(store.nvm().commits, 2);

        let mut rebooted = TestCalibration::new(DEFAULTS);
        assert_eq!(store.load(&mut rebooted), Ok(()));
    }

    /// Counts writes and remembers the highest address touched.
    #[derive(Default)]
    struct AddressSpan {
        writes: usize,
        highest: u16,
        crc_writes: usize,
    }

    impl NvmStore for AddressSpan {
        fn read_byte(&mut self, _addr: u16) -> u8 {
            0
        }

        fn write_byte(&mut self, addr: u16, _value: u8) {
            self.writes += 1;
            self.highest = self.highest.max(addr);
            if (addr as usize) < CRC_LEN {
                self.crc_writes += 1;
            }
        }

        fn commit(&mut self) {}
    }

    #[test]
    fn largest_settings_fill_the_address_space() {
        const LARGEST: usize = u16::MAX as usize + 1 - CRC_LEN;

        let mut store = SettingsStore::new(AddressSpan::default());
        store.save(&Region::<LARGEST>::zeroed());

        let span = store.into_inner();
        assert_eq!(span.writes, LARGEST + CRC_LEN);
        assert_eq!(span.highest, u16::MAX);
        // The last settings byte lands at the top, never back on the CRC
        assert_eq!(span.crc_writes, CRC_LEN);
    }

    #[test]
    fn flags_are_sticky() {
        let mut flags = IntegrityFlags::default();
        assert!(!flags.any());

        flags.record(&IntegrityError::CrcMismatch {
            stored: 0,
            computed: 1,
        });
        flags.record(&IntegrityError::RevisionMismatch {
            stored: 0,
            expected: 1,
        });

        assert_eq!(
            flags,
            IntegrityFlags {
                crc_mismatch: true,
                revision_mismatch: true
            }
        );
    }
}
