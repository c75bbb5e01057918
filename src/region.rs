use core::ops::Range;

use crate::codec::Field;

/// A fixed-size, byte-addressable block of calibration variables. All access
/// is bounds checked against `N`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region<const N: usize> {
    bytes: [u8; N],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionError {
    #[error("Access of ({len:?}) bytes at offset ({offset:?}) overruns a region of ({size:?}) bytes")]
    OutOfBounds { offset: u16, len: usize, size: usize },
}

impl<const N: usize> Default for Region<N> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<const N: usize> Region<N> {
    pub const fn new(bytes: [u8; N]) -> Self {
        Self { bytes }
    }

    pub const fn zeroed() -> Self {
        Self { bytes: [0; N] }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn copy_from(&mut self, bytes: &[u8; N]) {
        self.bytes.copy_from_slice(bytes);
    }

    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn range(offset: u16, len: usize) -> Result<Range<usize>, RegionError> {
        let start = offset as usize;

        match start.checked_add(len) {
            Some(end) if end <= N => Ok(start..end),
            _ => Err(RegionError::OutOfBounds {
                offset,
                len,
                size: N,
            }),
        }
    }

    pub fn read_bytes(&self, offset: u16, len: usize) -> Result<&[u8], RegionError> {
        Ok(&self.bytes[Self::range(offset, len)?])
    }

    /// Writes all of `data` at `offset`, or nothing if it does not fit.
    pub fn write_bytes(&mut self, offset: u16, data: &[u8]) -> Result<(), RegionError> {
        let range = Self::range(offset, data.len())?;
        self.bytes[range].copy_from_slice(data);

        Ok(())
    }

    pub fn read<F: Field>(&self, offset: u16) -> Result<F, RegionError> {
        let mut prefix = [0u8; 4];
        prefix[..F::WIDTH].copy_from_slice(self.read_bytes(offset, F::WIDTH)?);

        Ok(F::from_ne_prefix(&prefix))
    }

    pub fn write<F: Field>(&mut self, offset: u16, value: F) -> Result<(), RegionError> {
        self.write_bytes(offset, &value.to_ne_prefix()[..F::WIDTH])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_checks() {
        let mut region = Region::<4>::zeroed();

        assert_eq!(region.read_bytes(0, 4), Ok(&[0u8; 4][..]));
        assert_eq!(region.read_bytes(4, 0), Ok(&[][..]));

        assert_eq!(
            region.read_bytes(3, 2),
            Err(RegionError::OutOfBounds {
                offset: 3,
                len: 2,
                size: 4
            })
        );

        assert_eq!(
            region.write_bytes(u16::MAX, &[1]),
            Err(RegionError::OutOfBounds {
                offset: u16::MAX,
                len: 1,
                size: 4
            })
        );

        // A partial overrun writes nothing
        assert!(region.write_bytes(2, &[1, 2, 3]).is_err());
        assert_eq!(region.as_bytes(), &[0; 4]);
    }

    #[test]
    fn typed_access() {
        let mut region = Region::<8>::zeroed();

        region.write(1, 0x0102u16).unwrap();
        region.write(3, -1i32).unwrap();

        assert_eq!(region.read::<u16>(1), Ok(0x0102));
        assert_eq!(region.read::<i32>(3), Ok(-1));
        assert_eq!(region.read_bytes(1, 2), Ok(&0x0102u16.to_ne_bytes()[..]));
        assert!(region.read::<u32>(5).is_err());

        region.clear();
        assert_eq!(region, Region::new([0; 8]));
    }
}
