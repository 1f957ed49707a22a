// Licensed under the Apache-2.0 license

//! Typed binding of logical update regions to flash. The engine addresses
//! storage exclusively through `(region, offset)` pairs; raw device
//! addresses never leave this module.

use crate::error::FwupError;
use pldm_protocol::firmware_update::MAX_COMPONENT_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    OutOfRange,
    Io,
}

/// The flash driver boundary: flat reads and writes on a device selected by
/// an opaque handle. Implementations dispatch to the physical device.
pub trait FlashDriver {
    fn read(&mut self, device: u8, address: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    fn write(&mut self, device: u8, address: u32, data: &[u8]) -> Result<(), FlashError>;
}

/// Logical regions of an update flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashRegionId {
    /// Staging area for package data pulled from the update agent.
    PackageData,
    /// The firmware update package held by the update agent.
    UpdatePackage,
    /// This device's metadata, served to the update agent.
    DeviceMetaData,
    /// Staging area for one component image, by classification index.
    ComponentImage(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashRegion {
    pub device: u8,
    pub base: u32,
    pub size: u32,
}

/// Immutable region table, fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlashRegionMap {
    package_data: Option<FlashRegion>,
    update_package: Option<FlashRegion>,
    device_meta_data: Option<FlashRegion>,
    component_images: [Option<FlashRegion>; MAX_COMPONENT_COUNT],
}

impl FlashRegionMap {
    pub fn new() -> Self {
        FlashRegionMap::default()
    }

    pub fn with_region(mut self, id: FlashRegionId, region: FlashRegion) -> Self {
        match id {
            FlashRegionId::PackageData => self.package_data = Some(region),
            FlashRegionId::UpdatePackage => self.update_package = Some(region),
            FlashRegionId::DeviceMetaData => self.device_meta_data = Some(region),
            FlashRegionId::ComponentImage(index) => {
                if (index as usize) < MAX_COMPONENT_COUNT {
                    self.component_images[index as usize] = Some(region);
                }
            }
        }
        self
    }

    pub fn region(&self, id: FlashRegionId) -> Result<FlashRegion, FwupError> {
        let region = match id {
            FlashRegionId::PackageData => self.package_data,
            FlashRegionId::UpdatePackage => self.update_package,
            FlashRegionId::DeviceMetaData => self.device_meta_data,
            FlashRegionId::ComponentImage(index) => self
                .component_images
                .get(index as usize)
                .copied()
                .flatten(),
        };
        region.ok_or(FwupError::RegionNotMapped)
    }

    pub fn size(&self, id: FlashRegionId) -> u32 {
        self.region(id).map(|r| r.size).unwrap_or(0)
    }

    pub fn read(
        &self,
        flash: &mut dyn FlashDriver,
        id: FlashRegionId,
        offset: u32,
        buf: &mut [u8],
    ) -> Result<(), FwupError> {
        let region = self.region(id)?;
        Self::check_bounds(&region, offset, buf.len())?;
        flash
            .read(region.device, region.base + offset, buf)
            .map_err(flash_error)
    }

    pub fn write(
        &self,
        flash: &mut dyn FlashDriver,
        id: FlashRegionId,
        offset: u32,
        data: &[u8],
    ) -> Result<(), FwupError> {
        let region = self.region(id)?;
        Self::check_bounds(&region, offset, data.len())?;
        flash
            .write(region.device, region.base + offset, data)
            .map_err(flash_error)
    }

    fn check_bounds(region: &FlashRegion, offset: u32, len: usize) -> Result<(), FwupError> {
        let end = offset
            .checked_add(len as u32)
            .ok_or(FwupError::FlashOutOfRange)?;
        if end > region.size {
            return Err(FwupError::FlashOutOfRange);
        }
        Ok(())
    }
}

fn flash_error(err: FlashError) -> FwupError {
    match err {
        FlashError::OutOfRange => FwupError::FlashOutOfRange,
        FlashError::Io => FwupError::FlashIoError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RamFlash {
        bank: [u8; 256],
    }

    impl FlashDriver for RamFlash {
        fn read(&mut self, _device: u8, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
            let start = address as usize;
            buf.copy_from_slice(
                self.bank
                    .get(start..start + buf.len())
                    .ok_or(FlashError::OutOfRange)?,
            );
            Ok(())
        }

        fn write(&mut self, _device: u8, address: u32, data: &[u8]) -> Result<(), FlashError> {
            let start = address as usize;
            self.bank
                .get_mut(start..start + data.len())
                .ok_or(FlashError::OutOfRange)?
                .copy_from_slice(data);
            Ok(())
        }
    }

    fn test_map() -> FlashRegionMap {
        FlashRegionMap::new().with_region(
            FlashRegionId::PackageData,
            FlashRegion {
                device: 0,
                base: 64,
                size: 128,
            },
        )
    }

    #[test]
    fn test_region_read_write() {
        let map = test_map();
        let mut flash = RamFlash { bank: [0u8; 256] };

        map.write(&mut flash, FlashRegionId::PackageData, 4, &[0xAA; 8])
            .unwrap();
        let mut buf = [0u8; 8];
        map.read(&mut flash, FlashRegionId::PackageData, 4, &mut buf)
            .unwrap();
        assert_eq!(buf, [0xAA; 8]);
        // Writes land at base + offset on the device.
        assert_eq!(flash.bank[68], 0xAA);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let map = test_map();
        let mut flash = RamFlash { bank: [0u8; 256] };

        assert_eq!(
            map.write(&mut flash, FlashRegionId::PackageData, 124, &[0u8; 8]),
            Err(FwupError::FlashOutOfRange)
        );
        let mut buf = [0u8; 4];
        assert_eq!(
            map.read(&mut flash, FlashRegionId::PackageData, u32::MAX, &mut buf),
            Err(FwupError::FlashOutOfRange)
        );
    }

    #[test]
    fn test_unmapped_region() {
        let map = test_map();
        let mut flash = RamFlash { bank: [0u8; 256] };
        let mut buf = [0u8; 4];
        assert_eq!(
            map.read(&mut flash, FlashRegionId::UpdatePackage, 0, &mut buf),
            Err(FwupError::RegionNotMapped)
        );
    }
}
