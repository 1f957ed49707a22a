// Licensed under the Apache-2.0 license

//! Multipart transfer coordination for GetPackageData / GetDeviceMetaData
//! style flows. The puller keeps a [`MultipartTransfer`] cursor per logical
//! region; the server side is stateless and answers from the requested
//! handle. Transfer handles are byte offsets into the region and stay opaque
//! to the codec.

use crate::error::FwupError;
use crate::flash_map::{FlashDriver, FlashRegionId, FlashRegionMap};
use pldm_protocol::base::{TransferOperationFlag, TransferRespFlag};
use pldm_protocol::messages::transfer::MAX_TRANSFER_SIZE;

/// Pull-side cursor for one region. At most one transfer per region may be
/// in flight for a given peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MultipartTransfer {
    handle: u32,
    op_flag: TransferOperationFlag,
    active: bool,
}

impl Default for MultipartTransfer {
    fn default() -> Self {
        MultipartTransfer {
            handle: 0,
            op_flag: TransferOperationFlag::GetFirstPart,
            active: false,
        }
    }
}

impl MultipartTransfer {
    pub fn new() -> Self {
        MultipartTransfer::default()
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn op_flag(&self) -> TransferOperationFlag {
        self.op_flag
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Restarts the transfer from the first part. Any partially staged data
    /// is overwritten by the new pull.
    pub fn restart(&mut self) {
        self.handle = 0;
        self.op_flag = TransferOperationFlag::GetFirstPart;
        self.active = false;
    }

    /// Consumes one response portion: writes it into the region, adopts the
    /// next transfer handle and advances the operation flag. Returns `true`
    /// once the transfer is complete.
    pub fn absorb_portion(
        &mut self,
        map: &FlashRegionMap,
        flash: &mut dyn FlashDriver,
        region: FlashRegionId,
        transfer_flag: TransferRespFlag,
        next_handle: u32,
        portion: &[u8],
    ) -> Result<bool, FwupError> {
        match transfer_flag {
            TransferRespFlag::Start | TransferRespFlag::StartAndEnd => {
                map.write(flash, region, 0, portion)?;
            }
            TransferRespFlag::Middle | TransferRespFlag::End => {
                if !self.active {
                    return Err(FwupError::UnexpectedTransferHandle);
                }
                map.write(flash, region, self.handle, portion)?;
            }
        }

        self.handle = next_handle;
        match transfer_flag {
            TransferRespFlag::Start => {
                self.active = true;
                self.op_flag = TransferOperationFlag::GetNextPart;
                Ok(false)
            }
            TransferRespFlag::Middle => Ok(false),
            TransferRespFlag::End | TransferRespFlag::StartAndEnd => {
                self.active = false;
                self.op_flag = TransferOperationFlag::GetFirstPart;
                Ok(true)
            }
        }
    }
}

/// Serves one portion of a region for the responder side of a multipart
/// exchange. Returns the response flag, the next transfer handle and the
/// number of bytes placed in `chunk`.
pub fn serve_portion(
    map: &FlashRegionMap,
    flash: &mut dyn FlashDriver,
    region: FlashRegionId,
    handle: u32,
    op_flag: TransferOperationFlag,
    chunk: &mut [u8],
) -> Result<(TransferRespFlag, u32, usize), FwupError> {
    let size = map.region(region)?.size;

    let offset = match op_flag {
        TransferOperationFlag::GetFirstPart => 0,
        TransferOperationFlag::GetNextPart => handle,
    };
    if offset >= size {
        return Err(FwupError::UnexpectedTransferHandle);
    }

    let len = chunk.len().min((size - offset) as usize).min(MAX_TRANSFER_SIZE);
    map.read(flash, region, offset, &mut chunk[..len])?;

    let next_handle = offset + len as u32;
    let flag = match op_flag {
        TransferOperationFlag::GetFirstPart => {
            if next_handle >= size {
                TransferRespFlag::StartAndEnd
            } else {
                TransferRespFlag::Start
            }
        }
        TransferOperationFlag::GetNextPart => {
            if next_handle >= size {
                TransferRespFlag::End
            } else {
                TransferRespFlag::Middle
            }
        }
    };

    Ok((flag, next_handle, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash_map::{FlashError, FlashRegion};
    use pldm_protocol::firmware_update::PLDM_FWUP_BASELINE_TRANSFER_SIZE;

    struct RamFlash {
        bank: Vec<u8>,
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

    fn setup(src_len: usize) -> (FlashRegionMap, RamFlash) {
        let map = FlashRegionMap::new()
            .with_region(
                FlashRegionId::UpdatePackage,
                FlashRegion {
                    device: 0,
                    base: 0,
                    size: src_len as u32,
                },
            )
            .with_region(
                FlashRegionId::PackageData,
                FlashRegion {
                    device: 0,
                    base: 512,
                    size: src_len as u32,
                },
            );
        let mut bank = vec![0u8; 1024];
        for (i, byte) in bank.iter_mut().take(src_len).enumerate() {
            *byte = i as u8;
        }
        (map, RamFlash { bank })
    }

    // 80 bytes at the 32-byte baseline: START(32), MIDDLE(32), END(16), and
    // the reassembled region matches the source byte for byte.
    #[test]
    fn test_pull_80_bytes_in_baseline_chunks() {
        let (map, mut flash) = setup(80);
        let mut xfer = MultipartTransfer::new();
        let mut chunk = [0u8; PLDM_FWUP_BASELINE_TRANSFER_SIZE];

        let mut flags_seen = Vec::new();
        loop {
            let (flag, next, len) = serve_portion(
                &map,
                &mut flash,
                FlashRegionId::UpdatePackage,
                xfer.handle(),
                xfer.op_flag(),
                &mut chunk,
            )
            .unwrap();
            flags_seen.push(flag);

            let done = xfer
                .absorb_portion(
                    &map,
                    &mut flash,
                    FlashRegionId::PackageData,
                    flag,
                    next,
                    &chunk[..len],
                )
                .unwrap();
            if done {
                break;
            }
        }

        assert_eq!(
            flags_seen,
            vec![
                TransferRespFlag::Start,
                TransferRespFlag::Middle,
                TransferRespFlag::End
            ]
        );
        assert_eq!(xfer.handle(), 80);
        assert_eq!(xfer.op_flag(), TransferOperationFlag::GetFirstPart);
        assert_eq!(&flash.bank[512..592], &flash.bank[..80].to_vec()[..]);
    }

    #[test]
    fn test_single_chunk_transfer() {
        let (map, mut flash) = setup(16);
        let mut xfer = MultipartTransfer::new();
        let mut chunk = [0u8; PLDM_FWUP_BASELINE_TRANSFER_SIZE];

        let (flag, next, len) = serve_portion(
            &map,
            &mut flash,
            FlashRegionId::UpdatePackage,
            xfer.handle(),
            xfer.op_flag(),
            &mut chunk,
        )
        .unwrap();
        assert_eq!(flag, TransferRespFlag::StartAndEnd);
        assert_eq!(len, 16);

        let done = xfer
            .absorb_portion(
                &map,
                &mut flash,
                FlashRegionId::PackageData,
                flag,
                next,
                &chunk[..len],
            )
            .unwrap();
        assert!(done);
    }

    #[test]
    fn test_middle_without_start_rejected() {
        let (map, mut flash) = setup(80);
        let mut xfer = MultipartTransfer::new();
        assert_eq!(
            xfer.absorb_portion(
                &map,
                &mut flash,
                FlashRegionId::PackageData,
                TransferRespFlag::Middle,
                64,
                &[0u8; 32],
            ),
            Err(FwupError::UnexpectedTransferHandle)
        );
    }

    #[test]
    fn test_serve_past_end_rejected() {
        let (map, mut flash) = setup(80);
        let mut chunk = [0u8; PLDM_FWUP_BASELINE_TRANSFER_SIZE];
        assert_eq!(
            serve_portion(
                &map,
                &mut flash,
                FlashRegionId::UpdatePackage,
                96,
                TransferOperationFlag::GetNextPart,
                &mut chunk,
            ),
            Err(FwupError::UnexpectedTransferHandle)
        );
    }
}
