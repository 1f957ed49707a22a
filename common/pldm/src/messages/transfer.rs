// Licensed under the Apache-2.0 license

//! Data transfer commands: RequestFirmwareData plus the GetPackageData /
//! GetDeviceMetaData multipart pair. The multipart commands share one wire
//! shape; only the command code in the header differs.

use crate::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmTypeCode, TransferOperationFlag, TransferRespFlag,
    PLDM_MSG_HEADER_LEN,
};
use crate::codec::{CodecError, PldmCodec};
use crate::firmware_update::FwUpdateCmd;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Largest data portion any single transfer response may carry. Bounds the
/// fixed backing arrays below; the negotiated transfer size may be smaller.
pub const MAX_TRANSFER_SIZE: usize = 512;

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct RequestFirmwareDataRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub offset: u32,
    pub length: u32,
}

impl RequestFirmwareDataRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType, offset: u32, length: u32) -> Self {
        RequestFirmwareDataRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::RequestFirmwareData as u8,
            ),
            offset,
            length,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct RequestFirmwareDataResponseFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

/// Image portion response. `decode` derives the data length from the input
/// slice, so callers must hand it the exact message, not a larger buffer.
#[derive(Clone, PartialEq)]
#[repr(C)]
pub struct RequestFirmwareDataResponse {
    pub fixed: RequestFirmwareDataResponseFixed,
    pub data_len: u16,
    pub data: [u8; MAX_TRANSFER_SIZE],
}

impl RequestFirmwareDataResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8, data: &[u8]) -> Result<Self, CodecError> {
        if data.len() > MAX_TRANSFER_SIZE {
            return Err(CodecError::InvalidLength);
        }
        let mut buf = [0u8; MAX_TRANSFER_SIZE];
        buf[..data.len()].copy_from_slice(data);
        Ok(RequestFirmwareDataResponse {
            fixed: RequestFirmwareDataResponseFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    PldmMsgType::Response,
                    PldmTypeCode::FwUpdate,
                    FwUpdateCmd::RequestFirmwareData as u8,
                ),
                completion_code,
            },
            data_len: data.len() as u16,
            data: buf,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_len as usize]
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<RequestFirmwareDataResponseFixed>() + self.data_len as usize
    }
}

impl core::fmt::Debug for RequestFirmwareDataResponse {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestFirmwareDataResponse")
            .field("fixed", &self.fixed)
            .field("data_len", &self.data_len)
            .finish()
    }
}

impl PldmCodec for RequestFirmwareDataResponse {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.fixed
            .write_to(
                &mut buffer
                    [offset..offset + core::mem::size_of::<RequestFirmwareDataResponseFixed>()],
            )
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<RequestFirmwareDataResponseFixed>();

        buffer[offset..offset + self.data_len as usize].copy_from_slice(self.data());
        Ok(offset + self.data_len as usize)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let fixed_len = core::mem::size_of::<RequestFirmwareDataResponseFixed>();
        let fixed = RequestFirmwareDataResponseFixed::read_from_bytes(
            buffer.get(..fixed_len).ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;

        let data_len = buffer.len() - fixed_len;
        if data_len > MAX_TRANSFER_SIZE {
            return Err(CodecError::InvalidLength);
        }
        let mut data = [0u8; MAX_TRANSFER_SIZE];
        data[..data_len].copy_from_slice(&buffer[fixed_len..]);

        Ok(RequestFirmwareDataResponse {
            fixed,
            data_len: data_len as u16,
            data,
        })
    }
}

/// GetPackageData / GetDeviceMetaData request: an opaque 32-bit transfer
/// handle plus the operation flag.
#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct MultipartTransferRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub data_transfer_handle: u32,
    pub transfer_operation_flag: u8,
}

impl MultipartTransferRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        cmd: FwUpdateCmd,
        data_transfer_handle: u32,
        transfer_operation_flag: TransferOperationFlag,
    ) -> Self {
        MultipartTransferRequest {
            hdr: PldmMsgHeader::new(instance_id, msg_type, PldmTypeCode::FwUpdate, cmd as u8),
            data_transfer_handle,
            transfer_operation_flag: transfer_operation_flag as u8,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct MultipartTransferResponseFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub next_data_transfer_handle: u32,
    pub transfer_flag: u8,
}

/// GetPackageData / GetDeviceMetaData response. Like the firmware data
/// response, `decode` needs the exact message slice.
#[derive(Clone, PartialEq)]
#[repr(C)]
pub struct MultipartTransferResponse {
    pub fixed: MultipartTransferResponseFixed,
    pub portion_len: u16,
    pub portion: [u8; MAX_TRANSFER_SIZE],
}

impl MultipartTransferResponse {
    pub fn new(
        instance_id: InstanceId,
        cmd: FwUpdateCmd,
        completion_code: u8,
        next_data_transfer_handle: u32,
        transfer_flag: TransferRespFlag,
        portion: &[u8],
    ) -> Result<Self, CodecError> {
        if portion.len() > MAX_TRANSFER_SIZE {
            return Err(CodecError::InvalidLength);
        }
        let mut buf = [0u8; MAX_TRANSFER_SIZE];
        buf[..portion.len()].copy_from_slice(portion);
        Ok(MultipartTransferResponse {
            fixed: MultipartTransferResponseFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    PldmMsgType::Response,
                    PldmTypeCode::FwUpdate,
                    cmd as u8,
                ),
                completion_code,
                next_data_transfer_handle,
                transfer_flag: transfer_flag as u8,
            },
            portion_len: portion.len() as u16,
            portion: buf,
        })
    }

    pub fn portion(&self) -> &[u8] {
        &self.portion[..self.portion_len as usize]
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<MultipartTransferResponseFixed>() + self.portion_len as usize
    }
}

impl core::fmt::Debug for MultipartTransferResponse {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MultipartTransferResponse")
            .field("fixed", &self.fixed)
            .field("portion_len", &self.portion_len)
            .finish()
    }
}

impl PldmCodec for MultipartTransferResponse {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.fixed
            .write_to(
                &mut buffer[offset..offset + core::mem::size_of::<MultipartTransferResponseFixed>()],
            )
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<MultipartTransferResponseFixed>();

        buffer[offset..offset + self.portion_len as usize].copy_from_slice(self.portion());
        Ok(offset + self.portion_len as usize)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let fixed_len = core::mem::size_of::<MultipartTransferResponseFixed>();
        let fixed = MultipartTransferResponseFixed::read_from_bytes(
            buffer.get(..fixed_len).ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;

        let portion_len = buffer.len() - fixed_len;
        if portion_len > MAX_TRANSFER_SIZE {
            return Err(CodecError::InvalidLength);
        }
        let mut portion = [0u8; MAX_TRANSFER_SIZE];
        portion[..portion_len].copy_from_slice(&buffer[fixed_len..]);

        Ok(MultipartTransferResponse {
            fixed,
            portion_len: portion_len as u16,
            portion,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_firmware_data_round_trip() {
        let req = RequestFirmwareDataRequest::new(1, PldmMsgType::Request, 0x40, 32);
        let mut buffer = [0u8; 64];
        let size = req.encode(&mut buffer).unwrap();
        assert_eq!(req, RequestFirmwareDataRequest::decode(&buffer[..size]).unwrap());
    }

    #[test]
    fn test_request_firmware_data_response_round_trip() {
        let data: [u8; 32] = core::array::from_fn(|i| i as u8);
        let resp = RequestFirmwareDataResponse::new(1, 0, &data).unwrap();
        let mut buffer = [0u8; 1024];
        let size = resp.encode(&mut buffer).unwrap();
        assert_eq!(size, resp.wire_len());

        let decoded = RequestFirmwareDataResponse::decode(&buffer[..size]).unwrap();
        assert_eq!(decoded.data(), &data);
    }

    #[test]
    fn test_multipart_request_round_trip() {
        let req = MultipartTransferRequest::new(
            0,
            PldmMsgType::Request,
            FwUpdateCmd::GetPackageData,
            0,
            TransferOperationFlag::GetFirstPart,
        );
        let mut buffer = [0u8; 64];
        let size = req.encode(&mut buffer).unwrap();
        let decoded = MultipartTransferRequest::decode(&buffer[..size]).unwrap();
        assert_eq!(req, decoded);
        assert_eq!(decoded.hdr.cmd_code(), FwUpdateCmd::GetPackageData as u8);
    }

    #[test]
    fn test_multipart_response_round_trip() {
        let portion = [0x5Au8; 32];
        let resp = MultipartTransferResponse::new(
            2,
            FwUpdateCmd::GetDeviceMetaData,
            0,
            32,
            TransferRespFlag::Start,
            &portion,
        )
        .unwrap();

        let mut buffer = [0u8; 1024];
        let size = resp.encode(&mut buffer).unwrap();
        let decoded = MultipartTransferResponse::decode(&buffer[..size]).unwrap();
        assert_eq!(decoded.portion(), &portion);
        assert_eq!(decoded.fixed.transfer_flag, TransferRespFlag::Start as u8);
    }

    #[test]
    fn test_multipart_response_truncated() {
        let fixed_len = core::mem::size_of::<MultipartTransferResponseFixed>();
        let buffer = [0u8; 4];
        assert!(buffer.len() < fixed_len);
        assert_eq!(
            MultipartTransferResponse::decode(&buffer),
            Err(CodecError::MsgTooShort)
        );
    }
}
