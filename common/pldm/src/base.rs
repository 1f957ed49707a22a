// Licensed under the Apache-2.0 license

//! DSP0240 base message layer: the 3-byte PLDM header, message direction
//! tags, base completion codes, and the multipart transfer flag vocabulary
//! shared by every PLDM type.

use crate::error::ProtocolError;
use bitfield::bitfield;
use core::convert::TryFrom;
use zerocopy::{FromBytes, Immutable, IntoBytes};

pub const PLDM_MSG_HEADER_LEN: usize = 3;
pub const PLDM_FAILURE_RESP_LEN: usize = 4;

/// Request/response correlation tag. Five significant bits on the wire.
pub type InstanceId = u8;

/// Instance IDs wrap modulo this value.
pub const INSTANCE_ID_COUNT: u8 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PldmTypeCode {
    Base = 0x00,
    Platform = 0x02,
    Bios = 0x03,
    Fru = 0x04,
    FwUpdate = 0x05,
    Oem = 0x3F,
}

impl TryFrom<u8> for PldmTypeCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(PldmTypeCode::Base),
            0x02 => Ok(PldmTypeCode::Platform),
            0x03 => Ok(PldmTypeCode::Bios),
            0x04 => Ok(PldmTypeCode::Fru),
            0x05 => Ok(PldmTypeCode::FwUpdate),
            0x3F => Ok(PldmTypeCode::Oem),
            _ => Err(ProtocolError::InvalidPldmType),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PldmMsgType {
    Response = 0x00,
    Reserved = 0x01,
    Request = 0x02,
    AsyncRequestNotify = 0x03,
}

impl TryFrom<u8> for PldmMsgType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(PldmMsgType::Response),
            0x01 => Ok(PldmMsgType::Reserved),
            0x02 => Ok(PldmMsgType::Request),
            0x03 => Ok(PldmMsgType::AsyncRequestNotify),
            _ => Err(ProtocolError::InvalidMsgType),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PldmHeaderVersion {
    Version0 = 0x00,
}

/// Completion codes defined by the base specification; type-specific codes
/// live with their protocol (see `firmware_update`). Unknown codes are kept
/// as raw bytes by the codec and surfaced verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PldmCompletionCode {
    Success = 0x00,
    Error = 0x01,
    InvalidData = 0x02,
    InvalidLength = 0x03,
    NotReady = 0x04,
    UnsupportedPldmCmd = 0x05,
    InvalidPldmType = 0x20,
}

impl TryFrom<u8> for PldmCompletionCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(PldmCompletionCode::Success),
            0x01 => Ok(PldmCompletionCode::Error),
            0x02 => Ok(PldmCompletionCode::InvalidData),
            0x03 => Ok(PldmCompletionCode::InvalidLength),
            0x04 => Ok(PldmCompletionCode::NotReady),
            0x05 => Ok(PldmCompletionCode::UnsupportedPldmCmd),
            0x20 => Ok(PldmCompletionCode::InvalidPldmType),
            _ => Err(ProtocolError::InvalidCompletionCode),
        }
    }
}

/// Requester-side multipart flag: which part of a data object is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferOperationFlag {
    GetNextPart = 0,
    GetFirstPart = 1,
}

impl TryFrom<u8> for TransferOperationFlag {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(TransferOperationFlag::GetNextPart),
            1 => Ok(TransferOperationFlag::GetFirstPart),
            _ => Err(ProtocolError::InvalidTransferOperationFlag),
        }
    }
}

/// Responder-side multipart flag: where the carried portion sits in the
/// overall data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferRespFlag {
    Start = 0x01,
    Middle = 0x02,
    End = 0x04,
    StartAndEnd = 0x05,
}

impl TryFrom<u8> for TransferRespFlag {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(TransferRespFlag::Start),
            0x02 => Ok(TransferRespFlag::Middle),
            0x04 => Ok(TransferRespFlag::End),
            0x05 => Ok(TransferRespFlag::StartAndEnd),
            _ => Err(ProtocolError::InvalidTransferRespFlag),
        }
    }
}

bitfield! {
    /// The common PLDM message header. Byte 0 carries the request bit, the
    /// datagram bit and the 5-bit instance ID; byte 1 the header version and
    /// PLDM type; byte 2 the command code.
    #[repr(C)]
    #[derive(Copy, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
    pub struct PldmMsgHeader([u8]);
    impl Debug;
    pub u8, instance_id, set_instance_id: 4, 0;
    pub u8, reserved, _: 5, 5;
    pub u8, datagram, set_datagram: 6, 6;
    pub u8, request_bit, set_request_bit: 7, 7;
    pub u8, pldm_type, set_pldm_type: 13, 8;
    pub u8, hdr_ver, set_hdr_ver: 15, 14;
    pub u8, cmd_code, set_cmd_code: 23, 16;
}

impl PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]> {
    const DATAGRAM_MASK: u8 = 0x01;
    const REQUEST_MASK: u8 = 0x01 << 1;

    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        pldm_type: PldmTypeCode,
        cmd_code: u8,
    ) -> Self {
        let mut hdr = PldmMsgHeader([0u8; PLDM_MSG_HEADER_LEN]);
        hdr.set_instance_id(instance_id);
        hdr.set_datagram(msg_type as u8 & Self::DATAGRAM_MASK);
        hdr.set_request_bit((msg_type as u8 & Self::REQUEST_MASK) >> 1);
        hdr.set_pldm_type(pldm_type as u8);
        hdr.set_hdr_ver(PldmHeaderVersion::Version0 as u8);
        hdr.set_cmd_code(cmd_code);
        hdr
    }

    pub fn is_request(&self) -> bool {
        self.request_bit() == (PldmMsgType::Request as u8 >> 1)
    }

    pub fn is_hdr_ver_valid(&self) -> bool {
        self.hdr_ver() == PldmHeaderVersion::Version0 as u8
    }

    /// The same header with the direction flipped to response. Used when a
    /// reply is built in place over the request buffer.
    pub fn into_response(self) -> Self {
        let mut hdr = self;
        hdr.set_request_bit(PldmMsgType::Response as u8);
        hdr
    }
}

/// Minimal error reply: header plus a completion code. Every command that
/// fails before its typed response can be built answers with this shape.
#[derive(Debug, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct PldmFailureResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl PldmFailureResponse {
    pub fn for_request(
        request_hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
        completion_code: u8,
    ) -> Self {
        PldmFailureResponse {
            hdr: request_hdr.into_response(),
            completion_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PldmCodec;

    #[test]
    fn test_header_round_trip() {
        let hdr = PldmMsgHeader::new(0x05, PldmMsgType::Request, PldmTypeCode::FwUpdate, 0x10);
        assert_eq!(hdr.0, [0x85, 0x05, 0x10]);
        assert!(hdr.is_request());
        assert!(hdr.is_hdr_ver_valid());

        let mut buffer = [0u8; PLDM_MSG_HEADER_LEN];
        let size = hdr.encode(&mut buffer).unwrap();
        assert_eq!(size, PLDM_MSG_HEADER_LEN);
        let decoded = PldmMsgHeader::decode(&buffer).unwrap();
        assert_eq!(hdr, decoded);
    }

    #[test]
    fn test_header_into_response() {
        let hdr = PldmMsgHeader::new(0x1F, PldmMsgType::Request, PldmTypeCode::FwUpdate, 0x01);
        let rsp = hdr.into_response();
        assert!(!rsp.is_request());
        assert_eq!(rsp.instance_id(), 0x1F);
        assert_eq!(rsp.cmd_code(), 0x01);
    }

    #[test]
    fn test_failure_response() {
        let hdr = PldmMsgHeader::new(0x02, PldmMsgType::Request, PldmTypeCode::FwUpdate, 0x15);
        let resp = PldmFailureResponse::for_request(hdr, PldmCompletionCode::InvalidData as u8);

        let mut buffer = [0u8; PLDM_FAILURE_RESP_LEN];
        let size = resp.encode(&mut buffer).unwrap();
        assert_eq!(size, PLDM_FAILURE_RESP_LEN);
        assert!(!PldmFailureResponse::decode(&buffer).unwrap().hdr.is_request());
    }

    #[test]
    fn test_truncated_header_rejected() {
        let buffer = [0u8; PLDM_MSG_HEADER_LEN - 1];
        assert!(PldmMsgHeader::<[u8; PLDM_MSG_HEADER_LEN]>::decode(&buffer).is_err());
    }
}
