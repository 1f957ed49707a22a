// Licensed under the Apache-2.0 license

//! FD-initiated completion notifications: TransferComplete, VerifyComplete
//! and ApplyComplete.

use crate::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmTypeCode, PLDM_MSG_HEADER_LEN,
};
use crate::error::ProtocolError;
use crate::firmware_update::FwUpdateCmd;
use core::convert::TryFrom;
use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferResult {
    TransferSuccess = 0x00,
    TransferErrorImageCorrupt = 0x01,
    TransferErrorVersionMismatch = 0x02,
    FdAbortedTransfer = 0x03,
    FdAbortedTransferLowPowerState = 0x0B,
    FdAbortedTransferResetNeeded = 0x0C,
    FdAbortedTransferStorageIssue = 0x0D,
    VendorDefined, // 0x70..=0x8F
}

impl TryFrom<u8> for TransferResult {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(TransferResult::TransferSuccess),
            0x01 => Ok(TransferResult::TransferErrorImageCorrupt),
            0x02 => Ok(TransferResult::TransferErrorVersionMismatch),
            0x03 => Ok(TransferResult::FdAbortedTransfer),
            0x0B => Ok(TransferResult::FdAbortedTransferLowPowerState),
            0x0C => Ok(TransferResult::FdAbortedTransferResetNeeded),
            0x0D => Ok(TransferResult::FdAbortedTransferStorageIssue),
            0x70..=0x8F => Ok(TransferResult::VendorDefined),
            _ => Err(ProtocolError::InvalidTransferResult),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VerifyResult {
    VerifySuccess = 0x00,
    VerifyErrorVerificationFailure = 0x01,
    VerifyErrorVersionMismatch = 0x02,
    VerifyFailedFdSecurityChecks = 0x03,
    VerifyErrorImageIncomplete = 0x04,
    VendorDefined, // 0x90..=0xAF
}

impl TryFrom<u8> for VerifyResult {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(VerifyResult::VerifySuccess),
            0x01 => Ok(VerifyResult::VerifyErrorVerificationFailure),
            0x02 => Ok(VerifyResult::VerifyErrorVersionMismatch),
            0x03 => Ok(VerifyResult::VerifyFailedFdSecurityChecks),
            0x04 => Ok(VerifyResult::VerifyErrorImageIncomplete),
            0x90..=0xAF => Ok(VerifyResult::VendorDefined),
            _ => Err(ProtocolError::InvalidVerifyResult),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ApplyResult {
    ApplySuccess = 0x00,
    ApplySuccessWithActivationMethod = 0x01,
    ApplyFailureMemoryIssue = 0x02,
    VendorDefined, // 0xB0..=0xCF
}

impl TryFrom<u8> for ApplyResult {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(ApplyResult::ApplySuccess),
            0x01 => Ok(ApplyResult::ApplySuccessWithActivationMethod),
            0x02 => Ok(ApplyResult::ApplyFailureMemoryIssue),
            0xB0..=0xCF => Ok(ApplyResult::VendorDefined),
            _ => Err(ProtocolError::InvalidApplyResult),
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct TransferCompleteRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub transfer_result: u8,
}

impl TransferCompleteRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType, result: TransferResult) -> Self {
        TransferCompleteRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::TransferComplete as u8,
            ),
            transfer_result: result as u8,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct TransferCompleteResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl TransferCompleteResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8) -> Self {
        TransferCompleteResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::TransferComplete as u8,
            ),
            completion_code,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct VerifyCompleteRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub verify_result: u8,
}

impl VerifyCompleteRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType, result: VerifyResult) -> Self {
        VerifyCompleteRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::VerifyComplete as u8,
            ),
            verify_result: result as u8,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct VerifyCompleteResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl VerifyCompleteResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8) -> Self {
        VerifyCompleteResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::VerifyComplete as u8,
            ),
            completion_code,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ApplyCompleteRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub apply_result: u8,
    pub comp_activation_methods_modification: u16,
}

impl ApplyCompleteRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        result: ApplyResult,
        comp_activation_methods_modification: u16,
    ) -> Self {
        ApplyCompleteRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::ApplyComplete as u8,
            ),
            apply_result: result as u8,
            comp_activation_methods_modification,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ApplyCompleteResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl ApplyCompleteResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8) -> Self {
        ApplyCompleteResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::ApplyComplete as u8,
            ),
            completion_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PldmCodec;

    #[test]
    fn test_transfer_complete_round_trip() {
        let req = TransferCompleteRequest::new(1, PldmMsgType::Request, TransferResult::TransferSuccess);
        let mut buffer = [0u8; 8];
        let size = req.encode(&mut buffer).unwrap();
        assert_eq!(req, TransferCompleteRequest::decode(&buffer[..size]).unwrap());

        let resp = TransferCompleteResponse::new(1, 0);
        let size = resp.encode(&mut buffer).unwrap();
        assert_eq!(resp, TransferCompleteResponse::decode(&buffer[..size]).unwrap());
    }

    #[test]
    fn test_apply_complete_round_trip() {
        let req = ApplyCompleteRequest::new(2, PldmMsgType::Request, ApplyResult::ApplySuccess, 0);
        let mut buffer = [0u8; 8];
        let size = req.encode(&mut buffer).unwrap();
        assert_eq!(req, ApplyCompleteRequest::decode(&buffer[..size]).unwrap());
    }

    #[test]
    fn test_result_code_ranges() {
        assert_eq!(TransferResult::try_from(0x70), Ok(TransferResult::VendorDefined));
        assert!(TransferResult::try_from(0x20).is_err());
        assert_eq!(VerifyResult::try_from(0x00), Ok(VerifyResult::VerifySuccess));
        assert!(ApplyResult::try_from(0x10).is_err());
    }
}
