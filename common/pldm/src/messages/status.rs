// Licensed under the Apache-2.0 license

//! GetStatus and its auxiliary vocabulary.

use crate::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmTypeCode, PLDM_MSG_HEADER_LEN,
};
use crate::error::ProtocolError;
use crate::firmware_update::{FirmwareDeviceState, FwUpdateCmd, UpdateOptionFlags};
use core::convert::TryFrom;
use zerocopy::{FromBytes, Immutable, IntoBytes};

pub const PROGRESS_PERCENT_NOT_SUPPORTED: u8 = 101;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPercent(u8);

impl Default for ProgressPercent {
    fn default() -> Self {
        ProgressPercent(PROGRESS_PERCENT_NOT_SUPPORTED)
    }
}

impl ProgressPercent {
    pub fn new(value: u8) -> Result<Self, ProtocolError> {
        if value > PROGRESS_PERCENT_NOT_SUPPORTED {
            Err(ProtocolError::InvalidData)
        } else {
            Ok(ProgressPercent(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuxState {
    OperationInProgress = 0,
    OperationSuccessful = 1,
    OperationFailed = 2,
    IdleLearnComponentsReadyXfer = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuxStateStatus {
    InProgressOrSuccess = 0x00,
    Timeout = 0x09,
    GenericError = 0x0A,
    VendorDefined, // 0x70..=0xEF
}

impl TryFrom<u8> for AuxStateStatus {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(AuxStateStatus::InProgressOrSuccess),
            0x09 => Ok(AuxStateStatus::Timeout),
            0x0A => Ok(AuxStateStatus::GenericError),
            0x70..=0xEF => Ok(AuxStateStatus::VendorDefined),
            _ => Err(ProtocolError::InvalidAuxStateStatus),
        }
    }
}

/// Why the device last entered Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GetStatusReasonCode {
    Initialization = 0,
    ActivateFw = 1,
    CancelUpdate = 2,
    LearnComponentTimeout = 3,
    ReadyXferTimeout = 4,
    DownloadTimeout = 5,
    VerifyTimeout = 6,
    ApplyTimeout = 7,
    VendorDefined, // 200..=255
}

impl TryFrom<u8> for GetStatusReasonCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(GetStatusReasonCode::Initialization),
            1 => Ok(GetStatusReasonCode::ActivateFw),
            2 => Ok(GetStatusReasonCode::CancelUpdate),
            3 => Ok(GetStatusReasonCode::LearnComponentTimeout),
            4 => Ok(GetStatusReasonCode::ReadyXferTimeout),
            5 => Ok(GetStatusReasonCode::DownloadTimeout),
            6 => Ok(GetStatusReasonCode::VerifyTimeout),
            7 => Ok(GetStatusReasonCode::ApplyTimeout),
            200..=255 => Ok(GetStatusReasonCode::VendorDefined),
            _ => Err(ProtocolError::InvalidReasonCode),
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetStatusRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl GetStatusRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType) -> Self {
        GetStatusRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::GetStatus as u8,
            ),
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetStatusResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub current_state: u8,
    pub previous_state: u8,
    pub aux_state: u8,
    pub aux_state_status: u8,
    pub progress_percent: u8,
    pub reason_code: u8,
    pub update_option_flags_enabled: u32,
}

impl GetStatusResponse {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        current_state: FirmwareDeviceState,
        previous_state: FirmwareDeviceState,
        aux_state: AuxState,
        aux_state_status: u8,
        progress_percent: ProgressPercent,
        reason_code: GetStatusReasonCode,
        update_option_flags_enabled: UpdateOptionFlags,
    ) -> Self {
        GetStatusResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::GetStatus as u8,
            ),
            completion_code,
            current_state: current_state as u8,
            previous_state: previous_state as u8,
            aux_state: aux_state as u8,
            aux_state_status,
            progress_percent: progress_percent.value(),
            reason_code: reason_code as u8,
            update_option_flags_enabled: update_option_flags_enabled.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PldmCodec;

    #[test]
    fn test_get_status_round_trip() {
        let resp = GetStatusResponse::new(
            1,
            0,
            FirmwareDeviceState::Download,
            FirmwareDeviceState::ReadyXfer,
            AuxState::OperationInProgress,
            AuxStateStatus::InProgressOrSuccess as u8,
            ProgressPercent::new(42).unwrap(),
            GetStatusReasonCode::Initialization,
            UpdateOptionFlags(0),
        );

        let mut buffer = [0u8; 32];
        let size = resp.encode(&mut buffer).unwrap();
        let decoded = GetStatusResponse::decode(&buffer[..size]).unwrap();
        assert_eq!(resp, decoded);
        assert_eq!(decoded.current_state, FirmwareDeviceState::Download as u8);
    }

    #[test]
    fn test_progress_percent_bounds() {
        assert!(ProgressPercent::new(100).is_ok());
        assert!(ProgressPercent::new(101).is_ok());
        assert!(ProgressPercent::new(102).is_err());
    }
}
