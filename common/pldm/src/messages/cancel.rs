// Licensed under the Apache-2.0 license

//! CancelUpdateComponent and CancelUpdate.

use crate::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmTypeCode, PLDM_MSG_HEADER_LEN,
};
use crate::error::ProtocolError;
use crate::firmware_update::FwUpdateCmd;
use core::convert::TryFrom;
use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NonFunctioningComponentIndication {
    ComponentsFunctioning = 0,
    ComponentsNotFunctioning = 1,
}

impl TryFrom<u8> for NonFunctioningComponentIndication {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(NonFunctioningComponentIndication::ComponentsFunctioning),
            1 => Ok(NonFunctioningComponentIndication::ComponentsNotFunctioning),
            _ => Err(ProtocolError::InvalidData),
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct CancelUpdateComponentRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl CancelUpdateComponentRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType) -> Self {
        CancelUpdateComponentRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::CancelUpdateComponent as u8,
            ),
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct CancelUpdateComponentResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
}

impl CancelUpdateComponentResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8) -> Self {
        CancelUpdateComponentResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::CancelUpdateComponent as u8,
            ),
            completion_code,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct CancelUpdateRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl CancelUpdateRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType) -> Self {
        CancelUpdateRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::CancelUpdate as u8,
            ),
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct CancelUpdateResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub non_functioning_component_indication: u8,
    pub non_functioning_component_bitmap: u64,
}

impl CancelUpdateResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        indication: NonFunctioningComponentIndication,
        non_functioning_component_bitmap: u64,
    ) -> Self {
        CancelUpdateResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::CancelUpdate as u8,
            ),
            completion_code,
            non_functioning_component_indication: indication as u8,
            non_functioning_component_bitmap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PldmCodec;

    #[test]
    fn test_cancel_update_round_trip() {
        let req = CancelUpdateRequest::new(7, PldmMsgType::Request);
        let mut buffer = [0u8; 32];
        let size = req.encode(&mut buffer).unwrap();
        assert_eq!(req, CancelUpdateRequest::decode(&buffer[..size]).unwrap());

        let resp = CancelUpdateResponse::new(
            7,
            0,
            NonFunctioningComponentIndication::ComponentsFunctioning,
            0,
        );
        let size = resp.encode(&mut buffer).unwrap();
        assert_eq!(resp, CancelUpdateResponse::decode(&buffer[..size]).unwrap());
    }

    #[test]
    fn test_cancel_update_component_round_trip() {
        let req = CancelUpdateComponentRequest::new(3, PldmMsgType::Request);
        let mut buffer = [0u8; 16];
        let size = req.encode(&mut buffer).unwrap();
        assert_eq!(
            req,
            CancelUpdateComponentRequest::decode(&buffer[..size]).unwrap()
        );
    }
}
