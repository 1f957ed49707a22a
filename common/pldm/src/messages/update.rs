// Licensed under the Apache-2.0 license

//! Update session commands: RequestUpdate, PassComponentTable,
//! UpdateComponent and ActivateFirmware.

use crate::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmTypeCode, PLDM_MSG_HEADER_LEN,
};
use crate::codec::{CodecError, PldmCodec};
use crate::firmware_update::{
    ComponentClassification, ComponentCompatibilityResponse, ComponentCompatibilityResponseCode,
    ComponentResponse, ComponentResponseCode, FwUpdateCmd, UpdateOptionFlags, VersionString,
};
use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct RequestUpdateRequestFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub max_transfer_size: u32,
    pub num_components: u16,
    pub max_outstanding_transfer_req: u8,
    pub pkg_data_len: u16,
    pub comp_img_set_ver_kind: u8,
    pub comp_img_set_ver_len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct RequestUpdateRequest {
    pub fixed: RequestUpdateRequestFixed,
    pub comp_img_set_ver: VersionString,
}

impl RequestUpdateRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        max_transfer_size: u32,
        num_components: u16,
        max_outstanding_transfer_req: u8,
        pkg_data_len: u16,
        comp_img_set_ver: &VersionString,
    ) -> Self {
        RequestUpdateRequest {
            fixed: RequestUpdateRequestFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    msg_type,
                    PldmTypeCode::FwUpdate,
                    FwUpdateCmd::RequestUpdate as u8,
                ),
                max_transfer_size,
                num_components,
                max_outstanding_transfer_req,
                pkg_data_len,
                comp_img_set_ver_kind: comp_img_set_ver.kind,
                comp_img_set_ver_len: comp_img_set_ver.len,
            },
            comp_img_set_ver: *comp_img_set_ver,
        }
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<RequestUpdateRequestFixed>()
            + self.fixed.comp_img_set_ver_len as usize
    }
}

impl PldmCodec for RequestUpdateRequest {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.fixed
            .write_to(&mut buffer[offset..offset + core::mem::size_of::<RequestUpdateRequestFixed>()])
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<RequestUpdateRequestFixed>();

        let str_len = self.fixed.comp_img_set_ver_len as usize;
        buffer[offset..offset + str_len].copy_from_slice(&self.comp_img_set_ver.bytes[..str_len]);
        Ok(offset + str_len)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let fixed = RequestUpdateRequestFixed::read_from_bytes(
            buffer
                .get(..core::mem::size_of::<RequestUpdateRequestFixed>())
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;
        let offset = core::mem::size_of::<RequestUpdateRequestFixed>();

        let str_len = fixed.comp_img_set_ver_len as usize;
        let comp_img_set_ver = VersionString::from_raw(
            fixed.comp_img_set_ver_kind,
            buffer
                .get(offset..offset + str_len)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::InvalidLength)?;

        Ok(RequestUpdateRequest {
            fixed,
            comp_img_set_ver,
        })
    }
}

/// Whether the FD will pull package data with GetPackageData.
pub const FD_WILL_NOT_SEND_GET_PKG_DATA: u8 = 0x00;
pub const FD_WILL_SEND_GET_PKG_DATA: u8 = 0x01;

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct RequestUpdateResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub fd_meta_data_len: u16,
    pub fd_will_send_pkg_data: u8,
}

impl RequestUpdateResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        fd_meta_data_len: u16,
        fd_will_send_pkg_data: u8,
    ) -> Self {
        RequestUpdateResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::RequestUpdate as u8,
            ),
            completion_code,
            fd_meta_data_len,
            fd_will_send_pkg_data,
        }
    }
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct PassComponentTableRequestFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub transfer_flag: u8,
    pub comp_classification: u16,
    pub comp_identifier: u16,
    pub comp_classification_index: u8,
    pub comp_comparison_stamp: u32,
    pub comp_ver_kind: u8,
    pub comp_ver_len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct PassComponentTableRequest {
    pub fixed: PassComponentTableRequestFixed,
    pub comp_ver: VersionString,
}

impl PassComponentTableRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        transfer_flag: u8,
        comp_classification: ComponentClassification,
        comp_identifier: u16,
        comp_classification_index: u8,
        comp_comparison_stamp: u32,
        comp_ver: &VersionString,
    ) -> Self {
        PassComponentTableRequest {
            fixed: PassComponentTableRequestFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    msg_type,
                    PldmTypeCode::FwUpdate,
                    FwUpdateCmd::PassComponentTable as u8,
                ),
                transfer_flag,
                comp_classification: comp_classification as u16,
                comp_identifier,
                comp_classification_index,
                comp_comparison_stamp,
                comp_ver_kind: comp_ver.kind,
                comp_ver_len: comp_ver.len,
            },
            comp_ver: *comp_ver,
        }
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<PassComponentTableRequestFixed>() + self.fixed.comp_ver_len as usize
    }
}

impl PldmCodec for PassComponentTableRequest {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.fixed
            .write_to(
                &mut buffer[offset..offset + core::mem::size_of::<PassComponentTableRequestFixed>()],
            )
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<PassComponentTableRequestFixed>();

        let str_len = self.fixed.comp_ver_len as usize;
        buffer[offset..offset + str_len].copy_from_slice(&self.comp_ver.bytes[..str_len]);
        Ok(offset + str_len)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let fixed = PassComponentTableRequestFixed::read_from_bytes(
            buffer
                .get(..core::mem::size_of::<PassComponentTableRequestFixed>())
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;
        let offset = core::mem::size_of::<PassComponentTableRequestFixed>();

        let str_len = fixed.comp_ver_len as usize;
        let comp_ver = VersionString::from_raw(
            fixed.comp_ver_kind,
            buffer
                .get(offset..offset + str_len)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::InvalidLength)?;

        Ok(PassComponentTableRequest { fixed, comp_ver })
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct PassComponentTableResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub comp_resp: u8,
    pub comp_resp_code: u8,
}

impl PassComponentTableResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        comp_resp: ComponentResponse,
        comp_resp_code: ComponentResponseCode,
    ) -> Self {
        PassComponentTableResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::PassComponentTable as u8,
            ),
            completion_code,
            comp_resp: comp_resp as u8,
            comp_resp_code: comp_resp_code as u8,
        }
    }
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct UpdateComponentRequestFixed {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub comp_classification: u16,
    pub comp_identifier: u16,
    pub comp_classification_index: u8,
    pub comp_comparison_stamp: u32,
    pub comp_image_size: u32,
    pub update_option_flags: u32,
    pub comp_ver_kind: u8,
    pub comp_ver_len: u8,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct UpdateComponentRequest {
    pub fixed: UpdateComponentRequestFixed,
    pub comp_ver: VersionString,
}

impl UpdateComponentRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        comp_classification: ComponentClassification,
        comp_identifier: u16,
        comp_classification_index: u8,
        comp_comparison_stamp: u32,
        comp_image_size: u32,
        update_option_flags: UpdateOptionFlags,
        comp_ver: &VersionString,
    ) -> Self {
        UpdateComponentRequest {
            fixed: UpdateComponentRequestFixed {
                hdr: PldmMsgHeader::new(
                    instance_id,
                    msg_type,
                    PldmTypeCode::FwUpdate,
                    FwUpdateCmd::UpdateComponent as u8,
                ),
                comp_classification: comp_classification as u16,
                comp_identifier,
                comp_classification_index,
                comp_comparison_stamp,
                comp_image_size,
                update_option_flags: update_option_flags.0,
                comp_ver_kind: comp_ver.kind,
                comp_ver_len: comp_ver.len,
            },
            comp_ver: *comp_ver,
        }
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<UpdateComponentRequestFixed>() + self.fixed.comp_ver_len as usize
    }
}

impl PldmCodec for UpdateComponentRequest {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.fixed
            .write_to(
                &mut buffer[offset..offset + core::mem::size_of::<UpdateComponentRequestFixed>()],
            )
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<UpdateComponentRequestFixed>();

        let str_len = self.fixed.comp_ver_len as usize;
        buffer[offset..offset + str_len].copy_from_slice(&self.comp_ver.bytes[..str_len]);
        Ok(offset + str_len)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let fixed = UpdateComponentRequestFixed::read_from_bytes(
            buffer
                .get(..core::mem::size_of::<UpdateComponentRequestFixed>())
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;
        let offset = core::mem::size_of::<UpdateComponentRequestFixed>();

        let str_len = fixed.comp_ver_len as usize;
        let comp_ver = VersionString::from_raw(
            fixed.comp_ver_kind,
            buffer
                .get(offset..offset + str_len)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::InvalidLength)?;

        Ok(UpdateComponentRequest { fixed, comp_ver })
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct UpdateComponentResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub comp_compatibility_resp: u8,
    pub comp_compatibility_resp_code: u8,
    pub update_option_flags_enabled: u32,
    pub time_before_req_fw_data: u16,
}

impl UpdateComponentResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        comp_compatibility_resp: ComponentCompatibilityResponse,
        comp_compatibility_resp_code: ComponentCompatibilityResponseCode,
        update_option_flags_enabled: UpdateOptionFlags,
        time_before_req_fw_data: u16,
    ) -> Self {
        UpdateComponentResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::UpdateComponent as u8,
            ),
            completion_code,
            comp_compatibility_resp: comp_compatibility_resp as u8,
            comp_compatibility_resp_code: comp_compatibility_resp_code as u8,
            update_option_flags_enabled: update_option_flags_enabled.0,
            time_before_req_fw_data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SelfContainedActivation {
    NotActivate = 0,
    Activate = 1,
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ActivateFirmwareRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub self_contained_activation_req: u8,
}

impl ActivateFirmwareRequest {
    pub fn new(
        instance_id: InstanceId,
        msg_type: PldmMsgType,
        self_contained_activation_req: SelfContainedActivation,
    ) -> Self {
        ActivateFirmwareRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::ActivateFirmware as u8,
            ),
            self_contained_activation_req: self_contained_activation_req as u8,
        }
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct ActivateFirmwareResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub estimated_time_for_activation: u16,
}

impl ActivateFirmwareResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        estimated_time_for_activation: u16,
    ) -> Self {
        ActivateFirmwareResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::ActivateFirmware as u8,
            ),
            completion_code,
            estimated_time_for_activation,
        }
    }
}
