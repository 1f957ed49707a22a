// Licensed under the Apache-2.0 license

//! Firmware-device role: handlers for inbound update-agent commands, plus
//! the requests this device originates (GetPackageData, RequestFirmwareData
//! and the completion notifications) and their response processors.
//!
//! Handlers decode the request from the payload window, consult and mutate
//! the peer session, touch flash only through the region map, and encode
//! the response in place over the request buffer.

use crate::component::FirmwareComponent;
use crate::config::FD_MAX_TRANSFER_SIZE;
use crate::dispatcher::fail;
use crate::error::FwupError;
use crate::flash_map::{FlashDriver, FlashRegionId, FlashRegionMap};
use crate::instance_id::OutstandingRequest;
use crate::multipart::serve_portion;
use crate::session::{ComponentDownload, FwupSession};
use crate::state_machine::{fd_may_issue, UpdateRole};
use pldm_protocol::base::{
    PldmCompletionCode, PldmFailureResponse, PldmMsgType, TransferOperationFlag, TransferRespFlag,
};
use pldm_protocol::codec::PldmCodec;
use pldm_protocol::firmware_update::{
    ComponentCompatibilityResponse, ComponentCompatibilityResponseCode, ComponentResponse,
    ComponentResponseCode, Descriptor, FirmwareDeviceState, FwUpdateCmd, FwUpdateCompletionCode,
    UpdateOptionFlags, MAX_DESCRIPTOR_COUNT, PLDM_FWUP_BASELINE_TRANSFER_SIZE,
};
use pldm_protocol::messages::cancel::{
    CancelUpdateComponentRequest, CancelUpdateComponentResponse, CancelUpdateRequest,
    CancelUpdateResponse, NonFunctioningComponentIndication,
};
use pldm_protocol::messages::completion::{
    ApplyCompleteRequest, ApplyCompleteResponse, ApplyResult, TransferCompleteRequest,
    TransferCompleteResponse, TransferResult, VerifyCompleteRequest, VerifyCompleteResponse,
    VerifyResult,
};
use pldm_protocol::messages::inventory::{
    FirmwareParameters, GetFirmwareParametersRequest, GetFirmwareParametersResponse,
    QueryDeviceIdentifiersRequest, QueryDeviceIdentifiersResponse,
};
use pldm_protocol::messages::status::{
    AuxState, AuxStateStatus, GetStatusReasonCode, GetStatusRequest, GetStatusResponse,
    ProgressPercent,
};
use pldm_protocol::messages::transfer::{
    MultipartTransferRequest, MultipartTransferResponse, RequestFirmwareDataRequest,
    RequestFirmwareDataResponse, MAX_TRANSFER_SIZE,
};
use pldm_protocol::messages::update::{
    ActivateFirmwareRequest, ActivateFirmwareResponse, PassComponentTableRequest,
    PassComponentTableResponse, RequestUpdateRequest, RequestUpdateResponse,
    UpdateComponentRequest, UpdateComponentResponse, FD_WILL_NOT_SEND_GET_PKG_DATA,
    FD_WILL_SEND_GET_PKG_DATA,
};

/// This device's update-facing identity: its descriptor table and firmware
/// parameters, fixed at construction.
pub struct FirmwareDeviceContext {
    descriptor_count: u8,
    descriptors: [Descriptor; MAX_DESCRIPTOR_COUNT],
    fw_params: FirmwareParameters,
}

impl FirmwareDeviceContext {
    pub fn new(
        descriptors: &[Descriptor],
        fw_params: FirmwareParameters,
    ) -> Result<Self, FwupError> {
        if descriptors.is_empty() || descriptors.len() > MAX_DESCRIPTOR_COUNT {
            return Err(FwupError::Protocol(
                pldm_protocol::error::ProtocolError::InvalidDescriptorCount,
            ));
        }
        let mut table = [Descriptor::default(); MAX_DESCRIPTOR_COUNT];
        table[..descriptors.len()].copy_from_slice(descriptors);
        Ok(FirmwareDeviceContext {
            descriptor_count: descriptors.len() as u8,
            descriptors: table,
            fw_params,
        })
    }

    fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors[..self.descriptor_count as usize]
    }

    pub fn firmware_params(&self) -> &FirmwareParameters {
        &self.fw_params
    }

    // ---- Inbound request handlers ----

    pub(crate) fn query_devid_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = QueryDeviceIdentifiersRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::QueryDeviceIdentifiers as u8);

        let resp = QueryDeviceIdentifiersResponse::new(
            req.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            self.descriptors(),
        )?;

        match resp.encode(payload) {
            Ok(bytes) => {
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn get_fw_params_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = GetFirmwareParametersRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::GetFirmwareParameters as u8);

        let resp = GetFirmwareParametersResponse::new(
            req.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            &self.fw_params,
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn request_update_rsp(
        &self,
        session: &mut FwupSession,
        map: &FlashRegionMap,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = RequestUpdateRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::RequestUpdate as u8);

        let ua_transfer_size = req.fixed.max_transfer_size;
        if (ua_transfer_size as usize) < PLDM_FWUP_BASELINE_TRANSFER_SIZE {
            return fail(
                session,
                payload,
                FwUpdateCompletionCode::InvalidTransferLength as u8,
            );
        }
        if req.fixed.max_outstanding_transfer_req < 1 {
            return fail(session, payload, PldmCompletionCode::InvalidData as u8);
        }

        let get_pkg_data = req.fixed.pkg_data_len > 0
            && map.region(FlashRegionId::PackageData).is_ok();
        let fd_meta_data_len = map.size(FlashRegionId::DeviceMetaData).min(u16::MAX as u32) as u16;

        let resp = RequestUpdateResponse::new(
            req.fixed.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            fd_meta_data_len,
            if get_pkg_data {
                FD_WILL_SEND_GET_PKG_DATA
            } else {
                FD_WILL_NOT_SEND_GET_PKG_DATA
            },
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                session.begin_update(UpdateRole::FirmwareDevice)?;
                session.max_transfer_size = ua_transfer_size.min(FD_MAX_TRANSFER_SIZE);
                session.max_outstanding_transfer_req = req.fixed.max_outstanding_transfer_req;
                session.num_components = req.fixed.num_components;
                session.get_pkg_data_cmd = get_pkg_data;
                session.fd_meta_data_len = fd_meta_data_len;
                session.comp_img_set_ver = req.comp_img_set_ver;
                session.switch_state(FirmwareDeviceState::LearnComponents)?;
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn pass_component_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = PassComponentTableRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::PassComponentTable as u8);

        let transfer_flag = match TransferRespFlag::try_from(req.fixed.transfer_flag) {
            Ok(flag) => flag,
            Err(_) => return fail(session, payload, PldmCompletionCode::InvalidData as u8),
        };

        let component = FirmwareComponent::new(
            req.fixed.comp_classification,
            req.fixed.comp_identifier,
            req.fixed.comp_classification_index,
            req.fixed.comp_comparison_stamp,
            req.comp_ver,
            None,
            None,
        );
        let comp_resp_code = component.update_eligibility(&self.fw_params);

        let resp = PassComponentTableResponse::new(
            req.fixed.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            if comp_resp_code == ComponentResponseCode::CompCanBeUpdated {
                ComponentResponse::CompCanBeUpdated
            } else {
                ComponentResponse::CompCannotBeUpdated
            },
            comp_resp_code,
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                if matches!(
                    transfer_flag,
                    TransferRespFlag::End | TransferRespFlag::StartAndEnd
                ) {
                    session.switch_state(FirmwareDeviceState::ReadyXfer)?;
                }
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn update_component_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = UpdateComponentRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::UpdateComponent as u8);

        let component = FirmwareComponent::new(
            req.fixed.comp_classification,
            req.fixed.comp_identifier,
            req.fixed.comp_classification_index,
            req.fixed.comp_comparison_stamp,
            req.comp_ver,
            Some(req.fixed.comp_image_size),
            Some(UpdateOptionFlags(req.fixed.update_option_flags)),
        );
        let comp_resp_code = component.update_eligibility(&self.fw_params);
        let can_update = comp_resp_code == ComponentResponseCode::CompCanBeUpdated;

        let resp = UpdateComponentResponse::new(
            req.fixed.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            if can_update {
                ComponentCompatibilityResponse::CompCanBeUpdated
            } else {
                ComponentCompatibilityResponse::CompCannotBeUpdated
            },
            ComponentCompatibilityResponseCode::try_from(comp_resp_code as u8)
                .unwrap_or(ComponentCompatibilityResponseCode::CompConflict),
            UpdateOptionFlags(req.fixed.update_option_flags),
            0,
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                if can_update {
                    session.download = Some(ComponentDownload {
                        classification: req.fixed.comp_classification,
                        identifier: req.fixed.comp_identifier,
                        classification_index: req.fixed.comp_classification_index,
                        image_size: req.fixed.comp_image_size,
                        offset: 0,
                    });
                    session.switch_state(FirmwareDeviceState::Download)?;
                }
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn get_device_metadata_rsp(
        &self,
        session: &mut FwupSession,
        map: &FlashRegionMap,
        flash: &mut dyn FlashDriver,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = MultipartTransferRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::GetDeviceMetaData as u8);

        let op_flag = match TransferOperationFlag::try_from(req.transfer_operation_flag) {
            Ok(flag) => flag,
            Err(_) => {
                return fail(
                    session,
                    payload,
                    FwUpdateCompletionCode::InvalidTransferOperationFlag as u8,
                )
            }
        };
        if map.region(FlashRegionId::DeviceMetaData).is_err() {
            return fail(
                session,
                payload,
                FwUpdateCompletionCode::NoDeviceMetadata as u8,
            );
        }

        let mut chunk = [0u8; MAX_TRANSFER_SIZE];
        let chunk_len = (session.max_transfer_size as usize)
            .clamp(PLDM_FWUP_BASELINE_TRANSFER_SIZE, MAX_TRANSFER_SIZE);
        let handle = req.data_transfer_handle;
        let (flag, next_handle, len) = match serve_portion(
            map,
            flash,
            FlashRegionId::DeviceMetaData,
            handle,
            op_flag,
            &mut chunk[..chunk_len],
        ) {
            Ok(part) => part,
            Err(e) => return fail(session, payload, e.completion_code()),
        };

        let resp = MultipartTransferResponse::new(
            req.hdr.instance_id(),
            FwUpdateCmd::GetDeviceMetaData,
            PldmCompletionCode::Success as u8,
            next_handle,
            flag,
            &chunk[..len],
        )?;

        match resp.encode(payload) {
            Ok(bytes) => {
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn activate_firmware_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = ActivateFirmwareRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::ActivateFirmware as u8);

        if session.components_applied < session.num_components {
            return fail(
                session,
                payload,
                FwUpdateCompletionCode::IncompleteUpdate as u8,
            );
        }

        let resp = ActivateFirmwareResponse::new(
            req.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            0,
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                session.switch_state(FirmwareDeviceState::Idle)?;
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn get_status_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = GetStatusRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::GetStatus as u8);

        let aux_state = match session.state() {
            FirmwareDeviceState::Download
            | FirmwareDeviceState::Verify
            | FirmwareDeviceState::Apply => AuxState::OperationInProgress,
            FirmwareDeviceState::Activate => AuxState::OperationSuccessful,
            _ => AuxState::IdleLearnComponentsReadyXfer,
        };
        let progress = match session.download {
            Some(d) if session.state() == FirmwareDeviceState::Download && d.image_size > 0 => {
                ProgressPercent::new(((d.offset as u64 * 100) / d.image_size as u64) as u8)
                    .unwrap_or_default()
            }
            _ => ProgressPercent::default(),
        };

        let resp = GetStatusResponse::new(
            req.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            session.state(),
            session.previous_state(),
            aux_state,
            AuxStateStatus::InProgressOrSuccess as u8,
            progress,
            session.reason.unwrap_or(GetStatusReasonCode::Initialization),
            UpdateOptionFlags(0),
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn cancel_update_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = CancelUpdateRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::CancelUpdate as u8);

        let resp = CancelUpdateResponse::new(
            req.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            NonFunctioningComponentIndication::ComponentsFunctioning,
            0,
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                session.switch_state(FirmwareDeviceState::Idle)?;
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn cancel_update_component_rsp(
        &self,
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = CancelUpdateComponentRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::CancelUpdateComponent as u8);

        let resp = CancelUpdateComponentResponse::new(
            req.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
        );

        match resp.encode(payload) {
            Ok(bytes) => {
                session.download = None;
                session.switch_state(FirmwareDeviceState::ReadyXfer)?;
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    // ---- FD-initiated requests ----

    fn check_issue(
        &self,
        session: &FwupSession,
        cmd: FwUpdateCmd,
    ) -> Result<(), FwupError> {
        if session.role() != Some(UpdateRole::FirmwareDevice)
            || !fd_may_issue(session.state(), cmd)
        {
            return Err(FwupError::InvalidStateForCommand);
        }
        Ok(())
    }

    pub(crate) fn generate_get_package_data(
        &self,
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        self.check_issue(session, FwUpdateCmd::GetPackageData)?;
        if !session.get_pkg_data_cmd {
            return Err(FwupError::InvalidStateForCommand);
        }

        let instance_id = session.instance_ids.allocate();
        let req = MultipartTransferRequest::new(
            instance_id,
            PldmMsgType::Request,
            FwUpdateCmd::GetPackageData,
            session.pkg_data_xfer.handle(),
            session.pkg_data_xfer.op_flag(),
        );
        let bytes = req.encode(payload)?;
        session.record_command(FwUpdateCmd::GetPackageData as u8);
        session.outstanding = Some(OutstandingRequest {
            instance_id,
            command: FwUpdateCmd::GetPackageData,
            sent_at_ms: now_ms,
            arg: 0,
        });
        Ok(bytes)
    }

    pub(crate) fn generate_request_fw_data(
        &self,
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        self.check_issue(session, FwUpdateCmd::RequestFirmwareData)?;
        let download = session.download.ok_or(FwupError::InvalidStateForCommand)?;
        let remaining = download.image_size.saturating_sub(download.offset);
        if remaining == 0 {
            return Err(FwupError::InvalidStateForCommand);
        }

        let instance_id = session.instance_ids.allocate();
        let length = remaining.min(session.max_transfer_size);
        let req = RequestFirmwareDataRequest::new(
            instance_id,
            PldmMsgType::Request,
            download.offset,
            length,
        );
        let bytes = req.encode(payload)?;
        session.record_command(FwUpdateCmd::RequestFirmwareData as u8);
        session.outstanding = Some(OutstandingRequest {
            instance_id,
            command: FwUpdateCmd::RequestFirmwareData,
            sent_at_ms: now_ms,
            arg: 0,
        });
        Ok(bytes)
    }

    pub(crate) fn generate_transfer_complete(
        &self,
        session: &mut FwupSession,
        now_ms: u64,
        result: TransferResult,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        self.check_issue(session, FwUpdateCmd::TransferComplete)?;

        let instance_id = session.instance_ids.allocate();
        let req = TransferCompleteRequest::new(instance_id, PldmMsgType::Request, result);
        let bytes = req.encode(payload)?;
        session.record_command(FwUpdateCmd::TransferComplete as u8);
        session.outstanding = Some(OutstandingRequest {
            instance_id,
            command: FwUpdateCmd::TransferComplete,
            sent_at_ms: now_ms,
            arg: result as u8,
        });
        Ok(bytes)
    }

    pub(crate) fn generate_verify_complete(
        &self,
        session: &mut FwupSession,
        now_ms: u64,
        result: VerifyResult,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        self.check_issue(session, FwUpdateCmd::VerifyComplete)?;

        let instance_id = session.instance_ids.allocate();
        let req = VerifyCompleteRequest::new(instance_id, PldmMsgType::Request, result);
        let bytes = req.encode(payload)?;
        session.record_command(FwUpdateCmd::VerifyComplete as u8);
        session.outstanding = Some(OutstandingRequest {
            instance_id,
            command: FwUpdateCmd::VerifyComplete,
            sent_at_ms: now_ms,
            arg: result as u8,
        });
        Ok(bytes)
    }

    pub(crate) fn generate_apply_complete(
        &self,
        session: &mut FwupSession,
        now_ms: u64,
        result: ApplyResult,
        activation_methods_modification: u16,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        self.check_issue(session, FwUpdateCmd::ApplyComplete)?;

        let instance_id = session.instance_ids.allocate();
        let req = ApplyCompleteRequest::new(
            instance_id,
            PldmMsgType::Request,
            result,
            activation_methods_modification,
        );
        let bytes = req.encode(payload)?;
        session.record_command(FwUpdateCmd::ApplyComplete as u8);
        session.outstanding = Some(OutstandingRequest {
            instance_id,
            command: FwUpdateCmd::ApplyComplete,
            sent_at_ms: now_ms,
            arg: result as u8,
        });
        Ok(bytes)
    }

    // ---- Response processors for FD-initiated requests ----

    pub(crate) fn process_get_package_data_resp(
        &self,
        session: &mut FwupSession,
        map: &FlashRegionMap,
        flash: &mut dyn FlashDriver,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        // A failure reply is four bytes; check the completion code before
        // the full-body decode.
        let completion_code = PldmFailureResponse::decode(payload)?.completion_code;
        session.record_completion(completion_code);
        if completion_code != PldmCompletionCode::Success as u8 {
            return Err(FwupError::PeerFailure(completion_code));
        }

        let resp = MultipartTransferResponse::decode(payload)?;
        let flag = TransferRespFlag::try_from(resp.fixed.transfer_flag)?;
        let next_handle = resp.fixed.next_data_transfer_handle;
        session.pkg_data_xfer.absorb_portion(
            map,
            flash,
            FlashRegionId::PackageData,
            flag,
            next_handle,
            resp.portion(),
        )?;
        Ok(())
    }

    pub(crate) fn process_request_fw_data_resp(
        &self,
        session: &mut FwupSession,
        map: &FlashRegionMap,
        flash: &mut dyn FlashDriver,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        let mut download = session.download.ok_or(FwupError::InvalidStateForCommand)?;

        let completion_code = PldmFailureResponse::decode(payload)?.completion_code;
        session.record_completion(completion_code);
        if completion_code == FwUpdateCompletionCode::RetryRequestFwData as u8 {
            return Err(FwupError::RetryRequestFwData);
        }
        if completion_code != PldmCompletionCode::Success as u8 {
            return Err(FwupError::PeerFailure(completion_code));
        }

        let resp = RequestFirmwareDataResponse::decode(payload)?;
        let data = resp.data();
        map.write(
            flash,
            FlashRegionId::ComponentImage(download.classification_index),
            download.offset,
            data,
        )?;
        download.offset = download.offset.saturating_add(data.len() as u32);
        session.download = Some(download);
        Ok(())
    }

    pub(crate) fn process_transfer_complete_resp(
        &self,
        session: &mut FwupSession,
        payload: &[u8],
        sent_result: u8,
    ) -> Result<(), FwupError> {
        let resp = TransferCompleteResponse::decode(payload)?;
        let completion_code = resp.completion_code;
        session.record_completion(completion_code);
        if completion_code != PldmCompletionCode::Success as u8 {
            return Err(FwupError::PeerFailure(completion_code));
        }

        if sent_result == TransferResult::TransferSuccess as u8 {
            session.switch_state(FirmwareDeviceState::Verify)?;
        } else {
            session.download = None;
            session.switch_state(FirmwareDeviceState::ReadyXfer)?;
        }
        Ok(())
    }

    pub(crate) fn process_verify_complete_resp(
        &self,
        session: &mut FwupSession,
        payload: &[u8],
        sent_result: u8,
    ) -> Result<(), FwupError> {
        let resp = VerifyCompleteResponse::decode(payload)?;
        let completion_code = resp.completion_code;
        session.record_completion(completion_code);
        if completion_code != PldmCompletionCode::Success as u8 {
            return Err(FwupError::PeerFailure(completion_code));
        }

        if sent_result == VerifyResult::VerifySuccess as u8 {
            session.switch_state(FirmwareDeviceState::Apply)?;
        } else {
            session.download = None;
            session.switch_state(FirmwareDeviceState::ReadyXfer)?;
        }
        Ok(())
    }

    pub(crate) fn process_apply_complete_resp(
        &self,
        session: &mut FwupSession,
        payload: &[u8],
        sent_result: u8,
    ) -> Result<(), FwupError> {
        let resp = ApplyCompleteResponse::decode(payload)?;
        let completion_code = resp.completion_code;
        session.record_completion(completion_code);
        if completion_code != PldmCompletionCode::Success as u8 {
            return Err(FwupError::PeerFailure(completion_code));
        }

        let applied = sent_result == ApplyResult::ApplySuccess as u8
            || sent_result == ApplyResult::ApplySuccessWithActivationMethod as u8;
        session.download = None;
        if applied {
            session.components_applied = session.components_applied.saturating_add(1);
            if session.components_applied >= session.num_components {
                session.switch_state(FirmwareDeviceState::Activate)?;
            } else {
                session.switch_state(FirmwareDeviceState::ReadyXfer)?;
            }
        } else {
            session.switch_state(FirmwareDeviceState::ReadyXfer)?;
        }
        Ok(())
    }
}
