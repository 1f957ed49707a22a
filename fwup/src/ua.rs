// Licensed under the Apache-2.0 license

//! Update-agent role: request generators for the update flow, processors
//! for the firmware device's responses, and servers for the FD-initiated
//! exchanges (GetPackageData, RequestFirmwareData, the completion
//! notifications).
//!
//! Response processors assemble peer inventory into the device registry:
//! descriptors and firmware parameters land in the peer's
//! [`DeviceRecord`](crate::device_manager::DeviceRecord).

use crate::component::FirmwareComponent;
use crate::dispatcher::fail;
use crate::device_manager::DeviceManager;
use crate::error::FwupError;
use crate::flash_map::{FlashDriver, FlashRegionId, FlashRegionMap};
use crate::instance_id::OutstandingRequest;
use crate::multipart::serve_portion;
use crate::session::{ComponentDownload, FwupSession};
use crate::state_machine::{ua_may_issue, UpdateRole};
use pldm_protocol::base::{
    PldmCompletionCode, PldmFailureResponse, PldmMsgType, TransferOperationFlag, TransferRespFlag,
};
use pldm_protocol::codec::PldmCodec;
use pldm_protocol::firmware_update::{
    ComponentClassification, ComponentCompatibilityResponse, DescriptorType, FirmwareDeviceState,
    FwUpdateCmd, FwUpdateCompletionCode, UpdateOptionFlags, VersionString,
    PLDM_FWUP_BASELINE_TRANSFER_SIZE,
};
use pldm_protocol::messages::cancel::{
    CancelUpdateComponentRequest, CancelUpdateComponentResponse, CancelUpdateRequest,
    CancelUpdateResponse,
};
use pldm_protocol::messages::completion::{
    ApplyCompleteRequest, ApplyCompleteResponse, ApplyResult, TransferCompleteRequest,
    TransferCompleteResponse, TransferResult, VerifyCompleteRequest, VerifyCompleteResponse,
    VerifyResult,
};
use pldm_protocol::messages::inventory::{
    GetFirmwareParametersRequest, GetFirmwareParametersResponse, QueryDeviceIdentifiersRequest,
    QueryDeviceIdentifiersResponse,
};
use pldm_protocol::messages::status::{GetStatusRequest, GetStatusResponse};
use pldm_protocol::messages::transfer::{
    MultipartTransferRequest, MultipartTransferResponse, RequestFirmwareDataRequest,
    RequestFirmwareDataResponse, MAX_TRANSFER_SIZE,
};
use pldm_protocol::messages::update::{
    ActivateFirmwareRequest, ActivateFirmwareResponse, PassComponentTableRequest,
    PassComponentTableResponse, RequestUpdateRequest, RequestUpdateResponse, SelfContainedActivation,
    UpdateComponentRequest, UpdateComponentResponse,
};

/// Parameters the update agent announces in RequestUpdate.
#[derive(Debug, Clone, Copy)]
pub struct RequestUpdateParams {
    pub max_transfer_size: u32,
    pub num_components: u16,
    pub max_outstanding_transfer_req: u8,
    pub pkg_data_len: u16,
    pub comp_img_set_ver: VersionString,
}

/// Update-agent role handlers. Stateless; everything lives in the session
/// and the registry.
pub struct UpdateAgentContext;

impl UpdateAgentContext {
    fn check_issue(session: &FwupSession, cmd: FwUpdateCmd) -> Result<(), FwupError> {
        if session.role() == Some(UpdateRole::FirmwareDevice)
            || !ua_may_issue(session.state(), cmd)
        {
            return Err(FwupError::InvalidStateForCommand);
        }
        Ok(())
    }

    fn track(
        session: &mut FwupSession,
        instance_id: u8,
        command: FwUpdateCmd,
        now_ms: u64,
    ) {
        session.record_command(command as u8);
        session.outstanding = Some(OutstandingRequest {
            instance_id,
            command,
            sent_at_ms: now_ms,
            arg: 0,
        });
    }

    // ---- Request generators ----

    pub(crate) fn generate_query_devid(
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::QueryDeviceIdentifiers)?;
        let instance_id = session.instance_ids.allocate();
        let req = QueryDeviceIdentifiersRequest::new(instance_id, PldmMsgType::Request);
        let bytes = req.encode(payload)?;
        Self::track(session, instance_id, FwUpdateCmd::QueryDeviceIdentifiers, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_get_fw_params(
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::GetFirmwareParameters)?;
        let instance_id = session.instance_ids.allocate();
        let req = GetFirmwareParametersRequest::new(instance_id, PldmMsgType::Request);
        let bytes = req.encode(payload)?;
        Self::track(session, instance_id, FwUpdateCmd::GetFirmwareParameters, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_request_update(
        session: &mut FwupSession,
        now_ms: u64,
        params: &RequestUpdateParams,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::RequestUpdate)?;
        if (params.max_transfer_size as usize) < PLDM_FWUP_BASELINE_TRANSFER_SIZE
            || params.max_outstanding_transfer_req < 1
        {
            return Err(FwupError::Protocol(
                pldm_protocol::error::ProtocolError::InvalidData,
            ));
        }
        session.begin_update(UpdateRole::UpdateAgent)?;

        let instance_id = session.instance_ids.allocate();
        let req = RequestUpdateRequest::new(
            instance_id,
            PldmMsgType::Request,
            params.max_transfer_size,
            params.num_components,
            params.max_outstanding_transfer_req,
            params.pkg_data_len,
            &params.comp_img_set_ver,
        );
        let bytes = req.encode(payload)?;

        session.max_transfer_size = params.max_transfer_size;
        session.max_outstanding_transfer_req = params.max_outstanding_transfer_req;
        session.num_components = params.num_components;
        session.comp_img_set_ver = params.comp_img_set_ver;
        Self::track(session, instance_id, FwUpdateCmd::RequestUpdate, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_pass_component(
        session: &mut FwupSession,
        now_ms: u64,
        component: &FirmwareComponent,
        transfer_flag: TransferRespFlag,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::PassComponentTable)?;
        let instance_id = session.instance_ids.allocate();
        let req = PassComponentTableRequest::new(
            instance_id,
            PldmMsgType::Request,
            transfer_flag as u8,
            ComponentClassification::try_from(component.classification)
                .unwrap_or(ComponentClassification::Unspecified),
            component.identifier,
            component.classification_index,
            component.comparison_stamp,
            &component.version,
        );
        let bytes = req.encode(payload)?;
        session.pending_last_component = matches!(
            transfer_flag,
            TransferRespFlag::End | TransferRespFlag::StartAndEnd
        );
        Self::track(session, instance_id, FwUpdateCmd::PassComponentTable, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_update_component(
        session: &mut FwupSession,
        now_ms: u64,
        component: &FirmwareComponent,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::UpdateComponent)?;
        let image_size = component.image_size.unwrap_or(0);
        let instance_id = session.instance_ids.allocate();
        let req = UpdateComponentRequest::new(
            instance_id,
            PldmMsgType::Request,
            ComponentClassification::try_from(component.classification)
                .unwrap_or(ComponentClassification::Unspecified),
            component.identifier,
            component.classification_index,
            component.comparison_stamp,
            image_size,
            component.option_flags.unwrap_or(UpdateOptionFlags(0)),
            &component.version,
        );
        let bytes = req.encode(payload)?;
        session.download = Some(ComponentDownload {
            classification: component.classification,
            identifier: component.identifier,
            classification_index: component.classification_index,
            image_size,
            offset: 0,
        });
        Self::track(session, instance_id, FwUpdateCmd::UpdateComponent, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_get_device_metadata(
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::GetDeviceMetaData)?;
        let instance_id = session.instance_ids.allocate();
        let req = MultipartTransferRequest::new(
            instance_id,
            PldmMsgType::Request,
            FwUpdateCmd::GetDeviceMetaData,
            session.meta_data_xfer.handle(),
            session.meta_data_xfer.op_flag(),
        );
        let bytes = req.encode(payload)?;
        Self::track(session, instance_id, FwUpdateCmd::GetDeviceMetaData, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_activate_firmware(
        session: &mut FwupSession,
        now_ms: u64,
        self_contained: bool,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::ActivateFirmware)?;
        let instance_id = session.instance_ids.allocate();
        let req = ActivateFirmwareRequest::new(
            instance_id,
            PldmMsgType::Request,
            if self_contained {
                SelfContainedActivation::Activate
            } else {
                SelfContainedActivation::NotActivate
            },
        );
        let bytes = req.encode(payload)?;
        Self::track(session, instance_id, FwUpdateCmd::ActivateFirmware, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_get_status(
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::GetStatus)?;
        let instance_id = session.instance_ids.allocate();
        let req = GetStatusRequest::new(instance_id, PldmMsgType::Request);
        let bytes = req.encode(payload)?;
        Self::track(session, instance_id, FwUpdateCmd::GetStatus, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_cancel_update(
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::CancelUpdate)?;
        let instance_id = session.instance_ids.allocate();
        let req = CancelUpdateRequest::new(instance_id, PldmMsgType::Request);
        let bytes = req.encode(payload)?;
        Self::track(session, instance_id, FwUpdateCmd::CancelUpdate, now_ms);
        Ok(bytes)
    }

    pub(crate) fn generate_cancel_update_component(
        session: &mut FwupSession,
        now_ms: u64,
        payload: &mut [u8],
    ) -> Result<usize, FwupError> {
        Self::check_issue(session, FwUpdateCmd::CancelUpdateComponent)?;
        let instance_id = session.instance_ids.allocate();
        let req = CancelUpdateComponentRequest::new(instance_id, PldmMsgType::Request);
        let bytes = req.encode(payload)?;
        Self::track(session, instance_id, FwUpdateCmd::CancelUpdateComponent, now_ms);
        Ok(bytes)
    }

    // ---- Response processors ----

    /// Records the completion code that leads every response body and
    /// surfaces non-success before the full decode runs; a failure reply is
    /// only four bytes long. Unknown codes pass through verbatim.
    fn check_peer_completion(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        let code = PldmFailureResponse::decode(payload)?.completion_code;
        session.record_completion(code);
        if code != PldmCompletionCode::Success as u8 {
            return Err(FwupError::PeerFailure(code));
        }
        Ok(())
    }

    pub(crate) fn process_query_devid_resp(
        devices: &mut dyn DeviceManager,
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        let resp = QueryDeviceIdentifiersResponse::decode(payload)?;

        let record = match devices.lookup_by_eid(session.peer_eid) {
            Some(record) => record,
            None => {
                log::warn!("eid {}: no device record for identifiers", session.peer_eid);
                return Ok(());
            }
        };

        let descriptors = resp.descriptors();
        record.descriptor_count = resp.descriptor_count;
        record.descriptors[..descriptors.len()].copy_from_slice(descriptors);

        // PCI-class peers lead with the four PCI identity descriptors, in
        // table order. Each lands in its own field.
        if descriptors.len() >= 4
            && descriptors[0].descriptor_type == DescriptorType::PciVendorId as u16
        {
            record.pci_vid = descriptors[0].value_u16().unwrap_or(0);
            record.pci_device_id = descriptors[1].value_u16().unwrap_or(0);
            record.pci_subsystem_vid = descriptors[2].value_u16().unwrap_or(0);
            record.pci_subsystem_id = descriptors[3].value_u16().unwrap_or(0);
        }
        Ok(())
    }

    pub(crate) fn process_get_fw_params_resp(
        devices: &mut dyn DeviceManager,
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        let resp = GetFirmwareParametersResponse::decode(payload)?;

        match devices.lookup_by_eid(session.peer_eid) {
            Some(record) => record.fw_params = resp.params,
            None => log::warn!(
                "eid {}: no device record for firmware parameters",
                session.peer_eid
            ),
        }
        Ok(())
    }

    pub(crate) fn process_request_update_resp(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        let resp = RequestUpdateResponse::decode(payload)?;

        session.fd_meta_data_len = resp.fd_meta_data_len;
        session.get_pkg_data_cmd = resp.fd_will_send_pkg_data != 0;
        session.switch_state(FirmwareDeviceState::LearnComponents)?;
        Ok(())
    }

    pub(crate) fn process_pass_component_resp(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        PassComponentTableResponse::decode(payload)?;

        if session.pending_last_component {
            session.pending_last_component = false;
            session.switch_state(FirmwareDeviceState::ReadyXfer)?;
        }
        Ok(())
    }

    pub(crate) fn process_update_component_resp(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        let resp = UpdateComponentResponse::decode(payload)?;

        if resp.comp_compatibility_resp
            == ComponentCompatibilityResponse::CompCanBeUpdated as u8
        {
            session.switch_state(FirmwareDeviceState::Download)?;
        } else {
            session.download = None;
        }
        Ok(())
    }

    pub(crate) fn process_get_device_metadata_resp(
        session: &mut FwupSession,
        map: &FlashRegionMap,
        flash: &mut dyn FlashDriver,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        let resp = MultipartTransferResponse::decode(payload)?;

        let flag = TransferRespFlag::try_from(resp.fixed.transfer_flag)?;
        session.meta_data_xfer.absorb_portion(
            map,
            flash,
            FlashRegionId::DeviceMetaData,
            flag,
            resp.fixed.next_data_transfer_handle,
            resp.portion(),
        )?;
        Ok(())
    }

    pub(crate) fn process_activate_firmware_resp(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        ActivateFirmwareResponse::decode(payload)?;
        session.switch_state(FirmwareDeviceState::Idle)?;
        Ok(())
    }

    pub(crate) fn process_get_status_resp(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        let resp = GetStatusResponse::decode(payload)?;
        session.record_completion(resp.completion_code);
        log::debug!(
            "eid {}: peer status state {} previous {}",
            session.peer_eid,
            resp.current_state,
            resp.previous_state
        );
        Ok(())
    }

    pub(crate) fn process_cancel_update_resp(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        CancelUpdateResponse::decode(payload)?;
        session.switch_state(FirmwareDeviceState::Idle)?;
        Ok(())
    }

    pub(crate) fn process_cancel_update_component_resp(
        session: &mut FwupSession,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        Self::check_peer_completion(session, payload)?;
        CancelUpdateComponentResponse::decode(payload)?;
        session.download = None;
        session.switch_state(FirmwareDeviceState::ReadyXfer)?;
        Ok(())
    }

    // ---- Servers for FD-initiated requests ----

    pub(crate) fn get_package_data_rsp(
        session: &mut FwupSession,
        map: &FlashRegionMap,
        flash: &mut dyn FlashDriver,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = MultipartTransferRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::GetPackageData as u8);

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
        if map.region(FlashRegionId::UpdatePackage).is_err() {
            return fail(session, payload, FwUpdateCompletionCode::NoPackageData as u8);
        }

        let mut chunk = [0u8; MAX_TRANSFER_SIZE];
        let chunk_len = (session.max_transfer_size as usize)
            .clamp(PLDM_FWUP_BASELINE_TRANSFER_SIZE, MAX_TRANSFER_SIZE);
        let (flag, next_handle, len) = match serve_portion(
            map,
            flash,
            FlashRegionId::UpdatePackage,
            req.data_transfer_handle,
            op_flag,
            &mut chunk[..chunk_len],
        ) {
            Ok(part) => part,
            Err(e) => return fail(session, payload, e.completion_code()),
        };

        let resp = MultipartTransferResponse::new(
            req.hdr.instance_id(),
            FwUpdateCmd::GetPackageData,
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

    pub(crate) fn request_fw_data_rsp(
        session: &mut FwupSession,
        map: &FlashRegionMap,
        flash: &mut dyn FlashDriver,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = RequestFirmwareDataRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::RequestFirmwareData as u8);

        let download = match session.download {
            Some(download) => download,
            None => {
                return fail(
                    session,
                    payload,
                    FwUpdateCompletionCode::CommandNotExpected as u8,
                )
            }
        };

        let offset = req.offset;
        let length = req.length;
        if length as usize > MAX_TRANSFER_SIZE || length > session.max_transfer_size {
            return fail(
                session,
                payload,
                FwUpdateCompletionCode::InvalidTransferLength as u8,
            );
        }
        match offset.checked_add(length) {
            Some(end) if end <= download.image_size => {}
            _ => {
                return fail(
                    session,
                    payload,
                    FwUpdateCompletionCode::DataOutOfRange as u8,
                )
            }
        }

        let mut chunk = [0u8; MAX_TRANSFER_SIZE];
        if let Err(e) = map.read(
            flash,
            FlashRegionId::ComponentImage(download.classification_index),
            offset,
            &mut chunk[..length as usize],
        ) {
            return fail(session, payload, e.completion_code());
        }

        let resp = RequestFirmwareDataResponse::new(
            req.hdr.instance_id(),
            PldmCompletionCode::Success as u8,
            &chunk[..length as usize],
        )?;

        match resp.encode(payload) {
            Ok(bytes) => {
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn transfer_complete_rsp(
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = TransferCompleteRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::TransferComplete as u8);

        let resp =
            TransferCompleteResponse::new(req.hdr.instance_id(), PldmCompletionCode::Success as u8);
        match resp.encode(payload) {
            Ok(bytes) => {
                if req.transfer_result == TransferResult::TransferSuccess as u8 {
                    session.switch_state(FirmwareDeviceState::Verify)?;
                } else {
                    session.download = None;
                    session.switch_state(FirmwareDeviceState::ReadyXfer)?;
                }
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn verify_complete_rsp(
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = VerifyCompleteRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::VerifyComplete as u8);

        let resp =
            VerifyCompleteResponse::new(req.hdr.instance_id(), PldmCompletionCode::Success as u8);
        match resp.encode(payload) {
            Ok(bytes) => {
                if req.verify_result == VerifyResult::VerifySuccess as u8 {
                    session.switch_state(FirmwareDeviceState::Apply)?;
                } else {
                    session.download = None;
                    session.switch_state(FirmwareDeviceState::ReadyXfer)?;
                }
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }

    pub(crate) fn apply_complete_rsp(
        session: &mut FwupSession,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let req = ApplyCompleteRequest::decode(&payload[..req_len])?;
        session.record_command(FwUpdateCmd::ApplyComplete as u8);

        let resp =
            ApplyCompleteResponse::new(req.hdr.instance_id(), PldmCompletionCode::Success as u8);
        match resp.encode(payload) {
            Ok(bytes) => {
                let applied = req.apply_result == ApplyResult::ApplySuccess as u8
                    || req.apply_result
                        == ApplyResult::ApplySuccessWithActivationMethod as u8;
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
                session.record_completion(PldmCompletionCode::Success as u8);
                Ok(bytes)
            }
            Err(_) => fail(session, payload, PldmCompletionCode::InvalidLength as u8),
        }
    }
}
