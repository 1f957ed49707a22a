// Licensed under the Apache-2.0 license

//! Command dispatch. One inbound message or one timer tick per invocation;
//! the engine never blocks. Routing is `(direction, command, state)`: the
//! acceptance tables gate every handler, and this module is the only place
//! session state changes are driven from.

use crate::component::FirmwareComponent;
use crate::config::Timeouts;
use crate::device_manager::DeviceManager;
use crate::error::FwupError;
use crate::fd::FirmwareDeviceContext;
use crate::flash_map::{FlashDriver, FlashRegionMap};
use crate::session::{FwupSession, SessionStore};
use crate::state_machine::{fd_accepts, requires_update_mode, UpdateRole};
use crate::ua::{RequestUpdateParams, UpdateAgentContext};
use pldm_protocol::base::{
    PldmCompletionCode, PldmFailureResponse, PldmMsgHeader, PldmTypeCode, TransferRespFlag,
    PLDM_MSG_HEADER_LEN,
};
use pldm_protocol::codec::{CodecError, PldmCodec};
use pldm_protocol::error::ProtocolError;
use pldm_protocol::firmware_update::{FirmwareDeviceState, FwUpdateCmd, FwUpdateCompletionCode};
use pldm_protocol::mctp::{frame_pldm_msg, pldm_payload, PLDM_MSG_OFFSET};
use pldm_protocol::messages::completion::{ApplyResult, TransferResult, VerifyResult};
use pldm_protocol::messages::status::GetStatusReasonCode;

/// Largest MCTP+PLDM message the engine exchanges; size caller buffers to
/// this.
pub const MAX_MCTP_PLDM_MSG_SIZE: usize = 1024;

/// What the caller should do with the buffer after `process_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgDisposition {
    /// A reply of this many bytes was encoded into the buffer; send it.
    Emit(usize),
    NoReply,
}

/// Snapshot for the host: the session state, the completion code of the
/// last processed message, and the command it belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: FirmwareDeviceState,
    pub completion_code: u8,
    pub previous_command: u8,
}

/// A request to originate, with its typed parameters.
#[derive(Debug, Clone, Copy)]
pub enum FwupRequest<'a> {
    QueryDeviceIdentifiers,
    GetFirmwareParameters,
    RequestUpdate(RequestUpdateParams),
    GetDeviceMetaData,
    PassComponentTable {
        component: &'a FirmwareComponent,
        transfer_flag: TransferRespFlag,
    },
    UpdateComponent {
        component: &'a FirmwareComponent,
    },
    GetPackageData,
    RequestFirmwareData,
    TransferComplete(TransferResult),
    VerifyComplete(VerifyResult),
    ApplyComplete {
        result: ApplyResult,
        activation_methods_modification: u16,
    },
    ActivateFirmware {
        self_contained: bool,
    },
    GetStatus,
    CancelUpdateComponent,
    CancelUpdate,
}

/// Encodes a completion-code-only reply over the request still sitting in
/// `payload`.
pub(crate) fn failure_response(
    payload: &mut [u8],
    completion_code: u8,
) -> Result<usize, FwupError> {
    let hdr = PldmMsgHeader::<[u8; PLDM_MSG_HEADER_LEN]>::decode(payload)?;
    let resp = PldmFailureResponse::for_request(hdr, completion_code);
    resp.encode(payload).map_err(FwupError::Codec)
}

/// Failure reply plus status bookkeeping.
pub(crate) fn fail(
    session: &mut FwupSession,
    payload: &mut [u8],
    completion_code: u8,
) -> Result<usize, FwupError> {
    session.record_completion(completion_code);
    failure_response(payload, completion_code)
}

pub struct CmdInterface<D: DeviceManager, F: FlashDriver> {
    fd: FirmwareDeviceContext,
    sessions: SessionStore,
    flash_map: FlashRegionMap,
    flash: F,
    devices: D,
    timeouts: Timeouts,
    clock_ms: u64,
}

impl<D: DeviceManager, F: FlashDriver> CmdInterface<D, F> {
    pub fn new(
        fd: FirmwareDeviceContext,
        flash_map: FlashRegionMap,
        flash: F,
        devices: D,
        timeouts: Timeouts,
    ) -> Self {
        CmdInterface {
            fd,
            sessions: SessionStore::new(),
            flash_map,
            flash,
            devices,
            timeouts,
            clock_ms: 0,
        }
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Consumes one framed message from `eid`. The first `msg_len` bytes of
    /// `msg_buf` hold the message; a reply, if any, is encoded in place
    /// (the buffer's full capacity is available for it).
    pub fn process_message(
        &mut self,
        eid: u8,
        msg_buf: &mut [u8],
        msg_len: usize,
    ) -> Result<MsgDisposition, FwupError> {
        if msg_len > msg_buf.len() {
            return Err(FwupError::Codec(CodecError::MsgTooShort));
        }
        pldm_payload(&mut msg_buf[..msg_len])?;
        let req_len = msg_len - PLDM_MSG_OFFSET;
        let payload = &mut msg_buf[PLDM_MSG_OFFSET..];

        let hdr = PldmMsgHeader::<[u8; PLDM_MSG_HEADER_LEN]>::decode(&payload[..req_len])?;
        let is_request = hdr.is_request();

        if !hdr.is_hdr_ver_valid() {
            return if is_request {
                let bytes = failure_response(payload, PldmCompletionCode::InvalidData as u8)?;
                Ok(MsgDisposition::Emit(PLDM_MSG_OFFSET + bytes))
            } else {
                Err(FwupError::Protocol(ProtocolError::InvalidMsgType))
            };
        }

        if PldmTypeCode::try_from(hdr.pldm_type()) != Ok(PldmTypeCode::FwUpdate) {
            return if is_request {
                let bytes =
                    failure_response(payload, PldmCompletionCode::InvalidPldmType as u8)?;
                Ok(MsgDisposition::Emit(PLDM_MSG_OFFSET + bytes))
            } else {
                Err(FwupError::InvalidPldmType)
            };
        }

        let cmd = match FwUpdateCmd::try_from(hdr.cmd_code()) {
            Ok(cmd) => cmd,
            Err(_) => {
                return if is_request {
                    let bytes = failure_response(
                        payload,
                        PldmCompletionCode::UnsupportedPldmCmd as u8,
                    )?;
                    Ok(MsgDisposition::Emit(PLDM_MSG_OFFSET + bytes))
                } else {
                    Err(FwupError::UnsupportedCommand)
                };
            }
        };

        if is_request {
            match self.handle_request(eid, cmd, payload, req_len) {
                Ok(bytes) => Ok(MsgDisposition::Emit(PLDM_MSG_OFFSET + bytes)),
                Err(e) => {
                    if let Some(session) = self.sessions.find_mut(eid) {
                        session.record_completion(e.completion_code());
                    }
                    let bytes = failure_response(payload, e.completion_code())?;
                    Ok(MsgDisposition::Emit(PLDM_MSG_OFFSET + bytes))
                }
            }
        } else {
            match self.handle_response(eid, cmd, hdr.instance_id(), &payload[..req_len]) {
                Ok(()) => Ok(MsgDisposition::NoReply),
                Err(e @ FwupError::UnexpectedInstanceId) => Err(e),
                Err(e) if e.is_component_fatal_only() => {
                    self.abort_component(eid);
                    Err(e)
                }
                Err(e) => {
                    self.sessions.end(eid, GetStatusReasonCode::Initialization);
                    Err(e)
                }
            }
        }
    }

    fn handle_request(
        &mut self,
        eid: u8,
        cmd: FwUpdateCmd,
        payload: &mut [u8],
        req_len: usize,
    ) -> Result<usize, FwupError> {
        let CmdInterface {
            fd,
            sessions,
            flash_map,
            flash,
            ..
        } = self;
        let session = sessions.peer(eid)?;

        let ua_serviced = matches!(
            cmd,
            FwUpdateCmd::GetPackageData
                | FwUpdateCmd::RequestFirmwareData
                | FwUpdateCmd::TransferComplete
                | FwUpdateCmd::VerifyComplete
                | FwUpdateCmd::ApplyComplete
        );

        let result = if ua_serviced {
            if !session.update_mode || session.role() != Some(UpdateRole::UpdateAgent) {
                session.record_command(cmd as u8);
                fail(
                    session,
                    payload,
                    FwUpdateCompletionCode::NotInUpdateMode as u8,
                )
            } else {
                match cmd {
                    FwUpdateCmd::GetPackageData => UpdateAgentContext::get_package_data_rsp(
                        session, flash_map, flash, payload, req_len,
                    ),
                    FwUpdateCmd::RequestFirmwareData => UpdateAgentContext::request_fw_data_rsp(
                        session, flash_map, flash, payload, req_len,
                    ),
                    FwUpdateCmd::TransferComplete => {
                        UpdateAgentContext::transfer_complete_rsp(session, payload, req_len)
                    }
                    FwUpdateCmd::VerifyComplete => {
                        UpdateAgentContext::verify_complete_rsp(session, payload, req_len)
                    }
                    _ => UpdateAgentContext::apply_complete_rsp(session, payload, req_len),
                }
            }
        } else if cmd == FwUpdateCmd::RequestUpdate {
            if session.update_mode {
                // State is left untouched; the peer retries after teardown.
                session.record_command(cmd as u8);
                fail(
                    session,
                    payload,
                    FwUpdateCompletionCode::AlreadyInUpdateMode as u8,
                )
            } else {
                fd.request_update_rsp(session, flash_map, payload, req_len)
            }
        } else if cmd == FwUpdateCmd::GetStatus {
            fd.get_status_rsp(session, payload, req_len)
        } else if requires_update_mode(cmd) && !session.update_mode {
            session.record_command(cmd as u8);
            fail(
                session,
                payload,
                FwUpdateCompletionCode::NotInUpdateMode as u8,
            )
        } else if !fd_accepts(session.state(), cmd) {
            session.record_command(cmd as u8);
            fail(
                session,
                payload,
                FwUpdateCompletionCode::InvalidStateForCommand as u8,
            )
        } else if session.update_mode && session.role() == Some(UpdateRole::UpdateAgent) {
            session.record_command(cmd as u8);
            fail(
                session,
                payload,
                FwUpdateCompletionCode::CommandNotExpected as u8,
            )
        } else {
            match cmd {
                FwUpdateCmd::QueryDeviceIdentifiers => {
                    fd.query_devid_rsp(session, payload, req_len)
                }
                FwUpdateCmd::GetFirmwareParameters => {
                    fd.get_fw_params_rsp(session, payload, req_len)
                }
                FwUpdateCmd::PassComponentTable => {
                    fd.pass_component_rsp(session, payload, req_len)
                }
                FwUpdateCmd::UpdateComponent => {
                    fd.update_component_rsp(session, payload, req_len)
                }
                FwUpdateCmd::GetDeviceMetaData => {
                    fd.get_device_metadata_rsp(session, flash_map, flash, payload, req_len)
                }
                FwUpdateCmd::ActivateFirmware => {
                    fd.activate_firmware_rsp(session, payload, req_len)
                }
                FwUpdateCmd::CancelUpdate => fd.cancel_update_rsp(session, payload, req_len),
                FwUpdateCmd::CancelUpdateComponent => {
                    fd.cancel_update_component_rsp(session, payload, req_len)
                }
                _ => fail(
                    session,
                    payload,
                    PldmCompletionCode::UnsupportedPldmCmd as u8,
                ),
            }
        };

        let bytes = result?;
        let ended = session.update_mode && session.state() == FirmwareDeviceState::Idle;
        let last_cmd = session.command;
        if ended {
            sessions.end(eid, teardown_reason(last_cmd));
        }
        Ok(bytes)
    }

    fn handle_response(
        &mut self,
        eid: u8,
        cmd: FwUpdateCmd,
        instance_id: u8,
        payload: &[u8],
    ) -> Result<(), FwupError> {
        let CmdInterface {
            fd,
            sessions,
            flash_map,
            flash,
            devices,
            ..
        } = self;

        let session = sessions.find_mut(eid).ok_or_else(|| {
            log::warn!("eid {eid}: response for unknown peer, dropped");
            FwupError::NoSession
        })?;
        let outstanding = session.outstanding.ok_or_else(|| {
            log::warn!("eid {eid}: unsolicited {cmd:?} response, dropped");
            FwupError::UnexpectedInstanceId
        })?;
        // A mismatch leaves the outstanding request armed for the real
        // response.
        outstanding.matches(instance_id, cmd)?;
        session.outstanding = None;

        match cmd {
            FwUpdateCmd::QueryDeviceIdentifiers => {
                UpdateAgentContext::process_query_devid_resp(devices, session, payload)
            }
            FwUpdateCmd::GetFirmwareParameters => {
                UpdateAgentContext::process_get_fw_params_resp(devices, session, payload)
            }
            FwUpdateCmd::RequestUpdate => {
                UpdateAgentContext::process_request_update_resp(session, payload)
            }
            FwUpdateCmd::PassComponentTable => {
                UpdateAgentContext::process_pass_component_resp(session, payload)
            }
            FwUpdateCmd::UpdateComponent => {
                UpdateAgentContext::process_update_component_resp(session, payload)
            }
            FwUpdateCmd::GetDeviceMetaData => UpdateAgentContext::process_get_device_metadata_resp(
                session, flash_map, flash, payload,
            ),
            FwUpdateCmd::ActivateFirmware => {
                UpdateAgentContext::process_activate_firmware_resp(session, payload)
            }
            FwUpdateCmd::GetStatus => UpdateAgentContext::process_get_status_resp(session, payload),
            FwUpdateCmd::CancelUpdate => {
                UpdateAgentContext::process_cancel_update_resp(session, payload)
            }
            FwUpdateCmd::CancelUpdateComponent => {
                UpdateAgentContext::process_cancel_update_component_resp(session, payload)
            }
            FwUpdateCmd::GetPackageData => {
                fd.process_get_package_data_resp(session, flash_map, flash, payload)
            }
            FwUpdateCmd::RequestFirmwareData => {
                fd.process_request_fw_data_resp(session, flash_map, flash, payload)
            }
            FwUpdateCmd::TransferComplete => {
                fd.process_transfer_complete_resp(session, payload, outstanding.arg)
            }
            FwUpdateCmd::VerifyComplete => {
                fd.process_verify_complete_resp(session, payload, outstanding.arg)
            }
            FwUpdateCmd::ApplyComplete => {
                fd.process_apply_complete_resp(session, payload, outstanding.arg)
            }
        }?;

        let ended = session.update_mode && session.state() == FirmwareDeviceState::Idle;
        let last_cmd = session.command;
        if ended {
            sessions.end(eid, teardown_reason(last_cmd));
        }
        Ok(())
    }

    /// Encodes a locally originated request for `eid` into `out_buf`
    /// (MCTP message-type byte included) and arms the response pairing.
    pub fn generate_request(
        &mut self,
        eid: u8,
        request: FwupRequest<'_>,
        out_buf: &mut [u8],
    ) -> Result<usize, FwupError> {
        frame_pldm_msg(out_buf)?;
        let clock_ms = self.clock_ms;
        let CmdInterface { fd, sessions, .. } = self;
        let payload = &mut out_buf[PLDM_MSG_OFFSET..];
        let session = sessions.peer(eid)?;
        if session.outstanding.is_some() {
            return Err(FwupError::RequestInFlight);
        }

        let bytes = match request {
            FwupRequest::QueryDeviceIdentifiers => {
                UpdateAgentContext::generate_query_devid(session, clock_ms, payload)
            }
            FwupRequest::GetFirmwareParameters => {
                UpdateAgentContext::generate_get_fw_params(session, clock_ms, payload)
            }
            FwupRequest::RequestUpdate(params) => {
                UpdateAgentContext::generate_request_update(session, clock_ms, &params, payload)
            }
            FwupRequest::GetDeviceMetaData => {
                UpdateAgentContext::generate_get_device_metadata(session, clock_ms, payload)
            }
            FwupRequest::PassComponentTable {
                component,
                transfer_flag,
            } => UpdateAgentContext::generate_pass_component(
                session,
                clock_ms,
                component,
                transfer_flag,
                payload,
            ),
            FwupRequest::UpdateComponent { component } => {
                UpdateAgentContext::generate_update_component(session, clock_ms, component, payload)
            }
            FwupRequest::GetPackageData => {
                fd.generate_get_package_data(session, clock_ms, payload)
            }
            FwupRequest::RequestFirmwareData => {
                fd.generate_request_fw_data(session, clock_ms, payload)
            }
            FwupRequest::TransferComplete(result) => {
                fd.generate_transfer_complete(session, clock_ms, result, payload)
            }
            FwupRequest::VerifyComplete(result) => {
                fd.generate_verify_complete(session, clock_ms, result, payload)
            }
            FwupRequest::ApplyComplete {
                result,
                activation_methods_modification,
            } => fd.generate_apply_complete(
                session,
                clock_ms,
                result,
                activation_methods_modification,
                payload,
            ),
            FwupRequest::ActivateFirmware { self_contained } => {
                UpdateAgentContext::generate_activate_firmware(
                    session,
                    clock_ms,
                    self_contained,
                    payload,
                )
            }
            FwupRequest::GetStatus => {
                UpdateAgentContext::generate_get_status(session, clock_ms, payload)
            }
            FwupRequest::CancelUpdateComponent => {
                UpdateAgentContext::generate_cancel_update_component(session, clock_ms, payload)
            }
            FwupRequest::CancelUpdate => {
                UpdateAgentContext::generate_cancel_update(session, clock_ms, payload)
            }
        }?;

        Ok(PLDM_MSG_OFFSET + bytes)
    }

    pub fn session_status(&self, eid: u8) -> SessionStatus {
        match self.sessions.find(eid) {
            Some(session) => SessionStatus {
                state: session.state(),
                completion_code: session.completion_code,
                previous_command: session.command,
            },
            None => SessionStatus {
                state: FirmwareDeviceState::Idle,
                completion_code: PldmCompletionCode::Success as u8,
                previous_command: 0,
            },
        }
    }

    /// Advances the engine clock and expires outstanding requests. A timed
    /// out download-phase exchange aborts the component and parks the
    /// session in ReadyXfer for the agent to retry; a control command
    /// timeout tears the session down.
    pub fn tick(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
        let timeouts = self.timeouts;

        for session in self.sessions.iter_mut() {
            let Some(outstanding) = session.outstanding else {
                continue;
            };
            let limit = match outstanding.command {
                FwUpdateCmd::RequestFirmwareData
                | FwUpdateCmd::GetPackageData
                | FwUpdateCmd::GetDeviceMetaData => timeouts.t_download,
                _ => timeouts.t_idle,
            };
            if now_ms.saturating_sub(outstanding.sent_at_ms) < limit {
                continue;
            }

            log::warn!(
                "eid {}: {:?} timed out after {limit} ms",
                session.peer_eid,
                outstanding.command
            );
            session.outstanding = None;

            match session.state() {
                FirmwareDeviceState::Download
                | FirmwareDeviceState::Verify
                | FirmwareDeviceState::Apply => {
                    session.download = None;
                    session.record_completion(FwUpdateCompletionCode::RetryRequestFwData as u8);
                    let _ = session.switch_state(FirmwareDeviceState::ReadyXfer);
                }
                FirmwareDeviceState::Idle => {
                    session.record_completion(FwUpdateCompletionCode::RetryRequestUpdate as u8);
                }
                state => {
                    let reason = match state {
                        FirmwareDeviceState::LearnComponents => {
                            GetStatusReasonCode::LearnComponentTimeout
                        }
                        _ => GetStatusReasonCode::ReadyXferTimeout,
                    };
                    session.record_completion(FwUpdateCompletionCode::RetryRequestUpdate as u8);
                    session.reset_update_context(reason);
                }
            }
        }
    }

    /// Transport-level loss of a peer destroys its session.
    pub fn peer_disconnected(&mut self, eid: u8) {
        self.sessions.end(eid, GetStatusReasonCode::Initialization);
    }

    fn abort_component(&mut self, eid: u8) {
        if let Some(session) = self.sessions.find_mut(eid) {
            session.download = None;
            session.record_completion(FwUpdateCompletionCode::RetryRequestFwData as u8);
            if matches!(
                session.state(),
                FirmwareDeviceState::Download
                    | FirmwareDeviceState::Verify
                    | FirmwareDeviceState::Apply
            ) {
                let _ = session.switch_state(FirmwareDeviceState::ReadyXfer);
            }
        }
    }
}

fn teardown_reason(last_cmd: u8) -> GetStatusReasonCode {
    match FwUpdateCmd::try_from(last_cmd) {
        Ok(FwUpdateCmd::CancelUpdate) => GetStatusReasonCode::CancelUpdate,
        Ok(FwUpdateCmd::ActivateFirmware) => GetStatusReasonCode::ActivateFw,
        _ => GetStatusReasonCode::Initialization,
    }
}
