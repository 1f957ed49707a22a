// Licensed under the Apache-2.0 license

//! Per-peer protocol context and its fixed-capacity store. A record is
//! created lazily on first contact with a peer (it owns the instance-ID
//! counter even outside update mode) and enters update mode when this
//! endpoint accepts or emits RequestUpdate. Teardown resets the update
//! context in place.

use crate::config::MAX_SESSIONS;
use crate::error::FwupError;
use crate::instance_id::{InstanceIdAllocator, OutstandingRequest};
use crate::multipart::MultipartTransfer;
use crate::state_machine::{transition_allowed, UpdateRole};
use pldm_protocol::base::PldmCompletionCode;
use pldm_protocol::firmware_update::{FirmwareDeviceState, VersionString};
use pldm_protocol::messages::status::GetStatusReasonCode;

/// The component currently moving through Download/Verify/Apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentDownload {
    pub classification: u16,
    pub identifier: u16,
    pub classification_index: u8,
    pub image_size: u32,
    pub offset: u32,
}

/// One peer's FWUP session.
#[derive(Debug, Clone)]
pub struct FwupSession {
    pub peer_eid: u8,
    role: Option<UpdateRole>,
    state: FirmwareDeviceState,
    previous_state: FirmwareDeviceState,
    pub command: u8,
    pub previous_command: u8,
    pub completion_code: u8,
    pub previous_completion_code: u8,
    pub update_mode: bool,
    pub max_transfer_size: u32,
    pub max_outstanding_transfer_req: u8,
    pub num_components: u16,
    pub components_applied: u16,
    pub get_pkg_data_cmd: bool,
    pub fd_meta_data_len: u16,
    pub comp_img_set_ver: VersionString,
    pub reason: Option<GetStatusReasonCode>,
    pub download: Option<ComponentDownload>,
    /// Set while the PassComponentTable carrying the END flag is in flight.
    pub pending_last_component: bool,
    pub pkg_data_xfer: MultipartTransfer,
    pub meta_data_xfer: MultipartTransfer,
    pub instance_ids: InstanceIdAllocator,
    pub outstanding: Option<OutstandingRequest>,
}

impl FwupSession {
    pub fn new(peer_eid: u8) -> Self {
        FwupSession {
            peer_eid,
            role: None,
            state: FirmwareDeviceState::Idle,
            previous_state: FirmwareDeviceState::Idle,
            command: 0,
            previous_command: 0,
            completion_code: PldmCompletionCode::Success as u8,
            previous_completion_code: PldmCompletionCode::Success as u8,
            update_mode: false,
            max_transfer_size: 0,
            max_outstanding_transfer_req: 0,
            num_components: 0,
            components_applied: 0,
            get_pkg_data_cmd: false,
            fd_meta_data_len: 0,
            comp_img_set_ver: VersionString::default(),
            reason: Some(GetStatusReasonCode::Initialization),
            download: None,
            pending_last_component: false,
            pkg_data_xfer: MultipartTransfer::new(),
            meta_data_xfer: MultipartTransfer::new(),
            instance_ids: InstanceIdAllocator::new(),
            outstanding: None,
        }
    }

    pub fn state(&self) -> FirmwareDeviceState {
        self.state
    }

    pub fn previous_state(&self) -> FirmwareDeviceState {
        self.previous_state
    }

    pub fn role(&self) -> Option<UpdateRole> {
        self.role
    }

    /// Enters update mode. Fails while a session is already established.
    pub(crate) fn begin_update(&mut self, role: UpdateRole) -> Result<(), FwupError> {
        if self.update_mode {
            return Err(FwupError::AlreadyInUpdateMode);
        }
        self.role = Some(role);
        self.update_mode = true;
        self.components_applied = 0;
        self.reason = None;
        Ok(())
    }

    /// Moves to `next`, keeping the previous state. Every transition is
    /// checked against the legal-successor table.
    pub(crate) fn switch_state(&mut self, next: FirmwareDeviceState) -> Result<(), FwupError> {
        if !transition_allowed(self.state, next) {
            return Err(FwupError::InvalidStateForCommand);
        }
        if self.state != next {
            log::debug!(
                "eid {}: fwup state {:?} -> {:?}",
                self.peer_eid,
                self.state,
                next
            );
            self.previous_state = self.state;
            self.state = next;
        }
        Ok(())
    }

    pub(crate) fn record_command(&mut self, command: u8) {
        self.previous_command = self.command;
        self.command = command;
    }

    pub(crate) fn record_completion(&mut self, completion_code: u8) {
        self.previous_completion_code = self.completion_code;
        self.completion_code = completion_code;
    }

    /// Clears the update context: session variables, transfers, the
    /// in-flight request. Status history and the idle reason survive for
    /// GetStatus; the instance-ID counter restarts with the session.
    pub(crate) fn reset_update_context(&mut self, reason: GetStatusReasonCode) {
        self.role = None;
        self.previous_state = self.state;
        self.state = FirmwareDeviceState::Idle;
        self.update_mode = false;
        self.max_transfer_size = 0;
        self.max_outstanding_transfer_req = 0;
        self.num_components = 0;
        self.components_applied = 0;
        self.get_pkg_data_cmd = false;
        self.fd_meta_data_len = 0;
        self.comp_img_set_ver = VersionString::default();
        self.reason = Some(reason);
        self.download = None;
        self.pending_last_component = false;
        self.pkg_data_xfer.restart();
        self.meta_data_xfer.restart();
        self.outstanding = None;
    }
}

/// Fixed-capacity `eid -> session` map.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: [Option<FwupSession>; MAX_SESSIONS],
}

impl SessionStore {
    pub fn new() -> Self {
        SessionStore::default()
    }

    /// The record for `eid`, created on first contact.
    pub fn peer(&mut self, eid: u8) -> Result<&mut FwupSession, FwupError> {
        let slot = self
            .sessions
            .iter()
            .position(|s| s.as_ref().is_some_and(|s| s.peer_eid == eid));
        let index = match slot {
            Some(index) => index,
            None => {
                let free = self
                    .sessions
                    .iter()
                    .position(Option::is_none)
                    .ok_or(FwupError::SessionTableFull)?;
                self.sessions[free] = Some(FwupSession::new(eid));
                free
            }
        };
        self.sessions[index].as_mut().ok_or(FwupError::NoSession)
    }

    pub fn find(&self, eid: u8) -> Option<&FwupSession> {
        self.sessions
            .iter()
            .flatten()
            .find(|s| s.peer_eid == eid)
    }

    pub fn find_mut(&mut self, eid: u8) -> Option<&mut FwupSession> {
        self.sessions
            .iter_mut()
            .flatten()
            .find(|s| s.peer_eid == eid)
    }

    /// Creates the update session for `eid`. Fails with
    /// `AlreadyInUpdateMode` while one is established.
    pub fn begin(&mut self, eid: u8, role: UpdateRole) -> Result<&mut FwupSession, FwupError> {
        let session = self.peer(eid)?;
        session.begin_update(role)?;
        Ok(session)
    }

    /// Tears the update session down. Idempotent; the peer record and its
    /// status history survive.
    pub fn end(&mut self, eid: u8, reason: GetStatusReasonCode) {
        if let Some(session) = self.find_mut(eid) {
            if session.update_mode {
                log::info!("eid {eid}: fwup session ended ({reason:?})");
            }
            session.reset_update_context(reason);
        }
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FwupSession> {
        self.sessions.iter_mut().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_twice_fails() {
        let mut store = SessionStore::new();
        store.begin(8, UpdateRole::FirmwareDevice).unwrap();
        assert_eq!(
            store.begin(8, UpdateRole::FirmwareDevice).err(),
            Some(FwupError::AlreadyInUpdateMode)
        );
    }

    #[test]
    fn test_end_is_idempotent() {
        let mut store = SessionStore::new();
        store.begin(8, UpdateRole::FirmwareDevice).unwrap();
        store.end(8, GetStatusReasonCode::CancelUpdate);
        store.end(8, GetStatusReasonCode::CancelUpdate);
        let session = store.find(8).unwrap();
        assert!(!session.update_mode);
        assert_eq!(session.state(), FirmwareDeviceState::Idle);
        // A new session can begin after teardown.
        store.begin(8, UpdateRole::UpdateAgent).unwrap();
    }

    #[test]
    fn test_store_capacity() {
        let mut store = SessionStore::new();
        for eid in 0..MAX_SESSIONS as u8 {
            store.peer(eid).unwrap();
        }
        assert_eq!(store.peer(0x40).err(), Some(FwupError::SessionTableFull));
        // Existing peers still resolve.
        assert!(store.peer(0).is_ok());
    }

    #[test]
    fn test_switch_state_enforces_table() {
        let mut session = FwupSession::new(1);
        assert_eq!(
            session.switch_state(FirmwareDeviceState::Download),
            Err(FwupError::InvalidStateForCommand)
        );
        session.switch_state(FirmwareDeviceState::LearnComponents).unwrap();
        assert_eq!(session.previous_state(), FirmwareDeviceState::Idle);
        session.switch_state(FirmwareDeviceState::ReadyXfer).unwrap();
        assert_eq!(session.state(), FirmwareDeviceState::ReadyXfer);
    }
}
