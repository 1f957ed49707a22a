// Licensed under the Apache-2.0 license

//! The FWUP state graphs as data. Three tables drive the engine: which
//! inbound commands a firmware device accepts per state, which requests an
//! update agent may issue per mirrored state, and which state transitions
//! are legal at all. The dispatcher consults the acceptance tables before
//! any handler runs; `Session::switch_state` validates every transition
//! against the successor table.

use pldm_protocol::firmware_update::{FirmwareDeviceState, FwUpdateCmd};

/// Which role a session plays for its peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRole {
    FirmwareDevice,
    UpdateAgent,
}

use FirmwareDeviceState::*;
use FwUpdateCmd::*;

/// Inbound requests the FD services per state. GetStatus is accepted
/// everywhere; CancelUpdate everywhere outside Idle.
const FD_ACCEPTS: &[(FirmwareDeviceState, FwUpdateCmd)] = &[
    (Idle, QueryDeviceIdentifiers),
    (Idle, GetFirmwareParameters),
    (Idle, RequestUpdate),
    (LearnComponents, PassComponentTable),
    (LearnComponents, GetDeviceMetaData),
    (LearnComponents, CancelUpdate),
    (ReadyXfer, UpdateComponent),
    (ReadyXfer, CancelUpdate),
    (Download, CancelUpdateComponent),
    (Download, CancelUpdate),
    (Verify, CancelUpdateComponent),
    (Verify, CancelUpdate),
    (Apply, CancelUpdateComponent),
    (Apply, CancelUpdate),
    (Activate, ActivateFirmware),
    (Activate, CancelUpdate),
];

/// Requests the FD itself originates per state.
const FD_ISSUES: &[(FirmwareDeviceState, FwUpdateCmd)] = &[
    (LearnComponents, GetPackageData),
    (Download, RequestFirmwareData),
    (Download, TransferComplete),
    (Verify, VerifyComplete),
    (Apply, ApplyComplete),
];

/// Requests the UA may issue while its mirror of the peer sits in a state.
const UA_ISSUES: &[(FirmwareDeviceState, FwUpdateCmd)] = &[
    (Idle, QueryDeviceIdentifiers),
    (Idle, GetFirmwareParameters),
    (Idle, RequestUpdate),
    (LearnComponents, PassComponentTable),
    (LearnComponents, GetDeviceMetaData),
    (LearnComponents, CancelUpdate),
    (ReadyXfer, UpdateComponent),
    (ReadyXfer, ActivateFirmware),
    (ReadyXfer, CancelUpdate),
    (Download, CancelUpdateComponent),
    (Download, CancelUpdate),
    (Verify, CancelUpdateComponent),
    (Verify, CancelUpdate),
    (Apply, CancelUpdateComponent),
    (Apply, CancelUpdate),
    (Activate, ActivateFirmware),
    (Activate, CancelUpdate),
];

/// Legal state successors, shared by both roles.
const TRANSITIONS: &[(FirmwareDeviceState, FirmwareDeviceState)] = &[
    (Idle, LearnComponents),
    (LearnComponents, LearnComponents),
    (LearnComponents, ReadyXfer),
    (LearnComponents, Idle),
    (ReadyXfer, Download),
    (ReadyXfer, Idle),
    (Download, Download),
    (Download, Verify),
    (Download, ReadyXfer),
    (Download, Idle),
    (Verify, Apply),
    (Verify, ReadyXfer),
    (Verify, Idle),
    (Apply, ReadyXfer),
    (Apply, Activate),
    (Apply, Idle),
    (Activate, Idle),
];

pub fn fd_accepts(state: FirmwareDeviceState, cmd: FwUpdateCmd) -> bool {
    cmd == GetStatus || FD_ACCEPTS.contains(&(state, cmd))
}

pub fn fd_may_issue(state: FirmwareDeviceState, cmd: FwUpdateCmd) -> bool {
    FD_ISSUES.contains(&(state, cmd))
}

pub fn ua_may_issue(state: FirmwareDeviceState, cmd: FwUpdateCmd) -> bool {
    cmd == GetStatus || UA_ISSUES.contains(&(state, cmd))
}

pub fn transition_allowed(from: FirmwareDeviceState, to: FirmwareDeviceState) -> bool {
    from == to || TRANSITIONS.contains(&(from, to))
}

/// Commands meaningful only inside an update session. The inventory pair
/// and GetStatus work without one.
pub fn requires_update_mode(cmd: FwUpdateCmd) -> bool {
    !matches!(
        cmd,
        QueryDeviceIdentifiers | GetFirmwareParameters | GetStatus | RequestUpdate
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_accepts_inventory_only() {
        assert!(fd_accepts(Idle, QueryDeviceIdentifiers));
        assert!(fd_accepts(Idle, GetFirmwareParameters));
        assert!(fd_accepts(Idle, RequestUpdate));
        assert!(fd_accepts(Idle, GetStatus));
        assert!(!fd_accepts(Idle, UpdateComponent));
        assert!(!fd_accepts(Idle, PassComponentTable));
        assert!(!fd_accepts(Idle, CancelUpdate));
    }

    #[test]
    fn test_cancel_accepted_outside_idle() {
        for state in [LearnComponents, ReadyXfer, Download, Verify, Apply, Activate] {
            assert!(fd_accepts(state, CancelUpdate), "{state:?}");
        }
    }

    #[test]
    fn test_get_status_accepted_everywhere() {
        for state in [Idle, LearnComponents, ReadyXfer, Download, Verify, Apply, Activate] {
            assert!(fd_accepts(state, GetStatus), "{state:?}");
        }
    }

    #[test]
    fn test_rejected_pairs_leave_no_successor() {
        assert!(!fd_accepts(Download, RequestUpdate));
        assert!(!fd_accepts(Verify, UpdateComponent));
        assert!(!fd_accepts(Activate, PassComponentTable));
    }

    #[test]
    fn test_transition_table() {
        assert!(transition_allowed(Idle, LearnComponents));
        assert!(transition_allowed(Download, Verify));
        assert!(transition_allowed(Apply, Activate));
        assert!(transition_allowed(Activate, Idle));
        assert!(!transition_allowed(Idle, Download));
        assert!(!transition_allowed(Verify, Download));
    }

    #[test]
    fn test_fd_issue_table() {
        assert!(fd_may_issue(LearnComponents, GetPackageData));
        assert!(fd_may_issue(Download, RequestFirmwareData));
        assert!(!fd_may_issue(Idle, RequestFirmwareData));
        assert!(!fd_may_issue(Verify, ApplyComplete));
    }
}
