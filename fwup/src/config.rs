// Licensed under the Apache-2.0 license

//! Protocol maxima and timer defaults.

use pldm_protocol::messages::transfer::MAX_TRANSFER_SIZE;

/// Peers that can hold a protocol context at once.
pub const MAX_SESSIONS: usize = 4;

/// Largest per-message payload this device offers during negotiation.
pub const FD_MAX_TRANSFER_SIZE: u32 = MAX_TRANSFER_SIZE as u32;

/// Concurrency budget this device declares in RequestUpdate.
pub const FD_MAX_OUTSTANDING_TRANSFER_REQ: u8 = 1;

/// Wait bound on control command responses, milliseconds.
pub const DEFAULT_T_IDLE_MS: u64 = 5_000;

/// Wait bound on firmware data pacing, milliseconds.
pub const DEFAULT_T_DOWNLOAD_MS: u64 = 90_000;

/// Per-command response deadlines for locally issued requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub t_idle: u64,
    pub t_download: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            t_idle: DEFAULT_T_IDLE_MS,
            t_download: DEFAULT_T_DOWNLOAD_MS,
        }
    }
}
