// Licensed under the Apache-2.0 license

//! Per-peer instance-ID allocation and request/response pairing. Each
//! session owns one allocator; the counter is a 5-bit tag that wraps modulo
//! 32 on every outbound request.

use crate::error::FwupError;
use pldm_protocol::base::{InstanceId, INSTANCE_ID_COUNT};
use pldm_protocol::firmware_update::FwUpdateCmd;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstanceIdAllocator {
    next: u8,
}

impl InstanceIdAllocator {
    pub fn new() -> Self {
        InstanceIdAllocator { next: 0 }
    }

    /// Returns the current tag and advances the counter.
    pub fn allocate(&mut self) -> InstanceId {
        let id = self.next;
        self.next = (self.next + 1) % INSTANCE_ID_COUNT;
        id
    }
}

/// The single request this endpoint is waiting on for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutstandingRequest {
    pub instance_id: InstanceId,
    pub command: FwUpdateCmd,
    pub sent_at_ms: u64,
    /// Result byte carried by completion-class requests (TransferComplete,
    /// VerifyComplete, ApplyComplete); drives the post-response transition.
    pub arg: u8,
}

impl OutstandingRequest {
    /// Pairs an inbound response against this request. A mismatched
    /// instance ID or command is the caller's cue to drop the message.
    pub fn matches(&self, instance_id: InstanceId, command: FwUpdateCmd) -> Result<(), FwupError> {
        if self.instance_id != instance_id || self.command != command {
            log::warn!(
                "dropping response: instance id {} cmd {:?}, expected {} {:?}",
                instance_id,
                command,
                self.instance_id,
                self.command
            );
            return Err(FwupError::UnexpectedInstanceId);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_wraps_modulo_32() {
        let mut allocator = InstanceIdAllocator::new();
        for expected in 0..INSTANCE_ID_COUNT {
            assert_eq!(allocator.allocate(), expected);
        }
        assert_eq!(allocator.allocate(), 0);
    }

    #[test]
    fn test_outstanding_request_pairing() {
        let req = OutstandingRequest {
            instance_id: 5,
            command: FwUpdateCmd::QueryDeviceIdentifiers,
            sent_at_ms: 0,
            arg: 0,
        };
        assert!(req.matches(5, FwUpdateCmd::QueryDeviceIdentifiers).is_ok());
        assert_eq!(
            req.matches(6, FwUpdateCmd::QueryDeviceIdentifiers),
            Err(FwupError::UnexpectedInstanceId)
        );
        assert_eq!(
            req.matches(5, FwUpdateCmd::GetFirmwareParameters),
            Err(FwupError::UnexpectedInstanceId)
        );
    }
}
