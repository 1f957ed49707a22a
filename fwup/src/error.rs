// Licensed under the Apache-2.0 license

use pldm_protocol::base::PldmCompletionCode;
use pldm_protocol::codec::CodecError;
use pldm_protocol::error::{FramingError, ProtocolError};
use pldm_protocol::firmware_update::FwUpdateCompletionCode;

/// Engine-level failures. Request-side errors are translated into PLDM
/// completion-code responses by the dispatcher; response-side errors
/// terminate the affected component or session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwupError {
    // Encoding / decoding
    Codec(CodecError),
    Framing(FramingError),
    Protocol(ProtocolError),
    InvalidPldmType,
    UnsupportedCommand,

    // Protocol state
    InvalidStateForCommand,
    AlreadyInUpdateMode,
    NotInUpdateMode,
    UnexpectedInstanceId,
    UnexpectedTransferHandle,

    // Storage
    FlashOutOfRange,
    FlashIoError,
    RegionNotMapped,

    // Operational
    Timeout,
    RetryRequestFwData,
    VerifyFailed,
    ApplyFailed,
    /// The peer answered with a non-success completion code.
    PeerFailure(u8),

    SessionTableFull,
    NoSession,
    /// A request is already awaiting its response on this session.
    RequestInFlight,
}

impl From<CodecError> for FwupError {
    fn from(err: CodecError) -> Self {
        FwupError::Codec(err)
    }
}

impl From<FramingError> for FwupError {
    fn from(err: FramingError) -> Self {
        FwupError::Framing(err)
    }
}

impl From<ProtocolError> for FwupError {
    fn from(err: ProtocolError) -> Self {
        FwupError::Protocol(err)
    }
}

impl FwupError {
    /// PLDM completion code reported to the peer when this error aborts an
    /// inbound request.
    pub fn completion_code(&self) -> u8 {
        match self {
            FwupError::Codec(CodecError::Unsupported) => {
                PldmCompletionCode::UnsupportedPldmCmd as u8
            }
            FwupError::Codec(_) | FwupError::Framing(_) => {
                PldmCompletionCode::InvalidLength as u8
            }
            FwupError::Protocol(_) => PldmCompletionCode::InvalidData as u8,
            FwupError::InvalidPldmType => PldmCompletionCode::InvalidPldmType as u8,
            FwupError::UnsupportedCommand => PldmCompletionCode::UnsupportedPldmCmd as u8,
            FwupError::InvalidStateForCommand => {
                FwUpdateCompletionCode::InvalidStateForCommand as u8
            }
            FwupError::AlreadyInUpdateMode => FwUpdateCompletionCode::AlreadyInUpdateMode as u8,
            FwupError::NotInUpdateMode | FwupError::NoSession => {
                FwUpdateCompletionCode::NotInUpdateMode as u8
            }
            FwupError::UnexpectedTransferHandle => {
                FwUpdateCompletionCode::InvalidTransferHandle as u8
            }
            FwupError::FlashOutOfRange | FwupError::RegionNotMapped => {
                FwUpdateCompletionCode::DataOutOfRange as u8
            }
            FwupError::RetryRequestFwData => FwUpdateCompletionCode::RetryRequestFwData as u8,
            _ => PldmCompletionCode::Error as u8,
        }
    }

    /// Whether a response-side occurrence aborts only the in-flight
    /// component rather than the whole session.
    pub fn is_component_fatal_only(&self) -> bool {
        matches!(
            self,
            FwupError::FlashOutOfRange | FwupError::FlashIoError | FwupError::RetryRequestFwData
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_code_mapping() {
        assert_eq!(
            FwupError::AlreadyInUpdateMode.completion_code(),
            FwUpdateCompletionCode::AlreadyInUpdateMode as u8
        );
        assert_eq!(
            FwupError::InvalidStateForCommand.completion_code(),
            FwUpdateCompletionCode::InvalidStateForCommand as u8
        );
        assert_eq!(
            FwupError::Codec(CodecError::MsgTooShort).completion_code(),
            PldmCompletionCode::InvalidLength as u8
        );
    }
}
