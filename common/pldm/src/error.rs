// Licensed under the Apache-2.0 license

/// Value-level protocol violations: a wire byte that does not name a legal
/// enum member. Distinct from [`crate::codec::CodecError`], which covers
/// structural problems (truncation, bad lengths).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    InvalidMsgType,
    InvalidPldmType,
    InvalidCommand,
    InvalidCompletionCode,
    InvalidTransferOperationFlag,
    InvalidTransferRespFlag,
    InvalidVersionStringKind,
    InvalidVersionStringLength,
    InvalidFdState,
    InvalidDescriptorType,
    InvalidDescriptorLength,
    InvalidDescriptorCount,
    InvalidComponentClassification,
    InvalidComponentResponseCode,
    InvalidComponentCompatibilityResponseCode,
    InvalidTransferResult,
    InvalidVerifyResult,
    InvalidApplyResult,
    InvalidReasonCode,
    InvalidAuxStateStatus,
    InvalidData,
}

/// MCTP binding violations on the single message-type byte this crate owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    PayloadTooShort,
    NotPldm,
}
