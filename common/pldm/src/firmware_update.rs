// Licensed under the Apache-2.0 license

//! DSP0267 firmware update vocabulary: command codes, completion codes, the
//! firmware device state set, device descriptors, version strings and the
//! component parameter table.

use crate::codec::{CodecError, PldmCodec};
use crate::error::ProtocolError;
use bitfield::bitfield;
use core::convert::TryFrom;
use zerocopy::{FromBytes, Immutable, IntoBytes};

/// Minimum transfer unit every implementation must support.
pub const PLDM_FWUP_BASELINE_TRANSFER_SIZE: usize = 32;
pub const VERSION_STR_MAX_LEN: usize = 255;
pub const RELEASE_DATE_LEN: usize = 8;
pub const DESCRIPTOR_DATA_MAX_LEN: usize = 64;
pub const MAX_DESCRIPTOR_COUNT: usize = 8;
pub const MAX_COMPONENT_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FwUpdateCmd {
    QueryDeviceIdentifiers = 0x01,
    GetFirmwareParameters = 0x02,
    RequestUpdate = 0x10,
    GetPackageData = 0x11,
    GetDeviceMetaData = 0x12,
    PassComponentTable = 0x13,
    UpdateComponent = 0x14,
    RequestFirmwareData = 0x15,
    TransferComplete = 0x16,
    VerifyComplete = 0x17,
    ApplyComplete = 0x18,
    ActivateFirmware = 0x1A,
    GetStatus = 0x1B,
    CancelUpdateComponent = 0x1C,
    CancelUpdate = 0x1D,
}

impl TryFrom<u8> for FwUpdateCmd {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x01 => Ok(FwUpdateCmd::QueryDeviceIdentifiers),
            0x02 => Ok(FwUpdateCmd::GetFirmwareParameters),
            0x10 => Ok(FwUpdateCmd::RequestUpdate),
            0x11 => Ok(FwUpdateCmd::GetPackageData),
            0x12 => Ok(FwUpdateCmd::GetDeviceMetaData),
            0x13 => Ok(FwUpdateCmd::PassComponentTable),
            0x14 => Ok(FwUpdateCmd::UpdateComponent),
            0x15 => Ok(FwUpdateCmd::RequestFirmwareData),
            0x16 => Ok(FwUpdateCmd::TransferComplete),
            0x17 => Ok(FwUpdateCmd::VerifyComplete),
            0x18 => Ok(FwUpdateCmd::ApplyComplete),
            0x1A => Ok(FwUpdateCmd::ActivateFirmware),
            0x1B => Ok(FwUpdateCmd::GetStatus),
            0x1C => Ok(FwUpdateCmd::CancelUpdateComponent),
            0x1D => Ok(FwUpdateCmd::CancelUpdate),
            _ => Err(ProtocolError::InvalidCommand),
        }
    }
}

/// Completion codes specific to the firmware update type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FwUpdateCompletionCode {
    NotInUpdateMode = 0x80,
    AlreadyInUpdateMode = 0x81,
    DataOutOfRange = 0x82,
    InvalidTransferLength = 0x83,
    InvalidStateForCommand = 0x84,
    IncompleteUpdate = 0x85,
    BusyInBackground = 0x86,
    CancelPending = 0x87,
    CommandNotExpected = 0x88,
    RetryRequestFwData = 0x89,
    UnableToInitiateUpdate = 0x8A,
    ActivationNotRequired = 0x8B,
    SelfContainedActivationNotPermitted = 0x8C,
    NoDeviceMetadata = 0x8D,
    RetryRequestUpdate = 0x8E,
    NoPackageData = 0x8F,
    InvalidTransferHandle = 0x90,
    InvalidTransferOperationFlag = 0x91,
    ActivatePendingImageNotPermitted = 0x92,
    PackageDataError = 0x93,
}

impl TryFrom<u8> for FwUpdateCompletionCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x80 => Ok(FwUpdateCompletionCode::NotInUpdateMode),
            0x81 => Ok(FwUpdateCompletionCode::AlreadyInUpdateMode),
            0x82 => Ok(FwUpdateCompletionCode::DataOutOfRange),
            0x83 => Ok(FwUpdateCompletionCode::InvalidTransferLength),
            0x84 => Ok(FwUpdateCompletionCode::InvalidStateForCommand),
            0x85 => Ok(FwUpdateCompletionCode::IncompleteUpdate),
            0x86 => Ok(FwUpdateCompletionCode::BusyInBackground),
            0x87 => Ok(FwUpdateCompletionCode::CancelPending),
            0x88 => Ok(FwUpdateCompletionCode::CommandNotExpected),
            0x89 => Ok(FwUpdateCompletionCode::RetryRequestFwData),
            0x8A => Ok(FwUpdateCompletionCode::UnableToInitiateUpdate),
            0x8B => Ok(FwUpdateCompletionCode::ActivationNotRequired),
            0x8C => Ok(FwUpdateCompletionCode::SelfContainedActivationNotPermitted),
            0x8D => Ok(FwUpdateCompletionCode::NoDeviceMetadata),
            0x8E => Ok(FwUpdateCompletionCode::RetryRequestUpdate),
            0x8F => Ok(FwUpdateCompletionCode::NoPackageData),
            0x90 => Ok(FwUpdateCompletionCode::InvalidTransferHandle),
            0x91 => Ok(FwUpdateCompletionCode::InvalidTransferOperationFlag),
            0x92 => Ok(FwUpdateCompletionCode::ActivatePendingImageNotPermitted),
            0x93 => Ok(FwUpdateCompletionCode::PackageDataError),
            _ => Err(ProtocolError::InvalidCompletionCode),
        }
    }
}

/// Firmware device state set; also used by the update agent to mirror the
/// state the peer device is expected to occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FirmwareDeviceState {
    Idle = 0,
    LearnComponents = 1,
    ReadyXfer = 2,
    Download = 3,
    Verify = 4,
    Apply = 5,
    Activate = 6,
}

impl TryFrom<u8> for FirmwareDeviceState {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(FirmwareDeviceState::Idle),
            1 => Ok(FirmwareDeviceState::LearnComponents),
            2 => Ok(FirmwareDeviceState::ReadyXfer),
            3 => Ok(FirmwareDeviceState::Download),
            4 => Ok(FirmwareDeviceState::Verify),
            5 => Ok(FirmwareDeviceState::Apply),
            6 => Ok(FirmwareDeviceState::Activate),
            _ => Err(ProtocolError::InvalidFdState),
        }
    }
}

bitfield! {
    #[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq, Eq, Default)]
    pub struct UpdateOptionFlags(u32);
    impl Debug;
    pub u32, reserved, _: 31, 3;
    pub u32, svn_delayed_update, set_svn_delayed_update: 2;
    pub u32, component_opaque_data, set_component_opaque_data: 1;
    pub u32, request_force_update, set_request_force_update: 0;
}

bitfield! {
    #[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq, Eq, Default)]
    pub struct FdCapabilitiesDuringUpdate(u32);
    impl Debug;
    pub u32, reserved, _: 31, 10;
    pub u32, svn_update_support, set_svn_update_support: 9;
    pub u32, downgrade_restriction, set_downgrade_restriction: 8;
    pub u32, update_mode_restriction, set_update_mode_restriction: 7, 4;
    pub u32, partial_updates, set_partial_updates: 3;
    pub u32, host_func_reduced, set_host_func_reduced: 2;
    pub u32, update_failure_retry, set_update_failure_retry: 1;
    pub u32, update_failure_recovery, set_update_failure_recovery: 0;
}

bitfield! {
    #[derive(Clone, Copy, FromBytes, IntoBytes, Immutable, PartialEq, Eq, Default)]
    pub struct ComponentActivationMethods(u16);
    impl Debug;
    pub u16, reserved, _: 15, 8;
    pub u16, activate_pending_comp_image_set, set_activate_pending_comp_image_set: 7;
    pub u16, activate_pending_image, set_activate_pending_image: 6;
    pub u16, ac_power_cycle, set_ac_power_cycle: 5;
    pub u16, dc_power_cycle, set_dc_power_cycle: 4;
    pub u16, system_reboot, set_system_reboot: 3;
    pub u16, medium_specific_reset, set_medium_specific_reset: 2;
    pub u16, self_contained, set_self_contained: 1;
    pub u16, automatic, set_automatic: 0;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VersionStringKind {
    Unspecified = 0,
    Ascii = 1,
    Utf8 = 2,
    Utf16 = 3,
    Utf16Le = 4,
    Utf16Be = 5,
}

impl TryFrom<u8> for VersionStringKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(VersionStringKind::Unspecified),
            1 => Ok(VersionStringKind::Ascii),
            2 => Ok(VersionStringKind::Utf8),
            3 => Ok(VersionStringKind::Utf16),
            4 => Ok(VersionStringKind::Utf16Le),
            5 => Ok(VersionStringKind::Utf16Be),
            _ => Err(ProtocolError::InvalidVersionStringKind),
        }
    }
}

/// A version identifier as carried on the wire: type tag, length, and up to
/// 255 bytes of string data in a fixed backing array.
#[derive(Clone, Copy)]
pub struct VersionString {
    pub kind: u8,
    pub len: u8,
    pub bytes: [u8; VERSION_STR_MAX_LEN],
}

impl VersionString {
    pub fn new(kind: VersionStringKind, version: &str) -> Result<Self, ProtocolError> {
        if version.len() > VERSION_STR_MAX_LEN {
            return Err(ProtocolError::InvalidVersionStringLength);
        }
        let mut bytes = [0u8; VERSION_STR_MAX_LEN];
        bytes[..version.len()].copy_from_slice(version.as_bytes());
        Ok(VersionString {
            kind: kind as u8,
            len: version.len() as u8,
            bytes,
        })
    }

    pub fn from_raw(kind: u8, data: &[u8]) -> Result<Self, ProtocolError> {
        if data.len() > VERSION_STR_MAX_LEN {
            return Err(ProtocolError::InvalidVersionStringLength);
        }
        let mut bytes = [0u8; VERSION_STR_MAX_LEN];
        bytes[..data.len()].copy_from_slice(data);
        Ok(VersionString {
            kind,
            len: data.len() as u8,
            bytes,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl Default for VersionString {
    fn default() -> Self {
        VersionString {
            kind: VersionStringKind::Unspecified as u8,
            len: 0,
            bytes: [0u8; VERSION_STR_MAX_LEN],
        }
    }
}

impl PartialEq for VersionString {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.as_bytes() == other.as_bytes()
    }
}

impl core::fmt::Debug for VersionString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VersionString")
            .field("kind", &self.kind)
            .field("len", &self.len)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DescriptorType {
    PciVendorId = 0x0000,
    IanaEnterpriseId = 0x0001,
    Uuid = 0x0002,
    PnpVendorId = 0x0003,
    AcpiVendorId = 0x0004,
    IeeeAssignedCompanyId = 0x0005,
    ScsiVendorId = 0x0006,
    PciDeviceId = 0x0100,
    PciSubsystemVendorId = 0x0101,
    PciSubsystemId = 0x0102,
    PciRevisionId = 0x0103,
    PnpProductIdentifier = 0x0104,
    AcpiProductIdentifier = 0x0105,
    AsciiModelNumberLongString = 0x0106,
    AsciiModelNumberShortString = 0x0107,
    ScsiProductId = 0x0108,
    UbmControllerDeviceCode = 0x0109,
    VendorDefined = 0xFFFF,
}

impl TryFrom<u16> for DescriptorType {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, ProtocolError> {
        match value {
            0x0000 => Ok(DescriptorType::PciVendorId),
            0x0001 => Ok(DescriptorType::IanaEnterpriseId),
            0x0002 => Ok(DescriptorType::Uuid),
            0x0003 => Ok(DescriptorType::PnpVendorId),
            0x0004 => Ok(DescriptorType::AcpiVendorId),
            0x0005 => Ok(DescriptorType::IeeeAssignedCompanyId),
            0x0006 => Ok(DescriptorType::ScsiVendorId),
            0x0100 => Ok(DescriptorType::PciDeviceId),
            0x0101 => Ok(DescriptorType::PciSubsystemVendorId),
            0x0102 => Ok(DescriptorType::PciSubsystemId),
            0x0103 => Ok(DescriptorType::PciRevisionId),
            0x0104 => Ok(DescriptorType::PnpProductIdentifier),
            0x0105 => Ok(DescriptorType::AcpiProductIdentifier),
            0x0106 => Ok(DescriptorType::AsciiModelNumberLongString),
            0x0107 => Ok(DescriptorType::AsciiModelNumberShortString),
            0x0108 => Ok(DescriptorType::ScsiProductId),
            0x0109 => Ok(DescriptorType::UbmControllerDeviceCode),
            0xFFFF => Ok(DescriptorType::VendorDefined),
            _ => Err(ProtocolError::InvalidDescriptorType),
        }
    }
}

/// Canonical value length for a descriptor type; vendor-defined descriptors
/// are bounded only by the backing array.
pub fn descriptor_type_length(descriptor_type: DescriptorType) -> usize {
    match descriptor_type {
        DescriptorType::PciVendorId => 2,
        DescriptorType::IanaEnterpriseId => 4,
        DescriptorType::Uuid => 16,
        DescriptorType::PnpVendorId => 3,
        DescriptorType::AcpiVendorId => 5,
        DescriptorType::IeeeAssignedCompanyId => 3,
        DescriptorType::ScsiVendorId => 8,
        DescriptorType::PciDeviceId => 2,
        DescriptorType::PciSubsystemVendorId => 2,
        DescriptorType::PciSubsystemId => 2,
        DescriptorType::PciRevisionId => 1,
        DescriptorType::PnpProductIdentifier => 4,
        DescriptorType::AcpiProductIdentifier => 4,
        DescriptorType::AsciiModelNumberLongString => 40,
        DescriptorType::AsciiModelNumberShortString => 10,
        DescriptorType::ScsiProductId => 16,
        DescriptorType::UbmControllerDeviceCode => 4,
        DescriptorType::VendorDefined => DESCRIPTOR_DATA_MAX_LEN,
    }
}

/// One `(type, length, value)` entry of a device identifier table.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Descriptor {
    pub descriptor_type: u16,
    pub descriptor_length: u16,
    pub descriptor_data: [u8; DESCRIPTOR_DATA_MAX_LEN],
}

impl Default for Descriptor {
    fn default() -> Self {
        Descriptor {
            descriptor_type: 0,
            descriptor_length: 0,
            descriptor_data: [0u8; DESCRIPTOR_DATA_MAX_LEN],
        }
    }
}

impl Descriptor {
    pub fn new(descriptor_type: DescriptorType, value: &[u8]) -> Result<Self, ProtocolError> {
        if value.len() != descriptor_type_length(descriptor_type) {
            return Err(ProtocolError::InvalidDescriptorLength);
        }
        let mut descriptor_data = [0u8; DESCRIPTOR_DATA_MAX_LEN];
        descriptor_data[..value.len()].copy_from_slice(value);
        Ok(Descriptor {
            descriptor_type: descriptor_type as u16,
            descriptor_length: value.len() as u16,
            descriptor_data,
        })
    }

    pub fn value(&self) -> &[u8] {
        &self.descriptor_data[..self.descriptor_length as usize]
    }

    /// Little-endian u16 view of the value; PCI identity descriptors are all
    /// two bytes wide.
    pub fn value_u16(&self) -> Option<u16> {
        let value = self.value();
        if value.len() == 2 {
            Some(u16::from_le_bytes([value[0], value[1]]))
        } else {
            None
        }
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<u16>() * 2 + self.descriptor_length as usize
    }
}

impl PldmCodec for Descriptor {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        buffer[offset..offset + 2].copy_from_slice(&self.descriptor_type.to_le_bytes());
        offset += 2;
        buffer[offset..offset + 2].copy_from_slice(&self.descriptor_length.to_le_bytes());
        offset += 2;
        buffer[offset..offset + self.descriptor_length as usize]
            .copy_from_slice(self.value());
        offset += self.descriptor_length as usize;

        Ok(offset)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let descriptor_type = u16::from_le_bytes(
            buffer
                .get(0..2)
                .ok_or(CodecError::MsgTooShort)?
                .try_into()
                .unwrap(),
        );
        let descriptor_length = u16::from_le_bytes(
            buffer
                .get(2..4)
                .ok_or(CodecError::MsgTooShort)?
                .try_into()
                .unwrap(),
        );
        if descriptor_length as usize > DESCRIPTOR_DATA_MAX_LEN {
            return Err(CodecError::InvalidLength);
        }

        let mut descriptor_data = [0u8; DESCRIPTOR_DATA_MAX_LEN];
        descriptor_data[..descriptor_length as usize].copy_from_slice(
            buffer
                .get(4..4 + descriptor_length as usize)
                .ok_or(CodecError::MsgTooShort)?,
        );

        Ok(Descriptor {
            descriptor_type,
            descriptor_length,
            descriptor_data,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ComponentClassification {
    Unspecified = 0x0000,
    Other = 0x0001,
    Driver = 0x0002,
    ConfigurationSoftware = 0x0003,
    ApplicationSoftware = 0x0004,
    Instrumentation = 0x0005,
    FirmwareOrBios = 0x0006,
    DiagnosticSoftware = 0x0007,
    OperatingSystem = 0x0008,
    Middleware = 0x0009,
    Firmware = 0x000A,
    BiosOrFcode = 0x000B,
    SupportOrServicePack = 0x000C,
    SoftwareBundle = 0x000D,
    DownstreamDevice = 0xFFFF,
}

impl TryFrom<u16> for ComponentClassification {
    type Error = ProtocolError;

    fn try_from(value: u16) -> Result<Self, ProtocolError> {
        match value {
            0x0000 => Ok(ComponentClassification::Unspecified),
            0x0001 => Ok(ComponentClassification::Other),
            0x0002 => Ok(ComponentClassification::Driver),
            0x0003 => Ok(ComponentClassification::ConfigurationSoftware),
            0x0004 => Ok(ComponentClassification::ApplicationSoftware),
            0x0005 => Ok(ComponentClassification::Instrumentation),
            0x0006 => Ok(ComponentClassification::FirmwareOrBios),
            0x0007 => Ok(ComponentClassification::DiagnosticSoftware),
            0x0008 => Ok(ComponentClassification::OperatingSystem),
            0x0009 => Ok(ComponentClassification::Middleware),
            0x000A => Ok(ComponentClassification::Firmware),
            0x000B => Ok(ComponentClassification::BiosOrFcode),
            0x000C => Ok(ComponentClassification::SupportOrServicePack),
            0x000D => Ok(ComponentClassification::SoftwareBundle),
            0xFFFF => Ok(ComponentClassification::DownstreamDevice),
            _ => Err(ProtocolError::InvalidComponentClassification),
        }
    }
}

/// Fixed-layout leading portion of a component parameter table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable)]
#[repr(C, packed)]
pub struct ComponentParameterFixed {
    pub comp_classification: u16,
    pub comp_identifier: u16,
    pub comp_classification_index: u8,
    pub active_comp_comparison_stamp: u32,
    pub active_comp_ver_str_kind: u8,
    pub active_comp_ver_str_len: u8,
    pub active_comp_release_date: [u8; RELEASE_DATE_LEN],
    pub pending_comp_comparison_stamp: u32,
    pub pending_comp_ver_str_kind: u8,
    pub pending_comp_ver_str_len: u8,
    pub pending_comp_release_date: [u8; RELEASE_DATE_LEN],
    pub comp_activation_methods: ComponentActivationMethods,
    pub capabilities_during_update: FdCapabilitiesDuringUpdate,
}

/// One entry of the component parameter table: the fixed header followed by
/// the active and (optional) pending component version strings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct ComponentParameterEntry {
    pub fixed: ComponentParameterFixed,
    pub active_ver: VersionString,
    pub pending_ver: VersionString,
}

impl Default for ComponentParameterEntry {
    fn default() -> Self {
        ComponentParameterEntry {
            fixed: ComponentParameterFixed {
                comp_classification: 0,
                comp_identifier: 0,
                comp_classification_index: 0,
                active_comp_comparison_stamp: 0,
                active_comp_ver_str_kind: 0,
                active_comp_ver_str_len: 0,
                active_comp_release_date: [0u8; RELEASE_DATE_LEN],
                pending_comp_comparison_stamp: 0,
                pending_comp_ver_str_kind: 0,
                pending_comp_ver_str_len: 0,
                pending_comp_release_date: [0u8; RELEASE_DATE_LEN],
                comp_activation_methods: ComponentActivationMethods(0),
                capabilities_during_update: FdCapabilitiesDuringUpdate(0),
            },
            active_ver: VersionString::default(),
            pending_ver: VersionString::default(),
        }
    }
}

impl ComponentParameterEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        comp_classification: ComponentClassification,
        comp_identifier: u16,
        comp_classification_index: u8,
        active_comp_comparison_stamp: u32,
        active_ver: &VersionString,
        pending_comp_comparison_stamp: u32,
        pending_ver: &VersionString,
        comp_activation_methods: ComponentActivationMethods,
        capabilities_during_update: FdCapabilitiesDuringUpdate,
    ) -> Self {
        ComponentParameterEntry {
            fixed: ComponentParameterFixed {
                comp_classification: comp_classification as u16,
                comp_identifier,
                comp_classification_index,
                active_comp_comparison_stamp,
                active_comp_ver_str_kind: active_ver.kind,
                active_comp_ver_str_len: active_ver.len,
                active_comp_release_date: [0u8; RELEASE_DATE_LEN],
                pending_comp_comparison_stamp,
                pending_comp_ver_str_kind: pending_ver.kind,
                pending_comp_ver_str_len: pending_ver.len,
                pending_comp_release_date: [0u8; RELEASE_DATE_LEN],
                comp_activation_methods,
                capabilities_during_update,
            },
            active_ver: *active_ver,
            pending_ver: *pending_ver,
        }
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<ComponentParameterFixed>()
            + self.fixed.active_comp_ver_str_len as usize
            + self.fixed.pending_comp_ver_str_len as usize
    }
}

impl PldmCodec for ComponentParameterEntry {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.fixed
            .write_to(&mut buffer[offset..offset + core::mem::size_of::<ComponentParameterFixed>()])
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<ComponentParameterFixed>();

        let active_len = self.fixed.active_comp_ver_str_len as usize;
        buffer[offset..offset + active_len].copy_from_slice(&self.active_ver.bytes[..active_len]);
        offset += active_len;

        let pending_len = self.fixed.pending_comp_ver_str_len as usize;
        buffer[offset..offset + pending_len]
            .copy_from_slice(&self.pending_ver.bytes[..pending_len]);
        offset += pending_len;

        Ok(offset)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let mut offset = 0;

        let fixed = ComponentParameterFixed::read_from_bytes(
            buffer
                .get(offset..offset + core::mem::size_of::<ComponentParameterFixed>())
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<ComponentParameterFixed>();

        let active_len = fixed.active_comp_ver_str_len as usize;
        let active_ver = VersionString::from_raw(
            fixed.active_comp_ver_str_kind,
            buffer
                .get(offset..offset + active_len)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::InvalidLength)?;
        offset += active_len;

        let pending_len = fixed.pending_comp_ver_str_len as usize;
        let pending_ver = VersionString::from_raw(
            fixed.pending_comp_ver_str_kind,
            buffer
                .get(offset..offset + pending_len)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::InvalidLength)?;

        Ok(ComponentParameterEntry {
            fixed,
            active_ver,
            pending_ver,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComponentResponse {
    CompCanBeUpdated = 0,
    CompCannotBeUpdated = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComponentResponseCode {
    CompCanBeUpdated = 0x00,
    CompComparisonStampIdentical = 0x01,
    CompComparisonStampLower = 0x02,
    InvalidCompComparisonStamp = 0x03,
    CompConflict = 0x04,
    CompPrerequisitesNotMet = 0x05,
    CompNotSupported = 0x06,
    CompSecurityRestrictions = 0x07,
    IncompleteCompImageSet = 0x08,
    ActiveImageNotUpdateableSubsequently = 0x09,
    CompVerStrIdentical = 0x0A,
    CompVerStrLower = 0x0B,
    VendorDefined, // 0xD0..=0xEF
}

impl TryFrom<u8> for ComponentResponseCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(ComponentResponseCode::CompCanBeUpdated),
            0x01 => Ok(ComponentResponseCode::CompComparisonStampIdentical),
            0x02 => Ok(ComponentResponseCode::CompComparisonStampLower),
            0x03 => Ok(ComponentResponseCode::InvalidCompComparisonStamp),
            0x04 => Ok(ComponentResponseCode::CompConflict),
            0x05 => Ok(ComponentResponseCode::CompPrerequisitesNotMet),
            0x06 => Ok(ComponentResponseCode::CompNotSupported),
            0x07 => Ok(ComponentResponseCode::CompSecurityRestrictions),
            0x08 => Ok(ComponentResponseCode::IncompleteCompImageSet),
            0x09 => Ok(ComponentResponseCode::ActiveImageNotUpdateableSubsequently),
            0x0A => Ok(ComponentResponseCode::CompVerStrIdentical),
            0x0B => Ok(ComponentResponseCode::CompVerStrLower),
            0xD0..=0xEF => Ok(ComponentResponseCode::VendorDefined),
            _ => Err(ProtocolError::InvalidComponentResponseCode),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComponentCompatibilityResponse {
    CompCanBeUpdated = 0,
    CompCannotBeUpdated = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ComponentCompatibilityResponseCode {
    NoResponseCode = 0x00,
    CompComparisonStampIdentical = 0x01,
    CompComparisonStampLower = 0x02,
    InvalidCompComparisonStamp = 0x03,
    CompConflict = 0x04,
    CompPrerequisitesNotMet = 0x05,
    CompNotSupported = 0x06,
    CompSecurityRestrictions = 0x07,
    IncompleteCompImageSet = 0x08,
    CompInfoNoMatch = 0x09,
    CompVerStrIdentical = 0x0A,
    CompVerStrLower = 0x0B,
    VendorDefined, // 0xD0..=0xEF
}

impl TryFrom<u8> for ComponentCompatibilityResponseCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0x00 => Ok(ComponentCompatibilityResponseCode::NoResponseCode),
            0x01 => Ok(ComponentCompatibilityResponseCode::CompComparisonStampIdentical),
            0x02 => Ok(ComponentCompatibilityResponseCode::CompComparisonStampLower),
            0x03 => Ok(ComponentCompatibilityResponseCode::InvalidCompComparisonStamp),
            0x04 => Ok(ComponentCompatibilityResponseCode::CompConflict),
            0x05 => Ok(ComponentCompatibilityResponseCode::CompPrerequisitesNotMet),
            0x06 => Ok(ComponentCompatibilityResponseCode::CompNotSupported),
            0x07 => Ok(ComponentCompatibilityResponseCode::CompSecurityRestrictions),
            0x08 => Ok(ComponentCompatibilityResponseCode::IncompleteCompImageSet),
            0x09 => Ok(ComponentCompatibilityResponseCode::CompInfoNoMatch),
            0x0A => Ok(ComponentCompatibilityResponseCode::CompVerStrIdentical),
            0x0B => Ok(ComponentCompatibilityResponseCode::CompVerStrLower),
            0xD0..=0xEF => Ok(ComponentCompatibilityResponseCode::VendorDefined),
            _ => Err(ProtocolError::InvalidComponentCompatibilityResponseCode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_round_trip() {
        let descriptor = Descriptor::new(DescriptorType::PciVendorId, &[0x86, 0x80]).unwrap();
        assert_eq!(descriptor.value_u16(), Some(0x8086));
        assert_eq!(descriptor.wire_len(), 6);

        let mut buffer = [0u8; 64];
        let size = descriptor.encode(&mut buffer).unwrap();
        assert_eq!(size, descriptor.wire_len());
        assert_eq!(&buffer[..6], &[0x00, 0x00, 0x02, 0x00, 0x86, 0x80]);

        let decoded = Descriptor::decode(&buffer[..size]).unwrap();
        assert_eq!(descriptor, decoded);
    }

    #[test]
    fn test_descriptor_length_mismatch() {
        assert_eq!(
            Descriptor::new(DescriptorType::Uuid, &[0u8; 4]),
            Err(ProtocolError::InvalidDescriptorLength)
        );
    }

    #[test]
    fn test_descriptor_truncated() {
        let descriptor = Descriptor::new(DescriptorType::Uuid, &[0xAAu8; 16]).unwrap();
        let mut buffer = [0u8; 64];
        let size = descriptor.encode(&mut buffer).unwrap();
        assert_eq!(
            Descriptor::decode(&buffer[..size - 1]),
            Err(CodecError::MsgTooShort)
        );
    }

    #[test]
    fn test_component_parameter_entry_round_trip() {
        let active = VersionString::new(VersionStringKind::Ascii, "rot-fw-1.0").unwrap();
        let pending = VersionString::new(VersionStringKind::Ascii, "rot-fw-1.1").unwrap();
        let entry = ComponentParameterEntry::new(
            ComponentClassification::Firmware,
            0x0001,
            0,
            0x1000_0001,
            &active,
            0x1000_0002,
            &pending,
            ComponentActivationMethods(0x0002),
            FdCapabilitiesDuringUpdate(0),
        );

        let mut buffer = [0u8; 512];
        let size = entry.encode(&mut buffer).unwrap();
        assert_eq!(size, entry.wire_len());
        let decoded = ComponentParameterEntry::decode(&buffer[..size]).unwrap();
        assert_eq!(entry, decoded);
    }

    #[test]
    fn test_version_string_too_long() {
        let long = core::str::from_utf8(&[b'a'; 256]).unwrap();
        assert_eq!(
            VersionString::new(VersionStringKind::Ascii, long).err(),
            Some(ProtocolError::InvalidVersionStringLength)
        );
    }
}
