// Licensed under the Apache-2.0 license

//! Inventory commands: QueryDeviceIdentifiers and GetFirmwareParameters.

use crate::base::{
    InstanceId, PldmMsgHeader, PldmMsgType, PldmTypeCode, PLDM_MSG_HEADER_LEN,
};
use crate::codec::{CodecError, PldmCodec};
use crate::error::ProtocolError;
use crate::firmware_update::{
    ComponentParameterEntry, Descriptor, FdCapabilitiesDuringUpdate, FwUpdateCmd, VersionString,
    MAX_COMPONENT_COUNT, MAX_DESCRIPTOR_COUNT,
};
use zerocopy::{FromBytes, Immutable, IntoBytes};

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct QueryDeviceIdentifiersRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl QueryDeviceIdentifiersRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType) -> Self {
        QueryDeviceIdentifiersRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::QueryDeviceIdentifiers as u8,
            ),
        }
    }
}

/// Response carrying the device identifier table. The descriptors are held
/// in a fixed array; `descriptor_count` gives the populated prefix.
#[derive(Debug, Clone, PartialEq)]
#[repr(C)]
pub struct QueryDeviceIdentifiersResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub device_identifiers_len: u32,
    pub descriptor_count: u8,
    pub descriptors: [Descriptor; MAX_DESCRIPTOR_COUNT],
}

impl QueryDeviceIdentifiersResponse {
    pub fn new(
        instance_id: InstanceId,
        completion_code: u8,
        descriptors: &[Descriptor],
    ) -> Result<Self, ProtocolError> {
        if descriptors.is_empty() || descriptors.len() > MAX_DESCRIPTOR_COUNT {
            return Err(ProtocolError::InvalidDescriptorCount);
        }

        let mut table = [Descriptor::default(); MAX_DESCRIPTOR_COUNT];
        table[..descriptors.len()].copy_from_slice(descriptors);

        Ok(QueryDeviceIdentifiersResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::QueryDeviceIdentifiers as u8,
            ),
            completion_code,
            device_identifiers_len: descriptors.iter().map(|d| d.wire_len() as u32).sum(),
            descriptor_count: descriptors.len() as u8,
            descriptors: table,
        })
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors[..self.descriptor_count as usize]
    }

    pub fn wire_len(&self) -> usize {
        PLDM_MSG_HEADER_LEN
            + 1
            + 4
            + 1
            + self.descriptors().iter().map(Descriptor::wire_len).sum::<usize>()
    }
}

impl PldmCodec for QueryDeviceIdentifiersResponse {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.hdr
            .write_to(&mut buffer[offset..offset + PLDM_MSG_HEADER_LEN])
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += PLDM_MSG_HEADER_LEN;

        buffer[offset] = self.completion_code;
        offset += 1;

        buffer[offset..offset + 4].copy_from_slice(&self.device_identifiers_len.to_le_bytes());
        offset += 4;

        buffer[offset] = self.descriptor_count;
        offset += 1;

        for descriptor in self.descriptors() {
            offset += descriptor.encode(&mut buffer[offset..])?;
        }

        Ok(offset)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let mut offset = 0;

        let hdr = PldmMsgHeader::<[u8; PLDM_MSG_HEADER_LEN]>::read_from_bytes(
            buffer
                .get(offset..offset + PLDM_MSG_HEADER_LEN)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;
        offset += PLDM_MSG_HEADER_LEN;

        let completion_code = *buffer.get(offset).ok_or(CodecError::MsgTooShort)?;
        offset += 1;

        let device_identifiers_len = u32::from_le_bytes(
            buffer
                .get(offset..offset + 4)
                .ok_or(CodecError::MsgTooShort)?
                .try_into()
                .unwrap(),
        );
        offset += 4;

        let descriptor_count = *buffer.get(offset).ok_or(CodecError::MsgTooShort)?;
        offset += 1;
        if descriptor_count as usize > MAX_DESCRIPTOR_COUNT || descriptor_count == 0 {
            return Err(CodecError::InvalidLength);
        }

        let mut descriptors = [Descriptor::default(); MAX_DESCRIPTOR_COUNT];
        for descriptor in descriptors.iter_mut().take(descriptor_count as usize) {
            *descriptor = Descriptor::decode(&buffer[offset..])?;
            offset += descriptor.wire_len();
        }

        Ok(QueryDeviceIdentifiersResponse {
            hdr,
            completion_code,
            device_identifiers_len,
            descriptor_count,
            descriptors,
        })
    }
}

#[derive(Debug, Clone, FromBytes, IntoBytes, Immutable, PartialEq)]
#[repr(C, packed)]
pub struct GetFirmwareParametersRequest {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
}

impl GetFirmwareParametersRequest {
    pub fn new(instance_id: InstanceId, msg_type: PldmMsgType) -> Self {
        GetFirmwareParametersRequest {
            hdr: PldmMsgHeader::new(
                instance_id,
                msg_type,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::GetFirmwareParameters as u8,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromBytes, IntoBytes, Immutable)]
#[repr(C, packed)]
pub struct FirmwareParametersFixed {
    pub capabilities_during_update: FdCapabilitiesDuringUpdate,
    pub comp_count: u16,
    pub active_ver_kind: u8,
    pub active_ver_len: u8,
    pub pending_ver_kind: u8,
    pub pending_ver_len: u8,
}

/// The firmware parameter block: capabilities, image-set version strings and
/// the component parameter table.
#[derive(Debug, Clone, PartialEq)]
#[repr(C)]
pub struct FirmwareParameters {
    pub capabilities_during_update: FdCapabilitiesDuringUpdate,
    pub comp_count: u16,
    pub active_ver: VersionString,
    pub pending_ver: VersionString,
    pub comp_param_table: [ComponentParameterEntry; MAX_COMPONENT_COUNT],
}

impl Default for FirmwareParameters {
    fn default() -> Self {
        FirmwareParameters {
            capabilities_during_update: FdCapabilitiesDuringUpdate(0),
            comp_count: 0,
            active_ver: VersionString::default(),
            pending_ver: VersionString::default(),
            comp_param_table: [ComponentParameterEntry::default(); MAX_COMPONENT_COUNT],
        }
    }
}

impl FirmwareParameters {
    pub fn new(
        capabilities_during_update: FdCapabilitiesDuringUpdate,
        active_ver: &VersionString,
        pending_ver: &VersionString,
        comp_param_table: &[ComponentParameterEntry],
    ) -> Result<Self, ProtocolError> {
        if comp_param_table.len() > MAX_COMPONENT_COUNT {
            return Err(ProtocolError::InvalidData);
        }
        let mut table = [ComponentParameterEntry::default(); MAX_COMPONENT_COUNT];
        table[..comp_param_table.len()].copy_from_slice(comp_param_table);

        Ok(FirmwareParameters {
            capabilities_during_update,
            comp_count: comp_param_table.len() as u16,
            active_ver: *active_ver,
            pending_ver: *pending_ver,
            comp_param_table: table,
        })
    }

    pub fn components(&self) -> &[ComponentParameterEntry] {
        &self.comp_param_table[..(self.comp_count as usize).min(MAX_COMPONENT_COUNT)]
    }

    pub fn wire_len(&self) -> usize {
        core::mem::size_of::<FirmwareParametersFixed>()
            + self.active_ver.len as usize
            + self.pending_ver.len as usize
            + self
                .components()
                .iter()
                .map(ComponentParameterEntry::wire_len)
                .sum::<usize>()
    }
}

impl PldmCodec for FirmwareParameters {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        let fixed = FirmwareParametersFixed {
            capabilities_during_update: self.capabilities_during_update,
            comp_count: self.comp_count,
            active_ver_kind: self.active_ver.kind,
            active_ver_len: self.active_ver.len,
            pending_ver_kind: self.pending_ver.kind,
            pending_ver_len: self.pending_ver.len,
        };
        fixed
            .write_to(&mut buffer[offset..offset + core::mem::size_of::<FirmwareParametersFixed>()])
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<FirmwareParametersFixed>();

        buffer[offset..offset + self.active_ver.len as usize]
            .copy_from_slice(self.active_ver.as_bytes());
        offset += self.active_ver.len as usize;

        buffer[offset..offset + self.pending_ver.len as usize]
            .copy_from_slice(self.pending_ver.as_bytes());
        offset += self.pending_ver.len as usize;

        for entry in self.components() {
            offset += entry.encode(&mut buffer[offset..])?;
        }

        Ok(offset)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let mut offset = 0;

        let fixed = FirmwareParametersFixed::read_from_bytes(
            buffer
                .get(offset..offset + core::mem::size_of::<FirmwareParametersFixed>())
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;
        offset += core::mem::size_of::<FirmwareParametersFixed>();

        let comp_count = fixed.comp_count;
        if comp_count as usize > MAX_COMPONENT_COUNT {
            return Err(CodecError::InvalidLength);
        }

        let active_len = fixed.active_ver_len as usize;
        let active_ver = VersionString::from_raw(
            fixed.active_ver_kind,
            buffer
                .get(offset..offset + active_len)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::InvalidLength)?;
        offset += active_len;

        let pending_len = fixed.pending_ver_len as usize;
        let pending_ver = VersionString::from_raw(
            fixed.pending_ver_kind,
            buffer
                .get(offset..offset + pending_len)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::InvalidLength)?;
        offset += pending_len;

        let mut comp_param_table = [ComponentParameterEntry::default(); MAX_COMPONENT_COUNT];
        for entry in comp_param_table.iter_mut().take(comp_count as usize) {
            *entry = ComponentParameterEntry::decode(&buffer[offset..])?;
            offset += entry.wire_len();
        }

        Ok(FirmwareParameters {
            capabilities_during_update: fixed.capabilities_during_update,
            comp_count,
            active_ver,
            pending_ver,
            comp_param_table,
        })
    }
}

/// Completion code first, then the parameter block (DSP0267 field order).
#[derive(Debug, Clone, PartialEq)]
#[repr(C)]
pub struct GetFirmwareParametersResponse {
    pub hdr: PldmMsgHeader<[u8; PLDM_MSG_HEADER_LEN]>,
    pub completion_code: u8,
    pub params: FirmwareParameters,
}

impl GetFirmwareParametersResponse {
    pub fn new(instance_id: InstanceId, completion_code: u8, params: &FirmwareParameters) -> Self {
        GetFirmwareParametersResponse {
            hdr: PldmMsgHeader::new(
                instance_id,
                PldmMsgType::Response,
                PldmTypeCode::FwUpdate,
                FwUpdateCmd::GetFirmwareParameters as u8,
            ),
            completion_code,
            params: params.clone(),
        }
    }

    pub fn wire_len(&self) -> usize {
        PLDM_MSG_HEADER_LEN + 1 + self.params.wire_len()
    }
}

impl PldmCodec for GetFirmwareParametersResponse {
    fn encode(&self, buffer: &mut [u8]) -> Result<usize, CodecError> {
        if buffer.len() < self.wire_len() {
            return Err(CodecError::MsgTooShort);
        }
        let mut offset = 0;

        self.hdr
            .write_to(&mut buffer[offset..offset + PLDM_MSG_HEADER_LEN])
            .map_err(|_| CodecError::MsgTooShort)?;
        offset += PLDM_MSG_HEADER_LEN;

        buffer[offset] = self.completion_code;
        offset += 1;

        offset += self.params.encode(&mut buffer[offset..])?;
        Ok(offset)
    }

    fn decode(buffer: &[u8]) -> Result<Self, CodecError> {
        let mut offset = 0;

        let hdr = PldmMsgHeader::<[u8; PLDM_MSG_HEADER_LEN]>::read_from_bytes(
            buffer
                .get(offset..offset + PLDM_MSG_HEADER_LEN)
                .ok_or(CodecError::MsgTooShort)?,
        )
        .map_err(|_| CodecError::MsgTooShort)?;
        offset += PLDM_MSG_HEADER_LEN;

        let completion_code = *buffer.get(offset).ok_or(CodecError::MsgTooShort)?;
        offset += 1;

        let params = FirmwareParameters::decode(&buffer[offset..])?;

        Ok(GetFirmwareParametersResponse {
            hdr,
            completion_code,
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firmware_update::{
        ComponentActivationMethods, ComponentClassification, DescriptorType, VersionStringKind,
    };

    fn sample_params() -> FirmwareParameters {
        let active = VersionString::new(VersionStringKind::Ascii, "rot-fw-1.0").unwrap();
        let pending = VersionString::new(VersionStringKind::Ascii, "rot-fw-1.1").unwrap();
        let entry = ComponentParameterEntry::new(
            ComponentClassification::Firmware,
            0x0001,
            0,
            0x0101,
            &active,
            0x0102,
            &pending,
            ComponentActivationMethods(0x0001),
            FdCapabilitiesDuringUpdate(0x0010),
        );
        FirmwareParameters::new(
            FdCapabilitiesDuringUpdate(0x0010),
            &active,
            &pending,
            &[entry],
        )
        .unwrap()
    }

    #[test]
    fn test_query_device_identifiers_response() {
        let descriptors = [
            Descriptor::new(DescriptorType::PciVendorId, &[0x86, 0x80]).unwrap(),
            Descriptor::new(DescriptorType::PciDeviceId, &[0x34, 0x12]).unwrap(),
            Descriptor::new(DescriptorType::PciSubsystemVendorId, &[0x86, 0x80]).unwrap(),
            Descriptor::new(DescriptorType::PciSubsystemId, &[0x78, 0x56]).unwrap(),
        ];
        let resp = QueryDeviceIdentifiersResponse::new(3, 0, &descriptors).unwrap();
        assert_eq!(resp.descriptor_count, 4);
        assert_eq!(resp.device_identifiers_len, 4 * 6);

        let mut buffer = [0u8; 256];
        let size = resp.encode(&mut buffer).unwrap();
        assert_eq!(size, resp.wire_len());

        let decoded = QueryDeviceIdentifiersResponse::decode(&buffer[..size]).unwrap();
        assert_eq!(resp, decoded);
        assert_eq!(decoded.descriptors()[0].value_u16(), Some(0x8086));
    }

    #[test]
    fn test_firmware_parameters_round_trip() {
        let params = sample_params();
        let mut buffer = [0u8; 512];
        let size = params.encode(&mut buffer).unwrap();
        assert_eq!(size, params.wire_len());
        let decoded = FirmwareParameters::decode(&buffer[..size]).unwrap();
        assert_eq!(params, decoded);
    }

    #[test]
    fn test_get_firmware_parameters_response() {
        let params = sample_params();
        let resp = GetFirmwareParametersResponse::new(1, 0, &params);
        let mut buffer = [0u8; 512];
        let size = resp.encode(&mut buffer).unwrap();
        assert_eq!(size, resp.wire_len());
        let decoded = GetFirmwareParametersResponse::decode(&buffer[..size]).unwrap();
        assert_eq!(resp, decoded);
    }

    #[test]
    fn test_truncated_firmware_parameters() {
        let params = sample_params();
        let mut buffer = [0u8; 512];
        let size = params.encode(&mut buffer).unwrap();
        assert_eq!(
            FirmwareParameters::decode(&buffer[..size - 3]),
            Err(CodecError::MsgTooShort)
        );
    }
}
