// Licensed under the Apache-2.0 license

//! Boundary to the device registry. The registry itself lives outside this
//! crate; the engine only needs per-peer records it can fill in while acting
//! as the update agent.

use pldm_protocol::firmware_update::{Descriptor, MAX_DESCRIPTOR_COUNT};
use pldm_protocol::messages::inventory::FirmwareParameters;

/// One peer device as tracked by the registry. The four PCI identity fields
/// mirror the first four descriptors of a PCI-class peer; other peers keep
/// their identity only in the opaque descriptor table.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub eid: u8,
    pub pci_vid: u16,
    pub pci_device_id: u16,
    pub pci_subsystem_vid: u16,
    pub pci_subsystem_id: u16,
    pub descriptor_count: u8,
    pub descriptors: [Descriptor; MAX_DESCRIPTOR_COUNT],
    pub fw_params: FirmwareParameters,
}

impl DeviceRecord {
    pub fn new(eid: u8) -> Self {
        DeviceRecord {
            eid,
            pci_vid: 0,
            pci_device_id: 0,
            pci_subsystem_vid: 0,
            pci_subsystem_id: 0,
            descriptor_count: 0,
            descriptors: [Descriptor::default(); MAX_DESCRIPTOR_COUNT],
            fw_params: FirmwareParameters::default(),
        }
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors[..self.descriptor_count as usize]
    }
}

/// Consumed registry interface.
pub trait DeviceManager {
    fn lookup_by_eid(&mut self, eid: u8) -> Option<&mut DeviceRecord>;

    fn num_devices(&self) -> usize;
}
