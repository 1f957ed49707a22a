// Licensed under the Apache-2.0 license

//! End-to-end exchanges between two engine instances: one acting as the
//! update agent, one as the firmware device, wired back to back through
//! in-memory flash banks and a device registry double.

use pldm_fwup::component::FirmwareComponent;
use pldm_fwup::config::Timeouts;
use pldm_fwup::device_manager::{DeviceManager, DeviceRecord};
use pldm_fwup::dispatcher::{
    CmdInterface, FwupRequest, MsgDisposition, MAX_MCTP_PLDM_MSG_SIZE,
};
use pldm_fwup::error::FwupError;
use pldm_fwup::fd::FirmwareDeviceContext;
use pldm_fwup::flash_map::{
    FlashDriver, FlashError, FlashRegion, FlashRegionId, FlashRegionMap,
};
use pldm_fwup::ua::RequestUpdateParams;
use pldm_protocol::base::{PldmMsgType, TransferRespFlag};
use pldm_protocol::codec::PldmCodec;
use pldm_protocol::firmware_update::{
    ComponentActivationMethods, ComponentClassification, ComponentParameterEntry, Descriptor,
    DescriptorType, FdCapabilitiesDuringUpdate, FirmwareDeviceState, FwUpdateCompletionCode,
    VersionString, VersionStringKind,
};
use pldm_protocol::messages::completion::{ApplyResult, TransferResult, VerifyResult};
use pldm_protocol::messages::inventory::FirmwareParameters;
use pldm_protocol::messages::transfer::RequestFirmwareDataRequest;
use pldm_protocol::messages::update::{RequestUpdateRequest, RequestUpdateResponse};
use pldm_protocol::base::PldmFailureResponse;

const UA_EID: u8 = 0x08;
const FD_EID: u8 = 0x1D;

const PKG_DATA_LEN: usize = 80;
const META_DATA_LEN: usize = 48;
const IMAGE_LEN: usize = 200;

struct RamFlash {
    bank: Vec<u8>,
}

impl FlashDriver for RamFlash {
    fn read(&mut self, _device: u8, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let start = address as usize;
        buf.copy_from_slice(
            self.bank
                .get(start..start + buf.len())
                .ok_or(FlashError::OutOfRange)?,
        );
        Ok(())
    }

    fn write(&mut self, _device: u8, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let start = address as usize;
        self.bank
            .get_mut(start..start + data.len())
            .ok_or(FlashError::OutOfRange)?
            .copy_from_slice(data);
        Ok(())
    }
}

struct Registry {
    records: Vec<DeviceRecord>,
}

impl DeviceManager for Registry {
    fn lookup_by_eid(&mut self, eid: u8) -> Option<&mut DeviceRecord> {
        self.records.iter_mut().find(|r| r.eid == eid)
    }

    fn num_devices(&self) -> usize {
        self.records.len()
    }
}

type Node = CmdInterface<Registry, RamFlash>;

fn ascii(s: &str) -> VersionString {
    VersionString::new(VersionStringKind::Ascii, s).unwrap()
}

fn fd_descriptors() -> Vec<Descriptor> {
    vec![
        Descriptor::new(DescriptorType::PciVendorId, &[0x86, 0x80]).unwrap(),
        Descriptor::new(DescriptorType::PciDeviceId, &[0x34, 0x12]).unwrap(),
        Descriptor::new(DescriptorType::PciSubsystemVendorId, &[0x86, 0x80]).unwrap(),
        Descriptor::new(DescriptorType::PciSubsystemId, &[0x78, 0x56]).unwrap(),
    ]
}

fn fd_firmware_params() -> FirmwareParameters {
    let active = ascii("rot-fw-1.0");
    let pending = ascii("rot-fw-1.1");
    let entry = ComponentParameterEntry::new(
        ComponentClassification::Firmware,
        0x0001,
        0,
        0x0100,
        &active,
        0x0101,
        &pending,
        ComponentActivationMethods(0x0002),
        FdCapabilitiesDuringUpdate(0),
    );
    FirmwareParameters::new(FdCapabilitiesDuringUpdate(0), &active, &pending, &[entry]).unwrap()
}

fn fd_node() -> Node {
    let mut bank = vec![0u8; 4096];
    // Metadata the FD serves to the agent.
    for (i, byte) in bank[256..256 + META_DATA_LEN].iter_mut().enumerate() {
        *byte = 0xC0 ^ i as u8;
    }
    let map = FlashRegionMap::new()
        .with_region(
            FlashRegionId::PackageData,
            FlashRegion { device: 0, base: 0, size: PKG_DATA_LEN as u32 },
        )
        .with_region(
            FlashRegionId::DeviceMetaData,
            FlashRegion { device: 0, base: 256, size: META_DATA_LEN as u32 },
        )
        .with_region(
            FlashRegionId::ComponentImage(0),
            FlashRegion { device: 0, base: 512, size: 256 },
        );

    let fd = FirmwareDeviceContext::new(&fd_descriptors(), fd_firmware_params()).unwrap();
    CmdInterface::new(
        fd,
        map,
        RamFlash { bank },
        Registry { records: vec![] },
        Timeouts::default(),
    )
}

fn ua_node() -> Node {
    let mut bank = vec![0u8; 4096];
    // Package data section served on GetPackageData.
    for (i, byte) in bank[..PKG_DATA_LEN].iter_mut().enumerate() {
        *byte = i as u8;
    }
    // The component image served on RequestFirmwareData.
    for (i, byte) in bank[512..512 + IMAGE_LEN].iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(7);
    }
    let map = FlashRegionMap::new()
        .with_region(
            FlashRegionId::UpdatePackage,
            FlashRegion { device: 0, base: 0, size: PKG_DATA_LEN as u32 },
        )
        .with_region(
            FlashRegionId::DeviceMetaData,
            FlashRegion { device: 0, base: 256, size: META_DATA_LEN as u32 },
        )
        .with_region(
            FlashRegionId::ComponentImage(0),
            FlashRegion { device: 0, base: 512, size: IMAGE_LEN as u32 },
        );

    let identity = FirmwareDeviceContext::new(
        &[Descriptor::new(DescriptorType::Uuid, &[0x11u8; 16]).unwrap()],
        FirmwareParameters::default(),
    )
    .unwrap();
    CmdInterface::new(
        identity,
        map,
        RamFlash { bank },
        Registry { records: vec![DeviceRecord::new(FD_EID)] },
        Timeouts::default(),
    )
}

/// One full round trip: `from` issues `request` to `to`, the reply is fed
/// back. Returns the reply bytes for inspection.
fn exchange(
    from: &mut Node,
    from_eid: u8,
    to: &mut Node,
    to_eid: u8,
    request: FwupRequest<'_>,
) -> Vec<u8> {
    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
    let req_len = from.generate_request(to_eid, request, &mut buf).unwrap();
    let disposition = to.process_message(from_eid, &mut buf, req_len).unwrap();
    let MsgDisposition::Emit(resp_len) = disposition else {
        panic!("expected a reply");
    };
    let reply = buf[..resp_len].to_vec();
    let disposition = from.process_message(to_eid, &mut buf, resp_len).unwrap();
    assert_eq!(disposition, MsgDisposition::NoReply);
    reply
}

fn component() -> FirmwareComponent {
    FirmwareComponent::new(
        ComponentClassification::Firmware as u16,
        0x0001,
        0,
        0x0101,
        ascii("rot-fw-1.1"),
        Some(IMAGE_LEN as u32),
        None,
    )
}

fn request_update_params() -> RequestUpdateParams {
    RequestUpdateParams {
        max_transfer_size: 32,
        num_components: 1,
        max_outstanding_transfer_req: 1,
        pkg_data_len: PKG_DATA_LEN as u16,
        comp_img_set_ver: ascii("pkg-2.0"),
    }
}

/// Drives both nodes to the Download state with package data, metadata and
/// the component table already exchanged.
fn drive_to_download(ua: &mut Node, fd: &mut Node) {
    exchange(ua, UA_EID, fd, FD_EID, FwupRequest::QueryDeviceIdentifiers);
    exchange(ua, UA_EID, fd, FD_EID, FwupRequest::GetFirmwareParameters);
    exchange(
        ua,
        UA_EID,
        fd,
        FD_EID,
        FwupRequest::RequestUpdate(request_update_params()),
    );
    assert_eq!(
        fd.session_status(UA_EID).state,
        FirmwareDeviceState::LearnComponents
    );

    // FD pulls the 80-byte package data section in three baseline chunks.
    for _ in 0..3 {
        exchange(fd, FD_EID, ua, UA_EID, FwupRequest::GetPackageData);
    }

    // UA pulls the device metadata.
    for _ in 0..2 {
        exchange(ua, UA_EID, fd, FD_EID, FwupRequest::GetDeviceMetaData);
    }

    exchange(
        ua,
        UA_EID,
        fd,
        FD_EID,
        FwupRequest::PassComponentTable {
            component: &component(),
            transfer_flag: TransferRespFlag::StartAndEnd,
        },
    );
    assert_eq!(
        fd.session_status(UA_EID).state,
        FirmwareDeviceState::ReadyXfer
    );

    exchange(
        ua,
        UA_EID,
        fd,
        FD_EID,
        FwupRequest::UpdateComponent { component: &component() },
    );
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Download);
    assert_eq!(ua.session_status(FD_EID).state, FirmwareDeviceState::Download);
}

#[test]
fn test_inventory_flow() {
    let mut ua = ua_node();
    let mut fd = fd_node();

    exchange(&mut ua, UA_EID, &mut fd, FD_EID, FwupRequest::QueryDeviceIdentifiers);
    exchange(&mut ua, UA_EID, &mut fd, FD_EID, FwupRequest::GetFirmwareParameters);

    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Idle);

    // The registry now holds the assembled inventory.
    let record = ua.devices().records.first().unwrap();
    assert_eq!(record.pci_vid, 0x8086);
    assert_eq!(record.pci_device_id, 0x1234);
    assert_eq!(record.pci_subsystem_vid, 0x8086);
    assert_eq!(record.pci_subsystem_id, 0x5678);
    assert_eq!(record.descriptor_count, 4);
    assert_eq!(record.fw_params.comp_count, 1);
    assert_eq!(
        record.fw_params.components()[0].active_ver.as_bytes(),
        b"rot-fw-1.0"
    );
}

#[test]
fn test_full_update_flow() {
    let mut ua = ua_node();
    let mut fd = fd_node();

    drive_to_download(&mut ua, &mut fd);

    // Package data and metadata landed intact.
    {
        let pkg_src: Vec<u8> = (0..PKG_DATA_LEN as u8).collect();
        assert_eq!(&fd.flash().bank[..PKG_DATA_LEN], &pkg_src[..]);
        let meta_src: Vec<u8> = (0..META_DATA_LEN).map(|i| 0xC0 ^ i as u8).collect();
        assert_eq!(&ua.flash().bank[256..256 + META_DATA_LEN], &meta_src[..]);
    }

    // Firmware download: 200 bytes in 32-byte requests.
    let mut rounds = 0;
    loop {
        let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
        match fd.generate_request(UA_EID, FwupRequest::RequestFirmwareData, &mut buf) {
            Ok(req_len) => {
                let MsgDisposition::Emit(resp_len) =
                    ua.process_message(FD_EID, &mut buf, req_len).unwrap()
                else {
                    panic!("expected firmware data");
                };
                assert_eq!(
                    fd.process_message(UA_EID, &mut buf, resp_len).unwrap(),
                    MsgDisposition::NoReply
                );
                rounds += 1;
            }
            Err(FwupError::InvalidStateForCommand) => break,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }
    assert_eq!(rounds, 7);

    let image_src: Vec<u8> = (0..IMAGE_LEN).map(|i| (i as u8).wrapping_mul(7)).collect();
    assert_eq!(&fd.flash().bank[512..512 + IMAGE_LEN], &image_src[..]);

    exchange(
        &mut fd,
        FD_EID,
        &mut ua,
        UA_EID,
        FwupRequest::TransferComplete(TransferResult::TransferSuccess),
    );
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Verify);

    exchange(
        &mut fd,
        FD_EID,
        &mut ua,
        UA_EID,
        FwupRequest::VerifyComplete(VerifyResult::VerifySuccess),
    );
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Apply);

    exchange(
        &mut fd,
        FD_EID,
        &mut ua,
        UA_EID,
        FwupRequest::ApplyComplete {
            result: ApplyResult::ApplySuccess,
            activation_methods_modification: 0,
        },
    );
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Activate);

    exchange(
        &mut ua,
        UA_EID,
        &mut fd,
        FD_EID,
        FwupRequest::ActivateFirmware { self_contained: false },
    );
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Idle);
    assert_eq!(ua.session_status(FD_EID).state, FirmwareDeviceState::Idle);

    // A new update can begin after activation.
    exchange(
        &mut ua,
        UA_EID,
        &mut fd,
        FD_EID,
        FwupRequest::RequestUpdate(request_update_params()),
    );
    assert_eq!(
        fd.session_status(UA_EID).state,
        FirmwareDeviceState::LearnComponents
    );
}

#[test]
fn test_request_update_while_in_update_mode() {
    let mut fd = fd_node();

    let send_request_update = |fd: &mut Node, instance_id: u8| -> Vec<u8> {
        let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
        pldm_protocol::mctp::frame_pldm_msg(&mut buf).unwrap();
        let req = RequestUpdateRequest::new(
            instance_id,
            PldmMsgType::Request,
            64,
            1,
            1,
            0,
            &ascii("pkg-2.0"),
        );
        let n = req.encode(&mut buf[1..]).unwrap();
        let MsgDisposition::Emit(resp_len) =
            fd.process_message(UA_EID, &mut buf, 1 + n).unwrap()
        else {
            panic!("expected a reply");
        };
        buf[..resp_len].to_vec()
    };

    let reply = send_request_update(&mut fd, 1);
    let resp = RequestUpdateResponse::decode(&reply[1..]).unwrap();
    assert_eq!(resp.completion_code, 0x00);
    assert_eq!(
        fd.session_status(UA_EID).state,
        FirmwareDeviceState::LearnComponents
    );

    // A second RequestUpdate is refused and the state is untouched.
    let reply = send_request_update(&mut fd, 2);
    let resp = PldmFailureResponse::decode(&reply[1..]).unwrap();
    assert_eq!(
        resp.completion_code,
        FwUpdateCompletionCode::AlreadyInUpdateMode as u8
    );
    assert_eq!(
        fd.session_status(UA_EID).state,
        FirmwareDeviceState::LearnComponents
    );
}

#[test]
fn test_truncated_request_is_rejected_without_state_change() {
    let mut fd = fd_node();

    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
    pldm_protocol::mctp::frame_pldm_msg(&mut buf).unwrap();
    let req = RequestUpdateRequest::new(0, PldmMsgType::Request, 64, 1, 1, 0, &ascii("pkg-2.0"));
    let n = req.encode(&mut buf[1..]).unwrap();

    // Drop the last two bytes of the version string.
    let MsgDisposition::Emit(resp_len) =
        fd.process_message(UA_EID, &mut buf, 1 + n - 2).unwrap()
    else {
        panic!("expected a failure reply");
    };
    let resp = PldmFailureResponse::decode(&buf[1..resp_len]).unwrap();
    assert_eq!(resp.completion_code, 0x03);
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Idle);

    // The device still accepts a well-formed RequestUpdate afterwards.
    pldm_protocol::mctp::frame_pldm_msg(&mut buf).unwrap();
    let n = req.encode(&mut buf[1..]).unwrap();
    let MsgDisposition::Emit(resp_len) = fd.process_message(UA_EID, &mut buf, 1 + n).unwrap()
    else {
        panic!("expected a reply");
    };
    let resp = RequestUpdateResponse::decode(&buf[1..resp_len]).unwrap();
    assert_eq!(resp.completion_code, 0x00);
}

#[test]
fn test_instance_id_wraps_after_32_requests() {
    let mut ua = ua_node();
    let mut fd = fd_node();

    let mut observed = Vec::new();
    for _ in 0..33 {
        let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
        let req_len = ua
            .generate_request(FD_EID, FwupRequest::QueryDeviceIdentifiers, &mut buf)
            .unwrap();
        observed.push(buf[1] & 0x1F);

        let MsgDisposition::Emit(resp_len) =
            fd.process_message(UA_EID, &mut buf, req_len).unwrap()
        else {
            panic!("expected a reply");
        };
        ua.process_message(FD_EID, &mut buf, resp_len).unwrap();
    }

    let mut expected: Vec<u8> = (0..32).collect();
    expected.push(0);
    assert_eq!(observed, expected);
}

#[test]
fn test_response_with_wrong_instance_id_is_dropped() {
    let mut ua = ua_node();
    let mut fd = fd_node();

    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
    let req_len = ua
        .generate_request(FD_EID, FwupRequest::QueryDeviceIdentifiers, &mut buf)
        .unwrap();
    let MsgDisposition::Emit(resp_len) = fd.process_message(UA_EID, &mut buf, req_len).unwrap()
    else {
        panic!("expected a reply");
    };

    let good = buf[..resp_len].to_vec();

    // Corrupt the instance ID.
    buf[1] = (buf[1] & !0x1F) | ((buf[1].wrapping_add(1)) & 0x1F);
    assert_eq!(
        ua.process_message(FD_EID, &mut buf, resp_len),
        Err(FwupError::UnexpectedInstanceId)
    );

    // The pairing stays armed; the genuine response still lands.
    buf[..resp_len].copy_from_slice(&good);
    assert_eq!(
        ua.process_message(FD_EID, &mut buf, resp_len).unwrap(),
        MsgDisposition::NoReply
    );
    assert_eq!(ua.devices().records[0].pci_vid, 0x8086);
}

#[test]
fn test_cancel_from_download() {
    let mut ua = ua_node();
    let mut fd = fd_node();
    drive_to_download(&mut ua, &mut fd);

    exchange(&mut ua, UA_EID, &mut fd, FD_EID, FwupRequest::CancelUpdate);
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::Idle);
    assert_eq!(ua.session_status(FD_EID).state, FirmwareDeviceState::Idle);

    // A stale RequestFirmwareData after teardown is refused.
    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
    pldm_protocol::mctp::frame_pldm_msg(&mut buf).unwrap();
    let req = RequestFirmwareDataRequest::new(9, PldmMsgType::Request, 0, 32);
    let n = req.encode(&mut buf[1..]).unwrap();
    let MsgDisposition::Emit(resp_len) = ua.process_message(FD_EID, &mut buf, 1 + n).unwrap()
    else {
        panic!("expected a failure reply");
    };
    let resp = PldmFailureResponse::decode(&buf[1..resp_len]).unwrap();
    assert_eq!(
        resp.completion_code,
        FwUpdateCompletionCode::NotInUpdateMode as u8
    );
}

#[test]
fn test_control_command_timeout() {
    let mut ua = ua_node();
    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];

    ua.tick(1_000);
    ua.generate_request(FD_EID, FwupRequest::QueryDeviceIdentifiers, &mut buf)
        .unwrap();
    assert_eq!(
        ua.generate_request(FD_EID, FwupRequest::GetFirmwareParameters, &mut buf),
        Err(FwupError::RequestInFlight)
    );

    ua.tick(7_000);
    assert_eq!(
        ua.session_status(FD_EID).completion_code,
        FwUpdateCompletionCode::RetryRequestUpdate as u8
    );
    // The slot is free again.
    ua.generate_request(FD_EID, FwupRequest::QueryDeviceIdentifiers, &mut buf)
        .unwrap();
}

#[test]
fn test_download_timeout_parks_session_in_ready_xfer() {
    let mut ua = ua_node();
    let mut fd = fd_node();
    drive_to_download(&mut ua, &mut fd);

    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
    fd.generate_request(UA_EID, FwupRequest::RequestFirmwareData, &mut buf)
        .unwrap();
    fd.tick(200_000);

    let status = fd.session_status(UA_EID);
    assert_eq!(status.state, FirmwareDeviceState::ReadyXfer);
    assert_eq!(
        status.completion_code,
        FwUpdateCompletionCode::RetryRequestFwData as u8
    );
}

#[test]
fn test_out_of_order_command_rejected() {
    let mut ua = ua_node();
    let mut fd = fd_node();

    // UpdateComponent straight from Idle: no session yet.
    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
    pldm_protocol::mctp::frame_pldm_msg(&mut buf).unwrap();
    let req = pldm_protocol::messages::update::UpdateComponentRequest::new(
        0,
        PldmMsgType::Request,
        ComponentClassification::Firmware,
        0x0001,
        0,
        0x0101,
        IMAGE_LEN as u32,
        pldm_protocol::firmware_update::UpdateOptionFlags(0),
        &ascii("rot-fw-1.1"),
    );
    let n = req.encode(&mut buf[1..]).unwrap();
    let MsgDisposition::Emit(resp_len) = fd.process_message(UA_EID, &mut buf, 1 + n).unwrap()
    else {
        panic!("expected a failure reply");
    };
    let resp = PldmFailureResponse::decode(&buf[1..resp_len]).unwrap();
    assert_eq!(
        resp.completion_code,
        FwUpdateCompletionCode::NotInUpdateMode as u8
    );

    // PassComponentTable while in ReadyXfer: wrong state for the command.
    exchange(
        &mut ua,
        UA_EID,
        &mut fd,
        FD_EID,
        FwupRequest::RequestUpdate(request_update_params()),
    );
    exchange(
        &mut ua,
        UA_EID,
        &mut fd,
        FD_EID,
        FwupRequest::PassComponentTable {
            component: &component(),
            transfer_flag: TransferRespFlag::StartAndEnd,
        },
    );
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::ReadyXfer);

    let mut buf = [0u8; MAX_MCTP_PLDM_MSG_SIZE];
    pldm_protocol::mctp::frame_pldm_msg(&mut buf).unwrap();
    let req = pldm_protocol::messages::update::PassComponentTableRequest::new(
        7,
        PldmMsgType::Request,
        TransferRespFlag::StartAndEnd as u8,
        ComponentClassification::Firmware,
        0x0001,
        0,
        0x0101,
        &ascii("rot-fw-1.1"),
    );
    let n = req.encode(&mut buf[1..]).unwrap();
    let MsgDisposition::Emit(resp_len) = fd.process_message(UA_EID, &mut buf, 1 + n).unwrap()
    else {
        panic!("expected a failure reply");
    };
    let resp = PldmFailureResponse::decode(&buf[1..resp_len]).unwrap();
    assert_eq!(
        resp.completion_code,
        FwUpdateCompletionCode::InvalidStateForCommand as u8
    );
    assert_eq!(fd.session_status(UA_EID).state, FirmwareDeviceState::ReadyXfer);
}
