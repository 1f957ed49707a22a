// Licensed under the Apache-2.0 license

//! MCTP binding for PLDM: every message is prefixed with a single MCTP
//! message-type byte (0x01). Framing, EID routing and retransmission belong
//! to the transport; only this byte is handled here.

use crate::base::PLDM_MSG_HEADER_LEN;
use crate::error::FramingError;
use bitfield::bitfield;

pub const MCTP_PLDM_MSG_TYPE: u8 = 0x01;
pub const MCTP_MSG_TYPE_OFFSET: usize = 0;
pub const PLDM_MSG_OFFSET: usize = 1;

bitfield! {
    #[derive(Copy, Clone, PartialEq)]
    pub struct MctpMessageHeader(u8);
    impl Debug;
    pub u8, ic, set_ic: 7, 7;
    pub u8, msg_type, set_msg_type: 6, 0;
}

/// Validates the MCTP message-type byte and returns the PLDM message window.
pub fn pldm_payload(mctp_payload: &mut [u8]) -> Result<&mut [u8], FramingError> {
    if mctp_payload.len() < PLDM_MSG_OFFSET + PLDM_MSG_HEADER_LEN {
        return Err(FramingError::PayloadTooShort);
    }

    let header = MctpMessageHeader(mctp_payload[MCTP_MSG_TYPE_OFFSET]);
    if header.ic() != 0 || header.msg_type() != MCTP_PLDM_MSG_TYPE {
        return Err(FramingError::NotPldm);
    }

    Ok(&mut mctp_payload[PLDM_MSG_OFFSET..])
}

/// Stamps the MCTP message-type byte and returns the window the PLDM message
/// should be encoded into.
pub fn frame_pldm_msg(mctp_payload: &mut [u8]) -> Result<&mut [u8], FramingError> {
    if mctp_payload.len() < PLDM_MSG_OFFSET + PLDM_MSG_HEADER_LEN {
        return Err(FramingError::PayloadTooShort);
    }

    let mut header = MctpMessageHeader(0);
    header.set_ic(0);
    header.set_msg_type(MCTP_PLDM_MSG_TYPE);
    mctp_payload[MCTP_MSG_TYPE_OFFSET] = header.0;

    Ok(&mut mctp_payload[PLDM_MSG_OFFSET..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pldm_payload() {
        let mut payload = [0u8; 8];
        assert_eq!(pldm_payload(&mut payload), Err(FramingError::NotPldm));

        payload[0] = MCTP_PLDM_MSG_TYPE;
        assert_eq!(pldm_payload(&mut payload).unwrap().len(), 7);

        let mut short = [MCTP_PLDM_MSG_TYPE; 3];
        assert_eq!(
            pldm_payload(&mut short),
            Err(FramingError::PayloadTooShort)
        );
    }

    #[test]
    fn test_frame_pldm_msg() {
        let mut payload = [0u8; 10];
        assert_eq!(frame_pldm_msg(&mut payload).unwrap().len(), 9);
        assert_eq!(payload[0], MCTP_PLDM_MSG_TYPE);
    }
}
