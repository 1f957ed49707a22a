// Licensed under the Apache-2.0 license

//! A component entry as carried by PassComponentTable / UpdateComponent, and
//! the eligibility check against the device's component parameter table.

use pldm_protocol::firmware_update::{
    ComponentResponseCode, UpdateOptionFlags, VersionString,
};
use pldm_protocol::messages::inventory::FirmwareParameters;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FirmwareComponent {
    pub classification: u16,
    pub identifier: u16,
    pub classification_index: u8,
    pub comparison_stamp: u32,
    pub version: VersionString,
    pub image_size: Option<u32>,
    pub option_flags: Option<UpdateOptionFlags>,
}

impl FirmwareComponent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classification: u16,
        identifier: u16,
        classification_index: u8,
        comparison_stamp: u32,
        version: VersionString,
        image_size: Option<u32>,
        option_flags: Option<UpdateOptionFlags>,
    ) -> Self {
        FirmwareComponent {
            classification,
            identifier,
            classification_index,
            comparison_stamp,
            version,
            image_size,
            option_flags,
        }
    }

    /// Evaluates whether this component may be applied to a device exposing
    /// `params`, per the DSP0267 response-code rules: the component must be
    /// known, and the offered comparison stamp and version must not regress
    /// the active image.
    pub fn update_eligibility(&self, params: &FirmwareParameters) -> ComponentResponseCode {
        let entry = params.components().iter().find(|entry| {
            entry.fixed.comp_classification == self.classification
                && entry.fixed.comp_identifier == self.identifier
                && entry.fixed.comp_classification_index == self.classification_index
        });

        let entry = match entry {
            Some(entry) => entry,
            None => return ComponentResponseCode::CompNotSupported,
        };

        let active_stamp = entry.fixed.active_comp_comparison_stamp;
        if self.comparison_stamp == active_stamp {
            ComponentResponseCode::CompComparisonStampIdentical
        } else if self.comparison_stamp < active_stamp {
            ComponentResponseCode::CompComparisonStampLower
        } else if self.version.as_bytes() == entry.active_ver.as_bytes() {
            ComponentResponseCode::CompVerStrIdentical
        } else {
            ComponentResponseCode::CompCanBeUpdated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pldm_protocol::firmware_update::{
        ComponentActivationMethods, ComponentClassification, ComponentParameterEntry,
        FdCapabilitiesDuringUpdate, VersionStringKind,
    };

    fn device_params() -> FirmwareParameters {
        let active = VersionString::new(VersionStringKind::Ascii, "rot-fw-1.0").unwrap();
        let pending = VersionString::new(VersionStringKind::Ascii, "rot-fw-1.1").unwrap();
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
        FirmwareParameters::new(FdCapabilitiesDuringUpdate(0), &active, &pending, &[entry])
            .unwrap()
    }

    fn offered(stamp: u32, version: &str) -> FirmwareComponent {
        FirmwareComponent::new(
            ComponentClassification::Firmware as u16,
            0x0001,
            0,
            stamp,
            VersionString::new(VersionStringKind::Ascii, version).unwrap(),
            None,
            None,
        )
    }

    #[test]
    fn test_eligible_component() {
        assert_eq!(
            offered(0x0101, "rot-fw-1.1").update_eligibility(&device_params()),
            ComponentResponseCode::CompCanBeUpdated
        );
    }

    #[test]
    fn test_stamp_regressions() {
        assert_eq!(
            offered(0x0100, "rot-fw-1.0").update_eligibility(&device_params()),
            ComponentResponseCode::CompComparisonStampIdentical
        );
        assert_eq!(
            offered(0x00FF, "rot-fw-0.9").update_eligibility(&device_params()),
            ComponentResponseCode::CompComparisonStampLower
        );
    }

    #[test]
    fn test_unknown_component() {
        let mut unknown = offered(0x0101, "rot-fw-1.1");
        unknown.identifier = 0x7777;
        assert_eq!(
            unknown.update_eligibility(&device_params()),
            ComponentResponseCode::CompNotSupported
        );
    }
}
