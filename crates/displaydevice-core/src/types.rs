use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A device identifier as reported by the OS display subsystem.
pub type DeviceId = String;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A refresh rate expressed as a fraction, e.g. 119.95 Hz as `{2398, 20}`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: u32,
    pub denominator: u32,
}

impl Rational {
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        if denominator == 0 {
            None
        } else {
            Some(Self { numerator, denominator })
        }
    }

    pub fn is_valid(&self) -> bool {
        self.denominator != 0
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HdrState {
    Enabled,
    Disabled,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayMode {
    pub resolution: Resolution,
    pub refresh_rate: Rational,
}

/// An ordered list of clone groups. Every device-id in the topology appears
/// in exactly one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTopology(Vec<Vec<DeviceId>>);

impl ActiveTopology {
    pub fn new(groups: Vec<Vec<DeviceId>>) -> Self {
        Self(groups)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn single(device_id: impl Into<DeviceId>) -> Self {
        Self(vec![vec![device_id.into()]])
    }

    pub fn groups(&self) -> &[Vec<DeviceId>] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub type HdrStateMap = BTreeMap<DeviceId, Option<HdrState>>;
pub type DeviceDisplayModeMap = BTreeMap<DeviceId, DisplayMode>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DevicePreparation {
    VerifyOnly,
    EnsureActive,
    EnsurePrimary,
    EnsureOnlyDisplay,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleDisplayConfiguration {
    pub device_id: DeviceId,
    pub device_preparation: DevicePreparation,
    pub resolution: Option<Resolution>,
    pub refresh_rate: Option<Rational>,
    pub hdr_state: Option<HdrState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumeratedDeviceInfo {
    pub resolution: Resolution,
    pub dpi_x: f32,
    pub dpi_y: f32,
    pub primary: bool,
    pub origin: Point,
    pub hdr_state: Option<HdrState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumeratedDevice {
    pub id: DeviceId,
    pub display_name: String,
    pub serial_number: String,
    pub info: Option<EnumeratedDeviceInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_info() -> EnumeratedDeviceInfo {
        EnumeratedDeviceInfo {
            resolution: Resolution { width: 1, height: 1 },
            dpi_x: 1.0,
            dpi_y: 1.0,
            primary: true,
            origin: Point { x: 1, y: 1 },
            hdr_state: None,
        }
    }

    #[test]
    fn devices_are_equal_only_when_every_field_matches() {
        let a = EnumeratedDevice {
            id: "1".to_string(),
            display_name: "1".to_string(),
            serial_number: "1".to_string(),
            info: Some(sample_info()),
        };
        let b = a.clone();
        assert_eq!(a, b);

        let mut different_serial = b.clone();
        different_serial.serial_number = "2".to_string();
        assert_ne!(a, different_serial);

        let mut different_info = b.clone();
        different_info.info = None;
        assert_ne!(a, different_info);
    }

    #[test]
    fn info_equality_considers_origin_and_hdr_state() {
        let mut other = sample_info();
        other.origin = Point { x: 0, y: 0 };
        assert_ne!(sample_info(), other);

        let mut with_hdr = sample_info();
        with_hdr.hdr_state = Some(HdrState::Enabled);
        assert_ne!(sample_info(), with_hdr);
    }

    #[test]
    fn rational_rejects_zero_denominator() {
        assert!(Rational::new(60, 0).is_none());
        assert_eq!(Rational::new(60, 1).unwrap().numerator, 60);
    }
}
