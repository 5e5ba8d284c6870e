use crate::types::{
    ActiveTopology, DeviceDisplayModeMap, DeviceId, EnumeratedDevice, HdrStateMap,
};

/// Queries and mutates the live OS display state. Pure side-effecting
/// interface; it holds no memory of its own.
#[cfg_attr(test, mockall::automock)]
pub trait DisplayDeviceApi: Send + Sync {
    fn is_api_access_available(&self) -> bool;
    fn get_current_topology(&self) -> ActiveTopology;
    fn is_topology_valid(&self, topology: &ActiveTopology) -> bool;
    fn set_topology(&self, topology: &ActiveTopology) -> bool;
    fn get_current_display_modes(&self, device_ids: &[DeviceId]) -> DeviceDisplayModeMap;
    fn set_display_modes(&self, modes: &DeviceDisplayModeMap) -> bool;
    fn get_current_hdr_states(&self, device_ids: &[DeviceId]) -> HdrStateMap;
    fn set_hdr_states(&self, states: &HdrStateMap) -> bool;
    fn is_primary(&self, device_id: &str) -> bool;
    fn set_as_primary(&self, device_id: &str) -> bool;
    fn enum_available_devices(&self) -> Vec<EnumeratedDevice>;
}

/// Idempotent-on-the-captured-side audio capture lifecycle.
#[cfg_attr(test, mockall::automock)]
pub trait AudioContextApi: Send + Sync {
    fn capture(&self) -> bool;
    fn release(&self);
    fn is_captured(&self) -> bool;
}

/// A key/value blob store. The core treats the blob as opaque bytes; only
/// `PersistentState` knows its shape.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsPersistence: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, blob: String) -> bool;
    fn clear(&self) -> bool;
}
