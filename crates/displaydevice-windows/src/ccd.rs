use std::collections::HashMap;

use displaydevice_core::types::{
    ActiveTopology, DeviceDisplayModeMap, DeviceId, DisplayMode, EnumeratedDevice,
    EnumeratedDeviceInfo, HdrState, HdrStateMap, Point, Rational, Resolution,
};
use displaydevice_core::DisplayDeviceApi;
use log::{debug, warn};
use windows::core::Result as WinResult;
use windows::Win32::Devices::Display::{
    DisplayConfigGetDeviceInfo, DisplayConfigSetDeviceInfo, GetDisplayConfigBufferSizes,
    QueryDisplayConfig, SetDisplayConfig, DISPLAYCONFIG_DEVICE_INFO_GET_ADVANCED_COLOR_INFO,
    DISPLAYCONFIG_DEVICE_INFO_GET_SOURCE_NAME, DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME,
    DISPLAYCONFIG_DEVICE_INFO_HEADER, DISPLAYCONFIG_DEVICE_INFO_SET_ADVANCED_COLOR_STATE,
    DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO, DISPLAYCONFIG_MODE_INFO, DISPLAYCONFIG_PATH_INFO,
    DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE, DISPLAYCONFIG_SOURCE_DEVICE_NAME,
    DISPLAYCONFIG_TARGET_DEVICE_NAME, QDC_ONLY_ACTIVE_PATHS,
    SDC_APPLY, SDC_ALLOW_CHANGES, SDC_USE_SUPPLIED_DISPLAY_CONFIG,
};
use windows::Win32::Foundation::{ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::Graphics::Gdi::{
    ChangeDisplaySettingsExW, EnumDisplaySettingsExW, CDS_UPDATEREGISTRY, DEVMODEW,
    DISP_CHANGE_SUCCESSFUL, ENUM_CURRENT_SETTINGS,
};

/// Backs [`DisplayDeviceApi`] with the Windows Connecting and Configuring
/// Displays (CCD) API. Device ids are the stable CCD target device paths
/// (e.g. `\\?\DISPLAY#...#{e6f07b5f-ee97-4a90-b076-33f57bf4eaa7}`), not the
/// volatile `\\.\DISPLAYn` GDI names.
pub struct CcdDisplayDeviceApi;

impl CcdDisplayDeviceApi {
    pub fn new() -> Self {
        Self
    }

    fn query_active_config(&self) -> WinResult<(Vec<DISPLAYCONFIG_PATH_INFO>, Vec<DISPLAYCONFIG_MODE_INFO>)> {
        unsafe {
            let mut path_count = 0u32;
            let mut mode_count = 0u32;
            GetDisplayConfigBufferSizes(QDC_ONLY_ACTIVE_PATHS, &mut path_count, &mut mode_count)?;

            let mut paths = vec![DISPLAYCONFIG_PATH_INFO::default(); path_count as usize];
            let mut modes = vec![DISPLAYCONFIG_MODE_INFO::default(); mode_count as usize];
            QueryDisplayConfig(
                QDC_ONLY_ACTIVE_PATHS,
                &mut path_count,
                paths.as_mut_ptr(),
                &mut mode_count,
                modes.as_mut_ptr(),
                std::ptr::null_mut(),
            )?;
            paths.truncate(path_count as usize);
            modes.truncate(mode_count as usize);
            Ok((paths, modes))
        }
    }

    fn target_device_path(&self, adapter_id: windows::Win32::Foundation::LUID, target_id: u32) -> WinResult<String> {
        let mut target_name = DISPLAYCONFIG_TARGET_DEVICE_NAME::default();
        target_name.header = DISPLAYCONFIG_DEVICE_INFO_HEADER {
            r#type: DISPLAYCONFIG_DEVICE_INFO_GET_TARGET_NAME,
            size: std::mem::size_of::<DISPLAYCONFIG_TARGET_DEVICE_NAME>() as u32,
            adapterId: adapter_id,
            id: target_id,
        };
        unsafe {
            WIN32_ERROR(DisplayConfigGetDeviceInfo(&mut target_name.header) as u32)
                .ok()?;
        }
        Ok(widestring::U16CStr::from_slice_truncate(&target_name.monitorDevicePath)
            .map(|s| s.to_string_lossy())
            .unwrap_or_default())
    }

    fn source_gdi_name(&self, adapter_id: windows::Win32::Foundation::LUID, source_id: u32) -> WinResult<String> {
        let mut source_name = DISPLAYCONFIG_SOURCE_DEVICE_NAME::default();
        source_name.header = DISPLAYCONFIG_DEVICE_INFO_HEADER {
            r#type: DISPLAYCONFIG_DEVICE_INFO_GET_SOURCE_NAME,
            size: std::mem::size_of::<DISPLAYCONFIG_SOURCE_DEVICE_NAME>() as u32,
            adapterId: adapter_id,
            id: source_id,
        };
        unsafe {
            WIN32_ERROR(DisplayConfigGetDeviceInfo(&mut source_name.header) as u32)
                .ok()?;
        }
        Ok(widestring::U16CStr::from_slice_truncate(&source_name.viewGdiDeviceName)
            .map(|s| s.to_string_lossy())
            .unwrap_or_default())
    }

    /// Groups active paths by source: paths sharing a source are a clone group.
    fn topology_from_paths(&self, paths: &[DISPLAYCONFIG_PATH_INFO]) -> ActiveTopology {
        let mut groups: HashMap<(i32, u32, u32), Vec<DeviceId>> = HashMap::new();
        let mut order = Vec::new();

        for path in paths {
            let key = (
                path.sourceInfo.adapterId.HighPart,
                path.sourceInfo.adapterId.LowPart,
                path.sourceInfo.id,
            );
            let id = self
                .target_device_path(path.targetInfo.adapterId, path.targetInfo.id)
                .unwrap_or_default();
            if id.is_empty() {
                continue;
            }
            if !groups.contains_key(&key) {
                order.push(key);
            }
            groups.entry(key).or_default().push(id);
        }

        ActiveTopology::new(order.into_iter().map(|key| groups.remove(&key).unwrap_or_default()).collect())
    }

    /// Queries advanced-color state for a single target. `None` means the
    /// query itself failed, not that HDR is unsupported by the device.
    fn hdr_state_for(&self, adapter_id: windows::Win32::Foundation::LUID, target_id: u32) -> Option<HdrState> {
        let mut info = DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO::default();
        info.header = DISPLAYCONFIG_DEVICE_INFO_HEADER {
            r#type: DISPLAYCONFIG_DEVICE_INFO_GET_ADVANCED_COLOR_INFO,
            size: std::mem::size_of::<DISPLAYCONFIG_GET_ADVANCED_COLOR_INFO>() as u32,
            adapterId: adapter_id,
            id: target_id,
        };
        let queried = unsafe { DisplayConfigGetDeviceInfo(&mut info.header) };
        if queried != ERROR_SUCCESS.0 as i32 {
            return None;
        }
        let enabled = info.Anonymous.value & 0x2 != 0;
        Some(if enabled { HdrState::Enabled } else { HdrState::Disabled })
    }
}

impl Default for CcdDisplayDeviceApi {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayDeviceApi for CcdDisplayDeviceApi {
    fn is_api_access_available(&self) -> bool {
        self.query_active_config().is_ok()
    }

    fn get_current_topology(&self) -> ActiveTopology {
        match self.query_active_config() {
            Ok((paths, _)) => self.topology_from_paths(&paths),
            Err(err) => {
                warn!("failed to query display config: {}", err);
                ActiveTopology::empty()
            }
        }
    }

    fn is_topology_valid(&self, topology: &ActiveTopology) -> bool {
        !topology.is_empty() && displaydevice_core::topology::is_structurally_valid(topology)
    }

    fn set_topology(&self, topology: &ActiveTopology) -> bool {
        debug!("setting display topology ({} groups)", topology.groups().len());
        let Ok((paths, modes)) = self.query_active_config() else {
            return false;
        };

        let wanted: std::collections::HashSet<&str> =
            topology.groups().iter().flatten().map(String::as_str).collect();

        let mut filtered_paths = Vec::new();
        for path in &paths {
            if let Ok(id) = self.target_device_path(path.targetInfo.adapterId, path.targetInfo.id) {
                if wanted.contains(id.as_str()) {
                    filtered_paths.push(*path);
                }
            }
        }

        unsafe {
            let result = SetDisplayConfig(
                Some(&filtered_paths),
                Some(&modes),
                SDC_APPLY | SDC_USE_SUPPLIED_DISPLAY_CONFIG | SDC_ALLOW_CHANGES,
            );
            if result != ERROR_SUCCESS.0 as i32 {
                warn!("SetDisplayConfig failed with code {}", result);
                return false;
            }
        }
        true
    }

    fn get_current_display_modes(&self, device_ids: &[DeviceId]) -> DeviceDisplayModeMap {
        let mut modes = DeviceDisplayModeMap::new();
        for id in device_ids {
            if let Some(mode) = self.read_devmode(id) {
                modes.insert(id.clone(), mode);
            }
        }
        modes
    }

    fn set_display_modes(&self, modes: &DeviceDisplayModeMap) -> bool {
        let mut all_ok = true;
        for (device_id, mode) in modes {
            if !self.write_devmode(device_id, mode) {
                warn!("failed to set display mode for '{}'", device_id);
                all_ok = false;
            }
        }
        all_ok
    }

    fn get_current_hdr_states(&self, device_ids: &[DeviceId]) -> HdrStateMap {
        let mut states = HdrStateMap::new();
        let Ok((paths, _)) = self.query_active_config() else {
            return states;
        };

        for path in &paths {
            let Ok(id) = self.target_device_path(path.targetInfo.adapterId, path.targetInfo.id) else {
                continue;
            };
            if !device_ids.iter().any(|d| d == &id) {
                continue;
            }

            states.insert(id, self.hdr_state_for(path.targetInfo.adapterId, path.targetInfo.id));
        }
        states
    }

    fn set_hdr_states(&self, states: &HdrStateMap) -> bool {
        let Ok((paths, _)) = self.query_active_config() else {
            return false;
        };

        let mut all_ok = true;
        for path in &paths {
            let Ok(id) = self.target_device_path(path.targetInfo.adapterId, path.targetInfo.id) else {
                continue;
            };
            let Some(Some(wanted)) = states.get(&id) else { continue };

            let mut state = DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE::default();
            state.header = DISPLAYCONFIG_DEVICE_INFO_HEADER {
                r#type: DISPLAYCONFIG_DEVICE_INFO_SET_ADVANCED_COLOR_STATE,
                size: std::mem::size_of::<DISPLAYCONFIG_SET_ADVANCED_COLOR_STATE>() as u32,
                adapterId: path.targetInfo.adapterId,
                id: path.targetInfo.id,
            };
            state.Anonymous.value = (*wanted == HdrState::Enabled) as u32;

            let result = unsafe { DisplayConfigSetDeviceInfo(&state.header) };
            if result != ERROR_SUCCESS.0 as i32 {
                warn!("failed to set HDR state for '{}': code {}", id, result);
                all_ok = false;
            }
        }
        all_ok
    }

    fn is_primary(&self, device_id: &str) -> bool {
        let Ok((paths, _)) = self.query_active_config() else {
            return false;
        };
        paths.iter().any(|path| {
            self.target_device_path(path.targetInfo.adapterId, path.targetInfo.id)
                .map(|id| id == device_id)
                .unwrap_or(false)
                && path.sourceInfo.Anonymous.statusFlags & 0x1 != 0
        })
    }

    fn set_as_primary(&self, device_id: &str) -> bool {
        let Ok((paths, _)) = self.query_active_config() else {
            return false;
        };
        let Some(path) = paths.iter().find(|p| {
            self.target_device_path(p.targetInfo.adapterId, p.targetInfo.id)
                .map(|id| id == device_id)
                .unwrap_or(false)
        }) else {
            return false;
        };

        let Ok(gdi_name) = self.source_gdi_name(path.sourceInfo.adapterId, path.sourceInfo.id) else {
            return false;
        };

        // Moving the top-left origin of the target source to (0, 0) is how the
        // Windows display control panel itself designates the primary monitor.
        let mut devmode = DEVMODEW::default();
        devmode.dmSize = std::mem::size_of::<DEVMODEW>() as u16;
        let name: widestring::U16CString = widestring::U16CString::from_str_truncate(&gdi_name);
        unsafe {
            let result = ChangeDisplaySettingsExW(
                windows::core::PCWSTR(name.as_ptr()),
                Some(&mut devmode),
                None,
                CDS_UPDATEREGISTRY,
                None,
            );
            result == DISP_CHANGE_SUCCESSFUL
        }
    }

    fn enum_available_devices(&self) -> Vec<EnumeratedDevice> {
        let Ok((paths, _)) = self.query_active_config() else {
            return Vec::new();
        };

        paths
            .iter()
            .filter_map(|path| {
                let id = self.target_device_path(path.targetInfo.adapterId, path.targetInfo.id).ok()?;
                let mode = self.read_devmode(&id);
                let hdr_state = self.hdr_state_for(path.targetInfo.adapterId, path.targetInfo.id);
                Some(EnumeratedDevice {
                    display_name: id.clone(),
                    serial_number: id.clone(),
                    info: mode.map(|m| EnumeratedDeviceInfo {
                        resolution: m.resolution,
                        dpi_x: 96.0,
                        dpi_y: 96.0,
                        primary: path.sourceInfo.Anonymous.statusFlags & 0x1 != 0,
                        origin: Point::default(),
                        hdr_state,
                    }),
                    id,
                })
            })
            .collect()
    }
}

impl CcdDisplayDeviceApi {
    fn read_devmode(&self, device_id: &str) -> Option<DisplayMode> {
        let (paths, _) = self.query_active_config().ok()?;
        let path = paths.iter().find(|p| {
            self.target_device_path(p.targetInfo.adapterId, p.targetInfo.id)
                .map(|id| id == device_id)
                .unwrap_or(false)
        })?;
        let gdi_name = self.source_gdi_name(path.sourceInfo.adapterId, path.sourceInfo.id).ok()?;
        let name = widestring::U16CString::from_str_truncate(&gdi_name);

        let mut devmode = DEVMODEW::default();
        devmode.dmSize = std::mem::size_of::<DEVMODEW>() as u16;
        let ok = unsafe {
            EnumDisplaySettingsExW(
                windows::core::PCWSTR(name.as_ptr()),
                ENUM_CURRENT_SETTINGS,
                &mut devmode,
                0,
            )
        };
        if !ok.as_bool() {
            return None;
        }

        Some(DisplayMode {
            resolution: Resolution { width: devmode.dmPelsWidth, height: devmode.dmPelsHeight },
            refresh_rate: Rational::new(devmode.dmDisplayFrequency, 1)?,
        })
    }

    fn write_devmode(&self, device_id: &str, mode: &DisplayMode) -> bool {
        let Some((paths, _)) = self.query_active_config().ok() else { return false };
        let Some(path) = paths.iter().find(|p| {
            self.target_device_path(p.targetInfo.adapterId, p.targetInfo.id)
                .map(|id| id == device_id)
                .unwrap_or(false)
        }) else {
            return false;
        };
        let Ok(gdi_name) = self.source_gdi_name(path.sourceInfo.adapterId, path.sourceInfo.id) else {
            return false;
        };
        let name = widestring::U16CString::from_str_truncate(&gdi_name);

        let mut devmode = DEVMODEW::default();
        devmode.dmSize = std::mem::size_of::<DEVMODEW>() as u16;
        devmode.dmPelsWidth = mode.resolution.width;
        devmode.dmPelsHeight = mode.resolution.height;
        devmode.dmDisplayFrequency = mode.refresh_rate.numerator / mode.refresh_rate.denominator.max(1);

        unsafe {
            ChangeDisplaySettingsExW(
                windows::core::PCWSTR(name.as_ptr()),
                Some(&mut devmode),
                None,
                CDS_UPDATEREGISTRY,
                None,
            ) == DISP_CHANGE_SUCCESSFUL
        }
    }
}
