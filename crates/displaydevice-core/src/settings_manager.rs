use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::guards::{AudioContextGuard, DisplayModeGuard, HdrStateGuard, PrimaryDeviceGuard, TopologyGuard};
use crate::persistent_state::PersistentState;
use crate::result::{Error, Result};
use crate::state::{InitialState, ModifiedState, SingleDisplayConfigState};
use crate::topology;
use crate::traits::{AudioContextApi, DisplayDeviceApi, SettingsPersistence};
use crate::types::{
    DeviceDisplayModeMap, DevicePreparation, HdrStateMap, SingleDisplayConfiguration,
};

/// A transactional state machine over the OS display subsystem. Composes
/// several non-atomic OS operations into a single logical transaction with
/// rollback, and persists enough state across process lifetime to revert
/// after a crash.
pub struct SettingsManager {
    dd_api: Arc<dyn DisplayDeviceApi>,
    audio_api: Arc<dyn AudioContextApi>,
    /// Held for the entire body of `apply_settings` / `revert_settings`;
    /// there is no inner concurrency within one transaction.
    persistent_state: Mutex<PersistentState>,
}

impl SettingsManager {
    pub fn new(
        dd_api: Arc<dyn DisplayDeviceApi>,
        audio_api: Arc<dyn AudioContextApi>,
        persistence: Box<dyn SettingsPersistence>,
    ) -> Self {
        Self {
            dd_api,
            audio_api,
            persistent_state: Mutex::new(PersistentState::new(persistence)),
        }
    }

    /// Administrative escape hatch: drops persisted state without touching
    /// the OS. Intended for unrecoverable scenarios only.
    pub fn reset_persistence(&self) -> bool {
        let mut persistent_state = self.persistent_state.lock();
        persistent_state.persist_state(None).is_ok()
    }

    pub fn apply_settings(&self, request: &SingleDisplayConfiguration) -> Result<()> {
        validate_request(request)?;

        if !self.dd_api.is_api_access_available() {
            return Err(Error::ApiTemporarilyUnavailable);
        }

        let mut persistent_state = self.persistent_state.lock();

        let prior = match persistent_state.get_state() {
            Ok(state) => state,
            Err(err) => {
                warn!("discarding unreadable persisted state before apply: {}", err);
                None
            }
        };

        let current_topology = self.dd_api.get_current_topology();
        let devices = self.dd_api.enum_available_devices();

        if let Some(hdr) = request.hdr_state {
            let _ = hdr;
            let supports_hdr = devices
                .iter()
                .find(|d| d.id == request.device_id)
                .and_then(|d| d.info.as_ref())
                .map(|info| info.hdr_state.is_some())
                .unwrap_or(false);
            if !supports_hdr {
                return Err(Error::InvalidRequest(format!(
                    "device '{}' does not support HDR",
                    request.device_id
                )));
            }
        }

        let initial = match &prior {
            Some(state) => state.initial.clone(),
            None => InitialState {
                topology: current_topology.clone(),
                primary_device: topology::flatten(&current_topology)
                    .into_iter()
                    .find(|id| self.dd_api.is_primary(id))
                    .unwrap_or_default(),
            },
        };

        let target_topology = topology::compute_target_topology(request, &current_topology, &devices)?;

        if !self.dd_api.is_topology_valid(&target_topology) {
            return Err(Error::InvalidRequest("target topology rejected by display subsystem".into()));
        }

        debug!("applying topology for device '{}'", request.device_id);
        let topology_snapshot = current_topology.clone();
        let dd = self.dd_api.clone();
        let topology_guard = TopologyGuard::new(move || dd.set_topology(&topology_snapshot));

        if !self.dd_api.set_topology(&target_topology) {
            return Err(Error::DisplayDeviceFailure("failed to set topology".into()));
        }

        let mut modified = ModifiedState { topology: target_topology.clone(), ..Default::default() };

        let mut mode_guard: Option<DisplayModeGuard> = None;
        if request.resolution.is_some() || request.refresh_rate.is_some() {
            let flattened = topology::flatten(&target_topology);
            let current_modes = self.dd_api.get_current_display_modes(&flattened);
            let new_modes = merge_requested_mode(&current_modes, request);

            let snapshot = current_modes.clone();
            let dd = self.dd_api.clone();
            let guard = DisplayModeGuard::new(move || dd.set_display_modes(&snapshot));

            if !self.dd_api.set_display_modes(&new_modes) {
                return Err(Error::DisplayDeviceFailure("failed to set display modes".into()));
            }

            modified.original_modes = current_modes;
            mode_guard = Some(guard);
        }

        let mut hdr_guard: Option<HdrStateGuard> = None;
        if let Some(requested_hdr) = request.hdr_state {
            let flattened = topology::flatten(&target_topology);
            let current_hdr = self.dd_api.get_current_hdr_states(&flattened);
            let new_hdr = merge_requested_hdr(&current_hdr, &request.device_id, requested_hdr);

            let snapshot = current_hdr.clone();
            let dd = self.dd_api.clone();
            let guard = HdrStateGuard::new(move || dd.set_hdr_states(&snapshot));

            if !self.dd_api.set_hdr_states(&new_hdr) {
                return Err(Error::DisplayDeviceFailure("failed to set HDR state".into()));
            }

            modified.original_hdr_states = current_hdr;
            hdr_guard = Some(guard);
        }

        let mut primary_guard: Option<PrimaryDeviceGuard> = None;
        let mut primary_changed = false;
        if matches!(
            request.device_preparation,
            DevicePreparation::EnsurePrimary | DevicePreparation::EnsureOnlyDisplay
        ) {
            let flattened = topology::flatten(&target_topology);
            let current_primary =
                flattened.iter().find(|id| self.dd_api.is_primary(id)).cloned();

            primary_changed = current_primary.as_deref() != Some(request.device_id.as_str());

            if let Some(snapshot) = current_primary.clone() {
                let dd = self.dd_api.clone();
                primary_guard = Some(PrimaryDeviceGuard::new(move || dd.set_as_primary(&snapshot)));
            }

            if !self.dd_api.set_as_primary(&request.device_id) {
                return Err(Error::DisplayDeviceFailure("failed to set primary device".into()));
            }

            modified.original_primary_device = current_primary;
        }

        let mut audio_guard: Option<AudioContextGuard> = None;
        if primary_changed {
            if !self.audio_api.is_captured() {
                if !self.audio_api.capture() {
                    return Err(Error::DisplayDeviceFailure("failed to capture audio context".into()));
                }
                let audio = self.audio_api.clone();
                audio_guard = Some(AudioContextGuard::new(move || {
                    audio.release();
                    true
                }));
            }
        }

        let state = SingleDisplayConfigState { initial, modified };
        persistent_state.persist_state(Some(&state))?;

        // Commit: dismiss every guard in the order it was installed.
        topology_guard.dismiss();
        if let Some(guard) = mode_guard {
            guard.dismiss();
        }
        if let Some(guard) = hdr_guard {
            guard.dismiss();
        }
        if let Some(guard) = primary_guard {
            guard.dismiss();
        }
        if let Some(guard) = audio_guard {
            guard.dismiss();
        }

        Ok(())
    }

    /// Returns `true` if fully reverted or if there was nothing to revert;
    /// `false` if the revert failed and state is still owed. A subsequent
    /// call is a no-op returning `true`.
    pub fn revert_settings(&self) -> bool {
        let mut persistent_state = self.persistent_state.lock();

        let state = match persistent_state.get_state() {
            Ok(Some(state)) => state,
            Ok(None) => return true,
            Err(err) => {
                warn!("cannot revert: persisted state is unreadable: {}", err);
                return false;
            }
        };

        if !self.dd_api.is_api_access_available() {
            return false;
        }

        let current_topology = self.dd_api.get_current_topology();
        if !self.dd_api.is_topology_valid(&current_topology) {
            return false;
        }

        let mut working = state;

        let needs_modified_revert = !working.modified.original_hdr_states.is_empty()
            || !working.modified.original_modes.is_empty()
            || working.modified.original_primary_device.is_some();

        let mut topology_guard: Option<TopologyGuard> = None;

        if needs_modified_revert {
            let snapshot = current_topology.clone();
            let dd = self.dd_api.clone();
            topology_guard = Some(TopologyGuard::new(move || dd.set_topology(&snapshot)));

            if !self.dd_api.is_topology_valid(&working.modified.topology) {
                return false;
            }
            if !self.dd_api.set_topology(&working.modified.topology) {
                return false;
            }

            let mut hdr_guard: Option<HdrStateGuard> = None;
            if !working.modified.original_hdr_states.is_empty() {
                let flattened = topology::flatten(&working.modified.topology);
                let snapshot = self.dd_api.get_current_hdr_states(&flattened);
                let dd = self.dd_api.clone();
                hdr_guard = Some(HdrStateGuard::new(move || dd.set_hdr_states(&snapshot)));

                if !self.dd_api.set_hdr_states(&working.modified.original_hdr_states) {
                    return false;
                }
                working.modified.original_hdr_states = HdrStateMap::new();
            }

            let mut mode_guard: Option<DisplayModeGuard> = None;
            if !working.modified.original_modes.is_empty() {
                let flattened = topology::flatten(&working.modified.topology);
                let snapshot = self.dd_api.get_current_display_modes(&flattened);
                let dd = self.dd_api.clone();
                mode_guard = Some(DisplayModeGuard::new(move || dd.set_display_modes(&snapshot)));

                if !self.dd_api.set_display_modes(&working.modified.original_modes) {
                    return false;
                }
                working.modified.original_modes = DeviceDisplayModeMap::new();
            }

            let mut primary_guard: Option<PrimaryDeviceGuard> = None;
            if let Some(original_primary) = working.modified.original_primary_device.clone() {
                let flattened = topology::flatten(&working.modified.topology);
                let current_primary =
                    flattened.iter().find(|id| self.dd_api.is_primary(id)).cloned();
                if let Some(snapshot) = current_primary {
                    let dd = self.dd_api.clone();
                    primary_guard = Some(PrimaryDeviceGuard::new(move || dd.set_as_primary(&snapshot)));
                }

                if !self.dd_api.set_as_primary(&original_primary) {
                    return false;
                }
                working.modified.original_primary_device = None;
            }

            if persistent_state.persist_state(Some(&working)).is_err() {
                return false;
            }

            // These three slices are fully reverted and persisted; only the
            // topology guard must survive into restoring `initial` below.
            if let Some(guard) = hdr_guard {
                guard.dismiss();
            }
            if let Some(guard) = mode_guard {
                guard.dismiss();
            }
            if let Some(guard) = primary_guard {
                guard.dismiss();
            }
        }

        if !self.dd_api.is_topology_valid(&working.initial.topology) {
            return false;
        }
        if !self.dd_api.set_topology(&working.initial.topology) {
            return false;
        }

        if persistent_state.persist_state(None).is_err() {
            return false;
        }

        if self.audio_api.is_captured() {
            self.audio_api.release();
        }

        if let Some(guard) = topology_guard {
            guard.dismiss();
        }

        true
    }

    /// Convenience wrapper for callers that prefer a `Result` over the
    /// boolean `revert_settings` contract.
    pub fn try_revert_settings(&self) -> Result<()> {
        if self.revert_settings() {
            Ok(())
        } else {
            Err(Error::RevertIncomplete)
        }
    }
}

fn validate_request(request: &SingleDisplayConfiguration) -> Result<()> {
    if request.device_id.is_empty() {
        return Err(Error::InvalidRequest("device id must not be empty".into()));
    }
    if let Some(refresh) = request.refresh_rate {
        if !refresh.is_valid() {
            return Err(Error::InvalidRequest("refresh rate denominator must not be zero".into()));
        }
    }
    Ok(())
}

fn merge_requested_mode(
    current: &DeviceDisplayModeMap,
    request: &SingleDisplayConfiguration,
) -> DeviceDisplayModeMap {
    let mut updated = current.clone();
    if let Some(mode) = updated.get_mut(&request.device_id) {
        if let Some(resolution) = request.resolution {
            mode.resolution = resolution;
        }
        if let Some(refresh_rate) = request.refresh_rate {
            mode.refresh_rate = refresh_rate;
        }
    }
    updated
}

fn merge_requested_hdr(
    current: &HdrStateMap,
    device_id: &str,
    requested: crate::types::HdrState,
) -> HdrStateMap {
    let mut updated = current.clone();
    updated.insert(device_id.to_string(), Some(requested));
    updated
}
