#![deny(clippy::all)]
#![cfg(windows)]

mod audio;
mod ccd;
mod persistence;

use std::sync::Arc;

use displaydevice_core::SettingsManager;

pub use audio::WasapiAudioContextApi;
pub use ccd::CcdDisplayDeviceApi;
pub use persistence::FileSettingsPersistence;

/// Builds a [`SettingsManager`] wired to the real Windows display and audio
/// subsystems, persisting to the per-user local data directory.
pub fn create_settings_manager() -> Option<SettingsManager> {
    let persistence = FileSettingsPersistence::new()?;
    Some(SettingsManager::new(
        Arc::new(CcdDisplayDeviceApi::new()),
        Arc::new(WasapiAudioContextApi::new()),
        Box::new(persistence),
    ))
}
