#![deny(clippy::all)]

pub use displaydevice_core::result::{Error, Result};
pub use displaydevice_core::types::*;
pub use displaydevice_core::SettingsManager;

#[cfg(windows)]
use displaydevice_windows::create_settings_manager as create_platform_settings_manager;

/// Builds a [`SettingsManager`] bound to the current platform's display and
/// audio backend, or `None` if the platform has no backend or the backend
/// failed to initialize (e.g. no writable state directory).
pub fn create_settings_manager() -> Option<SettingsManager> {
    #[cfg(windows)]
    {
        create_platform_settings_manager()
    }

    #[cfg(not(windows))]
    {
        None
    }
}
