use std::fs;
use std::path::PathBuf;

use directories::ProjectDirs;
use displaydevice_core::SettingsPersistence;
use log::{error, warn};

const STATE_FILE_NAME: &str = "session_state.json";

/// Persists the pending-revert blob as a single file under the per-user
/// local data directory, so it survives process crashes but not a clean
/// reinstall.
pub struct FileSettingsPersistence {
    path: PathBuf,
}

impl FileSettingsPersistence {
    pub fn new() -> Option<Self> {
        let dirs = ProjectDirs::from("", "", "displaydevice")?;
        let dir = dirs.data_local_dir().to_path_buf();
        if let Err(err) = fs::create_dir_all(&dir) {
            error!("failed to create state directory {}: {}", dir.display(), err);
            return None;
        }
        Some(Self { path: dir.join(STATE_FILE_NAME) })
    }
}

impl SettingsPersistence for FileSettingsPersistence {
    fn load(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!("failed to read persisted state from {}: {}", self.path.display(), err);
                None
            }
        }
    }

    fn store(&self, blob: String) -> bool {
        match fs::write(&self.path, blob) {
            Ok(()) => true,
            Err(err) => {
                error!("failed to write persisted state to {}: {}", self.path.display(), err);
                false
            }
        }
    }

    fn clear(&self) -> bool {
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => {
                error!("failed to remove persisted state at {}: {}", self.path.display(), err);
                false
            }
        }
    }
}
