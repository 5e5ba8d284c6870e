use crate::result::{Error, Result};
use crate::state::{deserialize_state, serialize_state, SingleDisplayConfigState};
use crate::traits::SettingsPersistence;

/// Thin wrapper that (de)serializes [`SingleDisplayConfigState`] to/from the
/// persistence blob and caches the last successfully-read value so repeated
/// reads within one process lifetime don't re-parse.
pub struct PersistentState {
    persistence: Box<dyn SettingsPersistence>,
    /// `None` = never loaded this process; `Some(None)` = loaded and
    /// confirmed empty (or confirmed unreadable, which is treated as empty
    /// for subsequent reads).
    cache: Option<Option<SingleDisplayConfigState>>,
}

impl PersistentState {
    pub fn new(persistence: Box<dyn SettingsPersistence>) -> Self {
        Self { persistence, cache: None }
    }

    pub fn get_state(&mut self) -> Result<Option<SingleDisplayConfigState>> {
        if let Some(cached) = &self.cache {
            return Ok(cached.clone());
        }

        let loaded = match self.persistence.load() {
            None => Ok(None),
            Some(blob) => deserialize_state(&blob).map(Some),
        };

        match loaded {
            Ok(state) => {
                self.cache = Some(state.clone());
                Ok(state)
            }
            Err(err) => {
                // Not silently overwritten: the caller sees the error once,
                // but later reads treat it as "no state" rather than
                // re-parsing the same bad payload.
                self.cache = Some(None);
                Err(err)
            }
        }
    }

    pub fn persist_state(&mut self, state: Option<&SingleDisplayConfigState>) -> Result<()> {
        let ok = match state {
            None => self.persistence.clear(),
            Some(state) => self.persistence.store(serialize_state(state)?),
        };

        if ok {
            self.cache = Some(state.cloned());
            Ok(())
        } else {
            Err(Error::PersistenceFailure(match state {
                None => "failed to clear persisted state".into(),
                Some(_) => "failed to store persisted state".into(),
            }))
        }
    }
}
