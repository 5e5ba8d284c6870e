use serde::{Deserialize, Serialize};

use crate::result::{Error, Result};
use crate::types::{ActiveTopology, DeviceDisplayModeMap, DeviceId, HdrStateMap};

const SCHEMA_VERSION: u32 = 1;

/// The slices the manager has changed on behalf of a session and must still
/// undo. Each `original_*` field is empty iff that slice was not modified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModifiedState {
    pub topology: ActiveTopology,
    #[serde(default, skip_serializing_if = "DeviceDisplayModeMap::is_empty")]
    pub original_modes: DeviceDisplayModeMap,
    #[serde(default, skip_serializing_if = "HdrStateMap::is_empty")]
    pub original_hdr_states: HdrStateMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_primary_device: Option<DeviceId>,
}

/// The user's pre-session state, captured once at first successful apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub topology: ActiveTopology,
    pub primary_device: DeviceId,
}

/// Persisted atomically. Its existence signals "a revert is owed to the user".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SingleDisplayConfigState {
    pub initial: InitialState,
    pub modified: ModifiedState,
}

#[derive(Serialize, Deserialize)]
struct PersistedEnvelope {
    schema_version: u32,
    #[serde(flatten)]
    state: SingleDisplayConfigState,
}

pub fn serialize_state(state: &SingleDisplayConfigState) -> Result<String> {
    let envelope = PersistedEnvelope { schema_version: SCHEMA_VERSION, state: state.clone() };
    serde_json::to_string(&envelope)
        .map_err(|err| Error::PersistenceFailure(format!("failed to serialize state: {}", err)))
}

pub fn deserialize_state(blob: &str) -> Result<SingleDisplayConfigState> {
    let envelope: PersistedEnvelope = serde_json::from_str(blob)
        .map_err(|err| Error::InvalidPersistedState(format!("malformed payload: {}", err)))?;

    if envelope.schema_version != SCHEMA_VERSION {
        return Err(Error::InvalidPersistedState(format!(
            "unknown schema version {}",
            envelope.schema_version
        )));
    }

    validate_state(&envelope.state)?;
    Ok(envelope.state)
}

fn validate_state(state: &SingleDisplayConfigState) -> Result<()> {
    if !crate::topology::is_structurally_valid(&state.modified.topology) {
        return Err(Error::InvalidPersistedState(
            "modified topology violates group invariants".into(),
        ));
    }
    if !crate::topology::is_structurally_valid(&state.initial.topology) {
        return Err(Error::InvalidPersistedState(
            "initial topology violates group invariants".into(),
        ));
    }
    if state.modified.topology.is_empty() {
        return Err(Error::InvalidPersistedState(
            "modified topology must not be empty while a state exists".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DisplayMode, HdrState, Rational, Resolution};

    fn sample_state() -> SingleDisplayConfigState {
        let mut original_modes = DeviceDisplayModeMap::new();
        original_modes.insert(
            "DeviceId2".to_string(),
            DisplayMode {
                resolution: Resolution { width: 123, height: 456 },
                refresh_rate: Rational::new(120, 1).unwrap(),
            },
        );

        let mut original_hdr_states = HdrStateMap::new();
        original_hdr_states.insert("DeviceId2".to_string(), Some(HdrState::Enabled));
        original_hdr_states.insert("DeviceId3".to_string(), None);

        SingleDisplayConfigState {
            initial: InitialState {
                topology: ActiveTopology::single("DeviceId4"),
                primary_device: "DeviceId4".to_string(),
            },
            modified: ModifiedState {
                topology: ActiveTopology::new(vec![vec![
                    "DeviceId2".to_string(),
                    "DeviceId3".to_string(),
                ]]),
                original_modes,
                original_hdr_states,
                original_primary_device: Some("DeviceId2".to_string()),
            },
        }
    }

    #[test]
    fn round_trips_through_serialization() {
        let state = sample_state();
        let blob = serialize_state(&state).unwrap();
        let restored = deserialize_state(&blob).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn omits_empty_optional_fields() {
        let mut state = sample_state();
        state.modified.original_modes.clear();
        state.modified.original_hdr_states.clear();
        state.modified.original_primary_device = None;

        let blob = serialize_state(&state).unwrap();
        assert!(!blob.contains("original_modes"));
        assert!(!blob.contains("original_hdr_states"));
        assert!(!blob.contains("original_primary_device"));

        let restored = deserialize_state(&blob).unwrap();
        assert_eq!(state, restored);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let state = sample_state();
        let mut value: serde_json::Value = serde_json::from_str(&serialize_state(&state).unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(999);
        let err = deserialize_state(&value.to_string()).unwrap_err();
        assert!(matches!(err, Error::InvalidPersistedState(_)));
    }

    #[test]
    fn rejects_empty_modified_topology() {
        let mut state = sample_state();
        state.modified.topology = ActiveTopology::empty();
        let blob = serialize_state(&state).unwrap();
        let err = deserialize_state(&blob).unwrap_err();
        assert!(matches!(err, Error::InvalidPersistedState(_)));
    }
}
