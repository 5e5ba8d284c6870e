use std::collections::HashSet;

use crate::result::{Error, Result};
use crate::types::{ActiveTopology, DeviceId, DevicePreparation, EnumeratedDevice, SingleDisplayConfiguration};

/// The flat, deduplicated list of device-ids appearing in any group, in
/// first-seen order.
pub fn flatten(topology: &ActiveTopology) -> Vec<DeviceId> {
    let mut seen = HashSet::new();
    let mut flattened = Vec::new();
    for group in topology.groups() {
        for id in group {
            if seen.insert(id.clone()) {
                flattened.push(id.clone());
            }
        }
    }
    flattened
}

/// A device-id may not appear in two groups, and every group must be non-empty.
pub fn is_structurally_valid(topology: &ActiveTopology) -> bool {
    let mut seen = HashSet::new();
    for group in topology.groups() {
        if group.is_empty() {
            return false;
        }
        for id in group {
            if !seen.insert(id) {
                return false;
            }
        }
    }
    true
}

fn device_present(topology: &ActiveTopology, device_id: &str) -> bool {
    flatten(topology).iter().any(|id| id == device_id)
}

/// Step 3 of `applySettings`: compute the topology the transaction should
/// drive the OS towards, given the request, the live topology, and the
/// enumerated devices.
pub fn compute_target_topology(
    request: &SingleDisplayConfiguration,
    current: &ActiveTopology,
    devices: &[EnumeratedDevice],
) -> Result<ActiveTopology> {
    if !devices.iter().any(|d| d.id == request.device_id) {
        return Err(Error::InvalidRequest(format!(
            "device '{}' is not among the enumerated devices",
            request.device_id
        )));
    }

    match request.device_preparation {
        DevicePreparation::VerifyOnly => Ok(current.clone()),
        DevicePreparation::EnsureActive | DevicePreparation::EnsurePrimary => {
            if device_present(current, &request.device_id) {
                Ok(current.clone())
            } else {
                let mut groups = current.groups().to_vec();
                groups.push(vec![request.device_id.clone()]);
                Ok(ActiveTopology::new(groups))
            }
        }
        DevicePreparation::EnsureOnlyDisplay => Ok(ActiveTopology::single(request.device_id.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str) -> EnumeratedDevice {
        EnumeratedDevice {
            id: id.to_string(),
            display_name: id.to_string(),
            serial_number: id.to_string(),
            info: None,
        }
    }

    fn request(device_id: &str, prep: DevicePreparation) -> SingleDisplayConfiguration {
        SingleDisplayConfiguration {
            device_id: device_id.to_string(),
            device_preparation: prep,
            resolution: None,
            refresh_rate: None,
            hdr_state: None,
        }
    }

    #[test]
    fn flatten_dedupes_across_groups() {
        let topology = ActiveTopology::new(vec![
            vec!["A".to_string(), "B".to_string()],
            vec!["C".to_string()],
        ]);
        assert_eq!(flatten(&topology), vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[test]
    fn structural_validity_rejects_duplicate_device_across_groups() {
        let topology = ActiveTopology::new(vec![vec!["A".to_string()], vec!["A".to_string()]]);
        assert!(!is_structurally_valid(&topology));
    }

    #[test]
    fn structural_validity_rejects_empty_group() {
        let topology = ActiveTopology::new(vec![vec![]]);
        assert!(!is_structurally_valid(&topology));
    }

    #[test]
    fn verify_only_rejects_absent_device() {
        let current = ActiveTopology::single("A");
        let err = compute_target_topology(&request("Z", DevicePreparation::VerifyOnly), &current, &[device("A")])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn ensure_active_extends_topology() {
        let current = ActiveTopology::single("A");
        let target = compute_target_topology(
            &request("B", DevicePreparation::EnsureActive),
            &current,
            &[device("A"), device("B")],
        )
        .unwrap();
        assert_eq!(target.groups(), &[vec!["A".to_string()], vec!["B".to_string()]]);
    }

    #[test]
    fn ensure_active_is_noop_when_already_present() {
        let current = ActiveTopology::single("A");
        let target = compute_target_topology(
            &request("A", DevicePreparation::EnsureActive),
            &current,
            &[device("A")],
        )
        .unwrap();
        assert_eq!(target, current);
    }

    #[test]
    fn ensure_only_display_collapses_topology() {
        let current = ActiveTopology::new(vec![vec!["A".to_string(), "B".to_string()]]);
        let target = compute_target_topology(
            &request("B", DevicePreparation::EnsureOnlyDisplay),
            &current,
            &[device("A"), device("B")],
        )
        .unwrap();
        assert_eq!(target, ActiveTopology::single("B"));
    }
}
