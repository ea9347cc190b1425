//! Patch lifecycle events reported to the update service.
//!
//! Launch outcomes are interesting to the server (they drive rollout
//! decisions), but the moments they occur are exactly the moments the host
//! app may be about to abort. Events are therefore queued in the persisted
//! state document and drained over the network at the start of the next
//! update run, when the process is known to be healthy.

use crate::config::{current_arch, current_platform, UpdateConfig};
use serde::{Deserialize, Serialize};

/// What happened to a patch on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The patch booted successfully for the first time.
    PatchInstallSuccess,
    /// The patch failed to launch and was rolled back.
    PatchInstallFailure,
}

/// A single queued event, serialized into the state document and posted to
/// the update service as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchEvent {
    pub app_id: String,
    /// Unique id of this install, stable across release versions.
    pub client_id: String,
    pub release_version: String,
    pub patch_number: u64,
    pub platform: String,
    pub arch: String,
    #[serde(rename = "type")]
    pub identifier: EventType,
    /// Unix timestamp (seconds) of when the event was recorded.
    pub timestamp: i64,
}

impl PatchEvent {
    /// Builds an event for the given patch with the device fields filled in
    /// from the engine configuration.
    pub fn new(
        config: &UpdateConfig,
        client_id: &str,
        patch_number: u64,
        identifier: EventType,
    ) -> Self {
        Self {
            app_id: config.app_id.clone(),
            client_id: client_id.to_string(),
            release_version: config.release_version.clone(),
            patch_number,
            platform: current_platform().to_string(),
            arch: current_arch().to_string(),
            identifier,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_round_trips_through_json() {
        let json = serde_json::to_string(&EventType::PatchInstallFailure).unwrap();
        assert_eq!(json, "\"patch_install_failure\"");
        let back: EventType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EventType::PatchInstallFailure);
    }

    #[test]
    fn event_serializes_identifier_as_type() {
        let event = PatchEvent {
            app_id: "app".to_string(),
            client_id: "client".to_string(),
            release_version: "1.0.0".to_string(),
            patch_number: 3,
            platform: "linux".to_string(),
            arch: "x86_64".to_string(),
            identifier: EventType::PatchInstallSuccess,
            timestamp: 1_700_000_000,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"patch_install_success\""));
        assert!(json.contains("\"patch_number\":3"));
    }
}
