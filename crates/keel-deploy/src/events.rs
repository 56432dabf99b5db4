use chrono::{DateTime, Utc};
use keel_core::types::PackageState;
use serde::{Deserialize, Serialize};

/// Package lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeploymentEvent {
    /// Bundle picked up for deployment
    DeployStarted {
        bundle_name: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        version: Option<String>,
    },

    /// Every handler succeeded
    DeployCompleted {
        bundle_name: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        version: Option<String>,
        artifact_count: usize,
        duration_ms: u64,
    },

    /// A handler failed and the package was rolled back
    DeployFailed {
        bundle_name: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        version: Option<String>,
        handler: String,
        error_message: String,
        duration_ms: u64,
    },

    /// Bundle ignored without touching any registry
    DeploySkipped { bundle_name: String, reason: String },

    /// Dependencies left unresolved
    NotReady {
        bundle_name: String,
        missing: Vec<String>,
    },

    UndeployStarted { bundle_name: String },

    UndeployCompleted {
        bundle_name: String,
        handler_failures: Vec<String>,
    },

    /// A faulty bundle was removed from the fault registry
    FaultCleared { bundle_name: String },
}

impl DeploymentEvent {
    /// The `type` tag used in the journal
    pub fn type_name(&self) -> &'static str {
        match self {
            DeploymentEvent::DeployStarted { .. } => "deploy_started",
            DeploymentEvent::DeployCompleted { .. } => "deploy_completed",
            DeploymentEvent::DeployFailed { .. } => "deploy_failed",
            DeploymentEvent::DeploySkipped { .. } => "deploy_skipped",
            DeploymentEvent::NotReady { .. } => "not_ready",
            DeploymentEvent::UndeployStarted { .. } => "undeploy_started",
            DeploymentEvent::UndeployCompleted { .. } => "undeploy_completed",
            DeploymentEvent::FaultCleared { .. } => "fault_cleared",
        }
    }
}

/// Event metadata envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID (UUID v4)
    pub event_id: String,

    /// Event timestamp (UTC)
    pub timestamp: DateTime<Utc>,

    /// Package the event is about (for indexing)
    pub package_name: String,

    /// Library version that published the event
    pub keel_version: String,

    pub state_before: Option<PackageState>,

    pub state_after: PackageState,

    pub event: DeploymentEvent,
}

impl EventEnvelope {
    pub fn new(
        package_name: impl Into<String>,
        state_before: Option<PackageState>,
        state_after: PackageState,
        event: DeploymentEvent,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            package_name: package_name.into(),
            keel_version: env!("CARGO_PKG_VERSION").to_string(),
            state_before,
            state_after,
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_completed_serialization() {
        let event = DeploymentEvent::DeployCompleted {
            bundle_name: "orderapp_1.0.0.car".to_string(),
            version: None,
            artifact_count: 2,
            duration_ms: 12,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"deploy_completed""#));
        assert!(!json.contains("version"));

        let deserialized: DeploymentEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, deserialized);
        assert_eq!(event.type_name(), "deploy_completed");
    }

    #[test]
    fn test_envelope_ids_are_unique() {
        let event = DeploymentEvent::UndeployStarted {
            bundle_name: "a.car".to_string(),
        };
        let first = EventEnvelope::new("a", Some(PackageState::Deployed), PackageState::Undeploying, event.clone());
        let second = EventEnvelope::new("a", None, PackageState::Undeploying, event);
        assert_ne!(first.event_id, second.event_id);
    }
}
