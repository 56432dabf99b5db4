//! Package lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a package as it moves through the deploy pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageState {
    /// Bundle unpacked into its working directory
    Extracted,
    /// Root descriptor parsed
    DescriptorBuilt,
    /// Artifacts discovered and the dependency tree linked
    DependenciesResolved,
    /// Every dependency in the tree is satisfied
    Ready,
    /// At least one dependency could not be satisfied
    NotReady,
    /// Deployment handlers are running
    HandlersRunning,
    /// All handlers succeeded
    Deployed,
    /// A handler failed and the reverse chain was run
    RolledBack,
    /// Recorded in the fault registry
    Faulty,
    /// Undeploy handlers are running
    Undeploying,
    /// No longer tracked anywhere
    Removed,
}

impl PackageState {
    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(self, next: PackageState) -> bool {
        use PackageState::*;
        matches!(
            (self, next),
            (Extracted, DescriptorBuilt)
                | (DescriptorBuilt, DependenciesResolved)
                | (DependenciesResolved, Ready)
                | (DependenciesResolved, NotReady)
                | (Ready, HandlersRunning)
                | (HandlersRunning, Deployed)
                | (HandlersRunning, RolledBack)
                | (RolledBack, Faulty)
                | (Deployed, Undeploying)
                | (Undeploying, Removed)
                | (Faulty, Removed)
                | (NotReady, Removed)
        )
    }

    /// Terminal states never transition again
    pub fn is_terminal(self) -> bool {
        matches!(self, PackageState::Removed)
    }
}

impl fmt::Display for PackageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PackageState::Extracted => "extracted",
            PackageState::DescriptorBuilt => "descriptor-built",
            PackageState::DependenciesResolved => "dependencies-resolved",
            PackageState::Ready => "ready",
            PackageState::NotReady => "not-ready",
            PackageState::HandlersRunning => "handlers-running",
            PackageState::Deployed => "deployed",
            PackageState::RolledBack => "rolled-back",
            PackageState::Faulty => "faulty",
            PackageState::Undeploying => "undeploying",
            PackageState::Removed => "removed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            PackageState::Extracted,
            PackageState::DescriptorBuilt,
            PackageState::DependenciesResolved,
            PackageState::Ready,
            PackageState::HandlersRunning,
            PackageState::Deployed,
            PackageState::Undeploying,
            PackageState::Removed,
        ];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_fault_path_transitions() {
        assert!(PackageState::HandlersRunning.can_transition_to(PackageState::RolledBack));
        assert!(PackageState::RolledBack.can_transition_to(PackageState::Faulty));
        assert!(PackageState::Faulty.can_transition_to(PackageState::Removed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!PackageState::Extracted.can_transition_to(PackageState::Deployed));
        assert!(!PackageState::NotReady.can_transition_to(PackageState::HandlersRunning));
        assert!(!PackageState::Faulty.can_transition_to(PackageState::Deployed));
        assert!(!PackageState::Removed.can_transition_to(PackageState::Extracted));
        assert!(PackageState::Removed.is_terminal());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&PackageState::HandlersRunning).unwrap();
        assert_eq!(json, r#""handlers_running""#);
    }
}
