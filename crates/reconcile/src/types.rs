//! Core types for entity reconciliation

use serde::Serialize;
use serde_json::Value;

/// Desired presence of an entity on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Entity must exist and match the given attributes.
    Present,
    /// Entity must exist; attributes only apply on creation.
    PresentWithDefaults,
    /// Entity must not exist.
    Absent,
}

impl State {
    /// Check if the state requires the entity to exist
    pub fn wants_present(self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Present => "present",
            Self::PresentWithDefaults => "present_with_defaults",
            Self::Absent => "absent",
        };
        write!(f, "{name}")
    }
}

/// Result of converging one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Server state already matched the desired state
    Unchanged,
    /// Entity was created
    Created,
    /// Entity was updated in place
    Updated,
    /// Entity was deleted
    Deleted,
}

impl Outcome {
    /// Check if the outcome represents a change
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        };
        write!(f, "{name}")
    }
}

/// One recorded write: the attributes as they were and as they will be.
///
/// `before` is empty for creations and `after` is empty for deletions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    /// Plural resource name the write targets.
    pub resource: String,
    /// Attribute values before the write, limited to the keys that change.
    pub before: Value,
    /// Attribute values after the write.
    pub after: Value,
}

/// Result of a full reconciliation run for one entity.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Whether any write was performed (or would be, in check mode).
    /// Covers nested children, unlike `outcome`.
    pub changed: bool,
    /// What happened to the entity itself.
    pub outcome: Outcome,
    /// The entity after convergence, `None` when it ended up absent.
    pub entity: Option<Value>,
    /// Every write recorded during the run, in order.
    pub diff: Vec<DiffEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_wants_present() {
        assert!(State::Present.wants_present());
        assert!(State::PresentWithDefaults.wants_present());
        assert!(!State::Absent.wants_present());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(State::Present.to_string(), "present");
        assert_eq!(
            State::PresentWithDefaults.to_string(),
            "present_with_defaults"
        );
        assert_eq!(State::Absent.to_string(), "absent");
    }

    #[test]
    fn test_outcome_is_change() {
        assert!(!Outcome::Unchanged.is_change());
        assert!(Outcome::Created.is_change());
        assert!(Outcome::Updated.is_change());
        assert!(Outcome::Deleted.is_change());
    }
}
