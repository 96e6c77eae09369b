//! Error types for lifecycle operations and snapshot handling.

use thiserror::Error;

use crate::model::{InstanceId, WindowId, WindowKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors raised by window and instance lifecycle operations.
///
/// Not-found variants can legitimately arise from races between a user gesture and an
/// asynchronous close; the session context logs and absorbs them.
pub enum LifecycleError {
    /// The window id is not (or no longer) registered.
    #[error("{0} not found")]
    WindowNotFound(WindowId),
    /// The instance id is not present in the window's instance list.
    #[error("{instance} not found in {}", window_label(.window))]
    InstanceNotFound {
        /// Owning window, when known.
        window: Option<WindowId>,
        /// Missing instance.
        instance: InstanceId,
    },
    /// The mount-point provider could not create a render target.
    #[error("no mount point available for {kind} window")]
    MissingMount {
        /// Kind of the window being opened.
        kind: WindowKind,
    },
    /// The window type caps its instance count and the cap is reached.
    #[error("instance limit of {limit} reached")]
    InstanceLimit {
        /// Configured cap.
        limit: usize,
    },
    /// An instance with the same id already exists in the window.
    #[error("duplicate {0}")]
    DuplicateInstance(InstanceId),
    /// A window type token does not name a known window kind.
    #[error("unknown window type `{0}`")]
    UnknownWindowKind(String),
}

fn window_label(window: &Option<WindowId>) -> String {
    window.map_or_else(|| "unknown window".to_string(), |id| id.to_string())
}

impl LifecycleError {
    /// Returns whether the error only reports a stale window/instance reference.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::WindowNotFound(_) | Self::InstanceNotFound { .. })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors raised while reading or writing a session snapshot.
pub enum SnapshotError {
    /// The persisted document is malformed or carries no version.
    #[error("corrupt session snapshot: {0}")]
    Corrupt(String),
    /// The persisted document was written by a newer schema.
    #[error("unsupported session snapshot version {0}")]
    UnsupportedVersion(u32),
    /// The key/value store failed.
    #[error("session storage failed: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn instance_not_found_names_the_window_when_known() {
        let known = LifecycleError::InstanceNotFound {
            window: Some(WindowId(4)),
            instance: InstanceId(2),
        };
        let unknown = LifecycleError::InstanceNotFound {
            window: None,
            instance: InstanceId(2),
        };
        assert_eq!(known.to_string(), "instance#2 not found in window#4");
        assert_eq!(unknown.to_string(), "instance#2 not found in unknown window");
        assert!(unknown.is_not_found());
    }
}
