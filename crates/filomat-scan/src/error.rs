use filomat_store::StoreError;
use filomat_tag::TagError;

use crate::session::ScanState;

/// Errors from scan workflows.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tag error: {0}")]
    Tag(#[from] TagError),

    /// The scanned tag does not belong to any known container.
    #[error("no container is bound to tag {tag}; create the container first")]
    UnknownContainer { tag: String },

    /// The action is not valid in the current state.
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: ScanState,
    },
}

/// Result alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;
