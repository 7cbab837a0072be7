/// Errors from loading preset reference data.
#[derive(Debug, thiserror::Error)]
pub enum PresetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid {file}: {reason}")]
    Parse { file: String, reason: String },
}

/// Result alias for preset operations.
pub type PresetResult<T> = Result<T, PresetError>;
