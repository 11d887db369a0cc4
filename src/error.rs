use crate::pet::animation::AnimationName;

/// Failures of the persisted settings store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("settings io: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
}

/// Everything the runtime, relay and popup can report back to a caller.
#[derive(Debug, thiserror::Error)]
pub enum PetError {
    #[error("unknown animation: {0}")]
    UnknownAnimation(String),
    #[error("animation not available: {0}")]
    MissingAnimation(AnimationName),
    #[error("Unknown action: {0}")]
    UnknownCommand(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
    #[error("invalid sprite manifest: {0}")]
    InvalidManifest(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("page unreachable: {0}")]
    Unreachable(String),
}

/// Error taxonomy used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input from the caller. Reported back, state untouched.
    Configuration,
    /// Store read/write failed. Logged, in-memory state stays authoritative.
    Persistence,
    /// The page runtime could not be reached. Recoverable by the popup.
    Environment,
}

impl PetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PetError::UnknownAnimation(_)
            | PetError::MissingAnimation(_)
            | PetError::UnknownCommand(_)
            | PetError::Malformed(_)
            | PetError::InvalidSetting { .. }
            | PetError::InvalidManifest(_) => ErrorKind::Configuration,
            PetError::Store(_) => ErrorKind::Persistence,
            PetError::Unreachable(_) => ErrorKind::Environment,
        }
    }
}
