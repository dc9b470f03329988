use std::error::Error as StdError;

/// Classification of failures reported by a [`StorageEngine`].
///
/// The synchronization layer never inspects engine errors beyond these two
/// questions. Everything else is passed through to the caller verbatim.
///
/// [`StorageEngine`]: crate::StorageEngine
pub trait EngineError: StdError + Send + Sync + 'static {
    /// True if the error is the engine's "map resized" failure: another actor
    /// grew the map and the transaction's view of the file is stale.
    fn is_map_resized(&self) -> bool;

    /// True if the error was returned because the environment has not been
    /// opened yet (LMDB reports this as `EINVAL` from `mdb_env_get_flags`).
    fn is_not_open(&self) -> bool;
}

/// An error returned by a synchronized [`Environment`].
///
/// [`Environment`]: crate::Environment
#[derive(Debug, thiserror::Error)]
pub enum SyncError<E> {
    /// The engine reported an error. This includes a map-resized error that
    /// outlived the configured retry bound.
    #[error(transparent)]
    Engine(E),
    /// Adopting a new map size failed while the environment was locked for a
    /// resize. The environment is poisoned and must not be used further.
    #[error("fatal: failed to adopt the resized map: {0}")]
    ResizeFailed(#[source] E),
    /// A previous resize adoption failed. No further transactions are
    /// dispatched against this environment.
    #[error("environment poisoned by an earlier failed map resize")]
    Poisoned,
}

impl<E> SyncError<E> {
    /// True for errors the caller must treat as unrecoverable.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ResizeFailed(_) | Self::Poisoned)
    }

    /// Returns the engine error, if this is an ordinary engine failure.
    pub fn into_engine(self) -> Option<E> {
        match self {
            Self::Engine(e) => Some(e),
            _ => None,
        }
    }

    /// Returns a reference to the underlying engine error, fatal or not.
    pub const fn engine_error(&self) -> Option<&E> {
        match self {
            Self::Engine(e) | Self::ResizeFailed(e) => Some(e),
            Self::Poisoned => None,
        }
    }
}

impl<E: EngineError> SyncError<E> {
    /// True if the transaction gave up on a stale map, either because retries
    /// are disabled or because the retry bound was exhausted.
    pub fn is_map_resized(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_map_resized())
    }
}

impl<E: EngineError> From<E> for SyncError<E> {
    fn from(e: E) -> Self {
        Self::Engine(e)
    }
}

/// Result alias for synchronized environment operations.
pub type SyncResult<T, E> = Result<T, SyncError<E>>;
