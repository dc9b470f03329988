use crate::{EngineError, EnvFlags, TxnFlags};
use std::path::Path;

/// Map size value that asks the engine to adopt the size currently configured
/// for the file, rather than setting a new one.
pub const ADOPT_MAP_SIZE: usize = 0;

/// The narrow interface consumed from an embedded, memory-mapped storage
/// engine.
///
/// Implementations wrap a single environment handle. Transaction execution,
/// page allocation, and the on-disk format are entirely the engine's concern;
/// [`Environment`] only decides *when* these methods may run.
///
/// # Contract
///
/// - `run_txn` must report a stale map as an error for which
///   [`EngineError::is_map_resized`] returns true, and must not have
///   committed anything when it does.
/// - `flags` on an unopened handle may fail with an error for which
///   [`EngineError::is_not_open`] returns true.
/// - `set_map_size(ADOPT_MAP_SIZE)` re-reads the current size of the file.
///
/// [`Environment`]: crate::Environment
pub trait StorageEngine: Send + Sync + Sized {
    /// Handle passed to transaction bodies.
    type Txn;

    /// Error type reported by every engine call.
    type Error: EngineError;

    /// Allocate a fresh, unopened environment handle.
    fn create() -> Result<Self, Self::Error>;

    /// Open the environment at `path`.
    fn open(&self, path: &Path, flags: EnvFlags, mode: u32) -> Result<(), Self::Error>;

    /// Currently active environment flags.
    fn flags(&self) -> Result<EnvFlags, Self::Error>;

    /// Set environment flags.
    fn set_flags(&self, flags: EnvFlags) -> Result<(), Self::Error>;

    /// Clear environment flags.
    fn unset_flags(&self, flags: EnvFlags) -> Result<(), Self::Error>;

    /// Run `op` inside a transaction begun with `flags`. The transaction
    /// commits if `op` returns `Ok` (or aborts, for read-only transactions)
    /// and aborts otherwise.
    fn run_txn<R, F>(&self, flags: TxnFlags, op: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&Self::Txn) -> Result<R, Self::Error>;

    /// Run `op` in a read-only transaction.
    fn view<R, F>(&self, op: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&Self::Txn) -> Result<R, Self::Error>,
    {
        self.run_txn(TxnFlags::RDONLY, op)
    }

    /// Run `op` in a read-write transaction.
    fn update<R, F>(&self, op: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&Self::Txn) -> Result<R, Self::Error>,
    {
        self.run_txn(TxnFlags::empty(), op)
    }

    /// Run `op` in a read-write transaction pinned to the calling OS thread.
    ///
    /// Engines whose write transactions are thread-bound override this; the
    /// default is [`StorageEngine::update`].
    fn update_locked<R, F>(&self, op: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&Self::Txn) -> Result<R, Self::Error>,
    {
        self.update(op)
    }

    /// Set the map size in bytes, or adopt the current size with
    /// [`ADOPT_MAP_SIZE`].
    fn set_map_size(&self, size: usize) -> Result<(), Self::Error>;
}
