use parking_lot::RwLock;
use std::fmt;

/// How a dispatch holds the coordinator lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Shared with every other shared holder. Excludes map-size changes.
    Shared,
    /// Excludes every other holder.
    Exclusive,
}

impl Access {
    /// Access needed to run a transaction.
    ///
    /// Readers are always shared. Writers are shared while the engine's own
    /// locking serializes them, and exclusive once `NO_LOCK` leaves this
    /// layer as the only thing keeping them apart from everyone else.
    pub const fn for_txn(read_only: bool, lock_disabled: bool) -> Self {
        if !read_only && lock_disabled { Self::Exclusive } else { Self::Shared }
    }

    /// Access needed to change the map size. Always exclusive.
    pub const fn for_resize() -> Self {
        Self::Exclusive
    }

    /// Short label used in tracing fields.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Exclusive => "exclusive",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One readers-writer lock per environment, gating every transaction and
/// every map-size change.
///
/// The lock is not reentrant. Dispatching a transaction from inside a
/// transaction body on the same environment deadlocks, the same way nesting
/// top-level transactions deadlocks in the engine itself.
#[derive(Default)]
pub struct AccessCoordinator {
    lock: RwLock<()>,
}

impl fmt::Debug for AccessCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCoordinator")
            .field("locked", &self.lock.is_locked())
            .field("exclusive", &self.lock.is_locked_exclusive())
            .finish()
    }
}

impl AccessCoordinator {
    /// Create an unlocked coordinator.
    pub const fn new() -> Self {
        Self { lock: RwLock::new(()) }
    }

    /// Run `f` holding the lock in shared mode.
    pub fn run_shared<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.read();
        f()
    }

    /// Run `f` holding the lock in exclusive mode.
    pub fn run_exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock.write();
        f()
    }

    /// Run `f` holding the lock in the given mode.
    pub fn run<R>(&self, access: Access, f: impl FnOnce() -> R) -> R {
        match access {
            Access::Shared => self.run_shared(f),
            Access::Exclusive => self.run_exclusive(f),
        }
    }
}
