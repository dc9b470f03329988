use crate::{EngineError, EnvFlags, StorageEngine};

/// Tracks whether the engine's own locking is disabled for an environment.
///
/// Mutation requires `&mut self`: reconfiguring an environment while it is
/// running transactions is outside the contract, and the borrow checker
/// keeps it there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct HandleState {
    lock_disabled: bool,
}

impl HandleState {
    /// Probe the handle's current flags.
    ///
    /// A handle that is not open yet reports no flags; that is treated as
    /// "locking enabled", not as an error.
    pub(crate) fn probe<E: StorageEngine>(raw: &E) -> Result<Self, E::Error> {
        let flags = match raw.flags() {
            Ok(flags) => flags,
            Err(err) if err.is_not_open() => {
                tracing::trace!(target: "mdbx_sync", "flags probed before open");
                EnvFlags::empty()
            }
            Err(err) => return Err(err),
        };
        Ok(Self { lock_disabled: flags.is_lock_disabled() })
    }

    pub(crate) const fn lock_disabled(&self) -> bool {
        self.lock_disabled
    }

    /// Record a successful `open` or `set_flags` call. These can only turn
    /// `NO_LOCK` on.
    pub(crate) const fn record_set(&mut self, flags: EnvFlags) {
        if flags.is_lock_disabled() {
            self.lock_disabled = true;
        }
    }

    /// Record a successful `unset_flags` call, which can only turn `NO_LOCK`
    /// off.
    pub(crate) const fn record_unset(&mut self, flags: EnvFlags) {
        if flags.is_lock_disabled() {
            self.lock_disabled = false;
        }
    }

    /// Record the effect of a flag-changing engine call, only if it
    /// succeeded.
    pub(crate) fn apply<T, Error>(
        &mut self,
        result: Result<T, Error>,
        record: impl FnOnce(&mut Self),
    ) -> Result<T, Error> {
        let value = result?;
        record(self);
        tracing::debug!(
            target: "mdbx_sync",
            lock_disabled = self.lock_disabled,
            "environment flags changed"
        );
        Ok(value)
    }
}
