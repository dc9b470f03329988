use crate::{
    EngineError, EnvFlags, SyncError, SyncResult, TxnFlags,
    sys::{
        ADOPT_MAP_SIZE, Access, AccessCoordinator, MaxRetries, ResizeDelay, ResizePolicy,
        StorageEngine,
        retry::{ResizeRetryDriver, Retry},
        state::HandleState,
    },
    tx::{Ro, Rw, TransactionKind},
};
use std::{
    fmt,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

/// A storage engine environment with resize handling and user-space locking.
///
/// Every transaction is dispatched through one readers-writer lock:
///
/// - Read-only transactions always take it shared.
/// - Read-write transactions take it shared while the engine does its own
///   locking, and exclusive once [`EnvFlags::NO_LOCK`] is set. In `NO_LOCK`
///   mode a writer therefore blocks every reader as well as other writers.
/// - Map-size changes always take it exclusive, so they never run while a
///   transaction is in progress.
///
/// A transaction failing with the engine's map-resized error is retried
/// after adopting the new map size, up to the configured [`MaxRetries`].
///
/// # Bypassing
///
/// The handle returned by [`Environment::raw`] is the same one used
/// internally. Running transactions or changing the map size through it
/// voids every guarantee above.
pub struct Environment<E: StorageEngine> {
    raw: E,
    state: HandleState,
    coordinator: AccessCoordinator,
    driver: ResizeRetryDriver,
    poisoned: AtomicBool,
}

impl<E: StorageEngine> fmt::Debug for Environment<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("lock_disabled", &self.state.lock_disabled())
            .field("coordinator", &self.coordinator)
            .field("driver", &self.driver)
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

impl<E: StorageEngine> Environment<E> {
    /// Creates a new builder for an environment.
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// Wrap an existing engine handle with the default [`ResizePolicy`].
    pub fn new(raw: E) -> SyncResult<Self, E::Error> {
        Self::builder().build(raw)
    }

    /// Allocate a fresh engine handle and wrap it with the default
    /// [`ResizePolicy`].
    pub fn create() -> SyncResult<Self, E::Error> {
        Self::builder().create()
    }

    /// The underlying engine handle.
    ///
    /// Calls that begin transactions or change the map size must go through
    /// the [`Environment`] instead; the wrapper cannot detect calls made
    /// directly on the handle.
    pub const fn raw(&self) -> &E {
        &self.raw
    }

    /// True if the engine's own locking is disabled and this wrapper is
    /// providing all transaction exclusion.
    pub const fn is_lock_disabled(&self) -> bool {
        self.state.lock_disabled()
    }

    /// True if a failed resize adoption left the environment unusable.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    /// The retry bound in effect: the per-environment override if set,
    /// otherwise the policy's.
    pub fn max_resize_retries(&self) -> MaxRetries {
        self.driver.max_retries()
    }

    /// Override the policy's retry bound. `None` restores the policy value.
    pub const fn set_max_resize_retries(&mut self, max_retries: Option<MaxRetries>) {
        self.driver.set_max_retries(max_retries);
    }

    /// Override the policy's retry delay. `None` restores the policy value.
    pub fn set_resize_delay(&mut self, delay: Option<ResizeDelay>) {
        self.driver.set_delay(delay);
    }

    /// Drop both per-environment overrides, so the policy applies again.
    pub fn clear_resize_overrides(&mut self) {
        self.driver.set_max_retries(None);
        self.driver.set_delay(None);
    }

    /// Open the environment, tracking whether `flags` disables the engine's
    /// locking.
    pub fn open(
        &mut self,
        path: impl AsRef<Path>,
        flags: EnvFlags,
        mode: u32,
    ) -> SyncResult<(), E::Error> {
        let res = self.raw.open(path.as_ref(), flags, mode);
        self.state.apply(res, |s| s.record_set(flags)).map_err(SyncError::Engine)
    }

    /// Currently active environment flags.
    pub fn flags(&self) -> SyncResult<EnvFlags, E::Error> {
        self.raw.flags().map_err(SyncError::Engine)
    }

    /// Set environment flags, tracking `NO_LOCK`.
    pub fn set_flags(&mut self, flags: EnvFlags) -> SyncResult<(), E::Error> {
        let res = self.raw.set_flags(flags);
        self.state.apply(res, |s| s.record_set(flags)).map_err(SyncError::Engine)
    }

    /// Clear environment flags, tracking `NO_LOCK`.
    pub fn unset_flags(&mut self, flags: EnvFlags) -> SyncResult<(), E::Error> {
        let res = self.raw.unset_flags(flags);
        self.state.apply(res, |s| s.record_unset(flags)).map_err(SyncError::Engine)
    }

    /// Set the map size once every in-flight transaction has finished.
    ///
    /// New transactions wait until the change is applied. A failure here is
    /// returned as an ordinary engine error.
    pub fn set_map_size(&self, size: usize) -> SyncResult<(), E::Error> {
        self.coordinator.run(Access::for_resize(), || {
            self.ensure_healthy()?;
            self.raw.set_map_size(size).map_err(SyncError::Engine)
        })
    }

    /// Run `op` in a transaction begun with `flags`.
    ///
    /// `op` is called again if the engine reports a stale map, so it must
    /// not assume it runs only once.
    pub fn run_txn<R, F>(&self, flags: TxnFlags, mut op: F) -> SyncResult<R, E::Error>
    where
        F: FnMut(&E::Txn) -> Result<R, E::Error>,
    {
        let txn = |raw: &E| raw.run_txn(flags, &mut op);
        if flags.is_read_only() {
            self.dispatch::<Ro, _>(txn)
        } else {
            self.dispatch::<Rw, _>(txn)
        }
    }

    /// Run `op` in a transaction of kind `K`.
    pub fn run<K, R, F>(&self, mut op: F) -> SyncResult<R, E::Error>
    where
        K: TransactionKind,
        F: FnMut(&E::Txn) -> Result<R, E::Error>,
    {
        self.dispatch::<K, _>(|raw| raw.run_txn(K::OPEN_FLAGS, &mut op))
    }

    /// Run `op` in a read-only transaction.
    ///
    /// In `NO_LOCK` mode this waits for any running write transaction.
    pub fn view<R, F>(&self, mut op: F) -> SyncResult<R, E::Error>
    where
        F: FnMut(&E::Txn) -> Result<R, E::Error>,
    {
        self.dispatch::<Ro, _>(|raw| raw.view(&mut op))
    }

    /// Run `op` in a read-write transaction.
    ///
    /// In `NO_LOCK` mode this waits for every other transaction to finish
    /// and blocks all transactions, read-only included, while it runs.
    pub fn update<R, F>(&self, mut op: F) -> SyncResult<R, E::Error>
    where
        F: FnMut(&E::Txn) -> Result<R, E::Error>,
    {
        self.dispatch::<Rw, _>(|raw| raw.update(&mut op))
    }

    /// Run `op` in a read-write transaction pinned to the calling thread.
    ///
    /// Locking is the same as [`Environment::update`].
    pub fn update_locked<R, F>(&self, mut op: F) -> SyncResult<R, E::Error>
    where
        F: FnMut(&E::Txn) -> Result<R, E::Error>,
    {
        self.dispatch::<Rw, _>(|raw| raw.update_locked(&mut op))
    }

    /// Must be called with the coordinator held, so a caller that queued
    /// behind a failing adoption observes the poison.
    fn ensure_healthy(&self) -> SyncResult<(), E::Error> {
        if self.is_poisoned() { Err(SyncError::Poisoned) } else { Ok(()) }
    }

    /// Run `txn` under the coordinator, adopting the new map size and
    /// running it again for as long as it fails with a stale map and the
    /// retry bound allows.
    fn dispatch<K, R>(
        &self,
        mut txn: impl FnMut(&E) -> Result<R, E::Error>,
    ) -> SyncResult<R, E::Error>
    where
        K: TransactionKind,
    {
        let access = K::access(self.state.lock_disabled());
        let span = K::new_span(access);
        let _guard = span.enter();

        let mut attempt = 0u32;
        loop {
            let res = self.coordinator.run(access, || {
                self.ensure_healthy()?;
                txn(&self.raw).map_err(SyncError::Engine)
            });
            let err = match res {
                Ok(value) => return Ok(value),
                Err(SyncError::Engine(err)) if err.is_map_resized() => err,
                Err(err) => return Err(err),
            };

            match self.driver.next(attempt) {
                Retry::Surface => {
                    tracing::debug!(
                        target: "mdbx_sync",
                        attempt,
                        max_retries = ?self.driver.max_retries(),
                        "not retrying transaction on resized map"
                    );
                    return Err(SyncError::Engine(err));
                }
                Retry::Adopt(delay) => {
                    tracing::warn!(
                        target: "mdbx_sync",
                        attempt,
                        ?delay,
                        "map resized by another actor, adopting new size"
                    );
                    self.adopt_map_size(delay)?;
                    attempt = attempt.saturating_add(1);
                    span.record("attempt", attempt);
                }
            }
        }
    }

    /// Adopt the map size another actor set, once every in-flight
    /// transaction has drained.
    ///
    /// The delay is slept while holding the exclusive lock so that no
    /// transaction begins against the old size while another process may
    /// still be resizing.
    fn adopt_map_size(&self, delay: Duration) -> SyncResult<(), E::Error> {
        self.coordinator.run(Access::for_resize(), || {
            self.ensure_healthy()?;
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            // poison before the guard drops, so no queued caller gets in first
            self.raw.set_map_size(ADOPT_MAP_SIZE).map_err(|err| {
                self.poisoned.store(true, Ordering::Release);
                tracing::error!(
                    target: "mdbx_sync",
                    %err,
                    "failed to adopt resized map, environment poisoned"
                );
                SyncError::ResizeFailed(err)
            })
        })
    }
}

/// Options for wrapping an engine handle in an [`Environment`].
///
/// The [`ResizePolicy`] plays the role of process-wide defaults; the
/// per-environment overrides take precedence over it.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentBuilder {
    policy: ResizePolicy,
    max_resize_retries: Option<MaxRetries>,
    resize_delay: Option<ResizeDelay>,
}

impl EnvironmentBuilder {
    /// Set the defaults used when no per-environment override is given.
    pub fn set_policy(&mut self, policy: ResizePolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Override the policy's retry bound.
    pub const fn set_max_resize_retries(&mut self, max_retries: MaxRetries) -> &mut Self {
        self.max_resize_retries = Some(max_retries);
        self
    }

    /// Override the policy's inter-attempt delay.
    pub fn set_resize_delay(&mut self, delay: ResizeDelay) -> &mut Self {
        self.resize_delay = Some(delay);
        self
    }

    /// Wrap `raw`, probing its flags for `NO_LOCK`.
    ///
    /// A handle that is not open yet is fine; any other failure to read its
    /// flags is returned.
    pub fn build<E: StorageEngine>(&self, raw: E) -> SyncResult<Environment<E>, E::Error> {
        let state = HandleState::probe(&raw)?;
        tracing::debug!(
            target: "mdbx_sync",
            lock_disabled = state.lock_disabled(),
            "wrapping environment"
        );
        Ok(Environment {
            raw,
            state,
            coordinator: AccessCoordinator::new(),
            driver: ResizeRetryDriver::new(
                self.policy.clone(),
                self.max_resize_retries,
                self.resize_delay.clone(),
            ),
            poisoned: AtomicBool::new(false),
        })
    }

    /// Allocate a fresh engine handle and wrap it.
    pub fn create<E: StorageEngine>(&self) -> SyncResult<Environment<E>, E::Error> {
        self.build(E::create()?)
    }

    /// Allocate a fresh engine handle, wrap it, and open it at `path`.
    pub fn open<E: StorageEngine>(
        &self,
        path: impl AsRef<Path>,
        flags: EnvFlags,
        mode: u32,
    ) -> SyncResult<Environment<E>, E::Error> {
        let mut env = self.create()?;
        env.open(path, flags, mode)?;
        Ok(env)
    }
}
