//! Common test infrastructure: an instrumented in-process storage engine.
//!
//! [`MockEnv`] behaves like an LMDB environment closely enough to exercise
//! the synchronization layer:
//! - transactions fail with [`MockError::MapResized`] while the handle's map
//!   size is behind the file's, until the size is adopted.
//! - without `NO_LOCK` the engine serializes its own writers; with it, it
//!   does no locking at all.
//! - every transaction and map-size adoption is recorded in a [`Probe`],
//!   which counts overlaps the layer is supposed to prevent.
#![allow(missing_docs, dead_code, unreachable_pub)]

use parking_lot::Mutex;
use signet_mdbx_sync::{
    ADOPT_MAP_SIZE, EngineError, EnvFlags, Environment, StorageEngine, TxnFlags,
};
use std::{
    cell::RefCell,
    collections::BTreeMap,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering::SeqCst},
    },
    thread,
    time::Duration,
};

pub const INITIAL_MAP_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("MDB_MAP_RESIZED: database contents grew beyond environment mapsize")]
    MapResized,
    #[error("errno {0}")]
    Errno(i32),
    #[error("write in a read-only transaction")]
    ReadOnly,
    #[error("{0}")]
    Body(&'static str),
}

impl EngineError for MockError {
    fn is_map_resized(&self) -> bool {
        matches!(self, Self::MapResized)
    }

    fn is_not_open(&self) -> bool {
        matches!(self, Self::Errno(libc::EINVAL))
    }
}

/// The database file, shared by every handle that opens it.
#[derive(Debug)]
pub struct MockFile {
    size: AtomicUsize,
    store: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Default for MockFile {
    fn default() -> Self {
        Self { size: AtomicUsize::new(INITIAL_MAP_SIZE), store: Mutex::default() }
    }
}

impl MockFile {
    /// Grow the file as another process would.
    pub fn grow(&self, by: usize) {
        self.size.fetch_add(by, SeqCst);
    }

    pub fn size(&self) -> usize {
        self.size.load(SeqCst)
    }
}

/// Records what ran, and what ran at the same time.
#[derive(Debug, Default)]
pub struct Probe {
    readers: AtomicUsize,
    writers: AtomicUsize,
    adopting: AtomicBool,

    pub txn_calls: AtomicUsize,
    pub adopt_calls: AtomicUsize,
    pub max_readers: AtomicUsize,
    /// A writer overlapped another writer.
    pub writer_writer: AtomicUsize,
    /// A writer overlapped a reader.
    pub writer_reader: AtomicUsize,
    /// A transaction overlapped a map-size change.
    pub txn_resize: AtomicUsize,
}

impl Probe {
    fn enter_txn(&self, read_only: bool) {
        self.txn_calls.fetch_add(1, SeqCst);
        if read_only {
            let now = self.readers.fetch_add(1, SeqCst) + 1;
            self.max_readers.fetch_max(now, SeqCst);
            if self.writers.load(SeqCst) > 0 {
                self.writer_reader.fetch_add(1, SeqCst);
            }
        } else {
            if self.writers.fetch_add(1, SeqCst) > 0 {
                self.writer_writer.fetch_add(1, SeqCst);
            }
            if self.readers.load(SeqCst) > 0 {
                self.writer_reader.fetch_add(1, SeqCst);
            }
        }
        if self.adopting.load(SeqCst) {
            self.txn_resize.fetch_add(1, SeqCst);
        }
    }

    fn exit_txn(&self, read_only: bool) {
        if read_only {
            self.readers.fetch_sub(1, SeqCst);
        } else {
            self.writers.fetch_sub(1, SeqCst);
        }
    }

    fn enter_resize(&self) {
        self.adopt_calls.fetch_add(1, SeqCst);
        self.adopting.store(true, SeqCst);
        if self.readers.load(SeqCst) + self.writers.load(SeqCst) > 0 {
            self.txn_resize.fetch_add(1, SeqCst);
        }
    }

    fn exit_resize(&self) {
        self.adopting.store(false, SeqCst);
    }

    pub fn adopt_calls(&self) -> usize {
        self.adopt_calls.load(SeqCst)
    }

    pub fn txn_calls(&self) -> usize {
        self.txn_calls.load(SeqCst)
    }

    pub fn max_readers(&self) -> usize {
        self.max_readers.load(SeqCst)
    }

    pub fn writer_writer(&self) -> usize {
        self.writer_writer.load(SeqCst)
    }

    pub fn writer_reader(&self) -> usize {
        self.writer_reader.load(SeqCst)
    }

    pub fn txn_resize(&self) -> usize {
        self.txn_resize.load(SeqCst)
    }
}

/// Transaction handle given to bodies run against a [`MockEnv`].
#[derive(Debug)]
pub struct MockTxn {
    read_only: bool,
    snapshot: BTreeMap<Vec<u8>, Vec<u8>>,
    pending: RefCell<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MockTxn {
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.pending.borrow().get(key).or_else(|| self.snapshot.get(key)).cloned()
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), MockError> {
        if self.read_only {
            return Err(MockError::ReadOnly);
        }
        self.pending.borrow_mut().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// One environment handle, as one process would hold it.
#[derive(Debug)]
pub struct MockEnv {
    file: Arc<MockFile>,
    probe: Arc<Probe>,
    map_size: AtomicUsize,
    flags: Mutex<EnvFlags>,
    opened: AtomicBool,
    /// The engine's own writer lock, used unless `NO_LOCK` is set.
    writer: Mutex<()>,

    /// Time each transaction body is stretched by, to widen overlap windows.
    pub txn_hold: Mutex<Duration>,
    /// Upcoming transactions that fail with a stale map at begin.
    pub stale_begins: AtomicUsize,
    pub fail_flag_changes: AtomicBool,
    pub fail_flag_probe: AtomicBool,
    pub fail_adopt: AtomicBool,
}

impl Default for MockEnv {
    fn default() -> Self {
        Self::attach(Arc::default())
    }
}

impl MockEnv {
    /// A handle onto an existing file, as a second process would open it.
    pub fn attach(file: Arc<MockFile>) -> Self {
        let map_size = AtomicUsize::new(file.size());
        Self {
            file,
            probe: Arc::default(),
            map_size,
            flags: Mutex::default(),
            opened: AtomicBool::new(false),
            writer: Mutex::default(),
            txn_hold: Mutex::default(),
            stale_begins: AtomicUsize::new(0),
            fail_flag_changes: AtomicBool::new(false),
            fail_flag_probe: AtomicBool::new(false),
            fail_adopt: AtomicBool::new(false),
        }
    }

    pub fn file(&self) -> &Arc<MockFile> {
        &self.file
    }

    pub fn probe(&self) -> &Arc<Probe> {
        &self.probe
    }

    pub fn map_size(&self) -> usize {
        self.map_size.load(SeqCst)
    }

    pub fn hold_txns_for(&self, hold: Duration) {
        *self.txn_hold.lock() = hold;
    }

    fn lock_disabled(&self) -> bool {
        self.flags.lock().is_lock_disabled()
    }

    fn ensure_open(&self) -> Result<(), MockError> {
        if self.opened.load(SeqCst) { Ok(()) } else { Err(MockError::Errno(libc::EINVAL)) }
    }

    fn take_stale_begin(&self) -> bool {
        self.stale_begins.fetch_update(SeqCst, SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

impl StorageEngine for MockEnv {
    type Txn = MockTxn;
    type Error = MockError;

    fn create() -> Result<Self, Self::Error> {
        Ok(Self::default())
    }

    fn open(&self, path: &Path, flags: EnvFlags, _mode: u32) -> Result<(), Self::Error> {
        if self.opened.load(SeqCst) {
            return Err(MockError::Errno(libc::EINVAL));
        }
        if !path.exists() {
            return Err(MockError::Errno(libc::ENOENT));
        }
        *self.flags.lock() |= flags;
        self.opened.store(true, SeqCst);
        Ok(())
    }

    fn flags(&self) -> Result<EnvFlags, Self::Error> {
        if self.fail_flag_probe.load(SeqCst) {
            return Err(MockError::Errno(libc::EACCES));
        }
        self.ensure_open()?;
        Ok(*self.flags.lock())
    }

    fn set_flags(&self, flags: EnvFlags) -> Result<(), Self::Error> {
        if self.fail_flag_changes.load(SeqCst) {
            return Err(MockError::Errno(libc::EBUSY));
        }
        *self.flags.lock() |= flags;
        Ok(())
    }

    fn unset_flags(&self, flags: EnvFlags) -> Result<(), Self::Error> {
        if self.fail_flag_changes.load(SeqCst) {
            return Err(MockError::Errno(libc::EBUSY));
        }
        self.flags.lock().remove(flags);
        Ok(())
    }

    fn run_txn<R, F>(&self, flags: TxnFlags, op: F) -> Result<R, Self::Error>
    where
        F: FnOnce(&Self::Txn) -> Result<R, Self::Error>,
    {
        self.ensure_open()?;
        let read_only = flags.is_read_only();
        let _writer = (!read_only && !self.lock_disabled()).then(|| self.writer.lock());

        self.probe.enter_txn(read_only);
        let res = (|| {
            if self.map_size() < self.file.size() || self.take_stale_begin() {
                return Err(MockError::MapResized);
            }
            let txn = MockTxn {
                read_only,
                snapshot: self.file.store.lock().clone(),
                pending: RefCell::default(),
            };
            let hold = *self.txn_hold.lock();
            if !hold.is_zero() {
                thread::sleep(hold);
            }
            let value = op(&txn)?;
            if !read_only {
                self.file.store.lock().extend(txn.pending.into_inner());
            }
            Ok(value)
        })();
        self.probe.exit_txn(read_only);
        res
    }

    fn set_map_size(&self, size: usize) -> Result<(), Self::Error> {
        self.probe.enter_resize();
        let res = if self.fail_adopt.load(SeqCst) {
            Err(MockError::Errno(libc::EIO))
        } else if size == ADOPT_MAP_SIZE {
            self.map_size.store(self.file.size(), SeqCst);
            Ok(())
        } else {
            self.file.size.fetch_max(size, SeqCst);
            self.map_size.store(size, SeqCst);
            Ok(())
        };
        self.probe.exit_resize();
        res
    }
}

/// An opened environment on a fresh temporary directory.
pub fn open_env(flags: EnvFlags) -> (tempfile::TempDir, Environment<MockEnv>) {
    let dir = tempfile::tempdir().unwrap();
    let env = Environment::<MockEnv>::builder().open::<MockEnv>(dir.path(), flags, 0o644).unwrap();
    (dir, env)
}
