use bitflags::bitflags;

bitflags! {
    /// Environment-wide options, using LMDB's bit values.
    ///
    /// Only [`EnvFlags::NO_LOCK`] matters to the synchronization layer; the
    /// others are forwarded to the engine untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EnvFlags: u32 {
        /// The path names the data file itself, not a directory.
        const NO_SUB_DIR = 0x4000;
        /// Don't flush system buffers to disk when committing.
        const NO_SYNC = 0x10000;
        /// Open the environment read-only.
        const RDONLY = 0x20000;
        /// Flush system buffers but omit the metadata flush.
        const NO_META_SYNC = 0x40000;
        /// Use a writeable memory map.
        const WRITE_MAP = 0x80000;
        /// Asynchronous flushes when combined with `WRITE_MAP`.
        const MAP_ASYNC = 0x100000;
        /// Tie reader slots to transaction objects instead of threads.
        const NO_TLS = 0x200000;
        /// Disable all of the engine's locking.
        ///
        /// The caller becomes responsible for single-writer semantics and for
        /// keeping readers away from an active writer. A synchronized
        /// [`Environment`] provides both.
        ///
        /// [`Environment`]: crate::Environment
        const NO_LOCK = 0x400000;
        /// Turn off readahead.
        const NO_READ_AHEAD = 0x800000;
        /// Don't zero malloc'd pages before writing them.
        const NO_MEM_INIT = 0x1000000;
    }
}

impl EnvFlags {
    /// True if the engine's internal locking is disabled.
    pub const fn is_lock_disabled(&self) -> bool {
        self.contains(Self::NO_LOCK)
    }
}

bitflags! {
    /// Options for beginning a transaction.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TxnFlags: u32 {
        /// The transaction will not write.
        const RDONLY = 0x20000;
    }
}

impl TxnFlags {
    /// True if the flags describe a read-only transaction.
    pub const fn is_read_only(&self) -> bool {
        self.contains(Self::RDONLY)
    }
}
