use crate::{TxnFlags, sys::Access};

mod private {
    pub trait Sealed {}
    impl Sealed for super::Ro {}
    impl Sealed for super::Rw {}
}

/// Marker type for read-only transactions.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct Ro;

/// Marker type for read-write transactions.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct Rw;

/// Marker trait for transaction kinds.
///
/// The kind decides the engine flags a transaction is begun with and, along
/// with the environment's `NO_LOCK` state, the [`Access`] it is dispatched
/// under.
pub trait TransactionKind: private::Sealed + core::fmt::Debug + 'static {
    /// True for kinds that never write.
    const IS_READ_ONLY: bool = true;

    /// Flags the transaction is begun with.
    const OPEN_FLAGS: TxnFlags =
        { if Self::IS_READ_ONLY { TxnFlags::RDONLY } else { TxnFlags::empty() } };

    /// Coordinator access for this kind.
    fn access(lock_disabled: bool) -> Access {
        Access::for_txn(Self::IS_READ_ONLY, lock_disabled)
    }

    /// Create a new tracing span for one dispatch of this kind.
    #[doc(hidden)]
    fn new_span(access: Access) -> tracing::Span {
        tracing::debug_span!(
            target: "mdbx_sync",
            "sync_txn",
            kind = %if Self::IS_READ_ONLY { "ro" } else { "rw" },
            access = %access,
            attempt = tracing::field::Empty,
        )
    }
}

impl TransactionKind for Ro {}

impl TransactionKind for Rw {
    const IS_READ_ONLY: bool = false;
}
