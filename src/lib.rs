//! Resize-aware, `NO_LOCK`-safe synchronization for memory-mapped
//! transactional storage engines.
//!
//! # Overview
//!
//! LMDB-style engines fix the maximum size of the memory map when an
//! environment is opened. When another process grows the file, transactions
//! in this process fail with a "map resized" error until the new size is
//! adopted, and adopting it is only legal while no transaction is running.
//! The same engines offer a `NO_LOCK` mode that turns off all of their
//! locking and leaves writer exclusion to the caller.
//!
//! This crate wraps an engine handle in an [`Environment`] that handles
//! both:
//! - Transactions that fail with a stale map are retried after the new size
//!   is adopted under an exclusive lock, up to a configurable bound.
//! - In `NO_LOCK` mode, write transactions exclude every other transaction
//!   while read transactions still run concurrently with each other.
//!
//! The engine itself is consumed through the [`StorageEngine`] trait.
//!
//! # Quick Start
//!
//! ```ignore
//! use signet_mdbx_sync::{Environment, EnvFlags, MaxRetries};
//!
//! let mut env = Environment::<MyEngine>::builder()
//!     .set_max_resize_retries(MaxRetries::Limited(5))
//!     .create::<MyEngine>()?;
//! env.open("/tmp/my_database", EnvFlags::NO_LOCK, 0o644)?;
//!
//! env.update(|txn| txn.put(b"hello", b"world"))?;
//! let value = env.view(|txn| txn.get(b"hello"))?;
//! ```
//!
//! # Key Concepts
//!
//! - [`Environment`] - The synchronized wrapper. Created via
//!   [`Environment::builder()`], [`Environment::new`] or
//!   [`Environment::create`].
//! - [`AccessCoordinator`] - The per-environment readers-writer lock every
//!   transaction and map-size change goes through.
//! - [`ResizePolicy`], [`MaxRetries`], [`ResizeDelay`] - How stale-map
//!   failures are retried. A policy supplies defaults; each environment can
//!   override them.
//! - [`Ro`] and [`Rw`] - Marker types for read-only and read-write
//!   transactions, used with [`Environment::run`].
//!
//! # Errors
//!
//! Every fallible call returns a [`SyncError`]. Engine errors are passed
//! through verbatim as [`SyncError::Engine`], including a map-resized error
//! that outlived the retry bound. A failure while adopting a new map size is
//! [`SyncError::ResizeFailed`]: the environment is poisoned and every later
//! call fails with [`SyncError::Poisoned`]. Callers should treat both as
//! unrecoverable; see [`SyncError::is_fatal`].
//!
//! # Tracing
//!
//! Dispatches are instrumented with [`tracing`] under the `mdbx_sync`
//! target. Map adoption is logged at `warn`, poisoning at `error`.

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub use error::{EngineError, SyncError, SyncResult};

mod flags;
pub use flags::{EnvFlags, TxnFlags};

pub mod sys;
pub use sys::{
    ADOPT_MAP_SIZE, Access, AccessCoordinator, DEFAULT_MAX_RESIZE_RETRIES, DEFAULT_RESIZE_DELAY,
    Environment, EnvironmentBuilder, MaxRetries, ResizeDelay, ResizePolicy, StorageEngine,
};

pub mod tx;
pub use tx::{Ro, Rw, TransactionKind};
