//! Transaction kinds.
//!
//! [`Ro`] and [`Rw`] are re-exported at the crate root. Use them with
//! [`Environment::run`] when writing code generic over the kind of
//! transaction.
//!
//! [`Environment::run`]: crate::Environment::run

mod kind;
pub use kind::{Ro, Rw, TransactionKind};
