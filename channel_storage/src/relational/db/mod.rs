//! # Relational database methods
//!
//! Low-level queries shared by the SQLite and PostgreSQL backends. They run over sqlx's `Any` driver, so every
//! statement is written in the SQL dialect both databases understand, with `$N` placeholders.
//!
//! As with the rest of the storage layer, these are plain functions that accept a `&mut AnyConnection`. Callers can
//! pass a pooled connection, or `&mut *tx` to run several calls inside one transaction.
//!
//! The `Any` driver cannot decode a SQL `NULL` into an `Option<String>`, so nullable text columns are selected as
//! `COALESCE(col, '')` and mapped back with [`non_empty`].
pub mod channels;
pub mod payments;
pub mod tokens;

use crate::StorageError;

/// Turns a `rows_affected` count of zero into a [`StorageError::RecordNotFound`].
pub(crate) fn expect_affected(rows: u64, what: impl FnOnce() -> String) -> Result<(), StorageError> {
    if rows == 0 {
        Err(StorageError::RecordNotFound(what()))
    } else {
        Ok(())
    }
}

/// Maps the empty string produced by `COALESCE(col, '')` back to `None`.
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
