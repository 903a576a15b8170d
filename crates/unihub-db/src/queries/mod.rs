//! Typed query functions over the UniHub schema.
//!
//! Every function takes a plain `&Connection` so callers can compose them
//! inside a [`Database::with_tx`](crate::Database::with_tx) transaction
//! (a `Transaction` derefs to `Connection`) or a read-only
//! [`Database::with_conn`](crate::Database::with_conn) borrow.

pub mod communities;
pub mod follows;
pub mod keywords;
pub mod memberships;
pub mod pins;
pub mod posts;
pub mod users;

use anyhow::Result;
use rusqlite::types::Type;
use std::str::FromStr;

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Read a TEXT column holding an enum's `as_str` form.
pub(crate) fn enum_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Numbered placeholders `?{start}, ?{start+1}, ...` for an IN list.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ")
}
