//! Filesystem backend for podfeed storage.
//!
//! Objects live as plain files under `<base_dir>/data/<key>`; their content
//! type and size are kept in a small SQLite table next to them, accessed
//! through [`tokio_rusqlite`] so the runtime never blocks on the database.

mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::LocalStorage;

#[cfg(test)]
mod tests;
