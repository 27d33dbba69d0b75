//! Storage module
//!
//! SQLite-based storage layer: schema migrations plus typed CRUD for every
//! entity in [`crate::model`].

mod migrations;
mod sqlite;

pub use migrations::{revert_to, Migration, MIGRATIONS};
pub use sqlite::{Result, Storage, StorageError};
pub use crate::model::MemoryInput;
