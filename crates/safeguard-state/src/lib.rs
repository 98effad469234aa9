//! Run persistence for the safeguard pipeline.
//!
//! Provides the [`ModerationStore`] trait and a [`SqliteModerationStore`]
//! implementation for run bookkeeping, per-stage result records with their
//! flags, human review labels, and run logs.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
mod records;
pub mod schema;
pub mod serialize;
pub mod sqlite;

pub use backend::ModerationStore;
pub use error::StateError;
pub use sqlite::SqliteModerationStore;
