//! Storage and migration engine for a personal photo-journaling application.
//!
//! Photos and their projects live in one embedded SQLite database. The
//! [`db`] module provides the generic record store, the two repositories,
//! and the schema migrator the application shell runs at startup; [`backup`]
//! serializes the full record set to a portable versioned document;
//! [`settings`] keeps the data-migration marker and session flags outside
//! the database.

pub mod backup;
pub mod config;
pub mod db;
pub mod logging;
pub mod settings;
