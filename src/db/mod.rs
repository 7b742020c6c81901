//! Storage engine: generic record store, photo and project repositories,
//! and schema migration.
//!
//! Startup contract: construct a [`SchemaMigrator`] and await nothing else —
//! call [`SchemaMigrator::ensure_up_to_date`] before the first repository
//! operation. After that, [`PhotoRepository`] and [`ProjectRepository`] are
//! the only write paths the rest of the application uses.

pub mod error;
pub mod migrate;
pub mod photos;
pub mod projects;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use migrate::{
    find_or_create_default_project, SchemaMigrator, DATA_MIGRATION_VERSION, DEFAULT_PROJECT_NAME,
};
pub use photos::{
    photo_id, AspectRatio, EditSettings, NewPhoto, Photo, PhotoFilter, PhotoMetadata,
    PhotoRepository, PhotoTag,
};
pub use projects::{
    project_id, NewProject, OrphanPolicy, Project, ProjectRepository, ProjectSettings, ProjectType,
    ReminderTime, MAX_PROJECT_NAME_CHARS,
};
pub use schema::TARGET_SCHEMA_VERSION;
pub use store::{Collection, IndexValue, Record, RecordStore};
