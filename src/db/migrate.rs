//! Startup migration orchestration.
//!
//! Two mechanisms with different lifetimes:
//!
//! - Shape migrations (tables and indexes) are version-gated on the database
//!   itself and fire on every connection open; see [`super::schema`].
//! - The one-time project data migration re-parents legacy photos under a
//!   default project. It moves data rather than shape, so it is gated by a
//!   marker in the settings area, outside the physical database, and runs
//!   exactly once per install.
//!
//! The marker is written only after every photo rewrite has committed. A
//! crash mid-loop leaves it unset and the whole migration retries on the next
//! startup; default-project creation is find-or-create, so the retry cannot
//! mint a duplicate.

use std::path::{Path, PathBuf};

use super::error::StoreError;
use super::photos::PhotoRepository;
use super::projects::{NewProject, Project, ProjectRepository, ProjectType};
use crate::settings::{SessionFlags, SettingsStore};

/// Target of the data migration marker, independent of the physical schema
/// version.
pub const DATA_MIGRATION_VERSION: u32 = 2;

const DATA_MIGRATION_KEY: &str = "migrationVersion";

/// Session flag asking the next startup to finish a blocked database reset.
pub const RESET_PENDING_FLAG: &str = "reset_pending";

pub const DEFAULT_PROJECT_NAME: &str = "My Photos";

pub struct SchemaMigrator {
    db_path: PathBuf,
    settings: SettingsStore,
    session: SessionFlags,
}

impl SchemaMigrator {
    pub fn new(
        db_path: impl Into<PathBuf>,
        settings: SettingsStore,
        session: SessionFlags,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            settings,
            session,
        }
    }

    /// The single startup call the application shell must make before any
    /// repository use. Failure is fatal; repositories must not be touched
    /// afterward except through [`SchemaMigrator::reset_database`].
    pub fn ensure_up_to_date(&self) -> Result<(), StoreError> {
        if self.session.take(RESET_PENDING_FLAG)? {
            tracing::warn!("unfinished database reset detected, completing it first");
            self.reset_database()?;
        }

        let photos = PhotoRepository::new(&self.db_path);
        let projects = ProjectRepository::new(&self.db_path);

        // Fires pending shape steps; the project_id index exists from here on.
        photos.ensure_schema()?;

        let done: u32 = self.settings.get(DATA_MIGRATION_KEY)?.unwrap_or(0);
        if done >= DATA_MIGRATION_VERSION {
            tracing::debug!(version = done, "data migration already recorded");
            return Ok(());
        }

        tracing::info!(
            from = done,
            to = DATA_MIGRATION_VERSION,
            "running project data migration"
        );
        self.backfill_default_project(&photos, &projects)
            .map_err(|e| StoreError::Migration {
                version: DATA_MIGRATION_VERSION,
                source: Box::new(e),
            })?;

        // Recorded only after every photo rewrite committed.
        self.settings.set(DATA_MIGRATION_KEY, &DATA_MIGRATION_VERSION)?;
        Ok(())
    }

    fn backfill_default_project(
        &self,
        photos: &PhotoRepository,
        projects: &ProjectRepository,
    ) -> Result<(), StoreError> {
        let all = photos.find_all()?;
        let default = find_or_create_default_project(projects)?;

        let mut moved = 0usize;
        for mut photo in all {
            if !photo.project_id.is_empty() {
                continue;
            }
            photo.project_id = default.id.clone();
            photos.update(&photo)?;
            moved += 1;
        }
        tracing::info!(moved, project = %default.id, "re-parented legacy photos");
        Ok(())
    }

    /// Destructive escape hatch: delete the physical database (with its WAL
    /// sidecars) and recreate the schema from nothing, accepting full data
    /// loss. If another connection blocks the delete, the reset-pending
    /// session flag is set so the next startup retries, and
    /// [`StoreError::BlockedDelete`] is returned.
    pub fn reset_database(&self) -> Result<(), StoreError> {
        for path in database_files(&self.db_path) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    self.session.set(RESET_PENDING_FLAG)?;
                    return Err(StoreError::BlockedDelete { path });
                }
                Err(e) => return Err(StoreError::Io { path, source: e }),
            }
        }

        // The fresh database needs the data migration again (it recreates
        // the default project for an empty install).
        self.settings.remove(DATA_MIGRATION_KEY)?;
        PhotoRepository::new(&self.db_path).ensure_schema()?;
        tracing::warn!(path = %self.db_path.display(), "database reset complete");
        Ok(())
    }
}

fn database_files(db_path: &Path) -> Vec<PathBuf> {
    ["", "-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut name = db_path.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

/// The default project absorbing unscoped photos. Looked up by type and name
/// before creating, so partial-failure retries of the data migration never
/// produce a second one.
pub fn find_or_create_default_project(
    projects: &ProjectRepository,
) -> Result<Project, StoreError> {
    let existing = projects
        .find_all()?
        .into_iter()
        .find(|p| p.kind == ProjectType::DailyLife && p.name == DEFAULT_PROJECT_NAME);
    if let Some(project) = existing {
        return Ok(project);
    }
    projects.create(NewProject {
        name: DEFAULT_PROJECT_NAME.to_owned(),
        kind: ProjectType::DailyLife,
        cover_photo_id: None,
        settings: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::photos::{photo_id, Photo};
    use crate::db::store::RecordStore;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        db_path: PathBuf,
        migrator: SchemaMigrator,
        photos: PhotoRepository,
        projects: ProjectRepository,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("poselog.db");
        let settings = SettingsStore::new(dir.path().join("settings.json"));
        let session = SessionFlags::new(dir.path().join("session"));
        Fixture {
            migrator: SchemaMigrator::new(&db_path, settings, session),
            photos: PhotoRepository::new(&db_path),
            projects: ProjectRepository::new(&db_path),
            db_path,
            _dir: dir,
        }
    }

    // Write a pre-migration photo (no project id) straight through the
    // record store, bypassing the repository's projectId check.
    fn seed_legacy_photo(db_path: &Path, timestamp: i64) {
        let store: RecordStore<Photo> = RecordStore::new(db_path);
        store
            .put(&Photo {
                id: photo_id(timestamp),
                data_url: "data:image/jpeg;base64,legacy".to_owned(),
                timestamp,
                date: String::new(),
                project_id: String::new(),
                aspect_ratio: None,
                edit_settings: None,
                metadata: None,
            })
            .unwrap();
    }

    #[test]
    fn migration_reparents_every_legacy_photo() {
        let f = fixture();
        for ts in [5, 1, 4, 2, 3] {
            seed_legacy_photo(&f.db_path, ts);
        }

        f.migrator.ensure_up_to_date().unwrap();

        let projects = f.projects.find_all().unwrap();
        assert_eq!(projects.len(), 1);
        let default = &projects[0];
        assert_eq!(default.name, DEFAULT_PROJECT_NAME);
        assert_eq!(default.kind, ProjectType::DailyLife);

        let photos = f.photos.find_all().unwrap();
        assert_eq!(photos.len(), 5);
        assert!(photos.iter().all(|p| p.project_id == default.id));
    }

    #[test]
    fn empty_install_still_gets_a_default_project() {
        let f = fixture();
        f.migrator.ensure_up_to_date().unwrap();
        let projects = f.projects.find_all().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, DEFAULT_PROJECT_NAME);
    }

    #[test]
    fn second_run_short_circuits_on_the_marker() {
        let f = fixture();
        seed_legacy_photo(&f.db_path, 1);

        f.migrator.ensure_up_to_date().unwrap();
        f.migrator.ensure_up_to_date().unwrap();

        assert_eq!(f.projects.find_all().unwrap().len(), 1);
        assert_eq!(f.photos.find_all().unwrap().len(), 1);
    }

    #[test]
    fn retry_after_partial_failure_reuses_the_default_project() {
        let f = fixture();
        seed_legacy_photo(&f.db_path, 1);

        // Simulate a crash after default-project creation but before the
        // marker write: project exists, marker unset.
        find_or_create_default_project(&f.projects).unwrap();
        f.migrator.ensure_up_to_date().unwrap();

        assert_eq!(f.projects.find_all().unwrap().len(), 1);
        let photos = f.photos.find_all().unwrap();
        assert!(!photos[0].project_id.is_empty());
    }

    #[test]
    fn migration_skips_photos_already_scoped() {
        let f = fixture();
        f.migrator.ensure_up_to_date().unwrap();
        let owned = Project {
            id: "project-42".to_owned(),
            name: "Garden".to_owned(),
            kind: ProjectType::Garden,
            created_at: 42,
            updated_at: 42,
            cover_photo_id: None,
            settings: Default::default(),
        };
        f.projects.save(&owned).unwrap();
        f.photos
            .save(&crate::db::photos::tests::photo(42, &owned.id))
            .unwrap();

        // Force a re-run by clearing the marker.
        f.migrator.settings.remove(DATA_MIGRATION_KEY).unwrap();
        f.migrator.ensure_up_to_date().unwrap();

        let photo = f.photos.find_by_id(&photo_id(42)).unwrap().unwrap();
        assert_eq!(photo.project_id, owned.id);
    }

    #[test]
    fn reset_wipes_data_and_recreates_schema() {
        let f = fixture();
        f.migrator.ensure_up_to_date().unwrap();
        f.photos
            .save(&crate::db::photos::tests::photo(
                7,
                &f.projects.find_all().unwrap()[0].id,
            ))
            .unwrap();

        f.migrator.reset_database().unwrap();

        assert!(f.photos.find_all().unwrap().is_empty());
        assert!(f.projects.find_all().unwrap().is_empty());

        // Next startup behaves like a fresh install.
        f.migrator.ensure_up_to_date().unwrap();
        assert_eq!(f.projects.find_all().unwrap().len(), 1);
    }
}
