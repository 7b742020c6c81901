//! Versioned backup document: export the full record set to portable JSON
//! and import it back through the normal repository paths.
//!
//! The current shape is "2.0.0". The "1.0.0" shape predates projects: no
//! `projects` array and no `projectId` on photos. Decode tolerates it by
//! defaulting both, and import assigns such photos to an explicit fallback
//! project so they never become invisible to project-scoped queries.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{AspectRatio, Photo, PhotoRepository, Project, ProjectRepository, StoreError};

pub const BACKUP_VERSION: &str = "2.0.0";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("nothing to export: the photo collection is empty")]
    EmptyExport,

    #[error("malformed backup document: {0}")]
    Malformed(String),

    #[error("cannot encode or decode backup document: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("fallback project {0} does not exist")]
    UnknownFallbackProject(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Photo fields carried in a backup. Edit settings and journal metadata are
/// not exported; a restored photo shows its saved pixels as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoBackup {
    pub id: String,
    pub data_url: String,
    pub timestamp: i64,
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
}

impl From<&Photo> for PhotoBackup {
    fn from(photo: &Photo) -> Self {
        Self {
            id: photo.id.clone(),
            data_url: photo.data_url.clone(),
            timestamp: photo.timestamp,
            date: photo.date.clone(),
            project_id: photo.project_id.clone(),
            aspect_ratio: photo.aspect_ratio,
        }
    }
}

impl PhotoBackup {
    fn into_photo(self, fallback_project_id: &str) -> Photo {
        let project_id = if self.project_id.is_empty() {
            fallback_project_id.to_owned()
        } else {
            self.project_id
        };
        Photo {
            id: self.id,
            data_url: self.data_url,
            timestamp: self.timestamp,
            date: self.date,
            project_id,
            aspect_ratio: self.aspect_ratio,
            edit_settings: None,
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: String,
    pub export_date: i64,
    #[serde(default)]
    pub projects: Vec<Project>,
    pub photos: Vec<PhotoBackup>,
}

/// How import treats records whose id already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Any duplicate id aborts the import with [`StoreError::DuplicateKey`].
    Strict,
    /// Duplicates are counted and skipped; existing records stay untouched.
    SkipExisting,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub projects_imported: usize,
    pub projects_skipped: usize,
    pub photos_imported: usize,
    pub photos_skipped: usize,
}

/// Snapshot both collections into one document. Refuses an empty photo set.
pub fn export_document(
    photos: &PhotoRepository,
    projects: &ProjectRepository,
) -> Result<BackupDocument, BackupError> {
    let all_photos = photos.find_all()?;
    if all_photos.is_empty() {
        return Err(BackupError::EmptyExport);
    }
    Ok(BackupDocument {
        version: BACKUP_VERSION.to_owned(),
        export_date: chrono::Utc::now().timestamp_millis(),
        projects: projects.find_all()?,
        photos: all_photos.iter().map(PhotoBackup::from).collect(),
    })
}

pub fn encode(document: &BackupDocument) -> Result<String, BackupError> {
    Ok(serde_json::to_string_pretty(document)?)
}

pub fn decode(json: &str) -> Result<BackupDocument, BackupError> {
    let document: BackupDocument = serde_json::from_str(json)?;
    if document.version.is_empty() {
        return Err(BackupError::Malformed("missing version".to_owned()));
    }
    Ok(document)
}

/// Write a decoded document through the repositories. `fallback_project_id`
/// must name an existing project; photos from pre-project backups land there.
pub fn import_document(
    document: &BackupDocument,
    photos: &PhotoRepository,
    projects: &ProjectRepository,
    fallback_project_id: &str,
    mode: ImportMode,
) -> Result<ImportReport, BackupError> {
    if projects.find_by_id(fallback_project_id)?.is_none() {
        return Err(BackupError::UnknownFallbackProject(
            fallback_project_id.to_owned(),
        ));
    }

    let mut report = ImportReport::default();

    for project in &document.projects {
        match projects.save(project) {
            Ok(()) => report.projects_imported += 1,
            Err(StoreError::DuplicateKey { .. }) if mode == ImportMode::SkipExisting => {
                report.projects_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    for entry in &document.photos {
        let photo = entry.clone().into_photo(fallback_project_id);
        match photos.save(&photo) {
            Ok(()) => report.photos_imported += 1,
            Err(StoreError::DuplicateKey { .. }) if mode == ImportMode::SkipExisting => {
                report.photos_skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        photos = report.photos_imported,
        projects = report.projects_imported,
        skipped = report.photos_skipped + report.projects_skipped,
        "backup import finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::photos::tests::photo;
    use crate::db::{NewProject, ProjectType};
    use tempfile::TempDir;

    fn repos() -> (TempDir, PhotoRepository, ProjectRepository) {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("poselog.db");
        (dir, PhotoRepository::new(&db), ProjectRepository::new(&db))
    }

    fn default_project(projects: &ProjectRepository) -> Project {
        projects
            .create(NewProject {
                name: "My Photos".to_owned(),
                kind: ProjectType::DailyLife,
                cover_photo_id: None,
                settings: None,
            })
            .unwrap()
    }

    #[test]
    fn export_refuses_empty_photo_set() {
        let (_dir, photos, projects) = repos();
        photos.ensure_schema().unwrap();
        assert!(matches!(
            export_document(&photos, &projects),
            Err(BackupError::EmptyExport)
        ));
    }

    #[test]
    fn export_then_decode_preserves_both_collections() {
        let (_dir, photos, projects) = repos();
        let project = default_project(&projects);
        photos.save(&photo(200, &project.id)).unwrap();
        photos.save(&photo(100, &project.id)).unwrap();

        let document = export_document(&photos, &projects).unwrap();
        let decoded = decode(&encode(&document).unwrap()).unwrap();

        assert_eq!(decoded.version, BACKUP_VERSION);
        assert_eq!(decoded.projects.len(), 1);
        let timestamps: Vec<i64> = decoded.photos.iter().map(|p| p.timestamp).collect();
        assert_eq!(timestamps, [100, 200]);
    }

    #[test]
    fn decode_tolerates_the_pre_project_shape() {
        let json = r#"{
            "version": "1.0.0",
            "exportDate": 1700000000000,
            "photos": [
                { "id": "photo-1", "dataUrl": "data:image/jpeg;base64,x",
                  "timestamp": 1, "date": "Jan 1, 2024", "aspectRatio": "square" }
            ]
        }"#;
        let document = decode(json).unwrap();
        assert!(document.projects.is_empty());
        assert!(document.photos[0].project_id.is_empty());
    }

    #[test]
    fn import_assigns_fallback_to_unscoped_photos() {
        let (_dir, photos, projects) = repos();
        let fallback = default_project(&projects);

        let document = BackupDocument {
            version: "1.0.0".to_owned(),
            export_date: 0,
            projects: Vec::new(),
            photos: vec![PhotoBackup {
                id: "photo-1".to_owned(),
                data_url: "data:image/jpeg;base64,x".to_owned(),
                timestamp: 1,
                date: String::new(),
                project_id: String::new(),
                aspect_ratio: None,
            }],
        };

        let report =
            import_document(&document, &photos, &projects, &fallback.id, ImportMode::Strict)
                .unwrap();
        assert_eq!(report.photos_imported, 1);

        let scoped = photos.find_by_project_id(&fallback.id).unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].id, "photo-1");
    }

    #[test]
    fn import_requires_an_existing_fallback_project() {
        let (_dir, photos, projects) = repos();
        photos.ensure_schema().unwrap();
        let document = BackupDocument {
            version: BACKUP_VERSION.to_owned(),
            export_date: 0,
            projects: Vec::new(),
            photos: Vec::new(),
        };
        assert!(matches!(
            import_document(&document, &photos, &projects, "project-nope", ImportMode::Strict),
            Err(BackupError::UnknownFallbackProject(_))
        ));
    }

    #[test]
    fn skip_existing_mode_counts_duplicates_without_overwriting() {
        let (_dir, photos, projects) = repos();
        let project = default_project(&projects);
        let existing = photo(1, &project.id);
        photos.save(&existing).unwrap();

        let mut incoming = PhotoBackup::from(&existing);
        incoming.data_url = "data:image/jpeg;base64,replacement".to_owned();
        let document = BackupDocument {
            version: BACKUP_VERSION.to_owned(),
            export_date: 0,
            projects: vec![project.clone()],
            photos: vec![incoming],
        };

        let strict = import_document(&document, &photos, &projects, &project.id, ImportMode::Strict);
        assert!(matches!(
            strict,
            Err(BackupError::Store(StoreError::DuplicateKey { .. }))
        ));

        let report = import_document(
            &document,
            &photos,
            &projects,
            &project.id,
            ImportMode::SkipExisting,
        )
        .unwrap();
        assert_eq!(report.photos_skipped, 1);
        assert_eq!(report.projects_skipped, 1);
        assert_eq!(
            photos.find_by_id(&existing.id).unwrap().unwrap().data_url,
            existing.data_url
        );
    }
}
