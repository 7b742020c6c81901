//! Photo entity and repository.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::store::{Collection, IndexValue, Record, RecordStore};

/// Framing used at capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectRatio {
    Video,
    Square,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhotoFilter {
    #[default]
    None,
    Grayscale,
    Sepia,
    Vivid,
    Warm,
    Cool,
    Dramatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoTag {
    Workout,
    Rest,
    Good,
    Bad,
    Tired,
    Energetic,
    Progress,
    Milestone,
}

/// Non-destructive edit parameters applied on top of the stored image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSettings {
    pub brightness: i32,
    pub contrast: i32,
    pub filter: PhotoFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhotoMetadata {
    /// Body weight in kilograms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Mood on a 1-5 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<PhotoTag>>,
}

/// One captured image and its metadata. The image payload is a self-contained
/// encoded data URL; there is no external file reference.
///
/// `project_id` is empty only on records written before the project data
/// migration ran; every photo created since then carries a real project id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: String,
    pub data_url: String,
    /// Capture time in milliseconds since epoch.
    pub timestamp: i64,
    /// Human-readable capture date, stored for display without recomputation.
    pub date: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_settings: Option<EditSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PhotoMetadata>,
}

/// Fields the capture pipeline supplies when a photo is taken.
#[derive(Debug, Clone)]
pub struct NewPhoto {
    pub data_url: String,
    pub timestamp: i64,
    pub project_id: String,
    pub aspect_ratio: Option<AspectRatio>,
    pub edit_settings: Option<EditSettings>,
    pub metadata: Option<PhotoMetadata>,
}

pub fn photo_id(timestamp_millis: i64) -> String {
    format!("photo-{timestamp_millis}")
}

fn display_date(timestamp_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_millis)
        .map(|dt| dt.format("%b %-d, %Y").to_string())
        .unwrap_or_default()
}

impl Photo {
    /// Materialize a photo from capture-pipeline output, deriving the id and
    /// display date from the capture timestamp.
    pub fn new(draft: NewPhoto) -> Self {
        Self {
            id: photo_id(draft.timestamp),
            data_url: draft.data_url,
            timestamp: draft.timestamp,
            date: display_date(draft.timestamp),
            project_id: draft.project_id,
            aspect_ratio: draft.aspect_ratio,
            edit_settings: draft.edit_settings,
            metadata: draft.metadata,
        }
    }
}

impl Record for Photo {
    const COLLECTION: Collection = Collection {
        name: "photos",
        indexes: &["timestamp", "project_id"],
    };

    fn key(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        let project = if self.project_id.is_empty() {
            IndexValue::Null
        } else {
            IndexValue::Text(self.project_id.clone())
        };
        vec![IndexValue::Integer(self.timestamp), project]
    }
}

/// Photo collection access. Results are always sorted ascending by capture
/// timestamp, never by insertion order, since capture and import can add
/// records out of chronological order.
#[derive(Clone)]
pub struct PhotoRepository {
    store: RecordStore<Photo>,
}

impl PhotoRepository {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            store: RecordStore::new(db_path),
        }
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        self.store.ensure_schema()
    }

    /// Insert a new photo. The id must be generated by the caller; a reused
    /// id rejects with [`StoreError::DuplicateKey`].
    pub fn save(&self, photo: &Photo) -> Result<(), StoreError> {
        if photo.project_id.is_empty() {
            return Err(StoreError::InvalidRecord {
                collection: "photos",
                reason: "projectId must not be empty".to_owned(),
            });
        }
        self.store.add(photo)
    }

    pub fn find_all(&self) -> Result<Vec<Photo>, StoreError> {
        let mut photos = self.store.get_all()?;
        photos.sort_by_key(|p| p.timestamp);
        Ok(photos)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Photo>, StoreError> {
        self.store.get(id)
    }

    pub fn find_by_project_id(&self, project_id: &str) -> Result<Vec<Photo>, StoreError> {
        let mut photos = self
            .store
            .get_all_by_index("project_id", IndexValue::Text(project_id.to_owned()))?;
        photos.sort_by_key(|p| p.timestamp);
        Ok(photos)
    }

    /// Full replace by id (upsert). Used by edit and metadata saves and by
    /// the migration backfill; a partial record is never accepted because the
    /// whole document is always written.
    pub fn update(&self, photo: &Photo) -> Result<(), StoreError> {
        self.store.put(photo)
    }

    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(id)
    }

    /// Wipe all photos. Used by "delete all" and the destructive reset path.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }
}
