//! Project entity and repository.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::StoreError;
use super::photos::PhotoRepository;
use super::store::{Collection, IndexValue, Record, RecordStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    BabyGrowth,
    FitnessDiet,
    DailyLife,
    Pet,
    Garden,
    Construction,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::BabyGrowth => "baby-growth",
            ProjectType::FitnessDiet => "fitness-diet",
            ProjectType::DailyLife => "daily-life",
            ProjectType::Pet => "pet",
            ProjectType::Garden => "garden",
            ProjectType::Construction => "construction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderTime {
    /// 0-23
    pub hour: u8,
    /// 0-59
    pub minute: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub reminder_enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_time: Option<ReminderTime>,
}

/// A named collection scoping a set of photos to one use case.
///
/// `cover_photo_id` is advisory display state, not a live foreign key; it may
/// dangle after that photo is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ProjectType,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_photo_id: Option<String>,
    #[serde(default)]
    pub settings: ProjectSettings,
}

/// Creation DTO. [`ProjectRepository::create`] is the only constructor path
/// and the sole writer of `created_at`.
#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub kind: ProjectType,
    pub cover_photo_id: Option<String>,
    pub settings: Option<ProjectSettings>,
}

pub const MAX_PROJECT_NAME_CHARS: usize = 50;

pub fn project_id(timestamp_millis: i64) -> String {
    format!("project-{timestamp_millis}")
}

impl Record for Project {
    const COLLECTION: Collection = Collection {
        name: "projects",
        indexes: &["type", "created_at"],
    };

    fn key(&self) -> &str {
        &self.id
    }

    fn index_values(&self) -> Vec<IndexValue> {
        vec![
            IndexValue::Text(self.kind.as_str().to_owned()),
            IndexValue::Integer(self.created_at),
        ]
    }
}

/// What to do with a deleted project's photos. Plain `delete` leaves them
/// orphaned; callers that care choose a policy explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum OrphanPolicy {
    /// Keep the photos with their now-dangling project id.
    Leave,
    /// Re-parent the photos to another existing project.
    ReassignTo(String),
    /// Delete the photos along with the project.
    Cascade,
}

#[derive(Clone)]
pub struct ProjectRepository {
    store: RecordStore<Project>,
}

impl ProjectRepository {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            store: RecordStore::new(db_path),
        }
    }

    pub fn save(&self, project: &Project) -> Result<(), StoreError> {
        self.store.add(project)
    }

    pub fn find_all(&self) -> Result<Vec<Project>, StoreError> {
        let mut projects = self.store.get_all()?;
        projects.sort_by_key(|p| p.created_at);
        Ok(projects)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Project>, StoreError> {
        self.store.get(id)
    }

    pub fn update(&self, project: &Project) -> Result<(), StoreError> {
        self.store.put(project)
    }

    /// Remove the project record only. Its photos are untouched; use
    /// [`ProjectRepository::delete_with_policy`] to handle them.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(id)
    }

    /// Create a project from the DTO: generates the id from the current
    /// clock, sets `created_at = updated_at = now`, defaults reminders off,
    /// persists, and returns the materialized record.
    pub fn create(&self, draft: NewProject) -> Result<Project, StoreError> {
        let name_chars = draft.name.chars().count();
        if name_chars == 0 || name_chars > MAX_PROJECT_NAME_CHARS {
            return Err(StoreError::InvalidRecord {
                collection: "projects",
                reason: format!(
                    "name must be 1-{MAX_PROJECT_NAME_CHARS} characters, got {name_chars}"
                ),
            });
        }

        let now = chrono::Utc::now().timestamp_millis();
        let project = Project {
            id: project_id(now),
            name: draft.name,
            kind: draft.kind,
            created_at: now,
            updated_at: now,
            cover_photo_id: draft.cover_photo_id,
            settings: draft.settings.unwrap_or_default(),
        };
        self.save(&project)?;
        Ok(project)
    }

    /// Delete a project and apply an explicit policy to its photos.
    pub fn delete_with_policy(
        &self,
        photos: &PhotoRepository,
        id: &str,
        policy: OrphanPolicy,
    ) -> Result<(), StoreError> {
        match policy {
            OrphanPolicy::Leave => {}
            OrphanPolicy::ReassignTo(target) => {
                if self.find_by_id(&target)?.is_none() {
                    return Err(StoreError::InvalidRecord {
                        collection: "projects",
                        reason: format!("reassignment target {target} does not exist"),
                    });
                }
                for mut photo in photos.find_by_project_id(id)? {
                    photo.project_id = target.clone();
                    photos.update(&photo)?;
                }
            }
            OrphanPolicy::Cascade => {
                for photo in photos.find_by_project_id(id)? {
                    photos.delete(&photo.id)?;
                }
            }
        }
        self.delete(id)
    }
}
