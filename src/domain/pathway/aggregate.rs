//! Pathway aggregate - the versioned curriculum container.
//!
//! The pathway holds the two pointers that matter to everything else: the
//! current published version (what new enrollments pin) and the open draft.
//! Versions themselves live in the repository, referenced by ID.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{OrganizationId, PathwayId, PathwayVersionId, StateMachine, Timestamp};

use super::{PathwayError, PathwayVersion};

/// Maximum length for a pathway name.
pub const MAX_NAME_LENGTH: usize = 200;

/// Lifecycle status of a pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PathwayStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl StateMachine for PathwayStatus {
    /// Valid transitions:
    /// - Draft -> Published
    /// - Published -> Archived
    /// - Archived -> Published
    fn can_transition_to(&self, target: &Self) -> bool {
        use PathwayStatus::*;
        matches!(
            (self, target),
            (Draft, Published) | (Published, Archived) | (Archived, Published)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            PathwayStatus::Draft => vec![PathwayStatus::Published],
            PathwayStatus::Published => vec![PathwayStatus::Archived],
            PathwayStatus::Archived => vec![PathwayStatus::Published],
        }
    }
}

impl fmt::Display for PathwayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PathwayStatus::Draft => "Draft",
            PathwayStatus::Published => "Published",
            PathwayStatus::Archived => "Archived",
        };
        write!(f, "{}", s)
    }
}

/// Pathway aggregate.
///
/// # Invariants
///
/// - At most one open draft (`draft_version_id`)
/// - `current_version_id` only ever points at a published version
/// - `latest_version` is the highest version number handed out so far
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pathway {
    id: PathwayId,
    organization_id: OrganizationId,
    name: String,
    status: PathwayStatus,
    current_version_id: Option<PathwayVersionId>,
    draft_version_id: Option<PathwayVersionId>,
    latest_version: u32,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Pathway {
    /// Creates a pathway in `Draft` with no versions yet.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if name is empty or too long
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Result<Self, PathwayError> {
        let name = Self::validate_name(name.into())?;
        let now = Timestamp::now();
        Ok(Self {
            id: PathwayId::new(),
            organization_id,
            name,
            status: PathwayStatus::Draft,
            current_version_id: None,
            draft_version_id: None,
            latest_version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> PathwayId {
        self.id
    }

    pub fn organization_id(&self) -> OrganizationId {
        self.organization_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> PathwayStatus {
        self.status
    }

    pub fn is_archived(&self) -> bool {
        self.status == PathwayStatus::Archived
    }

    pub fn current_version_id(&self) -> Option<PathwayVersionId> {
        self.current_version_id
    }

    pub fn draft_version_id(&self) -> Option<PathwayVersionId> {
        self.draft_version_id
    }

    pub fn latest_version(&self) -> u32 {
        self.latest_version
    }

    /// Version number the next draft receives.
    pub fn next_version_number(&self) -> u32 {
        self.latest_version + 1
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Registers a freshly opened draft.
    pub fn attach_draft(&mut self, draft: &PathwayVersion) -> Result<(), PathwayError> {
        if self.draft_version_id.is_some() {
            return Err(PathwayError::invalid_state("holding an open draft", "open another draft for"));
        }
        draft.ensure_draft()?;
        self.draft_version_id = Some(draft.id());
        self.latest_version = self.latest_version.max(draft.version());
        self.touch();
        Ok(())
    }

    /// Swaps the current pointer to a just-published draft.
    ///
    /// A first publish moves the pathway to `Published`; an archived pathway
    /// stays archived.
    pub fn record_publish(&mut self, version: &PathwayVersion) -> Result<(), PathwayError> {
        if self.draft_version_id != Some(version.id()) || !version.is_published() {
            return Err(PathwayError::invalid_state(
                self.status.to_string(),
                format!("record version {} as published for", version.version()),
            ));
        }
        if self.status == PathwayStatus::Draft {
            self.status = self.transition(PathwayStatus::Published, "publish")?;
        }
        self.current_version_id = Some(version.id());
        self.draft_version_id = None;
        self.touch();
        Ok(())
    }

    /// Forgets the open draft.
    ///
    /// The version number stays consumed so published numbers never repeat.
    pub fn discard_draft(&mut self) -> Result<PathwayVersionId, PathwayError> {
        let draft = self.draft_version_id.take().ok_or(PathwayError::NoDraft(self.id))?;
        self.touch();
        Ok(draft)
    }

    pub fn archive(&mut self) -> Result<(), PathwayError> {
        self.status = self.transition(PathwayStatus::Archived, "archive")?;
        self.touch();
        Ok(())
    }

    pub fn unarchive(&mut self) -> Result<(), PathwayError> {
        if self.status != PathwayStatus::Archived {
            return Err(PathwayError::invalid_state(self.status.to_string(), "unarchive"));
        }
        self.status = self.transition(PathwayStatus::Published, "unarchive")?;
        self.touch();
        Ok(())
    }

    fn transition(&self, target: PathwayStatus, attempted: &str) -> Result<PathwayStatus, PathwayError> {
        self.status
            .transition_to(target)
            .map_err(|_| PathwayError::invalid_state(self.status.to_string(), attempted))
    }

    fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    fn validate_name(name: String) -> Result<String, PathwayError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(PathwayError::validation("name", "must not be empty"));
        }
        if trimmed.len() > MAX_NAME_LENGTH {
            return Err(PathwayError::validation(
                "name",
                format!("must be at most {} characters", MAX_NAME_LENGTH),
            ));
        }
        Ok(trimmed.to_string())
    }
}
