//! Duplicate-name conflicts as explicit objects.
//!
//! A name collision is not a bare error string: callers need everything
//! required to offer the three-way choice (keep separate / rename anyway /
//! merge into target), so the conflict is a structured, serializable payload.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::family::Family;
use crate::record::EntityId;

/// Machine-readable code carried by every [`NameConflict`].
pub const NAME_EXISTS: &str = "NAME_EXISTS";

/// A (family, id) pair naming one entity across families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// The entity's family.
    pub family: Family,

    /// The entity's id.
    pub id: EntityId,
}

impl EntityRef {
    /// Creates a reference.
    #[must_use]
    pub const fn new(family: Family, id: EntityId) -> Self {
        Self { family, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.family, self.id)
    }
}

/// Structured payload raised when a name collides with a different
/// already-resolved entity in the namespace group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameConflict {
    /// Always [`NAME_EXISTS`].
    pub code: String,

    /// The family being created, renamed, or attached to.
    pub family: Family,

    /// The display name of the colliding entity.
    pub duplicate_name: String,

    /// Canonical id the colliding name resolves to.
    pub target_id: EntityId,

    /// Family of the colliding entity (may differ from `family` inside the
    /// customer/supplier namespace).
    pub target_family: Family,
}

impl NameConflict {
    /// Creates a conflict payload.
    #[must_use]
    pub fn new(
        family: Family,
        duplicate_name: impl Into<String>,
        target_id: EntityId,
        target_family: Family,
    ) -> Self {
        Self {
            code: NAME_EXISTS.to_string(),
            family,
            duplicate_name: duplicate_name.into(),
            target_id,
            target_family,
        }
    }

    /// The colliding entity as a reference.
    #[must_use]
    pub const fn target(&self) -> EntityRef {
        EntityRef::new(self.target_family, self.target_id)
    }
}

impl fmt::Display for NameConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name {:?} already belongs to {} {}",
            self.duplicate_name, self.target_family, self.target_id
        )
    }
}

/// How duplicate-name conflicts are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// Raise the conflict so a human can choose.
    Interactive,

    /// Silently adopt the existing target. Used by unattended ingestion
    /// pipelines where nobody is present to choose.
    AutoResolve,
}
