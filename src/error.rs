//! Error types for the identity engine.
//!
//! All errors are strongly typed using thiserror. Conflicts carry their full
//! structured payload so interactive callers can render the three-way choice
//! without re-querying.

use thiserror::Error;

use crate::conflict::NameConflict;
use crate::family::Family;
use crate::record::EntityId;
use crate::store::StoreError;

/// Pre-flight validation failures. Raised before any write occurs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("merge requires at least one source entity")]
    EmptyMergeSources,

    #[error("entity {id} cannot be merged into itself")]
    MergeSelfReference {
        /// The id appearing as both source and target.
        id: EntityId,
    },

    #[error("merge target {target} already resolves into source {resolved_source}")]
    TargetResolvesIntoSource {
        /// The requested target.
        target: EntityId,
        /// The source its chain ends at.
        resolved_source: EntityId,
    },

    #[error("expected {expected} entities in tenant, found {found}")]
    MissingEntities {
        /// How many ids the caller named.
        expected: usize,
        /// How many rows the tenant actually holds.
        found: usize,
    },

    #[error("locations {a} and {b} belong to different warehouses")]
    CrossWarehouseMerge {
        /// A location on one side of the mismatch.
        a: EntityId,
        /// A location on the other side.
        b: EntityId,
    },

    #[error("field '{field}' cannot be changed through attribute updates")]
    ProtectedField {
        /// The rejected field.
        field: &'static str,
    },

    #[error(
        "entity {id} is still referenced by {documents} document(s) and {inbound} inbound pointer(s)"
    )]
    EntityInUse {
        /// The entity whose deletion was requested.
        id: EntityId,
        /// Documents storing this id as their raw foreign key.
        documents: u64,
        /// Entities whose merge pointer targets this id.
        inbound: usize,
    },
}

/// Top-level error type for the identity engine.
#[derive(Debug, Error)]
pub enum TallyError {
    /// No user is signed in.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The signed-in user has not selected a tenant.
    #[error("no tenant selected")]
    NoTenantSelected,

    /// The name is empty or a recognition-in-flight placeholder.
    #[error("invalid entity name: {name:?}")]
    InvalidName {
        /// The rejected raw name.
        name: String,
    },

    /// A pre-flight validation check failed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The name collides with a different canonical entity.
    #[error("duplicate name: {0}")]
    NameExists(NameConflict),

    /// The addressed entity does not exist in this tenant.
    #[error("{family} entity not found: {id}")]
    NotFound {
        /// Family of the missing entity.
        family: Family,
        /// The missing id.
        id: EntityId,
    },

    /// Opaque passthrough from the row store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl TallyError {
    /// Returns true if this is a pre-flight validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a duplicate-name conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::NameExists(_))
    }

    /// Extracts the conflict payload, if any.
    #[must_use]
    pub fn into_conflict(self) -> Option<NameConflict> {
        match self {
            Self::NameExists(conflict) => Some(conflict),
            _ => None,
        }
    }
}

/// Result type alias for engine operations.
pub type TallyResult<T> = Result<T, TallyError>;
