//! Row store traits.
//!
//! The relational backing store is an external collaborator; these traits
//! define the slice of it the identity engine consumes. By using traits we
//! enable an in-memory backend for tests and embedded use, and a real
//! database client in production.
//!
//! Error signaling is a closed set: unique-constraint violations must be
//! distinguishable because find-or-create converts them into "found
//! existing" results.

mod memory;

pub use memory::InMemoryRowStore;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::context::TenantId;
use crate::family::Family;
use crate::record::{EntityId, EntityPatch, EntityRow};

/// Errors a row store may raise. Closed set.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write.
    #[error("unique constraint violated on column '{column}'")]
    UniqueViolation {
        /// The constrained column.
        column: String,
    },

    /// The addressed row does not exist.
    #[error("row not found")]
    NotFound,

    /// The caller may not touch this row.
    #[error("permission denied")]
    PermissionDenied,

    /// Anything the closed set does not classify.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true for unique-constraint violations.
    #[must_use]
    pub const fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Unique identifier for a document row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Creates a new random document ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The document kinds that reference identity entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Expense receipt.
    Receipt,
    /// Sales invoice.
    Invoice,
    /// Inbound stock order.
    InboundOrder,
    /// Outbound stock order.
    OutboundOrder,
}

/// One document's reference to an entity, by raw foreign key.
///
/// Documents keep whatever id they were saved with; merges never rewrite
/// them. Usage counting therefore groups by this raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    /// The referencing document.
    pub id: DocumentId,

    /// Owning tenant.
    pub tenant_id: TenantId,

    /// Document kind.
    pub kind: DocumentKind,

    /// Family of the referenced entity.
    pub family: Family,

    /// The raw, unresolved foreign key.
    pub entity_id: EntityId,
}

/// Tenant-scoped access to entity rows.
///
/// All reads and writes are scoped: an id from another tenant behaves as
/// nonexistent.
pub trait EntityRows: Send + Sync {
    /// All rows of one family in the tenant, merged rows included.
    fn list(&self, tenant: TenantId, family: Family) -> Result<Vec<EntityRow>, StoreError>;

    /// All location rows physically stored under one warehouse.
    fn list_by_warehouse(&self, warehouse_id: EntityId) -> Result<Vec<EntityRow>, StoreError>;

    /// One row by id, or `None`.
    fn get(
        &self,
        tenant: TenantId,
        family: Family,
        id: EntityId,
    ) -> Result<Option<EntityRow>, StoreError>;

    /// The rows for the given ids that exist in the tenant. Callers compare
    /// the returned count against the requested count for pre-flight
    /// existence checks.
    fn get_many(
        &self,
        tenant: TenantId,
        family: Family,
        ids: &[EntityId],
    ) -> Result<Vec<EntityRow>, StoreError>;

    /// Rows whose raw display name equals `name` exactly.
    fn find_by_name(
        &self,
        tenant: TenantId,
        family: Family,
        name: &str,
    ) -> Result<Vec<EntityRow>, StoreError>;

    /// Inserts a new row. May fail with [`StoreError::UniqueViolation`].
    fn insert(&self, row: EntityRow) -> Result<EntityRow, StoreError>;

    /// Applies a patch to an existing row. Fails with
    /// [`StoreError::NotFound`] when the row is missing.
    fn update(
        &self,
        tenant: TenantId,
        family: Family,
        id: EntityId,
        patch: EntityPatch,
    ) -> Result<EntityRow, StoreError>;

    /// Removes a row. Fails with [`StoreError::NotFound`] when missing.
    fn delete(&self, tenant: TenantId, family: Family, id: EntityId) -> Result<(), StoreError>;
}

/// Read-only access to document references.
pub trait DocumentRows: Send + Sync {
    /// Document counts per referenced entity, grouped by the raw foreign
    /// key value, across all document kinds referencing the family.
    fn count_refs(
        &self,
        tenant: TenantId,
        family: Family,
    ) -> Result<HashMap<EntityId, u64>, StoreError>;
}
