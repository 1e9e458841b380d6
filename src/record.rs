//! Entity rows, patches, and ingestion observations.
//!
//! One row shape serves all six families. Family-specific attributes are
//! optional columns that stay inert with respect to the merge engine, except
//! that find-or-create may backfill missing ones from a newer observation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::TenantId;
use crate::family::Family;

/// Opaque, stable entity identifier.
///
/// Generated at creation and never changed. Documents store this id raw;
/// merges are reflected only through read-time resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Creates a new random entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an entity ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EntityId> for Uuid {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// One entity row, shared by all families.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityRow {
    /// Stable identifier.
    pub id: EntityId,

    /// Owning tenant. Location rows carry the parent warehouse's tenant
    /// denormalized; their authoritative scope is `warehouse_id`.
    pub tenant_id: TenantId,

    /// Which family table the row belongs to.
    pub family: Family,

    /// Display name. Mutable; conflict-checked on rename.
    pub name: String,

    /// Merge pointer. `None` means this row is a root (canonical,
    /// displayable); `Some` means it has been superseded.
    #[serde(default)]
    pub merged_into: Option<EntityId>,

    /// Tax registration number (customers/suppliers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_no: Option<String>,

    /// Contact phone (customers/suppliers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Postal address (customers/suppliers/warehouses).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Unit of measure (SKUs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Item code (SKUs).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Supplier rows flagged to also appear in customer pickers.
    #[serde(default)]
    pub is_customer: bool,

    /// Customer rows flagged to also appear in supplier pickers.
    #[serde(default)]
    pub is_supplier: bool,

    /// Parent warehouse (location rows only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<EntityId>,

    /// Whether the row was created by AI document ingestion.
    #[serde(default)]
    pub ai_recognized: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl EntityRow {
    /// Creates a new root row with the given display name.
    #[must_use]
    pub fn new(tenant_id: TenantId, family: Family, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            tenant_id,
            family,
            name: name.into(),
            merged_into: None,
            tax_no: None,
            phone: None,
            address: None,
            unit: None,
            code: None,
            is_customer: false,
            is_supplier: false,
            warehouse_id: None,
            ai_recognized: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a location row under the given warehouse.
    #[must_use]
    pub fn new_location(
        tenant_id: TenantId,
        warehouse_id: EntityId,
        name: impl Into<String>,
    ) -> Self {
        let mut row = Self::new(tenant_id, Family::Location, name);
        row.warehouse_id = Some(warehouse_id);
        row
    }

    /// Marks the row as produced by AI ingestion.
    #[must_use]
    pub fn recognized(mut self) -> Self {
        self.ai_recognized = true;
        self
    }

    /// Applies an ingestion observation's attributes to a fresh row.
    #[must_use]
    pub fn with_observation(mut self, observation: &Observation) -> Self {
        self.tax_no = observation.tax_no.clone();
        self.phone = observation.phone.clone();
        self.address = observation.address.clone();
        self.unit = observation.unit.clone();
        self.code = observation.code.clone();
        self
    }

    /// Returns true when the row has no merge pointer.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.merged_into.is_none()
    }
}

impl PartialEq for EntityRow {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityRow {}

/// Partial update for one entity row.
///
/// `merged_into` is doubly optional so a patch can set the pointer, clear
/// it, or leave it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPatch {
    /// New display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Pointer change: `Some(Some(id))` sets, `Some(None)` clears.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merged_into: Option<Option<EntityId>>,

    /// New tax number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_no: Option<String>,

    /// New phone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// New address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// New unit of measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// New item code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// New customer-picker flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_customer: Option<bool>,

    /// New supplier-picker flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_supplier: Option<bool>,
}

impl EntityPatch {
    /// A patch that only sets the merge pointer.
    #[must_use]
    pub fn point_at(target: EntityId) -> Self {
        Self {
            merged_into: Some(Some(target)),
            ..Self::default()
        }
    }

    /// A patch that only clears the merge pointer.
    #[must_use]
    pub fn clear_pointer() -> Self {
        Self {
            merged_into: Some(None),
            ..Self::default()
        }
    }

    /// A patch that only renames.
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Returns true when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch to a row in place, bumping `updated_at`.
    pub fn apply(&self, row: &mut EntityRow) {
        if let Some(name) = &self.name {
            row.name.clone_from(name);
        }
        if let Some(pointer) = self.merged_into {
            row.merged_into = pointer;
        }
        if let Some(tax_no) = &self.tax_no {
            row.tax_no = Some(tax_no.clone());
        }
        if let Some(phone) = &self.phone {
            row.phone = Some(phone.clone());
        }
        if let Some(address) = &self.address {
            row.address = Some(address.clone());
        }
        if let Some(unit) = &self.unit {
            row.unit = Some(unit.clone());
        }
        if let Some(code) = &self.code {
            row.code = Some(code.clone());
        }
        if let Some(is_customer) = self.is_customer {
            row.is_customer = is_customer;
        }
        if let Some(is_supplier) = self.is_supplier {
            row.is_supplier = is_supplier;
        }
        row.updated_at = Utc::now();
    }
}

/// Attributes extracted alongside a name during document ingestion.
///
/// Find-or-create uses these for secondary-key matching and for backfilling
/// attributes an existing match lacks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Extracted tax registration number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_no: Option<String>,

    /// Extracted contact phone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Extracted postal address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Extracted unit of measure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Extracted item code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Observation {
    /// An observation carrying nothing but the name.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// An observation carrying a tax number.
    #[must_use]
    pub fn with_tax_no(tax_no: impl Into<String>) -> Self {
        Self {
            tax_no: Some(tax_no.into()),
            ..Self::default()
        }
    }

    /// An observation carrying an item code.
    #[must_use]
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Builds a patch filling only the attributes `row` lacks.
    ///
    /// Present attributes on the row are never overwritten; the returned
    /// patch is empty when there is nothing to backfill.
    #[must_use]
    pub fn backfill_for(&self, row: &EntityRow) -> EntityPatch {
        let mut patch = EntityPatch::default();
        if row.tax_no.is_none() {
            patch.tax_no.clone_from(&self.tax_no);
        }
        if row.phone.is_none() {
            patch.phone.clone_from(&self.phone);
        }
        if row.address.is_none() {
            patch.address.clone_from(&self.address);
        }
        if row.unit.is_none() {
            patch.unit.clone_from(&self.unit);
        }
        if row.code.is_none() {
            patch.code.clone_from(&self.code);
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_row_is_root() {
        let row = EntityRow::new(TenantId::new(), Family::Customer, "Acme");
        assert!(row.is_root());
        assert_eq!(row.name, "Acme");
        assert!(!row.ai_recognized);
    }

    #[test]
    fn test_rows_compare_by_id() {
        let tenant = TenantId::new();
        let a = EntityRow::new(tenant, Family::Sku, "Widget");
        let mut b = a.clone();
        b.name = "Renamed".to_string();
        assert_eq!(a, b);
    }

    #[test]
    fn test_patch_sets_and_clears_pointer() {
        let tenant = TenantId::new();
        let target = EntityId::new();
        let mut row = EntityRow::new(tenant, Family::Account, "Cash");

        EntityPatch::point_at(target).apply(&mut row);
        assert_eq!(row.merged_into, Some(target));

        EntityPatch::clear_pointer().apply(&mut row);
        assert!(row.is_root());
    }

    #[test]
    fn test_empty_patch_leaves_fields_alone() {
        let tenant = TenantId::new();
        let mut row = EntityRow::new(tenant, Family::Supplier, "Acme");
        row.tax_no = Some("91330100".to_string());

        let before = row.clone();
        EntityPatch::default().apply(&mut row);
        assert_eq!(row.name, before.name);
        assert_eq!(row.tax_no, before.tax_no);
        assert_eq!(row.merged_into, before.merged_into);
    }

    #[test]
    fn test_backfill_fills_only_missing_attributes() {
        let tenant = TenantId::new();
        let mut row = EntityRow::new(tenant, Family::Supplier, "Acme");
        row.phone = Some("555-0100".to_string());

        let observation = Observation {
            tax_no: Some("91330100MA27".to_string()),
            phone: Some("555-9999".to_string()),
            ..Observation::default()
        };

        let patch = observation.backfill_for(&row);
        assert_eq!(patch.tax_no.as_deref(), Some("91330100MA27"));
        assert!(patch.phone.is_none(), "present phone must not be overwritten");
    }

    #[test]
    fn test_backfill_is_empty_when_row_is_complete() {
        let tenant = TenantId::new();
        let mut row = EntityRow::new(tenant, Family::Supplier, "Acme");
        row.tax_no = Some("A".to_string());

        let observation = Observation::with_tax_no("B");
        assert!(observation.backfill_for(&row).is_empty());
    }

    #[test]
    fn test_location_row_carries_warehouse() {
        let warehouse = EntityId::new();
        let row = EntityRow::new_location(TenantId::new(), warehouse, "A1");
        assert_eq!(row.warehouse_id, Some(warehouse));
        assert_eq!(row.family, Family::Location);
    }

    #[test]
    fn test_row_serialization_roundtrip() {
        let row = EntityRow::new(TenantId::new(), Family::Warehouse, "Main").recognized();
        let json = serde_json::to_string(&row).unwrap();
        let decoded: EntityRow = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.id, row.id);
        assert_eq!(decoded.name, row.name);
        assert!(decoded.ai_recognized);
    }
}
