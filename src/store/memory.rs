//! In-memory row store.
//!
//! Thread-safe reference implementation of the row store traits, intended
//! for embedded usage and tests. Mirrors the production database's partial
//! unique index: among *live root* rows of one (tenant, family), the
//! strict-normalized name is unique; merged-away rows keep their old names.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::context::TenantId;
use crate::family::Family;
use crate::normalize::strict_key;
use crate::record::{EntityId, EntityPatch, EntityRow};
use crate::store::{DocumentRef, DocumentRows, EntityRows, StoreError};

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

#[derive(Debug, Default)]
struct State {
    entities: HashMap<EntityId, EntityRow>,
    documents: Vec<DocumentRef>,
}

impl State {
    fn family_rows(&self, tenant: TenantId, family: Family) -> impl Iterator<Item = &EntityRow> {
        self.entities
            .values()
            .filter(move |row| row.tenant_id == tenant && row.family == family)
    }
}

/// Thread-safe in-memory row store.
#[derive(Debug, Default)]
pub struct InMemoryRowStore {
    state: RwLock<State>,
}

impl InMemoryRowStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a document reference. Document CRUD itself lives outside the
    /// engine; tests seed references through this.
    ///
    /// # Errors
    /// Fails only on a poisoned lock.
    pub fn record_document(&self, doc: DocumentRef) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("document.insert"))?;
        state.documents.push(doc);
        Ok(())
    }
}

impl EntityRows for InMemoryRowStore {
    fn list(&self, tenant: TenantId, family: Family) -> Result<Vec<EntityRow>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("entity.list"))?;
        let mut rows: Vec<EntityRow> = state.family_rows(tenant, family).cloned().collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn list_by_warehouse(&self, warehouse_id: EntityId) -> Result<Vec<EntityRow>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("entity.list_by_warehouse"))?;
        let mut rows: Vec<EntityRow> = state
            .entities
            .values()
            .filter(|row| row.family == Family::Location && row.warehouse_id == Some(warehouse_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    fn get(
        &self,
        tenant: TenantId,
        family: Family,
        id: EntityId,
    ) -> Result<Option<EntityRow>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("entity.get"))?;
        Ok(state
            .entities
            .get(&id)
            .filter(|row| row.tenant_id == tenant && row.family == family)
            .cloned())
    }

    fn get_many(
        &self,
        tenant: TenantId,
        family: Family,
        ids: &[EntityId],
    ) -> Result<Vec<EntityRow>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("entity.get_many"))?;
        Ok(ids
            .iter()
            .filter_map(|id| state.entities.get(id))
            .filter(|row| row.tenant_id == tenant && row.family == family)
            .cloned()
            .collect())
    }

    fn find_by_name(
        &self,
        tenant: TenantId,
        family: Family,
        name: &str,
    ) -> Result<Vec<EntityRow>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("entity.find_by_name"))?;
        let mut rows: Vec<EntityRow> = state
            .family_rows(tenant, family)
            .filter(|row| row.name == name)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    fn insert(&self, row: EntityRow) -> Result<EntityRow, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.insert"))?;
        if state.entities.contains_key(&row.id) {
            return Err(StoreError::UniqueViolation {
                column: "id".to_string(),
            });
        }

        if row.is_root() {
            // Locations are name-unique per warehouse, every other family
            // per (tenant, family).
            let key = strict_key(&row.name);
            let collides = state
                .family_rows(row.tenant_id, row.family)
                .filter(|existing| existing.warehouse_id == row.warehouse_id)
                .any(|existing| existing.is_root() && strict_key(&existing.name) == key);
            if collides {
                return Err(StoreError::UniqueViolation {
                    column: "name".to_string(),
                });
            }
        }

        state.entities.insert(row.id, row.clone());
        Ok(row)
    }

    fn update(
        &self,
        tenant: TenantId,
        family: Family,
        id: EntityId,
        patch: EntityPatch,
    ) -> Result<EntityRow, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.update"))?;
        let row = state
            .entities
            .get_mut(&id)
            .filter(|row| row.tenant_id == tenant && row.family == family)
            .ok_or(StoreError::NotFound)?;
        patch.apply(row);
        Ok(row.clone())
    }

    fn delete(&self, tenant: TenantId, family: Family, id: EntityId) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("entity.delete"))?;
        let exists = state
            .entities
            .get(&id)
            .is_some_and(|row| row.tenant_id == tenant && row.family == family);
        if !exists {
            return Err(StoreError::NotFound);
        }
        state.entities.remove(&id);
        Ok(())
    }
}

impl DocumentRows for InMemoryRowStore {
    fn count_refs(
        &self,
        tenant: TenantId,
        family: Family,
    ) -> Result<HashMap<EntityId, u64>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("document.count_refs"))?;
        let mut counts: HashMap<EntityId, u64> = HashMap::new();
        for doc in &state.documents {
            if doc.tenant_id == tenant && doc.family == family {
                *counts.entry(doc.entity_id).or_default() += 1;
            }
        }
        Ok(counts)
    }
}
