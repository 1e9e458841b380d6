//! The identity engine.
//!
//! One generic engine serves all six entity families, parameterized by each
//! family's [`FamilyDescriptor`](crate::family::FamilyDescriptor). Every
//! operation is request-scoped: it takes an explicit [`RequestContext`],
//! reads a fresh row snapshot, and holds no state between calls.

mod duplicate;
mod find_or_create;
mod locations;
mod merge;
mod usage;

pub use duplicate::{AttachOutcome, RenameOutcome};
pub use merge::{MergeFailure, MergeReport};
pub use usage::EntityUsage;

use std::sync::Arc;

use crate::conflict::ConflictMode;
use crate::context::RequestContext;
use crate::error::{TallyError, TallyResult, ValidationError};
use crate::family::Family;
use crate::forest::MergeForest;
use crate::normalize;
use crate::record::{EntityId, EntityPatch, EntityRow, Observation};
use crate::store::{DocumentRows, EntityRows};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Whether find-or-create also matches customers/suppliers on the
    /// loose legal-suffix-stripping key. Default: on.
    pub heuristic_matching: bool,

    /// Deployment-specific placeholder names rejected in addition to the
    /// built-in set.
    pub extra_placeholder_names: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heuristic_matching: true,
            extra_placeholder_names: Vec::new(),
        }
    }
}

/// Result of an explicit create under a conflict mode.
#[derive(Debug)]
#[must_use]
pub enum CreateOutcome {
    /// A new root row was inserted.
    Created(EntityRow),

    /// Auto-resolve found the name already taken and adopted the existing
    /// canonical entity instead of creating.
    AdoptedExisting(EntityRow),
}

impl CreateOutcome {
    /// The row the caller should reference, created or adopted.
    #[must_use]
    pub fn row(&self) -> &EntityRow {
        match self {
            Self::Created(row) | Self::AdoptedExisting(row) => row,
        }
    }
}

/// The entity identity and merge resolution engine.
#[derive(Clone)]
pub struct IdentityEngine {
    entities: Arc<dyn EntityRows>,
    documents: Arc<dyn DocumentRows>,
    config: EngineConfig,
}

impl IdentityEngine {
    /// Create a new engine using the given stores.
    #[must_use]
    pub fn new(entities: Arc<dyn EntityRows>, documents: Arc<dyn DocumentRows>) -> Self {
        Self::with_config(entities, documents, EngineConfig::default())
    }

    /// Create a new engine with explicit tunables.
    #[must_use]
    pub fn with_config(
        entities: Arc<dyn EntityRows>,
        documents: Arc<dyn DocumentRows>,
        config: EngineConfig,
    ) -> Self {
        Self {
            entities,
            documents,
            config,
        }
    }

    pub(crate) fn entity_store(&self) -> &dyn EntityRows {
        self.entities.as_ref()
    }

    pub(crate) fn document_store(&self) -> &dyn DocumentRows {
        self.documents.as_ref()
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// All rows of one family in the tenant, merged rows included.
    pub(crate) fn load_family(
        &self,
        ctx: &RequestContext,
        family: Family,
    ) -> TallyResult<Vec<EntityRow>> {
        Ok(self.entities.list(ctx.tenant_id, family)?)
    }

    /// One row by id, or [`TallyError::NotFound`].
    pub(crate) fn require(
        &self,
        ctx: &RequestContext,
        family: Family,
        id: EntityId,
    ) -> TallyResult<EntityRow> {
        self.entities
            .get(ctx.tenant_id, family, id)?
            .ok_or(TallyError::NotFound { family, id })
    }

    /// Trims the raw name and rejects empty or placeholder names.
    pub(crate) fn validate_name(&self, raw_name: &str) -> TallyResult<String> {
        let trimmed = raw_name.trim();
        if normalize::strict_key(trimmed).is_empty()
            || normalize::is_placeholder(trimmed, &self.config.extra_placeholder_names)
        {
            return Err(TallyError::InvalidName {
                name: raw_name.to_string(),
            });
        }
        Ok(trimmed.to_string())
    }

    /// Resolves an id to its canonical id through a fresh forest snapshot.
    ///
    /// Ids without a row resolve to themselves; this is how documents
    /// display their stored raw foreign keys.
    pub fn resolve_id(
        &self,
        ctx: &RequestContext,
        family: Family,
        id: EntityId,
    ) -> TallyResult<EntityId> {
        let rows = self.load_family(ctx, family)?;
        let forest = MergeForest::from_rows(&rows);
        Ok(forest.resolve(id))
    }

    /// Resolves an id and fetches the canonical row.
    pub fn resolve_entity(
        &self,
        ctx: &RequestContext,
        family: Family,
        id: EntityId,
    ) -> TallyResult<EntityRow> {
        let canonical = self.resolve_id(ctx, family, id)?;
        self.require(ctx, family, canonical)
    }

    /// Root entities of one family, name-sorted. The primary listing.
    pub fn list_roots(
        &self,
        ctx: &RequestContext,
        family: Family,
    ) -> TallyResult<Vec<EntityRow>> {
        let mut rows = self.load_family(ctx, family)?;
        rows.retain(EntityRow::is_root);
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    /// Customer-picker listing: customer roots plus supplier roots flagged
    /// `is_customer`.
    pub fn list_customer_picker(&self, ctx: &RequestContext) -> TallyResult<Vec<EntityRow>> {
        let mut rows = self.list_roots(ctx, Family::Customer)?;
        let suppliers = self.list_roots(ctx, Family::Supplier)?;
        rows.extend(suppliers.into_iter().filter(|row| row.is_customer));
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    /// Supplier-picker listing: supplier roots plus customer roots flagged
    /// `is_supplier`.
    pub fn list_supplier_picker(&self, ctx: &RequestContext) -> TallyResult<Vec<EntityRow>> {
        let mut rows = self.list_roots(ctx, Family::Supplier)?;
        let customers = self.list_roots(ctx, Family::Customer)?;
        rows.extend(customers.into_iter().filter(|row| row.is_supplier));
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    /// Explicitly creates an entity (the UI path), duplicate-checked across
    /// the family's namespace group under the given conflict mode.
    pub fn create(
        &self,
        ctx: &RequestContext,
        family: Family,
        name: &str,
        observation: &Observation,
        mode: ConflictMode,
    ) -> TallyResult<CreateOutcome> {
        let name = self.validate_name(name)?;

        if let Some(conflict) = self.check_attach(ctx, family, &name, None)? {
            return match mode {
                ConflictMode::Interactive => Err(TallyError::NameExists(conflict)),
                ConflictMode::AutoResolve => {
                    log::debug!(
                        "create {family} {name:?}: adopting existing {} {}",
                        conflict.target_family,
                        conflict.target_id
                    );
                    let row =
                        self.resolve_entity(ctx, conflict.target_family, conflict.target_id)?;
                    Ok(CreateOutcome::AdoptedExisting(row))
                }
            };
        }

        let row = EntityRow::new(ctx.tenant_id, family, &name).with_observation(observation);
        match self.entities.insert(row) {
            Ok(created) => Ok(CreateOutcome::Created(created)),
            Err(err) if err.is_unique_violation() => {
                // Lost a race with a concurrent creator: surface it as the
                // structured conflict rather than a bare store error.
                match self.duplicate_for_name(ctx, family, &name)? {
                    Some(conflict) => Err(TallyError::NameExists(conflict)),
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Edits family-specific attributes. Names and merge pointers have
    /// their own conflict-checked operations; patches touching them are
    /// rejected here.
    pub fn update_attributes(
        &self,
        ctx: &RequestContext,
        family: Family,
        id: EntityId,
        patch: EntityPatch,
    ) -> TallyResult<EntityRow> {
        if patch.name.is_some() {
            return Err(TallyError::Validation(ValidationError::ProtectedField {
                field: "name",
            }));
        }
        if patch.merged_into.is_some() {
            return Err(TallyError::Validation(ValidationError::ProtectedField {
                field: "merged_into",
            }));
        }
        self.require(ctx, family, id)?;
        Ok(self.entities.update(ctx.tenant_id, family, id, patch)?)
    }

    /// Direct children of an entity in the merge forest, with their rows.
    /// Feeds the merge-history view.
    pub fn merge_children(
        &self,
        ctx: &RequestContext,
        family: Family,
        id: EntityId,
    ) -> TallyResult<Vec<EntityRow>> {
        let rows = self.load_family(ctx, family)?;
        let forest = MergeForest::from_rows(&rows);
        let children = forest.children_of(id);
        let mut out: Vec<EntityRow> = rows
            .into_iter()
            .filter(|row| children.contains(&row.id))
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    /// Hard-deletes an entity after the orphan check: zero referencing
    /// documents and zero inbound merge pointers.
    pub fn delete(&self, ctx: &RequestContext, family: Family, id: EntityId) -> TallyResult<()> {
        self.require(ctx, family, id)?;

        let documents = self
            .documents
            .count_refs(ctx.tenant_id, family)?
            .get(&id)
            .copied()
            .unwrap_or(0);
        let rows = self.load_family(ctx, family)?;
        let inbound = rows
            .iter()
            .filter(|row| row.merged_into == Some(id))
            .count();

        if documents > 0 || inbound > 0 {
            return Err(TallyError::Validation(ValidationError::EntityInUse {
                id,
                documents,
                inbound,
            }));
        }

        self.entities.delete(ctx.tenant_id, family, id)?;
        Ok(())
    }
}
