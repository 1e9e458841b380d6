//! Merge and unmerge operations.
//!
//! Merging points source entities (and their existing children) at the
//! target's canonical root, collapsing chains to depth 1. Rows are never
//! deleted and document foreign keys are never rewritten; history stays
//! intact and resolves at read time.

use log::{debug, warn};

use crate::context::RequestContext;
use crate::error::{TallyResult, ValidationError};
use crate::family::Family;
use crate::forest::MergeForest;
use crate::record::{EntityId, EntityPatch, EntityRow};
use crate::store::StoreError;

use super::IdentityEngine;

/// One source that could not be merged.
#[derive(Debug)]
pub struct MergeFailure {
    /// The source whose writes failed.
    pub source: EntityId,

    /// The store error that stopped it.
    pub error: StoreError,
}

/// Outcome of a merge call.
///
/// Sources are applied independently; a failure partway stops that source
/// only. Already-applied re-pointing is never rolled back, so callers must
/// inspect `failures` rather than assume all-or-nothing.
#[derive(Debug)]
#[must_use = "merge may partially fail; inspect the report"]
pub struct MergeReport {
    /// The canonical id everything was merged into.
    pub final_target: EntityId,

    /// Sources whose pointer now targets `final_target`.
    pub merged: Vec<EntityId>,

    /// Pre-existing children re-pointed from a source onto `final_target`.
    pub repointed: Vec<EntityId>,

    /// Sources that failed partway.
    pub failures: Vec<MergeFailure>,
}

impl MergeReport {
    /// Returns true when every requested source was merged.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl IdentityEngine {
    /// Merges `sources` into `target` within one tenant family.
    ///
    /// Pre-flight validation happens before any write: sources must be
    /// non-empty, distinct from the target, and present in the tenant
    /// (fetched and counted), and the target's canonical resolution must
    /// not itself be a source.
    pub fn merge(
        &self,
        ctx: &RequestContext,
        family: Family,
        sources: &[EntityId],
        target: EntityId,
    ) -> TallyResult<MergeReport> {
        let scope = self.load_family(ctx, family)?;
        self.merge_in_scope(ctx, family, &scope, sources, target)
    }

    /// Merge over an explicit scope snapshot. Tenant families pass the full
    /// family listing; locations pass one warehouse's rows.
    pub(crate) fn merge_in_scope(
        &self,
        ctx: &RequestContext,
        family: Family,
        scope: &[EntityRow],
        sources: &[EntityId],
        target: EntityId,
    ) -> TallyResult<MergeReport> {
        if sources.is_empty() {
            return Err(ValidationError::EmptyMergeSources.into());
        }

        let mut seen = std::collections::HashSet::new();
        let sources: Vec<EntityId> = sources
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if sources.contains(&target) {
            return Err(ValidationError::MergeSelfReference { id: target }.into());
        }

        // Existence pre-flight: fetch exactly the expected ids and compare
        // counts. Ids from another tenant surface as missing.
        let mut ids = sources.clone();
        ids.push(target);
        let found = self
            .entity_store()
            .get_many(ctx.tenant_id, family, &ids)?;
        if found.len() != ids.len() {
            return Err(ValidationError::MissingEntities {
                expected: ids.len(),
                found: found.len(),
            }
            .into());
        }

        let forest = MergeForest::from_rows(scope);
        let final_target = forest.resolve(target);
        if sources.contains(&final_target) {
            return Err(ValidationError::TargetResolvesIntoSource {
                target,
                resolved_source: final_target,
            }
            .into());
        }

        let mut report = MergeReport {
            final_target,
            merged: Vec::new(),
            repointed: Vec::new(),
            failures: Vec::new(),
        };

        for &source in &sources {
            match self.apply_one_merge(ctx, family, scope, source, final_target) {
                Ok(repointed) => {
                    debug!(
                        "merge {family}: {source} -> {final_target} ({} children re-pointed)",
                        repointed.len()
                    );
                    report.merged.push(source);
                    report.repointed.extend(repointed);
                }
                Err(error) => {
                    warn!("merge {family}: {source} -> {final_target} failed: {error}");
                    report.failures.push(MergeFailure { source, error });
                }
            }
        }

        Ok(report)
    }

    /// Re-points the source's children onto the final target, then the
    /// source itself. Chains collapse to depth 1.
    fn apply_one_merge(
        &self,
        ctx: &RequestContext,
        family: Family,
        scope: &[EntityRow],
        source: EntityId,
        final_target: EntityId,
    ) -> Result<Vec<EntityId>, StoreError> {
        let mut repointed = Vec::new();
        for row in scope {
            if row.merged_into == Some(source) && row.id != final_target {
                self.entity_store().update(
                    ctx.tenant_id,
                    family,
                    row.id,
                    EntityPatch::point_at(final_target),
                )?;
                repointed.push(row.id);
            }
        }

        self.entity_store().update(
            ctx.tenant_id,
            family,
            source,
            EntityPatch::point_at(final_target),
        )?;
        Ok(repointed)
    }

    /// Clears an entity's own forward pointer, making it a root again.
    ///
    /// Entities that resolved *through* it keep their already-collapsed
    /// final target; only the unmerged node's edge changes.
    pub fn unmerge(
        &self,
        ctx: &RequestContext,
        family: Family,
        entity_id: EntityId,
    ) -> TallyResult<EntityRow> {
        let row = self.require(ctx, family, entity_id)?;
        if row.is_root() {
            return Ok(row);
        }
        debug!("unmerge {family}: {entity_id} detached from {:?}", row.merged_into);
        Ok(self.entity_store().update(
            ctx.tenant_id,
            family,
            entity_id,
            EntityPatch::clear_pointer(),
        )?)
    }
}
