//! Duplicate-name detection across namespace groups.
//!
//! Before a rename, or before attaching a document to an entity under a new
//! name, the engine checks whether the name collides with a *different*
//! canonical entity. For accounts, SKUs, and warehouses the scan stays in
//! the family; customers and suppliers are scanned jointly because either
//! side may be flagged to behave as the other. A hit resolves through the
//! hit's own family forest, so the conflict always names a canonical target.

use log::debug;

use crate::conflict::{ConflictMode, EntityRef, NameConflict};
use crate::context::RequestContext;
use crate::error::{TallyError, TallyResult};
use crate::family::Family;
use crate::forest::MergeForest;
use crate::normalize::strict_key;
use crate::record::{EntityId, EntityPatch, EntityRow};

use super::IdentityEngine;

/// Result of a conflict-checked rename.
#[derive(Debug)]
#[must_use]
pub enum RenameOutcome {
    /// The rename was applied.
    Renamed(EntityRow),

    /// Auto-resolve found the name taken and adopted the existing canonical
    /// entity; the original row is untouched.
    AdoptedExisting(EntityRow),
}

/// Result of a conflict-checked attach resolution.
#[derive(Debug)]
#[must_use]
pub enum AttachOutcome {
    /// No collision; the caller keeps its current reference (or creates).
    NoDuplicate,

    /// Auto-resolve: the caller should reference this canonical entity
    /// instead of creating or keeping its current one.
    AdoptExisting(EntityRow),
}

/// One family's scan state: its rows and forest, built once per check.
struct FamilyScan {
    family: Family,
    rows: Vec<EntityRow>,
    forest: MergeForest,
}

impl IdentityEngine {
    fn scan_group(
        &self,
        ctx: &RequestContext,
        anchor: Family,
    ) -> TallyResult<Vec<FamilyScan>> {
        anchor
            .namespace_group()
            .iter()
            .map(|&family| {
                let rows = self.load_family(ctx, family)?;
                let forest = MergeForest::from_rows(&rows);
                Ok(FamilyScan {
                    family,
                    rows,
                    forest,
                })
            })
            .collect()
    }

    /// Finds the first key-equal row in the group whose canonical id
    /// differs from `own`, if any.
    fn find_duplicate(
        scans: &[FamilyScan],
        anchor: Family,
        key: &str,
        own: Option<EntityRef>,
    ) -> Option<NameConflict> {
        for scan in scans {
            let own_canonical = own.filter(|current| current.family == scan.family).map(
                |current| scan.forest.resolve(current.id),
            );
            for row in &scan.rows {
                if strict_key(&row.name) != key {
                    continue;
                }
                let canonical = scan.forest.resolve(row.id);
                if own_canonical == Some(canonical) {
                    // Editing back to your own name is never a conflict.
                    continue;
                }
                return Some(NameConflict::new(
                    anchor,
                    row.name.clone(),
                    canonical,
                    scan.family,
                ));
            }
        }
        None
    }

    /// Checks whether renaming an entity would collide with a different
    /// canonical entity in its namespace group.
    pub fn check_rename(
        &self,
        ctx: &RequestContext,
        family: Family,
        entity_id: EntityId,
        new_name: &str,
    ) -> TallyResult<Option<NameConflict>> {
        self.require(ctx, family, entity_id)?;
        let scans = self.scan_group(ctx, family)?;
        let key = strict_key(new_name.trim());
        Ok(Self::find_duplicate(
            &scans,
            family,
            &key,
            Some(EntityRef::new(family, entity_id)),
        ))
    }

    /// Checks whether attaching a document under `new_name` would collide
    /// with a canonical entity other than `current`.
    pub fn check_attach(
        &self,
        ctx: &RequestContext,
        anchor_family: Family,
        new_name: &str,
        current: Option<EntityRef>,
    ) -> TallyResult<Option<NameConflict>> {
        let scans = self.scan_group(ctx, anchor_family)?;
        let key = strict_key(new_name.trim());
        Ok(Self::find_duplicate(&scans, anchor_family, &key, current))
    }

    /// The conflict for an exact name in a family's group, ignoring no
    /// current entity. Used to classify unique-constraint losses.
    pub(crate) fn duplicate_for_name(
        &self,
        ctx: &RequestContext,
        family: Family,
        name: &str,
    ) -> TallyResult<Option<NameConflict>> {
        self.check_attach(ctx, family, name, None)
    }

    /// Renames an entity under the given conflict mode.
    ///
    /// Interactive mode raises [`TallyError::NameExists`] on collision;
    /// auto-resolve adopts the existing canonical target instead and leaves
    /// the entity unrenamed. Adoption performs no attribute backfill.
    pub fn rename(
        &self,
        ctx: &RequestContext,
        family: Family,
        entity_id: EntityId,
        new_name: &str,
        mode: ConflictMode,
    ) -> TallyResult<RenameOutcome> {
        let name = self.validate_name(new_name)?;

        if let Some(conflict) = self.check_rename(ctx, family, entity_id, &name)? {
            return match mode {
                ConflictMode::Interactive => Err(TallyError::NameExists(conflict)),
                ConflictMode::AutoResolve => {
                    debug!(
                        "rename {family} {entity_id} to {name:?}: adopting existing {} {}",
                        conflict.target_family, conflict.target_id
                    );
                    let row =
                        self.resolve_entity(ctx, conflict.target_family, conflict.target_id)?;
                    Ok(RenameOutcome::AdoptedExisting(row))
                }
            };
        }

        match self
            .entity_store()
            .update(ctx.tenant_id, family, entity_id, EntityPatch::rename(&name))
        {
            Ok(row) => Ok(RenameOutcome::Renamed(row)),
            Err(err) if err.is_unique_violation() => {
                // A concurrent writer took the name between check and write.
                match self.duplicate_for_name(ctx, family, &name)? {
                    Some(conflict) => Err(TallyError::NameExists(conflict)),
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Resolves what a document should reference when saved under
    /// `new_name` while currently referencing `current`.
    ///
    /// Interactive mode raises on collision so the caller can offer the
    /// three-way choice; auto-resolve returns the entity to adopt.
    pub fn resolve_attach(
        &self,
        ctx: &RequestContext,
        anchor_family: Family,
        new_name: &str,
        current: Option<EntityRef>,
        mode: ConflictMode,
    ) -> TallyResult<AttachOutcome> {
        let Some(conflict) = self.check_attach(ctx, anchor_family, new_name, current)? else {
            return Ok(AttachOutcome::NoDuplicate);
        };

        match mode {
            ConflictMode::Interactive => Err(TallyError::NameExists(conflict)),
            ConflictMode::AutoResolve => {
                debug!(
                    "attach {anchor_family} {new_name:?}: adopting existing {} {}",
                    conflict.target_family, conflict.target_id
                );
                let row = self.resolve_entity(ctx, conflict.target_family, conflict.target_id)?;
                Ok(AttachOutcome::AdoptExisting(row))
            }
        }
    }
}
