//! Warehouse/location operations: the second, nested forest.
//!
//! Locations merge within a single warehouse's scope only. Warehouses merge
//! in the ordinary tenant forest, and location listings for a canonical
//! warehouse transparently include locations physically stored under any
//! warehouse id resolving to it, deduplicated by strict name key with the
//! target warehouse winning ties.

use std::collections::HashSet;

use log::{debug, warn};

use crate::context::RequestContext;
use crate::error::{TallyError, TallyResult, ValidationError};
use crate::family::Family;
use crate::forest::MergeForest;
use crate::normalize::strict_key;
use crate::record::{EntityId, EntityRow};

use super::merge::MergeReport;
use super::IdentityEngine;

impl IdentityEngine {
    /// The canonical warehouse row for an id, plus every warehouse id
    /// resolving to it (canonical first).
    fn warehouse_scope(
        &self,
        ctx: &RequestContext,
        warehouse_id: EntityId,
    ) -> TallyResult<(EntityRow, Vec<EntityId>)> {
        let warehouses = self.load_family(ctx, Family::Warehouse)?;
        let forest = MergeForest::from_rows(&warehouses);
        let canonical_id = forest.resolve(warehouse_id);
        let canonical = warehouses
            .iter()
            .find(|row| row.id == canonical_id)
            .cloned()
            .ok_or(TallyError::NotFound {
                family: Family::Warehouse,
                id: canonical_id,
            })?;

        let known: HashSet<EntityId> = warehouses.iter().map(|row| row.id).collect();
        let mut members = vec![canonical_id];
        members.extend(
            forest
                .members_of(canonical_id)
                .into_iter()
                .filter(|id| known.contains(id)),
        );
        Ok((canonical, members))
    }

    /// Location roots visible under a warehouse, across every warehouse id
    /// resolving to it.
    ///
    /// Dedup policy: the canonical warehouse's own locations win ties; a
    /// merged-away warehouse's location appears only when its strict name
    /// key is not already present among the target's own.
    pub fn list_locations(
        &self,
        ctx: &RequestContext,
        warehouse_id: EntityId,
    ) -> TallyResult<Vec<EntityRow>> {
        let (canonical, members) = self.warehouse_scope(ctx, warehouse_id)?;

        let mut chosen: Vec<EntityRow> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for member in members {
            let rows = self.entity_store().list_by_warehouse(member)?;
            for row in rows {
                if !row.is_root() {
                    continue;
                }
                let key = strict_key(&row.name);
                if member == canonical.id {
                    seen.insert(key);
                    chosen.push(row);
                } else if seen.insert(key) {
                    chosen.push(row);
                }
            }
        }

        chosen.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(chosen)
    }

    /// Resolves a location id to its canonical id within its warehouse's
    /// forest.
    pub fn resolve_location(
        &self,
        ctx: &RequestContext,
        location_id: EntityId,
    ) -> TallyResult<EntityId> {
        let row = self.require(ctx, Family::Location, location_id)?;
        let Some(warehouse_id) = row.warehouse_id else {
            // Orphaned row; nothing to resolve through.
            return Ok(location_id);
        };
        let rows = self.entity_store().list_by_warehouse(warehouse_id)?;
        let forest = MergeForest::from_rows(&rows);
        Ok(forest.resolve(location_id))
    }

    /// Find-or-create over the merged warehouse scope.
    ///
    /// Matching searches every warehouse resolving to the canonical one;
    /// new rows are always created under the canonical warehouse so nothing
    /// accretes under superseded ids.
    pub fn find_or_create_location(
        &self,
        ctx: &RequestContext,
        warehouse_id: EntityId,
        raw_name: &str,
    ) -> TallyResult<EntityRow> {
        let name = self.validate_name(raw_name)?;
        let (canonical, members) = self.warehouse_scope(ctx, warehouse_id)?;

        // Canonical warehouse's rows first so ties adopt its locations.
        let mut scope: Vec<EntityRow> = Vec::new();
        for member in &members {
            scope.extend(self.entity_store().list_by_warehouse(*member)?);
        }
        let forest = MergeForest::from_rows(&scope);

        let key = strict_key(&name);
        let mapping = scope
            .iter()
            .filter(|row| strict_key(&row.name) == key)
            .find(|row| row.merged_into.is_some());
        let hit = mapping.or_else(|| {
            scope
                .iter()
                .find(|row| row.is_root() && strict_key(&row.name) == key)
        });

        if let Some(row) = hit {
            let canonical_loc = forest.resolve(row.id);
            debug!(
                "find_or_create_location {}: {name:?} matched {canonical_loc}",
                canonical.id
            );
            return scope
                .iter()
                .find(|r| r.id == canonical_loc)
                .cloned()
                .ok_or(TallyError::NotFound {
                    family: Family::Location,
                    id: canonical_loc,
                });
        }

        let row = EntityRow::new_location(ctx.tenant_id, canonical.id, &name).recognized();
        match self.entity_store().insert(row) {
            Ok(created) => Ok(created),
            Err(err) if err.is_unique_violation() => {
                warn!(
                    "find_or_create_location {}: lost creation race for {name:?}, re-querying",
                    canonical.id
                );
                let existing: Vec<EntityRow> = self
                    .entity_store()
                    .find_by_name(ctx.tenant_id, Family::Location, &name)?
                    .into_iter()
                    .filter(|row| {
                        row.warehouse_id
                            .is_some_and(|wh| members.contains(&wh))
                    })
                    .collect();
                let rival = existing
                    .iter()
                    .find(|row| row.is_root())
                    .or_else(|| existing.first())
                    .cloned();
                match rival {
                    Some(row) => Ok(row),
                    None => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Merges locations within one warehouse.
    ///
    /// All candidate rows must share a single `warehouse_id`; cross-warehouse
    /// merges are rejected before any write.
    pub fn merge_locations(
        &self,
        ctx: &RequestContext,
        sources: &[EntityId],
        target: EntityId,
    ) -> TallyResult<MergeReport> {
        let mut ids: Vec<EntityId> = sources.to_vec();
        ids.push(target);
        let rows = self
            .entity_store()
            .get_many(ctx.tenant_id, Family::Location, &ids)?;

        let mut distinct: Vec<EntityId> = Vec::new();
        for id in &ids {
            if !distinct.contains(id) {
                distinct.push(*id);
            }
        }
        if rows.len() != distinct.len() {
            return Err(ValidationError::MissingEntities {
                expected: distinct.len(),
                found: rows.len(),
            }
            .into());
        }

        let first = &rows[0];
        if let Some(other) = rows.iter().find(|row| row.warehouse_id != first.warehouse_id) {
            return Err(ValidationError::CrossWarehouseMerge {
                a: first.id,
                b: other.id,
            }
            .into());
        }

        let warehouse_id = first.warehouse_id.ok_or_else(|| {
            TallyError::Store(crate::store::StoreError::Backend(format!(
                "location row {} has no warehouse",
                first.id
            )))
        })?;
        let scope = self.entity_store().list_by_warehouse(warehouse_id)?;
        self.merge_in_scope(ctx, Family::Location, &scope, sources, target)
    }

    /// Clears a location's own forward pointer. See
    /// [`unmerge`](Self::unmerge).
    pub fn unmerge_location(
        &self,
        ctx: &RequestContext,
        location_id: EntityId,
    ) -> TallyResult<EntityRow> {
        self.unmerge(ctx, Family::Location, location_id)
    }
}
