//! Usage counters for the merge-review UI.
//!
//! Documents store raw, unresolved foreign keys, so counting groups by the
//! raw value first and folds the result under forest roots: "this root has
//! N documents directly, plus M on entities now merged into it".

use std::collections::HashMap;

use crate::context::RequestContext;
use crate::error::TallyResult;
use crate::family::Family;
use crate::forest::MergeForest;
use crate::record::EntityId;

use super::IdentityEngine;

/// Document-reference counts for one root entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityUsage {
    /// The root entity.
    pub id: EntityId,

    /// Its display name.
    pub name: String,

    /// Documents whose raw foreign key is the root itself.
    pub direct_documents: u64,

    /// Documents whose raw foreign key is an entity merged into the root.
    pub merged_documents: u64,
}

impl IdentityEngine {
    /// Per-root document counts for one family, name-sorted.
    pub fn usage(&self, ctx: &RequestContext, family: Family) -> TallyResult<Vec<EntityUsage>> {
        let counts = self.document_store().count_refs(ctx.tenant_id, family)?;
        let rows = self.load_family(ctx, family)?;
        let forest = MergeForest::from_rows(&rows);

        let mut direct: HashMap<EntityId, u64> = HashMap::new();
        let mut merged: HashMap<EntityId, u64> = HashMap::new();
        for row in &rows {
            let Some(&count) = counts.get(&row.id) else {
                continue;
            };
            let root = forest.resolve(row.id);
            if root == row.id {
                *direct.entry(root).or_default() += count;
            } else {
                *merged.entry(root).or_default() += count;
            }
        }

        let mut usages: Vec<EntityUsage> = rows
            .iter()
            .filter(|row| row.is_root())
            .map(|row| EntityUsage {
                id: row.id,
                name: row.name.clone(),
                direct_documents: direct.get(&row.id).copied().unwrap_or(0),
                merged_documents: merged.get(&row.id).copied().unwrap_or(0),
            })
            .collect();
        usages.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(usages)
    }
}
