//! The merge forest.
//!
//! Within one scope (a tenant's family, or one warehouse for locations) the
//! non-null `merged_into` edges form a forest. This module materializes that
//! forest as an explicit graph, an arena of entity ids with index-based
//! parent pointers, and resolves any id to its canonical root.
//!
//! Forests are built fresh from a row snapshot at the start of every
//! operation and never cached across requests: merges are rare-write /
//! frequent-read, and a stale pointer map would present superseded
//! identities as live. No union-by-rank compression is persisted either,
//! since any node must remain individually unmergeable later.

use std::collections::HashMap;

use crate::record::{EntityId, EntityRow};

/// A point-in-time snapshot of one scope's merge pointers.
#[derive(Debug, Clone, Default)]
pub struct MergeForest {
    ids: Vec<EntityId>,
    index: HashMap<EntityId, usize>,
    parent: Vec<Option<u32>>,
}

impl MergeForest {
    /// Builds the forest from a row snapshot.
    ///
    /// Every row id becomes a node; pointer targets missing from the
    /// snapshot (e.g. concurrently deleted) are added as parentless nodes so
    /// resolution still terminates on them.
    pub fn from_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = &'a EntityRow>,
    {
        let mut forest = Self::default();
        let mut edges: Vec<(usize, EntityId)> = Vec::new();

        for row in rows {
            let node = forest.intern(row.id);
            if let Some(target) = row.merged_into {
                edges.push((node, target));
            }
        }

        for (node, target) in edges {
            let target_node = forest.intern(target);
            #[allow(clippy::cast_possible_truncation)]
            {
                forest.parent[node] = Some(target_node as u32);
            }
        }

        forest
    }

    fn intern(&mut self, id: EntityId) -> usize {
        if let Some(&node) = self.index.get(&id) {
            return node;
        }
        let node = self.ids.len();
        self.ids.push(id);
        self.parent.push(None);
        self.index.insert(id, node);
        node
    }

    /// Number of nodes in the forest.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true when the forest holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns true when the id is known to this snapshot.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    /// Follows merge pointers from `id` to the canonical root.
    ///
    /// Ids unknown to the snapshot resolve to themselves. A node revisited
    /// during the walk terminates it and yields the last good node, so a
    /// defectively cycled pointer map can never loop; the walk is bounded by
    /// the node count either way.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> EntityId {
        let Some(&start) = self.index.get(&id) else {
            return id;
        };

        let mut visited = vec![false; self.ids.len()];
        let mut current = start;
        loop {
            visited[current] = true;
            match self.parent[current] {
                None => return self.ids[current],
                Some(next) => {
                    let next = next as usize;
                    if visited[next] {
                        // Cycle: stop at the last good node.
                        return self.ids[current];
                    }
                    current = next;
                }
            }
        }
    }

    /// Returns true when the id has no outgoing pointer in this snapshot.
    #[must_use]
    pub fn is_root(&self, id: EntityId) -> bool {
        match self.index.get(&id) {
            Some(&node) => self.parent[node].is_none(),
            None => true,
        }
    }

    /// Ids pointing directly at `id` (one hop, not transitive).
    #[must_use]
    pub fn children_of(&self, id: EntityId) -> Vec<EntityId> {
        let Some(&node) = self.index.get(&id) else {
            return Vec::new();
        };
        #[allow(clippy::cast_possible_truncation)]
        let node = node as u32;
        self.parent
            .iter()
            .enumerate()
            .filter(|(_, parent)| **parent == Some(node))
            .map(|(child, _)| self.ids[child])
            .collect()
    }

    /// All ids whose chains end at `root`, excluding `root` itself.
    #[must_use]
    pub fn members_of(&self, root: EntityId) -> Vec<EntityId> {
        self.ids
            .iter()
            .copied()
            .filter(|&id| id != root && self.resolve(id) == root)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TenantId;
    use crate::family::Family;

    fn row(tenant: TenantId, name: &str) -> EntityRow {
        EntityRow::new(tenant, Family::Customer, name)
    }

    fn pointed(tenant: TenantId, name: &str, target: EntityId) -> EntityRow {
        let mut r = row(tenant, name);
        r.merged_into = Some(target);
        r
    }

    #[test]
    fn test_unknown_id_resolves_to_itself() {
        let forest = MergeForest::from_rows(std::iter::empty::<&EntityRow>());
        let id = EntityId::new();
        assert_eq!(forest.resolve(id), id);
        assert!(forest.is_root(id));
    }

    #[test]
    fn test_resolve_follows_chain_to_root() {
        let tenant = TenantId::new();
        let a = row(tenant, "a");
        let b = pointed(tenant, "b", a.id);
        let c = pointed(tenant, "c", b.id);

        let forest = MergeForest::from_rows([&a, &b, &c]);
        assert_eq!(forest.resolve(c.id), a.id);
        assert_eq!(forest.resolve(b.id), a.id);
        assert_eq!(forest.resolve(a.id), a.id);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let tenant = TenantId::new();
        let a = row(tenant, "a");
        let b = pointed(tenant, "b", a.id);

        let forest = MergeForest::from_rows([&a, &b]);
        let once = forest.resolve(b.id);
        assert_eq!(forest.resolve(once), once);
    }

    #[test]
    fn test_cycle_terminates_at_last_good_node() {
        let tenant = TenantId::new();
        let mut a = row(tenant, "a");
        let mut b = row(tenant, "b");
        a.merged_into = Some(b.id);
        b.merged_into = Some(a.id);

        let forest = MergeForest::from_rows([&a, &b]);
        // Walk from a: a -> b, b's target a is already visited -> stop at b.
        assert_eq!(forest.resolve(a.id), b.id);
        assert_eq!(forest.resolve(b.id), a.id);
    }

    #[test]
    fn test_self_cycle_terminates() {
        let tenant = TenantId::new();
        let mut a = row(tenant, "a");
        a.merged_into = Some(a.id);

        let forest = MergeForest::from_rows([&a]);
        assert_eq!(forest.resolve(a.id), a.id);
    }

    #[test]
    fn test_dangling_pointer_target_becomes_terminal_node() {
        let tenant = TenantId::new();
        let gone = EntityId::new();
        let b = pointed(tenant, "b", gone);

        let forest = MergeForest::from_rows([&b]);
        assert_eq!(forest.resolve(b.id), gone);
        assert!(forest.contains(gone));
    }

    #[test]
    fn test_children_are_direct_only() {
        let tenant = TenantId::new();
        let a = row(tenant, "a");
        let b = pointed(tenant, "b", a.id);
        let c = pointed(tenant, "c", b.id);

        let forest = MergeForest::from_rows([&a, &b, &c]);
        assert_eq!(forest.children_of(a.id), vec![b.id]);
        assert_eq!(forest.children_of(b.id), vec![c.id]);
        assert!(forest.children_of(c.id).is_empty());
    }

    #[test]
    fn test_members_are_transitive() {
        let tenant = TenantId::new();
        let a = row(tenant, "a");
        let b = pointed(tenant, "b", a.id);
        let c = pointed(tenant, "c", b.id);
        let unrelated = row(tenant, "x");

        let forest = MergeForest::from_rows([&a, &b, &c, &unrelated]);
        let mut members = forest.members_of(a.id);
        members.sort();
        let mut expected = vec![b.id, c.id];
        expected.sort();
        assert_eq!(members, expected);
    }

    #[test]
    fn test_walk_is_bounded_by_node_count() {
        // Long chain: resolution must touch each node at most once.
        let tenant = TenantId::new();
        let mut rows = vec![row(tenant, "root")];
        for i in 1..200 {
            let target = rows[i - 1].id;
            rows.push(pointed(tenant, &format!("n{i}"), target));
        }

        let forest = MergeForest::from_rows(rows.iter());
        assert_eq!(forest.resolve(rows[199].id), rows[0].id);
    }
}
