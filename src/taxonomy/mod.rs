//! Materialized-path taxonomy tree: CRUD, move, delete, ancestor and
//! descendant queries, and resource classification (spec §4.6
//! "Taxonomy tree"). Grounded in
//! `original_source/backend/app/services/taxonomy_service.py`.
//!
//! The node/assignment store here is a minimal in-process substitute
//! for the real storage layer (spec §1/§9), not a reimplementation of
//! it — a real deployment persists these rows relationally.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{NeoError, NeoResult};
use crate::types::{ResourceTaxonomy, TaxonomyNode};

fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    let mut slug = String::with_capacity(lower.len());
    let mut last_was_hyphen = false;
    for c in lower.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    slug.trim_matches('-').to_string()
}

#[derive(Debug, Clone, Default)]
pub struct DeleteSummary {
    pub deleted_count: usize,
    pub reparented_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TreeNode {
    pub node: TaxonomyNode,
    pub children: Vec<TreeNode>,
}

/// In-process taxonomy store plus the CRUD/move/delete/query
/// operations of spec §4.6.
#[derive(Default)]
pub struct TaxonomyService {
    nodes: RwLock<HashMap<Uuid, TaxonomyNode>>,
    assignments: RwLock<Vec<ResourceTaxonomy>>,
}

impl TaxonomyService {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: Uuid) -> NeoResult<TaxonomyNode> {
        self.nodes
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| NeoError::NotFound(format!("taxonomy node {id} not found")))
    }

    fn compute_path(&self, parent_id: Option<Uuid>, slug: &str) -> NeoResult<String> {
        match parent_id {
            None => Ok(format!("/{slug}")),
            Some(pid) => {
                let parent = self.get(pid)?;
                Ok(format!("{}/{}", parent.path, slug))
            }
        }
    }

    fn is_descendant(&self, node_path: &str, potential_ancestor_path: &str) -> bool {
        node_path.starts_with(&format!("{potential_ancestor_path}/"))
    }

    /// Creates a node, enforcing slug uniqueness and materialized-path
    /// computation from the parent.
    pub fn create_node(
        &self,
        name: &str,
        parent_id: Option<Uuid>,
        description: Option<String>,
        keywords: Vec<String>,
        allow_resources: bool,
    ) -> NeoResult<TaxonomyNode> {
        if name.trim().is_empty() {
            return Err(NeoError::InvalidArgument("node name cannot be empty".to_string()));
        }
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(NeoError::InvalidArgument(
                "node name must contain at least one alphanumeric character".to_string(),
            ));
        }

        let mut nodes = self.nodes.write().unwrap();
        if nodes.values().any(|n| n.slug == slug) {
            return Err(NeoError::Conflict(format!("a node with slug '{slug}' already exists")));
        }

        let level = match parent_id {
            None => 0,
            Some(pid) => {
                let parent = nodes
                    .get(&pid)
                    .ok_or_else(|| NeoError::NotFound(format!("parent node {pid} not found")))?;
                parent.level + 1
            }
        };
        drop(nodes);
        let path = self.compute_path(parent_id, &slug)?;

        let now = Utc::now();
        let node = TaxonomyNode {
            id: Uuid::new_v4(),
            name: name.to_string(),
            slug,
            parent_id,
            level,
            path,
            keywords,
            description,
            resource_count: 0,
            descendant_resource_count: 0,
            is_leaf: true,
            allow_resources,
            created_at: now,
            updated_at: now,
        };

        let mut nodes = self.nodes.write().unwrap();
        if let Some(pid) = parent_id {
            if let Some(parent) = nodes.get_mut(&pid) {
                parent.is_leaf = false;
            }
        }
        nodes.insert(node.id, node.clone());
        Ok(node)
    }

    /// Renames a node, recomputing its slug and materialized path (and
    /// cascading the path/level change to every descendant), as create
    /// and move already do.
    pub fn rename_node(&self, node_id: Uuid, new_name: &str) -> NeoResult<TaxonomyNode> {
        if new_name.trim().is_empty() {
            return Err(NeoError::InvalidArgument("node name cannot be empty".to_string()));
        }
        let new_slug = slugify(new_name);
        if new_slug.is_empty() {
            return Err(NeoError::InvalidArgument(
                "node name must contain at least one alphanumeric character".to_string(),
            ));
        }

        let node = self.get(node_id)?;
        if new_slug != node.slug && self.nodes.read().unwrap().values().any(|n| n.slug == new_slug && n.id != node_id) {
            return Err(NeoError::Conflict(format!("a node with slug '{new_slug}' already exists")));
        }

        let old_path = node.path.clone();
        let new_path = self.compute_path(node.parent_id, &new_slug)?;

        let mut nodes = self.nodes.write().unwrap();
        {
            let updated = nodes.get_mut(&node_id).expect("node exists");
            updated.name = new_name.to_string();
            updated.slug = new_slug;
            updated.path = new_path.clone();
            updated.updated_at = Utc::now();
        }

        for descendant in nodes.values_mut() {
            if descendant.path.starts_with(&format!("{old_path}/")) {
                let replaced = descendant.path.replacen(&old_path, &new_path, 1);
                descendant.level = replaced.matches('/').count() as i32 - 1;
                descendant.path = replaced;
            }
        }

        Ok(nodes.get(&node_id).expect("node exists").clone())
    }

    /// `Move(node, new_parent)`: rejects circular moves with
    /// `Conflict`, leaving the tree unchanged (testable property 10).
    pub fn move_node(&self, node_id: Uuid, new_parent_id: Option<Uuid>) -> NeoResult<TaxonomyNode> {
        let node = self.get(node_id)?;
        if node.parent_id == new_parent_id {
            return Ok(node);
        }

        if let Some(new_parent_id) = new_parent_id {
            if new_parent_id == node_id {
                return Err(NeoError::Conflict(
                    "cannot move node to itself".to_string(),
                ));
            }
            let new_parent = self.get(new_parent_id)?;
            if self.is_descendant(&new_parent.path, &node.path) {
                return Err(NeoError::Conflict(
                    "cannot move node to its own descendant".to_string(),
                ));
            }
        }

        let old_path = node.path.clone();
        let old_parent_id = node.parent_id;

        let new_parent_level = match new_parent_id {
            Some(pid) => self.get(pid)?.level,
            None => -1,
        };
        let new_path = self.compute_path(new_parent_id, &node.slug)?;

        let mut nodes = self.nodes.write().unwrap();

        if let Some(old_pid) = old_parent_id {
            let sibling_count = nodes
                .values()
                .filter(|n| n.parent_id == Some(old_pid) && n.id != node_id)
                .count();
            if let Some(old_parent) = nodes.get_mut(&old_pid) {
                old_parent.is_leaf = sibling_count == 0;
            }
        }

        if let Some(new_pid) = new_parent_id {
            if let Some(new_parent) = nodes.get_mut(&new_pid) {
                new_parent.is_leaf = false;
            }
        }

        let updated = nodes.get_mut(&node_id).expect("node exists");
        updated.parent_id = new_parent_id;
        updated.level = new_parent_level + 1;
        updated.path = new_path.clone();
        updated.updated_at = Utc::now();
        let moved = updated.clone();

        for descendant in nodes.values_mut() {
            if descendant.path.starts_with(&format!("{old_path}/")) {
                let replaced = descendant.path.replacen(&old_path, &new_path, 1);
                descendant.level = replaced.matches('/').count() as i32 - 1;
                descendant.path = replaced;
            }
        }

        Ok(moved)
    }

    /// `Delete(node, cascade=false)`: fails with `Conflict` if the node
    /// has assigned resources, otherwise reparents children to
    /// `node.parent` and deletes `node`.
    /// `Delete(node, cascade=true)`: deletes `node`, every descendant,
    /// and all their `ResourceTaxonomy` assignments — in the default
    /// (non-strict) mode this crate implements, assigned resources
    /// never block a cascading delete.
    pub fn delete_node(&self, node_id: Uuid, cascade: bool) -> NeoResult<DeleteSummary> {
        let node = self.get(node_id)?;

        if !cascade {
            let assigned = self
                .assignments
                .read()
                .unwrap()
                .iter()
                .filter(|a| a.taxonomy_node_id == node_id)
                .count();
            if assigned > 0 {
                return Err(NeoError::Conflict(format!(
                    "cannot delete node with {assigned} assigned resources"
                )));
            }
        }

        let mut nodes = self.nodes.write().unwrap();
        let mut summary = DeleteSummary {
            deleted_count: 1,
            reparented_count: 0,
        };

        if cascade {
            let descendant_ids: Vec<Uuid> = nodes
                .values()
                .filter(|n| n.path.starts_with(&format!("{}/", node.path)))
                .map(|n| n.id)
                .collect();

            let mut assignments = self.assignments.write().unwrap();
            assignments.retain(|a| a.taxonomy_node_id != node_id && !descendant_ids.contains(&a.taxonomy_node_id));
            drop(assignments);

            for id in &descendant_ids {
                nodes.remove(id);
            }
            summary.deleted_count += descendant_ids.len();
        } else {
            let child_ids: Vec<Uuid> = nodes
                .values()
                .filter(|n| n.parent_id == Some(node_id))
                .map(|n| n.id)
                .collect();

            for child_id in child_ids {
                let old_path = nodes.get(&child_id).unwrap().path.clone();
                let new_level = match node.parent_id {
                    Some(pid) => nodes.get(&pid).map(|p| p.level + 1).unwrap_or(0),
                    None => 0,
                };
                let new_path = self.compute_path(node.parent_id, &nodes.get(&child_id).unwrap().slug)?;

                {
                    let child = nodes.get_mut(&child_id).unwrap();
                    child.parent_id = node.parent_id;
                    child.level = new_level;
                    child.path = new_path.clone();
                }

                for descendant in nodes.values_mut() {
                    if descendant.path.starts_with(&format!("{old_path}/")) {
                        let replaced = descendant.path.replacen(&old_path, &new_path, 1);
                        descendant.level = replaced.matches('/').count() as i32 - 1;
                        descendant.path = replaced;
                    }
                }
                summary.reparented_count += 1;
            }
        }

        if let Some(pid) = node.parent_id {
            let sibling_count = nodes
                .values()
                .filter(|n| n.parent_id == Some(pid) && n.id != node_id)
                .count();
            if let Some(parent) = nodes.get_mut(&pid) {
                parent.is_leaf = sibling_count == 0;
            }
        }

        nodes.remove(&node_id);
        Ok(summary)
    }

    /// `GetAncestors(node)` via path-prefix: `O(depth)`.
    pub fn get_ancestors(&self, node_id: Uuid) -> NeoResult<Vec<TaxonomyNode>> {
        let node = self.get(node_id)?;
        let nodes = self.nodes.read().unwrap();
        let mut ancestors: Vec<TaxonomyNode> = nodes
            .values()
            .filter(|n| node.path.starts_with(&format!("{}/", n.path)))
            .cloned()
            .collect();
        ancestors.sort_by_key(|n| n.level);
        Ok(ancestors)
    }

    /// `GetDescendants(node)` via path-prefix: `O(subtree)`.
    pub fn get_descendants(&self, node_id: Uuid) -> NeoResult<Vec<TaxonomyNode>> {
        let node = self.get(node_id)?;
        let nodes = self.nodes.read().unwrap();
        let mut descendants: Vec<TaxonomyNode> = nodes
            .values()
            .filter(|n| n.path.starts_with(&format!("{}/", node.path)))
            .cloned()
            .collect();
        descendants.sort_by_key(|n| n.level);
        Ok(descendants)
    }

    /// Nested tree rooted at `root_id` (or the full forest of
    /// level-0 nodes if `None`), limited to `max_depth` if given.
    pub fn get_tree(&self, root_id: Option<Uuid>, max_depth: Option<i32>) -> NeoResult<Vec<TreeNode>> {
        let nodes = self.nodes.read().unwrap();
        let roots: Vec<TaxonomyNode> = match root_id {
            Some(id) => vec![nodes
                .get(&id)
                .cloned()
                .ok_or_else(|| NeoError::NotFound(format!("root node {id} not found")))?],
            None => {
                let mut roots: Vec<TaxonomyNode> =
                    nodes.values().filter(|n| n.level == 0).cloned().collect();
                roots.sort_by(|a, b| a.name.cmp(&b.name));
                roots
            }
        };

        Ok(roots
            .into_iter()
            .map(|root| self.build_tree_node(&root, &nodes, max_depth))
            .collect())
    }

    fn build_tree_node(
        &self,
        node: &TaxonomyNode,
        all_nodes: &HashMap<Uuid, TaxonomyNode>,
        max_depth: Option<i32>,
    ) -> TreeNode {
        if let Some(max_depth) = max_depth {
            if node.level >= max_depth {
                return TreeNode {
                    node: node.clone(),
                    children: Vec::new(),
                };
            }
        }
        let mut children: Vec<&TaxonomyNode> = all_nodes
            .values()
            .filter(|n| n.parent_id == Some(node.id))
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));

        TreeNode {
            node: node.clone(),
            children: children
                .into_iter()
                .map(|child| self.build_tree_node(child, all_nodes, max_depth))
                .collect(),
        }
    }

    /// Assigns `resource_id` to `taxonomy_node_id`, dropping the
    /// assignment if the node does not allow resources (spec §9 Open
    /// Question: silently drop rather than error, since classification
    /// runs unattended in the ingestion pipeline). Updates
    /// `resource_count` on the node and `descendant_resource_count` on
    /// every ancestor.
    pub fn assign(&self, assignment: ResourceTaxonomy) -> NeoResult<()> {
        let node = self.get(assignment.taxonomy_node_id)?;
        if !node.allow_resources {
            return Ok(());
        }

        self.assignments.write().unwrap().push(assignment);
        self.update_resource_counts(node.id)
    }

    fn update_resource_counts(&self, node_id: Uuid) -> NeoResult<()> {
        let direct_count = self
            .assignments
            .read()
            .unwrap()
            .iter()
            .filter(|a| a.taxonomy_node_id == node_id)
            .count() as i64;

        {
            let mut nodes = self.nodes.write().unwrap();
            if let Some(node) = nodes.get_mut(&node_id) {
                node.resource_count = direct_count;
            }
        }

        for ancestor in self.get_ancestors(node_id)? {
            let descendant_total: i64 = {
                let nodes = self.nodes.read().unwrap();
                let assignments = self.assignments.read().unwrap();
                nodes
                    .values()
                    .filter(|n| n.path.starts_with(&format!("{}/", ancestor.path)) || n.id == ancestor.id)
                    .map(|n| {
                        assignments
                            .iter()
                            .filter(|a| a.taxonomy_node_id == n.id)
                            .count() as i64
                    })
                    .sum()
            };
            let mut nodes = self.nodes.write().unwrap();
            if let Some(n) = nodes.get_mut(&ancestor.id) {
                n.descendant_resource_count = descendant_total - n.resource_count;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_node_computes_materialized_path_and_level() {
        let svc = TaxonomyService::new();
        let root = svc.create_node("Programming", None, None, vec![], true).unwrap();
        assert_eq!(root.path, "/programming");
        assert_eq!(root.level, 0);

        let child = svc
            .create_node("Rust", Some(root.id), None, vec![], true)
            .unwrap();
        assert_eq!(child.path, "/programming/rust");
        assert_eq!(child.level, 1);
    }

    #[test]
    fn duplicate_slug_is_rejected() {
        let svc = TaxonomyService::new();
        svc.create_node("Rust", None, None, vec![], true).unwrap();
        let err = svc.create_node("Rust", None, None, vec![], true).unwrap_err();
        assert!(matches!(err, NeoError::Conflict(_)));
    }

    // Scenario F (spec §8): taxonomy move cycle rejection.
    #[test]
    fn scenario_f_move_cycle_is_rejected() {
        let svc = TaxonomyService::new();
        let a = svc.create_node("A", None, None, vec![], true).unwrap();
        let b = svc.create_node("B", Some(a.id), None, vec![], true).unwrap();
        let c = svc.create_node("C", Some(b.id), None, vec![], true).unwrap();

        let err = svc.move_node(a.id, Some(c.id)).unwrap_err();
        assert!(matches!(err, NeoError::Conflict(_)));

        // Tree unchanged.
        let a_after = svc.get_ancestors(b.id).unwrap();
        assert_eq!(a_after[0].id, a.id);
    }

    #[test]
    fn move_updates_path_and_propagates_to_descendants() {
        let svc = TaxonomyService::new();
        let a = svc.create_node("A", None, None, vec![], true).unwrap();
        let b = svc.create_node("B", None, None, vec![], true).unwrap();
        let child = svc.create_node("Child", Some(a.id), None, vec![], true).unwrap();
        let grandchild = svc
            .create_node("Grandchild", Some(child.id), None, vec![], true)
            .unwrap();

        svc.move_node(child.id, Some(b.id)).unwrap();

        let moved_grandchild = svc.get_descendants(b.id).unwrap();
        let gc = moved_grandchild.iter().find(|n| n.id == grandchild.id).unwrap();
        assert_eq!(gc.path, "/b/child/grandchild");
        assert_eq!(gc.level, 2);
    }

    #[test]
    fn materialized_path_consistency_holds_after_mutation() {
        let svc = TaxonomyService::new();
        let a = svc.create_node("A", None, None, vec![], true).unwrap();
        let b = svc.create_node("B", Some(a.id), None, vec![], true).unwrap();
        svc.create_node("C", Some(b.id), None, vec![], true).unwrap();

        let nodes = svc.nodes.read().unwrap();
        for node in nodes.values() {
            assert_eq!(node.level, node.path.matches('/').count() as i32 - 1);
            if let Some(parent_id) = node.parent_id {
                let parent = nodes.get(&parent_id).unwrap();
                assert_eq!(node.path, format!("{}/{}", parent.path, node.slug));
            }
        }
    }

    #[test]
    fn delete_with_assigned_resources_conflicts() {
        let svc = TaxonomyService::new();
        let node = svc.create_node("Rust", None, None, vec![], true).unwrap();
        svc.assign(ResourceTaxonomy::manual(Uuid::new_v4(), node.id)).unwrap();

        let err = svc.delete_node(node.id, false).unwrap_err();
        assert!(matches!(err, NeoError::Conflict(_)));
    }

    #[test]
    fn delete_without_cascade_reparents_children() {
        let svc = TaxonomyService::new();
        let root = svc.create_node("Root", None, None, vec![], true).unwrap();
        let mid = svc.create_node("Mid", Some(root.id), None, vec![], true).unwrap();
        let leaf = svc.create_node("Leaf", Some(mid.id), None, vec![], true).unwrap();

        let summary = svc.delete_node(mid.id, false).unwrap();
        assert_eq!(summary.reparented_count, 1);

        let reparented_leaf = svc.get(leaf.id).unwrap();
        assert_eq!(reparented_leaf.parent_id, Some(root.id));
        assert_eq!(reparented_leaf.path, "/root/leaf");
    }

    #[test]
    fn delete_with_cascade_removes_subtree() {
        let svc = TaxonomyService::new();
        let root = svc.create_node("Root", None, None, vec![], true).unwrap();
        let child = svc.create_node("Child", Some(root.id), None, vec![], true).unwrap();

        let summary = svc.delete_node(root.id, true).unwrap();
        assert_eq!(summary.deleted_count, 2);
        assert!(svc.get(child.id).is_err());
    }

    // Default (non-strict) cascade delete never fails on assigned
    // resources — it deletes the assignments along with the subtree.
    #[test]
    fn delete_with_cascade_deletes_assignments_instead_of_conflicting() {
        let svc = TaxonomyService::new();
        let node = svc.create_node("Rust", None, None, vec![], true).unwrap();
        svc.assign(ResourceTaxonomy::manual(Uuid::new_v4(), node.id)).unwrap();

        let summary = svc.delete_node(node.id, true).unwrap();
        assert_eq!(summary.deleted_count, 1);
        assert!(svc.get(node.id).is_err());
    }

    #[test]
    fn rename_recomputes_path_and_propagates_to_descendants() {
        let svc = TaxonomyService::new();
        let root = svc.create_node("Root", None, None, vec![], true).unwrap();
        let child = svc.create_node("Child", Some(root.id), None, vec![], true).unwrap();

        svc.rename_node(root.id, "Renamed Root").unwrap();

        let renamed_child = svc.get(child.id).unwrap();
        assert_eq!(renamed_child.path, "/renamed-root/child");
    }

    #[test]
    fn rename_to_existing_slug_conflicts() {
        let svc = TaxonomyService::new();
        svc.create_node("Rust", None, None, vec![], true).unwrap();
        let other = svc.create_node("Ruby", None, None, vec![], true).unwrap();

        let err = svc.rename_node(other.id, "Rust").unwrap_err();
        assert!(matches!(err, NeoError::Conflict(_)));
    }

    #[test]
    fn assignment_updates_resource_count_and_ancestor_descendant_count() {
        let svc = TaxonomyService::new();
        let root = svc.create_node("Root", None, None, vec![], true).unwrap();
        let child = svc.create_node("Child", Some(root.id), None, vec![], true).unwrap();

        svc.assign(ResourceTaxonomy::manual(Uuid::new_v4(), child.id)).unwrap();

        let child_after = svc.get(child.id).unwrap();
        assert_eq!(child_after.resource_count, 1);
        let root_after = svc.get(root.id).unwrap();
        assert_eq!(root_after.descendant_resource_count, 1);
    }

    #[test]
    fn assignment_to_node_disallowing_resources_is_dropped() {
        let svc = TaxonomyService::new();
        let node = svc.create_node("Category", None, None, vec![], false).unwrap();
        svc.assign(ResourceTaxonomy::manual(Uuid::new_v4(), node.id)).unwrap();
        let after = svc.get(node.id).unwrap();
        assert_eq!(after.resource_count, 0);
    }
}
