//! Containment tree for annotation features.
//!
//! Nodes live in an arena; children are owned through indices and the
//! parent link is a plain back-index, so the parent/child lookup cycle
//! never becomes an ownership cycle. `optimize` resolves parent ids,
//! establishes the top-level feature list and chromosome bounds, sorts
//! every child list and indexes display names and aliases.

use crate::feature::{compare_nodes, FeatureKind, FeatureNode, FeatureRecord, NodeId, Uid};
use crate::types::GenomicPos;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Errors during tree construction.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("chromosome {0} has no features")]
    Empty(String),

    #[error("chromosome {0} was already optimized")]
    AlreadyOptimized(String),
}

pub type TreeResult<T> = Result<T, TreeError>;

/// A visitor over the tree. `visit` returns whether to descend into the
/// node's children; traversal snapshots each child list before
/// descending, so visitors may restructure the tree as they go.
pub trait TreeVisitor {
    fn visit(&mut self, tree: &mut FeatureTree, node: NodeId) -> bool;
}

/// One chromosome's features, as a containment tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureTree {
    name: String,
    start: GenomicPos,
    end: GenomicPos,
    nodes: Vec<FeatureNode>,
    /// id -> node; display names and aliases are added by `optimize`.
    by_id: HashMap<String, NodeId>,
    /// Primary records in insertion order, for deterministic resolution.
    order: Vec<NodeId>,
    top: Vec<NodeId>,
    /// Feature types in first-visit order; fixes the lane offset order.
    types: Vec<String>,
    next_uid: Uid,
    optimized: bool,
}

impl FeatureTree {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: 0,
            end: 1,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> GenomicPos {
        self.start
    }

    pub fn end(&self) -> GenomicPos {
        self.end
    }

    /// Set chromosome bounds ahead of parsing (e.g. from a
    /// `##sequence-region` pragma). `optimize` widens them if features
    /// fall outside.
    pub fn set_bounds(&mut self, start: GenomicPos, end: GenomicPos) {
        self.start = start;
        self.end = end;
    }

    pub fn node(&self, id: NodeId) -> &FeatureNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut FeatureNode {
        &mut self.nodes[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Top-level features in canonical order. Empty before `optimize`.
    pub fn top_features(&self) -> &[NodeId] {
        &self.top
    }

    /// Feature types in first-visit order. Empty before `optimize`.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Look up a feature by id, display name or alias (the latter two
    /// only after `optimize`).
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_id.get(name).copied()
    }

    /// Ids of all primary records.
    pub fn feature_names(&self) -> Vec<&str> {
        self.order.iter().map(|&n| self.nodes[n].id.as_str()).collect()
    }

    fn fresh_uid(&mut self) -> Uid {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    /// Add a parsed record. Records sharing an id merge into one node
    /// whose locations become owned fragment children; the merged node's
    /// bounds cover all fragments. Non-positional attributes of later
    /// records are ignored rather than checked for consistency.
    pub fn add_record(&mut self, record: FeatureRecord) -> NodeId {
        if let Some(&existing) = self.by_id.get(&record.id) {
            self.merge_record(existing, record);
            return existing;
        }
        let uid = self.fresh_uid();
        let id = record.id.clone();
        let node = FeatureNode {
            uid,
            id: record.id,
            start: record.start,
            end: record.end,
            ftype: record.ftype,
            kind: FeatureKind::Record {
                source: record.source,
                score: record.score,
                strand: record.strand,
                phase: record.phase,
                display_name: record.display_name,
                alias: record.alias,
                target: record.target,
                attributes: record.attributes,
                parents: record.parents,
            },
            parent: None,
            children: Vec::new(),
            pos_in_track: 0,
        };
        let nid = self.nodes.len();
        self.nodes.push(node);
        self.by_id.insert(id, nid);
        self.order.push(nid);
        nid
    }

    fn merge_record(&mut self, nid: NodeId, record: FeatureRecord) {
        if self.nodes[nid].children.is_empty() {
            // first merge: wrap the node's own location as fragment 0
            let own = self.make_fragment(nid, 0);
            self.attach_child(nid, own);
        }
        let slot = self.nodes[nid].children.len();
        let uid = self.fresh_uid();
        let fragment = FeatureNode {
            uid,
            id: self.nodes[nid].id.clone(),
            start: record.start,
            end: record.end,
            ftype: self.nodes[nid].ftype.clone(),
            kind: FeatureKind::Fragment {
                slot,
                target: record.target,
            },
            parent: None,
            children: Vec::new(),
            pos_in_track: 0,
        };
        let fid = self.nodes.len();
        self.nodes.push(fragment);
        self.attach_child(nid, fid);
        self.nodes[nid].start = self.nodes[nid].start.min(record.start);
        self.nodes[nid].end = self.nodes[nid].end.max(record.end);
    }

    fn make_fragment(&mut self, nid: NodeId, slot: usize) -> NodeId {
        let uid = self.fresh_uid();
        let source = &self.nodes[nid];
        let target = match &source.kind {
            FeatureKind::Record { target, .. } => target.clone(),
            FeatureKind::Fragment { target, .. } => target.clone(),
        };
        let fragment = FeatureNode {
            uid,
            id: source.id.clone(),
            start: source.start,
            end: source.end,
            ftype: source.ftype.clone(),
            kind: FeatureKind::Fragment { slot, target },
            parent: None,
            children: Vec::new(),
            pos_in_track: 0,
        };
        let fid = self.nodes.len();
        self.nodes.push(fragment);
        fid
    }

    /// Make `child` a child of `parent` (ownership by index plus the
    /// non-owning back-reference).
    pub fn attach_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Detach `child` from `parent`, leaving it in the arena.
    pub fn detach_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.retain(|&c| c != child);
        self.nodes[child].parent = None;
    }

    /// Deep-clone a node and its subtree. The clone keeps the node's uid
    /// (clones of one record are the same logical feature) but starts
    /// detached.
    pub fn clone_subtree(&mut self, nid: NodeId) -> NodeId {
        let mut clone = self.nodes[nid].clone();
        clone.parent = None;
        clone.children = Vec::new();
        let cid = self.nodes.len();
        self.nodes.push(clone);
        let children = self.nodes[nid].children.clone();
        for child in children {
            let child_clone = self.clone_subtree(child);
            self.attach_child(cid, child_clone);
        }
        cid
    }

    /// Re-sort a node's child list into canonical order.
    pub fn sort_children(&mut self, nid: NodeId) {
        let mut children = std::mem::take(&mut self.nodes[nid].children);
        children.sort_by(|&a, &b| compare_nodes(&self.nodes[a], &self.nodes[b]));
        self.nodes[nid].children = children;
    }

    /// Resolve parent ids and finalize the tree:
    /// attach every record under each of its named parents (cloning for
    /// the second and later parents), treat self-as-parent and
    /// unresolvable parents as top-level, sort top features and child
    /// lists, widen chromosome bounds, collect the type list, and index
    /// display names and aliases.
    ///
    /// Fatal on an empty chromosome; a build on corrupt structural data
    /// must not silently mis-render.
    pub fn optimize(&mut self) -> TreeResult<()> {
        if self.optimized {
            return Err(TreeError::AlreadyOptimized(self.name.clone()));
        }
        self.optimized = true;
        let mut top: Vec<NodeId> = Vec::new();

        let order = self.order.clone();
        'records: for &nid in &order {
            let parents = self.nodes[nid].parents_ids();
            if parents.is_empty() {
                top.push(nid);
                continue;
            }
            let mut found = false;
            for (i, parent_name) in parents.iter().enumerate() {
                if *parent_name == self.nodes[nid].id {
                    // malformed input seen in the wild: a feature naming
                    // itself as parent is top-level, not a cycle
                    warn!(
                        "feature {} on {} names itself as parent",
                        self.nodes[nid].id, self.name
                    );
                    top.push(nid);
                    continue 'records;
                }
                if let Some(&pid) = self.by_id.get(parent_name) {
                    let child = if i == 0 { nid } else { self.clone_subtree(nid) };
                    self.attach_child(pid, child);
                    found = true;
                }
            }
            if !found {
                top.push(nid);
            }
        }

        if top.is_empty() {
            return Err(TreeError::Empty(self.name.clone()));
        }

        let mut start = self.start;
        let mut end = self.end;
        for &nid in &top {
            start = start.min(self.nodes[nid].start);
            end = end.max(self.nodes[nid].end);
        }
        self.start = start;
        self.end = end;
        top.sort_by(|&a, &b| compare_nodes(&self.nodes[a], &self.nodes[b]));
        self.top = top;

        self.collate();
        debug!(
            "optimized chromosome {}: {} nodes, {} top features, {} types",
            self.name,
            self.nodes.len(),
            self.top.len(),
            self.types.len()
        );
        Ok(())
    }

    /// Sort every child list, collect the type set in first-visit order,
    /// and index display names and aliases for named lookup.
    fn collate(&mut self) {
        let mut types: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack: Vec<NodeId> = self.top.iter().rev().copied().collect();
        while let Some(nid) = stack.pop() {
            let ftype = self.nodes[nid].ftype.clone();
            if seen.insert(ftype.clone()) {
                types.push(ftype);
            }
            self.sort_children(nid);
            if let FeatureKind::Record {
                display_name,
                alias,
                ..
            } = &self.nodes[nid].kind
            {
                if let Some(name) = display_name.clone() {
                    self.by_id.insert(name, nid);
                }
                if let Some(alias) = alias.clone() {
                    self.by_id.insert(alias, nid);
                }
            }
            for &child in self.nodes[nid].children.iter().rev() {
                stack.push(child);
            }
        }
        self.types = types;
    }

    /// All ancestors reachable through parent ids (the feature itself
    /// included), optionally filtered by type. Breadth over the id
    /// index, deduplicated by key, in discovery order.
    pub fn get_ancestors(&self, of: NodeId, of_type: Option<&str>) -> Vec<NodeId> {
        let mut result: Vec<NodeId> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut pending: Vec<NodeId> = vec![of];
        while let Some(nid) = pending.pop() {
            if !seen.insert(self.nodes[nid].key()) {
                continue;
            }
            result.push(nid);
            for parent_name in self.nodes[nid].parents_ids() {
                if let Some(&pid) = self.by_id.get(&parent_name) {
                    pending.push(pid);
                }
            }
        }
        match of_type {
            Some(t) => result
                .into_iter()
                .filter(|&nid| self.nodes[nid].ftype == t)
                .collect(),
            None => result,
        }
    }

    /// Pre-order traversal with pruning: the closure returns whether to
    /// descend into the node's children.
    pub fn walk<F>(&self, f: &mut F)
    where
        F: FnMut(&FeatureTree, NodeId) -> bool,
    {
        for &nid in &self.top {
            self.walk_node(nid, f);
        }
    }

    fn walk_node<F>(&self, nid: NodeId, f: &mut F)
    where
        F: FnMut(&FeatureTree, NodeId) -> bool,
    {
        if f(self, nid) {
            for &child in &self.nodes[nid].children {
                self.walk_node(child, f);
            }
        }
    }

    /// Pre-order traversal for mutating visitors. Child lists are
    /// snapshotted per node, so the visitor may restructure the subtree
    /// it is standing on.
    pub fn accept(&mut self, visitor: &mut dyn TreeVisitor) {
        let top = self.top.clone();
        for nid in top {
            self.accept_node(nid, visitor);
        }
    }

    fn accept_node(&mut self, nid: NodeId, visitor: &mut dyn TreeVisitor) {
        if visitor.visit(self, nid) {
            let children = self.nodes[nid].children.clone();
            for child in children {
                self.accept_node(child, visitor);
            }
        }
    }

    /// Indented dump of the tree, for debugging and tests.
    pub fn tree_string(&self) -> String {
        let mut out = format!("Chromosome {}\n", self.name);
        self.walk(&mut |tree, nid| {
            let node = tree.node(nid);
            let mut depth = 0;
            let mut cursor = node.parent;
            while let Some(p) = cursor {
                depth += 1;
                cursor = tree.node(p).parent;
            }
            out.push_str(&"\t".repeat(depth + 1));
            out.push_str(&format!(
                "{} {} [{}, {}] lane {}\n",
                node.full_type(),
                node.key(),
                node.start,
                node.end,
                node.pos_in_track
            ));
            true
        });
        out
    }
}
