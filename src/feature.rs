//! Annotation feature nodes.
//!
//! A parsed record becomes a [`FeatureNode`] in a [`FeatureTree`]
//! (see [`crate::tree`]). Records sharing one id collapse into a single
//! node whose physical locations are owned [`FeatureKind::Fragment`]
//! children; multi-parent records are cloned under every parent, the
//! clones linked by a shared uid.

use crate::types::{GenomicPos, IntervalLike, Strand};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Index of a node within its tree's arena. Children are owned through
/// these indices; the parent link is a non-owning back-reference.
pub type NodeId = usize;

/// Identity shared between a node and its multi-parent clones.
pub type Uid = u32;

/// Suffix distinguishing fragment policies from their record type.
pub const FRAGMENT_SUFFIX: &str = "__fragment";

/// Variant payload of a feature node.
///
/// One tagged union in place of a subclass hierarchy: a `Record` is a
/// parsed annotation line (or the merge of all lines sharing an id), a
/// `Fragment` is one physical location of a multi-location record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeatureKind {
    Record {
        source: String,
        score: Option<f64>,
        strand: Option<Strand>,
        phase: Option<u8>,
        display_name: Option<String>,
        alias: Option<String>,
        target: Option<String>,
        /// Multi-valued attributes left over after the predefined tags
        /// are extracted.
        attributes: HashMap<String, Vec<String>>,
        /// Parent ids as written in the input; resolved by
        /// [`FeatureTree::optimize`](crate::tree::FeatureTree::optimize).
        parents: Vec<String>,
    },
    Fragment {
        slot: usize,
        target: Option<String>,
    },
}

/// One feature in the containment tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureNode {
    pub uid: Uid,
    /// The record id; shared by fragments and multi-parent clones.
    pub id: String,
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub ftype: String,
    pub kind: FeatureKind,
    /// Non-owning back-reference, used for ancestor queries only.
    pub parent: Option<NodeId>,
    /// Owned children, kept in canonical order after `optimize`.
    pub children: Vec<NodeId>,
    /// Lane assigned by the layout passes; overwritten on every run.
    pub pos_in_track: u32,
}

impl FeatureNode {
    /// Key unique within the tree: the id, or `id_slot` for fragments.
    pub fn key(&self) -> String {
        match &self.kind {
            FeatureKind::Fragment { slot, .. } => format!("{}_{}", self.id, slot),
            FeatureKind::Record { .. } => self.id.clone(),
        }
    }

    /// Type name used for policy lookups; fragments get a suffix so they
    /// can be treated differently from their record.
    pub fn full_type(&self) -> Cow<'_, str> {
        match &self.kind {
            FeatureKind::Fragment { .. } => {
                Cow::Owned(format!("{}{}", self.ftype, FRAGMENT_SUFFIX))
            }
            FeatureKind::Record { .. } => Cow::Borrowed(&self.ftype),
        }
    }

    /// Parent ids to resolve through the tree index. A fragment's parent
    /// is the record owning it.
    pub fn parents_ids(&self) -> Vec<String> {
        match &self.kind {
            FeatureKind::Record { parents, .. } => parents.clone(),
            FeatureKind::Fragment { .. } => vec![self.id.clone()],
        }
    }

    pub fn display_name(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Record { display_name, .. } => display_name.as_deref(),
            FeatureKind::Fragment { .. } => None,
        }
    }

    pub fn alias(&self) -> Option<&str> {
        match &self.kind {
            FeatureKind::Record { alias, .. } => alias.as_deref(),
            FeatureKind::Fragment { .. } => None,
        }
    }

    pub fn is_fragment(&self) -> bool {
        matches!(self.kind, FeatureKind::Fragment { .. })
    }
}

impl IntervalLike for FeatureNode {
    fn start(&self) -> GenomicPos {
        self.start
    }
    fn end(&self) -> GenomicPos {
        self.end
    }
}

/// Node ordering used for top features and child lists: start ascending,
/// then end descending so containers precede their contents, then type
/// descending so e.g. exons draw under coding segments, then name and uid
/// for stability.
pub fn compare_nodes(a: &FeatureNode, b: &FeatureNode) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| b.end.cmp(&a.end))
        .then_with(|| b.ftype.cmp(&a.ftype))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| a.uid.cmp(&b.uid))
}

/// A parsed annotation record, the unit handed from the io readers to
/// [`FeatureTree::add_record`](crate::tree::FeatureTree::add_record).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: String,
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub ftype: String,
    pub source: String,
    pub score: Option<f64>,
    pub strand: Option<Strand>,
    pub phase: Option<u8>,
    pub display_name: Option<String>,
    pub alias: Option<String>,
    pub target: Option<String>,
    pub attributes: HashMap<String, Vec<String>>,
    pub parents: Vec<String>,
}

impl FeatureRecord {
    /// A minimal record; io readers fill in the rest.
    pub fn new(id: impl Into<String>, start: GenomicPos, end: GenomicPos, ftype: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start,
            end,
            ftype: ftype.into(),
            source: String::new(),
            score: None,
            strand: None,
            phase: None,
            display_name: None,
            alias: None,
            target: None,
            attributes: HashMap::new(),
            parents: Vec::new(),
        }
    }

    pub fn with_parents(mut self, parents: Vec<String>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

impl IntervalLike for FeatureRecord {
    fn start(&self) -> GenomicPos {
        self.start
    }
    fn end(&self) -> GenomicPos {
        self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, start: GenomicPos, end: GenomicPos, ftype: &str, uid: Uid) -> FeatureNode {
        FeatureNode {
            uid,
            id: id.to_string(),
            start,
            end,
            ftype: ftype.to_string(),
            kind: FeatureKind::Record {
                source: String::new(),
                score: None,
                strand: None,
                phase: None,
                display_name: None,
                alias: None,
                target: None,
                attributes: HashMap::new(),
                parents: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
            pos_in_track: 0,
        }
    }

    #[test]
    fn test_ordering_containers_first() {
        let outer = node("t1", 0, 100, "mRNA", 0);
        let inner = node("e1", 0, 40, "exon", 1);
        assert_eq!(compare_nodes(&outer, &inner), Ordering::Less);
    }

    #[test]
    fn test_ordering_type_descending() {
        // same span: exon sorts before CDS so the CDS draws over it
        let exon = node("e1", 0, 50, "exon", 0);
        let cds = node("c1", 0, 50, "CDS", 1);
        assert_eq!(compare_nodes(&exon, &cds), Ordering::Less);
    }

    #[test]
    fn test_fragment_key_and_type() {
        let mut f = node("gene1", 0, 10, "CDS", 0);
        f.kind = FeatureKind::Fragment { slot: 2, target: None };
        assert_eq!(f.key(), "gene1_2");
        assert_eq!(f.full_type(), "CDS__fragment");
        assert_eq!(f.parents_ids(), vec!["gene1".to_string()]);
    }
}
