//! Vertical lane assignment and scale-dependent feature selection.
//!
//! Features are grouped by type into bands of lanes. Within a type,
//! each feature takes the first lane whose previous occupant ended
//! before it starts, so overlapping features never share a lane. The
//! assignment runs in two passes: per-type relative lanes first, then
//! a shift by each type band's starting lane.

use crate::feature::NodeId;
use crate::scale::FocusScale;
use crate::tree::{FeatureTree, TreeVisitor};
use crate::types::GenomicPos;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How features of a type are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaneMode {
    /// Packed into the type's lane band.
    #[default]
    InLane,
    /// Not drawn itself; children still are.
    Hidden,
    /// Drawn in the parent's lane.
    Embedded,
}

/// Placement plus whether traversal descends past this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypePolicy {
    pub mode: LaneMode,
    pub stop_recursion: bool,
}

impl TypePolicy {
    pub fn new(mode: LaneMode) -> Self {
        Self {
            mode,
            stop_recursion: false,
        }
    }

    pub fn terminal(mode: LaneMode) -> Self {
        Self {
            mode,
            stop_recursion: true,
        }
    }
}

/// Placement policies keyed by full feature type (fragments carry the
/// `__fragment` suffix). Unlisted types default to in-lane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypePolicyMap {
    policies: HashMap<String, TypePolicy>,
}

impl TypePolicyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The conventional treatment of gene-model annotations:
    /// transcripts are hidden containers, exons and coding fragments
    /// draw inside their parent's lane.
    pub fn gff3_defaults() -> Self {
        let mut map = Self::new();
        map.set("mRNA", TypePolicy::new(LaneMode::Hidden));
        map.set("ncRNA", TypePolicy::new(LaneMode::Hidden));
        map.set("exon", TypePolicy::new(LaneMode::Embedded));
        map.set("CDS__fragment", TypePolicy::new(LaneMode::Embedded));
        map.set("TF_binding_site", TypePolicy::new(LaneMode::Embedded));
        map
    }

    pub fn set(&mut self, full_type: impl Into<String>, policy: TypePolicy) {
        self.policies.insert(full_type.into(), policy);
    }

    pub fn get(&self, full_type: &str) -> TypePolicy {
        self.policies.get(full_type).copied().unwrap_or_default()
    }
}

/// Widens features of the given full types to their parent's bounds,
/// so e.g. a coding region occupies the same span as its transcript.
pub struct SizeAdjust {
    types: Vec<String>,
}

impl SizeAdjust {
    pub fn new(types: Vec<String>) -> Self {
        Self { types }
    }

    /// Coding regions only, the usual case for gene models.
    pub fn gff3_defaults() -> Self {
        Self::new(vec!["CDS".to_string()])
    }
}

impl TreeVisitor for SizeAdjust {
    fn visit(&mut self, tree: &mut FeatureTree, node: NodeId) -> bool {
        let full_type = tree.node(node).full_type().into_owned();
        if self.types.iter().any(|t| *t == full_type) {
            if let Some(parent) = tree.node(node).parent {
                let (pstart, pend) = {
                    let p = tree.node(parent);
                    (p.start, p.end)
                };
                let n = tree.node_mut(node);
                n.start = n.start.min(pstart);
                n.end = n.end.max(pend);
            }
        }
        true
    }
}

/// Moves clones of features of one type under all siblings of another
/// type, then removes the original. Used to show exons inside each
/// coding region rather than loose under the transcript.
pub struct Reparent {
    /// moved full type -> destination full type
    types_map: HashMap<String, String>,
    dest_types: Vec<String>,
}

impl Reparent {
    pub fn new(types_map: HashMap<String, String>) -> Self {
        let dest_types = types_map.values().cloned().collect();
        Self {
            types_map,
            dest_types,
        }
    }

    pub fn gff3_defaults() -> Self {
        let mut map = HashMap::new();
        map.insert("exon".to_string(), "CDS".to_string());
        Self::new(map)
    }
}

impl TreeVisitor for Reparent {
    fn visit(&mut self, tree: &mut FeatureTree, node: NodeId) -> bool {
        let full_type = tree.node(node).full_type().into_owned();
        if let Some(dest_type) = self.types_map.get(&full_type).cloned() {
            if let Some(parent) = tree.node(node).parent {
                let siblings = tree.node(parent).children.clone();
                for sibling in siblings {
                    if tree.node(sibling).full_type() == dest_type.as_str() {
                        let clone = tree.clone_subtree(node);
                        tree.attach_child(sibling, clone);
                        tree.sort_children(sibling);
                    }
                }
                tree.detach_child(parent, node);
                // no reparenting under a reparented feature
                return false;
            }
        }
        // and none under destination types
        !self.dest_types.iter().any(|t| *t == full_type)
    }
}

/// First pass: relative lane per feature within its type.
struct LanePacker<'a> {
    policies: &'a TypePolicyMap,
    /// per plain type, the end of the current occupant of each lane
    active: HashMap<String, Vec<GenomicPos>>,
    type_width: HashMap<String, u32>,
}

impl<'a> LanePacker<'a> {
    fn new(policies: &'a TypePolicyMap) -> Self {
        Self {
            policies,
            active: HashMap::new(),
            type_width: HashMap::new(),
        }
    }
}

impl TreeVisitor for LanePacker<'_> {
    fn visit(&mut self, tree: &mut FeatureTree, node: NodeId) -> bool {
        let policy = self.policies.get(&tree.node(node).full_type());
        let descend = !policy.stop_recursion;
        match policy.mode {
            LaneMode::Hidden => {
                tree.node_mut(node).pos_in_track = 0;
                return descend;
            }
            LaneMode::Embedded => return descend, // second pass
            LaneMode::InLane => {}
        }
        let (ftype, start, end) = {
            let n = tree.node(node);
            (n.ftype.clone(), n.start, n.end)
        };
        let active = self.active.entry(ftype.clone()).or_default();
        let lane = match active.iter().position(|&lane_end| lane_end <= start) {
            Some(lane) => {
                active[lane] = end;
                lane
            }
            None => {
                active.push(end);
                active.len() - 1
            }
        };
        tree.node_mut(node).pos_in_track = lane as u32;
        let width = self.type_width.entry(ftype).or_insert(0);
        *width = (*width).max(active.len() as u32);
        descend
    }
}

/// Second pass: shift each in-lane feature by its type band's start,
/// and give embedded features their parent's final lane.
struct LaneOffsets<'a> {
    policies: &'a TypePolicyMap,
    lane_starts: &'a HashMap<String, u32>,
}

impl TreeVisitor for LaneOffsets<'_> {
    fn visit(&mut self, tree: &mut FeatureTree, node: NodeId) -> bool {
        let policy = self.policies.get(&tree.node(node).full_type());
        match policy.mode {
            LaneMode::Embedded => {
                if let Some(parent) = tree.node(node).parent {
                    let pos = tree.node(parent).pos_in_track;
                    tree.node_mut(node).pos_in_track = pos;
                }
            }
            LaneMode::InLane => {
                let offset = self
                    .lane_starts
                    .get(&tree.node(node).ftype)
                    .copied()
                    .unwrap_or(0);
                tree.node_mut(node).pos_in_track += offset;
            }
            LaneMode::Hidden => {}
        }
        true
    }
}

/// Result of lane assignment: per-type band widths and starts, and the
/// total lane count (the track's visual height in lanes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaneLayout {
    pub type_width: HashMap<String, u32>,
    pub lane_starts: HashMap<String, u32>,
    pub total_width: u32,
}

/// Assigns a lane to every feature in the tree and returns the layout.
/// Rerunning after the tree changes reassigns from scratch.
pub fn assign_lanes(tree: &mut FeatureTree, policies: &TypePolicyMap) -> LaneLayout {
    let mut packer = LanePacker::new(policies);
    tree.accept(&mut packer);
    let type_width = packer.type_width;

    let mut lane_starts = HashMap::new();
    let mut pos = 0u32;
    for t in tree.types() {
        lane_starts.insert(t.clone(), pos);
        pos += type_width.get(t).copied().unwrap_or(0);
    }
    let total_width = pos;

    let mut offsets = LaneOffsets {
        policies,
        lane_starts: &lane_starts,
    };
    tree.accept(&mut offsets);

    LaneLayout {
        type_width,
        lane_starts,
        total_width,
    }
}

/// Features wide enough to draw at the given scale, in traversal
/// order. Hidden types are skipped but their children are considered;
/// descent stops below features narrower than the drawing threshold.
pub fn select_visible(
    tree: &FeatureTree,
    policies: &TypePolicyMap,
    scale: &FocusScale,
) -> Vec<NodeId> {
    const MIN_DRAW_PX: f64 = 2.0;
    let mut selected = Vec::new();
    tree.walk(&mut |t, nid| {
        let node = t.node(nid);
        let policy = policies.get(&node.full_type());
        let hidden = policy.mode == LaneMode::Hidden;
        if hidden && policy.stop_recursion {
            return false;
        }
        let width = scale.span_width(node.start, node.end);
        if !hidden && width > MIN_DRAW_PX {
            selected.push(nid);
        }
        !policy.stop_recursion && width > MIN_DRAW_PX
    });
    selected
}

/// Features whose display name fits over them at the given scale.
/// Unnamed features end the descent; a narrow container cannot hold a
/// labelled child.
pub fn select_labelled(
    tree: &FeatureTree,
    policies: &TypePolicyMap,
    scale: &FocusScale,
) -> Vec<NodeId> {
    const PX_PER_CHAR: f64 = 8.5;
    let mut selected = Vec::new();
    tree.walk(&mut |t, nid| {
        let node = t.node(nid);
        let policy = policies.get(&node.full_type());
        let hidden = policy.mode == LaneMode::Hidden;
        if hidden && policy.stop_recursion {
            return false;
        }
        let name = match node.display_name() {
            Some(name) if !name.is_empty() => name,
            _ => return false,
        };
        let width = scale.span_width(node.start, node.end);
        let needed = PX_PER_CHAR * name.chars().count() as f64;
        if !hidden && width > needed {
            selected.push(nid);
        }
        !policy.stop_recursion && width > needed
    });
    selected
}
