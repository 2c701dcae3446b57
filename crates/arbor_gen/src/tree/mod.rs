//! Tree skeleton model and the growth-function pipeline.
//!
//! A [`Tree`] owns a set of [`Stem`]s (root nodes with an absolute
//! anchor) and a chain of growth functions. [`Tree::execute_functions`]
//! walks the chain in pre-order, handing each function the stems, its
//! own id and its parent's id. Functions select the nodes stamped with
//! the parent id and append children stamped with their own id.
use glam::Vec3;
use tracing::info;

use crate::geometry::{get_orthogonal_vector, project_on_plane};

pub mod branch;
pub mod crown;
pub mod growth;
pub mod trunk;

pub use branch::{
    BranchFunction, BranchGrowthInfo, CrownParams, DistributionParams, GravityParams, SplitParams,
};
pub use crown::CrownShape;
pub use growth::{BioNodeInfo, BioNodeType, GrowthFunction, LateralParams};
pub use trunk::TrunkFunction;

/// A skeleton element: a straight segment with a direction, a length
/// and a radius, owning its children.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unit growth direction of the segment.
    pub direction: Vec3,
    /// Unit reference vector orthogonal to `direction`, used to anchor
    /// azimuthal placement of laterals.
    pub tangent: Vec3,
    pub length: f32,
    pub radius: f32,
    /// Id of the growth function that created this node.
    pub creator_id: i32,
    pub children: Vec<ChildLink>,
    pub growth_info: GrowthInfo,
}

impl Node {
    pub fn new(
        direction: Vec3,
        parent_tangent: Vec3,
        length: f32,
        radius: f32,
        creator_id: i32,
    ) -> Self {
        let tangent = project_on_plane(parent_tangent, direction)
            .normalize_or(get_orthogonal_vector(direction));
        Self {
            direction,
            tangent,
            length,
            radius,
            creator_id,
            children: Vec::new(),
            growth_info: GrowthInfo::None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Ownership edge between a node and one of its children.
///
/// The first child continues the branch; later children are splits or
/// laterals. `position_in_parent` locates the child's base along the
/// parent segment, in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ChildLink {
    pub node: Node,
    pub position_in_parent: f32,
}

/// A root node together with its absolute anchor position.
#[derive(Debug, Clone)]
pub struct Stem {
    pub node: Node,
    pub position: Vec3,
}

/// Per-node growth state, owned by whichever function grew the node.
#[derive(Debug, Clone, Default)]
pub enum GrowthInfo {
    #[default]
    None,
    Branch(BranchGrowthInfo),
    Bio(BioNodeInfo),
}

impl GrowthInfo {
    pub fn as_branch(&self) -> Option<&BranchGrowthInfo> {
        match self {
            GrowthInfo::Branch(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_branch_mut(&mut self) -> Option<&mut BranchGrowthInfo> {
        match self {
            GrowthInfo::Branch(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_bio(&self) -> Option<&BioNodeInfo> {
        match self {
            GrowthInfo::Bio(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_bio_mut(&mut self) -> Option<&mut BioNodeInfo> {
        match self {
            GrowthInfo::Bio(info) => Some(info),
            _ => None,
        }
    }
}

/// The closed set of growth functions.
#[derive(Debug, Clone)]
pub enum TreeFunction {
    Trunk(TrunkFunction),
    Branch(BranchFunction),
    Growth(GrowthFunction),
}

impl TreeFunction {
    fn execute(&mut self, stems: &mut Vec<Stem>, id: i32, parent_id: i32) {
        match self {
            TreeFunction::Trunk(function) => function.execute(stems, id, parent_id),
            TreeFunction::Branch(function) => function.execute(stems, id, parent_id),
            TreeFunction::Growth(function) => function.execute(stems, id, parent_id),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TreeFunction::Trunk(_) => "trunk",
            TreeFunction::Branch(_) => "branch",
            TreeFunction::Growth(_) => "growth",
        }
    }
}

impl From<TrunkFunction> for TreeFunction {
    fn from(function: TrunkFunction) -> Self {
        TreeFunction::Trunk(function)
    }
}

impl From<BranchFunction> for TreeFunction {
    fn from(function: BranchFunction) -> Self {
        TreeFunction::Branch(function)
    }
}

impl From<GrowthFunction> for TreeFunction {
    fn from(function: GrowthFunction) -> Self {
        TreeFunction::Growth(function)
    }
}

/// A growth function with its child functions; children run against the
/// nodes their parent created.
#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub function: TreeFunction,
    pub children: Vec<FunctionNode>,
}

impl FunctionNode {
    pub fn new(function: impl Into<TreeFunction>) -> Self {
        Self {
            function: function.into(),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: FunctionNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(&mut self, child: FunctionNode) {
        self.children.push(child);
    }
}

/// A tree: the function chain plus the stems it grows.
#[derive(Debug, Clone)]
pub struct Tree {
    root: FunctionNode,
    stems: Vec<Stem>,
}

impl Tree {
    pub fn new(root: FunctionNode) -> Self {
        Self {
            root,
            stems: Vec::new(),
        }
    }

    /// Run the whole function chain, replacing any previously grown
    /// stems. Ids are assigned in pre-order starting at 0, so the trunk
    /// (the chain root) stamps its nodes with creator id 0.
    pub fn execute_functions(&mut self) {
        self.stems.clear();
        let mut next_id = 0;
        execute_rec(&mut self.root, &mut self.stems, &mut next_id, -1);
        info!(
            "Executed {} tree functions over {} stems.",
            next_id,
            self.stems.len()
        );
    }

    pub fn stems(&self) -> &[Stem] {
        &self.stems
    }

    pub fn stems_mut(&mut self) -> &mut Vec<Stem> {
        &mut self.stems
    }
}

fn execute_rec(node: &mut FunctionNode, stems: &mut Vec<Stem>, next_id: &mut i32, parent_id: i32) {
    let id = *next_id;
    *next_id += 1;
    info!(
        "Running {} function (id {id}, parent {parent_id}).",
        node.function.name()
    );
    node.function.execute(stems, id, parent_id);
    for child in &mut node.children {
        execute_rec(child, stems, next_id, id);
    }
}

/// Indirect handle to a node: a stem index plus the child-index path
/// from the stem root. Handles stay valid while children are only
/// appended, which is the invariant of a single growth pass.
#[derive(Debug, Clone)]
pub(crate) struct NodePath {
    pub stem: usize,
    pub indices: Vec<usize>,
}

impl NodePath {
    pub fn root(stem: usize) -> Self {
        Self {
            stem,
            indices: Vec::new(),
        }
    }

    pub fn child(&self, index: usize) -> Self {
        let mut indices = self.indices.clone();
        indices.push(index);
        Self {
            stem: self.stem,
            indices,
        }
    }
}

pub(crate) fn resolve_node_mut<'a>(stems: &'a mut [Stem], path: &NodePath) -> Option<&'a mut Node> {
    let mut node = &mut stems.get_mut(path.stem)?.node;
    for &index in &path.indices {
        node = &mut node.children.get_mut(index)?.node;
    }
    Some(node)
}

/// A node selected from the graph, with its absolute base position.
#[derive(Debug, Clone)]
pub(crate) struct SelectedNode {
    pub path: NodePath,
    pub position: Vec3,
}

/// Group the nodes created by `creator_id` into branches: maximal
/// first-child chains, in pre-order. Splits and laterals by the same
/// creator start branches of their own.
pub(crate) fn select_creator_branches(stems: &[Stem], creator_id: i32) -> Vec<Vec<SelectedNode>> {
    let mut branches = Vec::new();
    for (stem_index, stem) in stems.iter().enumerate() {
        select_rec(
            &stem.node,
            NodePath::root(stem_index),
            stem.position,
            creator_id,
            false,
            &mut branches,
        );
    }
    branches
}

fn select_rec(
    node: &Node,
    path: NodePath,
    position: Vec3,
    creator_id: i32,
    continues_chain: bool,
    branches: &mut Vec<Vec<SelectedNode>>,
) {
    let in_chain = node.creator_id == creator_id;
    if in_chain {
        if !continues_chain {
            branches.push(Vec::new());
        }
        if let Some(last) = branches.last_mut() {
            last.push(SelectedNode {
                path: path.clone(),
                position,
            });
        }
    }
    for (index, child) in node.children.iter().enumerate() {
        let child_position = position + node.direction * node.length * child.position_in_parent;
        let continues = in_chain && index == 0 && child.node.creator_id == creator_id;
        select_rec(
            &child.node,
            path.child(index),
            child_position,
            creator_id,
            continues,
            branches,
        );
    }
}

/// Total arc length of a branch: the node plus its first-child chain.
pub(crate) fn branch_arc_length(node: &Node) -> f32 {
    let mut length = 0.0;
    let mut current = node;
    loop {
        length += current.length;
        match current.children.first() {
            Some(child) => current = &child.node,
            None => return length,
        }
    }
}
