#![forbid(unsafe_code)]
//! arbor_gen: Procedural tree and leaf mesh generation.
//!
//! Modules:
//! - tree: skeletal growth pipeline (trunk seeding, branch elaboration, biological growth)
//! - mesher: manifold tube meshing with per-vertex attributes
//! - leaf: superformula leaf shapes, space-colonization venation, LOD reductions
//! - mesh: the shared mesh container with heterogeneous attributes
//! - property: interpolation descriptors for parameters varying along a branch
//!
//! The crate is synchronous and deterministic: every randomized path is
//! driven by a seed on its parameter struct, never by a process-wide RNG.
pub mod error;
pub mod geometry;
pub mod leaf;
pub mod mesh;
pub mod mesher;
pub mod property;
pub mod tree;

/// Convenient re-exports for common types. Import with `use arbor_gen::prelude::*;`.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::leaf::{
        generate_billboard_cloud, generate_card, get_impostor_view_directions, get_leaf_preset,
        get_leaf_preset_names, LeafPreset, LeafShapeGenerator, MarginType, SpatialHash2D,
        VeinNode, VenationGenerator, VenationType,
    };
    pub use crate::mesh::{AttributeValue, Mesh};
    pub use crate::mesher::{ManifoldMesher, TreeMesher};
    pub use crate::property::Property;
    pub use crate::tree::{
        BioNodeInfo, BioNodeType, BranchFunction, BranchGrowthInfo, ChildLink, CrownParams,
        CrownShape, DistributionParams, FunctionNode, GravityParams, GrowthFunction, GrowthInfo,
        LateralParams, Node, SplitParams, Stem, Tree, TreeFunction, TrunkFunction,
    };
}
