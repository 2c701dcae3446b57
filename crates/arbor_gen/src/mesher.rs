//! Tube mesher for grown trees.
//!
//! Each branch (a first-child chain of nodes) becomes a tube: one ring
//! of vertices per node base plus a tip ring, consecutive rings stitched
//! with quads. Junctions are not CSG-blended; instead every vertex
//! carries a `smooth_amount` weight, strongest on the first rings of a
//! lateral, that hosts use to relax the joint.
use glam::Vec3;
use tracing::info;

use crate::geometry::{get_orthogonal_vector, GOLDEN_ANGLE};
use crate::mesh::Mesh;
use crate::tree::{Node, Tree};

/// Names of the per-vertex attributes emitted by [`ManifoldMesher`].
pub mod attributes {
    pub const SMOOTH_AMOUNT: &str = "smooth_amount";
    pub const RADIUS: &str = "radius";
    pub const DIRECTION: &str = "direction";
    pub const STEM_ID: &str = "stem_id";
    pub const HIERARCHY_DEPTH: &str = "hierarchy_depth";
    pub const PIVOT_POSITION: &str = "pivot_position";
    pub const BRANCH_EXTENT: &str = "branch_extent";
    pub const PHYLLOTAXIS_ANGLE: &str = "phyllotaxis_angle";
}

pub trait TreeMesher {
    fn mesh_tree(&self, tree: &Tree) -> Mesh;
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManifoldMesher {
    /// Vertices per cross-sectional ring.
    pub radial_resolution: u32,
    /// Rings over which the junction smoothing weight fades out.
    pub smooth_iterations: u32,
}

impl Default for ManifoldMesher {
    fn default() -> Self {
        Self {
            radial_resolution: 8,
            smooth_iterations: 4,
        }
    }
}

impl TreeMesher for ManifoldMesher {
    fn mesh_tree(&self, tree: &Tree) -> Mesh {
        let radial = self.radial_resolution.max(3) as usize;
        let mut builder = TubeBuilder::new(radial, self.smooth_iterations.max(1));
        for (stem_index, stem) in tree.stems().iter().enumerate() {
            builder.emit_branch(&stem.node, stem.position, stem_index as i32, 0);
        }
        let mesh = builder.finish();
        info!(
            "Meshed tree: {} vertices, {} polygons.",
            mesh.vertices.len(),
            mesh.polygons.len()
        );
        mesh
    }
}

struct TubeBuilder {
    radial: usize,
    smooth_rings: u32,
    mesh: Mesh,
    radius: Vec<f32>,
    direction: Vec<Vec3>,
    stem_id: Vec<i32>,
    hierarchy_depth: Vec<i32>,
    pivot_position: Vec<Vec3>,
    branch_extent: Vec<f32>,
    smooth_amount: Vec<f32>,
    phyllotaxis_angle: Vec<f32>,
    section_index: u32,
}

impl TubeBuilder {
    fn new(radial: usize, smooth_rings: u32) -> Self {
        Self {
            radial,
            smooth_rings,
            mesh: Mesh::new(),
            radius: Vec::new(),
            direction: Vec::new(),
            stem_id: Vec::new(),
            hierarchy_depth: Vec::new(),
            pivot_position: Vec::new(),
            branch_extent: Vec::new(),
            smooth_amount: Vec::new(),
            phyllotaxis_angle: Vec::new(),
            section_index: 0,
        }
    }

    fn emit_branch(&mut self, root: &Node, base_position: Vec3, stem_id: i32, depth: i32) {
        // Walk the first-child chain, remembering laterals for later.
        let mut chain: Vec<(&Node, Vec3)> = Vec::new();
        let mut laterals: Vec<(&Node, Vec3)> = Vec::new();
        let mut current = root;
        let mut position = base_position;
        let tip_position;
        loop {
            chain.push((current, position));
            for child in current.children.iter().skip(1) {
                let lateral_base =
                    position + current.direction * current.length * child.position_in_parent;
                laterals.push((&child.node, lateral_base));
            }
            match current.children.first() {
                Some(child) => {
                    position += current.direction * current.length * child.position_in_parent;
                    current = &child.node;
                }
                None => {
                    tip_position = position + current.direction * current.length;
                    break;
                }
            }
        }

        let extent: f32 = chain.iter().map(|(node, _)| node.length).sum();
        let mut arc_length = 0.0;
        let mut ring_in_branch = 0u32;
        let mut previous_ring: Option<u32> = None;

        for (node, node_position) in &chain {
            let ring_start = self.emit_ring(
                *node_position,
                node.direction,
                node.radius,
                RingAttributes {
                    stem_id,
                    depth,
                    pivot: base_position,
                    extent,
                    arc_fraction: arc_length / extent.max(1e-6),
                    ring_in_branch,
                },
            );
            if let Some(previous) = previous_ring {
                self.stitch_rings(previous, ring_start);
            }
            previous_ring = Some(ring_start);
            arc_length += node.length;
            ring_in_branch += 1;
        }

        if let Some((last, _)) = chain.last() {
            let tip_start = self.emit_ring(
                tip_position,
                last.direction,
                last.radius,
                RingAttributes {
                    stem_id,
                    depth,
                    pivot: base_position,
                    extent,
                    arc_fraction: 1.0,
                    ring_in_branch,
                },
            );
            if let Some(previous) = previous_ring {
                self.stitch_rings(previous, tip_start);
            }
        }

        for (lateral, lateral_base) in laterals {
            self.emit_branch(lateral, lateral_base, stem_id, depth + 1);
        }
    }

    fn emit_ring(
        &mut self,
        center: Vec3,
        direction: Vec3,
        radius: f32,
        attrs: RingAttributes,
    ) -> u32 {
        let start = self.mesh.vertices.len() as u32;
        let tangent = get_orthogonal_vector(direction);
        let bitangent = direction.cross(tangent).normalize_or(Vec3::Y);
        let section_angle =
            (self.section_index as f32 * GOLDEN_ANGLE) % std::f32::consts::TAU;
        let smooth = if attrs.depth > 0 {
            (1.0 - attrs.ring_in_branch as f32 / self.smooth_rings as f32).clamp(0.0, 1.0)
        } else {
            0.0
        };

        for k in 0..self.radial {
            let theta = std::f32::consts::TAU * k as f32 / self.radial as f32;
            let offset = (tangent * theta.cos() + bitangent * theta.sin()) * radius;
            self.mesh.vertices.push(center + offset);
            self.mesh
                .uvs
                .push(glam::Vec2::new(k as f32 / self.radial as f32, attrs.arc_fraction));
            self.radius.push(radius);
            self.direction.push(direction);
            self.stem_id.push(attrs.stem_id);
            self.hierarchy_depth.push(attrs.depth);
            self.pivot_position.push(attrs.pivot);
            self.branch_extent.push(attrs.extent);
            self.smooth_amount.push(smooth);
            self.phyllotaxis_angle.push(section_angle);
        }
        self.section_index += 1;
        start
    }

    fn stitch_rings(&mut self, lower_start: u32, upper_start: u32) {
        let radial = self.radial as u32;
        for k in 0..radial {
            let next = (k + 1) % radial;
            let a = lower_start + k;
            let b = lower_start + next;
            let c = upper_start + next;
            let d = upper_start + k;
            self.mesh.push_quad(a, b, c, d);
            self.mesh.uv_loops.push([a, b, c, d]);
        }
    }

    fn finish(mut self) -> Mesh {
        self.mesh
            .add_float_attribute(attributes::RADIUS, self.radius);
        self.mesh
            .add_vec3_attribute(attributes::DIRECTION, self.direction);
        self.mesh
            .add_int_attribute(attributes::STEM_ID, self.stem_id);
        self.mesh
            .add_int_attribute(attributes::HIERARCHY_DEPTH, self.hierarchy_depth);
        self.mesh
            .add_vec3_attribute(attributes::PIVOT_POSITION, self.pivot_position);
        self.mesh
            .add_float_attribute(attributes::BRANCH_EXTENT, self.branch_extent);
        self.mesh
            .add_float_attribute(attributes::SMOOTH_AMOUNT, self.smooth_amount);
        self.mesh
            .add_float_attribute(attributes::PHYLLOTAXIS_ANGLE, self.phyllotaxis_angle);
        self.mesh
    }
}

struct RingAttributes {
    stem_id: i32,
    depth: i32,
    pivot: Vec3,
    extent: f32,
    arc_fraction: f32,
    ring_in_branch: u32,
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use super::*;
    use crate::tree::{BranchFunction, FunctionNode, TrunkFunction};

    fn trunk_tree() -> Tree {
        let mut tree = Tree::new(FunctionNode::new(TrunkFunction::default()));
        tree.execute_functions();
        tree
    }

    fn full_tree() -> Tree {
        let mut tree = Tree::new(
            FunctionNode::new(TrunkFunction::default())
                .with_child(FunctionNode::new(BranchFunction::default())),
        );
        tree.execute_functions();
        tree
    }

    #[test]
    fn trunk_mesh_is_structurally_valid() {
        let mesher = ManifoldMesher::default();
        let mesh = mesher.mesh_tree(&trunk_tree());
        assert!(mesh.validate().is_ok());
        assert!(mesh.vertices.len() > 0);
        assert_eq!(mesh.vertices.len() % 8, 0);
    }

    #[test]
    fn full_tree_mesh_indices_stay_in_range() {
        let mesher = ManifoldMesher::default();
        let mesh = mesher.mesh_tree(&full_tree());
        assert!(mesh.validate().is_ok());
        let max_index = mesh.vertices.len() as u32;
        for poly in &mesh.polygons {
            assert!(poly.iter().all(|&i| i < max_index));
        }
    }

    #[test]
    fn all_declared_attributes_are_emitted() {
        let mesher = ManifoldMesher::default();
        let mesh = mesher.mesh_tree(&full_tree());
        let n = mesh.vertices.len();
        assert_eq!(mesh.float_attribute(attributes::RADIUS).unwrap().len(), n);
        assert_eq!(mesh.vec3_attribute(attributes::DIRECTION).unwrap().len(), n);
        assert_eq!(mesh.int_attribute(attributes::STEM_ID).unwrap().len(), n);
        assert_eq!(
            mesh.int_attribute(attributes::HIERARCHY_DEPTH).unwrap().len(),
            n
        );
        assert_eq!(
            mesh.vec3_attribute(attributes::PIVOT_POSITION).unwrap().len(),
            n
        );
        assert_eq!(
            mesh.float_attribute(attributes::BRANCH_EXTENT).unwrap().len(),
            n
        );
        assert_eq!(
            mesh.float_attribute(attributes::SMOOTH_AMOUNT).unwrap().len(),
            n
        );
        assert_eq!(
            mesh.float_attribute(attributes::PHYLLOTAXIS_ANGLE)
                .unwrap()
                .len(),
            n
        );
    }

    #[test]
    fn phyllotaxis_angle_is_constant_within_a_ring() {
        let mesher = ManifoldMesher::default();
        let mesh = mesher.mesh_tree(&trunk_tree());
        let angles = mesh.float_attribute(attributes::PHYLLOTAXIS_ANGLE).unwrap();
        let radial = 8;
        for section in 0..angles.len() / radial {
            let expected = angles[section * radial];
            for k in 1..radial {
                assert_eq!(angles[section * radial + k], expected);
            }
            assert!((0.0..TAU).contains(&expected));
        }
    }

    #[test]
    fn phyllotaxis_angle_follows_the_golden_angle() {
        let mesher = ManifoldMesher {
            radial_resolution: 8,
            ..ManifoldMesher::default()
        };
        let mesh = mesher.mesh_tree(&trunk_tree());
        let angles = mesh.float_attribute(attributes::PHYLLOTAXIS_ANGLE).unwrap();
        assert!(angles[0].abs() < 1e-5);
        assert!((angles[8] - GOLDEN_ANGLE % TAU).abs() < 1e-4);
    }

    #[test]
    fn laterals_are_marked_with_deeper_hierarchy() {
        let mesher = ManifoldMesher::default();
        let mesh = mesher.mesh_tree(&full_tree());
        let depths = mesh.int_attribute(attributes::HIERARCHY_DEPTH).unwrap();
        assert!(depths.contains(&0));
        assert!(depths.iter().any(|&d| d > 0));
    }

    #[test]
    fn smooth_amount_fades_along_lateral_branches() {
        let mesher = ManifoldMesher::default();
        let mesh = mesher.mesh_tree(&full_tree());
        let smooth = mesh.float_attribute(attributes::SMOOTH_AMOUNT).unwrap();
        let depths = mesh.int_attribute(attributes::HIERARCHY_DEPTH).unwrap();
        for (s, d) in smooth.iter().zip(depths) {
            assert!((0.0..=1.0).contains(s));
            if *d == 0 {
                assert_eq!(*s, 0.0);
            }
        }
        assert!(smooth.iter().any(|&s| s > 0.0));
    }

    #[test]
    fn uvs_stay_in_unit_square() {
        let mesher = ManifoldMesher::default();
        let mesh = mesher.mesh_tree(&full_tree());
        for uv in &mesh.uvs {
            assert!((0.0..=1.0).contains(&uv.x));
            assert!((0.0..=1.0).contains(&uv.y));
        }
    }
}
