//! Lateral branch elaboration.
//!
//! Origins are distributed along the parent branches by arc length and
//! phyllotactic azimuth, shaped by the crown envelope, then grown one
//! step at a time from a FIFO worklist. Gravity is relaxed at batch
//! boundaries, between draining one generation of extremities and the
//! next.
use std::collections::VecDeque;

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::error::{Error, Result};
use crate::geometry::{get_orthogonal_vector, lerp, project_on_plane, rand01, random_vec};
use crate::property::Property;
use crate::tree::crown::CrownShape;
use crate::tree::{
    branch_arc_length, resolve_node_mut, select_creator_branches, ChildLink, GrowthInfo, Node,
    NodePath, Stem,
};

const EPSILON: f32 = 0.001;

/// Growth bookkeeping for nodes created by [`BranchFunction`].
#[derive(Debug, Clone, Default)]
pub struct BranchGrowthInfo {
    pub desired_length: f32,
    pub current_length: f32,
    pub origin_radius: f32,
    /// Absolute position of the node base, recomputed from the branch
    /// origin during gravity passes.
    pub position: Vec3,
    pub cumulated_weight: f32,
    pub deviation_from_rest_pose: f32,
    pub age: f32,
    pub inactive: bool,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SplitParams {
    /// Radius multiplier for split branches, in (0, 1).
    pub radius_factor: f32,
    /// Angle between split branches, in degrees.
    pub angle: f32,
    /// Probability of a branch splitting per unit length.
    pub probability: f32,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            radius_factor: 0.9,
            angle: 45.0,
            probability: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GravityParams {
    /// How much branches bend under their own weight.
    pub strength: f32,
    /// Resistance to further bending once deviated from the rest pose.
    pub stiffness: f32,
    /// Tendency to grow upward; negative values droop.
    pub up_attraction: f32,
}

impl Default for GravityParams {
    fn default() -> Self {
        Self {
            strength: 10.0,
            stiffness: 0.1,
            up_attraction: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DistributionParams {
    /// Fraction of the parent length where origins start, in [0, 1].
    pub start: f32,
    /// Fraction of the parent length where origins end, in [0, 1].
    pub end: f32,
    /// Origins per unit length.
    pub density: f32,
    /// Spiral angle between consecutive origins, in degrees.
    pub phillotaxis: f32,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            start: 0.1,
            end: 1.0,
            density: 2.0,
            phillotaxis: 137.5,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CrownParams {
    pub shape: CrownShape,
    /// Crown height; negative means "use the parent trunk's length".
    pub height: f32,
    /// Fraction of the crown height below which the envelope is
    /// inactive, in [0, 1].
    pub base_size: f32,
    /// Height-dependent bias applied to the branch start angle, degrees.
    pub angle_variation: f32,
}

impl Default for CrownParams {
    fn default() -> Self {
        Self {
            shape: CrownShape::Cylindrical,
            height: -1.0,
            base_size: 0.3,
            angle_variation: 0.0,
        }
    }
}

/// Grows lateral branches off the nodes created by the parent function.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BranchFunction {
    pub seed: u64,
    /// Desired branch length, by position along the parent.
    pub length: Property,
    /// Branch start radius as a fraction of the parent radius.
    pub start_radius: Property,
    /// Taper factor from the origin radius toward the tip.
    pub end_radius: f32,
    /// Probability of a growing extremity dying per unit length.
    pub break_chance: f32,
    /// Nodes per unit length.
    pub resolution: f32,
    /// Direction noise, by position along the branch.
    pub randomness: Property,
    /// Bias of growth toward the horizontal plane, in [0, 1].
    pub flatness: f32,
    /// Angle from the parent direction at the origin, degrees.
    pub start_angle: Property,
    pub split: SplitParams,
    pub gravity: GravityParams,
    pub distribution: DistributionParams,
    pub crown: CrownParams,
}

impl Default for BranchFunction {
    fn default() -> Self {
        Self {
            seed: 42,
            length: Property::Constant(9.0),
            start_radius: Property::Constant(0.4),
            end_radius: 0.05,
            break_chance: 0.01,
            resolution: 3.0,
            randomness: Property::Constant(0.4),
            flatness: 0.5,
            start_angle: Property::Constant(45.0),
            split: SplitParams::default(),
            gravity: GravityParams::default(),
            distribution: DistributionParams::default(),
            crown: CrownParams::default(),
        }
    }
}

impl BranchFunction {
    pub fn validate(&self) -> Result<()> {
        if !(self.resolution > 0.0) {
            return Err(Error::InvalidConfig("branch resolution must be > 0".into()));
        }
        if self.break_chance < 0.0 {
            return Err(Error::InvalidConfig("break_chance must be >= 0".into()));
        }
        if !(0.0..=1.0).contains(&self.flatness) {
            return Err(Error::InvalidConfig("flatness must be in [0, 1]".into()));
        }
        if !(self.distribution.density > 0.0) {
            return Err(Error::InvalidConfig(
                "distribution density must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.crown.base_size) {
            return Err(Error::InvalidConfig("crown base_size must be in [0, 1]".into()));
        }
        Ok(())
    }

    pub(crate) fn execute(&mut self, stems: &mut Vec<Stem>, id: i32, parent_id: i32) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let origins = self.create_origins(stems, id, parent_id, &mut rng);
        info!(
            "Branch function {id}: {} origins on nodes of function {parent_id}.",
            origins.len()
        );
        self.grow_origins(stems, &origins, id, &mut rng);
    }

    /// Place branch origins along every branch of the parent function,
    /// spaced by `1 / density` over the `[start, end]` arc-length window
    /// and rotated by the phyllotaxis angle per placement.
    fn create_origins(
        &self,
        stems: &mut Vec<Stem>,
        id: i32,
        parent_id: i32,
        rng: &mut StdRng,
    ) -> Vec<NodePath> {
        let selection = select_creator_branches(stems, parent_id);
        let mut origins = Vec::new();

        let mut effective_crown_height = self.crown.height;
        if effective_crown_height < 0.0 && parent_id == 0 {
            if let Some(stem) = stems.first() {
                effective_crown_height = branch_arc_length(&stem.node);
            }
        }
        let crown_start_z = effective_crown_height * self.crown.base_size;
        let crown_zone_height = effective_crown_height * (1.0 - self.crown.base_size);

        // Distance between two consecutive origins.
        let origins_dist = 1.0 / (self.distribution.density + 0.001);

        for branch in &selection {
            let Some(first) = branch.first() else { continue };
            let (total_length, mut tangent) = match resolve_node_mut(stems, &first.path) {
                Some(node) => (branch_arc_length(node), get_orthogonal_vector(node.direction)),
                None => continue,
            };
            let absolute_start = self.distribution.start * total_length;
            let absolute_end = self.distribution.end * total_length;
            let mut current_length = 0.0;
            let mut dist_to_next_origin = absolute_start;

            for selected in branch {
                let Some(node) = resolve_node_mut(stems, &selected.path) else {
                    continue;
                };
                // A leaf cannot host an origin: the child would continue
                // the branch instead of splitting off it.
                if node.children.is_empty() {
                    continue;
                }
                let node_direction = node.direction;
                let node_length = node.length;
                let node_radius = node.radius;
                let node_tangent = node.tangent;
                let jitter = (rand01(rng) - 0.5) * 2.0;
                let azimuth_rot = Quat::from_axis_angle(
                    node_direction,
                    (self.distribution.phillotaxis + jitter).to_radians(),
                );

                if dist_to_next_origin > node_length {
                    dist_to_next_origin -= node_length;
                    current_length += node_length;
                    continue;
                }

                let mut remaining = node_length - dist_to_next_origin;
                current_length += dist_to_next_origin;
                let origins_to_create = (remaining / origins_dist) as i32 + 1;
                let mut position_in_parent = dist_to_next_origin / node_length;
                let position_step = origins_dist / node_length;

                for i in 0..origins_to_create {
                    if current_length > absolute_end {
                        break;
                    }
                    let factor = (current_length - absolute_start)
                        / (absolute_end - absolute_start).max(0.001);
                    tangent = azimuth_rot * tangent;
                    tangent =
                        project_on_plane(tangent, node_direction).normalize_or(node_tangent);

                    let child_radius = node_radius * self.start_radius.sample(factor, rng);
                    let mut branch_length = self.length.sample(factor, rng);
                    let mut effective_start_angle = self.start_angle.sample(factor, rng);

                    let needs_height_calc = crown_zone_height > EPSILON
                        && (self.crown.shape != CrownShape::Cylindrical
                            || self.crown.angle_variation.abs() > EPSILON);
                    if needs_height_calc {
                        let branch_z = (selected.position
                            + node_direction * node_length * position_in_parent)
                            .z;
                        if branch_z >= crown_start_z {
                            // Ratio is 1.0 at the crown base and 0.0 at the
                            // top, the Weber & Penn "distance from top".
                            let height_ratio =
                                1.0 - ((branch_z - crown_start_z) / crown_zone_height).min(1.0);
                            if self.crown.shape != CrownShape::Cylindrical {
                                branch_length *= self.crown.shape.shape_ratio(height_ratio);
                            }
                            if self.crown.angle_variation.abs() > EPSILON {
                                let shape_ratio = CrownShape::Conical.shape_ratio(height_ratio);
                                let angle_offset =
                                    self.crown.angle_variation * (1.0 - 2.0 * shape_ratio);
                                effective_start_angle = (effective_start_angle + angle_offset)
                                    .clamp(0.0, 180.0);
                            }
                        }
                    }

                    let child_direction = node_direction
                        .lerp(tangent, effective_start_angle / 90.0)
                        .normalize_or(node_direction);
                    let first_length = branch_length.min(1.0 / (self.resolution + 0.001));
                    let child_position =
                        selected.position + node_direction * node_length * position_in_parent;

                    let mut child =
                        Node::new(child_direction, node_tangent, first_length, child_radius, id);
                    child.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
                        desired_length: branch_length - first_length,
                        origin_radius: child_radius,
                        position: child_position,
                        current_length: first_length,
                        ..BranchGrowthInfo::default()
                    });
                    node.children.push(ChildLink {
                        node: child,
                        position_in_parent,
                    });
                    if branch_length - first_length > 1e-3 {
                        origins.push(selected.path.child(node.children.len() - 1));
                    }

                    position_in_parent += position_step;
                    if i > 0 {
                        current_length += origins_dist;
                    }
                }

                remaining -= (origins_to_create - 1) as f32 * origins_dist;
                dist_to_next_origin = origins_dist - remaining;
            }
        }
        origins
    }

    /// Drain the worklist of growing extremities, one growth step per
    /// entry, relaxing gravity over all origins at batch boundaries.
    fn grow_origins(
        &self,
        stems: &mut Vec<Stem>,
        origins: &[NodePath],
        id: i32,
        rng: &mut StdRng,
    ) {
        let mut extremities: VecDeque<NodePath> = origins.iter().cloned().collect();
        let mut batch_size = extremities.len();
        while !extremities.is_empty() {
            if batch_size == 0 {
                batch_size = extremities.len();
                for origin in origins {
                    if let Some(node) = resolve_node_mut(stems, origin) {
                        self.apply_gravity_to_branch(node);
                    }
                }
            }
            if let Some(path) = extremities.pop_front() {
                self.grow_node_once(stems, &path, id, &mut extremities, rng);
            }
            batch_size -= 1;
        }
    }

    /// Grow one extremity by one step, possibly adding a split child.
    fn grow_node_once(
        &self,
        stems: &mut Vec<Stem>,
        path: &NodePath,
        id: i32,
        extremities: &mut VecDeque<NodePath>,
        rng: &mut StdRng,
    ) {
        let break_branch = rand01(rng) * self.resolution < self.break_chance;
        let do_split = rand01(rng) * self.resolution < self.split.probability;

        let Some(node) = resolve_node_mut(stems, path) else {
            return;
        };
        if break_branch {
            mark_inactive(node);
            return;
        }
        let Some(info) = node.growth_info.as_branch().cloned() else {
            return;
        };

        let factor_in_branch = info.current_length / info.desired_length.max(1e-6);
        let child_radius = lerp(
            info.origin_radius,
            info.origin_radius * self.end_radius,
            factor_in_branch,
        );
        let child_length = (1.0 / self.resolution).min(info.desired_length - info.current_length);

        let randomness = self.randomness.sample(factor_in_branch, rng);
        let random_dir = random_vec(rng, self.flatness).normalize_or_zero()
            + Vec3::Z * self.gravity.up_attraction;
        let mut child_direction = node.direction + random_dir * randomness / self.resolution;
        let should_terminate = avoid_floor(info.position, &mut child_direction, node.length);
        let child_direction = child_direction.normalize_or(node.direction);
        if should_terminate {
            mark_inactive(node);
            return;
        }

        let current_length = info.current_length + child_length;
        let child_position = info.position + child_direction * child_length;
        let mut child = Node::new(child_direction, node.tangent, child_length, child_radius, id);
        child.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
            desired_length: info.desired_length,
            origin_radius: info.origin_radius,
            position: child_position,
            current_length,
            ..BranchGrowthInfo::default()
        });
        node.children.push(ChildLink {
            node: child,
            position_in_parent: 1.0,
        });
        if current_length < info.desired_length {
            extremities.push_back(path.child(node.children.len() - 1));
        }

        if do_split {
            let split_direction = self.split_direction(node, info.position, rng);
            let split_radius = node.radius * self.split.radius_factor;
            let mut split_child =
                Node::new(split_direction, node.tangent, child_length, split_radius, id);
            split_child.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
                desired_length: info.desired_length,
                origin_radius: info.origin_radius * self.split.radius_factor,
                position: info.position + split_direction * child_length,
                current_length,
                ..BranchGrowthInfo::default()
            });
            node.children.push(ChildLink {
                node: split_child,
                position_in_parent: rand01(rng),
            });
            if current_length < info.desired_length {
                extremities.push_back(path.child(node.children.len() - 1));
            }
        }
    }

    /// Direction for a split child: an orthogonal direction nudged
    /// upward, flattened, then pulled toward the parent direction by the
    /// split angle.
    fn split_direction(&self, parent: &Node, position: Vec3, rng: &mut StdRng) -> Vec3 {
        let mut direction = random_vec(rng, 0.0);
        direction = direction.cross(parent.direction)
            + Vec3::Z * self.gravity.up_attraction * self.flatness;
        let flat_normal = Vec3::Z
            .cross(parent.direction)
            .cross(parent.direction)
            .normalize_or_zero();
        direction -= flat_normal * direction.dot(flat_normal) * self.flatness;
        avoid_floor(position, &mut direction, parent.length);
        direction = parent.direction.lerp(direction, self.split.angle / 90.0);
        direction.normalize_or(parent.direction)
    }

    fn apply_gravity_to_branch(&self, origin: &mut Node) {
        propagate_inactive_rec(origin);
        update_weight_rec(origin);
        self.apply_gravity_rec(origin, Quat::IDENTITY);
        if let Some(anchor) = origin.growth_info.as_branch().map(|info| info.position) {
            update_positions_rec(origin, anchor);
        }
    }

    /// Bend the subtree under accumulated weight, composing rotations
    /// from the root so descendants inherit the deflection of their
    /// ancestors.
    fn apply_gravity_rec(&self, node: &mut Node, mut rotation: Quat) {
        if let Some(info) = node.growth_info.as_branch_mut() {
            let horizontality = 1.0 - node.direction.z.abs();
            info.age += 1.0 / self.resolution;
            let mut displacement = horizontality
                * info.cumulated_weight.max(0.0).sqrt()
                * self.gravity.strength
                / self.resolution
                / self.resolution
                / 1000.0
                / (1.0 + info.age);
            displacement *= (-(info.deviation_from_rest_pose / self.resolution
                * self.gravity.stiffness)
                .abs())
            .exp();
            info.deviation_from_rest_pose += displacement;

            let axis = node.direction.cross(Vec3::NEG_Z).normalize_or_zero();
            if axis != Vec3::ZERO {
                rotation = Quat::from_axis_angle(axis, displacement) * rotation;
            }
            node.direction = rotation * node.direction;
        }
        for child in &mut node.children {
            self.apply_gravity_rec(&mut child.node, rotation);
        }
    }
}

/// Return true if the branch is heading into the floor too fast; damps
/// the downward component in place either way.
fn avoid_floor(position: Vec3, direction: &mut Vec3, parent_length: f32) -> bool {
    if direction.z < 0.0 {
        direction.z -= direction.z * 2.0 / (2.0 + position.z);
    }
    (position + *direction).z * parent_length * 4.0 < 0.0
}

fn mark_inactive(node: &mut Node) {
    if let Some(info) = node.growth_info.as_branch_mut() {
        info.inactive = true;
    }
}

/// A node is inactive as soon as any of its children is.
fn propagate_inactive_rec(node: &mut Node) -> bool {
    let inactive = match node.growth_info.as_branch() {
        Some(info) => info.inactive,
        None => return false,
    };
    if node.children.is_empty() || inactive {
        return inactive;
    }
    let mut any_inactive = false;
    for child in &mut node.children {
        if propagate_inactive_rec(&mut child.node) {
            any_inactive = true;
            break;
        }
    }
    if let Some(info) = node.growth_info.as_branch_mut() {
        info.inactive = any_inactive;
    }
    any_inactive
}

fn update_weight_rec(node: &mut Node) {
    let mut weight = node.length;
    for child in &mut node.children {
        update_weight_rec(&mut child.node);
        if let Some(child_info) = child.node.growth_info.as_branch() {
            weight += child_info.cumulated_weight;
        }
    }
    if let Some(info) = node.growth_info.as_branch_mut() {
        info.cumulated_weight = weight;
    }
}

fn update_positions_rec(node: &mut Node, position: Vec3) {
    if let Some(info) = node.growth_info.as_branch_mut() {
        info.position = position;
    }
    let direction = node.direction;
    let length = node.length;
    for child in &mut node.children {
        let child_position = position + direction * length * child.position_in_parent;
        update_positions_rec(&mut child.node, child_position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::trunk::TrunkFunction;

    fn grown_stems(branch: &mut BranchFunction) -> Vec<Stem> {
        let mut stems = Vec::new();
        TrunkFunction::default().execute(&mut stems, 0, -1);
        branch.execute(&mut stems, 1, 0);
        stems
    }

    fn count_creator(node: &Node, creator_id: i32) -> usize {
        let own = usize::from(node.creator_id == creator_id);
        own + node
            .children
            .iter()
            .map(|child| count_creator(&child.node, creator_id))
            .sum::<usize>()
    }

    #[test]
    fn execute_adds_branch_nodes_to_trunk() {
        let mut branch = BranchFunction::default();
        let stems = grown_stems(&mut branch);
        assert!(count_creator(&stems[0].node, 1) > 0);
    }

    #[test]
    fn execute_is_deterministic_for_a_seed() {
        let mut a = BranchFunction {
            seed: 5,
            ..BranchFunction::default()
        };
        let mut b = BranchFunction {
            seed: 5,
            ..BranchFunction::default()
        };
        let count_a = count_creator(&grown_stems(&mut a)[0].node, 1);
        let count_b = count_creator(&grown_stems(&mut b)[0].node, 1);
        assert_eq!(count_a, count_b);
    }

    #[test]
    fn high_break_chance_stops_growth_early() {
        let mut fragile = BranchFunction {
            break_chance: 100.0,
            ..BranchFunction::default()
        };
        let mut sturdy = BranchFunction {
            break_chance: 0.0,
            ..BranchFunction::default()
        };
        let fragile_count = count_creator(&grown_stems(&mut fragile)[0].node, 1);
        let sturdy_count = count_creator(&grown_stems(&mut sturdy)[0].node, 1);
        assert!(fragile_count < sturdy_count);
    }

    #[test]
    fn avoid_floor_damps_downward_direction() {
        let mut direction = Vec3::new(0.0, 0.0, -1.0);
        avoid_floor(Vec3::new(0.0, 0.0, 2.0), &mut direction, 1.0);
        assert!(direction.z > -1.0);
    }

    #[test]
    fn inactive_state_propagates_toward_the_origin() {
        let mut origin = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
        origin.growth_info = GrowthInfo::Branch(BranchGrowthInfo::default());
        let mut tip = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
        tip.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
            inactive: true,
            ..BranchGrowthInfo::default()
        });
        origin.children.push(ChildLink {
            node: tip,
            position_in_parent: 1.0,
        });
        propagate_inactive_rec(&mut origin);
        assert!(origin.growth_info.as_branch().unwrap().inactive);
    }

    #[test]
    fn cumulated_weight_sums_lengths_of_subtree() {
        let mut origin = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
        origin.growth_info = GrowthInfo::Branch(BranchGrowthInfo::default());
        let mut child = Node::new(Vec3::Z, Vec3::X, 2.0, 0.1, 1);
        child.growth_info = GrowthInfo::Branch(BranchGrowthInfo::default());
        origin.children.push(ChildLink {
            node: child,
            position_in_parent: 1.0,
        });
        update_weight_rec(&mut origin);
        let weight = origin.growth_info.as_branch().unwrap().cumulated_weight;
        assert!((weight - 3.0).abs() < 1e-6);
    }

    #[test]
    fn crown_envelope_shortens_high_branches() {
        let mut conical = BranchFunction {
            break_chance: 0.0,
            split: SplitParams {
                probability: 0.0,
                ..SplitParams::default()
            },
            crown: CrownParams {
                shape: CrownShape::Conical,
                ..CrownParams::default()
            },
            ..BranchFunction::default()
        };
        let mut cylindrical = BranchFunction {
            break_chance: 0.0,
            split: SplitParams {
                probability: 0.0,
                ..SplitParams::default()
            },
            ..BranchFunction::default()
        };
        // The conical envelope multiplies desired lengths by <= 1, so the
        // total grown node count cannot exceed the cylindrical run.
        let conical_count = count_creator(&grown_stems(&mut conical)[0].node, 1);
        let cylindrical_count = count_creator(&grown_stems(&mut cylindrical)[0].node, 1);
        assert!(conical_count <= cylindrical_count);
    }

    #[test]
    fn validate_rejects_bad_flatness() {
        let branch = BranchFunction {
            flatness: 2.0,
            ..BranchFunction::default()
        };
        assert!(branch.validate().is_err());
    }
}
