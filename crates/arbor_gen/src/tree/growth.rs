//! Biological growth simulation.
//!
//! Each iteration distributes an energy budget (vigor) from the root
//! toward the growing tips, competing through apical dominance, then
//! applies growth rules per node: extension, splitting, flowering,
//! dormant-bud activation, secondary thickening, and cutting of starved
//! tips. A gravity pass bends young growth under the weight of the
//! subtree it carries.
use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::error::{Error, Result};
use crate::geometry::{get_look_at_rot, random_vec};
use crate::tree::{branch_arc_length, ChildLink, GrowthInfo, Node, Stem};

mod constants {
    /// Energy requested by a dormant bud during the vigor-ratio pass.
    pub const DORMANT_ENERGY_REQUEST: f32 = 0.3;
    /// Fraction of the non-dominant energy share granted to dormant buds.
    pub const DORMANT_VIGOR_FACTOR: f32 = 0.5;
    pub const EPSILON: f32 = 1e-3;
    /// Radius taper applied to extension children.
    pub const EXTENSION_TAPER: f32 = 0.9;
    /// Radius taper applied to split children.
    pub const SPLIT_TAPER: f32 = 0.8;
    /// Radius of a dormant bud relative to its carrier.
    pub const LATERAL_RADIUS_RATIO: f32 = 0.3;
    pub const GRAVITY_ANGLE_MULTIPLIER: f32 = 1e-3;
    /// Step used to track the target flux with the working cut threshold.
    pub const THRESHOLD_STEP: f32 = 0.01;
}

/// Biological state of a node grown by [`GrowthFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BioNodeType {
    /// A growing tip that can extend or split.
    Meristem,
    /// An internal node that already extended.
    Branch,
    /// A starved tip that stopped growing.
    Cut,
    /// Pre-existing structure the simulation does not grow or bend.
    Ignored,
    /// A lateral bud waiting for enough vigor to activate.
    Dormant,
    /// A tip that flowered instead of extending.
    Flower,
}

/// Growth bookkeeping for nodes managed by [`GrowthFunction`].
#[derive(Debug, Clone)]
pub struct BioNodeInfo {
    pub node_type: BioNodeType,
    pub branch_weight: f32,
    pub center_of_mass: Vec3,
    pub absolute_position: Vec3,
    pub vigor_ratio: f32,
    pub vigor: f32,
    pub age: f32,
    pub philotaxis_angle: f32,
    pub is_lateral: bool,
}

impl BioNodeInfo {
    pub fn new(node_type: BioNodeType) -> Self {
        Self {
            node_type,
            branch_weight: 0.0,
            center_of_mass: Vec3::ZERO,
            absolute_position: Vec3::ZERO,
            vigor_ratio: 1.0,
            vigor: 0.0,
            age: 0.0,
            philotaxis_angle: 0.0,
            is_lateral: false,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LateralParams {
    /// Fraction of the carrier length where bud sowing starts.
    pub start: f32,
    /// Fraction of the carrier length where bud sowing ends.
    pub end: f32,
    /// Potential bud sites per unit length.
    pub density: f32,
    /// Vigor threshold above which a dormant bud activates.
    pub activation: f32,
    /// Initial angle from the carrier direction, degrees.
    pub angle: f32,
}

impl Default for LateralParams {
    fn default() -> Self {
        Self {
            start: 0.1,
            end: 0.9,
            density: 2.0,
            activation: 0.4,
            angle: 45.0,
        }
    }
}

/// Grows the tree by iterated vigor distribution and growth rules.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GrowthFunction {
    pub seed: u64,
    /// Growth iterations; one iteration is roughly a year of growth.
    pub iterations: u32,
    /// When >= 0 and below `iterations`, stop after this many
    /// iterations. Used by hosts to scrub through the growth history.
    pub preview_iteration: i32,
    /// Bias of energy flow toward the main axis, in [0, 1].
    pub apical_dominance: f32,
    /// Vigor above which a meristem extends.
    pub grow_threshold: f32,
    /// Vigor above which an extending meristem also splits.
    pub split_threshold: f32,
    /// Vigor below which a meristem is cut (initial working value).
    pub cut_threshold: f32,
    /// Vigor below which a meristem flowers instead of extending.
    pub flower_threshold: f32,
    /// Angle between split branches, degrees.
    pub split_angle: f32,
    /// Length of new extension segments.
    pub branch_length: f32,
    /// Upward pull on new growth.
    pub gravitropism: f32,
    /// Direction noise on new growth.
    pub randomness: f32,
    pub gravity_strength: f32,
    /// Spiral angle between successive organs, radians.
    pub philotaxis_angle: f32,
    pub lateral: LateralParams,
    pub enable_flowering: bool,
    pub enable_lateral_branching: bool,
}

impl Default for GrowthFunction {
    fn default() -> Self {
        Self {
            seed: 42,
            iterations: 5,
            preview_iteration: -1,
            apical_dominance: 0.7,
            grow_threshold: 0.5,
            split_threshold: 0.7,
            cut_threshold: 0.2,
            flower_threshold: 0.5,
            split_angle: 60.0,
            branch_length: 1.0,
            gravitropism: 0.1,
            randomness: 0.1,
            gravity_strength: 1.0,
            philotaxis_angle: 2.399,
            lateral: LateralParams::default(),
            enable_flowering: false,
            enable_lateral_branching: true,
        }
    }
}

struct LateralBudState {
    dist_to_next: f32,
    current_length: f32,
    philotaxis: f32,
    total_length: f32,
}

impl GrowthFunction {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.apical_dominance) {
            return Err(Error::InvalidConfig(
                "apical_dominance must be in [0, 1]".into(),
            ));
        }
        if !(self.branch_length > 0.0) {
            return Err(Error::InvalidConfig("branch_length must be > 0".into()));
        }
        if self.lateral.density < 0.0 {
            return Err(Error::InvalidConfig("lateral density must be >= 0".into()));
        }
        Ok(())
    }

    pub(crate) fn execute(&mut self, stems: &mut Vec<Stem>, id: i32, _parent_id: i32) {
        let mut rng = StdRng::seed_from_u64(self.seed);

        for stem in stems.iter_mut() {
            setup_growth_information_rec(&mut stem.node, self.enable_lateral_branching);
        }

        if self.enable_lateral_branching {
            for stem in stems.iter_mut() {
                let total_length = branch_arc_length(&stem.node);
                let mut state = LateralBudState {
                    dist_to_next: self.lateral.start * total_length,
                    current_length: 0.0,
                    philotaxis: 0.0,
                    total_length,
                };
                self.create_lateral_buds_rec(&mut stem.node, id, &mut state);
            }
        }

        let effective_iterations =
            if self.preview_iteration >= 0 && (self.preview_iteration as u32) < self.iterations {
                self.preview_iteration as u32
            } else {
                self.iterations
            };

        // The working threshold resets every execution so identical
        // parameters produce identical trees.
        let mut current_cut_threshold = self.cut_threshold;

        for iteration in 0..effective_iterations {
            // Energy is not shared between stems.
            for stem in stems.iter_mut() {
                let target_flux = 1.0 + (iteration as f32).powf(1.5);
                let light_flux = self.update_vigor_ratio_rec(&mut stem.node);

                if target_flux > light_flux {
                    current_cut_threshold -= constants::THRESHOLD_STEP;
                } else if target_flux < light_flux {
                    current_cut_threshold += constants::THRESHOLD_STEP;
                }

                self.update_vigor_rec(&mut stem.node, target_flux);
                self.simulate_growth_rec(&mut stem.node, id, current_cut_threshold, &mut rng);
                update_absolute_position_rec(&mut stem.node, stem.position);
                update_weight_rec(&mut stem.node);
                self.apply_gravity_rec(&mut stem.node, Quat::IDENTITY);
            }
        }
        info!(
            "Growth function {id}: ran {effective_iterations} iterations over {} stems.",
            stems.len()
        );
    }

    /// Leaves-to-root pass: returns the total flux produced by the
    /// subtree and records each child's share under apical-dominance
    /// competition.
    fn update_vigor_ratio_rec(&self, node: &mut Node) -> f32 {
        let node_type = match node.growth_info.as_bio() {
            Some(info) => info.node_type,
            None => return 0.0,
        };
        match node_type {
            BioNodeType::Meristem => 1.0,
            BioNodeType::Dormant => {
                if let Some(info) = node.growth_info.as_bio_mut() {
                    info.vigor_ratio = constants::DORMANT_ENERGY_REQUEST;
                }
                constants::DORMANT_ENERGY_REQUEST
            }
            BioNodeType::Branch | BioNodeType::Ignored => {
                if node.children.is_empty() {
                    if let Some(info) = node.growth_info.as_bio_mut() {
                        info.vigor_ratio = 0.0;
                    }
                    return 0.0;
                }
                let mut light_flux = self.update_vigor_ratio_rec(&mut node.children[0].node);
                let mut vigor_ratio = 1.0;
                for index in 1..node.children.len() {
                    let child_flux = self.update_vigor_ratio_rec(&mut node.children[index].node);
                    let t = self.apical_dominance;
                    vigor_ratio = (t * light_flux)
                        / (t * light_flux + (1.0 - t) * child_flux + constants::EPSILON);
                    if let Some(child_info) = node.children[index].node.growth_info.as_bio_mut() {
                        child_info.vigor_ratio = 1.0 - vigor_ratio;
                    }
                    light_flux += child_flux;
                }
                if let Some(first_info) = node.children[0].node.growth_info.as_bio_mut() {
                    first_info.vigor_ratio = vigor_ratio;
                }
                light_flux
            }
            _ => {
                if let Some(info) = node.growth_info.as_bio_mut() {
                    info.vigor_ratio = 0.0;
                }
                0.0
            }
        }
    }

    /// Top-down pass: every child receives its recorded share of the
    /// parent vigor; dormant buds bypass the competition with a fixed
    /// fraction.
    fn update_vigor_rec(&self, node: &mut Node, vigor: f32) {
        if let Some(info) = node.growth_info.as_bio_mut() {
            info.vigor = vigor;
        }
        for child in &mut node.children {
            let (ratio, is_dormant) = match child.node.growth_info.as_bio() {
                Some(child_info) => (
                    child_info.vigor_ratio,
                    child_info.node_type == BioNodeType::Dormant,
                ),
                None => (0.0, false),
            };
            let child_vigor = if is_dormant {
                vigor * (1.0 - self.apical_dominance) * constants::DORMANT_VIGOR_FACTOR
            } else {
                ratio * vigor
            };
            self.update_vigor_rec(&mut child.node, child_vigor);
        }
    }

    /// Apply the growth rules to one node, then recurse into the
    /// children that existed before this step.
    fn simulate_growth_rec(
        &self,
        node: &mut Node,
        id: i32,
        cut_threshold: f32,
        rng: &mut StdRng,
    ) {
        let Some(info) = node.growth_info.as_bio() else {
            return;
        };
        let vigor = info.vigor;
        let mut node_type = info.node_type;
        let mut philotaxis = info.philotaxis_angle;

        let activate_dormant =
            node_type == BioNodeType::Dormant && vigor > self.lateral.activation;
        if activate_dormant {
            node_type = BioNodeType::Meristem;
            node.length = self.branch_length * (vigor + 0.1);
        }

        // Newly activated buds always grow, regardless of grow_threshold.
        let primary_growth = node_type == BioNodeType::Meristem
            && (activate_dormant || vigor > self.grow_threshold);
        let secondary_growth = vigor > self.grow_threshold
            && node_type != BioNodeType::Ignored
            && node_type != BioNodeType::Dormant;
        let split = node_type == BioNodeType::Meristem && vigor > self.split_threshold;
        let cut = node_type == BioNodeType::Meristem && vigor < cut_threshold;
        let become_flower = self.enable_flowering
            && node_type == BioNodeType::Meristem
            && vigor < self.flower_threshold
            && vigor >= cut_threshold;

        let child_count = node.children.len();

        if cut {
            if let Some(info) = node.growth_info.as_bio_mut() {
                info.node_type = BioNodeType::Cut;
            }
            return;
        }
        if become_flower {
            if let Some(info) = node.growth_info.as_bio_mut() {
                info.node_type = BioNodeType::Flower;
            }
            return;
        }

        let age = match node.growth_info.as_bio_mut() {
            Some(info) => {
                info.age += 1.0;
                info.age
            }
            None => 0.0,
        };

        if secondary_growth {
            node.radius = (1.0 - (-age * 0.01).exp() + 0.01) * 0.5;
        }

        if primary_growth {
            let child_direction = (node.direction
                + Vec3::Z * self.gravitropism
                + random_vec(rng, 0.0) * self.randomness)
                .normalize_or(node.direction);
            let child_radius = node.radius * constants::EXTENSION_TAPER;
            let child_angle = if split {
                philotaxis + self.philotaxis_angle
            } else {
                philotaxis
            };
            let mut child = Node::new(
                child_direction,
                node.tangent,
                self.branch_length,
                child_radius,
                id,
            );
            child.growth_info = GrowthInfo::Bio(BioNodeInfo {
                philotaxis_angle: child_angle,
                ..BioNodeInfo::new(BioNodeType::Meristem)
            });
            node.children.push(ChildLink {
                node: child,
                position_in_parent: 1.0,
            });
            node_type = BioNodeType::Branch;
        }

        if split {
            philotaxis += self.philotaxis_angle;
            let tangent = get_look_at_rot(node.direction)
                * Vec3::new(philotaxis.cos(), philotaxis.sin(), 0.0);
            let child_direction = node
                .direction
                .lerp(tangent, self.split_angle / 90.0)
                .normalize_or(node.direction);
            let child_radius = node.radius * constants::SPLIT_TAPER;
            let mut child = Node::new(
                child_direction,
                node.tangent,
                self.branch_length,
                child_radius,
                id,
            );
            child.growth_info = GrowthInfo::Bio(BioNodeInfo::new(BioNodeType::Meristem));
            node.children.push(ChildLink {
                node: child,
                position_in_parent: 1.0,
            });
            node_type = BioNodeType::Branch;
        }

        if let Some(info) = node.growth_info.as_bio_mut() {
            info.node_type = node_type;
            info.philotaxis_angle = philotaxis;
        }

        for index in 0..child_count {
            self.simulate_growth_rec(&mut node.children[index].node, id, cut_threshold, rng);
        }
    }

    /// Sow dormant buds along the pre-existing trunk, following the
    /// first-child chain only.
    fn create_lateral_buds_rec(&self, node: &mut Node, id: i32, state: &mut LateralBudState) {
        let carrier = matches!(
            node.growth_info.as_bio().map(|info| info.node_type),
            Some(BioNodeType::Ignored)
        ) && !node.children.is_empty();

        if carrier {
            let absolute_start = self.lateral.start * state.total_length;
            let absolute_end = self.lateral.end * state.total_length;
            let bud_spacing = 1.0 / (self.lateral.density + constants::EPSILON);

            if state.current_length + node.length >= absolute_start
                && state.current_length < absolute_end
            {
                let mut remaining = node.length;
                let mut pos_in_node = 0.0;

                if state.current_length < absolute_start {
                    let skip = absolute_start - state.current_length;
                    remaining -= skip;
                    pos_in_node = skip;
                    state.dist_to_next = 0.0;
                }

                while remaining > state.dist_to_next
                    && state.current_length + pos_in_node < absolute_end
                {
                    pos_in_node += state.dist_to_next;
                    remaining -= state.dist_to_next;

                    state.philotaxis += self.philotaxis_angle;
                    let tangent = get_look_at_rot(node.direction)
                        * Vec3::new(state.philotaxis.cos(), state.philotaxis.sin(), 0.0);
                    let bud_direction = node
                        .direction
                        .lerp(tangent, self.lateral.angle / 90.0)
                        .normalize_or(node.direction);

                    let position_in_parent = pos_in_node / node.length.max(1e-6);
                    let child_radius = node.radius * constants::LATERAL_RADIUS_RATIO;
                    let child_length = self.branch_length * 0.5;

                    let mut bud =
                        Node::new(bud_direction, node.tangent, child_length, child_radius, id);
                    bud.growth_info = GrowthInfo::Bio(BioNodeInfo {
                        philotaxis_angle: state.philotaxis,
                        is_lateral: true,
                        ..BioNodeInfo::new(BioNodeType::Dormant)
                    });
                    node.children.push(ChildLink {
                        node: bud,
                        position_in_parent,
                    });

                    state.dist_to_next = bud_spacing;
                }

                state.dist_to_next -= remaining;
            } else if state.current_length + node.length < absolute_start {
                state.dist_to_next =
                    (absolute_start - (state.current_length + node.length)).max(0.0);
            }
        }

        state.current_length += node.length;
        if !node.children.is_empty() {
            self.create_lateral_buds_rec(&mut node.children[0].node, id, state);
        }
    }

    /// Bend young growth toward the ground, torque from the horizontal
    /// offset of the carried mass. Pre-existing trunk nodes do not bend
    /// but still pass the inherited rotation down.
    fn apply_gravity_rec(&self, node: &mut Node, mut rotation: Quat) {
        if let Some(info) = node.growth_info.as_bio() {
            if info.node_type != BioNodeType::Ignored {
                let mut offset = info.center_of_mass - info.absolute_position;
                offset.z = 0.0;
                let lever_arm = offset.length();
                let torque = info.branch_weight * lever_arm;
                let bendiness = (-(info.age / 2.0 + info.vigor)).exp();
                let angle = torque
                    * bendiness
                    * self.gravity_strength
                    * constants::GRAVITY_ANGLE_MULTIPLIER;
                let axis = node.direction.cross(Vec3::NEG_Z).normalize_or_zero();
                if axis != Vec3::ZERO {
                    rotation *= Quat::from_axis_angle(axis, angle);
                }
                node.direction = (rotation * node.direction).normalize_or(node.direction);
            }
        }
        for child in &mut node.children {
            self.apply_gravity_rec(&mut child.node, rotation);
        }
    }
}

fn setup_growth_information_rec(node: &mut Node, suppress_tip_growth: bool) {
    // With lateral branching the tips stay inert and dormant buds become
    // the primary branch source.
    let tip_type = if suppress_tip_growth {
        BioNodeType::Ignored
    } else {
        BioNodeType::Meristem
    };
    let node_type = if node.children.is_empty() {
        tip_type
    } else {
        BioNodeType::Ignored
    };
    node.growth_info = GrowthInfo::Bio(BioNodeInfo::new(node_type));
    for child in &mut node.children {
        setup_growth_information_rec(&mut child.node, suppress_tip_growth);
    }
}

fn update_absolute_position_rec(node: &mut Node, position: Vec3) {
    if let Some(info) = node.growth_info.as_bio_mut() {
        info.absolute_position = position;
    }
    let direction = node.direction;
    let length = node.length;
    for child in &mut node.children {
        let child_position = position + direction * length * child.position_in_parent;
        update_absolute_position_rec(&mut child.node, child_position);
    }
}

/// Mass and center-of-mass accumulation, leaves to root.
fn update_weight_rec(node: &mut Node) {
    for child in &mut node.children {
        update_weight_rec(&mut child.node);
    }
    let absolute_position = match node.growth_info.as_bio() {
        Some(info) => info.absolute_position,
        None => return,
    };
    let segment_weight = node.length * node.radius * node.radius;
    let mut center_of_mass =
        (absolute_position + node.direction * node.length / 2.0) * segment_weight;
    let mut total_weight = segment_weight;
    for child in &node.children {
        if let Some(child_info) = child.node.growth_info.as_bio() {
            center_of_mass += child_info.center_of_mass * child_info.branch_weight;
            total_weight += child_info.branch_weight;
        }
    }
    center_of_mass /= total_weight.max(1e-9);
    if let Some(info) = node.growth_info.as_bio_mut() {
        info.center_of_mass = center_of_mass;
        info.branch_weight = total_weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::trunk::TrunkFunction;

    fn trunk_stems() -> Vec<Stem> {
        let mut stems = Vec::new();
        TrunkFunction {
            length: 6.0,
            resolution: 2.0,
            ..TrunkFunction::default()
        }
        .execute(&mut stems, 0, -1);
        stems
    }

    fn count_nodes(node: &Node) -> usize {
        1 + node
            .children
            .iter()
            .map(|child| count_nodes(&child.node))
            .sum::<usize>()
    }

    fn count_type(node: &Node, node_type: BioNodeType) -> usize {
        let own = usize::from(
            node.growth_info
                .as_bio()
                .is_some_and(|info| info.node_type == node_type),
        );
        own + node
            .children
            .iter()
            .map(|child| count_type(&child.node, node_type))
            .sum::<usize>()
    }

    #[test]
    fn execute_converts_all_growth_info_to_bio() {
        let mut stems = trunk_stems();
        GrowthFunction::default().execute(&mut stems, 1, 0);
        fn all_bio(node: &Node) -> bool {
            node.growth_info.as_bio().is_some()
                && node.children.iter().all(|child| all_bio(&child.node))
        }
        assert!(all_bio(&stems[0].node));
    }

    #[test]
    fn lateral_branching_sows_dormant_buds() {
        let mut stems = trunk_stems();
        let mut growth = GrowthFunction {
            iterations: 0,
            ..GrowthFunction::default()
        };
        growth.execute(&mut stems, 1, 0);
        assert!(count_type(&stems[0].node, BioNodeType::Dormant) > 0);
    }

    #[test]
    fn iterations_grow_the_tree() {
        let mut stems = trunk_stems();
        let before = count_nodes(&stems[0].node);
        GrowthFunction::default().execute(&mut stems, 1, 0);
        assert!(count_nodes(&stems[0].node) > before);
    }

    #[test]
    fn preview_iteration_zero_suppresses_growth() {
        let mut stems = trunk_stems();
        let mut growth = GrowthFunction {
            preview_iteration: 0,
            enable_lateral_branching: false,
            ..GrowthFunction::default()
        };
        let before = count_nodes(&stems[0].node);
        growth.execute(&mut stems, 1, 0);
        assert_eq!(count_nodes(&stems[0].node), before);
    }

    #[test]
    fn execute_is_deterministic_for_a_seed() {
        let mut stems_a = trunk_stems();
        let mut stems_b = trunk_stems();
        GrowthFunction::default().execute(&mut stems_a, 1, 0);
        GrowthFunction::default().execute(&mut stems_b, 1, 0);
        assert_eq!(count_nodes(&stems_a[0].node), count_nodes(&stems_b[0].node));
    }

    #[test]
    fn vigor_ratio_favors_the_first_child() {
        let growth = GrowthFunction::default();
        let mut parent = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
        parent.growth_info = GrowthInfo::Bio(BioNodeInfo::new(BioNodeType::Branch));
        for _ in 0..2 {
            let mut child = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
            child.growth_info = GrowthInfo::Bio(BioNodeInfo::new(BioNodeType::Meristem));
            parent.children.push(ChildLink {
                node: child,
                position_in_parent: 1.0,
            });
        }
        let flux = growth.update_vigor_ratio_rec(&mut parent);
        assert!((flux - 2.0).abs() < 1e-5);
        let first = parent.children[0].node.growth_info.as_bio().unwrap().vigor_ratio;
        let second = parent.children[1].node.growth_info.as_bio().unwrap().vigor_ratio;
        assert!(first > second);
        assert!((first + second - 1.0).abs() < 1e-2);
    }

    #[test]
    fn starved_meristem_is_cut() {
        let growth = GrowthFunction::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut node = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
        node.growth_info = GrowthInfo::Bio(BioNodeInfo {
            vigor: 0.05,
            ..BioNodeInfo::new(BioNodeType::Meristem)
        });
        growth.simulate_growth_rec(&mut node, 1, 0.2, &mut rng);
        assert_eq!(
            node.growth_info.as_bio().unwrap().node_type,
            BioNodeType::Cut
        );
    }

    #[test]
    fn low_vigor_meristem_flowers_when_enabled() {
        let growth = GrowthFunction {
            enable_flowering: true,
            ..GrowthFunction::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut node = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
        node.growth_info = GrowthInfo::Bio(BioNodeInfo {
            vigor: 0.3,
            ..BioNodeInfo::new(BioNodeType::Meristem)
        });
        growth.simulate_growth_rec(&mut node, 1, 0.2, &mut rng);
        assert_eq!(
            node.growth_info.as_bio().unwrap().node_type,
            BioNodeType::Flower
        );
    }

    #[test]
    fn vigorous_meristem_extends_and_becomes_branch() {
        let growth = GrowthFunction::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut node = Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, 1);
        node.growth_info = GrowthInfo::Bio(BioNodeInfo {
            vigor: 2.0,
            ..BioNodeInfo::new(BioNodeType::Meristem)
        });
        growth.simulate_growth_rec(&mut node, 1, 0.2, &mut rng);
        assert_eq!(
            node.growth_info.as_bio().unwrap().node_type,
            BioNodeType::Branch
        );
        // Vigor above the split threshold: extension plus split child.
        assert_eq!(node.children.len(), 2);
    }

    #[test]
    fn dormant_bud_activates_above_activation_threshold() {
        let growth = GrowthFunction::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut node = Node::new(Vec3::Z, Vec3::X, 0.5, 0.1, 1);
        node.growth_info = GrowthInfo::Bio(BioNodeInfo {
            vigor: 0.45,
            ..BioNodeInfo::new(BioNodeType::Dormant)
        });
        growth.simulate_growth_rec(&mut node, 1, 0.2, &mut rng);
        // Activated buds grow immediately even below grow_threshold.
        assert_eq!(node.children.len(), 1);
        assert!((node.length - growth.branch_length * 0.55).abs() < 1e-5);
    }
}
