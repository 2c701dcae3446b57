//! Trunk seeding function.
use glam::Vec3;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::geometry::{get_orthogonal_vector, lerp, random_vec};
use crate::tree::{ChildLink, Node, Stem};

/// Seeds the tree with a single trunk stem: a chain of
/// `ceil(length * resolution)` segments growing upward with a small
/// randomized axial wobble and a shaped radius taper.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrunkFunction {
    pub seed: u64,
    /// Total trunk length.
    pub length: f32,
    /// Radius at the base.
    pub start_radius: f32,
    /// Radius at the tip.
    pub end_radius: f32,
    /// Radius falloff exponent; lower values taper more near the base.
    pub shape: f32,
    /// Tendency to keep growing straight up rather than wandering.
    pub up_attraction: f32,
    /// Segments per unit length.
    pub resolution: f32,
    /// Amount of random variation in the growth direction.
    pub randomness: f32,
}

impl Default for TrunkFunction {
    fn default() -> Self {
        Self {
            seed: 42,
            length: 14.0,
            start_radius: 0.3,
            end_radius: 0.05,
            shape: 0.7,
            up_attraction: 0.6,
            resolution: 3.0,
            randomness: 1.0,
        }
    }
}

impl TrunkFunction {
    pub fn validate(&self) -> Result<()> {
        if !(self.length > 0.0) {
            return Err(Error::InvalidConfig("trunk length must be > 0".into()));
        }
        if !(self.resolution > 0.0) {
            return Err(Error::InvalidConfig("trunk resolution must be > 0".into()));
        }
        if !(self.start_radius > 0.0) || !(self.end_radius > 0.0) {
            return Err(Error::InvalidConfig("trunk radii must be > 0".into()));
        }
        Ok(())
    }

    pub(crate) fn execute(&mut self, stems: &mut Vec<Stem>, id: i32, _parent_id: i32) {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let length = self.length.max(1e-3);
        let resolution = self.resolution.max(1e-3);
        let segment_count = ((length * resolution).ceil() as usize).max(1);
        let step = length / segment_count as f32;
        let shape = self.shape.max(1e-3);

        let mut direction = Vec3::Z;
        let radius_at = |t: f32| lerp(self.start_radius, self.end_radius, t.powf(shape));

        let mut root = Node::new(
            direction,
            get_orthogonal_vector(direction),
            step,
            radius_at(0.0),
            id,
        );

        let mut current = &mut root;
        for segment in 1..segment_count {
            let wobble = random_vec(&mut rng, 0.0) * self.randomness / resolution;
            direction = (direction + wobble + Vec3::Z * self.up_attraction / resolution)
                .normalize_or(Vec3::Z);
            let t = segment as f32 / segment_count as f32;
            let child = Node::new(direction, current.tangent, step, radius_at(t), id);
            current.children.push(ChildLink {
                node: child,
                position_in_parent: 1.0,
            });
            current = &mut current.children[0].node;
        }

        stems.push(Stem {
            node: root,
            position: Vec3::ZERO,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_nodes(stem: &Stem) -> Vec<&Node> {
        let mut nodes = vec![&stem.node];
        let mut current = &stem.node;
        while let Some(child) = current.children.first() {
            nodes.push(&child.node);
            current = &child.node;
        }
        nodes
    }

    #[test]
    fn trunk_produces_expected_chain_length() {
        let mut trunk = TrunkFunction {
            length: 4.0,
            resolution: 2.0,
            ..TrunkFunction::default()
        };
        let mut stems = Vec::new();
        trunk.execute(&mut stems, 0, -1);
        assert_eq!(stems.len(), 1);
        let nodes = chain_nodes(&stems[0]);
        assert_eq!(nodes.len(), 8);
        let total: f32 = nodes.iter().map(|n| n.length).sum();
        assert!((total - 4.0).abs() < 1e-4);
    }

    #[test]
    fn trunk_radius_tapers_from_start_to_end() {
        let mut trunk = TrunkFunction::default();
        let mut stems = Vec::new();
        trunk.execute(&mut stems, 0, -1);
        let nodes = chain_nodes(&stems[0]);
        assert!((nodes[0].radius - trunk.start_radius).abs() < 1e-5);
        assert!(nodes.last().unwrap().radius < nodes[0].radius);
        for pair in nodes.windows(2) {
            assert!(pair[1].radius <= pair[0].radius + 1e-6);
        }
    }

    #[test]
    fn trunk_is_deterministic_for_a_seed() {
        let mut stems_a = Vec::new();
        let mut stems_b = Vec::new();
        TrunkFunction {
            seed: 7,
            ..TrunkFunction::default()
        }
        .execute(&mut stems_a, 0, -1);
        TrunkFunction {
            seed: 7,
            ..TrunkFunction::default()
        }
        .execute(&mut stems_b, 0, -1);
        let a = chain_nodes(&stems_a[0]);
        let b = chain_nodes(&stems_b[0]);
        assert_eq!(a.len(), b.len());
        for (na, nb) in a.iter().zip(&b) {
            assert!((na.direction - nb.direction).length() < 1e-6);
        }
    }

    #[test]
    fn trunk_directions_stay_mostly_upward() {
        let mut trunk = TrunkFunction::default();
        let mut stems = Vec::new();
        trunk.execute(&mut stems, 0, -1);
        for node in chain_nodes(&stems[0]) {
            assert!(node.direction.z > 0.0);
        }
    }

    #[test]
    fn validate_rejects_non_positive_length() {
        let trunk = TrunkFunction {
            length: 0.0,
            ..TrunkFunction::default()
        };
        assert!(trunk.validate().is_err());
    }
}
