//! Vein network synthesis by space colonization (Runions et al.).
//!
//! Auxin sources scattered inside the leaf contour attract the nearest
//! vein node within the attraction radius; attracted veins grow a step
//! toward the average of their attractors, and auxins die once a vein
//! comes close enough. Closed venation additionally merges growth into
//! nearby unrelated veins, forming loops.
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::warn;

use crate::error::{Error, Result};
use crate::geometry::rand01;
use crate::leaf::VenationType;
use crate::mesh::Mesh;

/// Attribute written by [`VenationGenerator::compute_vein_distances`].
pub const VEIN_DISTANCE: &str = "vein_distance";

const MAX_AUXIN_SOURCES: usize = 5000;

/// Uniform-grid index over 2D points for radius queries.
///
/// Cells hold `(id, position)` entries; a query scans the cells
/// overlapping the query disc and filters by exact squared distance.
pub struct SpatialHash2D {
    cell_size: f32,
    min_bound: Vec2,
    grid_width: usize,
    grid_height: usize,
    cells: Vec<Vec<(usize, Vec2)>>,
}

impl SpatialHash2D {
    pub fn new(cell_size: f32, min_bound: Vec2, max_bound: Vec2) -> Self {
        let cell_size = cell_size.max(1e-6);
        let range = max_bound - min_bound;
        let grid_width = ((range.x / cell_size).ceil() as usize).max(1) + 1;
        let grid_height = ((range.y / cell_size).ceil() as usize).max(1) + 1;
        Self {
            cell_size,
            min_bound,
            grid_width,
            grid_height,
            cells: vec![Vec::new(); grid_width * grid_height],
        }
    }

    fn to_cell(&self, position: Vec2) -> (usize, usize) {
        let cx = ((position.x - self.min_bound.x) / self.cell_size) as isize;
        let cy = ((position.y - self.min_bound.y) / self.cell_size) as isize;
        (
            cx.clamp(0, self.grid_width as isize - 1) as usize,
            cy.clamp(0, self.grid_height as isize - 1) as usize,
        )
    }

    #[inline]
    fn cell_index(&self, cx: usize, cy: usize) -> usize {
        cy * self.grid_width + cx
    }

    pub fn insert(&mut self, id: usize, position: Vec2) {
        let (cx, cy) = self.to_cell(position);
        let index = self.cell_index(cx, cy);
        self.cells[index].push((id, position));
    }

    /// Ids of all entries within `radius` of `center`.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<usize> {
        let mut result = Vec::new();
        let radius_sq = radius * radius;
        let (cx_min, cy_min) = self.to_cell(center - Vec2::splat(radius));
        let (cx_max, cy_max) = self.to_cell(center + Vec2::splat(radius));
        for cy in cy_min..=cy_max {
            for cx in cx_min..=cx_max {
                for &(id, position) in &self.cells[self.cell_index(cx, cy)] {
                    if position.distance_squared(center) <= radius_sq {
                        result.push(id);
                    }
                }
            }
        }
        result
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.clear();
        }
    }
}

/// One node of the vein network. `parent < 0` marks the root; nodes are
/// ordered parent-before-child.
#[derive(Debug, Clone)]
pub struct VeinNode {
    pub position: Vec2,
    pub parent: i32,
    pub width: f32,
}

struct AuxinSource {
    position: Vec2,
    active: bool,
}

/// Space-colonization vein generator, scoped to one leaf contour.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VenationGenerator {
    pub venation_type: VenationType,
    /// Auxin sources per unit of contour area.
    pub vein_density: f32,
    /// Auxins die within this distance of a vein.
    pub kill_distance: f32,
    /// Distance grown per iteration.
    pub growth_step_size: f32,
    /// Radius within which an auxin attracts its nearest vein.
    pub attraction_distance: f32,
    pub max_iterations: u32,
    pub seed: u64,
}

impl Default for VenationGenerator {
    fn default() -> Self {
        Self {
            venation_type: VenationType::Open,
            vein_density: 800.0,
            kill_distance: 0.03,
            growth_step_size: 0.01,
            attraction_distance: 0.08,
            max_iterations: 300,
            seed: 42,
        }
    }
}

impl VenationGenerator {
    pub fn validate(&self) -> Result<()> {
        if self.vein_density < 0.0 {
            return Err(Error::InvalidConfig("vein_density must be >= 0".into()));
        }
        if !(self.growth_step_size > 0.0) {
            return Err(Error::InvalidConfig("growth_step_size must be > 0".into()));
        }
        if !(self.attraction_distance > 0.0) {
            return Err(Error::InvalidConfig(
                "attraction_distance must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Grow a vein network inside the contour. Returns an empty list for
    /// contours with fewer than three points or zero density.
    pub fn generate_veins(&self, contour: &[mint::Vector2<f32>]) -> Vec<VeinNode> {
        let contour: Vec<Vec2> = contour.iter().copied().map(Vec2::from).collect();
        self.generate_veins_internal(&contour)
    }

    pub(crate) fn generate_veins_internal(&self, contour: &[Vec2]) -> Vec<VeinNode> {
        if contour.len() < 3 || self.vein_density <= 0.0 {
            return Vec::new();
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut auxins = self.generate_auxin_sources(contour, &mut rng);
        if auxins.is_empty() {
            return Vec::new();
        }

        let (min_bound, max_bound) = bounding_box(contour);

        // Seed the network near the leaf base, snapping inside if needed.
        let mut root_position = Vec2::new(
            0.0,
            min_bound.y + (max_bound.y - min_bound.y) * 0.02,
        );
        if !point_in_contour(root_position, contour) {
            let target = Vec2::new(0.0, min_bound.y);
            let mut best_dist = f32::MAX;
            for &point in contour {
                let d = point.distance_squared(target);
                if d < best_dist {
                    best_dist = d;
                    root_position = point;
                }
            }
            let centroid = contour.iter().copied().sum::<Vec2>() / contour.len() as f32;
            root_position += (centroid - root_position).normalize_or_zero() * self.growth_step_size;
        }

        let mut veins = vec![VeinNode {
            position: root_position,
            parent: -1,
            width: 1.0,
        }];

        let pad = Vec2::splat(self.attraction_distance);
        let mut vein_hash =
            SpatialHash2D::new(self.attraction_distance, min_bound - pad, max_bound + pad);
        vein_hash.insert(0, root_position);

        // Closed venation kills later so growth can get dense enough to
        // meet and merge.
        let effective_kill = match self.venation_type {
            VenationType::Closed => self.kill_distance * 0.5,
            VenationType::Open => self.kill_distance,
        };

        for _ in 0..self.max_iterations {
            let mut growth_dirs = vec![Vec2::ZERO; veins.len()];
            let mut growth_counts = vec![0u32; veins.len()];
            let mut active_auxins = 0;

            for auxin in auxins.iter().filter(|auxin| auxin.active) {
                active_auxins += 1;
                let candidates = vein_hash.query_radius(auxin.position, self.attraction_distance);
                let nearest = candidates.into_iter().min_by(|&a, &b| {
                    veins[a]
                        .position
                        .distance_squared(auxin.position)
                        .total_cmp(&veins[b].position.distance_squared(auxin.position))
                });
                if let Some(nearest) = nearest {
                    let offset = auxin.position - veins[nearest].position;
                    let len = offset.length();
                    if len > 1e-10 {
                        growth_dirs[nearest] += offset / len;
                        growth_counts[nearest] += 1;
                    }
                }
            }

            if active_auxins == 0 {
                break;
            }

            let mut any_grew = false;
            let old_size = veins.len();
            for vi in 0..old_size {
                if growth_counts[vi] == 0 {
                    continue;
                }
                let average = growth_dirs[vi] / growth_counts[vi] as f32;
                let len = average.length();
                if len < 1e-10 {
                    continue;
                }
                let direction = average / len;
                let new_position = veins[vi].position + direction * self.growth_step_size;
                if !point_in_contour(new_position, contour) {
                    continue;
                }

                if self.venation_type == VenationType::Closed {
                    let nearby =
                        vein_hash.query_radius(new_position, self.growth_step_size * 3.0);
                    let merge_target = nearby.into_iter().find(|&nid| {
                        nid != vi
                            && !is_ancestor(&veins, vi, nid)
                            && !is_ancestor(&veins, nid, vi)
                    });
                    if let Some(nid) = merge_target {
                        // Attach to the unrelated vein instead, closing a
                        // loop through the network.
                        let new_index = veins.len();
                        veins.push(VeinNode {
                            position: new_position,
                            parent: nid as i32,
                            width: 1.0,
                        });
                        vein_hash.insert(new_index, new_position);
                        any_grew = true;
                        continue;
                    }
                }

                let new_index = veins.len();
                veins.push(VeinNode {
                    position: new_position,
                    parent: vi as i32,
                    width: 1.0,
                });
                vein_hash.insert(new_index, new_position);
                any_grew = true;
            }

            if !any_grew {
                break;
            }

            let kill_sq = effective_kill * effective_kill;
            for vi in old_size..veins.len() {
                let grown = veins[vi].position;
                for auxin in auxins.iter_mut().filter(|auxin| auxin.active) {
                    if auxin.position.distance_squared(grown) <= kill_sq {
                        auxin.active = false;
                    }
                }
            }
        }

        compute_pipe_widths(&mut veins);
        veins
    }

    /// Store each vertex's minimum distance to the vein network under the
    /// [`VEIN_DISTANCE`] attribute. No attribute is added for an empty
    /// vein set.
    pub fn compute_vein_distances(&self, mesh: &mut Mesh, veins: &[VeinNode]) {
        if veins.is_empty() || mesh.vertices.is_empty() {
            return;
        }
        let distances: Vec<f32> = mesh
            .vertices
            .iter()
            .map(|vertex| {
                let point = Vec2::new(vertex.x, vertex.y);
                veins
                    .iter()
                    .map(|node| match node.parent {
                        parent if parent < 0 => point.distance(node.position),
                        parent => distance_to_segment(
                            point,
                            veins[parent as usize].position,
                            node.position,
                        ),
                    })
                    .fold(f32::MAX, f32::min)
            })
            .collect();
        mesh.add_float_attribute(VEIN_DISTANCE, distances);
    }

    fn generate_auxin_sources(&self, contour: &[Vec2], rng: &mut StdRng) -> Vec<AuxinSource> {
        let (min_bound, max_bound) = bounding_box(contour);
        let area = contour_area(contour);
        let target = ((self.vein_density * area) as usize).min(MAX_AUXIN_SOURCES);
        let mut auxins = Vec::with_capacity(target);
        if target == 0 {
            return auxins;
        }

        let mut attempts = 0;
        let max_attempts = target * 10;
        while auxins.len() < target && attempts < max_attempts {
            let x = min_bound.x + (max_bound.x - min_bound.x) * rand01(rng);
            let y = min_bound.y + (max_bound.y - min_bound.y) * rand01(rng);
            let position = Vec2::new(x, y);
            if point_in_contour(position, contour) {
                auxins.push(AuxinSource {
                    position,
                    active: true,
                });
            }
            attempts += 1;
        }
        if auxins.len() < target {
            warn!(
                "Auxin rejection sampling placed {} of {} sources.",
                auxins.len(),
                target
            );
        }
        auxins
    }
}

fn bounding_box(points: &[Vec2]) -> (Vec2, Vec2) {
    let mut min_bound = points[0];
    let mut max_bound = points[0];
    for &point in points {
        min_bound = min_bound.min(point);
        max_bound = max_bound.max(point);
    }
    (min_bound, max_bound)
}

/// Even-odd crossing test.
fn point_in_contour(point: Vec2, contour: &[Vec2]) -> bool {
    let mut crossings = 0;
    let mut j = contour.len() - 1;
    for i in 0..contour.len() {
        let a = contour[i];
        let b = contour[j];
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            crossings += 1;
        }
        j = i;
    }
    crossings % 2 != 0
}

fn contour_area(contour: &[Vec2]) -> f32 {
    let mut area = 0.0;
    let mut j = contour.len() - 1;
    for i in 0..contour.len() {
        area += contour[j].x * contour[i].y;
        area -= contour[i].x * contour[j].y;
        j = i;
    }
    area.abs() * 0.5
}

fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-10 {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

fn is_ancestor(nodes: &[VeinNode], node_index: usize, potential_ancestor: usize) -> bool {
    let mut current = node_index as i32;
    let mut steps = 0;
    while current >= 0 && steps < nodes.len() {
        if current as usize == potential_ancestor {
            return true;
        }
        current = nodes[current as usize].parent;
        steps += 1;
    }
    false
}

/// Pipe-model widths: tips start at one unit of cross-section, widths
/// sum child-to-parent, final width is the square root.
fn compute_pipe_widths(nodes: &mut [VeinNode]) {
    if nodes.is_empty() {
        return;
    }
    let mut child_count = vec![0usize; nodes.len()];
    for node in nodes.iter().skip(1) {
        if node.parent >= 0 {
            child_count[node.parent as usize] += 1;
        }
    }
    for (node, &children) in nodes.iter_mut().zip(&child_count) {
        node.width = if children == 0 { 1.0 } else { 0.0 };
    }
    for index in (0..nodes.len()).rev() {
        let parent = nodes[index].parent;
        if parent >= 0 {
            let width = nodes[index].width;
            nodes[parent as usize].width += width;
        }
    }
    for node in nodes.iter_mut() {
        node.width = node.width.max(1.0).sqrt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Mesh;
    use glam::Vec3;

    fn unit_diamond() -> Vec<Vec2> {
        vec![
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ]
    }

    fn dense_generator(venation_type: VenationType) -> VenationGenerator {
        VenationGenerator {
            venation_type,
            vein_density: 2000.0,
            kill_distance: 0.03,
            growth_step_size: 0.01,
            attraction_distance: 0.08,
            max_iterations: 300,
            seed: 42,
        }
    }

    fn assert_parent_links_valid(veins: &[VeinNode]) {
        assert_eq!(veins[0].parent, -1);
        for (index, node) in veins.iter().enumerate().skip(1) {
            assert!(node.parent >= -1);
            assert!((node.parent as usize) < index);
        }
        for start in 0..veins.len() {
            let mut current = start as i32;
            let mut steps = 0;
            while current >= 0 {
                current = veins[current as usize].parent;
                steps += 1;
                assert!(steps <= veins.len());
            }
        }
    }

    #[test]
    fn spatial_hash_radius_query_filters_by_distance() {
        let mut hash = SpatialHash2D::new(0.5, Vec2::splat(-2.0), Vec2::splat(2.0));
        hash.insert(0, Vec2::ZERO);
        hash.insert(1, Vec2::new(0.3, 0.0));
        hash.insert(2, Vec2::new(1.5, 1.5));
        let mut near = hash.query_radius(Vec2::ZERO, 0.5);
        near.sort_unstable();
        assert_eq!(near, vec![0, 1]);
        assert!(hash.query_radius(Vec2::new(1.5, 1.5), 0.1).contains(&2));
    }

    #[test]
    fn spatial_hash_clear_empties_all_cells() {
        let mut hash = SpatialHash2D::new(0.5, Vec2::splat(-1.0), Vec2::splat(1.0));
        hash.insert(0, Vec2::ZERO);
        hash.clear();
        assert!(hash.query_radius(Vec2::ZERO, 1.0).is_empty());
    }

    #[test]
    fn zero_density_produces_no_veins_and_no_attribute() {
        let generator = VenationGenerator {
            vein_density: 0.0,
            seed: 42,
            ..VenationGenerator::default()
        };
        let veins = generator.generate_veins_internal(&unit_diamond());
        assert!(veins.is_empty());

        let mut mesh = Mesh::new();
        mesh.vertices.push(Vec3::ZERO);
        generator.compute_vein_distances(&mut mesh, &veins);
        assert!(mesh.float_attribute(VEIN_DISTANCE).is_none());
    }

    #[test]
    fn degenerate_contour_produces_no_veins() {
        let generator = VenationGenerator::default();
        let contour = vec![Vec2::ZERO, Vec2::X];
        assert!(generator.generate_veins_internal(&contour).is_empty());
    }

    #[test]
    fn open_venation_grows_a_branching_tree() {
        let veins = dense_generator(VenationType::Open).generate_veins_internal(&unit_diamond());
        assert!(veins.len() >= 6);
        assert_parent_links_valid(&veins);

        let mut child_count = vec![0usize; veins.len()];
        for node in veins.iter().skip(1) {
            if node.parent >= 0 {
                child_count[node.parent as usize] += 1;
            }
        }
        assert!(child_count.iter().any(|&count| count >= 2));
    }

    #[test]
    fn closed_venation_is_at_least_as_dense_and_merges() {
        let open = dense_generator(VenationType::Open).generate_veins_internal(&unit_diamond());
        let closed =
            dense_generator(VenationType::Closed).generate_veins_internal(&unit_diamond());
        assert!(closed.len() >= open.len());
        assert_parent_links_valid(&closed);

        // A loop merge shows up as a parent whose children indices are
        // not contiguous.
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); closed.len()];
        for (index, node) in closed.iter().enumerate().skip(1) {
            if node.parent >= 0 {
                children[node.parent as usize].push(index);
            }
        }
        let has_non_contiguous = children.iter().any(|list| {
            list.windows(2).any(|pair| pair[1] != pair[0] + 1)
        });
        assert!(has_non_contiguous);
    }

    #[test]
    fn generation_is_deterministic_for_a_seed() {
        let a = dense_generator(VenationType::Open).generate_veins_internal(&unit_diamond());
        let b = dense_generator(VenationType::Open).generate_veins_internal(&unit_diamond());
        assert_eq!(a.len(), b.len());
        for (na, nb) in a.iter().zip(&b) {
            assert_eq!(na.parent, nb.parent);
            assert!((na.position - nb.position).length() < 1e-6);
        }
    }

    #[test]
    fn pipe_widths_grow_toward_the_root() {
        let veins = dense_generator(VenationType::Open).generate_veins_internal(&unit_diamond());
        for node in &veins {
            assert!(node.width >= 1.0);
        }
        let max_width = veins.iter().map(|n| n.width).fold(0.0, f32::max);
        assert!(veins[0].width >= max_width * 0.5);
    }

    #[test]
    fn vein_distances_cover_every_vertex() {
        let generator = dense_generator(VenationType::Open);
        let veins = generator.generate_veins_internal(&unit_diamond());
        let mut mesh = Mesh::new();
        mesh.vertices.extend([
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.5, 0.0, 0.0),
            Vec3::new(0.0, -0.9, 0.0),
        ]);
        generator.compute_vein_distances(&mut mesh, &veins);
        let distances = mesh.float_attribute(VEIN_DISTANCE).expect("attribute added");
        assert_eq!(distances.len(), 3);
        for &distance in distances {
            assert!(distance.is_finite());
            assert!(distance >= 0.0);
        }
    }

    #[test]
    fn mint_boundary_matches_internal_contour() {
        let generator = dense_generator(VenationType::Open);
        let glam_contour = unit_diamond();
        let mint_contour: Vec<mint::Vector2<f32>> =
            glam_contour.iter().copied().map(Into::into).collect();
        let a = generator.generate_veins(&mint_contour);
        let b = generator.generate_veins_internal(&glam_contour);
        assert_eq!(a.len(), b.len());
    }

    #[test]
    fn validate_rejects_non_positive_step() {
        let generator = VenationGenerator {
            growth_step_size: 0.0,
            ..VenationGenerator::default()
        };
        assert!(generator.validate().is_err());
    }
}
