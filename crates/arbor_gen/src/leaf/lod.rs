//! Leaf level-of-detail reductions: flat cards, billboard clouds and
//! impostor view sets.
use glam::{Vec2, Vec3};
use tracing::warn;

use crate::mesh::Mesh;

/// Collapse a leaf mesh to a single textured quad spanning its XY
/// bounding box at the mid-Z plane. Sources with fewer than three
/// vertices produce an empty mesh.
pub fn generate_card(source: &Mesh) -> Mesh {
    let mut card = Mesh::new();
    if source.vertices.len() < 3 {
        warn!(
            "Card source has {} vertices; returning empty mesh.",
            source.vertices.len()
        );
        return card;
    }

    let mut min = source.vertices[0];
    let mut max = source.vertices[0];
    for &vertex in &source.vertices {
        min = min.min(vertex);
        max = max.max(vertex);
    }
    let mid_z = (min.z + max.z) * 0.5;

    card.vertices.push(Vec3::new(min.x, min.y, mid_z));
    card.vertices.push(Vec3::new(max.x, min.y, mid_z));
    card.vertices.push(Vec3::new(max.x, max.y, mid_z));
    card.vertices.push(Vec3::new(min.x, max.y, mid_z));

    card.uvs.push(Vec2::new(0.0, 0.0));
    card.uvs.push(Vec2::new(1.0, 0.0));
    card.uvs.push(Vec2::new(1.0, 1.0));
    card.uvs.push(Vec2::new(0.0, 1.0));

    card.push_triangle(0, 1, 2);
    card.push_triangle(0, 2, 3);
    card.uv_loops.push([0, 1, 2, 2]);
    card.uv_loops.push([0, 2, 3, 3]);

    card
}

/// A set of `num_planes` quads through the cloud center with evenly
/// distributed normals around the Y axis, each sized to the cloud
/// radius. Empty positions or a non-positive plane count produce an
/// empty mesh.
pub fn generate_billboard_cloud(positions: &[mint::Vector3<f32>], num_planes: i32) -> Mesh {
    let mut cloud = Mesh::new();
    if positions.is_empty() || num_planes < 1 {
        warn!(
            "Billboard cloud with {} positions and {num_planes} planes; returning empty mesh.",
            positions.len()
        );
        return cloud;
    }
    let positions: Vec<Vec3> = positions.iter().copied().map(Vec3::from).collect();

    let center = positions.iter().copied().sum::<Vec3>() / positions.len() as f32;
    let radius = positions
        .iter()
        .map(|p| p.distance(center))
        .fold(0.0, f32::max);
    let half_size = radius.max(0.5);

    for i in 0..num_planes {
        let angle = std::f32::consts::PI * i as f32 / num_planes as f32;
        let normal = Vec3::new(angle.cos(), 0.0, angle.sin());
        let up = Vec3::Y;
        let mut tangent = up.cross(normal).normalize_or_zero();
        if tangent.length() < 0.001 {
            tangent = Vec3::X;
        }
        let bitangent = normal.cross(tangent).normalize_or(Vec3::Y);

        let base = cloud.vertices.len() as u32;
        cloud
            .vertices
            .push(center - tangent * half_size - bitangent * half_size);
        cloud
            .vertices
            .push(center + tangent * half_size - bitangent * half_size);
        cloud
            .vertices
            .push(center + tangent * half_size + bitangent * half_size);
        cloud
            .vertices
            .push(center - tangent * half_size + bitangent * half_size);

        cloud.uvs.push(Vec2::new(0.0, 0.0));
        cloud.uvs.push(Vec2::new(1.0, 0.0));
        cloud.uvs.push(Vec2::new(1.0, 1.0));
        cloud.uvs.push(Vec2::new(0.0, 1.0));

        cloud.push_triangle(base, base + 1, base + 2);
        cloud.push_triangle(base, base + 2, base + 3);
        cloud.uv_loops.push([base, base + 1, base + 2, base + 2]);
        cloud.uv_loops.push([base, base + 2, base + 3, base + 3]);
    }

    cloud
}

/// `resolution * resolution` unit view directions covering the upper
/// hemisphere, rows from near-vertical down toward the horizon.
pub fn get_impostor_view_directions(resolution: u32) -> Vec<Vec3> {
    let mut directions = Vec::with_capacity((resolution * resolution) as usize);
    for j in 0..resolution {
        let phi = std::f32::consts::FRAC_PI_2 * (j + 1) as f32 / (resolution + 1) as f32;
        for i in 0..resolution {
            let theta = std::f32::consts::TAU * i as f32 / resolution as f32;
            let direction = Vec3::new(
                phi.sin() * theta.cos(),
                phi.sin() * theta.sin(),
                phi.cos(),
            );
            directions.push(direction.normalize_or(Vec3::Z));
        }
    }
    directions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::LeafShapeGenerator;

    #[test]
    fn card_of_degenerate_source_is_empty() {
        let mut source = Mesh::new();
        source.vertices.push(Vec3::ZERO);
        source.vertices.push(Vec3::X);
        let card = generate_card(&source);
        assert_eq!(card.vertices.len(), 0);
        assert_eq!(card.polygons.len(), 0);
    }

    #[test]
    fn card_matches_source_bounding_box() {
        let leaf = LeafShapeGenerator::default().generate();
        let card = generate_card(&leaf);
        assert_eq!(card.vertices.len(), 4);
        assert_eq!(card.polygons.len(), 2);
        assert!(card.validate().is_ok());

        let (mut min_x, mut max_x) = (f32::MAX, f32::MIN);
        let (mut min_y, mut max_y) = (f32::MAX, f32::MIN);
        for v in &leaf.vertices {
            min_x = min_x.min(v.x);
            max_x = max_x.max(v.x);
            min_y = min_y.min(v.y);
            max_y = max_y.max(v.y);
        }
        let (mut card_min_x, mut card_max_x) = (f32::MAX, f32::MIN);
        let (mut card_min_y, mut card_max_y) = (f32::MAX, f32::MIN);
        for v in &card.vertices {
            card_min_x = card_min_x.min(v.x);
            card_max_x = card_max_x.max(v.x);
            card_min_y = card_min_y.min(v.y);
            card_max_y = card_max_y.max(v.y);
        }
        assert!((min_x - card_min_x).abs() < 0.01);
        assert!((max_x - card_max_x).abs() < 0.01);
        assert!((min_y - card_min_y).abs() < 0.01);
        assert!((max_y - card_max_y).abs() < 0.01);
    }

    #[test]
    fn card_triangles_follow_the_degenerate_quad_convention() {
        let leaf = LeafShapeGenerator::default().generate();
        let card = generate_card(&leaf);
        assert_eq!(card.polygons[0], [0, 1, 2, 2]);
        assert_eq!(card.polygons[1], [0, 2, 3, 3]);
    }

    #[test]
    fn billboard_cloud_emits_one_quad_per_plane() {
        let positions: Vec<mint::Vector3<f32>> = vec![
            Vec3::new(0.0, 0.0, 0.0).into(),
            Vec3::new(1.0, 0.0, 0.0).into(),
            Vec3::new(0.0, 1.0, 0.0).into(),
        ];
        let cloud = generate_billboard_cloud(&positions, 5);
        assert_eq!(cloud.vertices.len(), 20);
        assert_eq!(cloud.polygons.len(), 10);
        assert!(cloud.validate().is_ok());
    }

    #[test]
    fn billboard_cloud_rejects_degenerate_inputs() {
        assert_eq!(generate_billboard_cloud(&[], 5).vertices.len(), 0);
        let one: Vec<mint::Vector3<f32>> = vec![Vec3::ZERO.into()];
        assert_eq!(generate_billboard_cloud(&one, 0).vertices.len(), 0);
    }

    #[test]
    fn billboard_quads_respect_minimum_half_size() {
        let one: Vec<mint::Vector3<f32>> = vec![Vec3::ZERO.into()];
        let cloud = generate_billboard_cloud(&one, 1);
        // A single position has radius 0, clamped to the 0.5 floor.
        let max_extent = cloud
            .vertices
            .iter()
            .map(|v| v.length())
            .fold(0.0, f32::max);
        assert!(max_extent > 0.5);
    }

    #[test]
    fn impostor_directions_cover_the_upper_hemisphere() {
        let directions = get_impostor_view_directions(8);
        assert_eq!(directions.len(), 64);
        for direction in &directions {
            assert!(direction.z >= 0.0);
            assert!((direction.length() - 1.0).abs() < 1e-2);
        }
    }

    #[test]
    fn impostor_resolution_zero_yields_no_directions() {
        assert!(get_impostor_view_directions(0).is_empty());
    }
}
