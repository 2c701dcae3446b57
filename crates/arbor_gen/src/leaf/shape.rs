//! Leaf blade synthesis.
//!
//! The pipeline samples a superformula contour (with adaptive
//! refinement where curvature is high), modulates the margin with a
//! tooth pattern, triangulates by ear clipping, projects planar UVs and
//! finally deforms the surface along Z. Venation is optional and adds a
//! per-vertex distance attribute over the same contour.
use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::geometry::rand01;
use crate::leaf::venation::VenationGenerator;
use crate::leaf::{LeafPreset, MarginType, VenationType};
use crate::mesh::Mesh;

/// Configurable generator producing a single leaf mesh.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LeafShapeGenerator {
    // Superformula
    pub m: f32,
    pub a: f32,
    pub b: f32,
    pub n1: f32,
    pub n2: f32,
    pub n3: f32,
    pub aspect_ratio: f32,

    // Margin
    pub margin_type: MarginType,
    pub tooth_count: u32,
    pub tooth_depth: f32,
    pub tooth_sharpness: f32,
    /// Seed for per-tooth depth variation; 0 disables asymmetry.
    pub asymmetry_seed: u64,

    // Venation
    pub enable_venation: bool,
    pub venation_type: VenationType,
    pub vein_density: f32,
    pub kill_distance: f32,
    pub attraction_distance: f32,
    pub growth_step_size: f32,

    // Surface deformation
    pub midrib_curvature: f32,
    pub cross_curvature: f32,
    /// Z relief near the veins; only applies when venation runs.
    pub vein_displacement: f32,
    pub edge_curl: f32,

    // Resolution
    pub contour_resolution: u32,
    pub seed: u64,
}

impl Default for LeafShapeGenerator {
    fn default() -> Self {
        Self {
            m: 2.0,
            a: 1.0,
            b: 1.0,
            n1: 3.0,
            n2: 3.0,
            n3: 3.0,
            aspect_ratio: 0.5,
            margin_type: MarginType::Entire,
            tooth_count: 0,
            tooth_depth: 0.1,
            tooth_sharpness: 0.5,
            asymmetry_seed: 0,
            enable_venation: false,
            venation_type: VenationType::Open,
            vein_density: 800.0,
            kill_distance: 0.03,
            attraction_distance: 0.08,
            growth_step_size: 0.01,
            midrib_curvature: 0.0,
            cross_curvature: 0.0,
            vein_displacement: 0.0,
            edge_curl: 0.0,
            contour_resolution: 64,
            seed: 42,
        }
    }
}

impl LeafShapeGenerator {
    /// Configure a generator from a species preset.
    pub fn from_preset(preset: &LeafPreset) -> Self {
        Self {
            m: preset.m,
            a: preset.a,
            b: preset.b,
            n1: preset.n1,
            n2: preset.n2,
            n3: preset.n3,
            aspect_ratio: preset.aspect_ratio,
            margin_type: preset.margin_type,
            tooth_count: preset.tooth_count,
            tooth_depth: preset.tooth_depth,
            tooth_sharpness: preset.tooth_sharpness,
            enable_venation: preset.enable_venation,
            venation_type: preset.venation_type,
            vein_density: preset.vein_density,
            kill_distance: preset.kill_distance,
            midrib_curvature: preset.midrib_curvature,
            cross_curvature: preset.cross_curvature,
            edge_curl: preset.edge_curl,
            ..Self::default()
        }
    }

    /// Run the whole pipeline and return the leaf mesh.
    pub fn generate(&self) -> Mesh {
        let resolution = self.contour_resolution.max(8);
        let n1 = if self.n1.abs() < 0.001 {
            if self.n1 >= 0.0 {
                0.001
            } else {
                -0.001
            }
        } else {
            self.n1
        };

        let contour = self.sample_contour(resolution, n1);
        let contour = self.apply_margin(&contour);
        let mut mesh = triangulate(&contour);
        compute_uvs(&mut mesh, &contour);
        self.apply_deformation(&mut mesh, &contour);

        if self.enable_venation && self.vein_density > 0.0 {
            let generator = VenationGenerator {
                venation_type: self.venation_type,
                vein_density: self.vein_density,
                kill_distance: self.kill_distance,
                growth_step_size: self.growth_step_size,
                attraction_distance: self.attraction_distance,
                seed: self.seed,
                ..VenationGenerator::default()
            };
            let veins = generator.generate_veins_internal(&contour);
            generator.compute_vein_distances(&mut mesh, &veins);
            if self.vein_displacement != 0.0 {
                self.apply_vein_relief(&mut mesh);
            }
        }

        info!(
            "Generated leaf: {} vertices, {} polygons.",
            mesh.vertices.len(),
            mesh.polygons.len()
        );
        mesh
    }

    fn superformula_radius(&self, theta: f32, n1: f32) -> f32 {
        let ct = (self.m * theta / 4.0).cos();
        let st = (self.m * theta / 4.0).sin();
        let term1 = (ct / self.a).abs().powf(self.n2);
        let term2 = (st / self.b).abs().powf(self.n3);
        let sum = term1 + term2;
        if sum < 1e-10 {
            return 1.0;
        }
        sum.powf(-1.0 / n1)
    }

    fn sample_contour(&self, resolution: u32, n1: f32) -> Vec<Vec2> {
        let resolution = resolution as usize;
        let mut points = Vec::with_capacity(resolution * 2);
        for i in 0..resolution {
            let theta = TAU * i as f32 / resolution as f32;
            let r = self.superformula_radius(theta, n1);
            points.push(Vec2::new(
                r * theta.cos() * self.aspect_ratio,
                r * theta.sin(),
            ));
        }

        // Subdivide where the polyline turns sharply.
        let mut refined = Vec::with_capacity(points.len() * 2);
        for i in 0..points.len() {
            let prev = if i == 0 { points.len() - 1 } else { i - 1 };
            let next = (i + 1) % points.len();
            refined.push(points[i]);

            let d1 = (points[i] - points[prev]).normalize_or_zero();
            let d2 = (points[next] - points[i]).normalize_or_zero();
            if d1.dot(d2) < 0.95 {
                let theta_mid = TAU * (i as f32 + 0.5) / resolution as f32;
                let r_mid = self.superformula_radius(theta_mid, n1);
                refined.push(Vec2::new(
                    r_mid * theta_mid.cos() * self.aspect_ratio,
                    r_mid * theta_mid.sin(),
                ));
            }
        }
        refined
    }

    fn apply_margin(&self, contour: &[Vec2]) -> Vec<Vec2> {
        if self.margin_type == MarginType::Entire || self.tooth_count == 0 {
            return contour.to_vec();
        }

        let mut rng = StdRng::seed_from_u64(self.asymmetry_seed);
        let sharpness = self.tooth_sharpness.clamp(1e-3, 1.0 - 1e-3);

        let mut result = Vec::with_capacity(contour.len());
        for &point in contour {
            let r = point.length();
            if r < 1e-10 {
                result.push(point);
                continue;
            }
            let mut theta = point.y.atan2(point.x);
            if theta < 0.0 {
                theta += TAU;
            }
            let t = theta * self.tooth_count as f32 / TAU;
            let frac = t - t.floor();
            let asymmetry = if self.asymmetry_seed != 0 {
                rand01(&mut rng) * 0.6 - 0.3
            } else {
                0.0
            };
            let depth = self.tooth_depth * (1.0 + asymmetry);

            let modulation = match self.margin_type {
                MarginType::Serrate => {
                    let saw = if frac < sharpness {
                        frac / sharpness
                    } else {
                        (1.0 - frac) / (1.0 - sharpness)
                    };
                    depth * saw
                }
                MarginType::Dentate => depth * (1.0 - 2.0 * (frac - 0.5).abs()),
                MarginType::Crenate => depth * 0.5 * (1.0 + (TAU * frac).sin()),
                MarginType::Lobed => depth * 0.5 * (1.0 + (TAU * frac).cos()),
                MarginType::Entire => 0.0,
            };

            let new_r = r * (1.0 + modulation);
            result.push(Vec2::new(new_r * theta.cos(), new_r * theta.sin()));
        }
        result
    }

    fn apply_deformation(&self, mesh: &mut Mesh, contour: &[Vec2]) {
        if mesh.vertices.is_empty() || contour.is_empty() {
            return;
        }
        let (min_bound, max_bound) = bounding_box(contour);
        let width = max_bound.x - min_bound.x;
        let height = max_bound.y - min_bound.y;
        if width < 1e-10 || height < 1e-10 {
            return;
        }
        let center_x = (min_bound.x + max_bound.x) * 0.5;

        // Minimum distance to the contour, per vertex, for edge curl.
        let edge_distances: Vec<f32> = mesh
            .vertices
            .iter()
            .map(|vertex| {
                let point = Vec2::new(vertex.x, vertex.y);
                let mut best = f32::MAX;
                for i in 0..contour.len() {
                    let next = (i + 1) % contour.len();
                    best = best.min(distance_to_segment(point, contour[i], contour[next]));
                }
                best
            })
            .collect();

        let max_edge_dist = width * 0.5;
        for (vertex, &edge_dist) in mesh.vertices.iter_mut().zip(&edge_distances) {
            let nx = (vertex.x - center_x) / (width * 0.5);
            let ny = (vertex.y - min_bound.y) / height;
            let edge_factor = 1.0 - (edge_dist / (max_edge_dist * 0.3)).clamp(0.0, 1.0);

            let mut z = 0.0;
            z += self.midrib_curvature * ny * ny * 0.5;
            z += self.cross_curvature * nx * nx * 0.3;
            z += self.edge_curl * edge_factor * edge_factor * 0.2;
            vertex.z = z;
        }
    }

    fn apply_vein_relief(&self, mesh: &mut Mesh) {
        let Some(distances) = mesh.float_attribute(crate::leaf::venation::VEIN_DISTANCE) else {
            return;
        };
        let distances = distances.to_vec();
        let falloff = self.kill_distance.max(1e-6);
        for (vertex, distance) in mesh.vertices.iter_mut().zip(distances) {
            let factor = 1.0 - (distance / falloff).clamp(0.0, 1.0);
            vertex.z -= self.vein_displacement * factor * factor;
        }
    }
}

/// Ear-clipping triangulation over the closed contour, with a centroid
/// fan as the fallback for degenerate remainders.
fn triangulate(contour: &[Vec2]) -> Mesh {
    let mut mesh = Mesh::new();
    for point in contour {
        mesh.vertices.push(Vec3::new(point.x, point.y, 0.0));
    }
    if contour.len() < 3 {
        return mesh;
    }

    let mut indices: Vec<u32> = (0..contour.len() as u32).collect();

    // Force counter-clockwise winding.
    let mut signed_area = 0.0;
    for i in 0..contour.len() {
        let next = (i + 1) % contour.len();
        signed_area += contour[i].x * contour[next].y;
        signed_area -= contour[next].x * contour[i].y;
    }
    if signed_area < 0.0 {
        indices.reverse();
    }

    let mut poly: Vec<Vec2> = indices
        .iter()
        .map(|&index| contour[index as usize])
        .collect();

    while poly.len() > 2 {
        let mut ear_found = false;
        for i in 0..poly.len() {
            let prev = if i == 0 { poly.len() - 1 } else { i - 1 };
            let next = (i + 1) % poly.len();
            if is_ear(&poly, prev, i, next) {
                mesh.polygons
                    .push([indices[prev], indices[i], indices[next], indices[next]]);
                mesh.uv_loops.push([0, 0, 0, 0]);
                poly.remove(i);
                indices.remove(i);
                ear_found = true;
                break;
            }
        }
        if !ear_found {
            // Degenerate remainder: fan it around its centroid.
            warn!(
                "No ear found with {} contour points left; falling back to centroid fan.",
                poly.len()
            );
            let centroid = poly.iter().copied().sum::<Vec2>() / poly.len() as f32;
            let centroid_index = mesh.vertices.len() as u32;
            mesh.vertices.push(Vec3::new(centroid.x, centroid.y, 0.0));
            for i in 0..poly.len() {
                let next = (i + 1) % poly.len();
                mesh.polygons
                    .push([indices[i], indices[next], centroid_index, centroid_index]);
                mesh.uv_loops.push([0, 0, 0, 0]);
            }
            break;
        }
    }
    mesh
}

fn cross2d(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = cross2d(p, a, b);
    let d2 = cross2d(p, b, c);
    let d3 = cross2d(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn is_ear(polygon: &[Vec2], prev: usize, curr: usize, next: usize) -> bool {
    let a = polygon[prev];
    let b = polygon[curr];
    let c = polygon[next];
    // Convex corner in counter-clockwise winding.
    if cross2d(a, b, c) <= 0.0 {
        return false;
    }
    for (index, &point) in polygon.iter().enumerate() {
        if index == prev || index == curr || index == next {
            continue;
        }
        if point_in_triangle(point, a, b, c) {
            return false;
        }
    }
    true
}

/// Planar projection of the contour bounding box onto `[0, 1]^2`.
fn compute_uvs(mesh: &mut Mesh, contour: &[Vec2]) {
    if contour.is_empty() || mesh.vertices.is_empty() {
        return;
    }
    let (min_bound, max_bound) = bounding_box(contour);
    let width = max_bound.x - min_bound.x;
    let height = max_bound.y - min_bound.y;

    mesh.uvs = mesh
        .vertices
        .iter()
        .map(|vertex| {
            let u = if width > 1e-10 {
                (vertex.x - min_bound.x) / width
            } else {
                0.5
            };
            let v = if height > 1e-10 {
                (vertex.y - min_bound.y) / height
            } else {
                0.5
            };
            Vec2::new(u.clamp(0.0, 1.0), v.clamp(0.0, 1.0))
        })
        .collect();

    // Planar projection: UV indices equal vertex indices.
    for i in 0..mesh.polygons.len() {
        mesh.uv_loops[i] = mesh.polygons[i];
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

fn distance_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-10 {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}
