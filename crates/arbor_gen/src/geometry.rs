//! Small geometry and RNG helpers shared by the growth and leaf engines.
//!
//! Every randomized code path in the crate threads a caller-owned
//! [`RngCore`] seeded at the start of the owning `execute`/`generate`
//! call, so results are reproducible from the seed alone.
use glam::{Quat, Vec3};
use rand::RngCore;

/// Golden angle in radians, the divergence angle of spiral phyllotaxis.
pub const GOLDEN_ANGLE: f32 = 2.39996322972865;

/// Generate a random float in the range [0, 1].
#[inline]
pub(crate) fn rand01(rng: &mut dyn RngCore) -> f32 {
    (rng.next_u32() as f32) / ((u32::MAX as f32) + 1.0)
}

/// Linear interpolation between two scalars, unclamped.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Random vector in the unit cube, with the Z component scaled by
/// `1 - flatness` so growth can be biased toward the horizontal plane.
///
/// The result is not normalized; callers that need a direction normalize
/// after mixing in their own biases.
pub fn random_vec(rng: &mut dyn RngCore, flatness: f32) -> Vec3 {
    Vec3::new(
        rand01(rng) * 2.0 - 1.0,
        rand01(rng) * 2.0 - 1.0,
        (rand01(rng) * 2.0 - 1.0) * (1.0 - flatness),
    )
}

/// An arbitrary unit vector orthogonal to `v`.
pub fn get_orthogonal_vector(v: Vec3) -> Vec3 {
    let axis = if v.x.abs() < v.z.abs() {
        Vec3::X
    } else {
        Vec3::Z
    };
    v.cross(axis).normalize_or(Vec3::X)
}

/// Remove from `v` its component along the plane normal `normal`.
///
/// `normal` is assumed to be unit length.
#[inline]
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Rotation mapping the +Z axis onto `direction`.
pub fn get_look_at_rot(direction: Vec3) -> Quat {
    let dir = direction.normalize_or(Vec3::Z);
    Quat::from_rotation_arc(Vec3::Z, dir)
}
