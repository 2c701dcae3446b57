//! Mesh container shared by the tree mesher and the leaf engines.
//!
//! Polygons are quads of vertex indices; a triangle is stored as a
//! degenerate quad whose third and fourth indices are equal. `uv_loops`
//! mirrors `polygons` with UV indices, one 4-tuple per face. Per-vertex
//! attributes are stored in a heterogeneous, string-keyed map.
use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::error::{Error, Result};

/// A typed per-vertex attribute array, parallel to `Mesh::vertices`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Float(Vec<f32>),
    Int(Vec<i32>),
    Vec3(Vec<Vec3>),
}

impl AttributeValue {
    pub fn len(&self) -> usize {
        match self {
            AttributeValue::Float(data) => data.len(),
            AttributeValue::Int(data) => data.len(),
            AttributeValue::Vec3(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub polygons: Vec<[u32; 4]>,
    pub uv_loops: Vec<[u32; 4]>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a triangle encoded as a degenerate quad.
    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.polygons.push([a, b, c, c]);
    }

    /// Append a full quad.
    pub fn push_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.polygons.push([a, b, c, d]);
    }

    pub fn add_float_attribute(&mut self, name: impl Into<String>, data: Vec<f32>) {
        self.attributes.insert(name.into(), AttributeValue::Float(data));
    }

    pub fn add_int_attribute(&mut self, name: impl Into<String>, data: Vec<i32>) {
        self.attributes.insert(name.into(), AttributeValue::Int(data));
    }

    pub fn add_vec3_attribute(&mut self, name: impl Into<String>, data: Vec<Vec3>) {
        self.attributes.insert(name.into(), AttributeValue::Vec3(data));
    }

    pub fn float_attribute(&self, name: &str) -> Option<&[f32]> {
        match self.attributes.get(name) {
            Some(AttributeValue::Float(data)) => Some(data),
            _ => None,
        }
    }

    pub fn int_attribute(&self, name: &str) -> Option<&[i32]> {
        match self.attributes.get(name) {
            Some(AttributeValue::Int(data)) => Some(data),
            _ => None,
        }
    }

    pub fn vec3_attribute(&self, name: &str) -> Option<&[Vec3]> {
        match self.attributes.get(name) {
            Some(AttributeValue::Vec3(data)) => Some(data),
            _ => None,
        }
    }

    /// Check the structural invariants of the container: indices in
    /// range, `uv_loops` parallel to `polygons`, attribute arrays
    /// parallel to `vertices`.
    pub fn validate(&self) -> Result<()> {
        if self.uv_loops.len() != self.polygons.len() {
            return Err(Error::InvalidConfig(format!(
                "uv_loops ({}) must mirror polygons ({})",
                self.uv_loops.len(),
                self.polygons.len()
            )));
        }
        let vertex_count = self.vertices.len() as u32;
        for poly in &self.polygons {
            if poly.iter().any(|&i| i >= vertex_count) {
                return Err(Error::InvalidConfig(format!(
                    "polygon {poly:?} references out-of-range vertex (count {vertex_count})"
                )));
            }
        }
        let uv_count = self.uvs.len() as u32;
        for uv_loop in &self.uv_loops {
            if uv_loop.iter().any(|&i| i >= uv_count) {
                return Err(Error::InvalidConfig(format!(
                    "uv loop {uv_loop:?} references out-of-range uv (count {uv_count})"
                )));
            }
        }
        for (name, attr) in &self.attributes {
            if attr.len() != self.vertices.len() {
                return Err(Error::InvalidConfig(format!(
                    "attribute '{name}' has {} entries for {} vertices",
                    attr.len(),
                    self.vertices.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_triangle_repeats_last_index() {
        let mut mesh = Mesh::new();
        mesh.vertices
            .extend([Vec3::ZERO, Vec3::X, Vec3::Y]);
        mesh.push_triangle(0, 1, 2);
        assert_eq!(mesh.polygons[0], [0, 1, 2, 2]);
    }

    #[test]
    fn typed_attribute_lookup_rejects_kind_mismatch() {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vec3::ZERO);
        mesh.add_float_attribute("radius", vec![0.5]);
        assert_eq!(mesh.float_attribute("radius"), Some(&[0.5][..]));
        assert!(mesh.int_attribute("radius").is_none());
        assert!(mesh.vec3_attribute("radius").is_none());
        assert!(mesh.float_attribute("missing").is_none());
    }

    #[test]
    fn validate_catches_out_of_range_index() {
        let mut mesh = Mesh::new();
        mesh.vertices.extend([Vec3::ZERO, Vec3::X, Vec3::Y]);
        mesh.push_triangle(0, 1, 3);
        mesh.uv_loops.push([0, 0, 0, 0]);
        mesh.uvs.push(Vec2::ZERO);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn validate_catches_unparallel_attribute() {
        let mut mesh = Mesh::new();
        mesh.vertices.extend([Vec3::ZERO, Vec3::X]);
        mesh.add_int_attribute("stem_id", vec![0]);
        assert!(mesh.validate().is_err());
    }

    #[test]
    fn validate_accepts_consistent_mesh() {
        let mut mesh = Mesh::new();
        mesh.vertices.extend([Vec3::ZERO, Vec3::X, Vec3::Y]);
        mesh.uvs.extend([Vec2::ZERO, Vec2::X, Vec2::Y]);
        mesh.push_triangle(0, 1, 2);
        mesh.uv_loops.push([0, 1, 2, 2]);
        mesh.add_float_attribute("radius", vec![0.1, 0.2, 0.3]);
        assert!(mesh.validate().is_ok());
    }
}
