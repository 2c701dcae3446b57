//! Leaf shape, venation and LOD engines.
//!
//! Independent of the tree engine: each generator is configured from its
//! own parameter struct and produces a [`crate::mesh::Mesh`]. The preset
//! registry supplies per-species defaults for the shape and venation
//! parameters.

pub mod lod;
pub mod shape;
pub mod venation;

pub use lod::{generate_billboard_cloud, generate_card, get_impostor_view_directions};
pub use shape::LeafShapeGenerator;
pub use venation::{SpatialHash2D, VeinNode, VenationGenerator};

/// Leaf margin styles, named after the botanical terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarginType {
    /// Smooth edge, no teeth.
    Entire,
    /// Asymmetric sawtooth, teeth pointing toward the tip.
    Serrate,
    /// Symmetric triangular teeth pointing outward.
    Dentate,
    /// Rounded scallops.
    Crenate,
    /// Low-frequency, high-amplitude lobes.
    Lobed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum VenationType {
    /// Tree-structured veins.
    Open,
    /// Veins may merge into loops (anastomosis).
    Closed,
}

/// Read-only per-species defaults for the leaf parameter groups.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LeafPreset {
    pub name: &'static str,
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
    // Venation
    pub enable_venation: bool,
    pub venation_type: VenationType,
    pub vein_density: f32,
    pub kill_distance: f32,
    // Deformation
    pub midrib_curvature: f32,
    pub cross_curvature: f32,
    pub edge_curl: f32,
}

static PRESETS: &[LeafPreset] = &[
    LeafPreset {
        name: "Oak",
        m: 7.0,
        a: 1.0,
        b: 1.0,
        n1: 2.0,
        n2: 4.0,
        n3: 4.0,
        aspect_ratio: 0.7,
        margin_type: MarginType::Lobed,
        tooth_count: 7,
        tooth_depth: 0.3,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 800.0,
        kill_distance: 3.0,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Maple",
        m: 5.0,
        a: 1.0,
        b: 1.0,
        n1: 1.5,
        n2: 3.0,
        n3: 3.0,
        aspect_ratio: 0.95,
        margin_type: MarginType::Lobed,
        tooth_count: 5,
        tooth_depth: 0.5,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 1000.0,
        kill_distance: 2.5,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Birch",
        m: 2.0,
        a: 1.0,
        b: 0.6,
        n1: 2.5,
        n2: 8.0,
        n3: 8.0,
        aspect_ratio: 0.6,
        margin_type: MarginType::Serrate,
        tooth_count: 24,
        tooth_depth: 0.05,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 600.0,
        kill_distance: 3.0,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Willow",
        m: 2.0,
        a: 1.0,
        b: 0.3,
        n1: 3.0,
        n2: 10.0,
        n3: 10.0,
        aspect_ratio: 0.2,
        margin_type: MarginType::Entire,
        tooth_count: 0,
        tooth_depth: 0.0,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 400.0,
        kill_distance: 4.0,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Pine",
        m: 2.0,
        a: 1.0,
        b: 0.05,
        n1: 4.0,
        n2: 20.0,
        n3: 20.0,
        aspect_ratio: 0.05,
        margin_type: MarginType::Entire,
        tooth_count: 0,
        tooth_depth: 0.0,
        tooth_sharpness: 0.5,
        enable_venation: false,
        venation_type: VenationType::Open,
        vein_density: 0.0,
        kill_distance: 0.0,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
];

/// Look up a preset by species name.
pub fn get_leaf_preset(name: &str) -> Option<&'static LeafPreset> {
    PRESETS.iter().find(|preset| preset.name == name)
}

/// Names of all registered presets, in registry order.
pub fn get_leaf_preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|preset| preset.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oak_preset_matches_registry() {
        let oak = get_leaf_preset("Oak").expect("Oak exists");
        assert_eq!(oak.margin_type, MarginType::Lobed);
        assert_eq!(oak.tooth_count, 7);
        assert!(oak.enable_venation);
        assert_eq!(oak.vein_density, 800.0);
    }

    #[test]
    fn registry_contains_the_five_species() {
        let names = get_leaf_preset_names();
        assert_eq!(names.len(), 5);
        for name in ["Oak", "Maple", "Birch", "Willow", "Pine"] {
            assert!(get_leaf_preset(name).is_some());
        }
        assert!(get_leaf_preset("Nonexistent").is_none());
    }

    #[test]
    fn pine_disables_venation() {
        let pine = get_leaf_preset("Pine").expect("Pine exists");
        assert!(!pine.enable_venation);
        assert_eq!(pine.vein_density, 0.0);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert!(get_leaf_preset("oak").is_none());
    }
}
