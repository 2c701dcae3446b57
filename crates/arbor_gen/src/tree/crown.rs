//! Crown envelope shapes after Weber & Penn.
//!
//! The ratio argument represents distance from the crown top: 1.0 at the
//! crown base, 0.0 at the top.

/// Shape envelope constants.
const MIN_RATIO: f32 = 0.2;
const RATIO_RANGE: f32 = 0.8;
const TAPER_BASE: f32 = 0.5;
const TAPER_RANGE: f32 = 0.5;
const FLAME_PEAK: f32 = 0.7;
const FLAME_FALLOFF: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrownShape {
    Conical,
    Spherical,
    Hemispherical,
    Cylindrical,
    TaperedCylindrical,
    Flame,
    InverseConical,
    TendFlame,
}

impl CrownShape {
    /// Branch length multiplier for the given height ratio, clamped to
    /// `[0, 1]`.
    pub fn shape_ratio(self, ratio: f32) -> f32 {
        let ratio = ratio.clamp(0.0, 1.0);
        match self {
            CrownShape::Conical => MIN_RATIO + RATIO_RANGE * ratio,
            CrownShape::Spherical => {
                MIN_RATIO + RATIO_RANGE * (std::f32::consts::PI * ratio).sin()
            }
            CrownShape::Hemispherical => {
                MIN_RATIO + RATIO_RANGE * (std::f32::consts::FRAC_PI_2 * ratio).sin()
            }
            CrownShape::Cylindrical => 1.0,
            CrownShape::TaperedCylindrical => TAPER_BASE + TAPER_RANGE * ratio,
            CrownShape::Flame => {
                if ratio <= FLAME_PEAK {
                    ratio / FLAME_PEAK
                } else {
                    (1.0 - ratio) / FLAME_FALLOFF
                }
            }
            CrownShape::InverseConical => 1.0 - RATIO_RANGE * ratio,
            CrownShape::TendFlame => {
                if ratio <= FLAME_PEAK {
                    TAPER_BASE + TAPER_RANGE * ratio / FLAME_PEAK
                } else {
                    TAPER_BASE + TAPER_RANGE * (1.0 - ratio) / FLAME_FALLOFF
                }
            }
        }
    }
}
