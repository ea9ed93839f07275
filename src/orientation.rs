//! Orientation resolution for overlay video
//!
//! Maps a video's intrinsic affine transform (the orientation the encoder
//! stored alongside the frames) onto one of four canonical on-surface
//! rotations, then works out how to scale the rotated frame onto the marker
//! surface.
//!
//! Matching is exact. A transform that is not one of the four canonical
//! matrices is treated as upright: this is the defined default, not an error.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Mat4, Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// 2x3 affine transform as stored in the video container
///
/// Maps a point `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    #[serde(default)]
    pub tx: f64,
    #[serde(default)]
    pub ty: f64,
}

impl VideoTransform {
    pub const IDENTITY: Self = Self::linear(1.0, 0.0, 0.0, 1.0);
    /// Frames stored landscape, displayed rotated 90 degrees clockwise
    pub const ROTATE_CW_90: Self = Self::linear(0.0, 1.0, -1.0, 0.0);
    pub const ROTATE_180: Self = Self::linear(-1.0, 0.0, 0.0, -1.0);
    /// Frames stored landscape, displayed rotated 90 degrees counter-clockwise
    pub const ROTATE_CCW_90: Self = Self::linear(0.0, -1.0, 1.0, 0.0);

    /// Transform with no translation component
    pub const fn linear(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            a,
            b,
            c,
            d,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// Determinant of the 2x2 linear part
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Compare the 2x2 linear part, ignoring translation
    fn linear_eq(&self, other: &Self) -> bool {
        self.a == other.a && self.b == other.b && self.c == other.c && self.d == other.d
    }
}

impl Default for VideoTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Canonical rotation applied to the video on the marker surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Up,
    Clockwise90,
    UpsideDown,
    CounterClockwise90,
}

impl Rotation {
    /// Clockwise rotation in degrees
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Up => 0,
            Rotation::Clockwise90 => 90,
            Rotation::UpsideDown => 180,
            Rotation::CounterClockwise90 => 270,
        }
    }

    /// Rotation about the surface normal in radians, counter-clockwise positive
    pub fn radians(self) -> f32 {
        match self {
            Rotation::Up => 0.0,
            Rotation::Clockwise90 => -FRAC_PI_2,
            Rotation::UpsideDown => PI,
            Rotation::CounterClockwise90 => FRAC_PI_2,
        }
    }

    /// Whether the rotation swaps the frame's width and height
    pub fn is_quarter_turn(self) -> bool {
        matches!(self, Rotation::Clockwise90 | Rotation::CounterClockwise90)
    }
}

/// Mirroring applied after rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MirrorFlags {
    pub horizontal: bool,
}

/// Which surface dimension the video is fitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitAxis {
    /// Width matches the surface, height overflows
    #[default]
    Width,
    /// Height matches the surface, width overflows
    Height,
}

/// Result of orientation resolution
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub rotation: Rotation,
    /// Scale in surface axes (x = marker width, y = marker height); 1.0 fills the axis
    pub scale: Vec2,
    pub mirror: MirrorFlags,
    pub fit: FitAxis,
}

impl Default for Placement {
    fn default() -> Self {
        Self::fallback()
    }
}

impl Placement {
    /// Upright, unmirrored, filling the surface
    ///
    /// Used until metadata is available and when it cannot be loaded.
    pub const fn fallback() -> Self {
        Self {
            rotation: Rotation::Up,
            scale: Vec2::ONE,
            mirror: MirrorFlags { horizontal: false },
            fit: FitAxis::Width,
        }
    }

    /// Local transform of the video plane relative to its anchor
    ///
    /// The plane is laid flat onto the marker (rotated -90 degrees about X),
    /// then rotated about its normal and scaled in surface axes.
    pub fn local_transform(&self) -> Mat4 {
        let mirror = if self.mirror.horizontal { -1.0 } else { 1.0 };
        let lay_flat = Quat::from_rotation_x(-FRAC_PI_2);
        let spin = Quat::from_rotation_z(self.rotation.radians());
        Mat4::from_scale_rotation_translation(
            Vec3::new(self.scale.x * mirror, self.scale.y, 1.0),
            lay_flat * spin,
            Vec3::ZERO,
        )
    }
}

/// Match a transform against the four canonical rotations
///
/// Anything that is not an exact match resolves to [`Rotation::Up`].
pub fn rotation_for(transform: &VideoTransform) -> Rotation {
    if transform.linear_eq(&VideoTransform::IDENTITY) {
        Rotation::Up
    } else if transform.linear_eq(&VideoTransform::ROTATE_CW_90) {
        Rotation::Clockwise90
    } else if transform.linear_eq(&VideoTransform::ROTATE_180) {
        Rotation::UpsideDown
    } else if transform.linear_eq(&VideoTransform::ROTATE_CCW_90) {
        Rotation::CounterClockwise90
    } else {
        Rotation::Up
    }
}

/// Resolve rotation, scale and mirroring for a video on a marker surface
///
/// `image_aspect` is the video's natural width / height as stored, before its
/// transform is applied. `surface_aspect` is the marker's physical
/// width / height.
///
/// A video that is relatively wider than the surface is fitted to the
/// surface height and its width overflows; otherwise it is fitted to the
/// width and its height overflows. Overflow is cropped by the surface.
/// Horizontal mirroring is decided from the transform's orientation
/// (negative determinant) independently of the rotation bucket.
pub fn resolve(transform: &VideoTransform, image_aspect: f32, surface_aspect: f32) -> Placement {
    let rotation = rotation_for(transform);
    let mirror = MirrorFlags {
        horizontal: transform.determinant() < 0.0,
    };

    if !is_valid_aspect(image_aspect) || !is_valid_aspect(surface_aspect) {
        return Placement {
            rotation,
            mirror,
            ..Placement::fallback()
        };
    }

    let displayed_aspect = if rotation.is_quarter_turn() {
        1.0 / image_aspect
    } else {
        image_aspect
    };

    let (scale, fit) = if displayed_aspect > surface_aspect {
        (Vec2::new(displayed_aspect / surface_aspect, 1.0), FitAxis::Height)
    } else {
        (Vec2::new(1.0, surface_aspect / displayed_aspect), FitAxis::Width)
    };

    Placement {
        rotation,
        scale,
        mirror,
        fit,
    }
}

fn is_valid_aspect(aspect: f32) -> bool {
    aspect.is_finite() && aspect > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_rotations() {
        assert_eq!(rotation_for(&VideoTransform::IDENTITY), Rotation::Up);
        assert_eq!(rotation_for(&VideoTransform::ROTATE_CW_90), Rotation::Clockwise90);
        assert_eq!(rotation_for(&VideoTransform::ROTATE_180), Rotation::UpsideDown);
        assert_eq!(
            rotation_for(&VideoTransform::ROTATE_CCW_90),
            Rotation::CounterClockwise90
        );
    }

    #[test]
    fn test_translation_ignored_for_matching() {
        // Portrait recordings usually carry a translation equal to the frame height
        let transform = VideoTransform {
            tx: 1080.0,
            ..VideoTransform::ROTATE_CW_90
        };
        assert_eq!(rotation_for(&transform), Rotation::Clockwise90);
    }

    #[test]
    fn test_non_matching_falls_back_to_up() {
        let angle = std::f64::consts::FRAC_PI_4;
        let skewed = VideoTransform::linear(angle.cos(), angle.sin(), -angle.sin(), angle.cos());
        let placement = resolve(&skewed, 16.0 / 9.0, 16.0 / 9.0);
        assert_eq!(placement.rotation, Rotation::Up);
        assert!(!placement.mirror.horizontal);

        let scaled = VideoTransform::linear(2.0, 0.0, 0.0, 2.0);
        assert_eq!(resolve(&scaled, 1.0, 1.0).rotation, Rotation::Up);
    }

    #[test]
    fn test_near_miss_is_not_matched() {
        let almost = VideoTransform::linear(1e-9, 1.0, -1.0, 0.0);
        assert_eq!(rotation_for(&almost), Rotation::Up);
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let a = resolve(&VideoTransform::ROTATE_CW_90, 16.0 / 9.0, 0.75);
        let b = resolve(&VideoTransform::ROTATE_CW_90, 16.0 / 9.0, 0.75);
        assert_eq!(a.scale.x.to_bits(), b.scale.x.to_bits());
        assert_eq!(a.scale.y.to_bits(), b.scale.y.to_bits());
        assert_eq!(a, b);
    }

    #[test]
    fn test_wider_media_fits_height() {
        // 16:9 landscape video on a square marker
        let placement = resolve(&VideoTransform::IDENTITY, 16.0 / 9.0, 1.0);
        assert_eq!(placement.fit, FitAxis::Height);
        assert_eq!(placement.scale.y, 1.0);
        assert!((placement.scale.x - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_narrower_media_fits_width() {
        // Landscape frames rotated to portrait on a square marker
        let placement = resolve(&VideoTransform::ROTATE_CW_90, 16.0 / 9.0, 1.0);
        assert_eq!(placement.rotation, Rotation::Clockwise90);
        assert_eq!(placement.fit, FitAxis::Width);
        assert_eq!(placement.scale.x, 1.0);
        assert!((placement.scale.y - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn test_matching_aspect_fills_surface() {
        let placement = resolve(&VideoTransform::ROTATE_180, 2.0, 2.0);
        assert_eq!(placement.rotation, Rotation::UpsideDown);
        assert_eq!(placement.scale, Vec2::ONE);
        assert_eq!(placement.fit, FitAxis::Width);
    }

    #[test]
    fn test_reflection_sets_mirror() {
        let flipped = VideoTransform::linear(-1.0, 0.0, 0.0, 1.0);
        let placement = resolve(&flipped, 1.0, 1.0);
        assert!(placement.mirror.horizontal);
        assert_eq!(placement.rotation, Rotation::Up);
    }

    #[test]
    fn test_invalid_aspect_keeps_rotation() {
        let placement = resolve(&VideoTransform::ROTATE_CCW_90, 0.0, f32::NAN);
        assert_eq!(placement.rotation, Rotation::CounterClockwise90);
        assert_eq!(placement.scale, Vec2::ONE);
    }

    #[test]
    fn test_rotation_angles() {
        assert_eq!(Rotation::Clockwise90.degrees(), 90);
        assert_eq!(Rotation::Clockwise90.radians(), -FRAC_PI_2);
        assert_eq!(Rotation::CounterClockwise90.radians(), FRAC_PI_2);
        assert!(!Rotation::UpsideDown.is_quarter_turn());
    }

    #[test]
    fn test_fallback_local_transform_lays_plane_flat() {
        let transform = Placement::fallback().local_transform();
        // The plane's +Y axis ends up pointing along -Z once laid on the marker
        let up = transform.transform_vector3(Vec3::Y);
        assert!((up - Vec3::NEG_Z).length() < 1e-6);
    }
}
