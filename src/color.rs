//! Linear color helpers shared by materials, lights and the film.

use glam::{Vec3, Vec4, vec3};

/// Linear RGB radiance/reflectance value.
pub type Rgb = Vec3;

/// Linear RGBA sample as accumulated on the film.
pub type Rgba = Vec4;

/// Rec.709 luminance of a linear RGB value.
#[inline]
pub fn luminance(c: Rgb) -> f32 {
    c.dot(vec3(0.212_671, 0.715_160, 0.072_169))
}

/// Linear interpolation between two colors.
#[inline]
pub fn mix(a: Rgb, b: Rgb, t: f32) -> Rgb {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_is_normalized() {
        assert!((luminance(Rgb::ONE) - 1.0).abs() < 1e-5);
        assert_eq!(luminance(Rgb::ZERO), 0.0);
    }
}
