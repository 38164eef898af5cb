//! Light sources sampled by the integrator.

use std::sync::Arc;

use glam::Vec3;
use log::{info, warn};

use crate::color::Rgb;
use crate::param::ParamMap;

/// One illumination sample toward a light.
#[derive(Clone, Copy, Debug)]
pub struct LightSample {
    /// Unit direction from the shading point toward the light.
    pub dir: Vec3,
    /// Distance to the light, the shadow ray's reach.
    pub dist: f32,
    /// Incident radiance along `dir`.
    pub color: Rgb,
}

pub trait Light: Send + Sync + std::fmt::Debug {
    /// Illumination arriving at `p`, or `None` when the light cannot reach it.
    fn illuminate(&self, p: Vec3) -> Option<LightSample>;
}

// ============================================================================
// Point light
// ============================================================================

/// Isotropic point emitter with inverse-square falloff.
#[derive(Debug)]
pub struct PointLight {
    position: Vec3,
    /// Color pre-scaled by power.
    intensity: Rgb,
}

impl PointLight {
    pub fn new(position: Vec3, color: Rgb, power: f32) -> Self {
        Self {
            position,
            intensity: color * power,
        }
    }
}

impl Light for PointLight {
    fn illuminate(&self, p: Vec3) -> Option<LightSample> {
        let to_light = self.position - p;
        let dist_squared = to_light.length_squared();
        if dist_squared <= 0.0 {
            return None;
        }
        let dist = dist_squared.sqrt();
        Some(LightSample {
            dir: to_light / dist,
            dist,
            color: self.intensity / dist_squared,
        })
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates a light from configuration. Unknown types warn and yield `None`.
pub fn create_light(name: &str, params: &ParamMap) -> Option<Arc<dyn Light>> {
    let type_name = params.str_or("type", "point");
    let light: Arc<dyn Light> = match type_name {
        "point" => Arc::new(PointLight::new(
            params.vector_or("from", Vec3::ZERO),
            params.color_or("color", Rgb::ONE),
            params.float_or("power", 1.0),
        )),
        other => {
            warn!("Light type '{other}' could not be created ('{name}')");
            return None;
        }
    };
    info!("Light type '{type_name}' created ('{name}')");
    Some(light)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn point_light_inverse_square() {
        let light = PointLight::new(vec3(0.0, 2.0, 0.0), Rgb::ONE, 4.0);
        let sample = light.illuminate(Vec3::ZERO).unwrap();
        assert!((sample.dist - 2.0).abs() < 1e-6);
        assert!((sample.dir - Vec3::Y).length() < 1e-6);
        assert!((sample.color.x - 1.0).abs() < 1e-5);
    }
}
