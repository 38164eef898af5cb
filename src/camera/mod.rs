//! Cameras generating primary rays.

use std::sync::Arc;

use glam::{Mat3, Vec3};
use log::{info, warn};

use crate::geometry::Ray;
use crate::param::ParamMap;

pub trait Camera: Send + Sync + std::fmt::Debug {
    /// Primary ray through film coordinates `(px, py)` in pixels; fractional
    /// offsets select the sub-pixel position.
    fn shoot_ray(&self, px: f32, py: f32) -> Ray;

    fn resolution(&self) -> (u32, u32);
}

// ============================================================================
// Perspective camera
// ============================================================================

/// Pinhole perspective camera.
#[derive(Debug)]
pub struct PerspectiveCamera {
    from: Vec3,
    /// Camera-to-world rotation; looks down -Z in camera space.
    basis: Mat3,
    fov_factor: f32,
    width: u32,
    height: u32,
}

impl PerspectiveCamera {
    pub fn new(from: Vec3, to: Vec3, up: Vec3, fov_deg: f32, width: u32, height: u32) -> Self {
        let z_axis = (from - to).normalize_or_zero();
        let z_axis = if z_axis == Vec3::ZERO { Vec3::Z } else { z_axis };
        let x_axis = up.cross(z_axis).normalize_or_zero();
        let x_axis = if x_axis == Vec3::ZERO { Vec3::X } else { x_axis };
        let y_axis = z_axis.cross(x_axis);
        Self {
            from,
            basis: Mat3::from_cols(x_axis, y_axis, z_axis),
            fov_factor: (fov_deg * 0.5).to_radians().tan(),
            width,
            height,
        }
    }
}

impl Camera for PerspectiveCamera {
    fn shoot_ray(&self, px: f32, py: f32) -> Ray {
        let aspect = self.width as f32 / self.height as f32;
        let ndc_x = px / self.width as f32;
        let ndc_y = py / self.height as f32;
        let cx = (2.0 * ndc_x - 1.0) * self.fov_factor * aspect;
        let cy = (1.0 - 2.0 * ndc_y) * self.fov_factor;
        let dir = self.basis * Vec3::new(cx, cy, -1.0);
        Ray::new(self.from, dir.normalize())
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates a camera from configuration. Unknown types warn and yield `None`.
pub fn create_camera(name: &str, params: &ParamMap) -> Option<Arc<dyn Camera>> {
    let type_name = params.str_or("type", "perspective");
    let camera: Arc<dyn Camera> = match type_name {
        "perspective" => Arc::new(PerspectiveCamera::new(
            params.vector_or("from", Vec3::Z),
            params.vector_or("to", Vec3::ZERO),
            params.vector_or("up", Vec3::Y),
            params.float_or("fov", 45.0),
            params.int_or("resx", 512).max(1) as u32,
            params.int_or("resy", 512).max(1) as u32,
        )),
        other => {
            warn!("Camera type '{other}' could not be created ('{name}')");
            return None;
        }
    };
    info!("Camera type '{type_name}' created ('{name}')");
    Some(camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn center_ray_points_at_target() {
        let cam = PerspectiveCamera::new(vec3(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y, 45.0, 100, 100);
        let ray = cam.shoot_ray(50.0, 50.0);
        assert!((ray.dir - -Vec3::Z).length() < 1e-5);
        assert_eq!(ray.from, vec3(0.0, 0.0, 5.0));
    }

    #[test]
    fn corner_rays_diverge() {
        let cam = PerspectiveCamera::new(Vec3::ZERO, -Vec3::Z, Vec3::Y, 90.0, 64, 64);
        let left = cam.shoot_ray(0.0, 32.0);
        let right = cam.shoot_ray(64.0, 32.0);
        assert!(left.dir.x < 0.0);
        assert!(right.dir.x > 0.0);
    }
}
