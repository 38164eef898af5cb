//! Surface points: the value object produced by intersection and consumed by
//! shading.

use glam::{Vec2, Vec3};

use crate::geometry::primitive::Primitive;
use crate::geometry::ray::DiffRay;
use crate::material::Material;

/// Everything shading needs to know about a hit point.
///
/// `ng` and `n` are unit vectors. Their orientation is NOT flipped to face the
/// incident ray; callers that need a forward-facing shading normal apply
/// [`normal_face_forward`] themselves.
#[derive(Clone, Copy)]
pub struct SurfacePoint<'a> {
    /// World-space hit position.
    pub p: Vec3,
    /// Geometric normal.
    pub ng: Vec3,
    /// Shading normal (interpolated, possibly bump-perturbed).
    pub n: Vec3,
    /// First tangent of the orthonormal shading frame.
    pub nu: Vec3,
    /// Second tangent of the orthonormal shading frame.
    pub nv: Vec3,
    /// Parametric surface coordinates.
    pub u: f32,
    pub v: f32,
    /// Barycentric coordinates within the hit face.
    pub bary: Vec2,
    pub primitive: &'a dyn Primitive,
    pub material: &'a dyn Material,
    /// The differential ray that produced this point, when available.
    pub ray_diff: Option<&'a DiffRay>,
}

/// Orients the shading normal `n` to the side of the geometric normal `ng`
/// that faces `wo`: `n · sign(ng · wo)`.
#[inline]
pub fn normal_face_forward(ng: Vec3, n: Vec3, wo: Vec3) -> Vec3 {
    if ng.dot(wo) < 0.0 { -n } else { n }
}

/// Builds an arbitrary orthonormal tangent basis around a unit normal.
///
/// Used when a mesh has no UV parameterization to derive tangents from.
pub fn create_cs(n: Vec3) -> (Vec3, Vec3) {
    let nu = if n.x.abs() > n.y.abs() {
        Vec3::new(-n.z, 0.0, n.x).normalize()
    } else {
        Vec3::new(0.0, n.z, -n.y).normalize()
    };
    (nu, nu.cross(n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn face_forward_flips_against_backside() {
        let ng = Vec3::Z;
        let n = vec3(0.1, 0.0, 1.0).normalize();
        let wo_front = vec3(0.3, 0.2, 1.0).normalize();
        let wo_back = -wo_front;
        assert_eq!(normal_face_forward(ng, n, wo_front), n);
        assert_eq!(normal_face_forward(ng, n, wo_back), -n);
    }

    #[test]
    fn face_forward_fixes_the_sign_from_ng() {
        let ng = vec3(0.2, -0.3, 0.9).normalize();
        let n = vec3(0.1, -0.2, 1.0).normalize();

        // Front side: the input passes through, so reapplying is a no-op.
        let wo = vec3(0.3, -0.1, 0.8).normalize();
        assert!(ng.dot(wo) > 0.0);
        let once = normal_face_forward(ng, n, wo);
        assert_eq!(once, n);
        assert_eq!(normal_face_forward(ng, once, wo), once);

        // Back side: the sign comes from `ng·wo` alone, so the function
        // negates whatever it is given and double application flips back.
        let wo = vec3(-0.4, 0.8, -0.5).normalize();
        assert!(ng.dot(wo) < 0.0);
        let once = normal_face_forward(ng, n, wo);
        assert_eq!(once, -n);
        assert_eq!(normal_face_forward(ng, once, wo), n);
    }

    #[test]
    fn create_cs_is_orthonormal() {
        for n in [Vec3::X, Vec3::Y, Vec3::Z, vec3(0.3, -0.5, 0.8).normalize()] {
            let (nu, nv) = create_cs(n);
            assert!(nu.dot(n).abs() < 1e-6);
            assert!(nv.dot(n).abs() < 1e-6);
            assert!(nu.dot(nv).abs() < 1e-6);
            assert!((nu.length() - 1.0).abs() < 1e-5);
            assert!((nv.length() - 1.0).abs() < 1e-5);
        }
    }
}
