//! Primitives: the abstract intersectable handle plus the triangle-face and
//! instance implementations.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, vec2};
use log::warn;

use crate::geometry::bound::Bound;
use crate::geometry::object::MeshObject;
use crate::geometry::ray::Ray;
use crate::geometry::surface::{SurfacePoint, create_cs};
use crate::material::Material;

/// Raw intersection record: the ray parameter plus the barycentric
/// coordinates needed to reconstruct the full surface point later.
#[derive(Clone, Copy, Debug)]
pub struct Hit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

/// An intersectable scene primitive.
///
/// Implementations are immutable during rendering and shared by reference
/// between the scene and the acceleration structure.
pub trait Primitive: Send + Sync {
    /// World-space bounding box.
    fn bound(&self) -> Bound;

    /// Nearest intersection with `ray`, unclipped; callers apply the
    /// `[tmin, tmax]` window.
    fn intersect(&self, ray: &Ray) -> Option<Hit>;

    /// Reconstructs the full surface point for a hit previously returned by
    /// [`Primitive::intersect`].
    fn surface(&self, hit_point: Vec3, hit: &Hit) -> SurfacePoint<'_>;

    fn material(&self) -> &dyn Material;

    /// Dense index of the object this primitive belongs to.
    fn object_index(&self) -> u32;
}

// ============================================================================
// Triangle face
// ============================================================================

/// A single triangle indexing into its mesh's pools.
pub struct FacePrimitive {
    mesh: Arc<MeshObject>,
    face: u32,
    material: Arc<dyn Material>,
}

impl FacePrimitive {
    pub fn new(mesh: Arc<MeshObject>, face: u32, material: Arc<dyn Material>) -> Self {
        Self {
            mesh,
            face,
            material,
        }
    }
}

const MT_DET_EPSILON: f32 = 1e-10;

/// Möller–Trumbore ray/triangle intersection, double-sided.
#[inline]
pub(crate) fn intersect_triangle(a: Vec3, b: Vec3, c: Vec3, ray: &Ray) -> Option<Hit> {
    let e1 = b - a;
    let e2 = c - a;
    let pvec = ray.dir.cross(e2);
    let det = e1.dot(pvec);
    if det.abs() < MT_DET_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let tvec = ray.from - a;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(e1);
    let v = ray.dir.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(qvec) * inv_det;
    (t > 0.0).then_some(Hit { t, u, v })
}

impl Primitive for FacePrimitive {
    fn bound(&self) -> Bound {
        Bound::from_points(self.mesh.corners(self.face))
    }

    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        let [a, b, c] = self.mesh.corners(self.face);
        intersect_triangle(a, b, c, ray)
    }

    fn surface(&self, hit_point: Vec3, hit: &Hit) -> SurfacePoint<'_> {
        let mesh = &*self.mesh;
        let face = &mesh.faces[self.face as usize];
        let [a, b, c] = mesh.corners(self.face);
        let w = 1.0 - hit.u - hit.v;

        let ng = mesh.face_normal_raw(self.face).normalize_or_zero();
        let n = match face.normals {
            Some(ni) => {
                let na = mesh.normals[ni[0] as usize];
                let nb = mesh.normals[ni[1] as usize];
                let nc = mesh.normals[ni[2] as usize];
                (na * w + nb * hit.u + nc * hit.v).normalize_or_zero()
            }
            None => ng,
        };
        let n = if n == Vec3::ZERO { ng } else { n };

        let (u, v, frame) = match face.uvs {
            Some(ti) => {
                let ta = mesh.uvs[ti[0] as usize];
                let tb = mesh.uvs[ti[1] as usize];
                let tc = mesh.uvs[ti[2] as usize];
                let uv = ta * w + tb * hit.u + tc * hit.v;
                (uv.x, uv.y, tangent_from_uvs(a, b, c, ta, tb, tc, n))
            }
            None => (hit.u, hit.v, None),
        };
        let (nu, nv) = frame.unwrap_or_else(|| create_cs(n));

        SurfacePoint {
            p: hit_point,
            ng,
            n,
            nu,
            nv,
            u,
            v,
            bary: vec2(hit.u, hit.v),
            primitive: self,
            material: self.material.as_ref(),
            ray_diff: None,
        }
    }

    fn material(&self) -> &dyn Material {
        self.material.as_ref()
    }

    fn object_index(&self) -> u32 {
        self.mesh.index
    }
}

/// Tangent frame aligned with the UV parameterization, orthonormalized
/// against the shading normal. `None` when the parameterization degenerates.
fn tangent_from_uvs(
    a: Vec3,
    b: Vec3,
    c: Vec3,
    ta: Vec2,
    tb: Vec2,
    tc: Vec2,
    n: Vec3,
) -> Option<(Vec3, Vec3)> {
    let duv1 = tb - ta;
    let duv2 = tc - ta;
    let det = duv1.x * duv2.y - duv1.y * duv2.x;
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let dp1 = b - a;
    let dp2 = c - a;
    let tangent = (dp1 * duv2.y - dp2 * duv1.y) * inv_det;
    let nu = (tangent - n * n.dot(tangent)).normalize_or_zero();
    if nu == Vec3::ZERO {
        return None;
    }
    Some((nu, n.cross(nu)))
}

// ============================================================================
// Instance
// ============================================================================

/// A base primitive composed with an object-to-world transform.
pub struct InstancePrimitive {
    base: Arc<dyn Primitive>,
    obj_to_world: Mat4,
    world_to_obj: Mat4,
}

impl InstancePrimitive {
    pub fn new(base: Arc<dyn Primitive>, obj_to_world: Mat4) -> Self {
        let world_to_obj = if obj_to_world.determinant().abs() < 1e-12 {
            warn!("Instance transform is singular, falling back to identity");
            Mat4::IDENTITY
        } else {
            obj_to_world.inverse()
        };
        Self {
            base,
            obj_to_world,
            world_to_obj,
        }
    }

    /// The ray expressed in object space. The direction is deliberately not
    /// renormalized so hit parameters stay valid in world space.
    fn object_ray(&self, ray: &Ray) -> Ray {
        let mut object_ray = *ray;
        object_ray.from = self.world_to_obj.transform_point3(ray.from);
        object_ray.dir = self.world_to_obj.transform_vector3(ray.dir);
        object_ray
    }
}

impl Primitive for InstancePrimitive {
    fn bound(&self) -> Bound {
        let b = self.base.bound();
        let mut out = Bound::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { b.min.x } else { b.max.x },
                if i & 2 == 0 { b.min.y } else { b.max.y },
                if i & 4 == 0 { b.min.z } else { b.max.z },
            );
            out.grow(self.obj_to_world.transform_point3(corner));
        }
        out
    }

    fn intersect(&self, ray: &Ray) -> Option<Hit> {
        self.base.intersect(&self.object_ray(ray))
    }

    fn surface(&self, hit_point: Vec3, hit: &Hit) -> SurfacePoint<'_> {
        let object_point = self.world_to_obj.transform_point3(hit_point);
        let mut sp = self.base.surface(object_point, hit);
        // Normals transform by the inverse transpose and are renormalized.
        let normal_mat = self.world_to_obj.transpose();
        sp.p = hit_point;
        sp.ng = normal_mat.transform_vector3(sp.ng).normalize_or_zero();
        sp.n = normal_mat.transform_vector3(sp.n).normalize_or_zero();
        sp.nu = self
            .obj_to_world
            .transform_vector3(sp.nu)
            .normalize_or_zero();
        sp.nv = self
            .obj_to_world
            .transform_vector3(sp.nv)
            .normalize_or_zero();
        sp.primitive = self;
        sp
    }

    fn material(&self) -> &dyn Material {
        self.base.material()
    }

    fn object_index(&self) -> u32 {
        self.base.object_index()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec3;

    #[test]
    fn triangle_hit_and_barycentrics() {
        let a = vec3(0.0, 0.0, 0.0);
        let b = vec3(1.0, 0.0, 0.0);
        let c = vec3(0.0, 1.0, 0.0);
        let ray = Ray::new(vec3(0.25, 0.25, 1.0), -Vec3::Z);
        let hit = intersect_triangle(a, b, c, &ray).expect("hit");
        assert!((hit.t - 1.0).abs() < 1e-6);
        assert!((hit.u - 0.25).abs() < 1e-6);
        assert!((hit.v - 0.25).abs() < 1e-6);
    }

    #[test]
    fn triangle_double_sided() {
        let a = vec3(0.0, 0.0, 0.0);
        let b = vec3(1.0, 0.0, 0.0);
        let c = vec3(0.0, 1.0, 0.0);
        let from_below = Ray::new(vec3(0.25, 0.25, -1.0), Vec3::Z);
        assert!(intersect_triangle(a, b, c, &from_below).is_some());
    }

    #[test]
    fn triangle_miss_outside() {
        let a = vec3(0.0, 0.0, 0.0);
        let b = vec3(1.0, 0.0, 0.0);
        let c = vec3(0.0, 1.0, 0.0);
        let ray = Ray::new(vec3(0.9, 0.9, 1.0), -Vec3::Z);
        assert!(intersect_triangle(a, b, c, &ray).is_none());
    }
}
