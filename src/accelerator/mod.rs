//! Ray-scene intersection acceleration.
//!
//! Accelerators are built once over the scene's primitive list and queried
//! lock-free from every render thread. Three query modes exist: closest hit,
//! early-exit shadow, and transparency-accumulating shadow.

pub mod kdtree;
pub mod simple_test;

pub use kdtree::KdTreeAccelerator;
pub use simple_test::SimpleTestAccelerator;

use std::sync::Arc;

use log::{info, warn};

use crate::color::Rgb;
use crate::geometry::{Bound, DiffRay, Hit, Primitive, Ray, SurfacePoint};
use crate::param::ParamMap;
use crate::render::scratch::{RenderData, Scratch};

/// Result of a closest-hit or any-hit query.
#[derive(Clone, Copy)]
pub struct IntersectData<'a> {
    pub t: f32,
    pub primitive: &'a dyn Primitive,
    /// Barycentric hit coordinates, for surface reconstruction.
    pub u: f32,
    pub v: f32,
}

/// Result of a transparent-shadow query: the accumulated filter color and,
/// when the path was blocked, the blocking hit.
pub struct TransparentShadow<'a> {
    pub hit: Option<IntersectData<'a>>,
    pub filter: Rgb,
}

/// A spatial acceleration structure over scene primitives.
///
/// Implementations hold shared references to the primitives; the scene keeps
/// ownership. All queries are `&self` and safe to issue concurrently.
pub trait Accelerator: Send + Sync {
    /// Closest hit within `[ray.tmin, t_max]`.
    fn intersect(&self, ray: &Ray, t_max: f32) -> Option<IntersectData<'_>>;

    /// First hit within `(shadow_bias, t_max)`, early-exit.
    fn intersect_any(&self, ray: &Ray, t_max: f32, shadow_bias: f32) -> Option<IntersectData<'_>>;

    /// Shadow query that passes through transparent materials, multiplying
    /// the filter color per hit, up to `max_depth` transparent hits.
    fn intersect_transparent(
        &self,
        ray: &Ray,
        t_max: f32,
        max_depth: u32,
        shadow_bias: f32,
        data: &mut RenderData<'_>,
    ) -> TransparentShadow<'_>;

    /// World bound of the indexed primitives.
    fn bound(&self) -> Bound;

    // ------------------------------------------------------------------
    // Wrapper queries used by integrators
    // ------------------------------------------------------------------

    /// Closest hit with the full surface point reconstructed. Returns the hit
    /// parameter alongside so callers can clip follow-up rays.
    fn closest_hit(&self, ray: &Ray) -> Option<(SurfacePoint<'_>, f32)> {
        if ray.tmin > ray.t_max() {
            return None;
        }
        let data = self.intersect(ray, ray.t_max())?;
        let hit_point = ray.point_at(data.t);
        let hit = Hit {
            t: data.t,
            u: data.u,
            v: data.v,
        };
        Some((data.primitive.surface(hit_point, &hit), data.t))
    }

    /// [`Accelerator::closest_hit`] for a differential ray; the surface point
    /// keeps a reference to it for texture footprint estimation.
    fn closest_hit_diff<'a>(&'a self, ray: &'a DiffRay) -> Option<(SurfacePoint<'a>, f32)> {
        let (mut sp, t) = self.closest_hit(&ray.ray)?;
        sp.ray_diff = Some(ray);
        Some((sp, t))
    }

    /// Opaque shadow test. The ray origin is advanced by `tmin` along the
    /// direction and `t_max` trimmed by `2·tmin`; the trim is asymmetric near
    /// `t_max` but preserved as reference behavior.
    fn is_shadowed(&self, ray: &Ray, shadow_bias: f32) -> bool {
        let mut sray = *ray;
        sray.from += sray.dir * sray.tmin;
        let t_max = if ray.tmax >= 0.0 {
            sray.tmax - 2.0 * sray.tmin
        } else {
            f32::INFINITY
        };
        self.intersect_any(&sray, t_max, shadow_bias).is_some()
    }

    /// Transparent shadow test. Returns whether the path is blocked and the
    /// accumulated filter color. The nested query runs on its own scratch.
    fn is_shadowed_transparent(
        &self,
        ray: &Ray,
        max_depth: u32,
        shadow_bias: f32,
        time: f32,
    ) -> (bool, Rgb) {
        let mut sray = *ray;
        sray.from += sray.dir * sray.tmin;
        let t_max = if ray.tmax >= 0.0 {
            sray.tmax - 2.0 * sray.tmin
        } else {
            f32::INFINITY
        };
        let mut scratch = Scratch::default();
        let mut data = RenderData::new(&mut scratch);
        data.time = time;
        data.ray_depth = ray.depth;
        let shadow = self.intersect_transparent(&sray, t_max, max_depth, shadow_bias, &mut data);
        (shadow.hit.is_some(), shadow.filter)
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates an accelerator from configuration. Unknown types warn and fall
/// back to the single-threaded k-d tree.
pub fn create_accelerator(
    primitives: Vec<Arc<dyn Primitive>>,
    params: &ParamMap,
) -> Box<dyn Accelerator> {
    let type_name = params.str_or("type", "kdtree");
    match type_name {
        "kdtree" => {
            info!("Accelerator type '{type_name}' created.");
            Box::new(KdTreeAccelerator::new(primitives, params, false))
        }
        "kdtree-multi-thread" => {
            info!("Accelerator type '{type_name}' created.");
            Box::new(KdTreeAccelerator::new(primitives, params, true))
        }
        "simpletest" => {
            info!("Accelerator type '{type_name}' created.");
            Box::new(SimpleTestAccelerator::new(primitives))
        }
        other => {
            warn!(
                "Accelerator type '{other}' could not be created, using standard single-thread KdTree instead."
            );
            Box::new(KdTreeAccelerator::new(primitives, params, false))
        }
    }
}
