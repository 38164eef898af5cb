//! Surface integrators: the light-transport clients of the intersection and
//! shading core. Only direct lighting with whitted-style specular splitting
//! lives in-tree; heavier transport belongs to embedders.

use std::sync::Arc;

use glam::Vec4;
use log::{error, info};

use crate::accelerator::Accelerator;
use crate::background::Background;
use crate::color::{Rgb, Rgba};
use crate::geometry::Ray;
use crate::light::Light;
use crate::material::BsdfFlags;
use crate::param::ParamMap;
use crate::render::scratch::{RenderData, Scratch};

/// Everything an integrator needs to shade one ray, shared read-only across
/// the worker pool.
pub struct RenderContext<'a> {
    pub accelerator: &'a dyn Accelerator,
    pub lights: &'a [Arc<dyn Light>],
    pub background: Option<&'a dyn Background>,
    pub shadow_bias: f32,
}

pub trait SurfaceIntegrator: Send + Sync + std::fmt::Debug {
    /// Radiance plus coverage alpha for one camera ray.
    fn integrate(&self, ctx: &RenderContext<'_>, ray: &Ray, data: &mut RenderData<'_>) -> Rgba;
}

// ============================================================================
// Direct lighting
// ============================================================================

#[derive(Debug)]
pub struct DirectLightIntegrator {
    transparent_shadows: bool,
    shadow_depth: u32,
    max_depth: u32,
}

impl DirectLightIntegrator {
    pub fn from_params(params: &ParamMap) -> Self {
        Self {
            transparent_shadows: params.bool_or("transparent_shadows", false),
            shadow_depth: params.int_or("shadow_depth", 5).max(0) as u32,
            max_depth: params.int_or("raydepth", 5).max(0) as u32,
        }
    }
}

impl SurfaceIntegrator for DirectLightIntegrator {
    fn integrate(&self, ctx: &RenderContext<'_>, ray: &Ray, data: &mut RenderData<'_>) -> Rgba {
        let Some((mut sp, _t)) = ctx.accelerator.closest_hit(ray) else {
            let bg = ctx
                .background
                .map_or(Rgb::ZERO, |background| background.eval(ray.dir));
            return Vec4::new(bg.x, bg.y, bg.z, 0.0);
        };

        let wo = -ray.dir;
        let material = sp.material;
        let flags = material.init_bsdf(data, &mut sp);
        let mut color = material.emit(data, &sp, wo);

        if flags.intersects(BsdfFlags::DIFFUSE) {
            for light in ctx.lights {
                let Some(sample) = light.illuminate(sp.p) else {
                    continue;
                };
                let mut shadow_ray = Ray::new(sp.p, sample.dir);
                shadow_ray.tmin = ctx.shadow_bias;
                shadow_ray.tmax = sample.dist;
                shadow_ray.time = data.time;
                shadow_ray.depth = ray.depth;

                let (blocked, filter) = if self.transparent_shadows {
                    ctx.accelerator.is_shadowed_transparent(
                        &shadow_ray,
                        self.shadow_depth,
                        ctx.shadow_bias,
                        data.time,
                    )
                } else {
                    (
                        ctx.accelerator.is_shadowed(&shadow_ray, ctx.shadow_bias),
                        Rgb::ONE,
                    )
                };
                if !blocked {
                    let surface =
                        material.eval(data, &sp, wo, sample.dir, BsdfFlags::ALL);
                    color += surface * sample.color * filter * sample.dir.dot(sp.n).abs();
                }
            }
        }

        // Specular splitting last: the recursion below reuses its own scratch
        // but the surface point and cached lobes above must not be needed
        // again afterwards.
        if ray.depth < self.max_depth && flags.intersects(BsdfFlags::SPECULAR) {
            let branches = material.specular(data, &sp, wo);
            for branch in [branches.reflect, branches.refract].into_iter().flatten() {
                let mut sub_ray = Ray::new(sp.p, branch.dir);
                sub_ray.tmin = ctx.shadow_bias;
                sub_ray.time = data.time;
                sub_ray.depth = ray.depth + 1;
                let mut child_scratch = Scratch::default();
                let mut child = RenderData::new(&mut child_scratch);
                child.time = data.time;
                child.ray_depth = ray.depth + 1;
                let sub = self.integrate(ctx, &sub_ray, &mut child);
                color += branch.color * Rgb::new(sub.x, sub.y, sub.z);
            }
        }

        let alpha = material.alpha(data, &sp, wo);
        Vec4::new(color.x, color.y, color.z, alpha)
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates an integrator from configuration. Unknown types fail with `None`.
pub fn create_integrator(name: &str, params: &ParamMap) -> Option<Arc<dyn SurfaceIntegrator>> {
    let type_name = params.str_or("type", "directlighting");
    let integrator: Arc<dyn SurfaceIntegrator> = match type_name {
        "directlighting" => Arc::new(DirectLightIntegrator::from_params(params)),
        other => {
            error!("Integrator type '{other}' could not be created ('{name}')");
            return None;
        }
    };
    info!("Integrator type '{type_name}' created ('{name}')");
    Some(integrator)
}
