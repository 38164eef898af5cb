//! Brute-force accelerator: tests every primitive against every ray.
//!
//! Useless for real scenes, invaluable as the ground-truth oracle the k-d
//! tree is validated against.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::accelerator::{Accelerator, IntersectData, TransparentShadow};
use crate::color::{Rgb, luminance};
use crate::geometry::{Bound, Primitive, Ray};
use crate::render::scratch::RenderData;

pub struct SimpleTestAccelerator {
    prims: Vec<Arc<dyn Primitive>>,
    bound: Bound,
}

impl SimpleTestAccelerator {
    pub fn new(prims: Vec<Arc<dyn Primitive>>) -> Self {
        let bound = prims
            .iter()
            .fold(Bound::EMPTY, |acc, p| acc.union(&p.bound()));
        Self { prims, bound }
    }
}

impl Accelerator for SimpleTestAccelerator {
    fn intersect(&self, ray: &Ray, t_max: f32) -> Option<IntersectData<'_>> {
        let mut best: Option<IntersectData<'_>> = None;
        let mut t_best = t_max;
        for prim in &self.prims {
            if let Some(hit) = prim.intersect(ray) {
                if hit.t >= ray.tmin && hit.t < t_best {
                    t_best = hit.t;
                    best = Some(IntersectData {
                        t: hit.t,
                        primitive: prim.as_ref(),
                        u: hit.u,
                        v: hit.v,
                    });
                }
            }
        }
        best
    }

    fn intersect_any(&self, ray: &Ray, t_max: f32, shadow_bias: f32) -> Option<IntersectData<'_>> {
        let t_min = ray.tmin.max(shadow_bias);
        for prim in &self.prims {
            if let Some(hit) = prim.intersect(ray) {
                if hit.t > t_min && hit.t <= t_max {
                    return Some(IntersectData {
                        t: hit.t,
                        primitive: prim.as_ref(),
                        u: hit.u,
                        v: hit.v,
                    });
                }
            }
        }
        None
    }

    fn intersect_transparent(
        &self,
        ray: &Ray,
        t_max: f32,
        max_depth: u32,
        shadow_bias: f32,
        data: &mut RenderData<'_>,
    ) -> TransparentShadow<'_> {
        let t_min = ray.tmin.max(shadow_bias);
        let wo = -ray.dir;
        let mut filter = Rgb::ONE;
        let mut depth = 0u32;
        let mut counted: SmallVec<[usize; 16]> = SmallVec::new();

        for (pi, prim) in self.prims.iter().enumerate() {
            let Some(hit) = prim.intersect(ray) else {
                continue;
            };
            if hit.t <= t_min || hit.t > t_max {
                continue;
            }
            let blocked = IntersectData {
                t: hit.t,
                primitive: prim.as_ref(),
                u: hit.u,
                v: hit.v,
            };
            if !prim.material().is_transparent() {
                return TransparentShadow {
                    hit: Some(blocked),
                    filter,
                };
            }
            if counted.contains(&pi) {
                continue;
            }
            counted.push(pi);
            if depth >= max_depth {
                return TransparentShadow {
                    hit: Some(blocked),
                    filter,
                };
            }
            let sp = prim.surface(ray.point_at(hit.t), &hit);
            filter *= sp.material.transparency(data, &sp, wo);
            depth += 1;
            if luminance(filter) < 1e-5 {
                return TransparentShadow {
                    hit: Some(blocked),
                    filter,
                };
            }
        }
        TransparentShadow { hit: None, filter }
    }

    fn bound(&self) -> Bound {
        self.bound
    }
}
