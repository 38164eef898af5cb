//! Shiny-diffuse material: four lobes (specular mirror, specular transparent,
//! diffuse translucent, diffuse reflective) sharing one surface point.
//!
//! Per hit, each lobe claims a fraction of the light not already claimed by
//! the lobes before it, with the mirror share coupled through a dielectric
//! Fresnel term. Lobe strengths, colors, the IOR and the bump offset can all
//! be driven by shader nodes.

use std::f32::consts::FRAC_1_PI;

use glam::Vec3;

use crate::color::{Rgb, mix};
use crate::errors::Result;
use crate::geometry::{SurfacePoint, normal_face_forward};
use crate::material::sample::{cos_hemisphere, fresnel_dielectric, reflect_dir};
use crate::material::{
    BsdfFlags, BsdfSample, Material, SampleResult, SpecularBranches, SpecularRay,
};
use crate::param::{ParamList, ParamMap};
use crate::render::scratch::RenderData;
use crate::shader::{NodeId, NodeStack, ShaderGraph, bind_shader};
use crate::texture::TextureResolver;

/// Lobe strengths below this never register a component.
const COMPONENT_MIN: f32 = 1e-5;

/// Precomputed Oren–Nayar coefficients.
#[derive(Clone, Copy, Debug)]
struct OrenNayar {
    a: f32,
    b: f32,
}

impl OrenNayar {
    fn from_sigma(sigma: f64) -> Self {
        let sigma_squared = sigma * sigma;
        Self {
            a: (1.0 - 0.5 * (sigma_squared / (sigma_squared + 0.33))) as f32,
            b: (0.45 * sigma_squared / (sigma_squared + 0.09)) as f32,
        }
    }
}

/// Optional shader-node bindings. Unbound parameters use their static values.
#[derive(Debug, Default)]
struct Bindings {
    diffuse: Option<NodeId>,
    mirror_color: Option<NodeId>,
    mirror: Option<NodeId>,
    transparency: Option<NodeId>,
    translucency: Option<NodeId>,
    sigma_oren: Option<NodeId>,
    diffuse_refl: Option<NodeId>,
    ior: Option<NodeId>,
    wireframe: Option<NodeId>,
    bump: Option<NodeId>,
}

#[derive(Debug)]
pub struct ShinyDiffuseMaterial {
    diffuse_color: Rgb,
    mirror_color: Rgb,
    emit_color: Rgb,
    emit_strength: f32,
    diffuse_strength: f32,
    transparency_strength: f32,
    translucency_strength: f32,
    mirror_strength: f32,
    /// Mix between filtered (diffuse-tinted) and untinted transmission.
    transmit_filter_strength: f32,
    fresnel_effect: bool,
    ior: f32,
    ior_squared: f32,
    oren_nayar: Option<OrenNayar>,

    flags: BsdfFlags,
    /// Registered lobes in claim order, with their component index.
    n_lobes: usize,
    lobe_flags: [BsdfFlags; 4],
    lobe_index: [usize; 4],
    is_mirror: bool,
    is_transparent: bool,
    is_translucent: bool,
    is_diffuse: bool,

    graph: ShaderGraph,
    bindings: Bindings,

    wireframe_amount: f32,
    wireframe_thickness: f32,
    wireframe_exponent: f32,
    wireframe_color: Rgb,
}

impl ShinyDiffuseMaterial {
    /// A plain opaque diffuse reflector, also the factory's fallback.
    pub fn opaque_diffuse(color: Rgb) -> Self {
        let mut material = Self::base(color, Rgb::ONE, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        material.configure();
        material
    }

    #[allow(clippy::too_many_arguments)]
    fn base(
        diffuse_color: Rgb,
        mirror_color: Rgb,
        diffuse_strength: f32,
        transparency_strength: f32,
        translucency_strength: f32,
        mirror_strength: f32,
        emit_strength: f32,
        transmit_filter_strength: f32,
    ) -> Self {
        let mut flags = BsdfFlags::empty();
        if emit_strength > 0.0 {
            flags |= BsdfFlags::EMIT;
        }
        Self {
            diffuse_color,
            mirror_color,
            emit_color: emit_strength * diffuse_color,
            emit_strength,
            diffuse_strength,
            transparency_strength,
            translucency_strength,
            mirror_strength,
            transmit_filter_strength,
            fresnel_effect: false,
            ior: 1.33,
            ior_squared: 1.33 * 1.33,
            oren_nayar: None,
            flags,
            n_lobes: 0,
            lobe_flags: [BsdfFlags::empty(); 4],
            lobe_index: [0; 4],
            is_mirror: false,
            is_transparent: false,
            is_translucent: false,
            is_diffuse: false,
            graph: ShaderGraph::default(),
            bindings: Bindings::default(),
            wireframe_amount: 0.0,
            wireframe_thickness: 0.01,
            wireframe_exponent: 0.0,
            wireframe_color: Rgb::ONE,
        }
    }

    /// Builds the material from configuration plus its shader-tree list.
    pub fn from_params(
        params: &ParamMap,
        node_list: &ParamList,
        textures: &dyn TextureResolver,
    ) -> Result<Self> {
        let mut material = Self::base(
            params.color_or("color", Rgb::ONE),
            params.color_or("mirror_color", Rgb::ONE),
            params.float_or("diffuse_reflect", 1.0),
            params.float_or("transparency", 0.0),
            params.float_or("translucency", 0.0),
            params.float_or("specular_reflect", 0.0),
            params.float_or("emit", 0.0),
            params.float_or("transmit_filter", 1.0),
        );

        if params.bool_or("fresnel_effect", false) {
            let ior = params.float_or("IOR", 1.33);
            material.fresnel_effect = true;
            material.ior = ior;
            material.ior_squared = ior * ior;
        }

        if params.get_str("diffuse_brdf") == Some("oren_nayar") {
            let sigma = f64::from(params.float_or("sigma", 0.1));
            material.oren_nayar = Some(OrenNayar::from_sigma(sigma));
        }

        material.wireframe_amount = params.float_or("wireframe_amount", 0.0);
        material.wireframe_thickness = params.float_or("wireframe_thickness", 0.01);
        material.wireframe_exponent = params.float_or("wireframe_exponent", 0.0);
        material.wireframe_color = params.color_or("wireframe_color", Rgb::ONE);

        let mut graph = ShaderGraph::from_params(node_list, textures)?;
        let bindings = Bindings {
            diffuse: bind_shader(&graph, params, "diffuse_shader"),
            mirror_color: bind_shader(&graph, params, "mirror_color_shader"),
            mirror: bind_shader(&graph, params, "mirror_shader"),
            transparency: bind_shader(&graph, params, "transparency_shader"),
            translucency: bind_shader(&graph, params, "translucency_shader"),
            sigma_oren: bind_shader(&graph, params, "sigma_oren_shader"),
            diffuse_refl: bind_shader(&graph, params, "diffuse_refl_shader"),
            ior: bind_shader(&graph, params, "IOR_shader"),
            wireframe: bind_shader(&graph, params, "wireframe_shader"),
            bump: bind_shader(&graph, params, "bump_shader"),
        };
        let roots: Vec<NodeId> = [
            bindings.diffuse,
            bindings.mirror_color,
            bindings.mirror,
            bindings.transparency,
            bindings.translucency,
            bindings.sigma_oren,
            bindings.diffuse_refl,
            bindings.ior,
            bindings.wireframe,
            bindings.bump,
        ]
        .into_iter()
        .flatten()
        .collect();
        graph.solve(&roots);
        material.graph = graph;
        material.bindings = bindings;

        material.configure();
        Ok(material)
    }

    /// Registers the active lobes in claim order. Must run before the
    /// material is used; the constructors take care of it.
    fn configure(&mut self) {
        self.n_lobes = 0;
        let mut acc = 1.0;
        if self.mirror_strength > COMPONENT_MIN || self.bindings.mirror.is_some() {
            self.is_mirror = true;
            if self.bindings.mirror.is_none() && !self.fresnel_effect {
                acc = 1.0 - self.mirror_strength;
            }
            self.flags |= BsdfFlags::SPECULAR_REFLECT;
            self.lobe_flags[self.n_lobes] = BsdfFlags::SPECULAR_REFLECT;
            self.lobe_index[self.n_lobes] = 0;
            self.n_lobes += 1;
        }
        if self.transparency_strength * acc > COMPONENT_MIN || self.bindings.transparency.is_some()
        {
            self.is_transparent = true;
            if self.bindings.transparency.is_none() {
                acc *= 1.0 - self.transparency_strength;
            }
            self.flags |= BsdfFlags::SPECULAR_TRANSMIT;
            self.lobe_flags[self.n_lobes] = BsdfFlags::SPECULAR_TRANSMIT;
            self.lobe_index[self.n_lobes] = 1;
            self.n_lobes += 1;
        }
        if self.translucency_strength * acc > COMPONENT_MIN || self.bindings.translucency.is_some()
        {
            self.is_translucent = true;
            if self.bindings.translucency.is_none() {
                acc *= 1.0 - self.translucency_strength;
            }
            self.flags |= BsdfFlags::TRANSLUCENCY;
            self.lobe_flags[self.n_lobes] = BsdfFlags::TRANSLUCENCY;
            self.lobe_index[self.n_lobes] = 2;
            self.n_lobes += 1;
        }
        if self.diffuse_strength * acc > COMPONENT_MIN {
            self.is_diffuse = true;
            self.flags |= BsdfFlags::DIFFUSE_REFLECT;
            self.lobe_flags[self.n_lobes] = BsdfFlags::DIFFUSE_REFLECT;
            self.lobe_index[self.n_lobes] = 3;
            self.n_lobes += 1;
        }
    }

    /// Raw per-hit lobe strengths: the bound shader value when a binding
    /// exists, the static strength otherwise. The diffuse strength is always
    /// static; `diffuse_refl_shader` modulates it in `eval` instead.
    fn components(&self, stack: &NodeStack) -> [f32; 4] {
        let fetch = |binding: Option<NodeId>, fallback: f32| {
            binding.map_or(fallback, |id| stack.scalar(id))
        };
        let mut c = [0.0; 4];
        if self.is_mirror {
            c[0] = fetch(self.bindings.mirror, self.mirror_strength);
        }
        if self.is_transparent {
            c[1] = fetch(self.bindings.transparency, self.transparency_strength);
        }
        if self.is_translucent {
            c[2] = fetch(self.bindings.translucency, self.translucency_strength);
        }
        if self.is_diffuse {
            c[3] = self.diffuse_strength;
        }
        c
    }

    /// Runs the view-dependent node suffix and refreshes the cached lobe
    /// strengths. Query entry points call this so shader-driven strengths
    /// stay current; with a node-free material it is a cheap copy.
    fn refresh(&self, data: &mut RenderData<'_>, sp: &SurfacePoint<'_>) {
        if self.graph.has_view_dependent() {
            self.graph.eval_view_dependent(&mut data.scratch.nodes, sp);
        }
        data.scratch.lobes = self.components(&data.scratch.nodes);
    }

    /// Fresnel reflectance multiplier, 1 when the effect is disabled. The
    /// IOR can be perturbed by a shader node.
    fn fresnel(&self, wo: Vec3, n: Vec3, stack: &NodeStack) -> f32 {
        if !self.fresnel_effect {
            return 1.0;
        }
        let ior_squared = match self.bindings.ior {
            Some(id) => {
                let ior = self.ior + stack.scalar(id);
                ior * ior
            }
            None => self.ior_squared,
        };
        fresnel_dielectric(wo, n, ior_squared)
    }

    fn diffuse_color(&self, stack: &NodeStack) -> Rgb {
        self.bindings
            .diffuse
            .map_or(self.diffuse_color, |id| stack.color(id))
    }

    fn mirror_color(&self, stack: &NodeStack) -> Rgb {
        self.bindings
            .mirror_color
            .map_or(self.mirror_color, |id| stack.color(id))
    }

    /// The transmit color: diffuse-tinted by `transmit_filter`, white beyond.
    fn transmit_color(&self, stack: &NodeStack) -> Rgb {
        self.transmit_filter_strength * self.diffuse_color(stack)
            + Rgb::splat(1.0 - self.transmit_filter_strength)
    }

    /// Oren–Nayar factor for a `(wi, wo)` pair, optionally with a
    /// shader-driven roughness.
    fn oren_nayar_factor(&self, wi: Vec3, wo: Vec3, n: Vec3, stack: &NodeStack) -> f32 {
        let Some(coeffs) = self.oren_nayar else {
            return 1.0;
        };
        let cos_ti = n.dot(wi).clamp(-1.0, 1.0);
        let cos_to = n.dot(wo).clamp(-1.0, 1.0);
        let mut max_cos = 0.0;
        if cos_ti < 0.9999 && cos_to < 0.9999 {
            let v1 = (wi - n * cos_ti).normalize_or_zero();
            let v2 = (wo - n * cos_to).normalize_or_zero();
            max_cos = v1.dot(v2).max(0.0);
        }
        let (sin_alpha, tan_beta) = if cos_to >= cos_ti {
            (
                (1.0 - cos_ti * cos_ti).sqrt(),
                (1.0 - cos_to * cos_to).sqrt() / if cos_to == 0.0 { 1e-8 } else { cos_to },
            )
        } else {
            (
                (1.0 - cos_to * cos_to).sqrt(),
                (1.0 - cos_ti * cos_ti).sqrt() / if cos_ti == 0.0 { 1e-8 } else { cos_ti },
            )
        };
        let coeffs = match self.bindings.sigma_oren {
            Some(id) => OrenNayar::from_sigma(f64::from(stack.scalar(id))),
            None => coeffs,
        };
        (coeffs.a + coeffs.b * max_cos * sin_alpha * tan_beta).clamp(0.0, 1.0)
    }

    /// Sequential lobe claims: each lobe takes its share of the light not
    /// already claimed, with the mirror share scaled by Fresnel.
    fn accumulate(components: &[f32; 4], kr: f32) -> [f32; 4] {
        let mut accum = [0.0; 4];
        accum[0] = components[0] * kr;
        let mut acc = 1.0 - accum[0];
        accum[1] = components[1] * acc;
        acc *= 1.0 - components[1];
        accum[2] = components[2] * acc;
        acc *= 1.0 - components[2];
        accum[3] = components[3] * acc;
        accum
    }

    fn wireframe_blend(&self, stack: &NodeStack, sp: &SurfacePoint<'_>) -> f32 {
        let amount = self
            .bindings
            .wireframe
            .map_or(self.wireframe_amount, |id| {
                stack.scalar(id) * self.wireframe_amount
            });
        if amount <= 0.0 || self.wireframe_thickness <= 0.0 {
            return 0.0;
        }
        let w = 1.0 - sp.bary.x - sp.bary.y;
        let edge_distance = w.min(sp.bary.x).min(sp.bary.y);
        if edge_distance >= self.wireframe_thickness {
            return 0.0;
        }
        let mut falloff = 1.0 - edge_distance / self.wireframe_thickness;
        if self.wireframe_exponent > 0.0 {
            falloff = falloff.powf(self.wireframe_exponent);
        }
        amount * falloff
    }

    fn apply_wireframe(&self, color: &mut Rgb, stack: &NodeStack, sp: &SurfacePoint<'_>) {
        let blend = self.wireframe_blend(stack, sp);
        if blend > 0.0 {
            *color = mix(*color, self.wireframe_color, blend);
        }
    }

    fn apply_wireframe_scalar(&self, value: &mut f32, stack: &NodeStack, sp: &SurfacePoint<'_>) {
        let blend = self.wireframe_blend(stack, sp);
        if blend > 0.0 {
            *value = *value + (1.0 - *value) * blend;
        }
    }

    /// Applies bump perturbation from the bound bump node's UV gradient and
    /// re-orthogonalizes the shading frame.
    fn apply_bump(&self, stack: &NodeStack, sp: &mut SurfacePoint<'_>) {
        let Some(id) = self.bindings.bump else {
            return;
        };
        let gradient = self.graph.node(id).eval_gradient(stack, sp);
        let n = (sp.n - sp.nu * gradient.x - sp.nv * gradient.y).normalize_or_zero();
        if n == Vec3::ZERO {
            return;
        }
        sp.n = n;
        let nu = (sp.nu - n * n.dot(sp.nu)).normalize_or_zero();
        if nu != Vec3::ZERO {
            sp.nu = nu;
            sp.nv = n.cross(nu);
        }
    }
}

impl Material for ShinyDiffuseMaterial {
    fn init_bsdf(&self, data: &mut RenderData<'_>, sp: &mut SurfacePoint<'_>) -> BsdfFlags {
        data.scratch.reset_lobes();
        data.scratch.nodes.ensure(self.graph.slot_count());
        self.graph.eval_view_independent(&mut data.scratch.nodes, sp);
        self.apply_bump(&data.scratch.nodes, sp);
        data.scratch.lobes = self.components(&data.scratch.nodes);
        self.flags
    }

    fn eval(
        &self,
        data: &mut RenderData<'_>,
        sp: &SurfacePoint<'_>,
        wo: Vec3,
        wl: Vec3,
        flags: BsdfFlags,
    ) -> Rgb {
        if (flags & self.flags & BsdfFlags::DIFFUSE).is_empty() {
            return Rgb::ZERO;
        }
        let cos_ng_wo = sp.ng.dot(wo);
        let cos_ng_wl = sp.ng.dot(wl);
        let n = normal_face_forward(sp.ng, sp.n, wo);

        self.refresh(data, sp);
        let stack = &data.scratch.nodes;
        let c = data.scratch.lobes;
        let kr = self.fresnel(wo, n, stack);
        let m_transmitted = (1.0 - kr * c[0]) * (1.0 - c[1]);

        // Light arriving from the opposite side only reaches the translucent lobe.
        let transmit = cos_ng_wo * cos_ng_wl < 0.0;
        if transmit {
            return if self.is_translucent {
                c[2] * m_transmitted * self.diffuse_color(stack) * FRAC_1_PI
            } else {
                Rgb::ZERO
            };
        }
        if n.dot(wl) < 0.0 {
            return Rgb::ZERO;
        }

        let mut m_diffuse = m_transmitted * (1.0 - c[2]) * c[3];
        m_diffuse *= self.oren_nayar_factor(wo, wl, n, stack);
        if let Some(id) = self.bindings.diffuse_refl {
            m_diffuse *= stack.scalar(id);
        }
        let mut result = m_diffuse * self.diffuse_color(stack) * FRAC_1_PI;
        self.apply_wireframe(&mut result, stack, sp);
        result
    }

    fn sample(
        &self,
        data: &mut RenderData<'_>,
        sp: &SurfacePoint<'_>,
        wo: Vec3,
        s: BsdfSample,
    ) -> SampleResult {
        let cos_ng_wo = sp.ng.dot(wo);
        let n = normal_face_forward(sp.ng, sp.n, wo);

        self.refresh(data, sp);
        let kr = self.fresnel(wo, n, &data.scratch.nodes);
        let accum = Self::accumulate(&data.scratch.lobes, kr);

        // Collect the lobes matching the request, with cumulative weights.
        let mut sum = 0.0;
        let mut widths = [0.0f32; 4];
        let mut cumulative = [0.0f32; 4];
        let mut choices = [BsdfFlags::empty(); 4];
        let mut n_match = 0;
        for i in 0..self.n_lobes {
            if (s.flags & self.lobe_flags[i]) == self.lobe_flags[i] {
                widths[n_match] = accum[self.lobe_index[i]];
                sum += widths[n_match];
                choices[n_match] = self.lobe_flags[i];
                cumulative[n_match] = sum;
                n_match += 1;
            }
        }
        if n_match == 0 || sum < 1e-5 {
            return SampleResult::failed();
        }
        let inv_sum = 1.0 / sum;
        let mut pick = n_match - 1;
        for i in 0..n_match {
            cumulative[i] *= inv_sum;
            widths[i] *= inv_sum;
            if s.s1 <= cumulative[i] {
                pick = i;
                break;
            }
        }
        // Reuse the pick variate within the chosen interval.
        let s1 = if pick > 0 {
            (s.s1 - cumulative[pick - 1]) / widths[pick]
        } else {
            s.s1 / widths[pick]
        };

        let stack = &data.scratch.nodes;
        let chosen = choices[pick];
        let wi;
        let mut color = Rgb::ZERO;
        let pdf;
        if chosen == BsdfFlags::SPECULAR_REFLECT {
            wi = reflect_dir(n, wo);
            pdf = widths[pick];
            color = self.mirror_color(stack) * accum[0];
            color /= sp.n.dot(wi).abs().max(1e-6);
        } else if chosen == BsdfFlags::SPECULAR_TRANSMIT {
            wi = -wo;
            color = accum[1] * self.transmit_color(stack);
            pdf = if wi.dot(n).abs() < 1e-6 {
                0.0
            } else {
                widths[pick]
            };
        } else if chosen == BsdfFlags::TRANSLUCENCY {
            wi = cos_hemisphere(-n, sp.nu, sp.nv, s1, s.s2);
            let cos_ng_wi = sp.ng.dot(wi);
            if cos_ng_wo * cos_ng_wi < 0.0 {
                color = accum[2] * self.diffuse_color(stack) * FRAC_1_PI;
            }
            pdf = wi.dot(n).abs() * widths[pick];
        } else {
            wi = cos_hemisphere(n, sp.nu, sp.nv, s1, s.s2);
            let cos_ng_wi = sp.ng.dot(wi);
            if cos_ng_wo * cos_ng_wi > 0.0 {
                color = accum[3] * self.diffuse_color(stack) * FRAC_1_PI;
            }
            color *= self.oren_nayar_factor(wo, wi, n, stack);
            pdf = wi.dot(n).abs() * widths[pick];
        }

        // Soft-clamped throughput weight, guarded against tiny pdfs, then
        // faded out by coverage alpha.
        let mut weight = wi.dot(sp.n).abs() / (0.99 * pdf + 0.01);
        let alpha = self.alpha(data, sp, wo);
        weight = weight * alpha + (1.0 - alpha);

        self.apply_wireframe(&mut color, &data.scratch.nodes, sp);
        SampleResult {
            wi,
            color,
            pdf,
            sampled: choices[pick],
            weight,
        }
    }

    fn pdf(
        &self,
        data: &mut RenderData<'_>,
        sp: &SurfacePoint<'_>,
        wo: Vec3,
        wi: Vec3,
        flags: BsdfFlags,
    ) -> f32 {
        if !flags.intersects(BsdfFlags::DIFFUSE) {
            return 0.0;
        }
        let cos_ng_wo = sp.ng.dot(wo);
        let n = normal_face_forward(sp.ng, sp.n, wo);

        self.refresh(data, sp);
        let kr = self.fresnel(wo, n, &data.scratch.nodes);
        let accum = Self::accumulate(&data.scratch.lobes, kr);

        let mut pdf = 0.0;
        let mut sum = 0.0;
        let mut n_match = 0;
        for i in 0..self.n_lobes {
            if flags.intersects(self.lobe_flags[i]) {
                let width = accum[self.lobe_index[i]];
                sum += width;
                if self.lobe_flags[i] == BsdfFlags::TRANSLUCENCY {
                    let cos_ng_wi = sp.ng.dot(wi);
                    if cos_ng_wo * cos_ng_wi < 0.0 {
                        pdf += wi.dot(n).abs() * width;
                    }
                } else if self.lobe_flags[i] == BsdfFlags::DIFFUSE_REFLECT {
                    pdf += wi.dot(n).abs() * width;
                }
                n_match += 1;
            }
        }
        if n_match == 0 || sum < 1e-5 {
            return 0.0;
        }
        pdf / sum
    }

    fn specular(
        &self,
        data: &mut RenderData<'_>,
        sp: &SurfacePoint<'_>,
        wo: Vec3,
    ) -> SpecularBranches {
        let backface = wo.dot(sp.ng) < 0.0;
        let n = if backface { -sp.n } else { sp.n };
        let ng = if backface { -sp.ng } else { sp.ng };

        self.refresh(data, sp);
        let stack = &data.scratch.nodes;
        let c = data.scratch.lobes;
        let kr = self.fresnel(wo, n, stack);

        let mut branches = SpecularBranches::default();
        if self.is_transparent {
            let mut color = (1.0 - c[0] * kr) * c[1] * self.transmit_color(stack);
            self.apply_wireframe(&mut color, stack, sp);
            branches.refract = Some(SpecularRay { dir: -wo, color });
        }
        if self.is_mirror {
            let mut dir = reflect_dir(n, wo);
            // Keep the reflected ray off the surface when a bumped shading
            // normal would push it below the geometric horizon.
            let cos_wi_ng = dir.dot(ng);
            if cos_wi_ng < 0.01 {
                dir = (dir + (0.01 - cos_wi_ng) * ng).normalize_or_zero();
            }
            let mut color = self.mirror_color(stack) * (c[0] * kr);
            self.apply_wireframe(&mut color, stack, sp);
            branches.reflect = Some(SpecularRay { dir, color });
        }
        branches
    }

    fn transparency(&self, data: &mut RenderData<'_>, sp: &SurfacePoint<'_>, wo: Vec3) -> Rgb {
        if !self.is_transparent {
            return Rgb::ZERO;
        }
        // Shadow rays arrive without an init_bsdf; evaluate the full graph.
        data.scratch.nodes.ensure(self.graph.slot_count());
        self.graph.eval_view_independent(&mut data.scratch.nodes, sp);
        self.graph.eval_view_dependent(&mut data.scratch.nodes, sp);
        let stack = &data.scratch.nodes;

        let n = normal_face_forward(sp.ng, sp.n, wo);
        let kr = self.fresnel(wo, n, stack);

        let mut accum = 1.0;
        if self.is_mirror {
            let mirror = self
                .bindings
                .mirror
                .map_or(self.mirror_strength, |id| stack.scalar(id));
            accum = 1.0 - kr * mirror;
        }
        let transparency = self
            .bindings
            .transparency
            .map_or(self.transparency_strength, |id| stack.scalar(id));
        accum *= transparency;

        let mut result = accum * self.transmit_color(stack);
        self.apply_wireframe(&mut result, stack, sp);
        result
    }

    fn alpha(&self, data: &mut RenderData<'_>, sp: &SurfacePoint<'_>, wo: Vec3) -> f32 {
        if !self.is_transparent {
            return 1.0;
        }
        self.refresh(data, sp);
        let stack = &data.scratch.nodes;
        let c = data.scratch.lobes;
        let n = normal_face_forward(sp.ng, sp.n, wo);
        let kr = self.fresnel(wo, n, stack);
        let mut result = 1.0 - (1.0 - c[0] * kr) * c[1];
        self.apply_wireframe_scalar(&mut result, stack, sp);
        result
    }

    fn emit(&self, data: &mut RenderData<'_>, sp: &SurfacePoint<'_>, _wo: Vec3) -> Rgb {
        let stack = &data.scratch.nodes;
        let mut result = match self.bindings.diffuse {
            Some(id) if self.emit_strength > 0.0 => stack.color(id) * self.emit_strength,
            _ => self.emit_color,
        };
        self.apply_wireframe(&mut result, stack, sp);
        result
    }

    fn flags(&self) -> BsdfFlags {
        self.flags
    }

    fn is_transparent(&self) -> bool {
        self.is_transparent
    }

    fn node_slots(&self) -> usize {
        self.graph.slot_count()
    }
}
