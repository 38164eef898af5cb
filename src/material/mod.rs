//! Materials: the BSDF evaluation/sampling interface invoked at every hit.

pub mod sample;
mod shiny_diffuse;

pub use shiny_diffuse::ShinyDiffuseMaterial;

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec3;
use log::{error, info, warn};

use crate::color::Rgb;
use crate::geometry::SurfacePoint;
use crate::param::{ParamList, ParamMap};
use crate::render::scratch::RenderData;
use crate::texture::TextureResolver;

bitflags! {
    /// Lobe classification bits, plus the named combinations every lobe of a
    /// material is tagged with.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct BsdfFlags: u16 {
        const EMIT       = 1 << 0;
        const SPECULAR   = 1 << 1;
        const GLOSSY     = 1 << 2;
        const DIFFUSE    = 1 << 3;
        const REFLECT    = 1 << 4;
        const TRANSMIT   = 1 << 5;
        const FILTER     = 1 << 6;
        const VOLUMETRIC = 1 << 7;
        const DISPERSIVE = 1 << 8;

        const SPECULAR_REFLECT  = Self::SPECULAR.bits() | Self::REFLECT.bits();
        const SPECULAR_TRANSMIT = Self::SPECULAR.bits() | Self::TRANSMIT.bits() | Self::FILTER.bits();
        const DIFFUSE_REFLECT   = Self::DIFFUSE.bits() | Self::REFLECT.bits();
        const TRANSLUCENCY      = Self::DIFFUSE.bits() | Self::TRANSMIT.bits();
        const ALL               = Self::SPECULAR.bits() | Self::GLOSSY.bits() | Self::DIFFUSE.bits()
                                | Self::REFLECT.bits() | Self::TRANSMIT.bits() | Self::FILTER.bits();
    }
}

/// Input to [`Material::sample`]: two uniform variates plus the lobe subset
/// the caller is interested in.
#[derive(Clone, Copy, Debug)]
pub struct BsdfSample {
    pub s1: f32,
    pub s2: f32,
    pub flags: BsdfFlags,
}

impl BsdfSample {
    pub fn new(s1: f32, s2: f32, flags: BsdfFlags) -> Self {
        Self { s1, s2, flags }
    }
}

/// Output of [`Material::sample`].
///
/// `pdf == 0` marks a failed or out-of-support sample; callers must check it
/// before dividing. `weight` is the soft-clamped throughput factor
/// `|n·wi| / (0.99·pdf + 0.01)`, alpha-blended toward 1 by the material's
/// alpha.
#[derive(Clone, Copy, Debug)]
pub struct SampleResult {
    pub wi: Vec3,
    pub color: Rgb,
    pub pdf: f32,
    pub sampled: BsdfFlags,
    pub weight: f32,
}

impl SampleResult {
    /// The null sample: nothing matched the requested lobes.
    pub fn failed() -> Self {
        Self {
            wi: Vec3::ZERO,
            color: Rgb::ONE,
            pdf: 0.0,
            sampled: BsdfFlags::empty(),
            weight: 0.0,
        }
    }
}

/// One deterministic specular branch: direction and un-attenuated color.
#[derive(Clone, Copy, Debug)]
pub struct SpecularRay {
    pub dir: Vec3,
    pub color: Rgb,
}

/// Perfect-mirror and perfect-transmit branches for whitted-style splitting.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpecularBranches {
    pub reflect: Option<SpecularRay>,
    pub refract: Option<SpecularRay>,
}

/// The material interface.
///
/// `init_bsdf` must be called once per hit before any of the other queries;
/// it caches the per-hit lobe weights in the scratch and may perturb the
/// shading normal. All per-ray state lives in the caller's [`RenderData`].
pub trait Material: Send + Sync + fmt::Debug {
    /// Evaluates view-independent shader nodes, caches lobe weights, applies
    /// bump mapping, and returns the union of supported lobe flags.
    fn init_bsdf(&self, data: &mut RenderData<'_>, sp: &mut SurfacePoint<'_>) -> BsdfFlags;

    /// Evaluates the BSDF for the requested lobe subset. Specular lobes never
    /// contribute here.
    fn eval(
        &self,
        data: &mut RenderData<'_>,
        sp: &SurfacePoint<'_>,
        wo: Vec3,
        wl: Vec3,
        flags: BsdfFlags,
    ) -> Rgb;

    /// Samples an incident direction for the requested lobe subset.
    fn sample(
        &self,
        data: &mut RenderData<'_>,
        sp: &SurfacePoint<'_>,
        wo: Vec3,
        s: BsdfSample,
    ) -> SampleResult;

    /// Probability density of `wi` under [`Material::sample`] for the
    /// requested lobes.
    fn pdf(
        &self,
        data: &mut RenderData<'_>,
        sp: &SurfacePoint<'_>,
        wo: Vec3,
        wi: Vec3,
        flags: BsdfFlags,
    ) -> f32;

    /// Deterministic perfect-specular branches.
    fn specular(
        &self,
        _data: &mut RenderData<'_>,
        _sp: &SurfacePoint<'_>,
        _wo: Vec3,
    ) -> SpecularBranches {
        SpecularBranches::default()
    }

    /// Transmission filter for transparent-shadow accumulation; zero for
    /// opaque materials.
    fn transparency(&self, _data: &mut RenderData<'_>, _sp: &SurfacePoint<'_>, _wo: Vec3) -> Rgb {
        Rgb::ZERO
    }

    /// Pixel-coverage alpha at this hit.
    fn alpha(&self, _data: &mut RenderData<'_>, _sp: &SurfacePoint<'_>, _wo: Vec3) -> f32 {
        1.0
    }

    /// Emitted radiance toward `wo`.
    fn emit(&self, _data: &mut RenderData<'_>, _sp: &SurfacePoint<'_>, _wo: Vec3) -> Rgb {
        Rgb::ZERO
    }

    /// Union of lobes this material can ever return.
    fn flags(&self) -> BsdfFlags;

    /// Whether transparent-shadow traversal should pass through this
    /// material instead of terminating.
    fn is_transparent(&self) -> bool {
        false
    }

    /// Shader-node slots this material needs in the scratch node stack.
    fn node_slots(&self) -> usize {
        0
    }
}

// ============================================================================
// Factory
// ============================================================================

/// The safe default: an opaque gray diffuse reflector.
pub fn default_material() -> Arc<dyn Material> {
    Arc::new(ShinyDiffuseMaterial::opaque_diffuse(Rgb::splat(0.8)))
}

/// Creates a material from configuration. Unknown types and broken shader
/// trees fall back to the default opaque diffuse with a warning.
pub fn create_material(
    name: &str,
    params: &ParamMap,
    node_list: &ParamList,
    textures: &dyn TextureResolver,
) -> Arc<dyn Material> {
    let type_name = params.str_or("type", "shinydiffuse");
    match type_name {
        "shinydiffuse" => match ShinyDiffuseMaterial::from_params(params, node_list, textures) {
            Ok(material) => {
                info!("Material type '{type_name}' created ('{name}')");
                Arc::new(material)
            }
            Err(err) => {
                error!("Material '{name}': {err}; using default diffuse instead");
                default_material()
            }
        },
        other => {
            warn!("Material type '{other}' could not be created ('{name}'), using default diffuse instead");
            default_material()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_flags_compose() {
        assert_eq!(
            BsdfFlags::SPECULAR_REFLECT,
            BsdfFlags::SPECULAR | BsdfFlags::REFLECT
        );
        assert_eq!(
            BsdfFlags::TRANSLUCENCY,
            BsdfFlags::DIFFUSE | BsdfFlags::TRANSMIT
        );
        assert!(BsdfFlags::SPECULAR_TRANSMIT.contains(BsdfFlags::FILTER));
    }

    #[test]
    fn unknown_type_falls_back_to_diffuse() {
        let mut params = ParamMap::new();
        params.set_string("type", "carpaint");
        let material = create_material("m", &params, &Vec::new(), &crate::texture::NoTextures);
        assert!(material.flags().contains(BsdfFlags::DIFFUSE_REFLECT));
        assert!(!material.is_transparent());
    }
}
