//! Textures consumed by shader-graph lookup nodes.

use std::sync::Arc;

use glam::{Vec2, Vec3};
use log::{info, warn};

use crate::color::Rgb;
use crate::param::ParamMap;

/// A 2D/3D texture sampled by the shader graph.
pub trait Texture: Send + Sync + std::fmt::Debug {
    /// Color at the given UV (3D position available for solid textures).
    fn color(&self, uv: Vec2, p: Vec3) -> Rgb;
}

/// Name-to-texture lookup, implemented by the scene for material factories.
pub trait TextureResolver {
    fn resolve_texture(&self, name: &str) -> Option<Arc<dyn Texture>>;
}

/// Resolver for contexts without any textures (tests, standalone materials).
pub struct NoTextures;

impl TextureResolver for NoTextures {
    fn resolve_texture(&self, _name: &str) -> Option<Arc<dyn Texture>> {
        None
    }
}

// ============================================================================
// Constant
// ============================================================================

#[derive(Debug)]
pub struct ConstantTexture {
    color: Rgb,
}

impl ConstantTexture {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }
}

impl Texture for ConstantTexture {
    fn color(&self, _uv: Vec2, _p: Vec3) -> Rgb {
        self.color
    }
}

// ============================================================================
// Checker
// ============================================================================

/// Two-tone UV checkerboard.
#[derive(Debug)]
pub struct CheckerTexture {
    color1: Rgb,
    color2: Rgb,
    scale: f32,
}

impl CheckerTexture {
    pub fn new(color1: Rgb, color2: Rgb, scale: f32) -> Self {
        Self {
            color1,
            color2,
            scale,
        }
    }
}

impl Texture for CheckerTexture {
    fn color(&self, uv: Vec2, _p: Vec3) -> Rgb {
        let cell = (uv * self.scale).floor();
        if (cell.x + cell.y).rem_euclid(2.0) < 1.0 {
            self.color1
        } else {
            self.color2
        }
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates a texture from configuration. Unknown types warn and yield `None`.
pub fn create_texture(name: &str, params: &ParamMap) -> Option<Arc<dyn Texture>> {
    let type_name = params.str_or("type", "constant");
    let texture: Arc<dyn Texture> = match type_name {
        "constant" => Arc::new(ConstantTexture::new(params.color_or("color", Rgb::ONE))),
        "checker" => Arc::new(CheckerTexture::new(
            params.color_or("color1", Rgb::ZERO),
            params.color_or("color2", Rgb::ONE),
            params.float_or("scale", 1.0),
        )),
        other => {
            warn!("Texture type '{other}' could not be created ('{name}')");
            return None;
        }
    };
    info!("Texture type '{type_name}' created ('{name}')");
    Some(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::vec2;

    #[test]
    fn checker_alternates() {
        let t = CheckerTexture::new(Rgb::ZERO, Rgb::ONE, 1.0);
        assert_eq!(t.color(vec2(0.5, 0.5), Vec3::ZERO), Rgb::ZERO);
        assert_eq!(t.color(vec2(1.5, 0.5), Vec3::ZERO), Rgb::ONE);
        assert_eq!(t.color(vec2(1.5, 1.5), Vec3::ZERO), Rgb::ZERO);
    }

    #[test]
    fn factory_falls_through_on_unknown() {
        let mut p = ParamMap::new();
        p.set_string("type", "marble");
        assert!(create_texture("t", &p).is_none());
    }
}
