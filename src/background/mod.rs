//! Backgrounds: radiance for rays that escape the scene.

use std::sync::Arc;

use glam::Vec3;
use log::{info, warn};

use crate::color::Rgb;
use crate::param::ParamMap;

pub trait Background: Send + Sync + std::fmt::Debug {
    /// Radiance arriving from direction `dir`.
    fn eval(&self, dir: Vec3) -> Rgb;
}

/// Uniform background color.
#[derive(Debug)]
pub struct ConstantBackground {
    color: Rgb,
}

impl ConstantBackground {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }
}

impl Background for ConstantBackground {
    fn eval(&self, _dir: Vec3) -> Rgb {
        self.color
    }
}

/// Creates a background from configuration. Unknown types warn and yield `None`.
pub fn create_background(name: &str, params: &ParamMap) -> Option<Arc<dyn Background>> {
    let type_name = params.str_or("type", "constant");
    let background: Arc<dyn Background> = match type_name {
        "constant" => Arc::new(ConstantBackground::new(params.color_or("color", Rgb::ZERO))),
        other => {
            warn!("Background type '{other}' could not be created ('{name}')");
            return None;
        }
    };
    info!("Background type '{type_name}' created ('{name}')");
    Some(background)
}
