//! Per-ray scratch state.
//!
//! Each worker thread owns one [`Scratch`] and threads it explicitly through
//! the intersection→shading call chain. Materials cache their per-hit lobe
//! weights here during `init_bsdf`, and shader nodes write their outputs into
//! the node stack. Nested shadow queries construct their own scratch instead
//! of saving and restoring a shared pointer.

use crate::shader::NodeStack;

/// Scratch region for one ray.
#[derive(Clone, Debug, Default)]
pub struct Scratch {
    /// Per-hit effective lobe strengths cached by `Material::init_bsdf`.
    pub lobes: [f32; 4],
    /// Shader-node output slots.
    pub nodes: NodeStack,
}

impl Scratch {
    /// A scratch pre-sized for materials needing up to `node_slots` slots.
    pub fn with_slots(node_slots: usize) -> Self {
        let mut scratch = Self::default();
        scratch.nodes.ensure(node_slots);
        scratch
    }

    pub fn reset_lobes(&mut self) {
        self.lobes = [0.0; 4];
    }
}

/// Scratch plus the per-ray bookkeeping the shading kernel needs.
#[derive(Debug)]
pub struct RenderData<'a> {
    pub scratch: &'a mut Scratch,
    /// Shutter time of the current ray.
    pub time: f32,
    /// Recursion depth of the current ray.
    pub ray_depth: u32,
}

impl<'a> RenderData<'a> {
    pub fn new(scratch: &'a mut Scratch) -> Self {
        Self {
            scratch,
            time: 0.0,
            ray_depth: 0,
        }
    }
}
