//! Concrete shader nodes: constants, mixers and texture lookups.

use std::sync::Arc;

use glam::{Vec2, vec2};
use log::error;
use rustc_hash::FxHashMap;
use smallvec::{SmallVec, smallvec};

use crate::color::{Rgb, mix};
use crate::errors::{PrismError, Result};
use crate::geometry::SurfacePoint;
use crate::param::ParamMap;
use crate::shader::{NodeId, NodeResult, NodeStack, ShaderNode};
use crate::texture::{Texture, TextureResolver};

/// An input that is either another node's slot or an inline constant.
#[derive(Clone, Debug)]
pub(crate) enum NodeInput {
    Node(NodeId),
    Constant(NodeResult),
}

impl NodeInput {
    fn resolve(
        params: &ParamMap,
        key: &str,
        by_name: &FxHashMap<String, NodeId>,
        default: NodeResult,
    ) -> Self {
        if let Some(name) = params.get_str(key) {
            if let Some(&id) = by_name.get(name) {
                return Self::Node(id);
            }
            error!("Shader node input '{key}' references unknown node '{name}'");
        }
        Self::Constant(default)
    }

    #[inline]
    fn fetch(&self, stack: &NodeStack) -> NodeResult {
        match self {
            Self::Node(id) => NodeResult {
                color: stack.color(*id),
                scalar: stack.scalar(*id),
            },
            Self::Constant(c) => *c,
        }
    }

    fn id(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Constant(_) => None,
        }
    }
}

/// Creates a node from its parameter map. Unknown types are an error; the
/// material factory downgrades that to a warning-plus-default at its level.
pub(crate) fn create_node(
    id: NodeId,
    params: &ParamMap,
    by_name: &FxHashMap<String, NodeId>,
    textures: &dyn TextureResolver,
) -> Result<Arc<dyn ShaderNode>> {
    let type_name = params.require_str("type", "shader node")?;
    match type_name {
        "value" => Ok(Arc::new(ValueNode::from_params(id, params))),
        "mix" => Ok(Arc::new(MixNode::from_params(id, params, by_name))),
        "texture_mapper" => Ok(Arc::new(TextureMapperNode::from_params(
            id, params, textures,
        )?)),
        other => Err(PrismError::UnknownType {
            kind: "shader node",
            type_name: other.to_string(),
        }),
    }
}

// ============================================================================
// Value node
// ============================================================================

/// Constant color/scalar output.
#[derive(Debug)]
pub struct ValueNode {
    id: NodeId,
    value: NodeResult,
}

impl ValueNode {
    fn from_params(id: NodeId, params: &ParamMap) -> Self {
        let color = params.color_or("color", Rgb::ONE);
        let scalar = params.float_or("scalar", 1.0);
        Self {
            id,
            value: NodeResult { color, scalar },
        }
    }
}

impl ShaderNode for ValueNode {
    fn eval(&self, stack: &mut NodeStack, _sp: &SurfacePoint<'_>) {
        stack.set(self.id, self.value);
    }

    fn id(&self) -> NodeId {
        self.id
    }
}

// ============================================================================
// Mix node
// ============================================================================

/// Linear blend of two inputs by a factor input.
#[derive(Debug)]
pub struct MixNode {
    id: NodeId,
    input1: NodeInput,
    input2: NodeInput,
    factor: NodeInput,
}

impl MixNode {
    fn from_params(id: NodeId, params: &ParamMap, by_name: &FxHashMap<String, NodeId>) -> Self {
        let const_color = |key: &str, default: Rgb| NodeResult {
            color: params.color_or(key, default),
            scalar: params.float_or(key, 0.0),
        };
        let factor = NodeResult {
            color: Rgb::splat(params.float_or("factor", 0.5)),
            scalar: params.float_or("factor", 0.5),
        };
        Self {
            id,
            input1: NodeInput::resolve(params, "input1", by_name, const_color("color1", Rgb::ZERO)),
            input2: NodeInput::resolve(params, "input2", by_name, const_color("color2", Rgb::ONE)),
            factor: NodeInput::resolve(params, "factor_shader", by_name, factor),
        }
    }
}

impl ShaderNode for MixNode {
    fn eval(&self, stack: &mut NodeStack, _sp: &SurfacePoint<'_>) {
        let a = self.input1.fetch(stack);
        let b = self.input2.fetch(stack);
        let f = self.factor.fetch(stack).scalar.clamp(0.0, 1.0);
        stack.set(
            self.id,
            NodeResult {
                color: mix(a.color, b.color, f),
                scalar: a.scalar + (b.scalar - a.scalar) * f,
            },
        );
    }

    fn id(&self) -> NodeId {
        self.id
    }

    fn inputs(&self) -> SmallVec<[NodeId; 4]> {
        let mut deps: SmallVec<[NodeId; 4]> = smallvec![];
        deps.extend([&self.input1, &self.input2, &self.factor].iter().filter_map(|i| i.id()));
        deps
    }
}

// ============================================================================
// Texture mapper node
// ============================================================================

/// UV-mapped texture lookup with an affine UV transform.
#[derive(Debug)]
pub struct TextureMapperNode {
    id: NodeId,
    texture: Arc<dyn Texture>,
    scale: Vec2,
    offset: Vec2,
}

impl TextureMapperNode {
    fn from_params(id: NodeId, params: &ParamMap, textures: &dyn TextureResolver) -> Result<Self> {
        let tex_name = params.require_str("texture", "texture_mapper node")?;
        let texture = textures
            .resolve_texture(tex_name)
            .ok_or_else(|| PrismError::NotFound {
                kind: "texture",
                name: tex_name.to_string(),
            })?;
        let scale = params.vector_or("scale", glam::Vec3::ONE);
        let offset = params.vector_or("offset", glam::Vec3::ZERO);
        Ok(Self {
            id,
            texture,
            scale: vec2(scale.x, scale.y),
            offset: vec2(offset.x, offset.y),
        })
    }

    #[inline]
    fn uv(&self, sp: &SurfacePoint<'_>) -> Vec2 {
        vec2(sp.u, sp.v) * self.scale + self.offset
    }
}

impl ShaderNode for TextureMapperNode {
    fn eval(&self, stack: &mut NodeStack, sp: &SurfacePoint<'_>) {
        let color = self.texture.color(self.uv(sp), sp.p);
        stack.set(
            self.id,
            NodeResult {
                color,
                scalar: crate::color::luminance(color),
            },
        );
    }

    fn id(&self) -> NodeId {
        self.id
    }

    /// Central-difference UV gradient of the texture's scalar value.
    fn eval_gradient(&self, _stack: &NodeStack, sp: &SurfacePoint<'_>) -> Vec2 {
        const DELTA: f32 = 1e-3;
        let uv = self.uv(sp);
        let sample = |uv: Vec2| crate::color::luminance(self.texture.color(uv, sp.p));
        let du = sample(uv + vec2(DELTA, 0.0)) - sample(uv - vec2(DELTA, 0.0));
        let dv = sample(uv + vec2(0.0, DELTA)) - sample(uv - vec2(0.0, DELTA));
        vec2(du, dv) / (2.0 * DELTA)
    }
}
