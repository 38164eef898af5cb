//! Shader node graphs.
//!
//! Materials may hold a DAG of shader nodes (texture lookups, mixers,
//! constants). The graph is solved into a topological order at material build
//! time and split into a view-independent prefix, evaluated once per hit in
//! `init_bsdf`, and a view-dependent suffix evaluated at query time. Every
//! node writes its output into an indexed slot of the per-ray node stack.

mod nodes;

pub use nodes::{MixNode, TextureMapperNode, ValueNode};

use std::fmt;
use std::sync::Arc;

use glam::Vec2;
use log::error;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::color::Rgb;
use crate::errors::{PrismError, Result};
use crate::geometry::SurfacePoint;
use crate::param::ParamMap;
use crate::texture::TextureResolver;

/// Index of a node within its material's graph; doubles as the node's output
/// slot on the stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A single node output.
#[derive(Clone, Copy, Debug, Default)]
pub struct NodeResult {
    pub color: Rgb,
    pub scalar: f32,
}

/// Slot-indexed storage for node outputs, living in the per-ray scratch.
#[derive(Clone, Debug, Default)]
pub struct NodeStack {
    slots: Vec<NodeResult>,
}

impl NodeStack {
    /// Grows the stack to hold at least `n` slots.
    pub fn ensure(&mut self, n: usize) {
        if self.slots.len() < n {
            self.slots.resize(n, NodeResult::default());
        }
    }

    #[inline]
    pub fn set(&mut self, id: NodeId, result: NodeResult) {
        self.slots[id.0 as usize] = result;
    }

    #[inline]
    pub fn color(&self, id: NodeId) -> Rgb {
        self.slots[id.0 as usize].color
    }

    #[inline]
    pub fn scalar(&self, id: NodeId) -> f32 {
        self.slots[id.0 as usize].scalar
    }
}

/// One node of a material's shader graph.
pub trait ShaderNode: Send + Sync + fmt::Debug {
    /// Evaluates the node at `sp` and writes its slot.
    fn eval(&self, stack: &mut NodeStack, sp: &SurfacePoint<'_>);

    /// Output slot of this node.
    fn id(&self) -> NodeId;

    /// Slots this node reads; drives the topological solve.
    fn inputs(&self) -> SmallVec<[NodeId; 4]> {
        SmallVec::new()
    }

    /// View-dependent nodes move to the query-time suffix.
    fn view_dependent(&self) -> bool {
        false
    }

    /// Parametric gradient of the scalar output, used for bump mapping.
    /// The default is flat.
    fn eval_gradient(&self, _stack: &NodeStack, _sp: &SurfacePoint<'_>) -> Vec2 {
        Vec2::ZERO
    }
}

// ============================================================================
// Graph construction
// ============================================================================

/// A material's solved shader graph.
#[derive(Debug, Default)]
pub struct ShaderGraph {
    nodes: Vec<Arc<dyn ShaderNode>>,
    by_name: FxHashMap<String, NodeId>,
    /// View-independent topological prefix.
    vi_order: Vec<NodeId>,
    /// View-dependent suffix.
    vd_order: Vec<NodeId>,
}

impl ShaderGraph {
    /// Builds nodes from an ordered list of parameter maps. Each map needs a
    /// `type` and a unique `name`; inputs reference earlier names.
    pub fn from_params(list: &[ParamMap], textures: &dyn TextureResolver) -> Result<Self> {
        let mut graph = Self::default();
        for params in list {
            let name = params.require_str("name", "shader node")?.to_string();
            if graph.by_name.contains_key(&name) {
                return Err(PrismError::DuplicateName {
                    kind: "shader node",
                    name,
                });
            }
            let id = NodeId(graph.nodes.len() as u32);
            let node = nodes::create_node(id, params, &graph.by_name, textures)?;
            graph.nodes.push(node);
            graph.by_name.insert(name, id);
        }
        Ok(graph)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of stack slots the graph needs.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> &dyn ShaderNode {
        self.nodes[id.0 as usize].as_ref()
    }

    /// Solves the evaluation order for the subgraphs reachable from `roots`
    /// and splits it into the view-independent prefix and view-dependent
    /// suffix. A node whose inputs are view-dependent is view-dependent too.
    pub fn solve(&mut self, roots: &[NodeId]) {
        let mut order = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        for &root in roots {
            self.visit(root, &mut visited, &mut order);
        }

        let mut tainted = vec![false; self.nodes.len()];
        self.vi_order.clear();
        self.vd_order.clear();
        for id in order {
            let node = self.node(id);
            let vd =
                node.view_dependent() || node.inputs().iter().any(|dep| tainted[dep.0 as usize]);
            tainted[id.0 as usize] = vd;
            if vd {
                self.vd_order.push(id);
            } else {
                self.vi_order.push(id);
            }
        }
    }

    fn visit(&self, id: NodeId, visited: &mut [bool], order: &mut Vec<NodeId>) {
        if visited[id.0 as usize] {
            return;
        }
        visited[id.0 as usize] = true;
        for dep in self.node(id).inputs() {
            self.visit(dep, visited, order);
        }
        order.push(id);
    }

    /// Evaluates the view-independent prefix.
    pub fn eval_view_independent(&self, stack: &mut NodeStack, sp: &SurfacePoint<'_>) {
        stack.ensure(self.nodes.len());
        for &id in &self.vi_order {
            self.node(id).eval(stack, sp);
        }
    }

    /// Evaluates the view-dependent suffix.
    pub fn eval_view_dependent(&self, stack: &mut NodeStack, sp: &SurfacePoint<'_>) {
        stack.ensure(self.nodes.len());
        for &id in &self.vd_order {
            self.node(id).eval(stack, sp);
        }
    }

    pub fn has_view_dependent(&self) -> bool {
        !self.vd_order.is_empty()
    }

    /// Whether the node (and therefore anything bound to it) ends up in the
    /// view-dependent suffix.
    pub fn is_view_dependent(&self, id: NodeId) -> bool {
        self.vd_order.contains(&id)
    }
}

/// Resolves a `*_shader` parameter to a node of the graph, with a warning
/// when the referenced name does not exist.
pub fn bind_shader(graph: &ShaderGraph, params: &ParamMap, key: &str) -> Option<NodeId> {
    let name = params.get_str(key)?;
    let id = graph.find(name);
    if id.is_none() {
        error!("Shader binding '{key}' references unknown node '{name}'");
    }
    id
}
