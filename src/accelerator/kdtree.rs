//! SAH k-d tree accelerator.
//!
//! Construction enumerates candidate split planes at primitive bounding-box
//! edges on every axis and picks the minimum surface-area-heuristic cost.
//! Primitives straddling a plane go to both children. With the multi-thread
//! flag, the upper levels of the recursion dispatch subtree builds onto the
//! rayon pool; both modes run the identical split-selection code and produce
//! the same tree.

use std::sync::Arc;

use glam::Vec3;
use log::debug;
use smallvec::SmallVec;

use crate::accelerator::{Accelerator, IntersectData, TransparentShadow};
use crate::color::{Rgb, luminance};
use crate::geometry::{Bound, Hit, Primitive, Ray};
use crate::param::ParamMap;
use crate::render::scratch::RenderData;

/// Traversal stack depth; enough for any tree the builder can produce.
const MAX_STACK: usize = 64;

/// Filter luminance below which a transparent shadow path counts as opaque.
const FILTER_LUMINANCE_MIN: f32 = 1e-5;

/// Build-time parameters with their defaults.
#[derive(Clone, Copy, Debug)]
struct BuildParams {
    max_depth: u32,
    leaf_size: usize,
    cost_traversal: f32,
    cost_intersection: f32,
    empty_bonus: f32,
    /// Recursion levels that fork onto the worker pool; 0 is fully sequential.
    parallel_depth: u32,
}

impl BuildParams {
    fn from_params(params: &ParamMap, n_primitives: usize, parallel: bool) -> Self {
        let max_depth = match params.int_or("max_depth", 0) {
            d if d > 0 => d as u32,
            // Auto depth grows logarithmically with the primitive count.
            _ => (8.0 + 1.3 * (n_primitives.max(1) as f32).log2()).round() as u32,
        };
        let parallel_depth = if parallel {
            (rayon::current_num_threads().max(2) as f32).log2().ceil() as u32 + 1
        } else {
            0
        };
        Self {
            max_depth,
            leaf_size: params.int_or("leaf_size", 2).max(1) as usize,
            cost_traversal: params.float_or("cost_traversal", 1.0),
            cost_intersection: params.float_or("cost_intersection", 80.0),
            empty_bonus: params.float_or("empty_bonus", 0.33),
            parallel_depth,
        }
    }
}

/// A candidate split plane at a primitive bound edge.
#[derive(Clone, Copy)]
struct BoundEdge {
    pos: f32,
    prim: u32,
    end: bool,
}

/// Intermediate recursion output, flattened into the node array afterwards.
enum BuildNode {
    Interior {
        axis: u8,
        split: f32,
        children: Box<(BuildNode, BuildNode)>,
    },
    Leaf(Vec<u32>),
}

#[derive(Debug, PartialEq)]
pub(crate) enum KdNode {
    /// The below child follows immediately; `above` indexes the other.
    Interior { axis: u8, split: f32, above: u32 },
    /// Range into the shared primitive-index array.
    Leaf { first: u32, count: u32 },
}

pub struct KdTreeAccelerator {
    pub(crate) nodes: Vec<KdNode>,
    pub(crate) prim_indices: Vec<u32>,
    prims: Vec<Arc<dyn Primitive>>,
    bound: Bound,
}

impl KdTreeAccelerator {
    pub fn new(prims: Vec<Arc<dyn Primitive>>, params: &ParamMap, parallel: bool) -> Self {
        let build = BuildParams::from_params(params, prims.len(), parallel);
        let bounds: Vec<Bound> = prims.iter().map(|p| p.bound()).collect();
        let bound = bounds
            .iter()
            .fold(Bound::EMPTY, |acc, b| acc.union(b));

        let indices: Vec<u32> = (0..prims.len() as u32).collect();
        let root = build_node(&build, &bounds, indices, bound, 0);

        let mut nodes = Vec::new();
        let mut prim_indices = Vec::new();
        flatten(root, &mut nodes, &mut prim_indices);
        debug!(
            "KdTree: {} primitives, {} nodes, depth limit {}",
            prims.len(),
            nodes.len(),
            build.max_depth
        );
        Self {
            nodes,
            prim_indices,
            prims,
            bound,
        }
    }

    #[inline]
    fn leaf_range(&self, first: u32, count: u32) -> &[u32] {
        &self.prim_indices[first as usize..(first + count) as usize]
    }
}

// ============================================================================
// Construction
// ============================================================================

/// The minimum-SAH split for one node, if any candidate beats the leaf cost.
/// Ties break by axis order X<Y<Z, then by lower position (the sweep visits
/// candidates in exactly that order and only accepts strict improvements).
fn select_split(
    params: &BuildParams,
    bounds: &[Bound],
    indices: &[u32],
    node_bound: Bound,
) -> Option<(usize, usize, [Vec<BoundEdge>; 3])> {
    let total_area = node_bound.area();
    if total_area <= 0.0 {
        return None;
    }
    let inv_total_area = 1.0 / total_area;
    let n = indices.len();
    let leaf_cost = params.cost_intersection * n as f32;
    let d = node_bound.size();

    let mut best_cost = leaf_cost;
    let mut best: Option<(usize, usize)> = None;
    let mut edges_per_axis: [Vec<BoundEdge>; 3] = [Vec::new(), Vec::new(), Vec::new()];

    for axis in 0..3 {
        let mut edges = Vec::with_capacity(2 * n);
        for &i in indices {
            let b = &bounds[i as usize];
            edges.push(BoundEdge {
                pos: b.min[axis],
                prim: i,
                end: false,
            });
            edges.push(BoundEdge {
                pos: b.max[axis],
                prim: i,
                end: true,
            });
        }
        edges.sort_unstable_by(|a, b| {
            a.pos
                .partial_cmp(&b.pos)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.end.cmp(&b.end))
        });

        let o0 = (axis + 1) % 3;
        let o1 = (axis + 2) % 3;
        let cap_area = d[o0] * d[o1];
        let edge_len = d[o0] + d[o1];

        let mut n_below = 0usize;
        let mut n_above = n;
        for (offset, edge) in edges.iter().enumerate() {
            if edge.end {
                n_above -= 1;
            }
            let t = edge.pos;
            if t > node_bound.min[axis] && t < node_bound.max[axis] {
                let p_below = 2.0 * (cap_area + (t - node_bound.min[axis]) * edge_len) * inv_total_area;
                let p_above = 2.0 * (cap_area + (node_bound.max[axis] - t) * edge_len) * inv_total_area;
                let bonus = if n_below == 0 || n_above == 0 {
                    params.empty_bonus
                } else {
                    0.0
                };
                let cost = params.cost_traversal
                    + params.cost_intersection
                        * (1.0 - bonus)
                        * (p_below * n_below as f32 + p_above * n_above as f32);
                if cost < best_cost {
                    best_cost = cost;
                    best = Some((axis, offset));
                }
            }
            if !edge.end {
                n_below += 1;
            }
        }
        edges_per_axis[axis] = edges;
    }

    best.map(|(axis, offset)| (axis, offset, edges_per_axis))
}

fn build_node(
    params: &BuildParams,
    bounds: &[Bound],
    indices: Vec<u32>,
    node_bound: Bound,
    depth: u32,
) -> BuildNode {
    if indices.len() <= params.leaf_size || depth >= params.max_depth {
        return BuildNode::Leaf(indices);
    }
    let Some((axis, offset, edges_per_axis)) = select_split(params, bounds, &indices, node_bound)
    else {
        return BuildNode::Leaf(indices);
    };

    let edges = &edges_per_axis[axis];
    let split = edges[offset].pos;
    let below_prims: Vec<u32> = edges[..offset]
        .iter()
        .filter(|e| !e.end)
        .map(|e| e.prim)
        .collect();
    let above_prims: Vec<u32> = edges[offset + 1..]
        .iter()
        .filter(|e| e.end)
        .map(|e| e.prim)
        .collect();

    let mut below_bound = node_bound;
    below_bound.max[axis] = split;
    let mut above_bound = node_bound;
    above_bound.min[axis] = split;

    let (below, above) = if depth < params.parallel_depth {
        rayon::join(
            || build_node(params, bounds, below_prims, below_bound, depth + 1),
            || build_node(params, bounds, above_prims, above_bound, depth + 1),
        )
    } else {
        (
            build_node(params, bounds, below_prims, below_bound, depth + 1),
            build_node(params, bounds, above_prims, above_bound, depth + 1),
        )
    };

    BuildNode::Interior {
        axis: axis as u8,
        split,
        children: Box::new((below, above)),
    }
}

/// Preorder flatten, below child first.
fn flatten(node: BuildNode, nodes: &mut Vec<KdNode>, prim_indices: &mut Vec<u32>) {
    match node {
        BuildNode::Leaf(indices) => {
            nodes.push(KdNode::Leaf {
                first: prim_indices.len() as u32,
                count: indices.len() as u32,
            });
            prim_indices.extend(indices);
        }
        BuildNode::Interior {
            axis,
            split,
            children,
        } => {
            let index = nodes.len();
            nodes.push(KdNode::Interior {
                axis,
                split,
                above: 0,
            });
            flatten(children.0, nodes, prim_indices);
            let above = nodes.len() as u32;
            if let KdNode::Interior { above: slot, .. } = &mut nodes[index] {
                *slot = above;
            }
            flatten(children.1, nodes, prim_indices);
        }
    }
}

// ============================================================================
// Traversal
// ============================================================================

/// Shared stepping logic: descends interior nodes, pushing far children.
/// Returns the next leaf, or `None` when the stack runs dry.
struct Traversal<'a> {
    nodes: &'a [KdNode],
    from: Vec3,
    inv_dir: Vec3,
    stack: SmallVec<[(u32, f32, f32); MAX_STACK]>,
}

impl<'a> Traversal<'a> {
    fn new(tree: &'a KdTreeAccelerator, ray: &Ray, t_max: f32) -> Option<Self> {
        let inv_dir = ray.dir.recip();
        let (t_enter, t_exit) = tree.bound.cross(ray.from, inv_dir, t_max)?;
        let mut stack = SmallVec::new();
        stack.push((0u32, t_enter, t_exit));
        Some(Self {
            nodes: &tree.nodes,
            from: ray.from,
            inv_dir,
            stack,
        })
    }

    /// Next leaf in front-to-back order: `(first, count, t_enter, t_exit)`.
    fn next_leaf(&mut self) -> Option<(u32, u32, f32, f32)> {
        while let Some((mut index, t_min, mut t_max)) = self.stack.pop() {
            loop {
                match &self.nodes[index as usize] {
                    KdNode::Interior { axis, split, above } => {
                        let a = *axis as usize;
                        let t_plane = (split - self.from[a]) * self.inv_dir[a];
                        let below_first = self.from[a] < *split
                            || (self.from[a] == *split && self.inv_dir[a] <= 0.0);
                        let (first, second) = if below_first {
                            (index + 1, *above)
                        } else {
                            (*above, index + 1)
                        };
                        if t_plane > t_max || t_plane <= 0.0 {
                            index = first;
                        } else if t_plane < t_min {
                            index = second;
                        } else {
                            self.stack.push((second, t_plane, t_max));
                            index = first;
                            t_max = t_plane;
                        }
                    }
                    KdNode::Leaf { first, count } => {
                        if *count > 0 {
                            return Some((*first, *count, t_min, t_max));
                        }
                        break;
                    }
                }
            }
        }
        None
    }
}

impl Accelerator for KdTreeAccelerator {
    fn intersect(&self, ray: &Ray, t_max: f32) -> Option<IntersectData<'_>> {
        let mut traversal = Traversal::new(self, ray, t_max)?;
        let mut best: Option<(u32, Hit)> = None;
        let mut t_best = t_max;
        while let Some((first, count, t_enter, _)) = traversal.next_leaf() {
            // Everything further along the ray is behind the current hit.
            if t_best < t_enter {
                break;
            }
            for &pi in self.leaf_range(first, count) {
                if let Some(hit) = self.prims[pi as usize].intersect(ray) {
                    if hit.t >= ray.tmin && hit.t < t_best {
                        t_best = hit.t;
                        best = Some((pi, hit));
                    }
                }
            }
        }
        best.map(|(pi, hit)| IntersectData {
            t: hit.t,
            primitive: self.prims[pi as usize].as_ref(),
            u: hit.u,
            v: hit.v,
        })
    }

    fn intersect_any(&self, ray: &Ray, t_max: f32, shadow_bias: f32) -> Option<IntersectData<'_>> {
        let t_min = ray.tmin.max(shadow_bias);
        let mut traversal = Traversal::new(self, ray, t_max)?;
        while let Some((first, count, _, _)) = traversal.next_leaf() {
            for &pi in self.leaf_range(first, count) {
                if let Some(hit) = self.prims[pi as usize].intersect(ray) {
                    if hit.t > t_min && hit.t <= t_max {
                        return Some(IntersectData {
                            t: hit.t,
                            primitive: self.prims[pi as usize].as_ref(),
                            u: hit.u,
                            v: hit.v,
                        });
                    }
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
        // Straddling primitives show up in several leaves; count each once.
        let mut counted: SmallVec<[u32; 16]> = SmallVec::new();

        let Some(mut traversal) = Traversal::new(self, ray, t_max) else {
            return TransparentShadow { hit: None, filter };
        };
        while let Some((first, count, _, _)) = traversal.next_leaf() {
            for &pi in self.leaf_range(first, count) {
                let Some(hit) = self.prims[pi as usize].intersect(ray) else {
                    continue;
                };
                if hit.t <= t_min || hit.t > t_max {
                    continue;
                }
                let primitive = self.prims[pi as usize].as_ref();
                let blocked = IntersectData {
                    t: hit.t,
                    primitive,
                    u: hit.u,
                    v: hit.v,
                };
                if !primitive.material().is_transparent() {
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
                let sp = primitive.surface(ray.point_at(hit.t), &hit);
                filter *= sp.material.transparency(data, &sp, wo);
                depth += 1;
                if luminance(filter) < FILTER_LUMINANCE_MIN {
                    return TransparentShadow {
                        hit: Some(blocked),
                        filter,
                    };
                }
            }
        }
        TransparentShadow { hit: None, filter }
    }

    fn bound(&self) -> Bound {
        self.bound
    }
}
