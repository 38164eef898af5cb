//! k-d Tree Accelerator Tests
//!
//! Tests for:
//! - Agreement between the k-d tree and the brute-force oracle
//! - Any-hit being a subset of closest-hit
//! - Degenerate ray ranges
//! - Factory fallback on unknown accelerator types

use std::sync::Arc;

use glam::{Vec3, vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use prism::Accelerator;
use prism::accelerator::{SimpleTestAccelerator, create_accelerator};
use prism::geometry::primitive::FacePrimitive;
use prism::geometry::{MeshObject, Primitive, Ray};
use prism::material::default_material;
use prism::param::ParamMap;
use prism::scene::MaterialKey;

const EPSILON: f32 = 1e-5;

fn random_soup(n: usize, seed: u64) -> Vec<Arc<dyn Primitive>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut mesh = MeshObject::new("soup", 0);
    for _ in 0..n {
        let base = vec3(
            rng.random::<f32>() * 10.0 - 5.0,
            rng.random::<f32>() * 10.0 - 5.0,
            rng.random::<f32>() * 10.0 - 5.0,
        );
        let i = mesh.add_vertex(base) as u32;
        mesh.add_vertex(base + vec3(rng.random::<f32>(), rng.random::<f32>() * 0.5, 0.2));
        mesh.add_vertex(base + vec3(0.2, rng.random::<f32>(), rng.random::<f32>() * 0.5));
        mesh.add_face([i, i + 1, i + 2], None, MaterialKey::default())
            .unwrap();
    }
    let mesh = Arc::new(mesh);
    let material = default_material();
    (0..n as u32)
        .map(|f| Arc::new(FacePrimitive::new(mesh.clone(), f, material.clone())) as Arc<dyn Primitive>)
        .collect()
}

fn random_ray(rng: &mut SmallRng) -> Ray {
    let from = vec3(
        rng.random::<f32>() * 16.0 - 8.0,
        rng.random::<f32>() * 16.0 - 8.0,
        rng.random::<f32>() * 16.0 - 8.0,
    );
    let dir = vec3(
        rng.random::<f32>() * 2.0 - 1.0,
        rng.random::<f32>() * 2.0 - 1.0,
        rng.random::<f32>() * 2.0 - 1.0,
    )
    .normalize_or_zero();
    let dir = if dir == Vec3::ZERO { Vec3::Z } else { dir };
    Ray::new(from, dir)
}

// ============================================================================
// k-d vs brute force
// ============================================================================

#[test]
fn kdtree_matches_brute_force() {
    let prims = random_soup(2_000, 42);
    let kdtree = create_accelerator(prims.clone(), &ParamMap::new());
    let brute = SimpleTestAccelerator::new(prims);

    let mut rng = SmallRng::seed_from_u64(1337);
    let mut hits = 0;
    for _ in 0..5_000 {
        let ray = random_ray(&mut rng);
        let a = kdtree.intersect(&ray, f32::INFINITY);
        let b = brute.intersect(&ray, f32::INFINITY);
        match (a, b) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                hits += 1;
                assert!(
                    (a.t - b.t).abs() < EPSILON,
                    "t mismatch: {} vs {}",
                    a.t,
                    b.t
                );
                assert!(
                    std::ptr::addr_eq(a.primitive, b.primitive),
                    "different primitive for the same ray"
                );
            }
            (a, b) => panic!(
                "hit disagreement: kdtree={:?} brute={:?}",
                a.map(|h| h.t),
                b.map(|h| h.t)
            ),
        }
    }
    assert!(hits > 100, "scene too sparse to be a meaningful test");
}

#[test]
fn any_hit_implies_closest_hit() {
    let prims = random_soup(500, 7);
    let kdtree = create_accelerator(prims, &ParamMap::new());

    let mut rng = SmallRng::seed_from_u64(99);
    for _ in 0..2_000 {
        let ray = random_ray(&mut rng);
        if kdtree.intersect_any(&ray, f32::INFINITY, 0.0).is_some() {
            assert!(kdtree.intersect(&ray, f32::INFINITY).is_some());
        }
    }
}

#[test]
fn shrinking_t_max_drops_hits() {
    let prims = random_soup(500, 21);
    let kdtree = create_accelerator(prims, &ParamMap::new());

    let mut rng = SmallRng::seed_from_u64(5);
    for _ in 0..1_000 {
        let ray = random_ray(&mut rng);
        if let Some(hit) = kdtree.intersect(&ray, f32::INFINITY) {
            assert!(kdtree.intersect(&ray, hit.t * 0.5).is_none_or(|h| h.t < hit.t));
        }
    }
}

// ============================================================================
// Edge cases
// ============================================================================

#[test]
fn inverted_range_returns_no_hit() {
    let prims = random_soup(100, 3);
    let kdtree = create_accelerator(prims, &ParamMap::new());
    let mut ray = Ray::new(vec3(0.0, 0.0, -20.0), Vec3::Z);
    ray.tmin = 5.0;
    ray.tmax = 1.0;
    assert!(kdtree.closest_hit(&ray).is_none());
}

#[test]
fn unknown_type_falls_back_to_kdtree() {
    let prims = random_soup(200, 12);
    let mut params = ParamMap::new();
    params.set_string("type", "octree");
    let accelerator = create_accelerator(prims.clone(), &params);
    let brute = SimpleTestAccelerator::new(prims);

    let mut rng = SmallRng::seed_from_u64(8);
    for _ in 0..500 {
        let ray = random_ray(&mut rng);
        assert_eq!(
            accelerator.intersect(&ray, f32::INFINITY).is_some(),
            brute.intersect(&ray, f32::INFINITY).is_some()
        );
    }
}
