//! k-d tree build and traversal benchmarks.

use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Vec3, vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use prism::accelerator::{Accelerator, KdTreeAccelerator};
use prism::geometry::primitive::FacePrimitive;
use prism::geometry::{MeshObject, Primitive, Ray};
use prism::material::default_material;
use prism::param::ParamMap;
use prism::scene::MaterialKey;

fn random_soup(n: usize, seed: u64) -> Vec<Arc<dyn Primitive>> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut mesh = MeshObject::new("soup", 0);
    for _ in 0..n {
        let base = vec3(
            rng.random::<f32>() * 20.0 - 10.0,
            rng.random::<f32>() * 20.0 - 10.0,
            rng.random::<f32>() * 20.0 - 10.0,
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

fn bench_build(c: &mut Criterion) {
    let prims = random_soup(20_000, 1);
    let mut group = c.benchmark_group("kdtree_build");
    group.sample_size(10);
    group.bench_function("sequential_20k", |b| {
        b.iter(|| KdTreeAccelerator::new(prims.clone(), &ParamMap::new(), false));
    });
    group.bench_function("parallel_20k", |b| {
        b.iter(|| KdTreeAccelerator::new(prims.clone(), &ParamMap::new(), true));
    });
    group.finish();
}

fn bench_traversal(c: &mut Criterion) {
    let prims = random_soup(20_000, 1);
    let tree = KdTreeAccelerator::new(prims, &ParamMap::new(), false);
    let mut rng = SmallRng::seed_from_u64(2);
    let rays: Vec<Ray> = (0..1_000)
        .map(|_| {
            let from = vec3(
                rng.random::<f32>() * 30.0 - 15.0,
                rng.random::<f32>() * 30.0 - 15.0,
                rng.random::<f32>() * 30.0 - 15.0,
            );
            let dir = vec3(
                rng.random::<f32>() * 2.0 - 1.0,
                rng.random::<f32>() * 2.0 - 1.0,
                rng.random::<f32>() * 2.0 - 1.0,
            )
            .normalize_or_zero();
            Ray::new(from, if dir == Vec3::ZERO { Vec3::Z } else { dir })
        })
        .collect();

    c.bench_function("kdtree_closest_1k_rays", |b| {
        b.iter(|| {
            let mut hits = 0u32;
            for ray in &rays {
                if tree.intersect(ray, f32::INFINITY).is_some() {
                    hits += 1;
                }
            }
            hits
        });
    });
}

criterion_group!(benches, bench_build, bench_traversal);
criterion_main!(benches);
