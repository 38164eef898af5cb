//! Scene and Render Pipeline Tests
//!
//! Tests for:
//! - Instance transforms matching explicitly transformed geometry
//! - The embedding interface driving a full render
//! - Cooperative cancellation leaving a readable partial film
//! - Factory failure modes surfacing as call failures

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{Mat4, Vec3, vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use prism::geometry::Ray;
use prism::interface::Interface;
use prism::param::ParamMap;
use prism::scene::Scene;

const EPSILON: f32 = 1e-5;

// ============================================================================
// Instancing
// ============================================================================

fn triangle() -> [Vec3; 3] {
    [
        vec3(-1.0, 0.0, 0.0),
        vec3(1.0, 0.0, 0.0),
        vec3(0.0, 1.5, 0.0),
    ]
}

fn scene_with_instance(matrix: Mat4) -> Scene {
    let mut scene = Scene::new();
    scene.start_geometry().unwrap();
    scene.create_object("base", &ParamMap::new()).unwrap();
    for v in triangle() {
        scene.add_vertex(v).unwrap();
    }
    scene.add_face([0, 1, 2], None).unwrap();
    scene.end_object().unwrap();
    scene.add_instance("base", matrix).unwrap();
    scene.end_geometry().unwrap();
    scene.setup(&ParamMap::new()).unwrap();
    scene
}

fn scene_with_explicit(matrix: Mat4) -> Scene {
    let mut scene = Scene::new();
    scene.start_geometry().unwrap();
    scene.create_object("base", &ParamMap::new()).unwrap();
    for v in triangle() {
        scene.add_vertex(v).unwrap();
    }
    scene.add_face([0, 1, 2], None).unwrap();
    scene.end_object().unwrap();
    scene.create_object("explicit", &ParamMap::new()).unwrap();
    for v in triangle() {
        scene.add_vertex(matrix.transform_point3(v)).unwrap();
    }
    scene.add_face([0, 1, 2], None).unwrap();
    scene.end_object().unwrap();
    scene.end_geometry().unwrap();
    scene.setup(&ParamMap::new()).unwrap();
    scene
}

#[test]
fn instance_matches_explicit_transform() {
    // Translation, rotation and non-uniform scale in one transform.
    let matrix = Mat4::from_translation(vec3(30.0, 1.0, 2.0))
        * Mat4::from_rotation_y(0.7)
        * Mat4::from_scale(vec3(1.5, 0.8, 1.2));
    let instanced = scene_with_instance(matrix);
    let explicit = scene_with_explicit(matrix);

    let mut rng = SmallRng::seed_from_u64(60);
    let mut hits = 0;
    for _ in 0..2_000 {
        // Aim at the transformed triangle's neighborhood, away from the base.
        let from = vec3(
            30.0 + rng.random::<f32>() * 4.0 - 2.0,
            1.0 + rng.random::<f32>() * 4.0 - 2.0,
            8.0,
        );
        let to = vec3(
            30.0 + rng.random::<f32>() * 3.0 - 1.5,
            1.0 + rng.random::<f32>() * 2.0 - 0.5,
            2.0,
        );
        let ray = Ray::new(from, (to - from).normalize());

        let a = instanced.accelerator().unwrap().closest_hit(&ray);
        let b = explicit.accelerator().unwrap().closest_hit(&ray);
        match (a, b) {
            (None, None) => {}
            (Some((sa, ta)), Some((sb, tb))) => {
                hits += 1;
                assert!((ta - tb).abs() < EPSILON, "t mismatch {ta} vs {tb}");
                assert!((sa.p - sb.p).length() < EPSILON * 10.0);
                assert!(
                    (sa.ng - sb.ng).length() < 1e-3,
                    "geometric normal mismatch {:?} vs {:?}",
                    sa.ng,
                    sb.ng
                );
            }
            (a, b) => panic!(
                "instance/explicit disagreement: {:?} vs {:?}",
                a.map(|x| x.1),
                b.map(|x| x.1)
            ),
        }
    }
    assert!(hits > 50, "too few hits to be meaningful: {hits}");
}

// ============================================================================
// Full pipeline through the interface
// ============================================================================

/// Floor quad, point light, camera looking down the -Z axis.
fn build_demo(interface: &mut Interface, samples: i32) {
    assert!(interface.start_geometry());
    assert!(interface.create_object("floor"));
    interface.add_vertex(-5.0, 0.0, -5.0);
    interface.add_vertex(5.0, 0.0, -5.0);
    interface.add_vertex(5.0, 0.0, 5.0);
    interface.add_vertex(-5.0, 0.0, 5.0);
    assert!(interface.add_face(0, 1, 2));
    assert!(interface.add_face(0, 2, 3));
    assert!(interface.end_object());
    assert!(interface.end_geometry());

    interface.params_clear_all();
    interface.params_set_string("type", "point");
    interface.params_set_vector("from", 0.0, 3.0, 0.0);
    interface.params_set_color("color", 1.0, 1.0, 1.0, 1.0);
    interface.params_set_float("power", 30.0);
    assert!(interface.create_light("key"));

    interface.params_clear_all();
    interface.params_set_string("type", "perspective");
    interface.params_set_vector("from", 0.0, 2.0, 3.0);
    interface.params_set_vector("to", 0.0, 0.0, 0.0);
    interface.params_set_float("fov", 60.0);
    interface.params_set_int("resx", 32);
    interface.params_set_int("resy", 32);
    assert!(interface.create_camera("cam"));

    interface.params_clear_all();
    interface.params_set_string("type", "directlighting");
    assert!(interface.create_integrator("direct"));

    interface.params_clear_all();
    interface.params_set_string("type", "kdtree");
    interface.params_set_int("samples", samples);
    interface.params_set_int("tile_size", 8);
    assert!(interface.setup_render());
}

#[test]
fn interface_renders_a_lit_floor() {
    let mut interface = Interface::new();
    build_demo(&mut interface, 4);
    assert!(interface.render(None));

    let film = interface.film().expect("film after render");
    // The image center looks at the lit floor below the light.
    let center = film.pixel(16, 20);
    assert!(center.x > 0.0, "lit floor pixel is black: {center:?}");
    assert!((center.w - 1.0).abs() < 1e-5, "floor hit must be opaque");
    // The top rows see past the floor into the background.
    let sky = film.pixel(16, 0);
    assert_eq!(sky.w, 0.0, "background alpha must be zero: {sky:?}");
}

#[test]
fn cancellation_keeps_partial_film_readable() {
    let mut interface = Interface::new();
    build_demo(&mut interface, 16);
    let control = interface.render_control();

    let seen = AtomicUsize::new(0);
    let progress = move |_tag: &str, current: usize, total: usize| {
        seen.fetch_add(1, Ordering::Relaxed);
        if current >= total / 2 {
            control.cancel();
        }
    };
    let progress_ref: &prism::render::ProgressCallback = &progress;
    let finished = interface.render(Some(progress_ref));
    assert!(!finished, "render must report cancellation");

    // The film exists and is fully readable even though tiles are missing.
    let film = interface.film().expect("partial film after cancel");
    let snapshot = film.snapshot();
    assert_eq!(snapshot.len(), 32 * 32);
    assert!(snapshot.iter().all(|c| c.x.is_finite()));
}

// ============================================================================
// Factory failure modes
// ============================================================================

#[test]
fn unknown_integrator_fails_creation() {
    let mut interface = Interface::new();
    interface.params_set_string("type", "bidirectional");
    assert!(!interface.create_integrator("bad"));
}

#[test]
fn unknown_output_format_fails_creation() {
    let mut interface = Interface::new();
    interface.params_set_string("type", "webp");
    assert!(!interface.create_output("bad"));
}

#[test]
fn render_without_setup_fails() {
    let mut interface = Interface::new();
    assert!(!interface.render(None));
}

#[test]
fn duplicate_object_name_fails() {
    let mut interface = Interface::new();
    assert!(interface.start_geometry());
    assert!(interface.create_object("mesh"));
    assert!(interface.end_object());
    assert!(!interface.create_object("mesh"));
}
