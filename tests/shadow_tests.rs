//! Shadow Query Tests
//!
//! Tests for:
//! - Opaque occlusion of a point light by a sphere mesh
//! - Shadow-bias protection against self-intersection
//! - Transparent-shadow filter accumulation across stacked glass panes
//! - Depth exhaustion and opaque blockers in transparent shadows

use glam::{Vec3, vec3};

use prism::geometry::Ray;
use prism::param::ParamMap;
use prism::scene::Scene;

const SHADOW_BIAS: f32 = 1e-4;

fn approx(a: f32, b: f32, eps: f32) -> bool {
    (a - b).abs() < eps
}

/// Adds a lat-long unit sphere to an open geometry bracket.
fn add_sphere(scene: &mut Scene, name: &str, center: Vec3, radius: f32, segments: u32) {
    scene.create_object(name, &ParamMap::new()).unwrap();
    let rings = segments;
    let mut indices = Vec::new();
    for ring in 0..=rings {
        let theta = std::f32::consts::PI * ring as f32 / rings as f32;
        for seg in 0..=segments {
            let phi = std::f32::consts::TAU * seg as f32 / segments as f32;
            let p = vec3(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            );
            indices.push(scene.add_vertex(center + p * radius).unwrap() as u32);
        }
    }
    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = indices[(ring * stride + seg) as usize];
            let b = indices[(ring * stride + seg + 1) as usize];
            let c = indices[((ring + 1) * stride + seg) as usize];
            let d = indices[((ring + 1) * stride + seg + 1) as usize];
            // Degenerate pole faces are skipped at primitive collection.
            let _ = scene.add_face([a, b, c], None);
            let _ = scene.add_face([b, d, c], None);
        }
    }
    scene.end_object().unwrap();
}

/// Adds an axis-aligned quad in the XY plane at depth `z`.
fn add_pane(scene: &mut Scene, name: &str, z: f32, half: f32) {
    scene.create_object(name, &ParamMap::new()).unwrap();
    let a = scene.add_vertex(vec3(-half, -half, z)).unwrap() as u32;
    let b = scene.add_vertex(vec3(half, -half, z)).unwrap() as u32;
    let c = scene.add_vertex(vec3(half, half, z)).unwrap() as u32;
    let d = scene.add_vertex(vec3(-half, half, z)).unwrap() as u32;
    scene.add_face([a, b, c], None).unwrap();
    scene.add_face([a, c, d], None).unwrap();
    scene.end_object().unwrap();
}

fn shadow_ray(from: Vec3, to: Vec3) -> Ray {
    let dir = (to - from).normalize();
    let mut ray = Ray::new(from, dir);
    ray.tmin = SHADOW_BIAS;
    ray.tmax = (to - from).length();
    ray
}

// ============================================================================
// Opaque shadows
// ============================================================================

#[test]
fn sphere_occludes_point_light() {
    let mut scene = Scene::new();
    scene.start_geometry().unwrap();
    add_sphere(&mut scene, "occluder", Vec3::ZERO, 1.0, 24);
    scene.end_geometry().unwrap();
    scene.setup(&ParamMap::new()).unwrap();
    let accelerator = scene.accelerator().unwrap();

    let light = vec3(0.0, 0.0, 5.0);

    // Points behind the sphere are shadowed.
    for p in [
        vec3(0.0, 0.0, -2.0),
        vec3(0.2, -0.1, -3.0),
        vec3(-0.3, 0.4, -1.5),
    ] {
        assert!(accelerator.is_shadowed(&shadow_ray(p, light), SHADOW_BIAS));
    }

    // Points beside the sphere see the light.
    for p in [vec3(3.0, 0.0, 0.0), vec3(0.0, -4.0, 0.0)] {
        assert!(!accelerator.is_shadowed(&shadow_ray(p, light), SHADOW_BIAS));
    }
}

#[test]
fn surface_point_does_not_self_shadow() {
    let mut scene = Scene::new();
    scene.start_geometry().unwrap();
    add_sphere(&mut scene, "occluder", Vec3::ZERO, 1.0, 24);
    scene.end_geometry().unwrap();
    scene.setup(&ParamMap::new()).unwrap();
    let accelerator = scene.accelerator().unwrap();

    let light = vec3(0.0, 0.0, 5.0);

    // Land on the lit side of the sphere, then trace toward the light.
    let probe = Ray::new(vec3(0.05, 0.02, 3.0), -Vec3::Z);
    let (sp, _t) = accelerator.closest_hit(&probe).expect("probe must hit");
    assert!(
        !accelerator.is_shadowed(&shadow_ray(sp.p, light), SHADOW_BIAS),
        "front surface point shadowed by its own primitive"
    );
}

// ============================================================================
// Transparent shadows
// ============================================================================

fn glass_scene(pane_count: u32, transparency: f32) -> Scene {
    let mut scene = Scene::new();

    let mut params = ParamMap::new();
    params.set_string("type", "shinydiffuse");
    params.set_float("transparency", transparency);
    params.set_float("transmit_filter", 0.0);
    scene.create_material("glass", &params, &Vec::new());
    scene.set_current_material("glass").unwrap();

    scene.start_geometry().unwrap();
    for i in 0..pane_count {
        add_pane(&mut scene, &format!("pane{i}"), 2.0 + 2.0 * i as f32, 4.0);
    }
    scene.end_geometry().unwrap();
    scene.setup(&ParamMap::new()).unwrap();
    scene
}

#[test]
fn three_panes_accumulate_filter() {
    let scene = glass_scene(3, 0.9);
    let accelerator = scene.accelerator().unwrap();

    // Off the pane diagonals, so each pane is hit by exactly one face.
    let from = vec3(0.3, 0.2, 0.0);
    let light = vec3(0.3, 0.2, 10.0);
    let (blocked, filter) =
        accelerator.is_shadowed_transparent(&shadow_ray(from, light), 5, SHADOW_BIAS, 0.0);
    assert!(!blocked, "transparent panes must not block the light");
    let expected = 0.9f32.powi(3);
    for channel in [filter.x, filter.y, filter.z] {
        assert!(
            approx(channel, expected, 1e-4),
            "filter {channel} != {expected}"
        );
    }
}

#[test]
fn depth_exhaustion_turns_opaque() {
    let scene = glass_scene(3, 0.9);
    let accelerator = scene.accelerator().unwrap();

    let from = vec3(0.3, 0.2, 0.0);
    let light = vec3(0.3, 0.2, 10.0);
    let (blocked, _filter) =
        accelerator.is_shadowed_transparent(&shadow_ray(from, light), 2, SHADOW_BIAS, 0.0);
    assert!(blocked, "exhausted depth must be treated as opaque");
}

#[test]
fn opaque_blocker_stops_transparent_shadow() {
    let mut scene = Scene::new();

    let mut params = ParamMap::new();
    params.set_string("type", "shinydiffuse");
    params.set_float("transparency", 0.9);
    params.set_float("transmit_filter", 0.0);
    scene.create_material("glass", &params, &Vec::new());

    scene.start_geometry().unwrap();
    scene.set_current_material("glass").unwrap();
    add_pane(&mut scene, "glass_pane", 2.0, 4.0);
    scene.set_current_material("default").unwrap();
    add_pane(&mut scene, "wall", 5.0, 4.0);
    scene.end_geometry().unwrap();
    scene.setup(&ParamMap::new()).unwrap();
    let accelerator = scene.accelerator().unwrap();

    let from = vec3(0.3, 0.2, 0.0);
    let light = vec3(0.3, 0.2, 10.0);
    let (blocked, _filter) =
        accelerator.is_shadowed_transparent(&shadow_ray(from, light), 5, SHADOW_BIAS, 0.0);
    assert!(blocked, "the opaque wall must block the light");

    // And the plain any-hit query agrees.
    assert!(accelerator.is_shadowed(&shadow_ray(from, light), SHADOW_BIAS));
}
