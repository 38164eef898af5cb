//! The render phase: tile scheduling, the worker pool and cancellation.
//!
//! Tiles are dispatched onto the rayon pool; every worker owns its scratch
//! and RNG and reads the immutable scene through the render context. A shared
//! atomic cancellation flag is polled between tiles, so cancelling returns
//! promptly and leaves the partially filled film readable.

pub mod film;
pub mod integrator;
pub mod scratch;

pub use film::{Film, Pixel};
pub use integrator::{DirectLightIntegrator, RenderContext, SurfaceIntegrator, create_integrator};
pub use scratch::{RenderData, Scratch};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::camera::Camera;

/// Cooperative cancellation flag shared between the caller and the pool.
#[derive(Debug, Default)]
pub struct RenderControl {
    cancel: AtomicBool,
}

impl RenderControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.cancel.store(false, Ordering::Relaxed);
    }
}

/// Progress callback: `(tag, current, total)`.
pub type ProgressCallback = dyn Fn(&str, usize, usize) + Send + Sync;

/// Optional per-tile output hooks for embedders driving a live display.
///
/// `highlight` marks the rectangle about to render, `put_pixel` delivers
/// normalized pixels as tiles complete, `flush_area` closes a rectangle and
/// `flush` closes the frame.
#[derive(Default)]
pub struct OutputCallbacks {
    pub put_pixel: Option<Box<dyn Fn(u32, u32, crate::color::Rgba) + Send + Sync>>,
    pub flush_area: Option<Box<dyn Fn(u32, u32, u32, u32) + Send + Sync>>,
    pub flush: Option<Box<dyn Fn() + Send + Sync>>,
    pub highlight: Option<Box<dyn Fn(u32, u32, u32, u32) + Send + Sync>>,
}

/// Per-frame sampling parameters.
#[derive(Clone, Copy, Debug)]
pub struct FrameParams {
    pub samples_per_pixel: u32,
    pub tile_size: u32,
    pub time: f32,
    pub seed: u64,
    /// Scratch node-stack size: the maximum slot requirement declared across
    /// the scene's materials.
    pub node_slots: usize,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            samples_per_pixel: 16,
            tile_size: 32,
            time: 0.0,
            seed: 0,
            node_slots: 0,
        }
    }
}

#[derive(Clone, Copy)]
struct Tile {
    index: u64,
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

/// Renders one frame onto `film`. Returns `false` when cancelled; the film
/// then holds whatever tiles completed.
pub fn render_frame(
    ctx: &RenderContext<'_>,
    integrator: &dyn SurfaceIntegrator,
    camera: &dyn Camera,
    film: &Film,
    params: &FrameParams,
    control: &RenderControl,
    progress: Option<&ProgressCallback>,
    outputs: Option<&OutputCallbacks>,
) -> bool {
    let width = film.width();
    let height = film.height();
    let tile_size = params.tile_size.max(1);

    let mut tiles = Vec::new();
    let mut index = 0u64;
    for y0 in (0..height).step_by(tile_size as usize) {
        for x0 in (0..width).step_by(tile_size as usize) {
            tiles.push(Tile {
                index,
                x0,
                y0,
                x1: (x0 + tile_size).min(width),
                y1: (y0 + tile_size).min(height),
            });
            index += 1;
        }
    }
    let total = tiles.len();
    if let Some(progress) = progress {
        progress("render", 0, total);
    }
    let done = AtomicUsize::new(0);

    tiles.par_iter().for_each(|tile| {
        if control.is_cancelled() {
            return;
        }
        if let Some(highlight) = outputs.and_then(|o| o.highlight.as_ref()) {
            highlight(tile.x0, tile.y0, tile.x1, tile.y1);
        }
        render_tile(ctx, integrator, camera, film, params, tile);
        if let Some(outputs) = outputs {
            flush_tile(outputs, film, tile);
        }
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(progress) = progress {
            progress("render", finished, total);
        }
    });

    if let Some(flush) = outputs.and_then(|o| o.flush.as_ref()) {
        flush();
    }
    !control.is_cancelled()
}

/// Delivers a finished tile to the embedder's display hooks.
fn flush_tile(outputs: &OutputCallbacks, film: &Film, tile: &Tile) {
    if let Some(put_pixel) = outputs.put_pixel.as_ref() {
        for y in tile.y0..tile.y1 {
            for x in tile.x0..tile.x1 {
                put_pixel(x, y, film.pixel(x, y));
            }
        }
    }
    if let Some(flush_area) = outputs.flush_area.as_ref() {
        flush_area(tile.x0, tile.y0, tile.x1, tile.y1);
    }
}

/// Renders one tile into a private buffer and flushes it. Pixel and sample
/// order inside a tile is deterministic for a fixed seed.
fn render_tile(
    ctx: &RenderContext<'_>,
    integrator: &dyn SurfaceIntegrator,
    camera: &dyn Camera,
    film: &Film,
    params: &FrameParams,
    tile: &Tile,
) {
    let mut scratch = Scratch::with_slots(params.node_slots);
    let mut rng = SmallRng::seed_from_u64(params.seed ^ tile.index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let tile_width = (tile.x1 - tile.x0) as usize;
    let mut buffer = vec![Pixel::default(); tile_width * (tile.y1 - tile.y0) as usize];

    let spp = params.samples_per_pixel.max(1);
    for y in tile.y0..tile.y1 {
        for x in tile.x0..tile.x1 {
            let pixel =
                &mut buffer[(y - tile.y0) as usize * tile_width + (x - tile.x0) as usize];
            for _ in 0..spp {
                let (jx, jy) = if spp > 1 {
                    (rng.random::<f32>(), rng.random::<f32>())
                } else {
                    (0.5, 0.5)
                };
                let mut ray = camera.shoot_ray(x as f32 + jx, y as f32 + jy);
                ray.time = params.time;
                let mut data = RenderData::new(&mut scratch);
                data.time = params.time;
                pixel.add_sample(integrator.integrate(ctx, &ray, &mut data));
            }
        }
    }
    film.merge_tile(tile.x0, tile.y0, tile.x1, tile.y1, &buffer);
}
