//! The embedding surface: a flat, string-and-primitive-typed API over the
//! scene, parameter builder, render loop and logging.
//!
//! Every call returns a plain success flag; diagnostics travel through the
//! `log` facade, which embedders can point at their own sink via
//! [`install_logger_callback`]. The parameter builder is stateful: `set`
//! calls write into the current map, or into the newest list entry between
//! `params_push_list` and `params_end_list`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use glam::{Mat4, vec2, vec3};
use log::{Level, LevelFilter, error, warn};
use parking_lot::Mutex;

use crate::format::{Format, create_format};
use crate::param::{ParamList, ParamMap};
use crate::render::{Film, OutputCallbacks, ProgressCallback, RenderControl};
use crate::scene::Scene;

// ============================================================================
// Logging
// ============================================================================

/// Verbosity levels of the embedding logger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Mute,
    Error,
    Warning,
    Info,
    Params,
    Verbose,
    Debug,
}

impl LogLevel {
    fn from_log(level: Level) -> Self {
        match level {
            Level::Error => Self::Error,
            Level::Warn => Self::Warning,
            Level::Info => Self::Info,
            Level::Debug => Self::Verbose,
            Level::Trace => Self::Debug,
        }
    }

    fn to_filter(self) -> LevelFilter {
        match self {
            Self::Mute => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warning => LevelFilter::Warn,
            Self::Info | Self::Params => LevelFilter::Info,
            Self::Verbose => LevelFilter::Debug,
            Self::Debug => LevelFilter::Trace,
        }
    }
}

/// Embedder log sink: `(level, timestamp_seconds, description)`.
pub type LoggerCallback = Box<dyn Fn(LogLevel, f64, &str) + Send + Sync>;

struct CallbackLogger {
    callback: Mutex<LoggerCallback>,
}

impl log::Log for CallbackLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let message = record.args().to_string();
        (self.callback.lock())(LogLevel::from_log(record.level()), timestamp, &message);
    }

    fn flush(&self) {}
}

/// Routes the `log` facade into an embedder callback. May be called once per
/// process; later calls fail with `false` because a logger is already
/// installed.
pub fn install_logger_callback(callback: LoggerCallback, verbosity: LogLevel) -> bool {
    let installed = log::set_boxed_logger(Box::new(CallbackLogger {
        callback: Mutex::new(callback),
    }))
    .is_ok();
    if installed {
        log::set_max_level(verbosity.to_filter());
    } else {
        warn!("A logger is already installed; callback logger not attached");
    }
    installed
}

// ============================================================================
// Interface
// ============================================================================

struct Output {
    name: String,
    format: Box<dyn Format>,
    path: PathBuf,
}

/// The embedding API object. One per scene.
pub struct Interface {
    scene: Scene,
    params: ParamMap,
    node_params: ParamList,
    in_list: bool,
    outputs: Vec<Output>,
    output_callbacks: Option<OutputCallbacks>,
    control: Arc<RenderControl>,
    film: Option<Film>,
}

impl Default for Interface {
    fn default() -> Self {
        Self::new()
    }
}

impl Interface {
    pub fn new() -> Self {
        Self {
            scene: Scene::new(),
            params: ParamMap::new(),
            node_params: Vec::new(),
            in_list: false,
            outputs: Vec::new(),
            output_callbacks: None,
            control: Arc::new(RenderControl::new()),
            film: None,
        }
    }

    /// Resets to a fresh scene, dropping all resources and outputs.
    pub fn create_scene(&mut self) {
        self.clear_all();
    }

    pub fn clear_all(&mut self) {
        self.scene.clear();
        self.outputs.clear();
        self.output_callbacks = None;
        self.film = None;
        self.params_clear_all();
    }

    /// Installs live display hooks invoked as tiles complete.
    pub fn set_output_callbacks(&mut self, callbacks: OutputCallbacks) {
        self.output_callbacks = Some(callbacks);
    }

    /// The cancellation handle; cloneable into other threads.
    pub fn render_control(&self) -> Arc<RenderControl> {
        self.control.clone()
    }

    /// The film of the most recent render, if any.
    pub fn film(&self) -> Option<&Film> {
        self.film.as_ref()
    }

    // ------------------------------------------------------------------
    // Parameter builder
    // ------------------------------------------------------------------

    fn target(&mut self) -> &mut ParamMap {
        if self.in_list && !self.node_params.is_empty() {
            let last = self.node_params.len() - 1;
            &mut self.node_params[last]
        } else {
            &mut self.params
        }
    }

    pub fn params_set_bool(&mut self, key: &str, value: bool) {
        self.target().set_bool(key, value);
    }

    pub fn params_set_int(&mut self, key: &str, value: i32) {
        self.target().set_int(key, value);
    }

    pub fn params_set_float(&mut self, key: &str, value: f32) {
        self.target().set_float(key, value);
    }

    pub fn params_set_string(&mut self, key: &str, value: &str) {
        self.target().set_string(key, value);
    }

    pub fn params_set_vector(&mut self, key: &str, x: f32, y: f32, z: f32) {
        self.target().set_vector(key, vec3(x, y, z));
    }

    pub fn params_set_color(&mut self, key: &str, r: f32, g: f32, b: f32, a: f32) {
        self.target().set_color(key, r, g, b, a);
    }

    /// Stores a matrix given in row-major order; `transpose` flips it for
    /// exporters that hand over column-major data.
    pub fn params_set_matrix(&mut self, key: &str, rows: [[f32; 4]; 4], transpose: bool) {
        let matrix = Mat4::from_cols_array_2d(&rows).transpose();
        self.target().set_matrix(key, matrix, transpose);
    }

    /// Starts a new shader-node entry; subsequent `params_set_*` calls write
    /// into it until [`Interface::params_end_list`].
    pub fn params_push_list(&mut self) {
        self.node_params.push(ParamMap::new());
        self.in_list = true;
    }

    pub fn params_end_list(&mut self) {
        self.in_list = false;
    }

    pub fn params_clear_all(&mut self) {
        self.params.clear();
        self.node_params.clear();
        self.in_list = false;
    }

    // ------------------------------------------------------------------
    // Geometry bracket
    // ------------------------------------------------------------------

    pub fn start_geometry(&mut self) -> bool {
        report(self.scene.start_geometry())
    }

    pub fn end_geometry(&mut self) -> bool {
        report(self.scene.end_geometry())
    }

    pub fn end_object(&mut self) -> bool {
        report(self.scene.end_object())
    }

    /// Adds a vertex; returns its dense index or -1 on error.
    pub fn add_vertex(&mut self, x: f32, y: f32, z: f32) -> i32 {
        match self.scene.add_vertex(vec3(x, y, z)) {
            Ok(index) => index as i32,
            Err(err) => {
                error!("{err}");
                -1
            }
        }
    }

    /// Adds a vertex with original coordinates; returns its index or -1.
    pub fn add_vertex_orco(&mut self, x: f32, y: f32, z: f32, ox: f32, oy: f32, oz: f32) -> i32 {
        match self.scene.add_vertex_orco(vec3(x, y, z), vec3(ox, oy, oz)) {
            Ok(index) => index as i32,
            Err(err) => {
                error!("{err}");
                -1
            }
        }
    }

    /// Attaches a normal to the most recently added vertex.
    pub fn add_normal(&mut self, nx: f32, ny: f32, nz: f32) -> bool {
        match self.scene.add_normal(vec3(nx, ny, nz)) {
            Ok(ok) => ok,
            Err(err) => {
                error!("{err}");
                false
            }
        }
    }

    /// Adds a UV pair; returns its index or -1.
    pub fn add_uv(&mut self, u: f32, v: f32) -> i32 {
        match self.scene.add_uv(vec2(u, v)) {
            Ok(index) => index as i32,
            Err(err) => {
                error!("{err}");
                -1
            }
        }
    }

    pub fn add_face(&mut self, a: u32, b: u32, c: u32) -> bool {
        report(self.scene.add_face([a, b, c], None))
    }

    pub fn add_face_uv(&mut self, a: u32, b: u32, c: u32, uv_a: u32, uv_b: u32, uv_c: u32) -> bool {
        report(self.scene.add_face([a, b, c], Some([uv_a, uv_b, uv_c])))
    }

    pub fn smooth_mesh(&mut self, name: &str, angle_deg: f32) -> bool {
        report(self.scene.smooth_mesh(name, angle_deg))
    }

    /// Instances a previously finished object under a row-major transform.
    pub fn add_instance(&mut self, base_name: &str, rows: [[f32; 4]; 4]) -> bool {
        let matrix = Mat4::from_cols_array_2d(&rows).transpose();
        report(self.scene.add_instance(base_name, matrix))
    }

    // ------------------------------------------------------------------
    // Object creation (consumes the current parameter map)
    // ------------------------------------------------------------------

    pub fn create_object(&mut self, name: &str) -> bool {
        let params = self.params.clone();
        report(self.scene.create_object(name, &params).map(|_| ()))
    }

    pub fn create_material(&mut self, name: &str) -> bool {
        let params = self.params.clone();
        let nodes = self.node_params.clone();
        self.scene.create_material(name, &params, &nodes);
        true
    }

    pub fn set_current_material(&mut self, name: &str) -> bool {
        report(self.scene.set_current_material(name))
    }

    pub fn create_texture(&mut self, name: &str) -> bool {
        let params = self.params.clone();
        report(self.scene.create_texture(name, &params).map(|_| ()))
    }

    pub fn create_light(&mut self, name: &str) -> bool {
        let params = self.params.clone();
        report(self.scene.create_light(name, &params).map(|_| ()))
    }

    pub fn create_camera(&mut self, name: &str) -> bool {
        let params = self.params.clone();
        report(self.scene.create_camera(name, &params).map(|_| ()))
    }

    pub fn create_background(&mut self, name: &str) -> bool {
        let params = self.params.clone();
        report(self.scene.create_background(name, &params))
    }

    pub fn create_integrator(&mut self, name: &str) -> bool {
        let params = self.params.clone();
        report(self.scene.create_integrator(name, &params))
    }

    /// Registers a file output; the current parameters supply `type` and
    /// `path`.
    pub fn create_output(&mut self, name: &str) -> bool {
        let Some(format) = create_format(&self.params) else {
            return false;
        };
        let path = match self.params.get_str("path") {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(format!("{name}.{}", format.extension())),
        };
        self.outputs.push(Output {
            name: name.to_string(),
            format,
            path,
        });
        true
    }

    // ------------------------------------------------------------------
    // Render lifecycle
    // ------------------------------------------------------------------

    /// Builds the accelerator and locks in render parameters.
    pub fn setup_render(&mut self) -> bool {
        let params = self.params.clone();
        report(self.scene.setup(&params))
    }

    /// Renders the frame, flushes outputs, and keeps the film readable via
    /// [`Interface::film`]. Returns `false` on setup errors or cancellation.
    pub fn render(&mut self, progress: Option<&ProgressCallback>) -> bool {
        self.control.reset();
        let film = match self
            .scene
            .render(&self.control, progress, self.output_callbacks.as_ref())
        {
            Ok(film) => film,
            Err(err) => {
                error!("{err}");
                return false;
            }
        };
        for output in &self.outputs {
            if let Err(err) = output.format.save(&film, &output.path) {
                error!("Output '{}': {err}", output.name);
            }
        }
        self.film = Some(film);
        !self.control.is_cancelled()
    }

    /// Requests cooperative cancellation; workers stop at the next tile.
    pub fn cancel(&self) {
        self.control.cancel();
    }
}

fn report(result: crate::errors::Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            error!("{err}");
            false
        }
    }
}
