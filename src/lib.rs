#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod accelerator;
pub mod background;
pub mod camera;
pub mod color;
pub mod errors;
pub mod format;
pub mod geometry;
pub mod interface;
pub mod light;
pub mod material;
pub mod param;
pub mod render;
pub mod scene;
pub mod shader;
pub mod texture;

pub use accelerator::{Accelerator, create_accelerator};
pub use color::{Rgb, Rgba};
pub use errors::{PrismError, Result};
pub use geometry::{Bound, DiffRay, Primitive, Ray, SurfacePoint};
pub use interface::{Interface, LogLevel, install_logger_callback};
pub use material::{BsdfFlags, BsdfSample, Material, SampleResult, ShinyDiffuseMaterial};
pub use param::{Param, ParamMap};
pub use render::{Film, RenderControl, RenderData, Scratch};
pub use scene::Scene;
