//! Error Types
//!
//! This module defines the error types used throughout the renderer.
//!
//! # Overview
//!
//! The main error type [`PrismError`] covers all failure modes including:
//! - Scene configuration and factory errors
//! - Geometry-state violations of the build bracket
//! - Image output errors
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for `std::result::Result<T, PrismError>`.

use thiserror::Error;

/// The main error type for the Prism renderer.
///
/// Each variant provides specific context about what went wrong. Configuration
/// errors abort the render before it starts; per-ray numerical corner cases are
/// never surfaced here (they map to zero contributions instead).
#[derive(Error, Debug)]
pub enum PrismError {
    // ========================================================================
    // Configuration & Factory Errors
    // ========================================================================
    /// A factory was asked for a type string it does not know and has no safe default.
    #[error("Unknown {kind} type: '{type_name}'")]
    UnknownType {
        /// The registry that was queried (e.g. "integrator", "format")
        kind: &'static str,
        /// The unrecognized type string
        type_name: String,
    },

    /// A required parameter was missing from a parameter map.
    #[error("Missing parameter '{key}' for {context}")]
    MissingParam {
        /// The absent key
        key: &'static str,
        /// What was being configured
        context: &'static str,
    },

    /// The named resource does not exist in the scene.
    #[error("No {kind} named '{name}' in scene")]
    NotFound {
        /// Resource table that was searched
        kind: &'static str,
        /// The requested name
        name: String,
    },

    /// A resource name was registered twice.
    #[error("Duplicate {kind} name: '{name}'")]
    DuplicateName {
        /// Resource table involved
        kind: &'static str,
        /// The clashing name
        name: String,
    },

    // ========================================================================
    // Geometry State Errors
    // ========================================================================
    /// A geometry-bracket call arrived in the wrong scene state.
    #[error("Invalid geometry state: {0}")]
    GeometryState(String),

    /// A mesh index referenced data outside the object's pools.
    #[error("Mesh index out of bounds: {context} (index: {index})")]
    MeshIndexOutOfBounds {
        /// Description of the pool being indexed
        context: &'static str,
        /// The invalid index
        index: usize,
    },

    // ========================================================================
    // Render Setup Errors
    // ========================================================================
    /// The scene is not renderable (no camera, no integrator, empty film, ...).
    #[error("Render setup incomplete: {0}")]
    SetupIncomplete(&'static str),

    // ========================================================================
    // Output Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Image encoding error.
    #[error("Image encode error: {0}")]
    ImageEncodeError(String),
}

impl From<image::ImageError> for PrismError {
    fn from(err: image::ImageError) -> Self {
        PrismError::ImageEncodeError(err.to_string())
    }
}

/// Alias for `Result<T, PrismError>`.
pub type Result<T> = std::result::Result<T, PrismError>;
