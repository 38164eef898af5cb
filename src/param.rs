//! Parameter Maps
//!
//! The configuration vocabulary used at every component boundary: a mapping
//! from string keys to tagged values. Factories receive a [`ParamMap`] plus,
//! for materials with shader trees, an ordered list of additional maps (one
//! per shader node description).

use glam::{Mat4, Vec3};
use rustc_hash::FxHashMap;

use crate::color::Rgb;
use crate::errors::{PrismError, Result};

/// A tagged configuration value.
#[derive(Clone, Debug, PartialEq)]
pub enum Param {
    Bool(bool),
    Int(i32),
    Float(f32),
    Str(String),
    Vector(Vec3),
    /// RGBA color; alpha defaults to 1 when set from an RGB triple.
    Color([f32; 4]),
    Matrix(Mat4),
}

/// String-keyed parameter map.
#[derive(Clone, Debug, Default)]
pub struct ParamMap {
    map: FxHashMap<String, Param>,
}

/// An ordered sequence of parameter maps describing a shader tree.
pub type ParamList = Vec<ParamMap>;

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn set(&mut self, key: impl Into<String>, value: Param) {
        self.map.insert(key.into(), value);
    }

    pub fn set_bool(&mut self, key: impl Into<String>, v: bool) {
        self.set(key, Param::Bool(v));
    }

    pub fn set_int(&mut self, key: impl Into<String>, v: i32) {
        self.set(key, Param::Int(v));
    }

    pub fn set_float(&mut self, key: impl Into<String>, v: f32) {
        self.set(key, Param::Float(v));
    }

    pub fn set_string(&mut self, key: impl Into<String>, v: impl Into<String>) {
        self.set(key, Param::Str(v.into()));
    }

    pub fn set_vector(&mut self, key: impl Into<String>, v: Vec3) {
        self.set(key, Param::Vector(v));
    }

    pub fn set_color(&mut self, key: impl Into<String>, r: f32, g: f32, b: f32, a: f32) {
        self.set(key, Param::Color([r, g, b, a]));
    }

    /// Stores a 4×4 matrix. With `transpose` set, the input is interpreted as
    /// column-major (transposed) data and flipped before storage.
    pub fn set_matrix(&mut self, key: impl Into<String>, m: Mat4, transpose: bool) {
        self.set(key, Param::Matrix(if transpose { m.transpose() } else { m }));
    }

    pub fn get(&self, key: &str) -> Option<&Param> {
        self.map.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.map.get(key) {
            Some(Param::Bool(v)) => Some(*v),
            Some(Param::Int(v)) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.map.get(key) {
            Some(Param::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Floats also accept integer values, which scene exporters commonly emit
    /// for whole-number parameters.
    pub fn get_float(&self, key: &str) -> Option<f32> {
        match self.map.get(key) {
            Some(Param::Float(v)) => Some(*v),
            Some(Param::Int(v)) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.map.get(key) {
            Some(Param::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_vector(&self, key: &str) -> Option<Vec3> {
        match self.map.get(key) {
            Some(Param::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    /// Colors also accept plain vectors; alpha defaults to 1.
    pub fn get_color(&self, key: &str) -> Option<Rgb> {
        match self.map.get(key) {
            Some(Param::Color(c)) => Some(Rgb::new(c[0], c[1], c[2])),
            Some(Param::Vector(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_alpha(&self, key: &str) -> Option<f32> {
        match self.map.get(key) {
            Some(Param::Color(c)) => Some(c[3]),
            _ => None,
        }
    }

    pub fn get_matrix(&self, key: &str) -> Option<Mat4> {
        match self.map.get(key) {
            Some(Param::Matrix(m)) => Some(*m),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Defaulted accessors, the common factory pattern
    // ------------------------------------------------------------------

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn int_or(&self, key: &str, default: i32) -> i32 {
        self.get_int(key).unwrap_or(default)
    }

    pub fn float_or(&self, key: &str, default: f32) -> f32 {
        self.get_float(key).unwrap_or(default)
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_str(key).unwrap_or(default)
    }

    pub fn vector_or(&self, key: &str, default: Vec3) -> Vec3 {
        self.get_vector(key).unwrap_or(default)
    }

    pub fn color_or(&self, key: &str, default: Rgb) -> Rgb {
        self.get_color(key).unwrap_or(default)
    }

    /// Fetches a string parameter that a factory cannot proceed without.
    pub fn require_str(&self, key: &'static str, context: &'static str) -> Result<&str> {
        self.get_str(key)
            .ok_or(PrismError::MissingParam { key, context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_roundtrip() {
        let mut p = ParamMap::new();
        p.set_bool("flag", true);
        p.set_int("count", 7);
        p.set_float("scale", 2.5);
        p.set_string("type", "kdtree");
        p.set_vector("dir", Vec3::X);
        p.set_color("tint", 0.5, 0.25, 0.125, 0.75);

        assert_eq!(p.get_bool("flag"), Some(true));
        assert_eq!(p.get_int("count"), Some(7));
        assert_eq!(p.get_float("scale"), Some(2.5));
        assert_eq!(p.get_str("type"), Some("kdtree"));
        assert_eq!(p.get_vector("dir"), Some(Vec3::X));
        assert_eq!(p.get_color("tint"), Some(Rgb::new(0.5, 0.25, 0.125)));
        assert_eq!(p.get_alpha("tint"), Some(0.75));
    }

    #[test]
    fn int_widens_to_float() {
        let mut p = ParamMap::new();
        p.set_int("depth", 12);
        assert_eq!(p.get_float("depth"), Some(12.0));
    }

    #[test]
    fn matrix_transpose_on_set() {
        let m = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, //
            5.0, 6.0, 7.0, 8.0, //
            9.0, 10.0, 11.0, 12.0, //
            13.0, 14.0, 15.0, 16.0,
        ]);
        let mut p = ParamMap::new();
        p.set_matrix("a", m, false);
        p.set_matrix("b", m, true);
        assert_eq!(p.get_matrix("a"), Some(m));
        assert_eq!(p.get_matrix("b"), Some(m.transpose()));
    }
}
