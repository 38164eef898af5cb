//! Output image formats.
//!
//! The registry dispatches on a type string and wraps the `image` crate's
//! encoders; the codecs themselves stay external. LDR formats gamma-encode,
//! float formats store linear radiance.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use log::{error, info};

use crate::errors::{PrismError, Result};
use crate::param::ParamMap;
use crate::render::Film;

pub trait Format: Send + Sync {
    /// Canonical file extension, without the dot.
    fn extension(&self) -> &'static str;

    /// Encodes the film's normalized pixels to `path`.
    fn save(&self, film: &Film, path: &Path) -> Result<()>;
}

#[inline]
fn to_srgb8(linear: f32) -> u8 {
    (linear.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0 + 0.5) as u8
}

// ============================================================================
// LDR formats
// ============================================================================

pub struct PngFormat;

impl Format for PngFormat {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn save(&self, film: &Film, path: &Path) -> Result<()> {
        let data: Vec<u8> = film
            .snapshot()
            .iter()
            .flat_map(|c| {
                [
                    to_srgb8(c.x),
                    to_srgb8(c.y),
                    to_srgb8(c.z),
                    (c.w.clamp(0.0, 1.0) * 255.0 + 0.5) as u8,
                ]
            })
            .collect();
        let buffer = image::RgbaImage::from_raw(film.width(), film.height(), data)
            .ok_or_else(|| PrismError::ImageEncodeError("film buffer size mismatch".into()))?;
        buffer.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

pub struct JpegFormat;

impl Format for JpegFormat {
    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn save(&self, film: &Film, path: &Path) -> Result<()> {
        // JPEG carries no alpha.
        let data: Vec<u8> = film
            .snapshot()
            .iter()
            .flat_map(|c| [to_srgb8(c.x), to_srgb8(c.y), to_srgb8(c.z)])
            .collect();
        let buffer = image::RgbImage::from_raw(film.width(), film.height(), data)
            .ok_or_else(|| PrismError::ImageEncodeError("film buffer size mismatch".into()))?;
        buffer.save_with_format(path, image::ImageFormat::Jpeg)?;
        Ok(())
    }
}

// ============================================================================
// Float formats
// ============================================================================

pub struct HdrFormat;

impl Format for HdrFormat {
    fn extension(&self) -> &'static str {
        "hdr"
    }

    fn save(&self, film: &Film, path: &Path) -> Result<()> {
        let pixels: Vec<image::Rgb<f32>> = film
            .snapshot()
            .iter()
            .map(|c| image::Rgb([c.x, c.y, c.z]))
            .collect();
        let writer = BufWriter::new(File::create(path)?);
        image::codecs::hdr::HdrEncoder::new(writer)
            .encode(&pixels, film.width() as usize, film.height() as usize)?;
        Ok(())
    }
}

pub struct ExrFormat;

impl Format for ExrFormat {
    fn extension(&self) -> &'static str {
        "exr"
    }

    fn save(&self, film: &Film, path: &Path) -> Result<()> {
        let data: Vec<f32> = film
            .snapshot()
            .iter()
            .flat_map(|c| [c.x, c.y, c.z, c.w])
            .collect();
        let buffer = image::Rgba32FImage::from_raw(film.width(), film.height(), data)
            .ok_or_else(|| PrismError::ImageEncodeError("film buffer size mismatch".into()))?;
        image::DynamicImage::ImageRgba32F(buffer).save_with_format(path, image::ImageFormat::OpenExr)?;
        Ok(())
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Creates a format from configuration. Unknown types are an error and yield
/// `None`; there is no sensible default to substitute.
pub fn create_format(params: &ParamMap) -> Option<Box<dyn Format>> {
    let type_name = params.str_or("type", "").to_ascii_lowercase();
    let format: Box<dyn Format> = match type_name.as_str() {
        "png" => Box::new(PngFormat),
        "jpg" | "jpeg" => Box::new(JpegFormat),
        "hdr" | "pic" => Box::new(HdrFormat),
        "exr" => Box::new(ExrFormat),
        other => {
            error!("Cannot process file, no support for image file format '{other}'");
            return None;
        }
    };
    info!("Format type '{type_name}' created.");
    Some(format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_knows_aliases() {
        for (key, ext) in [("png", "png"), ("jpeg", "jpg"), ("pic", "hdr"), ("exr", "exr")] {
            let mut p = ParamMap::new();
            p.set_string("type", key);
            assert_eq!(create_format(&p).unwrap().extension(), ext);
        }
    }

    #[test]
    fn factory_rejects_unknown() {
        let mut p = ParamMap::new();
        p.set_string("type", "tiff");
        assert!(create_format(&p).is_none());
    }
}
