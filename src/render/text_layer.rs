//! Renders the recipient's name onto a transparent raster layer.
//!
//! The text is laid out with glyph metrics, centered on both axes, and the
//! whole canvas is rotated about its center. Centering uses the measured
//! pixel extent, so right-to-left scripts center the same as left-to-right.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::error::{PipelineError, Result};

/// Visual style of the text layer
#[derive(Debug, Clone)]
pub struct TextStyle {
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Font size in pixels
    pub font_size: f32,
    /// Fill color (RGBA)
    pub color: [u8; 4],
    /// Rotation of the whole layer, in degrees
    pub angle_degrees: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            width: 600,
            height: 200,
            font_size: 100.0,
            color: [0xff, 0xe4, 0x62, 0xff],
            angle_degrees: 3.5,
        }
    }
}

/// Trait seam for the layer renderer (tests substitute doubles)
pub trait TextRenderer: Send + Sync {
    /// Render `text` with `style` and write a PNG to `output`
    fn render(&self, text: &str, style: &TextStyle, output: &Path) -> Result<()>;
}

/// Renders text layers with a TrueType font
pub struct TextLayerRenderer {
    font_path: PathBuf,
}

impl TextLayerRenderer {
    pub fn new(font_path: impl Into<PathBuf>) -> Self {
        Self {
            font_path: font_path.into(),
        }
    }

    fn load_font(&self) -> Result<FontVec> {
        let bytes = std::fs::read(&self.font_path)
            .map_err(|e| PipelineError::asset(&self.font_path, e.to_string()))?;

        FontVec::try_from_vec(bytes)
            .map_err(|e| PipelineError::asset(&self.font_path, format!("invalid font: {}", e)))
    }
}

impl TextRenderer for TextLayerRenderer {
    fn render(&self, text: &str, style: &TextStyle, output: &Path) -> Result<()> {
        if text.is_empty() {
            return Err(PipelineError::Render("empty text".to_string()));
        }

        let font = self.load_font()?;
        let scale = PxScale::from(style.font_size);

        let (text_w, text_h) = text_size(scale, &font, text);
        if text_w == 0 || text_h == 0 {
            return Err(PipelineError::Render(format!(
                "text {:?} has a zero-area bounding box",
                text
            )));
        }

        let mut layer = RgbaImage::from_pixel(style.width, style.height, Rgba([0, 0, 0, 0]));

        let x = (style.width as i32 - text_w as i32) / 2;
        let y = (style.height as i32 - text_h as i32) / 2;
        draw_text_mut(&mut layer, Rgba(style.color), x, y, scale, &font, text);

        let rotated = rotate_about_center(
            &layer,
            style.angle_degrees.to_radians(),
            Interpolation::Bicubic,
            Rgba([0, 0, 0, 0]),
        );

        rotated
            .save(output)
            .map_err(|e| PipelineError::asset(output, format!("write layer: {}", e)))?;

        debug!(path = %output.display(), text_w, text_h, "Rendered text layer");
        Ok(())
    }
}
