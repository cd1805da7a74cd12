//! Fixed-size canvas normalization.
//!
//! Every sample, whatever its source size, becomes an RGB canvas of exactly
//! `height x width x 3` values in `[0, 1]`. Images larger than the canvas are
//! shrunk proportionally (never enlarged) and then zero-padded on the bottom
//! and right edges.
//!
//! Canvases are stored in shards as JPEG bytes; [`CanvasCodec::decode_jpeg`]
//! is the inverse used when reading shards back.

use crate::core::config::CanvasConfig;
use crate::core::constants::{CANVAS_CHANNELS, DEFAULT_JPEG_QUALITY, MAX_FIT_ITERATIONS};
use crate::core::errors::{PackError, PackResult};
use crate::utils::load_image;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use ndarray::{Array3, ArrayView3};
use std::path::Path;

/// A normalized `(height, width, 3)` image with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    data: Array3<f32>,
}

impl Canvas {
    /// Converts 8-bit RGB pixels into a canvas.
    pub fn from_rgb(image: &RgbImage) -> PackResult<Self> {
        let shape = (
            image.height() as usize,
            image.width() as usize,
            CANVAS_CHANNELS,
        );
        let values = image.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        let data = Array3::from_shape_vec(shape, values).map_err(|e| PackError::ShapeMismatch {
            expected: format!("{shape:?}"),
            actual: e.to_string(),
        })?;
        Ok(Self { data })
    }

    /// Quantizes the canvas back into 8-bit RGB pixels.
    pub fn to_rgb(&self) -> RgbImage {
        let (height, width, _) = self.data.dim();
        let raw = self
            .data
            .iter()
            .map(|&v| (v * 255.0).round().clamp(0.0, 255.0) as u8)
            .collect();
        // The buffer length always matches `height * width * 3`.
        RgbImage::from_raw(width as u32, height as u32, raw)
            .unwrap_or_else(|| RgbImage::new(width as u32, height as u32))
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> usize {
        self.data.dim().0
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> usize {
        self.data.dim().1
    }

    /// `(height, width, channels)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Borrowed view of the pixel values.
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Consumes the canvas and returns the pixel values.
    pub fn into_array(self) -> Array3<f32> {
        self.data
    }
}

/// Computes the size an image is shrunk to before padding.
///
/// Each pass looks at the current size: if the height exceeds the target the
/// image is scaled so its height matches, then if the width still exceeds the
/// target it is scaled so its width matches. Passes repeat until the size
/// fits. A width-driven scaling never grows the height, so one pass is enough
/// and the result is never larger than the proportionally scaled source.
pub fn fit_dimensions(
    width: u32,
    height: u32,
    target_width: u32,
    target_height: u32,
) -> PackResult<(u32, u32)> {
    let (mut w, mut h) = (width.max(1), height.max(1));

    for _ in 0..MAX_FIT_ITERATIONS {
        if w <= target_width && h <= target_height {
            return Ok((w, h));
        }

        if h > target_height {
            w = scaled(target_height, h, w);
            h = target_height;
        }
        if w > target_width {
            h = scaled(target_width, w, h);
            w = target_width;
        }
    }

    if w <= target_width && h <= target_height {
        Ok((w, h))
    } else {
        Err(PackError::invalid_input(format!(
            "image of {width}x{height} did not fit a {target_width}x{target_height} canvas"
        )))
    }
}

/// `floor(target / current * other)`, never below one pixel.
fn scaled(target: u32, current: u32, other: u32) -> u32 {
    ((target as f64 / current as f64 * other as f64) as u32).max(1)
}

/// Resizes, pads and re-encodes images onto a fixed canvas.
#[derive(Debug, Clone)]
pub struct CanvasCodec {
    height: u32,
    width: u32,
    jpeg_quality: u8,
}

impl CanvasCodec {
    /// Creates a codec for a `height x width` canvas.
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Creates a codec from configuration.
    pub fn from_config(config: &CanvasConfig) -> Self {
        Self::new(config.height, config.width).with_jpeg_quality(config.jpeg_quality)
    }

    /// Sets the JPEG quality used by [`CanvasCodec::encode_jpeg`].
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Shrinks and pads an image to the canvas size, returning 8-bit pixels.
    ///
    /// Non-RGB sources (grayscale, palette, alpha) are converted to RGB first.
    pub fn fit(&self, image: &DynamicImage) -> PackResult<RgbImage> {
        let rgb = image.to_rgb8();
        let (w, h) = fit_dimensions(rgb.width(), rgb.height(), self.width, self.height)?;

        let resized = if (w, h) == rgb.dimensions() {
            rgb
        } else {
            // Bicubic resampling.
            image::imageops::resize(&rgb, w, h, FilterType::CatmullRom)
        };

        let mut canvas = RgbImage::new(self.width, self.height);
        image::imageops::replace(&mut canvas, &resized, 0, 0);
        Ok(canvas)
    }

    /// Normalizes a decoded image into a canvas.
    pub fn normalize(&self, image: &DynamicImage) -> PackResult<Canvas> {
        Canvas::from_rgb(&self.fit(image)?)
    }

    /// Decodes image bytes in any supported format and normalizes them.
    pub fn normalize_bytes(&self, bytes: &[u8]) -> PackResult<Canvas> {
        let image = image::load_from_memory(bytes).map_err(PackError::image_decode_bytes)?;
        self.normalize(&image)
    }

    /// Loads an image file and normalizes it.
    pub fn normalize_path(&self, path: &Path) -> PackResult<Canvas> {
        self.normalize(&load_image(path)?)
    }

    /// Loads an image file, fits it to the canvas and returns the JPEG bytes stored in shards.
    pub fn encode_path(&self, path: &Path) -> PackResult<Vec<u8>> {
        self.encode_jpeg(&self.fit(&load_image(path)?)?)
    }

    /// Encodes canvas pixels as JPEG.
    pub fn encode_jpeg(&self, pixels: &RgbImage) -> PackResult<Vec<u8>> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality)
            .encode_image(pixels)
            .map_err(PackError::ImageEncode)?;
        Ok(bytes)
    }

    /// Decodes stored JPEG bytes back into a canvas.
    ///
    /// The decoded image is resized to the canvas dimensions if it differs,
    /// so records written with another geometry still yield uniform tensors.
    pub fn decode_jpeg(&self, bytes: &[u8]) -> PackResult<Canvas> {
        let image = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
            .map_err(PackError::image_decode_bytes)?;
        let mut rgb = image.to_rgb8();
        if rgb.dimensions() != (self.width, self.height) {
            rgb = image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle);
        }
        Canvas::from_rgb(&rgb)
    }
}
