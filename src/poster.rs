use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, GenericImageView};
use thiserror::Error;
use tracing::debug;

pub const MAX_WIDTH: u32 = 800;
pub const MAX_HEIGHT: u32 = 600;
pub const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no image data received")]
    Empty,

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode poster: {0}")]
    Encode(String),
}

/// Turns uploaded image bytes into a value storable in an entry's `poster`.
pub trait PosterIngest: Send + Sync {
    fn ingest(&self, bytes: &[u8]) -> Result<String, IngestError>;
}

/// Downscales to a bounding box and re-encodes as an inline JPEG data URL.
#[derive(Debug, Clone, Copy)]
pub struct JpegDataUrlIngest {
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
}

impl Default for JpegDataUrlIngest {
    fn default() -> Self {
        Self {
            max_width: MAX_WIDTH,
            max_height: MAX_HEIGHT,
            quality: JPEG_QUALITY,
        }
    }
}

impl PosterIngest for JpegDataUrlIngest {
    fn ingest(&self, bytes: &[u8]) -> Result<String, IngestError> {
        if bytes.is_empty() {
            return Err(IngestError::Empty);
        }
        let img = image::load_from_memory(bytes).map_err(|e| IngestError::Decode(e.to_string()))?;
        let (width, height) = img.dimensions();
        let (target_w, target_h) = fit_within(width, height, self.max_width, self.max_height);
        let img = if (target_w, target_h) == (width, height) {
            img
        } else {
            debug!(
                "Resizing poster {}x{} -> {}x{}",
                width, height, target_w, target_h
            );
            img.resize_exact(target_w, target_h, FilterType::Triangle)
        };

        let rgb = img.to_rgb8();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
            .map_err(|e| IngestError::Encode(e.to_string()))?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        Ok(format!("data:image/jpeg;base64,{encoded}"))
    }
}

/// Largest size with the same aspect ratio that fits the box. Never upscales.
fn fit_within(width: u32, height: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_w && height <= max_h) {
        return (width, height);
    }
    let scale = f64::min(max_w as f64 / width as f64, max_h as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 60, 200]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    fn decode_data_url(url: &str) -> image::DynamicImage {
        let payload = url
            .strip_prefix("data:image/jpeg;base64,")
            .expect("jpeg data url");
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .expect("base64");
        image::load_from_memory(&bytes).expect("jpeg decodes")
    }

    #[test]
    fn fit_keeps_aspect_and_never_upscales() {
        assert_eq!(fit_within(300, 450, 800, 600), (300, 450));
        assert_eq!(fit_within(1600, 1200, 800, 600), (800, 600));
        assert_eq!(fit_within(1000, 1500, 800, 600), (400, 600));
        assert_eq!(fit_within(700, 650, 800, 600), (646, 600));
        assert_eq!(fit_within(4000, 10, 800, 600), (800, 2));
    }

    #[test]
    fn large_upload_is_bounded_jpeg() {
        let ingest = JpegDataUrlIngest::default();
        let url = ingest.ingest(&png(1200, 1800)).unwrap();
        let img = decode_data_url(&url);
        assert_eq!(img.dimensions(), (400, 600));
    }

    #[test]
    fn small_upload_keeps_its_size() {
        let url = JpegDataUrlIngest::default().ingest(&png(30, 20)).unwrap();
        assert_eq!(decode_data_url(&url).dimensions(), (30, 20));
    }

    #[test]
    fn rejects_empty_and_garbage_input() {
        let ingest = JpegDataUrlIngest::default();
        assert!(matches!(ingest.ingest(&[]), Err(IngestError::Empty)));
        assert!(matches!(
            ingest.ingest(b"definitely not an image"),
            Err(IngestError::Decode(_))
        ));
    }
}
