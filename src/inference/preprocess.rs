//! Image decoding and the preprocessing steps shared by the classifier
//! adapters. Rejecting undecodable input happens here, once, before any
//! adapter is invoked.

use image::imageops::FilterType;
use image::{GrayImage, RgbImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageDecodeError {
    #[error("Image could not be decoded: {0}")]
    Undecodable(String),
}

/// A decoded, RGB-normalized raster image. Adapters receive this instead
/// of raw bytes so decoding failures surface exactly once per request.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    rgb: RgbImage,
}

impl NormalizedImage {
    /// Decode raw upload bytes. Format is sniffed from the content, not
    /// from a filename.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageDecodeError> {
        let dynamic = image::load_from_memory(bytes)
            .map_err(|e| ImageDecodeError::Undecodable(e.to_string()))?;
        Ok(Self {
            rgb: dynamic.to_rgb8(),
        })
    }

    /// A uniformly black image (for tests).
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            rgb: RgbImage::new(width, height),
        }
    }

    pub fn from_rgb(rgb: RgbImage) -> Self {
        Self { rgb }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn to_gray(&self) -> GrayImage {
        image::imageops::grayscale(&self.rgb)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }
}

/// Resize to a square of `side` pixels (bilinear, matching the torch
/// transform pipelines the models were trained with).
pub fn resize_square(image: &RgbImage, side: u32) -> RgbImage {
    image::imageops::resize(image, side, side, FilterType::Triangle)
}

/// Crop a scan to its content region: rows/columns with any pixel above
/// `threshold` bound the crop, padded by `buffer` pixels. Scans with no
/// content above threshold are returned unchanged. Used by the stroke
/// track, whose model was trained on content-cropped slices.
pub fn crop_to_content(image: &NormalizedImage, threshold: u8, buffer: u32) -> RgbImage {
    let gray = image.to_gray();
    let (width, height) = gray.dimensions();

    let mut min_row = None;
    let mut max_row = 0u32;
    let mut min_col = None;
    let mut max_col = 0u32;

    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel.0[0] > threshold {
            if min_row.is_none() || y < min_row.unwrap() {
                min_row = Some(y);
            }
            if y > max_row {
                max_row = y;
            }
            if min_col.is_none() || x < min_col.unwrap() {
                min_col = Some(x);
            }
            if x > max_col {
                max_col = x;
            }
        }
    }

    let (min_row, min_col) = match (min_row, min_col) {
        (Some(r), Some(c)) => (r, c),
        // No content detected, keep the original frame
        _ => return image.rgb().clone(),
    };

    let x0 = min_col.saturating_sub(buffer);
    let y0 = min_row.saturating_sub(buffer);
    let x1 = (max_col + buffer).min(width - 1);
    let y1 = (max_row + buffer).min(height - 1);

    image::imageops::crop_imm(image.rgb(), x0, y0, x1 - x0 + 1, y1 - y0 + 1).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn decode_rejects_garbage() {
        let err = NormalizedImage::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, ImageDecodeError::Undecodable(_)));
    }

    #[test]
    fn decode_accepts_png_bytes() {
        let mut bytes = Vec::new();
        let img = RgbImage::new(4, 4);
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut bytes, image::ImageOutputFormat::Png)
            .unwrap();

        let decoded = NormalizedImage::decode(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
    }

    #[test]
    fn resize_square_changes_dimensions() {
        let img = RgbImage::new(10, 20);
        let resized = resize_square(&img, 224);
        assert_eq!(resized.dimensions(), (224, 224));
    }

    #[test]
    fn crop_to_content_bounds_bright_region() {
        let mut img = RgbImage::new(100, 100);
        // Bright block at (40..60, 40..60)
        for y in 40..60 {
            for x in 40..60 {
                img.put_pixel(x, y, Rgb([200, 200, 200]));
            }
        }
        let cropped = crop_to_content(&NormalizedImage::from_rgb(img), 40, 5);
        // 20px of content + 5px buffer each side
        assert_eq!(cropped.dimensions(), (30, 30));
    }

    #[test]
    fn crop_to_content_keeps_empty_scan() {
        let image = NormalizedImage::blank(64, 48);
        let cropped = crop_to_content(&image, 40, 5);
        assert_eq!(cropped.dimensions(), (64, 48));
    }
}
