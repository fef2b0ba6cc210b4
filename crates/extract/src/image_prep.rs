//! Decodes an image and, if it exceeds a pixel budget, rescales it before
//! re-encoding as base64 JPEG for the VLClient/multimodal-embedding path.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImagePrepError {
  #[error("could not read image dimensions: {0}")]
  Decode(String),

  #[error("re-encode failed: {0}")]
  Encode(String),
}

#[derive(Debug, Clone, Copy)]
pub struct ImageBudget {
  pub max_pixels: u64,
  pub target_longest_side: u32,
  pub jpeg_quality: u8,
}

impl Default for ImageBudget {
  fn default() -> Self {
    Self {
      max_pixels: 1_500_000,
      target_longest_side: 1536,
      jpeg_quality: 85,
    }
  }
}

pub struct PreparedImage {
  pub base64: String,
  pub mime: &'static str,
  pub width: u32,
  pub height: u32,
}

/// Decode `bytes`, rescale if `width*height` exceeds the budget's `max_pixels`
/// (preserving aspect ratio so the longest side fits `target_longest_side`), and
/// re-encode as JPEG at the configured quality.
pub fn prepare_image(bytes: &[u8], budget: ImageBudget) -> Result<PreparedImage, ImagePrepError> {
  let image = image::load_from_memory(bytes).map_err(|e| ImagePrepError::Decode(e.to_string()))?;

  let pixel_count = image.width() as u64 * image.height() as u64;
  let resized = if pixel_count > budget.max_pixels {
    resize_to_longest_side(image, budget.target_longest_side)
  } else {
    image
  };

  let rgb = resized.to_rgb8();
  let mut buf = Vec::new();
  let mut encoder = JpegEncoder::new_with_quality(&mut buf, budget.jpeg_quality);
  encoder
    .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
    .map_err(|e| ImagePrepError::Encode(e.to_string()))?;

  Ok(PreparedImage {
    base64: BASE64.encode(&buf),
    mime: "image/jpeg",
    width: rgb.width(),
    height: rgb.height(),
  })
}

fn resize_to_longest_side(image: DynamicImage, target_longest_side: u32) -> DynamicImage {
  let (width, height) = (image.width(), image.height());
  let (new_width, new_height) = if width >= height {
    (target_longest_side, (height * target_longest_side) / width.max(1))
  } else {
    ((width * target_longest_side) / height.max(1), target_longest_side)
  };
  image.resize(new_width.max(1), new_height.max(1), FilterType::Triangle)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgb8(width, height);
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
  }

  #[test]
  fn small_image_is_not_rescaled() {
    let bytes = encode_test_png(100, 50);
    let budget = ImageBudget::default();
    let result = prepare_image(&bytes, budget).unwrap();
    assert_eq!(result.width, 100);
    assert_eq!(result.height, 50);
    assert_eq!(result.mime, "image/jpeg");
  }

  #[test]
  fn oversized_image_is_rescaled_preserving_aspect_ratio() {
    let bytes = encode_test_png(4000, 2000);
    let budget = ImageBudget {
      max_pixels: 1000,
      target_longest_side: 200,
      jpeg_quality: 85,
    };
    let result = prepare_image(&bytes, budget).unwrap();
    assert!(result.width <= 200);
    assert!(result.height <= 200);
    // aspect ratio 2:1 should roughly survive
    assert!(result.width > result.height);
  }

  #[test]
  fn garbage_bytes_fail_to_decode() {
    let result = prepare_image(b"not an image", ImageBudget::default());
    assert!(matches!(result, Err(ImagePrepError::Decode(_))));
  }
}
