//! Pure thumbnail generation: down-sample an image file into a 448x448
//! bounding box, preserving aspect ratio.
//!
//! Mirrors the decode -> `img.thumbnail(..)` -> encode pipeline from
//! `thumbnails.rs`, generalized from a fixed JPEG-quality output to a
//! configurable box that preserves the source format.

use image::ImageReader;
use std::io::Cursor;
use std::path::Path;

pub const THUMB_BOX: u32 = 448;

/// Decode `input`, fit it into a `THUMB_BOX` x `THUMB_BOX` box preserving
/// aspect ratio, and return the encoded bytes plus the `image` crate's
/// guess at the output format.
pub fn generate(input: &[u8]) -> Result<(Vec<u8>, image::ImageFormat), Box<dyn std::error::Error + Send + Sync>> {
    let reader = ImageReader::new(Cursor::new(input)).with_guessed_format()?;
    let format = reader
        .format()
        .unwrap_or(image::ImageFormat::Png);
    let img = reader.decode()?;

    let thumbnail = img.thumbnail(THUMB_BOX, THUMB_BOX);

    let mut output = Cursor::new(Vec::new());
    thumbnail.write_to(&mut output, format)?;
    Ok((output.into_inner(), format))
}

/// Read `input_path` from disk, thumbnail it, and write the result to
/// `output_path`. Overwrites an existing thumbnail (idempotent re-run).
pub async fn generate_to_file(
    input_path: &Path,
    output_path: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let data = tokio::fs::read(input_path).await?;
    let output_path = output_path.to_path_buf();
    let (thumb_bytes, _format) =
        tokio::task::spawn_blocking(move || generate(&data)).await??;

    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&output_path, thumb_bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, y| Rgb([(x % 255) as u8, (y % 255) as u8, 0]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    #[test]
    fn fits_within_bounding_box_preserving_aspect_ratio() {
        let input = sample_jpeg(1024, 768);
        let (thumb_bytes, format) = generate(&input).unwrap();
        assert_eq!(format, image::ImageFormat::Jpeg);

        let decoded = image::load_from_memory(&thumb_bytes).unwrap();
        assert!(decoded.width() <= THUMB_BOX);
        assert!(decoded.height() <= THUMB_BOX);

        let original_ratio = 1024.0 / 768.0;
        let thumb_ratio = decoded.width() as f64 / decoded.height() as f64;
        assert!((original_ratio - thumb_ratio).abs() < 0.02);
    }

    #[test]
    fn longest_side_reaches_the_box_exactly() {
        let input = sample_jpeg(2000, 500);
        let (thumb_bytes, _) = generate(&input).unwrap();
        let decoded = image::load_from_memory(&thumb_bytes).unwrap();
        assert_eq!(decoded.width(), THUMB_BOX);
        assert!(decoded.height() < THUMB_BOX);
    }
}
