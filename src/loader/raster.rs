use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::{ImageReader, RgbImage};

use super::{DecodeLimits, FormatKind};
use crate::errors::DecodeError;
use crate::traits::FormatDecoder;

/// PNG, JPEG, TIFF and friends, decoded by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl FormatDecoder for RasterDecoder {
    fn kind(&self) -> FormatKind {
        FormatKind::RasterStandard
    }

    fn decode(&self, path: &Path, limits: &DecodeLimits) -> Result<RgbImage, DecodeError> {
        let corrupt = |source: image::ImageError| DecodeError::Corrupt {
            path: path.to_path_buf(),
            kind: FormatKind::RasterStandard,
            source: Box::new(source),
        };

        let open = || -> Result<ImageReader<BufReader<File>>, DecodeError> {
            let io = |source| DecodeError::Io {
                path: path.to_path_buf(),
                source,
            };
            let mut reader = ImageReader::open(path)
                .map_err(io)?
                .with_guessed_format()
                .map_err(io)?;
            // the only ceiling is the configured pixel count
            reader.no_limits();
            Ok(reader)
        };

        if limits.max_pixels.is_some() {
            let (width, height) = open()?.into_dimensions().map_err(corrupt)?;
            limits.check(path, width, height)?;
        }

        let image = open()?.decode().map_err(corrupt)?;
        Ok(image.into_rgb8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, LumaA, Rgba, RgbaImage};
    use tempfile::TempDir;

    #[test]
    fn color_modes_normalize_to_rgb() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;

        let rgba = temp_dir.path().join("rgba.png");
        RgbaImage::from_pixel(3, 2, Rgba([200, 100, 50, 128])).save(&rgba)?;

        let gray = temp_dir.path().join("gray.png");
        DynamicImage::ImageLumaA8(image::ImageBuffer::from_pixel(4, 4, LumaA([77u8, 255])))
            .save(&gray)?;

        let rgb = RasterDecoder.decode(&rgba, &DecodeLimits::unbounded())?;
        assert_eq!(rgb.dimensions(), (3, 2));
        assert_eq!(rgb.get_pixel(0, 0).0, [200, 100, 50]);

        let rgb = RasterDecoder.decode(&gray, &DecodeLimits::unbounded())?;
        assert_eq!(rgb.get_pixel(1, 1).0, [77, 77, 77]);
        Ok(())
    }

    #[test]
    fn content_wins_over_extension() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("mislabeled.jpg");
        DynamicImage::new_rgb8(6, 6).save_with_format(&path, ImageFormat::Png)?;

        let rgb = RasterDecoder.decode(&path, &DecodeLimits::unbounded())?;
        assert_eq!(rgb.dimensions(), (6, 6));
        Ok(())
    }

    #[test]
    fn truncated_files_are_corrupt() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("broken.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\n\0\0")?;

        let err = RasterDecoder
            .decode(&path, &DecodeLimits::unbounded())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Corrupt { .. }));
        Ok(())
    }

    #[test]
    fn missing_files_are_io_errors() {
        let err = RasterDecoder
            .decode(Path::new("/nonexistent/shot.png"), &DecodeLimits::unbounded())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Io { .. }));
    }

    fn crc32(bytes: &[u8]) -> u32 {
        let mut crc = 0xFFFF_FFFFu32;
        for &byte in bytes {
            crc ^= u32::from(byte);
            for _ in 0..8 {
                crc = if crc & 1 == 1 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
            }
        }
        !crc
    }

    #[test]
    fn ceiling_is_checked_from_the_header() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("bomb.png");
        DynamicImage::new_rgb8(1, 1).save(&path)?;

        // claim 50000x50000 in IHDR; the tiny IDAT stays as it is
        let mut bytes = std::fs::read(&path)?;
        bytes[16..20].copy_from_slice(&50_000u32.to_be_bytes());
        bytes[20..24].copy_from_slice(&50_000u32.to_be_bytes());
        let crc = crc32(&bytes[12..29]);
        bytes[29..33].copy_from_slice(&crc.to_be_bytes());
        std::fs::write(&path, bytes)?;

        let err = RasterDecoder
            .decode(&path, &DecodeLimits::with_max_pixels(1_000_000))
            .unwrap_err();
        assert!(
            matches!(
                err,
                DecodeError::ResourceLimit {
                    pixels: 2_500_000_000,
                    limit: 1_000_000,
                    ..
                }
            ),
            "{err:?}"
        );
        Ok(())
    }

    #[test]
    fn configured_ceiling_rejects_large_images() -> Result<(), Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("wide.png");
        DynamicImage::new_rgb8(20, 10).save(&path)?;

        let err = RasterDecoder
            .decode(&path, &DecodeLimits::with_max_pixels(100))
            .unwrap_err();
        assert!(matches!(err, DecodeError::ResourceLimit { pixels: 200, .. }));
        Ok(())
    }
}
