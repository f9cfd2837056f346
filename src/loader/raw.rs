use std::path::Path;

use image::RgbImage;

use super::{guard_decoder, DecodeLimits, FormatKind};
use crate::errors::DecodeError;
use crate::traits::FormatDecoder;

/// Camera RAW files (NEF, CR2, ARW, DNG).
///
/// The sensor data is read by rawloader and pushed through imagepipe's
/// demosaic and color pipeline at full resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawSensorDecoder;

impl FormatDecoder for RawSensorDecoder {
    fn kind(&self) -> FormatKind {
        FormatKind::RawSensor
    }

    fn decode(&self, path: &Path, limits: &DecodeLimits) -> Result<RgbImage, DecodeError> {
        if !path.exists() {
            return Err(DecodeError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }

        // 0x0 keeps the sensor resolution
        let decoded = guard_decoder(path, FormatKind::RawSensor, || {
            imagepipe::simple_decode_8bit(path, 0, 0).map_err(|message| DecodeError::Corrupt {
                path: path.to_path_buf(),
                kind: FormatKind::RawSensor,
                source: message.into(),
            })
        })?;

        rgb_from_srgb(path, decoded.width, decoded.height, decoded.data, limits)
    }
}

/// Wrap an interleaved 8-bit sRGB array as an image buffer.
pub fn rgb_from_srgb(
    path: &Path,
    width: usize,
    height: usize,
    data: Vec<u8>,
    limits: &DecodeLimits,
) -> Result<RgbImage, DecodeError> {
    let corrupt = |message: String| DecodeError::Corrupt {
        path: path.to_path_buf(),
        kind: FormatKind::RawSensor,
        source: message.into(),
    };

    let width = u32::try_from(width).map_err(|_| corrupt(format!("width {width} out of range")))?;
    let height =
        u32::try_from(height).map_err(|_| corrupt(format!("height {height} out of range")))?;
    limits.check(path, width, height)?;

    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| corrupt(format!("pixel data does not fill {width}x{height}")))
}
