use std::path::Path;

use image::{Rgb, RgbImage, RgbaImage};
use psd::Psd;

use super::{guard_decoder, DecodeLimits, FormatKind};
use crate::errors::DecodeError;
use crate::imageops::flatten::FlattenAlpha;
use crate::traits::FormatDecoder;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Photoshop documents, flattened to their visible composite.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredDecoder;

impl FormatDecoder for LayeredDecoder {
    fn kind(&self) -> FormatKind {
        FormatKind::CompositeLayered
    }

    fn decode(&self, path: &Path, limits: &DecodeLimits) -> Result<RgbImage, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let composite = composite_from_bytes(path, &bytes, limits)?;
        Ok(composite.flatten_onto(BACKGROUND))
    }
}

const HEADER_LEN: usize = 26;
// image data compression markers
const RAW_DATA: u16 = 0;
const RLE_DATA: u16 = 1;

fn corrupt(
    path: &Path,
    source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> DecodeError {
    DecodeError::Corrupt {
        path: path.to_path_buf(),
        kind: FormatKind::CompositeLayered,
        source: source.into(),
    }
}

/// Decode a PSD byte stream into its RGBA composite.
///
/// Documents with layers are composited from the visible ones. Single-image
/// documents carry no layer records, so their stored merged image is used.
pub(crate) fn composite_from_bytes(
    path: &Path,
    bytes: &[u8],
    limits: &DecodeLimits,
) -> Result<RgbaImage, DecodeError> {
    let header = check_sections(bytes).map_err(|message| corrupt(path, message))?;
    limits.check(path, header.width, header.height)?;

    guard_decoder(path, FormatKind::CompositeLayered, || {
        let psd = Psd::from_bytes(bytes).map_err(|e| corrupt(path, e))?;
        let (width, height) = (psd.width(), psd.height());

        let rgba = if psd.layers().is_empty() {
            psd.rgba()
        } else {
            psd.flatten_layers_rgba(&|(_, layer)| layer.visible())
                .map_err(|e| corrupt(path, e))?
        };

        RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
            corrupt(
                path,
                format!("composite buffer does not match {width}x{height}"),
            )
        })
    })
}

#[derive(Debug, Clone, Copy)]
struct Header {
    channels: u16,
    height: u32,
    width: u32,
    depth: u16,
}

impl Header {
    fn parse(bytes: &[u8]) -> Self {
        Self {
            channels: be_u16(bytes, 12),
            height: be_u32(bytes, 14),
            width: be_u32(bytes, 18),
            depth: be_u16(bytes, 22),
        }
    }

    /// Bytes in one uncompressed scanline of one channel.
    fn row_bytes(&self) -> u64 {
        (u64::from(self.width) * u64::from(self.depth)).div_ceil(8)
    }
}

fn be_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// The psd parser slices sections without bounds checks, so the signature, the
/// three length-prefixed sections and the size of the merged image data are
/// verified before it runs.
fn check_sections(bytes: &[u8]) -> Result<Header, String> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != b"8BPS" {
        return Err("missing PSD signature".to_string());
    }
    let header = Header::parse(bytes);
    if header.channels == 0 || header.width == 0 || header.height == 0 {
        return Err("document has no pixels".to_string());
    }

    let mut offset = HEADER_LEN;
    for section in ["color mode data", "image resources", "layer and mask info"] {
        let len = bytes
            .get(offset..offset + 4)
            .map(|_| be_u32(bytes, offset))
            .ok_or_else(|| format!("truncated before {section} section"))?;
        offset = offset
            .checked_add(4 + len as usize)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| format!("{section} section exceeds file size"))?;
    }

    if bytes.len() < offset + 2 {
        return Err("missing image data section".to_string());
    }
    let compression = be_u16(bytes, offset);
    let body = &bytes[offset + 2..];
    let rows = u64::from(header.channels) * u64::from(header.height);

    let needed = match compression {
        RAW_DATA => rows * header.row_bytes(),
        RLE_DATA => {
            let table_len = rows * 2;
            if (body.len() as u64) < table_len {
                return Err("truncated RLE row table".to_string());
            }
            let packed: u64 = body[..table_len as usize]
                .chunks_exact(2)
                .map(|pair| u64::from(u16::from_be_bytes([pair[0], pair[1]])))
                .sum();
            table_len + packed
        }
        other => return Err(format!("unsupported image data compression {other}")),
    };

    if (body.len() as u64) < needed {
        return Err(format!(
            "image data holds {} of {needed} bytes",
            body.len()
        ));
    }
    Ok(header)
}
