//! Format-dispatch image loading.
//!
//! Every supported file, whatever its encoding, ends up as one canonical
//! `RgbImage`. Dispatch goes through a registry keyed by lowercase extension,
//! so new formats can be added without touching the session loop.

mod composite;
mod raster;
mod raw;

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;

use crate::errors::DecodeError;
use crate::traits::FormatDecoder;

pub use composite::LayeredDecoder;
pub use raster::RasterDecoder;
pub use raw::{RawSensorDecoder, rgb_from_srgb};

pub const RASTER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff"];
pub const LAYERED_EXTENSIONS: &[&str] = &["psd"];
pub const RAW_EXTENSIONS: &[&str] = &["nef", "cr2", "arw", "dng"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormatKind {
    RasterStandard,
    CompositeLayered,
    RawSensor,
}

impl FormatKind {
    /// Label used for file picker filters.
    pub const fn label(self) -> &'static str {
        match self {
            Self::RasterStandard => "Raster images",
            Self::CompositeLayered => "PSD files",
            Self::RawSensor => "RAW files",
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RasterStandard => "raster",
            Self::CompositeLayered => "layered",
            Self::RawSensor => "RAW sensor",
        };
        f.write_str(name)
    }
}

/// A decoded input image. Lives only until its caption is generated.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub kind: FormatKind,
    pub pixels: RgbImage,
}

impl ImageAsset {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Pixel-count ceiling applied while decoding.
///
/// Unbounded unless a limit is set explicitly: large scans and stitched
/// panoramas must load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_pixels: Option<u64>,
}

impl DecodeLimits {
    pub const fn unbounded() -> Self {
        Self { max_pixels: None }
    }

    pub const fn with_max_pixels(max_pixels: u64) -> Self {
        Self {
            max_pixels: Some(max_pixels),
        }
    }

    pub fn check(&self, path: &Path, width: u32, height: u32) -> Result<(), DecodeError> {
        let pixels = u64::from(width) * u64::from(height);
        match self.max_pixels {
            Some(limit) if pixels > limit => Err(DecodeError::ResourceLimit {
                path: path.to_path_buf(),
                pixels,
                limit,
            }),
            _ => Ok(()),
        }
    }
}

pub struct FormatLoader {
    decoders: HashMap<String, Arc<dyn FormatDecoder>>,
    limits: DecodeLimits,
}

impl FormatLoader {
    /// An empty registry. Every load fails until decoders are registered.
    pub fn new(limits: DecodeLimits) -> Self {
        Self {
            decoders: HashMap::new(),
            limits,
        }
    }

    /// Registry with raster, PSD and camera RAW support.
    pub fn with_default_formats(limits: DecodeLimits) -> Self {
        let mut loader = Self::new(limits);
        loader.register_all(RASTER_EXTENSIONS, Arc::new(RasterDecoder));
        loader.register_all(LAYERED_EXTENSIONS, Arc::new(LayeredDecoder));
        loader.register_all(RAW_EXTENSIONS, Arc::new(RawSensorDecoder));
        loader
    }

    pub fn register(&mut self, extension: &str, decoder: Arc<dyn FormatDecoder>) {
        self.decoders
            .insert(normalize_extension(extension), decoder);
    }

    fn register_all(&mut self, extensions: &[&str], decoder: Arc<dyn FormatDecoder>) {
        for extension in extensions {
            self.register(extension, Arc::clone(&decoder));
        }
    }

    pub const fn limits(&self) -> DecodeLimits {
        self.limits
    }

    pub fn classify(&self, path: &Path) -> Option<FormatKind> {
        self.decoder_for(path).map(|decoder| decoder.kind())
    }

    pub fn supports(&self, path: &Path) -> bool {
        self.decoder_for(path).is_some()
    }

    /// Registered extensions for `kind`, sorted.
    pub fn extensions_for(&self, kind: FormatKind) -> Vec<String> {
        self.decoders
            .iter()
            .filter(|(_, decoder)| decoder.kind() == kind)
            .map(|(extension, _)| extension.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn kinds(&self) -> BTreeSet<FormatKind> {
        self.decoders.values().map(|decoder| decoder.kind()).collect()
    }

    pub fn load(&self, path: &Path) -> Result<ImageAsset, DecodeError> {
        let decoder = self
            .decoder_for(path)
            .ok_or_else(|| DecodeError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension_of(path).unwrap_or_default(),
            })?;

        let kind = decoder.kind();
        log::debug!("Decoding {} as {} image", path.display(), kind);
        let pixels = decoder.decode(path, &self.limits)?;

        Ok(ImageAsset {
            path: path.to_path_buf(),
            kind,
            pixels,
        })
    }

    fn decoder_for(&self, path: &Path) -> Option<&Arc<dyn FormatDecoder>> {
        extension_of(path).and_then(|extension| self.decoders.get(&extension))
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(normalize_extension)
}

/// Run a third-party decoder, turning a panic inside it into `Corrupt`.
///
/// The psd and rawloader parsers index into the input without bounds checks
/// on some malformed files.
pub(crate) fn guard_decoder<T>(
    path: &Path,
    kind: FormatKind,
    decode: impl FnOnce() -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(decode)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "decoder panicked".to_string());
        log::warn!("{kind} decoder panicked on {}: {message}", path.display());
        Err(DecodeError::Corrupt {
            path: path.to_path_buf(),
            kind,
            source: format!("malformed input: {message}").into(),
        })
    })
}
