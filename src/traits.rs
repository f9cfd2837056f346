use std::path::Path;

use image::RgbImage;

use crate::errors::{DecodeError, Result};
use crate::loader::{DecodeLimits, FormatKind, ImageAsset};
use crate::orchestrator::Selection;

/// Maps a decoded image to caption text.
///
/// The orchestrator receives an instance through its constructor; model and
/// device state stay inside the implementation.
pub trait CaptionEngine {
    /// Generate a caption for one image.
    fn caption(&self, asset: &ImageAsset) -> Result<String>;

    /// Free device-resident resources. Called once when the session terminates.
    fn release(&mut self) -> Result<()>;
}

/// Source of image batches, typically a user-facing file picker.
pub trait SelectionProvider {
    /// Block until the user picks a batch or cancels.
    fn request_batch(&mut self) -> Result<Selection>;
}

/// Replaces the system clipboard contents.
pub trait ClipboardSync {
    fn set_contents(&mut self, text: &str) -> Result<()>;

    /// Called once when the session terminates, before the process exits.
    ///
    /// Platforms where clipboard contents are served by the owning process
    /// use this to keep the last push readable after exit.
    fn hand_off(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One decoding capability in the loader's extension registry.
pub trait FormatDecoder: Send + Sync {
    fn kind(&self) -> FormatKind;

    /// Decode `path` into an RGB buffer, honoring `limits`.
    fn decode(
        &self,
        path: &Path,
        limits: &DecodeLimits,
    ) -> std::result::Result<RgbImage, DecodeError>;
}
