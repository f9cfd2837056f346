use std::collections::VecDeque;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::errors::{BatchCaptionError, Result};
use crate::loader::ImageAsset;
use crate::orchestrator::{Selection, SelectionBatch};
use crate::traits::{CaptionEngine, ClipboardSync, SelectionProvider};

/// Test caption engine.
///
/// Returns scripted captions in order, then falls back to `"caption of <stem>"`.
#[derive(Debug, Default)]
pub struct MockCaptionEngine {
    scripted: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<PathBuf>>,
    released: bool,
}

impl MockCaptionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_captions<I, T>(captions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            scripted: Mutex::new(captions.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Paths captioned so far, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().clone()
    }

    pub const fn is_released(&self) -> bool {
        self.released
    }
}

impl CaptionEngine for MockCaptionEngine {
    fn caption(&self, asset: &ImageAsset) -> Result<String> {
        if self.released {
            return Err(BatchCaptionError::engine(
                "caption generation",
                "engine already released",
            ));
        }

        self.calls.lock().push(asset.path.clone());
        let caption = self.scripted.lock().pop_front().unwrap_or_else(|| {
            let stem = asset
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("caption of {stem}")
        });
        Ok(caption)
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        Ok(())
    }
}

/// Selection provider that replays a fixed script, then cancels.
#[derive(Debug, Default)]
pub struct ScriptedSelection {
    script: VecDeque<Result<Selection>>,
    requests: usize,
}

impl ScriptedSelection {
    pub fn new<I>(batches: I) -> Self
    where
        I: IntoIterator<Item = Vec<PathBuf>>,
    {
        Self {
            script: batches
                .into_iter()
                .map(|paths| Ok(Selection::Batch(SelectionBatch::new(paths))))
                .collect(),
            requests: 0,
        }
    }

    /// Queue a picker failure after the scripted batches.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.script.push_back(Err(BatchCaptionError::Selection {
            source: message.to_string().into(),
        }));
        self
    }

    pub const fn requests(&self) -> usize {
        self.requests
    }
}

impl SelectionProvider for ScriptedSelection {
    fn request_batch(&mut self) -> Result<Selection> {
        self.requests += 1;
        self.script.pop_front().unwrap_or(Ok(Selection::Cancelled))
    }
}

/// Clipboard that remembers every value it was given.
#[derive(Debug, Default)]
pub struct RecordingClipboard {
    history: Vec<String>,
    handed_off: bool,
}

impl RecordingClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn contents(&self) -> Option<&str> {
        self.history.last().map(String::as_str)
    }

    pub fn is_handed_off(&self) -> bool {
        self.handed_off
    }
}

impl ClipboardSync for RecordingClipboard {
    fn set_contents(&mut self, text: &str) -> Result<()> {
        self.history.push(text.to_string());
        Ok(())
    }

    fn hand_off(&mut self) -> Result<()> {
        self.handed_off = true;
        Ok(())
    }
}
