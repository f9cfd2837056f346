use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};

use crate::errors::{BatchCaptionError, Result};
use crate::loader::FormatLoader;
use crate::persistence::SidecarWriter;
use crate::traits::{CaptionEngine, ClipboardSync, SelectionProvider};

/// Paths picked in one selection, in the order the provider returned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionBatch(Vec<PathBuf>);

impl SelectionBatch {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self(paths)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PathBuf>> for SelectionBatch {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self::new(paths)
    }
}

/// Outcome of one selection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Batch(SelectionBatch),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionRecord {
    pub path: PathBuf,
    pub caption: String,
}

impl CaptionRecord {
    pub fn new(path: impl Into<PathBuf>, caption: &str) -> Self {
        Self {
            path: path.into(),
            caption: caption.trim().to_string(),
        }
    }
}

/// Every caption produced since the session started, one per line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionAccumulator {
    text: String,
    records: usize,
}

impl SessionAccumulator {
    pub fn push(&mut self, record: &CaptionRecord) {
        self.text.push_str(&record.caption);
        self.text.push('\n');
        self.records += 1;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub const fn len(&self) -> usize {
        self.records
    }

    pub const fn is_empty(&self) -> bool {
        self.records == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingSelection,
    ProcessingBatch,
    Terminated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub batches: usize,
    pub captions: usize,
}

/// Drives the select → decode → caption → persist → accumulate loop.
///
/// Processing is strictly sequential. A failure while a batch is being
/// processed ends the session: sidecars already written stay on disk, but the
/// clipboard is only updated once a batch completes.
pub struct CaptionOrchestrator<E, S, C>
where
    E: CaptionEngine,
    S: SelectionProvider,
    C: ClipboardSync,
{
    engine: E,
    selection: S,
    clipboard: C,
    loader: FormatLoader,
    persistence: SidecarWriter,
    accumulator: SessionAccumulator,
    state: SessionState,
    batches: usize,
    show_progress: bool,
}

impl<E, S, C> CaptionOrchestrator<E, S, C>
where
    E: CaptionEngine,
    S: SelectionProvider,
    C: ClipboardSync,
{
    pub fn new(
        engine: E,
        selection: S,
        clipboard: C,
        loader: FormatLoader,
        persistence: SidecarWriter,
    ) -> Self {
        Self {
            engine,
            selection,
            clipboard,
            loader,
            persistence,
            accumulator: SessionAccumulator::default(),
            state: SessionState::AwaitingSelection,
            batches: 0,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub const fn state(&self) -> SessionState {
        self.state
    }

    pub const fn accumulator(&self) -> &SessionAccumulator {
        &self.accumulator
    }

    pub const fn engine(&self) -> &E {
        &self.engine
    }

    pub const fn selection(&self) -> &S {
        &self.selection
    }

    pub const fn clipboard(&self) -> &C {
        &self.clipboard
    }

    /// Run batches until the selection provider cancels, then release the
    /// engine. Returns how much work the session did.
    pub fn run(&mut self) -> Result<SessionSummary> {
        if self.state == SessionState::Terminated {
            return Err(BatchCaptionError::Configuration {
                message: "session already terminated".to_string(),
            });
        }

        while let Some(batch) = self.await_selection() {
            self.state = SessionState::ProcessingBatch;
            self.process_batch(&batch)?;
            self.batches += 1;

            self.clipboard.set_contents(self.accumulator.as_str())?;
            log::info!(
                "Captions copied to clipboard and saved to file. Ready for the next batch..."
            );
            self.state = SessionState::AwaitingSelection;
        }

        self.terminate()?;
        Ok(SessionSummary {
            batches: self.batches,
            captions: self.accumulator.len(),
        })
    }

    /// Decode and caption a single image without persisting it.
    pub fn caption_one(&self, path: &Path) -> Result<CaptionRecord> {
        let asset = self.loader.load(path)?;
        log::info!("Generating caption for {}...", path.display());
        let caption = self.engine.caption(&asset)?;
        Ok(CaptionRecord::new(asset.path, &caption))
    }

    fn await_selection(&mut self) -> Option<SelectionBatch> {
        self.state = SessionState::AwaitingSelection;
        log::info!("Selecting images from local system...");

        match self.selection.request_batch() {
            Ok(Selection::Batch(batch)) if !batch.is_empty() => Some(batch),
            Ok(_) => None,
            Err(e) => {
                log::warn!("{e}; ending session");
                None
            }
        }
    }

    fn process_batch(&mut self, batch: &SelectionBatch) -> Result<()> {
        let pb = self.progress_bar(batch.len());

        for path in batch.paths() {
            let record = self.caption_one(path)?;
            log::info!("Caption generated: {}", record.caption);

            self.persistence.save(&record.path, &record.caption)?;
            self.accumulator.push(&record);
            pb.inc(1);
        }

        pb.finish_and_clear();
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.state = SessionState::Terminated;
        log::info!("Session finished, releasing caption engine resources");
        self.engine.release()?;
        self.clipboard.hand_off()
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}
