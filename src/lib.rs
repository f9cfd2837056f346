pub mod clipboard;
pub mod config;
pub mod errors;
pub mod imageops;
pub mod loader;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod selection;
pub mod traits;

pub mod mocks;

pub use clipboard::SystemClipboard;
pub use config::Config;
pub use errors::{BatchCaptionError, DecodeError, Result};
pub use loader::{DecodeLimits, FormatKind, FormatLoader, ImageAsset};
pub use model::CaptionModel;
pub use orchestrator::{
    CaptionOrchestrator, CaptionRecord, Selection, SelectionBatch, SessionAccumulator,
    SessionState, SessionSummary,
};
pub use persistence::{sidecar_path, SidecarWriter};
pub use selection::{FileDialogSelection, PathListSelection};
pub use traits::*;
