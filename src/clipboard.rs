//! System clipboard integration.

use arboard::Clipboard;
#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "android", target_os = "emscripten"))
))]
use arboard::SetExtLinux;

use crate::errors::{BatchCaptionError, Result};
use crate::traits::ClipboardSync;

/// The OS clipboard, opened on first use so headless sessions that never
/// finish a batch do not need a display connection.
///
/// On X11 and Wayland the selection is served by the process that set it, so
/// the last push is handed to a clipboard manager (or the next application
/// that copies) before exit.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<Clipboard>,
    last: Option<String>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self) -> Result<&mut Clipboard> {
        if self.inner.is_none() {
            let clipboard = Clipboard::new().map_err(|e| BatchCaptionError::Clipboard {
                source: Box::new(e),
            })?;
            self.inner = Some(clipboard);
        }

        self.inner.as_mut().ok_or_else(|| BatchCaptionError::Clipboard {
            source: "clipboard unavailable".into(),
        })
    }
}

impl ClipboardSync for SystemClipboard {
    fn set_contents(&mut self, text: &str) -> Result<()> {
        log::debug!("Copying {} bytes to clipboard", text.len());
        self.handle()?
            .set_text(text)
            .map_err(|e| BatchCaptionError::Clipboard {
                source: Box::new(e),
            })?;
        self.last = Some(text.to_string());
        Ok(())
    }

    #[cfg(all(
        unix,
        not(any(target_os = "macos", target_os = "android", target_os = "emscripten"))
    ))]
    fn hand_off(&mut self) -> Result<()> {
        let Some(text) = self.last.take() else {
            return Ok(());
        };

        log::info!("Keeping captions on the clipboard until another application takes them");
        // blocks until a clipboard manager or another client owns the selection
        self.handle()?
            .set()
            .wait()
            .text(text)
            .map_err(|e| BatchCaptionError::Clipboard {
                source: Box::new(e),
            })
    }
}
