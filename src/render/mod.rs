//! Document renderers: plain text in, PDF bytes out.
//!
//! ## Backends
//!
//! | Renderer | Where it runs | Notes |
//! |----------|---------------|-------|
//! | [`TextLayoutRenderer`] | blocking pool, in-process | default; A4 layout via `oxidize-pdf`, Helvetica or an embedded `layout_font` |
//! | [`BrowserRenderer`]    | child process | headless Chromium `--print-to-pdf`; needs a browser binary |
//!
//! Callers bound every render with a timeout. Dropping an in-flight
//! [`BrowserRenderer`] future kills the child and removes its scratch
//! directory, so the timeout alone is enough to reclaim the resources.

pub mod browser;
pub mod layout;

pub use browser::BrowserRenderer;
pub use layout::TextLayoutRenderer;

use crate::config::{RendererKind, ServiceConfig};
use crate::error::ServiceError;
use async_trait::async_trait;
use std::sync::Arc;

/// Turns a block of plain text into a complete PDF document.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// Short identifier used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Render `text` and return the encoded PDF.
    async fn render_text(&self, text: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Build the renderer selected in `config`.
pub fn from_config(config: &ServiceConfig) -> Arc<dyn DocumentRenderer> {
    match &config.renderer {
        RendererKind::Layout => {
            let mut layout = TextLayoutRenderer::default();
            if let Some(font) = &config.layout_font {
                layout = layout.with_font_file(font.clone());
            }
            Arc::new(layout)
        }
        RendererKind::Browser { binary } => Arc::new(BrowserRenderer::new(binary.clone())),
    }
}
