//! Headless-browser rendering: text → HTML page → Chromium `--print-to-pdf`.
//!
//! Each render gets its own scratch [`TempDir`] holding `input.html` and
//! `output.pdf`. The child is spawned with `kill_on_drop(true)`, so when the
//! caller's timeout drops this future the browser is killed and the scratch
//! directory is removed on the same path.

use super::DocumentRenderer;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

const RENDERER: &str = "browser";

/// Renders through an external headless Chromium/Chrome binary.
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    binary: PathBuf,
}

impl BrowserRenderer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, html: &Path, pdf: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--no-pdf-header-footer")
            .arg(format!("--print-to-pdf={}", pdf.display()))
            .arg(format!("file://{}", html.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

fn failed(detail: impl Into<String>) -> ServiceError {
    ServiceError::RenderFailed {
        renderer: RENDERER,
        detail: detail.into(),
    }
}

#[async_trait]
impl DocumentRenderer for BrowserRenderer {
    fn name(&self) -> &'static str {
        RENDERER
    }

    async fn render_text(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let scratch = TempDir::new().map_err(|e| failed(format!("scratch dir: {e}")))?;
        let html_path = scratch.path().join("input.html");
        let pdf_path = scratch.path().join("output.pdf");

        tokio::fs::write(&html_path, html_page(text))
            .await
            .map_err(|e| ServiceError::storage(&html_path, e))?;

        debug!("Launching {} for {}", self.binary.display(), html_path.display());
        let output = self
            .command(&html_path, &pdf_path)
            .output()
            .await
            .map_err(|e| failed(format!("cannot start '{}': {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Browser exited with {}: {}", output.status, stderr.trim());
            return Err(failed(format!("browser exited with {}", output.status)));
        }

        let bytes = tokio::fs::read(&pdf_path)
            .await
            .map_err(|e| failed(format!("no PDF produced: {e}")))?;
        if bytes.is_empty() {
            return Err(failed("browser produced an empty PDF"));
        }
        Ok(bytes)
    }
}

/// Wrap `text` in a minimal printable HTML page.
fn html_page(text: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <style>@page {{ size: A4; margin: 20mm; }} \
         body {{ font-family: Helvetica, Arial, \"Microsoft YaHei\", SimSun, \"Noto Sans CJK SC\", sans-serif; font-size: 11pt; }} \
         pre {{ white-space: pre-wrap; word-wrap: break-word; font-family: inherit; }}</style>\
         </head><body><pre>{}</pre></body></html>\n",
        escape_html(text)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Skip unless `WEBTOOLS_BROWSER_E2E` is set; evaluates to the binary path.
    macro_rules! browser_skip_unless_ready {
        () => {{
            match std::env::var("WEBTOOLS_BROWSER_E2E") {
                Ok(bin) if !bin.is_empty() => bin,
                _ => {
                    println!("SKIP: set WEBTOOLS_BROWSER_E2E=<chromium binary> to run");
                    return;
                }
            }
        }};
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<b>\"a\" & 'b'</b>"),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn page_embeds_escaped_text() {
        let html = html_page("1 < 2");
        assert!(html.contains("<pre>1 &lt; 2</pre>"));
        assert!(html.contains("size: A4"));
        assert!(html.contains("SimSun"));
    }

    #[tokio::test]
    async fn missing_binary_is_render_failure() {
        let r = BrowserRenderer::new("/nonexistent/chromium-for-tests");
        let err = r.render_text("hi").await.unwrap_err();
        assert!(matches!(err, ServiceError::RenderFailed { renderer: "browser", .. }));
    }

    #[tokio::test]
    async fn renders_with_real_browser() {
        let bin = browser_skip_unless_ready!();
        let bytes = BrowserRenderer::new(bin)
            .render_text("Hello from a headless browser")
            .await
            .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
