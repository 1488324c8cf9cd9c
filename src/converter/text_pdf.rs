//! Plain text → PDF, the one conversion with a real implementation.

use super::Converter;
use crate::error::ServiceError;
use crate::render::DocumentRenderer;
use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Decodes a text file and renders it with a [`DocumentRenderer`].
pub struct TextToPdfConverter {
    renderer: Arc<dyn DocumentRenderer>,
    timeout: Duration,
}

impl TextToPdfConverter {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, timeout: Duration) -> Self {
        Self { renderer, timeout }
    }
}

#[async_trait]
impl Converter for TextToPdfConverter {
    fn name(&self) -> &'static str {
        "text_to_pdf"
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ServiceError> {
        let raw = tokio::fs::read(input)
            .await
            .map_err(|e| ServiceError::storage(input, e))?;
        let text = decode_text(&raw);
        debug!(
            "Decoded {} bytes → {} chars from {}",
            raw.len(),
            text.chars().count(),
            input.display()
        );

        let renderer = self.renderer.name();
        let pdf = tokio::time::timeout(self.timeout, self.renderer.render_text(&text))
            .await
            .map_err(|_| ServiceError::RenderTimeout {
                renderer,
                secs: self.timeout.as_secs(),
            })??;

        if pdf.is_empty() {
            return Err(ServiceError::RenderFailed {
                renderer,
                detail: "renderer returned no bytes".into(),
            });
        }

        tokio::fs::write(output, &pdf)
            .await
            .map_err(|e| ServiceError::storage(output, e))
    }
}

/// Decode text honouring a UTF-8 / UTF-16LE / UTF-16BE byte-order mark.
///
/// Without a BOM the bytes are taken as UTF-8; invalid sequences become U+FFFD.
fn decode_text(raw: &[u8]) -> String {
    let (encoding, bom_len) = Encoding::for_bom(raw).unwrap_or((UTF_8, 0));
    let (text, _had_errors) = encoding.decode_without_bom_handling(&raw[bom_len..]);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct SlowRenderer;

    #[async_trait]
    impl DocumentRenderer for SlowRenderer {
        fn name(&self) -> &'static str {
            "slow"
        }
        async fn render_text(&self, _text: &str) -> Result<Vec<u8>, ServiceError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(b"%PDF".to_vec())
        }
    }

    struct EchoRenderer;

    #[async_trait]
    impl DocumentRenderer for EchoRenderer {
        fn name(&self) -> &'static str {
            "echo"
        }
        async fn render_text(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
            Ok(text.as_bytes().to_vec())
        }
    }

    #[test]
    fn decodes_utf8_with_and_without_bom() {
        assert_eq!(decode_text(b"hello"), "hello");
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello"), "hello");
    }

    #[test]
    fn decodes_utf16_boms() {
        assert_eq!(decode_text(b"\xFF\xFEh\0i\0"), "hi");
        assert_eq!(decode_text(b"\xFE\xFF\0h\0i"), "hi");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(decode_text(b"a\xFFb"), "a\u{FFFD}b");
    }

    #[tokio::test]
    async fn writes_rendered_bytes() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("in.txt");
        let dst = tmp.path().join("out.pdf");
        std::fs::write(&src, "\u{FEFF}body").unwrap();

        TextToPdfConverter::new(Arc::new(EchoRenderer), Duration::from_secs(5))
            .convert(&src, &dst)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dst).unwrap(), b"body");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_renderer_times_out() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("in.txt");
        std::fs::write(&src, "x").unwrap();

        let err = TextToPdfConverter::new(Arc::new(SlowRenderer), Duration::from_secs(60))
            .convert(&src, &tmp.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::RenderTimeout {
                renderer: "slow",
                secs: 60
            }
        ));
    }
}
