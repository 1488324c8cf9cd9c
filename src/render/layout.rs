//! In-process text layout on A4 pages with `oxidize-pdf`.
//!
//! ## Fonts
//!
//! Without a font file the page uses the built-in Helvetica, which can only
//! show the WinAnsi (Windows-1252) repertoire. Text containing anything else,
//! CJK in particular, is rejected with [`ServiceError::RenderFailed`] rather
//! than printed as `?`. Configure a Unicode TrueType/OpenType font
//! (`layout_font`, e.g. Noto Sans CJK) to embed it and lay out any script.
//!
//! ## Why estimate glyph widths?
//!
//! Neither font exposes metrics we can query cheaply, and the input is plain
//! text where a slightly ragged right edge is acceptable. Lines are wrapped
//! at a budget of half-em units: one per ordinary character, two per
//! East Asian wide character.

use super::DocumentRenderer;
use crate::error::ServiceError;
use async_trait::async_trait;
use oxidize_pdf::{Document, Font, Page};
use std::path::PathBuf;
use tracing::debug;

const RENDERER: &str = "layout";

/// A4 in PDF points.
const PAGE_WIDTH: f64 = 595.0;
const PAGE_HEIGHT: f64 = 842.0;
/// 20 mm.
const MARGIN: f64 = 56.7;
const AVG_GLYPH_EM: f64 = 0.5;
const TAB_WIDTH: usize = 4;
/// Resource name of the embedded font inside the generated document.
const EMBEDDED_FONT: &str = "BodyText";

/// Lays plain text out on A4 pages, in Helvetica or an embedded font.
#[derive(Debug, Clone)]
pub struct TextLayoutRenderer {
    font_size: f64,
    line_height: f64,
    font_file: Option<PathBuf>,
}

impl Default for TextLayoutRenderer {
    fn default() -> Self {
        Self {
            font_size: 11.0,
            line_height: 14.0,
            font_file: None,
        }
    }
}

impl TextLayoutRenderer {
    pub fn with_font_size(font_size: f64) -> Self {
        Self {
            font_size,
            line_height: font_size * 1.3,
            ..Self::default()
        }
    }

    /// Embed the TrueType/OpenType font at `path` instead of Helvetica.
    pub fn with_font_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_file = Some(path.into());
        self
    }

    fn chars_per_line(&self) -> usize {
        let usable = PAGE_WIDTH - 2.0 * MARGIN;
        ((usable / (self.font_size * AVG_GLYPH_EM)).floor() as usize).max(1)
    }

    fn lines_per_page(&self) -> usize {
        let usable = PAGE_HEIGHT - 2.0 * MARGIN;
        ((usable / self.line_height).floor() as usize).max(1)
    }

    fn layout_blocking(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let mut doc = Document::new();
        let font = match &self.font_file {
            Some(path) => {
                doc.add_font(EMBEDDED_FONT, path).map_err(|e| ServiceError::RenderFailed {
                    renderer: RENDERER,
                    detail: format!("cannot load font {}: {e}", path.display()),
                })?;
                Font::custom(EMBEDDED_FONT)
            }
            None => {
                if let Some(c) = text.chars().find(|&c| !c.is_control() && !is_winansi(c)) {
                    return Err(ServiceError::RenderFailed {
                        renderer: RENDERER,
                        detail: format!(
                            "character '{c}' (U+{:04X}) is not available in Helvetica; \
                             configure a Unicode layout font",
                            u32::from(c)
                        ),
                    });
                }
                Font::Helvetica
            }
        };

        let lines = wrap_text(text, self.chars_per_line());
        let per_page = self.lines_per_page();
        let mut pages = 0usize;

        // An empty input still yields one (blank) page.
        let chunks: Vec<&[String]> = if lines.is_empty() {
            vec![&[]]
        } else {
            lines.chunks(per_page).collect()
        };

        for chunk in chunks {
            let mut page = Page::a4();
            let mut y = PAGE_HEIGHT - MARGIN - self.font_size;
            for line in chunk {
                if !line.is_empty() {
                    page.text()
                        .set_font(font.clone(), self.font_size)
                        .at(MARGIN, y)
                        .write(line)
                        .map_err(render_err)?;
                }
                y -= self.line_height;
            }
            doc.add_page(page);
            pages += 1;
        }

        let mut bytes = Vec::new();
        doc.write(&mut bytes).map_err(render_err)?;
        debug!(
            "Laid out {} lines on {} page(s) in {} → {} bytes",
            lines.len(),
            pages,
            font.pdf_name(),
            bytes.len()
        );
        Ok(bytes)
    }
}

#[async_trait]
impl DocumentRenderer for TextLayoutRenderer {
    fn name(&self) -> &'static str {
        RENDERER
    }

    async fn render_text(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let this = self.clone();
        let text = text.to_owned();
        tokio::task::spawn_blocking(move || this.layout_blocking(&text))
            .await
            .map_err(|e| ServiceError::Internal(format!("Layout task panicked: {}", e)))?
    }
}

fn render_err(e: oxidize_pdf::PdfError) -> ServiceError {
    ServiceError::RenderFailed {
        renderer: RENDERER,
        detail: e.to_string(),
    }
}

/// True when `c` has a code in the WinAnsi encoding used for Helvetica.
fn is_winansi(c: char) -> bool {
    matches!(
        u32::from(c),
        0x20..=0x7E
            | 0xA0..=0xFF
            | 0x20AC
            | 0x201A
            | 0x0192
            | 0x201E
            | 0x2026
            | 0x2020
            | 0x2021
            | 0x02C6
            | 0x2030
            | 0x0160
            | 0x2039
            | 0x0152
            | 0x017D
            | 0x2018
            | 0x2019
            | 0x201C
            | 0x201D
            | 0x2022
            | 0x2013
            | 0x2014
            | 0x02DC
            | 0x2122
            | 0x0161
            | 0x203A
            | 0x0153
            | 0x017E
            | 0x0178
    )
}

/// Half-em units a character occupies: 2 for East Asian wide glyphs.
fn char_units(c: char) -> usize {
    match u32::from(c) {
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD => 2,
        _ => 1,
    }
}

fn text_units(s: &str) -> usize {
    s.chars().map(char_units).sum()
}

/// Split `text` into display lines of at most `width` half-em units.
///
/// Tabs expand to spaces, other control characters are dropped, words are
/// kept whole where possible and hard-split only when longer than a line.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    for raw in text.lines() {
        let line: String = raw
            .chars()
            .flat_map(|c| match c {
                '\t' => vec![' '; TAB_WIDTH],
                c if c.is_control() => vec![],
                c => vec![c],
            })
            .collect();

        if line.trim().is_empty() {
            out.push(String::new());
            continue;
        }

        let body = line.trim_start_matches(' ');
        let indent = (line.len() - body.len()).min(width.saturating_sub(1));
        let mut current = " ".repeat(indent);
        let mut current_len = indent;
        let mut has_word = false;
        for word in body.split(' ') {
            let word_len = text_units(word);
            let sep = usize::from(has_word);
            if current_len + sep + word_len <= width {
                if has_word {
                    current.push(' ');
                }
                current.push_str(word);
                current_len += sep + word_len;
                has_word = true;
                continue;
            }
            if has_word {
                out.push(std::mem::take(&mut current));
            }
            has_word = true;
            // Hard-split words that cannot fit on a line of their own.
            current.clear();
            current_len = 0;
            for c in word.chars() {
                let units = char_units(c);
                if current_len + units > width && !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                current.push(c);
                current_len += units;
            }
        }
        out.push(current);
    }
    out
}
