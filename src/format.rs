//! Document formats, MIME lookup and the supported-conversion catalogue.
//!
//! Three related tables live here:
//!
//! * [`DocumentFormat`]: the closed set of extensions the service knows by
//!   name. Converter dispatch matches on pairs of these.
//! * the MIME table used for download `Content-Type` headers; anything not
//!   listed is served as `application/octet-stream`.
//! * [`supported_formats`]: the catalogue advertised at `/api/file/formats`.
//!   It describes what clients may ask for, which is wider than what is
//!   actually converted (see [`crate::converter::ConverterRegistry::real_routes`]).

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

/// Fallback MIME type for unknown extensions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions accepted by the upload filter.
pub const ACCEPTED_UPLOAD_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "jpg", "jpeg", "png", "gif",
    "bmp", "csv", "json", "xml", "webp", "tiff",
];

// ── DocumentFormat ───────────────────────────────────────────────────────

/// A file format known to the service, identified by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Ppt,
    Pptx,
    Txt,
    Csv,
    Json,
    Xml,
    Jpeg,
    Png,
    Gif,
    Bmp,
    Webp,
    Tiff,
}

impl DocumentFormat {
    /// Parse an extension token (case-insensitive, leading dot optional).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        let f = match ext.as_str() {
            "pdf" => Self::Pdf,
            "doc" => Self::Doc,
            "docx" => Self::Docx,
            "xls" => Self::Xls,
            "xlsx" => Self::Xlsx,
            "ppt" => Self::Ppt,
            "pptx" => Self::Pptx,
            "txt" => Self::Txt,
            "csv" => Self::Csv,
            "json" => Self::Json,
            "xml" => Self::Xml,
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "gif" => Self::Gif,
            "bmp" => Self::Bmp,
            "webp" => Self::Webp,
            "tif" | "tiff" => Self::Tiff,
            _ => return None,
        };
        Some(f)
    }

    /// Canonical extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Txt => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Xml => "xml",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Webp => "webp",
            Self::Tiff => "tiff",
        }
    }

    /// Human-readable label used in the catalogue.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Doc => "Word (DOC)",
            Self::Docx => "Word (DOCX)",
            Self::Xls => "Excel (XLS)",
            Self::Xlsx => "Excel (XLSX)",
            Self::Ppt => "PowerPoint (PPT)",
            Self::Pptx => "PowerPoint (PPTX)",
            Self::Txt => "Text (TXT)",
            Self::Csv => "CSV",
            Self::Json => "JSON",
            Self::Xml => "XML",
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Gif => "GIF",
            Self::Bmp => "BMP",
            Self::Webp => "WebP",
            Self::Tiff => "TIFF",
        }
    }
}

// ── MIME table ───────────────────────────────────────────────────────────

static MIME_TYPES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("pdf", "application/pdf"),
        ("doc", "application/msword"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("xls", "application/vnd.ms-excel"),
        (
            "xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        ("ppt", "application/vnd.ms-powerpoint"),
        (
            "pptx",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ),
        ("txt", "text/plain"),
        ("csv", "text/csv"),
        ("json", "application/json"),
        ("xml", "application/xml"),
        ("jpg", "image/jpeg"),
        ("jpeg", "image/jpeg"),
        ("png", "image/png"),
        ("gif", "image/gif"),
        ("bmp", "image/bmp"),
        ("webp", "image/webp"),
        ("tif", "image/tiff"),
        ("tiff", "image/tiff"),
    ])
});

/// MIME type for an extension (case-insensitive, leading dot optional).
pub fn mime_for_extension(ext: &str) -> &'static str {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    MIME_TYPES.get(ext.as_str()).copied().unwrap_or(OCTET_STREAM)
}

// ── Catalogue ────────────────────────────────────────────────────────────

/// One entry of the supported-format catalogue.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatEntry {
    pub extension: &'static str,
    pub name: &'static str,
    pub target_formats: Vec<TargetEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetEntry {
    pub extension: &'static str,
    pub name: &'static str,
}

/// Response body of the catalogue endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct FormatCatalogue {
    pub formats: Vec<FormatEntry>,
}

use self::DocumentFormat as F;

const CATALOGUE: &[(DocumentFormat, &[DocumentFormat])] = &[
    (F::Pdf, &[F::Docx, F::Txt]),
    (F::Docx, &[F::Pdf, F::Txt]),
    (F::Doc, &[F::Pdf, F::Docx, F::Txt]),
    (F::Xlsx, &[F::Pdf, F::Csv]),
    (F::Xls, &[F::Pdf, F::Xlsx, F::Csv]),
    (F::Pptx, &[F::Pdf]),
    (F::Ppt, &[F::Pdf, F::Pptx]),
    (F::Txt, &[F::Pdf, F::Docx]),
];

fn entry(f: DocumentFormat) -> TargetEntry {
    TargetEntry {
        extension: f.extension(),
        name: f.display_name(),
    }
}

/// The advertised `(source → targets)` catalogue.
pub fn supported_formats() -> FormatCatalogue {
    FormatCatalogue {
        formats: CATALOGUE
            .iter()
            .map(|(src, targets)| FormatEntry {
                extension: src.extension(),
                name: src.display_name(),
                target_formats: targets.iter().copied().map(entry).collect(),
            })
            .collect(),
    }
}

/// True when the catalogue advertises `source → target`.
pub fn is_supported_pair(source: DocumentFormat, target: DocumentFormat) -> bool {
    CATALOGUE
        .iter()
        .any(|(src, targets)| *src == source && targets.contains(&target))
}

/// Upload filter: is a file with this name allowed in?
pub fn is_accepted_upload(file_name: &str) -> bool {
    crate::naming::extension_of(file_name)
        .is_some_and(|ext| ACCEPTED_UPLOAD_EXTENSIONS.contains(&ext.as_str()))
}
