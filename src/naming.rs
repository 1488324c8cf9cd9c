//! Unique naming for uploads and artifacts.
//!
//! Every file the service writes is named `<uuid-v4><.ext>`. The token part
//! doubles as the task id for document conversions and as the image id for
//! processed images, so it has to be collision-free and safe to embed in a
//! path. Original file names are never used on disk.

use std::path::Path;
use uuid::Uuid;

/// Generate a fresh random token (UUID v4, hyphenated, lowercase).
pub fn new_token() -> String {
    Uuid::new_v4().to_string()
}

/// Lower-cased extension of `name` without the leading dot, if any.
///
/// ```rust
/// use webtools_convert::naming::extension_of;
/// assert_eq!(extension_of("Report.DOCX").as_deref(), Some("docx"));
/// assert_eq!(extension_of("README"), None);
/// ```
pub fn extension_of(name: impl AsRef<Path>) -> Option<String> {
    name.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_ascii_lowercase())
}

/// File name of `name` with its final extension removed.
///
/// Falls back to `"file"` when nothing usable is left (e.g. `".txt"`).
pub fn stem_of(name: impl AsRef<Path>) -> String {
    name.as_ref()
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("file")
        .to_string()
}

/// On-disk name for an upload: a fresh token plus the original's extension.
pub fn upload_file_name(original: &str) -> String {
    match extension_of(original) {
        Some(ext) => format!("{}.{}", new_token(), ext),
        None => new_token(),
    }
}

/// Fresh artifact name for the given extension. Returns `(token, file_name)`.
pub fn artifact(extension: &str) -> (String, String) {
    let token = new_token();
    let file_name = format!("{token}.{extension}");
    (token, file_name)
}
