//! Single-shot image operations: JPEG compression and format conversion.
//!
//! Unlike document conversions these are not tracked. Each call decodes the
//! input, writes one new file named `<uuid>.<ext>` next to it in storage and
//! reports sizes; the file is downloadable by that name until the sweep
//! removes it.
//!
//! Decoding and encoding are CPU-bound and run on the blocking pool.

use crate::error::ServiceError;
use crate::format;
use crate::naming;
use crate::storage::StorageLocation;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// `<uuid>.<ext>` as produced by [`naming::artifact`].
static RE_IMAGE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.[a-z0-9]{1,5}$").unwrap()
});

// ── Options ──────────────────────────────────────────────────────────────

/// Allowed targets for [`ImageProcessor::convert_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    Jpeg,
    Png,
    Webp,
    Gif,
    Tiff,
}

impl ImageTarget {
    /// Extension used for the output file; same as the request token.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
            Self::Tiff => "tiff",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Webp => ImageFormat::WebP,
            Self::Gif => ImageFormat::Gif,
            Self::Tiff => ImageFormat::Tiff,
        }
    }
}

impl FromStr for ImageTarget {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "gif" => Ok(Self::Gif),
            "tiff" => Ok(Self::Tiff),
            other => Err(ServiceError::UnsupportedImageFormat {
                format: other.to_string(),
            }),
        }
    }
}

/// JPEG quality and linear scale, both percentages in `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    pub quality: u8,
    pub scale: u8,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            quality: 70,
            scale: 100,
        }
    }
}

impl CompressOptions {
    pub fn new(quality: u32, scale: u32) -> Result<Self, ServiceError> {
        Ok(Self {
            quality: percent("quality", quality)?,
            scale: percent("scale", scale)?,
        })
    }

    /// Parse optional form values, falling back to the defaults when absent
    /// or blank.
    pub fn from_form(quality: Option<&str>, scale: Option<&str>) -> Result<Self, ServiceError> {
        let d = Self::default();
        Self::new(
            parse_field("quality", quality, d.quality)?,
            parse_field("scale", scale, d.scale)?,
        )
    }

    fn validate(&self) -> Result<(), ServiceError> {
        percent("quality", self.quality.into())?;
        percent("scale", self.scale.into())?;
        Ok(())
    }
}

fn percent(name: &'static str, v: u32) -> Result<u8, ServiceError> {
    match u8::try_from(v) {
        Ok(p @ 1..=100) => Ok(p),
        _ => Err(ServiceError::InvalidImageOption {
            name,
            detail: format!("{v} is outside 1..=100"),
        }),
    }
}

fn parse_field(name: &'static str, raw: Option<&str>, default: u8) -> Result<u32, ServiceError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default.into()),
        Some(s) => s.parse().map_err(|_| ServiceError::InvalidImageOption {
            name,
            detail: format!("'{s}' is not a whole number"),
        }),
    }
}

// ── Reports ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionReport {
    pub image_id: String,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percent saved; negative when the output grew.
    pub compression_ratio: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatReport {
    pub image_id: String,
    pub original_format: String,
    pub converted_format: String,
    pub original_size: u64,
    pub converted_size: u64,
}

/// `round((1 - compressed / original) * 100)`, half rounding up; 0 when
/// `original` is 0.
pub fn compression_ratio(original: u64, compressed: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    let saved = (1.0 - compressed as f64 / original as f64) * 100.0;
    (saved + 0.5).floor() as i64
}

// ── Processor ────────────────────────────────────────────────────────────

/// Runs image operations against one storage location.
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    storage: StorageLocation,
}

impl ImageProcessor {
    pub fn new(storage: StorageLocation) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageLocation {
        &self.storage
    }

    /// Re-encode `input` as JPEG at `options.quality`, scaled by `options.scale`.
    pub async fn compress(
        &self,
        input: &Path,
        options: CompressOptions,
    ) -> Result<CompressionReport, ServiceError> {
        options.validate()?;
        self.require_source(input).await?;

        let (_, image_id) = naming::artifact("jpg");
        let output = self.storage.path_for(&image_id);
        let (src, dst) = (input.to_path_buf(), output.clone());
        let res = run_blocking(move || compress_blocking(&src, &dst, options)).await;
        self.finish(res, &output).await?;

        let original_size = self.storage.file_size(input).await?;
        let compressed_size = self.storage.file_size(&output).await?;
        let ratio = compression_ratio(original_size, compressed_size);
        info!(
            "Compressed {} → {} ({} → {} bytes, {}%)",
            input.display(),
            image_id,
            original_size,
            compressed_size,
            ratio
        );
        Ok(CompressionReport {
            image_id,
            original_size,
            compressed_size,
            compression_ratio: ratio,
        })
    }

    /// Convert `input` to `target_format`.
    ///
    /// The target is checked against the allow-list before anything is read
    /// or written.
    pub async fn convert_format(
        &self,
        input: &Path,
        target_format: &str,
    ) -> Result<FormatReport, ServiceError> {
        let target: ImageTarget = target_format.parse()?;
        self.require_source(input).await?;

        let (_, image_id) = naming::artifact(target.extension());
        let output = self.storage.path_for(&image_id);
        let (src, dst) = (input.to_path_buf(), output.clone());
        let res = run_blocking(move || convert_blocking(&src, &dst, target)).await;
        self.finish(res, &output).await?;

        let report = FormatReport {
            original_format: naming::extension_of(input).unwrap_or_else(|| "unknown".into()),
            converted_format: target.extension().to_string(),
            original_size: self.storage.file_size(input).await?,
            converted_size: self.storage.file_size(&output).await?,
            image_id,
        };
        info!(
            "Converted {} ({}) → {}",
            input.display(),
            report.original_format,
            report.image_id
        );
        Ok(report)
    }

    /// Path and MIME type of a processed image.
    pub async fn locate(&self, image_id: &str) -> Result<(PathBuf, &'static str), ServiceError> {
        let not_found = || ServiceError::ImageNotFound {
            image_id: image_id.to_string(),
        };
        if !RE_IMAGE_ID.is_match(image_id) {
            return Err(not_found());
        }
        let path = self.storage.path_for(image_id);
        if !self.storage.exists(&path).await {
            return Err(not_found());
        }
        let ext = naming::extension_of(image_id).unwrap_or_default();
        Ok((path, format::mime_for_extension(&ext)))
    }

    async fn require_source(&self, input: &Path) -> Result<(), ServiceError> {
        if self.storage.exists(input).await {
            Ok(())
        } else {
            Err(ServiceError::SourceNotFound {
                path: input.to_path_buf(),
            })
        }
    }

    /// Drop partial output when the blocking step failed.
    async fn finish(&self, res: Result<(), ServiceError>, output: &Path) -> Result<(), ServiceError> {
        if res.is_err() {
            self.storage.remove_best_effort(output).await;
        }
        res
    }
}

async fn run_blocking<F>(f: F) -> Result<(), ServiceError>
where
    F: FnOnce() -> Result<(), ServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServiceError::Internal(format!("Image task panicked: {}", e)))?
}

fn decode(path: &Path) -> Result<DynamicImage, ServiceError> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| ServiceError::storage(path, e))?;
    Ok(reader.decode()?)
}

fn compress_blocking(src: &Path, dst: &Path, options: CompressOptions) -> Result<(), ServiceError> {
    let mut img = decode(src)?;
    if options.scale < 100 {
        let (w, h) = scaled_size(img.width(), img.height(), options.scale);
        debug!("Resizing {}x{} → {}x{}", img.width(), img.height(), w, h);
        img = img.resize_exact(w, h, FilterType::Lanczos3);
    }

    let file = File::create(dst).map_err(|e| ServiceError::storage(dst, e))?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, options.quality);
    DynamicImage::ImageRgb8(img.to_rgb8()).write_with_encoder(encoder)?;
    writer.flush().map_err(|e| ServiceError::storage(dst, e))
}

/// Width scaled by `scale` percent; height follows the aspect ratio of the
/// rounded width.
fn scaled_size(width: u32, height: u32, scale: u8) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let w = ((f64::from(width) * f64::from(scale) / 100.0).round() as u32).max(1);
    let h = ((f64::from(w) * f64::from(height) / f64::from(width)).round() as u32).max(1);
    (w, h)
}

fn convert_blocking(src: &Path, dst: &Path, target: ImageTarget) -> Result<(), ServiceError> {
    let img = decode(src)?;
    // JPEG has no alpha channel; the other targets keep it.
    let img = match target {
        ImageTarget::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => DynamicImage::ImageRgba8(img.to_rgba8()),
    };
    img.save_with_format(dst, target.image_format())?;
    Ok(())
}
