//! Configuration types for the conversion service.
//!
//! All service behaviour is controlled through [`ServiceConfig`], built via
//! its [`ServiceConfigBuilder`]. Every knob has a documented default matching
//! the reference deployment: port 5002, a single `uploads/` directory, 50 MB
//! uploads, 10 MB documents, 24 h retention swept hourly.

use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const MIB: u64 = 1024 * 1024;

/// Configuration for the conversion service.
///
/// Built via [`ServiceConfig::builder()`] or using [`ServiceConfig::default()`].
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use webtools_convert::ServiceConfig;
///
/// let config = ServiceConfig::builder()
///     .storage_dir("/var/lib/webtools")
///     .retention(Duration::from_secs(6 * 3600))
///     .build()
///     .unwrap();
/// assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to. Default: `0.0.0.0:5002`.
    pub bind_addr: SocketAddr,

    /// Directory holding uploaded sources and produced artifacts. Default: `uploads`.
    pub storage_dir: PathBuf,

    /// Transport-level upload limit in bytes. Default: 50 MB.
    pub max_upload_bytes: u64,

    /// Application-level limit for documents submitted for conversion. Default: 10 MB.
    pub max_document_bytes: u64,

    /// Files older than this are removed by the reclamation sweep. Default: 24 h.
    pub retention: Duration,

    /// Interval between reclamation sweeps. Default: 1 h.
    pub sweep_interval: Duration,

    /// Upper bound for a single document render. Default: 60 s.
    pub render_timeout: Duration,

    /// Which document renderer backs the text → PDF conversion.
    pub renderer: RendererKind,

    /// Unicode TrueType/OpenType font embedded by the layout renderer.
    /// Default: none (Helvetica, WinAnsi characters only).
    pub layout_font: Option<PathBuf>,

    /// Artificial delay applied by the passthrough converter. Default: 0.
    pub passthrough_delay: Duration,

    /// Reject `(source, target)` pairs absent from the format catalogue
    /// instead of falling back to passthrough. Default: false.
    pub strict_targets: bool,

    /// Include internal error detail in HTTP error bodies. Default: false.
    pub expose_error_details: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5002)),
            storage_dir: PathBuf::from("uploads"),
            max_upload_bytes: 50 * MIB,
            max_document_bytes: 10 * MIB,
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60 * 60),
            render_timeout: Duration::from_secs(60),
            renderer: RendererKind::default(),
            layout_font: None,
            passthrough_delay: Duration::ZERO,
            strict_targets: false,
            expose_error_details: false,
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_document_bytes(mut self, bytes: u64) -> Self {
        self.config.max_document_bytes = bytes;
        self
    }

    pub fn retention(mut self, age: Duration) -> Self {
        self.config.retention = age;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.config.render_timeout = timeout;
        self
    }

    pub fn renderer(mut self, kind: RendererKind) -> Self {
        self.config.renderer = kind;
        self
    }

    pub fn layout_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.layout_font = Some(path.into());
        self
    }

    pub fn passthrough_delay(mut self, delay: Duration) -> Self {
        self.config.passthrough_delay = delay;
        self
    }

    pub fn strict_targets(mut self, v: bool) -> Self {
        self.config.strict_targets = v;
        self
    }

    pub fn expose_error_details(mut self, v: bool) -> Self {
        self.config.expose_error_details = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, ServiceError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(ServiceError::InvalidConfig(
                "max_upload_bytes must be ≥ 1".into(),
            ));
        }
        if c.max_document_bytes == 0 {
            return Err(ServiceError::InvalidConfig(
                "max_document_bytes must be ≥ 1".into(),
            ));
        }
        if c.sweep_interval.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "sweep_interval must be non-zero".into(),
            ));
        }
        if c.render_timeout.is_zero() {
            return Err(ServiceError::InvalidConfig(
                "render_timeout must be non-zero".into(),
            ));
        }
        if c.storage_dir.as_os_str().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "storage_dir must not be empty".into(),
            ));
        }
        if let Some(font) = &c.layout_font {
            if !font.is_file() {
                return Err(ServiceError::InvalidConfig(format!(
                    "layout_font {} is not a readable file",
                    font.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Backend used to turn plain text into a PDF document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RendererKind {
    /// In-process A4 text layout (default). No external dependencies.
    #[default]
    Layout,
    /// Headless Chromium launched per render with `--print-to-pdf`.
    Browser {
        /// Path or command name of the Chromium/Chrome executable.
        binary: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_deployment() {
        let c = ServiceConfig::default();
        assert_eq!(c.bind_addr.port(), 5002);
        assert_eq!(c.max_upload_bytes, 50 * MIB);
        assert_eq!(c.max_document_bytes, 10 * MIB);
        assert_eq!(c.retention, Duration::from_secs(86_400));
        assert_eq!(c.sweep_interval, Duration::from_secs(3_600));
        assert_eq!(c.renderer, RendererKind::Layout);
        assert!(!c.strict_targets);
        assert!(c.layout_font.is_none());
    }

    #[test]
    fn builder_overrides_fields() {
        let c = ServiceConfig::builder()
            .storage_dir("/tmp/x")
            .strict_targets(true)
            .passthrough_delay(Duration::from_millis(1500))
            .build()
            .unwrap();
        assert_eq!(c.storage_dir, PathBuf::from("/tmp/x"));
        assert!(c.strict_targets);
        assert_eq!(c.passthrough_delay, Duration::from_millis(1500));
    }

    #[test]
    fn zero_sweep_interval_rejected() {
        let err = ServiceConfig::builder()
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidConfig(_)));
    }

    #[test]
    fn missing_layout_font_rejected() {
        let err = ServiceConfig::builder()
            .layout_font("/nonexistent/fonts/NotoSansCJK.ttc")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("layout_font"));
    }

    #[test]
    fn zero_upload_limit_rejected() {
        assert!(ServiceConfig::builder().max_upload_bytes(0).build().is_err());
    }
}
