//! Converter capability registry.
//!
//! A conversion request is routed by matching the parsed `(source, target)`
//! format pair. Exactly one pair has a real converter today (plain text →
//! PDF); everything else, including unknown extensions, goes to the
//! passthrough converter, which copies bytes and flags the result so callers
//! can tell the user nothing was actually converted.

pub mod passthrough;
pub mod text_pdf;

pub use passthrough::PassthroughConverter;
pub use text_pdf::TextToPdfConverter;

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::format::DocumentFormat;
use crate::render::{self, DocumentRenderer};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// A routine that turns the file at `input` into a file at `output`.
#[async_trait]
pub trait Converter: Send + Sync {
    fn name(&self) -> &'static str;

    /// True for converters that do not change the format.
    fn is_passthrough(&self) -> bool {
        false
    }

    /// Produce `output` from `input`. On error, `output` may be partial.
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ServiceError>;
}

/// Which converter handles a given pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionRoute {
    TextToPdf,
    Passthrough,
}

impl ConversionRoute {
    /// Route for a source extension and a normalised target token.
    pub fn for_pair(source_ext: Option<&str>, target: &str) -> Self {
        let source = source_ext.and_then(DocumentFormat::from_extension);
        let target = DocumentFormat::from_extension(target);
        match (source, target) {
            (Some(DocumentFormat::Txt), Some(DocumentFormat::Pdf)) => Self::TextToPdf,
            _ => Self::Passthrough,
        }
    }
}

impl fmt::Display for ConversionRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextToPdf => f.write_str("text_to_pdf"),
            Self::Passthrough => f.write_str("passthrough"),
        }
    }
}

/// Maps each [`ConversionRoute`] to the converter that serves it.
#[derive(Clone)]
pub struct ConverterRegistry {
    text_to_pdf: Arc<dyn Converter>,
    passthrough: Arc<dyn Converter>,
}

impl ConverterRegistry {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        render_timeout: Duration,
        passthrough_delay: Duration,
    ) -> Self {
        Self {
            text_to_pdf: Arc::new(TextToPdfConverter::new(renderer, render_timeout)),
            passthrough: Arc::new(PassthroughConverter::new(passthrough_delay)),
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            render::from_config(config),
            config.render_timeout,
            config.passthrough_delay,
        )
    }

    /// Replace the converter serving `route`.
    pub fn with_converter(mut self, route: ConversionRoute, converter: Arc<dyn Converter>) -> Self {
        match route {
            ConversionRoute::TextToPdf => self.text_to_pdf = converter,
            ConversionRoute::Passthrough => self.passthrough = converter,
        }
        self
    }

    pub fn converter(&self, route: ConversionRoute) -> Arc<dyn Converter> {
        match route {
            ConversionRoute::TextToPdf => Arc::clone(&self.text_to_pdf),
            ConversionRoute::Passthrough => Arc::clone(&self.passthrough),
        }
    }

    /// Format pairs backed by a real converter.
    pub fn real_routes() -> &'static [(DocumentFormat, DocumentFormat)] {
        &[(DocumentFormat::Txt, DocumentFormat::Pdf)]
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("text_to_pdf", &self.text_to_pdf.name())
            .field("passthrough", &self.passthrough.name())
            .finish()
    }
}
