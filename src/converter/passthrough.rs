//! Placeholder converter: copies the source unchanged.

use super::Converter;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Byte-for-byte copy standing in for conversions that are not implemented.
#[derive(Debug, Clone, Default)]
pub struct PassthroughConverter {
    delay: Duration,
}

impl PassthroughConverter {
    /// `delay` simulates processing time before the copy.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Converter for PassthroughConverter {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn is_passthrough(&self) -> bool {
        true
    }

    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ServiceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        warn!(
            "No converter for {} → {}; copying bytes unchanged",
            input.display(),
            output.display()
        );
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| ServiceError::storage(output, e))?;
        Ok(())
    }
}
