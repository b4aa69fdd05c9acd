//! Trait definitions for the converter module.

use async_trait::async_trait;

use super::error::ConverterError;
use super::types::{canonical_format, ConversionOutput, ConversionRequest, FormatPair};
use crate::job::Category;

/// A converter for one category of files.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Returns the name of this converter implementation.
    fn name(&self) -> &str;

    /// The category this converter is registered for.
    fn category(&self) -> Category;

    /// Every source/target combination this converter accepts.
    fn supported_pairs(&self) -> &[FormatPair];

    /// Whether `source -> target` is supported. Format aliases such as
    /// `jpg` are accepted.
    fn supports(&self, source: &str, target: &str) -> bool {
        let source = canonical_format(source);
        let target = canonical_format(target);
        self.supported_pairs()
            .iter()
            .any(|(s, t)| *s == source && *t == target)
    }

    /// Converts `request.input_path` into `request.output_path`.
    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError>;

    /// Validates that the converter is properly configured and ready.
    async fn validate(&self) -> Result<(), ConverterError>;
}

/// Rejects requests the converter cannot handle, before any work is done.
pub(crate) fn check_request<C: Converter + ?Sized>(
    converter: &C,
    request: &ConversionRequest,
) -> Result<(), ConverterError> {
    let actual = Category::from_format(&request.source_format);
    if actual != converter.category() {
        return Err(ConverterError::CategoryMismatch {
            converter: converter.name().to_string(),
            expected: converter.category(),
            actual,
        });
    }
    if !converter.supports(&request.source_format, &request.target_format) {
        return Err(ConverterError::unsupported_pair(
            converter.category(),
            &request.source_format,
            &request.target_format,
        ));
    }
    request
        .settings
        .validate(converter.category())
        .map_err(|e| ConverterError::invalid_settings(e.to_string()))
}
