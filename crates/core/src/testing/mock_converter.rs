//! Mock converter for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::converter::{
    check_request, ConversionOutput, ConversionRequest, Converter, ConverterError, FormatPair,
};
use crate::job::Category;

/// A recorded conversion request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedConversion {
    pub request: ConversionRequest,
    /// Whether the conversion succeeded.
    pub success: bool,
}

/// Mock implementation of the Converter trait.
///
/// Runs the same request checks as the real converters, then writes a
/// small output file instead of invoking a tool:
/// - Track conversion requests for assertions
/// - Simulate failures with [`set_next_error`](Self::set_next_error)
/// - Simulate slow tools with [`set_conversion_duration`](Self::set_conversion_duration)
///
/// # Example
///
/// ```rust,ignore
/// use transmute_core::testing::MockConverter;
///
/// let converter = MockConverter::new(Category::Image);
/// let output = converter.convert(request).await?;
///
/// assert_eq!(converter.conversion_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockConverter {
    category: Category,
    pairs: Vec<FormatPair>,
    conversions: Arc<RwLock<Vec<RecordedConversion>>>,
    /// If set, the next operation will fail with this error.
    next_error: Arc<RwLock<Option<ConverterError>>>,
    conversion_duration: Arc<RwLock<Duration>>,
    /// Bytes written to every output file. Defaults to a copy of the input.
    output_bytes: Arc<RwLock<Option<Vec<u8>>>>,
}

fn default_pairs(category: Category) -> Vec<FormatPair> {
    match category {
        Category::Image => vec![("jpeg", "png"), ("png", "jpeg"), ("png", "webp")],
        Category::Video => vec![("mp4", "webm"), ("mp4", "avi")],
        Category::Audio => vec![("wav", "mp3"), ("mp3", "wav")],
        Category::Document => vec![("docx", "pdf")],
        Category::Archive => vec![("zip", "7z"), ("zip", "tar.gz")],
        Category::Unknown => Vec::new(),
    }
}

impl MockConverter {
    /// Create a mock converter for `category` with a few common pairs.
    pub fn new(category: Category) -> Self {
        Self {
            category,
            pairs: default_pairs(category),
            conversions: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            conversion_duration: Arc::new(RwLock::new(Duration::ZERO)),
            output_bytes: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the supported pairs.
    pub fn with_pairs(mut self, pairs: Vec<FormatPair>) -> Self {
        self.pairs = pairs;
        self
    }

    /// Get all recorded conversions.
    pub async fn recorded_conversions(&self) -> Vec<RecordedConversion> {
        self.conversions.read().await.clone()
    }

    /// Get the number of conversions attempted.
    pub async fn conversion_count(&self) -> usize {
        self.conversions.read().await.len()
    }

    /// Configure the next operation to fail with the given error.
    pub async fn set_next_error(&self, error: ConverterError) {
        *self.next_error.write().await = Some(error);
    }

    /// Set the simulated conversion duration.
    pub async fn set_conversion_duration(&self, duration: Duration) {
        *self.conversion_duration.write().await = duration;
    }

    /// Write `bytes` to every output instead of copying the input.
    pub async fn set_output_bytes(&self, bytes: Vec<u8>) {
        *self.output_bytes.write().await = Some(bytes);
    }

    async fn take_error(&self) -> Option<ConverterError> {
        self.next_error.write().await.take()
    }

    async fn record(&self, request: ConversionRequest, success: bool) {
        self.conversions
            .write()
            .await
            .push(RecordedConversion { request, success });
    }

    async fn write_output(&self, request: &ConversionRequest) -> Result<(), ConverterError> {
        let bytes = match self.output_bytes.read().await.clone() {
            Some(bytes) => bytes,
            None => tokio::fs::read(&request.input_path).await?,
        };
        tokio::fs::write(&request.output_path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    fn category(&self) -> Category {
        self.category
    }

    fn supported_pairs(&self) -> &[FormatPair] {
        &self.pairs
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError> {
        let started = Instant::now();

        if let Some(err) = self.take_error().await {
            self.record(request, false).await;
            return Err(err);
        }
        if let Err(e) = check_request(self, &request) {
            self.record(request, false).await;
            return Err(e);
        }

        let duration = *self.conversion_duration.read().await;
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        if let Err(e) = self.write_output(&request).await {
            self.record(request, false).await;
            return Err(e);
        }

        let size_bytes = tokio::fs::metadata(&request.output_path).await?.len();
        let output_path = request.output_path.clone();
        self.record(request, true).await;

        Ok(ConversionOutput {
            output_path,
            size_bytes,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::ConversionSettings;
    use std::path::Path;
    use tempfile::TempDir;

    fn request(dir: &Path, id: &str, source: &str, target: &str) -> ConversionRequest {
        let input_path = dir.join(format!("input.{}", source));
        std::fs::write(&input_path, b"pixels").unwrap();
        ConversionRequest {
            job_id: id.to_string(),
            input_path,
            output_path: dir.join(format!("output.{}", target)),
            source_format: source.to_string(),
            target_format: target.to_string(),
            settings: ConversionSettings::Default,
        }
    }

    #[tokio::test]
    async fn test_basic_conversion() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new(Category::Image);

        let output = converter
            .convert(request(dir.path(), "job-1", "jpg", "png"))
            .await
            .unwrap();

        assert_eq!(output.size_bytes, 6);
        assert_eq!(std::fs::read(&output.output_path).unwrap(), b"pixels");

        let conversions = converter.recorded_conversions().await;
        assert_eq!(conversions.len(), 1);
        assert!(conversions[0].success);
        assert_eq!(conversions[0].request.job_id, "job-1");
    }

    #[tokio::test]
    async fn test_unsupported_pair() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new(Category::Image);

        let err = converter
            .convert(request(dir.path(), "job-2", "jpeg", "xyz"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::UnsupportedPair { .. }));
        assert!(!dir.path().join("output.xyz").exists());
    }

    #[tokio::test]
    async fn test_error_injection() {
        let dir = TempDir::new().unwrap();
        let converter = MockConverter::new(Category::Image);
        converter
            .set_next_error(ConverterError::conversion_failed("test error", None))
            .await;

        let result = converter
            .convert(request(dir.path(), "fail", "jpeg", "png"))
            .await;
        assert!(result.is_err());

        // Error is consumed; the conversion is recorded as failed
        let conversions = converter.recorded_conversions().await;
        assert_eq!(conversions.len(), 1);
        assert!(!conversions[0].success);

        converter
            .convert(request(dir.path(), "ok", "jpeg", "png"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_custom_output_and_pairs() {
        let dir = TempDir::new().unwrap();
        let converter =
            MockConverter::new(Category::Audio).with_pairs(vec![("flac", "ogg")]);
        converter.set_output_bytes(b"ogg!".to_vec()).await;

        let output = converter
            .convert(request(dir.path(), "a", "flac", "ogg"))
            .await
            .unwrap();
        assert_eq!(std::fs::read(output.output_path).unwrap(), b"ogg!");
        assert!(!converter.supports("wav", "mp3"));
    }
}
