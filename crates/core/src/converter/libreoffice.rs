//! LibreOffice-based document converter.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::process::{arg, check_tool, finish, run_tool};
use super::traits::{check_request, Converter};
use super::types::{canonical_format, ConversionOutput, ConversionRequest, FormatPair};
use crate::job::Category;

const DOCUMENT_PAIRS: &[FormatPair] = &[
    ("pdf", "docx"),
    ("docx", "pdf"),
    ("xlsx", "csv"),
    ("doc", "pdf"),
    ("doc", "docx"),
    ("pptx", "pdf"),
    ("ppt", "pdf"),
    ("xls", "xlsx"),
    ("xlsx", "pdf"),
    ("txt", "pdf"),
    ("rtf", "pdf"),
    ("rtf", "docx"),
    ("csv", "xlsx"),
];

pub struct LibreOfficeConverter {
    config: ConverterConfig,
}

impl LibreOfficeConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn build_args(input: &Path, out_dir: &Path, target: &str) -> Vec<String> {
        vec![
            "--headless".to_string(),
            "--norestore".to_string(),
            "--convert-to".to_string(),
            target.to_string(),
            "--outdir".to_string(),
            arg(out_dir),
            arg(input),
        ]
    }

    /// LibreOffice names its output after the input stem.
    fn produced_path(input: &Path, out_dir: &Path, target: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        out_dir.join(format!("{}.{}", stem, target))
    }
}

#[async_trait]
impl Converter for LibreOfficeConverter {
    fn name(&self) -> &str {
        "libreoffice"
    }

    fn category(&self) -> Category {
        Category::Document
    }

    fn supported_pairs(&self) -> &[FormatPair] {
        DOCUMENT_PAIRS
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError> {
        check_request(self, &request)?;
        let started = Instant::now();

        let target = canonical_format(&request.target_format);
        let out_dir = request
            .output_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let args = Self::build_args(&request.input_path, &out_dir, &target);

        run_tool("libreoffice", &self.config.libreoffice_path, &args, None).await?;

        let produced = Self::produced_path(&request.input_path, &out_dir, &target);
        if produced != request.output_path {
            debug!(
                "Renaming {} to {}",
                produced.display(),
                request.output_path.display()
            );
            tokio::fs::rename(&produced, &request.output_path)
                .await
                .map_err(|_| ConverterError::OutputMissing {
                    path: produced.clone(),
                })?;
        }

        finish(&request.output_path, started).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        check_tool("libreoffice", &self.config.libreoffice_path, "--version").await
    }
}
