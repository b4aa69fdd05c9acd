//! Archive repacking through zip, 7z and tar.
//!
//! Every conversion extracts the source into a scratch directory next to
//! the output, then packs that directory into the target format.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::process::{arg, check_tool, finish, run_tool};
use super::traits::{check_request, Converter};
use super::types::{canonical_format, ConversionOutput, ConversionRequest, FormatPair};
use crate::job::{ArchiveSettings, Category, ConversionSettings};

const ARCHIVE_PAIRS: &[FormatPair] = &[
    ("zip", "7z"),
    ("7z", "zip"),
    ("rar", "zip"),
    ("tar.gz", "zip"),
    ("zip", "tar.gz"),
    ("zip", "zip"),
];

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    tool: &'static str,
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

pub struct ArchiveConverter {
    config: ConverterConfig,
}

impl ArchiveConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn extract_step(&self, source: &str, input: &Path, dir: &Path) -> Step {
        match source {
            "zip" => Step {
                tool: "unzip",
                program: self.config.unzip_path.clone(),
                args: vec![
                    "-qq".to_string(),
                    "-o".to_string(),
                    arg(input),
                    "-d".to_string(),
                    arg(dir),
                ],
                cwd: None,
            },
            "tar.gz" | "gz" => Step {
                tool: "tar",
                program: self.config.tar_path.clone(),
                args: vec![
                    "-xzf".to_string(),
                    arg(input),
                    "-C".to_string(),
                    arg(dir),
                ],
                cwd: None,
            },
            // 7z reads rar as well.
            _ => Step {
                tool: "7z",
                program: self.config.sevenzip_path.clone(),
                args: vec![
                    "x".to_string(),
                    arg(input),
                    format!("-o{}", arg(dir)),
                    "-y".to_string(),
                ],
                cwd: None,
            },
        }
    }

    /// `output` must be absolute since zip and 7z run inside `dir`.
    fn pack_step(&self, target: &str, dir: &Path, output: &Path, level: u8) -> Step {
        match target {
            "zip" => Step {
                tool: "zip",
                program: self.config.zip_path.clone(),
                args: vec![
                    "-r".to_string(),
                    "-q".to_string(),
                    format!("-{}", level),
                    arg(output),
                    ".".to_string(),
                ],
                cwd: Some(dir.to_path_buf()),
            },
            "tar.gz" => Step {
                tool: "tar",
                program: self.config.tar_path.clone(),
                args: vec![
                    "-czf".to_string(),
                    arg(output),
                    "-C".to_string(),
                    arg(dir),
                    ".".to_string(),
                ],
                cwd: None,
            },
            _ => Step {
                tool: "7z",
                program: self.config.sevenzip_path.clone(),
                args: vec![
                    "a".to_string(),
                    format!("-mx={}", level),
                    arg(output),
                    ".".to_string(),
                ],
                cwd: Some(dir.to_path_buf()),
            },
        }
    }

    async fn run(&self, step: &Step) -> Result<(), ConverterError> {
        run_tool(step.tool, &step.program, &step.args, step.cwd.as_deref()).await
    }

    async fn repack(
        &self,
        request: &ConversionRequest,
        extract_dir: &Path,
        output: &Path,
    ) -> Result<(), ConverterError> {
        let source = canonical_format(&request.source_format);
        let target = canonical_format(&request.target_format);
        let settings = match &request.settings {
            ConversionSettings::Archive(archive) => *archive,
            _ => ArchiveSettings::default(),
        };

        tokio::fs::create_dir_all(extract_dir).await?;
        self.run(&self.extract_step(&source, &request.input_path, extract_dir))
            .await?;

        // zip appends to an existing archive.
        if tokio::fs::metadata(output).await.is_ok() {
            tokio::fs::remove_file(output).await?;
        }
        self.run(&self.pack_step(
            &target,
            extract_dir,
            output,
            settings.compression_level.level(),
        ))
        .await
    }
}

/// Absolute form of `path`, resolving its parent directory.
async fn absolute_output(path: &Path) -> Result<PathBuf, ConverterError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let parent = tokio::fs::canonicalize(&parent).await?;
    let name = path
        .file_name()
        .ok_or_else(|| ConverterError::invalid_settings("output path has no file name"))?;
    Ok(parent.join(name))
}

#[async_trait]
impl Converter for ArchiveConverter {
    fn name(&self) -> &str {
        "archive"
    }

    fn category(&self) -> Category {
        Category::Archive
    }

    fn supported_pairs(&self) -> &[FormatPair] {
        ARCHIVE_PAIRS
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError> {
        check_request(self, &request)?;
        let started = Instant::now();

        let output = absolute_output(&request.output_path).await?;
        let extract_dir = output.with_file_name(format!("{}-extract", request.job_id));

        let result = self.repack(&request, &extract_dir, &output).await;

        if let Err(e) = tokio::fs::remove_dir_all(&extract_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", extract_dir.display(), e);
            }
        }

        result?;
        finish(&request.output_path, started).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        check_tool("7z", &self.config.sevenzip_path, "--help").await?;
        check_tool("tar", &self.config.tar_path, "--version").await?;
        check_tool("zip", &self.config.zip_path, "-v").await?;
        check_tool("unzip", &self.config.unzip_path, "-v").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> ArchiveConverter {
        ArchiveConverter::new(ConverterConfig::default())
    }

    #[test]
    fn test_extract_steps() {
        let c = converter();
        let dir = Path::new("/work/x");

        let zip = c.extract_step("zip", Path::new("/in.zip"), dir);
        assert_eq!(zip.tool, "unzip");
        assert_eq!(zip.args, vec!["-qq", "-o", "/in.zip", "-d", "/work/x"]);

        let rar = c.extract_step("rar", Path::new("/in.rar"), dir);
        assert_eq!(rar.tool, "7z");
        assert_eq!(rar.args, vec!["x", "/in.rar", "-o/work/x", "-y"]);

        let tgz = c.extract_step("tar.gz", Path::new("/in.tar.gz"), dir);
        assert_eq!(tgz.tool, "tar");
        assert_eq!(tgz.args, vec!["-xzf", "/in.tar.gz", "-C", "/work/x"]);
    }

    #[test]
    fn test_pack_steps() {
        let c = converter();
        let dir = Path::new("/work/x");
        let out = Path::new("/work/out.zip");

        let zip = c.pack_step("zip", dir, out, 9);
        assert_eq!(zip.args, vec!["-r", "-q", "-9", "/work/out.zip", "."]);
        assert_eq!(zip.cwd.as_deref(), Some(dir));

        let sz = c.pack_step("7z", dir, Path::new("/work/out.7z"), 5);
        assert_eq!(sz.args, vec!["a", "-mx=5", "/work/out.7z", "."]);

        let tgz = c.pack_step("tar.gz", dir, Path::new("/work/out.tar.gz"), 5);
        assert_eq!(
            tgz.args,
            vec!["-czf", "/work/out.tar.gz", "-C", "/work/x", "."]
        );
        assert!(tgz.cwd.is_none());
    }

    #[test]
    fn test_pairs_accept_aliases() {
        let c = converter();
        assert!(c.supports("tgz", "zip"));
        assert!(c.supports("zip", "tar.gz"));
        assert!(!c.supports("7z", "rar"));
    }

    #[tokio::test]
    async fn test_absolute_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = absolute_output(&dir.path().join("a.zip")).await.unwrap();
        assert!(out.is_absolute());
        assert_eq!(out.file_name().unwrap(), "a.zip");
    }
}
