//! ImageMagick-based image converter.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::process::{arg, check_tool, finish, run_tool};
use super::traits::{check_request, Converter};
use super::types::{canonical_format, ConversionOutput, ConversionRequest, FormatPair};
use crate::job::{Category, ConversionSettings, ImageSettings, Rotation};

const IMAGE_PAIRS: &[FormatPair] = &[
    ("jpeg", "png"),
    ("png", "jpeg"),
    ("bmp", "jpeg"),
    ("tiff", "png"),
    ("jpeg", "bmp"),
    ("png", "bmp"),
    ("jpeg", "tiff"),
    ("png", "tiff"),
    ("gif", "jpeg"),
    ("gif", "png"),
    ("png", "webp"),
    ("jpeg", "webp"),
    ("webp", "jpeg"),
    ("webp", "png"),
    ("heic", "jpeg"),
];

pub struct ImageMagickConverter {
    config: ConverterConfig,
}

impl ImageMagickConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn build_args(
        &self,
        input: &Path,
        output: &Path,
        target: &str,
        settings: &ImageSettings,
    ) -> Vec<String> {
        let mut args = vec![arg(input), "-auto-orient".to_string()];

        if let Some(crop) = settings.crop {
            args.push("-crop".to_string());
            args.push(format!(
                "{}x{}+{}+{}",
                crop.width, crop.height, crop.x, crop.y
            ));
            args.push("+repage".to_string());
        }

        if let Some(rotate) = settings.rotate.filter(|r| *r != Rotation::None) {
            args.push("-rotate".to_string());
            args.push(rotate.degrees().to_string());
        }

        let geometry = match (settings.width, settings.height) {
            (Some(w), Some(h)) => Some(format!("{}x{}", w, h)),
            (Some(w), None) => Some(format!("{}x", w)),
            (None, Some(h)) => Some(format!("x{}", h)),
            (None, None) => None,
        };
        if let Some(geometry) = geometry {
            args.push("-resize".to_string());
            args.push(geometry);
        }

        match target {
            "jpeg" | "webp" => {
                args.push("-quality".to_string());
                args.push(settings.quality_or_default().to_string());
            }
            "png" => {
                args.push("-define".to_string());
                args.push(format!(
                    "png:compression-level={}",
                    settings.compression_level_or_default()
                ));
            }
            _ => {}
        }

        // JPEG has no alpha channel.
        if target == "jpeg" {
            args.push("-background".to_string());
            args.push("white".to_string());
            args.push("-flatten".to_string());
        }

        args.push(arg(output));
        args
    }
}

#[async_trait]
impl Converter for ImageMagickConverter {
    fn name(&self) -> &str {
        "imagemagick"
    }

    fn category(&self) -> Category {
        Category::Image
    }

    fn supported_pairs(&self) -> &[FormatPair] {
        IMAGE_PAIRS
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError> {
        check_request(self, &request)?;
        let started = Instant::now();

        let settings = match &request.settings {
            ConversionSettings::Image(image) => image.clone(),
            _ => ImageSettings::default(),
        };
        let target = canonical_format(&request.target_format);
        let args = self.build_args(&request.input_path, &request.output_path, &target, &settings);

        run_tool(
            "imagemagick",
            &self.config.imagemagick_path,
            &args,
            None,
        )
        .await?;
        finish(&request.output_path, started).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        check_tool("imagemagick", &self.config.imagemagick_path, "-version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Crop;

    fn converter() -> ImageMagickConverter {
        ImageMagickConverter::new(ConverterConfig::default())
    }

    #[test]
    fn test_defaults_for_jpeg() {
        let args = converter().build_args(
            Path::new("/in.png"),
            Path::new("/out.jpeg"),
            "jpeg",
            &ImageSettings::default(),
        );
        assert_eq!(args.first().unwrap(), "/in.png");
        assert_eq!(args.last().unwrap(), "/out.jpeg");
        let q = args.iter().position(|a| a == "-quality").unwrap();
        assert_eq!(args[q + 1], "85");
        assert!(args.contains(&"-flatten".to_string()));
        assert!(!args.contains(&"-resize".to_string()));
    }

    #[test]
    fn test_png_uses_compression_level() {
        let settings = ImageSettings {
            compression_level: Some(3),
            ..Default::default()
        };
        let args = converter().build_args(
            Path::new("/in.jpeg"),
            Path::new("/out.png"),
            "png",
            &settings,
        );
        assert!(args.contains(&"png:compression-level=3".to_string()));
        assert!(!args.contains(&"-quality".to_string()));
    }

    #[test]
    fn test_crop_rotate_resize_order() {
        let settings = ImageSettings {
            width: Some(800),
            crop: Some(Crop {
                x: 5,
                y: 10,
                width: 100,
                height: 200,
            }),
            rotate: Some(Rotation::ThreeQuarter),
            ..Default::default()
        };
        let args = converter().build_args(
            Path::new("/in.jpeg"),
            Path::new("/out.webp"),
            "webp",
            &settings,
        );
        let crop = args.iter().position(|a| a == "-crop").unwrap();
        let rotate = args.iter().position(|a| a == "-rotate").unwrap();
        let resize = args.iter().position(|a| a == "-resize").unwrap();
        assert_eq!(args[crop + 1], "100x200+5+10");
        assert_eq!(args[rotate + 1], "270");
        assert_eq!(args[resize + 1], "800x");
        assert!(crop < rotate && rotate < resize);
    }

    #[test]
    fn test_pairs() {
        let c = converter();
        assert!(c.supports("jpg", "png"));
        assert!(c.supports("heic", "jpeg"));
        assert!(!c.supports("png", "heic"));
        assert!(!c.supports("svg", "png"));
    }
}
