//! FFmpeg-based audio and video converter.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;

use super::config::ConverterConfig;
use super::error::ConverterError;
use super::process::{arg, check_tool, finish, run_tool};
use super::traits::{check_request, Converter};
use super::types::{canonical_format, ConversionOutput, ConversionRequest, FormatPair};
use crate::job::{AudioSettings, Category, ConversionSettings, VideoSettings};

const VIDEO_PAIRS: &[FormatPair] = &[
    ("mp4", "avi"),
    ("avi", "mp4"),
    ("mp4", "mov"),
    ("mov", "mp4"),
    ("mp4", "webm"),
    ("webm", "mp4"),
    ("mp4", "mkv"),
    ("mkv", "mp4"),
    ("wmv", "mp4"),
    ("flv", "mp4"),
    ("m4v", "mp4"),
];

const AUDIO_PAIRS: &[FormatPair] = &[
    ("mp3", "wav"),
    ("wav", "mp3"),
    ("flac", "mp3"),
    ("aac", "mp3"),
    ("m4a", "mp3"),
    ("ogg", "mp3"),
    ("wma", "mp3"),
    ("wav", "flac"),
    ("flac", "wav"),
    ("mp3", "ogg"),
    ("wav", "m4a"),
];

/// FFmpeg converter bound to either the audio or the video category.
pub struct FfmpegConverter {
    config: ConverterConfig,
    category: Category,
}

impl FfmpegConverter {
    /// Converter for video files.
    pub fn video(config: ConverterConfig) -> Self {
        Self {
            config,
            category: Category::Video,
        }
    }

    /// Converter for audio files.
    pub fn audio(config: ConverterConfig) -> Self {
        Self {
            config,
            category: Category::Audio,
        }
    }

    fn base_args(&self, input: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-y".to_string(),
            "-i".to_string(),
            arg(input),
        ]
    }

    /// Builds ffmpeg arguments for a video conversion.
    fn build_video_args(
        &self,
        input: &Path,
        output: &Path,
        target: &str,
        settings: &VideoSettings,
    ) -> Vec<String> {
        let preset = settings.resolution_preset;
        let (width, height) = preset.dimensions();
        let mut args = self.base_args(input);

        // Fit inside the preset frame, keeping aspect ratio and even dimensions.
        args.push("-vf".to_string());
        args.push(format!(
            "scale={}:{}:force_original_aspect_ratio=decrease,pad=ceil(iw/2)*2:ceil(ih/2)*2",
            width, height
        ));
        args.push("-b:v".to_string());
        args.push(preset.bitrate().to_string());

        let (video_codec, audio_codec) = match target {
            "webm" => ("libvpx-vp9", "libopus"),
            "avi" => ("libx264", "libmp3lame"),
            _ => ("libx264", "aac"),
        };
        args.push("-c:v".to_string());
        args.push(video_codec.to_string());
        args.push("-c:a".to_string());
        args.push(audio_codec.to_string());

        if matches!(target, "mp4" | "mov" | "m4v") {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }

        args.push(arg(output));
        args
    }

    /// Builds ffmpeg arguments for an audio conversion.
    fn build_audio_args(
        &self,
        input: &Path,
        output: &Path,
        target: &str,
        settings: &AudioSettings,
    ) -> Vec<String> {
        let quality = settings.quality_preset;
        let mut args = self.base_args(input);
        args.push("-vn".to_string());

        let codec = match target {
            "mp3" => "libmp3lame",
            "wav" => "pcm_s16le",
            "flac" => "flac",
            "ogg" => "libvorbis",
            _ => "aac",
        };
        args.push("-c:a".to_string());
        args.push(codec.to_string());

        // Lossless targets ignore the bitrate.
        if !matches!(target, "wav" | "flac") {
            args.push("-b:a".to_string());
            args.push(quality.bitrate().to_string());
        }
        args.push("-ar".to_string());
        args.push(quality.sample_rate().to_string());

        args.push(arg(output));
        args
    }

    fn build_args(&self, request: &ConversionRequest) -> Vec<String> {
        let target = canonical_format(&request.target_format);
        match (&request.settings, self.category) {
            (ConversionSettings::Video(video), _) => {
                self.build_video_args(&request.input_path, &request.output_path, &target, video)
            }
            (ConversionSettings::Audio(audio), _) => {
                self.build_audio_args(&request.input_path, &request.output_path, &target, audio)
            }
            (_, Category::Video) => self.build_video_args(
                &request.input_path,
                &request.output_path,
                &target,
                &VideoSettings::default(),
            ),
            _ => self.build_audio_args(
                &request.input_path,
                &request.output_path,
                &target,
                &AudioSettings::default(),
            ),
        }
    }
}

#[async_trait]
impl Converter for FfmpegConverter {
    fn name(&self) -> &str {
        match self.category {
            Category::Video => "ffmpeg-video",
            _ => "ffmpeg-audio",
        }
    }

    fn category(&self) -> Category {
        self.category
    }

    fn supported_pairs(&self) -> &[FormatPair] {
        match self.category {
            Category::Video => VIDEO_PAIRS,
            _ => AUDIO_PAIRS,
        }
    }

    async fn convert(
        &self,
        request: ConversionRequest,
    ) -> Result<ConversionOutput, ConverterError> {
        check_request(self, &request)?;
        let started = Instant::now();

        let args = self.build_args(&request);
        run_tool("ffmpeg", &self.config.ffmpeg_path, &args, None).await?;
        finish(&request.output_path, started).await
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        check_tool("ffmpeg", &self.config.ffmpeg_path, "-version").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{AudioQuality, ResolutionPreset};
    use std::path::PathBuf;

    #[test]
    fn test_build_video_args_720p_default() {
        let converter = FfmpegConverter::video(ConverterConfig::default());
        let args = converter.build_video_args(
            Path::new("/in.mp4"),
            Path::new("/out.avi"),
            "avi",
            &VideoSettings::default(),
        );

        assert!(args.contains(&"-i".to_string()));
        assert!(args.contains(&"/in.mp4".to_string()));
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert!(args[vf + 1].starts_with("scale=1280:720"));
        let bv = args.iter().position(|a| a == "-b:v").unwrap();
        assert_eq!(args[bv + 1], "1000k");
        let ca = args.iter().position(|a| a == "-c:a").unwrap();
        assert_eq!(args[ca + 1], "libmp3lame");
        assert_eq!(args.last().unwrap(), "/out.avi");
    }

    #[test]
    fn test_build_video_args_webm_4k() {
        let converter = FfmpegConverter::video(ConverterConfig::default());
        let settings = VideoSettings {
            resolution_preset: ResolutionPreset::Uhd4k,
        };
        let args = converter.build_video_args(
            Path::new("/in.mp4"),
            Path::new("/out.webm"),
            "webm",
            &settings,
        );
        assert!(args.iter().any(|a| a.starts_with("scale=3840:2160")));
        assert!(args.contains(&"8000k".to_string()));
        assert!(args.contains(&"libvpx-vp9".to_string()));
        assert!(!args.contains(&"-movflags".to_string()));
    }

    #[test]
    fn test_build_audio_args() {
        let converter = FfmpegConverter::audio(ConverterConfig::default());
        let mp3 = converter.build_audio_args(
            Path::new("/in.flac"),
            Path::new("/out.mp3"),
            "mp3",
            &AudioSettings {
                quality_preset: AudioQuality::High,
            },
        );
        assert!(mp3.contains(&"libmp3lame".to_string()));
        assert!(mp3.contains(&"256k".to_string()));
        assert!(mp3.contains(&"48000".to_string()));
        assert!(mp3.contains(&"-vn".to_string()));

        let wav = converter.build_audio_args(
            Path::new("/in.mp3"),
            Path::new("/out.wav"),
            "wav",
            &AudioSettings::default(),
        );
        assert!(wav.contains(&"pcm_s16le".to_string()));
        assert!(!wav.contains(&"-b:a".to_string()));
        assert!(wav.contains(&"44100".to_string()));
    }

    #[test]
    fn test_supported_pairs_by_mode() {
        let video = FfmpegConverter::video(ConverterConfig::default());
        let audio = FfmpegConverter::audio(ConverterConfig::default());
        assert!(video.supports("mov", "mp4"));
        assert!(!video.supports("mp3", "wav"));
        assert!(audio.supports("mp3", "wav"));
        assert!(!audio.supports("mp4", "avi"));
        assert_eq!(video.category(), Category::Video);
        assert_eq!(audio.name(), "ffmpeg-audio");
    }

    #[tokio::test]
    async fn test_unsupported_pair_rejected_before_spawn() {
        // A tool path that cannot exist: reaching the spawn would yield ToolNotFound.
        let config =
            ConverterConfig::default().with_ffmpeg_path("/nonexistent/ffmpeg-for-tests");
        let converter = FfmpegConverter::video(config);
        let err = converter
            .convert(ConversionRequest {
                job_id: "job-1".to_string(),
                input_path: PathBuf::from("/tmp/input.mp4"),
                output_path: PathBuf::from("/tmp/output.xyz"),
                source_format: "mp4".to_string(),
                target_format: "xyz".to_string(),
                settings: ConversionSettings::Default,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::UnsupportedPair { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_reported() {
        let config =
            ConverterConfig::default().with_ffmpeg_path("/nonexistent/ffmpeg-for-tests");
        let converter = FfmpegConverter::audio(config);
        assert!(matches!(
            converter.validate().await,
            Err(ConverterError::ToolNotFound { .. })
        ));
    }
}
