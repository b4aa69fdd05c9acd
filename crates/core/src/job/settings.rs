//! Typed conversion settings.
//!
//! Each converter family has its own parameter set. Submissions may still
//! carry the flat key/value map older clients send; [`ConversionSettings::from_raw`]
//! turns it into the typed form and rejects anything it does not recognise.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use super::category::Category;
use super::error::ValidationError;

/// Parameters for a conversion, one variant per converter family.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversionSettings {
    /// Converter defaults.
    #[default]
    Default,
    Image(ImageSettings),
    Video(VideoSettings),
    Audio(AudioSettings),
    Archive(ArchiveSettings),
    /// Documents take no parameters.
    Document,
}

/// Image conversion parameters. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    /// Lossy quality, 1-100 (default 85).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<u8>,
    /// Lossless compression level, 0-9 (default 9).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotate: Option<Rotation>,
}

impl ImageSettings {
    pub const DEFAULT_QUALITY: u8 = 85;
    pub const DEFAULT_COMPRESSION_LEVEL: u8 = 9;

    pub fn quality_or_default(&self) -> u8 {
        self.quality.unwrap_or(Self::DEFAULT_QUALITY)
    }

    pub fn compression_level_or_default(&self) -> u8 {
        self.compression_level
            .unwrap_or(Self::DEFAULT_COMPRESSION_LEVEL)
    }
}

/// Crop rectangle in source pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clockwise rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    None,
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Self::None => 0,
            Self::Quarter => 90,
            Self::Half => 180,
            Self::ThreeQuarter => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Self::None),
            90 => Ok(Self::Quarter),
            180 => Ok(Self::Half),
            270 => Ok(Self::ThreeQuarter),
            other => Err(format!("rotation must be 0, 90, 180 or 270, got {}", other)),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(r: Rotation) -> u16 {
        r.degrees()
    }
}

/// Video conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub resolution_preset: ResolutionPreset,
}

/// Output resolution and video bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolutionPreset {
    #[serde(rename = "4k")]
    Uhd4k,
    #[serde(rename = "1080p")]
    Fhd1080p,
    #[default]
    #[serde(rename = "720p")]
    Hd720p,
    #[serde(rename = "480p")]
    Sd480p,
    #[serde(rename = "360p")]
    Low360p,
}

impl ResolutionPreset {
    /// Output frame size as (width, height).
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Uhd4k => (3840, 2160),
            Self::Fhd1080p => (1920, 1080),
            Self::Hd720p => (1280, 720),
            Self::Sd480p => (854, 480),
            Self::Low360p => (640, 360),
        }
    }

    /// Video bitrate in ffmpeg notation.
    pub fn bitrate(&self) -> &'static str {
        match self {
            Self::Uhd4k => "8000k",
            Self::Fhd1080p => "2000k",
            Self::Hd720p => "1000k",
            Self::Sd480p => "500k",
            Self::Low360p => "300k",
        }
    }
}

impl FromStr for ResolutionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "4k" => Ok(Self::Uhd4k),
            "1080p" => Ok(Self::Fhd1080p),
            "720p" => Ok(Self::Hd720p),
            "480p" => Ok(Self::Sd480p),
            "360p" => Ok(Self::Low360p),
            other => Err(format!(
                "expected one of 4k, 1080p, 720p, 480p, 360p, got '{}'",
                other
            )),
        }
    }
}

/// Audio conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub quality_preset: AudioQuality,
}

/// Audio bitrate and sample rate presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioQuality {
    Low,
    #[default]
    Standard,
    High,
    VeryHigh,
}

impl AudioQuality {
    pub fn bitrate(&self) -> &'static str {
        match self {
            Self::Low => "128k",
            Self::Standard => "192k",
            Self::High => "256k",
            Self::VeryHigh => "320k",
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Low | Self::Standard => 44100,
            Self::High | Self::VeryHigh => 48000,
        }
    }
}

impl FromStr for AudioQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "standard" => Ok(Self::Standard),
            "high" => Ok(Self::High),
            "veryhigh" => Ok(Self::VeryHigh),
            other => Err(format!(
                "expected one of low, standard, high, veryhigh, got '{}'",
                other
            )),
        }
    }
}

/// Archive conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    pub compression_level: ArchiveCompression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveCompression {
    Store,
    Fast,
    #[default]
    Normal,
    Maximum,
    Ultra,
}

impl ArchiveCompression {
    /// Numeric level understood by zip and 7z.
    pub fn level(&self) -> u8 {
        match self {
            Self::Store => 0,
            Self::Fast => 1,
            Self::Normal => 5,
            Self::Maximum => 7,
            Self::Ultra => 9,
        }
    }
}

impl FromStr for ArchiveCompression {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "store" => Ok(Self::Store),
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "maximum" => Ok(Self::Maximum),
            "ultra" => Ok(Self::Ultra),
            other => Err(format!(
                "expected one of store, fast, normal, maximum, ultra, got '{}'",
                other
            )),
        }
    }
}

const IMAGE_KEYS: &[&str] = &[
    "quality",
    "compression_level",
    "width",
    "height",
    "crop_x",
    "crop_y",
    "crop_width",
    "crop_height",
    "rotate",
];

impl ConversionSettings {
    /// Short name of the variant, as stored in the `kind` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Image(_) => "image",
            Self::Video(_) => "video",
            Self::Audio(_) => "audio",
            Self::Archive(_) => "archive",
            Self::Document => "document",
        }
    }

    /// Parses a flat key/value map into the settings for `category`.
    ///
    /// Values may be JSON numbers or numeric strings. An empty map yields the
    /// category's defaults.
    pub fn from_raw(
        category: Category,
        raw: &Map<String, Value>,
    ) -> Result<Self, ValidationError> {
        let allowed: &[&str] = match category {
            Category::Image => IMAGE_KEYS,
            Category::Video => &["resolution_preset"],
            Category::Audio => &["quality_preset"],
            Category::Archive => &["compression_level"],
            Category::Document | Category::Unknown => &[],
        };
        if let Some(key) = raw.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(ValidationError::UnknownSetting {
                key: key.clone(),
                category,
            });
        }

        let settings = match category {
            Category::Image => Self::Image(image_from_raw(raw)?),
            Category::Video => Self::Video(VideoSettings {
                resolution_preset: parse_enum(raw, "resolution_preset")?.unwrap_or_default(),
            }),
            Category::Audio => Self::Audio(AudioSettings {
                quality_preset: parse_enum(raw, "quality_preset")?.unwrap_or_default(),
            }),
            Category::Archive => Self::Archive(ArchiveSettings {
                compression_level: parse_enum(raw, "compression_level")?.unwrap_or_default(),
            }),
            Category::Document => Self::Document,
            Category::Unknown => Self::Default,
        };

        settings.validate(category)?;
        Ok(settings)
    }

    /// Checks value ranges and that the variant belongs to `category`.
    pub fn validate(&self, category: Category) -> Result<(), ValidationError> {
        let matches = match self {
            Self::Default => true,
            Self::Image(_) => category == Category::Image,
            Self::Video(_) => category == Category::Video,
            Self::Audio(_) => category == Category::Audio,
            Self::Archive(_) => category == Category::Archive,
            Self::Document => category == Category::Document,
        };
        if !matches {
            return Err(ValidationError::SettingsMismatch {
                kind: self.kind().to_string(),
                category,
            });
        }

        if let Self::Image(image) = self {
            if let Some(q) = image.quality {
                if !(1..=100).contains(&q) {
                    return Err(ValidationError::invalid_setting(
                        "quality",
                        format!("must be between 1 and 100, got {}", q),
                    ));
                }
            }
            if let Some(level) = image.compression_level {
                if level > 9 {
                    return Err(ValidationError::invalid_setting(
                        "compression_level",
                        format!("must be between 0 and 9, got {}", level),
                    ));
                }
            }
            if image.width == Some(0) {
                return Err(ValidationError::invalid_setting("width", "must be positive"));
            }
            if image.height == Some(0) {
                return Err(ValidationError::invalid_setting("height", "must be positive"));
            }
            if let Some(crop) = image.crop {
                if crop.width == 0 || crop.height == 0 {
                    return Err(ValidationError::invalid_setting(
                        "crop",
                        "crop width and height must be positive",
                    ));
                }
            }
        }

        Ok(())
    }
}

fn image_from_raw(raw: &Map<String, Value>) -> Result<ImageSettings, ValidationError> {
    let quality = parse_uint(raw, "quality")?
        .map(|v| to_u8("quality", v))
        .transpose()?;
    let compression_level = parse_uint(raw, "compression_level")?
        .map(|v| to_u8("compression_level", v))
        .transpose()?;
    let width = parse_uint(raw, "width")?;
    let height = parse_uint(raw, "height")?;

    let crop_x = parse_uint(raw, "crop_x")?;
    let crop_y = parse_uint(raw, "crop_y")?;
    let crop_width = parse_uint(raw, "crop_width")?;
    let crop_height = parse_uint(raw, "crop_height")?;
    let crop = match (crop_width, crop_height) {
        (Some(width), Some(height)) => Some(Crop {
            x: crop_x.unwrap_or(0),
            y: crop_y.unwrap_or(0),
            width,
            height,
        }),
        (None, None) if crop_x.is_none() && crop_y.is_none() => None,
        _ => {
            return Err(ValidationError::invalid_setting(
                "crop",
                "crop requires both crop_width and crop_height",
            ))
        }
    };

    let rotate = match parse_uint(raw, "rotate")? {
        Some(degrees) => {
            let degrees = u16::try_from(degrees)
                .map_err(|_| ValidationError::invalid_setting("rotate", "out of range"))?;
            Some(
                Rotation::try_from(degrees)
                    .map_err(|reason| ValidationError::invalid_setting("rotate", reason))?,
            )
        }
        None => None,
    };

    Ok(ImageSettings {
        quality,
        compression_level,
        width,
        height,
        crop,
        rotate,
    })
}

fn to_u8(key: &str, value: u32) -> Result<u8, ValidationError> {
    u8::try_from(value).map_err(|_| ValidationError::invalid_setting(key, "out of range"))
}

fn parse_uint(raw: &Map<String, Value>, key: &str) -> Result<Option<u32>, ValidationError> {
    let Some(value) = raw.get(key) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.map(Some).ok_or_else(|| {
        ValidationError::invalid_setting(key, format!("not a non-negative integer: {}", value))
    })
}

fn parse_enum<T>(raw: &Map<String, Value>, key: &str) -> Result<Option<T>, ValidationError>
where
    T: FromStr<Err = String>,
{
    match raw.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => s
            .parse::<T>()
            .map(Some)
            .map_err(|reason| ValidationError::invalid_setting(key, reason)),
        Some(other) => Err(ValidationError::invalid_setting(
            key,
            format!("expected a string, got {}", other),
        )),
    }
}
