//! Converters turn a local input file into a local output file of another
//! format by shelling out to an external tool.
//!
//! One converter handles one [`Category`](crate::job::Category); the
//! [`ConverterRegistry`] routes each job to the converter for its source
//! format's category.
//!
//! | Category | Converter | Tool |
//! |----------|-----------|------|
//! | image    | [`ImageMagickConverter`] | `magick` |
//! | video    | [`FfmpegConverter::video`] | `ffmpeg` |
//! | audio    | [`FfmpegConverter::audio`] | `ffmpeg` |
//! | document | [`LibreOfficeConverter`] | `soffice` |
//! | archive  | [`ArchiveConverter`] | `7z`, `tar`, `zip`, `unzip` |

mod archive;
mod config;
mod error;
mod ffmpeg;
mod imagemagick;
mod libreoffice;
mod process;
mod registry;
mod traits;
mod types;

pub use archive::ArchiveConverter;
pub use config::ConverterConfig;
pub use error::ConverterError;
pub use ffmpeg::FfmpegConverter;
pub use imagemagick::ImageMagickConverter;
pub use libreoffice::LibreOfficeConverter;
pub use registry::{ConverterRegistry, ConverterRegistryBuilder, RegistryError};
pub use traits::Converter;
pub(crate) use traits::check_request;
pub use types::{canonical_format, ConversionOutput, ConversionRequest, FormatPair};
