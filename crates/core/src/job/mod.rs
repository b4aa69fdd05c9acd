//! Job module: the durable record of a conversion request.
//!
//! A job is created `pending` together with a queue task, claimed by a
//! worker (`processing`), and ends `completed` with an output location or
//! `failed` with an error message.

mod category;
mod error;
mod service;
mod settings;
mod sqlite_store;
mod store;
mod types;

pub use category::Category;
pub use error::{JobError, ValidationError};
pub use service::{normalize_format, CreateJobRequest, JobService, SettingsInput};
pub use settings::{
    ArchiveCompression, ArchiveSettings, AudioQuality, AudioSettings, ConversionSettings, Crop,
    ImageSettings, ResolutionPreset, Rotation, VideoSettings,
};
pub use sqlite_store::SqliteJobStore;
pub use store::{JobStore, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use types::{Job, JobPage, JobStatus, JobTask, NewJob};
