//! Durable file-conversion job pipeline.
//!
//! Submitted jobs are persisted by a [`job::JobStore`], handed to workers
//! through a [`queue::JobQueue`], converted by the [`converter::Converter`]
//! registered for their category, and tracked until they are completed or
//! failed. Input and output bytes move through a [`storage::StorageBackend`].

pub mod config;
pub mod converter;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod storage;
pub mod testing;
pub mod worker;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
