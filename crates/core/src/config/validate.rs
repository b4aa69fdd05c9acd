use super::{types::Config, ConfigError};
use crate::storage::StorageKind;

/// Validate configuration
/// Currently validates:
/// - Worker loop count and timing relationships
/// - Queue poll interval is not 0
/// - Object storage has an endpoint and bucket when selected
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.database.path.as_os_str().is_empty() {
        return Err(invalid("database.path cannot be empty"));
    }

    // Queue validation
    if config.queue.poll_interval_ms == 0 {
        return Err(invalid("queue.poll_interval_ms cannot be 0"));
    }

    // Worker validation
    let worker = &config.worker;
    if worker.concurrency == 0 {
        return Err(invalid("worker.concurrency cannot be 0"));
    }
    if worker.dequeue_timeout_ms == 0 {
        return Err(invalid("worker.dequeue_timeout_ms cannot be 0"));
    }
    if worker.conversion_timeout_secs > 0 {
        // A running job must never look stale or have its files swept.
        if worker.stale_after_secs <= worker.conversion_timeout_secs {
            return Err(invalid(
                "worker.stale_after_secs must exceed worker.conversion_timeout_secs",
            ));
        }
        if worker.temp_max_age_secs > 0
            && worker.temp_max_age_secs <= worker.conversion_timeout_secs
        {
            return Err(invalid(
                "worker.temp_max_age_secs must exceed worker.conversion_timeout_secs",
            ));
        }
    } else {
        // Without a timeout a live conversion looks exactly like a stale one.
        if worker.recovery_interval_secs > 0 {
            return Err(invalid(
                "worker.recovery_interval_secs must be 0 when worker.conversion_timeout_secs is 0",
            ));
        }
        if worker.temp_max_age_secs > 0 {
            return Err(invalid(
                "worker.temp_max_age_secs must be 0 when worker.conversion_timeout_secs is 0",
            ));
        }
    }

    // Storage validation
    if config.storage.backend == StorageKind::Object {
        let object = config
            .storage
            .object
            .as_ref()
            .ok_or_else(|| invalid("storage.object is required when storage.backend = \"object\""))?;
        if object.endpoint.trim().is_empty() {
            return Err(invalid("storage.object.endpoint cannot be empty"));
        }
        if object.bucket.trim().is_empty() {
            return Err(invalid("storage.object.bucket cannot be empty"));
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
