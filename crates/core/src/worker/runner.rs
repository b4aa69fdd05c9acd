//! Worker pool implementation.
//!
//! Each loop repeatedly takes one task from the queue and drives its job
//! from `pending` to `completed` or `failed`:
//! - Mark processing
//! - Route by category to a converter
//! - Stage the source into a per-job working directory
//! - Convert, store the output, record the final status

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::converter::{ConversionRequest, ConverterError, ConverterRegistry};
use crate::job::{Category, JobError, JobStatus, JobStore, JobTask};
use crate::metrics;
use crate::queue::JobQueue;
use crate::storage::StorageBackend;

use super::cleanup::Cleaner;
use super::config::WorkerConfig;
use super::error::WorkerError;
use super::types::{ProcessOutcome, WorkerStatus};

/// Error message recorded on jobs found stuck in `processing`.
pub const INTERRUPTED_MESSAGE: &str = "worker interrupted before completion";

/// Jobs fetched per recovery batch.
const RECOVERY_BATCH: usize = 100;

#[derive(Default)]
struct WorkerStats {
    active: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    recovered: AtomicU64,
}

/// Dependencies and counters shared by every loop.
struct Pipeline {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn JobStore>,
    storage: Arc<dyn StorageBackend>,
    registry: Arc<ConverterRegistry>,
    config: WorkerConfig,
    stats: WorkerStats,
}

/// The worker pool - pulls tasks from the queue and processes them.
pub struct Worker {
    pipeline: Arc<Pipeline>,
    cleaner: Arc<Cleaner>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Worker {
    /// Create a new worker pool.
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn JobStore>,
        storage: Arc<dyn StorageBackend>,
        registry: Arc<ConverterRegistry>,
        config: WorkerConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let cleaner = Arc::new(Cleaner::new(
            Arc::clone(&store),
            Arc::clone(&storage),
            &config,
        ));

        Self {
            pipeline: Arc::new(Pipeline {
                queue,
                store,
                storage,
                registry,
                config,
                stats: WorkerStats::default(),
            }),
            cleaner,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Start the pool: run the recovery sweep, then spawn the processing
    /// loops and the periodic maintenance tasks.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Worker already running");
            return;
        }

        let config = &self.pipeline.config;
        info!(
            "Starting worker with {} loop(s), temp dir {}",
            config.concurrency,
            config.temp_dir.display()
        );

        if let Err(e) = tokio::fs::create_dir_all(&config.temp_dir).await {
            warn!(
                "Failed to create temp dir {}: {}",
                config.temp_dir.display(),
                e
            );
        }

        match self.recover_stale().await {
            Ok(0) => {}
            Ok(n) => info!("Recovered {} interrupted job(s)", n),
            Err(e) => error!("Recovery sweep failed: {}", e),
        }

        let mut handles = self.handles.lock().await;
        for index in 0..config.concurrency.max(1) {
            handles.push(self.spawn_processing_loop(index));
        }
        if config.recovery_interval_secs > 0 {
            handles.push(self.spawn_recovery_loop());
        }
        if config.cleanup_interval_secs > 0 {
            handles.push(self.spawn_cleanup_loop());
        }

        info!("Worker started");
    }

    /// Stop the pool gracefully. In-flight jobs finish before this returns.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Worker not running");
            return;
        }

        info!("Stopping worker");

        // Signal shutdown to all loops
        let _ = self.shutdown_tx.send(());

        let handles: Vec<_> = self.handles.lock().await.drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Worker loop panicked: {}", e);
            }
        }

        info!("Worker stopped");
    }

    /// Get current worker status.
    pub async fn status(&self) -> WorkerStatus {
        let stats = &self.pipeline.stats;
        let queue_depth = match self.pipeline.queue.len().await {
            Ok(len) => Some(len),
            Err(e) => {
                debug!("Queue length unavailable: {}", e);
                None
            }
        };

        WorkerStatus {
            running: self.running.load(Ordering::Relaxed),
            concurrency: self.pipeline.config.concurrency,
            active_jobs: stats.active.load(Ordering::Relaxed) as usize,
            total_completed: stats.completed.load(Ordering::Relaxed),
            total_failed: stats.failed.load(Ordering::Relaxed),
            total_recovered: stats.recovered.load(Ordering::Relaxed),
            queue_depth,
        }
    }

    /// Process one task to a final job status. Never panics on job errors.
    pub async fn process_task(&self, task: JobTask) -> ProcessOutcome {
        self.pipeline.process_task(task).await
    }

    /// Mark jobs stuck in `processing` for longer than `stale_after_secs`
    /// as failed. Returns how many were marked.
    pub async fn recover_stale(&self) -> Result<usize, JobError> {
        self.pipeline.recover_stale()
    }

    /// The cleaner used by the periodic cleanup task.
    pub fn cleaner(&self) -> &Cleaner {
        &self.cleaner
    }

    /// Spawn one processing loop.
    fn spawn_processing_loop(&self, index: usize) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let pipeline = Arc::clone(&self.pipeline);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let timeout = Duration::from_millis(pipeline.config.dequeue_timeout_ms);

        tokio::spawn(async move {
            debug!("Processing loop {} started", index);
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                // Dequeue is cancel-safe: a task is only removed in the same
                // step that returns it.
                let next = tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Processing loop {} received shutdown signal", index);
                        break;
                    }
                    next = pipeline.queue.dequeue(timeout) => next,
                };

                match next {
                    Ok(Some(task)) => {
                        pipeline.process_task(task).await;
                    }
                    Ok(None) => {
                        metrics::QUEUE_EMPTY_POLLS_TOTAL.inc();
                    }
                    Err(e) => {
                        error!("Dequeue failed in loop {}: {}", index, e);
                        // Avoid spinning on a broken queue.
                        tokio::time::sleep(timeout.min(Duration::from_secs(1))).await;
                    }
                }
            }
            debug!("Processing loop {} stopped", index);
        })
    }

    /// Spawn the periodic recovery sweep.
    fn spawn_recovery_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let pipeline = Arc::clone(&self.pipeline);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_secs(pipeline.config.recovery_interval_secs);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        match pipeline.recover_stale() {
                            Ok(0) => {}
                            Ok(n) => info!("Recovered {} interrupted job(s)", n),
                            Err(e) => warn!("Recovery sweep failed: {}", e),
                        }
                    }
                }
            }
        })
    }

    /// Spawn the periodic cleaner.
    fn spawn_cleanup_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let cleaner = Arc::clone(&self.cleaner);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let interval = Duration::from_secs(self.pipeline.config.cleanup_interval_secs);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let report = cleaner.run_once().await;
                        if report.total() > 0 {
                            info!(
                                "Cleanup removed {} temp entr(ies), {} job(s), {} object(s)",
                                report.temp_entries, report.jobs, report.objects
                            );
                        }
                    }
                }
            }
        })
    }
}

impl Pipeline {
    async fn process_task(&self, task: JobTask) -> ProcessOutcome {
        let started = Instant::now();
        let job_id = task.job_id.clone();

        // Claiming the job is a conditional write, so a duplicate or stale
        // task whose job already moved on is dropped here.
        match self.store.update_status_if(
            &job_id,
            JobStatus::Pending,
            JobStatus::Processing,
            None,
            None,
        ) {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!("Skipping task for job {}: job is no longer pending", job_id);
                return ProcessOutcome::Skipped;
            }
            Err(e) => {
                error!("Skipping task for job {}: {}", job_id, e);
                return ProcessOutcome::Skipped;
            }
        }

        let category = Category::from_format(&task.source_format);
        info!(
            "Processing job {} ({} -> {}, {})",
            job_id, task.source_format, task.target_format, category
        );

        self.stats.active.fetch_add(1, Ordering::Relaxed);
        metrics::JOBS_IN_FLIGHT.inc();

        // The id becomes a directory name; anything else never reaches the
        // filesystem, not even for cleanup.
        let result = if is_safe_segment(&job_id) {
            let work_dir = self.config.temp_dir.join(&job_id);
            let result = self.run(&task, category, &work_dir).await;
            remove_work_dir(&work_dir).await;
            result
        } else {
            Err(WorkerError::WorkDir(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("job id {:?} is not a valid directory name", job_id),
            )))
        };

        let outcome = self.record(&task, result);

        self.stats.active.fetch_sub(1, Ordering::Relaxed);
        metrics::JOBS_IN_FLIGHT.dec();
        metrics::JOB_DURATION_SECONDS
            .with_label_values(&[category.as_str()])
            .observe(started.elapsed().as_secs_f64());

        let label = match &outcome {
            ProcessOutcome::Completed(_) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                "completed"
            }
            ProcessOutcome::Failed(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                "failed"
            }
            ProcessOutcome::Skipped => "skipped",
        };
        metrics::JOBS_PROCESSED_TOTAL
            .with_label_values(&[category.as_str(), label])
            .inc();

        outcome
    }

    /// Everything between "processing" and the final status. Returns the
    /// stored output location.
    async fn run(
        &self,
        task: &JobTask,
        category: Category,
        work_dir: &Path,
    ) -> Result<String, WorkerError> {
        if category == Category::Unknown {
            return Err(WorkerError::Category {
                format: task.source_format.clone(),
            });
        }
        let converter = self
            .registry
            .get(category)
            .ok_or(WorkerError::NoConverter(category))?;

        tokio::fs::create_dir_all(work_dir)
            .await
            .map_err(WorkerError::WorkDir)?;

        let input_path = work_dir.join(format!("input.{}", task.source_format));
        let output_path = work_dir.join(format!("output.{}", task.target_format));

        let bytes = self
            .storage
            .download_to(&task.source_location, &input_path)
            .await
            .map_err(WorkerError::download)?;
        debug!("Job {}: staged {} byte(s) of input", task.job_id, bytes);

        let request = ConversionRequest {
            job_id: task.job_id.clone(),
            input_path,
            output_path,
            source_format: task.source_format.clone(),
            target_format: task.target_format.clone(),
            settings: task.settings.clone(),
        };

        let timeout_secs = self.config.conversion_timeout_secs;
        let output = if timeout_secs > 0 {
            tokio::time::timeout(Duration::from_secs(timeout_secs), converter.convert(request))
                .await
                .map_err(|_| ConverterError::Timeout { timeout_secs })??
        } else {
            converter.convert(request).await?
        };
        debug!(
            "Job {}: {} produced {} byte(s) in {} ms",
            task.job_id,
            converter.name(),
            output.size_bytes,
            output.duration_ms
        );

        self.storage
            .put_file(&output.output_path, &task.output_name())
            .await
            .map_err(WorkerError::upload)
    }

    /// Writes the final status for a finished run. The write only lands
    /// while the job is still `processing`; a job the recovery sweep has
    /// already failed stays failed and any uploaded output is discarded.
    fn record(&self, task: &JobTask, result: Result<String, WorkerError>) -> ProcessOutcome {
        match result {
            Ok(location) => {
                match self.store.update_status_if(
                    &task.job_id,
                    JobStatus::Processing,
                    JobStatus::Completed,
                    Some(&location),
                    None,
                ) {
                    Ok(Some(_)) => {
                        info!("Job {} completed: {}", task.job_id, location);
                        ProcessOutcome::Completed(location)
                    }
                    Ok(None) => {
                        warn!(
                            "Job {} finished after leaving processing; discarding output {}",
                            task.job_id, location
                        );
                        self.discard_output(location);
                        ProcessOutcome::Skipped
                    }
                    Err(e) => {
                        error!(
                            "Failed to mark job {} as completed: {}; discarding output",
                            task.job_id, e
                        );
                        self.discard_output(location);
                        ProcessOutcome::Skipped
                    }
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!("Job {} failed: {}", task.job_id, message);
                match self.store.update_status_if(
                    &task.job_id,
                    JobStatus::Processing,
                    JobStatus::Failed,
                    None,
                    Some(&message),
                ) {
                    Ok(Some(_)) => ProcessOutcome::Failed(message),
                    Ok(None) => {
                        warn!(
                            "Job {} already left processing; not recording failure",
                            task.job_id
                        );
                        ProcessOutcome::Skipped
                    }
                    Err(store_err) => {
                        error!(
                            "Failed to mark job {} as failed: {}",
                            task.job_id, store_err
                        );
                        ProcessOutcome::Skipped
                    }
                }
            }
        }
    }

    /// Deletes an uploaded output that no job record points to.
    fn discard_output(&self, location: String) {
        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            if let Err(e) = storage.delete(&location).await {
                warn!("Failed to delete orphaned output {}: {}", location, e);
            }
        });
    }

    fn recover_stale(&self) -> Result<usize, JobError> {
        let cutoff =
            Utc::now() - chrono::Duration::seconds(self.config.stale_after_secs as i64);
        let mut recovered = 0;

        loop {
            let stale =
                self.store
                    .list_by_status(JobStatus::Processing, cutoff, RECOVERY_BATCH)?;
            let batch = stale.len();

            for job in stale {
                warn!(
                    "Job {} has been processing since {}; marking failed",
                    job.id, job.updated_at
                );
                // The job may have finished since it was listed.
                if self
                    .store
                    .update_status_if(
                        &job.id,
                        JobStatus::Processing,
                        JobStatus::Failed,
                        None,
                        Some(INTERRUPTED_MESSAGE),
                    )?
                    .is_none()
                {
                    continue;
                }
                recovered += 1;
                metrics::JOBS_RECOVERED_TOTAL.inc();
                self.stats.recovered.fetch_add(1, Ordering::Relaxed);
            }

            if batch < RECOVERY_BATCH {
                break;
            }
        }

        Ok(recovered)
    }
}

/// Whether `id` can be used as a single directory name.
fn is_safe_segment(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
}

async fn remove_work_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove working directory {}: {}", dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Job, JobPage, NewJob, SqliteJobStore};
    use crate::queue::MemoryJobQueue;
    use crate::storage::LocalStorage;
    use crate::testing::{fixtures, MockConverter};
    use tempfile::TempDir;

    struct Harness {
        worker: Worker,
        store: Arc<SqliteJobStore>,
        storage: Arc<LocalStorage>,
        queue: Arc<MemoryJobQueue>,
        _dir: TempDir,
    }

    fn harness(config: WorkerConfig) -> Harness {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let storage = Arc::new(LocalStorage::new(dir.path().join("storage")).unwrap());
        let queue = Arc::new(MemoryJobQueue::new());
        let registry = ConverterRegistry::builder()
            .register(Arc::new(MockConverter::new(Category::Image)))
            .unwrap()
            .build();
        let worker = Worker::new(
            queue.clone(),
            store.clone(),
            storage.clone(),
            Arc::new(registry),
            config.with_temp_dir(dir.path().join("tmp")),
        );
        Harness {
            worker,
            store,
            storage,
            queue,
            _dir: dir,
        }
    }

    fn new_job(location: &str, source: &str, target: &str) -> NewJob {
        NewJob {
            owner_id: "user-1".to_string(),
            source_location: location.to_string(),
            source_format: source.to_string(),
            target_format: target.to_string(),
            original_filename: None,
            file_size: 5,
            settings: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_process_task_completes() {
        let h = harness(WorkerConfig::default());
        let location = fixtures::upload(h.storage.as_ref(), "a.jpeg", b"bytes")
            .await
            .unwrap();
        let job = h.store.create(new_job(&location, "jpeg", "png")).unwrap();

        let outcome = h.worker.process_task(job.to_task()).await;
        let output = match outcome {
            ProcessOutcome::Completed(location) => location,
            other => panic!("unexpected outcome: {:?}", other),
        };

        let job = h.store.get_any(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.output_location.as_deref(), Some(output.as_str()));
        assert!(job.completed_at.is_some());
        assert!(output.ends_with(".png"));
    }

    #[tokio::test]
    async fn test_skips_non_pending_job() {
        let h = harness(WorkerConfig::default());
        let job = h.store.create(new_job("x", "jpeg", "png")).unwrap();
        h.store
            .update_status(&job.id, JobStatus::Processing, None, None)
            .unwrap();
        h.store
            .update_status(&job.id, JobStatus::Failed, None, Some("boom"))
            .unwrap();

        let outcome = h.worker.process_task(job.to_task()).await;
        assert_eq!(outcome, ProcessOutcome::Skipped);
        assert_eq!(
            h.store.get_any(&job.id).unwrap().error_message.as_deref(),
            Some("boom")
        );
    }

    #[tokio::test]
    async fn test_skips_unknown_job() {
        let h = harness(WorkerConfig::default());
        let task = fixtures::task("missing", "x", "jpeg", "png");
        assert_eq!(h.worker.process_task(task).await, ProcessOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_missing_converter_fails_job() {
        let h = harness(WorkerConfig::default());
        let job = h.store.create(new_job("x", "mp3", "wav")).unwrap();

        let outcome = h.worker.process_task(job.to_task()).await;
        assert_eq!(
            outcome,
            ProcessOutcome::Failed("no converter registered for category audio".to_string())
        );
    }

    #[tokio::test]
    async fn test_recover_stale() {
        let h = harness(WorkerConfig::default().with_stale_after_secs(0));
        let stuck = h.store.create(new_job("x", "jpeg", "png")).unwrap();
        h.store
            .update_status(&stuck.id, JobStatus::Processing, None, None)
            .unwrap();
        let pending = h.store.create(new_job("y", "jpeg", "png")).unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(h.worker.recover_stale().await.unwrap(), 1);

        let stuck = h.store.get_any(&stuck.id).unwrap();
        assert_eq!(stuck.status, JobStatus::Failed);
        assert_eq!(stuck.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
        assert_eq!(
            h.store.get_any(&pending.id).unwrap().status,
            JobStatus::Pending
        );
        assert_eq!(h.worker.status().await.total_recovered, 1);
    }

    #[tokio::test]
    async fn test_start_processes_queue_and_stop_joins() {
        let h = harness(
            WorkerConfig::default()
                .with_concurrency(2)
                .with_dequeue_timeout_ms(50),
        );
        let location = fixtures::upload(h.storage.as_ref(), "a.png", b"bytes")
            .await
            .unwrap();
        let job = h.store.create(new_job(&location, "png", "jpeg")).unwrap();
        h.queue.enqueue(job.to_task()).await.unwrap();

        h.worker.start().await;
        assert!(h.worker.status().await.running);

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let status = h.store.get_any(&job.id).unwrap().status;
            if status.is_terminal() || Instant::now() > deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        h.worker.stop().await;
        let status = h.worker.status().await;
        assert!(!status.running);
        assert_eq!(status.total_completed, 1);
        assert_eq!(status.queue_depth, Some(0));
        assert_eq!(
            h.store.get_any(&job.id).unwrap().status,
            JobStatus::Completed
        );
    }

    /// Serves one stored job under an id the worker must not use as a path.
    struct AliasStore {
        inner: SqliteJobStore,
        alias: String,
        real_id: String,
    }

    impl AliasStore {
        fn real<'a>(&'a self, id: &'a str) -> &'a str {
            if id == self.alias {
                &self.real_id
            } else {
                id
            }
        }

        fn aliased(&self, mut job: Job) -> Job {
            if job.id == self.real_id {
                job.id = self.alias.clone();
            }
            job
        }
    }

    impl JobStore for AliasStore {
        fn create(&self, job: NewJob) -> Result<Job, JobError> {
            self.inner.create(job)
        }

        fn get(&self, id: &str, owner_id: &str) -> Result<Job, JobError> {
            self.inner.get(self.real(id), owner_id).map(|j| self.aliased(j))
        }

        fn get_any(&self, id: &str) -> Result<Job, JobError> {
            self.inner.get_any(self.real(id)).map(|j| self.aliased(j))
        }

        fn update_status(
            &self,
            id: &str,
            status: JobStatus,
            output_location: Option<&str>,
            error_message: Option<&str>,
        ) -> Result<Job, JobError> {
            self.inner
                .update_status(self.real(id), status, output_location, error_message)
                .map(|j| self.aliased(j))
        }

        fn update_status_if(
            &self,
            id: &str,
            expected: JobStatus,
            status: JobStatus,
            output_location: Option<&str>,
            error_message: Option<&str>,
        ) -> Result<Option<Job>, JobError> {
            self.inner
                .update_status_if(self.real(id), expected, status, output_location, error_message)
                .map(|j| j.map(|j| self.aliased(j)))
        }

        fn list_by_owner(
            &self,
            owner_id: &str,
            page: u32,
            page_size: u32,
        ) -> Result<JobPage, JobError> {
            self.inner.list_by_owner(owner_id, page, page_size)
        }

        fn list_by_status(
            &self,
            status: JobStatus,
            older_than: chrono::DateTime<Utc>,
            limit: usize,
        ) -> Result<Vec<Job>, JobError> {
            self.inner.list_by_status(status, older_than, limit)
        }

        fn delete(&self, id: &str) -> Result<(), JobError> {
            self.inner.delete(self.real(id))
        }
    }

    #[tokio::test]
    async fn test_unsafe_job_id_fails_without_touching_filesystem() {
        let dir = TempDir::new().unwrap();
        let temp_dir = dir.path().join("tmp");
        let sibling = dir.path().join("keep");
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("marker.txt"), b"still here").unwrap();

        let storage = Arc::new(LocalStorage::new(dir.path().join("storage")).unwrap());
        let location = fixtures::upload(storage.as_ref(), "a.jpeg", b"bytes")
            .await
            .unwrap();

        let inner = SqliteJobStore::in_memory().unwrap();
        let job = inner.create(new_job(&location, "jpeg", "png")).unwrap();
        let store = Arc::new(AliasStore {
            inner,
            alias: "..".to_string(),
            real_id: job.id.clone(),
        });

        let converter = Arc::new(MockConverter::new(Category::Image));
        let registry = ConverterRegistry::builder()
            .register(converter.clone())
            .unwrap()
            .build();
        let worker = Worker::new(
            Arc::new(MemoryJobQueue::new()),
            store.clone(),
            storage,
            Arc::new(registry),
            WorkerConfig::default().with_temp_dir(temp_dir.clone()),
        );

        let outcome = worker
            .process_task(fixtures::task("..", &location, "jpeg", "png"))
            .await;
        match outcome {
            ProcessOutcome::Failed(message) => {
                assert!(message.contains("not a valid directory name"), "{}", message)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        assert_eq!(store.get_any("..").unwrap().status, JobStatus::Failed);
        assert!(sibling.join("marker.txt").exists());
        assert!(dir.path().join("storage").join(&location).exists());
        assert_eq!(converter.conversion_count().await, 0);
    }

    #[test]
    fn test_is_safe_segment() {
        assert!(is_safe_segment("3f2c0e9a-1b2c-4d5e-8f90-123456789abc"));
        assert!(!is_safe_segment(""));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment("a\\b"));
    }
}
