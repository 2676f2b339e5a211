use super::{
    ConversionError, ConversionJob, ConversionTask, Converter, InputFormat, JobId, JobStatus,
};
use crate::cancellation::CancellationToken;
use crate::resources::{Resource, ResourceRegistry};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug)]
enum WorkerUpdate {
    Progress(u8),
    Finished(Result<(), String>),
}

#[derive(Debug)]
struct WorkerMessage {
    job_id: JobId,
    attempt: u64,
    update: WorkerUpdate,
}

#[derive(Debug)]
struct Attempt {
    number: u64,
    cancel: CancellationToken,
    output: PathBuf,
    /// Per-job directory the converter writes into. Removed unless it ends
    /// up holding a completed artifact.
    scratch_dir: PathBuf,
}

/// Owns every conversion job and the artifacts they produced.
pub struct ConversionRunner<C: Converter> {
    converter: Arc<C>,
    output_dir: PathBuf,
    jobs: Vec<ConversionJob>,
    attempts: HashMap<JobId, Attempt>,
    resources: ResourceRegistry,
    next_attempt: u64,
    submitted: u64,
    tx: Sender<WorkerMessage>,
    rx: Receiver<WorkerMessage>,
}

impl<C: Converter> ConversionRunner<C> {
    pub fn new(converter: C, output_dir: impl Into<PathBuf>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            converter: Arc::new(converter),
            output_dir: output_dir.into(),
            jobs: Vec::new(),
            attempts: HashMap::new(),
            resources: ResourceRegistry::new(),
            next_attempt: 0,
            submitted: 0,
            tx,
            rx,
        }
    }

    pub fn jobs(&self) -> &[ConversionJob] {
        &self.jobs
    }

    pub fn job(&self, id: &JobId) -> Option<&ConversionJob> {
        self.jobs.iter().find(|job| job.id() == id)
    }

    pub fn has_active(&self) -> bool {
        self.jobs
            .iter()
            .any(|job| job.status() == JobStatus::Processing)
    }

    pub fn artifact_path(&self, id: &JobId) -> Option<&Path> {
        let artifact = self.job(id)?.output_artifact()?;
        self.resources.get(artifact).map(Resource::path)
    }

    pub fn submit(&mut self, input: impl AsRef<Path>) -> Result<JobId, ConversionError> {
        let input = input.as_ref();
        let format = InputFormat::from_path(input)
            .ok_or_else(|| ConversionError::UnsupportedFormat(input.to_path_buf()))?;
        if !input.is_file() {
            return Err(ConversionError::MissingInput(input.to_path_buf()));
        }

        self.submitted += 1;
        let id = job_id_for(input, self.submitted);
        info!(job = %id, path = %input.display(), ?format, "Queued conversion job");
        self.jobs
            .push(ConversionJob::new(id.clone(), input.to_path_buf(), format));
        Ok(id)
    }

    /// Move a pending job to processing and hand it to a worker thread.
    pub fn start(&mut self, id: &JobId) -> Result<(), ConversionError> {
        let output_dir = self.output_dir.clone();
        let job = self.job_mut(id)?;
        if job.status() != JobStatus::Pending {
            return Err(ConversionError::InvalidState {
                id: id.clone(),
                status: job.status(),
                expected: JobStatus::Pending,
            });
        }
        job.begin();

        let stem = job
            .input_file()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let job_dir = output_dir.join(id.as_str());
        let task = ConversionTask {
            job_id: id.clone(),
            input: job.input_file().to_path_buf(),
            input_format: job.input_format(),
            output: job_dir.join(format!("{stem}.{}", job.output_format().extension())),
            output_format: job.output_format(),
        };

        if let Err(err) = fs::create_dir_all(&job_dir) {
            let message = format!("failed to create {}: {err}", job_dir.display());
            warn!(job = %id, %message, "Conversion could not start");
            job.fail(message);
            return Ok(());
        }

        self.next_attempt += 1;
        let attempt = Attempt {
            number: self.next_attempt,
            cancel: CancellationToken::new(),
            output: task.output.clone(),
            scratch_dir: job_dir,
        };
        info!(job = %id, attempt = attempt.number, output = %task.output.display(), "Starting conversion");
        self.spawn_worker(
            task,
            attempt.number,
            attempt.cancel.clone(),
            attempt.scratch_dir.clone(),
        );
        self.attempts.insert(id.clone(), attempt);
        Ok(())
    }

    pub fn retry(&mut self, id: &JobId) -> Result<(), ConversionError> {
        let job = self.job_mut(id)?;
        if job.status() != JobStatus::Error {
            return Err(ConversionError::InvalidState {
                id: id.clone(),
                status: job.status(),
                expected: JobStatus::Error,
            });
        }
        job.reset_for_retry();
        info!(job = %id, "Retrying conversion");
        self.start(id)
    }

    /// Apply every update the workers have sent so far.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.rx.try_recv() {
            applied += usize::from(self.apply(message));
        }
        applied
    }

    /// Wait up to `timeout` for the first update, then drain the rest.
    pub fn pump_blocking(&mut self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(message) => usize::from(self.apply(message)) + self.pump(),
            Err(RecvTimeoutError::Timeout) => 0,
            Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Remove a job, cancelling its worker and releasing its artifact.
    /// Returns `false` when the job no longer exists.
    pub fn remove(&mut self, id: &JobId) -> bool {
        let Some(index) = self.jobs.iter().position(|job| job.id() == id) else {
            debug!(job = %id, "Remove ignored; job already gone");
            return false;
        };
        let mut job = self.jobs.remove(index);
        if let Some(attempt) = self.attempts.remove(id) {
            attempt.cancel.cancel();
            discard_scratch(&attempt.scratch_dir);
        }
        if let Some(artifact) = job.take_artifact() {
            self.resources.release(artifact);
        }
        info!(job = %id, "Removed conversion job");
        true
    }

    pub fn clear_all(&mut self) -> usize {
        let ids: Vec<JobId> = self.jobs.iter().map(|job| job.id().clone()).collect();
        ids.iter().filter(|id| self.remove(id)).count()
    }

    /// Copy a completed artifact to `dest`. A directory destination keeps the
    /// artifact's file name.
    pub fn export_artifact(&self, id: &JobId, dest: &Path) -> Result<PathBuf, ConversionError> {
        let job = self
            .job(id)
            .ok_or_else(|| ConversionError::UnknownJob(id.clone()))?;
        if job.status() != JobStatus::Completed {
            return Err(ConversionError::NoArtifact(id.clone()));
        }
        let source = self
            .artifact_path(id)
            .ok_or_else(|| ConversionError::NoArtifact(id.clone()))?;
        let target = match source.file_name() {
            Some(name) if dest.is_dir() => dest.join(name),
            _ => dest.to_path_buf(),
        };
        fs::copy(source, &target).map_err(|source_err| ConversionError::Io {
            context: format!("failed to export artifact to {}", target.display()),
            source: source_err,
        })?;
        info!(job = %id, dest = %target.display(), "Exported artifact");
        Ok(target)
    }

    pub fn released_artifacts(&self) -> usize {
        self.resources.released_count()
    }

    fn job_mut(&mut self, id: &JobId) -> Result<&mut ConversionJob, ConversionError> {
        self.jobs
            .iter_mut()
            .find(|job| job.id() == id)
            .ok_or_else(|| ConversionError::UnknownJob(id.clone()))
    }

    fn spawn_worker(
        &self,
        task: ConversionTask,
        attempt: u64,
        cancel: CancellationToken,
        scratch_dir: PathBuf,
    ) {
        let converter = Arc::clone(&self.converter);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let job_id = task.job_id.clone();
            let mut report = |value: u8| {
                let _ = tx.send(WorkerMessage {
                    job_id: job_id.clone(),
                    attempt,
                    update: WorkerUpdate::Progress(value),
                });
            };
            let result = converter.convert(&task, &mut report, &cancel);
            // The runner no longer tracks a cancelled attempt; whatever the
            // converter wrote after removal is cleaned up here.
            if cancel.is_cancelled() {
                discard_scratch(&scratch_dir);
            }
            let _ = tx.send(WorkerMessage {
                job_id,
                attempt,
                update: WorkerUpdate::Finished(result),
            });
        });
    }

    fn apply(&mut self, message: WorkerMessage) -> bool {
        let current = self.attempts.get(&message.job_id).map(|a| a.number);
        if current != Some(message.attempt) {
            debug!(
                job = %message.job_id,
                attempt = message.attempt,
                current = ?current,
                "Ignoring stale conversion update"
            );
            return false;
        }

        match message.update {
            WorkerUpdate::Progress(value) => match self.job_mut(&message.job_id) {
                Ok(job) => job.apply_progress(value),
                Err(_) => false,
            },
            WorkerUpdate::Finished(result) => {
                let Some(attempt) = self.attempts.remove(&message.job_id) else {
                    return false;
                };
                match result.and_then(|()| verify_output(&attempt.output)) {
                    Ok(()) => {
                        let artifact = self.resources.acquire(Resource::Artifact {
                            path: attempt.output.clone(),
                            scratch_dir: attempt.output.parent().map(Path::to_path_buf),
                        });
                        info!(job = %message.job_id, %artifact, "Conversion completed");
                        let job = self.jobs.iter_mut().find(|job| job.id() == &message.job_id);
                        match job {
                            Some(job) => job.complete(artifact),
                            None => {
                                self.resources.release(artifact);
                                return false;
                            }
                        }
                    }
                    Err(err) => {
                        let err = if err.trim().is_empty() {
                            "Conversion failed".to_string()
                        } else {
                            err
                        };
                        warn!(job = %message.job_id, error = %err, "Conversion failed");
                        discard_scratch(&attempt.scratch_dir);
                        match self.job_mut(&message.job_id) {
                            Ok(job) => job.fail(err),
                            Err(_) => return false,
                        }
                    }
                }
                true
            }
        }
    }
}

impl<C: Converter> Drop for ConversionRunner<C> {
    fn drop(&mut self) {
        let removed = self.clear_all();
        if removed > 0 {
            debug!(removed, "Cleared conversion jobs on drop");
        }
    }
}

fn discard_scratch(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!(dir = %dir.display(), "Removed conversion scratch directory"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(dir = %dir.display(), "Failed to remove scratch directory: {err}"),
    }
}

fn verify_output(output: &Path) -> Result<(), String> {
    if output.is_file() {
        Ok(())
    } else {
        Err(format!("Converter produced no output at {}", output.display()))
    }
}

fn job_id_for(input: &Path, sequence: u64) -> JobId {
    let mut hasher = Sha256::new();
    hasher.update(input.to_string_lossy().as_bytes());
    hasher.update([0u8]);
    hasher.update(sequence.to_le_bytes());
    let digest = format!("{:x}", hasher.finalize());
    JobId(format!("job-{sequence}-{}", &digest[..8]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    struct ScriptedConverter {
        steps: Vec<u8>,
        failures: Mutex<VecDeque<String>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedConverter {
        fn new(steps: &[u8]) -> Self {
            Self {
                steps: steps.to_vec(),
                failures: Mutex::new(VecDeque::new()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_first(steps: &[u8], message: &str) -> Self {
            let converter = Self::new(steps);
            converter
                .failures
                .lock()
                .unwrap()
                .push_back(message.to_string());
            converter
        }
    }

    impl Converter for ScriptedConverter {
        fn convert(
            &self,
            task: &ConversionTask,
            progress: &mut dyn FnMut(u8),
            _cancel: &CancellationToken,
        ) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for step in &self.steps {
                progress(*step);
            }
            if let Some(message) = self.failures.lock().unwrap().pop_front() {
                return Err(message);
            }
            fs::write(&task.output, b"%PDF-1.7").map_err(|err| err.to_string())
        }
    }

    struct BlockingConverter {
        started: Arc<AtomicBool>,
        saw_cancel: Arc<AtomicBool>,
    }

    impl Converter for BlockingConverter {
        fn convert(
            &self,
            task: &ConversionTask,
            progress: &mut dyn FnMut(u8),
            cancel: &CancellationToken,
        ) -> Result<(), String> {
            fs::write(&task.output, b"%PDF-1.7 partial").map_err(|err| err.to_string())?;
            progress(1);
            self.started.store(true, Ordering::SeqCst);
            let deadline = Instant::now() + Duration::from_secs(5);
            while !cancel.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            self.saw_cancel.store(cancel.is_cancelled(), Ordering::SeqCst);
            progress(50);
            Err("cancelled".to_string())
        }
    }

    /// Leaves a half-written PDF behind before reporting failure.
    struct PartialThenFail;

    impl Converter for PartialThenFail {
        fn convert(
            &self,
            task: &ConversionTask,
            progress: &mut dyn FnMut(u8),
            _cancel: &CancellationToken,
        ) -> Result<(), String> {
            fs::write(&task.output, b"%PDF-1.7 trunc").map_err(|err| err.to_string())?;
            progress(40);
            Err("Conversion failed: ran out of disk".to_string())
        }
    }

    fn book(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"PK\x03\x04").unwrap();
        path
    }

    /// Pumps until the job settles; returns how many updates were applied.
    fn settle<C: Converter>(runner: &mut ConversionRunner<C>, id: &JobId) -> usize {
        let mut applied = 0;
        for _ in 0..500 {
            applied += runner.pump_blocking(Duration::from_millis(10));
            if runner.job(id).is_none_or(|job| job.status().is_terminal()) {
                return applied;
            }
        }
        panic!("job {id} never settled");
    }

    fn wait_for(flag: &AtomicBool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !flag.load(Ordering::SeqCst) {
            assert!(Instant::now() < deadline, "flag never set");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn forwards_progress_and_completes() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "book.epub");
        let mut runner =
            ConversionRunner::new(ScriptedConverter::new(&[5, 30, 95, 100]), dir.path().join("out"));

        let id = runner.submit(&input).unwrap();
        assert_eq!(runner.job(&id).unwrap().status(), JobStatus::Pending);
        runner.start(&id).unwrap();
        assert_eq!(runner.job(&id).unwrap().status(), JobStatus::Processing);

        assert_eq!(settle(&mut runner, &id), 5);
        let job = runner.job(&id).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.progress(), 100);
        assert!(job.output_artifact().is_some());

        let artifact = runner.artifact_path(&id).unwrap();
        assert_eq!(artifact.file_name().unwrap(), "book.pdf");
        assert!(artifact.starts_with(dir.path().join("out").join(id.as_str())));
        assert!(artifact.is_file());
    }

    #[test]
    fn regressive_progress_is_not_applied() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "book.azw3");
        let mut runner =
            ConversionRunner::new(ScriptedConverter::new(&[10, 40, 20]), dir.path().join("out"));
        let id = runner.submit(&input).unwrap();
        runner.start(&id).unwrap();

        assert_eq!(settle(&mut runner, &id), 3);
        assert_eq!(runner.job(&id).unwrap().status(), JobStatus::Completed);
    }

    #[test]
    fn failure_is_surfaced_verbatim_and_retry_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "broken.epub");
        let converter =
            ScriptedConverter::failing_first(&[5], "Conversion failed: corrupt archive");
        let calls = Arc::clone(&converter.calls);
        let mut runner = ConversionRunner::new(converter, dir.path().join("out"));
        let id = runner.submit(&input).unwrap();
        runner.start(&id).unwrap();
        settle(&mut runner, &id);

        let job = runner.job(&id).unwrap();
        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.progress(), 0);
        assert_eq!(job.error(), Some("Conversion failed: corrupt archive"));
        assert_eq!(job.output_artifact(), None);
        assert!(matches!(
            runner.export_artifact(&id, dir.path()),
            Err(ConversionError::NoArtifact(_))
        ));

        runner.retry(&id).unwrap();
        assert_eq!(runner.job(&id).unwrap().error(), None);
        settle(&mut runner, &id);
        let job = runner.job(&id).unwrap();
        assert_eq!(job.status(), JobStatus::Completed);
        assert_eq!(job.progress(), 100);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn remove_releases_artifact_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "book.epub");
        let mut runner =
            ConversionRunner::new(ScriptedConverter::new(&[100]), dir.path().join("out"));
        let id = runner.submit(&input).unwrap();
        runner.start(&id).unwrap();
        settle(&mut runner, &id);
        let artifact = runner.artifact_path(&id).unwrap().to_path_buf();

        assert!(runner.remove(&id));
        assert!(!runner.remove(&id));
        assert!(!artifact.exists());
        assert_eq!(runner.released_artifacts(), 1);
        assert!(runner.jobs().is_empty());
    }

    #[test]
    fn removal_cancels_worker_and_drops_its_late_updates() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "slow.epub");
        let started = Arc::new(AtomicBool::new(false));
        let saw_cancel = Arc::new(AtomicBool::new(false));
        let mut runner = ConversionRunner::new(
            BlockingConverter {
                started: Arc::clone(&started),
                saw_cancel: Arc::clone(&saw_cancel),
            },
            dir.path().join("out"),
        );
        let id = runner.submit(&input).unwrap();
        runner.start(&id).unwrap();
        wait_for(&started);

        let job_dir = dir.path().join("out").join(id.as_str());
        assert!(job_dir.join("slow.pdf").is_file());

        assert!(runner.remove(&id));
        assert!(!job_dir.exists());
        wait_for(&saw_cancel);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(runner.pump(), 0);
        assert!(runner.job(&id).is_none());
        assert!(!job_dir.exists());
    }

    #[test]
    fn failed_attempt_leaves_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "book.epub");
        let out = dir.path().join("out");
        let mut runner = ConversionRunner::new(PartialThenFail, &out);
        let id = runner.submit(&input).unwrap();
        runner.start(&id).unwrap();
        settle(&mut runner, &id);

        let job = runner.job(&id).unwrap();
        assert_eq!(job.status(), JobStatus::Error);
        assert_eq!(job.error(), Some("Conversion failed: ran out of disk"));
        assert!(!out.join(id.as_str()).exists());

        assert!(runner.remove(&id));
        assert_eq!(fs::read_dir(&out).unwrap().count(), 0);
        assert_eq!(runner.released_artifacts(), 0);
    }

    #[test]
    fn rejects_unsupported_or_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.txt");
        fs::write(&notes, "hello").unwrap();
        let mut runner = ConversionRunner::new(ScriptedConverter::new(&[]), dir.path().join("out"));

        assert!(matches!(
            runner.submit(&notes),
            Err(ConversionError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            runner.submit(dir.path().join("missing.epub")),
            Err(ConversionError::MissingInput(_))
        ));
        assert!(runner.jobs().is_empty());
    }

    #[test]
    fn start_and_retry_require_the_right_state() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "book.epub");
        let mut runner = ConversionRunner::new(ScriptedConverter::new(&[50]), dir.path().join("out"));
        let id = runner.submit(&input).unwrap();

        assert!(matches!(
            runner.retry(&id),
            Err(ConversionError::InvalidState { .. })
        ));
        runner.start(&id).unwrap();
        assert!(matches!(
            runner.start(&id),
            Err(ConversionError::InvalidState { .. })
        ));
        settle(&mut runner, &id);
        assert!(matches!(
            runner.start(&JobId::from("job-unknown")),
            Err(ConversionError::UnknownJob(_))
        ));
    }

    #[test]
    fn jobs_run_independently() {
        let dir = tempfile::tempdir().unwrap();
        let first = book(dir.path(), "one.epub");
        let second = book(dir.path(), "one.EPUB");
        let mut runner =
            ConversionRunner::new(ScriptedConverter::new(&[50, 100]), dir.path().join("out"));
        let a = runner.submit(&first).unwrap();
        let b = runner.submit(&second).unwrap();
        assert_ne!(a, b);
        runner.start(&a).unwrap();
        runner.start(&b).unwrap();
        settle(&mut runner, &a);
        settle(&mut runner, &b);

        assert_eq!(runner.job(&a).unwrap().status(), JobStatus::Completed);
        assert_eq!(runner.job(&b).unwrap().status(), JobStatus::Completed);
        assert_ne!(runner.artifact_path(&a), runner.artifact_path(&b));
    }

    #[test]
    fn export_copies_artifact_and_clear_all_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        let input = book(dir.path(), "book.epub");
        let exports = dir.path().join("exports");
        fs::create_dir_all(&exports).unwrap();
        let mut runner =
            ConversionRunner::new(ScriptedConverter::new(&[100]), dir.path().join("out"));
        let id = runner.submit(&input).unwrap();
        runner.start(&id).unwrap();
        settle(&mut runner, &id);

        let exported = runner.export_artifact(&id, &exports).unwrap();
        assert_eq!(exported, exports.join("book.pdf"));
        assert_eq!(fs::read(&exported).unwrap(), b"%PDF-1.7");

        let pending = runner.submit(&input).unwrap();
        assert_eq!(runner.clear_all(), 2);
        assert_eq!(runner.released_artifacts(), 1);
        assert!(runner.job(&pending).is_none());
        assert!(exported.exists());
    }
}
