use super::{InputFormat, JobId, JobStatus, OutputFormat};
use crate::resources::ResourceId;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionJob {
    id: JobId,
    input_file: PathBuf,
    input_format: InputFormat,
    output_format: OutputFormat,
    status: JobStatus,
    progress: u8,
    output_artifact: Option<ResourceId>,
    error: Option<String>,
}

impl ConversionJob {
    pub(super) fn new(id: JobId, input_file: PathBuf, input_format: InputFormat) -> Self {
        Self {
            id,
            input_file,
            input_format,
            output_format: OutputFormat::Pdf,
            status: JobStatus::Pending,
            progress: 0,
            output_artifact: None,
            error: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    pub fn input_format(&self) -> InputFormat {
        self.input_format
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn output_artifact(&self) -> Option<ResourceId> {
        self.output_artifact
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(super) fn begin(&mut self) {
        self.status = JobStatus::Processing;
        self.progress = 0;
        self.error = None;
    }

    /// Returns whether the value was applied. Progress never moves backwards
    /// while processing and is capped at 100.
    pub(super) fn apply_progress(&mut self, value: u8) -> bool {
        if self.status != JobStatus::Processing {
            trace!(job = %self.id, value, status = ?self.status, "Progress outside processing");
            return false;
        }
        let value = value.min(100);
        if value < self.progress {
            debug!(job = %self.id, value, current = self.progress, "Dropping regressive progress");
            return false;
        }
        self.progress = value;
        true
    }

    pub(super) fn complete(&mut self, artifact: ResourceId) {
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.output_artifact = Some(artifact);
        self.error = None;
    }

    pub(super) fn fail(&mut self, message: String) {
        self.status = JobStatus::Error;
        self.progress = 0;
        self.error = Some(message);
    }

    pub(super) fn reset_for_retry(&mut self) {
        self.status = JobStatus::Pending;
        self.progress = 0;
        self.error = None;
    }

    pub(super) fn take_artifact(&mut self) -> Option<ResourceId> {
        self.output_artifact.take()
    }

    pub fn snapshot(&self, artifact_path: Option<&Path>) -> JobSnapshot {
        JobSnapshot {
            id: self.id.to_string(),
            input_file: self.input_file.display().to_string(),
            input_format: self.input_format,
            output_format: self.output_format,
            status: self.status,
            progress: self.progress,
            artifact_path: artifact_path.map(|path| path.display().to_string()),
            error: self.error.clone(),
        }
    }
}

/// Front-end view of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ts_rs::TS)]
#[ts(export)]
pub struct JobSnapshot {
    pub id: String,
    pub input_file: String,
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
    pub status: JobStatus,
    pub progress: u8,
    pub artifact_path: Option<String>,
    pub error: Option<String>,
}
