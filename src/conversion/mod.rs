//! EPUB/AZW3 to PDF conversion jobs.
//!
//! The actual conversion is delegated to a [`Converter`]. Jobs run on worker
//! threads; the [`ConversionRunner`] owns every job and applies worker updates
//! on the caller's thread when it is pumped.

pub mod ebook_convert;
mod job;
mod runner;

use crate::cancellation::CancellationToken;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use job::{ConversionJob, JobSnapshot};
pub use runner::ConversionRunner;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ts_rs::TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum InputFormat {
    Epub,
    Azw3,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "epub" => Some(Self::Epub),
            "azw3" => Some(Self::Azw3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ts_rs::TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum OutputFormat {
    #[default]
    Pdf,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ts_rs::TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Everything a converter needs for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionTask {
    pub job_id: JobId,
    pub input: PathBuf,
    pub input_format: InputFormat,
    pub output: PathBuf,
    pub output_format: OutputFormat,
}

/// External conversion capability.
///
/// Implementations report progress in percent through `progress` and must
/// write the result to `task.output` before returning `Ok`. The error string
/// is shown to the user as-is.
pub trait Converter: Send + Sync + 'static {
    fn convert(
        &self,
        task: &ConversionTask,
        progress: &mut dyn FnMut(u8),
        cancel: &CancellationToken,
    ) -> Result<(), String>;
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("unsupported input format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("no conversion job with id {0}")]
    UnknownJob(JobId),
    #[error("job {id} is {status:?}; expected {expected:?}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        expected: JobStatus,
    },
    #[error("job {0} has no artifact to export")]
    NoArtifact(JobId),
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}
