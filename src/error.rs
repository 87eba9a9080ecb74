//! Error types for the rasterization pipeline.
//!
//! Failures are scoped: most variants only affect one task or one output
//! spec and are collected into the run report, while
//! [`RasterError::RenderFailure`] and [`RasterError::Config`] abort the run.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Everything that can go wrong while rasterizing a task list.
#[derive(Debug, Error)]
pub enum RasterError {
    /// A task declares unusable dimensions (zero/missing size, bad scale,
    /// or padding larger than the box).
    #[error("{task}: invalid dimension: {reason}")]
    InvalidDimension { task: String, reason: String },

    /// A padding shorthand could not be parsed.
    #[error("invalid padding `{value}`: {reason}")]
    InvalidPadding { value: String, reason: String },

    /// A referenced vector file could not be read.
    #[error("{task}: failed to read {}: {source}", path.display())]
    SourceReadFailure {
        task: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The vector markup could not be parsed.
    #[error("{task}: invalid vector source: {reason}")]
    InvalidSource { task: String, reason: String },

    /// A task name was used more than once in the same run.
    #[error("{task}: duplicate task name")]
    DuplicateTask { task: String },

    /// The rendering backend failed while composing or capturing a batch.
    #[error("batch {batch}: render failure: {reason}")]
    RenderFailure { batch: usize, reason: String },

    /// An output could not be cropped, encoded, or copied to its destination.
    #[error("{task}: failed to write {}: {reason}", path.display())]
    SliceFailure {
        task: String,
        path: PathBuf,
        reason: String,
    },

    /// The run configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A JSON task list could not be parsed or serialized.
    #[error("invalid task list: {0}")]
    TaskList(#[from] serde_json::Error),
}

impl RasterError {
    /// Returns true for failures that abort the whole run.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Self::RenderFailure { .. } | Self::Config(_))
    }

    /// The task this failure belongs to, if it is task-scoped.
    pub fn task(&self) -> Option<&str> {
        match self {
            Self::InvalidDimension { task, .. }
            | Self::SourceReadFailure { task, .. }
            | Self::InvalidSource { task, .. }
            | Self::DuplicateTask { task }
            | Self::SliceFailure { task, .. } => Some(task),
            Self::InvalidPadding { .. }
            | Self::RenderFailure { .. }
            | Self::Config(_)
            | Self::TaskList(_) => None,
        }
    }

    pub(crate) fn render(batch: usize, reason: impl Into<String>) -> Self {
        Self::RenderFailure {
            batch,
            reason: reason.into(),
        }
    }

    /// Attributes a render failure to a batch.
    pub(crate) fn in_batch(self, batch: usize) -> Self {
        match self {
            Self::RenderFailure { reason, .. } => Self::RenderFailure { batch, reason },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classification() {
        assert!(RasterError::render(0, "boom").is_batch_fatal());
        assert!(RasterError::Config("bad".into()).is_batch_fatal());
        assert!(
            !RasterError::DuplicateTask {
                task: "json".into()
            }
            .is_batch_fatal()
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = RasterError::SliceFailure {
            task: "json".into(),
            path: PathBuf::from("out/json.png"),
            reason: "No such file or directory".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("json"));
        assert!(msg.contains("out/json.png"));
        assert_eq!(err.task(), Some("json"));
    }

    #[test]
    fn json_errors_are_task_list_errors() {
        let err: RasterError = serde_json::from_str::<Vec<u32>>("[1,").unwrap_err().into();
        assert!(matches!(err, RasterError::TaskList(_)));
        assert!(err.to_string().starts_with("invalid task list"));
        assert!(!err.is_batch_fatal());
    }
}
