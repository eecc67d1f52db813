use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the pipeline stages.
///
/// Only [`PipelineError::Load`] aborts a run; everything else is scoped to a
/// single subset or artifact and is logged by the orchestrator.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load dataset {path}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("training error: {0}")]
    Train(String),

    #[error("failed to write {path}: {message}")]
    Persist { path: PathBuf, message: String },

    #[error("failed to render chart {path}: {message}")]
    Plot { path: PathBuf, message: String },
}

impl PipelineError {
    pub(crate) fn load(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::Load {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn persist(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::Persist {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn plot(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::Plot {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Load { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_load_errors_abort_the_run() {
        assert!(PipelineError::load("data.xlsx", "missing").is_fatal());
        assert!(!PipelineError::Schema("no target".into()).is_fatal());
        assert!(!PipelineError::Train("empty".into()).is_fatal());
        assert!(!PipelineError::persist("model.json", "denied").is_fatal());
        assert!(!PipelineError::plot("chart.png", "denied").is_fatal());
    }

    #[test]
    fn messages_name_the_offending_path() {
        let err = PipelineError::load("missing.xlsx", "file not found");
        assert_eq!(
            err.to_string(),
            "failed to load dataset missing.xlsx: file not found"
        );
    }
}
