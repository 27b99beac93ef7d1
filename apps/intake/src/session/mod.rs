//! Wizard sessions — the state machine, its background tasks, and the HTTP
//! handlers that drive it.

pub mod cancel;
pub mod events;
pub mod handlers;
pub mod machine;
pub mod pipeline;
pub mod store;
pub mod upload;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

pub use machine::{HandOff, SessionSnapshot};
pub use pipeline::{Pipeline, PipelineTimings, SharedSession};
pub use store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Uploading,
    Extracting,
    Reviewing,
    Scoring,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Uploading => "uploading",
            Stage::Extracting => "extracting",
            Stage::Reviewing => "reviewing",
            Stage::Scoring => "scoring",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to extract text: {0}")]
    ExtractionFailed(String),

    #[error("Failed to analyze resume: {0}")]
    AnalysisFailed(String),

    #[error("Cannot {action} while session is {stage}")]
    InvalidTransition { action: &'static str, stage: Stage },

    #[error("No content to analyze")]
    NoContent,
}
