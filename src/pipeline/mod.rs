// Batch pipeline: extract, transform and load with per-stage retry

pub mod processing;
pub mod retry;
pub mod runner;

use serde::Serialize;
use std::fmt;

pub use retry::{retry_stage, RetryPolicy};
pub use runner::{RunReport, StageRunner};

/// A retried unit of work in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Extract,
    Transform,
    Load,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a run in the linear stage sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Start,
    Extract,
    Transform,
    Load,
    End,
    Failed,
}

impl From<Stage> for PipelineState {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Extract => PipelineState::Extract,
            Stage::Transform => PipelineState::Transform,
            Stage::Load => PipelineState::Load,
        }
    }
}
