pub mod catalog;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod provision;
pub mod query;
pub mod serializer;
pub mod source;
pub mod storage;
pub mod telemetry;

pub use config::LakeConfig;
pub use error::{LakeError, Result};
pub use pipeline::{Pipeline, PipelineReport, PipelineStep, StepOutcome};
