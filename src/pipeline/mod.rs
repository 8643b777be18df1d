pub mod generator;
pub mod orchestrator;
pub mod submission;
pub mod validate;

pub use orchestrator::{SubmissionPipeline, SubmitOutcome};
