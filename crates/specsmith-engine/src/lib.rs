//! specsmith generation engine
//!
//! Turns free-form requirements into a structured specification by running
//! three oracle stages (`features`, `stories`, `api_db`), each with bounded
//! self-correction, and persists every result as a new version of its trace.
//! Refinement rewrites the latest version from a natural-language
//! instruction.
//!
//! - [`stage`]: one stage with validation and corrective retries
//! - [`orchestrator`]: stage sequencing and the [`SpecEngine`] handle
//! - [`spec`]: typed stage outputs and the assembled [`Specification`]
//! - [`retry`]: the bounded retry-with-feedback combinator

pub mod orchestrator;
pub mod retry;
pub mod spec;
pub mod stage;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use orchestrator::{
    GeneratedSpec, Orchestrator, PipelineAssets, PipelineOutcome, SpecEngine, StageFailure,
};
pub use spec::{FeatureSet, InterfaceSet, Specification, StorySet};
pub use stage::{StageExecutor, StageRequest, StageResult};
