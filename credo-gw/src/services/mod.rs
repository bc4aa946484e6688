//! External collaborators for credo-gw
//!
//! Trait seams for the text-generation capability and the report source
//! (shipped with simulated backends), plus the bounded handoff worker that
//! plays the remote analysis service.

pub mod generator;
pub mod handoff;
pub mod report_source;

pub use generator::{GenerationError, GenerationRequest, SimulatedGenerator, TextGenerator};
pub use handoff::{HandoffHandle, HandoffJob, HandoffSettings, HandoffWorker};
pub use report_source::{FetchError, ReportSource, SimulatedReportSource};
