//! Internal processing pipeline
//!
//! Synchronously transforms one credit report into a summary and a set of
//! dispute letters: fetch → summarize → identify inaccuracies → per item
//! (strategy lookup + draft) → aggregate.
//!
//! # Error handling
//! - A source fetch failure aborts the whole run (error-only outcome).
//! - Summarization and identification failures are recorded and the run
//!   continues with whatever is left.
//! - A per-item draft failure drops only that item's letter (logged, not
//!   surfaced in the result).
//! - The run is a total failure only when it produced neither a summary nor
//!   any letter and at least one error was recorded.

pub mod prompts;
pub mod strategy;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Jurisdiction;
use crate::services::generator::{GenerationRequest, TextGenerator};
use crate::services::report_source::ReportSource;

/// One disputable item identified within a credit report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inaccuracy {
    pub item_description: String,
    pub reason_for_dispute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
}

/// Per-step pipeline errors
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Fatal: no report content, nothing else can run
    #[error("Failed to retrieve credit report: {0}")]
    SourceFetchFailed(String),

    /// Recoverable: recorded, remaining steps still run
    #[error("Failed to summarize credit report: {0}")]
    SummarizationFailed(String),

    /// Recoverable: leads to zero letters
    #[error("Failed to identify inaccuracies: {0}")]
    IdentificationFailed(String),

    /// Per-item: this item's letter is dropped, the batch continues
    #[error("Failed to draft letter for '{item}': {reason}")]
    DraftFailed { item: String, reason: String },
}

/// Aggregated result of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub summary: Option<String>,
    pub dispute_letters: Vec<String>,
    pub errors: Vec<PipelineError>,
}

impl PipelineOutcome {
    /// Nothing produced and at least one error recorded
    pub fn is_total_failure(&self) -> bool {
        self.summary.is_none() && self.dispute_letters.is_empty() && !self.errors.is_empty()
    }

    /// Accumulated error text, `; `-joined, None when clean
    pub fn error_text(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(
                self.errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        }
    }
}

/// Input to one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub identifier: String,
    pub user_information: Option<String>,
    pub jurisdiction: Jurisdiction,
}

/// Internal pipeline with its collaborators
#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    source: Arc<dyn ReportSource>,
    /// Deadline per generative call; an elapsed call becomes that step's
    /// failure instead of hanging the request
    generation_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        source: Arc<dyn ReportSource>,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            source,
            generation_timeout,
        }
    }

    /// Run the full pipeline for one request
    pub async fn run(&self, request: &PipelineRequest) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();

        // Step 1: fetch report content (fatal on failure)
        let report_data_uri = match tokio::time::timeout(
            self.generation_timeout,
            self.source.fetch(&request.identifier, request.jurisdiction),
        )
        .await
        {
            Ok(Ok(blob)) => blob,
            Ok(Err(e)) => {
                outcome
                    .errors
                    .push(PipelineError::SourceFetchFailed(e.to_string()));
                return outcome;
            }
            Err(_) => {
                outcome.errors.push(PipelineError::SourceFetchFailed(format!(
                    "timed out after {}s",
                    self.generation_timeout.as_secs()
                )));
                return outcome;
            }
        };

        let user_information = request
            .user_information
            .clone()
            .unwrap_or_else(|| format!("Information for identifier {}", request.identifier));

        // Step 2: summarize (recoverable)
        #[derive(Deserialize)]
        struct SummaryOutput {
            summary: String,
        }
        match self
            .generate_json::<SummaryOutput>(prompts::summarize(&report_data_uri))
            .await
        {
            Ok(output) => outcome.summary = Some(output.summary),
            Err(reason) => {
                warn!(identifier = %request.identifier, %reason, "Summarization failed");
                outcome
                    .errors
                    .push(PipelineError::SummarizationFailed(reason));
            }
        }

        // Step 3: identify inaccuracies (recoverable; zero items is valid)
        #[derive(Deserialize)]
        struct IdentifyOutput {
            inaccuracies: Vec<Inaccuracy>,
        }
        let inaccuracies = match self
            .generate_json::<IdentifyOutput>(prompts::identify_inaccuracies(
                &report_data_uri,
                &user_information,
                request.jurisdiction,
            ))
            .await
        {
            Ok(output) => output.inaccuracies,
            Err(reason) => {
                warn!(identifier = %request.identifier, %reason, "Identification failed");
                outcome
                    .errors
                    .push(PipelineError::IdentificationFailed(reason));
                Vec::new()
            }
        };

        info!(
            identifier = %request.identifier,
            count = inaccuracies.len(),
            "Inaccuracy identification complete"
        );

        // Step 4: per inaccuracy, strategy lookup + draft. One item's failure
        // never aborts the others.
        #[derive(Deserialize)]
        struct DraftOutput {
            letter: String,
        }
        for inaccuracy in &inaccuracies {
            let strategy = strategy::lookup(request.jurisdiction, inaccuracy);
            let request_prompt = prompts::draft_letter(
                inaccuracy,
                &strategy,
                &user_information,
                &report_data_uri,
                request.jurisdiction,
            );
            match self.generate_json::<DraftOutput>(request_prompt).await {
                Ok(output) => outcome.dispute_letters.push(output.letter),
                Err(reason) => {
                    // Dropped letter: logged, not surfaced in the result
                    let dropped = PipelineError::DraftFailed {
                        item: inaccuracy.item_description.clone(),
                        reason,
                    };
                    warn!(identifier = %request.identifier, "{}", dropped);
                }
            }
        }

        outcome
    }

    /// Run one generative call under the timeout and parse its JSON output
    async fn generate_json<T: serde::de::DeserializeOwned>(
        &self,
        request: GenerationRequest,
    ) -> Result<T, String> {
        let raw = tokio::time::timeout(self.generation_timeout, self.generator.generate(request))
            .await
            .map_err(|_| format!("timed out after {}s", self.generation_timeout.as_secs()))?
            .map_err(|e| e.to_string())?;

        serde_json::from_str(&raw).map_err(|e| format!("malformed generation output: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::generator::{
        GenerationError, SimulatedGenerator, TEMPLATE_DRAFT, TEMPLATE_IDENTIFY, TEMPLATE_SUMMARIZE,
    };
    use crate::services::report_source::{FetchError, SimulatedReportSource};
    use async_trait::async_trait;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn request() -> PipelineRequest {
        PipelineRequest {
            identifier: "SSN-123".to_string(),
            user_information: Some("John Doe, disputes late payment".to_string()),
            jurisdiction: Jurisdiction::US,
        }
    }

    /// Generator stub that fails selected templates and delegates the rest
    struct PartialGenerator {
        fail_templates: Vec<&'static str>,
        inner: SimulatedGenerator,
    }

    #[async_trait]
    impl TextGenerator for PartialGenerator {
        async fn generate(&self, req: GenerationRequest) -> Result<String, GenerationError> {
            if self.fail_templates.contains(&req.template) {
                return Err(GenerationError::Backend("simulated outage".to_string()));
            }
            self.inner.generate(req).await
        }
    }

    /// Generator stub that finds no inaccuracies
    struct CleanReportGenerator;

    #[async_trait]
    impl TextGenerator for CleanReportGenerator {
        async fn generate(&self, req: GenerationRequest) -> Result<String, GenerationError> {
            match req.template {
                TEMPLATE_SUMMARIZE => Ok(r#"{"summary": "Nothing wrong here."}"#.to_string()),
                TEMPLATE_IDENTIFY => Ok(r#"{"inaccuracies": []}"#.to_string()),
                other => Err(GenerationError::Backend(format!("unexpected call: {other}"))),
            }
        }
    }

    /// Report source that always fails
    struct BrokenSource;

    #[async_trait]
    impl ReportSource for BrokenSource {
        async fn fetch(&self, _: &str, _: Jurisdiction) -> Result<String, FetchError> {
            Err(FetchError("bureau unreachable".to_string()))
        }
    }

    fn pipeline(generator: Arc<dyn TextGenerator>) -> Pipeline {
        Pipeline::new(generator, Arc::new(SimulatedReportSource::new()), TIMEOUT)
    }

    #[tokio::test]
    async fn full_run_yields_summary_and_letters() {
        // Identification finds 2 inaccuracies; both drafts succeed
        let outcome = pipeline(Arc::new(SimulatedGenerator::new()))
            .run(&request())
            .await;

        assert!(outcome.summary.is_some());
        assert_eq!(outcome.dispute_letters.len(), 2);
        assert!(outcome.error_text().is_none());
        assert!(!outcome.is_total_failure());
    }

    #[tokio::test]
    async fn zero_inaccuracies_is_valid_empty_result() {
        let outcome = pipeline(Arc::new(CleanReportGenerator)).run(&request()).await;

        assert!(outcome.summary.is_some());
        assert!(outcome.dispute_letters.is_empty());
        assert!(outcome.error_text().is_none());
        assert!(!outcome.is_total_failure());
    }

    #[tokio::test]
    async fn fetch_failure_aborts_with_error_only() {
        let p = Pipeline::new(
            Arc::new(SimulatedGenerator::new()),
            Arc::new(BrokenSource),
            TIMEOUT,
        );
        let outcome = p.run(&request()).await;

        assert!(outcome.summary.is_none());
        assert!(outcome.dispute_letters.is_empty());
        assert!(outcome.is_total_failure());
        let text = outcome.error_text().unwrap();
        assert!(text.contains("Failed to retrieve credit report"));
        assert!(text.contains("bureau unreachable"));
    }

    #[tokio::test]
    async fn summarization_failure_still_produces_letters() {
        let outcome = pipeline(Arc::new(PartialGenerator {
            fail_templates: vec![TEMPLATE_SUMMARIZE],
            inner: SimulatedGenerator::new(),
        }))
        .run(&request())
        .await;

        assert!(outcome.summary.is_none());
        assert_eq!(outcome.dispute_letters.len(), 2);
        assert!(outcome
            .error_text()
            .unwrap()
            .contains("Failed to summarize credit report"));
        assert!(!outcome.is_total_failure());
    }

    #[tokio::test]
    async fn draft_failure_drops_letters_without_surfacing() {
        let outcome = pipeline(Arc::new(PartialGenerator {
            fail_templates: vec![TEMPLATE_DRAFT],
            inner: SimulatedGenerator::new(),
        }))
        .run(&request())
        .await;

        assert!(outcome.summary.is_some());
        assert!(outcome.dispute_letters.is_empty());
        // Dropped letters are logged, never surfaced as errors
        assert!(outcome.error_text().is_none());
        assert!(!outcome.is_total_failure());
    }

    #[tokio::test]
    async fn all_generative_steps_failing_is_total_failure() {
        let outcome = pipeline(Arc::new(PartialGenerator {
            fail_templates: vec![TEMPLATE_SUMMARIZE, TEMPLATE_IDENTIFY],
            inner: SimulatedGenerator::new(),
        }))
        .run(&request())
        .await;

        assert!(outcome.is_total_failure());
        let text = outcome.error_text().unwrap();
        assert!(text.contains("Failed to summarize credit report"));
        assert!(text.contains("Failed to identify inaccuracies"));
    }

    #[tokio::test]
    async fn hung_generator_times_out_into_step_failure() {
        struct HangingGenerator;

        #[async_trait]
        impl TextGenerator for HangingGenerator {
            async fn generate(&self, _: GenerationRequest) -> Result<String, GenerationError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
        }

        let p = Pipeline::new(
            Arc::new(HangingGenerator),
            Arc::new(SimulatedReportSource::new()),
            Duration::from_millis(50),
        );
        let outcome = p.run(&request()).await;

        assert!(outcome.is_total_failure());
        assert!(outcome.error_text().unwrap().contains("timed out"));
    }
}
