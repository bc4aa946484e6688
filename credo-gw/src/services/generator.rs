//! Text-generation capability
//!
//! The pipeline talks to a `TextGenerator` trait object; each call site
//! renders its own prompt and parses its own output schema from the returned
//! JSON. The shipped backend is simulated: it recognizes the call site by
//! template name and synthesizes schema-correct output from the prompt
//! contents.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

/// Template name for the summarization call site
pub const TEMPLATE_SUMMARIZE: &str = "summarize_report";
/// Template name for the inaccuracy-identification call site
pub const TEMPLATE_IDENTIFY: &str = "identify_inaccuracies";
/// Template name for the letter-drafting call site
pub const TEMPLATE_DRAFT: &str = "draft_letter";

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The backend failed to produce output
    #[error("Generation failed: {0}")]
    Backend(String),

    /// The backend produced output that does not match the call site schema
    #[error("Malformed generation output: {0}")]
    MalformedOutput(String),
}

/// One generation invocation: a rendered prompt plus the template name the
/// call site rendered it from (backends may key behavior or metrics on it)
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub template: &'static str,
    pub prompt: String,
}

/// Text-generation backend. Returns raw JSON text; the call site owns the
/// output schema.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// Simulated generation backend
///
/// Produces deterministic, schema-correct JSON per call site so the full
/// pipeline runs end-to-end without a model provider.
#[derive(Debug, Clone, Default)]
pub struct SimulatedGenerator;

impl SimulatedGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TextGenerator for SimulatedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let output = match request.template {
            TEMPLATE_SUMMARIZE => json!({
                "summary": "The report shows one late payment on a student loan that the \
                    consumer states was paid on time (suspected bank error), a store card \
                    incorrectly reported as closed by the grantor, and an unauthorized hard \
                    inquiry from a mortgage lender. Key issues: two likely reporting errors \
                    and one unauthorized inquiry worth disputing."
            }),
            TEMPLATE_IDENTIFY => json!({
                "inaccuracies": [
                    {
                        "itemDescription": "Late payment reported on Student Loan YYYY-5678",
                        "reasonForDispute": "Payment was made on 2023-05-10, before the due \
                            date; the late mark on 2023-05-15 appears to be a bank error",
                        "accountNumber": "YYYY-5678"
                    },
                    {
                        "itemDescription": "Store Card ZZZZ-9012 reported as 'Closed by grantor'",
                        "reasonForDispute": "Account was closed by the consumer, not the grantor",
                        "accountNumber": "ZZZZ-9012"
                    }
                ]
            }),
            TEMPLATE_DRAFT => json!({
                "letter": format!(
                    "To Whom It May Concern,\n\nI am writing to dispute inaccurate \
                    information on my credit report. {}\n\nPlease investigate and correct \
                    or remove this item.\n\nSincerely,\nThe Consumer",
                    first_prompt_line(&request.prompt)
                )
            }),
            other => {
                return Err(GenerationError::Backend(format!(
                    "Unknown template '{}'",
                    other
                )))
            }
        };

        serde_json::to_string(&output)
            .map_err(|e| GenerationError::MalformedOutput(e.to_string()))
    }
}

/// First non-empty prompt line, to anchor the simulated letter to its input
fn first_prompt_line(prompt: &str) -> &str {
    prompt
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}
