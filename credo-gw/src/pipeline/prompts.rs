//! Prompt templates for the internal pipeline
//!
//! Each call site renders its full prompt here and parses the generator's
//! JSON output against its own schema in the pipeline.

use crate::models::Jurisdiction;
use crate::pipeline::strategy::DisputeStrategy;
use crate::pipeline::Inaccuracy;
use crate::services::generator::{
    GenerationRequest, TEMPLATE_DRAFT, TEMPLATE_IDENTIFY, TEMPLATE_SUMMARIZE,
};

/// Summarization prompt: report blob in, `{"summary": "..."}` out
pub fn summarize(report_data_uri: &str) -> GenerationRequest {
    GenerationRequest {
        template: TEMPLATE_SUMMARIZE,
        prompt: format!(
            "You are an AI expert in helping users fix their credit. Summarize the \
             key issues in the credit report provided below. Respond with a JSON \
             object: {{\"summary\": string}}.\n\n\
             Credit Report:\n{report_data_uri}"
        ),
    }
}

/// Identification prompt: report + user context in,
/// `{"inaccuracies": [{itemDescription, reasonForDispute, accountNumber?}]}` out
pub fn identify_inaccuracies(
    report_data_uri: &str,
    user_information: &str,
    jurisdiction: Jurisdiction,
) -> GenerationRequest {
    GenerationRequest {
        template: TEMPLATE_IDENTIFY,
        prompt: format!(
            "You are an expert credit analyst. Analyze the provided credit report and \
             user information. Identify all potential inaccuracies. For each, provide \
             a concise description of the item, the reason it might be disputed, and \
             the associated account number if available. Respond with a JSON object: \
             {{\"inaccuracies\": [{{\"itemDescription\": string, \"reasonForDispute\": \
             string, \"accountNumber\": string?}}]}}.\n\n\
             Jurisdiction for analysis: {jurisdiction}\n\
             User Information:\n{user_information}\n\n\
             Credit Report:\n{report_data_uri}"
        ),
    }
}

/// Drafting prompt: inaccuracy + strategy + context in, `{"letter": "..."}` out
pub fn draft_letter(
    inaccuracy: &Inaccuracy,
    strategy: &DisputeStrategy,
    user_information: &str,
    report_data_uri: &str,
    jurisdiction: Jurisdiction,
) -> GenerationRequest {
    let account_line = match &inaccuracy.account_number {
        Some(account) => format!("- Account Number: {account}\n"),
        None => String::new(),
    };
    let snippet_line = match &strategy.relevant_law_snippet {
        Some(snippet) => format!(
            "- Relevant Law Snippet (for context, do not quote directly unless \
             appropriate): {snippet}\n"
        ),
        None => String::new(),
    };

    GenerationRequest {
        template: TEMPLATE_DRAFT,
        prompt: format!(
            "You are an AI assistant specializing in crafting effective credit dispute \
             letters. Given the identified inaccuracy, the suggested dispute strategy, \
             user information, and the full credit report for context, draft a \
             professional and clear dispute letter tailored for the {jurisdiction} \
             jurisdiction. Respond with a JSON object: {{\"letter\": string}}.\n\n\
             User Information for Letter Personalization:\n{user_information}\n\n\
             Identified Inaccuracy:\n\
             - Description: {description}\n\
             - Reason for Dispute: {reason}\n\
             {account_line}\n\
             Suggested Strategy & Legal Context ({jurisdiction}):\n\
             - Strategy: {suggestion}\n\
             {snippet_line}\n\
             Full Credit Report (for context, refer to specific details as needed):\n\
             {report_data_uri}",
            description = inaccuracy.item_description,
            reason = inaccuracy.reason_for_dispute,
            suggestion = strategy.strategy_suggestion,
        ),
    }
}
