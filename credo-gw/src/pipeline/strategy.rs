//! Dispute strategy lookup
//!
//! Deterministic, non-generative: keyed purely by jurisdiction and the
//! identified inaccuracy. Jurisdictions outside {US, UK} cannot reach this
//! code; they are rejected at input validation.

use serde::{Deserialize, Serialize};

use crate::models::Jurisdiction;
use crate::pipeline::Inaccuracy;

/// Strategy suggestion for disputing one inaccuracy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputeStrategy {
    pub strategy_suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevant_law_snippet: Option<String>,
}

/// Look up the dispute strategy for an inaccuracy in a jurisdiction
pub fn lookup(jurisdiction: Jurisdiction, inaccuracy: &Inaccuracy) -> DisputeStrategy {
    let prefix = format!(
        "For an item described as '{}' with reason '{}'",
        inaccuracy.item_description, inaccuracy.reason_for_dispute
    );

    match jurisdiction {
        Jurisdiction::US => DisputeStrategy {
            strategy_suggestion: format!(
                "{} in the US, consider citing the Fair Credit Reporting Act (FCRA). \
                 Ensure you clearly state the inaccuracy and request its removal or \
                 correction.",
                prefix
            ),
            relevant_law_snippet: Some(
                "FCRA Section 611(a)(1)(A): \"Subject to subsection (f), if the \
                 completeness or accuracy of any item of information contained in a \
                 consumer's file at a consumer reporting agency is disputed by the \
                 consumer and the consumer notifies the agency directly, or indirectly \
                 through a reseller, of such dispute, the agency shall, free of charge, \
                 conduct a reasonable reinvestigation...\" (Simulated Snippet)"
                    .to_string(),
            ),
        },
        Jurisdiction::UK => DisputeStrategy {
            strategy_suggestion: format!(
                "{} in the UK, refer to the Consumer Credit Act or GDPR principles \
                 regarding data accuracy. Clearly outline the error and request \
                 rectification.",
                prefix
            ),
            relevant_law_snippet: Some(
                "Data Protection Act 2018 (UK GDPR) Article 5(1)(d): \"Personal data \
                 shall be accurate and, where necessary, kept up to date; every \
                 reasonable step must be taken to ensure that personal data that are \
                 inaccurate, having regard to the purposes for which they are \
                 processed, are erased or rectified without delay ('accuracy').\" \
                 (Simulated Snippet)"
                    .to_string(),
            ),
        },
    }
}
