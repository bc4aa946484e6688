//! Credit report source
//!
//! The pipeline obtains report content through the `ReportSource` seam. The
//! shipped implementation simulates a bureau fetch and returns the report as
//! a base64 data URI, the same shape a real document fetch would produce.

use crate::models::Jurisdiction;
use async_trait::async_trait;
use base64::Engine;
use thiserror::Error;
use tracing::info;

/// Report fetch failure (fatal for the whole pipeline run)
#[derive(Debug, Error)]
#[error("Report fetch failed: {0}")]
pub struct FetchError(pub String);

/// Source of raw credit-report content
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Fetch the report for the given subject identifier as a data-URI blob
    async fn fetch(&self, identifier: &str, jurisdiction: Jurisdiction)
        -> Result<String, FetchError>;
}

/// Simulated bureau fetch: synthesizes a fixed multi-tradeline report
#[derive(Debug, Clone, Default)]
pub struct SimulatedReportSource;

impl SimulatedReportSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportSource for SimulatedReportSource {
    async fn fetch(
        &self,
        identifier: &str,
        jurisdiction: Jurisdiction,
    ) -> Result<String, FetchError> {
        info!(
            identifier = %identifier,
            jurisdiction = %jurisdiction,
            "Simulating credit report fetch"
        );

        let content = format!(
            "Simulated Credit Report for {identifier} ({jurisdiction})\n\
             Account Holder: John Doe\n\
             SSN/ID: {identifier}\n\n\
             Tradeline 1: Visa Card XXXX-1234\n\
             Balance: $500\n\
             Status: Paid as agreed. No issues.\n\n\
             Tradeline 2: Student Loan YYYY-5678\n\
             Balance: $10,000\n\
             Status: Late payment reported on 2023-05-15 (Actual payment made \
             2023-05-10, bank error suspected).\n\n\
             Tradeline 3: Store Card ZZZZ-9012\n\
             Balance: $0\n\
             Status: Account closed by consumer. Incorrectly reported as \
             'Closed by grantor'.\n\n\
             Inquiry: Mortgage Lender ABC, 2024-01-10 (Unauthorized hard inquiry)\n\n\
             Public Record: Bankruptcy filed 2015, Discharged 2016 (Should be \
             removed after 7-10 years, check dates for jurisdiction {jurisdiction})."
        );

        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        Ok(format!("data:text/plain;base64,{encoded}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_fetch_returns_data_uri() {
        let source = SimulatedReportSource::new();
        let blob = source.fetch("SSN-123", Jurisdiction::US).await.unwrap();
        assert!(blob.starts_with("data:text/plain;base64,"));

        let encoded = blob.strip_prefix("data:text/plain;base64,").unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.contains("SSN-123"));
        assert!(text.contains("Student Loan YYYY-5678"));
    }
}
