//! Output types returned by a comparison.

use crate::pipeline::contract::ComparisonResult;
use serde::{Deserialize, Serialize};

/// A finished comparison: the model's result plus run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonOutput {
    pub result: ComparisonResult,
    pub stats: ComparisonStats,
}

/// Statistics for one comparison run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonStats {
    /// Documents submitted.
    pub documents: usize,
    /// Payloads sent as extracted text (spreadsheets, CSV).
    pub textual_payloads: usize,
    /// Payloads sent as inline binary (PDF, images).
    pub binary_payloads: usize,
    /// Policy records returned by the model; may differ from `documents`.
    pub policies_returned: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub normalize_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ComparisonStats {
    /// True when the model returned a different number of records than documents sent.
    pub fn count_mismatch(&self) -> bool {
        self.policies_returned != self.documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_mismatch_flags_short_replies() {
        let stats = ComparisonStats {
            documents: 3,
            policies_returned: 2,
            ..Default::default()
        };
        assert!(stats.count_mismatch());
        let ok = ComparisonStats {
            documents: 2,
            policies_returned: 2,
            ..Default::default()
        };
        assert!(!ok.count_mismatch());
    }

    #[test]
    fn stats_serialise_to_json() {
        let json = serde_json::to_value(ComparisonStats::default()).unwrap();
        assert_eq!(json["documents"], 0);
        assert!(json.get("llm_duration_ms").is_some());
    }
}
