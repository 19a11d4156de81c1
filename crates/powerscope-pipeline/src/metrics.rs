//! Counters for pipeline activity

use serde::{Deserialize, Serialize};

/// Running totals kept by the pipeline task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// Edits applied without waiting
    pub immediate_edits: usize,
    /// Edits that went through the debounce window
    pub delayed_edits: usize,
    /// Delayed edits merged into an already pending one
    pub coalesced_edits: usize,
    /// Edits refused by validation
    pub rejected_edits: usize,
    /// Solver round trips started
    pub requests_issued: usize,
    /// Responses applied to a model
    pub responses_applied: usize,
    /// Responses dropped because a newer request was issued
    pub stale_discarded: usize,
    /// Round trips that failed
    pub solver_failures: usize,
}

impl PipelineMetrics {
    /// Create empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an incoming edit
    pub fn record_edit(&mut self, immediate: bool) {
        if immediate {
            self.immediate_edits += 1;
        } else {
            self.delayed_edits += 1;
        }
    }

    /// Record a delayed edit merged into a pending one
    pub fn record_coalesced(&mut self) {
        self.coalesced_edits += 1;
    }

    /// Record a rejected edit
    pub fn record_rejected(&mut self) {
        self.rejected_edits += 1;
    }

    /// Record a solver request
    pub fn record_request(&mut self) {
        self.requests_issued += 1;
    }

    /// Record an applied response
    pub fn record_applied(&mut self) {
        self.responses_applied += 1;
    }

    /// Record a discarded stale response
    pub fn record_stale(&mut self) {
        self.stale_discarded += 1;
    }

    /// Record a failed round trip
    pub fn record_failure(&mut self) {
        self.solver_failures += 1;
    }

    /// Total edits received
    pub fn total_edits(&self) -> usize {
        self.immediate_edits + self.delayed_edits
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let lines = [
            "Pipeline Metrics Summary".to_string(),
            "========================".to_string(),
            format!(
                "Edits: {} ({} immediate, {} delayed, {} coalesced, {} rejected)",
                self.total_edits(),
                self.immediate_edits,
                self.delayed_edits,
                self.coalesced_edits,
                self.rejected_edits
            ),
            format!("Requests issued: {}", self.requests_issued),
            format!("Responses applied: {}", self.responses_applied),
            format!("Stale responses discarded: {}", self.stale_discarded),
            format!("Solver failures: {}", self.solver_failures),
        ];
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_total() {
        let mut metrics = PipelineMetrics::new();
        metrics.record_edit(true);
        metrics.record_edit(false);
        metrics.record_edit(false);
        metrics.record_coalesced();

        assert_eq!(metrics.total_edits(), 3);
        assert_eq!(metrics.delayed_edits, 2);
        assert_eq!(metrics.coalesced_edits, 1);
    }

    #[test]
    fn test_summary_and_reset() {
        let mut metrics = PipelineMetrics::new();
        metrics.record_request();
        metrics.record_stale();

        let summary = metrics.summary();
        assert!(summary.contains("Requests issued: 1"));
        assert!(summary.contains("Stale responses discarded: 1"));

        metrics.reset();
        assert_eq!(metrics, PipelineMetrics::default());
    }
}
