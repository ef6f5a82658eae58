// file: src/pipeline/policy.rs
// description: export counters and the completion / failure decision
// reference: terminal state evaluation after every resolved record

use crate::models::RecordOutcome;
use serde::Serialize;

/// Summary returned for a finished export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResult {
    pub expected_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub unverified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Complete,
    TotalFailure,
}

/// Outcome of an export that produced a summary. Total failure and
/// cancellation are reported as errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TerminalState {
    Complete,
    PartialFailure,
}

#[derive(Debug, Clone, Default)]
pub struct ExportState {
    pub expected: u64,
    pub success: u64,
    pub error: u64,
    pub unverified: u64,
    pub attachment_error: u64,
    /// Resolved records so far, including rejected tasks.
    pub progress: u64,
}

impl ExportState {
    pub fn new(expected: u64) -> Self {
        Self {
            expected,
            ..Default::default()
        }
    }

    /// Counts a non-success outcome. `Ok` records are counted through `record_success`
    /// once the accumulator has accepted them.
    pub fn record_failure(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Ok { .. } => {}
            RecordOutcome::Unverified => self.unverified += 1,
            RecordOutcome::DecryptionError | RecordOutcome::Unknown => self.error += 1,
            RecordOutcome::AttachmentError => {
                self.error += 1;
                self.attachment_error += 1;
            }
        }
    }

    pub fn record_success(&mut self, accepted: u64) {
        self.success = accepted;
    }

    pub fn record_error(&mut self) {
        self.error += 1;
    }

    pub fn advance(&mut self) -> u64 {
        self.progress += 1;
        self.progress
    }

    pub fn processed(&self) -> u64 {
        self.success + self.error + self.unverified
    }

    pub fn evaluate(&self) -> Verdict {
        if self.error + self.unverified == self.expected {
            Verdict::TotalFailure
        } else if self.processed() >= self.expected {
            Verdict::Complete
        } else {
            Verdict::Pending
        }
    }

    pub fn result(&self) -> ExportResult {
        ExportResult {
            expected_count: self.expected,
            success_count: self.success,
            error_count: self.error,
            unverified_count: self.unverified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_with_mixed_outcomes() {
        let mut state = ExportState::new(3);
        state.record_success(1);
        assert_eq!(state.evaluate(), Verdict::Pending);
        state.record_failure(&RecordOutcome::DecryptionError);
        assert_eq!(state.evaluate(), Verdict::Pending);
        state.record_success(2);
        assert_eq!(state.evaluate(), Verdict::Complete);
        assert_eq!(
            state.result(),
            ExportResult {
                expected_count: 3,
                success_count: 2,
                error_count: 1,
                unverified_count: 0,
            }
        );
    }

    #[test]
    fn test_total_failure_when_nothing_succeeds() {
        let mut state = ExportState::new(2);
        state.record_failure(&RecordOutcome::Unverified);
        assert_eq!(state.evaluate(), Verdict::Pending);
        state.record_failure(&RecordOutcome::Unverified);
        assert_eq!(state.evaluate(), Verdict::TotalFailure);
    }

    #[test]
    fn test_attachment_error_counts_twice() {
        let mut state = ExportState::new(5);
        state.record_failure(&RecordOutcome::AttachmentError);
        state.record_failure(&RecordOutcome::Unknown);
        assert_eq!(state.error, 2);
        assert_eq!(state.attachment_error, 1);
        assert_eq!(state.processed(), 2);
    }

    #[test]
    fn test_terminal_state_serialized_names() {
        assert_eq!(
            serde_json::to_string(&TerminalState::PartialFailure).unwrap(),
            "\"PARTIAL_FAILURE\""
        );
        assert_eq!(
            serde_json::to_string(&TerminalState::Complete).unwrap(),
            "\"COMPLETE\""
        );
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut state = ExportState::new(2);
        assert_eq!(state.advance(), 1);
        assert_eq!(state.advance(), 2);
    }
}
