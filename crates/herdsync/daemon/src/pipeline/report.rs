//! Observable result of one sync run.

use chrono::{DateTime, Utc};
use herdsync_types::{NotificationEvent, PatchOperation, TwinId};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SyncError;

/// Pipeline states, in the order a successful run visits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Fetching,
    Validating,
    Predicting,
    Planning,
    Writing,
    Confirming,
    Notifying,
    Done,
    Aborted,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Validating => "validating",
            RunState::Predicting => "predicting",
            RunState::Planning => "planning",
            RunState::Writing => "writing",
            RunState::Confirming => "confirming",
            RunState::Notifying => "notifying",
            RunState::Done => "done",
            RunState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Done,
    /// The patch was committed, or its write went unacknowledged, and the
    /// run was cancelled before the write could be confirmed.
    WrittenUnconfirmed { reason: String },
    Aborted {
        /// State the run was in when it failed.
        stage: RunState,
        #[serde(serialize_with = "serialize_error")]
        error: SyncError,
    },
}

fn serialize_error<S: Serializer>(error: &SyncError, serializer: S) -> Result<S::Ok, S::Error> {
    let mut body = serializer.serialize_struct("SyncError", 2)?;
    body.serialize_field("code", error.code())?;
    body.serialize_field("message", &error.to_string())?;
    body.end()
}

/// Result of the post-write read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Confirmation {
    /// Target field equals the predicted label.
    Confirmed,
    /// Target field holds something else (or nothing).
    Mismatch { observed: Option<Value> },
    /// The confirming read failed or timed out.
    Unavailable { reason: String },
    /// Nothing was written.
    Skipped,
}

/// Everything observable about one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub twin_id: TwinId,
    pub outcome: RunOutcome,
    pub label: Option<String>,
    /// Operations of the committed patch.
    pub ops: Vec<PatchOperation>,
    pub transient_retries: u32,
    pub conflict_retries: u32,
    pub confirmation: Confirmation,
    pub notification: Option<NotificationEvent>,
    pub transitions: Vec<RunState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub(crate) fn start(twin_id: TwinId) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            twin_id,
            outcome: RunOutcome::Done,
            label: None,
            ops: Vec::new(),
            transient_retries: 0,
            conflict_retries: 0,
            confirmation: Confirmation::Skipped,
            notification: None,
            transitions: vec![RunState::Idle],
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Current (last entered) state.
    pub fn state(&self) -> RunState {
        self.transitions.last().copied().unwrap_or(RunState::Idle)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RunOutcome::Done)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, RunOutcome::Aborted { .. })
    }

    /// The abort error, if the run aborted.
    pub fn error(&self) -> Option<&SyncError> {
        match &self.outcome {
            RunOutcome::Aborted { error, .. } => Some(error),
            _ => None,
        }
    }

    pub(crate) fn enter(&mut self, state: RunState) {
        self.transitions.push(state);
    }

    pub(crate) fn abort(&mut self, error: SyncError) {
        self.outcome = RunOutcome::Aborted {
            stage: self.state(),
            error,
        };
        self.enter(RunState::Aborted);
        self.finished_at = Some(Utc::now());
    }

    pub(crate) fn finish(&mut self, outcome: RunOutcome) {
        if matches!(outcome, RunOutcome::Done) {
            self.enter(RunState::Done);
        }
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdsync_types::ValidationError;

    #[test]
    fn test_abort_records_stage() {
        let mut report = RunReport::start(TwinId::new("co-02"));
        report.enter(RunState::Fetching);
        report.enter(RunState::Validating);
        report.abort(SyncError::Validation(ValidationError::MissingFields {
            missing: vec!["avg_lameness".to_string()],
        }));

        assert!(report.is_aborted());
        assert_eq!(report.state(), RunState::Aborted);
        match &report.outcome {
            RunOutcome::Aborted { stage, .. } => assert_eq!(*stage, RunState::Validating),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_report_serializes() {
        let mut report = RunReport::start(TwinId::new("co-01"));
        report.enter(RunState::Fetching);
        report.abort(SyncError::NotFound(TwinId::new("co-01")));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["twin_id"], "co-01");
        assert_eq!(json["outcome"]["status"], "aborted");
        assert_eq!(json["outcome"]["stage"], "fetching");
        assert_eq!(json["outcome"]["error"]["code"], "NOT_FOUND");
        assert_eq!(json["confirmation"]["status"], "skipped");
        assert_eq!(json["transitions"][0], "idle");
    }
}
