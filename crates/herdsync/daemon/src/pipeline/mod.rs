//! Per-twin inference-and-sync pipeline.
//!
//! One run walks `Fetching → Validating → Predicting → Planning → Writing →
//! Confirming → Notifying → Done`, or stops in `Aborted`. Every per-run
//! failure ends up in the returned [`RunReport`]; nothing here can take the
//! process down.

mod report;
mod retry;
mod stats;

use std::future::Future;
use std::sync::Arc;

use herdsync_model::SharedPredictor;
use herdsync_notify::NotificationDispatcher;
use herdsync_store::{StoreError, StoreResult, TwinStore};
use herdsync_types::{
    FeatureValidator, PatchDocument, PatchPlanner, TwinId, TwinSnapshot, ValidationError,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::PipelineConfig;
use crate::error::SyncError;
use crate::lease::LeaseRegistry;

pub use report::{Confirmation, RunOutcome, RunReport, RunState};
pub use retry::Backoff;
pub use stats::{RunStats, StatsSnapshot};

/// Drives sync runs. Shared by the scheduler and the API.
pub struct SyncOrchestrator {
    config: PipelineConfig,
    store: Arc<dyn TwinStore>,
    predictor: SharedPredictor,
    validator: FeatureValidator,
    dispatcher: NotificationDispatcher,
    leases: LeaseRegistry,
    backoff: Backoff,
    stats: RunStats,
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

impl SyncOrchestrator {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn TwinStore>,
        predictor: SharedPredictor,
        dispatcher: NotificationDispatcher,
    ) -> Result<Self, ValidationError> {
        let validator = FeatureValidator::new(config.required_features.clone())?;
        let backoff = Backoff::from(&config.backoff);
        Ok(Self {
            config,
            store,
            predictor,
            validator,
            dispatcher,
            leases: LeaseRegistry::new(),
            backoff,
            stats: RunStats::default(),
        })
    }

    pub fn store(&self) -> &Arc<dyn TwinStore> {
        &self.store
    }

    pub fn predictor(&self) -> &SharedPredictor {
        &self.predictor
    }

    pub fn leases(&self) -> &LeaseRegistry {
        &self.leases
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Run the pipeline once for `twin_id` without external cancellation.
    pub async fn run(&self, twin_id: &TwinId) -> RunReport {
        let (_never, cancel) = watch::channel(false);
        self.run_with_cancel(twin_id, cancel).await
    }

    /// Run the pipeline once for `twin_id`.
    ///
    /// `cancel` is checked at every state transition. Before the patch is
    /// committed a cancellation aborts the run; afterwards, or once a write
    /// has failed without a definite answer, the run still confirms the
    /// write and only skips notification.
    pub async fn run_with_cancel(
        &self,
        twin_id: &TwinId,
        cancel: watch::Receiver<bool>,
    ) -> RunReport {
        let mut report = RunReport::start(twin_id.clone());
        let span = info_span!("sync_run", run_id = %report.run_id, twin_id = %twin_id);

        async move {
            self.stats.started();
            if let Err(error) = self.execute(&mut report, &cancel).await {
                warn!(stage = %report.state(), code = error.code(), %error, "sync run aborted");
                report.abort(error);
            }
            self.stats.record(&report);
            report
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        report: &mut RunReport,
        cancel: &watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        let twin_id = report.twin_id.clone();
        let lease = self
            .leases
            .acquire(&twin_id, self.config.lease_timeout())
            .await?;

        self.transition(report, RunState::Fetching, cancel)?;
        let mut snapshot = self.fetch(report, &twin_id, cancel).await?;

        self.transition(report, RunState::Validating, cancel)?;
        let features = self.validator.validate(&snapshot.attributes)?;

        self.transition(report, RunState::Predicting, cancel)?;
        let prediction = self.predictor.predict(&features)?;
        let label = prediction.label;
        debug!(%label, model_version = self.predictor.model_version(), "prediction produced");
        report.label = Some(label.clone());

        // The label is kept across retries; only the plan follows the twin.
        // `unacknowledged` holds a patch whose write failed in a way that may
        // still have landed; once set, cancellation can no longer abort.
        let mut unacknowledged: Option<PatchDocument> = None;
        let committed = loop {
            let attempt = self
                .write_once(report, &twin_id, &label, &mut snapshot, &mut unacknowledged, cancel)
                .await;
            match attempt {
                Ok(Some(document)) => break Some(document),
                Ok(None) => continue,
                Err(SyncError::Cancelled) if unacknowledged.is_some() => break None,
                Err(err) => return Err(err),
            }
        };
        match &committed {
            Some(document) => {
                report.ops = document.operations().to_vec();
                info!(ops = ?document.ops(), %label, "patch committed");
            }
            None => warn!(%label, "cancelled after an unacknowledged write, checking the twin"),
        }

        report.enter(RunState::Confirming);
        report.confirmation = self.confirm(&twin_id, &label).await;
        drop(lease);

        if is_cancelled(cancel) {
            let outcome = match &report.confirmation {
                Confirmation::Confirmed => RunOutcome::Done,
                Confirmation::Mismatch { observed } => RunOutcome::WrittenUnconfirmed {
                    reason: format!("cancelled after commit; twin shows {:?}", observed),
                },
                Confirmation::Unavailable { reason } => RunOutcome::WrittenUnconfirmed {
                    reason: format!("cancelled after commit; {}", reason),
                },
                Confirmation::Skipped => RunOutcome::WrittenUnconfirmed {
                    reason: "cancelled after commit".to_string(),
                },
            };
            if committed.is_none() && matches!(outcome, RunOutcome::Done) {
                if let Some(document) = unacknowledged {
                    report.ops = document.operations().to_vec();
                }
            }
            warn!(?outcome, "run cancelled after commit, notification skipped");
            report.finish(outcome);
            return Ok(());
        }

        report.enter(RunState::Notifying);
        report.notification = self.dispatcher.dispatch(&twin_id, &label).await;
        report.finish(RunOutcome::Done);

        info!(
            %label,
            transient_retries = report.transient_retries,
            conflict_retries = report.conflict_retries,
            notified = report.notification.is_some(),
            "sync run done"
        );
        Ok(())
    }

    fn transition(
        &self,
        report: &mut RunReport,
        next: RunState,
        cancel: &watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        if is_cancelled(cancel) {
            return Err(SyncError::Cancelled);
        }
        debug!(from = %report.state(), to = %next, "transition");
        report.enter(next);
        Ok(())
    }

    /// One plan-and-write attempt. `Ok(None)` means the twin was re-read and
    /// the write should be planned again.
    async fn write_once(
        &self,
        report: &mut RunReport,
        twin_id: &TwinId,
        label: &str,
        snapshot: &mut TwinSnapshot,
        unacknowledged: &mut Option<PatchDocument>,
        cancel: &watch::Receiver<bool>,
    ) -> Result<Option<PatchDocument>, SyncError> {
        self.transition(report, RunState::Planning, cancel)?;
        let document = PatchPlanner::plan_document(
            &snapshot.attributes,
            [(self.config.target_field.as_str(), label)],
        );

        self.transition(report, RunState::Writing, cancel)?;
        let written = self
            .call(
                self.store
                    .patch(twin_id, &document, snapshot.etag.as_deref()),
            )
            .await;
        match written {
            Ok(()) => return Ok(Some(document)),
            Err(err)
                if err.is_conflict()
                    && report.conflict_retries < self.config.max_conflict_retries =>
            {
                report.conflict_retries += 1;
                warn!(attempt = report.conflict_retries, error = %err, "write conflict, re-reading twin");
            }
            Err(err)
                if err.is_transient()
                    && report.transient_retries < self.config.max_transient_retries =>
            {
                // A timed-out write may still have landed; the fresh read decides.
                *unacknowledged = Some(document);
                self.back_off(report, &err, cancel).await?;
            }
            Err(err) => {
                let attempts = if err.is_conflict() {
                    report.conflict_retries + 1
                } else {
                    report.transient_retries + 1
                };
                return Err(SyncError::from_store(err, attempts));
            }
        }

        self.transition(report, RunState::Fetching, cancel)?;
        *snapshot = self.fetch(report, twin_id, cancel).await?;
        Ok(None)
    }

    /// Bound a single store call by the per-call timeout.
    async fn call<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let timeout = self.config.call_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Transient(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn fetch(
        &self,
        report: &mut RunReport,
        twin_id: &TwinId,
        cancel: &watch::Receiver<bool>,
    ) -> Result<TwinSnapshot, SyncError> {
        loop {
            match self.call(self.store.get(twin_id)).await {
                Ok(snapshot) => {
                    debug!(etag = ?snapshot.etag, attributes = snapshot.attributes.len(), "twin fetched");
                    return Ok(snapshot);
                }
                Err(err)
                    if err.is_transient()
                        && report.transient_retries < self.config.max_transient_retries =>
                {
                    self.back_off(report, &err, cancel).await?;
                }
                Err(err) => {
                    return Err(SyncError::from_store(err, report.transient_retries + 1));
                }
            }
        }
    }

    async fn back_off(
        &self,
        report: &mut RunReport,
        err: &StoreError,
        cancel: &watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        let delay = self.backoff.delay(report.transient_retries);
        report.transient_retries += 1;
        warn!(
            attempt = report.transient_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "transient store failure, retrying"
        );
        tokio::time::sleep(delay).await;
        if is_cancelled(cancel) {
            return Err(SyncError::Cancelled);
        }
        Ok(())
    }

    /// Detection only: a mismatch or failed read never undoes the write.
    async fn confirm(&self, twin_id: &TwinId, label: &str) -> Confirmation {
        match self.call(self.store.get(twin_id)).await {
            Ok(snapshot) => {
                debug!(twin = %snapshot.to_document(), "post-write twin");
                let observed = snapshot.attributes.get(&self.config.target_field);
                if observed.and_then(Value::as_str) == Some(label) {
                    Confirmation::Confirmed
                } else {
                    warn!(?observed, expected = %label, "confirmation mismatch");
                    Confirmation::Mismatch {
                        observed: observed.cloned(),
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "confirmation read failed");
                Confirmation::Unavailable {
                    reason: err.to_string(),
                }
            }
        }
    }
}
