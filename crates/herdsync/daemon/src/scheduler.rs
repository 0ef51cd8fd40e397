//! Periodic sweep over the configured twins

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use herdsync_types::TwinId;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::config::SyncConfig;
use crate::pipeline::{RunOutcome, RunReport, SyncOrchestrator};

/// Tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub total: usize,
    pub done: usize,
    pub written_unconfirmed: usize,
    pub aborted: usize,
    pub notified: usize,
}

impl SweepSummary {
    pub fn from_reports(reports: &[RunReport]) -> Self {
        let mut summary = SweepSummary {
            total: reports.len(),
            ..Default::default()
        };
        for report in reports {
            match report.outcome {
                RunOutcome::Done => summary.done += 1,
                RunOutcome::WrittenUnconfirmed { .. } => summary.written_unconfirmed += 1,
                RunOutcome::Aborted { .. } => summary.aborted += 1,
            }
            if report.notification.is_some() {
                summary.notified += 1;
            }
        }
        summary
    }
}

/// Runs the pipeline for every configured twin on a fixed interval.
pub struct Scheduler {
    config: SyncConfig,
    twin_ids: Vec<TwinId>,
    orchestrator: Arc<SyncOrchestrator>,
    permits: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(config: SyncConfig, orchestrator: Arc<SyncOrchestrator>) -> Arc<Self> {
        let mut seen = HashSet::new();
        let twin_ids = config
            .twin_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(TwinId::new)
            .collect();
        let permits = Arc::new(Semaphore::new(config.max_concurrent_runs.max(1)));
        let (shutdown, _) = watch::channel(false);

        Arc::new(Self {
            config,
            twin_ids,
            orchestrator,
            permits,
            shutdown,
        })
    }

    pub fn twin_ids(&self) -> &[TwinId] {
        &self.twin_ids
    }

    /// Flag observed by in-flight runs; flips to `true` on [`stop`](Self::stop).
    pub fn cancellation(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Run every twin once, distinct twins in parallel up to the configured
    /// bound. Reports come back in configuration order.
    pub async fn sweep(&self) -> Vec<RunReport> {
        let handles: Vec<_> = self
            .twin_ids
            .iter()
            .cloned()
            .map(|twin_id| {
                let orchestrator = self.orchestrator.clone();
                let permits = self.permits.clone();
                let cancel = self.cancellation();
                tokio::spawn(async move {
                    // The semaphore is never closed.
                    let _permit = permits.acquire_owned().await.ok();
                    orchestrator.run_with_cancel(&twin_id, cancel).await
                })
            })
            .collect();

        join_all(handles)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::error!(error = %e, "Sync run task failed");
                    None
                }
            })
            .collect()
    }

    /// Sweep on every tick until [`stop`](Self::stop) is called.
    pub async fn start(self: Arc<Self>) {
        let mut shutdown = self.cancellation();
        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            twins = self.twin_ids.len(),
            interval_secs = self.config.interval_secs,
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = SweepSummary::from_reports(&self.sweep().await);
                    if summary.aborted > 0 {
                        tracing::warn!(?summary, "Sweep finished with aborted runs");
                    } else {
                        tracing::info!(?summary, "Sweep finished");
                    }
                }
                _ = shutdown.changed() => {}
            }

            if *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("Scheduler stopped");
    }

    /// Stop the sweep loop and cancel in-flight runs at their next transition.
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use herdsync_model::testing::constant_artifact;
    use herdsync_model::Predictor;
    use herdsync_notify::NotificationDispatcher;
    use herdsync_store::InMemoryTwinStore;
    use herdsync_types::TwinAttributes;

    fn healthy_cow() -> TwinAttributes {
        TwinAttributes::new()
            .with("breed", "Cross Breed")
            .with("rumination_time", 330.0)
            .with("avg_lameness", 1.0)
            .with("estrus_sign", "none")
            .with("ax", 0.1)
            .with("ay", 0.2)
            .with("az", 9.8)
            .with("gx", 0.0)
            .with("gy", 0.0)
            .with("gz", 0.1)
            .with("step_count", 4200)
    }

    async fn scheduler(twin_ids: &[&str]) -> (Arc<Scheduler>, Arc<InMemoryTwinStore>) {
        let store = Arc::new(InMemoryTwinStore::new());
        store.insert("co-01", healthy_cow()).await;
        store.insert("co-02", healthy_cow()).await;

        let config = PipelineConfig::default();
        let predictor = Arc::new(
            Predictor::from_artifact(constant_artifact("normal"), &config.required_features).unwrap(),
        );
        let orchestrator = Arc::new(
            SyncOrchestrator::new(
                config,
                store.clone(),
                predictor,
                NotificationDispatcher::new("normal"),
            )
            .unwrap(),
        );
        let sync = SyncConfig {
            twin_ids: twin_ids.iter().map(|s| s.to_string()).collect(),
            interval_secs: 60,
            max_concurrent_runs: 2,
        };
        (Scheduler::new(sync, orchestrator), store)
    }

    #[tokio::test]
    async fn test_sweep_runs_each_twin_once() {
        let (scheduler, store) = scheduler(&["co-01", "co-02", "co-01", "co-77"]).await;
        assert_eq!(scheduler.twin_ids().len(), 3);

        let reports = scheduler.sweep().await;
        let summary = SweepSummary::from_reports(&reports);
        assert_eq!(
            summary,
            SweepSummary {
                total: 3,
                done: 2,
                written_unconfirmed: 0,
                aborted: 1,
                notified: 0,
            }
        );
        assert_eq!(reports[2].twin_id, TwinId::new("co-77"));
        assert_eq!(store.patch_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_and_stop() {
        let (scheduler, store) = scheduler(&["co-01"]).await;
        let handle = tokio::spawn(scheduler.clone().start());

        // first tick fires immediately
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.patch_calls(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.patch_calls(), 2);

        scheduler.stop();
        handle.await.unwrap();
    }
}
