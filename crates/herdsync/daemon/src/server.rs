//! Server setup and lifecycle management

use std::sync::Arc;
use std::time::Duration;

use herdsync_model::Predictor;
use herdsync_notify::{
    NotificationDispatcher, TranslatedTextChannel, VoiceChannel, WebhookChannel,
};
use herdsync_store::{HttpTwinStore, InMemoryTwinStore, StoreError, TwinStore};
use serde_json::Value;
use tokio::net::TcpListener;

use crate::api::create_router;
use crate::api::rest::state::AppState;
use crate::config::{DaemonConfig, NotifyConfig, StoreConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::pipeline::SyncOrchestrator;
use crate::scheduler::{Scheduler, SweepSummary};

/// Herdsync daemon server
pub struct Server {
    config: DaemonConfig,
    orchestrator: Arc<SyncOrchestrator>,
    scheduler: Arc<Scheduler>,
}

impl Server {
    /// Build every component. Fails if the config is invalid, the store
    /// refuses our credentials or the model artifact cannot be loaded.
    pub async fn new(config: DaemonConfig) -> DaemonResult<Self> {
        config.validate().map_err(DaemonError::Config)?;

        let store = build_store(&config.store).await?;
        store.verify_access().await.map_err(|e| {
            tracing::error!(error = %e, "Twin store rejected startup probe");
            DaemonError::Store(e)
        })?;

        let predictor = Predictor::load(
            &config.model.artifact_path,
            &config.pipeline.required_features,
        )
        .and_then(Predictor::install)
        .map_err(|e| {
            tracing::error!(error = %e, path = %config.model.artifact_path.display(), "Failed to load model");
            DaemonError::Model(e)
        })?;

        let dispatcher = build_dispatcher(&config.pipeline.normal_label, &config.notify)?;
        tracing::info!(channels = ?dispatcher.channel_names(), "Notification channels ready");

        let orchestrator = Arc::new(
            SyncOrchestrator::new(config.pipeline.clone(), store, predictor, dispatcher)
                .map_err(|e| DaemonError::Config(e.to_string()))?,
        );
        let scheduler = Scheduler::new(config.sync.clone(), orchestrator.clone());

        Ok(Self {
            config,
            orchestrator,
            scheduler,
        })
    }

    /// Serve the read API and sweep periodically until a shutdown signal.
    pub async fn run(self) -> DaemonResult<()> {
        let addr = self.config.server.listen_addr;

        let state = AppState::new(self.orchestrator.clone(), self.scheduler.cancellation());
        let app = create_router(state, self.config.server.enable_cors);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Herdsync daemon listening on {}", addr);

        let scheduler = self.scheduler.clone();
        let sweeper = tokio::spawn(async move {
            scheduler.start().await;
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| DaemonError::Server(e.to_string()))?;

        tracing::info!("Herdsync daemon shutting down");

        self.scheduler.stop();
        if let Err(e) = sweeper.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }

        Ok(())
    }

    /// One sweep over the configured twins, then exit.
    pub async fn run_once(self) -> DaemonResult<SweepSummary> {
        let reports = self.scheduler.sweep().await;
        for report in &reports {
            match serde_json::to_string(report) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Unserializable run report"),
            }
        }

        let summary = SweepSummary::from_reports(&reports);
        tracing::info!(?summary, "One-shot sweep finished");
        if summary.aborted > 0 {
            return Err(DaemonError::SweepFailed {
                aborted: summary.aborted,
                total: summary.total,
            });
        }
        Ok(summary)
    }
}

async fn build_store(config: &StoreConfig) -> DaemonResult<Arc<dyn TwinStore>> {
    match config {
        StoreConfig::Memory { seed_file } => {
            let store = InMemoryTwinStore::new();
            if let Some(path) = seed_file {
                let raw = tokio::fs::read(path).await?;
                let documents: Vec<Value> = serde_json::from_slice(&raw).map_err(|e| {
                    DaemonError::Config(format!("invalid seed file {}: {}", path.display(), e))
                })?;
                let count = store.seed(documents).await?;
                tracing::info!(count, path = %path.display(), "Seeded in-memory twin store");
            }
            Ok(Arc::new(store))
        }
        StoreConfig::Http {
            endpoint,
            api_version,
            token_env,
            request_timeout_ms,
        } => {
            let token = std::env::var(token_env).map_err(|_| {
                StoreError::Auth(format!("environment variable {} is not set", token_env))
            })?;
            let store = HttpTwinStore::new(
                endpoint,
                api_version.clone(),
                token,
                Duration::from_millis(*request_timeout_ms),
            )?;
            tracing::info!(%endpoint, "Using remote twin store");
            Ok(Arc::new(store))
        }
    }
}

fn build_dispatcher(normal_label: &str, config: &NotifyConfig) -> DaemonResult<NotificationDispatcher> {
    let mut dispatcher = NotificationDispatcher::new(normal_label)
        .with_info_labels(&config.info_labels)
        .with_channel_timeout(Duration::from_millis(config.channel_timeout_ms));

    if config.voice.enabled {
        let voice = VoiceChannel::new(config.voice.program.clone(), config.voice.args.clone())?;
        dispatcher = dispatcher.with_channel(Arc::new(voice));
    }
    if config.translated.enabled {
        let translated = TranslatedTextChannel::new(
            config.translated.template.clone(),
            config.translated.output_path.clone(),
        )?;
        dispatcher = dispatcher.with_channel(Arc::new(translated));
    }
    if config.webhook.enabled {
        if let Some(url) = &config.webhook.url {
            let webhook = WebhookChannel::new(url, Duration::from_millis(config.channel_timeout_ms))?;
            dispatcher = dispatcher.with_channel(Arc::new(webhook));
        }
    }
    Ok(dispatcher)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TranslatedConfig, VoiceConfig, WebhookConfig};

    #[test]
    fn test_dispatcher_follows_config() {
        let config = NotifyConfig {
            info_labels: vec!["estrus".to_string()],
            channel_timeout_ms: 1_000,
            voice: VoiceConfig {
                enabled: true,
                program: "espeak".to_string(),
                args: vec![],
            },
            translated: TranslatedConfig::default(),
            webhook: WebhookConfig {
                enabled: true,
                url: Some("http://127.0.0.1:9/alerts".to_string()),
            },
        };
        let dispatcher = build_dispatcher("normal", &config).unwrap();
        assert_eq!(
            dispatcher.channel_names(),
            vec!["voice", "translated", "webhook"]
        );
    }

    #[tokio::test]
    async fn test_http_store_needs_token() {
        let config = StoreConfig::Http {
            endpoint: "https://twins.example.net".to_string(),
            api_version: herdsync_store::DEFAULT_API_VERSION.to_string(),
            token_env: "HERDSYNC_TEST_TOKEN_THAT_IS_NEVER_SET".to_string(),
            request_timeout_ms: 1_000,
        };
        assert!(matches!(
            build_store(&config).await,
            Err(DaemonError::Store(StoreError::Auth(_)))
        ));
    }

    #[tokio::test]
    async fn test_startup_fails_without_model() {
        let mut config = DaemonConfig::default();
        config.model.artifact_path = "/nonexistent/herdsync-model.json".into();
        assert!(matches!(
            Server::new(config).await,
            Err(DaemonError::Model(_))
        ));
    }
}
