//! Service wiring for the two entry points

use std::net::SocketAddr;
use std::sync::Arc;

use multitune_core_api_client::CoreApiClient;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, StoreBackend};
use crate::dispatcher::{Dispatcher, JobIntake};
use crate::error::{WorkerError, WorkerResult};
use crate::health::health_router;
use crate::pipeline::{
    DemucsSeparator, Downloader, FfmpegMixer, GcsStorage, ObjectStorage, QuizAudioPipeline,
    Separator, SourceResolver, StemPipeline,
};
use crate::recovery::RecoveryLoop;
use crate::store::{InMemoryJobStore, JobRepository, JobStore, RedisJobStore};
use crate::worker::WorkerPool;

async fn build_store(config: &Config) -> WorkerResult<(Arc<dyn JobStore>, redis::Client)> {
    match config.store_backend {
        StoreBackend::Redis => {
            let store = RedisJobStore::new(config.redis())?;
            // Operations reconnect on their own, so an early outage is not fatal
            if let Err(e) = store.ping().await {
                warn!(error = %e, "Redis not reachable at startup");
            }
            let client = store.client().clone();
            Ok((Arc::new(store), client))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory job store, job state is lost on restart");
            let client = redis::Client::open(config.redis().connection_url())?;
            Ok((Arc::new(InMemoryJobStore::new()), client))
        }
    }
}

fn build_storage(config: &Config) -> WorkerResult<Arc<dyn ObjectStorage>> {
    Ok(Arc::new(GcsStorage::new(config.storage().clone())?))
}

fn build_separator(config: &Config) -> Arc<dyn Separator> {
    Arc::new(DemucsSeparator::new(config.demucs_command.clone()))
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
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
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Wait for a background loop, logging a panic or cancellation
///
/// Returns whether the task ended cleanly.
async fn join_background(task: &'static str, handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!(task, error = %e, "Background task ended abnormally");
            false
        }
    }
}

/// Run the processor service until a shutdown signal
pub async fn serve(config: Config) -> WorkerResult<()> {
    let (store, client) = build_store(&config).await?;
    info!(
        backend = store.backend_name(),
        redis = %config.redis().redacted_url(),
        environment = %config.environment(),
        "Job store ready"
    );

    let processor = Arc::new(StemPipeline::new(
        Downloader::new()?,
        build_separator(&config),
        build_storage(&config)?,
        config.separation_model.clone(),
    ));

    let repository = JobRepository::new(store);
    let pool = WorkerPool::new(
        config.max_concurrent_jobs,
        repository.clone(),
        processor,
        config.processing_timeout(),
    );

    let shutdown = CancellationToken::new();

    let dispatcher = Dispatcher::new(
        client,
        config.job_channel.clone(),
        JobIntake::new(repository.clone(), pool.clone()),
        config.dispatcher_max_backoff(),
    );
    let recovery = RecoveryLoop::new(
        repository,
        pool.clone(),
        config.recovery_interval(),
        config.processing_timeout(),
        config.job_expiry(),
    );
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown.clone()));
    let recovery_task = tokio::spawn(recovery.run(shutdown.clone()));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_token.cancel();
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        max_concurrent_jobs = config.max_concurrent_jobs,
        channel = %config.job_channel,
        "Audio processor listening"
    );

    let server_token = shutdown.clone();
    let served = axum::serve(listener, health_router(pool.clone()))
        .with_graceful_shutdown(async move { server_token.cancelled().await })
        .await;
    shutdown.cancel();

    join_background("dispatcher", dispatcher_task).await;
    join_background("recovery", recovery_task).await;

    pool.close();
    if pool.wait_idle(config.shutdown_grace()).await {
        info!("All jobs finished");
    } else {
        warn!(
            in_flight = pool.in_flight_count(),
            grace_secs = config.shutdown_grace_secs,
            "Jobs still running at shutdown, leaving them for recovery"
        );
    }

    served.map_err(WorkerError::from)
}

/// Prepare one quiz audio; returns the render URL
pub async fn process_quiz(config: Config, quiz_audio_id: i64, token: String) -> WorkerResult<String> {
    let core_api_config = config.core_api().ok_or_else(|| {
        WorkerError::Configuration("CORE_API_URL is required for process-quiz".to_string())
    })?;
    let core_api =
        CoreApiClient::with_timeout(&core_api_config.url, token, core_api_config.timeout_secs)?;

    let pipeline = QuizAudioPipeline::new(
        core_api,
        SourceResolver::new(config.deezer_api_url.clone())?,
        Downloader::new()?,
        build_separator(&config),
        Arc::new(FfmpegMixer::new(config.ffmpeg_path.clone())),
        build_storage(&config)?,
        config.separation_model.clone(),
    );

    pipeline.prepare(quiz_audio_id).await
}
