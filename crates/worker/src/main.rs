//! Worker binary: constructs every collaborator explicitly and runs the
//! queue dispatcher plus the periodic cleanup sweep until shutdown.

use std::sync::Arc;
use std::time::Duration;

use songforge_core::config::{Config, ProviderConfig};
use songforge_pipeline::cleanup::CleanupHandler;
use songforge_pipeline::download::DownloadHandler;
use songforge_pipeline::generate::GenerationHandler;
use songforge_pipeline::queue::{JobQueue, PgJobQueue};
use songforge_pipeline::storage::{ObjectStorage, S3Storage};
use songforge_pipeline::trace::{HttpCollector, NoopCollector, TraceCollector};
use songforge_provider::chain::ProviderChain;
use songforge_provider::mock::MockProvider;
use songforge_provider::mureka::MurekaApi;
use songforge_provider::suno::SunoApi;
use songforge_provider::{mureka, suno, MusicProvider};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod dispatch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "songforge_worker=debug,songforge_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = songforge_db::create_pool(&config.database_url).await?;
    songforge_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    songforge_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let storage: Arc<dyn ObjectStorage> = Arc::new(S3Storage::from_config(&config.storage).await);
    let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(pool.clone()));
    let collector: Arc<dyn TraceCollector> = match &config.trace.endpoint {
        Some(endpoint) => Arc::new(HttpCollector::new(
            endpoint.clone(),
            config.trace.api_key.clone(),
        )),
        None => Arc::new(NoopCollector),
    };
    let chain = Arc::new(build_chain(&config.provider));

    let generation = Arc::new(GenerationHandler::new(
        pool.clone(),
        chain,
        queue.clone(),
        collector.clone(),
        config.storage.clone(),
    ));
    let download = Arc::new(DownloadHandler::new(pool.clone(), storage.clone()));
    let cleanup = Arc::new(CleanupHandler::new(pool.clone(), storage.clone()));

    let shutdown = CancellationToken::new();
    let dispatcher = dispatch::Dispatcher::new(
        pool.clone(),
        generation,
        download,
        config.worker_concurrency,
        shutdown.clone(),
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run());
    let cleanup_handle = tokio::spawn(cleanup_loop(
        cleanup,
        config.cleanup_interval_secs,
        shutdown.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, draining workers");
    shutdown.cancel();
    let _ = dispatcher_handle.await;
    let _ = cleanup_handle.await;

    tracing::info!("Worker stopped");
    Ok(())
}

/// Build the provider chain from configuration.
///
/// A missing vendor credential selects the mock provider under the same
/// name, so the rest of the pipeline is oblivious to mock mode. With
/// fallback disabled only the primary adapter is used.
fn build_chain(config: &ProviderConfig) -> ProviderChain {
    let primary: Arc<dyn MusicProvider> = match &config.suno_api_key {
        Some(key) => Arc::new(SunoApi::new(config.suno_base_url.clone(), key.clone())),
        None => {
            tracing::warn!("SUNO_API_KEY not set, using the mock provider");
            Arc::new(MockProvider::new(suno::PROVIDER_NAME))
        }
    };

    if !config.enable_fallback {
        return ProviderChain::single(primary);
    }

    let legacy: Arc<dyn MusicProvider> = match &config.mureka_api_key {
        Some(key) => Arc::new(MurekaApi::new(config.mureka_base_url.clone(), key.clone())),
        None => {
            tracing::warn!("MUREKA_API_KEY not set, using the mock provider as fallback");
            Arc::new(MockProvider::new(mureka::PROVIDER_NAME))
        }
    };

    ProviderChain::new(
        vec![primary, legacy],
        config.submit_max_retries,
        Duration::from_millis(config.submit_backoff_ms),
    )
}

/// Run the cleanup sweep on a fixed interval until shutdown.
async fn cleanup_loop(
    handler: Arc<CleanupHandler>,
    interval_secs: u64,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(60)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = handler.run().await {
                    tracing::error!(error = %e, "Cleanup sweep failed");
                }
            }
        }
    }
}
