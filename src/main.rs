use anyhow::Context;
use tracing_subscriber::EnvFilter;

use congestion_predictor::config::ServerConfig;
use congestion_predictor::http::{self, AppState};
use congestion_predictor::PredictionService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = ServerConfig::from_env().context("invalid configuration")?;

    let state = match PredictionService::load(&cfg.model_path, &cfg.encoders_path) {
        Ok(service) => {
            // Warmup: one forward pass on a fixed request
            let p = service.warmup().context("warmup prediction failed")?;
            tracing::info!("warmup ok: {} ({:.3})", p.level, p.confidence);
            AppState::loaded(service)
        }
        Err(e) if cfg.allow_missing_model => {
            tracing::error!("error loading model: {:#}", anyhow::Error::new(e));
            tracing::warn!("serving without a model; /predict will answer 503");
            AppState::unloaded()
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!(
                    "failed to load model artifacts ({}, {})",
                    cfg.model_path.display(),
                    cfg.encoders_path.display()
                )
            })
        }
    };

    let app = http::router(state, &cfg);

    let listener = tokio::net::TcpListener::bind((cfg.host.as_str(), cfg.port))
        .await
        .with_context(|| format!("failed to bind {}", cfg.bind_addr()))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
