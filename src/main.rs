use anyhow::{Context, Result};
use clap::Parser;
use encounter_scribe::{create_router, AppState, Config, SessionStore, WhisperTranscriber};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "encounter-scribe", about = "Clinical encounter transcription service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/encounter-scribe")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Encounter Scribe v0.1.0");
    info!("Loaded config: {}", cfg.service.name);

    let api_key = std::env::var(&cfg.transcription.api_key_env).with_context(|| {
        format!(
            "Missing {}. Configure the transcription API key.",
            cfg.transcription.api_key_env
        )
    })?;

    let transcriber = Arc::new(WhisperTranscriber::new(
        cfg.transcription.endpoint.clone(),
        api_key,
        cfg.transcription.model.clone(),
    ));

    let store = SessionStore::new();
    spawn_eviction_sweep(
        store.clone(),
        Duration::from_secs(cfg.session.sweep_interval_minutes * 60),
        Duration::from_secs(cfg.session.idle_eviction_minutes * 60),
    );

    let state = AppState::new(store, transcriber);
    let router = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router)
        .await
        .context("HTTP server failed")?;

    Ok(())
}

/// Periodically remove sessions nobody is watching or mutating. Sessions
/// are otherwise never evicted and a long-running process would leak them.
fn spawn_eviction_sweep(store: SessionStore, interval: Duration, max_idle: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(max_idle);
            if evicted > 0 {
                info!("Eviction sweep removed {} idle sessions", evicted);
            }
        }
    });
}
