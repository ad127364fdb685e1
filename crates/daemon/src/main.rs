//! Surge - Demo Entry Point
//! Wires one container to a few producers and a slow consumer, then reports
//! how the worker pool grows and shrinks until Ctrl+C.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use surge_core::port::{json_marshal, json_unmarshal, ListBackend};
use surge_core::settings::{load_settings, ContainerSettings};
use surge_core::{new_container, Container, ContainerConfig, ContainerKind, Envelope};
use surge_infra_redis::RedisListBackend;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const PRODUCERS: usize = 4;
const MESSAGES_PER_PRODUCER: usize = 50;
const CONSUME_DELAY: Duration = Duration::from_millis(20);
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let log_format = std::env::var("SURGE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("surge=info"))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("Surge demo v{} starting...", VERSION);

    // 2. Load configuration
    let config_path = std::env::var("SURGE_CONFIG").ok().map(PathBuf::from);
    let settings = load_settings(config_path.as_deref())?;
    // Every Nth message panics the consumer (0 = never)
    let panic_every: u64 = std::env::var("SURGE_DEMO_PANIC_EVERY")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    info!(kind = %settings.kind, msg_len = settings.msg_len, "Settings loaded");

    // 3. Build container
    let consumed = Arc::new(AtomicU64::new(0));
    let container = build_container(&settings, consumed.clone(), panic_every).await?;

    // 4. Start the permanent worker
    container.consume().await?;

    // 5. Start producers
    for producer in 0..PRODUCERS {
        let container = container.clone();
        tokio::spawn(async move {
            for n in 0..MESSAGES_PER_PRODUCER {
                let id = format!("p{producer}-m{n}");
                let msg = match Envelope::new(id, serde_json::json!({ "producer": producer, "seq": n })) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "Skipping invalid message");
                        continue;
                    }
                };
                if let Err(e) = container.produce(msg).await {
                    warn!(producer, error = %e, "Produce failed");
                }
            }
            info!(producer, "Producer finished");
        });
    }

    // 6. Report worker counts until shutdown
    info!("Press Ctrl+C to shutdown");
    let mut ticker = tokio::time::interval(REPORT_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let counts = container.worker_counts();
                info!(
                    permanent = counts.permanent,
                    transient = counts.transient,
                    consumed = consumed.load(Ordering::Relaxed),
                    restarts = container.restarts(),
                    "Worker counts"
                );
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
        }
    }

    info!(
        consumed = consumed.load(Ordering::Relaxed),
        "Shutdown signal received. Exiting."
    );
    Ok(())
}

async fn build_container(
    settings: &ContainerSettings,
    consumed: Arc<AtomicU64>,
    panic_every: u64,
) -> Result<Arc<dyn Container<Envelope>>> {
    let mut config = ContainerConfig::<Envelope>::from_settings(settings)?.with_consumer(
        move |msg: Envelope| {
            std::thread::sleep(CONSUME_DELAY);
            let n = consumed.fetch_add(1, Ordering::Relaxed) + 1;
            if panic_every > 0 && n % panic_every == 0 {
                panic!("demo consumer failure on {}", msg.id);
            }
        },
    );

    if config.kind == ContainerKind::Cache {
        let url = settings
            .redis_url
            .as_deref()
            .context("redis_url is required for a cache container")?;
        let backend: Arc<dyn ListBackend> = Arc::new(
            RedisListBackend::connect(url)
                .await
                .with_context(|| format!("Failed to connect to {url}"))?,
        );
        config = config
            .with_backend(backend)
            .with_codec(json_marshal(), json_unmarshal());
    }

    Ok(new_container(config)?)
}
