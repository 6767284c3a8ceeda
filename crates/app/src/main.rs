use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use feedpulse_config::AppConfig;
use feedpulse_digest::{
    Cadence, ConsoleSink, DigestGenerator, DigestSink, spawn_all_cadence_tasks,
};
use feedpulse_ingress::IngressState;
use feedpulse_llm::{DeepSeekClient, DeepSeekConfig};
use feedpulse_store::{EventStore, WatermarkTracker};
use feedpulse_telegram::TelegramNotifier;

#[derive(Debug, Parser)]
#[command(
    name = "feedpulse",
    version,
    about = "Webhook-fed Twitter activity digests"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "feedpulse.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the webhook listener and all four digest cadences.
    Serve,
    /// Generate one digest for a single cadence and print it.
    Digest {
        #[arg(long, value_enum)]
        cadence: CliCadence,
    },
    /// Write a config file populated with defaults.
    Init,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCadence {
    #[value(name = "5min")]
    FiveMin,
    #[value(name = "1hour")]
    Hourly,
    #[value(name = "6hour")]
    SixHour,
    #[value(name = "24hour")]
    Daily,
}

impl From<CliCadence> for Cadence {
    fn from(value: CliCadence) -> Self {
        match value {
            CliCadence::FiveMin => Cadence::FiveMin,
            CliCadence::Hourly => Cadence::Hourly,
            CliCadence::SixHour => Cadence::SixHour,
            CliCadence::Daily => Cadence::Daily,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    // Keep the file-writer guard alive for the process lifetime.
    let _log_guard = init_tracing(&config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Digest { cadence } => digest_once(config, cadence.into()).await,
        Commands::Init => {
            config.save_to(&cli.config)?;
            println!("wrote {}", cli.config.display());
            Ok(())
        }
    }
}

fn init_tracing(config: &AppConfig) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.telemetry.log_level.clone()));
    let stdout_layer = tracing_subscriber::fmt::layer();

    if config.telemetry.log_dir.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&config.telemetry.log_dir, "feedpulse.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false);
    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(Some(guard))
}

/// The summarizer credential is required up front; a service that cannot
/// summarize should refuse to start rather than fail on the first timer.
fn build_summarizer(config: &AppConfig) -> Result<DeepSeekClient> {
    let api_key = match std::env::var("DEEPSEEK_API_KEY") {
        Ok(key) => key,
        Err(_) => bail!("DEEPSEEK_API_KEY environment variable is not set"),
    };
    DeepSeekClient::new(DeepSeekConfig {
        api_key,
        base_url: config.summarizer.base_url.clone(),
        model: config.summarizer.model.clone(),
        temperature: config.summarizer.temperature,
        timeout: Duration::from_secs(config.summarizer.timeout_secs),
    })
}

fn build_generator(config: &AppConfig, store: Arc<EventStore>) -> Result<Arc<DigestGenerator>> {
    let client = build_summarizer(config)?;
    let watermarks = WatermarkTracker::load(
        &config.store.watermarks_path,
        &Cadence::labels(),
        Utc::now(),
    )?;
    Ok(Arc::new(DigestGenerator::new(
        store,
        Arc::new(watermarks),
        Arc::new(client),
    )))
}

fn build_sinks(config: &AppConfig) -> Arc<Vec<Arc<dyn DigestSink>>> {
    let mut sinks: Vec<Arc<dyn DigestSink>> = vec![Arc::new(ConsoleSink)];
    if config.telegram.enabled {
        match TelegramNotifier::from_env() {
            Ok(notifier) => {
                info!("telegram delivery enabled");
                sinks.push(Arc::new(notifier));
            }
            Err(err) => {
                warn!(error = %err, "telegram delivery disabled");
            }
        }
    } else {
        info!("telegram delivery disabled by config");
    }
    Arc::new(sinks)
}

async fn serve(config: AppConfig) -> Result<()> {
    let store = Arc::new(EventStore::open(&config.store.events_path)?);
    let generator = build_generator(&config, store.clone())?;
    let sinks = build_sinks(&config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cadence_tasks = spawn_all_cadence_tasks(&config.digest, generator, sinks, &shutdown_tx);

    let bind = config.server.bind.clone();
    let mut server = tokio::spawn(async move {
        feedpulse_ingress::serve(&bind, IngressState { store }, shutdown_rx).await
    });

    // An early listener exit (bind failure, socket error) must tear the
    // process down rather than sit unnoticed behind the signal wait.
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("shutdown signal received");
        }
        result = &mut server => {
            error!("webhook listener exited before shutdown");
            let _ = shutdown_tx.send(true);
            for task in cadence_tasks {
                let _ = task.await;
            }
            return result?.context("webhook listener failed");
        }
    }

    let _ = shutdown_tx.send(true);
    for task in cadence_tasks {
        let _ = task.await;
    }
    server.await??;
    info!("feedpulse stopped");
    Ok(())
}

async fn digest_once(config: AppConfig, cadence: Cadence) -> Result<()> {
    let store = Arc::new(EventStore::open(&config.store.events_path)?);
    let generator = build_generator(&config, store)?;
    let summary = generator.summarize(cadence).await;
    ConsoleSink.deliver(cadence, &summary).await?;
    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────────────
