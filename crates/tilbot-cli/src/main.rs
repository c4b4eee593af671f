use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tilbot_cli::{health, Bot, TelegramClient};
use tilbot_core::history::spawn_periodic_flush;
use tilbot_core::{
    AuditLog, CompletionClient, HistoryStore, OpenAIClient, Orchestrator, Secrets, Settings,
};

#[derive(Parser)]
#[command(name = "tilbot")]
#[command(about = "Tilbot - Kazakh/Russian Telegram assistant backed by a chat-completion API")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// History snapshot file
    #[arg(long)]
    memory: Option<PathBuf>,

    /// Address for the liveness endpoint
    #[arg(long)]
    bind: Option<String>,

    /// Do not serve the liveness endpoint
    #[arg(long)]
    no_health: bool,

    /// Try this model first, ahead of the configured roster
    #[arg(short, long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::load(),
    };
    apply_overrides(&mut settings, &cli);
    settings.validate()?;

    let secrets = Secrets::load(&settings.secrets_path);
    let token = secrets
        .require_telegram_token()
        .map_err(|e| {
            error!("{}", e);
            e
        })?
        .to_string();
    let api_key = secrets.groq_api_key.clone().unwrap_or_else(|| {
        warn!("GROQ_API_KEY is not set; every question will get a fallback reply");
        String::new()
    });

    let store = Arc::new(HistoryStore::from_settings(&settings.history));
    let llm = OpenAIClient::new(api_key).with_base_url(settings.llm.base_url.clone());
    let completion = Arc::new(CompletionClient::from_settings(Box::new(llm), &settings.llm)?);
    let audit = Arc::new(AuditLog::new(&settings.audit.path));
    let orchestrator = Arc::new(
        Orchestrator::new(Arc::clone(&store), completion)
            .with_settings(settings.conversation.clone())
            .with_history_settings(&settings.history)
            .with_audit_log(Arc::clone(&audit)),
    );

    info!("Tilbot starting");
    info!("Models: {}", settings.llm.models.join(", "));
    info!(
        "History: {} ({} exchanges from {} users)",
        settings.history.path.display(),
        store.total_exchanges(),
        store.user_count()
    );
    info!("Audit log: {}", settings.audit.path.display());

    let flusher = spawn_periodic_flush(Arc::clone(&store), settings.history.flush_interval());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let health_task = if settings.health.enabled {
        let bind = settings.health.bind.clone();
        let mut rx = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let stop = async move {
                let _ = rx.wait_for(|stopping| *stopping).await;
            };
            if let Err(e) = health::serve(&bind, stop).await {
                error!("Health endpoint on {} failed: {}", bind, e);
            }
        }))
    } else {
        None
    };

    let telegram = TelegramClient::new(token).with_base_url(settings.telegram.base_url.clone());
    let bot = Bot::new(Arc::new(telegram), orchestrator)
        .with_audit_log(audit)
        .with_poll_timeout(settings.telegram.poll_timeout_secs);
    bot.run(shutdown_rx).await;

    flusher.abort();
    if let Some(task) = health_task {
        let _ = task.await;
    }

    let final_store = Arc::clone(&store);
    match tokio::task::spawn_blocking(move || final_store.flush_all()).await {
        Ok(Ok(())) => info!("Saved history for {} users", store.user_count()),
        Ok(Err(e)) => error!("Final history save failed: {}", e),
        Err(e) => error!("Final history save task failed: {}", e),
    }

    info!("Shutdown complete");
    Ok(())
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(path) = &cli.memory {
        settings.history.path = path.clone();
    }
    if let Some(bind) = &cli.bind {
        settings.health.bind = bind.clone();
    }
    if cli.no_health {
        settings.health.enabled = false;
    }
    if let Some(model) = &cli.model {
        settings.llm.models.retain(|m| m != model);
        settings.llm.models.insert(0, model.clone());
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
