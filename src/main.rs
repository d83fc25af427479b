use clap::{Parser, Subcommand};
use std::sync::Arc;
use tgram_api::{methods, HttpBotApi};
use tgram_core::config::{self, Config, GeneralConfig, BOT_TOKEN_ENV};
use tgram_core::traits::BotApi;
use tgram_updates::{Poller, PollerConfig, UpdateStream, WebhookReceiver};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "tgram",
    version,
    about = "Receive Telegram Bot API updates by long polling or webhook"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Long-poll getUpdates and print each update as a JSON line.
    Poll,
    /// Register a webhook, serve it, and print each update as a JSON line.
    Webhook,
    /// Show the effective configuration and the current webhook status.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _guard = init_logging(&cfg.tgram);

    match cli.command {
        Commands::Poll => {
            let api = connect(&cfg).await?;
            let stream = Poller::new(api, PollerConfig::from(&cfg.polling)).start();
            consume(stream).await?;
        }
        Commands::Webhook => {
            let api = connect(&cfg).await?;
            let stream = WebhookReceiver::new(api, cfg.webhook.clone())
                .start()
                .await?;
            consume(stream).await?;
        }
        Commands::Status => {
            println!("tgram status\n");
            println!("Config: {}", cli.config);
            println!(
                "  bot_token: {}",
                if cfg.api.bot_token.is_empty() {
                    "missing"
                } else {
                    "configured"
                }
            );
            println!("  api: {}", cfg.api.base_url);
            println!(
                "  polling: offset {}, limit {}, timeout {}s, backoff {:?}",
                cfg.polling.offset, cfg.polling.limit, cfg.polling.timeout, cfg.polling.backoff
            );
            println!(
                "  webhook: {} (listen {} on {}{})",
                if cfg.webhook.url.is_empty() {
                    "-"
                } else {
                    cfg.webhook.url.as_str()
                },
                cfg.webhook.listen_path,
                cfg.webhook.bind,
                if cfg.webhook.uses_tls() { ", tls" } else { "" }
            );
            if let Err(e) = cfg.validate() {
                println!("  invalid: {e}");
            }
            println!();

            if cfg.api.bot_token.is_empty() {
                return Ok(());
            }
            let api = HttpBotApi::new(&cfg.api)?;
            let info = methods::get_webhook_info(&api).await?;
            if info.is_set() {
                println!("  remote webhook: {}", info.url);
            } else {
                println!("  remote webhook: not set (getUpdates mode)");
            }
            println!("  pending updates: {}", info.pending_update_count);
            if let Some(ref msg) = info.last_error_message {
                println!("  last error: {msg}");
            }
        }
    }

    Ok(())
}

/// Console logging filtered by `RUST_LOG` or the configured level, plus a
/// daily log file when `log_dir` is set. The guard must outlive `main`.
fn init_logging(general: &GeneralConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&general.log_level));
    let console = fmt::layer().with_writer(std::io::stderr);

    if general.log_dir.is_empty() {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&general.log_dir, "tgram.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}

/// Validate the config and check the token with `getMe`.
async fn connect(cfg: &Config) -> anyhow::Result<Arc<dyn BotApi>> {
    cfg.validate()?;
    if cfg.api.bot_token.is_empty() {
        anyhow::bail!(
            "bot_token is empty. Set it in the config file or the {BOT_TOKEN_ENV} env var."
        );
    }

    let api: Arc<dyn BotApi> = Arc::new(HttpBotApi::new(&cfg.api)?);
    let me = methods::get_me(api.as_ref()).await?;
    info!(
        "connected as @{} ({})",
        me.username.as_deref().unwrap_or("?"),
        me.id
    );
    Ok(api)
}

/// Print updates as JSON lines until the stream ends. Ctrl-C stops the producer.
async fn consume(mut stream: UpdateStream) -> anyhow::Result<()> {
    let stopper = stream.stopper();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C, shutting down");
        } else {
            warn!("cannot listen for Ctrl-C, stopping");
        }
        stopper.trigger();
    });

    while let Some(update) = stream.recv().await {
        println!("{}", serde_json::to_string(&update)?);
    }

    info!("update stream ended");
    Ok(())
}
