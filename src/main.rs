use std::sync::Arc;

use tracing_subscriber::prelude::*;

use jobify_bot::bot::Bot;
use jobify_bot::channels::{ChannelManager, CliChannel, TelegramChannel};
use jobify_bot::config::BotConfig;
use jobify_bot::llm::{LlmConfig, LlmProvider, create_provider};
use jobify_bot::onboarding::{
    OnboardingDeps, OnboardingManager, OnboardingRouteState, onboarding_routes,
};
use jobify_bot::opportunities::ExpertsClient;
use jobify_bot::resume::DocumentReader;
use jobify_bot::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BotConfig::from_env();

    // Logs go to stderr (stdout belongs to the CLI channel), plus a daily
    // file when a log directory is configured.
    let (file_layer, _log_guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "jobify-bot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(file_layer)
        .init();

    eprintln!("🤖 Jobify Bot v{}", env!("CARGO_PKG_VERSION"));

    // ── LLM (optional) ──────────────────────────────────────────────────
    let llm: Option<Arc<dyn LlmProvider>> = match config.llm_api_key {
        Some(ref api_key) => {
            let llm_config = LlmConfig {
                backend: config.llm_backend,
                api_key: api_key.clone(),
                model: config.model.clone(),
            };
            match create_provider(&llm_config) {
                Ok(provider) => {
                    eprintln!("   Model: {}", config.model);
                    Some(provider)
                }
                Err(e) => {
                    eprintln!("   Model: unavailable ({e})");
                    None
                }
            }
        }
        None => {
            eprintln!("   Model: disabled (no API key; ask and resume backfill are off)");
            None
        }
    };

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Onboarding ───────────────────────────────────────────────────────
    let deps = OnboardingDeps {
        db,
        llm,
        search: Arc::new(ExpertsClient::new(
            config.opportunity_api_url.clone(),
            config.search_limit,
        )),
        documents: Arc::new(DocumentReader::new()),
    };
    let manager = Arc::new(OnboardingManager::new(
        deps,
        config.adapter_timeout,
        config.ask_prompt.clone(),
    ));
    eprintln!("   Opportunities: {}", config.opportunity_api_url);

    // ── REST ─────────────────────────────────────────────────────────────
    let app = onboarding_routes(OnboardingRouteState {
        manager: Arc::clone(&manager),
    })
    .layer(tower_http::cors::CorsLayer::permissive());
    let http_port = config.http_port;
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{http_port}")).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(port = http_port, "Failed to bind REST port: {e}");
                return;
            }
        };
        tracing::info!(port = http_port, "REST server started");
        axum::serve(listener, app).await.ok();
    });
    eprintln!("   REST: http://0.0.0.0:{http_port}/health");

    // ── Channels ─────────────────────────────────────────────────────────
    let mut channels = ChannelManager::new();
    let mut active_channels = Vec::new();

    if let Some(ref token) = config.telegram_token {
        eprintln!(
            "   Telegram: enabled (admins: {})",
            if config.admin_users.is_empty() {
                "none".to_string()
            } else {
                config.admin_users.join(", ")
            }
        );
        channels.add(Box::new(TelegramChannel::new(
            token.clone(),
            config.admin_users.clone(),
        )));
        active_channels.push("telegram");
    }

    if config.cli_enabled {
        channels.add(Box::new(CliChannel::new()));
        active_channels.push("cli");
    }

    eprintln!("   Channels: {}\n", active_channels.join(", "));

    Bot::new(manager, channels).run().await?;

    Ok(())
}
