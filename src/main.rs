mod cache;
mod chat;
mod config;
mod error;
mod fetcher;
mod handlers;
mod llm;
mod metrics;
mod models;
mod prompts;
mod rate_limit;
mod state;
#[cfg(test)]
mod test_support;

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::chat::ChatService;
use crate::config::{Args, Command, Config, ConfigError};
use crate::fetcher::{UrlFetcher, refresh_loop};
use crate::llm::GeminiProvider;
use crate::prompts::{PromptBuilder, REDIRECT_LINKS};
use crate::rate_limit::RetryPolicy;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env first so clap's env fallbacks can see it
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json);

    let command = args.command.unwrap_or(Command::Serve);
    let config = Config::from_args(&args, command == Command::Serve)?;

    match command {
        Command::Serve => serve(config).await,
        Command::Fetch => fetch(config).await,
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!("WARN: log level '{log_level}' is not a valid filter ({e}); falling back to 'info'");
                EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(true);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let llm = config.llm.as_ref().ok_or(ConfigError::MissingApiKey)?;

    let cache = cache::connect_with_fallback(&config.database).await?;
    let provider = Arc::new(GeminiProvider::new(llm)?);
    let chat = ChatService::new(
        cache.clone(),
        provider,
        PromptBuilder::new(&config.prompt),
        RetryPolicy::from_config(llm),
    );

    // spawn the background refresher
    if let Some(every) = config.fetch.refresh_interval {
        let fetcher = Arc::new(UrlFetcher::new(REDIRECT_LINKS, config.fetch.timeout));
        tokio::spawn(refresh_loop(fetcher, cache.clone(), every));
    }

    let state = Arc::new(AppState {
        chat,
        static_dir: config.server.static_dir.clone(),
        index_file: config.server.index_file.clone(),
    });
    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "monk gateway listening");
    info!(model = %llm.model, timeout_secs = llm.timeout.as_secs(), "LLM provider: gemini");
    info!(
        persona = ?config.prompt.persona,
        empty_content = ?config.prompt.empty_content,
        "prompt mode"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("monk gateway stopped");
    Ok(())
}

async fn fetch(config: Config) -> anyhow::Result<()> {
    let cache = cache::connect_with_fallback(&config.database).await?;
    let fetcher = UrlFetcher::new(REDIRECT_LINKS, config.fetch.timeout);
    let report = fetcher.run(cache.as_ref()).await;
    if report.cached == 0 {
        warn!(failed = report.failed, "no URL could be cached");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
