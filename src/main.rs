use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dotenvy::dotenv;
use reqwest::Client;
use tracing::info;

mod cache;
mod config;
mod handlers;
mod llm;
mod models;
mod pipeline;
mod state;
mod utils;

use cache::{spawn_cache_sweeper, ResponseCache};
use config::{Config, ImagePromptStyle, ProviderKind};
use handlers::{build_cors_layer, build_router};
use llm::{
    GeminiImageProvider, GeminiTextProvider, ImageProvider, OpenAiChatProvider,
    OpenAiImageProvider, TextProvider,
};
use state::AppState;
use utils::http::build_http_client;
use utils::logging::init_logging;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_text_provider(config: &Config, client: Client) -> Arc<dyn TextProvider> {
    match config.text_provider {
        ProviderKind::OpenAi => Arc::new(OpenAiChatProvider::new(
            client,
            &config.openai_base_url,
            &config.openai_api_key,
            &config.openai_text_model,
            config.text_temperature,
            config.text_max_output_tokens,
            config.provider_timeout(),
        )),
        ProviderKind::Gemini => Arc::new(GeminiTextProvider::new(
            client,
            &config.gemini_base_url,
            &config.gemini_api_key,
            &config.gemini_model,
            config.text_temperature,
            config.text_max_output_tokens,
            config.provider_timeout(),
        )),
    }
}

fn build_image_provider(config: &Config, client: Client) -> Arc<dyn ImageProvider> {
    match config.image_provider {
        ProviderKind::OpenAi => Arc::new(OpenAiImageProvider::new(
            client,
            &config.openai_base_url,
            &config.openai_api_key,
            &config.openai_image_model,
            &config.image_size,
            config.provider_timeout(),
        )),
        ProviderKind::Gemini => Arc::new(GeminiImageProvider::new(
            client,
            &config.gemini_base_url,
            &config.gemini_api_key,
            &config.gemini_image_model,
            &config.image_size,
            config.provider_timeout(),
        )),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
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
    info!("Shutdown signal received; draining in-flight requests");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::load()?;
    let _guards = init_logging(&config)?;
    config.validate()?;

    let client = build_http_client(CONNECT_TIMEOUT).context("Failed to build HTTP client")?;
    let text_provider = build_text_provider(&config, client.clone());
    let image_provider = build_image_provider(&config, client);

    let prompt_style = config.image_prompt_style();
    if prompt_style == ImagePromptStyle::Basic {
        tracing::warn!("IMAGE_PROMPT_STYLE=basic is deprecated; prompts only use hair and skin");
    }

    let cache = Arc::new(ResponseCache::new(config.cache_ttl()));
    spawn_cache_sweeper(
        cache.clone(),
        Duration::from_secs(config.cache_sweep_interval_seconds),
    );

    info!(
        "Text provider: {} ({}), image provider: {} ({}), cache TTL {}s",
        text_provider.name(),
        text_provider.model(),
        image_provider.name(),
        image_provider.model(),
        cache.ttl().as_secs()
    );

    let state = AppState::new(
        cache,
        text_provider,
        image_provider,
        prompt_style,
    );
    let router = build_router(state, build_cors_layer(&config.cors_allowed_origins));

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}
