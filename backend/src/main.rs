use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use rolegate_backend::bot::{CommandHandler, GatewayClient};
use rolegate_backend::config::Config;
use rolegate_backend::logging::init_tracing;
use rolegate_backend::platform::{DiscordHttp, DiscordPlatform, GuildCache};
use rolegate_backend::{routes, AppState};

fn configured(value: bool) -> &'static str {
    if value {
        "set"
    } else {
        "not set"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    init_tracing(&config.logging.level);

    tracing::info!("Starting RoleGate");
    tracing::info!("oauth.client_id: {}", configured(!config.oauth.client_id.is_empty()));
    tracing::info!("oauth.client_secret: {}", configured(!config.oauth.client_secret.is_empty()));
    tracing::info!("bot.token: {}", configured(config.bot.is_enabled()));
    tracing::info!("oauth.redirect_uri: {}", config.oauth.redirect_uri);
    if config.admin.username.is_none() || config.admin.password.is_none() {
        tracing::warn!("Admin credentials are not configured; /admin will reject every request");
    }

    // Platform: gateway-fed cache for lookups, REST for mutations
    let cache = Arc::new(GuildCache::new());
    let http = Arc::new(DiscordHttp::new(
        &config.oauth.api_base,
        config.bot.token.as_deref(),
    ));
    let platform = Arc::new(DiscordPlatform::new(http.clone(), cache.clone()));

    let state = Arc::new(AppState::new(config.clone(), platform)?);

    match config.bot.token.clone().filter(|_| config.bot.is_enabled()) {
        Some(token) => {
            let commands = Arc::new(CommandHandler::new(
                http,
                state.assigner.clone(),
                state.directory.clone(),
                config.bot.command_prefix.clone(),
                format!("{}/login", config.oauth.site_url()),
            ));
            let client = GatewayClient::new(
                config.bot.gateway_url.clone(),
                token,
                Duration::from_secs(config.bot.reconnect_delay_secs),
                cache,
                state.assigner.clone(),
                commands,
            );
            tokio::spawn(async move { client.run().await });
        }
        None => {
            tracing::warn!("Bot disabled: bot.token is not set, roles cannot be granted");
        }
    }

    let app = routes::router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
