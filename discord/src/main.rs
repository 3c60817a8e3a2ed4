mod config;
mod dispatch;
mod format;
mod handle_events;
mod webhook;

use std::sync::Arc;

use config::Config;
use dispatch::{ChatSink, DiscordSink};
use models::Result;
use tokio::net::TcpListener;
use twilight_gateway::{CloseFrame, Intents, Shard, ShardId};
use twilight_http::Client;
use webhook::WebhookState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::load();
    config.validate()?;

    let http = Arc::new(Client::new(config.token.clone()));
    let sink: Arc<dyn ChatSink> = Arc::new(DiscordSink::new(Arc::clone(&http)));

    let state = Arc::new(WebhookState {
        auth_token: config.auth_token.clone(),
        channel_id: config.channel_id(),
        sink: Arc::clone(&sink),
    });

    let listener = TcpListener::bind(config.listen_addr.as_str()).await?;
    log::info!(
        "Listening for build webhooks on {}{}",
        listener.local_addr()?,
        webhook::BUILD_PATH
    );
    let server = tokio::spawn(async move {
        if let Err(e) = webhook::serve(listener, webhook::router(state)).await {
            log::error!("Webhook server failed: {}", e);
        }
    });

    let intents = Intents::GUILD_MESSAGES | Intents::DIRECT_MESSAGES | Intents::MESSAGE_CONTENT;
    let mut shard = Shard::new(ShardId::ONE, config.token.clone(), intents);

    log::info!("Bot is now running. Press CTRL-C to exit.");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let gateway_failed = tokio::select! {
        e = handle_events::handle_events(&mut shard, sink) => {
            log::error!("Events failed first {:?}", e);
            true
        },
        _ = &mut shutdown => false,
    };

    // The webhook relay stays up until we are told to stop.
    if gateway_failed {
        shutdown.await;
    }

    log::info!("Shutting down");
    if let Err(e) = shard.close(CloseFrame::NORMAL).await {
        log::warn!("Failed to close gateway connection: {}", e);
    }
    server.abort();

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to listen for SIGTERM: {}", e);
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
}
