use std::sync::Arc;

use futures::future::BoxFuture;
use models::Result;
use twilight_http::Client;
use twilight_model::channel::message::Embed;
use twilight_model::id::{marker::ChannelMarker, Id};

/// The slice of the chat platform the relay and the bot need.
pub trait ChatSink: Send + Sync {
    fn send_embed(&self, channel_id: Id<ChannelMarker>, embed: Embed) -> BoxFuture<'_, Result<()>>;

    fn send_text<'a>(
        &'a self,
        channel_id: Id<ChannelMarker>,
        content: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

pub struct DiscordSink {
    http: Arc<Client>,
}

impl DiscordSink {
    pub fn new(http: Arc<Client>) -> Self {
        Self { http }
    }
}

impl ChatSink for DiscordSink {
    fn send_embed(&self, channel_id: Id<ChannelMarker>, embed: Embed) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let embeds = [embed];
            self.http.create_message(channel_id).embeds(&embeds)?.await?;
            Ok(())
        })
    }

    fn send_text<'a>(
        &'a self,
        channel_id: Id<ChannelMarker>,
        content: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.http.create_message(channel_id).content(content)?.await?;
            Ok(())
        })
    }
}

/// Sends every embed to the channel, one message each, in order.
/// Failures are logged and do not stop the remaining sends.
pub async fn relay(sink: &dyn ChatSink, channel_id: Id<ChannelMarker>, embeds: Vec<Embed>) {
    for embed in embeds {
        if let Err(e) = sink.send_embed(channel_id, embed).await {
            log::warn!("Failed to send build embed to {}: {}", channel_id, e);
        }
    }
}
