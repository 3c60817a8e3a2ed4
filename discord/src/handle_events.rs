use std::sync::Arc;

use models::Result;
use twilight_gateway::{Event as GatewayEvent, Shard};
use twilight_model::gateway::payload::outgoing::UpdatePresence;
use twilight_model::gateway::presence::{Activity, ActivityType, MinimalActivity, Status};
use twilight_model::id::{
    marker::{ChannelMarker, UserMarker},
    Id,
};

use crate::dispatch::ChatSink;

const STATUS: &str = "Build watchin'";

pub async fn handle_events(shard: &mut Shard, sink: Arc<dyn ChatSink>) -> Result<()> {
    let mut self_id: Option<Id<UserMarker>> = None;

    loop {
        let event = match shard.next_event().await {
            Ok(event) => event,
            Err(source) => {
                log::warn!("error receiving event: {}", source);

                if source.is_fatal() {
                    return Err(source.into());
                }

                continue;
            }
        };

        match event {
            GatewayEvent::Ready(ready) => {
                log::info!("Connected to Discord as {}", ready.user.name);
                self_id = Some(ready.user.id);

                if let Err(e) = set_status(shard).await {
                    log::warn!("Failed to update presence: {}", e);
                }
            }
            GatewayEvent::MessageCreate(msg) => {
                let sink = Arc::clone(&sink);
                tokio::spawn(async move {
                    if let Err(e) =
                        on_message(&*sink, self_id, msg.author.id, msg.channel_id, &msg.content)
                            .await
                    {
                        log::error!("Failed to execute message_create handler: {}", e);
                    }
                });
            }
            _ => {}
        }
    }
}

async fn set_status(shard: &mut Shard) -> Result<()> {
    let activity = Activity::from(MinimalActivity {
        kind: ActivityType::Playing,
        name: STATUS.to_string(),
        url: None,
    });
    let presence = UpdatePresence::new(vec![activity], false, None::<u64>, Status::Online)?;
    shard.command(&presence).await?;
    Ok(())
}

pub async fn on_message(
    sink: &dyn ChatSink,
    self_id: Option<Id<UserMarker>>,
    author_id: Id<UserMarker>,
    channel_id: Id<ChannelMarker>,
    content: &str,
) -> Result<()> {
    if let Some(reply) = reply_for(self_id, author_id, content) {
        sink.send_text(channel_id, reply).await?;
    }
    Ok(())
}

pub fn reply_for(
    self_id: Option<Id<UserMarker>>,
    author_id: Id<UserMarker>,
    content: &str,
) -> Option<&'static str> {
    if self_id == Some(author_id) {
        return None;
    }

    (content.to_lowercase() == "ping").then_some("Pong!")
}
