use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use models::{Attachment, BuildNotification};
use twilight_model::channel::message::Embed;
use twilight_model::util::Timestamp;
use twilight_util::builder::embed::{
    EmbedAuthorBuilder, EmbedBuilder, EmbedFieldBuilder, ImageSource,
};

pub const DANGER_COLOR: u32 = 14375008;
pub const GOOD_COLOR: u32 = 5875817;
pub const DEFAULT_COLOR: u32 = 14408667;

pub fn color_for(tag: &str) -> u32 {
    match tag {
        "danger" => DANGER_COLOR,
        "good" => GOOD_COLOR,
        _ => DEFAULT_COLOR,
    }
}

/// Current wall clock time as an embed timestamp.
pub fn now() -> Option<Timestamp> {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    Timestamp::from_secs(i64::try_from(secs).ok()?).ok()
}

/// Builds one embed per attachment, in payload order.
pub fn format_notification(
    notification: &BuildNotification,
    timestamp: Option<Timestamp>,
) -> Vec<Embed> {
    notification
        .attachments
        .iter()
        .map(|attachment| format_attachment(notification, attachment, timestamp))
        .collect()
}

fn format_attachment(
    notification: &BuildNotification,
    attachment: &Attachment,
    timestamp: Option<Timestamp>,
) -> Embed {
    let mut embed = EmbedBuilder::new()
        .color(color_for(&attachment.color))
        .title(attachment.fallback.clone());

    if !notification.username.is_empty() {
        embed = embed.author(EmbedAuthorBuilder::new(notification.username.clone()));
    }

    match ImageSource::url(notification.icon_url.clone()) {
        Ok(thumbnail) => embed = embed.thumbnail(thumbnail),
        Err(_) => log::debug!("Skipping thumbnail {:?}", notification.icon_url),
    }

    if let Some(timestamp) = timestamp {
        embed = embed.timestamp(timestamp);
    }

    for field in &attachment.fields {
        let mut builder =
            EmbedFieldBuilder::new(field.title.clone(), encode_link_spaces(&field.value));
        if field.short {
            builder = builder.inline();
        }
        embed = embed.field(builder);
    }

    embed.build()
}

/// Percent-encodes spaces in the URL half of a `[text](url)` field value.
///
/// Values without `://` are not links and are returned untouched, as are
/// values with no `]` to split on.
pub fn encode_link_spaces(value: &str) -> Cow<'_, str> {
    if !value.contains("://") {
        return Cow::Borrowed(value);
    }

    match value.find(']') {
        Some(idx) => {
            let (text, link) = value.split_at(idx + 1);
            if link.contains(' ') {
                Cow::Owned(format!("{}{}", text, link.replace(' ', "%20")))
            } else {
                Cow::Borrowed(value)
            }
        }
        None => Cow::Borrowed(value),
    }
}
