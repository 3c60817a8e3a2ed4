use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use models::{BuildNotification, Result};
use tokio::net::TcpListener;
use twilight_model::id::{marker::ChannelMarker, Id};

use crate::dispatch::{relay, ChatSink};
use crate::format::{self, format_notification};

pub const BUILD_PATH: &str = "/build";

pub struct WebhookState {
    pub auth_token: String,
    pub channel_id: Option<Id<ChannelMarker>>,
    pub sink: Arc<dyn ChatSink>,
}

pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(BUILD_PATH, any(handle_build))
        .fallback(not_found)
        .with_state(state)
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(listener, app).await?;
    Ok(())
}

async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "404 not found")
}

async fn handle_build(
    State(state): State<Arc<WebhookState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if auth != format!("Bearer {}", state.auth_token) {
        log::warn!("Rejected {} {} with a bad bearer token", method, BUILD_PATH);
        return (StatusCode::UNAUTHORIZED, "Unauthorised").into_response();
    }

    if method != Method::POST {
        return "Only POST is supported\n".into_response();
    }

    let notification: BuildNotification = match serde_json::from_slice(&body) {
        Ok(notification) => notification,
        Err(e) => {
            log::warn!("Failed to decode POST to struct: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid build payload").into_response();
        }
    };

    log::debug!(
        "Build notification from {:?} with {} attachments",
        notification.username,
        notification.attachments.len()
    );

    let embeds = format_notification(&notification, format::now());

    match state.channel_id {
        Some(channel_id) => relay(&*state.sink, channel_id, embeds).await,
        None => log::warn!("No main channel configured, dropping {} embeds", embeds.len()),
    }

    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::testing::{RecordingSink, Sent};
    use crate::format::GOOD_COLOR;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    const CHANNEL: Id<ChannelMarker> = Id::new(99);

    fn app(sink: &Arc<RecordingSink>) -> Router {
        let sink: Arc<dyn ChatSink> = Arc::clone(sink) as Arc<dyn ChatSink>;
        router(Arc::new(WebhookState {
            auth_token: "secret".to_string(),
            channel_id: Some(CHANNEL),
            sink,
        }))
    }

    fn request(method: &str, uri: &str, auth: Option<&str>, body: String) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header("Authorization", auth);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn payload() -> String {
        json!({
            "username": "TeamCity",
            "icon_url": "https://example.com/tc.png",
            "attachments": [{
                "title": "Build",
                "fallback": "Project :: Build #7 passed",
                "color": "good",
                "fields": [
                    {"title": "Branch", "value": "main", "short": true},
                    {"title": "Changes", "value": "[view](https://ci.local/changes list)"}
                ]
            }]
        })
        .to_string()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_valid_post_dispatches_one_embed() {
        let sink = Arc::new(RecordingSink::default());

        let response = app(&sink)
            .oneshot(request("POST", "/build", Some("Bearer secret"), payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let sent = sink.sent().await;
        assert_eq!(sent.len(), 1);
        let Sent::Embed(channel, embed) = &sent[0] else {
            panic!("expected an embed, got {:?}", sent[0]);
        };
        assert_eq!(*channel, CHANNEL);
        assert_eq!(embed.color, Some(GOOD_COLOR));
        assert_eq!(embed.title.as_deref(), Some("Project :: Build #7 passed"));
        assert!(embed.timestamp.is_some());
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[0].name, "Branch");
        assert!(embed.fields[0].inline);
        assert_eq!(embed.fields[1].name, "Changes");
        assert_eq!(embed.fields[1].value, "[view](https://ci.local/changes%20list)");
        assert!(!embed.fields[1].inline);
    }

    #[tokio::test]
    async fn test_missing_auth_is_unauthorised() {
        let sink = Arc::new(RecordingSink::default());

        let response = app(&sink)
            .oneshot(request("POST", "/build", None, payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_token_is_unauthorised() {
        let sink = Arc::new(RecordingSink::default());

        for auth in ["Bearer wrong", "secret", "bearer secret", "Bearer secret "] {
            let response = app(&sink)
                .oneshot(request("POST", "/build", Some(auth), payload()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", auth);
        }

        assert!(sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_post_is_rejected_politely() {
        let sink = Arc::new(RecordingSink::default());

        for method in ["GET", "PUT", "DELETE"] {
            let response = app(&sink)
                .oneshot(request(method, "/build", Some("Bearer secret"), payload()))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert!(body_text(response).await.contains("Only POST is supported"));
        }

        assert!(sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_auth_checked_before_method() {
        let sink = Arc::new(RecordingSink::default());

        let response = app(&sink)
            .oneshot(request("GET", "/build", None, String::new()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let sink = Arc::new(RecordingSink::default());

        let response = app(&sink)
            .oneshot(request("POST", "/deploy", Some("Bearer secret"), payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let sink = Arc::new(RecordingSink::default());

        let response = app(&sink)
            .oneshot(request(
                "POST",
                "/build",
                Some("Bearer secret"),
                "{not json".to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(sink.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_embeds_follow_attachment_order() {
        let sink = Arc::new(RecordingSink::default());
        let body = json!({
            "attachments": [
                {"fallback": "one", "color": "danger"},
                {"fallback": "two", "color": "good"},
                {"fallback": "three"}
            ]
        })
        .to_string();

        let response = app(&sink)
            .oneshot(request("POST", "/build", Some("Bearer secret"), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let titles: Vec<_> = sink
            .sent()
            .await
            .into_iter()
            .map(|sent| match sent {
                Sent::Embed(_, embed) => embed.title.unwrap_or_default(),
                Sent::Text(_, text) => text,
            })
            .collect();
        assert_eq!(titles, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_send_failure_still_returns_ok() {
        let sink = Arc::new(RecordingSink::failing());

        let response = app(&sink)
            .oneshot(request("POST", "/build", Some("Bearer secret"), payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sink.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_no_channel_drops_embeds() {
        let sink = Arc::new(RecordingSink::default());
        let app = router(Arc::new(WebhookState {
            auth_token: "secret".to_string(),
            channel_id: None,
            sink: sink.clone(),
        }));

        let response = app
            .oneshot(request("POST", "/build", Some("Bearer secret"), payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(sink.sent().await.is_empty());
    }
}
