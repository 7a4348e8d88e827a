use crate::api::error::ApiError;
use crate::api::types::*;
use crate::relay::RelayWorkflow;
use crate::sms::InboundSms;
use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use std::sync::Arc;

const BANNER: &str = "EchoLink relay is online. Send SMS webhooks to POST /sms-incoming.";

pub struct RestApi {
    relay: Arc<RelayWorkflow>,
}

impl RestApi {
    pub fn new(relay: Arc<RelayWorkflow>) -> Self {
        Self { relay }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(banner))
            .route("/health", get(health_check))
            .route("/sms-incoming", post(sms_incoming))
            .route("/api/v1/stats", get(get_stats))
            .route("/metrics", crate::metrics::metrics_route())
            .with_state(self.relay.clone())
    }
}

async fn banner() -> &'static str {
    BANNER
}

async fn health_check() -> &'static str {
    "OK"
}

/// Gateway webhook payload, form-encoded (Twilio) or JSON
pub struct InboundPayload(pub InboundSms);

#[async_trait]
impl<S> FromRequest<S> for InboundPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        let sms = if is_json {
            let Json(sms) = Json::<InboundSms>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            sms
        } else {
            let Form(sms) = Form::<InboundSms>::from_request(req, state)
                .await
                .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
            sms
        };

        Ok(Self(sms))
    }
}

/// Acknowledge at once; the relay works in the background
///
/// The gateway always gets `200 Received`. Anything unusable is logged and
/// dropped here.
async fn sms_incoming(
    State(relay): State<Arc<RelayWorkflow>>,
    payload: Result<InboundPayload, ApiError>,
) -> (StatusCode, &'static str) {
    match payload {
        Err(e) => {
            tracing::warn!(error = %e, "unreadable webhook dropped");
        }
        Ok(InboundPayload(sms)) if sms.from.trim().is_empty() => {
            tracing::warn!(chars = sms.body.chars().count(), "webhook without sender dropped");
        }
        Ok(InboundPayload(sms)) if relay.is_shutting_down() => {
            tracing::warn!(from = %sms.from, "relay shutting down, webhook dropped");
        }
        Ok(InboundPayload(sms)) => {
            tracing::info!(from = %sms.from, chars = sms.body.chars().count(), "webhook received");
            relay.spawn_inbound(sms);
        }
    }

    (StatusCode::OK, WEBHOOK_ACK)
}

async fn get_stats(State(relay): State<Arc<RelayWorkflow>>) -> Json<StatsResponse> {
    let stats = relay.stats();

    Json(StatsResponse {
        confirmation_rate: stats.confirmation_rate(),
        in_flight: relay.in_flight(),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::RelayWorkflowBuilder;
    use crate::testing::{MockLedger, RecordingSink};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::Service;

    fn create_test_api() -> (RestApi, Arc<RelayWorkflow>) {
        let relay = Arc::new(
            RelayWorkflowBuilder::new(Arc::new(MockLedger::new()), Arc::new(RecordingSink::new()))
                .build(),
        );
        (RestApi::new(relay.clone()), relay)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (api, _) = create_test_api();
        let mut app = api.router();

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn test_banner() {
        let (api, _) = create_test_api();
        let mut app = api.router();

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("/sms-incoming"));
    }

    #[tokio::test]
    async fn test_webhook_acknowledges_form() {
        let (api, relay) = create_test_api();
        let mut app = api.router();

        let request = Request::builder()
            .method("POST")
            .uri("/sms-incoming")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("From=%2B15551234567&Body=hello"))
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, WEBHOOK_ACK);

        relay.wait_idle().await;
        assert_eq!(relay.stats().messages_received, 1);
    }

    #[tokio::test]
    async fn test_webhook_accepts_json() {
        let (api, relay) = create_test_api();
        let mut app = api.router();

        let request = Request::builder()
            .method("POST")
            .uri("/sms-incoming")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"From":"+15551234567","Body":"ELPART:1/2:ELINK::"}"#))
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        relay.wait_idle().await;
        assert_eq!(relay.stats().segments_buffered, 1);
    }

    const FORM: &str = "application/x-www-form-urlencoded";

    async fn post_webhook(
        app: &mut Router,
        content_type: &str,
        body: &'static str,
    ) -> (StatusCode, String) {
        let request = Request::builder()
            .method("POST")
            .uri("/sms-incoming")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        let response = app.call(request).await.unwrap();
        (response.status(), body_text(response).await)
    }

    #[tokio::test]
    async fn test_webhook_without_sender_is_acknowledged_and_dropped() {
        let (api, relay) = create_test_api();
        let mut app = api.router();

        let acked = post_webhook(&mut app, FORM, "Body=ELINK::abc").await;
        assert_eq!(acked, (StatusCode::OK, WEBHOOK_ACK.to_string()));

        let acked = post_webhook(&mut app, FORM, "From=&Body=ELINK::abc").await;
        assert_eq!(acked, (StatusCode::OK, WEBHOOK_ACK.to_string()));

        relay.wait_idle().await;
        assert_eq!(relay.stats().messages_received, 0);
    }

    #[tokio::test]
    async fn test_unreadable_webhook_is_acknowledged() {
        let (api, relay) = create_test_api();
        let mut app = api.router();

        let acked = post_webhook(&mut app, "application/json", "not json").await;
        assert_eq!(acked, (StatusCode::OK, WEBHOOK_ACK.to_string()));

        relay.wait_idle().await;
        assert_eq!(relay.stats().messages_received, 0);
    }

    #[tokio::test]
    async fn test_webhook_acknowledged_but_skipped_during_shutdown() {
        let (api, relay) = create_test_api();
        let mut app = api.router();
        relay.shutdown();

        let acked = post_webhook(&mut app, FORM, "From=%2B15551234567&Body=hello").await;
        assert_eq!(acked, (StatusCode::OK, WEBHOOK_ACK.to_string()));

        assert_eq!(relay.in_flight(), 0);
        assert_eq!(relay.stats().messages_received, 0);
    }

    #[tokio::test]
    async fn test_stats_empty() {
        let (api, _) = create_test_api();
        let mut app = api.router();

        let request = Request::builder()
            .uri("/api/v1/stats")
            .body(Body::empty())
            .unwrap();
        let response = app.call(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let stats: StatsResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(stats.stats.messages_received, 0);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.confirmation_rate, 0.0);
    }
}
