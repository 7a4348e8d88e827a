//! Twilio Messages API reply sink

use std::time::Duration;

use async_trait::async_trait;

use super::types::{ReplySink, SmsError, SmsResult};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Credentials and sender number for the Twilio account
#[derive(Debug, Clone)]
pub struct TwilioCredentials {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

pub struct TwilioSink {
    client: reqwest::Client,
    credentials: TwilioCredentials,
    api_base: String,
}

impl TwilioSink {
    pub fn new(credentials: TwilioCredentials) -> SmsResult<Self> {
        Self::with_api_base(credentials, API_BASE)
    }

    /// Point the sink at a different API host (test doubles, regional edges)
    pub fn with_api_base(
        credentials: TwilioCredentials,
        api_base: impl Into<String>,
    ) -> SmsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            credentials,
            api_base: api_base.into(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.credentials.account_sid
        )
    }
}

#[async_trait]
impl ReplySink for TwilioSink {
    async fn send(&self, to: &str, body: &str) -> SmsResult<()> {
        let params = [
            ("To", to),
            ("From", self.credentials.from_number.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.credentials.account_sid,
                Some(&self.credentials.auth_token),
            )
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SmsError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to, "reply delivered to gateway");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Form, Path};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;
    use std::collections::HashMap;
    use tokio::sync::mpsc;

    fn credentials() -> TwilioCredentials {
        TwilioCredentials {
            account_sid: "AC123".into(),
            auth_token: "secret".into(),
            from_number: "+15550000000".into(),
        }
    }

    type Captured = (String, HashMap<String, String>, bool);

    async fn spawn_gateway(status: StatusCode) -> (String, mpsc::UnboundedReceiver<Captured>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let app = Router::new().route(
            "/Accounts/:sid/Messages.json",
            post(
                move |Path(sid): Path<String>,
                      headers: HeaderMap,
                      Form(form): Form<HashMap<String, String>>| async move {
                    let authorized = headers.contains_key("authorization");
                    let _ = tx.send((sid, form, authorized));
                    status
                },
            ),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    #[tokio::test]
    async fn test_send_posts_form() {
        let (base, mut rx) = spawn_gateway(StatusCode::CREATED).await;
        let sink = TwilioSink::with_api_base(credentials(), base).unwrap();

        sink.send("+15551234567", "Tx submitted").await.unwrap();

        let (sid, form, authorized) = rx.recv().await.unwrap();
        assert_eq!(sid, "AC123");
        assert_eq!(form["To"], "+15551234567");
        assert_eq!(form["From"], "+15550000000");
        assert_eq!(form["Body"], "Tx submitted");
        assert!(authorized);
    }

    #[tokio::test]
    async fn test_gateway_rejection() {
        let (base, _rx) = spawn_gateway(StatusCode::BAD_REQUEST).await;
        let sink = TwilioSink::with_api_base(credentials(), base).unwrap();

        let err = sink.send("+15551234567", "hi").await.unwrap_err();
        assert!(matches!(err, SmsError::Rejected { status: 400, .. }));
    }
}
