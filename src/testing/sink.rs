use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::sms::{ReplySink, SmsError, SmsResult};

/// Reply sink that records every send attempt
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose sends are recorded but always fail
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    /// A sink that takes `delay` to deliver each message, like a slow gateway
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Every `(to, body)` pair attempted, in order
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    /// Bodies sent to one recipient
    pub fn bodies_to(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(recipient, _)| recipient == to)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl ReplySink for RecordingSink {
    async fn send(&self, to: &str, body: &str) -> SmsResult<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sent.lock().push((to.to_string(), body.to_string()));

        if self.failing.load(Ordering::SeqCst) {
            return Err(SmsError::Unavailable("scripted send failure".into()));
        }
        Ok(())
    }
}
