use std::future::Future;

use serde::Serialize;

use crate::config::AlertConfig;

/// Outbound alert transport. Delivery is attempted once; callers decide what a
/// failure means.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no webhook configured")]
    NotConfigured,
    #[error("webhook request timed out")]
    Timeout,
    #[error("webhook network error: {0}")]
    Network(String),
    #[error("webhook rejected the message: status={status}")]
    Rejected { status: u16 },
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

/// POSTs `{"content": message}` to a chat webhook.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(config: &AlertConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.webhook_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: config.webhook_url.clone(),
            client,
        }
    }
}

impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let url = self.url.as_deref().ok_or(NotifyError::NotConfigured)?;
        let response = self
            .client
            .post(url)
            .json(&WebhookPayload { content: message })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Network(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
