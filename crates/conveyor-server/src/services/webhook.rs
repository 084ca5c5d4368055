//! Outbound webhook delivery.

use async_trait::async_trait;

use conveyor_core::service::{WebhookPayload, WebhookSender};
use conveyor_core::{Error, Result};

/// Posts the JSON payload to every configured endpoint. Partial delivery
/// failures are accumulated rather than short-circuiting the fan-out.
pub struct HttpWebhookSender {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl HttpWebhookSender {
    pub fn new(endpoints: Vec<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, payload: &WebhookPayload<'_>) -> Result<()> {
        let mut errs = Vec::new();
        for endpoint in &self.endpoints {
            let response = self
                .client
                .post(endpoint)
                .json(payload)
                .send()
                .await
                .map_err(|err| Error::Internal(format!("webhook {endpoint}: {err}")));
            match response {
                Ok(response) if !response.status().is_success() => {
                    errs.push(Error::Internal(format!(
                        "webhook {endpoint}: status {}",
                        response.status()
                    )));
                }
                Ok(_) => {}
                Err(err) => errs.push(err),
            }
        }
        Error::collect(errs)
    }
}
