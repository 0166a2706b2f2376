//! HTTP mail relay client
//!
//! Each rendered message is POSTed as JSON to the relay URL. The raw body is
//! signed with HMAC-SHA256 and the hex digest sent in `X-TickUp-Signature`,
//! so the relay can reject forged submissions.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, error};

use super::{Notification, Notifier, NotifyError};

/// Header carrying the body signature
pub const SIGNATURE_HEADER: &str = "X-TickUp-Signature";

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub url: String,
    /// HMAC key shared with the relay
    pub secret: String,
    /// `From` address, e.g. `TickUp <no-reply@tickup.local>`
    pub from: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

pub struct RelayNotifier {
    client: reqwest::Client,
    config: RelayConfig,
}

impl RelayNotifier {
    pub fn new(config: RelayConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| NotifyError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Hex-encoded HMAC-SHA256 of `body` under the relay secret
    pub fn sign(&self, body: &[u8]) -> Result<String, NotifyError> {
        sign_payload(self.config.secret.as_bytes(), body)
    }
}

fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, NotifyError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret)
        .map_err(|e| NotifyError::Other(format!("Invalid relay secret: {}", e)))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl Notifier for RelayNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotifyError> {
        let message = notification.render();
        let body = serde_json::to_vec(&RelayPayload {
            from: &self.config.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        })
        .map_err(|e| NotifyError::Other(format!("Failed to encode message: {}", e)))?;

        let signature = self.sign(&body)?;

        let response = self
            .client
            .post(&self.config.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, kind = notification.kind(), "Mail relay unreachable");
                NotifyError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = status.as_u16(), kind = notification.kind(), "Mail relay rejected message");
            return Err(NotifyError::Rejected(status.as_u16()));
        }

        debug!(kind = notification.kind(), to = %message.to, "Notification delivered to relay");
        Ok(())
    }
}
