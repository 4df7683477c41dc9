// src/notify/slack.rs
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

/// Posts messages to a Slack incoming webhook. Failures are logged, never returned.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    webhook_url: String,
    http_client: Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: String) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self {
            webhook_url,
            http_client,
        })
    }

    pub async fn send(&self, message: &str) {
        if message.trim().is_empty() {
            warn!("Attempted to send an empty Slack message");
            return;
        }

        let result = self
            .http_client
            .post(&self.webhook_url)
            .json(&SlackPayload { text: message })
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!("Slack API error: {} - {}", status, body);
            }
            Err(e) => error!("Failed to send message to Slack: {}", e),
        }
    }
}
