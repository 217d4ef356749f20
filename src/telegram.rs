use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::config::Telegram;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Form body of a `sendMessage` call
#[derive(Debug, Clone, Serialize)]
pub struct SendMessage<'a> {
    pub chat_id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'a str>,
}

impl<'a> SendMessage<'a> {
    pub fn new(chat_id: &'a str, text: &'a str, parse_mode: Option<&'a str>) -> Self {
        Self {
            chat_id,
            text,
            parse_mode: parse_mode
                .map(str::trim)
                .filter(|mode| !mode.is_empty() && !mode.eq_ignore_ascii_case("none")),
        }
    }
}

/// What happened to a message. Informational only, delivery is best-effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Rejected(StatusCode),
    Failed,
}

/// Stateless client for the Telegram Bot API.
///
/// Idle connections are not kept, so every send is one fresh request.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
}

impl TelegramClient {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(0)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }

    fn send_message_url(telegram: &Telegram) -> String {
        format!("{}/bot{}/sendMessage", telegram.api_url, telegram.token)
    }

    /// Deliver `text` to the configured chat.
    ///
    /// Failures are logged and swallowed; this never returns an error.
    #[instrument(skip(self, telegram, text), fields(chat_id = %telegram.chat_id))]
    pub async fn send(
        &self,
        telegram: &Telegram,
        text: &str,
        parse_mode: Option<&str>,
    ) -> DeliveryOutcome {
        let form = SendMessage::new(&telegram.chat_id, text, parse_mode);

        match self
            .client
            .post(Self::send_message_url(telegram))
            .form(&form)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    debug!("sent telegram message ({} chars)", text.chars().count());
                    // drain so the connection is released cleanly
                    let _ = response.bytes().await;
                    DeliveryOutcome::Delivered
                } else {
                    let body = response.text().await.unwrap_or_default();
                    warn!("telegram sendMessage failed: HTTP {status} - {body}");
                    DeliveryOutcome::Rejected(status)
                }
            }
            Err(e) => {
                // the request url carries the bot token
                warn!("telegram sendMessage error: {}", e.without_url());
                DeliveryOutcome::Failed
            }
        }
    }
}
