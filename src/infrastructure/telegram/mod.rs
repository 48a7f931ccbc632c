//! Telegram staff notifications.
//!
//! Messages go to every configured chat through the Bot API `sendMessage`
//! method. Delivery is best effort: failures are retried, then logged.

mod messages;

pub use messages::{booking_message, escape_html, format_vnd, order_message};

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::TelegramSettings;

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Sink for messages aimed at shop staff.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StaffNotifier: Send + Sync {
    /// Never fails; delivery errors are logged.
    async fn send_message(&self, text: &str);
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

/// Bot API client. Sends nothing when the bot is not configured.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    settings: TelegramSettings,
    retry_delay: Duration,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, settings: TelegramSettings) -> Self {
        if settings.is_configured() {
            info!(chats = settings.chat_ids.len(), "Telegram notifications enabled");
        } else {
            warn!("Telegram notifications disabled: bot token or chat ids missing");
        }
        Self {
            http,
            settings,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Base delay between attempts, doubled after each failure.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.settings.api_url.trim_end_matches('/'),
            self.settings.bot_token
        )
    }

    async fn post(&self, chat_id: &str, text: &str) -> Result<(), reqwest::Error> {
        self.http
            .post(self.endpoint())
            .timeout(REQUEST_TIMEOUT)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    #[instrument(skip(self, text), level = "debug")]
    async fn send_to_chat(&self, chat_id: &str, text: &str) -> bool {
        let mut delay = self.retry_delay;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.post(chat_id, text).await {
                Ok(()) => {
                    debug!(chat_id, "Telegram message delivered");
                    return true;
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(chat_id, attempt, error = %e, "Telegram send failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(e) => {
                    tracing::error!(chat_id, error = %e, "Giving up on Telegram message");
                }
            }
        }
        false
    }
}

#[async_trait]
impl StaffNotifier for TelegramClient {
    async fn send_message(&self, text: &str) {
        if !self.settings.is_configured() {
            debug!("Telegram not configured, skipping message");
            return;
        }

        let sends = self
            .settings
            .chat_ids
            .iter()
            .map(|chat_id| self.send_to_chat(chat_id, text));
        futures::future::join_all(sends).await;
    }
}
