use std::time::Duration;

use tracing::debug;

use crate::error::{AppError, Result};
use crate::notifier::Notifier;

/// Posts plain-text messages to a Telegram chat through the Bot API.
pub struct TelegramNotifier {
    client: reqwest::Client,
    send_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_url: &str, bot_token: &str, chat_id: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            send_url: send_message_url(api_url, bot_token),
            chat_id: chat_id.to_string(),
        })
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.send_url)
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Notify(format!("Telegram sendMessage returned {status}")));
        }
        debug!(chat_id = %self.chat_id, "Telegram message accepted");
        Ok(())
    }
}

fn send_message_url(api_url: &str, bot_token: &str) -> String {
    format!("{}/bot{}/sendMessage", api_url.trim_end_matches('/'), bot_token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_tolerates_trailing_slash() {
        assert_eq!(
            send_message_url("https://api.telegram.org/", "123:abc"),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
        assert_eq!(
            send_message_url("http://localhost:8081", "t"),
            "http://localhost:8081/bott/sendMessage"
        );
    }
}
