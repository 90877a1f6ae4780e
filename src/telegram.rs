//! Telegram Bot API transport (long polling)

use crate::bot::{Bot, Inbound};
use crate::error::{Result, ScoreError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::thread;
use std::time::Duration;

const API_BASE: &str = "https://api.telegram.org";

/// Seconds a `getUpdates` call may wait for new messages
const POLL_TIMEOUT: u64 = 30;

/// Pause after a failed poll before trying again
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

pub struct TelegramClient {
    client: reqwest::blocking::Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(API_BASE, token)
    }

    pub fn with_base_url(api_base: &str, token: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT + 10))
            .build()?;
        Ok(Self {
            client,
            base: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        })
    }

    fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let url = format!("{}/{}", self.base, method);
        let response: ApiResponse<T> = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| ScoreError::Telegram(format!("{} failed: {}", method, e.without_url())))?
            .json()?;
        unwrap_response(method, response)
    }

    /// Updates after `offset`, waiting up to the poll timeout for new ones
    pub fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({ "offset": offset, "timeout": POLL_TIMEOUT, "allowed_updates": ["message"] }),
        )
    }

    pub fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value =
            self.call("sendMessage", json!({ "chat_id": chat_id, "text": text }))?;
        Ok(())
    }
}

fn unwrap_response<T>(method: &str, response: ApiResponse<T>) -> Result<T> {
    match response {
        ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
        ApiResponse { description, .. } => Err(ScoreError::Telegram(format!(
            "{}: {}",
            method,
            description.unwrap_or_else(|| "no result".to_string())
        ))),
    }
}

/// Handle one update and send the replies. Updates without text are ignored.
pub fn dispatch(client: &TelegramClient, bot: &mut Bot, update: &Update) -> Result<()> {
    let Some(message) = &update.message else {
        return Ok(());
    };
    let Some(text) = &message.text else {
        log::debug!("update {}: no text", update.update_id);
        return Ok(());
    };

    for reply in bot.handle(&Inbound::parse(text)) {
        if !reply.is_empty() {
            client.send_message(message.chat.id, &reply)?;
        }
    }
    Ok(())
}

/// Poll forever, handling each message to completion before the next.
///
/// Failures of single updates are logged and never stop the loop.
pub fn run_polling(client: &TelegramClient, bot: &mut Bot) -> Result<()> {
    let mut offset = 0;
    log::info!("polling for updates");

    loop {
        let updates = match client.get_updates(offset) {
            Ok(updates) => updates,
            Err(e) => {
                log::warn!("polling failed: {}", e);
                thread::sleep(RETRY_DELAY);
                continue;
            }
        };

        for update in &updates {
            offset = offset.max(update.update_id + 1);
            if let Err(e) = dispatch(client, bot, update) {
                log::warn!("Update {} caused error {}", update.update_id, e);
            }
        }
    }
}
