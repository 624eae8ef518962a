//! One-shot status messages carried to the next rendered page in a cookie.

use serde::{Deserialize, Serialize};
use tower_cookies::{cookie::time, Cookie, Cookies};
use tracing::debug;

pub const FLASH_COOKIE: &str = "ticketdesk_messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

impl Level {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

impl FlashMessage {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(Level::Success, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Level::Error, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Level::Info, text)
    }
}

fn encode(messages: &[FlashMessage]) -> Option<String> {
    match serde_json::to_string(messages) {
        Ok(json) => Some(urlencoding::encode(&json).into_owned()),
        Err(e) => {
            debug!("Failed to encode flash messages: {e}");
            None
        }
    }
}

fn decode(value: &str) -> Vec<FlashMessage> {
    let decoded = match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            debug!("Discarding undecodable flash cookie: {e}");
            return Vec::new();
        }
    };

    serde_json::from_str(&decoded).unwrap_or_else(|e| {
        debug!("Discarding malformed flash cookie: {e}");
        Vec::new()
    })
}

fn read(cookies: &Cookies) -> Vec<FlashMessage> {
    cookies
        .get(FLASH_COOKIE)
        .map(|cookie| decode(cookie.value()))
        .unwrap_or_default()
}

/// Queues a message for the next page that renders messages.
pub fn push(cookies: &Cookies, message: FlashMessage) {
    let mut messages = read(cookies);
    messages.push(message);

    let Some(encoded) = encode(&messages) else {
        return;
    };

    cookies.add(
        Cookie::build((FLASH_COOKIE, encoded))
            .path("/")
            .http_only(true)
            .max_age(time::Duration::minutes(5))
            .build(),
    );
}

/// Returns the queued messages and clears them.
pub fn take(cookies: &Cookies) -> Vec<FlashMessage> {
    let messages = read(cookies);
    if cookies.get(FLASH_COOKIE).is_some() {
        cookies.remove(Cookie::build(FLASH_COOKIE).path("/").build());
    }
    messages
}
