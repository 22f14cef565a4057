//! One-shot notifications carried between requests in a signed cookie.
//!
//! A handler that cancels jobs appends messages and redirects. The page
//! rendered next reads them once and expires the cookie.

use actix_web::cookie::{Cookie, CookieJar, Key, SameSite};
use actix_web::HttpRequest;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "killedjobs";

/// Browsers drop cookies over 4 KB, so a cookie carries at most this many
/// messages of at most `MAX_TEXT_CHARS` characters each.
pub const MAX_MESSAGES: usize = 8;
pub const MAX_TEXT_CHARS: usize = 240;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Info,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn info(text: impl Into<String>) -> Self {
        FlashMessage {
            level: FlashLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        FlashMessage {
            level: FlashLevel::Error,
            text: text.into(),
        }
    }
}

pub struct FlashStore {
    key: Key,
}

impl FlashStore {
    /// `secret` must be at least 32 bytes; `Config::validate` enforces it.
    pub fn new(secret: &str) -> Self {
        FlashStore {
            key: Key::derive_from(secret.as_bytes()),
        }
    }

    /// Pending messages of the request. Unsigned or tampered cookies read as
    /// empty.
    pub fn read(&self, req: &HttpRequest) -> Vec<FlashMessage> {
        let Some(cookie) = req.cookie(SESSION_COOKIE) else {
            return Vec::new();
        };
        let mut jar = CookieJar::new();
        jar.add_original(cookie);
        let Some(verified) = jar.signed(&self.key).get(SESSION_COOKIE) else {
            log::warn!("Discarding flash cookie with an invalid signature");
            return Vec::new();
        };
        let decoded = match URL_SAFE_NO_PAD.decode(verified.value()) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Discarding flash cookie with invalid encoding: {}", e);
                return Vec::new();
            }
        };
        match serde_json::from_slice(&decoded) {
            Ok(messages) => messages,
            Err(e) => {
                log::warn!("Discarding unreadable flash cookie: {}", e);
                Vec::new()
            }
        }
    }

    /// Signed cookie holding `messages`, trimmed to fit with [`fit_messages`].
    /// The JSON is base64 encoded so that any message text is a valid cookie
    /// value.
    pub fn store(&self, messages: &[FlashMessage]) -> Cookie<'static> {
        let json = serde_json::to_vec(&fit_messages(messages)).unwrap_or_else(|_| b"[]".to_vec());
        let value = URL_SAFE_NO_PAD.encode(json);
        let cookie = Cookie::build(SESSION_COOKIE, value)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish();
        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(cookie.clone());
        jar.get(SESSION_COOKIE).cloned().unwrap_or(cookie)
    }

    /// Cookie that expires whatever the browser holds.
    pub fn clear(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
        cookie.make_removal();
        cookie
    }
}

/// Shortens long texts and replaces messages past the limit with one summary
/// line, which is an error when any of the dropped messages was.
pub fn fit_messages(messages: &[FlashMessage]) -> Vec<FlashMessage> {
    let shorten = |m: &FlashMessage| {
        let mut text: String = m.text.chars().take(MAX_TEXT_CHARS).collect();
        if m.text.chars().count() > MAX_TEXT_CHARS {
            text.push('…');
        }
        FlashMessage { level: m.level, text }
    };
    if messages.len() <= MAX_MESSAGES {
        return messages.iter().map(shorten).collect();
    }
    let (kept, dropped) = messages.split_at(MAX_MESSAGES - 1);
    let mut fitted: Vec<FlashMessage> = kept.iter().map(shorten).collect();
    let failed = dropped
        .iter()
        .filter(|m| m.level == FlashLevel::Error)
        .count();
    fitted.push(if failed > 0 {
        FlashMessage::error(format!(
            "...and {} more messages, {} of them failures (see the server log)",
            dropped.len(),
            failed
        ))
    } else {
        FlashMessage::info(format!("...and {} more messages", dropped.len()))
    });
    fitted
}
