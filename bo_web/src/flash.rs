//! ABOUTME: One-shot notices carried across a redirect in a cookie
//! ABOUTME: Views queue success or error messages, the next rendered page shows them

use actix_web::{cookie::Cookie, HttpRequest};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FLASH_COOKIE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: Level,
    pub message: String,
}

impl FlashMessage {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    /// CSS classes of the notice box
    pub fn css_class(&self) -> &'static str {
        match self.level {
            Level::Success => "bg-green-100 text-green-800",
            Level::Error => "bg-red-100 text-red-800",
        }
    }
}

/// Cookie holding `messages`; the value survives cookie percent-decoding
pub fn flash_cookie(messages: &[FlashMessage]) -> Cookie<'static> {
    let payload = serde_json::to_vec(messages).unwrap_or_default();
    Cookie::build(FLASH_COOKIE, URL_SAFE_NO_PAD.encode(payload))
        .path("/")
        .http_only(true)
        .same_site(actix_web::cookie::SameSite::Lax)
        .finish()
}

/// Cookie that clears pending messages
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(FLASH_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// Messages queued by the previous response; undecodable cookies are dropped
pub fn read_messages(req: &HttpRequest) -> Vec<FlashMessage> {
    let Some(cookie) = req.cookie(FLASH_COOKIE) else {
        return Vec::new();
    };
    decode(cookie.value()).unwrap_or_else(|| {
        debug!("Discarding unreadable flash cookie");
        Vec::new()
    })
}

fn decode(value: &str) -> Option<Vec<FlashMessage>> {
    let bytes = URL_SAFE_NO_PAD.decode(value).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_messages_survive_the_cookie() {
        let messages = vec![
            FlashMessage::success("ada created"),
            FlashMessage::error("a & b; \"c\" can't be deleted"),
        ];
        let cookie = flash_cookie(&messages);
        assert!(cookie
            .value()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));

        let req = TestRequest::default().cookie(cookie).to_http_request();
        assert_eq!(read_messages(&req), messages);
    }

    #[test]
    fn test_garbage_cookie_is_ignored() {
        let req = TestRequest::default()
            .cookie(Cookie::new(FLASH_COOKIE, "@@not.base64@@"))
            .to_http_request();
        assert!(read_messages(&req).is_empty());

        let req = TestRequest::default().to_http_request();
        assert!(read_messages(&req).is_empty());
    }

    #[test]
    fn test_removal_cookie_expires() {
        let cookie = removal_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(
            cookie.max_age(),
            Some(actix_web::cookie::time::Duration::ZERO)
        );
    }
}
