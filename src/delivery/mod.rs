//! Delivery backends: the last hop between a composed message and the chat
//! service.
//!
//! The notifier core never talks to a transport directly; it hands a
//! [`NotificationPayload`] to a [`DeliveryBackend`] selected at construction
//! time. Two backends are implemented:
//! - [`bridge::ScriptBridge`] — embeds a secondary scripting runtime and
//!   forwards payloads into it (the original delivery path)
//! - [`http::HttpBackend`] — direct Campfire-style REST delivery
//!
//! Delivery is fire-and-forget: one attempt, no acknowledgement, no retry.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod bridge;
pub mod http;

/// The wire mapping handed to a delivery backend.
///
/// Key names are part of the backend contract and must not change. The
/// message text may contain embedded newlines and tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Chat account identifier.
    pub email: String,
    /// Chat account secret.
    pub password: String,
    /// Chat service subdomain.
    pub domain: String,
    /// Target room name.
    pub room_name: String,
    /// Composed message text.
    pub message: String,
}

/// Errors raised by delivery backends.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The secondary runtime could not be started.
    #[error("failed to boot delivery runtime: {0}")]
    Boot(String),

    /// The secondary runtime exited or its pipe broke.
    #[error("delivery runtime unavailable: {0}")]
    RuntimeGone(String),

    /// The payload could not be serialized for the backend.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The chat service response did not match the expected shape.
    #[error("malformed chat service response: {0}")]
    BadResponse(String),

    /// HTTP transport failure.
    #[error("delivery request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The chat service responded with an error status.
    #[error("chat service returned status {status}: {body}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        body: String,
    },

    /// The target room does not exist on the service.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// The configured delivery timeout elapsed.
    #[error("delivery timed out after {0} seconds")]
    Timeout(u64),
}

/// A pluggable delivery backend.
///
/// Implementations must be `Send + Sync`: `deliver` may be called
/// concurrently from multiple build workers.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    /// Deliver one payload, best-effort, exactly one attempt.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] on any failure; the caller decides what to
    /// do with it (the orchestrator logs and moves on).
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError>;
}

/// Check an HTTP response and return its body text or a structured error.
///
/// # Errors
///
/// Returns [`DeliveryError::Request`] on transport failure,
/// [`DeliveryError::HttpStatus`] with a sanitized body on non-2xx.
pub async fn check_http_response(response: reqwest::Response) -> Result<String, DeliveryError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(DeliveryError::HttpStatus {
            status: status.as_u16(),
            body: sanitize_http_error_body(&body),
        });
    }
    Ok(body)
}

/// Collapse whitespace, redact credential-shaped tokens, and truncate.
///
/// Error bodies can echo request contents; they must never leak secrets
/// into logs.
fn sanitize_http_error_body(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sanitized = collapsed;
    for pattern in [
        r"[0-9a-f]{40}",
        r#""password"\s*:\s*"[^"]*""#,
        r"Basic [A-Za-z0-9+/=]{8,}",
    ] {
        if let Ok(regex) = Regex::new(pattern) {
            sanitized = regex.replace_all(&sanitized, "[REDACTED]").into_owned();
        }
    }

    const MAX_ERROR_BODY_CHARS: usize = 256;
    if sanitized.chars().count() > MAX_ERROR_BODY_CHARS {
        let shortened = sanitized
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        return format!("{shortened}...[truncated]");
    }

    sanitized
}
