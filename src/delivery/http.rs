//! Direct HTTP delivery backend.
//!
//! Talks to a Campfire-style chat service: list rooms with basic auth,
//! match the target room by name, then post the message as a paste. This is
//! the in-process alternative to the scripted bridge; both sit behind
//! [`DeliveryBackend`] and the orchestrator cannot tell them apart.

use serde::Deserialize;
use tracing::{debug, warn};

use super::{check_http_response, DeliveryBackend, DeliveryError, NotificationPayload};

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for delivery operations.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Direct HTTP backend for a Campfire-style chat service.
pub struct HttpBackend {
    client: reqwest::Client,
    service_root: Option<String>,
}

/// Room listing envelope returned by the chat service.
#[derive(Deserialize)]
struct RoomIndex {
    rooms: Vec<Room>,
}

/// One room entry from the listing.
#[derive(Deserialize)]
struct Room {
    id: u64,
    name: String,
}

impl HttpBackend {
    /// Create a backend addressing `https://<domain>.campfirenow.com`.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        Self {
            client,
            service_root: None,
        }
    }

    /// Create a backend with a fixed service root, ignoring the payload
    /// domain. Used for tests and self-hosted services.
    pub fn with_service_root(root: impl Into<String>) -> Self {
        Self {
            service_root: Some(root.into()),
            ..Self::new()
        }
    }

    fn root_for(&self, domain: &str) -> String {
        match &self.service_root {
            Some(root) => root.clone(),
            None => format!("https://{domain}.campfirenow.com"),
        }
    }

    /// Find the target room id by name.
    async fn find_room(
        &self,
        root: &str,
        payload: &NotificationPayload,
    ) -> Result<u64, DeliveryError> {
        let url = format!("{root}/rooms.json");
        let response = self
            .client
            .get(&url)
            .basic_auth(&payload.email, Some(&payload.password))
            .send()
            .await?;
        let body = check_http_response(response).await?;
        let index: RoomIndex = serde_json::from_str(&body)
            .map_err(|e| DeliveryError::BadResponse(e.to_string()))?;
        index
            .rooms
            .iter()
            .find(|room| room.name == payload.room_name)
            .map(|room| room.id)
            .ok_or_else(|| DeliveryError::RoomNotFound(payload.room_name.clone()))
    }
}

impl Default for HttpBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeliveryBackend for HttpBackend {
    async fn deliver(&self, payload: &NotificationPayload) -> Result<(), DeliveryError> {
        let root = self.root_for(&payload.domain);
        let room_id = self.find_room(&root, payload).await?;

        let url = format!("{root}/room/{room_id}/speak.json");
        let body = serde_json::json!({
            "message": { "type": "PasteMessage", "body": payload.message }
        });
        let response = self
            .client
            .post(&url)
            .basic_auth(&payload.email, Some(&payload.password))
            .json(&body)
            .send()
            .await?;
        check_http_response(response).await?;

        debug!(room = %payload.room_name, "message delivered over HTTP");
        Ok(())
    }
}
