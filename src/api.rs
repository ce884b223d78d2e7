//! HTTP request client for the discussion server.
//!
//! Covers the session operations (start / next batch / intervene / stop) and
//! the room-directory and static-resource endpoints the surrounding screens
//! use. Mirrors the server's JSON shapes exactly; every non-2xx status maps
//! to a recoverable [`PanelflowError`] so callers can retry.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::PanelflowError;
use crate::message::{sanitize_markup, Message};

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

/// Body of the start-discussion request.
#[derive(Debug, Clone, Serialize)]
pub struct StartDiscussionRequest {
    pub room_id: u64,
    pub agenda_id: u64,
    pub agenda_text: String,
    pub config_id: u64,
    pub config_file: String,
    /// "ja" or "en".
    pub lang: String,
    pub tech_enable: bool,
    /// Whether the agenda was picked from the preset list; enables the
    /// server-side response cache for that agenda.
    pub is_select_agenda: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartDiscussionResponse {
    pub status: String,
    #[serde(default)]
    pub exist_cache: bool,
}

impl StartDiscussionResponse {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// Envelope for a user intervention / additional-discussion message.
#[derive(Debug, Clone, Serialize)]
pub struct InterventionEnvelope {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub user_name: String,
    pub msg_text: String,
    pub room_id: u64,
    pub tech_enable: bool,
}

impl InterventionEnvelope {
    /// Build the envelope, sanitizing the text against markup injection
    /// before it ever leaves the client.
    pub fn new(user_name: &str, text: &str, room_id: u64, tech_enable: bool) -> Self {
        InterventionEnvelope {
            msg_type: "message".to_string(),
            user_name: user_name.to_string(),
            msg_text: sanitize_markup(text),
            room_id,
            tech_enable,
        }
    }
}

/// One row of the room directory.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomInfo {
    pub room_id: u64,
    pub room_name: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// One discussion config as the server lists it: per-language file names and
/// panelist rosters for the selection screen.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscussionConfig {
    pub id: u64,
    pub file: HashMap<String, String>,
    #[serde(default)]
    pub label: HashMap<String, String>,
    #[serde(default)]
    pub panelist_names: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub panelist_images: HashMap<String, HashMap<String, String>>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Thin typed client over the server's HTTP surface. Cheap to clone.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, PanelflowError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| PanelflowError::Config(e.to_string()))?;
        Ok(ApiClient {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, PanelflowError> {
        let url = self.url(path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| PanelflowError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(PanelflowError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        resp.json::<T>().await.map_err(|e| PanelflowError::Json {
            detail: e.to_string(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, PanelflowError> {
        let url = self.url(path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| PanelflowError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(PanelflowError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        resp.json::<T>().await.map_err(|e| PanelflowError::Json {
            detail: e.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Session operations
    // -----------------------------------------------------------------------

    /// Start a discussion round. A `status` other than "succeeded" (the
    /// server refuses while a round is already running) maps to
    /// [`PanelflowError::Rejected`].
    pub async fn start_discussion(
        &self,
        request: &StartDiscussionRequest,
    ) -> Result<StartDiscussionResponse, PanelflowError> {
        let resp: StartDiscussionResponse = self.post_json("/new_discussion", request).await?;
        if !resp.succeeded() {
            return Err(PanelflowError::Rejected(format!(
                "start_discussion returned status '{}'",
                resp.status
            )));
        }
        debug!(exist_cache = resp.exist_cache, "discussion started");
        Ok(resp)
    }

    /// Ask the server to advance by one message and return the full
    /// accessible snapshot.
    pub async fn next_message_batch(&self, room_id: u64) -> Result<Vec<Message>, PanelflowError> {
        #[derive(Serialize)]
        struct Body {
            room_id: u64,
        }
        self.post_json("/next_accessible_message", &Body { room_id })
            .await
    }

    /// Submit a user intervention, starting an additional round.
    pub async fn send_intervention(
        &self,
        envelope: &InterventionEnvelope,
    ) -> Result<(), PanelflowError> {
        let _: serde_json::Value = self.post_json("/additional_discussion", envelope).await?;
        Ok(())
    }

    /// Stop the in-progress discussion; the server discards the room's
    /// message stream.
    pub async fn stop_discussion(&self, room_id: u64) -> Result<(), PanelflowError> {
        #[derive(Serialize)]
        struct Body {
            room_id: u64,
        }
        let _: serde_json::Value = self.post_json("/discussion_end", &Body { room_id }).await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Room directory / static resources
    // -----------------------------------------------------------------------

    pub async fn list_rooms(&self) -> Result<HashMap<u64, RoomInfo>, PanelflowError> {
        self.get_json("/rooms").await
    }

    pub async fn create_room(&self, room_name: &str) -> Result<(), PanelflowError> {
        #[derive(Serialize)]
        struct Body<'a> {
            room_name: &'a str,
        }
        let _: serde_json::Value = self.post_json("/rooms", &Body { room_name }).await?;
        Ok(())
    }

    pub async fn delete_room(&self, room_id: u64) -> Result<(), PanelflowError> {
        let url = self.url(&format!("/rooms/{room_id}"));
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| PanelflowError::from_request(&url, e))?;
        if !resp.status().is_success() {
            return Err(PanelflowError::Http {
                status: resp.status().as_u16(),
                url,
            });
        }
        Ok(())
    }

    pub async fn list_configs(&self) -> Result<Vec<DiscussionConfig>, PanelflowError> {
        self.get_json("/system/config_list").await
    }

    /// Fetch the agenda list for a preset agenda file. Entries are kept loose
    /// — the selection screen owns their interpretation.
    pub async fn load_agenda(
        &self,
        agenda_file: &str,
    ) -> Result<Vec<serde_json::Value>, PanelflowError> {
        self.get_json(&format!("/system/agenda/{agenda_file}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervention_envelope_sanitizes_text() {
        let env = InterventionEnvelope::new("A", "<b>x</b>", 1, false);
        assert_eq!(env.msg_text, "&lt;b&gt;x&lt;/b&gt;");
        assert_eq!(env.msg_type, "message");
    }

    #[test]
    fn test_intervention_envelope_serializes_type_field() {
        let env = InterventionEnvelope::new("A", "hi", 2, true);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["room_id"], 2);
        assert_eq!(json["tech_enable"], true);
    }

    #[test]
    fn test_start_response_succeeded() {
        let resp: StartDiscussionResponse =
            serde_json::from_str(r#"{"status":"succeeded","exist_cache":true}"#).unwrap();
        assert!(resp.succeeded());
        assert!(resp.exist_cache);
    }

    #[test]
    fn test_start_response_missing_cache_defaults_false() {
        let resp: StartDiscussionResponse =
            serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert!(!resp.succeeded());
        assert!(!resp.exist_cache);
    }

    #[test]
    fn test_room_directory_shape() {
        let rooms: HashMap<u64, RoomInfo> = serde_json::from_str(
            r#"{"1":{"room_id":1,"room_name":"Room 1","created_at":"2025-01-01T00:00:00"}}"#,
        )
        .unwrap();
        assert_eq!(rooms[&1].room_name, "Room 1");
    }
}
