//! Meeting room models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The video room attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingInfo {
    /// Provider room name.
    pub room_name: String,
    /// Join link.
    pub meeting_url: String,
    /// Video platform.
    pub platform: String,
    /// When the room was created.
    pub created_at: DateTime<Utc>,
    /// When the room stops being valid.
    pub expires_at: DateTime<Utc>,
    /// Room capacity.
    pub max_participants: u32,
    /// Whether the room records.
    #[serde(default)]
    pub recording_enabled: bool,
    /// When the room was closed, if it was.
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl MeetingInfo {
    /// Returns true if the room has not expired or been closed.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.ended_at.is_none() && now < self.expires_at
    }
}
