//! Meeting room management.
//!
//! The engine talks to the video platform through the [`MeetingProvider`]
//! trait. [`LocalMeetingProvider`] keeps rooms in memory and generates
//! deterministic join links; it backs the binary and the tests.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::calculation::{room_empty_timeout_secs, room_max_duration_secs};
use crate::config::ConfigLoader;
use crate::error::{EngineError, EngineResult};
use crate::models::{Academy, MeetingInfo, Session};

/// Parameters for creating a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomRequest {
    /// Room name, unique per session.
    pub room_name: String,
    /// Capacity.
    pub max_participants: u32,
    /// Seconds an empty room stays open.
    pub empty_timeout_secs: i64,
    /// Maximum room lifetime in seconds.
    pub max_duration_secs: i64,
    /// Whether to record.
    pub recording_enabled: bool,
    /// When the meeting stops being valid.
    pub expires_at: DateTime<Utc>,
}

/// A video platform that hosts session rooms.
pub trait MeetingProvider: Send + Sync {
    /// Creates a room, or returns the existing one with the same name.
    fn create_room(&self, request: &RoomRequest, now: DateTime<Utc>) -> EngineResult<MeetingInfo>;
    /// Returns true if the room is live on the platform.
    fn room_exists(&self, room_name: &str) -> EngineResult<bool>;
    /// Closes the room. Closing a missing room is not an error.
    fn end_room(&self, room_name: &str) -> EngineResult<()>;
}

/// An in-process [`MeetingProvider`].
#[derive(Debug)]
pub struct LocalMeetingProvider {
    base_url: String,
    platform: String,
    rooms: Mutex<HashSet<String>>,
}

impl LocalMeetingProvider {
    /// Creates a provider generating links under `base_url`.
    pub fn new(base_url: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            platform: platform.into(),
            rooms: Mutex::new(HashSet::new()),
        }
    }

    /// Creates a provider from the meeting settings.
    pub fn from_config(config: &ConfigLoader) -> Self {
        let meeting = config.meeting();
        Self::new(meeting.base_url.clone(), meeting.platform.clone())
    }

    /// Returns the number of live rooms.
    pub fn live_rooms(&self) -> usize {
        self.rooms.lock().map(|rooms| rooms.len()).unwrap_or(0)
    }

    fn lock(&self) -> EngineResult<std::sync::MutexGuard<'_, HashSet<String>>> {
        self.rooms.lock().map_err(|_| EngineError::Meeting {
            message: "room registry lock poisoned".to_string(),
        })
    }
}

impl MeetingProvider for LocalMeetingProvider {
    fn create_room(&self, request: &RoomRequest, now: DateTime<Utc>) -> EngineResult<MeetingInfo> {
        self.lock()?.insert(request.room_name.clone());

        Ok(MeetingInfo {
            room_name: request.room_name.clone(),
            meeting_url: format!("{}/rooms/{}", self.base_url, request.room_name),
            platform: self.platform.clone(),
            created_at: now,
            expires_at: request.expires_at,
            max_participants: request.max_participants,
            recording_enabled: request.recording_enabled,
            ended_at: None,
        })
    }

    fn room_exists(&self, room_name: &str) -> EngineResult<bool> {
        Ok(self.lock()?.contains(room_name))
    }

    fn end_room(&self, room_name: &str) -> EngineResult<()> {
        self.lock()?.remove(room_name);
        Ok(())
    }
}

/// Returns the deterministic room name of a session.
///
/// # Example
///
/// ```
/// use academy_sessions::meetings::room_name;
/// use academy_sessions::models::{Academy, Session, SessionKind, SessionType};
/// use chrono::Utc;
///
/// let academy = Academy::new(1, "Noor Academy", "noor");
/// let session = Session::new(42, 1, SessionKind::Quran, SessionType::Group, 10, Utc::now(), 60);
/// assert_eq!(room_name(&academy, &session), "noor-quran-session-42");
/// ```
pub fn room_name(academy: &Academy, session: &Session) -> String {
    format!("{}-{}-session-{}", academy.subdomain, session.kind, session.id)
}

/// Makes sure the session has a live, unexpired meeting.
///
/// An existing meeting is reused when it is still valid and its room is
/// live on the platform. Otherwise a room is created and stored on the
/// session. Returns true if a room was created.
pub fn ensure_meeting(
    session: &mut Session,
    academy: &Academy,
    provider: &dyn MeetingProvider,
    config: &ConfigLoader,
    now: DateTime<Utc>,
) -> EngineResult<bool> {
    if let Some(meeting) = &session.meeting {
        if meeting.is_valid_at(now) && provider.room_exists(&meeting.room_name)? {
            return Ok(false);
        }
    }

    let meeting_settings = config.meeting();
    let academy_settings = config.academy_settings(academy.id);
    let request = RoomRequest {
        room_name: room_name(academy, session),
        max_participants: academy_settings.max_participants,
        empty_timeout_secs: room_empty_timeout_secs(session, now, meeting_settings),
        max_duration_secs: room_max_duration_secs(session, meeting_settings),
        recording_enabled: academy_settings.recording_enabled,
        expires_at: session.scheduled_end()
            + Duration::minutes(meeting_settings.overtime_buffer_minutes),
    };

    let meeting = provider.create_room(&request, now)?;
    tracing::info!(
        session_id = session.id,
        academy_id = academy.id,
        room = %meeting.room_name,
        expires_at = %meeting.expires_at,
        "Created meeting room"
    );
    session.meeting = Some(meeting);

    Ok(true)
}

/// Closes the session's room, keeping the meeting data for history.
///
/// Returns true if a room was closed.
pub fn end_meeting(
    session: &mut Session,
    provider: &dyn MeetingProvider,
    now: DateTime<Utc>,
) -> EngineResult<bool> {
    let Some(meeting) = session.meeting.as_mut() else {
        return Ok(false);
    };
    if meeting.ended_at.is_some() {
        return Ok(false);
    }

    provider.end_room(&meeting.room_name)?;
    meeting.ended_at = Some(now);

    tracing::info!(
        session_id = session.id,
        room = %meeting.room_name,
        "Ended meeting room"
    );

    Ok(true)
}
