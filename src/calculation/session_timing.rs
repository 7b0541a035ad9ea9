//! Session timing phases, join windows and room lifetimes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{AcademySettings, MeetingSettings};
use crate::models::{ParticipantRole, Session, SessionWindow};

/// Where `now` falls relative to a session's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Before the preparation window.
    TooEarly,
    /// Inside the preparation window, before the start.
    PreSession,
    /// Between start and end.
    Active,
    /// After the end, inside the buffer.
    PostSession,
    /// After the buffer.
    Expired,
}

/// Timing details of a session at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTiming {
    /// Current phase.
    pub phase: SessionPhase,
    /// Whether the meeting can be entered now.
    pub is_available: bool,
    /// Minutes until the preparation window opens.
    pub minutes_until_available: Option<i64>,
    /// Minutes until the scheduled start.
    pub minutes_until_start: Option<i64>,
    /// Minutes until the scheduled end.
    pub minutes_remaining: Option<i64>,
    /// Minutes since the scheduled end.
    pub minutes_since_end: Option<i64>,
    /// Scheduled start.
    pub scheduled_start: DateTime<Utc>,
    /// Scheduled end.
    pub scheduled_end: DateTime<Utc>,
}

/// Rounds a duration up to whole minutes.
fn ceil_minutes(duration: Duration) -> i64 {
    let seconds = duration.num_seconds();
    (seconds + 59).div_euclid(60)
}

/// Classifies `now` against the session schedule.
///
/// The meeting becomes available `preparation_minutes` before the start
/// and stays available until `buffer_minutes` after the end.
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::{SessionPhase, session_timing};
/// use academy_sessions::config::EngineConfig;
/// use academy_sessions::models::{Session, SessionKind, SessionType};
/// use chrono::{DateTime, Utc};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
/// let session = Session::new(
///     1, 1, SessionKind::Quran, SessionType::Individual, 10,
///     at("2026-01-15T09:00:00Z"), 60,
/// );
/// let settings = EngineConfig::default().academy_settings(1);
///
/// let timing = session_timing(&session, &settings, at("2026-01-15T08:55:00Z"));
/// assert_eq!(timing.phase, SessionPhase::PreSession);
/// assert!(timing.is_available);
/// assert_eq!(timing.minutes_until_start, Some(5));
/// ```
pub fn session_timing(
    session: &Session,
    settings: &AcademySettings,
    now: DateTime<Utc>,
) -> SessionTiming {
    let start = session.scheduled_at;
    let end = session.scheduled_end();
    let opens = start - Duration::minutes(settings.preparation_minutes);
    let expires = end + Duration::minutes(settings.buffer_minutes);

    let mut timing = SessionTiming {
        phase: SessionPhase::Expired,
        is_available: false,
        minutes_until_available: None,
        minutes_until_start: None,
        minutes_remaining: None,
        minutes_since_end: None,
        scheduled_start: start,
        scheduled_end: end,
    };

    if now < opens {
        timing.phase = SessionPhase::TooEarly;
        timing.minutes_until_available = Some(ceil_minutes(opens - now));
        timing.minutes_until_start = Some(ceil_minutes(start - now));
    } else if now < start {
        timing.phase = SessionPhase::PreSession;
        timing.is_available = true;
        timing.minutes_until_start = Some(ceil_minutes(start - now));
    } else if now < end {
        timing.phase = SessionPhase::Active;
        timing.is_available = true;
        timing.minutes_remaining = Some(ceil_minutes(end - now));
    } else if now < expires {
        timing.phase = SessionPhase::PostSession;
        timing.is_available = true;
        timing.minutes_since_end = Some((now - end).num_minutes());
    } else {
        timing.minutes_since_end = Some((now - end).num_minutes());
    }

    timing
}

/// Returns true if a participant in `role` may enter at `now`.
///
/// Teachers get a wider window than students on both sides. A session
/// without a schedule is always joinable.
///
/// # Example
///
/// ```
/// use academy_sessions::calculation::can_join_window;
/// use academy_sessions::config::MeetingSettings;
/// use academy_sessions::models::{ParticipantRole, SessionWindow};
/// use chrono::{DateTime, Utc};
///
/// let at = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
/// let window = SessionWindow::from_duration(at("2026-01-15T09:00:00Z"), 60);
/// let settings = MeetingSettings::default();
/// let early = at("2026-01-15T08:40:00Z");
///
/// assert!(can_join_window(Some(&window), ParticipantRole::Teacher, early, &settings));
/// assert!(!can_join_window(Some(&window), ParticipantRole::Student, early, &settings));
/// assert!(can_join_window(None, ParticipantRole::Student, early, &settings));
/// ```
pub fn can_join_window(
    window: Option<&SessionWindow>,
    role: ParticipantRole,
    now: DateTime<Utc>,
    settings: &MeetingSettings,
) -> bool {
    let Some(window) = window else {
        return true;
    };

    let (before, after) = match role {
        ParticipantRole::Teacher => (
            settings.teacher_join_before_minutes,
            settings.teacher_join_after_minutes,
        ),
        ParticipantRole::Student => (
            settings.student_join_before_minutes,
            settings.student_join_after_minutes,
        ),
    };

    now >= window.start - Duration::minutes(before) && now <= window.end + Duration::minutes(after)
}

/// Returns true if a participant in `role` may enter the session at `now`.
pub fn can_join(
    session: &Session,
    role: ParticipantRole,
    now: DateTime<Utc>,
    settings: &MeetingSettings,
) -> bool {
    !session.status.is_final() && can_join_window(Some(&session.window()), role, now, settings)
}

/// Returns how long an empty room stays open, in seconds.
///
/// Rooms of sessions that have not ended stay open until the end plus the
/// timeout buffer; rooms of ended sessions use the fixed default.
pub fn room_empty_timeout_secs(
    session: &Session,
    now: DateTime<Utc>,
    settings: &MeetingSettings,
) -> i64 {
    let end = session.scheduled_end();
    if now >= end {
        return settings.empty_timeout_seconds;
    }

    let minutes_until_end = (end - now).num_minutes();
    (minutes_until_end + settings.timeout_buffer_minutes) * 60
}

/// Returns the maximum lifetime of a room, in seconds.
pub fn room_max_duration_secs(session: &Session, settings: &MeetingSettings) -> i64 {
    (session.window().duration_minutes() + settings.overtime_buffer_minutes) * 60
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::models::{SessionKind, SessionStatus, SessionType};

    fn make_datetime(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn session() -> Session {
        Session::new(
            1,
            1,
            SessionKind::Academic,
            SessionType::Individual,
            10,
            make_datetime("2026-01-15T09:00:00Z"),
            60,
        )
    }

    fn academy_settings() -> AcademySettings {
        EngineConfig::default().academy_settings(1)
    }

    #[test]
    fn test_phase_too_early() {
        let timing = session_timing(
            &session(),
            &academy_settings(),
            make_datetime("2026-01-15T08:30:00Z"),
        );
        assert_eq!(timing.phase, SessionPhase::TooEarly);
        assert!(!timing.is_available);
        assert_eq!(timing.minutes_until_available, Some(20));
        assert_eq!(timing.minutes_until_start, Some(30));
    }

    #[test]
    fn test_phase_active() {
        let timing = session_timing(
            &session(),
            &academy_settings(),
            make_datetime("2026-01-15T09:45:00Z"),
        );
        assert_eq!(timing.phase, SessionPhase::Active);
        assert_eq!(timing.minutes_remaining, Some(15));
    }

    #[test]
    fn test_phase_post_session_and_expired() {
        let post = session_timing(
            &session(),
            &academy_settings(),
            make_datetime("2026-01-15T10:03:00Z"),
        );
        assert_eq!(post.phase, SessionPhase::PostSession);
        assert_eq!(post.minutes_since_end, Some(3));

        let expired = session_timing(
            &session(),
            &academy_settings(),
            make_datetime("2026-01-15T10:05:00Z"),
        );
        assert_eq!(expired.phase, SessionPhase::Expired);
        assert!(!expired.is_available);
    }

    #[test]
    fn test_student_join_window() {
        let settings = MeetingSettings::default();
        let session = session();

        assert!(can_join(
            &session,
            ParticipantRole::Student,
            make_datetime("2026-01-15T08:45:00Z"),
            &settings
        ));
        assert!(can_join(
            &session,
            ParticipantRole::Student,
            make_datetime("2026-01-15T10:30:00Z"),
            &settings
        ));
        assert!(!can_join(
            &session,
            ParticipantRole::Student,
            make_datetime("2026-01-15T10:31:00Z"),
            &settings
        ));
    }

    #[test]
    fn test_teacher_join_window() {
        let settings = MeetingSettings::default();
        let session = session();

        assert!(can_join(
            &session,
            ParticipantRole::Teacher,
            make_datetime("2026-01-15T08:30:00Z"),
            &settings
        ));
        assert!(can_join(
            &session,
            ParticipantRole::Teacher,
            make_datetime("2026-01-15T12:00:00Z"),
            &settings
        ));
        assert!(!can_join(
            &session,
            ParticipantRole::Teacher,
            make_datetime("2026-01-15T12:01:00Z"),
            &settings
        ));
    }

    #[test]
    fn test_cancelled_session_not_joinable() {
        let mut session = session();
        session.status = SessionStatus::Cancelled;
        assert!(!can_join(
            &session,
            ParticipantRole::Teacher,
            make_datetime("2026-01-15T09:10:00Z"),
            &MeetingSettings::default()
        ));
    }

    #[test]
    fn test_room_lifetimes() {
        let settings = MeetingSettings::default();
        let session = session();

        assert_eq!(
            room_empty_timeout_secs(&session, make_datetime("2026-01-15T09:20:00Z"), &settings),
            (40 + 30) * 60
        );
        assert_eq!(
            room_empty_timeout_secs(&session, make_datetime("2026-01-15T10:20:00Z"), &settings),
            1800
        );
        assert_eq!(room_max_duration_secs(&session, &settings), (60 + 60) * 60);
    }
}
