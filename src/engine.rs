//! The shared engine handle.
//!
//! An [`Engine`] bundles configuration, storage and the meeting provider.
//! Jobs, lifecycle transitions and HTTP handlers all run against one.

use std::sync::Arc;

use crate::calculation::AttendanceRules;
use crate::config::ConfigLoader;
use crate::error::{EngineError, EngineResult};
use crate::meetings::{LocalMeetingProvider, MeetingProvider};
use crate::models::{Academy, Session};
use crate::store::{MemoryStore, Store};

/// Configuration, storage and meeting provider shared by every operation.
///
/// Cloning is cheap; clones share the same store and provider.
#[derive(Clone)]
pub struct Engine {
    config: Arc<ConfigLoader>,
    store: Arc<dyn Store>,
    meetings: Arc<dyn MeetingProvider>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine from its parts.
    pub fn new(
        config: Arc<ConfigLoader>,
        store: Arc<dyn Store>,
        meetings: Arc<dyn MeetingProvider>,
    ) -> Self {
        Self {
            config,
            store,
            meetings,
        }
    }

    /// Creates an engine backed by a [`MemoryStore`] and a [`LocalMeetingProvider`].
    pub fn in_memory(config: ConfigLoader) -> Self {
        let meetings = LocalMeetingProvider::from_config(&config);
        Self::new(
            Arc::new(config),
            Arc::new(MemoryStore::new()),
            Arc::new(meetings),
        )
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConfigLoader {
        &self.config
    }

    /// Returns the store.
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Returns the meeting provider.
    pub fn meetings(&self) -> &dyn MeetingProvider {
        self.meetings.as_ref()
    }

    /// Loads a session or fails with [`EngineError::SessionNotFound`].
    pub fn session(&self, session_id: u64) -> EngineResult<Session> {
        self.store
            .get_session(session_id)?
            .ok_or(EngineError::SessionNotFound { session_id })
    }

    /// Loads an academy or fails with [`EngineError::AcademyNotFound`].
    pub fn academy(&self, academy_id: u64) -> EngineResult<Academy> {
        self.store
            .get_academy(academy_id)?
            .ok_or(EngineError::AcademyNotFound { academy_id })
    }

    /// Returns the classification rules for an academy, with its late tolerance.
    pub fn attendance_rules(&self, academy_id: u64) -> AttendanceRules {
        AttendanceRules::from_settings(self.config.attendance())
            .with_grace(self.config.academy_settings(academy_id).late_tolerance_minutes)
    }
}
