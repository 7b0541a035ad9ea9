//! Application state for the session engine API.
//!
//! This module defines the shared application state that is available
//! to all request handlers.

use chrono::{DateTime, Utc};

use crate::engine::Engine;

/// Shared application state.
///
/// Contains the engine every handler runs against and the clock used to
/// stamp requests.
#[derive(Clone)]
pub struct AppState {
    engine: Engine,
    clock: fn() -> DateTime<Utc>,
}

impl AppState {
    /// Creates a new application state reading the wall clock.
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            clock: Utc::now,
        }
    }

    /// Creates a state with a fixed clock.
    pub fn with_clock(engine: Engine, clock: fn() -> DateTime<Utc>) -> Self {
        Self { engine, clock }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the current time.
    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}
