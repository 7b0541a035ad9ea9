//! Configuration loading and management for the session engine.
//!
//! This module loads engine settings and per-academy overrides from YAML
//! files.
//!
//! # Example
//!
//! ```no_run
//! use academy_sessions::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/default").unwrap();
//! println!("Grace period: {} minutes", config.attendance().grace_period_minutes);
//! ```

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::{
    AcademyOverrides, AcademySettings, AttendanceSettings, EngineConfig, EngineSettings,
    JobSettings, MeetingSettings, RetrySettings,
};
