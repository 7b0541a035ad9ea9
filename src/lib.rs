//! Session lifecycle and attendance engine for tutoring academies.
//!
//! This crate tracks who was in each meeting room and for how long,
//! reconciles join/leave webhooks into per-session attendance, moves
//! sessions through their lifecycle, and records what each teacher
//! earned. Every academy (tenant) runs against the same engine with its
//! own settings overrides.

#![warn(missing_docs)]

pub mod api;
pub mod calculation;
pub mod config;
pub mod engine;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod meetings;
pub mod models;
pub mod reconciliation;
pub mod store;
pub mod tracking;
