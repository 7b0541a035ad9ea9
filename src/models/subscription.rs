//! Subscription model.
//!
//! A subscription allots a number of sessions to a student. Individual
//! sessions consume from it as they complete; running out pauses it until
//! renewal.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Awaiting payment.
    Pending,
    /// Sessions may be consumed.
    Active,
    /// Temporarily stopped.
    Paused,
    /// Terminated.
    Cancelled,
}

/// Why a subscription was paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Every allotted session was used; waiting for renewal.
    SessionsExhausted,
    /// Paused by the student or an admin.
    Manual,
}

/// A student's session allotment.
///
/// # Example
///
/// ```
/// use academy_sessions::models::{Subscription, SubscriptionStatus};
/// use chrono::Utc;
/// use rust_decimal::Decimal;
///
/// let mut subscription = Subscription::new(1, 1, 20, 1, Decimal::from(100));
/// subscription.use_session(Utc::now()).unwrap();
/// assert_eq!(subscription.sessions_remaining, 0);
/// assert_eq!(subscription.status, SubscriptionStatus::Paused);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique identifier.
    pub id: u64,
    /// Owning academy.
    pub academy_id: u64,
    /// Subscribed student.
    pub student_id: u64,
    /// Sessions allotted.
    pub total_sessions: u32,
    /// Sessions consumed.
    pub sessions_used: u32,
    /// Sessions left.
    pub sessions_remaining: u32,
    /// Lifecycle state.
    pub status: SubscriptionStatus,
    /// When it was paused.
    #[serde(default)]
    pub paused_at: Option<DateTime<Utc>>,
    /// Why it was paused.
    #[serde(default)]
    pub pause_reason: Option<PauseReason>,
    /// Price paid for the allotment.
    pub final_price: Decimal,
    /// When a session was last consumed.
    #[serde(default)]
    pub last_session_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Creates an active subscription with nothing used.
    pub fn new(
        id: u64,
        academy_id: u64,
        student_id: u64,
        total_sessions: u32,
        final_price: Decimal,
    ) -> Self {
        Self {
            id,
            academy_id,
            student_id,
            total_sessions,
            sessions_used: 0,
            sessions_remaining: total_sessions,
            status: SubscriptionStatus::Active,
            paused_at: None,
            pause_reason: None,
            final_price,
            last_session_at: None,
        }
    }

    /// Consumes one session.
    ///
    /// Returns [`EngineError::SubscriptionExhausted`] when nothing is left.
    /// Consuming the last session pauses the subscription for renewal.
    pub fn use_session(&mut self, now: DateTime<Utc>) -> EngineResult<()> {
        if self.sessions_remaining == 0 {
            return Err(EngineError::SubscriptionExhausted {
                subscription_id: self.id,
            });
        }

        self.sessions_used += 1;
        self.sessions_remaining -= 1;
        self.last_session_at = Some(now);

        if self.sessions_remaining == 0 {
            self.status = SubscriptionStatus::Paused;
            self.paused_at = Some(now);
            self.pause_reason = Some(PauseReason::SessionsExhausted);
        }

        Ok(())
    }

    /// Gives back one consumed session.
    ///
    /// A subscription paused because it ran out becomes active again. Any
    /// other pause stays in place.
    pub fn return_session(&mut self) {
        if self.sessions_used == 0 {
            return;
        }

        self.sessions_used -= 1;
        self.sessions_remaining += 1;

        if self.status == SubscriptionStatus::Paused
            && self.pause_reason == Some(PauseReason::SessionsExhausted)
        {
            self.status = SubscriptionStatus::Active;
            self.paused_at = None;
            self.pause_reason = None;
        }
    }

    /// Adds sessions to the allotment, reactivating an exhausted subscription.
    pub fn add_sessions(&mut self, count: u32) {
        self.total_sessions += count;
        self.sessions_remaining += count;

        if count > 0
            && self.status == SubscriptionStatus::Paused
            && self.pause_reason == Some(PauseReason::SessionsExhausted)
        {
            self.status = SubscriptionStatus::Active;
            self.paused_at = None;
            self.pause_reason = None;
        }
    }

    /// Returns the used share of the allotment as a percentage, rounded to 2 dp.
    pub fn completion_rate(&self) -> Decimal {
        if self.total_sessions == 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.sessions_used) / Decimal::from(self.total_sessions)
            * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Returns the price of one session, rounded to 2 dp.
    pub fn price_per_session(&self) -> Decimal {
        if self.total_sessions == 0 {
            return Decimal::ZERO;
        }
        (self.final_price / Decimal::from(self.total_sessions))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }
}
