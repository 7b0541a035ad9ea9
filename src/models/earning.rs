//! Teacher earning models.
//!
//! One [`TeacherEarning`] is recorded per finished session. Earnings move
//! through a small review flow: they can be disputed while open and
//! finalized once settled, but never both.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// How an earning amount was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    /// Flat individual-session rate.
    IndividualRate,
    /// Flat group-session rate.
    GroupRate,
    /// Rate per interactive course session.
    PerSession,
    /// Rate times present students.
    PerStudent,
    /// Fixed amount per interactive course session.
    Fixed,
}

impl CalculationMethod {
    /// Returns the lowercase identifier of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            CalculationMethod::IndividualRate => "individual_rate",
            CalculationMethod::GroupRate => "group_rate",
            CalculationMethod::PerSession => "per_session",
            CalculationMethod::PerStudent => "per_student",
            CalculationMethod::Fixed => "fixed",
        }
    }
}

impl fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Money owed to a teacher for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeacherEarning {
    /// Unique identifier.
    pub id: Uuid,
    /// Earning teacher.
    pub teacher_id: u64,
    /// Paying academy.
    pub academy_id: u64,
    /// Session the earning is for.
    pub session_id: u64,
    /// Amount owed.
    pub amount: Decimal,
    /// How the amount was derived.
    pub calculation_method: CalculationMethod,
    /// Payroll month, formatted `YYYY-MM`.
    pub earning_month: String,
    /// Whether the earning is locked for payout.
    #[serde(default)]
    pub is_finalized: bool,
    /// Whether the teacher contested the amount.
    #[serde(default)]
    pub is_disputed: bool,
    /// Notes attached to a dispute.
    #[serde(default)]
    pub dispute_notes: Option<String>,
    /// When the amount was calculated.
    pub calculated_at: DateTime<Utc>,
}

impl TeacherEarning {
    /// Locks the earning for payout.
    ///
    /// A disputed earning cannot be finalized until the dispute is resolved.
    pub fn finalize(&mut self) -> EngineResult<()> {
        if self.is_disputed {
            return Err(EngineError::InvalidEarningState {
                message: format!("earning {} is disputed", self.id),
            });
        }
        self.is_finalized = true;
        Ok(())
    }

    /// Marks the earning as contested.
    pub fn dispute(&mut self, notes: impl Into<String>) -> EngineResult<()> {
        if self.is_finalized {
            return Err(EngineError::InvalidEarningState {
                message: format!("earning {} is already finalized", self.id),
            });
        }
        self.is_disputed = true;
        self.dispute_notes = Some(notes.into());
        Ok(())
    }

    /// Clears a dispute.
    pub fn resolve_dispute(&mut self) {
        self.is_disputed = false;
    }
}

/// Count and sum of earnings for one calculation method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodTotals {
    /// Number of earnings.
    pub count: u32,
    /// Sum of amounts.
    pub amount: Decimal,
}

/// A teacher's earnings for one month, broken down by method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsSummary {
    /// The teacher.
    pub teacher_id: u64,
    /// The month, formatted `YYYY-MM`.
    pub month: String,
    /// Per-method totals.
    pub breakdown: BTreeMap<CalculationMethod, MethodTotals>,
    /// Number of earnings in the month.
    pub count: u32,
    /// Sum of every earning in the month.
    pub total_amount: Decimal,
    /// Sum of finalized earnings.
    pub finalized_amount: Decimal,
    /// Number of disputed earnings.
    pub disputed_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_earning() -> TeacherEarning {
        TeacherEarning {
            id: Uuid::new_v4(),
            teacher_id: 10,
            academy_id: 1,
            session_id: 1,
            amount: Decimal::from(25),
            calculation_method: CalculationMethod::IndividualRate,
            earning_month: "2026-01".to_string(),
            is_finalized: false,
            is_disputed: false,
            dispute_notes: None,
            calculated_at: Utc::now(),
        }
    }

    #[test]
    fn test_finalize_open_earning() {
        let mut earning = sample_earning();
        earning.finalize().unwrap();
        assert!(earning.is_finalized);
    }

    #[test]
    fn test_cannot_finalize_disputed() {
        let mut earning = sample_earning();
        earning.dispute("student was absent").unwrap();

        let err = earning.finalize().unwrap_err();
        assert!(matches!(err, EngineError::InvalidEarningState { .. }));

        earning.resolve_dispute();
        earning.finalize().unwrap();
    }

    #[test]
    fn test_cannot_dispute_finalized() {
        let mut earning = sample_earning();
        earning.finalize().unwrap();
        assert!(earning.dispute("late").is_err());
        assert!(earning.dispute_notes.is_none());
    }

    #[test]
    fn test_method_serializes_snake_case() {
        let json = serde_json::to_string(&CalculationMethod::PerStudent).unwrap();
        assert_eq!(json, "\"per_student\"");
        assert_eq!(CalculationMethod::IndividualRate.to_string(), "individual_rate");
    }
}
