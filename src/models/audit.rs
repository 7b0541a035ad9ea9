//! Audit trace models.
//!
//! Calculations record every decision they make as an [`AuditStep`] so
//! that a disputed attendance status or earning can be explained after
//! the fact.

use serde::{Deserialize, Serialize};

/// A single step in the audit trace recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for a rule application.
///
/// # Example
///
/// ```
/// use academy_sessions::models::AuditStep;
///
/// let step = AuditStep {
///     step_number: 1,
///     rule_id: "cycle_clipping".to_string(),
///     rule_name: "Clip Cycles To Session Window".to_string(),
///     input: serde_json::json!({"cycles": 2}),
///     output: serde_json::json!({"total_minutes": 40}),
///     reasoning: "2 cycles clipped to the session window: 40 minutes".to_string(),
/// };
/// assert_eq!(step.step_number, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The unique identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule.
    pub rule_name: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}
