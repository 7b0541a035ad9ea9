//! Teacher profile model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pay rates a teacher is contracted at. Any rate may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherRates {
    /// Flat amount per individual session.
    #[serde(default)]
    pub individual: Option<Decimal>,
    /// Flat amount per group session.
    #[serde(default)]
    pub group: Option<Decimal>,
    /// Amount per present student in a group session.
    #[serde(default)]
    pub per_student: Option<Decimal>,
    /// Amount per interactive course session.
    #[serde(default)]
    pub per_session: Option<Decimal>,
    /// Fixed amount per interactive course session, preferred over `per_session`.
    #[serde(default)]
    pub fixed: Option<Decimal>,
}

/// A teacher employed by an academy.
///
/// # Example
///
/// ```
/// use academy_sessions::models::{TeacherProfile, TeacherRates};
/// use rust_decimal::Decimal;
///
/// let teacher = TeacherProfile {
///     id: 10,
///     academy_id: 1,
///     name: "Teacher".to_string(),
///     rates: TeacherRates {
///         individual: Some(Decimal::from(25)),
///         ..Default::default()
///     },
/// };
/// assert_eq!(teacher.rates.individual, Some(Decimal::from(25)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeacherProfile {
    /// User id of the teacher.
    pub id: u64,
    /// Employing academy.
    pub academy_id: u64,
    /// Display name.
    pub name: String,
    /// Contracted rates.
    #[serde(default)]
    pub rates: TeacherRates,
}
