//! Read-side assembly of display-ready chart views.
//!
//! Pure reads: no locks, no side effects, unlimited read concurrency.
//! Missing joins degrade to placeholder labels instead of failing the
//! view.

pub mod diagnosis;
pub mod treatment;

pub use diagnosis::{get_diagnosis_overview, DiagnosisOverviewRow};
pub use treatment::{get_treatment_overview, TreatmentOverviewRow};
