pub mod appointment;
pub mod enums;
pub mod event;
pub mod patient;
pub mod provider;
pub mod tooth_diagnosis;
pub mod treatment;

pub use appointment::{Appointment, AppointmentToothLink};
pub use event::ClinicalEvent;
pub use patient::Patient;
pub use provider::Provider;
pub use tooth_diagnosis::ToothDiagnosis;
pub use treatment::Treatment;
