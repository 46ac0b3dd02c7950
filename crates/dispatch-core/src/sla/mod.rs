//! Print SLA tracking

pub mod business_days;
pub mod escalation;

pub use business_days::subtract_business_days;
pub use escalation::{EscalationScanner, StaleLetter};
