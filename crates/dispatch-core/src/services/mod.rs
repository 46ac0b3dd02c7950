//! Service modules for business logic

pub mod letter_service;

pub use letter_service::{LetterService, SubmissionOutcome, SubmitLetter};
