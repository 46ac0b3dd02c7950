//! Letter Dispatch Core Library
//!
//! Sends assembled letters to the print vendor over a file-transfer channel,
//! reconciles the vendor's confirmation reports and flags letters that have
//! not been printed within the SLA.

pub mod clients;
pub mod config;
pub mod documents;
pub mod error;
pub mod naming;
pub mod reports;
pub mod services;
pub mod sla;
pub mod store;
pub mod tasks;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for easy access
pub use config::DispatchConfig;
pub use error::{DispatchError, Result};

pub use clients::{BankHolidaysClient, HolidaySource, StaticHolidays};
pub use documents::{AssembledDocument, DocumentAssembler};
pub use reports::{ReportFormat, ReportParser, ReportReconciler};
pub use services::{LetterService, SubmissionOutcome, SubmitLetter};
pub use sla::{subtract_business_days, EscalationScanner, StaleLetter};
pub use store::{FileLetterStore, InMemoryLetterStore, LetterStore};
pub use tasks::{PipelineTasks, TaskKind, TaskRun};
pub use transfer::{LocalDirectoryChannel, TransferChannel, TransferGateway, TransferSession};

pub use dispatch_types as types;
