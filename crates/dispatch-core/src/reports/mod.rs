//! Vendor confirmation reports

pub mod parser;
pub mod reconciler;

pub use parser::ReportParser;
pub use reconciler::{ApplySummary, ReconciliationSummary, ReportReconciler};

use serde::{Deserialize, Serialize};

/// Where a report row's letter id comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Each row names the uploaded file it confirms
    #[default]
    RowFilename,
    /// The report is named after a single batch and its rows only carry times
    ReportFilename,
}
