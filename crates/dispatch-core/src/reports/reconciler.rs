//! Pulls vendor reports and marks confirmed letters as posted

use super::parser::ReportParser;
use crate::config::TransferConfig;
use crate::error::Result;
use crate::store::LetterStore;
use crate::transfer::channel::{bounded, TransferChannel, TransferSession};
use crate::transfer::RetryPolicy;
use dispatch_types::{LetterStatus, LetterUpdate, ParsedReport};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Effect of applying one parsed report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub posted: usize,
    /// Letters that were already `Posted`, left untouched
    pub already_posted: usize,
    pub not_found: Vec<Uuid>,
    pub unexpected_state: Vec<(Uuid, LetterStatus)>,
    pub storage_errors: usize,
}

impl ApplySummary {
    pub fn anomalies(&self) -> usize {
        self.not_found.len() + self.unexpected_state.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconciliationSummary {
    pub reports_processed: usize,
    pub reports_failed: Vec<(String, String)>,
    pub reports_deleted: usize,
    pub letters_posted: usize,
    pub anomalies: usize,
}

pub struct ReportReconciler {
    channel: Arc<dyn TransferChannel>,
    store: Arc<dyn LetterStore>,
    parser: ReportParser,
    retry: RetryPolicy,
    timeout: Duration,
    delete_processed: bool,
}

impl ReportReconciler {
    /// Channel calls use the timeout and retry policy of `transfer`
    pub fn new(
        channel: Arc<dyn TransferChannel>,
        store: Arc<dyn LetterStore>,
        parser: ReportParser,
        transfer: &TransferConfig,
        delete_processed: bool,
    ) -> Self {
        Self {
            channel,
            store,
            parser,
            retry: RetryPolicy::from_config(transfer),
            timeout: transfer.timeout(),
            delete_processed,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read the report at `path` and parse its rows. Only the download is
    /// retried; a report that does not parse will not parse next time either.
    pub async fn fetch_and_parse(&self, session: &mut dyn TransferSession, path: &str) -> Result<ParsedReport> {
        let content = self.download(session, path).await?;
        let report = self.parser.parse(path, &content)?;

        debug!(
            "Parsed report {}: {} statuses, all rows parsed: {}",
            path,
            report.statuses().len(),
            report.all_rows_parsed()
        );
        Ok(report)
    }

    async fn connect(&self) -> Result<Box<dyn TransferSession>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match bounded(self.timeout, self.channel.connect()).await {
                Ok(session) => return Ok(session),
                Err(e) => {
                    if !self.retry.backoff("Opening report session", attempt, &e).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn list_reports(&self, session: &mut dyn TransferSession) -> Result<Vec<String>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match bounded(self.timeout, session.list_reports()).await {
                Ok(paths) => return Ok(paths),
                Err(e) => {
                    if !self.retry.backoff("Listing reports", attempt, &e).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn download(&self, session: &mut dyn TransferSession, path: &str) -> Result<Vec<u8>> {
        let operation = format!("Download of {}", path);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match bounded(self.timeout, session.download(path)).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    if !self.retry.backoff(&operation, attempt, &e).await {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Mark each confirmed letter as posted. Only letters still awaiting
    /// confirmation change, so applying the same report twice is a no-op.
    pub async fn apply(&self, report: &ParsedReport) -> ApplySummary {
        let mut summary = ApplySummary::default();

        for status in report.statuses() {
            let moved = self
                .store
                .compare_and_set_status(
                    status.id,
                    LetterStatus::AwaitingConfirmation,
                    LetterStatus::Posted,
                    LetterUpdate::printed(status.printed_at),
                )
                .await;

            match moved {
                Ok(true) => {
                    debug!("Letter {} printed at {}", status.id, status.printed_at);
                    summary.posted += 1;
                }
                Ok(false) => self.record_skipped(status.id, report.path(), &mut summary).await,
                Err(e) => {
                    error!("Failed to mark letter {} as posted: {}", status.id, e);
                    summary.storage_errors += 1;
                }
            }
        }

        summary
    }

    async fn record_skipped(&self, id: Uuid, path: &str, summary: &mut ApplySummary) {
        match self.store.get(id).await {
            Ok(Some(letter)) if letter.status == LetterStatus::Posted => {
                debug!("Letter {} from {} already posted", id, path);
                summary.already_posted += 1;
            }
            Ok(Some(letter)) => {
                warn!("Report {} confirms letter {} which is {}", path, id, letter.status);
                summary.unexpected_state.push((id, letter.status));
            }
            Ok(None) => {
                warn!("Report {} references unknown letter {}", path, id);
                summary.not_found.push(id);
            }
            Err(e) => {
                error!("Failed to load letter {} referenced by {}: {}", id, path, e);
                summary.storage_errors += 1;
            }
        }
    }

    /// Fetch, parse and apply every available report
    pub async fn run_reconciliation_cycle(&self) -> Result<ReconciliationSummary> {
        let mut session = self.connect().await?;
        let paths = self.list_reports(session.as_mut()).await?;

        let mut summary = ReconciliationSummary::default();
        if paths.is_empty() {
            debug!("No reports to reconcile");
        }

        for path in paths {
            let report = match self.fetch_and_parse(session.as_mut(), &path).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Failed to process report {}: {}", path, e);
                    summary.reports_failed.push((path, e.to_string()));
                    continue;
                }
            };

            let applied = self.apply(&report).await;
            summary.reports_processed += 1;
            summary.letters_posted += applied.posted;
            summary.anomalies += applied.anomalies();

            if !report.all_rows_parsed() {
                warn!("Report {} had unparseable rows, keeping it for inspection", path);
                continue;
            }

            if self.delete_processed && applied.storage_errors == 0 {
                match bounded(self.timeout, session.delete_report(&path)).await {
                    Ok(()) => summary.reports_deleted += 1,
                    Err(e) => warn!("Failed to delete processed report {}: {}", path, e),
                }
            }
        }

        info!(
            "Reconciliation finished: {} reports, {} letters posted, {} anomalies, {} failed reports",
            summary.reports_processed,
            summary.letters_posted,
            summary.anomalies,
            summary.reports_failed.len()
        );
        Ok(summary)
    }
}
