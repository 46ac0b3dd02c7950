//! Availability-gated upload of letter archives with retry

use super::archive::build_archive;
use super::channel::{bounded, TransferChannel, TransferSession};
use super::retry::RetryPolicy;
use crate::config::{DowntimeWindow, TransferConfig};
use crate::error::{DispatchError, Result};
use crate::naming::{archive_entry_name, archive_name};
use crate::store::LetterStore;
use chrono::{DateTime, Utc};
use dispatch_types::{Letter, LetterStatus, LetterUpdate};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Whether an upload cycle may proceed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Inside the vendor's daily downtime window
    Downtime,
    Unreachable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

/// What happened to one letter during an upload cycle
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Uploaded {
        id: Uuid,
        file_name: String,
        attempts: u32,
    },
    /// Terminal failure, letter moved to `FailedToUpload`
    Failed {
        id: Uuid,
        error: String,
        attempts: u32,
    },
    /// Letter was not in a state that allows upload
    Skipped { id: Uuid, reason: String },
}

#[derive(Debug, Clone)]
pub struct UploadCycleReport {
    pub started_at: DateTime<Utc>,
    pub availability: Availability,
    pub outcomes: Vec<UploadOutcome>,
}

impl UploadCycleReport {
    fn skipped(started_at: DateTime<Utc>, availability: Availability) -> Self {
        Self {
            started_at,
            availability,
            outcomes: Vec::new(),
        }
    }

    pub fn was_skipped(&self) -> bool {
        !self.availability.is_available()
    }

    pub fn uploaded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UploadOutcome::Uploaded { .. }))
            .count()
    }

    /// Letters that need operator attention
    pub fn failed_ids(&self) -> Vec<Uuid> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                UploadOutcome::Failed { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }
}

pub struct TransferGateway {
    channel: Arc<dyn TransferChannel>,
    store: Arc<dyn LetterStore>,
    retry: RetryPolicy,
    timeout: Duration,
    downtime: Option<DowntimeWindow>,
    max_letters_per_cycle: usize,
}

impl TransferGateway {
    pub fn new(channel: Arc<dyn TransferChannel>, store: Arc<dyn LetterStore>, config: &TransferConfig) -> Self {
        Self {
            channel,
            store,
            retry: RetryPolicy::from_config(config),
            timeout: config.timeout(),
            downtime: config.downtime,
            max_letters_per_cycle: config.max_letters_per_cycle,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check the destination before any upload is attempted
    pub async fn check_availability(&self, session: &mut dyn TransferSession, now: DateTime<Utc>) -> Availability {
        if let Some(window) = &self.downtime {
            if window.contains(now.time()) {
                return Availability::Downtime;
            }
        }

        match bounded(self.timeout, session.is_reachable()).await {
            Ok(true) => Availability::Available,
            Ok(false) => Availability::Unreachable("destination is not reachable".to_string()),
            Err(e) => Availability::Unreachable(e.to_string()),
        }
    }

    /// Upload every `Validated` letter, unless the destination is unavailable
    pub async fn run_upload_cycle(&self) -> Result<UploadCycleReport> {
        let started_at = Utc::now();

        let mut session = match bounded(self.timeout, self.channel.connect()).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Skipping upload cycle, could not open transfer session: {}", e);
                return Ok(UploadCycleReport::skipped(started_at, Availability::Unreachable(e.to_string())));
            }
        };

        let availability = self.check_availability(session.as_mut(), started_at).await;
        if !availability.is_available() {
            warn!("Skipping upload cycle, destination unavailable: {:?}", availability);
            return Ok(UploadCycleReport::skipped(started_at, availability));
        }

        let letters = self.store.find_by_status(LetterStatus::Validated).await?;
        if letters.is_empty() {
            debug!("No letters waiting for upload");
        }

        let mut report = UploadCycleReport::skipped(started_at, Availability::Available);
        for letter in letters.into_iter().take(self.max_letters_per_cycle) {
            let outcome = self.upload(session.as_mut(), &letter, started_at).await;
            report.outcomes.push(outcome);
        }

        let failed = report.failed_ids();
        info!(
            "Upload cycle finished: {} uploaded, {} failed, {} processed",
            report.uploaded_count(),
            failed.len(),
            report.outcomes.len()
        );
        if !failed.is_empty() {
            error!("Letters failed to upload and need operator attention: {:?}", failed);
        }

        Ok(report)
    }

    /// Archive and upload one letter, then record the outcome in the store
    pub async fn upload(
        &self,
        session: &mut dyn TransferSession,
        letter: &Letter,
        batch_time: DateTime<Utc>,
    ) -> UploadOutcome {
        if letter.status != LetterStatus::Validated {
            return UploadOutcome::Skipped {
                id: letter.id,
                reason: format!("letter is {}", letter.status),
            };
        }

        let content = match &letter.file_content {
            Some(content) => content,
            None => return self.mark_failed(letter.id, "letter has no content to upload".to_string(), 0).await,
        };

        let file_name = archive_name(&letter.letter_type, &letter.service, batch_time, letter.id);
        let entry_name = archive_entry_name(&letter.letter_type, &letter.service, batch_time, letter.id);

        let archive = match build_archive(&entry_name, content) {
            Ok(archive) => archive,
            Err(e) => return self.mark_failed(letter.id, e.to_string(), 0).await,
        };

        match self.upload_with_retry(session, &file_name, &archive).await {
            Ok(attempts) => self.mark_uploaded(letter.id, file_name, attempts).await,
            Err((e, attempts)) => self.mark_failed(letter.id, e.to_string(), attempts).await,
        }
    }

    /// Returns the number of attempts used, or the last error with the attempt count
    async fn upload_with_retry(
        &self,
        session: &mut dyn TransferSession,
        file_name: &str,
        archive: &[u8],
    ) -> std::result::Result<u32, (DispatchError, u32)> {
        let operation = format!("Upload of {}", file_name);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match bounded(self.timeout, session.upload(file_name, archive)).await {
                Ok(()) => return Ok(attempt),
                Err(e) => {
                    if !self.retry.backoff(&operation, attempt, &e).await {
                        return Err((e, attempt));
                    }
                }
            }
        }
    }

    async fn mark_uploaded(&self, id: Uuid, file_name: String, attempts: u32) -> UploadOutcome {
        let sent_to_print_at = Utc::now();

        match self
            .store
            .compare_and_set_status(id, LetterStatus::Validated, LetterStatus::Uploaded, LetterUpdate::uploaded(sent_to_print_at))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!("Letter {} changed state while {} was uploading", id, file_name);
                return UploadOutcome::Skipped {
                    id,
                    reason: "letter changed state during upload".to_string(),
                };
            }
            Err(e) => {
                error!("Uploaded {} but could not record it for letter {}: {}", file_name, id, e);
                return UploadOutcome::Failed {
                    id,
                    error: e.to_string(),
                    attempts,
                };
            }
        }

        if let Err(e) = self
            .store
            .compare_and_set_status(id, LetterStatus::Uploaded, LetterStatus::AwaitingConfirmation, LetterUpdate::default())
            .await
        {
            error!("Letter {} uploaded but not moved to AwaitingConfirmation: {}", id, e);
        }

        info!("Uploaded letter {} as {}", id, file_name);
        UploadOutcome::Uploaded { id, file_name, attempts }
    }

    async fn mark_failed(&self, id: Uuid, error: String, attempts: u32) -> UploadOutcome {
        error!("Letter {} failed to upload after {} attempt(s): {}", id, attempts, error);

        match self
            .store
            .compare_and_set_status(id, LetterStatus::Validated, LetterStatus::FailedToUpload, LetterUpdate::default())
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("Letter {} was no longer Validated when marking it FailedToUpload", id),
            Err(e) => error!("Could not mark letter {} as FailedToUpload: {}", id, e),
        }

        UploadOutcome::Failed { id, error, attempts }
    }
}
