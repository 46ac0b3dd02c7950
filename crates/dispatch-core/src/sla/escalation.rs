//! Finds letters the vendor has not confirmed within the print SLA

use super::business_days::subtract_business_days;
use crate::clients::HolidaySource;
use crate::config::SlaConfig;
use crate::error::Result;
use crate::store::LetterStore;
use chrono::{DateTime, NaiveDate, Utc};
use dispatch_types::LetterStatus;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// A letter sent to print before the SLA cutoff without a confirmed print
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleLetter {
    pub id: Uuid,
    pub service: String,
    pub letter_type: String,
    pub sent_to_print_at: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
}

pub struct EscalationScanner {
    store: Arc<dyn LetterStore>,
    holidays: Arc<dyn HolidaySource>,
    config: SlaConfig,
}

impl EscalationScanner {
    pub fn new(store: Arc<dyn LetterStore>, holidays: Arc<dyn HolidaySource>, config: SlaConfig) -> Self {
        Self {
            store,
            holidays,
            config,
        }
    }

    /// Latest sent-to-print time that is still within the SLA at `now`
    pub async fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let holidays: Vec<NaiveDate> = match self.holidays.holidays().await {
            Ok(holidays) => holidays.into_iter().map(|h| h.date).collect(),
            Err(e) => {
                warn!("Could not load bank holidays, counting weekends only: {}", e);
                Vec::new()
            }
        };

        let cutoff_date = subtract_business_days(now.date_naive(), self.config.business_days, &holidays);
        cutoff_date.and_time(self.config.cutoff_time).and_utc()
    }

    /// Report every letter awaiting confirmation that was sent at or before the cutoff
    pub async fn scan(&self, now: DateTime<Utc>) -> Result<Vec<StaleLetter>> {
        let cutoff = self.cutoff(now).await;

        let stale: Vec<StaleLetter> = self
            .store
            .find_by_status(LetterStatus::AwaitingConfirmation)
            .await?
            .into_iter()
            .filter_map(|letter| {
                let sent = letter.sent_to_print_at?;
                (sent <= cutoff).then(|| StaleLetter {
                    id: letter.id,
                    service: letter.service,
                    letter_type: letter.letter_type,
                    sent_to_print_at: sent,
                    cutoff,
                })
            })
            .collect();

        for letter in &stale {
            warn!(
                "Letter {} ({} / {}) sent to print at {} is still unconfirmed (cutoff {})",
                letter.id, letter.service, letter.letter_type, letter.sent_to_print_at, cutoff
            );
        }
        info!("Escalation scan found {} stale letter(s), cutoff {}", stale.len(), cutoff);

        Ok(stale)
    }
}
