//! Letter submission with content de-duplication

use crate::documents::DocumentAssembler;
use crate::error::{DispatchError, Result};
use crate::naming::is_valid_name_component;
use crate::store::LetterStore;
use chrono::{Duration, Utc};
use dispatch_types::{JsonMap, Letter, LetterStatus, LetterStatusView, LetterUpdate, PdfDoc};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

/// A request to print one letter
#[derive(Debug, Clone)]
pub struct SubmitLetter {
    pub letter_type: String,
    pub service: String,
    pub documents: Vec<PdfDoc>,
    pub additional_data: Option<JsonMap>,
    pub copies: Option<JsonMap>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Created(Uuid),
    /// Same content was submitted by the same service within the dedup window
    Duplicate(Uuid),
}

impl SubmissionOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Created(id) | Self::Duplicate(id) => *id,
        }
    }
}

pub struct LetterService {
    store: Arc<dyn LetterStore>,
    assembler: DocumentAssembler,
    dedup_window: Duration,
}

impl LetterService {
    pub fn new(store: Arc<dyn LetterStore>, dedup_window_minutes: i64) -> Result<Self> {
        let dedup_window = Duration::try_minutes(dedup_window_minutes)
            .filter(|window| *window >= Duration::zero())
            .ok_or_else(|| {
                DispatchError::Config(format!("Invalid dedup window of {} minutes", dedup_window_minutes))
            })?;

        Ok(Self {
            store,
            assembler: DocumentAssembler::new(),
            dedup_window,
        })
    }

    /// Validate, assemble and store a letter, ready for the next upload cycle
    pub async fn submit(&self, request: SubmitLetter) -> Result<SubmissionOutcome> {
        if !is_valid_name_component(&request.letter_type) {
            return Err(DispatchError::Validation(format!(
                "Unsupported letter type '{}'",
                request.letter_type
            )));
        }
        if !is_valid_name_component(&request.service) {
            return Err(DispatchError::Validation(format!("Unsupported service '{}'", request.service)));
        }

        let assembled = self.assembler.assemble(&request.documents)?;

        if let Some(existing) = self.find_recent_duplicate(&request.service, &assembled.checksum).await? {
            info!(
                "Letter from {} duplicates {} (checksum {}), returning existing id",
                request.service, existing, assembled.checksum
            );
            return Ok(SubmissionOutcome::Duplicate(existing));
        }

        let mut letter = Letter::new(
            request.letter_type,
            request.service,
            assembled.checksum,
            assembled.content,
        );
        letter.additional_data = request.additional_data;
        letter.copies = request.copies;
        let id = letter.id;

        self.store.insert(letter).await?;
        self.store
            .compare_and_set_status(id, LetterStatus::Created, LetterStatus::Validated, LetterUpdate::default())
            .await?;

        info!("Created letter {} ({} page(s))", id, assembled.page_count);
        Ok(SubmissionOutcome::Created(id))
    }

    pub async fn status(&self, id: Uuid) -> Result<Option<LetterStatusView>> {
        Ok(self.store.get(id).await?.map(|letter| letter.status_view()))
    }

    async fn find_recent_duplicate(&self, service: &str, checksum: &str) -> Result<Option<Uuid>> {
        let window_start = Utc::now() - self.dedup_window;

        Ok(self
            .store
            .find_by_checksum(service, checksum)
            .await?
            .into_iter()
            .filter(|letter| letter.created_at >= window_start)
            .max_by_key(|letter| letter.created_at)
            .map(|letter| letter.id))
    }
}
