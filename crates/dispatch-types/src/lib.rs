//! Shared types for the letter dispatch pipeline

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Free-form JSON map attached to a letter
pub type JsonMap = HashMap<String, serde_json::Value>;

/// Lifecycle status of a letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LetterStatus {
    Created,
    Validated,
    Uploaded,
    AwaitingConfirmation,
    Posted,
    FailedToUpload,
}

impl LetterStatus {
    pub const ALL: [LetterStatus; 6] = [
        LetterStatus::Created,
        LetterStatus::Validated,
        LetterStatus::Uploaded,
        LetterStatus::AwaitingConfirmation,
        LetterStatus::Posted,
        LetterStatus::FailedToUpload,
    ];

    /// Get directory name for file storage
    pub fn directory_name(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Validated => "validated",
            Self::Uploaded => "uploaded",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::Posted => "posted",
            Self::FailedToUpload => "failed_to_upload",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Posted | Self::FailedToUpload)
    }
}

impl fmt::Display for LetterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Validated => "Validated",
            Self::Uploaded => "Uploaded",
            Self::AwaitingConfirmation => "AwaitingConfirmation",
            Self::Posted => "Posted",
            Self::FailedToUpload => "FailedToUpload",
        };
        f.write_str(name)
    }
}

/// Error returned when a status name is not recognised
#[derive(Debug, thiserror::Error)]
#[error("Unknown letter status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for LetterStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LetterStatus::ALL
            .iter()
            .copied()
            .find(|status| status.to_string() == s || status.directory_name() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A single print/dispatch request tracked through its lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Letter {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub letter_type: String,
    pub service: String,
    pub status: LetterStatus,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub sent_to_print_at: Option<DateTime<Utc>>,
    pub printed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additional_data: Option<JsonMap>,
    #[serde(default)]
    pub copies: Option<JsonMap>,
    /// Assembled PDF, held until the letter has been uploaded
    #[serde(default, with = "content_base64", skip_serializing_if = "Option::is_none")]
    pub file_content: Option<Vec<u8>>,
}

impl Letter {
    /// Create a new letter in the `Created` state
    pub fn new(
        letter_type: impl Into<String>,
        service: impl Into<String>,
        checksum: impl Into<String>,
        file_content: Vec<u8>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            letter_type: letter_type.into(),
            service: service.into(),
            status: LetterStatus::Created,
            checksum: checksum.into(),
            created_at: Utc::now(),
            sent_to_print_at: None,
            printed_at: None,
            additional_data: None,
            copies: None,
            file_content: Some(file_content),
        }
    }

    pub fn status_view(&self) -> LetterStatusView {
        LetterStatusView {
            id: self.id,
            status: self.status,
            checksum: self.checksum.clone(),
            created_at: self.created_at,
            sent_to_print_at: self.sent_to_print_at,
            printed_at: self.printed_at,
            additional_data: self.additional_data.clone(),
            copies: self.copies.clone(),
        }
    }
}

/// Field changes applied together with a status transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LetterUpdate {
    pub sent_to_print_at: Option<DateTime<Utc>>,
    pub printed_at: Option<DateTime<Utc>>,
    pub clear_content: bool,
}

impl LetterUpdate {
    pub fn uploaded(sent_to_print_at: DateTime<Utc>) -> Self {
        Self {
            sent_to_print_at: Some(sent_to_print_at),
            clear_content: true,
            ..Self::default()
        }
    }

    pub fn printed(printed_at: DateTime<Utc>) -> Self {
        Self {
            printed_at: Some(printed_at),
            ..Self::default()
        }
    }

    /// Apply the changes to a letter. `printed_at` is never overwritten once set.
    pub fn apply_to(&self, letter: &mut Letter) {
        if let Some(sent) = self.sent_to_print_at {
            letter.sent_to_print_at = Some(sent);
        }
        if let Some(printed) = self.printed_at {
            if letter.printed_at.is_none() {
                letter.printed_at = Some(printed);
            }
        }
        if self.clear_content {
            letter.file_content = None;
        }
    }
}

/// Read-only view of a letter as exposed to status queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LetterStatusView {
    pub id: Uuid,
    pub status: LetterStatus,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub sent_to_print_at: Option<DateTime<Utc>>,
    pub printed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<JsonMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copies: Option<JsonMap>,
}

/// A document supplied with a letter submission
#[derive(Debug, Clone)]
pub struct PdfDoc {
    pub filename: String,
    pub content: Vec<u8>,
}

impl PdfDoc {
    pub fn new(filename: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content,
        }
    }
}

/// Print time recorded by the vendor for one letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LetterPrintStatus {
    pub id: Uuid,
    pub printed_at: DateTime<Utc>,
}

impl LetterPrintStatus {
    pub fn new(id: Uuid, printed_at: DateTime<Utc>) -> Self {
        Self { id, printed_at }
    }
}

/// Result of parsing one vendor confirmation report
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReport {
    path: String,
    statuses: Vec<LetterPrintStatus>,
    all_rows_parsed: bool,
}

impl ParsedReport {
    pub fn new(path: impl Into<String>, statuses: Vec<LetterPrintStatus>, all_rows_parsed: bool) -> Self {
        Self {
            path: path.into(),
            statuses,
            all_rows_parsed,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn statuses(&self) -> &[LetterPrintStatus] {
        &self.statuses
    }

    pub fn all_rows_parsed(&self) -> bool {
        self.all_rows_parsed
    }
}

/// A bank holiday
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub title: String,
}

mod content_base64 {
    use base64::{engine::general_purpose, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(content: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match content {
            Some(bytes) => serializer.serialize_some(&general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| general_purpose::STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
