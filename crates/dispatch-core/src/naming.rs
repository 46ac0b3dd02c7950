//! Deterministic archive names for letters sent to the print vendor
//!
//! The archive name doubles as the join key between an upload and the
//! vendor's confirmation report, so it must round-trip back to the letter id.

use crate::error::{DispatchError, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const DOCUMENT_EXTENSION: &str = "pdf";

const TIMESTAMP_FORMAT: &str = "%d%m%Y%H%M%S";

static BATCH_NAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<type>.+)_(?P<service>[^_]+)_(?P<timestamp>\d{14})_(?P<id>[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})(\.[A-Za-z0-9]+)?$",
    )
    .expect("batch name pattern is valid")
});

static NAME_COMPONENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("name component pattern is valid"));

/// Whether `value` may be used as the type or service part of a batch name.
/// Only ASCII letters, digits, `_` and `-` are accepted, so a name can never
/// leave the upload directory.
pub fn is_valid_name_component(value: &str) -> bool {
    NAME_COMPONENT_PATTERN.is_match(value)
}

/// Name stem shared by the archive and the document inside it
pub fn batch_stem(letter_type: &str, service: &str, timestamp: DateTime<Utc>, id: Uuid) -> String {
    format!(
        "{}_{}_{}_{}",
        letter_type,
        service.replace('_', ""),
        timestamp.format(TIMESTAMP_FORMAT),
        id
    )
}

/// `{type}_{service}_{ddMMyyyyHHmmss}_{id}.zip`, with underscores stripped from the service
pub fn archive_name(letter_type: &str, service: &str, timestamp: DateTime<Utc>, id: Uuid) -> String {
    format!("{}.{}", batch_stem(letter_type, service, timestamp, id), ARCHIVE_EXTENSION)
}

/// Name of the PDF entry stored inside the archive
pub fn archive_entry_name(letter_type: &str, service: &str, timestamp: DateTime<Utc>, id: Uuid) -> String {
    format!("{}.{}", batch_stem(letter_type, service, timestamp, id), DOCUMENT_EXTENSION)
}

/// Recover the letter id from an archive, document or report name.
///
/// Directory components are ignored. Anything that does not follow the batch
/// naming scheme cannot be correlated and is rejected.
pub fn extract_letter_id(name: &str) -> Result<Uuid> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();

    let captures = BATCH_NAME_PATTERN
        .captures(file_name)
        .ok_or_else(|| DispatchError::IdExtraction(format!("'{}' is not a batch name", file_name)))?;

    Uuid::parse_str(&captures["id"])
        .map_err(|e| DispatchError::IdExtraction(format!("'{}': {}", file_name, e)))
}
