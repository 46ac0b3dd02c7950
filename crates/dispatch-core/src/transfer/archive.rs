//! Zip archives uploaded to the vendor

use crate::error::{DispatchError, Result};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack a single document into an in-memory zip archive
pub fn build_archive(entry_name: &str, content: &[u8]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(entry_name, options)
        .map_err(|e| DispatchError::Archive(format!("Failed to start entry {}: {}", entry_name, e)))?;
    writer
        .write_all(content)
        .map_err(|e| DispatchError::Archive(format!("Failed to write entry {}: {}", entry_name, e)))?;

    let cursor = writer
        .finish()
        .map_err(|e| DispatchError::Archive(format!("Failed to finish archive: {}", e)))?;

    Ok(cursor.into_inner())
}
