//! Tolerant CSV parsing of vendor reports

use super::ReportFormat;
use crate::config::ReportsConfig;
use crate::error::{DispatchError, Result};
use crate::naming::extract_letter_id;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dispatch_types::{LetterPrintStatus, ParsedReport};
use log::warn;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

#[derive(Debug, Clone)]
pub struct ReportParser {
    format: ReportFormat,
    date_column: String,
    time_column: String,
    filename_column: String,
}

impl Default for ReportParser {
    fn default() -> Self {
        Self::from_config(&ReportsConfig::default())
    }
}

struct Columns {
    date: usize,
    time: usize,
    filename: Option<usize>,
}

impl ReportParser {
    pub fn from_config(config: &ReportsConfig) -> Self {
        Self {
            format: config.format,
            date_column: config.date_column.clone(),
            time_column: config.time_column.clone(),
            filename_column: config.filename_column.clone(),
        }
    }

    /// Parse a report. Bad rows are skipped and clear `all_rows_parsed`;
    /// only a report that cannot be read at all is an error.
    pub fn parse(&self, path: &str, content: &[u8]) -> Result<ParsedReport> {
        let report_letter_id = match self.format {
            ReportFormat::ReportFilename => Some(extract_letter_id(path)?),
            ReportFormat::RowFilename => None,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content);

        let headers = reader
            .headers()
            .map_err(|e| DispatchError::ReportParse(format!("{}: unreadable header: {}", path, e)))?
            .clone();
        let columns = self.locate_columns(path, &headers)?;

        let mut statuses = Vec::new();
        let mut malformed = 0usize;

        for (index, record) in reader.records().enumerate() {
            let row = index + 2;
            let parsed = record
                .map_err(|e| e.to_string())
                .and_then(|record| self.parse_row(&record, &columns, report_letter_id));

            match parsed {
                Ok(status) => statuses.push(status),
                Err(reason) => {
                    malformed += 1;
                    warn!("Skipping row {} of report {}: {}", row, path, reason);
                }
            }
        }

        Ok(ParsedReport::new(path, statuses, malformed == 0))
    }

    fn locate_columns(&self, path: &str, headers: &csv::StringRecord) -> Result<Columns> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let require = |name: &str| {
            find(name).ok_or_else(|| DispatchError::ReportParse(format!("{}: missing column '{}'", path, name)))
        };

        Ok(Columns {
            date: require(&self.date_column)?,
            time: require(&self.time_column)?,
            filename: match self.format {
                ReportFormat::RowFilename => Some(require(&self.filename_column)?),
                ReportFormat::ReportFilename => find(&self.filename_column),
            },
        })
    }

    fn parse_row(
        &self,
        record: &csv::StringRecord,
        columns: &Columns,
        report_letter_id: Option<Uuid>,
    ) -> std::result::Result<LetterPrintStatus, String> {
        let field = |index: usize, name: &str| {
            record
                .get(index)
                .filter(|value| !value.is_empty())
                .ok_or_else(|| format!("missing {}", name))
        };

        let id = match (report_letter_id, columns.filename) {
            (Some(id), _) => id,
            (None, Some(index)) => {
                extract_letter_id(field(index, &self.filename_column)?).map_err(|e| e.to_string())?
            }
            (None, None) => return Err("no filename column".to_string()),
        };

        let printed_at = parse_timestamp(field(columns.date, &self.date_column)?, field(columns.time, &self.time_column)?)?;

        Ok(LetterPrintStatus::new(id, printed_at))
    }
}

fn parse_timestamp(date: &str, time: &str) -> std::result::Result<DateTime<Utc>, String> {
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|e| format!("bad date '{}': {}", date, e))?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(time, format).ok())
        .ok_or_else(|| format!("bad time '{}'", time))?;
    Ok(date.and_time(time).and_utc())
}
