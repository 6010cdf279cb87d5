use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_ONLY_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

#[derive(Debug, Clone)]
pub struct TicketRecord {
    pub created_at: NaiveDateTime,
    fields: HashMap<String, String>,
}

impl TicketRecord {
    pub fn new(created_at: NaiveDateTime, fields: HashMap<String, String>) -> Self {
        Self { created_at, fields }
    }

    /// Empty cells are reported as missing.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn date(&self) -> NaiveDate {
        self.created_at.date()
    }
}

#[derive(Debug, Clone)]
pub struct TicketTable {
    pub headers: Vec<String>,
    pub records: Vec<TicketRecord>,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

impl TicketTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|header| header == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Range spanned by the first and last rows. Rows are assumed to be
    /// sorted by creation time already.
    pub fn available_range(&self) -> Option<DateRange> {
        let first = self.records.first()?;
        let last = self.records.last()?;
        Some(DateRange {
            start: first.date(),
            end: last.date(),
        })
    }

    pub fn filter_by_range(self, range: &DateRange) -> TicketTable {
        let before = self.records.len();
        let records: Vec<TicketRecord> = self
            .records
            .into_iter()
            .filter(|record| range.contains(record.date()))
            .collect();

        info!(
            action = "filter",
            component = "date_filter",
            range = %range,
            records_before = before,
            records_after = records.len(),
            "Filtered tickets by date range"
        );

        TicketTable {
            headers: self.headers,
            records,
        }
    }
}

/// Wall-clock time of the cell. Offsets and trailing zone names such as
/// `UTC` are dropped rather than converted.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    parse_local(value).or_else(|| {
        let (rest, zone) = value.rsplit_once(' ')?;
        let is_zone_name = zone.len() >= 2 && zone.chars().all(|c| c.is_ascii_uppercase());
        if is_zone_name {
            parse_local(rest.trim_end())
        } else {
            None
        }
    })
}

fn parse_local(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_local());
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
        .map(|parsed| parsed.naive_local())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        })
        .or_else(|| {
            DATE_ONLY_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub fn load_tickets(path: &Path, date_column: &str) -> Result<TicketTable> {
    let start_time = Instant::now();
    info!(action = "start", component = "ticket_loading", file_path = ?path, "Loading ticket export");

    if !path.exists() {
        anyhow::bail!("Data file not found: {:?}", path);
    }

    let mut reader = csv::ReaderBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to open data file {:?}", path))?;

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header row of {:?}", path))?
        .iter()
        .map(str::to_string)
        .collect();

    let date_index = headers
        .iter()
        .position(|header| header == date_column)
        .with_context(|| {
            format!(
                "Date column '{}' not found in {:?}. Available columns: {}",
                date_column,
                path,
                headers.join(", ")
            )
        })?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        // Header is line 1
        let line = row + 2;
        let record = result.with_context(|| format!("Failed to parse {:?} at line {}", path, line))?;

        let raw_date = record.get(date_index).unwrap_or_default();
        let created_at = parse_timestamp(raw_date).with_context(|| {
            format!(
                "Unparseable date '{}' in column '{}' at line {}",
                raw_date, date_column, line
            )
        })?;

        let fields = headers
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        records.push(TicketRecord::new(created_at, fields));
    }

    if records.is_empty() {
        anyhow::bail!("Data file {:?} contains no tickets", path);
    }

    let is_sorted = records
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at);
    if !is_sorted {
        warn!(
            action = "validate",
            component = "ticket_loading",
            "Tickets are not sorted by creation date; default range uses first and last rows"
        );
    }

    info!(
        action = "complete",
        component = "ticket_loading",
        record_count = records.len(),
        column_count = headers.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Loaded tickets"
    );

    Ok(TicketTable { headers, records })
}

/// Combines the requested bounds with the ones available in the data.
pub fn resolve_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    available: DateRange,
) -> Result<DateRange> {
    let range = DateRange {
        start: start.unwrap_or(available.start),
        end: end.unwrap_or(available.end),
    };

    if range.start > range.end {
        anyhow::bail!(
            "start date ({}) is later than end date ({}). Specified file contains data from {} to {}",
            range.start.format(DATE_FORMAT),
            range.end.format(DATE_FORMAT),
            available.start.format(DATE_FORMAT),
            available.end.format(DATE_FORMAT)
        );
    }

    Ok(range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn scratch_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("support-wordcloud-tickets-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_on(day: NaiveDate, hour: u32) -> TicketRecord {
        TicketRecord::new(day.and_hms_opt(hour, 0, 0).unwrap(), HashMap::new())
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = date(2024, 1, 2).and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-01-02 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02T10:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("01/02/2024 10:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02"),
            date(2024, 1, 2).and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_timestamp("2024-01-02 10:30:00 +0100"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 10:30:00 UTC"), Some(expected));
        assert_eq!(parse_timestamp("01/02/2024 10:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-01-02 10:30:00.123"),
            date(2024, 1, 2).and_hms_milli_opt(10, 30, 0, 123)
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2024-01-02 lunch"), None);
    }

    #[test]
    fn test_load_tickets() {
        let path = scratch_file(
            "load.csv",
            "Created at,Subject,Status\n2024-01-01 09:00:00,Help me,open\n2024-01-02 11:15:00,,solved\n",
        );
        let table = load_tickets(&path, "Created at").unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.has_column("Subject"));
        assert_eq!(table.records[0].field("Subject"), Some("Help me"));
        assert_eq!(table.records[1].field("Subject"), None);
        assert_eq!(table.records[1].field("Status"), Some("solved"));
        assert_eq!(
            table.available_range(),
            Some(DateRange {
                start: date(2024, 1, 1),
                end: date(2024, 1, 2)
            })
        );
    }

    #[test]
    fn test_load_tickets_missing_date_column() {
        let path = scratch_file("no_date.csv", "Subject\nHelp\n");
        let err = load_tickets(&path, "Created at").unwrap_err();
        assert!(err.to_string().contains("Created at"));
    }

    #[test]
    fn test_load_tickets_bad_date() {
        let path = scratch_file("bad_date.csv", "Created at,Subject\nnot a date,Help\n");
        let err = load_tickets(&path, "Created at").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_load_tickets_missing_file() {
        let path = std::env::temp_dir().join("support-wordcloud-definitely-missing.csv");
        assert!(load_tickets(&path, "Created at").is_err());
    }

    #[test]
    fn test_resolve_defaults_to_available() {
        let available = DateRange {
            start: date(2024, 1, 1),
            end: date(2024, 3, 1),
        };
        assert_eq!(resolve_date_range(None, None, available).unwrap(), available);

        let range = resolve_date_range(Some(date(2024, 2, 1)), None, available).unwrap();
        assert_eq!(range.start, date(2024, 2, 1));
        assert_eq!(range.end, date(2024, 3, 1));
    }

    #[test]
    fn test_resolve_rejects_inverted_range() {
        let available = DateRange {
            start: date(2024, 1, 1),
            end: date(2024, 3, 1),
        };
        let err = resolve_date_range(Some(date(2024, 2, 1)), Some(date(2024, 1, 1)), available)
            .unwrap_err()
            .to_string();
        assert!(err.contains("2024-02-01"));
        assert!(err.contains("2024-01-01"));
        assert!(err.contains("2024-03-01"));
        assert!(err.contains("start date (2024-02-01) is later than end date (2024-01-01)"));
    }

    #[test]
    fn test_filter_includes_end_day() {
        let table = TicketTable {
            headers: vec!["Created at".to_string()],
            records: vec![
                record_on(date(2024, 1, 1), 8),
                record_on(date(2024, 1, 2), 23),
                record_on(date(2024, 1, 3), 0),
            ],
        };
        let range = DateRange {
            start: date(2024, 1, 1),
            end: date(2024, 1, 2),
        };
        let filtered = table.filter_by_range(&range);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.records[1].date(), date(2024, 1, 2));
    }
}
