//! CSV export of the record list.
//!
//! Layout is fixed for compatibility with spreadsheets already built around it:
//! header `No.,Name,Country,Scan Date,Scan Time,Full Timestamp`, newest scan
//! first, every field quoted and embedded quotes doubled.

mod stats;

use std::{fmt::Display, fs, path::Path};

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, SecondsFormat, TimeZone};
use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::db::{sort_newest_first, AttendanceRecord};

pub use stats::{AttendanceStats, CountryCount};

pub const CSV_HEADER: [&str; 6] = [
    "No.",
    "Name",
    "Country",
    "Scan Date",
    "Scan Time",
    "Full Timestamp",
];

/// Render records as CSV. Date and time columns are shown in `tz`; the full
/// timestamp is always UTC.
pub fn render_csv<Tz>(records: &[AttendanceRecord], tz: &Tz) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut sorted = records.to_vec();
    sort_newest_first(&mut sorted);

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(CSV_HEADER)
        .context("failed to write CSV header")?;

    for (index, record) in sorted.iter().enumerate() {
        let local = record.scan_timestamp.with_timezone(tz);
        writer
            .write_record([
                (index + 1).to_string(),
                record.name.clone(),
                record.country.clone(),
                local.format("%Y-%m-%d").to_string(),
                local.format("%H:%M:%S").to_string(),
                record
                    .scan_timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ])
            .with_context(|| format!("failed to write CSV row for record {}", record.id))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("failed to flush CSV output: {}", err.error()))?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Render and write the CSV to `path`, returning the number of data rows.
pub fn write_csv<Tz>(records: &[AttendanceRecord], tz: &Tz, path: &Path) -> Result<usize>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let csv = render_csv(records, tz)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(records.len())
}

/// Default download name, e.g. `attendance_2024-05-01.csv`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("attendance_{}.csv", date.format("%Y-%m-%d"))
}
