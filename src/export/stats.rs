use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use crate::db::AttendanceRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryCount {
    pub country: String,
    pub count: usize,
}

/// Headline numbers for the record list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStats {
    pub total: usize,
    /// Records scanned on `today` as seen in the display timezone.
    pub today: usize,
    pub countries: usize,
    /// Most represented first, ties alphabetical.
    pub by_country: Vec<CountryCount>,
}

impl AttendanceStats {
    pub fn compute<Tz: TimeZone>(records: &[AttendanceRecord], today: NaiveDate, tz: &Tz) -> Self {
        let mut per_country: BTreeMap<&str, usize> = BTreeMap::new();
        let mut scanned_today = 0;

        for record in records {
            if record.scan_timestamp.with_timezone(tz).date_naive() == today {
                scanned_today += 1;
            }
            let country = record.country.trim();
            if !country.is_empty() {
                *per_country.entry(country).or_default() += 1;
            }
        }

        let mut by_country: Vec<CountryCount> = per_country
            .into_iter()
            .map(|(country, count)| CountryCount {
                country: country.to_string(),
                count,
            })
            .collect();
        // Stable sort keeps the BTreeMap's alphabetical order among ties.
        by_country.sort_by(|a, b| b.count.cmp(&a.count));

        Self {
            total: records.len(),
            today: scanned_today,
            countries: by_country.len(),
            by_country,
        }
    }
}
