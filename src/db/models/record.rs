//! Attendance record data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::payload::Identity;

/// One accepted scan. Immutable once created; removed only by an explicit
/// delete or a bulk clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub name: String,
    pub country: String,
    pub scan_timestamp: DateTime<Utc>,
    /// Exact decoded text; doubles as the duplicate key.
    pub raw_qr_data: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttendanceRecord {
    pub fn new(identity: Identity, raw_qr_data: impl Into<String>, scanned_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: identity.name,
            country: identity.country,
            scan_timestamp: scanned_at,
            raw_qr_data: raw_qr_data.into(),
            created_at: scanned_at,
            updated_at: scanned_at,
        }
    }
}

/// Newest scan first; ties broken by id so the order is stable across backends.
pub fn sort_newest_first(records: &mut [AttendanceRecord]) {
    records.sort_by(|a, b| {
        b.scan_timestamp
            .cmp(&a.scan_timestamp)
            .then_with(|| a.id.cmp(&b.id))
    });
}
