use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime},
    models::AttendanceRecord,
};

const RECORD_COLUMNS: &str =
    "id, name, country, scan_timestamp, raw_qr_data, created_at, updated_at";

fn row_to_record(row: &Row) -> Result<AttendanceRecord> {
    let scan_timestamp: String = row.get("scan_timestamp")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(AttendanceRecord {
        id: row.get("id")?,
        name: row.get("name")?,
        country: row.get("country")?,
        scan_timestamp: parse_datetime(&scan_timestamp, "scan_timestamp")?,
        raw_qr_data: row.get("raw_qr_data")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn find_record(conn: &Connection, record_id: &str) -> Result<Option<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM attendance_records WHERE id = ?1"
    ))?;
    let mut rows = stmt.query(params![record_id])?;
    let record = match rows.next()? {
        Some(row) => Some(row_to_record(row)?),
        None => None,
    };
    Ok(record)
}

impl Database {
    pub async fn insert_record(&self, record: &AttendanceRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO attendance_records (id, name, country, scan_timestamp, raw_qr_data, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.name,
                    record.country,
                    format_datetime(&record.scan_timestamp),
                    record.raw_qr_data,
                    format_datetime(&record.created_at),
                    format_datetime(&record.updated_at),
                ],
            )
            .with_context(|| format!("failed to insert attendance record {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// All records, newest scan first.
    pub async fn list_records(&self) -> Result<Vec<AttendanceRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS}
                 FROM attendance_records
                 ORDER BY scan_timestamp DESC, id ASC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn get_record(&self, record_id: &str) -> Result<Option<AttendanceRecord>> {
        let record_id = record_id.to_string();
        self.execute(move |conn| find_record(conn, &record_id)).await
    }

    pub async fn find_record_by_payload(&self, raw_qr_data: &str) -> Result<Option<AttendanceRecord>> {
        let raw_qr_data = raw_qr_data.to_string();
        self.execute(move |conn| {
            let id: Option<String> = conn
                .query_row(
                    "SELECT id FROM attendance_records WHERE raw_qr_data = ?1",
                    params![raw_qr_data],
                    |row| row.get(0),
                )
                .optional()?;
            match id {
                Some(id) => find_record(conn, &id),
                None => Ok(None),
            }
        })
        .await
    }

    /// Delete one record, returning it so callers can release its payload.
    pub async fn delete_record(&self, record_id: &str) -> Result<Option<AttendanceRecord>> {
        let record_id = record_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let existing = find_record(&tx, &record_id)?;
            if existing.is_some() {
                tx.execute(
                    "DELETE FROM attendance_records WHERE id = ?1",
                    params![record_id],
                )
                .with_context(|| format!("failed to delete attendance record {record_id}"))?;
            }
            tx.commit()?;
            Ok(existing)
        })
        .await
    }

    /// Remove every record and return how many were deleted.
    pub async fn clear_records(&self) -> Result<usize> {
        self.execute(|conn| {
            let removed = conn
                .execute("DELETE FROM attendance_records", [])
                .context("failed to clear attendance records")?;
            Ok(removed)
        })
        .await
    }

    pub async fn count_records(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM attendance_records", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
