use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScannerStatus {
    #[default]
    Idle,
    Scanning,
    Stopped,
}

impl ScannerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerStatus::Idle => "Idle",
            ScannerStatus::Scanning => "Scanning",
            ScannerStatus::Stopped => "Stopped",
        }
    }
}

/// Per-session counters. Suppressed reads are counted but never reported.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScanCounters {
    pub recorded: u64,
    pub duplicates: u64,
    pub parse_failures: u64,
    pub suppressed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerState {
    pub status: ScannerStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub last_scan_at: Option<DateTime<Utc>>,
    pub counters: ScanCounters,
}

impl ScannerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// IDLE -> SCANNING. Counters start from zero for every session.
    pub fn begin(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ScannerStatus::Idle {
            bail!("scanner already {}", self.status.as_str().to_lowercase());
        }
        *self = Self {
            status: ScannerStatus::Scanning,
            started_at: Some(now),
            ..Self::default()
        };
        Ok(())
    }

    /// SCANNING -> STOPPED.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status != ScannerStatus::Scanning {
            bail!("scanner is not scanning");
        }
        self.status = ScannerStatus::Stopped;
        self.stopped_at = Some(now);
        Ok(())
    }

    /// STOPPED -> IDLE.
    pub fn reset(&mut self) -> Result<()> {
        if self.status != ScannerStatus::Stopped {
            bail!("scanner must be stopped before it is reset");
        }
        *self = Self::default();
        Ok(())
    }

    pub fn is_scanning(&self) -> bool {
        self.status == ScannerStatus::Scanning
    }
}
