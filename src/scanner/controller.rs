use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    db::AttendanceRecord,
    dedup::{Decision, DedupState, SeenSet},
    payload::parse_payload_with_strategy,
    settings::ScannerSettings,
    store::{AttendanceStore, StorageBackend},
};

use super::{
    loop_worker::scan_loop, PayloadSource, ScanCounters, ScannerState, ScannerStatus,
};

/// What happened to one decoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum ScanOutcome {
    Recorded { record: AttendanceRecord },
    /// Repeat read inside the cooldown window. Never shown to the user.
    Suppressed,
    /// Payload already has a live record.
    Duplicate { payload: String },
    /// No layout produced both a name and a country.
    ParseFailed { payload: String },
}

/// Events published by the background scan loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Outcome(ScanOutcome),
    Failed { payload: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSnapshot {
    pub state: ScannerState,
    pub seen_count: usize,
    pub backend: StorageBackend,
}

struct ScanWorker {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
    done: CancellationToken,
}

/// Session context for one scanning station: lifecycle state, duplicate policy
/// inputs and the store they are derived from. Independent controllers share
/// nothing.
#[derive(Clone)]
pub struct ScanController {
    state: Arc<Mutex<ScannerState>>,
    dedup: Arc<Mutex<DedupState>>,
    store: AttendanceStore,
    settings: ScannerSettings,
    worker: Arc<Mutex<Option<ScanWorker>>>,
    verbose: bool,
}

impl ScanController {
    /// Load the current records and rebuild the blocked-payload set from them.
    pub async fn open(store: AttendanceStore, settings: ScannerSettings) -> Result<Self> {
        let records = store
            .list()
            .await
            .context("failed to load attendance records")?;
        let seen = SeenSet::from_records(&records);
        info!(
            "Scan session ready: {} existing records, cooldown {}ms",
            records.len(),
            settings.cooldown_ms
        );

        Ok(Self {
            state: Arc::new(Mutex::new(ScannerState::new())),
            dedup: Arc::new(Mutex::new(DedupState::new(seen, settings.cooldown_ms))),
            store,
            settings,
            worker: Arc::new(Mutex::new(None)),
            verbose: crate::settings::debug_mode(),
        })
    }

    pub fn store(&self) -> &AttendanceStore {
        &self.store
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    pub async fn get_state(&self) -> ScannerState {
        self.state.lock().await.clone()
    }

    pub async fn snapshot(&self) -> ScannerSnapshot {
        let state = self.state.lock().await.clone();
        let seen_count = self.dedup.lock().await.seen().len();
        ScannerSnapshot {
            state,
            seen_count,
            backend: self.store.backend(),
        }
    }

    pub async fn start(&self) -> Result<ScannerState> {
        let mut state = self.state.lock().await;
        state.begin(Utc::now())?;
        info!("Scanning started");
        Ok(state.clone())
    }

    /// Start scanning and poll `source` in the background until it is exhausted
    /// or [`stop`](Self::stop) is called.
    pub async fn start_scanning<S>(
        &self,
        source: S,
        events: mpsc::UnboundedSender<ScanEvent>,
    ) -> Result<ScannerState>
    where
        S: PayloadSource + 'static,
    {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return Err(anyhow!("scan loop already running"));
        }

        let state = self.start().await?;

        let cancel_token = CancellationToken::new();
        let done = CancellationToken::new();
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));

        let controller = self.clone();
        let loop_token = cancel_token.clone();
        let loop_done = done.clone();
        let handle = tokio::spawn(async move {
            scan_loop(controller, source, interval, loop_token, events).await;
            loop_done.cancel();
        });

        *worker = Some(ScanWorker {
            handle,
            cancel_token,
            done,
        });
        Ok(state)
    }

    /// Resolves once the background loop has exited on its own or been stopped.
    pub async fn finished(&self) {
        let done = self
            .worker
            .lock()
            .await
            .as_ref()
            .map(|worker| worker.done.clone());
        if let Some(done) = done {
            done.cancelled().await;
        }
    }

    /// SCANNING -> STOPPED. Cancels and joins the background loop if any.
    pub async fn stop(&self) -> Result<ScannerState> {
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.cancel_token.cancel();
            worker
                .handle
                .await
                .context("scan loop task failed to join")?;
        }

        let mut state = self.state.lock().await;
        state.stop(Utc::now())?;
        info!(
            "Scanning stopped: {} recorded, {} duplicates, {} unreadable",
            state.counters.recorded, state.counters.duplicates, state.counters.parse_failures
        );
        Ok(state.clone())
    }

    /// STOPPED -> IDLE.
    pub async fn reset(&self) -> Result<ScannerState> {
        let mut state = self.state.lock().await;
        state.reset()?;
        Ok(state.clone())
    }

    /// Run one decoded payload through the duplicate policy, the parser and the
    /// store. Duplicates and unreadable codes are outcomes, not errors; only
    /// storage failures are returned as `Err`.
    pub async fn handle_payload(&self, payload: &str, now: DateTime<Utc>) -> Result<ScanOutcome> {
        if !self.state.lock().await.is_scanning() {
            return Err(anyhow!("scanner is not scanning"));
        }

        // Held across the store write so the next decision sees this one.
        let mut dedup = self.dedup.lock().await;

        let decision = dedup.decide(payload, now);
        if self.verbose {
            debug!("Payload {payload:?} -> {}", decision.as_str());
        }

        let outcome = match decision {
            Decision::SuppressCooldown => ScanOutcome::Suppressed,
            Decision::RejectDuplicate => {
                warn!("Duplicate scan rejected: {payload:?}");
                ScanOutcome::Duplicate {
                    payload: payload.to_string(),
                }
            }
            Decision::Accept => match parse_payload_with_strategy(payload) {
                None => {
                    dedup.mark(payload, now);
                    warn!("Could not read participant from payload {payload:?}");
                    ScanOutcome::ParseFailed {
                        payload: payload.to_string(),
                    }
                }
                Some((strategy, identity)) => {
                    let record = AttendanceRecord::new(identity, payload, now);
                    self.store
                        .insert(&record)
                        .await
                        .with_context(|| format!("failed to save scan for {}", record.name))?;
                    dedup.accept(payload, now);
                    info!(
                        "Recorded {} ({}) via {} layout",
                        record.name,
                        record.country,
                        strategy.as_str()
                    );
                    ScanOutcome::Recorded { record }
                }
            },
        };
        drop(dedup);

        let mut state = self.state.lock().await;
        match &outcome {
            ScanOutcome::Recorded { .. } => {
                state.counters.recorded += 1;
                state.last_scan_at = Some(now);
            }
            ScanOutcome::Suppressed => state.counters.suppressed += 1,
            ScanOutcome::Duplicate { .. } => state.counters.duplicates += 1,
            ScanOutcome::ParseFailed { .. } => state.counters.parse_failures += 1,
        }

        Ok(outcome)
    }

    /// All live records, newest scan first.
    pub async fn records(&self) -> Result<Vec<AttendanceRecord>> {
        self.store.list().await
    }

    /// Delete one record and make its payload scannable again.
    pub async fn delete_record(&self, record_id: &str) -> Result<Option<AttendanceRecord>> {
        let mut dedup = self.dedup.lock().await;
        let removed = self.store.delete(record_id).await?;
        match &removed {
            Some(record) => {
                dedup.forget(&record.raw_qr_data);
                info!("Deleted record {} ({})", record.id, record.name);
            }
            None => warn!("No record with id {record_id} to delete"),
        }
        Ok(removed)
    }

    /// Remove every record; all payloads become scannable again.
    pub async fn clear_records(&self) -> Result<usize> {
        let mut dedup = self.dedup.lock().await;
        let removed = self.store.clear().await?;
        dedup.clear();
        info!("Cleared {removed} attendance records");
        Ok(removed)
    }

    /// Re-read the store and rebuild the blocked set, e.g. after another
    /// process changed it.
    pub async fn reload(&self) -> Result<usize> {
        let mut dedup = self.dedup.lock().await;
        let records = self.store.list().await?;
        dedup.rebuild(SeenSet::from_records(&records));
        Ok(records.len())
    }

    pub async fn counters(&self) -> ScanCounters {
        self.state.lock().await.counters
    }

    pub async fn status(&self) -> ScannerStatus {
        self.state.lock().await.status
    }
}
