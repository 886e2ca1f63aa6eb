use chrono::Utc;
use tokio::{
    sync::mpsc,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{PayloadSource, ScanController, ScanEvent, ScanOutcome, SourcePoll};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_error, log_info, log_warn};

/// Poll the decoder once per tick and feed every payload to the controller.
/// Suppressed repeats are dropped silently; everything else is published on
/// `events`. Exits on cancellation or once the source is exhausted.
pub async fn scan_loop<S: PayloadSource>(
    controller: ScanController,
    mut source: S,
    interval: Duration,
    cancel_token: CancellationToken,
    events: mpsc::UnboundedSender<ScanEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let payload = match source.poll_payload() {
                    SourcePoll::Payload(payload) => payload,
                    SourcePoll::Pending => continue,
                    SourcePoll::Exhausted => {
                        log_info!("payload source exhausted, scan loop exiting");
                        break;
                    }
                };

                let event = match controller.handle_payload(&payload, Utc::now()).await {
                    Ok(ScanOutcome::Suppressed) => continue,
                    Ok(outcome) => ScanEvent::Outcome(outcome),
                    Err(err) => {
                        log_error!("failed to process payload {payload:?}: {err:#}");
                        ScanEvent::Failed {
                            payload,
                            message: format!("{err:#}"),
                        }
                    }
                };

                if events.send(event).is_err() {
                    log_warn!("scan event receiver dropped");
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("scan loop shutting down");
                break;
            }
        }
    }
}
