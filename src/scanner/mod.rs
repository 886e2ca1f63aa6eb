pub mod controller;
pub mod loop_worker;
pub mod source;
pub mod state;

pub use controller::{ScanController, ScanEvent, ScanOutcome, ScannerSnapshot};
pub use loop_worker::scan_loop;
pub use source::{
    spawn_blocking_line_reader, spawn_line_reader, ChannelSource, PayloadSource, SourcePoll,
};
pub use state::{ScanCounters, ScannerState, ScannerStatus};
