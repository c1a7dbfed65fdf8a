pub mod clock;
pub mod payload;
pub mod pipeline;
pub mod watcher;

pub use clock::{Clock, SystemClock};
pub use payload::{extract_json, PayloadError, ResponsePayload};
pub use pipeline::{IngestSummary, Ingestor, SymbolOutcome, SymbolResult};
pub use watcher::{
    clear_pending_response, submit_response, Processed, ResponseHandler, ResponseWatcher,
    WatchError, WatchOutcome, WatchState,
};
