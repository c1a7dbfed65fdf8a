pub mod calendar;
pub mod direction;
pub mod news;
pub mod report;
pub mod signal;
pub mod snapshot;
pub mod timeframe;

pub use calendar::{EconomicEvent, Impact};
pub use direction::*;
pub use news::{NewsItem, Stance};
pub use report::DailyReport;
pub use signal::{AnalysisSignal, EntryZone, TradePlan, TurtleSoup};
pub use snapshot::Snapshot;
pub use timeframe::Timeframe;
