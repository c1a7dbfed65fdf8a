pub mod composer;
pub mod export;

pub use composer::TradePlanComposer;
pub use export::{export_report, ReportSummary};
