use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Timeframe;

/// A captured chart image for one symbol and timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub captured_at: DateTime<Utc>,
    pub file_path: String,
}
