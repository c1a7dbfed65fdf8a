use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Bias, EntryZone, PlanDirection, TurtleSoup};

/// The composed plan for one (date, symbol). Replaced wholesale on every
/// composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub direction: PlanDirection,
    pub entry_zone: Option<EntryZone>,
    pub invalidation: Option<f64>,
    pub tp1: Option<f64>,
    pub tp2: Option<f64>,
    #[serde(default)]
    pub stand_down_conditions: Vec<String>,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub missing_data: Vec<String>,
    pub confidence: f64,
    pub bias: Bias,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub levels: BTreeMap<String, f64>,
    #[serde(default)]
    pub turtle_soup: Option<TurtleSoup>,
    #[serde(default)]
    pub primary_snapshot: Option<String>,
}
