use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Bias, Direction, PlanDirection};

/// Where to get in. A trade plan usually gives a range; a turtle soup entry
/// is a single reversal point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryZone {
    Range { low: f64, high: f64 },
    Point { value: f64 },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TurtleSoup {
    pub detected: bool,
    pub direction: Option<Direction>,
    pub entry: Option<f64>,
    pub invalidation: Option<f64>,
    pub tp1: Option<f64>,
    pub tp2: Option<f64>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradePlan {
    pub direction: Option<PlanDirection>,
    pub entry_zone: Option<EntryZone>,
    pub invalidation: Option<f64>,
    pub tp1: Option<f64>,
    pub tp2: Option<f64>,
    #[serde(default)]
    pub stand_down_if: Vec<String>,
}

/// Canonical analysis record for one (date, symbol). Only the normalizer
/// builds these from external payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSignal {
    pub bias: Bias,
    pub confidence: f64,
    #[serde(default)]
    pub levels: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub turtle_soup: Option<TurtleSoup>,
    #[serde(default)]
    pub trade_plan: Option<TradePlan>,
}

impl Default for AnalysisSignal {
    fn default() -> Self {
        Self {
            bias: Bias::Neutral,
            confidence: 50.0,
            levels: BTreeMap::new(),
            notes: String::new(),
            turtle_soup: None,
            trade_plan: None,
        }
    }
}
