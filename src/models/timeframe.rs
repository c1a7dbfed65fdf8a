use serde::{Deserialize, Serialize};
use std::fmt;

/// Chart timeframes captured for each symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1W")]
    W1,
    #[serde(rename = "1D")]
    D1,
    #[serde(rename = "4H")]
    H4,
    #[serde(rename = "1H")]
    H1,
    #[serde(rename = "15M")]
    M15,
    #[serde(rename = "5M")]
    M5,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::W1,
        Timeframe::D1,
        Timeframe::H4,
        Timeframe::H1,
        Timeframe::M15,
        Timeframe::M5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::W1 => "1W",
            Timeframe::D1 => "1D",
            Timeframe::H4 => "4H",
            Timeframe::H1 => "1H",
            Timeframe::M15 => "15M",
            Timeframe::M5 => "5M",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Timeframe> {
        match s.trim().to_uppercase().as_str() {
            "1W" | "W" => Some(Timeframe::W1),
            "1D" | "D" => Some(Timeframe::D1),
            "4H" | "240" => Some(Timeframe::H4),
            "1H" | "60" => Some(Timeframe::H1),
            "15M" | "15" => Some(Timeframe::M15),
            "5M" | "5" => Some(Timeframe::M5),
            _ => None,
        }
    }

    /// Timeframes a report may reference as its primary chart.
    pub fn is_primary_candidate(&self) -> bool {
        matches!(self, Timeframe::H1 | Timeframe::H4 | Timeframe::D1)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
