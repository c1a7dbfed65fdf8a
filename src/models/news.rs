use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Hawkish,
    Dovish,
    Neutral,
    RiskOn,
    RiskOff,
}

impl Stance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stance::Hawkish => "hawkish",
            Stance::Dovish => "dovish",
            Stance::Neutral => "neutral",
            Stance::RiskOn => "risk_on",
            Stance::RiskOff => "risk_off",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Stance> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "hawkish" => Some(Stance::Hawkish),
            "dovish" => Some(Stance::Dovish),
            "neutral" => Some(Stance::Neutral),
            "risk_on" => Some(Stance::RiskOn),
            "risk_off" => Some(Stance::RiskOff),
            _ => None,
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub stance: Option<Stance>,
    #[serde(default)]
    pub confidence: Option<f64>,
}
