use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }

    /// "none" and anything unrecognized map to `None`.
    pub fn from_str_loose(s: &str) -> Option<Direction> {
        match s.trim().to_lowercase().as_str() {
            "long" => Some(Direction::Long),
            "short" => Some(Direction::Short),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Bullish => "bullish",
            Bias::Bearish => "bearish",
            Bias::Neutral => "neutral",
        }
    }

    pub fn to_direction(self) -> Option<Direction> {
        match self {
            Bias::Bullish => Some(Direction::Long),
            Bias::Bearish => Some(Direction::Short),
            Bias::Neutral => None,
        }
    }

    pub fn from_str_loose(s: &str) -> Bias {
        match s.trim().to_lowercase().as_str() {
            "bullish" => Bias::Bullish,
            "bearish" => Bias::Bearish,
            _ => Bias::Neutral,
        }
    }
}

/// Direction of a trade plan or composed report. Unlike [`Direction`] it can
/// explicitly say "stay flat".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanDirection {
    Long,
    Short,
    #[default]
    NoTrade,
}

impl fmt::Display for PlanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl PlanDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanDirection::Long => "long",
            PlanDirection::Short => "short",
            PlanDirection::NoTrade => "no_trade",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<PlanDirection> {
        match s.trim().to_lowercase().as_str() {
            "long" => Some(PlanDirection::Long),
            "short" => Some(PlanDirection::Short),
            "no_trade" | "no trade" | "none" => Some(PlanDirection::NoTrade),
            _ => None,
        }
    }

    pub fn to_direction(self) -> Option<Direction> {
        match self {
            PlanDirection::Long => Some(Direction::Long),
            PlanDirection::Short => Some(Direction::Short),
            PlanDirection::NoTrade => None,
        }
    }
}

impl From<Direction> for PlanDirection {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Long => PlanDirection::Long,
            Direction::Short => PlanDirection::Short,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_maps_unknown_to_neutral() {
        assert_eq!(Bias::from_str_loose("Bullish"), Bias::Bullish);
        assert_eq!(Bias::from_str_loose(" bearish "), Bias::Bearish);
        assert_eq!(Bias::from_str_loose("sideways"), Bias::Neutral);
        assert_eq!(Bias::from_str_loose(""), Bias::Neutral);
    }

    #[test]
    fn bias_to_direction() {
        assert_eq!(Bias::Bullish.to_direction(), Some(Direction::Long));
        assert_eq!(Bias::Bearish.to_direction(), Some(Direction::Short));
        assert_eq!(Bias::Neutral.to_direction(), None);
    }

    #[test]
    fn plan_direction_serde_names() {
        let json = serde_json::to_string(&PlanDirection::NoTrade).unwrap();
        assert_eq!(json, "\"no_trade\"");
        let back: PlanDirection = serde_json::from_str("\"short\"").unwrap();
        assert_eq!(back, PlanDirection::Short);
    }

    #[test]
    fn direction_from_str_loose() {
        assert_eq!(Direction::from_str_loose("LONG"), Some(Direction::Long));
        assert_eq!(Direction::from_str_loose("none"), None);
        assert_eq!(PlanDirection::from_str_loose("no_trade"), Some(PlanDirection::NoTrade));
        assert_eq!(PlanDirection::from_str_loose("flat"), None);
    }
}
