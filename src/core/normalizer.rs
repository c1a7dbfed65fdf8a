use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::models::{AnalysisSignal, Bias, Direction, EntryZone, PlanDirection, TradePlan, TurtleSoup};

const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Repair a raw analysis record into a canonical [`AnalysisSignal`].
///
/// Never fails: anything malformed degrades to a safe default. Non-object
/// input yields a neutral signal at the default confidence.
pub fn normalize(raw: &Value) -> AnalysisSignal {
    let Some(obj) = raw.as_object() else {
        return AnalysisSignal::default();
    };

    let bias = obj
        .get("bias")
        .and_then(Value::as_str)
        .map(Bias::from_str_loose)
        .unwrap_or_default();

    let confidence = obj
        .get("confidence")
        .and_then(coerce_f64)
        .map(|c| c.clamp(0.0, 100.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    let notes = obj
        .get("ict_notes")
        .or_else(|| obj.get("notes"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    AnalysisSignal {
        bias,
        confidence,
        levels: obj.get("levels").map(normalize_levels).unwrap_or_default(),
        notes,
        turtle_soup: obj.get("turtle_soup").and_then(normalize_turtle_soup),
        trade_plan: obj.get("trade_plan").and_then(normalize_trade_plan),
    }
}

/// Numbers pass through, numeric strings are parsed. NaN and infinities are
/// treated as non-numeric.
pub fn coerce_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn normalize_levels(v: &Value) -> BTreeMap<String, f64> {
    v.as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| coerce_f64(v).map(|n| (k.clone(), n)))
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_turtle_soup(v: &Value) -> Option<TurtleSoup> {
    let obj = v.as_object().filter(|o| !o.is_empty())?;

    Some(TurtleSoup {
        detected: obj.get("detected").and_then(Value::as_bool).unwrap_or(false),
        direction: obj
            .get("direction")
            .and_then(Value::as_str)
            .and_then(Direction::from_str_loose),
        entry: price(obj, "entry"),
        invalidation: price(obj, "invalidation"),
        tp1: price(obj, "tp1"),
        tp2: price(obj, "tp2"),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn normalize_trade_plan(v: &Value) -> Option<TradePlan> {
    let obj = v.as_object()?;

    let stand_down_if = match obj.get("stand_down_if") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };

    Some(TradePlan {
        direction: obj
            .get("direction")
            .and_then(Value::as_str)
            .and_then(PlanDirection::from_str_loose),
        entry_zone: obj.get("entry_zone").and_then(entry_zone),
        invalidation: price(obj, "invalidation"),
        tp1: price(obj, "tp1"),
        tp2: price(obj, "tp2"),
        stand_down_if,
    })
}

fn entry_zone(v: &Value) -> Option<EntryZone> {
    if let Some(n) = coerce_f64(v) {
        return Some(EntryZone::Point { value: n });
    }
    let obj = v.as_object()?;
    match (price(obj, "low"), price(obj, "high")) {
        (Some(low), Some(high)) => Some(EntryZone::Range {
            low: low.min(high),
            high: low.max(high),
        }),
        _ => price(obj, "value").map(|value| EntryZone::Point { value }),
    }
}

fn price(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    obj.get(key).and_then(coerce_f64)
}
