use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("response is empty")]
    Empty,
    #[error("no JSON object found in response")]
    NoJsonObject,
    #[error("no complete JSON object found in response")]
    Unterminated,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("response has neither symbol+bias nor a signals object")]
    UnrecognizedShape,
}

/// An analysis response, resolved once into one of the two accepted shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// `{symbol, bias, confidence, ...}`
    Single {
        symbol: String,
        record: Value,
        market_context: Option<String>,
    },
    /// Legacy `{signals: {SYMBOL: {...}}, market_context?, news_impact?}`
    Multi {
        signals: Vec<(String, Value)>,
        market_context: Option<String>,
        news_impact: Option<String>,
    },
}

impl ResponsePayload {
    /// Extract, parse, and classify a raw response text.
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let json = extract_json(text)?;
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, PayloadError> {
        let Value::Object(mut obj) = value else {
            return Err(PayloadError::UnrecognizedShape);
        };

        let market_context = obj
            .get("market_context")
            .and_then(Value::as_str)
            .map(str::to_string);

        let symbol = obj.get("symbol").and_then(Value::as_str).map(str::to_string);
        if let Some(symbol) = symbol.filter(|_| obj.contains_key("bias")) {
            return Ok(ResponsePayload::Single {
                symbol: symbol.trim().to_uppercase(),
                record: Value::Object(obj),
                market_context,
            });
        }

        match obj.remove("signals") {
            Some(Value::Object(signals)) => Ok(ResponsePayload::Multi {
                signals: signals
                    .into_iter()
                    .filter(|(_, v)| v.is_object())
                    .map(|(k, v)| (k.trim().to_uppercase(), v))
                    .collect(),
                market_context,
                news_impact: obj
                    .get("news_impact")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            _ => Err(PayloadError::UnrecognizedShape),
        }
    }

    /// Per-symbol records. Multi-symbol payloads yield symbols in key order.
    pub fn records(&self) -> Vec<(&str, &Value)> {
        match self {
            ResponsePayload::Single { symbol, record, .. } => vec![(symbol.as_str(), record)],
            ResponsePayload::Multi { signals, .. } => {
                signals.iter().map(|(s, v)| (s.as_str(), v)).collect()
            }
        }
    }

    /// Only legacy multi-symbol payloads carry a news impact line.
    pub fn news_impact(&self) -> Option<&str> {
        match self {
            ResponsePayload::Single { .. } => None,
            ResponsePayload::Multi { news_impact, .. } => news_impact.as_deref(),
        }
    }

    pub fn market_context(&self) -> Option<&str> {
        match self {
            ResponsePayload::Single { market_context, .. }
            | ResponsePayload::Multi { market_context, .. } => market_context.as_deref(),
        }
    }
}

/// Pull the JSON object out of a reply that may wrap it in markdown fences or
/// prose. The largest fenced block wins; otherwise the first balanced
/// `{...}` is used.
pub fn extract_json(text: &str) -> Result<&str, PayloadError> {
    if text.trim().is_empty() {
        return Err(PayloadError::Empty);
    }

    if let Some(block) = fenced_blocks(text).into_iter().max_by_key(|b| b.len()) {
        return Ok(block);
    }

    let start = text.find('{').ok_or(PayloadError::NoJsonObject)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&text[start..=start + i]);
                }
            }
            _ => {}
        }
    }

    Err(PayloadError::Unterminated)
}

fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(close) = after.find("```") else {
            break;
        };
        let body = after[..close].trim_start();
        let body = body.strip_prefix("json").unwrap_or(body).trim();
        if !body.is_empty() {
            blocks.push(body);
        }
        rest = &after[close + 3..];
    }

    blocks
}
