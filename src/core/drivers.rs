use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;

use crate::models::NewsItem;

const TITLE_PREFIX_CHARS: usize = 80;

/// Highest-confidence news from the last `recency_hours`, at most `limit`
/// items. Equal confidences keep their input order.
pub fn top_drivers(
    items: &[NewsItem],
    now: DateTime<Utc>,
    recency_hours: i64,
    limit: usize,
) -> Vec<NewsItem> {
    let cutoff = now - Duration::hours(recency_hours);

    let mut recent: Vec<&NewsItem> = items
        .iter()
        .filter(|n| n.published_at >= cutoff && n.confidence.is_some())
        .collect();

    // sort_by is stable
    recent.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    recent.into_iter().take(limit).cloned().collect()
}

/// Evidence line for a news driver.
pub fn evidence_line(item: &NewsItem) -> String {
    let stance = item.stance.map_or("neutral", |s| s.as_str());
    let prefix: String = item.title.chars().take(TITLE_PREFIX_CHARS).collect();
    format!("News ({}): {}...", stance, prefix)
}
