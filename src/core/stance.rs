use crate::models::Stance;

/// Keyword lookup data for headline classification. Swap in fixtures in
/// tests instead of relying on the stock vocabulary.
#[derive(Debug, Clone)]
pub struct KeywordTables {
    pub hawkish: Vec<String>,
    pub dovish: Vec<String>,
    pub fomc: Vec<String>,
    pub speech: Vec<String>,
    pub economic: Vec<String>,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl Default for KeywordTables {
    fn default() -> Self {
        Self {
            hawkish: owned(&[
                "rate hike", "raise rates", "raising rates", "tighten", "tightening",
                "inflation concern", "inflation worry", "hot inflation", "sticky inflation",
                "restrictive", "higher for longer", "more hikes", "additional hike",
                "hawkish", "aggressive", "combat inflation", "price stability",
                "elevated inflation", "upside risks",
            ]),
            dovish: owned(&[
                "rate cut", "cutting rates", "lower rates", "easing", "pause",
                "soft landing", "cooling inflation", "disinflation", "slowing economy",
                "dovish", "accommodative", "support growth", "economic weakness",
                "recession", "slowdown", "downside risks", "labor market cooling",
            ]),
            fomc: owned(&[
                "fomc", "federal open market", "monetary policy", "interest rate",
                "funds rate", "policy decision", "rate decision",
            ]),
            speech: owned(&["speech", "remarks", "testimony", "chair powell", "governor"]),
            economic: owned(&["inflation", "employment", "gdp", "economic", "beige book"]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseCategory {
    Fomc,
    Speech,
    EconomicData,
    Other,
}

impl ReleaseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseCategory::Fomc => "FOMC",
            ReleaseCategory::Speech => "Speech",
            ReleaseCategory::EconomicData => "Economic Data",
            ReleaseCategory::Other => "Other",
        }
    }
}

pub struct StanceClassifier {
    tables: KeywordTables,
}

impl StanceClassifier {
    pub fn new(tables: KeywordTables) -> Self {
        Self { tables }
    }

    /// Keyword-count stance with a confidence in [0, 90].
    pub fn classify(&self, text: &str) -> (Stance, f64) {
        let text = text.to_lowercase();
        let hawkish = count_hits(&self.tables.hawkish, &text);
        let dovish = count_hits(&self.tables.dovish, &text);

        if hawkish + dovish == 0 {
            return (Stance::Neutral, 30.0);
        }

        match hawkish.cmp(&dovish) {
            std::cmp::Ordering::Greater => (Stance::Hawkish, lean_confidence(hawkish - dovish)),
            std::cmp::Ordering::Less => (Stance::Dovish, lean_confidence(dovish - hawkish)),
            std::cmp::Ordering::Equal => (Stance::Neutral, 40.0),
        }
    }

    pub fn categorize(&self, title: &str) -> ReleaseCategory {
        let title = title.to_lowercase();
        if count_hits(&self.tables.fomc, &title) > 0 {
            ReleaseCategory::Fomc
        } else if count_hits(&self.tables.speech, &title) > 0 {
            ReleaseCategory::Speech
        } else if count_hits(&self.tables.economic, &title) > 0 {
            ReleaseCategory::EconomicData
        } else {
            ReleaseCategory::Other
        }
    }
}

impl Default for StanceClassifier {
    fn default() -> Self {
        Self::new(KeywordTables::default())
    }
}

fn count_hits(keywords: &[String], text: &str) -> usize {
    keywords.iter().filter(|kw| text.contains(kw.as_str())).count()
}

fn lean_confidence(margin: usize) -> f64 {
    (50.0 + margin as f64 * 10.0).min(90.0)
}
