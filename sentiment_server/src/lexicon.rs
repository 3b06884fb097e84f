use chrono::{DateTime, Utc};
use data_ingestion::timestamp::iso_seconds;
use serde::{Deserialize, Serialize};

pub const ENGINE: &str = "lexicon";

const POSITIVE: &[&str] = &[
    "beat", "beats", "beating", "outperform", "surge", "surges", "record", "upgrade", "upgrades",
    "bullish", "rally", "rallies", "strength",
];

const NEGATIVE: &[&str] = &[
    "miss", "misses", "warning", "downgrade", "downgrades", "bearish", "plunge", "plunges", "fall",
    "falls", "lawsuit", "probe", "investigation",
];

/// Signed keyword score in [-1, 1]. Keywords are matched as lowercase
/// substrings, so "beats" also counts "beat".
pub fn lexicon_score(text: &str) -> f64 {
    let lowered = text.to_lowercase();
    let hits = |words: &[&str]| words.iter().filter(|w| lowered.contains(*w)).count() as f64;
    let raw = hits(POSITIVE) - hits(NEGATIVE);
    if raw == 0.0 {
        return 0.0;
    }
    (raw / 3.0).clamp(-1.0, 1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub ts: String,
    pub n: usize,
    pub mean: f64,
    pub std: f64,
    pub samples: Vec<f64>,
    pub engine: String,
}

/// Trimmed, non-blank texts in input order.
pub fn normalize_texts(texts: &[String]) -> Vec<String> {
    texts
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn analyze(texts: &[String], now: DateTime<Utc>) -> SentimentReport {
    let samples: Vec<f64> = texts.iter().map(|t| lexicon_score(t)).collect();
    let n = samples.len();
    let (mean, std) = if n == 0 {
        (0.0, 0.0)
    } else {
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        (mean, var.sqrt())
    };

    SentimentReport {
        ts: iso_seconds(now),
        n,
        mean,
        std,
        samples,
        engine: ENGINE.to_string(),
    }
}
