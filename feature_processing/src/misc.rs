use serde::{Deserialize, Serialize};

/// Canonical feature order. The model bundle is trained against exactly this
/// order; reordering breaks inference.
pub const FEATURE_ORDER: [&str; 9] = [
    "sent_mean",
    "sent_std",
    "r_1m",
    "r_5m",
    "above_sma20",
    "mins_since_news",
    "rv20",
    "earnings_soon",
    "liquidity_flag",
];

/// Reported when no headline carries a usable timestamp.
pub const NO_NEWS_SENTINEL: u32 = 9999;
/// Largest `mins_since_news` the recommender accepts.
pub const MAX_MINS_SINCE_NEWS: u32 = 1440;

pub const RV20_MIN: f64 = 0.01;
pub const RV20_MAX: f64 = 0.80;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sent_mean: f64,
    pub sent_std: f64,
    pub r_1m: f64,
    pub r_5m: f64,
    pub above_sma20: bool,
    pub mins_since_news: u32,
    pub rv20: f64,
    pub earnings_soon: bool,
    pub liquidity_flag: bool,
}

impl FeatureVector {
    /// Fixed synthetic vector served when real features cannot be built.
    pub fn stub() -> Self {
        Self {
            sent_mean: 0.21,
            sent_std: 0.08,
            r_1m: 0.003,
            r_5m: 0.001,
            above_sma20: true,
            mins_since_news: 12,
            rv20: 0.18,
            earnings_soon: false,
            liquidity_flag: true,
        }
    }

    /// Numeric value of a named feature, booleans as 0.0 / 1.0.
    pub fn value_of(&self, name: &str) -> Option<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        Some(match name {
            "sent_mean" => self.sent_mean,
            "sent_std" => self.sent_std,
            "r_1m" => self.r_1m,
            "r_5m" => self.r_5m,
            "above_sma20" => flag(self.above_sma20),
            "mins_since_news" => f64::from(self.mins_since_news),
            "rv20" => self.rv20,
            "earnings_soon" => flag(self.earnings_soon),
            "liquidity_flag" => flag(self.liquidity_flag),
            _ => return None,
        })
    }

    /// Copy with `mins_since_news` capped to the recommender's accepted range,
    /// so the no-news sentinel reads as "a full day without news".
    pub fn for_inference(&self) -> Self {
        Self {
            mins_since_news: self.mins_since_news.min(MAX_MINS_SINCE_NEWS),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_canonical_feature_has_a_value() {
        let fv = FeatureVector::stub();
        let encoded: Vec<f64> = FEATURE_ORDER.iter().map(|n| fv.value_of(n).unwrap()).collect();
        assert_eq!(encoded, vec![0.21, 0.08, 0.003, 0.001, 1.0, 12.0, 0.18, 0.0, 1.0]);
        assert_eq!(fv.value_of("price_momentum"), None);
    }

    #[test]
    fn sentinel_is_capped_for_inference() {
        let fv = FeatureVector {
            mins_since_news: NO_NEWS_SENTINEL,
            ..FeatureVector::stub()
        };
        assert_eq!(fv.for_inference().mins_since_news, MAX_MINS_SINCE_NEWS);
        assert_eq!(FeatureVector::stub().for_inference(), FeatureVector::stub());
    }
}
