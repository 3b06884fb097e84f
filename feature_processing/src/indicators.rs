use data_ingestion::Candle;
use thiserror::Error;

pub const ATR_WINDOW: usize = 20;
pub const SMA_WINDOW: usize = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("insufficient data for {indicator}: need {needed} samples, have {available}")]
    InsufficientData {
        indicator: &'static str,
        needed: usize,
        available: usize,
    },
}

/// A zero window is never satisfiable.
fn require(indicator: &'static str, needed: usize, available: usize, window: usize) -> Result<(), IndicatorError> {
    if window == 0 || available < needed {
        return Err(IndicatorError::InsufficientData {
            indicator,
            needed: needed.max(1),
            available,
        });
    }
    Ok(())
}

/// Mean of the last `window` values.
pub fn sma(values: &[f64], window: usize) -> Result<f64, IndicatorError> {
    require("sma", window, values.len(), window)?;
    let tail = &values[values.len() - window..];
    Ok(tail.iter().sum::<f64>() / window as f64)
}

pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Average true range over the last `window` bars, divided by the last close.
/// Bar `k` pairs `highs[-window+k]`/`lows[-window+k]` with `closes[-window-1+k]`.
pub fn atr_normalized(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    window: usize,
) -> Result<f64, IndicatorError> {
    let available = highs.len().min(lows.len()).min(closes.len());
    require("atr", window + 1, available, window)?;

    let highs = &highs[highs.len() - window..];
    let lows = &lows[lows.len() - window..];
    let prev_closes = &closes[closes.len() - window - 1..closes.len() - 1];

    let atr = highs
        .iter()
        .zip(lows)
        .zip(prev_closes)
        .map(|((h, l), pc)| true_range(*h, *l, *pc))
        .sum::<f64>()
        / window as f64;

    let last = closes[closes.len() - 1];
    Ok(if last == 0.0 { 0.0 } else { atr / last })
}

/// Fractional change between the last close and the close `delta` bars earlier.
pub fn ret_pct(closes: &[f64], delta: usize) -> Result<f64, IndicatorError> {
    require("ret_pct", delta + 1, closes.len(), delta + 1)?;
    let c1 = closes[closes.len() - 1];
    let c0 = closes[closes.len() - 1 - delta];
    Ok(if c0 == 0.0 { 0.0 } else { (c1 - c0) / c0 })
}

pub fn above_sma20(closes: &[f64]) -> Result<bool, IndicatorError> {
    let mean = sma(closes, SMA_WINDOW)?;
    Ok(closes[closes.len() - 1] > mean)
}

/// Price-derived inputs of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSignals {
    pub r_1m: f64,
    pub r_5m: f64,
    pub above_sma20: bool,
    /// Unclamped normalized ATR.
    pub rv20: f64,
}

pub fn price_signals(candles: &[Candle]) -> Result<PriceSignals, IndicatorError> {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    Ok(PriceSignals {
        r_1m: ret_pct(&closes, 1)?,
        r_5m: ret_pct(&closes, 5)?,
        above_sma20: above_sma20(&closes)?,
        rv20: atr_normalized(&highs, &lows, &closes, ATR_WINDOW)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const CLOSES: [f64; 21] = [
        100.0, 101.0, 102.0, 103.0, 103.0, 104.0, 105.0, 104.0, 103.0, 102.0, 103.0, 104.0, 103.0,
        102.0, 101.0, 100.0, 99.0, 99.0, 100.0, 101.0, 102.0,
    ];

    #[test]
    fn sma_of_tail() {
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0], 2).unwrap(), 3.5);
        assert_eq!(sma(&[5.0], 1).unwrap(), 5.0);
    }

    #[test]
    fn sma_rejects_short_series() {
        assert_eq!(
            sma(&[1.0, 2.0], 3),
            Err(IndicatorError::InsufficientData {
                indicator: "sma",
                needed: 3,
                available: 2
            })
        );
        assert!(sma(&[], 0).is_err());
    }

    #[test]
    fn true_range_takes_widest_gap() {
        assert_eq!(true_range(105.0, 100.0, 102.0), 5.0);
        assert_eq!(true_range(105.0, 103.0, 99.0), 6.0);
        assert_eq!(true_range(101.0, 98.0, 104.0), 6.0);
    }

    #[test]
    fn ret_pct_one_bar() {
        let r = ret_pct(&[100.0, 101.0, 102.0], 1).unwrap();
        assert!((r - 1.0 / 101.0).abs() < 1e-12);
        assert!((r - 0.0099).abs() < 1e-4);
    }

    #[test]
    fn ret_pct_edges() {
        assert!(ret_pct(&[100.0], 1).is_err());
        assert_eq!(ret_pct(&[0.0, 5.0], 1).unwrap(), 0.0);
    }

    #[test]
    fn increasing_series_is_above_sma20() {
        let closes: Vec<f64> = (1..=21).map(f64::from).collect();
        assert!(above_sma20(&closes).unwrap());
        assert!(!above_sma20(&closes.iter().rev().copied().collect::<Vec<_>>()).unwrap());
        assert!(above_sma20(&closes[..19]).is_err());
    }

    #[test]
    fn atr_uses_previous_close_per_bar() {
        let highs: Vec<f64> = CLOSES.iter().map(|c| c + 1.0).collect();
        let lows: Vec<f64> = CLOSES.iter().map(|c| c - 1.0).collect();
        // every bar's range (2.0) dominates the 1-point close-to-close gaps
        let atr = atr_normalized(&highs, &lows, &CLOSES, 20).unwrap();
        assert!((atr - 2.0 / 102.0).abs() < 1e-12);
    }

    #[test]
    fn atr_gap_dominates_range() {
        let closes = [10.0, 20.0, 20.0];
        let highs = [10.0, 20.5, 20.5];
        let lows = [10.0, 19.5, 19.5];
        // bar 1: |20.5 - 10| = 10.5, bar 2: range 1.0
        let atr = atr_normalized(&highs, &lows, &closes, 2).unwrap();
        assert!((atr - (10.5 + 1.0) / 2.0 / 20.0).abs() < 1e-12);
    }

    #[test]
    fn atr_needs_window_plus_one_and_tolerates_zero_close() {
        assert!(atr_normalized(&CLOSES[..20], &CLOSES[..20], &CLOSES[..20], 20).is_err());
        let zeros = [0.0; 21];
        assert_eq!(atr_normalized(&zeros, &zeros, &zeros, 20).unwrap(), 0.0);
    }

    #[test]
    fn price_signals_from_candles() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 14, 0, 0).unwrap();
        let candles: Vec<Candle> = CLOSES
            .iter()
            .enumerate()
            .map(|(i, c)| Candle {
                ts: t0 + chrono::Duration::minutes(i as i64),
                open: *c,
                high: c + 1.0,
                low: c - 1.0,
                close: *c,
                volume: 10_000,
            })
            .collect();

        let s = price_signals(&candles).unwrap();
        assert!((s.r_1m - (102.0 - 101.0) / 101.0).abs() < 1e-12);
        assert!((s.r_5m - (102.0 - 100.0) / 100.0).abs() < 1e-12);
        // 102 sits just under the 20-bar mean of 102.05
        assert!(!s.above_sma20);
        assert!((s.rv20 - 2.0 / 102.0).abs() < 1e-12);

        assert!(matches!(
            price_signals(&candles[..10]),
            Err(IndicatorError::InsufficientData { .. })
        ));
    }
}
