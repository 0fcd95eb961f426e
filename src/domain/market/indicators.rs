//! Technical indicator math used by the regime classifier and strategy scorer.
//!
//! Mirrors the reference float64 arithmetic bar-for-bar, including its
//! quirks (e.g. RSI reads 0 rather than 100 when average loss is exactly
//! zero, because the reference divides by a sentinel rather than
//! special-casing it). Indicators are analytics, not money, so this module
//! works in `f64`; every other boundary in the crate stays on `Decimal`.

use crate::domain::market::candle::Candle;
use rust_decimal::prelude::ToPrimitive;

fn to_f64(d: rust_decimal::Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| to_f64(c.close)).collect()
}

fn volumes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| to_f64(c.volume)).collect()
}

/// Recursive EMA with `adjust=False` semantics: seeded with the first value,
/// then `e[i] = alpha*x[i] + (1-alpha)*e[i-1]` where `alpha = 2/(span+1)`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    out.push(values[0]);
    for &v in &values[1..] {
        let prev = *out.last().expect("seeded above");
        out.push(alpha * v + (1.0 - alpha) * prev);
    }
    out
}

pub struct Macd {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub hist: Vec<f64>,
}

pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let macd_line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd_line, signal);
    let hist: Vec<f64> = macd_line.iter().zip(&signal_line).map(|(m, s)| m - s).collect();
    Macd { macd: macd_line, signal: signal_line, hist }
}

fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < window {
            out.push(None);
            continue;
        }
        let slice = &values[i + 1 - window..=i];
        out.push(Some(slice.iter().sum::<f64>() / window as f64));
    }
    out
}

/// RSI(period); 0.0 (not 100.0) when average loss is zero — the rolling
/// division treats a zero denominator as undefined, same as the reference.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mut gains = vec![0.0; values.len()];
    let mut losses = vec![0.0; values.len()];
    for i in 1..values.len() {
        let delta = values[i] - values[i - 1];
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }
    let avg_gain = rolling_mean(&gains, period);
    let avg_loss = rolling_mean(&losses, period);
    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| match (g, l) {
            (Some(g), Some(l)) if *l != 0.0 => {
                let rs = g / l;
                100.0 - 100.0 / (1.0 + rs)
            }
            _ => 0.0,
        })
        .collect()
}

fn true_range(candles: &[Candle]) -> Vec<f64> {
    let mut tr = vec![0.0; candles.len()];
    for i in 0..candles.len() {
        let high = to_f64(candles[i].high);
        let low = to_f64(candles[i].low);
        if i == 0 {
            tr[i] = high - low;
            continue;
        }
        let prev_close = to_f64(candles[i - 1].close);
        tr[i] = (high - low).abs().max((high - prev_close).abs()).max((low - prev_close).abs());
    }
    tr
}

/// ATR(period): simple rolling mean of true range (no Wilder smoothing).
pub fn atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    rolling_mean(&true_range(candles), period)
}

/// ADX(period): simple rolling mean at every stage (DM, DI, DX) — no Wilder smoothing.
pub fn adx(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    let n = candles.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up_move = to_f64(candles[i].high - candles[i - 1].high);
        let down_move = -to_f64(candles[i].low - candles[i - 1].low);
        plus_dm[i] = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        minus_dm[i] = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
    }
    let atr_val = rolling_mean(&true_range(candles), period);
    let plus_dm_ma = rolling_mean(&plus_dm, period);
    let minus_dm_ma = rolling_mean(&minus_dm, period);

    let mut dx = vec![None; n];
    for i in 0..n {
        if let (Some(pdm), Some(mdm), Some(atr)) = (plus_dm_ma[i], minus_dm_ma[i], atr_val[i]) {
            if atr == 0.0 {
                continue;
            }
            let plus_di = 100.0 * (pdm / atr);
            let minus_di = 100.0 * (mdm / atr);
            let sum_di = plus_di + minus_di;
            if sum_di == 0.0 {
                continue;
            }
            dx[i] = Some((plus_di - minus_di).abs() / sum_di * 100.0);
        }
    }
    let dx_values: Vec<f64> = dx.iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    rolling_mean_nan_aware(&dx_values, period)
}

/// Like `rolling_mean` but treats any NaN in the window as making the whole window undefined,
/// matching pandas' default `rolling().mean()` propagation of NaN.
fn rolling_mean_nan_aware(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < window {
            out.push(None);
            continue;
        }
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            out.push(None);
        } else {
            out.push(Some(slice.iter().sum::<f64>() / window as f64));
        }
    }
    out
}

pub struct BollingerBands {
    pub upper: Vec<Option<f64>>,
    pub mid: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
    pub bandwidth: Vec<Option<f64>>,
}

pub fn bollinger_bands(values: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let mid = rolling_mean(values, period);
    let mut upper = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());
    let mut bandwidth = Vec::with_capacity(values.len());
    for i in 0..values.len() {
        if i + 1 < period {
            upper.push(None);
            lower.push(None);
            bandwidth.push(None);
            continue;
        }
        let slice = &values[i + 1 - period..=i];
        let m = mid[i].expect("window filled");
        let variance = slice.iter().map(|v| (v - m).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();
        let u = m + std * std_dev;
        let l = m - std * std_dev;
        upper.push(Some(u));
        lower.push(Some(l));
        bandwidth.push(if m != 0.0 { Some((u - l) / m) } else { None });
    }
    BollingerBands { upper, mid, lower, bandwidth }
}

pub fn volume_ma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling_mean(values, period)
}

/// Percentile rank (0-100) of the latest ATR(period) value within a trailing `lookback` window.
pub fn atr_percentile(candles: &[Candle], period: usize, lookback: usize) -> Vec<f64> {
    let atr_series = atr(candles, period);
    let mut out = vec![0.0; atr_series.len()];
    for i in 0..atr_series.len() {
        let Some(current) = atr_series[i] else { continue };
        let start = (i + 1).saturating_sub(lookback);
        let window = &atr_series[start..=i];
        let values: Vec<f64> = window.iter().filter_map(|v| *v).collect();
        if values.len() < 2 {
            continue;
        }
        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).expect("atr values are never NaN"));
        let rank = sorted.partition_point(|v| *v <= current);
        out[i] = (rank as f64 / sorted.len() as f64) * 100.0;
    }
    out
}

/// 20-bar price efficiency: |close.diff(period)| / rolling-sum(|close.diff(1)|, period).
pub fn price_efficiency(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut step_abs = vec![0.0; n];
    for i in 1..n {
        step_abs[i] = (values[i] - values[i - 1]).abs();
    }
    let mut out = vec![0.0; n];
    for i in 0..n {
        if i < period {
            continue;
        }
        let net_change = (values[i] - values[i - period]).abs();
        let total_move: f64 = step_abs[i + 1 - period..=i].iter().sum();
        if total_move != 0.0 {
            out[i] = net_change / total_move;
        }
    }
    out
}

/// 20-bar volume trend: fractional change between the mean volume of the most
/// recent `period` bars and the mean volume of the `period` bars before that.
pub fn volume_trend(values: &[f64], period: usize) -> Vec<f64> {
    let vol_ma = rolling_mean(values, period);
    let mut out = vec![0.0; values.len()];
    for i in 0..values.len() {
        if i < period {
            continue;
        }
        let prev_idx = i - period;
        if let (Some(ma), Some(prev_ma)) = (vol_ma[i], vol_ma.get(prev_idx).copied().flatten()) {
            if prev_ma != 0.0 {
                out[i] = (ma - prev_ma) / prev_ma;
            }
        }
    }
    out
}

/// Snapshot of every indicator at the latest bar of a candle window, the
/// shape the regime classifier and strategy scorer consume.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndicatorSnapshot {
    pub rsi: f64,
    pub adx: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub bb_width: f64,
    /// current bandwidth over its own 20-period rolling mean; 1.0 when undefined.
    pub bb_width_ratio: f64,
    pub atr_percentile: f64,
    pub price_efficiency: f64,
    pub volume_trend: f64,
}

pub fn latest_snapshot(candles: &[Candle]) -> IndicatorSnapshot {
    if candles.is_empty() {
        return IndicatorSnapshot::default();
    }
    let closes = closes(candles);
    let volumes = volumes(candles);
    let last = closes.len() - 1;

    let rsi_series = rsi(&closes, 14);
    let adx_series = adx(candles, 14);
    let macd_series = macd(&closes, 12, 26, 9);
    let bb = bollinger_bands(&closes, 20, 2.0);
    let bb_width_series: Vec<f64> = bb.bandwidth.iter().map(|v| v.unwrap_or(0.0)).collect();
    let bb_width_ma = rolling_mean(&bb_width_series, 20);
    let atr_pct_series = atr_percentile(candles, 14, 100);
    let efficiency_series = price_efficiency(&closes, 20);
    let vol_trend_series = volume_trend(&volumes, 20);

    let bb_width = bb.bandwidth[last].unwrap_or(0.0);
    let bb_width_ratio = match bb_width_ma[last] {
        Some(mean) if mean != 0.0 => bb_width / mean,
        _ => 1.0,
    };

    IndicatorSnapshot {
        rsi: rsi_series[last],
        adx: adx_series[last].unwrap_or(0.0),
        macd: macd_series.macd[last],
        macd_signal: macd_series.signal[last],
        macd_hist: macd_series.hist[last],
        bb_width,
        bb_width_ratio,
        atr_percentile: atr_pct_series[last],
        price_efficiency: efficiency_series[last],
        volume_trend: vol_trend_series[last],
    }
}
