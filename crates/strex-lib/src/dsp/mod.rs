//! Stateless numeric primitives shared by the extractors.

pub mod kernels;

use crate::signal::Sample;
use serde::{Deserialize, Serialize};

/// Window shape used for the cardiac smoothing stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum WindowKind {
    #[default]
    Blackman,
    Rectangular,
}

impl WindowKind {
    pub fn taps(self, len: usize) -> Vec<f64> {
        match self {
            WindowKind::Blackman => blackman(len),
            WindowKind::Rectangular => vec![1.0 / len.max(1) as f64; len.max(1)],
        }
    }
}

/// Symmetric Blackman window of `len` points.
pub fn blackman(len: usize) -> Vec<f64> {
    use std::f64::consts::PI;
    if len <= 1 {
        return vec![1.0; len.max(1)];
    }
    let m = (len - 1) as f64;
    (0..len)
        .map(|i| {
            let x = i as f64;
            0.42 - 0.5 * (2.0 * PI * x / m).cos() + 0.08 * (4.0 * PI * x / m).cos()
        })
        .collect()
}

/// Convolution cropped to the input length and centred on the kernel
/// ("same" mode), so output sample `i` stays aligned with input sample `i`.
pub fn conv_same(data: &[f64], kernel: &[f64]) -> Vec<f64> {
    if data.is_empty() || kernel.is_empty() {
        return data.to_vec();
    }
    let n = data.len() as isize;
    let offset = ((kernel.len() - 1) / 2) as isize;
    (0..n)
        .map(|i| {
            let centre = i + offset;
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, &h)| {
                    let idx = centre - k as isize;
                    (0..n).contains(&idx).then(|| h * data[idx as usize])
                })
                .sum()
        })
        .collect()
}

/// Filter a sample stream with `kernel`, keeping the input timestamps.
pub fn fir_filter(samples: &[Sample], kernel: &[f64]) -> Vec<Sample> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    conv_same(&values, kernel)
        .into_iter()
        .zip(samples)
        .map(|(v, s)| s.with_value(v))
        .collect()
}

/// Divide every sample by the `pct` percentile of the stream.
///
/// A zero or non-finite percentile leaves the stream unchanged.
pub fn normalize_by_percentile(samples: &[Sample], pct: f64) -> Vec<Sample> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let scale = percentile(&values, pct);
    if scale == 0.0 || !scale.is_finite() {
        return samples.to_vec();
    }
    samples.iter().map(|s| s.with_value(s.value / scale)).collect()
}

pub fn square(samples: &[Sample]) -> Vec<Sample> {
    samples.iter().map(|s| s.with_value(s.value * s.value)).collect()
}

/// Centred moving average of `span` points. The span shrinks symmetrically
/// near the edges; an even span is reduced to the next odd one.
pub fn smooth(samples: &[Sample], span: usize) -> Vec<Sample> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }
    let span = span.max(1);
    let half = if span % 2 == 0 { (span - 1) / 2 } else { span / 2 };
    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for s in samples {
        acc += s.value;
        prefix.push(acc);
    }
    samples
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let h = half.min(i).min(n - 1 - i);
            let sum = prefix[i + h + 1] - prefix[i - h];
            s.with_value(sum / (2 * h + 1) as f64)
        })
        .collect()
}

/// `(x - mean) / stddev` over the stream; all zeros when the deviation is zero.
pub fn zscore(samples: &[Sample]) -> Vec<Sample> {
    let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let mu = mean(&values);
    let sigma = stddev(&values);
    samples
        .iter()
        .map(|s| {
            if sigma > 0.0 && sigma.is_finite() {
                s.with_value((s.value - mu) / sigma)
            } else {
                s.with_value(0.0)
            }
        })
        .collect()
}

/// Euclidean norm of each synchronized triple.
pub fn magnitude(x: &[Sample], y: &[Sample], z: &[Sample]) -> Vec<f64> {
    x.iter()
        .zip(y)
        .zip(z)
        .map(|((a, b), c)| (a.value * a.value + b.value * b.value + c.value * c.value).sqrt())
        .collect()
}

/// Successive differences, stamped at the later sample.
pub fn diff(samples: &[Sample]) -> Vec<Sample> {
    samples
        .windows(2)
        .map(|w| w[1].with_value(w[1].value - w[0].value))
        .collect()
}

pub fn ewma(x: f64, previous: f64, alpha: f64) -> f64 {
    alpha * x + (1.0 - alpha) * previous
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1); zero for a single value.
pub fn stddev(values: &[f64]) -> f64 {
    match values.len() {
        0 => f64::NAN,
        1 => 0.0,
        n => {
            let mu = mean(values);
            (values.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (n as f64 - 1.0)).sqrt()
        }
    }
}

/// Percentile with `pct` in percent: position `pct·(n+1)/100`, linear
/// interpolation between order statistics, clamped to the extremes.
pub fn percentile(values: &[f64], pct: f64) -> f64 {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    match n {
        0 => f64::NAN,
        1 => sorted[0],
        _ => {
            let pos = pct * (n as f64 + 1.0) / 100.0;
            if pos < 1.0 {
                return sorted[0];
            }
            if pos >= n as f64 {
                return sorted[n - 1];
            }
            let lower = pos.floor();
            let frac = pos - lower;
            let lo = sorted[lower as usize - 1];
            let hi = sorted[lower as usize];
            lo + frac * (hi - lo)
        }
    }
}
