use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const OVERSAMPLING: f64 = 4.0;
const HIFAC: f64 = 1.0;

/// Lomb–Scargle periodogram of an unevenly sampled series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LombPeriodogram {
    pub freqs: Vec<f64>,
    pub powers: Vec<f64>,
}

/// Band powers of the RR history. Each field is `None` when the value came out
/// non-finite.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HrvFrequency {
    pub lf: Option<f64>,
    pub mf: Option<f64>,
    pub hf: Option<f64>,
    pub lf_hf: Option<f64>,
}

pub const LF_BAND: (f64, f64) = (0.1, 0.2);
pub const MF_BAND: (f64, f64) = (0.2, 0.3);
pub const HF_BAND: (f64, f64) = (0.3, 0.4);
pub const RATIO_LOW_BAND: (f64, f64) = (0.09, 0.15);
pub const RATIO_HIGH_BAND: (f64, f64) = (0.15, 0.4);

/// Normalized Lomb periodogram (Numerical Recipes `period`), oversampling 4,
/// highest frequency at the average Nyquist limit.
///
/// Returns `None` for fewer than two points, a zero time span or a constant
/// series.
pub fn lomb(x: &[f64], y: &[f64]) -> Option<LombPeriodogram> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let ymin = y.iter().copied().fold(f64::INFINITY, f64::min);
    let ymax = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !(ymax > ymin) {
        return None;
    }
    let mean = y.iter().sum::<f64>() / n as f64;
    let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    // Rounding in `mean` leaves a residual variance on near-constant input.
    if !(var > f64::EPSILON * mean * mean) || !var.is_finite() {
        return None;
    }
    let xmin = x.iter().copied().fold(f64::INFINITY, f64::min);
    let xmax = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = xmax - xmin;
    if !(span > 0.0) {
        return None;
    }
    let xave = 0.5 * (xmax + xmin);
    let nout = (0.5 * OVERSAMPLING * HIFAC * n as f64) as usize;
    let step = 1.0 / (span * OVERSAMPLING);

    let mut freqs = Vec::with_capacity(nout);
    let mut powers = Vec::with_capacity(nout);
    for i in 1..=nout {
        let f = i as f64 * step;
        let w = 2.0 * PI * f;
        let (s2, c2) = x.iter().fold((0.0, 0.0), |(s, c), &xi| {
            let arg = 2.0 * w * (xi - xave);
            (s + arg.sin(), c + arg.cos())
        });
        let tau = s2.atan2(c2) / (2.0 * w);
        let (mut sh, mut ch, mut ss, mut cc) = (0.0, 0.0, 0.0, 0.0);
        for (&xi, &yi) in x.iter().zip(y) {
            let arg = w * (xi - xave - tau);
            let (s, c) = arg.sin_cos();
            let h = yi - mean;
            sh += h * s;
            ch += h * c;
            ss += s * s;
            cc += c * c;
        }
        let mut p = 0.0;
        if cc > 0.0 {
            p += ch * ch / cc;
        }
        if ss > 0.0 {
            p += sh * sh / ss;
        }
        freqs.push(f);
        powers.push(p / (2.0 * var));
    }
    Some(LombPeriodogram { freqs, powers })
}

impl LombPeriodogram {
    /// Sum of the periodogram over `lo <= f < hi`.
    pub fn band_power(&self, band: (f64, f64)) -> f64 {
        self.freqs
            .iter()
            .zip(&self.powers)
            .filter(|(f, _)| **f >= band.0 && **f < band.1)
            .map(|(_, p)| *p)
            .sum()
    }

    /// Frequency of the strongest component.
    pub fn peak_frequency(&self) -> Option<f64> {
        self.freqs
            .iter()
            .zip(&self.powers)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(f, _)| *f)
    }
}

/// LF/MF/HF band powers and the LF/HF ratio of a series sampled at its
/// indices (one point per beat).
pub fn hrv_frequency(values: &[f64]) -> Option<HrvFrequency> {
    let x: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let psd = lomb(&x, values)?;
    let finite = |v: f64| v.is_finite().then_some(v);
    Some(HrvFrequency {
        lf: finite(psd.band_power(LF_BAND)),
        mf: finite(psd.band_power(MF_BAND)),
        hf: finite(psd.band_power(HF_BAND)),
        lf_hf: lf_hf_ratio(&psd),
    })
}

/// Power in 0.09–0.15 over power in 0.15–0.4, `None` when not finite.
pub fn lf_hf_ratio(psd: &LombPeriodogram) -> Option<f64> {
    let ratio = psd.band_power(RATIO_LOW_BAND) / psd.band_power(RATIO_HIGH_BAND);
    ratio.is_finite().then_some(ratio)
}
