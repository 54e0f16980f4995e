use crate::{
    detectors::accel::Activity,
    dsp::{self, kernels, WindowKind},
    error::{Result, StrexError},
    metrics::hrv::{hrv_frequency, HrvFrequency},
    signal::{Sample, TimeSeriesBuffer},
};
use serde::{Deserialize, Serialize};

/// Configurable parameters for the R-peak cascade and RR outlier rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardiacConfig {
    /// Percentile (0–100) each filter stage is normalised by.
    pub normalize_percentile: f64,
    /// Band-pass taps to use instead of the built-in 64 Hz design.
    pub bandpass_kernel: Option<Vec<f64>>,
    pub smoothing_window: WindowKind,
    /// Initial primary threshold on the normalised envelope.
    pub thr1_init: f64,
    pub signal_level_factor: f64,
    pub noise_level_factor: f64,
    /// Weight of the signal/noise gap in the primary threshold.
    pub threshold_fraction: f64,
    pub ewma_alpha: f64,
    /// Candidates at or above `signal_ceiling × signal_level` are rejected.
    pub signal_ceiling: f64,
    pub search_back_factor: f64,
    /// Number of trailing intervals averaged into the running RR average.
    pub rr_average_len: usize,
    /// Keep the running RR average across windows.
    pub preserve_rr_average: bool,
    /// Accepted peaks closer than this are merged.
    pub min_peak_distance_s: f64,
    /// Re-maximisation radius is `ceil(fs / remax_bin_factor)` samples.
    pub remax_bin_factor: f64,
    pub rr_min_s: f64,
    pub rr_max_s: f64,
    pub med_constant: f64,
    pub mad_constant: f64,
    pub cbd_floor: f64,
    pub noise_sigmas: f64,
}

impl Default for CardiacConfig {
    fn default() -> Self {
        Self {
            normalize_percentile: 90.0,
            bandpass_kernel: None,
            smoothing_window: WindowKind::Blackman,
            thr1_init: 0.5,
            signal_level_factor: 4.0,
            noise_level_factor: 0.1,
            threshold_fraction: 0.25,
            ewma_alpha: 0.125,
            signal_ceiling: 3.0,
            search_back_factor: 1.66,
            rr_average_len: 8,
            preserve_rr_average: true,
            min_peak_distance_s: 0.5,
            remax_bin_factor: 10.0,
            rr_min_s: 0.3,
            rr_max_s: 2.0,
            med_constant: 3.32,
            mad_constant: 2.9,
            cbd_floor: 0.2,
            noise_sigmas: 3.0,
        }
    }
}

impl CardiacConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(StrexError::InvalidConfig(format!("cardiac: {msg}")));
        if !(self.normalize_percentile > 0.0 && self.normalize_percentile <= 100.0) {
            return invalid("normalize_percentile must lie in (0, 100]");
        }
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return invalid("ewma_alpha must lie in (0, 1]");
        }
        if self.rr_average_len == 0 {
            return invalid("rr_average_len must be positive");
        }
        if !(self.rr_min_s < self.rr_max_s) {
            return invalid("rr_min_s must be below rr_max_s");
        }
        if !(self.remax_bin_factor > 0.0) || !(self.min_peak_distance_s >= 0.0) {
            return invalid("peak spacing parameters must be positive");
        }
        if matches!(&self.bandpass_kernel, Some(k) if k.is_empty()) {
            return invalid("bandpass_kernel must not be empty");
        }
        Ok(())
    }
}

/// Local extremum of the smoothed envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Position in the envelope.
    pub index: usize,
    pub timestamp: i64,
    pub value: f64,
}

impl Candidate {
    pub fn sample(&self) -> Sample {
        Sample::new(self.timestamp, self.value)
    }
}

/// Adaptive threshold state of one classification pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetectorState {
    pub signal_level: f64,
    pub noise_level: f64,
    pub thr1: f64,
    pub thr2: f64,
    /// Running RR average in milliseconds.
    pub rr_average: Option<f64>,
    /// Indices into the candidate list, in acceptance order.
    pub accepted: Vec<usize>,
}

impl PeakDetectorState {
    fn new(cfg: &CardiacConfig, rr_average: Option<f64>) -> Self {
        let thr1 = cfg.thr1_init;
        let signal_level = cfg.signal_level_factor * thr1;
        Self {
            signal_level,
            noise_level: cfg.noise_level_factor * signal_level,
            thr1,
            thr2: 0.5 * thr1,
            rr_average,
            accepted: Vec::new(),
        }
    }

    fn update_thresholds(&mut self, cfg: &CardiacConfig) {
        self.thr1 = self.noise_level + cfg.threshold_fraction * (self.signal_level - self.noise_level);
        self.thr2 = 0.5 * self.thr1;
    }

    fn accept(&mut self, idx: usize, value: f64, cfg: &CardiacConfig) {
        self.accepted.push(idx);
        self.signal_level = dsp::ewma(value, self.signal_level, cfg.ewma_alpha);
    }

    fn update_rr_average(&mut self, candidates: &[Candidate], cfg: &CardiacConfig) {
        let n = cfg.rr_average_len;
        if self.accepted.len() > n {
            let tail = &self.accepted[self.accepted.len() - n - 1..];
            let sum: i64 = tail
                .windows(2)
                .map(|w| candidates[w[1]].timestamp - candidates[w[0]].timestamp)
                .sum();
            self.rr_average = Some(sum as f64 / n as f64);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RrQuality {
    Good,
    Bad,
    Noise,
}

impl RrQuality {
    pub fn code(self) -> f64 {
        match self {
            RrQuality::Good => 0.0,
            RrQuality::Bad => 1.0,
            RrQuality::Noise => 2.0,
        }
    }
}

/// RR interval inside the physiological range, with its position in the
/// window's full RR list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidBeat {
    pub rr_index: usize,
    pub timestamp: i64,
    pub rr: f64,
}

/// Beat-distance statistics of one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RrDispersion {
    pub med: f64,
    pub mad: f64,
    pub cbd: f64,
}

/// Every intermediate and final output of one cardiac window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardiacWindow {
    pub bandpassed: Vec<Sample>,
    pub bandpassed_normalized: Vec<Sample>,
    pub derivative: Vec<Sample>,
    pub derivative_normalized: Vec<Sample>,
    pub squared: Vec<Sample>,
    pub squared_normalized: Vec<Sample>,
    pub smoothed: Vec<Sample>,
    pub smoothed_normalized: Vec<Sample>,
    pub candidates: Vec<Candidate>,
    pub accepted: Vec<Sample>,
    pub deduplicated: Vec<Sample>,
    pub rpeaks: Vec<Sample>,
    /// RR intervals in seconds, stamped at the earlier peak.
    pub rr_value: Vec<Sample>,
    pub valid_rr: Vec<ValidBeat>,
    pub rr_diff: Vec<Sample>,
    pub rr_quality: Vec<RrQuality>,
    pub dispersion: Option<RrDispersion>,
    /// Good RR values of this window (before the activity gate).
    pub rr_filtered: Vec<Sample>,
    /// Samples appended to the long-lived histories this window.
    pub accumulated_rr: Vec<Sample>,
    pub accumulated_heart_rate: Vec<Sample>,
    pub hrv: Option<HrvFrequency>,
    pub hrv_timestamp: Option<i64>,
    pub state: Option<PeakDetectorState>,
}

impl CardiacWindow {
    /// Quality codes stamped at the RR timestamps.
    pub fn rr_quality_samples(&self) -> Vec<Sample> {
        self.rr_value
            .iter()
            .zip(&self.rr_quality)
            .map(|(s, q)| s.with_value(q.code()))
            .collect()
    }
}

/// Stateful cardiac extractor. Owns the long-lived good-RR and heart-rate
/// histories and the RR average carried between windows.
#[derive(Debug, Clone)]
pub struct CardiacExtractor {
    cfg: CardiacConfig,
    rr_history: TimeSeriesBuffer,
    heart_rate: TimeSeriesBuffer,
    carried_rr_average: Option<f64>,
}

impl CardiacExtractor {
    pub fn new(cfg: CardiacConfig) -> Self {
        Self {
            cfg,
            rr_history: TimeSeriesBuffer::new("ecg.rr"),
            heart_rate: TimeSeriesBuffer::new("ecg.rr.heartrate"),
            carried_rr_average: None,
        }
    }

    pub fn config(&self) -> &CardiacConfig {
        &self.cfg
    }

    /// Good RR intervals accumulated over still windows.
    pub fn rr_history(&self) -> &TimeSeriesBuffer {
        &self.rr_history
    }

    pub fn heart_rate(&self) -> &TimeSeriesBuffer {
        &self.heart_rate
    }

    pub fn carried_rr_average(&self) -> Option<f64> {
        self.carried_rr_average
    }

    /// Run the full cascade on one window of ECG.
    pub fn run_window(&mut self, ecg: &TimeSeriesBuffer, activity: Activity) -> Result<CardiacWindow> {
        let fs = ecg.require_frequency()?;
        let cfg = &self.cfg;
        let mut out = CardiacWindow::default();
        if ecg.is_empty() {
            return Ok(out);
        }

        let kernel: &[f64] = match &cfg.bandpass_kernel {
            Some(k) => k,
            None => {
                if (fs - kernels::ECG_BANDPASS_FS).abs() > f64::EPSILON {
                    log::warn!(
                        "ecg sampled at {fs} Hz but the built-in band-pass is designed for {} Hz",
                        kernels::ECG_BANDPASS_FS
                    );
                }
                &kernels::ECG_BANDPASS_64HZ
            }
        };
        let pct = cfg.normalize_percentile;
        out.bandpassed = dsp::fir_filter(ecg.data(), kernel);
        out.bandpassed_normalized = dsp::normalize_by_percentile(&out.bandpassed, pct);
        out.derivative = dsp::fir_filter(&out.bandpassed_normalized, &kernels::DERIVATIVE);
        out.derivative_normalized = dsp::normalize_by_percentile(&out.derivative, pct);
        out.squared = dsp::square(&out.derivative_normalized);
        out.squared_normalized = dsp::normalize_by_percentile(&out.squared, pct);
        let window_len = (fs / 5.0).ceil().max(1.0) as usize;
        let taps = cfg.smoothing_window.taps(window_len);
        out.smoothed = dsp::fir_filter(&out.squared_normalized, &taps);
        out.smoothed_normalized = dsp::normalize_by_percentile(&out.smoothed, pct);

        out.candidates = find_candidates(&out.smoothed_normalized);
        let state = classify_candidates(&out.candidates, self.carried_rr_average, cfg);
        if cfg.preserve_rr_average {
            self.carried_rr_average = state.rr_average;
        }
        out.accepted = state
            .accepted
            .iter()
            .map(|&i| out.candidates[i].sample())
            .collect();
        let min_gap_ms = (cfg.min_peak_distance_s * 1000.0).round() as i64;
        out.deduplicated = eliminate_duplicates(&out.accepted, min_gap_ms);
        let radius_ms = ((fs / cfg.remax_bin_factor).ceil() * 1000.0 / fs).round() as i64;
        out.rpeaks = remaximize(&out.deduplicated, &out.candidates, radius_ms);
        out.rr_value = rr_values(&out.rpeaks);

        let (valid, quality, dispersion) = classify_rr(&out.rr_value, cfg);
        out.rr_diff = valid
            .windows(2)
            .map(|w| Sample::new(w[1].timestamp, (w[1].rr - w[0].rr).abs()))
            .collect();
        out.valid_rr = valid;
        out.rr_quality = quality;
        out.dispersion = dispersion;
        out.rr_filtered = out
            .rr_value
            .iter()
            .zip(&out.rr_quality)
            .filter(|(_, q)| **q == RrQuality::Good)
            .map(|(s, _)| *s)
            .collect();

        log::debug!(
            "ecg window: {} samples, {} candidates, {} accepted, {} r-peaks, {}/{} good rr",
            ecg.len(),
            out.candidates.len(),
            out.accepted.len(),
            out.rpeaks.len(),
            out.rr_filtered.len(),
            out.rr_value.len()
        );

        if activity == Activity::Still {
            for rr in &out.rr_filtered {
                let hr = rr.with_value(60.0 / rr.value);
                self.rr_history.add(*rr);
                self.heart_rate.add(hr);
                out.accumulated_rr.push(*rr);
                out.accumulated_heart_rate.push(hr);
            }
            if !self.rr_history.is_empty() {
                let values: Vec<f64> = self.rr_history.values().collect();
                out.hrv = hrv_frequency(&values);
                out.hrv_timestamp = out
                    .rr_value
                    .first()
                    .or_else(|| self.rr_history.last())
                    .map(|s| s.timestamp);
            }
        }
        out.state = Some(state);
        Ok(out)
    }
}

/// Strict local maxima over a five-sample neighbourhood.
pub fn find_candidates(envelope: &[Sample]) -> Vec<Candidate> {
    if envelope.len() < 5 {
        return Vec::new();
    }
    (2..envelope.len() - 2)
        .filter(|&i| {
            let v = |k: usize| envelope[k].value;
            v(i - 2) < v(i - 1) && v(i - 1) < v(i) && v(i) >= v(i + 1) && v(i + 1) > v(i + 2)
        })
        .map(|i| Candidate {
            index: i,
            timestamp: envelope[i].timestamp,
            value: envelope[i].value,
        })
        .collect()
}

/// Adaptive signal/noise classification with search-back.
pub fn classify_candidates(
    candidates: &[Candidate],
    carried_rr_average: Option<f64>,
    cfg: &CardiacConfig,
) -> PeakDetectorState {
    let mut st = PeakDetectorState::new(cfg, carried_rr_average);
    let mut i = 0;
    while i < candidates.len() {
        if let (Some(&last), Some(rr_avg)) = (st.accepted.last(), st.rr_average) {
            let gap = (candidates[i].timestamp - candidates[last].timestamp) as f64;
            if gap > cfg.search_back_factor * rr_avg && i - last > 1 {
                let ceiling = cfg.signal_ceiling * st.signal_level;
                let best = (last + 1..i)
                    .filter(|&j| candidates[j].value > st.thr2 && candidates[j].value < ceiling)
                    .fold(None, |best: Option<usize>, j| match best {
                        Some(b) if candidates[b].value >= candidates[j].value => Some(b),
                        _ => Some(j),
                    });
                if let Some(j) = best {
                    log::debug!("search-back promoted candidate at {}", candidates[j].timestamp);
                    st.accept(j, candidates[j].value, cfg);
                    st.update_thresholds(cfg);
                    st.update_rr_average(candidates, cfg);
                    i = j + 1;
                    continue;
                }
            }
        }

        let value = candidates[i].value;
        if value > st.thr1 && value < cfg.signal_ceiling * st.signal_level {
            st.accept(i, value, cfg);
        } else if value > st.thr2 && value < st.thr1 {
            st.noise_level = dsp::ewma(value, st.noise_level, cfg.ewma_alpha);
        }
        st.update_thresholds(cfg);
        st.update_rr_average(candidates, cfg);
        i += 1;
    }
    st
}

/// Merge peaks closer than `min_gap_ms`, dropping the lower one (the later one
/// on ties), until a pass removes nothing.
pub fn eliminate_duplicates(peaks: &[Sample], min_gap_ms: i64) -> Vec<Sample> {
    let mut peaks = peaks.to_vec();
    loop {
        let mut drop = vec![false; peaks.len()];
        for (j, pair) in peaks.windows(2).enumerate() {
            if pair[1].timestamp - pair[0].timestamp < min_gap_ms {
                let loser = if pair[0].value < pair[1].value { j } else { j + 1 };
                drop[loser] = true;
            }
        }
        let before = peaks.len();
        let mut flags = drop.into_iter();
        peaks.retain(|_| !flags.next().unwrap_or(false));
        if peaks.len() == before {
            return peaks;
        }
    }
}

/// Replace every peak but the first with the largest candidate within
/// `radius_ms` of it.
pub fn remaximize(peaks: &[Sample], candidates: &[Candidate], radius_ms: i64) -> Vec<Sample> {
    peaks
        .iter()
        .enumerate()
        .map(|(k, peak)| {
            if k == 0 {
                return *peak;
            }
            candidates
                .iter()
                .filter(|c| (c.timestamp - peak.timestamp).abs() <= radius_ms)
                .fold(None, |best: Option<&Candidate>, c| match best {
                    Some(b) if b.value >= c.value => Some(b),
                    _ => Some(c),
                })
                .map_or(*peak, Candidate::sample)
        })
        .collect()
}

/// Successive peak intervals in seconds, stamped at the earlier peak.
pub fn rr_values(rpeaks: &[Sample]) -> Vec<Sample> {
    rpeaks
        .windows(2)
        .map(|w| Sample::new(w[0].timestamp, (w[1].timestamp - w[0].timestamp) as f64 / 1000.0))
        .collect()
}

/// Beat-by-beat RR outlier rejection followed by a noise pass over the good
/// subset. Returns the valid subseries, one verdict per input interval and the
/// dispersion statistics (absent when no interval is valid).
pub fn classify_rr(
    rr: &[Sample],
    cfg: &CardiacConfig,
) -> (Vec<ValidBeat>, Vec<RrQuality>, Option<RrDispersion>) {
    let mut quality = vec![RrQuality::Bad; rr.len()];
    let valid: Vec<ValidBeat> = rr
        .iter()
        .enumerate()
        .filter(|(_, s)| s.value > cfg.rr_min_s && s.value < cfg.rr_max_s)
        .map(|(rr_index, s)| ValidBeat {
            rr_index,
            timestamp: s.timestamp,
            rr: s.value,
        })
        .collect();
    if valid.is_empty() {
        return (valid, quality, None);
    }

    let diffs: Vec<f64> = valid.windows(2).map(|w| (w[1].rr - w[0].rr).abs()).collect();
    let values: Vec<f64> = valid.iter().map(|b| b.rr).collect();
    let qd = 0.5 * (dsp::percentile(&diffs, 75.0) - dsp::percentile(&diffs, 25.0));
    let med = cfg.med_constant * qd;
    let mad = (dsp::percentile(&values, 50.0) - cfg.mad_constant * qd) / 3.0;
    let combined = (med + mad) / 2.0;
    let cbd = if combined.is_finite() {
        combined.max(cfg.cbd_floor)
    } else {
        cfg.cbd_floor
    };

    quality[valid[0].rr_index] = RrQuality::Good;
    let mut standard = valid[0].rr;
    let mut prev_bad = false;
    for k in 1..valid.len() {
        let cur = valid[k].rr;
        let to_standard = (standard - cur).abs();
        let pre = (valid[k - 1].rr - cur).abs();
        let post = valid.get(k + 1).map_or(0.0, |next| (cur - next.rr).abs());

        let good = if prev_bad {
            if to_standard < cbd || (to_standard > cbd && pre <= cbd && post <= cbd) {
                true
            } else {
                continue;
            }
        } else {
            pre <= cbd
        };
        if good {
            quality[valid[k].rr_index] = RrQuality::Good;
            standard = cur;
            prev_bad = false;
        } else {
            prev_bad = true;
        }
    }

    let good: Vec<f64> = rr
        .iter()
        .zip(&quality)
        .filter(|(_, q)| **q == RrQuality::Good)
        .map(|(s, _)| s.value)
        .collect();
    let mu = dsp::mean(&good);
    let sigma = dsp::stddev(&good);
    for (s, q) in rr.iter().zip(quality.iter_mut()) {
        if *q == RrQuality::Good && (s.value - mu).abs() > cfg.noise_sigmas * sigma {
            *q = RrQuality::Noise;
        }
    }

    (valid, quality, Some(RrDispersion { med, mad, cbd }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn rr_series(values: &[f64]) -> Vec<Sample> {
        let mut t = 0i64;
        values
            .iter()
            .map(|&v| {
                let s = Sample::new(t, v);
                t += (v * 1000.0) as i64;
                s
            })
            .collect()
    }

    fn candidates(points: &[(i64, f64)]) -> Vec<Candidate> {
        points
            .iter()
            .enumerate()
            .map(|(index, &(timestamp, value))| Candidate {
                index,
                timestamp,
                value,
            })
            .collect()
    }

    fn steady_beats() -> Vec<(i64, f64)> {
        (0..10).map(|k| (k * 1000, 1.0)).collect()
    }

    #[test]
    fn noise_band_candidate_raises_noise_level() {
        let cfg = CardiacConfig::default();
        let mut points = steady_beats();
        points.push((9500, 0.3));
        let st = classify_candidates(&candidates(&points), None, &cfg);
        assert_eq!(st.accepted, (0..10).collect::<Vec<_>>());
        assert!((st.noise_level - 0.2125).abs() < 1e-12);
        assert_eq!(st.rr_average, Some(1000.0));
        assert!((st.thr1 - (st.noise_level + 0.25 * (st.signal_level - st.noise_level))).abs() < 1e-12);
        assert!((st.thr2 - 0.5 * st.thr1).abs() < 1e-12);
    }

    #[test]
    fn search_back_promotes_skipped_candidate() {
        let cfg = CardiacConfig::default();
        let mut points = steady_beats();
        points.push((9500, 0.3));
        points.push((11_000, 1.0));
        let st = classify_candidates(&candidates(&points), None, &cfg);
        assert_eq!(st.accepted, (0..12).collect::<Vec<_>>());
        assert!((st.thr1 - 0.44059).abs() < 1e-4, "thr1 {}", st.thr1);
        assert!((st.thr2 - 0.22029).abs() < 1e-4, "thr2 {}", st.thr2);
        assert_eq!(st.rr_average, Some(1000.0));
    }

    #[test]
    fn carried_rr_average_sets_search_back_limit() {
        let cfg = CardiacConfig::default();
        let first = classify_candidates(&candidates(&steady_beats()), None, &cfg);
        assert_eq!(first.rr_average, Some(1000.0));

        let second = candidates(&[(60_000, 1.0), (60_400, 0.4), (62_000, 1.0)]);
        let carried = classify_candidates(&second, first.rr_average, &cfg);
        assert_eq!(carried.accepted, vec![0, 1, 2]);
        let fresh = classify_candidates(&second, None, &cfg);
        assert_eq!(fresh.accepted, vec![0, 2]);
        assert!(fresh.noise_level > 0.2);
        let slower = classify_candidates(&second, Some(1500.0), &cfg);
        assert_eq!(slower.accepted, vec![0, 2]);
    }

    #[test]
    fn extractor_carries_rr_average_between_windows() {
        let mut extractor = CardiacExtractor::new(CardiacConfig::default());
        assert!(extractor.carried_rr_average().is_none());
        extractor.run_window(&synthetic_ecg(60), Activity::Still).unwrap();
        let carried = extractor.carried_rr_average().unwrap();
        assert!((carried - 1000.0).abs() < 50.0, "carried {carried}");

        let mut forgetful = CardiacExtractor::new(CardiacConfig {
            preserve_rr_average: false,
            ..CardiacConfig::default()
        });
        forgetful.run_window(&synthetic_ecg(60), Activity::Still).unwrap();
        assert!(forgetful.carried_rr_average().is_none());
    }

    #[test]
    fn duplicate_elimination_is_idempotent() {
        let peaks = vec![
            Sample::new(0, 1.0),
            Sample::new(100, 1.4),
            Sample::new(250, 1.2),
            Sample::new(1000, 1.1),
            Sample::new(1200, 1.1),
            Sample::new(2000, 0.9),
        ];
        let once = eliminate_duplicates(&peaks, 500);
        assert_eq!(
            once,
            vec![Sample::new(100, 1.4), Sample::new(1000, 1.1), Sample::new(2000, 0.9)]
        );
        assert_eq!(eliminate_duplicates(&once, 500), once);
    }

    #[test]
    fn remaximize_keeps_first_and_snaps_others() {
        let candidates: Vec<Candidate> = [(0, 1.0), (980, 0.7), (1010, 1.3), (1200, 2.0)]
            .iter()
            .enumerate()
            .map(|(index, &(timestamp, value))| Candidate {
                index,
                timestamp,
                value,
            })
            .collect();
        let peaks = vec![Sample::new(0, 1.0), Sample::new(980, 0.7)];
        let out = remaximize(&peaks, &candidates, 109);
        assert_eq!(out, vec![Sample::new(0, 1.0), Sample::new(1010, 1.3)]);
    }

    #[test]
    fn spike_is_flagged_bad_and_recovery_is_good() {
        let mut values = vec![0.6; 20];
        values[10] = 1.8;
        let rr = rr_series(&values);
        let (valid, quality, dispersion) = classify_rr(&rr, &CardiacConfig::default());
        assert_eq!(valid.len(), 20);
        assert!((dispersion.unwrap().cbd - 0.2).abs() < 1e-12);
        assert_eq!(quality[10], RrQuality::Bad);
        assert_eq!(quality[11], RrQuality::Good);
        assert_eq!(quality.iter().filter(|q| **q == RrQuality::Good).count(), 19);
    }

    #[test]
    fn periodic_series_is_all_good() {
        let values: Vec<f64> = (0..40)
            .map(|i| 0.8 + 0.02 * (2.0 * PI * i as f64 / 10.0).sin())
            .collect();
        let (_, quality, _) = classify_rr(&rr_series(&values), &CardiacConfig::default());
        assert!(quality.iter().all(|q| *q == RrQuality::Good));
    }

    #[test]
    fn out_of_range_intervals_are_bad() {
        let rr = rr_series(&[0.8, 0.1, 0.8, 2.5, 0.8]);
        let (valid, quality, _) = classify_rr(&rr, &CardiacConfig::default());
        assert_eq!(valid.len(), 3);
        assert_eq!(quality[1], RrQuality::Bad);
        assert_eq!(quality[3], RrQuality::Bad);
        assert_eq!(quality[4], RrQuality::Good);
    }

    #[test]
    fn noise_pass_flags_far_good_beats() {
        let mut values = vec![1.0; 30];
        values[29] = 1.15;
        let cfg = CardiacConfig {
            cbd_floor: 0.5,
            ..CardiacConfig::default()
        };
        let (_, quality, _) = classify_rr(&rr_series(&values), &cfg);
        assert_eq!(quality[29], RrQuality::Noise);
        assert_eq!(quality[0], RrQuality::Good);
    }

    fn synthetic_ecg(beats: usize) -> TimeSeriesBuffer {
        let fs = 64.0;
        let n = beats * 64;
        let t0 = 1_000_000i64;
        let samples = (0..n).map(|i| {
            let t = i as f64 / fs;
            let mut v = 0.05 * (2.0 * PI * 0.3 * t).sin();
            for k in 0..beats {
                let centre = (32 + 64 * k) as f64;
                v += 1.2 * (-0.5 * ((i as f64 - centre) / 1.5).powi(2)).exp();
            }
            Sample::new(t0 + (i as i64 * 1000) / 64, v)
        });
        TimeSeriesBuffer::from_samples("ecg", samples).with_frequency(fs)
    }

    #[test]
    fn sixty_seconds_at_one_hertz() {
        let ecg = synthetic_ecg(60);
        let mut extractor = CardiacExtractor::new(CardiacConfig::default());
        let out = extractor.run_window(&ecg, Activity::Still).unwrap();
        assert_eq!(out.rpeaks.len(), 60);
        assert_eq!(out.rr_value.len(), 59);
        for rr in &out.rr_value {
            assert!((rr.value - 1.0).abs() < 0.02, "rr {}", rr.value);
        }
        assert!(out.rr_quality.iter().all(|q| *q == RrQuality::Good));
        assert_eq!(extractor.rr_history().len(), 59);
        assert!((extractor.heart_rate().data()[0].value - 60.0).abs() < 1.5);
        assert!(extractor.carried_rr_average().is_some());
        assert_eq!(out.hrv_timestamp, Some(out.rr_value[0].timestamp));
    }

    #[test]
    fn active_windows_do_not_accumulate() {
        let ecg = synthetic_ecg(20);
        let mut extractor = CardiacExtractor::new(CardiacConfig::default());
        let out = extractor.run_window(&ecg, Activity::Active).unwrap();
        assert!(!out.rr_filtered.is_empty());
        assert!(extractor.rr_history().is_empty());
        assert!(out.hrv.is_none());
    }

    #[test]
    fn missing_frequency_is_an_error() {
        let ecg = TimeSeriesBuffer::from_samples("ecg", [Sample::new(0, 1.0)]);
        let mut extractor = CardiacExtractor::new(CardiacConfig::default());
        assert!(extractor.run_window(&ecg, Activity::Still).is_err());
    }

    #[test]
    fn short_windows_yield_nothing() {
        let ecg = TimeSeriesBuffer::from_samples("ecg", [Sample::new(0, 1.0), Sample::new(15, 2.0)])
            .with_frequency(64.0);
        let mut extractor = CardiacExtractor::new(CardiacConfig::default());
        let out = extractor.run_window(&ecg, Activity::Still).unwrap();
        assert!(out.rpeaks.is_empty());
        assert!(out.rr_value.is_empty());
    }
}
