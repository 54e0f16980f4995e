use crate::{
    detectors::accel::Activity,
    dsp,
    error::{Result, StrexError},
    signal::{Sample, TimeSeriesBuffer},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespirationConfig {
    /// Span of the peak/valley smoothing filter in samples.
    pub smoothing_span: usize,
    /// Baseline moving-average length in seconds.
    pub baseline_window_s: f64,
    /// Down-intercepts closer than this collapse into the first one.
    pub min_down_gap_ms: i64,
    /// Minimum up→down spacing of a kept intercept pair.
    pub min_pair_gap_ms: i64,
    pub min_breath_s: f64,
    pub max_breath_s: f64,
    /// Inspiration amplitude must exceed this fraction of the window mean.
    pub amplitude_factor: f64,
}

impl Default for RespirationConfig {
    fn default() -> Self {
        Self {
            smoothing_span: 5,
            baseline_window_s: 8.0,
            min_down_gap_ms: 1_000,
            min_pair_gap_ms: 100,
            min_breath_s: 1.0,
            max_breath_s: 12.0,
            amplitude_factor: 0.15,
        }
    }
}

impl RespirationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.smoothing_span == 0 || !(self.baseline_window_s > 0.0) {
            return Err(StrexError::InvalidConfig(
                "respiration: smoothing and baseline windows must be positive".into(),
            ));
        }
        if !(self.min_breath_s < self.max_breath_s) {
            return Err(StrexError::InvalidConfig(
                "respiration: min_breath_s must be below max_breath_s".into(),
            ));
        }
        Ok(())
    }
}

/// Baseline crossings of the smoothed RIP signal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Intercepts {
    pub up: Vec<Sample>,
    pub down: Vec<Sample>,
}

/// One breath: valley → peak → next valley.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathCycle {
    pub valley: Sample,
    pub peak: Sample,
    pub next_valley: Sample,
}

impl BreathCycle {
    pub fn inspiration_ms(&self) -> i64 {
        self.peak.timestamp - self.valley.timestamp
    }

    pub fn expiration_ms(&self) -> i64 {
        self.next_valley.timestamp - self.peak.timestamp
    }

    pub fn duration_ms(&self) -> i64 {
        self.next_valley.timestamp - self.valley.timestamp
    }

    /// Peak-to-valley amplitude.
    pub fn stretch(&self) -> f64 {
        self.peak.value - self.valley.value
    }
}

/// Per-breath features of every detected cycle. RSA covers the retained ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreathMetrics {
    pub inspiration_duration: Vec<Sample>,
    pub expiration_duration: Vec<Sample>,
    pub respiration_duration: Vec<Sample>,
    pub stretch: Vec<Sample>,
    pub ie_ratio: Vec<Sample>,
    pub rsa: Vec<Sample>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RespirationWindow {
    pub smoothed: Vec<Sample>,
    pub baseline: Vec<Sample>,
    pub intercepts: Intercepts,
    pub alternating: Intercepts,
    pub spaced: Intercepts,
    pub filtered: Intercepts,
    pub valleys: Vec<Sample>,
    pub peaks: Vec<Sample>,
    pub cycles: Vec<BreathCycle>,
    pub inspiration_amplitude: Vec<Sample>,
    pub cycle_duration: Vec<Sample>,
    pub retained: Vec<BreathCycle>,
    pub metrics: BreathMetrics,
    pub breath_rate: Option<Sample>,
    pub minute_ventilation: Option<Sample>,
}

#[derive(Debug, Clone, Default)]
pub struct RespirationExtractor {
    cfg: RespirationConfig,
}

impl RespirationExtractor {
    pub fn new(cfg: RespirationConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &RespirationConfig {
        &self.cfg
    }

    /// Breath detection and features for one window. `good_rr` is the
    /// accumulated good-RR history used for RSA.
    pub fn run_window(
        &self,
        rip: &TimeSeriesBuffer,
        activity: Activity,
        good_rr: &TimeSeriesBuffer,
    ) -> Result<RespirationWindow> {
        let fs = rip.require_frequency()?;
        let cfg = &self.cfg;
        let mut out = RespirationWindow::default();
        if rip.is_empty() {
            return Ok(out);
        }

        out.smoothed = dsp::smooth(rip.data(), cfg.smoothing_span);
        let baseline_span = (cfg.baseline_window_s * fs).round().max(1.0) as usize;
        out.baseline = dsp::smooth(&out.smoothed, baseline_span);
        out.intercepts = intercepts(&out.smoothed, &out.baseline);
        out.alternating = alternate(&out.intercepts);
        out.spaced = collapse_close_downs(&out.alternating, cfg.min_down_gap_ms);
        out.filtered = drop_short_pairs(&out.spaced, cfg.min_pair_gap_ms);

        let f = &out.filtered;
        let mut peaks: Vec<Option<Sample>> = Vec::with_capacity(f.up.len());
        for (i, up) in f.up.iter().enumerate() {
            out.valleys.push(find_valley(&f.down[i], up, &out.smoothed));
            peaks.push(f.down.get(i + 1).and_then(|down| find_peak(up, down, &out.smoothed)));
        }
        out.cycles = (0..out.valleys.len().saturating_sub(1))
            .filter_map(|i| {
                Some(BreathCycle {
                    valley: out.valleys[i],
                    peak: peaks[i]?,
                    next_valley: out.valleys[i + 1],
                })
            })
            .collect();
        out.peaks = peaks.iter().flatten().copied().collect();

        out.inspiration_amplitude = out
            .cycles
            .iter()
            .map(|c| c.valley.with_value(c.stretch()))
            .collect();
        out.cycle_duration = out
            .cycles
            .iter()
            .map(|c| c.valley.with_value(c.duration_ms() as f64))
            .collect();
        let amplitudes: Vec<f64> = out.cycles.iter().map(BreathCycle::stretch).collect();
        let mean_amplitude = dsp::mean(&amplitudes);
        out.retained = out
            .cycles
            .iter()
            .filter(|c| {
                let secs = c.duration_ms() as f64 / 1000.0;
                secs > cfg.min_breath_s
                    && secs < cfg.max_breath_s
                    && c.stretch() > cfg.amplitude_factor * mean_amplitude
            })
            .copied()
            .collect();

        log::debug!(
            "rip window: {} up / {} down intercepts, {} filtered pairs, {} cycles, {} retained",
            out.intercepts.up.len(),
            out.intercepts.down.len(),
            out.filtered.up.len(),
            out.cycles.len(),
            out.retained.len()
        );

        if activity == Activity::Still {
            out.metrics = breath_metrics(&out.cycles, &out.retained, good_rr);
            if let (Some(last), false) = (rip.last(), out.valleys.is_empty()) {
                out.breath_rate = Some(last.with_value((out.valleys.len() - 1) as f64));
                let ventilation: f64 = out
                    .cycles
                    .iter()
                    .map(|c| c.inspiration_ms() as f64 / 1000.0 * c.stretch() / 2.0)
                    .sum();
                out.minute_ventilation = Some(last.with_value(ventilation));
            }
        }
        Ok(out)
    }
}

/// Samples where the smoothed signal crosses the baseline, stamped with the
/// baseline value.
pub fn intercepts(smoothed: &[Sample], baseline: &[Sample]) -> Intercepts {
    let mut out = Intercepts::default();
    let n = smoothed.len().min(baseline.len());
    for i in 1..n.saturating_sub(1) {
        let (prev, next, b) = (smoothed[i - 1].value, smoothed[i + 1].value, baseline[i].value);
        if prev < b && b < next {
            out.up.push(baseline[i]);
        } else if prev > b && b > next {
            out.down.push(baseline[i]);
        }
    }
    out
}

/// Force strict down/up alternation, starting from the first down-intercept.
/// Within a run of same-direction crossings the latest one wins and replaces
/// the previously emitted intercept.
pub fn alternate(raw: &Intercepts) -> Intercepts {
    let Some(first) = raw.down.first() else {
        return Intercepts::default();
    };
    let mut downs = TimeSeriesBuffer::new("rip.down_intercepts.filtered");
    let mut ups = TimeSeriesBuffer::new("rip.up_intercepts.filtered");
    downs.add(*first);

    let mut d = 1;
    let mut u = raw.up.partition_point(|s| s.timestamp <= first.timestamp);
    let mut want_up = true;
    while d < raw.down.len() && u < raw.up.len() {
        let (down, up) = (raw.down[d], raw.up[u]);
        if want_up {
            if down.timestamp < up.timestamp {
                downs.amend_last(down);
                d += 1;
            } else {
                ups.add(up);
                u += 1;
                want_up = false;
            }
        } else if down.timestamp > up.timestamp {
            ups.amend_last(up);
            u += 1;
        } else {
            downs.add(down);
            d += 1;
            want_up = true;
        }
    }
    // Trailing downs after the last up form one run; the latest one closes it.
    if !want_up && d < raw.down.len() {
        if let Some(last) = raw.down.last() {
            downs.add(*last);
        }
    }
    Intercepts {
        up: ups.data().to_vec(),
        down: downs.data().to_vec(),
    }
}

/// Keep only the first down-intercept of each run spaced closer than
/// `min_gap_ms`, together with its up-intercept.
pub fn collapse_close_downs(alt: &Intercepts, min_gap_ms: i64) -> Intercepts {
    let starts: Vec<usize> = (0..alt.down.len())
        .filter(|&i| i == 0 || alt.down[i].timestamp - alt.down[i - 1].timestamp >= min_gap_ms)
        .collect();
    Intercepts {
        down: starts.iter().map(|&i| alt.down[i]).collect(),
        up: starts[..starts.len().saturating_sub(1)]
            .iter()
            .filter_map(|&i| alt.up.get(i).copied())
            .collect(),
    }
}

/// Drop up/down pairs where the down follows the up by less than `min_gap_ms`.
pub fn drop_short_pairs(spaced: &Intercepts, min_gap_ms: i64) -> Intercepts {
    let Some(first) = spaced.down.first() else {
        return Intercepts::default();
    };
    let mut out = Intercepts {
        up: Vec::new(),
        down: vec![*first],
    };
    for (up, down) in spaced.up.iter().zip(spaced.down.iter().skip(1)) {
        if down.timestamp - up.timestamp >= min_gap_ms {
            out.up.push(*up);
            out.down.push(*down);
        }
    }
    out
}

/// Valley between a down- and the following up-intercept: the local minimum
/// that starts the longest rising run.
pub fn find_valley(down: &Sample, up: &Sample, smoothed: &[Sample]) -> Sample {
    let bracket: Vec<Sample> = smoothed
        .iter()
        .filter(|s| down.timestamp < s.timestamp && s.timestamp < up.timestamp)
        .copied()
        .collect();
    if bracket.is_empty() {
        return *up;
    }
    let diff: Vec<f64> = bracket.windows(2).map(|w| w[1].value - w[0].value).collect();

    let mut minima = Vec::new();
    if let Some(&d0) = diff.first() {
        let mut rising = d0 > 0.0;
        for (i, &d) in diff.iter().enumerate().skip(1) {
            if rising && d < 0.0 {
                rising = false;
            } else if !rising && d > 0.0 {
                minima.push(i);
                rising = true;
            }
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for i in minima {
        let run = diff[i..].iter().take_while(|d| **d > 0.0).count();
        if best.map_or(true, |(_, len)| run > len) {
            best = Some((i, run));
        }
    }
    match best {
        Some((i, _)) => bracket[i],
        None => bracket
            .iter()
            .copied()
            .fold(bracket[0], |m, s| if s.value < m.value { s } else { m }),
    }
}

/// Largest smoothed sample strictly between an up- and the next down-intercept.
pub fn find_peak(up: &Sample, down: &Sample, smoothed: &[Sample]) -> Option<Sample> {
    smoothed
        .iter()
        .filter(|s| up.timestamp < s.timestamp && s.timestamp < down.timestamp)
        .copied()
        .fold(None, |best: Option<Sample>, s| match best {
            Some(b) if b.value >= s.value => Some(b),
            _ => Some(s),
        })
}

/// RR spread inside one breath: `max − min` of the history entries strictly
/// within the cycle, when at least two qualify.
pub fn rsa(cycle: &BreathCycle, good_rr: &TimeSeriesBuffer) -> Option<Sample> {
    let inside: Vec<f64> = good_rr
        .data()
        .iter()
        .filter(|s| cycle.valley.timestamp < s.timestamp && s.timestamp < cycle.next_valley.timestamp)
        .map(|s| s.value)
        .collect();
    if inside.len() < 2 {
        return None;
    }
    let max = inside.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = inside.iter().copied().fold(f64::INFINITY, f64::min);
    Some(cycle.valley.with_value(max - min))
}

/// Durations, stretch and I:E ratio for each of `cycles`. RSA is computed
/// only for `retained`.
pub fn breath_metrics(
    cycles: &[BreathCycle],
    retained: &[BreathCycle],
    good_rr: &TimeSeriesBuffer,
) -> BreathMetrics {
    let mut m = BreathMetrics::default();
    for c in cycles {
        let insp = c.inspiration_ms() as f64;
        let expr = c.expiration_ms() as f64;
        m.inspiration_duration.push(c.valley.with_value(insp));
        m.expiration_duration.push(c.peak.with_value(expr));
        m.respiration_duration.push(c.valley.with_value(c.duration_ms() as f64));
        m.stretch.push(c.valley.with_value(c.stretch()));
        m.ie_ratio.push(c.valley.with_value(insp / expr));
    }
    m.rsa = retained.iter().filter_map(|c| rsa(c, good_rr)).collect();
    m
}
