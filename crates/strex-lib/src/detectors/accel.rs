use crate::{
    dsp,
    error::{Result, StrexError},
    signal::{Sample, TimeSeriesBuffer, VectorSample},
};
use serde::{Deserialize, Serialize};

/// Movement state of one window. Only still windows feed the long-lived
/// cardiac and respiratory statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    #[default]
    Still,
    Active,
}

impl Activity {
    pub fn code(self) -> f64 {
        match self {
            Activity::Still => 0.0,
            Activity::Active => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Sub-window length in milliseconds.
    pub subwindow_ms: i64,
    /// Fraction of the magnitude range a sub-window deviation must exceed.
    pub threshold: f64,
    pub low_percentile: f64,
    pub high_percentile: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            subwindow_ms: 10_000,
            threshold: 0.35,
            low_percentile: 0.01,
            high_percentile: 0.99,
        }
    }
}

impl ActivityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.subwindow_ms <= 0 {
            return Err(StrexError::InvalidConfig(
                "activity: subwindow_ms must be positive".into(),
            ));
        }
        if !(self.low_percentile < self.high_percentile) {
            return Err(StrexError::InvalidConfig(
                "activity: low_percentile must be below high_percentile".into(),
            ));
        }
        Ok(())
    }
}

/// Outputs of one activity window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityWindow {
    pub normalized: [Vec<Sample>; 3],
    pub triples: Vec<VectorSample>,
    pub magnitude: Vec<Sample>,
    /// Standard deviation of the magnitude per sub-window, stamped at its start.
    pub magnitude_stdev: Vec<Sample>,
    pub low: Option<f64>,
    pub high: Option<f64>,
    pub activity: Activity,
    pub timestamp: Option<i64>,
}

/// Movement classifier. The magnitude range is tracked over the whole
/// session with two P² estimators.
#[derive(Debug, Clone)]
pub struct ActivityClassifier {
    cfg: ActivityConfig,
    magnitude: TimeSeriesBuffer,
}

impl ActivityClassifier {
    pub fn new(cfg: ActivityConfig) -> Result<Self> {
        cfg.validate()?;
        let magnitude = TimeSeriesBuffer::new("accel.magnitude")
            .tracking(cfg.low_percentile)?
            .tracking(cfg.high_percentile)?;
        Ok(Self { cfg, magnitude })
    }

    /// Session-wide magnitude range estimate `(low, high)`.
    pub fn magnitude_range(&self) -> Option<(f64, f64)> {
        Some((
            self.magnitude.streaming_percentile(self.cfg.low_percentile)?,
            self.magnitude.streaming_percentile(self.cfg.high_percentile)?,
        ))
    }

    pub fn run_window(
        &mut self,
        x: &TimeSeriesBuffer,
        y: &TimeSeriesBuffer,
        z: &TimeSeriesBuffer,
    ) -> ActivityWindow {
        let mut out = ActivityWindow {
            normalized: [dsp::zscore(x.data()), dsp::zscore(y.data()), dsp::zscore(z.data())],
            ..ActivityWindow::default()
        };
        let Some(start) = x.first().map(|s| s.timestamp) else {
            return out;
        };
        out.timestamp = Some(start);
        self.magnitude.reset();

        let w = self.cfg.subwindow_ms;
        let end = [x, y, z]
            .iter()
            .filter_map(|b| b.last().map(|s| s.timestamp))
            .max()
            .unwrap_or(start);
        let mut stdevs = Vec::new();
        let mut lo = start;
        while lo <= end {
            let hi = lo + w;
            let slice = |b: &TimeSeriesBuffer| -> Vec<Sample> {
                b.data()
                    .iter()
                    .filter(|s| s.timestamp >= lo && s.timestamp < hi)
                    .copied()
                    .collect()
            };
            let (sx, sy, sz) = (slice(x), slice(y), slice(z));
            let mags = dsp::magnitude(&sx, &sy, &sz);
            for ((a, b), (c, m)) in sx.iter().zip(&sy).zip(sz.iter().zip(&mags)) {
                out.triples.push(VectorSample {
                    timestamp: a.timestamp,
                    values: vec![a.value, b.value, c.value],
                });
                let sample = a.with_value(*m);
                self.magnitude.add(sample);
                out.magnitude.push(sample);
            }
            if let Some(first) = sx.first().filter(|_| !mags.is_empty()) {
                let sd = dsp::stddev(&mags);
                out.magnitude_stdev.push(first.with_value(sd));
                stdevs.push(sd);
            }
            lo = hi;
        }

        if let Some((low, high)) = self.magnitude_range() {
            out.low = Some(low);
            out.high = Some(high);
            let limit = low + self.cfg.threshold * (high - low);
            let active = stdevs.iter().filter(|sd| **sd > limit).count();
            if 2 * active > stdevs.len() {
                out.activity = Activity::Active;
            }
            log::debug!(
                "activity: {active}/{} sub-windows above {limit:.4}, {:?}",
                stdevs.len(),
                out.activity
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: i64 = 16;

    fn axis(name: &str, values: &[f64]) -> TimeSeriesBuffer {
        TimeSeriesBuffer::from_samples(
            name,
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| Sample::new(i as i64 * 1000 / FS, v)),
        )
    }

    fn run(z: &[f64]) -> ActivityWindow {
        let zeros = vec![0.0; z.len()];
        let mut classifier = ActivityClassifier::new(ActivityConfig::default()).unwrap();
        classifier.run_window(&axis("x", &zeros), &axis("y", &zeros), &axis("z", z))
    }

    #[test]
    fn constant_zero_is_still() {
        let out = run(&vec![0.0; 960]);
        assert_eq!(out.activity, Activity::Still);
        assert_eq!(out.magnitude_stdev.len(), 6);
        assert!(out.normalized[2].iter().all(|s| s.value == 0.0));
    }

    #[test]
    fn mostly_moving_window_is_active() {
        let mut z: Vec<f64> = (0..640).map(|i| if i % 2 == 0 { 0.0 } else { 4.0 }).collect();
        z.extend(std::iter::repeat(0.1).take(320));
        let out = run(&z);
        assert_eq!(out.magnitude_stdev.len(), 6);
        assert_eq!(out.triples.len(), 960);
        assert_eq!(out.triples[1].values, vec![0.0, 0.0, 4.0]);
        assert_eq!(out.activity, Activity::Active);
        assert_eq!(out.timestamp, Some(0));
    }

    #[test]
    fn mostly_quiet_window_is_still() {
        let mut z: Vec<f64> = (0..320).map(|i| if i % 2 == 0 { 0.0 } else { 4.0 }).collect();
        z.extend(std::iter::repeat(0.1).take(640));
        assert_eq!(run(&z).activity, Activity::Still);
    }

    #[test]
    fn empty_input_is_still() {
        let out = run(&[]);
        assert_eq!(out.activity, Activity::Still);
        assert!(out.timestamp.is_none());
    }

    #[test]
    fn magnitude_range_persists_across_windows() {
        let mut classifier = ActivityClassifier::new(ActivityConfig::default()).unwrap();
        let z: Vec<f64> = (0..160).map(|i| (i % 5) as f64).collect();
        let zeros = vec![0.0; 160];
        classifier.run_window(&axis("x", &zeros), &axis("y", &zeros), &axis("z", &z));
        let (_, high) = classifier.magnitude_range().unwrap();
        classifier.run_window(&axis("x", &zeros), &axis("y", &zeros), &axis("z", &zeros));
        let (_, high_after) = classifier.magnitude_range().unwrap();
        assert!(high > 3.0 && high_after > 3.0);
    }
}
