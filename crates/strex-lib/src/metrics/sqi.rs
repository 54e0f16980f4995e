use crate::signal::Sample;
use serde::{Deserialize, Serialize};

/// Per-sample or per-window signal quality verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Good,
    Bad,
}

impl Quality {
    pub fn code(self) -> f64 {
        match self {
            Quality::Good => 0.0,
            Quality::Bad => 1.0,
        }
    }
}

/// Classifies each sample of an ECG window. Implementations may look at
/// neighbouring samples; the output has one verdict per input sample.
pub trait SampleQuality {
    fn classify(&self, samples: &[Sample]) -> Vec<Quality>;
}

/// Amplitude-band classifier over fixed-duration segments: a segment is bad
/// when most of its samples sit outside the ADC band or when it is too flat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmplitudeBandQuality {
    pub min_value: f64,
    pub max_value: f64,
    pub min_range: f64,
    pub segment_ms: i64,
    pub max_outlier_fraction: f64,
}

impl Default for AmplitudeBandQuality {
    fn default() -> Self {
        Self {
            min_value: 20.0,
            max_value: 4500.0,
            min_range: 47.0,
            segment_ms: 5_000,
            max_outlier_fraction: 0.5,
        }
    }
}

impl AmplitudeBandQuality {
    fn segment_quality(&self, segment: &[Sample]) -> Quality {
        let outliers = segment
            .iter()
            .filter(|s| !(s.value >= self.min_value && s.value <= self.max_value))
            .count();
        if outliers as f64 > self.max_outlier_fraction * segment.len() as f64 {
            return Quality::Bad;
        }
        let (lo, hi) = segment
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
                (lo.min(s.value), hi.max(s.value))
            });
        if hi - lo < self.min_range {
            Quality::Bad
        } else {
            Quality::Good
        }
    }
}

impl SampleQuality for AmplitudeBandQuality {
    fn classify(&self, samples: &[Sample]) -> Vec<Quality> {
        let mut out = Vec::with_capacity(samples.len());
        let segment_ms = self.segment_ms.max(1);
        let mut start = 0;
        while start < samples.len() {
            let boundary = samples[start].timestamp + segment_ms;
            let len = samples[start..]
                .iter()
                .take_while(|s| s.timestamp < boundary)
                .count();
            let verdict = self.segment_quality(&samples[start..start + len]);
            out.extend(std::iter::repeat(verdict).take(len));
            start += len;
        }
        out
    }
}

/// Outcome of one window's quality assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    /// Per-sample verdicts, stamped with the sample timestamps.
    pub per_sample: Vec<Sample>,
    pub window: Quality,
    pub good_fraction: f64,
}

/// Window verdict: good iff the fraction of good samples exceeds `threshold`.
/// An empty window is bad.
pub fn window_quality(
    classifier: &dyn SampleQuality,
    ecg: &[Sample],
    threshold: f64,
) -> QualityReport {
    let verdicts = classifier.classify(ecg);
    let per_sample: Vec<Sample> = ecg
        .iter()
        .zip(&verdicts)
        .map(|(s, q)| s.with_value(q.code()))
        .collect();
    let good = verdicts.iter().filter(|q| **q == Quality::Good).count();
    let good_fraction = if verdicts.is_empty() {
        0.0
    } else {
        good as f64 / verdicts.len() as f64
    };
    let window = if !verdicts.is_empty() && good_fraction > threshold {
        Quality::Good
    } else {
        Quality::Bad
    };
    log::debug!(
        "ecg quality: {good}/{} good samples, window {:?}",
        verdicts.len(),
        window
    );
    QualityReport {
        per_sample,
        window,
        good_fraction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ecg(values: impl IntoIterator<Item = f64>, step_ms: i64) -> Vec<Sample> {
        values
            .into_iter()
            .enumerate()
            .map(|(i, v)| Sample::new(i as i64 * step_ms, v))
            .collect()
    }

    struct Fixed(Vec<Quality>);

    impl SampleQuality for Fixed {
        fn classify(&self, _samples: &[Sample]) -> Vec<Quality> {
            self.0.clone()
        }
    }

    #[test]
    fn threshold_is_strict() {
        let samples = ecg([1.0, 2.0, 3.0], 10);
        let two_of_three = Fixed(vec![Quality::Good, Quality::Good, Quality::Bad]);
        assert_eq!(window_quality(&two_of_three, &samples, 0.67).window, Quality::Bad);
        assert_eq!(window_quality(&two_of_three, &samples, 0.6).window, Quality::Good);
    }

    #[test]
    fn empty_window_is_bad() {
        let report = window_quality(&AmplitudeBandQuality::default(), &[], 0.67);
        assert_eq!(report.window, Quality::Bad);
        assert!(report.per_sample.is_empty());
    }

    #[test]
    fn flat_segment_is_bad() {
        let classifier = AmplitudeBandQuality::default();
        let flat = ecg(std::iter::repeat(2000.0).take(64), 100);
        assert!(classifier.classify(&flat).iter().all(|q| *q == Quality::Bad));
    }

    #[test]
    fn segments_are_judged_independently() {
        let classifier = AmplitudeBandQuality::default();
        // 50 samples per 5 s segment: one lively segment, one saturated.
        let lively = (0..50).map(|i| if i % 2 == 0 { 1800.0 } else { 2200.0 });
        let saturated = std::iter::repeat(4095.0 * 2.0).take(50);
        let samples = ecg(lively.chain(saturated), 100);
        let report = window_quality(&classifier, &samples, 0.67);
        assert_eq!(report.per_sample[0].value, Quality::Good.code());
        assert_eq!(report.per_sample[99].value, Quality::Bad.code());
        assert!((report.good_fraction - 0.5).abs() < 1e-12);
        assert_eq!(report.window, Quality::Bad);
    }
}
