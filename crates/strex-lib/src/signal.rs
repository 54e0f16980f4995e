use crate::{
    dsp,
    error::{Result, StrexError},
    metrics::quantile::PSquared,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key holding the sampling frequency in Hz.
pub const FREQUENCY: &str = "frequency";

/// One timestamped observation (milliseconds, value).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: i64,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Same timestamp, new value.
    pub fn with_value(&self, value: f64) -> Self {
        Self {
            timestamp: self.timestamp,
            value,
        }
    }
}

/// Timestamped fixed-width vector, used for multi-axis signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorSample {
    pub timestamp: i64,
    pub values: Vec<f64>,
}

/// Named, ordered stream of samples with metadata and optional attached
/// streaming percentile estimators.
///
/// Timestamps are expected to be non-decreasing; that is the caller's
/// responsibility and is not checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeSeriesBuffer {
    name: String,
    data: Vec<Sample>,
    metadata: BTreeMap<String, serde_json::Value>,
    estimators: Vec<PSquared>,
    preserve: bool,
}

impl TimeSeriesBuffer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
            metadata: BTreeMap::new(),
            estimators: Vec::new(),
            preserve: false,
        }
    }

    /// Builder: record the sampling frequency in the metadata.
    pub fn with_frequency(mut self, fs: f64) -> Self {
        self.set_frequency(fs);
        self
    }

    /// Builder: keep the most recent sample across [`reset`](Self::reset).
    pub fn preserving_last(mut self, preserve: bool) -> Self {
        self.preserve = preserve;
        self
    }

    /// Builder: attach a P² estimator for percentile `p` (fraction in `(0, 1)`).
    pub fn tracking(mut self, p: f64) -> Result<Self> {
        self.estimators.push(PSquared::new(p)?);
        Ok(self)
    }

    pub fn from_samples(name: impl Into<String>, samples: impl IntoIterator<Item = Sample>) -> Self {
        let mut buffer = Self::new(name);
        for sample in samples {
            buffer.add(sample);
        }
        buffer
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    pub fn set_frequency(&mut self, fs: f64) {
        self.metadata.insert(FREQUENCY.into(), serde_json::json!(fs));
    }

    pub fn frequency(&self) -> Option<f64> {
        self.metadata.get(FREQUENCY).and_then(serde_json::Value::as_f64)
    }

    /// Sampling frequency, or an error when it is absent or not positive.
    pub fn require_frequency(&self) -> Result<f64> {
        match self.frequency() {
            Some(fs) if fs.is_finite() && fs > 0.0 => Ok(fs),
            _ => Err(StrexError::MissingFrequency(self.name.clone())),
        }
    }

    pub fn is_preserving(&self) -> bool {
        self.preserve
    }

    pub fn set_preserve_last(&mut self, preserve: bool) {
        self.preserve = preserve;
    }

    /// Append a copy of `sample` and feed its value to the attached estimators.
    pub fn add(&mut self, sample: Sample) {
        for est in &mut self.estimators {
            est.accept(sample.value);
        }
        self.data.push(sample);
    }

    /// Overwrite the most recently added sample in place.
    ///
    /// This is a correction of already emitted output, not an append: the
    /// attached estimators are not fed. Returns `false` on an empty buffer.
    pub fn amend_last(&mut self, sample: Sample) -> bool {
        match self.data.last_mut() {
            Some(last) => {
                *last = sample;
                true
            }
            None => false,
        }
    }

    /// Clear the contents, keeping the last sample in preserve mode.
    /// Attached estimators keep their state.
    pub fn reset(&mut self) {
        if self.preserve {
            if let Some(last) = self.data.last().copied() {
                self.data.clear();
                self.data.push(last);
                return;
            }
        }
        self.data.clear();
    }

    pub fn data(&self) -> &[Sample] {
        &self.data
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().map(|s| s.value)
    }

    pub fn last(&self) -> Option<&Sample> {
        self.data.last()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.data.first()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Exact percentile of the current contents, `pct` in percent.
    pub fn percentile(&self, pct: f64) -> f64 {
        let values: Vec<f64> = self.values().collect();
        dsp::percentile(&values, pct)
    }

    pub fn mean(&self) -> f64 {
        let values: Vec<f64> = self.values().collect();
        dsp::mean(&values)
    }

    pub fn stddev(&self) -> f64 {
        let values: Vec<f64> = self.values().collect();
        dsp::stddev(&values)
    }

    /// Current estimate of the attached estimator tracking `p`, if any.
    pub fn streaming_percentile(&self, p: f64) -> Option<f64> {
        self.estimators
            .iter()
            .find(|est| (est.p() - p).abs() < f64::EPSILON)
            .and_then(PSquared::estimate)
    }
}

/// Stream of fixed-width vector samples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorBuffer {
    name: String,
    width: usize,
    data: Vec<VectorSample>,
    preserve: bool,
}

impl VectorBuffer {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            width,
            data: Vec::new(),
            preserve: false,
        }
    }

    pub fn preserving_last(mut self, preserve: bool) -> Self {
        self.preserve = preserve;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn add(&mut self, sample: VectorSample) -> Result<()> {
        if sample.values.len() != self.width {
            return Err(StrexError::WidthMismatch {
                name: self.name.clone(),
                expected: self.width,
                found: sample.values.len(),
            });
        }
        self.data.push(sample);
        Ok(())
    }

    pub fn reset(&mut self) {
        let kept = if self.preserve { self.data.pop() } else { None };
        self.data.clear();
        self.data.extend(kept);
    }

    pub fn data(&self) -> &[VectorSample] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(preserve: bool) -> TimeSeriesBuffer {
        let mut buffer = TimeSeriesBuffer::new("test").preserving_last(preserve);
        for i in 0..10 {
            buffer.add(Sample::new(i * 10, i as f64));
        }
        buffer
    }

    #[test]
    fn reset_preserving_keeps_latest_sample() {
        let mut buffer = filled(true);
        buffer.reset();
        assert_eq!(buffer.data(), &[Sample::new(90, 9.0)]);
        buffer.reset();
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn reset_without_preserve_empties() {
        let mut buffer = filled(false);
        buffer.reset();
        assert!(buffer.is_empty());
        let mut empty = TimeSeriesBuffer::new("empty").preserving_last(true);
        empty.reset();
        assert!(empty.is_empty());
    }

    #[test]
    fn amend_last_rewrites_in_place() {
        let mut buffer = TimeSeriesBuffer::new("intercepts");
        assert!(!buffer.amend_last(Sample::new(1, 1.0)));
        buffer.add(Sample::new(1, 1.0));
        buffer.add(Sample::new(2, 2.0));
        assert!(buffer.amend_last(Sample::new(3, 3.0)));
        assert_eq!(buffer.data(), &[Sample::new(1, 1.0), Sample::new(3, 3.0)]);
    }

    #[test]
    fn percentile_and_moments() {
        let buffer = filled(false);
        assert!((buffer.percentile(50.0) - 4.5).abs() < 1e-12);
        assert_eq!(buffer.percentile(0.5), 0.0);
        assert_eq!(buffer.percentile(100.0), 9.0);
        assert!((buffer.mean() - 4.5).abs() < 1e-12);
        assert!((buffer.stddev() - 3.0276503540974917).abs() < 1e-12);
    }

    #[test]
    fn estimators_survive_reset() {
        let mut buffer = TimeSeriesBuffer::new("mag").tracking(0.5).unwrap();
        for i in 0..5 {
            buffer.add(Sample::new(i, i as f64));
        }
        buffer.reset();
        assert_eq!(buffer.streaming_percentile(0.5), Some(2.0));
        assert_eq!(buffer.streaming_percentile(0.9), None);
    }

    #[test]
    fn frequency_round_trips_through_metadata() {
        let buffer = TimeSeriesBuffer::new("ecg").with_frequency(64.0);
        assert_eq!(buffer.require_frequency().unwrap(), 64.0);
        assert!(TimeSeriesBuffer::new("rip").require_frequency().is_err());
    }

    #[test]
    fn vector_buffer_checks_width() {
        let mut buffer = VectorBuffer::new("xyz", 3).preserving_last(true);
        assert!(buffer
            .add(VectorSample {
                timestamp: 0,
                values: vec![1.0, 2.0],
            })
            .is_err());
        buffer
            .add(VectorSample {
                timestamp: 0,
                values: vec![1.0, 2.0, 3.0],
            })
            .unwrap();
        buffer
            .add(VectorSample {
                timestamp: 1,
                values: vec![4.0, 5.0, 6.0],
            })
            .unwrap();
        buffer.reset();
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.data()[0].timestamp, 1);
    }
}
