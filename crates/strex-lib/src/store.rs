//! Keyed output buffers with push notification for subscribed keys.

use crate::{
    error::{Result, StrexError},
    signal::{Sample, TimeSeriesBuffer, VectorBuffer, VectorSample},
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Stable names of every derived stream.
pub mod keys {
    pub const ECG_BANDPASSED: &str = "ecg.bandpassed";
    pub const ECG_BANDPASSED_NORMALIZED: &str = "ecg.bandpassed.normalized";
    pub const ECG_DERIVATIVE: &str = "ecg.derivative";
    pub const ECG_DERIVATIVE_NORMALIZED: &str = "ecg.derivative.normalized";
    pub const ECG_SQUARED: &str = "ecg.squared";
    pub const ECG_SQUARED_NORMALIZED: &str = "ecg.squared.normalized";
    pub const ECG_SMOOTHED: &str = "ecg.smoothed";
    pub const ECG_SMOOTHED_NORMALIZED: &str = "ecg.smoothed.normalized";
    pub const ECG_PEAKS: &str = "ecg.peaks";
    pub const ECG_PEAKS_ACCEPTED: &str = "ecg.peaks.accepted";
    pub const ECG_PEAKS_DEDUPLICATED: &str = "ecg.peaks.deduplicated";
    pub const ECG_RPEAKS: &str = "ecg.rpeaks";
    pub const ECG_RR_AVERAGE: &str = "ecg.rr_ave";
    pub const ECG_RR_VALUE: &str = "ecg.rr_value";
    pub const ECG_RR_VALUE_VALID: &str = "ecg.rr_value.valid";
    pub const ECG_RR_VALUE_DIFF: &str = "ecg.rr_value_diff";
    pub const ECG_RR_OUTLIER: &str = "ecg.rr.outlier";
    pub const ECG_RR_VALUE_FILTERED: &str = "ecg.rr_value.filtered";
    pub const ECG_RR: &str = "ecg.rr";
    pub const ECG_HEART_RATE: &str = "ecg.rr.heartrate";
    pub const ECG_RR_LF: &str = "ecg.rr.lf";
    pub const ECG_RR_MF: &str = "ecg.rr.mf";
    pub const ECG_RR_HF: &str = "ecg.rr.hf";
    pub const ECG_RR_LF_HF: &str = "ecg.rr.lf_hf";
    pub const ECG_QUALITY: &str = "ecg.quality";
    pub const ECG_WINDOW_QUALITY: &str = "ecg.window.quality";

    pub const RIP_SMOOTH: &str = "rip.smooth";
    pub const RIP_BASELINE: &str = "rip.baseline";
    pub const RIP_UP_INTERCEPTS: &str = "rip.intercepts.up";
    pub const RIP_DOWN_INTERCEPTS: &str = "rip.intercepts.down";
    pub const RIP_UP_INTERCEPTS_FILTERED: &str = "rip.intercepts.up.filtered";
    pub const RIP_DOWN_INTERCEPTS_FILTERED: &str = "rip.intercepts.down.filtered";
    pub const RIP_VALLEYS: &str = "rip.valleys";
    pub const RIP_PEAKS: &str = "rip.peaks";
    pub const RIP_INSPIRATION_AMPLITUDE: &str = "rip.inspiration_amplitude";
    pub const RIP_CYCLE_DURATION: &str = "rip.cycle_duration";
    pub const RIP_VALLEYS_FILTERED: &str = "rip.valleys.filtered";
    pub const RIP_PEAKS_FILTERED: &str = "rip.peaks.filtered";
    pub const RIP_INSP_DURATION: &str = "rip.insp_duration";
    pub const RIP_EXPR_DURATION: &str = "rip.expr_duration";
    pub const RIP_RESP_DURATION: &str = "rip.resp_duration";
    pub const RIP_STRETCH: &str = "rip.stretch";
    pub const RIP_IE_RATIO: &str = "rip.ie_ratio";
    pub const RIP_RSA: &str = "rip.rsa";
    pub const RIP_BREATH_RATE: &str = "rip.breath_rate";
    pub const RIP_MINUTE_VENTILATION: &str = "rip.minute_ventilation";

    pub const ACCEL_X_NORMALIZED: &str = "accelx.normalized";
    pub const ACCEL_Y_NORMALIZED: &str = "accely.normalized";
    pub const ACCEL_Z_NORMALIZED: &str = "accelz.normalized";
    pub const ACCEL_MAGNITUDE: &str = "accel.magnitude";
    pub const ACCEL_MAGNITUDE_STDEV: &str = "accel.magnitude.stdev";
    pub const ACCEL_ACTIVITY: &str = "accel.activity";

    /// Three-wide vector stream of synchronized accelerometer triples.
    pub const ACCEL_XYZ: &str = "accel.xyz";

    pub const SCALAR: &[&str] = &[
        ECG_BANDPASSED,
        ECG_BANDPASSED_NORMALIZED,
        ECG_DERIVATIVE,
        ECG_DERIVATIVE_NORMALIZED,
        ECG_SQUARED,
        ECG_SQUARED_NORMALIZED,
        ECG_SMOOTHED,
        ECG_SMOOTHED_NORMALIZED,
        ECG_PEAKS,
        ECG_PEAKS_ACCEPTED,
        ECG_PEAKS_DEDUPLICATED,
        ECG_RPEAKS,
        ECG_RR_AVERAGE,
        ECG_RR_VALUE,
        ECG_RR_VALUE_VALID,
        ECG_RR_VALUE_DIFF,
        ECG_RR_OUTLIER,
        ECG_RR_VALUE_FILTERED,
        ECG_RR,
        ECG_HEART_RATE,
        ECG_RR_LF,
        ECG_RR_MF,
        ECG_RR_HF,
        ECG_RR_LF_HF,
        ECG_QUALITY,
        ECG_WINDOW_QUALITY,
        RIP_SMOOTH,
        RIP_BASELINE,
        RIP_UP_INTERCEPTS,
        RIP_DOWN_INTERCEPTS,
        RIP_UP_INTERCEPTS_FILTERED,
        RIP_DOWN_INTERCEPTS_FILTERED,
        RIP_VALLEYS,
        RIP_PEAKS,
        RIP_INSPIRATION_AMPLITUDE,
        RIP_CYCLE_DURATION,
        RIP_VALLEYS_FILTERED,
        RIP_PEAKS_FILTERED,
        RIP_INSP_DURATION,
        RIP_EXPR_DURATION,
        RIP_RESP_DURATION,
        RIP_STRETCH,
        RIP_IE_RATIO,
        RIP_RSA,
        RIP_BREATH_RATE,
        RIP_MINUTE_VENTILATION,
        ACCEL_X_NORMALIZED,
        ACCEL_Y_NORMALIZED,
        ACCEL_Z_NORMALIZED,
        ACCEL_MAGNITUDE,
        ACCEL_MAGNITUDE_STDEV,
        ACCEL_ACTIVITY,
    ];

    pub const VECTOR: &[&str] = &[ACCEL_XYZ];

    pub fn is_known(key: &str) -> bool {
        SCALAR.contains(&key) || VECTOR.contains(&key)
    }
}

/// One element pushed to a listener.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Emitted {
    Sample(Sample),
    Vector(VectorSample),
}

impl Emitted {
    pub fn timestamp(&self) -> i64 {
        match self {
            Emitted::Sample(s) => s.timestamp,
            Emitted::Vector(v) => v.timestamp,
        }
    }
}

pub type Listener = Box<dyn FnMut(&str, &Emitted) + Send>;

/// Per-window output buffers addressed by [`keys`].
///
/// Buffers hold the most recent window's output and are cleared by
/// [`begin_window`](Self::begin_window).
pub struct StreamStore {
    scalars: BTreeMap<&'static str, TimeSeriesBuffer>,
    vectors: BTreeMap<&'static str, VectorBuffer>,
    subscribed: BTreeSet<&'static str>,
    listener: Option<Listener>,
}

impl std::fmt::Debug for StreamStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamStore")
            .field("scalars", &self.scalars.len())
            .field("vectors", &self.vectors.len())
            .field("subscribed", &self.subscribed)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl Default for StreamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamStore {
    pub fn new() -> Self {
        let scalars = keys::SCALAR
            .iter()
            .map(|&k| (k, TimeSeriesBuffer::new(k)))
            .collect();
        let vectors = keys::VECTOR
            .iter()
            .map(|&k| (k, VectorBuffer::new(k, 3)))
            .collect();
        Self {
            scalars,
            vectors,
            subscribed: BTreeSet::new(),
            listener: None,
        }
    }

    /// Register interest in `key`; new elements on it reach the listener.
    pub fn subscribe(&mut self, key: &str) -> Result<()> {
        let known = keys::SCALAR
            .iter()
            .chain(keys::VECTOR)
            .copied()
            .find(|k| *k == key)
            .ok_or_else(|| StrexError::UnknownKey(key.to_string()))?;
        self.subscribed.insert(known);
        Ok(())
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.subscribed.iter().copied()
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&str, &Emitted) + Send + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn begin_window(&mut self) {
        for buffer in self.scalars.values_mut() {
            buffer.reset();
        }
        for buffer in self.vectors.values_mut() {
            buffer.reset();
        }
    }

    /// Append samples to a scalar stream, notifying the listener when the key
    /// is subscribed.
    pub fn publish(&mut self, key: &'static str, samples: &[Sample]) {
        let Some(buffer) = self.scalars.get_mut(key) else {
            log::warn!("dropping {} samples for unregistered key {key}", samples.len());
            return;
        };
        let notify = self.subscribed.contains(key);
        for sample in samples {
            buffer.add(*sample);
            if notify {
                if let Some(listener) = self.listener.as_mut() {
                    listener(key, &Emitted::Sample(*sample));
                }
            }
        }
    }

    pub fn publish_one(&mut self, key: &'static str, sample: Sample) {
        self.publish(key, std::slice::from_ref(&sample));
    }

    pub fn publish_vectors(&mut self, key: &'static str, samples: &[VectorSample]) -> Result<()> {
        let buffer = self
            .vectors
            .get_mut(key)
            .ok_or_else(|| StrexError::UnknownKey(key.to_string()))?;
        let notify = self.subscribed.contains(key);
        for sample in samples {
            buffer.add(sample.clone())?;
            if notify {
                if let Some(listener) = self.listener.as_mut() {
                    listener(key, &Emitted::Vector(sample.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&TimeSeriesBuffer> {
        self.scalars.get(key)
    }

    pub fn get_vectors(&self, key: &str) -> Option<&VectorBuffer> {
        self.vectors.get(key)
    }
}
