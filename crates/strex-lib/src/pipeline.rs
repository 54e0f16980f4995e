use crate::{
    config::PipelineConfig,
    detectors::{
        accel::{Activity, ActivityClassifier, ActivityWindow},
        ecg::{CardiacExtractor, CardiacWindow, PeakDetectorState},
        rip::{RespirationExtractor, RespirationWindow},
    },
    error::{Result, StrexError},
    metrics::sqi::{window_quality, Quality, QualityReport, SampleQuality},
    signal::{Sample, TimeSeriesBuffer},
    store::{keys, Emitted, StreamStore},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Input channel of a chest band session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ecg,
    Rip,
    AccelX,
    AccelY,
    AccelZ,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Ecg,
        Channel::Rip,
        Channel::AccelX,
        Channel::AccelY,
        Channel::AccelZ,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Ecg => "ecg",
            Channel::Rip => "rip",
            Channel::AccelX => "accelx",
            Channel::AccelY => "accely",
            Channel::AccelZ => "accelz",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = StrexError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StrexError::UnknownChannel(s.to_string()))
    }
}

/// Summary of one processed window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowReport {
    pub index: u64,
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub activity: Activity,
    pub ecg_quality: Option<Quality>,
    pub rpeaks: usize,
    pub rr_intervals: usize,
    pub good_rr: usize,
    pub breaths: usize,
    pub detector: Option<PeakDetectorState>,
}

/// One session: input buffers, extractors with their long-lived state, and
/// the keyed output store.
pub struct Pipeline {
    cfg: PipelineConfig,
    ecg: TimeSeriesBuffer,
    rip: TimeSeriesBuffer,
    accel: [TimeSeriesBuffer; 3],
    activity: ActivityClassifier,
    cardiac: CardiacExtractor,
    respiration: RespirationExtractor,
    quality: Box<dyn SampleQuality + Send>,
    store: StreamStore,
    windows: u64,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("windows", &self.windows)
            .field("ecg", &self.ecg.len())
            .field("rip", &self.rip.len())
            .field("store", &self.store)
            .finish()
    }
}

impl Pipeline {
    pub fn new(cfg: PipelineConfig) -> Result<Self> {
        cfg.validate()?;
        let preserve = cfg.preserve_last_sample;
        let input = move |name: &str, hz: f64| {
            TimeSeriesBuffer::new(name)
                .with_frequency(hz)
                .preserving_last(preserve)
        };
        Ok(Self {
            ecg: input("ecg", cfg.ecg_hz),
            rip: input("rip", cfg.rip_hz),
            accel: [
                input("accelx", cfg.accel_hz),
                input("accely", cfg.accel_hz),
                input("accelz", cfg.accel_hz),
            ],
            activity: ActivityClassifier::new(cfg.activity.clone())?,
            cardiac: CardiacExtractor::new(cfg.cardiac.clone()),
            respiration: RespirationExtractor::new(cfg.respiration.clone()),
            quality: Box::new(cfg.quality.amplitude),
            store: StreamStore::new(),
            windows: 0,
            cfg,
        })
    }

    /// Replace the per-sample ECG quality classifier.
    pub fn with_quality_classifier(mut self, classifier: impl SampleQuality + Send + 'static) -> Self {
        self.quality = Box::new(classifier);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.cfg
    }

    pub fn add(&mut self, channel: Channel, sample: Sample) {
        self.buffer_mut(channel).add(sample);
    }

    pub fn buffer(&self, channel: Channel) -> &TimeSeriesBuffer {
        match channel {
            Channel::Ecg => &self.ecg,
            Channel::Rip => &self.rip,
            Channel::AccelX => &self.accel[0],
            Channel::AccelY => &self.accel[1],
            Channel::AccelZ => &self.accel[2],
        }
    }

    fn buffer_mut(&mut self, channel: Channel) -> &mut TimeSeriesBuffer {
        match channel {
            Channel::Ecg => &mut self.ecg,
            Channel::Rip => &mut self.rip,
            Channel::AccelX => &mut self.accel[0],
            Channel::AccelY => &mut self.accel[1],
            Channel::AccelZ => &mut self.accel[2],
        }
    }

    pub fn subscribe(&mut self, key: &str) -> Result<()> {
        self.store.subscribe(key)
    }

    pub fn set_listener(&mut self, listener: impl FnMut(&str, &Emitted) + Send + 'static) {
        self.store.set_listener(listener);
    }

    pub fn store(&self) -> &StreamStore {
        &self.store
    }

    pub fn cardiac(&self) -> &CardiacExtractor {
        &self.cardiac
    }

    /// Run activity, quality, cardiac and respiratory extraction over the
    /// buffered samples, publish the outputs and reset the input buffers.
    pub fn run_window(&mut self) -> Result<WindowReport> {
        self.store.begin_window();
        let mut report = WindowReport {
            index: self.windows,
            start: Channel::ALL
                .iter()
                .filter_map(|c| self.buffer(*c).first().map(|s| s.timestamp))
                .min(),
            end: Channel::ALL
                .iter()
                .filter_map(|c| self.buffer(*c).last().map(|s| s.timestamp))
                .max(),
            activity: Activity::Still,
            ecg_quality: None,
            rpeaks: 0,
            rr_intervals: 0,
            good_rr: 0,
            breaths: 0,
            detector: None,
        };

        let [x, y, z] = &self.accel;
        let activity = self.activity.run_window(x, y, z);
        report.activity = activity.activity;
        self.publish_activity(&activity)?;

        if !self.ecg.is_empty() {
            let quality = window_quality(self.quality.as_ref(), self.ecg.data(), self.cfg.quality.threshold);
            report.ecg_quality = Some(quality.window);
            self.publish_quality(&quality);

            let cardiac = self.cardiac.run_window(&self.ecg, report.activity)?;
            report.rpeaks = cardiac.rpeaks.len();
            report.rr_intervals = cardiac.rr_value.len();
            report.good_rr = cardiac.rr_filtered.len();
            report.detector = cardiac.state.clone();
            self.publish_cardiac(&cardiac);
        }

        if !self.rip.is_empty() {
            let respiration =
                self.respiration
                    .run_window(&self.rip, report.activity, self.cardiac.rr_history())?;
            report.breaths = respiration.retained.len();
            self.publish_respiration(&respiration);
        }

        self.ecg.reset();
        self.rip.reset();
        for axis in &mut self.accel {
            axis.reset();
        }
        self.windows += 1;
        log::info!(
            "window {} [{:?}..{:?}]: {:?}, {} r-peaks, {} breaths",
            report.index,
            report.start,
            report.end,
            report.activity,
            report.rpeaks,
            report.breaths
        );
        Ok(report)
    }

    fn publish_activity(&mut self, out: &ActivityWindow) -> Result<()> {
        let s = &mut self.store;
        s.publish(keys::ACCEL_X_NORMALIZED, &out.normalized[0]);
        s.publish(keys::ACCEL_Y_NORMALIZED, &out.normalized[1]);
        s.publish(keys::ACCEL_Z_NORMALIZED, &out.normalized[2]);
        s.publish_vectors(keys::ACCEL_XYZ, &out.triples)?;
        s.publish(keys::ACCEL_MAGNITUDE, &out.magnitude);
        s.publish(keys::ACCEL_MAGNITUDE_STDEV, &out.magnitude_stdev);
        if let Some(ts) = out.timestamp {
            s.publish_one(keys::ACCEL_ACTIVITY, Sample::new(ts, out.activity.code()));
        }
        Ok(())
    }

    fn publish_quality(&mut self, report: &QualityReport) {
        self.store.publish(keys::ECG_QUALITY, &report.per_sample);
        if let Some(first) = report.per_sample.first() {
            self.store
                .publish_one(keys::ECG_WINDOW_QUALITY, first.with_value(report.window.code()));
        }
    }

    fn publish_cardiac(&mut self, out: &CardiacWindow) {
        let s = &mut self.store;
        s.publish(keys::ECG_BANDPASSED, &out.bandpassed);
        s.publish(keys::ECG_BANDPASSED_NORMALIZED, &out.bandpassed_normalized);
        s.publish(keys::ECG_DERIVATIVE, &out.derivative);
        s.publish(keys::ECG_DERIVATIVE_NORMALIZED, &out.derivative_normalized);
        s.publish(keys::ECG_SQUARED, &out.squared);
        s.publish(keys::ECG_SQUARED_NORMALIZED, &out.squared_normalized);
        s.publish(keys::ECG_SMOOTHED, &out.smoothed);
        s.publish(keys::ECG_SMOOTHED_NORMALIZED, &out.smoothed_normalized);
        let candidates: Vec<Sample> = out.candidates.iter().map(|c| c.sample()).collect();
        s.publish(keys::ECG_PEAKS, &candidates);
        s.publish(keys::ECG_PEAKS_ACCEPTED, &out.accepted);
        s.publish(keys::ECG_PEAKS_DEDUPLICATED, &out.deduplicated);
        s.publish(keys::ECG_RPEAKS, &out.rpeaks);
        if let (Some(avg), Some(first)) = (
            out.state.as_ref().and_then(|st| st.rr_average),
            out.bandpassed.first(),
        ) {
            s.publish_one(keys::ECG_RR_AVERAGE, first.with_value(avg));
        }
        s.publish(keys::ECG_RR_VALUE, &out.rr_value);
        let valid: Vec<Sample> = out
            .valid_rr
            .iter()
            .map(|b| Sample::new(b.timestamp, b.rr))
            .collect();
        s.publish(keys::ECG_RR_VALUE_VALID, &valid);
        s.publish(keys::ECG_RR_VALUE_DIFF, &out.rr_diff);
        s.publish(keys::ECG_RR_OUTLIER, &out.rr_quality_samples());
        s.publish(keys::ECG_RR_VALUE_FILTERED, &out.rr_filtered);
        s.publish(keys::ECG_RR, &out.accumulated_rr);
        s.publish(keys::ECG_HEART_RATE, &out.accumulated_heart_rate);
        if let (Some(hrv), Some(ts)) = (out.hrv.as_ref(), out.hrv_timestamp) {
            for (key, value) in [
                (keys::ECG_RR_LF_HF, hrv.lf_hf),
                (keys::ECG_RR_LF, hrv.lf),
                (keys::ECG_RR_MF, hrv.mf),
                (keys::ECG_RR_HF, hrv.hf),
            ] {
                if let Some(v) = value {
                    s.publish_one(key, Sample::new(ts, v));
                }
            }
        }
    }

    fn publish_respiration(&mut self, out: &RespirationWindow) {
        let s = &mut self.store;
        s.publish(keys::RIP_SMOOTH, &out.smoothed);
        s.publish(keys::RIP_BASELINE, &out.baseline);
        s.publish(keys::RIP_UP_INTERCEPTS, &out.intercepts.up);
        s.publish(keys::RIP_DOWN_INTERCEPTS, &out.intercepts.down);
        s.publish(keys::RIP_UP_INTERCEPTS_FILTERED, &out.filtered.up);
        s.publish(keys::RIP_DOWN_INTERCEPTS_FILTERED, &out.filtered.down);
        s.publish(keys::RIP_VALLEYS, &out.valleys);
        s.publish(keys::RIP_PEAKS, &out.peaks);
        s.publish(keys::RIP_INSPIRATION_AMPLITUDE, &out.inspiration_amplitude);
        s.publish(keys::RIP_CYCLE_DURATION, &out.cycle_duration);
        let valleys: Vec<Sample> = out.retained.iter().map(|c| c.valley).collect();
        let peaks: Vec<Sample> = out.retained.iter().map(|c| c.peak).collect();
        s.publish(keys::RIP_VALLEYS_FILTERED, &valleys);
        s.publish(keys::RIP_PEAKS_FILTERED, &peaks);
        let m = &out.metrics;
        s.publish(keys::RIP_INSP_DURATION, &m.inspiration_duration);
        s.publish(keys::RIP_EXPR_DURATION, &m.expiration_duration);
        s.publish(keys::RIP_RESP_DURATION, &m.respiration_duration);
        s.publish(keys::RIP_STRETCH, &m.stretch);
        s.publish(keys::RIP_IE_RATIO, &m.ie_ratio);
        s.publish(keys::RIP_RSA, &m.rsa);
        if let Some(rate) = out.breath_rate {
            s.publish_one(keys::RIP_BREATH_RATE, rate);
        }
        if let Some(mv) = out.minute_ventilation {
            s.publish_one(keys::RIP_MINUTE_VENTILATION, mv);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        f64::consts::PI,
        sync::{Arc, Mutex},
    };

    fn feed_session(pipeline: &mut Pipeline, seconds: i64) {
        // 64 Hz ECG at 60 bpm, 21.33 Hz RIP at 15 breaths/min, quiet accelerometer.
        for i in 0..seconds * 64 {
            let ts = i * 1000 / 64;
            let phase = (i % 64) as f64 - 32.0;
            let beat = 1.2 * (-0.5 * (phase / 1.5).powi(2)).exp();
            let drift = 0.05 * (2.0 * PI * 0.3 * i as f64 / 64.0).sin();
            let v = 2000.0 + 500.0 * (beat + drift);
            pipeline.add(Channel::Ecg, Sample::new(ts, v));
            if i % 3 == 0 {
                let rip = 2000.0 + 300.0 * (2.0 * PI * ts as f64 / 4000.0).sin();
                pipeline.add(Channel::Rip, Sample::new(ts, rip));
            }
            if i % 6 == 0 {
                pipeline.add(Channel::AccelX, Sample::new(ts, 0.01 * ((i / 6) % 2) as f64));
                pipeline.add(Channel::AccelY, Sample::new(ts, 0.0));
                pipeline.add(Channel::AccelZ, Sample::new(ts, 1.0));
            }
        }
    }

    #[test]
    fn channel_names_parse() {
        assert_eq!("ECG".parse::<Channel>().unwrap(), Channel::Ecg);
        assert_eq!("accelz".parse::<Channel>().unwrap(), Channel::AccelZ);
        assert!(matches!(
            "gyro".parse::<Channel>(),
            Err(StrexError::UnknownChannel(_))
        ));
    }

    #[test]
    fn full_window_publishes_features() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        pipeline.subscribe(keys::ECG_RR_VALUE).unwrap();
        pipeline.subscribe(keys::ACCEL_ACTIVITY).unwrap();
        pipeline.set_listener(move |key, item| {
            sink.lock().unwrap().push((key.to_string(), item.timestamp()));
        });

        feed_session(&mut pipeline, 60);
        let report = pipeline.run_window().unwrap();
        assert_eq!(report.activity, Activity::Still);
        assert_eq!(report.ecg_quality, Some(Quality::Good));
        assert!((55..=62).contains(&report.rpeaks), "{} r-peaks", report.rpeaks);
        assert!(report.good_rr >= 50, "{} good rr", report.good_rr);
        assert!(report.breaths >= 10);

        let store = pipeline.store();
        assert_eq!(store.get(keys::ECG_RR).unwrap().len(), report.good_rr);
        assert_eq!(store.get(keys::ECG_RPEAKS).unwrap().len(), report.rpeaks);
        assert!(!store.get(keys::RIP_IE_RATIO).unwrap().is_empty());
        assert_eq!(store.get(keys::RIP_BREATH_RATE).unwrap().len(), 1);
        assert_eq!(store.get_vectors(keys::ACCEL_XYZ).unwrap().len(), 640);
        assert!(pipeline.buffer(Channel::Ecg).is_empty());

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.iter().filter(|(k, _)| k == keys::ECG_RR_VALUE).count(),
            report.rr_intervals
        );
        assert_eq!(seen.iter().filter(|(k, _)| k == keys::ACCEL_ACTIVITY).count(), 1);
    }

    #[test]
    fn history_accumulates_across_windows() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        feed_session(&mut pipeline, 60);
        let first = pipeline.run_window().unwrap();
        assert!(!pipeline.store().get(keys::RIP_SMOOTH).unwrap().is_empty());
        let second = pipeline.run_window().unwrap();
        assert_eq!(second.index, first.index + 1);
        assert!(pipeline.store().get(keys::RIP_SMOOTH).unwrap().is_empty());
        assert_eq!(pipeline.cardiac().rr_history().len(), first.good_rr);

        feed_session(&mut pipeline, 60);
        let third = pipeline.run_window().unwrap();
        assert_eq!(
            pipeline.cardiac().rr_history().len(),
            first.good_rr + third.good_rr
        );
    }

    #[test]
    fn preserve_keeps_last_input_sample() {
        let cfg = PipelineConfig {
            preserve_last_sample: true,
            ..PipelineConfig::default()
        };
        let mut pipeline = Pipeline::new(cfg).unwrap();
        pipeline.add(Channel::Rip, Sample::new(0, 1.0));
        pipeline.add(Channel::Rip, Sample::new(47, 2.0));
        pipeline.run_window().unwrap();
        assert_eq!(pipeline.buffer(Channel::Rip).data(), &[Sample::new(47, 2.0)]);
    }

    struct AllBad;

    impl SampleQuality for AllBad {
        fn classify(&self, samples: &[Sample]) -> Vec<Quality> {
            vec![Quality::Bad; samples.len()]
        }
    }

    #[test]
    fn custom_quality_classifier_is_used() {
        let mut pipeline = Pipeline::new(PipelineConfig::default())
            .unwrap()
            .with_quality_classifier(AllBad);
        feed_session(&mut pipeline, 10);
        let report = pipeline.run_window().unwrap();
        assert_eq!(report.ecg_quality, Some(Quality::Bad));
        let verdict = pipeline.store().get(keys::ECG_WINDOW_QUALITY).unwrap();
        assert_eq!(verdict.data(), &[Sample::new(0, Quality::Bad.code())]);
    }

    #[test]
    fn empty_window_is_harmless() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let report = pipeline.run_window().unwrap();
        assert_eq!(report.activity, Activity::Still);
        assert!(report.ecg_quality.is_none());
        assert!(report.start.is_none());
    }
}
