pub mod accel;
pub mod ecg;
pub mod rip;

pub use accel::{Activity, ActivityClassifier, ActivityConfig, ActivityWindow};
pub use ecg::{CardiacConfig, CardiacExtractor, CardiacWindow, PeakDetectorState, RrQuality};
pub use rip::{BreathCycle, BreathMetrics, RespirationConfig, RespirationExtractor, RespirationWindow};
