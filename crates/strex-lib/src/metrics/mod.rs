pub mod hrv;
pub mod quantile;
pub mod sqi;

pub use hrv::{hrv_frequency, lf_hf_ratio, lomb, HrvFrequency, LombPeriodogram};
pub use quantile::PSquared;
pub use sqi::{window_quality, AmplitudeBandQuality, Quality, QualityReport, SampleQuality};
