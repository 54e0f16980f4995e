pub mod config;
pub mod detectors;
pub mod dsp;
pub mod error;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod signal;
pub mod store;

pub use config::PipelineConfig;
pub use detectors::*;
pub use error::{Result, StrexError};
pub use metrics::*;
pub use pipeline::{Channel, Pipeline, WindowReport};
pub use signal::*;
pub use store::{keys, Emitted, StreamStore};
