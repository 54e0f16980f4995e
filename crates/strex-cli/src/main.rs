use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};
use strex_lib::{
    detectors::{
        accel::Activity,
        ecg::{CardiacExtractor, RrQuality},
    },
    io::text as text_io,
    metrics::hrv::{hrv_frequency, HrvFrequency},
    pipeline::{Channel, Pipeline},
    signal::{Sample, TimeSeriesBuffer},
    store::{Emitted, StreamStore},
    PipelineConfig,
};

#[derive(Parser)]
#[command(
    name = "strex",
    version,
    about = "strex: windowed stress-feature extraction for chest band recordings"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session directory through the windowed pipeline
    Run {
        /// Directory holding ecg.txt, rip.txt, accelx.txt, accely.txt, accelz.txt
        #[arg(long)]
        session: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        window_ms: Option<i64>,
        /// Output key to print as JSON lines; repeatable
        #[arg(long = "subscribe")]
        subscribe: Vec<String>,
        /// Append each window's subscribed buffers to <dir>/<key>.csv
        #[arg(long)]
        persist: Option<PathBuf>,
    },
    /// Detect R-peaks and classify RR intervals in one ECG file (stdin if omitted)
    Rpeaks {
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long, default_value_t = strex_lib::config::DEFAULT_ECG_HZ)]
        fs: f64,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Lomb HRV band powers of RR intervals in seconds, one per line or as
    /// persisted `timestamp,rr` rows (stdin if omitted)
    Hrv {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the default configuration as TOML
    Config,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            session,
            config,
            window_ms,
            subscribe,
            persist,
        } => cmd_run(
            &session,
            config.as_deref(),
            window_ms,
            &subscribe,
            persist.as_deref(),
        )?,
        Commands::Rpeaks { input, fs, config } => cmd_rpeaks(input.as_deref(), fs, config.as_deref())?,
        Commands::Hrv { input } => cmd_hrv(input.as_deref())?,
        Commands::Config => print!("{}", PipelineConfig::default().to_toml_string()?),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_stdin() -> Result<String> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

/// First epoch boundary strictly after `ts`.
fn next_epoch(ts: i64, window_ms: i64) -> i64 {
    (ts.div_euclid(window_ms) + 1) * window_ms
}

fn load_session(dir: &Path) -> Result<Vec<(Channel, Sample)>> {
    let mut merged = Vec::new();
    for channel in Channel::ALL {
        let path = dir.join(format!("{}.txt", channel.name()));
        if !path.exists() {
            log::warn!("{} not found, skipping {channel}", path.display());
            continue;
        }
        let samples = text_io::read_channel_file(&path)?;
        log::info!("loaded {} {channel} samples", samples.len());
        merged.extend(samples.into_iter().map(|s| (channel, s)));
    }
    merged.sort_by_key(|(_, s)| s.timestamp);
    Ok(merged)
}

#[derive(Serialize)]
struct Emission<'a> {
    key: &'a str,
    #[serde(flatten)]
    item: &'a Emitted,
}

fn persist_subscriptions(store: &StreamStore, dir: &Path) -> Result<()> {
    for key in store.subscriptions() {
        let path = dir.join(format!("{key}.csv"));
        if let Some(buffer) = store.get(key) {
            text_io::persist(&path, buffer)?;
        } else if let Some(buffer) = store.get_vectors(key) {
            text_io::persist_vectors(&path, buffer)?;
        }
    }
    Ok(())
}

fn cmd_run(
    session: &Path,
    config: Option<&Path>,
    window_ms: Option<i64>,
    subscribe: &[String],
    persist: Option<&Path>,
) -> Result<()> {
    let mut cfg = load_config(config)?;
    if let Some(w) = window_ms {
        cfg.window_ms = w;
    }
    let w = cfg.window_ms;
    let mut pipeline = Pipeline::new(cfg)?;
    for key in subscribe {
        pipeline.subscribe(key)?;
    }
    pipeline.set_listener(|key, item| {
        match serde_json::to_string(&Emission { key, item }) {
            Ok(line) => println!("{line}"),
            Err(err) => log::error!("failed to encode {key}: {err}"),
        }
    });
    if let Some(dir) = persist {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let samples = load_session(session)?;
    if samples.is_empty() {
        return Err(anyhow!("no samples found in {}", session.display()));
    }
    let mut window_start = None;
    let mut pending = false;
    let finish_window = |pipeline: &mut Pipeline| -> Result<()> {
        pipeline.run_window()?;
        if let Some(dir) = persist {
            persist_subscriptions(pipeline.store(), dir)?;
        }
        Ok(())
    };
    for (channel, sample) in samples {
        let start = *window_start.get_or_insert_with(|| next_epoch(sample.timestamp, w));
        pipeline.add(channel, sample);
        pending = true;
        if sample.timestamp - start >= w {
            finish_window(&mut pipeline)?;
            pending = false;
            window_start = Some(next_epoch(sample.timestamp, w));
        }
    }
    if pending {
        log::info!("flushing final partial window");
        finish_window(&mut pipeline)?;
    }
    Ok(())
}

#[derive(Serialize)]
struct RpeakSummary {
    fs: f64,
    samples: usize,
    rpeaks: Vec<i64>,
    rr: Vec<f64>,
    rr_quality: Vec<RrQuality>,
    hrv: Option<HrvFrequency>,
}

fn cmd_rpeaks(input: Option<&Path>, fs: f64, config: Option<&Path>) -> Result<()> {
    let cfg = load_config(config)?;
    let samples = match input {
        Some(path) => text_io::read_channel_file(path)?,
        None => text_io::parse_channel_text(&read_stdin()?)?,
    };
    let ecg = TimeSeriesBuffer::from_samples("ecg", samples).with_frequency(fs);
    let mut extractor = CardiacExtractor::new(cfg.cardiac);
    let out = extractor.run_window(&ecg, Activity::Still)?;
    let summary = RpeakSummary {
        fs,
        samples: ecg.len(),
        rpeaks: out.rpeaks.iter().map(|s| s.timestamp).collect(),
        rr: out.rr_value.iter().map(|s| s.value).collect(),
        rr_quality: out.rr_quality,
        hrv: out.hrv,
    };
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}

fn cmd_hrv(input: Option<&Path>) -> Result<()> {
    let rr = match input {
        Some(path) => text_io::read_rr_list(path)?,
        None => text_io::parse_rr_list(&read_stdin()?)?,
    };
    let hrv = hrv_frequency(&rr)
        .ok_or_else(|| anyhow!("RR series of {} values has no spectral content", rr.len()))?;
    println!("{}", serde_json::to_string(&hrv)?);
    Ok(())
}
