use assert_cmd::cargo::cargo_bin_cmd;
use serde::Deserialize;
use std::{error::Error, f64::consts::PI, fmt::Write as _, fs};

#[derive(Deserialize)]
struct HrvOutput {
    lf: Option<f64>,
    mf: Option<f64>,
    hf: Option<f64>,
    lf_hf: Option<f64>,
}

#[derive(Deserialize)]
struct RpeakOutput {
    fs: f64,
    samples: usize,
    rpeaks: Vec<i64>,
    rr: Vec<f64>,
    rr_quality: Vec<String>,
}

#[test]
fn hrv_command_reports_band_powers() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rr.txt");
    let mut text = String::from("# rr intervals, seconds\n");
    for i in 0..120 {
        let rr = 0.8 + 0.05 * (2.0 * PI * 0.25 * i as f64).sin();
        writeln!(text, "{rr:.5}")?;
    }
    fs::write(&path, text)?;

    let mut cmd = cargo_bin_cmd!("strex");
    cmd.args(["hrv", "--input"]).arg(&path);
    let out = cmd.assert().success().get_output().stdout.clone();
    let hrv: HrvOutput = serde_json::from_slice(&out)?;
    let (lf, mf, hf) = (hrv.lf.unwrap(), hrv.mf.unwrap(), hrv.hf.unwrap());
    assert!(mf > lf && mf > hf, "lf {lf} mf {mf} hf {hf}");
    assert!(hrv.lf_hf.is_some());
    Ok(())
}

#[test]
fn hrv_command_reads_persisted_rr_rows() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ecg.rr_value.csv");
    let mut text = String::new();
    let mut ts = 1_000_000i64;
    for i in 0..120 {
        let rr = 0.8 + 0.05 * (2.0 * PI * 0.25 * i as f64).sin();
        writeln!(text, "{ts},{rr:.5}")?;
        ts += (rr * 1000.0) as i64;
    }
    fs::write(&path, text)?;

    let mut cmd = cargo_bin_cmd!("strex");
    cmd.args(["hrv", "--input"]).arg(&path);
    let out = cmd.assert().success().get_output().stdout.clone();
    let hrv: HrvOutput = serde_json::from_slice(&out)?;
    assert!(hrv.mf.unwrap() > hrv.lf.unwrap());
    Ok(())
}

#[test]
fn hrv_command_rejects_flat_series()-> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("strex");
    cmd.arg("hrv").write_stdin("0.8\n0.8\n0.8\n");
    cmd.assert().failure();
    Ok(())
}

#[test]
fn rpeaks_command_finds_every_beat() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ecg.txt");
    let mut text = String::new();
    for i in 0..60 * 64 {
        let t = i as f64 / 64.0;
        let mut v = 0.05 * (2.0 * PI * 0.3 * t).sin();
        for k in 0..60 {
            let centre = (32 + 64 * k) as f64;
            v += 1.2 * (-0.5 * ((i as f64 - centre) / 1.5).powi(2)).exp();
        }
        writeln!(text, "{} {v:.6}", 1_000_000 + i * 1000 / 64)?;
    }
    fs::write(&path, text)?;

    let mut cmd = cargo_bin_cmd!("strex");
    cmd.args(["rpeaks", "--fs", "64", "--input"]).arg(&path);
    let out = cmd.assert().success().get_output().stdout.clone();
    let summary: RpeakOutput = serde_json::from_slice(&out)?;
    assert_eq!(summary.fs, 64.0);
    assert_eq!(summary.samples, 3840);
    assert_eq!(summary.rpeaks.len(), 60);
    assert_eq!(summary.rr.len(), 59);
    assert!(summary.rr.iter().all(|rr| (rr - 1.0).abs() < 0.02));
    assert!(summary.rr_quality.iter().all(|q| q == "good"));
    Ok(())
}

#[test]
fn config_command_prints_defaults() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("strex");
    cmd.arg("config");
    let out = cmd.assert().success().get_output().stdout.clone();
    let text = String::from_utf8(out)?;
    let value: toml::Value = toml::from_str(&text)?;
    assert_eq!(value["window_ms"].as_integer(), Some(60_000));
    assert_eq!(value["cardiac"]["rr_average_len"].as_integer(), Some(8));
    assert!(value["activity"]["threshold"].as_float().is_some());
    Ok(())
}
