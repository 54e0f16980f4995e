use crate::signal::{Sample, TimeSeriesBuffer, VectorBuffer};
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, Trim};
use std::{
    fs::{self, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

fn delimiter_of(text: &str) -> u8 {
    let first = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or_default();
    if first.contains(',') {
        b','
    } else if first.contains('\t') {
        b'\t'
    } else {
        b' '
    }
}

fn reader_for(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .delimiter(delimiter_of(text))
        .from_reader(text.as_bytes())
}

/// Parse `timestamp<sep>value` lines (comma, tab or space separated) into
/// samples. Blank lines and `#` comments are skipped; extra columns are ignored.
pub fn parse_channel_text(text: &str) -> Result<Vec<Sample>> {
    let mut reader = reader_for(text);
    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("record {} is malformed", idx + 1))?;
        let mut fields = record.iter().filter(|f| !f.is_empty());
        let (Some(ts), Some(value)) = (fields.next(), fields.next()) else {
            if record.iter().all(str::is_empty) {
                continue;
            }
            bail!("record {} needs a timestamp and a value", idx + 1);
        };
        let timestamp: i64 = ts
            .parse()
            .with_context(|| format!("record {} has a bad timestamp: {}", idx + 1, ts))?;
        let value: f64 = value
            .parse()
            .with_context(|| format!("record {} has a bad value: {}", idx + 1, value))?;
        out.push(Sample::new(timestamp, value));
    }
    Ok(out)
}

/// Read one channel file from disk.
pub fn read_channel_file(path: &Path) -> Result<Vec<Sample>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_channel_text(&text).with_context(|| format!("in {}", path.display()))
}

/// Parse RR intervals in seconds. Each record is either a bare interval or a
/// persisted `timestamp,rr` row, so `ecg.rr_value.csv` output reads back directly.
pub fn parse_rr_list(text: &str) -> Result<Vec<f64>> {
    let mut reader = reader_for(text);
    let mut out = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("record {} is malformed", idx + 1))?;
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        let field = match fields.as_slice() {
            [] => continue,
            [rr] | [_, rr, ..] => *rr,
        };
        let rr: f64 = field
            .parse()
            .with_context(|| format!("record {} has a bad RR interval: {}", idx + 1, field))?;
        if !(rr > 0.0 && rr.is_finite()) {
            bail!("record {} has a non-positive RR interval: {}", idx + 1, field);
        }
        out.push(rr);
    }
    if out.is_empty() {
        bail!("no RR intervals found");
    }
    Ok(out)
}

pub fn read_rr_list(path: &Path) -> Result<Vec<f64>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_rr_list(&text).with_context(|| format!("in {}", path.display()))
}

fn append_lines<'a>(path: &Path, rows: impl Iterator<Item = (i64, &'a [f64])>) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {} for append", path.display()))?;
    let mut writer = BufWriter::new(file);
    for (ts, values) in rows {
        write!(writer, "{ts}")?;
        for v in values {
            write!(writer, ",{v}")?;
        }
        writeln!(writer)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Append the buffer contents to `path` as `timestamp,value` lines.
pub fn persist(path: &Path, buffer: &TimeSeriesBuffer) -> Result<()> {
    append_lines(
        path,
        buffer
            .data()
            .iter()
            .map(|s| (s.timestamp, std::slice::from_ref(&s.value))),
    )
}

/// Append a vector stream as `timestamp,v0,v1,...` lines.
pub fn persist_vectors(path: &Path, buffer: &VectorBuffer) -> Result<()> {
    append_lines(
        path,
        buffer
            .data()
            .iter()
            .map(|s| (s.timestamp, s.values.as_slice())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::VectorSample;

    #[test]
    fn parses_comma_and_whitespace_files() {
        let csv = "# ecg\n1000,2048\n1015, 2050.5\n\n1031,2047\n";
        let samples = parse_channel_text(csv).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], Sample::new(1015, 2050.5));

        let spaced = "1000  12\n1047 13 extra\n";
        let samples = parse_channel_text(spaced).unwrap();
        assert_eq!(samples, vec![Sample::new(1000, 12.0), Sample::new(1047, 13.0)]);

        let tabbed = "5\t1.5\n";
        assert_eq!(parse_channel_text(tabbed).unwrap(), vec![Sample::new(5, 1.5)]);
    }

    #[test]
    fn bad_records_name_the_line() {
        let err = parse_channel_text("1000,1\nabc,2\n").unwrap_err();
        assert!(format!("{err:#}").contains("record 2"));
        assert!(parse_channel_text("1000\n").is_err());
        assert!(parse_channel_text("").unwrap().is_empty());
    }

    #[test]
    fn rr_lists_accept_bare_and_stamped_records() {
        assert_eq!(parse_rr_list("# rr\n0.8\n\n0.81\n").unwrap(), vec![0.8, 0.81]);
        assert_eq!(
            parse_rr_list("1000,0.79\n1790,0.82\n").unwrap(),
            vec![0.79, 0.82]
        );
        assert_eq!(parse_rr_list("1000\t0.9\n").unwrap(), vec![0.9]);
        assert!(parse_rr_list("# nothing\n").is_err());
        let err = parse_rr_list("0.8\nfast\n").unwrap_err();
        assert!(format!("{err:#}").contains("record 2"));
        assert!(parse_rr_list("0.8\n-0.1\n").is_err());
    }

    #[test]
    fn persisted_rr_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecg.rr_value.csv");
        let buffer = TimeSeriesBuffer::from_samples(
            "ecg.rr_value",
            [Sample::new(1000, 0.8), Sample::new(1800, 0.85)],
        );
        persist(&path, &buffer).unwrap();
        assert_eq!(read_rr_list(&path).unwrap(), vec![0.8, 0.85]);
    }

    #[test]
    fn persist_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ecg.rr.csv");
        let buffer = TimeSeriesBuffer::from_samples("ecg.rr", [Sample::new(1, 0.5), Sample::new(2, 0.75)]);
        persist(&path, &buffer).unwrap();
        persist(&path, &buffer).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "1,0.5\n2,0.75\n1,0.5\n2,0.75\n");
        assert_eq!(read_channel_file(&path).unwrap().len(), 4);

        let mut xyz = VectorBuffer::new("accel.xyz", 3);
        xyz.add(VectorSample {
            timestamp: 7,
            values: vec![0.0, -1.5, 1.0],
        })
        .unwrap();
        let vpath = dir.path().join("accel.xyz.csv");
        persist_vectors(&vpath, &xyz).unwrap();
        assert_eq!(fs::read_to_string(&vpath).unwrap(), "7,0,-1.5,1\n");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_channel_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(format!("{err:#}").contains("here.txt"));
    }
}
