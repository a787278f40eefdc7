//! Sample stream drivers
//!
//! A stream path is `[driver:]path`. `raw:` stores little-endian int16,
//! `ascii:` one value per line. Without a prefix the extension decides.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use contracts::ContractError;

const RAW_EXTENSIONS: [&str; 4] = ["raw", "bin", "dmp", "fifo"];

/// On-disk sample encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    Raw,
    Ascii,
}

/// Parsed `[driver:]path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPath {
    pub format: StreamFormat,
    pub path: PathBuf,
}

impl StreamPath {
    pub fn parse(location: &str) -> Self {
        if let Some(rest) = location.strip_prefix("raw:") {
            return Self {
                format: StreamFormat::Raw,
                path: PathBuf::from(rest),
            };
        }
        if let Some(rest) = location.strip_prefix("ascii:") {
            return Self {
                format: StreamFormat::Ascii,
                path: PathBuf::from(rest),
            };
        }
        let path = PathBuf::from(location);
        let format = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if RAW_EXTENSIONS.contains(&ext) => StreamFormat::Raw,
            _ => StreamFormat::Ascii,
        };
        Self { format, path }
    }
}

/// Load every sample of a stream file.
pub fn load_samples(location: &str) -> Result<Vec<i16>, ContractError> {
    let stream = StreamPath::parse(location);
    let file = File::open(&stream.path).map_err(|e| io_error(&stream.path, e))?;
    let samples = match stream.format {
        StreamFormat::Raw => read_raw(file, &stream.path)?,
        StreamFormat::Ascii => read_ascii(file, &stream.path)?,
    };
    if samples.is_empty() {
        return Err(ContractError::stream(
            stream.path.display().to_string(),
            "no samples",
        ));
    }
    Ok(samples)
}

/// Load several streams and concatenate them in order.
pub fn load_concatenated<'a>(
    locations: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<i16>, ContractError> {
    let mut out = Vec::new();
    for location in locations {
        out.extend(load_samples(location)?);
    }
    Ok(out)
}

fn read_raw(mut file: File, path: &Path) -> Result<Vec<i16>, ContractError> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|e| io_error(path, e))?;
    if bytes.len() % 2 != 0 {
        return Err(ContractError::stream(
            path.display().to_string(),
            format!("odd byte count {}", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect())
}

fn read_ascii(file: File, path: &Path) -> Result<Vec<i16>, ContractError> {
    let mut samples = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| io_error(path, e))?;
        let value = line.trim();
        if value.is_empty() {
            continue;
        }
        let sample = parse_ascii_value(value).ok_or_else(|| {
            ContractError::stream(
                path.display().to_string(),
                format!("line {}: bad sample '{}'", lineno + 1, value),
            )
        })?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Integers must fit int16; fractional values must lie in [-1, 1] and are scaled.
fn parse_ascii_value(value: &str) -> Option<i16> {
    if let Ok(int) = value.parse::<i32>() {
        return i16::try_from(int).ok();
    }
    let float = value.parse::<f64>().ok()?;
    if !(-1.0..=1.0).contains(&float) {
        return None;
    }
    Some((float * i16::MAX as f64) as i16)
}

fn io_error(path: &Path, e: std::io::Error) -> ContractError {
    ContractError::stream(path.display().to_string(), e.to_string())
}

/// Incremental writer used by file sinks.
pub struct SampleWriter {
    path: PathBuf,
    format: StreamFormat,
    out: BufWriter<File>,
    written: usize,
}

impl SampleWriter {
    /// Create (truncate) the target file, creating parent directories.
    pub fn create(location: &str) -> Result<Self, ContractError> {
        let stream = StreamPath::parse(location);
        if let Some(parent) = stream.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| io_error(&stream.path, e))?;
            }
        }
        let file = File::create(&stream.path).map_err(|e| io_error(&stream.path, e))?;
        Ok(Self {
            path: stream.path,
            format: stream.format,
            out: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn write(&mut self, samples: &[i16]) -> Result<(), ContractError> {
        let result = match self.format {
            StreamFormat::Raw => samples
                .iter()
                .try_for_each(|s| self.out.write_all(&s.to_le_bytes())),
            StreamFormat::Ascii => samples
                .iter()
                .try_for_each(|s| writeln!(self.out, "{}", s)),
        };
        result.map_err(|e| io_error(&self.path, e))?;
        self.written += samples.len();
        Ok(())
    }

    /// Flush and close, returning the number of samples written.
    pub fn finish(mut self) -> Result<usize, ContractError> {
        self.out.flush().map_err(|e| io_error(&self.path, e))?;
        Ok(self.written)
    }
}
