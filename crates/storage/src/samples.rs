//! Append-only training sample files
//!
//! One line per sample: `x;y;width;height,label,p0,p1,...`. The region is
//! repeated on every line so a file can be streamed or grepped line by line.

use crate::StorageError;
use feature_engine::{GrayRow, SourceRegion};
use regression_engine::TrainingSample;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happens to the label when a sample is mirrored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorPolicy {
    /// Keep the label as recorded
    Keep,
    /// Steer the opposite way: `100 - label`
    #[default]
    Reflect,
}

/// Mirror a sample left to right
pub fn mirror(sample: &TrainingSample, policy: MirrorPolicy) -> TrainingSample {
    let label = match policy {
        MirrorPolicy::Keep => sample.label,
        MirrorPolicy::Reflect => 100.0 - sample.label,
    };
    TrainingSample::new(sample.pixels.mirrored(), label)
}

/// A sample together with the region it was captured from
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub region: SourceRegion,
    pub sample: TrainingSample,
}

/// Training sample file of one named run
#[derive(Debug, Clone)]
pub struct TrainingSampleStore {
    path: PathBuf,
}

impl TrainingSampleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Remove the file; returns whether there was one
    pub fn delete(&self) -> Result<bool, StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Deleted sample file {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Append one line for `sample`
    pub fn append(&self, sample: &TrainingSample, region: &SourceRegion) -> Result<(), StorageError> {
        if sample.pixels.is_empty() {
            return Err(StorageError::Serialization("sample has no pixels".to_string()));
        }
        if !label_in_range(sample.label) {
            return Err(StorageError::Serialization(format!(
                "label {} is outside 0..=100",
                sample.label
            )));
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let line = format_line(sample, region);
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!(
            "Appended sample label {} with {} pixels to {}",
            sample.label,
            sample.pixels.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Every sample in the file; fails as a whole if any line disagrees on
    /// pixel count or cannot be parsed
    pub fn load_all(&self) -> Result<Vec<TrainingSample>, StorageError> {
        Ok(self.load_records()?.into_iter().map(|r| r.sample).collect())
    }

    /// Like `load_all`, keeping each line's region
    pub fn load_records(&self) -> Result<Vec<SampleRecord>, StorageError> {
        let content = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(self.path.display().to_string()),
            _ => e.into(),
        })?;

        let mut records = Vec::new();
        let mut expected: Option<usize> = None;

        for (idx, line) in content.lines().enumerate() {
            let line_no = idx + 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = parse_line(line, line_no)?;

            let actual = record.sample.pixels.len();
            match expected {
                None => expected = Some(actual),
                Some(expected) if expected != actual => {
                    warn!(
                        "{} line {}: {} pixels, expected {}",
                        self.path.display(),
                        line_no,
                        actual,
                        expected
                    );
                    return Err(StorageError::SchemaMismatch {
                        line: line_no,
                        expected,
                        actual,
                    });
                }
                Some(_) => {}
            }
            records.push(record);
        }

        info!("Loaded {} samples from {}", records.len(), self.path.display());
        Ok(records)
    }
}

fn format_line(sample: &TrainingSample, region: &SourceRegion) -> String {
    let mut line = format!(
        "{};{};{};{},{}",
        region.x, region.y, region.width, region.height, sample.label
    );
    for pixel in sample.pixels.as_slice() {
        line.push(',');
        line.push_str(&pixel.to_string());
    }
    line.push('\n');
    line
}

fn label_in_range(label: f64) -> bool {
    (0.0..=100.0).contains(&label)
}

fn parse_line(line: &str, line_no: usize) -> Result<SampleRecord, StorageError> {
    let parse_err = |what: String| StorageError::Parse(format!("line {}: {}", line_no, what));

    let mut fields = line.trim_end().split(',');
    let header = fields.next().unwrap_or_default();
    let geometry = header
        .split(';')
        .map(|v| v.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_err(format!("bad region {:?}: {}", header, e)))?;

    // Older files also carried the processed width and height in front
    let region = match geometry.as_slice() {
        [x, y, width, height] | [_, _, x, y, width, height] => SourceRegion {
            x: *x,
            y: *y,
            width: *width,
            height: *height,
        },
        _ => {
            return Err(parse_err(format!(
                "region needs 4 fields, got {}",
                geometry.len()
            )))
        }
    };

    let label_field = fields.next().ok_or_else(|| parse_err("missing label".to_string()))?;
    let label = label_field
        .trim()
        .parse::<f64>()
        .map_err(|e| parse_err(format!("bad label {:?}: {}", label_field, e)))?;
    if !label_in_range(label) {
        return Err(parse_err(format!("label {} is outside 0..=100", label)));
    }

    let pixels = fields
        .map(|v| v.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| parse_err(format!("bad pixel: {}", e)))?;
    if pixels.is_empty() {
        return Err(parse_err("no pixels".to_string()));
    }

    Ok(SampleRecord {
        region,
        sample: TrainingSample::new(GrayRow(pixels), label),
    })
}
