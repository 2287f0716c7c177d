//! Result reader: host view of a completed `y` plus timing

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use log::info;
use serde::Serialize;

use crate::device::Accelerator;
use crate::error::{DeviceError, SpmvError};
use crate::marshal::MatrixBuffers;
use crate::matrix::config::PREVIEW_LEN;
use crate::matrix::FormatTag;

/// Output of one SpMV invocation
#[derive(Debug, Clone, PartialEq)]
pub struct SpmvResult {
    format: FormatTag,
    y: Vec<f32>,
    elapsed: Duration,
    preview_len: usize,
}

#[derive(Serialize)]
struct ExportRecord<'a> {
    format: &'a str,
    num_rows: usize,
    elapsed_ms: f64,
    y: &'a [f32],
}

impl SpmvResult {
    /// Wraps an already materialized output vector
    pub fn new(format: FormatTag, y: Vec<f32>, elapsed: Duration) -> Self {
        Self {
            format,
            y,
            elapsed,
            preview_len: PREVIEW_LEN,
        }
    }

    /// Sets how many entries `preview` shows
    pub fn with_preview_len(mut self, preview_len: usize) -> Self {
        self.preview_len = preview_len;
        self
    }

    /// Reads `y` back from a completed invocation
    pub(crate) fn read_back<A>(
        accelerator: &A,
        buffers: &MatrixBuffers<A::Buffer>,
        format: FormatTag,
        elapsed: Duration,
    ) -> Result<Self, DeviceError>
    where
        A: Accelerator + ?Sized,
    {
        let y = accelerator.read_buffer(buffers.output(), buffers.output_len())?;
        Ok(Self::new(format, y, elapsed))
    }

    /// Layout that produced this result
    pub fn format(&self) -> FormatTag {
        self.format
    }

    /// The full output vector
    pub fn y(&self) -> &[f32] {
        &self.y
    }

    /// Consumes the result, returning `y`
    pub fn into_y(self) -> Vec<f32> {
        self.y
    }

    /// Time between command submission and completion
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// First `min(preview_len, num_rows)` entries; ten unless configured
    pub fn preview(&self) -> &[f32] {
        self.head(self.preview_len)
    }

    /// First `min(n, num_rows)` entries
    pub fn head(&self, n: usize) -> &[f32] {
        &self.y[..n.min(self.y.len())]
    }

    /// Writes format, timing and the full `y` as JSON
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<(), SpmvError> {
        let path = path.as_ref();
        let export_error = |message: String| SpmvError::Export {
            path: path.to_path_buf(),
            message,
        };

        let record = ExportRecord {
            format: self.format.as_str(),
            num_rows: self.y.len(),
            elapsed_ms: self.elapsed_ms(),
            y: &self.y,
        };

        let file = File::create(path).map_err(|e| export_error(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &record)
            .map_err(|e| export_error(e.to_string()))?;
        writer.flush().map_err(|e| export_error(e.to_string()))?;

        info!("exported {} result to {}", self.format, path.display());
        Ok(())
    }
}
