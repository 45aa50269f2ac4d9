//! Write-only sink for raw inbound frames.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Records every raw inbound text frame, in arrival order.
pub trait FrameLog: Send + Sync {
    fn record(&self, frame: &str) -> io::Result<()>;
}

/// Writes one frame per line.
///
/// Frames that span several lines are compacted first; anything that is not
/// JSON is written as a JSON string so the file stays one frame per line.
pub struct JsonLinesFrameLog<W: Write + Send = BufWriter<File>> {
    writer: Mutex<W>,
}

impl JsonLinesFrameLog<BufWriter<File>> {
    /// Append to the file at `path`, creating it if needed.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> JsonLinesFrameLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> FrameLog for JsonLinesFrameLog<W> {
    fn record(&self, frame: &str) -> io::Result<()> {
        let line = if frame.contains('\n') {
            match serde_json::from_str::<serde_json::Value>(frame) {
                Ok(value) => value.to_string(),
                Err(_) => serde_json::Value::String(frame.to_string()).to_string(),
            }
        } else {
            frame.to_string()
        };

        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl<W: Write + Send> std::fmt::Debug for JsonLinesFrameLog<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesFrameLog").finish_non_exhaustive()
    }
}
