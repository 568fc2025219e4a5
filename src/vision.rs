//! Capture, detection and display seams.
//!
//! Video capture, inference and rendering live outside this crate. The
//! pipeline talks to them through [`FrameSource`], [`Detector`] and
//! [`FrameSink`]. This module also provides the replay back end used by the
//! command-line tool and the tests: a JSON-lines recording of detections,
//! one captured frame per line, with `null` standing for a capture timeout.
//!
//! ```text
//! {"width":800,"height":600,"detections":[{"left":10,"top":20,"right":110,"bottom":220,"confidence":0.9}]}
//! null
//! {"width":800,"height":600,"detections":[]}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Detection;

// =============================================================================
// Traits
// =============================================================================

/// Produces captured images.
pub trait FrameSource {
    type Image;

    /// Capture the next image. `Ok(None)` means the capture timed out, or
    /// that the stream has ended if [`is_streaming`](Self::is_streaming)
    /// now returns false.
    fn capture(&mut self) -> Result<Option<Self::Image>>;

    /// False once the input has reached end of stream.
    fn is_streaming(&self) -> bool;

    /// Pixel size of a captured image, if the source knows it.
    fn frame_size(&self, _image: &Self::Image) -> Option<(u32, u32)> {
        None
    }
}

/// Runs object detection on an image.
pub trait Detector<I> {
    fn detect(&mut self, image: &I) -> Result<Vec<Detection>>;

    /// Inference rate reported by the network, if known.
    fn network_fps(&self) -> Option<f32> {
        None
    }
}

/// Displays or records processed images.
pub trait FrameSink<I> {
    fn render(&mut self, image: &I) -> Result<()>;

    /// Replace the status line (window title, log line, ...).
    fn set_status(&mut self, status: &str) -> Result<()>;

    /// False once the output has been closed.
    fn is_streaming(&self) -> bool {
        true
    }
}

// =============================================================================
// Replay source
// =============================================================================

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Zero-based position among captured frames (timeouts excluded).
    #[serde(skip)]
    pub index: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Reads a JSON-lines detection recording.
pub struct ReplaySource<R> {
    reader: R,
    name: String,
    line_no: usize,
    captured: u64,
    ended: bool,
    line: String,
}

impl ReplaySource<BufReader<File>> {
    /// Open a recording file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::context(format!("opening {}", path.display()), e))?;
        log::info!("Replaying detections from {}", path.display());
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead> ReplaySource<R> {
    /// Read a recording from any buffered reader. `name` is used in errors.
    pub fn from_reader(reader: R, name: impl Into<String>) -> Self {
        Self {
            reader,
            name: name.into(),
            line_no: 0,
            captured: 0,
            ended: false,
            line: String::new(),
        }
    }

    /// Frames returned so far.
    pub fn captured(&self) -> u64 {
        self.captured
    }
}

impl<R: BufRead> FrameSource for ReplaySource<R> {
    type Image = ReplayFrame;

    fn frame_size(&self, image: &ReplayFrame) -> Option<(u32, u32)> {
        Some((image.width, image.height))
    }

    fn capture(&mut self) -> Result<Option<ReplayFrame>> {
        if self.ended {
            return Ok(None);
        }
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line).map_err(Error::capture)?;
            if n == 0 {
                log::debug!("{}: end of recording after {} frame(s)", self.name, self.captured);
                self.ended = true;
                return Ok(None);
            }
            self.line_no += 1;
            let text = self.line.trim();
            if text.is_empty() {
                continue;
            }
            let frame: Option<ReplayFrame> = serde_json::from_str(text)
                .map_err(|e| Error::config(format!("{} line {}", self.name, self.line_no), e))?;
            return Ok(frame.map(|mut f| {
                f.index = self.captured;
                self.captured += 1;
                f
            }));
        }
    }

    fn is_streaming(&self) -> bool {
        !self.ended
    }
}

// =============================================================================
// Replay detector
// =============================================================================

/// Passes recorded detections through, dropping those below a threshold.
#[derive(Debug, Clone)]
pub struct ReplayDetector {
    threshold: f32,
}

impl ReplayDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Detector<ReplayFrame> for ReplayDetector {
    fn detect(&mut self, image: &ReplayFrame) -> Result<Vec<Detection>> {
        Ok(image
            .detections
            .iter()
            .filter(|d| d.confidence >= self.threshold)
            .copied()
            .collect())
    }
}

// =============================================================================
// Sinks
// =============================================================================

/// Logs status lines; renders nothing.
#[derive(Debug, Default)]
pub struct LogSink {
    rendered: u64,
    status: String,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

impl<I> FrameSink<I> for LogSink {
    fn render(&mut self, _image: &I) -> Result<()> {
        self.rendered += 1;
        Ok(())
    }

    fn set_status(&mut self, status: &str) -> Result<()> {
        if status != self.status {
            log::debug!("{}", status);
            self.status.clear();
            self.status.push_str(status);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RenderRecord {
    frame: u64,
    width: u32,
    height: u32,
    detections: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    overlay: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
}

/// Writes one JSON line per rendered replay frame.
///
/// A record is held back until its status line arrives, so each line carries
/// the status set right after rendering it. Call [`JsonlSink::finish`] when
/// done; a record still held back is otherwise lost.
pub struct JsonlSink<W: Write> {
    writer: W,
    pending: Option<RenderRecord>,
    overlay: Option<String>,
    written: u64,
}

impl JsonlSink<std::io::BufWriter<File>> {
    /// Create (or truncate) an output file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .map_err(|e| Error::context(format!("creating {}", path.display()), e))?;
        Ok(Self::new(std::io::BufWriter::new(file)))
    }
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pending: None,
            overlay: None,
            written: 0,
        }
    }

    /// Tag every record with detection overlay flags such as
    /// `box,labels,conf`. Empty or `none` leaves records untagged.
    pub fn with_overlay(mut self, overlay: &str) -> Self {
        self.overlay = match overlay.trim() {
            "" | "none" => None,
            flags => Some(flags.to_string()),
        };
        self
    }

    /// Lines written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Write any held-back record and flush the writer.
    pub fn finish(&mut self) -> Result<()> {
        self.write_pending()?;
        self.writer.flush().map_err(Error::sink)
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.writer)
    }

    fn write_pending(&mut self) -> Result<()> {
        if let Some(record) = self.pending.take() {
            let line = serde_json::to_string(&record)
                .map_err(|e| Error::sink(Error::config("render record", e)))?;
            writeln!(self.writer, "{}", line).map_err(Error::sink)?;
            self.written += 1;
        }
        Ok(())
    }
}

impl<W: Write> FrameSink<ReplayFrame> for JsonlSink<W> {
    fn render(&mut self, image: &ReplayFrame) -> Result<()> {
        self.write_pending()?;
        self.pending = Some(RenderRecord {
            frame: image.index,
            width: image.width,
            height: image.height,
            detections: image.detections.len(),
            overlay: self.overlay.clone(),
            status: None,
        });
        Ok(())
    }

    fn set_status(&mut self, status: &str) -> Result<()> {
        if let Some(record) = self.pending.as_mut() {
            record.status = Some(status.to_string());
        }
        self.write_pending()
    }
}
