//! MOTChallenge predictions file writer.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::model::Track;
use crate::{Error, Result};

/// Writer for tracking predictions in MOTChallenge format.
///
/// The output format is CSV with columns:
/// `frame,id,bb_left,bb_top,bb_width,bb_height,score,-1,-1,-1`
///
/// Rows within a frame are sorted by id; frames must be written in increasing order.
pub struct PredictionsTextFile {
    path: PathBuf,
    writer: BufWriter<File>,
    last_frame: Option<u32>,
    num_rows: usize,
}

impl PredictionsTextFile {
    /// Create the output file, creating parent directories as needed.
    ///
    /// An existing file is replaced, with a warning.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(std::io::Error::new(
                    e.kind(),
                    format!("failed to create results folder {:?}: {}", parent, e),
                ))
            })?;
        }
        if path.exists() {
            warn!(path = %path.display(), "overwriting existing result file");
        }

        let file = File::create(&path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to create output file {:?}: {}", path, e),
            ))
        })?;

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            last_frame: None,
            num_rows: 0,
        })
    }

    /// Number of rows written so far.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Write the tracks of one frame.
    pub fn write_frame(&mut self, frame: u32, tracks: &[Track]) -> Result<()> {
        if self.last_frame.is_some_and(|last| frame <= last) {
            return Err(Error::FrameOrder {
                path: self.path.clone(),
                frame,
                previous: self.last_frame.unwrap_or_default(),
            });
        }
        self.last_frame = Some(frame);

        let mut sorted: Vec<&Track> = tracks.iter().collect();
        sorted.sort_by_key(|t| t.id);

        for track in sorted {
            let b = &track.bbox;
            writeln!(
                self.writer,
                "{},{},{:.2},{:.2},{:.2},{:.2},{:.2},-1,-1,-1",
                frame, track.id, b.x, b.y, b.width, b.height, track.score
            )?;
            self.num_rows += 1;
        }
        Ok(())
    }

    /// Flush and close the file.
    pub fn finish(mut self) -> Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}
