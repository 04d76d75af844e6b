//! MOTChallenge seqinfo.ini parser.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Frame rate assumed when a sequence has no `seqinfo.ini`.
pub const DEFAULT_FRAME_RATE: u32 = 30;

/// Parser for MOTChallenge seqinfo.ini files.
///
/// These files contain metadata about video sequences in the format:
/// ```ini
/// [Sequence]
/// name=MOT17-02-FRCNN
/// imDir=img1
/// frameRate=30
/// seqLength=600
/// imWidth=1920
/// imHeight=1080
/// imExt=.jpg
/// ```
#[derive(Debug)]
pub struct InformationFile {
    path: PathBuf,
    entries: Vec<(String, String)>,
}

impl InformationFile {
    /// Read and parse the given file.
    pub fn new<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("failed to open information file {:?}: {}", path, e),
            ))
        })?;
        Ok(Self::parse(path, &content))
    }

    fn parse(path: PathBuf, content: &str) -> Self {
        let entries = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(['[', ';', '#']))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self { path, entries }
    }

    /// Look up a key (e.g. "seqLength", "frameRate").
    pub fn search(&self, variable_name: &str) -> Result<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == variable_name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| {
                Error::MetricsError(format!(
                    "couldn't find '{}' in {:?}",
                    variable_name, self.path
                ))
            })
    }

    /// Look up a key and parse it as an unsigned integer.
    pub fn search_int(&self, variable_name: &str) -> Result<u32> {
        let value = self.search(variable_name)?;
        value.parse().map_err(|e| {
            Error::MetricsError(format!(
                "value for '{}' in {:?} is not an integer: {}",
                variable_name, self.path, e
            ))
        })
    }
}

/// Sequence metadata used by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceInfo {
    pub image_dir: String,
    pub frame_rate: u32,
    pub seq_length: usize,
    pub image_ext: String,
}

impl SequenceInfo {
    /// Read `<sequence_dir>/seqinfo.ini`.
    ///
    /// `frameRate` and `seqLength` are required; the other keys fall back to
    /// the MOTChallenge defaults (`img1`, `.jpg`).
    pub fn from_sequence_dir(sequence_dir: &Path) -> Result<Self> {
        let info = InformationFile::new(sequence_dir.join("seqinfo.ini"))?;
        Ok(Self {
            image_dir: info.search("imDir").unwrap_or("img1").to_string(),
            frame_rate: info.search_int("frameRate")?,
            seq_length: info.search_int("seqLength")? as usize,
            image_ext: info.search("imExt").unwrap_or(".jpg").to_string(),
        })
    }
}
