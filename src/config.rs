//! Run configuration, loadable from JSON and overridable from the command line.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::runner::{validate_exp_name, SequenceRunner, TrackingParams};
use crate::{Error, Result};

/// Settings of one inference/evaluation run.
///
/// Missing JSON fields take their [`Default`] values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Split directory holding one sub-directory per sequence.
    pub data_root: PathBuf,
    pub output_dir: PathBuf,
    pub exp_name: String,
    pub sequences: Vec<String>,
    pub conf_thres: f64,
    pub track_buffer: u32,
    pub min_box_area: f64,
    pub vertical_ratio: f64,
    pub run_eval: bool,
    pub checkpoint: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        let params = TrackingParams::default();
        Self {
            data_root: PathBuf::new(),
            output_dir: PathBuf::from("results"),
            exp_name: "demo".to_string(),
            sequences: Vec::new(),
            conf_thres: params.conf_thres,
            track_buffer: params.track_buffer,
            min_box_area: params.min_box_area,
            vertical_ratio: params.vertical_ratio,
            run_eval: true,
            checkpoint: None,
        }
    }
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!("{}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        validate_exp_name(&self.exp_name)?;
        self.tracking_params().validate()
    }

    pub fn tracking_params(&self) -> TrackingParams {
        TrackingParams {
            conf_thres: self.conf_thres,
            track_buffer: self.track_buffer,
            min_box_area: self.min_box_area,
            vertical_ratio: self.vertical_ratio,
        }
    }

    /// Runner writing to `<output_dir>/<exp_name>/`.
    pub fn runner(&self) -> Result<SequenceRunner> {
        Ok(SequenceRunner::new(
            self.data_root.clone(),
            &self.output_dir,
            &self.exp_name,
            self.tracking_params(),
        )?
        .with_eval(self.run_eval))
    }
}
