//! Per-sequence inference and evaluation.
//!
//! Sequences are processed one at a time, in the given order. A failing
//! sequence is recorded as a [`SequenceError`] in its [`SequenceOutcome`] and the
//! run moves on; the produced result files are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};

use crate::metrics::{
    Evaluator, MOTMetrics, PredictionsTextFile, SequenceInfo, Summary, DEFAULT_FRAME_RATE,
};
use crate::model::{Frame, SequenceContext, Track, TrackingModel};
use crate::{Error, Result};

/// Inference parameters shared by all sequences of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingParams {
    /// Minimum detection confidence, in [0, 1].
    pub conf_thres: f64,
    /// Frames a lost track is kept, at 30 fps.
    pub track_buffer: u32,
    /// Tracks with a smaller box area are not written.
    pub min_box_area: f64,
    /// Tracks wider than `vertical_ratio` times their height are not written.
    pub vertical_ratio: f64,
}

impl Default for TrackingParams {
    fn default() -> Self {
        Self {
            conf_thres: 0.4,
            track_buffer: 30,
            min_box_area: 100.0,
            vertical_ratio: 1.6,
        }
    }
}

impl TrackingParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.conf_thres) {
            return Err(Error::InvalidConfig(format!(
                "conf_thres must be in [0, 1], got {}",
                self.conf_thres
            )));
        }
        if self.track_buffer == 0 {
            return Err(Error::InvalidConfig(
                "track_buffer must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Track buffer scaled to the sequence frame rate, at least one frame.
    pub fn buffer_size(&self, frame_rate: u32) -> u32 {
        let scaled = frame_rate as f64 / 30.0 * self.track_buffer as f64;
        (scaled as u32).max(1)
    }

    /// Whether a track passes the box area and aspect ratio filters.
    pub fn keep(&self, track: &Track) -> bool {
        track.bbox.area() > self.min_box_area && track.bbox.aspect_ratio() <= self.vertical_ratio
    }
}

/// Why a sequence produced no result.
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence directory {0:?} not found")]
    MissingSequence(PathBuf),

    #[error("cannot read sequence metadata: {0}")]
    Metadata(#[source] Error),

    #[error("inference failed: {0}")]
    Inference(#[source] Error),

    #[error("cannot write results: {0}")]
    Output(#[source] Error),

    #[error("result file {0:?} not found")]
    MissingResults(PathBuf),
}

/// Outcome of evaluating one result file.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalStatus {
    /// Evaluation was not requested.
    Skipped,
    Evaluated(MOTMetrics),
    MissingGroundTruth(PathBuf),
    Failed(String),
}

/// A sequence that produced a result file.
#[derive(Debug, Clone)]
pub struct SequenceReport {
    pub result_path: PathBuf,
    pub num_frames: usize,
    pub num_rows: usize,
    pub elapsed: Duration,
    pub eval: EvalStatus,
}

impl SequenceReport {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.num_frames as f64 / secs
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
pub struct SequenceOutcome {
    pub name: String,
    pub result: std::result::Result<SequenceReport, SequenceError>,
}

/// All outcomes of a run, in sequence order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<SequenceOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &SequenceReport)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|r| (o.name.as_str(), r)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &SequenceError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }

    pub fn result_files(&self) -> Vec<&Path> {
        self.succeeded().map(|(_, r)| r.result_path.as_path()).collect()
    }

    pub fn total_frames(&self) -> usize {
        self.succeeded().map(|(_, r)| r.num_frames).sum()
    }

    pub fn total_elapsed(&self) -> Duration {
        self.succeeded().map(|(_, r)| r.elapsed).sum()
    }

    /// Summary over the sequences that were evaluated.
    pub fn summary(&self) -> Summary {
        Summary::from_sequences(self.succeeded().filter_map(|(name, r)| match &r.eval {
            EvalStatus::Evaluated(m) => Some((name.to_string(), m.clone())),
            _ => None,
        }))
    }
}

/// Runs a model over the sequences of a dataset split.
///
/// Results go to `<output_dir>/<exp_name>/<sequence>.txt`.
#[derive(Debug, Clone)]
pub struct SequenceRunner {
    data_root: PathBuf,
    result_dir: PathBuf,
    exp_name: String,
    params: TrackingParams,
    run_eval: bool,
}

impl SequenceRunner {
    /// Fails on invalid `params` or an `exp_name` that is not a plain directory name.
    pub fn new<P1, P2>(
        data_root: P1,
        output_dir: P2,
        exp_name: &str,
        params: TrackingParams,
    ) -> Result<Self>
    where
        P1: Into<PathBuf>,
        P2: AsRef<Path>,
    {
        validate_exp_name(exp_name)?;
        params.validate()?;
        Ok(Self {
            data_root: data_root.into(),
            result_dir: output_dir.as_ref().join(exp_name),
            exp_name: exp_name.to_string(),
            params,
            run_eval: true,
        })
    }

    /// Whether each sequence is evaluated right after inference.
    pub fn with_eval(mut self, run_eval: bool) -> Self {
        self.run_eval = run_eval;
        self
    }

    pub fn result_dir(&self) -> &Path {
        &self.result_dir
    }

    pub fn result_path(&self, sequence: &str) -> PathBuf {
        self.result_dir.join(format!("{}.txt", sequence))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.result_dir.join(format!("summary_{}.txt", self.exp_name))
    }

    /// Run inference (and evaluation, if enabled) on every sequence.
    pub fn run(&self, model: &mut dyn TrackingModel, sequences: &[String]) -> RunReport {
        let mut report = RunReport::default();

        for name in sequences {
            info!(sequence = %name, model = model.name(), "start sequence");
            let result = self.run_sequence(model, name);
            match &result {
                Ok(r) => info!(
                    sequence = %name,
                    frames = r.num_frames,
                    rows = r.num_rows,
                    fps = %format!("{:.2}", r.fps()),
                    "finished sequence"
                ),
                Err(e) => warn!(sequence = %name, error = %e, "skipping sequence"),
            }
            report.outcomes.push(SequenceOutcome {
                name: name.clone(),
                result,
            });
        }

        let total_secs = report.total_elapsed().as_secs_f64();
        if total_secs > 0.0 {
            info!(
                elapsed = %format!("{:.2}s", total_secs),
                fps = %format!("{:.2}", report.total_frames() as f64 / total_secs),
                "run complete"
            );
        }
        report
    }

    fn run_sequence(
        &self,
        model: &mut dyn TrackingModel,
        name: &str,
    ) -> std::result::Result<SequenceReport, SequenceError> {
        let dir = self.data_root.join(name);
        if !dir.is_dir() {
            return Err(SequenceError::MissingSequence(dir));
        }

        let (frame_rate, frames) = sequence_frames(&dir).map_err(SequenceError::Metadata)?;
        let ctx = SequenceContext {
            name: name.to_string(),
            dir: dir.clone(),
            frame_rate,
            seq_length: frames.len(),
            conf_thres: self.params.conf_thres,
            buffer_size: self.params.buffer_size(frame_rate),
        };
        model.start_sequence(&ctx).map_err(SequenceError::Inference)?;

        let result_path = self.result_path(name);
        let mut out = PredictionsTextFile::create(&result_path).map_err(SequenceError::Output)?;

        let start = Instant::now();
        for frame in &frames {
            let tracks: Vec<Track> = model
                .step(frame)
                .map_err(SequenceError::Inference)?
                .into_iter()
                .filter(|t| self.params.keep(t))
                .collect();
            out.write_frame(frame.index, &tracks)
                .map_err(SequenceError::Output)?;
        }
        let elapsed = start.elapsed();
        let num_rows = out.num_rows();
        let result_path = out.finish().map_err(SequenceError::Output)?;

        let eval = if self.run_eval {
            evaluate_sequence(&dir, &result_path)
        } else {
            EvalStatus::Skipped
        };

        Ok(SequenceReport {
            result_path,
            num_frames: frames.len(),
            num_rows,
            elapsed,
            eval,
        })
    }

    /// Evaluate result files already written for this experiment, without inference.
    pub fn evaluate(&self, sequences: &[String]) -> RunReport {
        let outcomes = sequences
            .iter()
            .map(|name| {
                let result_path = self.result_path(name);
                let dir = self.data_root.join(name);
                let result = if !dir.is_dir() {
                    Err(SequenceError::MissingSequence(dir))
                } else if !result_path.is_file() {
                    Err(SequenceError::MissingResults(result_path))
                } else {
                    let eval = evaluate_sequence(&dir, &result_path);
                    let num_frames = match &eval {
                        EvalStatus::Evaluated(m) => m.num_frames,
                        _ => 0,
                    };
                    Ok(SequenceReport {
                        result_path,
                        num_frames,
                        num_rows: 0,
                        elapsed: Duration::ZERO,
                        eval,
                    })
                };
                if let Err(e) = &result {
                    warn!(sequence = %name, error = %e, "skipping sequence");
                }
                SequenceOutcome {
                    name: name.clone(),
                    result,
                }
            })
            .collect();
        RunReport { outcomes }
    }

    /// Write the rendered summary next to the result files.
    pub fn save_summary(&self, summary: &Summary) -> Result<PathBuf> {
        fs::create_dir_all(&self.result_dir)?;
        let path = self.summary_path();
        fs::write(&path, summary.render())?;
        Ok(path)
    }
}

pub(crate) fn validate_exp_name(exp_name: &str) -> Result<()> {
    if exp_name.trim().is_empty() {
        return Err(Error::InvalidConfig("exp_name must not be empty".to_string()));
    }
    if exp_name.contains(['/', '\\']) || exp_name == "." || exp_name == ".." {
        return Err(Error::InvalidConfig(format!(
            "exp_name must be a plain directory name, got {:?}",
            exp_name
        )));
    }
    Ok(())
}

/// Score a result file against `<sequence_dir>/gt/gt.txt`.
pub fn evaluate_sequence(sequence_dir: &Path, result_path: &Path) -> EvalStatus {
    let gt_path = sequence_dir.join("gt").join("gt.txt");
    if !gt_path.is_file() {
        warn!(path = %gt_path.display(), "no ground truth, sequence left out of the summary");
        return EvalStatus::MissingGroundTruth(gt_path);
    }

    match Evaluator::new(&gt_path).and_then(|ev| ev.eval_file(result_path)) {
        Ok(metrics) => EvalStatus::Evaluated(metrics),
        Err(e) => {
            warn!(path = %result_path.display(), error = %e, "evaluation failed");
            EvalStatus::Failed(e.to_string())
        }
    }
}

/// Frame rate and ordered frames of a sequence.
///
/// Uses `seqinfo.ini` when present, otherwise the sorted contents of `img1/`.
fn sequence_frames(dir: &Path) -> Result<(u32, Vec<Frame>)> {
    if dir.join("seqinfo.ini").is_file() {
        let info = SequenceInfo::from_sequence_dir(dir)?;
        let image_dir = dir.join(&info.image_dir);
        let frames = (1..=info.seq_length as u32)
            .map(|index| Frame {
                index,
                image_path: image_dir.join(format!("{:06}{}", index, info.image_ext)),
            })
            .collect();
        return Ok((info.frame_rate, frames));
    }

    let image_dir = dir.join("img1");
    let mut images: Vec<PathBuf> = fs::read_dir(&image_dir)
        .map_err(|e| {
            Error::IoError(std::io::Error::new(
                e.kind(),
                format!("no seqinfo.ini and cannot list {:?}: {}", image_dir, e),
            ))
        })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    images.sort();

    let frames = images
        .into_iter()
        .enumerate()
        .map(|(i, image_path)| Frame {
            index: i as u32 + 1,
            image_path,
        })
        .collect();
    Ok((DEFAULT_FRAME_RATE, frames))
}
