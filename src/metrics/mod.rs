//! MOTChallenge metrics evaluation module.
//!
//! This module provides tools for evaluating multi-object tracking performance
//! using the MOTChallenge benchmark format. It includes:
//!
//! - `InformationFile` / `SequenceInfo` - Parse seqinfo.ini metadata files
//! - `read_mot_file` - Parse ground truth, detection and result files
//! - `PredictionsTextFile` - Write tracking results in MOT format
//! - `Evaluator` - Score one sequence (MOTA, MOTP, IDF1, ...)
//! - `Summary` - Per-sequence rows plus the OVERALL row, rendered as a table

mod evaluation;
mod information_file;
mod mot_file;
mod predictions;
mod summary;

pub use crate::internal::motmetrics::{EventType, MOTAccumulator, MOTMetrics};
pub use evaluation::{Evaluator, MAX_IOU_DISTANCE};
pub use information_file::{InformationFile, SequenceInfo, DEFAULT_FRAME_RATE};
pub use mot_file::{
    parse_mot_str, read_mot_file, FrameMap, MotFileKind, MotRecord, IGNORE_CLASSES,
    PEDESTRIAN_CLASS,
};
pub use predictions::PredictionsTextFile;
pub use summary::{Summary, SummaryRow, COLUMNS, OVERALL};
