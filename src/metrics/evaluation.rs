//! MOTChallenge evaluation of one sequence.

use std::collections::BTreeSet;
use std::path::Path;

use nalgebra::DMatrix;
use tracing::debug;

use super::mot_file::{read_mot_file, FrameMap, MotFileKind, MotRecord};
use crate::detection::BoundingBox;
use crate::internal::motmetrics::{iou_distance_matrix, MOTAccumulator, MOTMetrics};
use crate::internal::scipy::linear_sum_assignment;
use crate::Result;

/// Maximum IoU distance (`1 - IoU`) for a prediction to match a ground truth box.
pub const MAX_IOU_DISTANCE: f64 = 0.5;

/// Scores tracking results of one sequence against its ground truth.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    gt_frames: FrameMap,
    ignore_frames: FrameMap,
}

impl Evaluator {
    /// Load ground truth and ignore regions from a `gt.txt` file.
    pub fn new<P: AsRef<Path>>(gt_path: P) -> Result<Self> {
        let gt_path = gt_path.as_ref();
        Ok(Self {
            gt_frames: read_mot_file(gt_path, MotFileKind::GroundTruth)?,
            ignore_frames: read_mot_file(gt_path, MotFileKind::IgnoreRegions)?,
        })
    }

    /// Build an evaluator from already parsed frames.
    pub fn from_frames(gt_frames: FrameMap, ignore_frames: FrameMap) -> Self {
        Self {
            gt_frames,
            ignore_frames,
        }
    }

    /// Evaluate a results file.
    pub fn eval_file<P: AsRef<Path>>(&self, results_path: P) -> Result<MOTMetrics> {
        let results = read_mot_file(results_path, MotFileKind::Results)?;
        Ok(self.eval_frames(&results))
    }

    /// Evaluate parsed results over the union of ground truth and result frames.
    pub fn eval_frames(&self, results: &FrameMap) -> MOTMetrics {
        let frames: BTreeSet<u32> = self
            .gt_frames
            .keys()
            .chain(results.keys())
            .copied()
            .collect();

        let mut acc = MOTAccumulator::new();
        for frame in frames {
            let gt = self.gt_frames.get(&frame).map(Vec::as_slice).unwrap_or(&[]);
            let ignore = self.ignore_frames.get(&frame).map(Vec::as_slice).unwrap_or(&[]);
            let predictions = results.get(&frame).map(Vec::as_slice).unwrap_or(&[]);

            let kept = drop_ignored(ignore, predictions);
            if kept.len() < predictions.len() {
                debug!(frame, dropped = predictions.len() - kept.len(), "predictions in ignore regions");
            }

            let gt_ids: Vec<i32> = gt.iter().map(|r| r.id).collect();
            let hyp_ids: Vec<i32> = kept.iter().map(|r| r.id).collect();
            let distances = iou_distance_matrix(&boxes(gt), &boxes(&kept), MAX_IOU_DISTANCE);

            acc.update(frame as i32, &gt_ids, &hyp_ids, &distances);
        }

        acc.compute_metrics()
    }
}

fn boxes(records: &[MotRecord]) -> Vec<BoundingBox> {
    records.iter().map(|r| r.bbox).collect()
}

/// Remove predictions assigned to an ignore region.
fn drop_ignored(ignore: &[MotRecord], predictions: &[MotRecord]) -> Vec<MotRecord> {
    if ignore.is_empty() || predictions.is_empty() {
        return predictions.to_vec();
    }

    let distances: DMatrix<f64> =
        iou_distance_matrix(&boxes(ignore), &boxes(predictions), MAX_IOU_DISTANCE);
    let mut keep = vec![true; predictions.len()];
    for a in linear_sum_assignment(&distances, f64::INFINITY).assignments {
        keep[a.col_idx] = false;
    }

    predictions
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}
