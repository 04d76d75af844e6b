//! IoU (Intersection over Union) distances for MOT evaluation.

use nalgebra::DMatrix;

use crate::detection::BoundingBox;

/// Compute the IoU matrix between two sets of boxes, shape (n, m).
pub fn iou_matrix(boxes_a: &[BoundingBox], boxes_b: &[BoundingBox]) -> DMatrix<f64> {
    DMatrix::from_fn(boxes_a.len(), boxes_b.len(), |i, j| boxes_a[i].iou(&boxes_b[j]))
}

/// Compute the IoU distance matrix `1 - IoU` between objects and hypotheses.
///
/// Distances above `max_distance` are set to `NaN`, marking the pair as unmatchable.
/// With `max_distance = 0.5` only pairs with IoU >= 0.5 may be matched.
pub fn iou_distance_matrix(
    objects: &[BoundingBox],
    hypotheses: &[BoundingBox],
    max_distance: f64,
) -> DMatrix<f64> {
    iou_matrix(objects, hypotheses).map(|iou| {
        let d = 1.0 - iou;
        if d > max_distance {
            f64::NAN
        } else {
            d
        }
    })
}
