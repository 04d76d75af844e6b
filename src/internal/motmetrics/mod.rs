//! MOTChallenge metrics port.
//!
//! Event semantics from py-motmetrics
//! License: MIT

mod accumulator;
mod iou;

pub use accumulator::*;
pub use iou::*;
