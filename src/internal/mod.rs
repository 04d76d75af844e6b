//! Internal modules adapted from external libraries.
//!
//! These modules contain code adapted from:
//! - scipy: Linear sum assignment
//! - motmetrics: MOTChallenge event accumulation and metrics

pub mod scipy;
pub mod motmetrics;
