//! # mot-eval - MOTChallenge evaluation harness
//!
//! Fetches a MOTChallenge-style benchmark, runs a tracking model over its
//! sequences and scores the produced result files with the CLEAR-MOT and
//! identity metrics.
//!
//! ## Features
//!
//! - Dataset download and extraction with an idempotent `exist_ok` mode
//! - Pluggable tracking models behind [`TrackingModel`], loaded from a checkpoint
//! - One MOT-format result file per sequence, with typed per-sequence failures
//! - MOTA, MOTP, IDF1/IDP/IDR, MT/PT/ML, fragmentations and ID transfer counts
//! - Fixed-width summary table with a weighted OVERALL row
//!
//! ## Example
//!
//! ```rust,ignore
//! use mot_eval::{load_model, SequenceRunner, TrackingParams};
//!
//! let mut model = load_model("checkpoints/iou.json")?;
//! let runner = SequenceRunner::new("MOT17/train", "results", "baseline", TrackingParams::default())?;
//! let report = runner.run(model.as_mut(), &["MOT17-02-SDP".to_string()]);
//! println!("{}", report.summary());
//! ```

// Internal modules (ports of scipy, motmetrics)
pub(crate) mod internal;

// Public modules
pub mod config;
pub mod dataset;
pub mod detection;
pub mod metrics;
pub mod model;
pub mod runner;

// Re-exports for convenience
pub use config::RunConfig;
pub use dataset::{fetch_dataset, DatasetLayout};
pub use detection::{BoundingBox, Detection};
pub use metrics::{Evaluator, MOTMetrics, Summary, SummaryRow};
pub use model::{load_model, Frame, SequenceContext, Track, TrackingModel};
pub use runner::{
    EvalStatus, RunReport, SequenceError, SequenceOutcome, SequenceReport, SequenceRunner,
    TrackingParams,
};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use std::path::PathBuf;
    use thiserror::Error;

    /// Errors that can occur in the evaluation harness
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Failed to fetch {url}: {reason}")]
        Fetch { url: String, reason: String },

        #[error("Corrupt archive {path:?}: {reason}")]
        Archive { path: PathBuf, reason: String },

        #[error("Unexpected dataset layout: {0}")]
        DatasetLayout(String),

        #[error("Failed to load checkpoint {path:?}: {reason}")]
        Checkpoint { path: PathBuf, reason: String },

        #[error("Parse error in {path:?} line {line}: {reason}")]
        Parse {
            path: PathBuf,
            line: usize,
            reason: String,
        },

        #[error("Frame {frame} written after frame {previous} in {path:?}")]
        FrameOrder {
            path: PathBuf,
            frame: u32,
            previous: u32,
        },

        #[error("Metrics evaluation error: {0}")]
        MetricsError(String),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),
    }

    /// Result type for harness operations
    pub type Result<T> = std::result::Result<T, Error>;
}
