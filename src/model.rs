//! Tracking models and checkpoint loading.
//!
//! The harness only talks to a model through [`TrackingModel`]: it is reset at
//! the start of every sequence and then stepped once per frame, in order.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use serde::Deserialize;
use tracing::{debug, info};

use crate::detection::{BoundingBox, Detection};
use crate::internal::scipy::linear_sum_assignment;
use crate::metrics::{read_mot_file, FrameMap, MotFileKind};
use crate::{Error, Result};

/// One frame of a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// 1-based frame index
    pub index: u32,
    pub image_path: PathBuf,
}

/// What a model needs to know about the sequence it is about to process.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceContext {
    pub name: String,
    pub dir: PathBuf,
    pub frame_rate: u32,
    pub seq_length: usize,
    /// Minimum detection confidence
    pub conf_thres: f64,
    /// Frames a lost track is kept before it is dropped
    pub buffer_size: u32,
}

/// A tracked object reported for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Track {
    pub id: i32,
    pub bbox: BoundingBox,
    pub score: f64,
}

/// A multi-object tracker driven frame by frame.
pub trait TrackingModel {
    /// Architecture name, for logging.
    fn name(&self) -> &str;

    /// Reset all state for a new sequence.
    fn start_sequence(&mut self, ctx: &SequenceContext) -> Result<()>;

    /// Process the next frame and return the tracks visible in it.
    fn step(&mut self, frame: &Frame) -> Result<Vec<Track>>;
}

/// Checkpoint file contents, selected by the `arch` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "arch", rename_all = "snake_case")]
pub enum Checkpoint {
    Iou(IouTrackerConfig),
}

/// Load a model from a JSON checkpoint.
///
/// ```json
/// { "arch": "iou", "match_iou": 0.3, "min_hits": 2, "detections": "det/det.txt" }
/// ```
pub fn load_model<P: AsRef<Path>>(checkpoint_path: P) -> Result<Box<dyn TrackingModel>> {
    let path = checkpoint_path.as_ref();
    let checkpoint_error = |reason: String| Error::Checkpoint {
        path: path.to_path_buf(),
        reason,
    };

    let data = fs::read_to_string(path).map_err(|e| checkpoint_error(e.to_string()))?;
    let checkpoint: Checkpoint =
        serde_json::from_str(&data).map_err(|e| checkpoint_error(e.to_string()))?;

    let model: Box<dyn TrackingModel> = match checkpoint {
        Checkpoint::Iou(config) => {
            Box::new(IouTracker::new(config).map_err(|e| checkpoint_error(e.to_string()))?)
        }
    };
    info!(path = %path.display(), arch = model.name(), "loaded checkpoint");
    Ok(model)
}

fn default_match_iou() -> f64 {
    0.3
}

fn default_min_hits() -> u32 {
    1
}

fn default_detections() -> PathBuf {
    PathBuf::from("det/det.txt")
}

/// Configuration for the IoU tracker.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IouTrackerConfig {
    /// Minimum IoU between a track and a detection for them to match.
    #[serde(default = "default_match_iou")]
    pub match_iou: f64,

    /// Consecutive hits before a track gets a permanent ID and is reported.
    #[serde(default = "default_min_hits")]
    pub min_hits: u32,

    /// Detection file, relative to the sequence directory.
    #[serde(default = "default_detections")]
    pub detections: PathBuf,
}

impl Default for IouTrackerConfig {
    fn default() -> Self {
        Self {
            match_iou: default_match_iou(),
            min_hits: default_min_hits(),
            detections: default_detections(),
        }
    }
}

#[derive(Debug, Clone)]
struct TrackedBox {
    /// Permanent ID, assigned once the track is initialized
    id: Option<i32>,
    bbox: BoundingBox,
    score: f64,
    hits: u32,
    frames_since_update: u32,
}

impl TrackedBox {
    fn is_initializing(&self) -> bool {
        self.id.is_none()
    }
}

/// Tracker associating a sequence's public detections by box overlap.
///
/// Initialized tracks are matched first, initializing ones get the leftover
/// detections. Initializing tracks die on their first miss; initialized tracks
/// survive `buffer_size` consecutive misses.
#[derive(Debug)]
pub struct IouTracker {
    config: IouTrackerConfig,
    detections: FrameMap,
    conf_thres: f64,
    buffer_size: u32,
    tracks: Vec<TrackedBox>,
    instance_id_counter: i32,
}

impl IouTracker {
    pub fn new(config: IouTrackerConfig) -> Result<Self> {
        if !(config.match_iou > 0.0 && config.match_iou <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "match_iou must be in (0, 1], got {}",
                config.match_iou
            )));
        }
        if config.min_hits == 0 {
            return Err(Error::InvalidConfig("min_hits must be positive".to_string()));
        }

        Ok(Self {
            config,
            detections: FrameMap::new(),
            conf_thres: 0.0,
            buffer_size: 0,
            tracks: Vec::new(),
            instance_id_counter: 0,
        })
    }

    /// Reset state with already loaded detections.
    pub fn reset(&mut self, detections: FrameMap, conf_thres: f64, buffer_size: u32) {
        self.detections = detections;
        self.conf_thres = conf_thres;
        self.buffer_size = buffer_size;
        self.tracks.clear();
        self.instance_id_counter = 0;
    }

    /// Match tracks at `track_indices` against detections at `det_indices`.
    /// Returns the (track, detection) pairs and the unmatched detection indices.
    fn associate(
        &self,
        track_indices: &[usize],
        detections: &[Detection],
        det_indices: &[usize],
    ) -> (Vec<(usize, usize)>, Vec<usize>) {
        if track_indices.is_empty() || det_indices.is_empty() {
            return (Vec::new(), det_indices.to_vec());
        }

        let max_distance = 1.0 - self.config.match_iou;
        let costs = DMatrix::from_fn(track_indices.len(), det_indices.len(), |i, j| {
            let d = 1.0 - self.tracks[track_indices[i]].bbox.iou(&detections[det_indices[j]].bbox);
            if d <= max_distance {
                d
            } else {
                f64::NAN
            }
        });

        let result = linear_sum_assignment(&costs, max_distance);
        let matches = result
            .assignments
            .iter()
            .map(|a| (track_indices[a.row_idx], det_indices[a.col_idx]))
            .collect();
        let unmatched = result
            .unmatched_cols
            .iter()
            .map(|&j| det_indices[j])
            .collect();
        (matches, unmatched)
    }

    fn hit(&mut self, track_idx: usize, detection: &Detection) {
        let track = &mut self.tracks[track_idx];
        track.bbox = detection.bbox;
        track.score = detection.score;
        track.hits += 1;
        track.frames_since_update = 0;

        if track.is_initializing() && track.hits >= self.config.min_hits {
            self.instance_id_counter += 1;
            track.id = Some(self.instance_id_counter);
        }
    }
}

impl TrackingModel for IouTracker {
    fn name(&self) -> &str {
        "iou"
    }

    fn start_sequence(&mut self, ctx: &SequenceContext) -> Result<()> {
        let path = ctx.dir.join(&self.config.detections);
        let detections = read_mot_file(&path, MotFileKind::Detections)?;
        debug!(
            sequence = %ctx.name,
            frames = detections.len(),
            buffer = ctx.buffer_size,
            "loaded public detections"
        );
        self.reset(detections, ctx.conf_thres, ctx.buffer_size);
        Ok(())
    }

    fn step(&mut self, frame: &Frame) -> Result<Vec<Track>> {
        let detections: Vec<Detection> = self
            .detections
            .get(&frame.index)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.score >= self.conf_thres)
                    .map(|r| Detection::new(r.bbox, r.score))
                    .collect()
            })
            .unwrap_or_default();

        for track in &mut self.tracks {
            track.frames_since_update += 1;
        }

        let (initialized, initializing): (Vec<usize>, Vec<usize>) =
            (0..self.tracks.len()).partition(|&i| !self.tracks[i].is_initializing());
        let all_dets: Vec<usize> = (0..detections.len()).collect();

        let (matches, unmatched) = self.associate(&initialized, &detections, &all_dets);
        for (t, d) in matches {
            self.hit(t, &detections[d]);
        }
        let (matches, unmatched) = self.associate(&initializing, &detections, &unmatched);
        for (t, d) in matches {
            self.hit(t, &detections[d]);
        }

        for d in unmatched {
            self.tracks.push(TrackedBox {
                id: None,
                bbox: detections[d].bbox,
                score: detections[d].score,
                hits: 0,
                frames_since_update: 0,
            });
            let idx = self.tracks.len() - 1;
            self.hit(idx, &detections[d]);
        }

        let buffer_size = self.buffer_size;
        self.tracks.retain(|t| {
            if t.is_initializing() {
                t.frames_since_update == 0
            } else {
                t.frames_since_update <= buffer_size
            }
        });

        Ok(self
            .tracks
            .iter()
            .filter(|t| t.frames_since_update == 0)
            .filter_map(|t| {
                t.id.map(|id| Track {
                    id,
                    bbox: t.bbox,
                    score: t.score,
                })
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::parse_mot_str;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn frame(index: u32) -> Frame {
        Frame {
            index,
            image_path: PathBuf::from(format!("img1/{:06}.jpg", index)),
        }
    }

    fn tracker(content: &str, min_hits: u32, conf_thres: f64, buffer: u32) -> IouTracker {
        let config = IouTrackerConfig {
            min_hits,
            ..IouTrackerConfig::default()
        };
        let mut tracker = IouTracker::new(config).unwrap();
        let dets = parse_mot_str(content, MotFileKind::Detections, Path::new("det.txt")).unwrap();
        tracker.reset(dets, conf_thres, buffer);
        tracker
    }

    fn ids(tracks: &[Track]) -> Vec<i32> {
        let mut ids: Vec<i32> = tracks.iter().map(|t| t.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_ids_stable_for_moving_objects() {
        let mut content = String::new();
        for f in 1..=5 {
            let x = 10.0 + f as f64 * 2.0;
            content.push_str(&format!("{f},-1,{x},0,20,40,0.9\n"));
            content.push_str(&format!("{f},-1,{},0,20,40,0.8\n", 200.0 - x));
        }
        let mut t = tracker(&content, 1, 0.5, 30);

        let first = t.step(&frame(1)).unwrap();
        assert_eq!(ids(&first), vec![1, 2]);
        let id_at_left = first.iter().find(|tr| tr.bbox.x < 100.0).unwrap().id;

        for f in 2..=5 {
            let tracks = t.step(&frame(f)).unwrap();
            assert_eq!(ids(&tracks), vec![1, 2]);
            assert_eq!(tracks.iter().find(|tr| tr.bbox.x < 100.0).unwrap().id, id_at_left);
        }
    }

    #[test]
    fn test_conf_threshold_filters_detections() {
        let mut t = tracker("1,-1,0,0,20,40,0.9\n1,-1,100,0,20,40,0.2\n", 1, 0.4, 30);
        let tracks = t.step(&frame(1)).unwrap();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].bbox.x, 0.0);
    }

    #[test]
    fn test_track_buffer() {
        // gap of 2 frames is bridged by a buffer of 2, gap of 3 is not
        let content = "1,-1,0,0,20,40,1\n4,-1,0,0,20,40,1\n8,-1,0,0,20,40,1\n";
        let mut t = tracker(content, 1, 0.0, 2);

        assert_eq!(ids(&t.step(&frame(1)).unwrap()), vec![1]);
        assert!(t.step(&frame(2)).unwrap().is_empty());
        assert!(t.step(&frame(3)).unwrap().is_empty());
        assert_eq!(ids(&t.step(&frame(4)).unwrap()), vec![1]);
        for f in 5..=7 {
            assert!(t.step(&frame(f)).unwrap().is_empty());
        }
        assert_eq!(ids(&t.step(&frame(8)).unwrap()), vec![2]);
    }

    #[test]
    fn test_min_hits_delays_reporting() {
        let content = "1,-1,0,0,20,40,1\n2,-1,1,0,20,40,1\n3,-1,2,0,20,40,1\n5,-1,500,0,20,40,1\n";
        let mut t = tracker(content, 2, 0.0, 30);

        assert!(t.step(&frame(1)).unwrap().is_empty());
        assert_eq!(ids(&t.step(&frame(2)).unwrap()), vec![1]);
        assert_eq!(ids(&t.step(&frame(3)).unwrap()), vec![1]);
        assert!(t.step(&frame(4)).unwrap().is_empty());
        // a single hit never gets an ID
        assert!(t.step(&frame(5)).unwrap().is_empty());
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut t = tracker("1,-1,0,0,20,40,1\n", 1, 0.0, 30);
        assert_eq!(ids(&t.step(&frame(1)).unwrap()), vec![1]);

        let dets = parse_mot_str("1,-1,300,0,20,40,1\n", MotFileKind::Detections, Path::new("d")).unwrap();
        t.reset(dets, 0.0, 30);
        assert_eq!(ids(&t.step(&frame(1)).unwrap()), vec![1]);
    }

    #[test]
    fn test_load_model() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"arch": "iou", "match_iou": 0.5}}"#).unwrap();

        let model = load_model(file.path()).unwrap();
        assert_eq!(model.name(), "iou");
    }

    #[test]
    fn test_load_model_failures_are_checkpoint_errors() {
        let mut unknown = NamedTempFile::new().unwrap();
        write!(unknown, r#"{{"arch": "fairmot"}}"#).unwrap();
        let mut invalid = NamedTempFile::new().unwrap();
        write!(invalid, r#"{{"arch": "iou", "match_iou": 0.0}}"#).unwrap();

        for path in [
            unknown.path().to_path_buf(),
            invalid.path().to_path_buf(),
            PathBuf::from("/nonexistent/model.json"),
        ] {
            match load_model(&path) {
                Err(Error::Checkpoint { .. }) => {}
                Err(other) => panic!("unexpected error {other:?}"),
                Ok(_) => panic!("expected failure for {path:?}"),
            }
        }
    }
}
