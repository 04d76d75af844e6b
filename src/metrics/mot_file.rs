//! Reader for MOTChallenge text files (ground truth, detections, tracking results).
//!
//! Every file is CSV with at least
//! `frame,id,bb_left,bb_top,bb_width,bb_height` and optionally
//! `conf_or_mark,class,visibility,...`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::detection::BoundingBox;
use crate::{Error, Result};

/// Class evaluated by the benchmark (pedestrian).
pub const PEDESTRIAN_CLASS: i32 = 1;

/// Classes whose boxes are ignore regions: person on vehicle, static person,
/// distractor, reflection.
pub const IGNORE_CLASSES: [i32; 4] = [2, 7, 8, 12];

/// How the columns after the box are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotFileKind {
    /// Tracker output; column 7 is the score.
    Results,
    /// Public detections; column 7 is the detector confidence.
    Detections,
    /// Ground truth objects to evaluate (mark != 0, pedestrian class).
    GroundTruth,
    /// Ground truth rows of ignored classes.
    IgnoreRegions,
}

/// One row of a MOT file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotRecord {
    pub frame: u32,
    pub id: i32,
    pub bbox: BoundingBox,
    pub score: f64,
}

/// Records grouped by frame, frames in increasing order.
pub type FrameMap = BTreeMap<u32, Vec<MotRecord>>;

/// Read a MOT file from disk.
pub fn read_mot_file<P: AsRef<Path>>(path: P, kind: MotFileKind) -> Result<FrameMap> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::IoError(std::io::Error::new(
            e.kind(),
            format!("failed to open MOT file {:?}: {}", path, e),
        ))
    })?;
    parse_mot_str(&content, kind, path)
}

/// Parse MOT file content. `path` is only used in error messages.
pub fn parse_mot_str(content: &str, kind: MotFileKind, path: &Path) -> Result<FrameMap> {
    let mut frames = FrameMap::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let parse_error = |reason: String| Error::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };
        if fields.len() < 6 {
            return Err(parse_error(format!(
                "expected at least 6 fields, got {}",
                fields.len()
            )));
        }

        let number = |i: usize| -> Result<f64> {
            fields[i]
                .parse::<f64>()
                .map_err(|e| parse_error(format!("field {} ({:?}): {}", i + 1, fields[i], e)))
        };
        let optional = |i: usize| -> Result<Option<f64>> {
            if fields.len() > i {
                number(i).map(Some)
            } else {
                Ok(None)
            }
        };

        let frame = number(0)?;
        if frame < 1.0 {
            continue;
        }
        let id = number(1)? as i32;
        let bbox = BoundingBox::new(number(2)?, number(3)?, number(4)?, number(5)?);
        let conf = optional(6)?;
        let class = optional(7)?.map(|c| c as i32);
        let visibility = optional(8)?;

        let score = match kind {
            MotFileKind::Results | MotFileKind::Detections => conf.unwrap_or(1.0),
            MotFileKind::GroundTruth => {
                let mark = conf.unwrap_or(1.0) as i32;
                if mark == 0 || class.is_some_and(|c| c != PEDESTRIAN_CLASS) {
                    continue;
                }
                1.0
            }
            MotFileKind::IgnoreRegions => {
                let Some(class) = class else { continue };
                let invisible = visibility.is_some_and(|v| v < 0.0);
                if !IGNORE_CLASSES.contains(&class) && !invisible {
                    continue;
                }
                1.0
            }
        };

        frames.entry(frame as u32).or_default().push(MotRecord {
            frame: frame as u32,
            id,
            bbox,
            score,
        });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const GT: &str = "\
1,1,10,20,30,60,1,1,1.0
1,2,100,20,30,60,0,1,1.0
1,3,200,20,30,60,1,7,0.5
2,1,12,20,30,60,1,1,0.9
";

    fn parse(content: &str, kind: MotFileKind) -> Result<FrameMap> {
        parse_mot_str(content, kind, Path::new("test.txt"))
    }

    #[test]
    fn test_ground_truth_filters_mark_and_class() {
        let frames = parse(GT, MotFileKind::GroundTruth).unwrap();
        assert_eq!(frames[&1].len(), 1);
        assert_eq!(frames[&1][0].id, 1);
        assert_eq!(frames[&2].len(), 1);
    }

    #[test]
    fn test_ignore_regions() {
        let frames = parse(GT, MotFileKind::IgnoreRegions).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[&1][0].id, 3);
    }

    #[test]
    fn test_ground_truth_without_class_column() {
        let frames = parse("1,5,0,0,10,10\n", MotFileKind::GroundTruth).unwrap();
        assert_eq!(frames[&1][0].id, 5);
        assert!(parse("1,5,0,0,10,10\n", MotFileKind::IgnoreRegions)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_results_keep_score() {
        let frames = parse("3,7,1.5,2.5,10.00,20.00,0.87,-1,-1,-1\n\n", MotFileKind::Results).unwrap();
        let rec = frames[&3][0];
        assert_eq!(rec.id, 7);
        assert_relative_eq!(rec.score, 0.87);
        assert_relative_eq!(rec.bbox.width, 10.0);
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let err = parse("1,1,0,0,10,10,1\n2,1,zero,0,10,10,1\n", MotFileKind::Results).unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(parse("1,1,0\n", MotFileKind::Results).is_err());
    }

    #[test]
    fn test_frames_sorted() {
        let frames = parse("5,1,0,0,1,1,1\n2,1,0,0,1,1,1\n0,1,0,0,1,1,1\n", MotFileKind::Detections).unwrap();
        assert_eq!(frames.keys().copied().collect::<Vec<_>>(), vec![2, 5]);
    }
}
