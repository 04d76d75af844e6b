//! End-to-end runs on a small synthetic MOTChallenge split.

use std::fs;
use std::path::Path;

use approx::assert_relative_eq;
use tempfile::TempDir;

use mot_eval::{
    load_model, EvalStatus, Error, RunConfig, SequenceError, SequenceRunner, Summary,
    TrackingParams,
};

const NUM_FRAMES: u32 = 10;

/// Two pedestrians walking right, plus one low-confidence detection.
fn write_sequence(root: &Path, name: &str, with_gt: bool) {
    let dir = root.join(name);
    fs::create_dir_all(dir.join("img1")).unwrap();
    fs::create_dir_all(dir.join("det")).unwrap();
    fs::write(
        dir.join("seqinfo.ini"),
        format!(
            "[Sequence]\nname={name}\nimDir=img1\nframeRate=30\nseqLength={NUM_FRAMES}\nimWidth=1920\nimHeight=1080\nimExt=.jpg\n"
        ),
    )
    .unwrap();

    let mut gt = String::new();
    let mut det = String::new();
    for frame in 1..=NUM_FRAMES {
        let shift = 2.0 * frame as f64;
        for (id, x) in [(1, 100.0), (2, 400.0)] {
            let x = x + shift;
            gt.push_str(&format!("{frame},{id},{x},200,40,80,1,1,1.0\n"));
            det.push_str(&format!("{frame},-1,{x},200,40,80,0.9\n"));
        }
        if frame == 3 {
            det.push_str(&format!("{frame},-1,900,500,40,80,0.1\n"));
        }
    }
    fs::write(dir.join("det").join("det.txt"), det).unwrap();
    if with_gt {
        fs::create_dir_all(dir.join("gt")).unwrap();
        fs::write(dir.join("gt").join("gt.txt"), gt).unwrap();
    }
}

fn write_checkpoint(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("iou.json");
    fs::write(
        &path,
        r#"{"arch": "iou", "match_iou": 0.3, "min_hits": 1, "detections": "det/det.txt"}"#,
    )
    .unwrap();
    path
}

fn names(seqs: &[&str]) -> Vec<String> {
    seqs.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_run_and_evaluate_split() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_sequence(data.path(), "SEQ-01", true);
    write_sequence(data.path(), "SEQ-02", false);

    let mut model = load_model(write_checkpoint(data.path())).unwrap();
    let runner = SequenceRunner::new(data.path(), out.path(), "iou_baseline", TrackingParams::default()).unwrap();
    let report = runner.run(model.as_mut(), &names(&["SEQ-01", "SEQ-02", "SEQ-03"]));

    // one result file per existing sequence
    let result_dir = out.path().join("iou_baseline");
    assert_eq!(
        report.result_files(),
        vec![
            result_dir.join("SEQ-01.txt").as_path(),
            result_dir.join("SEQ-02.txt").as_path()
        ]
    );
    assert!(matches!(
        report.outcomes[2].result,
        Err(SequenceError::MissingSequence(_))
    ));
    assert_eq!(report.total_frames(), 2 * NUM_FRAMES as usize);

    let content = fs::read_to_string(result_dir.join("SEQ-01.txt")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2 * NUM_FRAMES as usize);
    assert!(lines[0].starts_with("1,1,"));
    assert!(lines[0].ends_with(",-1,-1,-1"));

    // SEQ-02 has no ground truth and stays out of the summary
    let seq2 = report.outcomes[1].result.as_ref().unwrap();
    assert!(matches!(seq2.eval, EvalStatus::MissingGroundTruth(_)));

    let summary = report.summary();
    assert_eq!(summary.rows().len(), 1);
    let metrics = &summary.rows()[0].metrics;
    assert_relative_eq!(metrics.mota(), 1.0, epsilon = 1e-10);
    assert_relative_eq!(metrics.idf1(), 1.0, epsilon = 1e-10);
    assert_eq!(metrics.num_switches, 0);
    assert_eq!(metrics.num_false_positives, 0);
    assert_eq!(metrics.mostly_tracked, 2);

    let path = runner.save_summary(&summary).unwrap();
    assert_eq!(path, result_dir.join("summary_iou_baseline.txt"));
    let saved = fs::read_to_string(path).unwrap();
    assert!(saved.contains("SEQ-01"));
    assert!(saved.contains("OVERALL"));
    assert!(saved.contains("100.0%"));
}

#[test]
fn test_deferred_evaluation_matches_inline() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_sequence(data.path(), "SEQ-01", true);
    let seqs = names(&["SEQ-01"]);

    let config = RunConfig {
        data_root: data.path().to_path_buf(),
        output_dir: out.path().to_path_buf(),
        exp_name: "deferred".to_string(),
        sequences: seqs.clone(),
        run_eval: false,
        checkpoint: Some(write_checkpoint(data.path())),
        ..RunConfig::default()
    };
    config.validate().unwrap();

    let mut model = load_model(config.checkpoint.as_ref().unwrap()).unwrap();
    let runner = config.runner().unwrap();
    let report = runner.run(model.as_mut(), &config.sequences);
    assert!(report.summary().is_empty());
    assert!(matches!(
        report.outcomes[0].result.as_ref().unwrap().eval,
        EvalStatus::Skipped
    ));

    let evaluated = runner.evaluate(&seqs);
    let summary = evaluated.summary();
    assert_eq!(summary.rows().len(), 1);
    assert_eq!(summary.rows()[0].metrics.num_frames, NUM_FRAMES as usize);
    assert_relative_eq!(summary.overall().unwrap().metrics.mota(), 1.0, epsilon = 1e-10);
}

#[test]
fn test_evaluate_without_results() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write_sequence(data.path(), "SEQ-01", true);

    let runner = SequenceRunner::new(data.path(), out.path(), "never_run", TrackingParams::default()).unwrap();
    let report = runner.evaluate(&names(&["SEQ-01"]));

    assert!(matches!(
        report.outcomes[0].result,
        Err(SequenceError::MissingResults(_))
    ));
    assert!(report.summary().is_empty());
}

#[test]
fn test_empty_sequence_list() {
    let data = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let mut model = load_model(write_checkpoint(data.path())).unwrap();

    let runner = SequenceRunner::new(data.path(), out.path(), "empty", TrackingParams::default()).unwrap();
    let report = runner.run(model.as_mut(), &[]);
    let summary: Summary = report.summary();

    assert!(report.outcomes.is_empty());
    assert!(summary.is_empty());
    assert_eq!(summary.render().lines().count(), 1);
}

#[test]
fn test_bad_checkpoints() {
    let dir = TempDir::new().unwrap();

    let missing = load_model(dir.path().join("missing.json"));
    assert!(matches!(missing, Err(Error::Checkpoint { .. })));

    let unknown_arch = dir.path().join("yolo.json");
    fs::write(&unknown_arch, r#"{"arch": "fairmot_dla34"}"#).unwrap();
    assert!(matches!(
        load_model(&unknown_arch),
        Err(Error::Checkpoint { .. })
    ));

    let bad_iou = dir.path().join("bad.json");
    fs::write(&bad_iou, r#"{"arch": "iou", "match_iou": 0.0}"#).unwrap();
    assert!(matches!(load_model(&bad_iou), Err(Error::Checkpoint { .. })));
}
