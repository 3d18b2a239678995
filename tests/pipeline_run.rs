use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tempfile::tempdir;

use engagement_kernel::emit::read_metrics_document;
use engagement_kernel::y4m::Y4mReader;
use engagement_kernel::{
    FileConfig, Pipeline, PipelineError, PipelineSettings, ReplayBackend, RunArtifacts, RunLock,
    RunReport,
};

const RECORDING: &str = r#"{
    "names": ["hand-raising", "reading", "sleep", "Using_phone", "person"],
    "frames": [
        { "boxes": [ { "cls": 1, "conf": 0.8, "xyxy": [1, 1, 10, 10] } ] },
        { "boxes": [
            { "cls": 1, "id": 1, "conf": 0.9, "xyxy": [1, 1, 10, 10] },
            { "cls": 2, "id": 2, "conf": 0.7, "xyxy": [12, 1, 20, 10] },
            { "cls": 4, "id": 3, "conf": 0.6, "xyxy": [1, 12, 10, 20] }
        ] },
        { "boxes": [
            { "cls": 0, "id": 1, "conf": 0.9, "xyxy": [1, 1, 10, 10] },
            { "cls": 3, "id": 1, "conf": 0.5, "xyxy": [1, 1, 10, 10] },
            { "cls": 1, "id": 2, "conf": 0.8, "xyxy": [12, 1, 20, 10] },
            { "cls": 2, "id": 5, "conf": 0.8, "xyxy": [1, 12, 10, 20] }
        ] }
    ]
}"#;

fn run(input: &str, recording: &str, artifacts: &RunArtifacts) -> Result<RunReport, PipelineError> {
    let lock = RunLock::new();
    let guard = lock.try_acquire().expect("lock is free");
    let mut backend = ReplayBackend::from_json(recording).expect("recording");
    let pipeline = Pipeline::new(PipelineSettings::default());
    pipeline.run(&guard, &FileConfig::new(input), &mut backend, artifacts)
}

fn count_video_frames(path: &Path) -> (u32, u32, usize) {
    let file = File::open(path).expect("open video");
    let mut reader = Y4mReader::new(BufReader::new(file)).expect("y4m header");
    let (width, height) = (reader.header().width, reader.header().height);
    let mut frames = 0;
    while reader.read_frame().expect("read frame").is_some() {
        frames += 1;
    }
    (width, height, frames)
}

#[test]
fn scores_every_frame_and_keeps_outputs_aligned() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(
        dir.path().join("media/final_demo.y4m"),
        dir.path().join("media/demo_data.json"),
    );

    let report = run(
        "stub://classroom?frames=4&fps=10&width=32&height=24",
        RECORDING,
        &artifacts,
    )
    .expect("run succeeds");
    assert_eq!(report.frames, 4);

    let doc = read_metrics_document(&artifacts.metrics).expect("metrics");
    let records = doc.records();
    assert_eq!(records.len(), 4);

    // untracked detections only name activities
    assert_eq!(records[0].timestamp_seconds, 0.0);
    assert_eq!(records[0].student_count, 0);
    assert_eq!(records[0].engagement_percent, 0);
    assert_eq!(records[0].session_score, 0);
    assert_eq!(records[0].activities, vec!["reading"]);

    assert_eq!(records[1].timestamp_seconds, 0.1);
    assert_eq!(records[1].student_count, 2);
    assert_eq!(records[1].engagement_percent, 50);
    assert_eq!(records[1].session_score, 45);
    assert_eq!(records[1].activities, vec!["reading", "sleep", "person"]);

    // track 1 is both engaged and disengaged: engaged wins
    assert_eq!(records[2].student_count, 3);
    assert_eq!(records[2].engagement_percent, 67);
    assert_eq!(records[2].session_score, 60);
    assert_eq!(
        records[2].activities,
        vec!["hand-raising", "Using_phone", "reading", "sleep"]
    );

    // past the end of the recording
    assert_eq!(records[3].student_count, 0);
    assert!(records[3].activities.is_empty());

    let (width, height, frames) = count_video_frames(&artifacts.video);
    assert_eq!((width, height, frames), (32, 24, 4));

    let mean = report.mean_engagement.expect("non-empty run");
    assert!((mean - (0.0 + 50.0 + 67.0 + 0.0) / 4.0).abs() < 1e-9);
}

#[test]
fn metrics_file_uses_client_field_names() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("out.y4m"), dir.path().join("out.json"));
    run("stub://c?frames=2&width=16&height=16", RECORDING, &artifacts).expect("run");

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&artifacts.metrics).unwrap()).unwrap();
    let first = &raw.as_array().expect("array")[0];
    assert_eq!(first["time"], serde_json::json!(0.0));
    assert_eq!(first["metrics"]["student_count"], serde_json::json!(0));
    assert_eq!(first["metrics"]["engagement"], serde_json::json!(0));
    assert_eq!(first["metrics"]["student_score"], serde_json::json!(0));
    assert_eq!(first["metrics"]["activities"], serde_json::json!(["reading"]));
}

#[test]
fn off_frame_geometry_is_scored_and_clipped() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let recording = r#"{
        "names": ["reading", "sleep"],
        "frames": [
            { "boxes": [
                { "cls": 0, "id": 12, "xyxy": [5e9, 1, 6e9, 20] },
                { "cls": 1, "id": 13, "xyxy": [-4e9, -4e9, 3e9, 3e9] }
            ] }
        ]
    }"#;

    let report = run("stub://edge?frames=2&width=64&height=48", recording, &artifacts)
        .expect("run succeeds");
    assert_eq!(report.frames, 2);

    let doc = read_metrics_document(&artifacts.metrics).expect("metrics");
    assert_eq!(doc.records()[0].student_count, 2);
    assert_eq!(doc.records()[0].engagement_percent, 50);
    assert_eq!(count_video_frames(&artifacts.video), (64, 48, 2));
}

#[test]
fn empty_video_yields_empty_outputs() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));

    let report = run("stub://empty?frames=0", RECORDING, &artifacts).expect("run");
    assert_eq!(report.frames, 0);
    assert!(report.mean_engagement.is_none());
    assert!(read_metrics_document(&artifacts.metrics).unwrap().is_empty());
    assert_eq!(count_video_frames(&artifacts.video).2, 0);
}

#[test]
fn rerun_fully_replaces_previous_outputs() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));

    run("stub://a?frames=6", RECORDING, &artifacts).expect("first run");
    run("stub://b?frames=2", RECORDING, &artifacts).expect("second run");

    assert_eq!(read_metrics_document(&artifacts.metrics).unwrap().len(), 2);
    assert_eq!(count_video_frames(&artifacts.video).2, 2);
}

#[test]
fn malformed_detection_fails_run_without_metrics() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    run("stub://ok?frames=2", RECORDING, &artifacts).expect("baseline run");
    assert!(artifacts.metrics.exists());

    let broken = r#"{
        "names": ["reading"],
        "frames": [
            { "boxes": [ { "cls": 0, "id": 1 } ] },
            { "boxes": [ { "cls": 7, "id": 1 } ] }
        ]
    }"#;
    let err = run("stub://bad?frames=3", broken, &artifacts).expect_err("run fails");
    assert!(matches!(err, PipelineError::MalformedDetection { frame: 1, .. }));
    assert_eq!(err.kind(), "malformed_detection");
    assert!(!artifacts.metrics.exists());
}

#[test]
fn missing_input_fails_before_processing() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let missing = dir.path().join("missing.y4m");

    let err = run(missing.to_str().unwrap(), RECORDING, &artifacts).expect_err("run fails");
    assert!(matches!(err, PipelineError::ResourceOpen { .. }));
    assert!(!artifacts.video.exists());
    assert!(!artifacts.metrics.exists());
}

#[test]
fn remote_urls_are_rejected() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let err = run("rtsp://camera/stream", RECORDING, &artifacts).expect_err("run fails");
    assert_eq!(err.kind(), "resource_open");
}

#[test]
fn unusable_output_directory_fails_before_processing() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not_a_dir");
    std::fs::write(&blocker, b"file").unwrap();
    let artifacts = RunArtifacts::new(blocker.join("v.y4m"), blocker.join("m.json"));

    let err = run("stub://x?frames=1", RECORDING, &artifacts).expect_err("run fails");
    assert!(matches!(
        err,
        PipelineError::ResourceOpen {
            resource: "artifact paths",
            ..
        }
    ));
}
