use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tempfile::tempdir;

use engagement_kernel::emit::read_metrics_document;
use engagement_kernel::{
    ClassNames, EngagementService, FileConfig, Frame, Pipeline, PipelineSettings, RunArtifacts,
    SharedBackend, TrackerBackend, TrackerOutput, TriggerOutcome,
};

/// Tracker that parks on its first frame until the test releases it.
struct GatedBackend {
    names: ClassNames,
    entered: Sender<()>,
    release: Receiver<()>,
    gated: bool,
}

impl TrackerBackend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn track(&mut self, _frame: &Frame) -> Result<TrackerOutput> {
        if self.gated {
            self.gated = false;
            let _ = self.entered.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(10));
        }
        Ok(TrackerOutput::empty())
    }

    fn reset(&mut self) {
        self.gated = true;
    }
}

fn gated_service(
    input: &str,
    artifacts: RunArtifacts,
) -> (EngagementService, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let backend: SharedBackend = Arc::new(Mutex::new(GatedBackend {
        names: ClassNames::new(["reading"]),
        entered: entered_tx,
        release: release_rx,
        gated: true,
    }));
    let service = EngagementService::new(
        FileConfig::new(input),
        artifacts,
        Pipeline::new(PipelineSettings::default()),
        backend,
    );
    (service, entered_rx, release_tx)
}

#[test]
fn second_trigger_during_run_is_rejected_not_queued() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let (service, entered, release) = gated_service("stub://gate?frames=3", artifacts.clone());

    let handle = match service.trigger() {
        TriggerOutcome::Started(handle) => handle,
        other => panic!("expected Started, got {:?}", other),
    };
    entered
        .recv_timeout(Duration::from_secs(10))
        .expect("run reached the tracker");
    assert!(service.is_running());
    assert!(service.status().running);

    assert!(matches!(service.trigger(), TriggerOutcome::Busy));
    assert!(matches!(service.trigger(), TriggerOutcome::Busy));

    release.send(()).unwrap();
    let report = handle.join().expect("worker").expect("run succeeds");
    assert_eq!(report.frames, 3);
    assert!(!service.is_running());

    // exactly one run happened
    let status = service.status();
    let last = status.last_run.expect("summary recorded");
    assert_eq!(last.run_id, 1);
    assert!(last.succeeded);
    assert_eq!(last.frames, 3);
    assert_eq!(read_metrics_document(&artifacts.metrics).unwrap().len(), 3);
}

#[test]
fn trigger_after_completion_starts_a_new_run() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let (service, _entered, release) = gated_service("stub://again?frames=2", artifacts);

    for expected_id in 1..=2 {
        release.send(()).unwrap();
        let handle = match service.trigger() {
            TriggerOutcome::Started(handle) => handle,
            other => panic!("expected Started, got {:?}", other),
        };
        assert_eq!(handle.run_id, expected_id);
        handle.join().expect("worker").expect("run succeeds");
    }
    assert_eq!(service.status().last_run.map(|r| r.run_id), Some(2));
}

#[test]
fn failed_run_releases_lock_and_records_error() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let missing = dir.path().join("nope.y4m");
    let (service, _entered, _release) = gated_service(missing.to_str().unwrap(), artifacts.clone());

    let handle = match service.trigger() {
        TriggerOutcome::Started(handle) => handle,
        other => panic!("expected Started, got {:?}", other),
    };
    let err = handle.join().expect("worker").expect_err("run fails");
    assert_eq!(err.kind(), "resource_open");
    assert!(!service.is_running());

    let last = service.status().last_run.expect("summary recorded");
    assert!(!last.succeeded);
    assert_eq!(last.error_kind, Some("resource_open"));
    assert!(!artifacts.metrics.exists());

    match service.trigger() {
        TriggerOutcome::Started(handle) => {
            assert_eq!(handle.run_id, 2);
            assert!(handle.join().expect("worker").is_err());
        }
        other => panic!("expected Started, got {:?}", other),
    }
}

/// Tracker that panics on the first frame of its first run.
struct PanicOnceBackend {
    names: ClassNames,
    panicked: bool,
}

impl TrackerBackend for PanicOnceBackend {
    fn name(&self) -> &'static str {
        "panic-once"
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn track(&mut self, _frame: &Frame) -> Result<TrackerOutput> {
        if !self.panicked {
            self.panicked = true;
            panic!("tracker crashed");
        }
        Ok(TrackerOutput::empty())
    }
}

#[test]
fn panicking_run_is_recorded_and_does_not_block_later_runs() {
    let dir = tempdir().unwrap();
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let backend: SharedBackend = Arc::new(Mutex::new(PanicOnceBackend {
        names: ClassNames::new(["reading"]),
        panicked: false,
    }));
    let service = EngagementService::new(
        FileConfig::new("stub://crash?frames=2"),
        artifacts.clone(),
        Pipeline::new(PipelineSettings::default()),
        backend,
    );

    let handle = match service.trigger() {
        TriggerOutcome::Started(handle) => handle,
        other => panic!("expected Started, got {:?}", other),
    };
    let err = handle.join().expect("worker").expect_err("run panics");
    assert_eq!(err.kind(), "panicked");
    assert!(err.to_string().contains("tracker crashed"));
    assert!(!service.is_running());
    assert!(!artifacts.metrics.exists());

    let last = service.status().last_run.expect("summary recorded");
    assert_eq!(last.run_id, 1);
    assert!(!last.succeeded);
    assert_eq!(last.error_kind, Some("panicked"));

    let handle = match service.trigger() {
        TriggerOutcome::Started(handle) => handle,
        other => panic!("expected Started, got {:?}", other),
    };
    let report = handle.join().expect("worker").expect("run recovers");
    assert_eq!(report.frames, 2);
    assert_eq!(read_metrics_document(&artifacts.metrics).unwrap().len(), 2);
    assert!(service.status().last_run.expect("summary").succeeded);
}
