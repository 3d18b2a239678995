use anyhow::Result;
use serde_json::Value;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::tempdir;

use engagement_kernel::api::{ApiConfig, ApiHandle, ApiServer};
use engagement_kernel::{
    EngagementService, FileConfig, Pipeline, PipelineSettings, ReplayBackend, RunArtifacts,
    SharedBackend,
};

const RECORDING: &str = r#"{
    "names": ["reading", "sleep"],
    "frames": [
        { "boxes": [ { "cls": 0, "id": 1 }, { "cls": 1, "id": 2 } ] }
    ]
}"#;

fn start_api(input: &str, artifacts: RunArtifacts) -> Result<ApiHandle> {
    let backend: SharedBackend = Arc::new(Mutex::new(ReplayBackend::from_json(RECORDING)?));
    let service = EngagementService::new(
        FileConfig::new(input),
        artifacts,
        Pipeline::new(PipelineSettings::default()),
        backend,
    );
    let cfg = ApiConfig {
        addr: "127.0.0.1:0".to_string(),
    };
    ApiServer::new(cfg, service).spawn()
}

fn request(handle: &ApiHandle, method: &str, path: &str) -> Result<(u16, Vec<u8>)> {
    let mut stream = TcpStream::connect(handle.addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let req = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: 0\r\n\r\n");
    stream.write_all(req.as_bytes())?;
    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    let split = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| anyhow::anyhow!("malformed response"))?;
    let head = String::from_utf8_lossy(&response[..split]).to_string();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| anyhow::anyhow!("missing status"))?;
    Ok((status, response[split + 4..].to_vec()))
}

fn json_request(handle: &ApiHandle, method: &str, path: &str) -> Result<(u16, Value)> {
    let (status, body) = request(handle, method, path)?;
    Ok((status, serde_json::from_slice(&body)?))
}

fn wait_for_artifact(handle: &ApiHandle, path: &str) -> Result<Vec<u8>> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let (status, body) = request(handle, "GET", path)?;
        if status == 200 {
            return Ok(body);
        }
        assert_eq!(status, 404, "artifact poll for {path}");
        if Instant::now() > deadline {
            anyhow::bail!("artifact {path} never appeared");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

fn wait_until_idle(handle: &ApiHandle) -> Result<Value> {
    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        let (status, body) = json_request(handle, "GET", "/api/ml/status/")?;
        assert_eq!(status, 200);
        if body["running"] == false && !body["last_run"].is_null() {
            return Ok(body);
        }
        if Instant::now() > deadline {
            anyhow::bail!("run never finished");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn trigger_runs_pipeline_and_serves_artifacts() -> Result<()> {
    let dir = tempdir()?;
    let artifacts = RunArtifacts::new(
        dir.path().join("final_demo.y4m"),
        dir.path().join("demo_data.json"),
    );
    let handle = start_api("stub://api?frames=3&width=16&height=16", artifacts)?;

    let (status, body) = json_request(&handle, "GET", "/media/demo_data.json")?;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "not_ready");

    let (status, body) = json_request(&handle, "POST", "/api/ml/process-demo/")?;
    assert_eq!(status, 202);
    assert!(body["status"] == "started" || body["status"] == "processing");

    let metrics = wait_for_artifact(&handle, "/media/demo_data.json")?;
    let metrics: Value = serde_json::from_slice(&metrics)?;
    let records = metrics.as_array().expect("array");
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["metrics"]["student_count"], 2);
    assert_eq!(records[0]["metrics"]["engagement"], 50);
    assert_eq!(records[0]["metrics"]["student_score"], 45);

    let video = wait_for_artifact(&handle, "/media/final_demo.y4m")?;
    assert!(video.starts_with(b"YUV4MPEG2 "));

    let body = wait_until_idle(&handle)?;
    assert_eq!(body["last_run"]["succeeded"], true);
    assert_eq!(body["last_run"]["frames"], 3);

    handle.stop()?;
    Ok(())
}

#[test]
fn busy_trigger_reports_processing() -> Result<()> {
    let dir = tempdir()?;
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let handle = start_api("stub://long?frames=400&width=320&height=240", artifacts)?;

    let (status, first) = json_request(&handle, "POST", "/api/ml/process-demo")?;
    assert_eq!(status, 202);
    assert_eq!(first["status"], "started");

    let (status, second) = json_request(&handle, "POST", "/api/ml/process-demo/")?;
    assert_eq!(status, 202);
    if second["status"] == "processing" {
        assert_eq!(second["message"], "A task is already running");
    } else {
        // the first run already finished on a fast machine
        assert_eq!(second["status"], "started");
    }

    wait_until_idle(&handle)?;
    handle.stop()?;
    Ok(())
}

#[test]
fn rejects_unknown_routes_and_methods() -> Result<()> {
    let dir = tempdir()?;
    let artifacts = RunArtifacts::new(dir.path().join("v.y4m"), dir.path().join("m.json"));
    let handle = start_api("stub://x?frames=1", artifacts)?;

    let (status, body) = json_request(&handle, "GET", "/health")?;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");

    let (status, _) = json_request(&handle, "GET", "/api/ml/process-demo/")?;
    assert_eq!(status, 405);
    let (status, _) = json_request(&handle, "DELETE", "/health")?;
    assert_eq!(status, 405);
    let (status, _) = json_request(&handle, "GET", "/nope")?;
    assert_eq!(status, 404);
    let (status, _) = json_request(&handle, "GET", "/media/../Cargo.toml")?;
    assert_eq!(status, 404);
    let (status, _) = json_request(&handle, "GET", "/media/other.json")?;
    assert_eq!(status, 404);

    handle.stop()?;
    Ok(())
}
