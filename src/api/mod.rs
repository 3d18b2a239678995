//! Trigger API: a minimal HTTP/1.1 listener in front of `EngagementService`.
//!
//! Routes:
//! - `POST /api/ml/process-demo/` starts a run (202) or reports one in progress (202).
//! - `GET /api/ml/status/` reports the run state and the last run summary.
//! - `GET /media/<name>` serves the two run artifacts once they exist.
//! - `GET /health`.

use crate::service::{EngagementService, TriggerOutcome};
use anyhow::{anyhow, Result};
use serde_json::json;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const MAX_REQUEST_BYTES: usize = 8192;
const PROCESS_DEMO_PATH: &str = "/api/ml/process-demo";
const STATUS_PATH: &str = "/api/ml/status";
const MEDIA_PREFIX: &str = "/media/";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    service: EngagementService,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, service: EngagementService) -> Self {
        Self { cfg, service }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self
            .cfg
            .addr
            .parse()
            .map_err(|e| anyhow!("invalid api address '{}': {}", self.cfg.addr, e))?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        if configured_addr.ip().is_loopback() && !addr.ip().is_loopback() {
            return Err(anyhow!(
                "api configured for loopback address '{}', but bound to non-loopback address '{}'",
                configured_addr,
                addr
            ));
        }
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let service = self.service;
        let join = std::thread::Builder::new()
            .name("engagement-api".to_string())
            .spawn(move || {
                if let Err(err) = run_api(listener, &service, shutdown_thread) {
                    log::error!("trigger api stopped: {}", err);
                }
            })?;
        log::info!("trigger api listening on http://{}", addr);

        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    service: &EngagementService,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, service) {
                    log::warn!("trigger api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream, service: &EngagementService) -> Result<()> {
    // accepted sockets inherit non-blocking mode on some platforms
    stream.set_nonblocking(false)?;
    let peer = stream.peer_addr()?;
    let local = stream.local_addr()?;
    if local.ip().is_loopback() && !peer.ip().is_loopback() {
        write_json_response(&mut stream, 403, &json!({"error": "forbidden"}))?;
        return Ok(());
    }

    let request = read_request(&mut stream)?;
    let path = request.path.as_str();
    let route = path.strip_suffix('/').unwrap_or(path);

    if route == PROCESS_DEMO_PATH {
        if request.method != "POST" {
            return write_json_response(&mut stream, 405, &json!({"error": "method_not_allowed"}));
        }
        return handle_trigger(&mut stream, service);
    }

    if request.method != "GET" {
        write_json_response(&mut stream, 405, &json!({"error": "method_not_allowed"}))?;
        return Ok(());
    }
    match route {
        "/health" => write_json_response(&mut stream, 200, &json!({"status": "ok"})),
        STATUS_PATH => {
            let status = serde_json::to_value(service.status())?;
            write_json_response(&mut stream, 200, &status)
        }
        _ => match path.strip_prefix(MEDIA_PREFIX) {
            Some(name) => serve_artifact(&mut stream, service, name),
            None => write_json_response(&mut stream, 404, &json!({"error": "not_found"})),
        },
    }
}

fn handle_trigger(stream: &mut TcpStream, service: &EngagementService) -> Result<()> {
    match service.trigger() {
        TriggerOutcome::Started(handle) => {
            // detach: the worker records its own outcome
            let run_id = handle.run_id;
            drop(handle);
            write_json_response(stream, 202, &json!({"status": "started", "run_id": run_id}))
        }
        TriggerOutcome::Busy => write_json_response(
            stream,
            202,
            &json!({"status": "processing", "message": "A task is already running"}),
        ),
        TriggerOutcome::Failed(message) => write_json_response(
            stream,
            500,
            &json!({"status": "error", "message": message}),
        ),
    }
}

/// Only the two artifacts of the configured run are reachable, by file name.
fn serve_artifact(stream: &mut TcpStream, service: &EngagementService, name: &str) -> Result<()> {
    let artifacts = service.artifacts();
    let target = [&artifacts.video, &artifacts.metrics]
        .into_iter()
        .find(|path| file_name_of(path) == Some(name));
    let Some(target) = target else {
        return write_json_response(stream, 404, &json!({"error": "not_found"}));
    };
    match std::fs::read(target) {
        Ok(body) => write_response(stream, 200, content_type_for(target), &body),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            write_json_response(stream, 404, &json!({"error": "not_ready"}))
        }
        Err(err) => {
            log::warn!("failed to read artifact {}: {}", target.display(), err);
            write_json_response(stream, 500, &json!({"error": "artifact_unreadable"}))
        }
    }
}

fn file_name_of(path: &Path) -> Option<&str> {
    path.file_name().and_then(|name| name.to_str())
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => "application/json",
        Some("y4m") => "video/x-yuv4mpeg",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let text = String::from_utf8_lossy(&data);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
    })
}

fn write_json_response(
    stream: &mut TcpStream,
    status: u16,
    body: &serde_json::Value,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    write_response(stream, status, "application/json", &payload)
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        202 => "HTTP/1.1 202 Accepted",
        403 => "HTTP/1.1 403 Forbidden",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {len}\r\n\
         Cache-Control: no-store\r\n\
         Connection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
}
