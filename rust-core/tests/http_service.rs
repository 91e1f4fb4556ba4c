#![cfg(feature = "service")]

use attendance_core::service::config::ServiceConfig;
use attendance_core::service::http::start_http_server;
use attendance_core::service::AttendanceService;
use attendance_core::{
    derive_ticket, AttendanceWindow, ManualClock, MemoryAuditLog, SeedDraw, SeedError,
    SeedSource, TicketVerifier, WindowState,
};
use serde_json::Value;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WINDOW: u64 = 29_123_456;

struct ScriptedSeed {
    calls: AtomicUsize,
}

impl SeedSource for ScriptedSeed {
    fn obtain_secret(&self) -> Result<SeedDraw, SeedError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SeedDraw {
            secret: format!("ABC12{n}"),
            source_id: format!("scripted-{n}"),
        })
    }
}

fn start_service() -> (AttendanceService, Arc<MemoryAuditLog>) {
    let cfg = ServiceConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        rotation_period_secs: 3_600,
        audit_log_path: None,
    };
    let audit = Arc::new(MemoryAuditLog::new());
    let service = AttendanceService::start_with_audit(
        &cfg,
        Arc::new(ScriptedSeed {
            calls: AtomicUsize::new(0),
        }),
        Arc::new(ManualClock::new(WINDOW * 60 + 5)),
        audit.clone(),
    )
    .expect("service start");
    (service, audit)
}

fn request(addr: SocketAddr, method: &str, path: &str, body: Option<&str>) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");
    let body = body.unwrap_or("");
    let req = format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(req.as_bytes()).expect("write");

    let mut raw = String::new();
    stream.read_to_string(&mut raw).expect("read");
    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status code");
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    (status, body)
}

fn submit(addr: SocketAddr, roll_no: &str, ticket: &str) -> (u16, Value) {
    let body = serde_json::json!({ "roll_no": roll_no, "ticket": ticket }).to_string();
    let (status, resp) = request(addr, "POST", "/submit", Some(&body));
    (status, serde_json::from_str(&resp).expect("json response"))
}

#[test]
fn ping_and_window_descriptor() {
    let (service, _) = start_service();
    let addr = service.local_addr();

    let (status, body) = request(addr, "GET", "/ping", None);
    assert_eq!(status, 200);
    assert!(body.contains("pong"));

    let (status, body) = request(addr, "GET", "/window", None);
    assert_eq!(status, 200);
    let v: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(v["window_id"], WINDOW);
    assert_eq!(v["expires_at"], (WINDOW + 1) * 60);
    assert!(v.get("secret").is_none());
    assert!(!body.contains("ABC120"), "raw secret must never be served");

    let (status, _) = request(addr, "GET", "/nope", None);
    assert_eq!(status, 404);

    service.shutdown();
}

#[test]
fn submit_status_mapping() {
    let (service, audit) = start_service();
    let addr = service.local_addr();
    let ticket = derive_ticket("ABC120", "S1", WINDOW);

    let (status, v) = submit(addr, " s1 ", &ticket.to_lowercase());
    assert_eq!(status, 200);
    assert_eq!(v["status"], "success");
    assert_eq!(v["data"]["roll_no"], "S1");
    assert!(v["data"]["timestamp"].is_string());

    let (status, v) = submit(addr, "S1", &ticket);
    assert_eq!(status, 409);
    assert_eq!(v["status"], "error");

    let (status, _) = submit(addr, "S2", &ticket);
    assert_eq!(status, 400);

    let (status, _) = submit(addr, "", &ticket);
    assert_eq!(status, 400);

    let (status, _) = request(addr, "POST", "/submit", Some("{not json"));
    assert_eq!(status, 400);

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].roll_no, "S1");
    assert_eq!(records[0].window_id, WINDOW);
    assert!(records[0].client_address.starts_with("127.0.0.1:"));

    service.shutdown();
}

#[test]
fn preflight_gets_cors_headers() {
    let (service, _) = start_service();
    let mut stream = TcpStream::connect(service.local_addr()).expect("connect");
    stream
        .write_all(b"OPTIONS /submit HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .expect("write");
    let mut raw = String::new();
    stream.read_to_string(&mut raw).expect("read");
    assert!(raw.starts_with("HTTP/1.1 204"));
    assert!(raw.contains("Access-Control-Allow-Origin: *"));
    service.shutdown();
}

#[test]
fn unavailable_until_first_window() {
    let state = WindowState::new();
    let audit = Arc::new(MemoryAuditLog::new());
    let verifier = TicketVerifier::new(state.clone(), audit.clone());
    let server = start_http_server("127.0.0.1:0", state.clone(), verifier).expect("http start");
    let addr = server.local_addr();

    let (status, body) = request(addr, "GET", "/window", None);
    assert_eq!(status, 503);
    let v: Value = serde_json::from_str(&body).expect("json");
    assert_eq!(v["status"], "error");

    let ticket = derive_ticket("ABC120", "S1", WINDOW);
    let (status, v) = submit(addr, "S1", &ticket);
    assert_eq!(status, 503);
    assert_eq!(v["status"], "error");
    assert!(audit.is_empty());

    // Once a window is published the same server starts answering.
    state.publish(AttendanceWindow::new(WINDOW, "ABC120".into(), "test".into()));
    let (status, _) = request(addr, "GET", "/window", None);
    assert_eq!(status, 200);
    let (status, _) = submit(addr, "S1", &ticket);
    assert_eq!(status, 200);
    assert_eq!(audit.len(), 1);
}
