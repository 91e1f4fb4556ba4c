use crate::error::ServiceError;
use crate::verifier::{Outcome, TicketVerifier, UNKNOWN_CLIENT};
use crate::window::WindowState;
use serde::Deserialize;
use serde_json::json;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request bodies above this size are refused before parsing.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

const READ_TIMEOUT: Duration = Duration::from_secs(10);

const ACCEPT_THREAD: &str = "http-accept";

#[derive(Deserialize)]
struct SubmitRequest {
    #[serde(default)]
    roll_no: Option<String>,
    #[serde(default)]
    ticket: Option<String>,
}

/// Bound HTTP front end. The accept loop runs on its own thread for the
/// lifetime of the process.
pub struct HttpServer {
    local_addr: SocketAddr,
}

impl HttpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

pub fn start_http_server(
    listen_addr: &str,
    state: WindowState,
    verifier: TicketVerifier,
) -> Result<HttpServer, ServiceError> {
    let bind_err = |source| ServiceError::Bind {
        addr: listen_addr.to_string(),
        source,
    };
    let listener = TcpListener::bind(listen_addr).map_err(bind_err)?;
    let local_addr = listener.local_addr().map_err(bind_err)?;
    info!(%local_addr, "attendance http listening");

    thread::Builder::new()
        .name(ACCEPT_THREAD.into())
        .spawn(move || {
            for stream in listener.incoming() {
                match stream {
                    Ok(stream) => {
                        let state = state.clone();
                        let verifier = verifier.clone();
                        thread::spawn(move || handle_client(stream, state, verifier));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
        })
        .map_err(|source| ServiceError::ThreadSpawn {
            thread: ACCEPT_THREAD,
            source,
        })?;

    Ok(HttpServer { local_addr })
}

fn handle_client(mut stream: TcpStream, state: WindowState, verifier: TicketVerifier) {
    let client = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| UNKNOWN_CLIENT.to_string());
    // Without a timeout a silent client would pin this thread forever.
    if let Err(e) = apply_read_timeout(&stream) {
        debug!(%client, error = %e, "could not set read timeout; dropping connection");
        return;
    }

    let req = match read_request(&mut stream) {
        Ok(r) => r,
        Err(e) => {
            debug!(%client, error = %e, "bad request");
            return write_json(&mut stream, 400, &error_body(&e));
        }
    };

    match (req.method.as_str(), req.path.as_str()) {
        ("OPTIONS", _) => write_json(&mut stream, 204, ""),
        ("GET", "/ping") => write_json(&mut stream, 200, &json!({ "status": "pong" }).to_string()),
        ("GET", "/window") => match state.descriptor() {
            Some(d) => {
                let body = serde_json::to_string(&d).unwrap_or_default();
                write_json(&mut stream, 200, &body);
            }
            None => write_json(&mut stream, 503, &error_body(Outcome::NotReady.message())),
        },
        ("POST", "/submit") => {
            let body = match serde_json::from_slice::<SubmitRequest>(&req.body) {
                Ok(b) => b,
                Err(_) => return write_json(&mut stream, 400, &error_body("bad json")),
            };
            let roll_no = body.roll_no.unwrap_or_default();
            let ticket = body.ticket.unwrap_or_default();
            let outcome = verifier.verify_from(&roll_no, &ticket, &client);
            write_json(&mut stream, outcome.status_code(), &outcome_body(&outcome));
        }
        _ => write_json(&mut stream, 404, &error_body("not found")),
    }
}

fn apply_read_timeout(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))
}

fn outcome_body(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Accepted(receipt) => json!({
            "status": "success",
            "message": outcome.message(),
            "data": receipt,
        })
        .to_string(),
        other => error_body(other.message()),
    }
}

fn error_body(message: &str) -> String {
    json!({ "status": "error", "message": message }).to_string()
}

struct Request {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Result<Request, String> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf).map_err(|e| format!("{}", e))?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if data.len() > MAX_BODY_BYTES {
            return Err("headers too large".into());
        }
    }
    let header_end = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or("bad request")?
        + 4;
    let header_bytes = &data[..header_end];
    let mut body = data[header_end..].to_vec();

    let req_str = String::from_utf8_lossy(header_bytes);
    let mut lines = req_str.split("\r\n");
    let line = lines.next().ok_or("bad request")?;
    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or("bad method")?.to_string();
    let target = parts.next().ok_or("bad path")?;
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut content_len = 0usize;
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_len = value.trim().parse::<usize>().map_err(|_| "bad content-length")?;
            }
        }
    }
    if content_len > MAX_BODY_BYTES {
        return Err("body too large".into());
    }

    if content_len > body.len() {
        let mut remaining = content_len.saturating_sub(body.len());
        while remaining > 0 {
            let mut buf = vec![0u8; remaining.min(4096)];
            let n = stream.read(&mut buf).map_err(|e| format!("{}", e))?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buf[..n]);
            remaining = remaining.saturating_sub(n);
        }
    }
    body.truncate(content_len);

    Ok(Request { method, path, body })
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "HTTP/1.1 200 OK",
        204 => "HTTP/1.1 204 No Content",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        409 => "HTTP/1.1 409 Conflict",
        503 => "HTTP/1.1 503 Service Unavailable",
        _ => "HTTP/1.1 500 Internal Server Error",
    }
}

fn write_json(stream: &mut TcpStream, status: u16, body: &str) {
    let resp = format!(
        "{}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Connection: close\r\n\
         Content-Length: {}\r\n\r\n{}",
        status_line(status),
        body.len(),
        body
    );
    let _ = stream.write_all(resp.as_bytes());
}
