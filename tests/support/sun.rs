//! A fake Sun object service for CLI tests.
//!
//! Serves the `/v1/objects` routes the HTTP client uses on a loopback port,
//! one connection at a time, and delegates storage to [`MemorySun`]. Every
//! response carries `Connection: close`.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use si::core::identity::IdentityService;
use si::core::sun::{Metadata, MemorySun, PutRequest, SunStore};
use si::error::{Error, ErrorKind};

/// Bearer token the fake server accepts.
pub const TOKEN: &str = "test-token";

pub struct FakeSun {
    /// Shared with the server thread; seed or inspect objects through it.
    pub store: MemorySun,
    url: String,
}

impl FakeSun {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("failed to bind fake sun");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let store = MemorySun::new();
        let served = store.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let _ = serve(&served, stream);
            }
        });
        Self { store, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Write an object directly, bypassing the vault.
    pub fn seed(&self, kind: &str, name: &str, payload: &str, metadata: Value) {
        let metadata = match metadata {
            Value::Object(map) => map,
            _ => Metadata::new(),
        };
        self.store
            .put(PutRequest {
                kind,
                name,
                payload: payload.as_bytes(),
                content_type: "text/plain",
                metadata,
                if_match_rev: None,
            })
            .expect("seed put");
    }

    /// Latest payload of an object as text.
    pub fn payload(&self, kind: &str, name: &str) -> String {
        let object = self.store.get_payload(kind, name).expect("object exists");
        String::from_utf8(object.payload).expect("utf-8 payload")
    }

    /// Latest metadata of an object.
    pub fn metadata(&self, kind: &str, name: &str) -> Metadata {
        self.store
            .get_payload(kind, name)
            .expect("object exists")
            .metadata
    }

    /// Replace the account identity out of band.
    pub fn replace_identity(&self) -> String {
        IdentityService::new(Arc::new(self.store.clone()))
            .init(true)
            .expect("replace identity")
            .recipient()
    }
}

struct Request {
    method: String,
    path: Vec<String>,
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: Vec<u8>,
}

struct Response {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl Response {
    fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "error": message }))
    }
}

fn serve(store: &MemorySun, stream: TcpStream) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let request = read_request(&mut reader)?;
    let response = handle(store, &request);
    write_response(stream, &response)
}

fn read_request(reader: &mut BufReader<TcpStream>) -> io::Result<Request> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut length = 0usize;
    let mut authorization = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "content-length" => length = value.trim().parse().unwrap_or(0),
                "authorization" => authorization = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;

    let (path, query) = target.split_once('?').unwrap_or((target.as_str(), ""));
    let path = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| decode(s, false))
        .collect();
    let query = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(k, true), decode(v, true))
        })
        .collect();

    Ok(Request {
        method,
        path,
        query,
        authorization,
        body,
    })
}

fn write_response(mut stream: TcpStream, response: &Response) -> io::Result<()> {
    let reason = match response.status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        409 => "Conflict",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    };
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        reason,
        response.content_type,
        response.body.len()
    )?;
    stream.write_all(&response.body)?;
    stream.flush()
}

fn handle(store: &MemorySun, req: &Request) -> Response {
    if req.authorization.as_deref() != Some(format!("Bearer {}", TOKEN).as_str()) {
        return Response::error(401, "invalid token");
    }
    let path: Vec<&str> = req.path.iter().map(String::as_str).collect();
    let result = match (req.method.as_str(), path.as_slice()) {
        ("GET", ["v1", "objects"]) => list(store, req),
        ("PUT", ["v1", "objects", kind, name]) => put(store, kind, name, &req.body),
        ("GET", ["v1", "objects", kind, name, "payload"]) => {
            store.get_payload(kind, name).map(|object| Response {
                status: 200,
                content_type: "application/octet-stream",
                body: object.payload,
            })
        }
        ("GET", ["v1", "objects", kind, name, "revisions"]) => {
            let limit = query_usize(req, "limit");
            store
                .list_revisions(kind, name, limit)
                .map(|items| Response::json(200, json!({ "items": items })))
        }
        _ => return Response::error(404, "no such route"),
    };
    result.unwrap_or_else(|e| error_response(&e))
}

fn list(store: &MemorySun, req: &Request) -> si::error::Result<Response> {
    let kind = req.query.get("kind").map(String::as_str).unwrap_or("");
    let limit = query_usize(req, "limit");
    let items = match req.query.get("name") {
        Some(name) => store
            .list(kind, name, 0)?
            .into_iter()
            .filter(|m| &m.name == name)
            .collect(),
        None => {
            let prefix = req.query.get("prefix").map(String::as_str).unwrap_or("");
            store.list(kind, prefix, limit)?
        }
    };
    Ok(Response::json(200, json!({ "items": items })))
}

fn put(store: &MemorySun, kind: &str, name: &str, body: &[u8]) -> si::error::Result<Response> {
    let Ok(body) = serde_json::from_slice::<Value>(body) else {
        return Ok(Response::error(400, "invalid json"));
    };
    let Ok(payload) = STANDARD.decode(body["payload_base64"].as_str().unwrap_or("")) else {
        return Ok(Response::error(400, "invalid payload_base64"));
    };
    let metadata = body["metadata"].as_object().cloned().unwrap_or_default();
    let revision = store.put(PutRequest {
        kind,
        name,
        payload: &payload,
        content_type: body["content_type"].as_str().unwrap_or("text/plain"),
        metadata,
        if_match_rev: body["expected_revision"].as_u64(),
    })?;
    Ok(Response::json(
        200,
        json!({
            "result": {
                "object": { "latest_revision": revision },
                "revision": { "revision": revision },
            }
        }),
    ))
}

fn error_response(e: &Error) -> Response {
    let status = match e.kind() {
        ErrorKind::NotFound => 404,
        ErrorKind::Conflict => 409,
        ErrorKind::Usage => 413,
        _ => 500,
    };
    Response::error(status, &e.to_string())
}

fn query_usize(req: &Request, name: &str) -> usize {
    req.query
        .get(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn decode(raw: &str, plus_as_space: bool) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = raw.get(i + 1..i + 3);
                match hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                    Some(b) => {
                        out.push(b);
                        i += 3;
                        continue;
                    }
                    None => out.push(b'%'),
                }
            }
            b'+' if plus_as_space => out.push(b' '),
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
