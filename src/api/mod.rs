//! HTTP surface
//!
//! Minimal HTTP/1.1 handling on top of tokio streams:
//! - `GET /health`
//! - `POST /nlp-query` with `{"query": "..."}`

use crate::pipeline::QueryPipeline;
use serde_json::json;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl HttpResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn to_http(&self) -> String {
        create_response(self.status, &self.body.to_string())
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        _ => "Internal Server Error",
    }
}

pub fn create_response(status: u16, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason_phrase(status),
        body.len(),
        body
    )
}

/// Read one request: headers up to the blank line, then `Content-Length`
/// bytes of body.
pub async fn read_request<R>(reader: &mut R) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        if let Some(header_end) = find_header_end(&data) {
            let head = String::from_utf8_lossy(&data[..header_end]);
            let content_length = parse_headers(&head)
                .get("content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= header_end + 4 + content_length {
                break;
            }
        }
        if data.len() > MAX_REQUEST_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "request too large",
            ));
        }

        let size = reader.read(&mut buffer).await?;
        if size == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..size]);
    }

    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_headers(head: &str) -> HashMap<String, String> {
    head.lines()
        .skip(1)
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
        .collect()
}

pub fn parse_request(raw: &str) -> Option<HttpRequest> {
    let (head, body) = raw.split_once("\r\n\r\n").unwrap_or((raw, ""));
    let request_line = head.lines().next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_uppercase();
    let target = parts.next()?;

    // Drop query string and trailing slash (except for root)
    let path = target.split('?').next().unwrap_or(target).trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };

    Some(HttpRequest {
        method,
        path: path.to_string(),
        headers: parse_headers(head),
        body: body.to_string(),
    })
}

/// Extract `query` from a JSON body. Anything malformed is an empty query.
fn query_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body.trim())
        .ok()
        .and_then(|json| json.get("query").and_then(|v| v.as_str()).map(str::to_string))
        .unwrap_or_default()
}

pub async fn handle_request(pipeline: &QueryPipeline, request: &HttpRequest) -> HttpResponse {
    debug!(method = %request.method, path = %request.path, "Request");

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => HttpResponse::new(
            200,
            json!({"ok": true, "schema_tables": pipeline.schema().table_names()}),
        ),
        ("POST", "/nlp-query") => {
            let query = query_from_body(&request.body);
            match pipeline.run(&query).await {
                Ok(outcome) => HttpResponse::new(200, outcome.to_json()),
                Err(failure) => HttpResponse::new(400, failure.to_json()),
            }
        }
        _ => HttpResponse::new(404, json!({"error": "not_found", "path": request.path})),
    }
}

/// Parse raw request text and dispatch it.
pub async fn handle_raw_request(pipeline: &QueryPipeline, raw: &str) -> HttpResponse {
    match parse_request(raw) {
        Some(request) => handle_request(pipeline, &request).await,
        None => HttpResponse::new(400, json!({"error": "bad_request"})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_normalizes_path() {
        let request = parse_request(
            "POST /nlp-query/?debug=1 HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\n\r\n{\"query\":\"x\"}",
        )
        .unwrap();

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/nlp-query");
        assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
        assert_eq!(request.body, "{\"query\":\"x\"}");
    }

    #[test]
    fn test_parse_request_rejects_garbage() {
        assert!(parse_request("").is_none());
        assert!(parse_request("GET").is_none());
    }

    #[test]
    fn test_query_from_body() {
        assert_eq!(query_from_body(r#"{"query": "best colleges"}"#), "best colleges");
        assert_eq!(query_from_body(r#"{"q": "x"}"#), "");
        assert_eq!(query_from_body("not json"), "");
        assert_eq!(query_from_body(r#"{"query": 5}"#), "");
    }

    #[test]
    fn test_create_response_headers() {
        let response = HttpResponse::new(400, json!({"error": "unsafe_sql"})).to_http();
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(response.contains("Content-Length: 22\r\n"));
        assert!(response.ends_with("{\"error\":\"unsafe_sql\"}"));
    }

    #[tokio::test]
    async fn test_read_request_waits_for_full_body() {
        let raw = b"POST /nlp-query HTTP/1.1\r\nContent-Length: 17\r\n\r\n{\"query\":\"pune\"}";
        let mut reader: &[u8] = raw;
        let text = read_request(&mut reader).await.unwrap();
        assert!(text.ends_with("{\"query\":\"pune\"}"));
    }
}
