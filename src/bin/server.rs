//! HTTP server for the fishbone / FMEA UI
//! Simple HTTP server using tokio and basic HTTP handling. Every request
//! carries the whole form; nothing is kept between requests.

use dq_fishbone::collector::prefill_from_suggestions;
use dq_fishbone::config::AppConfig;
use dq_fishbone::error::FishboneError;
use dq_fishbone::export::{csv_artifact, CSV_FILENAME};
use dq_fishbone::session::{analyze, FormState};
use dq_fishbone::suggest::SuggestionClient;
use dq_fishbone::templates::TemplateRegistry;
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const MAX_REQUEST_BYTES: usize = 1_000_000;

struct AppState {
    registry: TemplateRegistry,
    suggestions: SuggestionClient,
}

struct HttpResponse {
    status: u16,
    status_text: &'static str,
    content_type: &'static str,
    extra_headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpResponse {
    fn json(status: u16, status_text: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text,
            content_type: "application/json",
            extra_headers: Vec::new(),
            body: body.into().into_bytes(),
        }
    }

    fn error(status: u16, status_text: &'static str, message: &str) -> Self {
        Self::json(status, status_text, serde_json::json!({ "error": message }).to_string())
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Access-Control-Allow-Origin: *\r\n\
             Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
             Access-Control-Allow-Headers: Content-Type\r\n\
             Content-Length: {}\r\n",
            self.status,
            self.status_text,
            self.content_type,
            self.body.len()
        );
        for (key, value) in &self.extra_headers {
            head.push_str(&format!("{}: {}\r\n", key, value));
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;
    let registry = config.template_registry()?;
    let suggestions = SuggestionClient::new(&config.suggestion);

    if suggestions.is_available() {
        info!("API key found - AI cause suggestions enabled");
    } else {
        warn!("API key not found - AI cause suggestions disabled");
    }
    info!("Templates: {}", registry.names().join(", "));

    let state = Arc::new(AppState { registry, suggestions });

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on {}", config.bind_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, state.clone()));
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    use tokio::time::{timeout, Duration};

    // Read request with timeout to prevent hanging
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut temp_buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buffer.extend_from_slice(&temp_buf[..n]);
                    if request_complete(&buffer) || buffer.len() > MAX_REQUEST_BYTES {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read from stream: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    })
    .await;

    if !matches!(read_result, Ok(Ok(()))) {
        warn!("Request read failed or timed out");
        return;
    }
    if buffer.is_empty() {
        return;
    }

    let response = respond(&state, buffer).await;
    if let Err(e) = stream.write_all(&response.to_bytes()).await {
        error!("Failed to write response: {}", e);
    }
}

async fn respond(state: &AppState, buffer: Vec<u8>) -> HttpResponse {
    match String::from_utf8(buffer) {
        Ok(request) => handle_request(state, &request).await,
        Err(_) => HttpResponse::error(400, "Bad Request", "request is not valid UTF-8"),
    }
}

/// Headers received and, when a Content-Length is given, the full body too.
fn request_complete(buffer: &[u8]) -> bool {
    let Some(headers_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&buffer[..headers_end]);
    match extract_content_length(&headers) {
        Some(content_length) => buffer.len() >= headers_end + 4 + content_length,
        None => true,
    }
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

#[derive(Deserialize)]
struct SuggestRequest {
    issue: String,
    #[serde(default)]
    domain: Option<String>,
}

async fn handle_request(state: &AppState, request: &str) -> HttpResponse {
    let mut lines = request.lines();
    let parts: Vec<&str> = lines.next().unwrap_or_default().split_whitespace().collect();
    if parts.len() < 2 {
        return HttpResponse::error(400, "Bad Request", "malformed request line");
    }

    let method = parts[0];
    let path = parts[1].split('?').next().unwrap_or("/").trim_end_matches('/');
    let body = request
        .find("\r\n\r\n")
        .map(|i| request[i + 4..].trim())
        .unwrap_or("");

    let request_id = Uuid::new_v4();
    info!(%request_id, method, path, "Request");

    match (method, path) {
        ("OPTIONS", _) => HttpResponse {
            status: 204,
            status_text: "No Content",
            content_type: "text/plain",
            extra_headers: Vec::new(),
            body: Vec::new(),
        },
        ("GET", "/api/health") => {
            HttpResponse::json(200, "OK", r#"{"status":"ok","service":"dq-fishbone"}"#)
        }
        ("GET", "/api/templates") => {
            let templates = serde_json::json!({
                "templates": state.registry.templates(),
                "suggestions_enabled": state.suggestions.is_available(),
            });
            HttpResponse::json(200, "OK", templates.to_string())
        }
        ("POST", "/api/analyze") => match parse_form(body).and_then(|f| analyze(&state.registry, &f)) {
            Ok(view) => {
                let dot = view.dot();
                let payload = serde_json::json!({ "analysis": view, "dot": dot });
                HttpResponse::json(200, "OK", payload.to_string())
            }
            Err(e) => error_response(&e),
        },
        ("POST", "/api/diagram") => match parse_form(body).and_then(|f| analyze(&state.registry, &f)) {
            Ok(view) => HttpResponse {
                status: 200,
                status_text: "OK",
                content_type: "text/vnd.graphviz; charset=utf-8",
                extra_headers: Vec::new(),
                body: view.dot().into_bytes(),
            },
            Err(e) => error_response(&e),
        },
        ("POST", "/api/export") => {
            let artifact = parse_form(body)
                .and_then(|f| analyze(&state.registry, &f))
                .and_then(|view| csv_artifact(&view.records));
            match artifact {
                Ok(artifact) => HttpResponse {
                    status: 200,
                    status_text: "OK",
                    content_type: "text/csv; charset=utf-8",
                    extra_headers: vec![(
                        "Content-Disposition".to_string(),
                        format!("attachment; filename=\"{}\"", CSV_FILENAME),
                    )],
                    body: artifact.bytes,
                },
                Err(e) => error_response(&e),
            }
        }
        ("POST", "/api/suggest") => {
            let req: SuggestRequest = match serde_json::from_str(body) {
                Ok(req) => req,
                Err(e) => return error_response(&FishboneError::Json(e)),
            };
            let outcome = state.suggestions.suggest(&req.issue).await;

            let prefill: Vec<serde_json::Value> = match req.domain.as_deref().map(|d| state.registry.get(d)) {
                Some(Ok(template)) => prefill_from_suggestions(&template.categories, outcome.causes())
                    .into_iter()
                    .map(|(category, causes)| serde_json::json!({ "category": category, "causes": causes }))
                    .collect(),
                Some(Err(e)) => return error_response(&e),
                None => Vec::new(),
            };

            let payload = serde_json::json!({ "outcome": outcome, "prefill": prefill });
            HttpResponse::json(200, "OK", payload.to_string())
        }
        _ => HttpResponse::error(404, "Not Found", "no such endpoint"),
    }
}

fn parse_form(body: &str) -> dq_fishbone::Result<FormState> {
    if body.is_empty() {
        return Err(FishboneError::Config("JSON body required".to_string()));
    }
    Ok(serde_json::from_str(body)?)
}

fn error_response(e: &FishboneError) -> HttpResponse {
    match e {
        FishboneError::UnknownDomain(_)
        | FishboneError::UnknownCategory { .. }
        | FishboneError::InvalidRating(_)
        | FishboneError::Config(_)
        | FishboneError::Json(_) => HttpResponse::error(400, "Bad Request", &e.to_string()),
        _ => {
            error!("Request failed: {}", e);
            HttpResponse::error(500, "Internal Server Error", &e.to_string())
        }
    }
}
