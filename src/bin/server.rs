//! HTTP server for QueryCraft
//! Plain HTTP/1.1 over tokio, one request per connection

use querycraft::{sample_catalog, EngineConfig, QueryCraftError, QueryEngine, SqliteDatabase};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Requests larger than this are rejected
const MAX_REQUEST_BYTES: usize = 64 * 1024;

struct AppState {
    engine: QueryEngine,
    db: SqliteDatabase,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::load(std::env::var("QUERYCRAFT_CONFIG").ok().as_deref().map(std::path::Path::new))?;
    info!("Starting QueryCraft API server on {}", config.bind_address);

    let db = SqliteDatabase::open(&config.database_path)?.with_max_rows(config.max_result_rows);
    let engine = QueryEngine::from_source(&config, &db)?;
    let snapshot = engine.schema();
    info!(
        "Schema v{} loaded from {} ({} tables)",
        snapshot.version,
        config.database_path.display(),
        snapshot.model.table_count()
    );
    let state = Arc::new(AppState { engine, db });

    let listener = TcpListener::bind(config.bind_address.as_str()).await?;
    info!("Server listening on {}", config.bind_address);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, Arc::clone(&state)));
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    match read_request(&mut stream).await {
        Ok(request) => {
            let response = handle_request(&request, state).await;
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                error!("Failed to write response: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to read from stream: {}", e);
        }
    }
}

/// Read headers, then as much body as Content-Length announces.
async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut data = Vec::new();
    let mut buffer = [0; 4096];
    loop {
        let size = stream.read(&mut buffer).await?;
        if size == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..size]);
        if data.len() >= MAX_REQUEST_BYTES {
            break;
        }
        let text = String::from_utf8_lossy(&data);
        if let Some(header_end) = text.find("\r\n\r\n") {
            let expected = content_length(&text[..header_end]);
            if data.len() >= header_end + 4 + expected {
                break;
            }
        }
    }
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0)
}

async fn handle_request(request: &str, state: Arc<AppState>) -> String {
    let lines: Vec<&str> = request.lines().collect();
    if lines.is_empty() {
        return create_response(400, "Bad Request", "{}");
    }

    let parts: Vec<&str> = lines[0].split_whitespace().collect();
    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    // Drop query parameters and trailing slashes
    let path = parts[1].split('?').next().unwrap_or("/").trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };
    info!("Request: {} {}", method, path);

    let mut headers = HashMap::new();
    for line in &lines[1..] {
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    match (method, path) {
        ("GET", "/health") => json_response(&json!({
            "status": "ok",
            "service": "querycraft",
            "schema_version": state.engine.schema().version,
        })),
        ("GET", "/api/v1/schema") => json_response(&*state.engine.schema()),
        ("GET", "/api/v1/sample-queries") => json_response(&sample_catalog()),
        ("GET", "/api/v1/erd") => {
            let graph = state.engine.erd();
            json_response(&json!({
                "mermaid": graph.to_mermaid(),
                "graph": graph,
            }))
        }
        ("POST", "/api/v1/query") => {
            if headers
                .get("content-type")
                .map(|ct| !ct.starts_with("application/json"))
                .unwrap_or(false)
            {
                return create_response(415, "Unsupported Media Type", r#"{"error":"Expected application/json"}"#);
            }
            let body = parse_body(request);
            let question = body
                .get("question")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .trim()
                .to_string();
            if question.is_empty() {
                return create_response(400, "Bad Request", r#"{"error":"Question is required"}"#);
            }
            let execute = body.get("execute").and_then(|v| v.as_bool()).unwrap_or(true);

            let result = tokio::task::spawn_blocking(move || {
                if execute {
                    state
                        .engine
                        .ask(&question, &state.db)
                        .and_then(|r| serde_json::to_value(r).map_err(QueryCraftError::from))
                } else {
                    state
                        .engine
                        .generate(&question)
                        .and_then(|q| serde_json::to_value(q).map_err(QueryCraftError::from))
                        .map(|q| json!({ "query": q }))
                }
            })
            .await;

            match result {
                Ok(Ok(value)) => json_response(&value),
                Ok(Err(e)) => error_response(&e),
                Err(e) => {
                    error!("Query task failed: {}", e);
                    create_response(500, "Internal Server Error", r#"{"error":"Query task failed"}"#)
                }
            }
        }
        ("POST", "/api/v1/schema/refresh") => {
            let result = tokio::task::spawn_blocking(move || state.engine.refresh(&state.db)).await;
            match result {
                Ok(Ok(snapshot)) => json_response(&json!({
                    "schema_version": snapshot.version,
                    "built_at": snapshot.built_at,
                    "tables": snapshot.model.table_count(),
                    "relationships": snapshot.model.relationships().len(),
                })),
                Ok(Err(e)) => error_response(&e),
                Err(e) => {
                    error!("Refresh task failed: {}", e);
                    create_response(500, "Internal Server Error", r#"{"error":"Refresh task failed"}"#)
                }
            }
        }
        ("OPTIONS", _) => {
            // CORS preflight
            create_response(200, "OK", "")
        }
        _ => {
            warn!("404: {} {} not found", method, path);
            create_response(
                404,
                "Not Found",
                &json!({ "error": format!("Endpoint not found: {} {}", method, path) }).to_string(),
            )
        }
    }
}

fn parse_body(request: &str) -> Value {
    let body_start = request.find("\r\n\r\n").map(|i| i + 4).unwrap_or(request.len());
    serde_json::from_str(request[body_start..].trim()).unwrap_or(Value::Null)
}

fn json_response<T: serde::Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string(value) {
        Ok(body) => create_response(200, "OK", &body),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            create_response(500, "Internal Server Error", r#"{"error":"Failed to serialize response"}"#)
        }
    }
}

/// Execution errors are the caller's SQL problem; schema errors mean the
/// service cannot answer anything until the database is reachable again.
fn error_response(err: &QueryCraftError) -> String {
    let (status, text) = match err {
        QueryCraftError::Execution(_) => (400, "Bad Request"),
        e if e.is_schema_failure() => (503, "Service Unavailable"),
        _ => (500, "Internal Server Error"),
    };
    warn!("Request failed with {}: {}", status, err);
    let message = match err {
        QueryCraftError::Execution(message) => message.clone(),
        other => other.to_string(),
    };
    create_response(status, text, &json!({ "error": message }).to_string())
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
