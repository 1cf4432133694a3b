/// HTTP endpoint for the gas station service
///
/// Exposes the proximity query, the station list and a manual import
/// trigger. Requests are handed to a worker pool, so a long-running
/// `POST /import` never blocks queries.
///
/// Endpoints:
/// - GET  /                     - Service banner
/// - GET  /health               - Service health check
/// - GET  /db-test              - Store readiness probe
/// - POST /import               - Run one import cycle now
/// - GET  /gas-stations         - All stations
/// - GET  /gas-stations/nearby  - Stations within `radius` meters of `lat`/`lng`

use crate::importer::{ImportError, Importer};
use crate::query::{ProximityQueryService, QueryError};
use crate::repository::StationRepository;
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use threadpool::ThreadPool;
use tiny_http::Method;

const SERVICE_NAME: &str = "gas_station_service";

const BANNER: &str = "Gas Station Import Service is running. \
Use `curl -X POST http://localhost:3000/import` to trigger an import.";

const ENDPOINTS: [&str; 6] = [
    "/",
    "/health",
    "/db-test",
    "/import",
    "/gas-stations",
    "/gas-stations/nearby",
];

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("Failed to start HTTP server on port {port}: {reason}")]
    Bind { port: u16, reason: String },
}

/// Everything a request handler needs. Shared by all workers.
pub struct EndpointState {
    pub importer: Arc<Importer>,
    pub queries: ProximityQueryService,
    pub repository: Arc<dyn StationRepository>,
}

/// A routed response, before it is turned into bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(u16, serde_json::Value),
    Text(u16, String),
}

impl Reply {
    pub fn status(&self) -> u16 {
        match self {
            Reply::Json(status, _) | Reply::Text(status, _) => *status,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port. Blocks for the
/// lifetime of the server.
pub fn start_endpoint_server(
    port: u16,
    state: Arc<EndpointState>,
    workers: usize,
) -> Result<(), EndpointError> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port)).map_err(|e| EndpointError::Bind {
        port,
        reason: e.to_string(),
    })?;

    let pool = ThreadPool::with_name("http-worker".to_string(), workers.max(1));

    tracing::info!("HTTP endpoint listening on http://0.0.0.0:{}", port);
    for endpoint in ENDPOINTS {
        tracing::debug!("   {}", endpoint);
    }

    for request in server.incoming_requests() {
        let state = Arc::clone(&state);
        pool.execute(move || handle_request(&state, request));
    }

    Ok(())
}

fn handle_request(state: &EndpointState, request: tiny_http::Request) {
    let reply = route(state, request.method(), request.url());
    tracing::debug!(
        method = %request.method(),
        url = request.url(),
        status = reply.status(),
        "Handled request"
    );

    let response = match reply {
        Reply::Json(status, body) => create_response(status, body),
        Reply::Text(status, body) => create_text_response(status, body),
    };

    if let Err(e) = request.respond(response) {
        tracing::warn!("Failed to send response: {}", e);
    }
}

/// Dispatches one request to its handler.
pub fn route(state: &EndpointState, method: &Method, url: &str) -> Reply {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let path = if path.len() > 1 { path.trim_end_matches('/') } else { path };

    match (method, path) {
        (Method::Get, "/") => Reply::Text(200, BANNER.to_string()),
        (Method::Get, "/health") => handle_health(state),
        (Method::Get, "/db-test") => handle_db_test(state),
        (Method::Post, "/import") => handle_import(state),
        (Method::Get, "/gas-stations") => handle_list(state),
        (Method::Get, "/gas-stations/nearby") => handle_nearby(state, &parse_query(query)),
        (_, known) if ENDPOINTS.contains(&known) => Reply::Json(
            405,
            json!({
                "error": "Method not allowed",
                "path": known
            }),
        ),
        _ => Reply::Json(
            404,
            json!({
                "error": "Not found",
                "available_endpoints": ENDPOINTS
            }),
        ),
    }
}

/// Handle /health endpoint
fn handle_health(state: &EndpointState) -> Reply {
    Reply::Json(
        200,
        json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": Utc::now().to_rfc3339(),
            "import_phase": state.importer.phase()
        }),
    )
}

/// Handle /db-test endpoint
fn handle_db_test(state: &EndpointState) -> Reply {
    match state.repository.check_ready() {
        Ok(()) => Reply::Json(
            200,
            json!({
                "status": "Database ready",
                "time": Utc::now().to_rfc3339()
            }),
        ),
        Err(e) => {
            tracing::error!("Database test failed: {}", e);
            Reply::Json(
                503,
                json!({
                    "error": "Database not ready",
                    "message": e.to_string()
                }),
            )
        }
    }
}

/// Handle POST /import endpoint
fn handle_import(state: &EndpointState) -> Reply {
    match state.importer.run_cycle() {
        Ok(summary) => Reply::Json(
            200,
            json!({
                "message": "Import completed",
                "summary": summary
            }),
        ),
        Err(e) => {
            let status = match e {
                ImportError::AlreadyRunning => 409,
                ImportError::Fetch(_) => 502,
                ImportError::Readiness(_) | ImportError::Persist(_) => 500,
            };
            // A refused trigger reports the phase of the cycle holding the slot
            let phase = e.phase().unwrap_or_else(|| state.importer.phase());
            Reply::Json(
                status,
                json!({
                    "error": "Import failed",
                    "phase": phase,
                    "message": e.to_string()
                }),
            )
        }
    }
}

/// Handle /gas-stations endpoint
fn handle_list(state: &EndpointState) -> Reply {
    match state.queries.list_all() {
        Ok(stations) => Reply::Json(200, json!(stations)),
        Err(e) => internal_error(&e),
    }
}

/// Handle /gas-stations/nearby endpoint
fn handle_nearby(state: &EndpointState, params: &HashMap<String, String>) -> Reply {
    let param = |name: &str| params.get(name).map(String::as_str);

    match state
        .queries
        .find_nearby(param("lat"), param("lng"), param("radius"))
    {
        Ok(stations) => Reply::Json(200, json!(stations)),
        Err(QueryError::InvalidQuery(message)) => {
            tracing::debug!("Rejected nearby query: {}", message);
            Reply::Json(400, json!({ "error": message }))
        }
        Err(e) => internal_error(&e),
    }
}

fn internal_error(e: &QueryError) -> Reply {
    tracing::error!("Query failed: {}", e);
    Reply::Json(500, json!({ "error": "Internal Server Error" }))
}

/// Decodes `a=1&b=x%20y` into a map. The first occurrence of a key wins.
fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params.entry(decode_component(key)).or_insert_with(|| decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: serde_json::Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string());
    with_content_type(tiny_http::Response::from_data(body.into_bytes()), status_code, "application/json")
}

fn create_text_response(status_code: u16, text: String) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    with_content_type(tiny_http::Response::from_string(text), status_code, "text/plain; charset=utf-8")
}

fn with_content_type(
    response: tiny_http::Response<std::io::Cursor<Vec<u8>>>,
    status_code: u16,
    content_type: &str,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let response = response.with_status_code(tiny_http::StatusCode::from(status_code));
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], content_type.as_bytes()) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
