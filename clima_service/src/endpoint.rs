/// HTTP endpoint for reading stored samples
///
/// Endpoints:
/// - GET /clima/latest - The most recent sample
/// - GET /clima?from=<rfc3339>&to=<rfc3339> - Samples in a closed range, oldest first
/// - GET /health - Service health check
///
/// Routing is a pure function of (method, url, store) so it can be tested
/// without a socket. `serve` feeds it from a tiny_http server through a
/// fixed worker pool.

use crate::clock::to_local_rfc3339;
use crate::condition::Condition;
use crate::model::{StoreError, WeatherSample};
use crate::store::SampleStore;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use threadpool::ThreadPool;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

const AVAILABLE_ENDPOINTS: [&str; 3] = ["/clima/latest", "/clima?from=&to=", "/health"];

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// One sample as served over HTTP. Field names are part of the public
/// contract.
#[derive(Debug, Serialize)]
pub struct SampleResponse {
    pub id: i64,
    /// RFC 3339 in the service timezone.
    pub timestamp: String,
    pub temperatura: f64,
    pub humedad: i32,
    pub estado_clima: Condition,
}

impl SampleResponse {
    pub fn from_sample(sample: &WeatherSample, tz: &Tz) -> Self {
        Self {
            id: sample.id,
            timestamp: to_local_rfc3339(sample.timestamp, tz),
            temperatura: sample.temperature,
            humedad: sample.humidity,
            estado_clima: sample.condition,
        }
    }
}

/// Status plus optional JSON body, before it is turned into a tiny_http
/// response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl ApiResponse {
    fn json(status: u16, body: serde_json::Value) -> Self {
        Self {
            status,
            body: Some(body),
        }
    }

    fn empty(status: u16) -> Self {
        Self { status, body: None }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Dispatches one request against the store.
pub fn route(method: &Method, url: &str, store: &dyn SampleStore, tz: &Tz) -> ApiResponse {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };

    match method {
        Method::Options => ApiResponse::empty(204),
        Method::Get => match path {
            "/clima/latest" => handle_latest(store, tz),
            "/clima" => handle_range(store, tz, query),
            "/health" => handle_health(),
            _ => ApiResponse::json(
                404,
                json!({
                    "error": "Not found",
                    "available_endpoints": AVAILABLE_ENDPOINTS,
                }),
            ),
        },
        _ => ApiResponse::json(405, json!({ "error": "Method not allowed" })),
    }
}

/// Handle /clima/latest
fn handle_latest(store: &dyn SampleStore, tz: &Tz) -> ApiResponse {
    match store.latest() {
        Ok(sample) => ApiResponse::json(200, json!(SampleResponse::from_sample(&sample, tz))),
        Err(StoreError::NotFound) => not_found(),
        Err(e) => {
            error!(error = %e, "latest sample query failed");
            not_found()
        }
    }
}

/// Handle /clima?from=..&to=..
fn handle_range(store: &dyn SampleStore, tz: &Tz, query: &str) -> ApiResponse {
    let (from, to) = match parse_range(query) {
        Ok(range) => range,
        Err(message) => return ApiResponse::json(400, json!({ "error": message })),
    };

    match store.between(from, to) {
        Ok(samples) => {
            let body: Vec<SampleResponse> = samples
                .iter()
                .map(|s| SampleResponse::from_sample(s, tz))
                .collect();
            ApiResponse::json(200, json!(body))
        }
        Err(e) => {
            error!(error = %e, "range query failed");
            not_found()
        }
    }
}

/// Handle /health
fn handle_health() -> ApiResponse {
    ApiResponse::json(
        200,
        json!({
            "status": "ok",
            "service": "clima_service",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

fn not_found() -> ApiResponse {
    ApiResponse::json(404, json!({ "error": "No encontrado" }))
}

/// Extracts `from` and `to` from a query string. Both are required.
fn parse_range(query: &str) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    let mut from = None;
    let mut to = None;

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value).map_err(|_| format!("'{}' is not valid UTF-8", key))?;
        match key {
            "from" => from = Some(parse_instant("from", &value)?),
            "to" => to = Some(parse_instant("to", &value)?),
            _ => {}
        }
    }

    match (from, to) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err("both 'from' and 'to' query parameters are required".to_string()),
    }
}

fn parse_instant(key: &str, value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("'{}' must be an RFC 3339 timestamp: {}", key, e))
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Server-side knobs for the endpoint.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub timezone: Tz,
    pub cors_allow_origin: Option<String>,
    pub workers: usize,
}

/// Bind the HTTP listener on all interfaces
pub fn bind(port: u16) -> Result<Server, String> {
    Server::http(format!("0.0.0.0:{}", port)).map_err(|e| format!("Failed to start HTTP server on port {}: {}", port, e))
}

/// Serve requests from `server` until it is dropped
pub fn serve(server: Server, store: Arc<dyn SampleStore>, settings: EndpointSettings) {
    let pool = ThreadPool::new(settings.workers.max(1));
    let settings = Arc::new(settings);

    info!(addr = ?server.server_addr(), workers = pool.max_count(), "HTTP endpoint listening");

    for request in server.incoming_requests() {
        let store = Arc::clone(&store);
        let settings = Arc::clone(&settings);
        pool.execute(move || handle_request(request, store.as_ref(), &settings));
    }
}

fn handle_request(request: Request, store: &dyn SampleStore, settings: &EndpointSettings) {
    let api = route(request.method(), request.url(), store, &settings.timezone);
    debug!(method = ?request.method(), url = %request.url(), status = api.status, "request served");

    let response = create_response(api, settings.cors_allow_origin.as_deref());
    if let Err(e) = request.respond(response) {
        warn!(error = %e, "failed to send response");
    }
}

/// Create HTTP response with JSON body and optional CORS headers
fn create_response(api: ApiResponse, cors_origin: Option<&str>) -> Response<std::io::Cursor<Vec<u8>>> {
    let bytes = match &api.body {
        Some(json) => serde_json::to_vec_pretty(json).unwrap_or_default(),
        None => Vec::new(),
    };

    let mut response = Response::from_data(bytes).with_status_code(StatusCode::from(api.status));

    if api.body.is_some() {
        if let Ok(h) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
            response.add_header(h);
        }
    }

    if let Some(origin) = cors_origin {
        let headers = [
            ("Access-Control-Allow-Origin", origin),
            ("Access-Control-Allow-Methods", "GET, OPTIONS"),
        ];
        for (name, value) in headers {
            match Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                Ok(h) => response.add_header(h),
                Err(()) => warn!(header = name, "invalid CORS header value"),
            }
        }
    }

    response
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
