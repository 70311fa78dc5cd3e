mod analytics;
mod errors;
mod fares;
mod health;
mod map;
mod peaks;
mod response;
mod templating;
mod vendors;


use std::collections::HashMap;
use std::convert::Infallible;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use askama::Template;
use form_urlencoded;
use http_body_util::Full;
use hyper::{Method, Request, Response};
use hyper::body::{Bytes, Incoming};
use hyper::http::request::Parts;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use once_cell::sync::OnceCell;
use serde::Serialize;
use serde_json;
use taxidash_common::config::{DashConfig, DEFAULT_CONFIG_FILE_NAME};
use taxidash_common::db;
use taxidash_common::errors::DbError;
use taxidash_common::filters::QueryPairs;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::analytics::{handle_refresh_trip_analytics, handle_trip_analytics, handle_trip_summary};
use crate::errors::WebError;
use crate::fares::handle_fare_tip_analysis;
use crate::health::handle_health;
use crate::map::handle_map_density;
use crate::peaks::handle_peak_hours;
use crate::response::{ApiResponse, Metadata};
use crate::templating::IndexTemplate;
use crate::vendors::handle_vendor_performance;


pub(crate) static CONFIG: OnceCell<DashConfig> = OnceCell::new();

pub(crate) type ResponseResult = Result<Response<Full<Bytes>>, Infallible>;


fn get_query_pairs(parts: &Parts) -> QueryPairs<'_> {
    if let Some(q) = parts.uri.query() {
        form_urlencoded::parse(q.as_bytes())
            .collect()
    } else {
        HashMap::new()
    }
}


fn response_builder(status: u16) -> hyper::http::response::Builder {
    Response::builder()
        .status(status)
        .header("Access-Control-Allow-Origin", "*")
}

fn render_body(content_type: &str, body: String, status: u16, headers: Vec<(String, String)>) -> Option<Response<Full<Bytes>>> {
    let mut builder = response_builder(status)
        .header("Content-Type", content_type);
    for (k, v) in &headers {
        builder = builder.header(k, v);
    }
    match builder.body(Full::new(Bytes::from(body))) {
        Ok(r) => Some(r),
        Err(e) => {
            error!("failed to assemble response: {}", e);
            None
        },
    }
}

fn render_json<S: Serialize>(value: &S, status: u16, headers: Vec<(String, String)>) -> Option<Response<Full<Bytes>>> {
    let rendered = match serde_json::to_string_pretty(value) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to render JSON: {}", e);
            return None;
        },
    };
    render_body("application/json", rendered, status, headers)
}

fn render_template<T: Template>(value: &T, status: u16, headers: Vec<(String, String)>) -> Option<Response<Full<Bytes>>> {
    let rendered = match value.render() {
        Ok(s) => s,
        Err(e) => {
            error!("failed to render template: {}", e);
            return None;
        },
    };
    render_body("text/html; charset=utf-8", rendered, status, headers)
}

// query_pairs is queried for "format" to decide between HTML and JSON
fn render_response<S: Serialize + Template>(value: &S, query_pairs: &QueryPairs<'_>, status: u16, headers: Vec<(String, String)>) -> Option<Response<Full<Bytes>>> {
    if query_pairs.get("format").map(|f| f == "json").unwrap_or(false) {
        render_json(value, status, headers)
    } else {
        render_template(value, status, headers)
    }
}

pub(crate) fn render_api_response<T: Serialize>(metadata: Metadata, data: &T) -> ResponseResult {
    let response = ApiResponse {
        metadata,
        data,
    };
    match render_json(&response, 200, vec![]) {
        Some(r) => Ok(r),
        None => return_500(),
    }
}


fn error_body(message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": message,
    })
}

pub(crate) fn return_400(reason: &str) -> ResponseResult {
    match render_json(&error_body(reason), 400, vec![]) {
        Some(r) => Ok(r),
        None => return_500(),
    }
}

fn return_404() -> ResponseResult {
    match render_json(&error_body("not found"), 404, vec![]) {
        Some(r) => Ok(r),
        None => return_500(),
    }
}

pub(crate) fn return_405(allowed_methods: &[&str]) -> ResponseResult {
    let headers = vec![
        ("Allow".to_owned(), allowed_methods.join(", ")),
    ];
    match render_json(&error_body("method not allowed"), 405, headers) {
        Some(r) => Ok(r),
        None => return_500(),
    }
}

pub(crate) fn return_500() -> ResponseResult {
    let response_res = response_builder(500)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from("500 Internal Server Error")));
    match response_res {
        Err(e) => panic!("failed to construct 500 response: {}", e),
        Ok(b) => Ok(b),
    }
}

/// 503 if the database is unreachable, 500 if a statement failed.
pub(crate) fn return_db_error(e: &DbError) -> ResponseResult {
    error!("{}", e);
    let status = if e.is_unavailable() { 503 } else { 500 };
    match render_json(&error_body(&e.to_string()), status, vec![]) {
        Some(r) => Ok(r),
        None => return_500(),
    }
}

fn return_preflight() -> ResponseResult {
    let response_res = response_builder(204)
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Full::new(Bytes::new()));
    match response_res {
        Ok(r) => Ok(r),
        Err(e) => {
            error!("failed to assemble preflight response: {}", e);
            return_500()
        },
    }
}


/// Connects to the database, or produces the error response to return instead.
pub(crate) async fn connect_to_db() -> Result<tokio_postgres::Client, ResponseResult> {
    let config = match CONFIG.get() {
        Some(c) => c,
        None => {
            error!("no config set");
            return Err(return_500());
        },
    };
    db::connect(&config.db).await
        .map_err(|e| return_db_error(&e))
}


fn handle_index(parts: &Parts) -> ResponseResult {
    if parts.method != Method::GET {
        return return_405(&["GET"]);
    }

    let query_pairs = get_query_pairs(parts);
    let template = IndexTemplate::new();
    match render_response(&template, &query_pairs, 200, vec![]) {
        Some(r) => Ok(r),
        None => return_500(),
    }
}


async fn handle_request(request: Request<Incoming>) -> ResponseResult {
    let (parts, _) = request.into_parts();
    debug!("{} {}", parts.method, parts.uri);

    if parts.method == Method::OPTIONS {
        return return_preflight();
    }

    match parts.uri.path() {
        "/" => handle_index(&parts),
        "/api/health" => handle_health(&parts).await,
        "/api/trip-analytics" => handle_trip_analytics(&parts).await,
        "/api/refresh-trip-analytics" => handle_refresh_trip_analytics(&parts).await,
        "/api/trip-summary" => handle_trip_summary(&parts).await,
        "/api/map-density" => handle_map_density(&parts).await,
        "/api/fare-tip-analysis" => handle_fare_tip_analysis(&parts).await,
        "/api/peak-hours" => handle_peak_hours(&parts).await,
        "/api/vendor-performance" => handle_vendor_performance(&parts).await,
        _ => return_404(),
    }
}


async fn run() -> Result<(), WebError> {
    // set up tracing
    let (stderr_non_blocking, _guard) = tracing_appender::non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(std::io::stderr());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(stderr_non_blocking)
        .init();

    // get config path and load config
    let args_os: Vec<OsString> = env::args_os().collect();
    let config_path = match args_os.get(1) {
        Some(cp) => PathBuf::from(cp),
        None => PathBuf::from(DEFAULT_CONFIG_FILE_NAME),
    };
    let config = DashConfig::load(&config_path)
        .map_err(|e| WebError::Config(e))?;
    let listen_address = config.web.listen;
    CONFIG.set(config)
        .map_err(|_| WebError::ConfigAlreadySet)?;

    let listener = TcpListener::bind(listen_address).await
        .map_err(|e| WebError::Binding(e))?;
    info!("listening on {}", listen_address);

    loop {
        let (stream, remote_address) = match listener.accept().await {
            Ok(sa) => sa,
            Err(e) => {
                error!("failed to accept connection: {}", e);
                continue;
            },
        };
        let io = TokioIo::new(stream);
        tokio::spawn(async move {
            let serve_res = http1::Builder::new()
                .serve_connection(io, service_fn(handle_request))
                .await;
            if let Err(e) = serve_res {
                debug!("error serving connection from {}: {}", remote_address, e);
            }
        });
    }
}

fn main() {
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async {
            run().await
        });

    std::process::exit(
        match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{}", e);
                1
            },
        }
    )
}


#[cfg(test)]
pub(crate) mod tests {
    use http_body_util::BodyExt;

    use super::*;

    pub(crate) async fn response_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body()
            .collect().await
            .unwrap()
            .to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn parts_for(method: Method, uri: &str) -> Parts {
        let (parts, _) = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_query_pairs() {
        let parts = parts_for(Method::GET, "/api/peak-hours?vendor_id=CMT&start=2025-01-01%2000%3A00%3A00");
        let pairs = get_query_pairs(&parts);
        assert_eq!(pairs.get("vendor_id").map(|v| v.as_ref()), Some("CMT"));
        assert_eq!(pairs.get("start").map(|v| v.as_ref()), Some("2025-01-01 00:00:00"));
        assert_eq!(get_query_pairs(&parts_for(Method::GET, "/api/health")).len(), 0);
    }

    #[test]
    fn test_error_responses() {
        let response = return_400("hour must be an integer").unwrap();
        assert_eq!(response.status(), 400);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers()["Content-Type"], "application/json");

        let response = return_405(&["POST"]).unwrap();
        assert_eq!(response.status(), 405);
        assert_eq!(response.headers()["Allow"], "POST");

        let response = return_404().unwrap();
        assert_eq!(response.status(), 404);

        let response = return_preflight().unwrap();
        assert_eq!(response.status(), 204);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");
    }

    #[test]
    fn test_index() {
        let response = handle_index(&parts_for(Method::GET, "/")).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["Content-Type"], "text/html; charset=utf-8");

        let response = handle_index(&parts_for(Method::GET, "/?format=json")).unwrap();
        assert_eq!(response.headers()["Content-Type"], "application/json");

        let response = handle_index(&parts_for(Method::POST, "/")).unwrap();
        assert_eq!(response.status(), 405);
    }
}
