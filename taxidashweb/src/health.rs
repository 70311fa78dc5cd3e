use std::time::Instant;

use hyper::Method;
use hyper::http::request::Parts;
use serde_json::json;
use taxidash_common::db;
use taxidash_common::errors::DbError;
use tracing::error;

use crate::{render_api_response, render_json, return_405, return_500, ResponseResult, CONFIG};
use crate::response::Metadata;


pub(crate) async fn handle_health(parts: &Parts) -> ResponseResult {
    if parts.method != Method::GET {
        return return_405(&["GET"]);
    }

    let config = match CONFIG.get() {
        Some(c) => c,
        None => {
            error!("no config set");
            return return_500();
        },
    };
    let started = Instant::now();
    let check_res = match db::connect(&config.db).await {
        Ok(client) => db::ping(&client).await,
        Err(e) => Err(e),
    };
    health_response(check_res, started)
}

fn health_response(check_res: Result<(), DbError>, started: Instant) -> ResponseResult {
    match check_res {
        Ok(()) => {
            let metadata = Metadata::new(1, &json!({}), None, started);
            render_api_response(metadata, &json!({"status": "ok"}))
        },
        Err(e) => {
            error!("health check failed: {}", e);
            let body = json!({"status": "error", "details": e.to_string()});
            match render_json(&body, 503, vec![]) {
                Some(r) => Ok(r),
                None => return_500(),
            }
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::response_json;

    #[tokio::test]
    async fn test_healthy_response_shape() {
        let response = health_response(Ok(()), Instant::now()).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["Access-Control-Allow-Origin"], "*");

        let value = response_json(response).await;
        assert_eq!(value["data"], json!({"status": "ok"}));
        assert_eq!(value["metadata"]["row_count"], json!(1));
        assert_eq!(value["metadata"]["filters"], json!({}));
        assert!(value["metadata"].get("data_source").is_none());
    }
}
