//! Stub HTTP endpoint for exercising the messaging client.
//!
//! Each route reproduces one situation the client must handle: echoing the
//! request, arbitrary status codes, slow replies, bodies in non-UTF-8
//! encodings, malformed payloads and repeated headers.

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::{Path, RawQuery},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

pub const JSON_UTF8: &str = "application/json;charset=UTF-8";

/// What `/messages/echo` saw of the incoming request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Echo {
    pub method: String,
    pub raw_query: Option<String>,
    pub message_id: Option<String>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/messages/echo", any(echo))
        .route("/messages/invalid", any(invalid_json))
        .route("/status/{code}", any(status))
        .route("/slow/{millis}", any(slow))
        .route("/latin1", get(latin1))
        .route("/shift_jis", get(shift_jis))
        .route("/multi-header", get(multi_header))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, RawQuery(raw_query): RawQuery, headers: HeaderMap, body: Bytes) -> Response {
    let echo = Echo {
        method: method.to_string(),
        raw_query,
        message_id: header_value(&headers, "x-message-id"),
        content_type: header_value(&headers, header::CONTENT_TYPE.as_str()),
        accept: header_value(&headers, header::ACCEPT.as_str()),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    debug!(?echo, "echo");

    let mut response = json_response(StatusCode::OK, &echo);
    if let Some(id) = echo.message_id.as_deref().and_then(|id| HeaderValue::from_str(id).ok()) {
        response.headers_mut().insert("x-correlation-id", id);
    }
    response
}

async fn status(Path(code): Path<u16>) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    debug!(%status, "status");
    json_response(status, &serde_json::json!({ "status": status.as_u16() }))
}

async fn slow(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "done"
}

/// "café" in ISO-8859-1 with no Content-Type.
async fn latin1() -> Response {
    Response::new(Body::from(vec![0x63, 0x61, 0x66, 0xE9]))
}

/// "テスト" in Shift_JIS.
async fn shift_jis() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=Shift_JIS")],
        vec![0x83u8, 0x65, 0x83, 0x58, 0x83, 0x67],
    )
}

async fn invalid_json() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "not json")
}

async fn multi_header() -> impl IntoResponse {
    let mut headers = HeaderMap::new();
    headers.append("x-trace", HeaderValue::from_static("first"));
    headers.append("x-trace", HeaderValue::from_static("second"));
    (headers, "ok")
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response {
    let body = serde_json::to_vec(value).unwrap_or_default();
    (status, [(header::CONTENT_TYPE, JSON_UTF8)], body).into_response()
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_serializes_camel_case() {
        let echo = Echo {
            method: "POST".to_string(),
            raw_query: Some("a=1".to_string()),
            message_id: None,
            content_type: Some(JSON_UTF8.to_string()),
            accept: None,
            body: "{}".to_string(),
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["rawQuery"], "a=1");
        assert_eq!(json["contentType"], JSON_UTF8);
        assert!(json["messageId"].is_null());
    }

    #[test]
    fn echo_roundtrips_through_json() {
        let json = r#"{"method":"GET","rawQuery":null,"messageId":"m1","contentType":null,"accept":"text/json","body":""}"#;
        let echo: Echo = serde_json::from_str(json).unwrap();
        assert_eq!(echo.message_id.as_deref(), Some("m1"));
        assert_eq!(echo.accept.as_deref(), Some("text/json"));
    }

    #[test]
    fn header_value_skips_missing_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-message-id", HeaderValue::from_static("abc"));
        assert_eq!(header_value(&headers, "x-message-id").as_deref(), Some("abc"));
        assert_eq!(header_value(&headers, "accept"), None);
    }
}
