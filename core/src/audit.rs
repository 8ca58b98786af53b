//! Audit log of sent and received messages.
//!
//! Both directions are written as `info` events on the `MESSAGING` target.
//! Callers check [`enabled`] first so no record is built when nobody listens.

use std::collections::BTreeMap;

use tracing::{info, Level};

use crate::http::HttpMethod;

/// Target of audit events.
pub const MESSAGING_LOG_TARGET: &str = "MESSAGING";

/// Whether audit events would be recorded.
pub fn enabled() -> bool {
    tracing::enabled!(target: MESSAGING_LOG_TARGET, Level::INFO)
}

/// Outbound record, written before transmission.
pub fn emit_request_log(
    method: HttpMethod,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: &str,
    charset: &str,
) {
    info!(
        target: MESSAGING_LOG_TARGET,
        destination = %format!("{method} {url}"),
        charset,
        message_header = ?headers,
        message_body = body,
        "@@@@ HTTP SENT MESSAGE @@@@"
    );
}

/// Inbound record, written before the payload is deserialized.
pub fn emit_response_log(status_code: &str, headers: &BTreeMap<String, String>, body: &str, charset: &str) {
    info!(
        target: MESSAGING_LOG_TARGET,
        charset,
        message_header = ?headers,
        message_body = body,
        "@@@@ HTTP RECEIVED MESSAGE @@@@ STATUS_CODE={status_code}"
    );
}
