//! Error types for the HTTP messaging client.
//!
//! # Design
//! Every failure carries the target URL (empty if the call never got that
//! far) and the HTTP status code when one was observed, so a failed call
//! can be diagnosed from the error alone. `Timeout` is kept apart from
//! `Transport` so callers can apply their own retry policy to it. Format
//! errors carry the payload or the raw response that could not be converted.

use std::fmt::Display;
use std::io;

use thiserror::Error;

use crate::codec::FormatError;
use crate::http::HeaderFields;
use crate::types::Record;

/// Boxed cause of a transport failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by the protocol executor and the messaging client.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// The configured HTTP method is not GET, POST, PUT or DELETE.
    #[error("{method} is unsupported HTTP method.")]
    UnsupportedMethod { method: String },

    /// The connection failed or the response could not be read.
    #[error("{}", with_context(.source, .target_url, .status_code))]
    Transport {
        target_url: String,
        status_code: Option<u16>,
        #[source]
        source: BoxError,
    },

    /// The connect or read timeout elapsed.
    #[error("{}", with_context("Time-out occurs.", .target_url, .status_code))]
    Timeout {
        target_url: String,
        status_code: Option<u16>,
        #[source]
        source: io::Error,
    },

    /// The request payload could not be serialized.
    #[error("{}", format_message("Invalid request message format.", .request_id, .target_url, &None))]
    InvalidRequestFormat {
        request_id: String,
        target_url: String,
        request_data: Record,
        #[source]
        source: FormatError,
    },

    /// The response payload could not be deserialized.
    #[error("{}", format_message("Invalid receive message format.", .request_id, .target_url, .status_code))]
    InvalidResponseFormat {
        request_id: String,
        target_url: String,
        status_code: Option<u16>,
        header_fields: HeaderFields,
        receive_data: String,
        #[source]
        source: FormatError,
    },
}

impl MessagingError {
    pub fn transport<E: Into<BoxError>>(target_url: &str, status_code: Option<u16>, source: E) -> Self {
        Self::Transport {
            target_url: target_url.to_string(),
            status_code,
            source: source.into(),
        }
    }

    pub fn timeout(target_url: &str, status_code: Option<u16>, source: io::Error) -> Self {
        Self::Timeout {
            target_url: target_url.to_string(),
            status_code,
            source,
        }
    }

    /// Target URL of the call, `None` for errors raised before one was resolved.
    pub fn target_url(&self) -> Option<&str> {
        match self {
            Self::UnsupportedMethod { .. } => None,
            Self::Transport { target_url, .. }
            | Self::Timeout { target_url, .. }
            | Self::InvalidRequestFormat { target_url, .. }
            | Self::InvalidResponseFormat { target_url, .. } => Some(target_url),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status_code, .. }
            | Self::Timeout { status_code, .. }
            | Self::InvalidResponseFormat { status_code, .. } => *status_code,
            Self::UnsupportedMethod { .. } | Self::InvalidRequestFormat { .. } => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Append the URL and status code to a base message:
/// `<base> URL=[<url>]. status code=[<n>].`
fn with_context(base: impl Display, target_url: &str, status_code: &Option<u16>) -> String {
    let mut msg = base.to_string();
    if !target_url.is_empty() {
        msg.push_str(&format!(" URL=[{target_url}]."));
    }
    if let Some(code) = status_code {
        msg.push_str(&format!(" status code=[{code}]."));
    }
    msg
}

fn format_message(base: &str, request_id: &str, target_url: &str, status_code: &Option<u16>) -> String {
    with_context(format!("{base} requestId=[{request_id}]."), target_url, status_code)
}
