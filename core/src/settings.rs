//! Per-destination sender settings.
//!
//! # Design
//! `SenderConfig` holds the plain values a host loads from its
//! configuration (method, URL, proxy, timeouts, user ID) and derives
//! `Deserialize` for that purpose. `MessageSenderSettings` pairs it with the
//! pluggable parts that cannot come from a file: the TLS context provider
//! and the message-ID generator. Settings are read-only once built and are
//! shared between threads behind `Arc`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use ureq::tls::TlsConfig;
use uuid::Uuid;

/// Supplies the TLS configuration for HTTPS destinations.
pub trait TlsContextSettings: Send + Sync {
    /// `None` keeps the platform defaults.
    fn tls_config(&self) -> Option<TlsConfig>;
}

/// Keeps the platform TLS defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopTlsContextSettings;

impl TlsContextSettings for NopTlsContextSettings {
    fn tls_config(&self) -> Option<TlsConfig> {
        None
    }
}

/// Generates the ID sent in the `X-Message-Id` header.
pub trait MessageIdGenerator: Send + Sync {
    /// `None` sends no message ID.
    fn generate_id(&self) -> Option<String>;
}

/// Random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidMessageIdGenerator;

impl MessageIdGenerator for UuidMessageIdGenerator {
    fn generate_id(&self) -> Option<String> {
        Some(Uuid::new_v4().to_string())
    }
}

/// Invalid combination of sender settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("proxy host {host} has no proxy port")]
    MissingProxyPort { host: String },
}

/// Plain, loadable settings of one destination.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SenderConfig {
    pub http_method: String,
    pub uri: String,
    #[serde(default)]
    pub proxy_host: Option<String>,
    /// Required when `proxy_host` is set.
    #[serde(default)]
    pub proxy_port: Option<u16>,
    /// Milliseconds; `0` waits forever.
    #[serde(default)]
    pub connect_timeout_ms: u64,
    /// Milliseconds; `0` waits forever.
    #[serde(default)]
    pub read_timeout_ms: u64,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl SenderConfig {
    pub fn new(http_method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            uri: uri.into(),
            proxy_host: None,
            proxy_port: None,
            connect_timeout_ms: 0,
            read_timeout_ms: 0,
            user_id: None,
        }
    }
}

/// Settings the messaging client reads for one call.
#[derive(Clone)]
pub struct MessageSenderSettings {
    config: SenderConfig,
    tls: Option<Arc<dyn TlsContextSettings>>,
    message_id_generator: Option<Arc<dyn MessageIdGenerator>>,
}

impl MessageSenderSettings {
    pub fn new(config: SenderConfig) -> Self {
        Self {
            config,
            tls: None,
            message_id_generator: None,
        }
    }

    pub fn with_tls(mut self, tls: Arc<dyn TlsContextSettings>) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_message_id_generator(mut self, generator: Arc<dyn MessageIdGenerator>) -> Self {
        self.message_id_generator = Some(generator);
        self
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    pub fn http_method(&self) -> &str {
        &self.config.http_method
    }

    pub fn uri(&self) -> &str {
        &self.config.uri
    }

    /// Proxy as `(host, port)`, if a proxy host is configured.
    pub fn proxy(&self) -> Result<Option<(&str, u16)>, SettingsError> {
        match (self.config.proxy_host.as_deref(), self.config.proxy_port) {
            (None, _) => Ok(None),
            (Some(host), Some(port)) => Ok(Some((host, port))),
            (Some(host), None) => Err(SettingsError::MissingProxyPort {
                host: host.to_string(),
            }),
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.config.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.config.read_timeout_ms)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.config.user_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn tls_config(&self) -> Option<TlsConfig> {
        self.tls.as_ref().and_then(|tls| tls.tls_config())
    }

    pub fn message_id_generator(&self) -> Option<&dyn MessageIdGenerator> {
        self.message_id_generator.as_deref()
    }
}

impl fmt::Debug for MessageSenderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSenderSettings")
            .field("config", &self.config)
            .field("tls", &self.tls.is_some())
            .field("message_id_generator", &self.message_id_generator.is_some())
            .finish()
    }
}

fn non_zero_millis(millis: u64) -> Option<Duration> {
    (millis > 0).then(|| Duration::from_millis(millis))
}
