//! Message exchange coordinator.
//!
//! # Design
//! `HttpMessagingClient` turns a logical `SyncMessage` into one HTTP call
//! and the call's result back into a logical response. The work is split
//! the same way in both directions: `build_request` produces a
//! `TransportRequest` without touching the network, `parse_result`
//! consumes a `TransportResult`, and `send_sync` runs the executor in
//! between. Every collaborator is injected: the payload codec, the
//! executor factory and the URL/query mapping hooks.
//!
//! The client holds no per-call state, so one instance can serve many
//! threads at once.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::audit;
use crate::charset::{self, Charset, DEFAULT_CHARSET};
use crate::codec::{ConvertResult, MessageCodec};
use crate::error::MessagingError;
use crate::http::{HttpMethod, QueryParams, RequestBody, RequestHeaders, TransportRequest, TransportResult};
use crate::protocol::{
    HttpProtocolClientFactory, ProtocolClientFactory, ProtocolConfig, ProxyAddress, DEFAULT_ACCEPT,
    DEFAULT_QUERY_STRING_ENCODING,
};
use crate::settings::MessageSenderSettings;
use crate::stream::{CharStreamReader, CharStreamWriter, StreamWriter};
use crate::types::{header_text, HeaderRecord, Record, SyncMessage};

/// Response header record key holding the numeric status code.
pub const SYNCMESSAGE_STATUS_CODE: &str = "STATUS_CODE";

/// Outbound header carrying the generated message ID.
pub const HTTP_HEADER_MESSAGE_ID: &str = "X-Message-Id";

/// Inbound header a destination uses to echo the message ID.
pub const HTTP_HEADER_CORRELATION_ID: &str = "X-Correlation-Id";

/// Tunables of the messaging client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MessagingClientOptions {
    pub query_string_encoding: String,
    /// Payload key that receives the caller's user ID; `None` disables the injection.
    pub user_id_to_format_key: Option<String>,
    pub accept_header_value: String,
    /// Format name of the request payload; `%s` is replaced by the request ID.
    pub request_format_pattern: String,
    /// Format name of the response payload; `%s` is replaced by the request ID.
    pub response_format_pattern: String,
}

impl Default for MessagingClientOptions {
    fn default() -> Self {
        Self {
            query_string_encoding: DEFAULT_QUERY_STRING_ENCODING.to_string(),
            user_id_to_format_key: None,
            accept_header_value: DEFAULT_ACCEPT.to_string(),
            request_format_pattern: "%s_SEND".to_string(),
            response_format_pattern: "%s_RECEIVE".to_string(),
        }
    }
}

/// Hooks deciding the target URL and query parameters of a call.
pub trait RequestMapping: Send + Sync {
    fn map_uri(&self, uri: &str, _method: HttpMethod, _request: &SyncMessage) -> String {
        uri.to_string()
    }

    fn map_query(&self, _uri: &str, _method: HttpMethod, _request: &SyncMessage) -> QueryParams {
        QueryParams::new()
    }
}

/// Uses the configured URL as-is and sends no query parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRequestMapping;

impl RequestMapping for DefaultRequestMapping {}

/// Synchronous message-oriented HTTP client.
#[derive(Clone)]
pub struct HttpMessagingClient {
    codec: Arc<dyn MessageCodec>,
    protocol_factory: Arc<dyn ProtocolClientFactory>,
    mapping: Arc<dyn RequestMapping>,
    options: MessagingClientOptions,
}

impl HttpMessagingClient {
    pub fn new(codec: Arc<dyn MessageCodec>) -> Self {
        Self {
            codec,
            protocol_factory: Arc::new(HttpProtocolClientFactory),
            mapping: Arc::new(DefaultRequestMapping),
            options: MessagingClientOptions::default(),
        }
    }

    pub fn with_options(mut self, options: MessagingClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_protocol_factory(mut self, factory: Arc<dyn ProtocolClientFactory>) -> Self {
        self.protocol_factory = factory;
        self
    }

    pub fn with_request_mapping(mut self, mapping: Arc<dyn RequestMapping>) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn options(&self) -> &MessagingClientOptions {
        &self.options
    }

    /// Send `request` and wait for the response.
    pub fn send_sync(
        &self,
        settings: &MessageSenderSettings,
        mut request: SyncMessage,
    ) -> Result<SyncMessage, MessagingError> {
        let transport = self.build_request(settings, &mut request)?;

        if audit::enabled() {
            let body = transport.body.as_ref();
            audit::emit_request_log(
                transport.method,
                &transport.url,
                &stringify_record(request.header_record()),
                &body.map(RequestBody::text).unwrap_or_default(),
                body.map_or(Charset::UTF_8, |b| b.charset).name(),
            );
        }

        let config = self.protocol_config(settings, &transport.content_type)?;
        let protocol = self.protocol_factory.create(config);
        let writer = transport.body.as_ref().map(|body| {
            let mut writer = CharStreamWriter::new(Some(body.charset.name()));
            for fragment in &body.fragments {
                writer.append(fragment.as_str());
            }
            writer
        });
        let reader = CharStreamReader::default();
        let result = protocol.execute(
            transport.method,
            &transport.url,
            &transport.headers,
            &transport.query,
            writer.as_ref().map(|w| w as &dyn StreamWriter),
            Some(&reader),
        )?;

        self.parse_result(&request, &transport, &result)
    }

    /// Map a logical request onto a wire-level request.
    ///
    /// Adds the message ID header and, for POST and PUT, the payload record
    /// and the caller's user ID to `request` before mapping it.
    pub fn build_request(
        &self,
        settings: &MessageSenderSettings,
        request: &mut SyncMessage,
    ) -> Result<TransportRequest, MessagingError> {
        let method = HttpMethod::from_name(settings.http_method()).ok_or_else(|| {
            MessagingError::UnsupportedMethod {
                method: settings.http_method().to_ascii_uppercase(),
            }
        })?;

        self.add_common_values(method, settings, request);

        let url = self.mapping.map_uri(settings.uri(), method, request);
        let query = self.mapping.map_query(settings.uri(), method, request);
        let headers = map_headers(request);
        let converted = self.map_body(&url, method, request)?;
        let content_type = request_content_type(method, converted.as_ref());
        let body = method.carries_body().then(|| match &converted {
            Some(converted) => RequestBody::new(converted.charset, converted.text()),
            None => RequestBody::new(Charset::UTF_8, ""),
        });

        Ok(TransportRequest {
            method,
            url,
            query,
            headers,
            content_type,
            body,
        })
    }

    /// Map a wire-level result onto the logical response of `request`.
    pub fn parse_result(
        &self,
        request: &SyncMessage,
        transport: &TransportRequest,
        result: &TransportResult,
    ) -> Result<SyncMessage, MessagingError> {
        let header_record = response_header_record(result);
        let body = result.body().unwrap_or_default();
        let charset = response_charset(result);

        if audit::enabled() {
            audit::emit_response_log(
                &header_text(&header_record[SYNCMESSAGE_STATUS_CODE]),
                &stringify_record(&header_record),
                body,
                charset.name(),
            );
        }

        let payload = if body.is_empty() {
            Record::new()
        } else {
            let format_name = format_name(&self.options.response_format_pattern, request.request_id());
            self.codec
                .deserialize(&format_name, &charset.encode(body))
                .map_err(|source| MessagingError::InvalidResponseFormat {
                    request_id: request.request_id().to_string(),
                    target_url: transport.url.clone(),
                    status_code: result.status_code(),
                    header_fields: result.header_fields().cloned().unwrap_or_default(),
                    receive_data: body.to_string(),
                    source,
                })?
                .payload
        };

        let mut response = SyncMessage::new(request.request_id());
        response.set_header_record(header_record);
        response.set_data_record(payload);
        Ok(response)
    }

    fn add_common_values(&self, method: HttpMethod, settings: &MessageSenderSettings, request: &mut SyncMessage) {
        if let Some(message_id) = settings
            .message_id_generator()
            .and_then(|generator| generator.generate_id())
        {
            request
                .header_record_mut()
                .insert(HTTP_HEADER_MESSAGE_ID.to_string(), Value::String(message_id));
        }

        if !method.carries_body() {
            return;
        }
        let data = request.data_record_or_insert();
        let key = self
            .options
            .user_id_to_format_key
            .as_deref()
            .filter(|key| !key.is_empty());
        if let (Some(key), Some(user_id)) = (key, settings.user_id()) {
            if !data.contains_key(key) {
                data.insert(key.to_string(), Value::String(user_id.to_string()));
            }
        }
    }

    fn map_body(
        &self,
        url: &str,
        method: HttpMethod,
        request: &SyncMessage,
    ) -> Result<Option<ConvertResult>, MessagingError> {
        if !method.carries_body() {
            return Ok(None);
        }
        let data = match request.data_record() {
            Some(data) if !data.is_empty() => data,
            _ => return Ok(None),
        };
        let format_name = format_name(&self.options.request_format_pattern, request.request_id());
        self.codec
            .serialize(&format_name, data)
            .map(Some)
            .map_err(|source| MessagingError::InvalidRequestFormat {
                request_id: request.request_id().to_string(),
                target_url: url.to_string(),
                request_data: data.clone(),
                source,
            })
    }

    fn protocol_config(
        &self,
        settings: &MessageSenderSettings,
        content_type: &str,
    ) -> Result<ProtocolConfig, MessagingError> {
        let proxy = settings
            .proxy()
            .map_err(|e| MessagingError::transport(settings.uri(), None, e))?;
        Ok(ProtocolConfig {
            connect_timeout: settings.connect_timeout(),
            read_timeout: settings.read_timeout(),
            proxy: proxy.map(|(host, port)| ProxyAddress {
                host: host.to_string(),
                port,
            }),
            tls: settings.tls_config(),
            content_type: content_type.to_string(),
            accept: self.options.accept_header_value.clone(),
            query_string_encoding: self.options.query_string_encoding.clone(),
        })
    }
}

impl fmt::Debug for HttpMessagingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMessagingClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Resolve a format name pattern such as `%s_SEND` for a request ID.
pub fn format_name(pattern: &str, request_id: &str) -> String {
    pattern.replacen("%s", request_id, 1)
}

/// Every header of the logical message as a single stringified value.
fn map_headers(request: &SyncMessage) -> RequestHeaders {
    request
        .header_record()
        .iter()
        .map(|(key, value)| (key.clone(), vec![header_text(value)]))
        .collect()
}

fn request_content_type(method: HttpMethod, converted: Option<&ConvertResult>) -> String {
    match converted {
        Some(converted) if method.carries_body() => charset::content_type(&converted.mime_type, converted.charset),
        _ => charset::content_type("text/plain", Charset::UTF_8),
    }
}

/// First value of every response header, the status line under `""`, and
/// the status code under `STATUS_CODE`.
fn response_header_record(result: &TransportResult) -> HeaderRecord {
    let mut record = HeaderRecord::new();
    if let Some(fields) = result.header_fields() {
        for (key, values) in fields {
            if let Some(first) = values.first() {
                record.insert(key.clone().unwrap_or_default(), Value::String(first.clone()));
            }
        }
    }
    let status = result.status_code().map(|code| code.to_string()).unwrap_or_default();
    record.insert(SYNCMESSAGE_STATUS_CODE.to_string(), Value::String(status));
    record
}

/// Charset announced by the response, or the default one.
///
/// Uses the same rule as `CharStreamReader` so the body is re-encoded in the
/// charset that decoded it.
fn response_charset(result: &TransportResult) -> Charset {
    let label = result
        .header_fields()
        .and_then(CharStreamReader::announced_charset);
    match label {
        Some(label) => Charset::for_label(label).unwrap_or_else(|e| {
            warn!(error = %e, "unknown response charset, using {}", DEFAULT_CHARSET);
            DEFAULT_CHARSET
        }),
        None => DEFAULT_CHARSET,
    }
}

fn stringify_record(record: &HeaderRecord) -> BTreeMap<String, String> {
    record
        .iter()
        .map(|(key, value)| (key.clone(), header_text(value)))
        .collect()
}
