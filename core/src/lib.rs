//! Synchronous message-oriented HTTP client.
//!
//! # Overview
//! Sends a logical request message (a request ID, a header record and a
//! payload record) to an HTTP endpoint and returns the logical response.
//! The payload is converted to and from its wire form by a pluggable
//! `MessageCodec` under the format names `<requestId>_SEND` and
//! `<requestId>_RECEIVE`.
//!
//! # Design
//! - `HttpMessagingClient` coordinates one exchange. It splits the work
//!   into `build_request` (logical message to `TransportRequest`) and
//!   `parse_result` (`TransportResult` to logical message), so both halves
//!   can be tested without a network.
//! - `ProtocolClient` executes the HTTP call itself; the default
//!   `HttpProtocolClient` runs over `ureq` and is created per call from an
//!   immutable `ProtocolConfig`.
//! - Body bytes move through `StreamWriter`/`StreamReader` callbacks that
//!   own the character encoding of each direction.
//! - Every failure is a `MessagingError` carrying the target URL and the
//!   status code when known.
//! - Both directions are audited as `info` events on the `MESSAGING`
//!   tracing target.

pub mod audit;
pub mod charset;
pub mod client;
pub mod codec;
pub mod error;
pub mod http;
pub mod protocol;
pub mod settings;
pub mod stream;
pub mod types;

pub use charset::Charset;
pub use client::{
    DefaultRequestMapping, HttpMessagingClient, MessagingClientOptions, RequestMapping,
    HTTP_HEADER_CORRELATION_ID, HTTP_HEADER_MESSAGE_ID, SYNCMESSAGE_STATUS_CODE,
};
pub use codec::{FormatDefinition, FormatError, JsonCodec, MessageCodec};
pub use error::MessagingError;
pub use http::{HeaderFields, HttpMethod, QueryParams, RequestHeaders, TransportRequest, TransportResult};
pub use protocol::{HttpProtocolClient, HttpProtocolClientFactory, ProtocolClient, ProtocolClientFactory, ProtocolConfig};
pub use settings::{
    MessageIdGenerator, MessageSenderSettings, NopTlsContextSettings, SenderConfig, SettingsError, TlsContextSettings,
    UuidMessageIdGenerator,
};
pub use stream::{CharStreamReader, CharStreamWriter, StreamReader, StreamWriter};
pub use types::{Record, SyncMessage};
