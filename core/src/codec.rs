//! Payload codec interface and a JSON reference implementation.
//!
//! # Design
//! The coordinator only needs two operations: turn a payload record into
//! bytes under a named format, and turn bytes back into a record. Each
//! result also reports the MIME type and charset of the format so the
//! coordinator can announce them on the wire. Format grammars live behind
//! this trait; `JsonCodec` covers JSON formats registered by name.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::charset::Charset;
use crate::types::Record;

/// Failure to serialize or deserialize a payload.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("format definition not found: {format_name}")]
    UnknownFormat { format_name: String },

    #[error("field '{field}' is required by format {format_name}")]
    MissingField { format_name: String, field: String },

    #[error("format {format_name} expects a record, found {found}")]
    NotARecord { format_name: String, found: String },

    #[error("malformed data for format {format_name}: {source}")]
    Syntax {
        format_name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialized payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertResult {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub charset: Charset,
}

impl ConvertResult {
    /// The serialized bytes decoded in the format's charset.
    pub fn text(&self) -> String {
        self.charset.decode(&self.bytes)
    }
}

/// Deserialized payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseResult {
    pub payload: Record,
    pub mime_type: String,
    pub charset: Charset,
}

/// Converts payload records to and from a wire format named by `format_name`.
pub trait MessageCodec: Send + Sync {
    fn serialize(&self, format_name: &str, payload: &Record) -> Result<ConvertResult, FormatError>;

    fn deserialize(&self, format_name: &str, bytes: &[u8]) -> Result<ParseResult, FormatError>;
}

/// A named wire format known to `JsonCodec`.
#[derive(Debug, Clone)]
pub struct FormatDefinition {
    mime_type: String,
    charset: Charset,
    required: Vec<String>,
}

impl FormatDefinition {
    pub fn new(mime_type: impl Into<String>, charset: Charset) -> Self {
        Self {
            mime_type: mime_type.into(),
            charset,
            required: Vec::new(),
        }
    }

    /// `application/json` in UTF-8.
    pub fn json() -> Self {
        Self::new("application/json", Charset::UTF_8)
    }

    pub fn with_required(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    fn check_required(&self, format_name: &str, payload: &Record) -> Result<(), FormatError> {
        match self.required.iter().find(|field| !payload.contains_key(field.as_str())) {
            Some(field) => Err(FormatError::MissingField {
                format_name: format_name.to_string(),
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// JSON codec over a directory of named format definitions.
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    formats: HashMap<String, FormatDefinition>,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format_name: impl Into<String>, definition: FormatDefinition) -> Self {
        self.formats.insert(format_name.into(), definition);
        self
    }

    fn definition(&self, format_name: &str) -> Result<&FormatDefinition, FormatError> {
        self.formats
            .get(format_name)
            .ok_or_else(|| FormatError::UnknownFormat {
                format_name: format_name.to_string(),
            })
    }
}

impl MessageCodec for JsonCodec {
    fn serialize(&self, format_name: &str, payload: &Record) -> Result<ConvertResult, FormatError> {
        let definition = self.definition(format_name)?;
        definition.check_required(format_name, payload)?;
        let text = serde_json::to_string(payload).map_err(|source| FormatError::Syntax {
            format_name: format_name.to_string(),
            source,
        })?;
        Ok(ConvertResult {
            bytes: definition.charset.encode(&text),
            mime_type: definition.mime_type.clone(),
            charset: definition.charset,
        })
    }

    fn deserialize(&self, format_name: &str, bytes: &[u8]) -> Result<ParseResult, FormatError> {
        let definition = self.definition(format_name)?;
        let text = definition.charset.decode(bytes);
        let value: Value = serde_json::from_str(&text).map_err(|source| FormatError::Syntax {
            format_name: format_name.to_string(),
            source,
        })?;
        let payload = match value {
            Value::Object(map) => map,
            other => {
                return Err(FormatError::NotARecord {
                    format_name: format_name.to_string(),
                    found: json_kind(&other).to_string(),
                })
            }
        };
        definition.check_required(format_name, &payload)?;
        Ok(ParseResult {
            payload,
            mime_type: definition.mime_type.clone(),
            charset: definition.charset,
        })
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codec() -> JsonCodec {
        JsonCodec::new()
            .with_format("RM11AC0101_SEND", FormatDefinition::json().with_required("userId"))
            .with_format("RM11AC0101_RECEIVE", FormatDefinition::json())
            .with_format(
                "SJIS_RECEIVE",
                FormatDefinition::new("text/json", Charset::for_label("Shift_JIS").unwrap()),
            )
    }

    fn payload(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn serialized_payload_parses_back_to_the_same_record() {
        let record = payload(json!({
            "userId": "user01",
            "amount": 1200,
            "address": { "zip": "100-0001", "city": "千代田区" }
        }));
        let codec = codec();
        let converted = codec.serialize("RM11AC0101_SEND", &record).unwrap();
        assert_eq!(converted.mime_type, "application/json");
        assert_eq!(converted.charset, Charset::UTF_8);

        let parsed = codec.deserialize("RM11AC0101_RECEIVE", &converted.bytes).unwrap();
        assert_eq!(parsed.payload, record);
    }

    #[test]
    fn shift_jis_format_decodes_its_own_bytes() {
        let sjis = Charset::for_label("Shift_JIS").unwrap();
        let bytes = sjis.encode(r#"{"message":"テスト"}"#);
        let parsed = codec().deserialize("SJIS_RECEIVE", &bytes).unwrap();
        assert_eq!(parsed.payload["message"], "テスト");
        assert_eq!(parsed.mime_type, "text/json");
    }

    #[test]
    fn unknown_format_is_an_error() {
        let err = codec().serialize("NOPE_SEND", &Record::new()).unwrap_err();
        assert!(matches!(err, FormatError::UnknownFormat { ref format_name } if format_name == "NOPE_SEND"));
        assert_eq!(err.to_string(), "format definition not found: NOPE_SEND");
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let record = payload(json!({ "amount": 1 }));
        let err = codec().serialize("RM11AC0101_SEND", &record).unwrap_err();
        assert!(matches!(err, FormatError::MissingField { ref field, .. } if field == "userId"));
    }

    #[test]
    fn malformed_input_is_an_error() {
        let err = codec().deserialize("RM11AC0101_RECEIVE", b"not json").unwrap_err();
        assert!(matches!(err, FormatError::Syntax { .. }));
    }

    #[test]
    fn non_object_document_is_an_error() {
        let err = codec().deserialize("RM11AC0101_RECEIVE", b"[1,2]").unwrap_err();
        assert_eq!(
            err.to_string(),
            "format RM11AC0101_RECEIVE expects a record, found array"
        );
    }
}
