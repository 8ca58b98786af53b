//! Logical messages exchanged at the application level.
//!
//! # Design
//! A `SyncMessage` is a header record plus an optional payload record.
//! Both records map string keys to `serde_json::Value`, which covers the
//! strings, numbers and nested maps a payload holds. The request ID names
//! the codec format definitions used for the payload in each direction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Business payload: key to arbitrary value.
pub type Record = serde_json::Map<String, Value>;

/// Header record of a logical message.
pub type HeaderRecord = BTreeMap<String, Value>;

/// A logical request or response message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    request_id: String,
    #[serde(default)]
    header_record: HeaderRecord,
    #[serde(default)]
    data_record: Option<Record>,
}

impl SyncMessage {
    pub fn new(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            header_record: HeaderRecord::new(),
            data_record: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.header_record.insert(key.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: Record) -> Self {
        self.data_record = Some(data);
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn header_record(&self) -> &HeaderRecord {
        &self.header_record
    }

    pub fn header_record_mut(&mut self) -> &mut HeaderRecord {
        &mut self.header_record
    }

    pub fn set_header_record(&mut self, header_record: HeaderRecord) {
        self.header_record = header_record;
    }

    /// Header value rendered as text; see [`header_text`].
    pub fn header(&self, key: &str) -> Option<String> {
        self.header_record.get(key).map(header_text)
    }

    pub fn data_record(&self) -> Option<&Record> {
        self.data_record.as_ref()
    }

    /// The payload record, created empty if absent.
    pub fn data_record_or_insert(&mut self) -> &mut Record {
        self.data_record.get_or_insert_with(Record::new)
    }

    pub fn set_data_record(&mut self, data: Record) {
        self.data_record = Some(data);
    }
}

/// Render a header value as text: strings as-is, `null` as empty,
/// anything else in its JSON form.
pub fn header_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn header_values_render_as_text() {
        assert_eq!(header_text(&json!("abc")), "abc");
        assert_eq!(header_text(&Value::Null), "");
        assert_eq!(header_text(&json!(42)), "42");
        assert_eq!(header_text(&json!(true)), "true");
    }

    #[test]
    fn builder_sets_headers_and_data() {
        let mut data = Record::new();
        data.insert("name".to_string(), json!("taro"));
        let message = SyncMessage::new("RM11AC0101")
            .with_header("X-Custom", "value")
            .with_header("X-Count", 3)
            .with_data(data);

        assert_eq!(message.request_id(), "RM11AC0101");
        assert_eq!(message.header("X-Custom").as_deref(), Some("value"));
        assert_eq!(message.header("X-Count").as_deref(), Some("3"));
        assert_eq!(message.data_record().unwrap()["name"], "taro");
    }

    #[test]
    fn data_record_is_created_on_demand() {
        let mut message = SyncMessage::new("RM11AC0101");
        assert!(message.data_record().is_none());
        message.data_record_or_insert().insert("k".to_string(), json!(1));
        assert_eq!(message.data_record().unwrap().len(), 1);
    }

    #[test]
    fn deserializes_with_missing_records() {
        let message: SyncMessage = serde_json::from_str(r#"{"request_id":"RM1"}"#).unwrap();
        assert_eq!(message.request_id(), "RM1");
        assert!(message.header_record().is_empty());
        assert!(message.data_record().is_none());
    }
}
