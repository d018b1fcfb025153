//! The canonical, store-ready record derived from one exchange.
//!
//! A [`Document`] is built incrementally by the normalizer through the
//! section mutators below, then handed either to [`Document::persist`] (live
//! path) or serialized with [`Document::to_bulk_value`] into a bulk batch.
//!
//! Header mutators parse minimally and report failure as a non-fatal
//! [`MalformedField`]; the caller keeps the raw line through
//! [`Document::add_raw_request_line`] / [`Document::add_raw_response_line`]
//! and carries on.

mod header;
mod kinds;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error_handling::{FieldKind, MalformedField, StoreError};
use crate::storage::{DocumentStore, IndexName};

pub use header::{parse_header_line, Header};
pub use kinds::{ParameterKind, RequestContentType};

/// One request parameter. Names may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    #[serde(rename = "type")]
    pub kind: ParameterKind,
    pub name: String,
    pub value: String,
}

/// One response cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<FixedOffset>>,
}

/// Request half of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSection {
    pub full: String,
    pub method: String,
    pub url: String,
    /// First head line that did not parse as a header (normally the request line).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_line: Option<String>,
    /// Further unparsable head lines, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unparsed_headers: Vec<String>,
    pub content_type: RequestContentType,
    pub headers: Vec<Header>,
    pub parameters: Vec<Parameter>,
    pub body: String,
}

/// Response half of a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSection {
    pub full: String,
    pub status: u16,
    /// First head line that did not parse as a header (normally the status line).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_line: Option<String>,
    /// Further unparsable head lines, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unparsed_headers: Vec<String>,
    /// MIME type stated by the `Content-Type` header.
    pub content_type: String,
    /// MIME type inferred from the body.
    pub inferred_content_type: String,
    pub headers: Vec<Header>,
    pub cookies: Vec<Cookie>,
    pub body: String,
}

/// A normalized exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(skip)]
    index: String,
    #[serde(skip)]
    id: Option<String>,
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub protocol: String,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSection>,
}

impl Document {
    pub fn new(
        index: &IndexName,
        protocol: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            index: index.as_str().to_string(),
            id: None,
            timestamp: None,
            protocol: protocol.into(),
            host: host.into(),
            port,
            request: None,
            response: None,
        }
    }

    /// Target index name.
    pub fn index(&self) -> &str {
        &self.index
    }

    /// Store-assigned id, once persisted.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Request section, created empty on first access.
    pub fn request_mut(&mut self) -> &mut RequestSection {
        self.request.get_or_insert_with(RequestSection::default)
    }

    /// Response section, created empty on first access.
    pub fn response_mut(&mut self) -> &mut ResponseSection {
        self.response.get_or_insert_with(ResponseSection::default)
    }

    /// Parses `line` and appends it to the request headers.
    pub fn add_request_header(&mut self, line: &str) -> Result<(), MalformedField> {
        let header = parse_header_line(line, FieldKind::RequestHeader)?;
        self.request_mut().headers.push(header);
        Ok(())
    }

    /// Parses `line` and appends it to the response headers.
    pub fn add_response_header(&mut self, line: &str) -> Result<(), MalformedField> {
        let header = parse_header_line(line, FieldKind::ResponseHeader)?;
        self.response_mut().headers.push(header);
        Ok(())
    }

    /// Keeps a request head line that did not parse as a header.
    pub fn add_raw_request_line(&mut self, line: &str) {
        let request = self.request_mut();
        if request.request_line.is_none() {
            request.request_line = Some(line.to_string());
        } else {
            request.unparsed_headers.push(line.to_string());
        }
    }

    /// Keeps a response head line that did not parse as a header.
    pub fn add_raw_response_line(&mut self, line: &str) {
        let response = self.response_mut();
        if response.status_line.is_none() {
            response.status_line = Some(line.to_string());
        } else {
            response.unparsed_headers.push(line.to_string());
        }
    }

    pub fn add_request_parameter(
        &mut self,
        kind: ParameterKind,
        name: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.request_mut().parameters.push(Parameter {
            kind,
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn add_response_cookie(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
        domain: Option<String>,
        path: Option<String>,
        expiration: Option<DateTime<FixedOffset>>,
    ) {
        self.response_mut().cookies.push(Cookie {
            name: name.into(),
            value: value.into(),
            domain,
            path,
            expiration,
        });
    }

    /// Serializes the document into the mapping submitted to stores.
    ///
    /// With `include_meta` the source is wrapped as
    /// `{"_index": ..., "_source": {...}}` (plus `_id` once assigned), which
    /// is what bulk requests carry; without it only the source is returned.
    pub fn to_bulk_value(&self, include_meta: bool) -> Result<Value, serde_json::Error> {
        let source = serde_json::to_value(self)?;
        if !include_meta {
            return Ok(source);
        }
        let mut wrapped = json!({
            "_index": self.index,
            "_source": source,
        });
        if let Some(id) = &self.id {
            wrapped["_id"] = Value::String(id.clone());
        }
        Ok(wrapped)
    }

    /// Writes the document to its own index and records the assigned id.
    ///
    /// A document that never received a timestamp is stamped with the
    /// current time in UTC first. Callers that want a configured zone set
    /// the timestamp themselves before persisting.
    pub async fn persist(&mut self, store: &dyn DocumentStore) -> Result<String, StoreError> {
        if self.timestamp.is_none() {
            self.timestamp = Some(Utc::now().fixed_offset());
        }
        let index = IndexName::new(&self.index);
        let source = self.to_bulk_value(false)?;
        let id = store.index_document(&index, &source).await?;
        self.id = Some(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn index() -> IndexName {
        IndexName::from_parts("wase-burp", "unit")
    }

    fn doc() -> Document {
        Document::new(&index(), "https", "example.com", 443)
    }

    #[test]
    fn test_new_document_has_no_sections() {
        let d = doc();
        assert_eq!(d.index(), "wase-burp-unit");
        assert!(d.request.is_none());
        assert!(d.response.is_none());
        assert!(d.id().is_none());
    }

    #[test]
    fn test_malformed_headers_fall_back_in_order() {
        let mut d = doc();
        for line in ["GET / HTTP/1.1", "Host: example.com", "garbage line", "also bad"] {
            if d.add_request_header(line).is_err() {
                d.add_raw_request_line(line);
            }
        }
        let req = d.request.as_ref().unwrap();
        assert_eq!(req.request_line.as_deref(), Some("GET / HTTP/1.1"));
        assert_eq!(req.unparsed_headers, vec!["garbage line", "also bad"]);
        assert_eq!(req.headers.len(), 1);
    }

    #[test]
    fn test_duplicate_parameter_names_are_kept() {
        let mut d = doc();
        d.add_request_parameter(ParameterKind::Url, "id", "1");
        d.add_request_parameter(ParameterKind::Url, "id", "2");
        let params = &d.request.as_ref().unwrap().parameters;
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].value, "2");
    }

    #[test]
    fn test_bulk_value_with_and_without_meta() {
        let mut d = doc();
        d.request_mut().method = "GET".into();
        d.add_request_parameter(ParameterKind::Json, "a", "b");
        d.add_response_cookie("sid", "x", None, Some("/".into()), None);

        let plain = d.to_bulk_value(false).unwrap();
        assert!(plain.get("_index").is_none());
        assert_eq!(plain["request"]["method"], "GET");
        assert_eq!(plain["request"]["parameters"][0]["type"], "json");
        assert_eq!(plain["response"]["cookies"][0]["path"], "/");
        assert!(plain["response"]["cookies"][0].get("expiration").is_none());

        let meta = d.to_bulk_value(true).unwrap();
        assert_eq!(meta["_index"], "wase-burp-unit");
        assert_eq!(meta["_source"], plain);
        assert!(meta.get("_id").is_none());
    }

    #[test]
    fn test_sections_absent_from_mapping_when_missing() {
        let plain = doc().to_bulk_value(false).unwrap();
        assert!(plain.get("request").is_none());
        assert!(plain.get("response").is_none());
        assert_eq!(plain["port"], 443);
    }

    #[tokio::test]
    async fn test_persist_assigns_id_and_timestamp() {
        let store = InMemoryStore::new();
        store.create_or_open_index(&index()).await.unwrap();

        let mut d = doc();
        let id = d.persist(&store).await.unwrap();
        assert_eq!(d.id(), Some(id.as_str()));
        assert_eq!(d.timestamp.unwrap().offset().local_minus_utc(), 0);
        assert_eq!(store.document_count(&index()), 1);
    }

    #[tokio::test]
    async fn test_persist_keeps_existing_timestamp() {
        let store = InMemoryStore::new();
        store.create_or_open_index(&index()).await.unwrap();

        let stamped = DateTime::parse_from_rfc3339("2015-10-21T09:28:00+02:00").unwrap();
        let mut d = doc();
        d.timestamp = Some(stamped);
        d.persist(&store).await.unwrap();
        assert_eq!(d.timestamp, Some(stamped));
    }

    #[tokio::test]
    async fn test_persist_into_missing_index_fails() {
        let store = InMemoryStore::new();
        let mut d = doc();
        let err = d.persist(&store).await.unwrap_err();
        assert!(matches!(err, StoreError::IndexNotFound(_)));
        assert!(d.id().is_none());
    }
}
