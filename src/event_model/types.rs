//! Typed event records and the lenient wire shapes they are built from.
//!
//! The backend emits loosely structured JSON: fields may be missing, numeric where text
//! is expected, or duplicated under alias names. Everything is coerced here, once, so
//! the identity resolver, the store and the projector only ever see [`EventRecord`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::timestamp;

/// Protocol tag of a captured interaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Dns,
    /// Anything else, kept as its uppercased label (possibly empty).
    Unknown(String),
}

impl Protocol {
    /// Case-insensitive match on the wire label.
    pub fn parse(label: Option<&str>) -> Self {
        let upper = label.unwrap_or_default().to_uppercase();
        match upper.as_str() {
            "HTTP" => Protocol::Http,
            "DNS" => Protocol::Dns,
            _ => Protocol::Unknown(upper),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Dns => "DNS",
            Protocol::Unknown(label) => label.as_str(),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRecord {
    pub method: Option<String>,
    pub path: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}

impl HttpRecord {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_empty())
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DnsRecord {
    pub qname: Option<String>,
    pub qtype: Option<String>,
}

/// One observed network transaction, normalized at ingestion.
///
/// The protocol tag is paired with an envelope of optional fields shared by every
/// variant. Empty strings never survive ingestion: they are stored as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub protocol: Protocol,
    /// Epoch seconds.
    pub timestamp: i64,
    pub unique_id: Option<String>,
    pub host: Option<String>,
    /// First non-empty source-address alias.
    pub source: Option<String>,
    pub http: Option<HttpRecord>,
    pub dns: Option<DnsRecord>,
    pub raw: Option<String>,
}

impl EventRecord {
    /// Parses one JSON document, stamping missing timestamps with the current time.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        Self::parse_at(text, timestamp::now())
    }

    pub fn parse_at(text: &str, now: i64) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value_at(value, now)
    }

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        Self::from_value_at(value, timestamp::now())
    }

    /// Only JSON objects are records; a derived struct would otherwise accept arrays.
    pub fn from_value_at(value: Value, now: i64) -> Result<Self, serde_json::Error> {
        if !value.is_object() {
            return Err(serde::de::Error::custom("event record is not a JSON object"));
        }
        let raw: RawEvent = serde_json::from_value(value)?;
        Ok(Self::from_raw(raw, now))
    }

    fn from_raw(raw: RawEvent, now: i64) -> Self {
        let source = [
            raw.source,
            raw.remote_address,
            raw.remote_address_dashed,
            raw.remote_addr,
            raw.ip,
            raw.client,
            raw.remote,
            raw.addr,
        ]
        .into_iter()
        .flatten()
        .next();

        Self {
            protocol: Protocol::parse(raw.protocol.as_deref()),
            timestamp: timestamp::normalize_at(raw.timestamp.as_ref(), now),
            unique_id: raw.unique_id_dashed.or(raw.unique_id),
            host: raw.host,
            source,
            http: raw.http.map(|http| HttpRecord {
                method: http.method,
                path: http.path,
                headers: http.headers,
                body: http.body,
            }),
            dns: raw.dns.map(|dns| DnsRecord {
                qname: dns.qname,
                qtype: dns.qtype,
            }),
            raw: raw.raw,
        }
    }

    /// Host field, else the DNS query name.
    pub fn host_or_query(&self) -> Option<&str> {
        self.host
            .as_deref()
            .or_else(|| self.dns.as_ref().and_then(|dns| dns.qname.as_deref()))
    }

    /// Structured HTTP body, else the raw capture text.
    pub fn body_text(&self) -> Option<&str> {
        self.http
            .as_ref()
            .and_then(|http| http.body.as_deref())
            .or(self.raw.as_deref())
    }

    pub fn http_method(&self) -> Option<&str> {
        self.http.as_ref().and_then(|http| http.method.as_deref())
    }

    pub fn http_path(&self) -> Option<&str> {
        self.http.as_ref().and_then(|http| http.path.as_deref())
    }
}

/// Wire shape of an event as the backend sends it.
#[derive(Debug, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default, deserialize_with = "lenient_text")]
    protocol: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(rename = "unique-id", default, deserialize_with = "lenient_text")]
    unique_id_dashed: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    unique_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    host: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    source: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    remote_address: Option<String>,
    #[serde(rename = "remote-address", default, deserialize_with = "lenient_text")]
    remote_address_dashed: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    remote_addr: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    ip: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    client: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    remote: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    addr: Option<String>,
    #[serde(default, deserialize_with = "lenient_object")]
    http: Option<RawHttp>,
    #[serde(default, deserialize_with = "lenient_object")]
    dns: Option<RawDns>,
    #[serde(default, deserialize_with = "lenient_text")]
    raw: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHttp {
    #[serde(default, deserialize_with = "lenient_text")]
    method: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    path: Option<String>,
    #[serde(default, deserialize_with = "lenient_headers")]
    headers: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient_text")]
    body: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDns {
    #[serde(default, deserialize_with = "lenient_text")]
    qname: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    qtype: Option<String>,
}

/// Scalar JSON as text; empty strings and non-scalars are absent.
pub(crate) fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text_of))
}

fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .filter(Value::is_object)
        .and_then(|v| serde_json::from_value(v).ok()))
}

fn lenient_headers<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let headers = match value {
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(name, v)| text_of(&v).map(|text| (name, text)))
            .collect(),
        _ => BTreeMap::new(),
    };
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_700_000_500;

    #[test]
    fn protocol_is_case_insensitive() {
        assert_eq!(Protocol::parse(Some("http")), Protocol::Http);
        assert_eq!(Protocol::parse(Some("Dns")), Protocol::Dns);
        assert_eq!(
            Protocol::parse(Some("smtp")),
            Protocol::Unknown("SMTP".to_string())
        );
        assert_eq!(Protocol::parse(None).as_str(), "");
    }

    #[test]
    fn dashed_unique_id_wins() {
        let record = EventRecord::from_value_at(
            json!({"unique-id": "dash", "unique_id": "under"}),
            NOW,
        )
        .unwrap();
        assert_eq!(record.unique_id.as_deref(), Some("dash"));

        let record = EventRecord::from_value_at(json!({"unique_id": "under"}), NOW).unwrap();
        assert_eq!(record.unique_id.as_deref(), Some("under"));
    }

    #[test]
    fn source_takes_first_non_empty_alias() {
        let record = EventRecord::from_value_at(
            json!({"source": "", "remote-address": "10.0.0.2", "ip": "10.0.0.3"}),
            NOW,
        )
        .unwrap();
        assert_eq!(record.source.as_deref(), Some("10.0.0.2"));
    }

    #[test]
    fn scalars_are_coerced_and_empty_strings_dropped() {
        let record = EventRecord::from_value_at(
            json!({"protocol": "dns", "host": 42, "raw": "", "dns": {"qname": "x.com", "qtype": 1}}),
            NOW,
        )
        .unwrap();
        assert_eq!(record.host.as_deref(), Some("42"));
        assert_eq!(record.raw, None);
        let dns = record.dns.unwrap();
        assert_eq!(dns.qtype.as_deref(), Some("1"));
    }

    #[test]
    fn misshapen_sub_records_are_ignored() {
        let record = EventRecord::from_value_at(
            json!({"protocol": "HTTP", "http": "GET /", "dns": [1, 2]}),
            NOW,
        )
        .unwrap();
        assert_eq!(record.http, None);
        assert_eq!(record.dns, None);
        assert_eq!(record.timestamp, NOW);
    }

    #[test]
    fn headers_keep_scalar_values_only() {
        let record = EventRecord::from_value_at(
            json!({"http": {"headers": {"Host": "a.com", "X-Num": 3, "X-Obj": {"a": 1}}}}),
            NOW,
        )
        .unwrap();
        let http = record.http.unwrap();
        assert_eq!(http.headers.len(), 2);
        assert_eq!(http.header("host"), Some("a.com"));
        assert_eq!(http.header("x-num"), Some("3"));
    }

    #[test]
    fn non_objects_fail_ingestion() {
        assert!(EventRecord::parse_at("[1,2,3]", NOW).is_err());
        assert!(EventRecord::parse_at("not json", NOW).is_err());
        assert!(EventRecord::parse_at("{}", NOW).is_ok());
    }

    #[test]
    fn host_falls_back_to_query_name() {
        let record = EventRecord::from_value_at(
            json!({"protocol": "DNS", "dns": {"qname": "q.example"}}),
            NOW,
        )
        .unwrap();
        assert_eq!(record.host_or_query(), Some("q.example"));
    }
}
