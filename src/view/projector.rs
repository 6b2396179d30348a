//! Pure projection of retained events into table rows.
//!
//! Nothing here fails: a record missing any field still yields a complete row, with
//! [`PLACEHOLDER`] standing in for what is unknown.

use chrono::DateTime;

use crate::event_model::{DnsRecord, EventRecord, HttpRecord, Protocol};

use super::types::{Detail, DetailBody, ProtocolFilter, Row, PLACEHOLDER};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
const FORWARDED_HEADERS: [&str; 2] = ["X-Forwarded-For", "X-Real-IP"];

/// Rows for `events` (oldest first, as the store yields them) under `filter`, newest first.
pub fn project<'a, I>(events: I, filter: &ProtocolFilter) -> Vec<Row>
where
    I: DoubleEndedIterator<Item = &'a EventRecord>,
{
    events
        .rev()
        .filter(|record| filter.matches(&record.protocol))
        .map(render_row)
        .collect()
}

pub fn render_row(record: &EventRecord) -> Row {
    let protocol = match record.protocol.as_str() {
        "" => PLACEHOLDER.to_string(),
        label => label.to_string(),
    };
    let badge_class = match record.protocol {
        Protocol::Dns => "dns",
        _ => "http",
    };
    let detail = match record.protocol {
        Protocol::Dns => record.dns.as_ref().map(summarize_dns),
        _ => summarize_http(record.http.as_ref(), record.raw.as_deref()),
    };

    Row {
        time: format_time(record.timestamp),
        source: source_of(record).unwrap_or(PLACEHOLDER).to_string(),
        host_or_query: record.host_or_query().unwrap_or(PLACEHOLDER).to_string(),
        protocol,
        badge_class,
        detail,
    }
}

pub fn format_time(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|time| time.format(TIME_FORMAT).to_string())
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

/// Source alias, else a forwarding header of the HTTP sub-record.
fn source_of(record: &EventRecord) -> Option<&str> {
    record.source.as_deref().or_else(|| {
        let http = record.http.as_ref()?;
        FORWARDED_HEADERS.iter().find_map(|name| http.header(name))
    })
}

fn summarize_dns(dns: &DnsRecord) -> Detail {
    let qname = dns.qname.clone().unwrap_or_default();
    let qtype = dns.qtype.clone().unwrap_or_default();
    Detail {
        summary: format!("{} ({})", qname, qtype),
        body: DetailBody::Fields(vec![
            ("Query".to_string(), qname),
            ("Type".to_string(), qtype),
        ]),
    }
}

/// Raw capture text wins over the structured sub-record.
fn summarize_http(http: Option<&HttpRecord>, raw: Option<&str>) -> Option<Detail> {
    if let Some(raw) = raw {
        let normalized = raw.replace("\r\n", "\n");
        let (head, body) = normalized
            .split_once("\n\n")
            .unwrap_or((normalized.as_str(), ""));
        let mut lines = head.split('\n');
        let request_line = lines.next().unwrap_or_default().to_string();
        let headers = lines.collect::<Vec<_>>().join("\n");
        return Some(Detail {
            body: DetailBody::Text(pretty(&request_line, &headers, body)),
            summary: request_line,
        });
    }

    let http = http?;
    let head_line = format!(
        "{} {}",
        http.method.as_deref().unwrap_or_default(),
        http.path.as_deref().unwrap_or("/")
    );
    let headers = http
        .headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect::<Vec<_>>()
        .join("\n");
    let body = http.body.as_deref().unwrap_or_default();
    Some(Detail {
        body: DetailBody::Text(pretty(&head_line, &headers, body)),
        summary: head_line,
    })
}

fn pretty(first_line: &str, headers: &str, body: &str) -> String {
    let mut text = format!("{}\n{}", first_line, headers);
    if !body.is_empty() {
        text.push_str("\n\nBody\n");
        text.push_str(body);
    }
    text
}
