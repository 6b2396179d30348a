use std::fmt;

use super::types::EventRecord;

const UID_PREFIX: &str = "uid:";
const FIELD_SEPARATOR: &str = "|";

/// Deduplication fingerprint of an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the identity key of a record.
///
/// A backend-assigned token is authoritative. Without one, the key is composed of the
/// protocol, host (or query name), HTTP method and path, the character length of the
/// best body text, and the normalized timestamp. Only the body length is used, so
/// re-encoded copies of the same capture still collide.
pub fn identity_key(record: &EventRecord) -> IdentityKey {
    if let Some(token) = record.unique_id.as_deref() {
        return IdentityKey(format!("{}{}", UID_PREFIX, token));
    }

    let body_len = record.body_text().map_or(0, |body| body.chars().count());
    let fields = [
        record.protocol.as_str().to_string(),
        record.host_or_query().unwrap_or_default().to_string(),
        record.http_method().unwrap_or_default().to_string(),
        record.http_path().unwrap_or_default().to_string(),
        body_len.to_string(),
        record.timestamp.to_string(),
    ];
    IdentityKey(fields.join(FIELD_SEPARATOR))
}
