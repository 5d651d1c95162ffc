use crate::core::request::{Attachment, Headers, Method, RequestBody};
use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

/// Deterministic cache key for a call
///
/// Hashes the method, the URL without its query, the query pairs sorted, a
/// canonical rendering of the body tagged with its kind (object keys sorted
/// recursively),
/// attachment metadata and digests, and the per-call headers sorted by
/// lowercase name. Two calls that differ only in query order or JSON key
/// order share a key.
pub fn cache_key(
    method: Method,
    url: &Url,
    body: &RequestBody,
    attachments: &[Attachment],
    headers: &Headers,
) -> String {
    let mut hasher = Sha256::new();

    hasher.update(method.as_str().as_bytes());
    hasher.update(b"\n");

    let mut base = url.clone();
    base.set_query(None);
    base.set_fragment(None);
    hasher.update(base.as_str().as_bytes());
    hasher.update(b"\n");

    let mut query: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    query.sort();
    for (key, value) in &query {
        hasher.update(format!("{}={}&", key, value).as_bytes());
    }
    hasher.update(b"\n");

    match body {
        RequestBody::Empty => hasher.update(b"empty:"),
        RequestBody::Json(value) => {
            hasher.update(b"json:");
            hasher.update(canonical_json(value).as_bytes());
        }
        RequestBody::Text(text) => {
            hasher.update(b"text:");
            hasher.update(text.as_bytes());
        }
        RequestBody::Bytes(bytes) => {
            hasher.update(b"bytes:");
            hasher.update(bytes);
        }
    }
    hasher.update(b"\n");

    for attachment in attachments {
        hasher.update(attachment.field.as_bytes());
        hasher.update(b":");
        hasher.update(attachment.file_name.as_bytes());
        hasher.update(b":");
        hasher.update(Sha256::digest(&attachment.bytes));
        hasher.update(b";");
    }
    hasher.update(b"\n");

    let mut header_pairs: Vec<(String, &str)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
        .collect();
    header_pairs.sort();
    for (name, value) in header_pairs {
        hasher.update(format!("{}:{};", name, value).as_bytes());
    }

    hex::encode(hasher.finalize())
}

/// Compact JSON with object keys sorted at every depth
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(inner) = map.get(key) {
                    write_canonical(inner, out);
                }
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
