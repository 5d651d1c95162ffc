use crate::core::envelope::{ContentKind, Payload, RawResponse};
use crate::error::BoxError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Converts a fully-read response into the caller's type
///
/// Parsing runs inside the attempt loop: a failure becomes a `Parse` error
/// and is subject to the normal retry rules.
pub trait ResponseParser<T>: Send + Sync {
    fn parse(&self, raw: &RawResponse) -> Result<T, BoxError>;
}

impl<T, F> ResponseParser<T> for F
where
    F: Fn(&RawResponse) -> Result<T, BoxError> + Send + Sync,
{
    fn parse(&self, raw: &RawResponse) -> Result<T, BoxError> {
        self(raw)
    }
}

/// Deserialize the body as JSON into `T`
pub struct JsonParser<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonParser<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> ResponseParser<T> for JsonParser<T> {
    fn parse(&self, raw: &RawResponse) -> Result<T, BoxError> {
        Ok(serde_json::from_slice(&raw.body)?)
    }
}

/// Untyped conversion used when the caller supplies no parser
///
/// Never guesses a target type: JSON bodies become [`Payload::Json`], text
/// and HTML become [`Payload::Text`], binary and files stay bytes. A body
/// declared as JSON that does not parse falls back to text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultParser;

impl ResponseParser<Payload> for DefaultParser {
    fn parse(&self, raw: &RawResponse) -> Result<Payload, BoxError> {
        Ok(match raw.content_kind {
            ContentKind::Json => {
                if raw.body.is_empty() {
                    Payload::Json(serde_json::Value::Null)
                } else {
                    serde_json::from_slice(&raw.body)
                        .map(Payload::Json)
                        .unwrap_or_else(|_| Payload::Text(raw.text()))
                }
            }
            ContentKind::Text | ContentKind::Html => Payload::Text(raw.text()),
            ContentKind::Binary | ContentKind::File => Payload::Bytes(raw.body.clone()),
            ContentKind::Unknown => match std::str::from_utf8(&raw.body) {
                Ok(text) => serde_json::from_str(text)
                    .map(Payload::Json)
                    .unwrap_or_else(|_| Payload::Text(text.to_string())),
                Err(_) => Payload::Bytes(raw.body.clone()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::Headers;
    use serde::Deserialize;
    use serde_json::json;

    fn raw(kind: ContentKind, body: &[u8]) -> RawResponse {
        RawResponse {
            status: 200,
            headers: Headers::new(),
            content_kind: kind,
            body: body.to_vec(),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Post {
        id: u64,
        title: String,
    }

    #[test]
    fn test_json_parser() {
        let parser = JsonParser::<Post>::new();
        let post = parser
            .parse(&raw(ContentKind::Json, br#"{"id":1,"title":"hi"}"#))
            .unwrap();
        assert_eq!(post, Post { id: 1, title: "hi".into() });

        assert!(parser.parse(&raw(ContentKind::Json, b"{}")).is_err());
    }

    #[test]
    fn test_default_parser_by_kind() {
        let parser = DefaultParser;
        assert_eq!(
            parser.parse(&raw(ContentKind::Json, br#"[1,2]"#)).unwrap(),
            Payload::Json(json!([1, 2]))
        );
        assert_eq!(
            parser.parse(&raw(ContentKind::Json, b"not json")).unwrap(),
            Payload::Text("not json".into())
        );
        assert_eq!(
            parser.parse(&raw(ContentKind::Html, b"<p>x</p>")).unwrap(),
            Payload::Text("<p>x</p>".into())
        );
        assert_eq!(
            parser.parse(&raw(ContentKind::Binary, &[0xff, 0x00])).unwrap(),
            Payload::Bytes(vec![0xff, 0x00])
        );
        assert_eq!(
            parser.parse(&raw(ContentKind::Unknown, &[0xff, 0xfe])).unwrap(),
            Payload::Bytes(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn test_closure_parser() {
        let parser = |raw: &RawResponse| -> Result<usize, BoxError> { Ok(raw.body.len()) };
        assert_eq!(parser.parse(&raw(ContentKind::Text, b"abc")).unwrap(), 3);
    }
}
