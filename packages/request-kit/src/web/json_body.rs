use actix_web::dev::Payload;
use actix_web::http::header::CONTENT_TYPE;
use actix_web::HttpRequest;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Error as JsonError;
use tracing::{debug, warn};

use crate::error::WebError;

const JSON_MEDIA_TYPE: &str = "application/json";

/// Reject requests whose Content-Type does not mention `application/json`.
pub fn ensure_json_content_type(req: &HttpRequest) -> Result<(), WebError> {
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok());

    match content_type {
        Some(ct) if ct.to_ascii_lowercase().contains(JSON_MEDIA_TYPE) => Ok(()),
        other => Err(WebError::content_type(other)),
    }
}

/// Drain `payload`, failing once more than `limit` bytes arrive.
pub async fn read_body(payload: &mut Payload, limit: usize) -> Result<Bytes, WebError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            warn!(error = %e, "Failed to read request body chunk");
            WebError::bad_request("Failed to read request body")
        })?;
        if body.len() + chunk.len() > limit {
            return Err(WebError::PayloadTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

pub fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, WebError> {
    serde_json::from_slice::<T>(body).map_err(|e| {
        debug!(error = %e, body_size = body.len(), "JSON parsing failed");
        WebError::bad_request(classify_json_error(&e))
    })
}

/// Sanitized, client-facing description of a parse failure.
fn classify_json_error(error: &JsonError) -> String {
    match error.classify() {
        serde_json::error::Category::Syntax => {
            format!("Invalid JSON at line {}", error.line())
        }
        serde_json::error::Category::Eof => "Invalid JSON: unexpected end of input".to_string(),
        serde_json::error::Category::Data => {
            "Invalid JSON: wrong shape for the expected value".to_string()
        }
        serde_json::error::Category::Io => "Invalid JSON: I/O error while reading body".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;
    use serde_json::{Map, Value};

    use super::*;

    #[test]
    fn test_json_content_type_accepts_charset_and_case() {
        for ct in [
            "application/json",
            "application/json; charset=UTF-8",
            "Application/JSON",
        ] {
            let req = TestRequest::default()
                .insert_header(("content-type", ct))
                .to_http_request();
            assert!(ensure_json_content_type(&req).is_ok(), "{ct} should pass");
        }
    }

    #[test]
    fn test_json_content_type_rejects_other_types() {
        let req = TestRequest::default()
            .insert_header(("content-type", "text/plain"))
            .to_http_request();
        match ensure_json_content_type(&req) {
            Err(WebError::ContentType { received }) => assert_eq!(received, "text/plain"),
            other => panic!("Expected ContentType error, got {other:?}"),
        }

        let missing = TestRequest::default().to_http_request();
        assert!(matches!(
            ensure_json_content_type(&missing),
            Err(WebError::ContentType { .. })
        ));
    }

    #[test]
    fn test_parse_classifies_errors() {
        let syntax = parse::<Value>(br#"{"a": }"#).unwrap_err();
        assert!(syntax.to_string().contains("Invalid JSON at line 1"));

        let eof = parse::<Value>(br#"{"a": 1"#).unwrap_err();
        assert!(eof.to_string().contains("unexpected end of input"));

        let data = parse::<Map<String, Value>>(b"[1, 2]").unwrap_err();
        assert!(data.to_string().contains("wrong shape"));
    }

    #[actix_web::test]
    async fn test_read_body_enforces_limit() {
        let (_req, mut payload) = TestRequest::default()
            .set_payload("0123456789")
            .to_http_parts();

        let err = read_body(&mut payload, 4).await.unwrap_err();
        assert!(matches!(err, WebError::PayloadTooLarge { limit: 4 }));
    }

    #[actix_web::test]
    async fn test_read_body_collects_payload() {
        let (_req, mut payload) = TestRequest::default().set_payload("hello").to_http_parts();

        let body = read_body(&mut payload, 1024).await.unwrap();
        assert_eq!(&body[..], b"hello");
    }
}
