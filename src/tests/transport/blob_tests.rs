use super::*;

#[test]
fn created_identifier_prefers_the_location_header() {
    let id = created_identifier(Some("/docs/abc123"), br#"{"id": "ignored"}"#);
    assert_eq!(id.as_deref(), Some("abc123"));
}

#[test]
fn created_identifier_takes_the_last_location_segment() {
    let id = created_identifier(Some("https://blobs.example/v1/docs/deadbeef/"), b"");
    assert_eq!(id.as_deref(), Some("deadbeef"));
}

#[test]
fn created_identifier_falls_back_to_the_body_id() {
    let id = created_identifier(None, br#"{"id": "abc123", "uri": "/docs/other"}"#);
    assert_eq!(id.as_deref(), Some("abc123"));
}

#[test]
fn created_identifier_falls_back_to_the_body_uri() {
    let id = created_identifier(None, br#"{"uri": "/docs/abc123"}"#);
    assert_eq!(id.as_deref(), Some("abc123"));
}

#[test]
fn created_identifier_rejects_an_empty_body_id() {
    let id = created_identifier(None, br#"{"id": ""}"#);
    assert_eq!(id, None);
}

#[test]
fn created_identifier_gives_up_without_any_identifier() {
    assert_eq!(created_identifier(None, b"not json"), None);
    assert_eq!(created_identifier(None, b"{}"), None);
}

#[test]
fn last_path_segment_handles_plain_and_trailing_slash() {
    assert_eq!(last_path_segment("/docs/abc"), Some("abc"));
    assert_eq!(last_path_segment("/docs/abc/"), Some("abc"));
    assert_eq!(last_path_segment("abc"), Some("abc"));
    assert_eq!(last_path_segment("/"), None);
    assert_eq!(last_path_segment(""), None);
}

#[test]
fn new_trims_the_base_url() {
    let transport =
        BlobTransport::new("http://localhost:8080/docs/".to_string(), None).expect("build");
    assert_eq!(transport.describe(), "http://localhost:8080/docs");
}

#[test]
fn describe_appends_the_document_id() {
    let transport = BlobTransport::new(
        "http://localhost:8080/docs".to_string(),
        Some("abc123".to_string()),
    )
    .expect("build");
    assert_eq!(transport.describe(), "http://localhost:8080/docs/abc123");
}
