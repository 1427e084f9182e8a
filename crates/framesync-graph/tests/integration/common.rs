//! Shared test helpers for Graph provider integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server and returns an
//! initialized provider pointing at it.

use std::io::Write;

use tempfile::NamedTempFile;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use framesync_core::ports::IPhotoProvider;
use framesync_graph::GraphPhotoProvider;

/// Writes a throwaway token file; keep the handle alive for the test
pub fn token_file() -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("create token file");
    tmp.write_all(br#"{"access_token": "test-access-token"}"#)
        .unwrap();
    tmp.flush().unwrap();
    tmp
}

/// Starts a mock server with a succeeding `/me` probe and returns an
/// initialized provider against it
pub async fn setup_provider() -> (MockServer, NamedTempFile, GraphPhotoProvider) {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "displayName": "Frame Account",
            "userPrincipalName": "frame@example.com",
            "id": "user-001"
        })))
        .mount(&server)
        .await;

    let token = token_file();
    let provider = GraphPhotoProvider::with_base_url(token.path().to_path_buf(), server.uri());
    provider
        .init()
        .await
        .expect("provider init against mock server");

    (server, token, provider)
}

/// Mounts a children listing for one container
pub async fn mount_children(server: &MockServer, container_id: &str, items: serde_json::Value) {
    let endpoint = if container_id == "root" {
        "/me/drive/root/children".to_string()
    } else {
        format!("/me/drive/items/{container_id}/children")
    };

    Mock::given(method("GET"))
        .and(path(endpoint))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "value": items })),
        )
        .mount(server)
        .await;
}

/// A folder entry as the children endpoint returns it
pub fn folder_item(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": id,
        "folder": {"childCount": 1}
    })
}

/// An image entry with a capture timestamp
pub fn image_item(id: &str, name: &str, taken: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "file": {"mimeType": "image/jpeg"},
        "photo": {"takenDateTime": taken},
        "image": {"width": 4000, "height": 3000},
        "createdDateTime": "2024-01-01T00:00:00Z"
    })
}
