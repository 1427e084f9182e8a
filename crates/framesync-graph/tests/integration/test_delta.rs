//! Delta query behavior: change mapping, token extraction, the `latest`
//! start-token form, and pagination.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use framesync_core::domain::DeltaToken;
use framesync_core::ports::photo_provider::IPhotoProvider;

use crate::common::setup_provider;

fn delta_image(id: &str, name: &str, parent: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "file": {"mimeType": "image/jpeg"},
        "photo": {"takenDateTime": "2024-06-01T08:00:00Z"},
        "parentReference": {"id": parent},
        "createdDateTime": "2024-06-01T08:00:00Z"
    })
}

#[tokio::test]
async fn delta_maps_changes_and_persistable_token() {
    let (server, _token, provider) = setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .and(query_param("token", "T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                delta_image("p11", "new.jpg", "album-1"),
                {"id": "p3", "deleted": {"state": "deleted"}},
                {"id": "folder-x", "name": "folder-x", "folder": {}},
                {"id": "doc-1", "name": "notes.txt", "file": {"mimeType": "text/plain"}}
            ],
            "@odata.deltaLink":
                format!("{}/me/drive/root/delta?token=T2", server.uri())
        })))
        .mount(&server)
        .await;

    let page = provider.delta(&DeltaToken::new("T").unwrap()).await.unwrap();

    assert_eq!(page.added_or_modified.len(), 1);
    assert_eq!(page.added_or_modified[0].id.as_str(), "p11");
    assert_eq!(page.added_or_modified[0].container_key, "album-1");
    assert_eq!(page.deleted_ids.len(), 1);
    assert_eq!(page.deleted_ids[0].as_str(), "p3");
    assert_eq!(page.next_token.as_str(), "T2");
}

#[tokio::test]
async fn delta_start_token_uses_latest_form() {
    let (server, _token, provider) = setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .and(query_param("token", "latest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [],
            "@odata.deltaLink":
                format!("{}/me/drive/root/delta?token=start-1", server.uri())
        })))
        .mount(&server)
        .await;

    let token = provider.delta_start_token().await.unwrap();
    assert_eq!(token.as_str(), "start-1");
}

#[tokio::test]
async fn delta_follows_pagination_to_the_final_page() {
    let (server, _token, provider) = setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .and(query_param("token", "T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [delta_image("p1", "one.jpg", "root")],
            "@odata.nextLink": format!("{}/delta-page-2", server.uri())
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/delta-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [delta_image("p2", "two.jpg", "root")],
            "@odata.deltaLink":
                format!("{}/me/drive/root/delta?token=T-final", server.uri())
        })))
        .mount(&server)
        .await;

    let page = provider.delta(&DeltaToken::new("T").unwrap()).await.unwrap();

    let ids: Vec<&str> = page.added_or_modified.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    assert_eq!(page.next_token.as_str(), "T-final");
}

#[tokio::test]
async fn expired_delta_token_error_carries_the_status() {
    let (server, _token, provider) = setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/delta"))
        .respond_with(ResponseTemplate::new(410).set_body_json(serde_json::json!({
            "error": {"code": "resyncRequired", "message": "resync required"}
        })))
        .mount(&server)
        .await;

    let err = provider
        .delta(&DeltaToken::new("stale").unwrap())
        .await
        .unwrap_err();

    let text = format!("{err:#}");
    assert!(text.contains("410"), "expected 410 in: {text}");
}

#[tokio::test]
async fn uninitialized_provider_refuses_delta() {
    let server = MockServer::start().await;
    let token = crate::common::token_file();
    let provider = framesync_graph::GraphPhotoProvider::with_base_url(
        token.path().to_path_buf(),
        server.uri(),
    );

    let err = provider
        .delta(&DeltaToken::new("T").unwrap())
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("not initialized"));
}
