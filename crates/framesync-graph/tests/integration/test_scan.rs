//! Container scan behavior: depth bounds, cycles, MIME filtering,
//! deduplication, pagination.

use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use framesync_core::ports::photo_provider::{ContainerSpec, IPhotoProvider};

use crate::common::{folder_item, image_item, mount_children, setup_provider};

#[tokio::test]
async fn depth_zero_scans_only_the_named_container() {
    let (server, _token, provider) = setup_provider().await;

    mount_children(
        &server,
        "album-1",
        serde_json::json!([
            image_item("img-top", "top.jpg", "2024-01-01T00:00:00Z"),
            folder_item("album-1-sub"),
        ]),
    )
    .await;
    mount_children(
        &server,
        "album-1-sub",
        serde_json::json!([image_item("img-deep", "deep.jpg", "2024-01-02T00:00:00Z")]),
    )
    .await;

    let photos = provider
        .full_scan(&[ContainerSpec {
            id: "album-1".to_string(),
            depth: 0,
        }])
        .await
        .unwrap();

    let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["img-top"]);
}

#[tokio::test]
async fn bounded_depth_stops_below_the_limit() {
    let (server, _token, provider) = setup_provider().await;

    mount_children(
        &server,
        "root",
        serde_json::json!([folder_item("level-1")]),
    )
    .await;
    mount_children(
        &server,
        "level-1",
        serde_json::json!([
            image_item("img-1", "one.jpg", "2024-01-01T00:00:00Z"),
            folder_item("level-2"),
        ]),
    )
    .await;
    mount_children(
        &server,
        "level-2",
        serde_json::json!([image_item("img-2", "two.jpg", "2024-01-02T00:00:00Z")]),
    )
    .await;

    let photos = provider
        .full_scan(&[ContainerSpec {
            id: "root".to_string(),
            depth: 1,
        }])
        .await
        .unwrap();

    let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["img-1"]);
}

#[tokio::test]
async fn unbounded_scan_terminates_on_cyclic_containers() {
    let (server, _token, provider) = setup_provider().await;

    // folder-a and folder-b reference each other.
    mount_children(
        &server,
        "folder-a",
        serde_json::json!([
            folder_item("folder-b"),
            image_item("img-a", "a.jpg", "2024-01-01T00:00:00Z"),
        ]),
    )
    .await;
    mount_children(
        &server,
        "folder-b",
        serde_json::json!([
            folder_item("folder-a"),
            image_item("img-b", "b.jpg", "2024-01-02T00:00:00Z"),
        ]),
    )
    .await;

    let photos = provider
        .full_scan(&[ContainerSpec::unbounded("folder-a")])
        .await
        .unwrap();

    let mut ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["img-a", "img-b"]);
}

#[tokio::test]
async fn non_image_entries_are_excluded() {
    let (server, _token, provider) = setup_provider().await;

    mount_children(
        &server,
        "root",
        serde_json::json!([
            image_item("img-1", "photo.jpg", "2024-01-01T00:00:00Z"),
            {
                "id": "doc-1",
                "name": "notes.txt",
                "file": {"mimeType": "text/plain"}
            },
            {
                "id": "vid-1",
                "name": "clip.mp4",
                "file": {"mimeType": "video/mp4"}
            }
        ]),
    )
    .await;

    let photos = provider
        .full_scan(&[ContainerSpec::unbounded("root")])
        .await
        .unwrap();

    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].id.as_str(), "img-1");
    assert_eq!(photos[0].filename, "photo.jpg");
    assert_eq!(photos[0].width, Some(4000));
}

#[tokio::test]
async fn photos_visible_from_two_containers_are_deduplicated() {
    let (server, _token, provider) = setup_provider().await;

    let shared = image_item("img-shared", "shared.jpg", "2024-01-01T00:00:00Z");
    mount_children(&server, "album-1", serde_json::json!([shared.clone()])).await;
    mount_children(&server, "album-2", serde_json::json!([shared])).await;

    let photos = provider
        .full_scan(&[
            ContainerSpec::unbounded("album-1"),
            ContainerSpec::unbounded("album-2"),
        ])
        .await
        .unwrap();

    assert_eq!(photos.len(), 1);
    // Attributed to the container it was first discovered in.
    assert_eq!(photos[0].container_key, "album-1");
}

#[tokio::test]
async fn scan_follows_pagination_links() {
    let (server, _token, provider) = setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/root/children"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [image_item("img-page1", "one.jpg", "2024-01-01T00:00:00Z")],
            "@odata.nextLink": format!("{}/scan-page-2", server.uri())
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/scan-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [image_item("img-page2", "two.jpg", "2024-01-02T00:00:00Z")]
        })))
        .mount(&server)
        .await;

    let photos = provider
        .full_scan(&[ContainerSpec::unbounded("root")])
        .await
        .unwrap();

    let ids: Vec<&str> = photos.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["img-page1", "img-page2"]);
}

#[tokio::test]
async fn scan_surfaces_listing_errors() {
    let (server, _token, provider) = setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/items/missing-album/children"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": "itemNotFound", "message": "folder not found"}
        })))
        .mount(&server)
        .await;

    let err = provider
        .full_scan(&[ContainerSpec::unbounded("missing-album")])
        .await
        .unwrap_err();

    let text = format!("{err:#}");
    assert!(text.contains("404"), "error should carry the status: {text}");
}
