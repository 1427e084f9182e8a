//! Download streaming and init probe behavior.

use std::time::Duration;

use futures::TryStreamExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use framesync_core::domain::PhotoId;
use framesync_core::ports::photo_provider::IPhotoProvider;

use crate::common::{setup_provider, token_file};

#[tokio::test]
async fn download_streams_the_original_bytes() {
    let (server, _token, provider) = setup_provider().await;

    let body: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    Mock::given(method("GET"))
        .and(path("/me/drive/items/p1/content"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let stream = provider
        .download(&PhotoId::new("p1").unwrap(), Duration::from_secs(30))
        .await
        .unwrap();

    let chunks: Vec<bytes::Bytes> = stream.try_collect().await.unwrap();
    let downloaded: Vec<u8> = chunks.concat();
    assert_eq!(downloaded, body);
}

#[tokio::test]
async fn download_surfaces_http_errors() {
    let (server, _token, provider) = setup_provider().await;

    Mock::given(method("GET"))
        .and(path("/me/drive/items/gone/content"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = match provider
        .download(&PhotoId::new("gone").unwrap(), Duration::from_secs(30))
        .await
    {
        Ok(_) => panic!("expected download to fail"),
        Err(err) => err,
    };
    assert!(format!("{err:#}").contains("404"));
}

#[tokio::test]
async fn init_fails_fast_on_permission_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": "accessDenied", "message": "permission denied"}
        })))
        .mount(&server)
        .await;

    let token = token_file();
    let provider = framesync_graph::GraphPhotoProvider::with_base_url(
        token.path().to_path_buf(),
        server.uri(),
    );

    let err = provider.init().await.unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("403"), "expected 403 in: {text}");
}

#[tokio::test]
async fn init_fails_without_a_token_file() {
    let server = MockServer::start().await;
    let provider = framesync_graph::GraphPhotoProvider::with_base_url(
        std::path::PathBuf::from("/nonexistent/token.json"),
        server.uri(),
    );

    let err = provider.init().await.unwrap_err();
    assert!(format!("{err:#}").contains("permission denied"));
}
