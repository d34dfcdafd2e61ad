use super::{cohort_fixture, payload, start_server};
use hotswap::catalog::rotation::{Cohort, TagRotator};
use hotswap::platform::Platform;
use hotswap::release::ReleaseInfo;
use hotswap::test_utils::{CatalogFixture, LogCapture};
use hotswap::verification::ChecksumVerifier;
use std::sync::Arc;

async fn latest_version(base: &str, platform: Platform) -> Option<String> {
    let response = reqwest::get(format!("{base}/api/releases/{platform}/latest/info"))
        .await
        .unwrap();
    if response.status() == reqwest::StatusCode::NOT_FOUND {
        return None;
    }
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    Some(response.json::<ReleaseInfo>().await.unwrap().version)
}

#[tokio::test]
async fn test_info_returns_pascal_case_metadata() {
    let fixture = cohort_fixture();
    let (_catalog, server) = start_server(&fixture).await;

    let response = reqwest::get(format!("{}/api/releases/linux/latest/info", server.url()))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["Version"], "1.0");
    assert_eq!(body["Platform"], "linux");
    assert_eq!(
        body["Checksum"],
        ChecksumVerifier::sha256_of(&payload("1.0")).as_str()
    );
    assert!(body.get("File").is_none());

    let tags: Vec<String> = serde_json::from_value(body["Tags"].clone()).unwrap();
    assert!(tags.contains(&"latest".to_string()));
}

#[tokio::test]
async fn test_download_streams_payload() {
    let fixture = cohort_fixture();
    let (_catalog, server) = start_server(&fixture).await;

    let response = reqwest::get(format!("{}/api/releases/darwin/2.1", server.url()))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(
        response.headers()[reqwest::header::CONTENT_TYPE],
        "application/octet-stream"
    );
    assert_eq!(response.content_length(), Some(payload("2.1").len() as u64));
    assert_eq!(response.bytes().await.unwrap().as_ref(), payload("2.1").as_slice());
}

#[tokio::test]
async fn test_unknown_version_is_not_found() {
    let fixture = cohort_fixture();
    let (_catalog, server) = start_server(&fixture).await;

    for path in [
        "/api/releases/darwin/9.9/info",
        "/api/releases/darwin/9.9",
    ] {
        let response = reqwest::get(format!("{}{path}", server.url())).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND, "{path}");
        let body = response.text().await.unwrap();
        assert!(body.contains("Not found!"), "{path}");
    }
}

#[tokio::test]
async fn test_invalid_parameters_are_not_found() {
    let fixture = cohort_fixture();
    let (_catalog, server) = start_server(&fixture).await;

    for path in [
        "/api/releases/solaris/latest/info",
        "/api/releases/Linux/latest/info",
        "/api/releases/linux/1.0.0/info",
        "/api/releases/linux/v1.0",
        "/api/releases/linux/newest",
        "/api/nothing/here",
    ] {
        let response = reqwest::get(format!("{}{path}", server.url())).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND, "{path}");
    }

    // Known route, wrong method
    let response = reqwest::Client::new()
        .post(format!("{}/api/releases/linux/latest/info", server.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(response.text().await.unwrap().contains("Not found!"));
}

#[tokio::test]
async fn test_empty_catalog_serves_not_found() {
    let fixture = CatalogFixture::new().unwrap();
    let logs = LogCapture::default();
    let (catalog, server) = {
        let _guard = logs.install();
        start_server(&fixture).await
    };

    assert!(catalog.is_empty());
    assert!(logs.contents().contains("Catalog has no releases"));
    assert!(latest_version(&server.url(), Platform::Linux).await.is_none());
}

#[tokio::test]
async fn test_index_page_documents_api() {
    let fixture = cohort_fixture();
    let (_catalog, server) = start_server(&fixture).await;

    let response = reqwest::get(server.url()).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.text().await.unwrap().contains("/api/releases/"));
}

#[tokio::test]
async fn test_missing_payload_answers_server_error() {
    let fixture = cohort_fixture();
    let (_catalog, server) = start_server(&fixture).await;
    std::fs::remove_file(
        fixture
            .dir()
            .join(hotswap::test_utils::payload_file_name(Platform::Linux, "2.0")),
    )
    .unwrap();

    let response = reqwest::get(format!("{}/api/releases/linux/2.0", server.url()))
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[tokio::test]
async fn test_odd_even_rotation_over_http() {
    let fixture = cohort_fixture();
    let (catalog, server) = start_server(&fixture).await;
    let rotator = TagRotator::new(Arc::clone(&catalog));
    let base = server.url();

    assert_eq!(rotator.rotate_for_minute(7), Cohort::Odd);
    assert_eq!(latest_version(&base, Platform::Linux).await.as_deref(), Some("1.0"));
    assert_eq!(latest_version(&base, Platform::Darwin).await.as_deref(), Some("1.1"));
    assert_eq!(latest_version(&base, Platform::Windows).await.as_deref(), Some("1.2"));

    assert_eq!(rotator.rotate_for_minute(8), Cohort::Even);
    assert_eq!(latest_version(&base, Platform::Linux).await.as_deref(), Some("2.0"));
    assert_eq!(latest_version(&base, Platform::Darwin).await.as_deref(), Some("2.1"));
    // No even windows build: the platform has no latest until the next odd minute
    assert_eq!(latest_version(&base, Platform::Windows).await, None);

    rotator.rotate_for_minute(9);
    assert_eq!(latest_version(&base, Platform::Linux).await.as_deref(), Some("1.0"));
    assert_eq!(latest_version(&base, Platform::Windows).await.as_deref(), Some("1.2"));
}
