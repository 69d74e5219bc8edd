//! GitHub catalog walking against a mock API

#![allow(clippy::expect_used, clippy::unwrap_used)]

use apkdelta_formats::Manifest;
use apkdelta_formats::manifest::{ManifestDetail, OpatchDetail};
use apkdelta_release::{GithubReleases, ManifestSource, ReleaseError};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_manifest(tag: &str, patch_file: &str) -> Manifest {
    Manifest {
        repo: "owner/repo".to_string(),
        tag: tag.to_string(),
        from_version: Some("1.0.0".to_string()),
        to_version: Some("1.0.0".to_string()),
        from_patch_index: Some(0),
        to_patch_index: Some(1),
        base_sha256: "a".repeat(64),
        target_sha256: "b".repeat(64),
        patch_file: patch_file.to_string(),
        patch_sha256: "c".repeat(64),
        created_at: 1_700_000_000,
        detail: ManifestDetail::Opatch(OpatchDetail { block_size: 4096 }),
    }
}

#[tokio::test]
async fn catalog_recovers_manifests_from_bodies_and_assets() {
    let server = MockServer::start().await;

    let body_manifest = sample_manifest("v1.0.0+1", "a.opatch.gz");
    let asset_manifest = sample_manifest("v1.0.0+2", "b.opatch.gz");

    // Release 1: manifest embedded in the body. Release 2: body is prose,
    // manifest only available as a .json asset. Release 3: draft, skipped.
    let page1 = serde_json::json!([
        {
            "id": 1,
            "tag_name": "v1.0.0+1",
            "draft": false,
            "body": body_manifest.to_json().unwrap(),
            "upload_url": "",
            "assets": []
        },
        {
            "id": 2,
            "tag_name": "v1.0.0+2",
            "draft": false,
            "body": "release notes without JSON",
            "upload_url": "",
            "assets": [
                {
                    "id": 21,
                    "name": "patch_meta.json",
                    "browser_download_url": format!("{}/download/patch_meta.json", server.uri())
                }
            ]
        },
        {
            "id": 3,
            "tag_name": "v9.9.9-draft",
            "draft": true,
            "body": null,
            "upload_url": "",
            "assets": []
        }
    ]);

    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page1))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/patch_meta.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(asset_manifest.to_json().unwrap()),
        )
        .mount(&server)
        .await;

    let source = GithubReleases::new("owner/repo")
        .unwrap()
        .with_api_base(server.uri())
        .with_max_retries(0);

    let catalog = source.catalog().await.unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog[0], body_manifest);
    assert_eq!(catalog[1], asset_manifest);
}

#[tokio::test]
async fn catalog_skips_unparseable_releases() {
    let server = MockServer::start().await;

    let page = serde_json::json!([
        {
            "id": 1,
            "tag_name": "broken",
            "draft": false,
            "body": "{\"format\": \"who-knows-3\"}",
            "upload_url": "",
            "assets": []
        },
        {
            "id": 2,
            "tag_name": "v1.0.0+1",
            "draft": false,
            "body": sample_manifest("v1.0.0+1", "a.opatch.gz").to_json().unwrap(),
            "upload_url": "",
            "assets": []
        }
    ]);

    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let source = GithubReleases::new("owner/repo")
        .unwrap()
        .with_api_base(server.uri())
        .with_max_retries(0);

    let catalog = source.catalog().await.unwrap();
    assert_eq!(catalog.len(), 1);
    assert_eq!(catalog[0].tag, "v1.0.0+1");
}

#[tokio::test]
async fn fetch_artifact_downloads_named_asset() {
    let server = MockServer::start().await;
    let manifest = sample_manifest("v1.0.0+1", "delta.opatch.gz");

    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases/tags/v1.0.0+1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 1,
            "tag_name": "v1.0.0+1",
            "draft": false,
            "body": null,
            "upload_url": "",
            "assets": [
                {
                    "id": 11,
                    "name": "delta.opatch.gz",
                    "browser_download_url": format!("{}/download/delta.opatch.gz", server.uri())
                }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/download/delta.opatch.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"patch-bytes".to_vec()))
        .mount(&server)
        .await;

    let source = GithubReleases::new("owner/repo")
        .unwrap()
        .with_api_base(server.uri())
        .with_max_retries(0);

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("delta.opatch.gz");
    source.fetch_artifact(&manifest, &dest).await.unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"patch-bytes");
}

#[tokio::test]
async fn missing_release_is_a_distinct_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases/tags/v0.0.1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = GithubReleases::new("owner/repo")
        .unwrap()
        .with_api_base(server.uri())
        .with_max_retries(0);

    let manifest = sample_manifest("v0.0.1", "x.gz");
    let dir = tempfile::tempdir().unwrap();
    let err = source
        .fetch_artifact(&manifest, &dir.path().join("x.gz"))
        .await
        .unwrap_err();
    assert!(matches!(err, ReleaseError::ReleaseNotFound { .. }));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/repos/owner/repo/releases"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let source = GithubReleases::new("owner/repo")
        .unwrap()
        .with_api_base(server.uri())
        .with_max_retries(2)
        .with_initial_backoff_ms(1);

    let catalog = source.catalog().await.unwrap();
    assert!(catalog.is_empty());
}
