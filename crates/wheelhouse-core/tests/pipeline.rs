//! End-to-end pipeline tests: PyPI-shaped index over HTTP, resolution,
//! wheel selection, and verified downloads into a real directory.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio_stream::StreamExt;
use wheelhouse_core::{FetchRequest, ProgressEvent, PypiClient, Session};
use wheelhouse_schema::{PackageRequest, RuntimeTarget};

struct WheelFixture {
    name: &'static str,
    version: &'static str,
    filename: String,
    body: Vec<u8>,
}

impl WheelFixture {
    fn new(name: &'static str, version: &'static str) -> Self {
        Self {
            name,
            version,
            filename: format!("{name}-{version}-py3-none-any.whl"),
            body: format!("wheel bytes for {name} {version}").into_bytes(),
        }
    }

    fn file_entry(&self, base_url: &str) -> serde_json::Value {
        serde_json::json!({
            "filename": self.filename,
            "url": format!("{base_url}/files/{}", self.filename),
            "size": self.body.len(),
            "digests": { "sha256": hex::encode(Sha256::digest(&self.body)) },
            "packagetype": "bdist_wheel",
            "yanked": false,
        })
    }
}

/// Register project + version + file mocks for one wheel-bearing package.
async fn mock_package(
    server: &mut mockito::Server,
    wheel: &WheelFixture,
    requires: &[&str],
) -> Vec<mockito::Mock> {
    let base = server.url();
    let project = serde_json::json!({
        "releases": { wheel.version: [wheel.file_entry(&base)] }
    });
    let version = serde_json::json!({
        "info": { "requires_dist": requires },
        "urls": [wheel.file_entry(&base)],
    });
    vec![
        server
            .mock("GET", format!("/pypi/{}/json", wheel.name).as_str())
            .with_status(200)
            .with_body(project.to_string())
            .create_async()
            .await,
        server
            .mock(
                "GET",
                format!("/pypi/{}/{}/json", wheel.name, wheel.version).as_str(),
            )
            .with_status(200)
            .with_body(version.to_string())
            .create_async()
            .await,
        server
            .mock("GET", format!("/files/{}", wheel.filename).as_str())
            .with_status(200)
            .with_body(wheel.body.clone())
            .create_async()
            .await,
    ]
}

#[tokio::test]
async fn closure_resolves_and_lands_verified_wheels() {
    let mut server = mockito::Server::new_async().await;
    let alpha = WheelFixture::new("alpha", "1.2.0");
    let beta = WheelFixture::new("beta", "0.9.1");
    let _m1 = mock_package(&mut server, &alpha, &["beta (>=0.9)"]).await;
    let _m2 = mock_package(&mut server, &beta, &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();
    let session = Arc::new(Session::new(
        PypiClient::new(client.clone(), server.url()),
        client,
    ));

    let (_id, mut stream) = session.submit(FetchRequest::new(
        PackageRequest::latest("alpha"),
        RuntimeTarget::new("3.11", "any"),
        dir.path(),
    ));

    let mut resolved = Vec::new();
    let mut summary = None;
    while let Some(event) = stream.next().await {
        match event {
            ProgressEvent::PackageResolved { name, .. } => resolved.push(name.to_string()),
            ProgressEvent::RunCompleted { succeeded, failed, canceled } => {
                summary = Some((succeeded, failed, canceled));
            }
            _ => {}
        }
    }

    assert_eq!(summary, Some((2, 0, 0)));
    assert_eq!(resolved, vec!["alpha", "beta"]);
    assert_eq!(std::fs::read(dir.path().join(&alpha.filename)).unwrap(), alpha.body);
    assert_eq!(std::fs::read(dir.path().join(&beta.filename)).unwrap(), beta.body);
}

#[tokio::test]
async fn sdist_only_dependency_is_reported_and_skipped() {
    let mut server = mockito::Server::new_async().await;
    let alpha = WheelFixture::new("alpha", "1.0.0");
    let _m1 = mock_package(&mut server, &alpha, &["srconly"]).await;

    // srconly publishes a release but no wheel files.
    let base = server.url();
    let sdist = serde_json::json!({
        "filename": "srconly-2.0.tar.gz",
        "url": format!("{base}/files/srconly-2.0.tar.gz"),
        "size": 10,
        "digests": {},
        "packagetype": "sdist",
        "yanked": false,
    });
    let _p = server
        .mock("GET", "/pypi/srconly/json")
        .with_status(200)
        .with_body(serde_json::json!({"releases": {"2.0": [sdist]}}).to_string())
        .create_async()
        .await;
    let _v = server
        .mock("GET", "/pypi/srconly/2.0/json")
        .with_status(200)
        .with_body(
            serde_json::json!({"info": {"requires_dist": []}, "urls": [sdist]}).to_string(),
        )
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();
    let session = Arc::new(Session::new(
        PypiClient::new(client.clone(), server.url()),
        client,
    ));

    let (_id, mut stream) = session.submit(FetchRequest::new(
        PackageRequest::latest("alpha"),
        RuntimeTarget::new("3.11", "any"),
        dir.path(),
    ));

    let mut unresolvable = Vec::new();
    let mut summary = None;
    while let Some(event) = stream.next().await {
        match event {
            ProgressEvent::PackageUnresolvable { name, reason } => {
                unresolvable.push((name.to_string(), reason));
            }
            ProgressEvent::RunCompleted { succeeded, failed, canceled } => {
                summary = Some((succeeded, failed, canceled));
            }
            _ => {}
        }
    }

    // The root still lands; the sdist-only dependency is reported.
    assert_eq!(summary, Some((1, 0, 0)));
    assert_eq!(unresolvable.len(), 1);
    assert_eq!(unresolvable[0].0, "srconly");
    assert!(unresolvable[0].1.contains("no compatible artifact"));
    assert!(dir.path().join(&alpha.filename).exists());
}

#[tokio::test]
async fn no_deps_request_downloads_only_the_root() {
    let mut server = mockito::Server::new_async().await;
    let alpha = WheelFixture::new("alpha", "3.0.0");
    let beta = WheelFixture::new("beta", "1.0.0");
    let _m1 = mock_package(&mut server, &alpha, &["beta"]).await;
    let _m2 = mock_package(&mut server, &beta, &[]).await;

    let dir = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();
    let session = Arc::new(Session::new(
        PypiClient::new(client.clone(), server.url()),
        client,
    ));

    let mut request = FetchRequest::new(
        PackageRequest::exact("alpha", "3.0.0"),
        RuntimeTarget::new("3.11", "any"),
        dir.path(),
    );
    request.follow_dependencies = false;
    let (_id, mut stream) = session.submit(request);
    while stream.next().await.is_some() {}

    assert!(dir.path().join(&alpha.filename).exists());
    assert!(!dir.path().join(&beta.filename).exists());
}

#[tokio::test]
async fn corrupted_artifact_fails_cleanly_without_poisoning_the_run() {
    let mut server = mockito::Server::new_async().await;
    let good = WheelFixture::new("good", "1.0.0");
    let _m = mock_package(&mut server, &good, &["evil"]).await;

    // evil's declared digest will not match the served body.
    let base = server.url();
    let entry = serde_json::json!({
        "filename": "evil-1.0-py3-none-any.whl",
        "url": format!("{base}/files/evil-1.0-py3-none-any.whl"),
        "size": 13,
        "digests": {"sha256": "00".repeat(32)},
        "packagetype": "bdist_wheel",
        "yanked": false,
    });
    let _p = server
        .mock("GET", "/pypi/evil/json")
        .with_status(200)
        .with_body(serde_json::json!({"releases": {"1.0": [entry]}}).to_string())
        .create_async()
        .await;
    let _v = server
        .mock("GET", "/pypi/evil/1.0/json")
        .with_status(200)
        .with_body(
            serde_json::json!({"info": {"requires_dist": []}, "urls": [entry]}).to_string(),
        )
        .create_async()
        .await;
    let _f = server
        .mock("GET", "/files/evil-1.0-py3-none-any.whl")
        .with_status(200)
        .with_body("not the bytes!")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let client = reqwest::Client::new();
    let session = Arc::new(Session::new(
        PypiClient::new(client.clone(), server.url()),
        client,
    ));

    let (_id, mut stream) = session.submit(FetchRequest::new(
        PackageRequest::latest("good"),
        RuntimeTarget::new("3.11", "any"),
        dir.path(),
    ));

    let mut summary = None;
    while let Some(event) = stream.next().await {
        if let ProgressEvent::RunCompleted { succeeded, failed, canceled } = event {
            summary = Some((succeeded, failed, canceled));
        }
    }

    assert_eq!(summary, Some((1, 1, 0)));
    assert!(dir.path().join(&good.filename).exists());
    assert!(!dir.path().join("evil-1.0-py3-none-any.whl").exists());
    // No partial left behind either.
    assert!(!dir.path().join(".evil-1.0-py3-none-any.whl.partial").exists());
}
