//! Mock server helpers
//!
//! Files are served at `/{version}/{relative path}.gz`, matching the URLs
//! built for a manifest whose host is the mock server's URI.

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::fixtures::gzip;

/// Serve a manifest document
pub async fn mount_manifest(server: &MockServer, route: &str, manifest: &Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(manifest))
        .mount(server)
        .await;
}

/// Serve a manifest after a delay
pub async fn mount_delayed_manifest(
    server: &MockServer,
    route: &str,
    manifest: &Value,
    delay: Duration,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(manifest)
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Respond to `route` with a bare status
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Respond to `route` with a body that is not JSON
pub async fn mount_garbage(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(server)
        .await;
}

/// Serve a gzipped file
pub async fn mount_gz_file(server: &MockServer, version: &str, relative: &str, content: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file_route(version, relative)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(content)))
        .mount(server)
        .await;
}

/// Serve `body` as-is at a file route
pub async fn mount_raw_file(server: &MockServer, version: &str, relative: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(file_route(version, relative)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Serve corrupt content `bad_count` times, then the real file
pub async fn mount_corrupt_then_good(
    server: &MockServer,
    version: &str,
    relative: &str,
    bad_count: u64,
    bad: &[u8],
    good: &[u8],
) {
    Mock::given(method("GET"))
        .and(path(file_route(version, relative)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzip(bad)))
        .up_to_n_times(bad_count)
        .mount(server)
        .await;

    mount_gz_file(server, version, relative, good).await;
}

/// Serve the version endpoint document
pub async fn mount_version_endpoint(
    server: &MockServer,
    version: &str,
    address: &str,
    hash: Option<&str>,
) {
    let mut body = json!({ "version": version, "address": address });
    if let Some(hash) = hash {
        body["hash"] = json!(hash);
    }
    Mock::given(method("GET"))
        .and(path(super::constants::VERSION_ROUTE))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve raw bytes and expect exactly `expected_calls` requests
pub async fn mount_binary(server: &MockServer, route: &str, content: &[u8], expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn file_route(version: &str, relative: &str) -> String {
    format!("/{}/{}.gz", version, relative)
}

/// Number of requests the server saw for `route`
pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}
