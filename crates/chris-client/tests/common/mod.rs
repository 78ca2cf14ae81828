//! Helpers shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Host used by the URLs in the fixtures.
pub const FIXTURE_HOST: &str = "http://cube.test";

/// Get the path to the test fixtures directory.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load a fixture as text.
pub fn load_fixture(name: &str) -> String {
    let fixture_path = fixtures_dir().join(name);
    fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

/// Load a fixture whose URLs point at `server`.
pub fn fixture(name: &str, server: &MockServer) -> Value {
    let text = load_fixture(name).replace(FIXTURE_HOST, &server.uri());
    serde_json::from_str(&text).unwrap()
}

/// API root URL of the mock backend.
pub fn api_url(server: &MockServer) -> String {
    format!("{}/api/v1/", server.uri())
}

/// A page of search results holding every item.
pub fn page(results: Vec<Value>) -> Value {
    json!({
        "count": results.len(),
        "next": null,
        "previous": null,
        "results": results,
    })
}

/// Collection links of an anonymous user.
pub fn anonymous_links(server: &MockServer) -> Value {
    fixture("root_links.json", server)
}

/// Collection links of a logged in user.
pub fn user_links(server: &MockServer) -> Value {
    let mut links = anonymous_links(server);
    links["user"] = json!(format!("{}/api/v1/users/2/", server.uri()));
    links["userfiles"] = json!(format!("{}/api/v1/userfiles/", server.uri()));
    links
}

/// Collection links of an administrator.
pub fn admin_links(server: &MockServer) -> Value {
    let mut links = user_links(server);
    links["admin"] = json!(format!("{}/chris-admin/api/v1/", server.uri()));
    links
}

/// Serve `links` at the API root.
pub async fn mount_root(server: &MockServer, links: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection_links": links,
        })))
        .mount(server)
        .await;
}

/// Serve a JSON body for GET requests to `url_path`.
pub async fn mount_get(server: &MockServer, url_path: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
