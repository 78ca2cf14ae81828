//! Integration tests for the authenticated client and the models it returns.

mod common;

use chris_client::{
    ChrisClient, ClientBuilder, ClientConfig, Connector, Error, PluginInstance, QueryParams,
    SecretString, Status, UserLinks,
};
use chris_core::link::Linked;
use common::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "f3c6ed4bd6ba3d0e1d4c7a3d9b0e2a51";

async fn mount_authed_root(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .and(header("authorization", format!("Token {TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection_links": user_links(server),
        })))
        .mount(server)
        .await;
}

async fn client(server: &MockServer) -> ChrisClient {
    mount_authed_root(server).await;
    ChrisClient::from_token(api_url(server), &SecretString::from(TOKEN))
        .await
        .unwrap()
}

#[tokio::test]
async fn login_gets_token_then_discovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth-token/"))
        .and(body_json(json!({"username": "chris", "password": "chris1234"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": TOKEN})))
        .expect(1)
        .mount(&server)
        .await;
    mount_authed_root(&server).await;

    let chris = ChrisClient::from_login(api_url(&server), "chris", &SecretString::from("chris1234"))
        .await
        .unwrap();
    assert_eq!(
        chris.links().useruploadedfiles().ok(),
        Some(format!("{}/api/v1/userfiles/", server.uri()).as_str())
    );
}

#[tokio::test]
async fn incorrect_login_is_distinct() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth-token/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "non_field_errors": ["Unable to log in with provided credentials."]
        })))
        .mount(&server)
        .await;

    let connector = Connector::new(&ClientConfig::new()).unwrap();
    let err = ChrisClient::from_login_with(
        ClientBuilder::new(api_url(&server)).with_connector(connector.clone(), false),
        "chris",
        &SecretString::from("wrong"),
    )
    .await
    .unwrap_err();
    match err {
        Error::IncorrectLogin(message) => assert!(message.contains("Unable to log in")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(connector.open_sessions(), 0);
    assert!(!connector.is_closed());
}

#[tokio::test]
async fn rejected_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "detail": "Invalid token."
        })))
        .mount(&server)
        .await;

    let err = ChrisClient::from_token(api_url(&server), &SecretString::from("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(err.status().unwrap().message, Some(json!({"detail": "Invalid token."})));
}

#[tokio::test]
async fn username_is_requested_once() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/2/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("user.json", &server)))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(chris.username().await.unwrap(), "chris");
    assert_eq!(chris.clone().username().await.unwrap(), "chris");
}

#[tokio::test]
async fn upload_file_prefixes_user_uploads() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(&server, "/api/v1/users/2/", fixture("user.json", &server)).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/userfiles/"))
        .and(body_string_contains("chris/uploads/dir/hello.txt"))
        .and(body_string_contains("hello, world"))
        .respond_with(ResponseTemplate::new(201).set_body_json(fixture("file.json", &server)))
        .expect(2)
        .mount(&server)
        .await;

    let local = std::env::temp_dir().join(format!("chris-upload-{}.txt", std::process::id()));
    tokio::fs::write(&local, "hello, world").await.unwrap();

    let file = chris.upload_file(&local, "dir/hello.txt").await.unwrap();
    assert_eq!(file.fsize, 12);
    chris
        .upload_file(&local, "chris/uploads/dir/hello.txt")
        .await
        .unwrap();
    tokio::fs::remove_file(&local).await.unwrap();
}

#[tokio::test]
async fn upload_of_missing_file_is_io_error() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(&server, "/api/v1/users/2/", fixture("user.json", &server)).await;

    let err = chris
        .upload_file("/definitely/not/here.txt", "here.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[tokio::test]
async fn plugin_instance_follows_its_own_links() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(
        &server,
        "/api/v1/plugins/instances/search/",
        page(vec![fixture("plugin_instance.json", &server)]),
    )
    .await;
    mount_get(&server, "/api/v1/4/", fixture("feed.json", &server)).await;
    mount_get(&server, "/api/v1/note4/", fixture("feed_note.json", &server)).await;

    let instance = chris
        .plugin_instances(QueryParams::new().with("id", 7))
        .unwrap()
        .get_only()
        .await
        .unwrap();
    assert_eq!(instance.status, Status::Started);
    assert!(instance.previous.is_none());

    let feed = instance.get_feed().await.unwrap();
    assert_eq!(feed.id, instance.feed_id);
    let note = feed.get_note().await.unwrap();
    assert_eq!(note.feed, feed.url);
}

#[tokio::test]
async fn plugin_instance_methods_request_their_route_links() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    let instance_json = fixture("plugin_instance.json", &server);
    mount_get(
        &server,
        "/api/v1/plugins/instances/search/",
        page(vec![instance_json.clone()]),
    )
    .await;

    let routes: Vec<_> = PluginInstance::ROUTES
        .iter()
        .map(|route| (route.method, route.link))
        .collect();
    assert_eq!(
        routes,
        [
            ("get_feed", "feed"),
            ("get_parameters", "parameters"),
            ("get", "url"),
            ("set", "url"),
            ("delete", "url"),
        ]
    );

    Mock::given(method("GET"))
        .and(path("/api/v1/4/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixture("feed.json", &server)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/plugins/instances/7/parameters/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(vec![fixture(
            "plugin_instance_parameter.json",
            &server,
        )])))
        .expect(1)
        .mount(&server)
        .await;
    for verb in ["GET", "PUT"] {
        Mock::given(method(verb))
            .and(path("/api/v1/plugins/instances/7/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_json.clone()))
            .expect(1)
            .mount(&server)
            .await;
    }
    Mock::given(method("DELETE"))
        .and(path("/api/v1/plugins/instances/7/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let instance = chris
        .plugin_instances(QueryParams::new())
        .unwrap()
        .get_only()
        .await
        .unwrap();
    assert_eq!(instance.get_feed().await.unwrap().url, instance.feed);
    let parameter = instance.get_parameters().unwrap().first().await.unwrap().unwrap();
    assert_eq!(parameter.plugin_inst, instance.url);
    assert_eq!(instance.get().await.unwrap().url, instance.url);
    instance.set(Some("renamed"), None).await.unwrap();
    instance.delete().await.unwrap();
}

#[tokio::test]
async fn set_sends_only_given_fields() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(
        &server,
        "/api/v1/plugins/instances/search/",
        page(vec![fixture("plugin_instance.json", &server)]),
    )
    .await;
    let mut renamed = fixture("plugin_instance.json", &server);
    renamed["title"] = json!("renamed");
    Mock::given(method("PUT"))
        .and(path("/api/v1/plugins/instances/7/"))
        .and(body_json(json!({"title": "renamed"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(renamed))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/plugins/instances/7/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let instance = chris
        .plugin_instances(QueryParams::new())
        .unwrap()
        .get_only()
        .await
        .unwrap();
    let renamed = instance.set(Some("renamed"), None).await.unwrap();
    assert_eq!(renamed.title, "renamed");
    renamed.delete().await.unwrap();
}

#[tokio::test]
async fn create_instance_drops_null_parameters() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(
        &server,
        "/api/v1/plugins/search/",
        page(vec![fixture("plugin.json", &server)]),
    )
    .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/plugins/2/instances/"))
        .and(body_json(json!({"dir": "chris/uploads/hello", "cpu_limit": 2000})))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(fixture("plugin_instance.json", &server)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dircopy = chris
        .search_plugins(QueryParams::new().with("name_exact", "pl-dircopy"))
        .unwrap()
        .get_only()
        .await
        .unwrap();
    let instance = dircopy
        .create_instance(
            None,
            &json!({"dir": "chris/uploads/hello", "cpu_limit": 2000, "title": null}),
        )
        .await
        .unwrap();
    assert_eq!(instance.plugin_name, "pl-dircopy");
}

#[tokio::test]
async fn wait_polls_until_finished() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(
        &server,
        "/api/v1/plugins/instances/search/",
        page(vec![fixture("plugin_instance.json", &server)]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/plugins/instances/7/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixture("plugin_instance.json", &server)),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    let mut finished = fixture("plugin_instance.json", &server);
    finished["status"] = json!("finishedSuccessfully");
    Mock::given(method("GET"))
        .and(path("/api/v1/plugins/instances/7/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(finished))
        .mount(&server)
        .await;

    let instance = chris
        .plugin_instances(QueryParams::new())
        .unwrap()
        .get_only()
        .await
        .unwrap();
    let (elapsed, last) = instance
        .wait(
            &Status::FINISHED,
            Duration::from_secs(10),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    assert_eq!(last.status, Status::FinishedSuccessfully);
    assert!(elapsed >= Duration::from_millis(20));
}

#[tokio::test]
async fn wait_gives_up_after_timeout() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(
        &server,
        "/api/v1/plugins/instances/search/",
        page(vec![fixture("plugin_instance.json", &server)]),
    )
    .await;
    mount_get(
        &server,
        "/api/v1/plugins/instances/7/",
        fixture("plugin_instance.json", &server),
    )
    .await;

    let instance = chris
        .plugin_instances(QueryParams::new())
        .unwrap()
        .get_only()
        .await
        .unwrap();
    let (elapsed, last) = instance
        .wait(
            &Status::FINISHED,
            Duration::from_millis(30),
            Duration::from_millis(10),
        )
        .await
        .unwrap();
    assert_eq!(last.status, Status::Started);
    assert!(elapsed > Duration::from_millis(30));
}

#[tokio::test]
async fn search_feeds_uses_api_root() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(
        &server,
        "/api/v1/search/",
        page(vec![fixture("feed.json", &server)]),
    )
    .await;

    let feeds = chris
        .search_feeds(QueryParams::new().with("name", "copy"))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].finished_jobs, 0);
}

#[tokio::test]
async fn closed_client_objects_cannot_request() {
    let server = MockServer::start().await;
    let chris = client(&server).await;
    mount_get(
        &server,
        "/api/v1/plugins/instances/search/",
        page(vec![fixture("plugin_instance.json", &server)]),
    )
    .await;

    let instance = chris
        .plugin_instances(QueryParams::new())
        .unwrap()
        .get_only()
        .await
        .unwrap();
    assert!(chris.close());
    assert!(chris.is_closed());
    assert!(!chris.close());
    assert_eq!(instance.get().await.unwrap_err(), Error::SessionClosed);
}

#[tokio::test]
async fn create_user_posts_collection_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/"))
        .and(header("content-type", "application/vnd.collection+json"))
        .and(body_json(json!({
            "template": {
                "data": [
                    {"name": "email", "value": "dev@babymri.org"},
                    {"name": "username", "value": "chris"},
                    {"name": "password", "value": "chris1234"},
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(fixture("user.json", &server)))
        .expect(1)
        .mount(&server)
        .await;

    let user = ChrisClient::create_user(
        &api_url(&server),
        "chris",
        &SecretString::from("chris1234"),
        "dev@babymri.org",
    )
    .await
    .unwrap();
    assert_eq!(user.username, "chris");
}

#[tokio::test]
async fn create_user_error_hides_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/users/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "username": ["A user with that username already exists."]
        })))
        .mount(&server)
        .await;

    let err = ChrisClient::create_user(
        &api_url(&server),
        "chris",
        &SecretString::from("chris1234"),
        "dev@babymri.org",
    )
    .await
    .unwrap_err();
    let sent = err.status().unwrap().request_data.clone().unwrap();
    assert!(!sent.to_string().contains("chris1234"));
    assert!(matches!(err, Error::BadRequest(_)));
}
