use clashroyale::{blocking, Clan, Error, MemoryCache, Params};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// The mock server lives on its own runtime so the blocking client can be
/// used from the test thread.
fn server() -> (Runtime, MockServer) {
    let rt = Runtime::new().unwrap();
    let server = rt.block_on(MockServer::start());
    (rt, server)
}

fn mount(rt: &Runtime, server: &MockServer, mock: Mock) {
    rt.block_on(mock.mount(server));
}

fn client(server: &MockServer) -> blocking::Client {
    blocking::Client::builder("test-token")
        .base_url(server.uri())
        .timeout(Duration::from_millis(500))
        .cache(Arc::new(MemoryCache::default()))
        .build_blocking()
        .unwrap()
}

#[test]
fn blocking_lookup_uses_cache() {
    let (rt, server) = server();
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/clan/2PP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tag": "#ABC", "name": "X"})))
            .expect(2),
    );

    let client = client(&server);

    let first = client.get_clan(&["#2PP"], Params::new()).unwrap().into_one().unwrap();
    assert_eq!(first.name(), Some("X"));
    assert!(!first.is_cached());

    let second = client.get_clans(&["#2PP"], Params::new()).unwrap().into_one().unwrap();
    assert!(second.is_cached());
    assert_eq!(second.raw(), first.raw());

    let refreshed = client.refresh::<Clan>(&second).unwrap();
    assert!(matches!(refreshed, clashroyale::Fetched::One(ref c) if !c.is_cached()));

    drop(client);
    rt.block_on(server.verify());
}

#[test]
fn blocking_errors_match_async_errors() {
    let (rt, server) = server();
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/player/2PP"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"}))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/constants"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(2)),
            ),
    );

    let client = client(&server);

    let err = client.get_player(&["2PP"], Params::new()).unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(err.body(), Some(&json!({"error": "not found"})));

    assert!(matches!(
        client.get_constants(Params::new()),
        Err(Error::NotResponding)
    ));
}

#[test]
fn blocking_endpoints_and_follow_ups() {
    let (rt, server) = server();
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/endpoints"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["/version"]))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/player/2PP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"clan": {"tag": "#9YJ"}}))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/clan/9YJ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tag": "#9YJ"}))),
    );

    let client = client(&server);

    let endpoints = client.get_endpoints().unwrap();
    assert_eq!(endpoints.to_vec(), vec!["/version".to_string()]);
    assert!(!endpoints.is_cached());

    let player = client.get_player(&["2PP"], Params::new()).unwrap().into_one().unwrap();
    let clan = client.block_on(player.get_clan()).unwrap().unwrap();
    assert_eq!(clan.tag(), Some("#9YJ"));
}

#[test]
fn blocking_close() {
    let (_rt, server) = server();
    let client = client(&server);

    client.close();
    client.close();
    assert!(client.is_closed());
    assert!(client.as_async().is_closed());
    assert!(matches!(client.get_version(), Err(Error::Closed)));
}

#[test]
fn blocking_server_error_falls_back_to_cache() {
    let (rt, server) = server();
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/clan/2PP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tag": "#2PP", "name": "Old"})))
            .up_to_n_times(1),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/clan/2PP"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"}))),
    );

    let client = client(&server);
    let first = client.get_clan(&["2PP"], Params::new()).unwrap().into_one().unwrap();
    assert!(!first.is_cached());

    let clan = client
        .get_clan(&["2PP"], Params::new().refresh(true))
        .unwrap()
        .into_one()
        .unwrap();
    assert!(clan.is_cached());
    assert_eq!(clan.name(), Some("Old"));
    assert_eq!(rt.block_on(server.received_requests()).unwrap().len(), 2);
}
