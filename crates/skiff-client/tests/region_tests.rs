//! Region resolution behavior against a mock endpoint.

use skiff_client::{Config, Credentials, Error, SkiffClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> SkiffClient {
    let config = Config::new(&server.uri()).unwrap();
    SkiffClient::with_credentials(config, Credentials::new("AKIDEXAMPLE", "secret")).unwrap()
}

fn location_xml(region: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/">{region}</LocationConstraint>"#
    )
}

fn malformed_auth_xml(region: Option<&str>) -> String {
    let region_element = region
        .map(|r| format!("<Region>{r}</Region>"))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>AuthorizationHeaderMalformed</Code>
  <Message>The authorization header is malformed</Message>
  {region_element}
</Error>"#
    )
}

#[tokio::test]
async fn second_resolution_hits_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("location", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(location_xml("eu-central-1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.get_bucket_region("bucket").await.unwrap(), "eu-central-1");
    // Served from the cache; the expect(1) above verifies no second call.
    assert_eq!(client.get_bucket_region("bucket").await.unwrap(), "eu-central-1");
}

#[tokio::test]
async fn empty_constraint_maps_to_default_region() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("location", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/"/>"#,
        ))
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.get_bucket_region("bucket").await.unwrap(), "us-east-1");
}

#[tokio::test]
async fn explicit_region_skips_cache_and_network() {
    let server = MockServer::start().await;
    let config = Config::new(&server.uri()).unwrap().with_region("ap-south-1");
    let client =
        SkiffClient::with_credentials(config, Credentials::new("AKIDEXAMPLE", "secret")).unwrap();

    assert_eq!(client.get_bucket_region("bucket").await.unwrap(), "ap-south-1");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn corrective_region_hint_triggers_exactly_one_retry() {
    let server = MockServer::start().await;

    // First attempt, signed with the placeholder region, is rejected with a
    // hint; the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("location", ""))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(malformed_auth_xml(Some("eu-west-1"))),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("location", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(location_xml("eu-west-1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    assert_eq!(client.get_bucket_region("bucket").await.unwrap(), "eu-west-1");
    // The corrected region was cached.
    assert_eq!(client.get_bucket_region("bucket").await.unwrap(), "eu-west-1");
}

#[tokio::test]
async fn malformed_auth_without_hint_propagates_unretried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("location", ""))
        .respond_with(ResponseTemplate::new(400).set_body_string(malformed_auth_xml(None)))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    match client.get_bucket_region("bucket").await {
        Err(Error::Server { code, region, .. }) => {
            assert_eq!(code, "AuthorizationHeaderMalformed");
            assert!(region.is_none());
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_request_invalidates_cached_region() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bucket"))
        .and(query_param("location", ""))
        .respond_with(ResponseTemplate::new(200).set_body_string(location_xml("eu-central-1")))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/bucket/obj"))
        .respond_with(ResponseTemplate::new(500).set_body_string(
            r#"<Error><Code>InternalError</Code><Message>try again</Message></Error>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.get_bucket_region("bucket").await.unwrap();

    let err = client.remove_object("bucket", "obj").await.unwrap_err();
    assert!(matches!(err, Error::Server { ref code, .. } if code == "InternalError"));

    // Cache entry was evicted; this resolves over the network again.
    assert_eq!(client.get_bucket_region("bucket").await.unwrap(), "eu-central-1");
}
