use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use detectify_api_client::DetectifyClient;
use detectify_api_client::auth::{
    Clock, FixedClock, SigningContext, SigningMiddleware, StaticCredentials, calculate_signature,
};
use detectify_api_client::error::DetectifyError;
use reqwest::Body;
use time::OffsetDateTime;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const API_KEY: &str = "10840b0f938942feafb7186de74b9682";
const SECRET: &str = "0vyTnawJRFn0Q9tWLTM188Olizc72JczHSXoIlsPQIc=";

/// Hands out consecutive Unix timestamps, one per request attempt.
struct SequenceClock(AtomicI64);

impl Clock for SequenceClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(self.0.fetch_add(1, Ordering::SeqCst)).unwrap()
    }
}

fn header_str<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers.get(name).and_then(|v| v.to_str().ok())
}

/// Recompute the signature the way the server does and compare.
fn assert_validly_signed(request: &Request) {
    let timestamp: i64 = header_str(request, "X-Detectify-Timestamp")
        .expect("timestamp header")
        .parse()
        .expect("numeric timestamp");
    let signature = header_str(request, "X-Detectify-Signature").expect("signature header");

    let context = SigningContext {
        method: request.method.as_str(),
        path: request.url.path(),
        api_key: header_str(request, "X-Detectify-Key").expect("key header"),
        timestamp,
        body: &request.body,
    };
    assert_eq!(signature, calculate_signature(&context, SECRET).unwrap());
}

fn build_client(server: &MockServer, secret: Option<&str>, clock: Arc<dyn Clock>) -> DetectifyClient {
    let credentials = Arc::new(StaticCredentials::new(API_KEY, secret).unwrap());
    DetectifyClient::builder()
        .base_url(server.uri())
        .credentials(credentials)
        .clock(clock)
        .build()
        .unwrap()
}

fn reference_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::from_unix_timestamp(1519829567).unwrap())
}

#[tokio::test]
async fn test_signed_get_matches_reference_vector() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/domains/"))
        .and(header("X-Detectify-Key", API_KEY))
        .and(header("X-Detectify-Timestamp", "1519829567"))
        .and(header(
            "X-Detectify-Signature",
            "6jpu6S4cQwEY4uLk+xELSe1RhajVJP0QEDpGWZ5T+U0=",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server, Some(SECRET), reference_clock());
    let domains: Vec<serde_json::Value> = client.get("/v2/domains/").await.unwrap();
    assert!(domains.is_empty());
}

#[tokio::test]
async fn test_unsigned_mode_sends_only_key_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/domains/"))
        .and(header("X-Detectify-Key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = build_client(&server, None, reference_clock());
    let _: Vec<serde_json::Value> = client.get("/v2/domains/").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("X-Detectify-Timestamp").is_none());
    assert!(requests[0].headers.get("X-Detectify-Signature").is_none());
}

#[tokio::test]
async fn test_post_body_is_signed_and_sent_intact() {
    let server = MockServer::start().await;
    let payload = serde_json::json!({ "name": "example.com", "tags": ["prod"] });

    Mock::given(method("POST"))
        .and(path("/v2/assets/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "abc" })))
        .mount(&server)
        .await;

    let client = build_client(&server, Some(SECRET), reference_clock());
    let created: serde_json::Value = client.post("/v2/assets/", &payload).await.unwrap();
    assert_eq!(created["token"], "abc");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].body, serde_json::to_vec(&payload).unwrap());
    assert_validly_signed(&requests[0]);
}

#[tokio::test]
async fn test_caller_headers_are_overwritten() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/v2/assets/abc/"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let client = build_client(&server, Some(SECRET), reference_clock());
    let builder = client
        .request(reqwest::Method::DELETE, "/v2/assets/abc/")
        .header("X-Detectify-Timestamp", "0")
        .header("X-Detectify-Key", "stale");
    client.execute(builder).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let timestamps: Vec<_> = requests[0]
        .headers
        .get_all("X-Detectify-Timestamp")
        .iter()
        .collect();
    assert_eq!(timestamps, vec!["1519829567"]);
    assert_eq!(header_str(&requests[0], "X-Detectify-Key"), Some(API_KEY));
    assert_validly_signed(&requests[0]);
}

#[tokio::test]
async fn test_concurrent_requests_keep_their_own_signatures() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/assets/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .expect(32)
        .mount(&server)
        .await;

    let clock = Arc::new(SequenceClock(AtomicI64::new(1_700_000_000)));
    let client = build_client(&server, Some(SECRET), clock);

    let calls = (0..32).map(|i| {
        let client = client.clone();
        async move {
            let body = serde_json::json!({ "name": format!("host-{i}.example.com") });
            client.post::<serde_json::Value, _>("/v2/assets/", &body).await
        }
    });
    for result in futures_util::future::join_all(calls).await {
        result.unwrap();
    }

    let requests = server.received_requests().await.unwrap();
    let mut timestamps = HashSet::new();
    for request in &requests {
        assert_validly_signed(request);
        assert!(timestamps.insert(header_str(request, "X-Detectify-Timestamp").unwrap().to_string()));
    }
    assert_eq!(timestamps.len(), 32);
}

#[tokio::test]
async fn test_retry_is_signed_with_fresh_timestamp() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/domains/"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/domains/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let clock = Arc::new(SequenceClock(AtomicI64::new(1_700_000_000)));
    let client = build_client(&server, Some(SECRET), clock);
    let _: Vec<serde_json::Value> = client.get("/v2/domains/").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(header_str(&requests[0], "X-Detectify-Timestamp"), Some("1700000000"));
    assert_eq!(header_str(&requests[1], "X-Detectify-Timestamp"), Some("1700000001"));
    for request in &requests {
        assert_validly_signed(request);
    }
}

#[tokio::test]
async fn test_rejected_credentials_surface_as_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/domains/"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid signature"}"#))
        .mount(&server)
        .await;

    let client = build_client(&server, Some(SECRET), reference_clock());
    let err = client.get::<serde_json::Value>("/v2/domains/").await.unwrap_err();

    match &err {
        DetectifyError::Api(api) => {
            assert!(api.is_unauthorized());
            assert!(api.message.contains("invalid signature"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_streaming_body_is_buffered_before_sending() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v2/assets/abc/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // No retry layer: streaming bodies cannot be cloned for retries.
    let credentials = Arc::new(StaticCredentials::new(API_KEY, Some(SECRET)).unwrap());
    let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
        .with(SigningMiddleware::with_clock(credentials, reference_clock()))
        .build();

    let chunks: Vec<Result<&'static str, std::io::Error>> =
        vec![Ok("{\"name\":"), Ok("\"streamed.example.com\"}")];
    client
        .put(format!("{}/v2/assets/abc/", server.uri()))
        .body(Body::wrap_stream(futures_util::stream::iter(chunks)))
        .send()
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].body, b"{\"name\":\"streamed.example.com\"}");
    assert_validly_signed(&requests[0]);
}

#[tokio::test]
async fn test_unreadable_body_is_never_sent() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let credentials = Arc::new(StaticCredentials::new(API_KEY, Some(SECRET)).unwrap());
    let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new())
        .with(SigningMiddleware::with_clock(credentials, reference_clock()))
        .build();

    let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
        Ok("{\"name\":"),
        Err(std::io::Error::other("disk gone")),
    ];
    let err = client
        .put(format!("{}/v2/assets/abc/", server.uri()))
        .body(Body::wrap_stream(futures_util::stream::iter(chunks)))
        .send()
        .await
        .unwrap_err();

    let err = DetectifyError::from(err);
    assert!(matches!(err, DetectifyError::Auth(_)));
    assert!(err.is_auth());
}
