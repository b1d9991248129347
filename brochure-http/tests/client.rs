use brochure_http::{Auth, HttpClient, HttpError, RequestOpts};
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::{Value, json};
use std::borrow::Cow;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn get_text_sends_headers_and_returns_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .and(header("user-agent", "brochure-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>hi</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static("brochure-test/1.0"));
    let client = HttpClient::detached().unwrap();
    let body = client
        .get_text(
            &format!("{}/landing", server.uri()),
            RequestOpts {
                headers: Some(headers),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(body, "<html>hi</html>");
}

#[tokio::test]
async fn non_success_without_retries_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(0);
    let err = client
        .get_text("missing", RequestOpts::default())
        .await
        .unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(404));
}

#[tokio::test]
async fn server_errors_are_retried_until_budget_is_spent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/echo"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"error": {"message": "overloaded"}})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/v1", server.uri()))
        .unwrap()
        .with_retries(1);
    let err = client
        .post_json::<_, Value>("echo", Some("sk-test"), &json!({"ping": true}))
        .await
        .unwrap_err();

    match err {
        HttpError::Api {
            status, message, ..
        } => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn query_auth_and_bearer_are_applied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/x:generate"))
        .and(query_param("key", "g-key"))
        .and(body_json(json!({"prompt": "hello"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("authorization", "Bearer sk-live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let got: Value = client
        .post_json_opts(
            "models/x:generate",
            &json!({"prompt": "hello"}),
            RequestOpts {
                auth: Some(Auth::Query {
                    name: "key",
                    value: Cow::Borrowed("g-key"),
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(got["ok"], true);

    let got: Value = client
        .post_json("chat", Some(" sk-live\n"), &json!({}))
        .await
        .unwrap();
    assert_eq!(got["ok"], true);
}

#[tokio::test]
async fn decode_errors_carry_a_body_snippet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/weird"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_json::<Value>("weird", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, ref snippet) if snippet == "not json"));
}

#[tokio::test]
async fn stream_yields_the_whole_body() {
    let server = MockServer::start().await;
    let body = "data: one\n\ndata: two\n\n";
    Mock::given(method("POST"))
        .and(path("/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let mut stream = client
        .post_json_stream("stream", &json!({"stream": true}), RequestOpts::default())
        .await
        .unwrap();

    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(String::from_utf8(collected).unwrap(), body);
}
