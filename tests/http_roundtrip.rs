//! End-to-end exchanges against a local axum server.
//!
//! The server runs on a random port in its own thread and runtime; every test
//! drives the real reqwest transports through `Ajax::ajax`.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use ajaxify_rs::{
    Ajax, FormData, LegacyTransport, RequestSettings, ResponseBody, ResponseType, TransportMode,
};
use axum::extract::RawQuery;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use url::Url;

fn app() -> Router {
    Router::new()
        .route("/search", get(search))
        .route("/echo", post(echo))
        .route("/feed.xml", get(feed))
        .route("/secure", get(secure))
        .route("/login", get(login))
        .route("/whoami", get(whoami))
        .route("/slow", get(slow))
}

async fn search(RawQuery(query): RawQuery) -> Json<Value> {
    Json(json!({ "query": query }))
}

fn header_text(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn echo(headers: HeaderMap, body: String) -> Json<Value> {
    Json(json!({
        "contentType": header_text(&headers, header::CONTENT_TYPE),
        "accept": header_text(&headers, header::ACCEPT),
        "requestedWith": header_text(&headers, header::HeaderName::from_static("x-requested-with")),
        "body": body,
    }))
}

async fn feed() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/xml; charset=utf-8")],
        r#"<feed><item id="1">first</item><item id="2">second</item></feed>"#,
    )
}

async fn secure(headers: HeaderMap) -> (StatusCode, String) {
    match headers.get(header::AUTHORIZATION) {
        Some(value) => (StatusCode::OK, value.to_str().unwrap_or_default().to_string()),
        None => (StatusCode::UNAUTHORIZED, String::new()),
    }
}

async fn login() -> impl IntoResponse {
    ([(header::SET_COOKIE, "session=abc123; Path=/")], "ok")
}

async fn whoami(headers: HeaderMap) -> String {
    header_text(&headers, header::COOKIE)
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_millis(300)).await;
    "late"
}

fn server() -> SocketAddr {
    static ADDR: OnceLock<SocketAddr> = OnceLock::new();
    *ADDR.get_or_init(|| {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                axum::serve(listener, app()).await
            })
            .unwrap();
        });

        addr
    })
}

fn location() -> Url {
    Url::parse(&format!("http://{}/", server())).unwrap()
}

fn client() -> Ajax {
    Ajax::builder().with_location(location()).build().unwrap()
}

#[tokio::test]
async fn get_folds_form_into_query() {
    let settings =
        RequestSettings::get("/search").data(FormData::map([("q", "a b"), ("page", "2")]));
    let outcome = client().ajax(&settings).await;

    assert!(outcome.is_success());
    assert_eq!(
        outcome.body().and_then(ResponseBody::as_json),
        Some(&json!({ "query": "q=a+b&page=2" }))
    );
}

#[tokio::test]
async fn post_sends_encoded_body_and_fixed_headers() {
    let echoed = Arc::new(Mutex::new(None));
    let slot = echoed.clone();

    client()
        .ajax(&RequestSettings::post("/echo").data(FormData::seq(["x", "y z"])))
        .done(move |body, _, _| *slot.lock().unwrap() = body.as_json().cloned())
        .await;

    let echoed = echoed.lock().unwrap().take().unwrap();
    assert_eq!(echoed["body"], "0=x&1=y+z");
    assert_eq!(
        echoed["contentType"],
        "application/x-www-form-urlencoded; charset=UTF-8"
    );
    assert_eq!(echoed["accept"], "application/json, text/javascript");
    assert_eq!(echoed["requestedWith"], "XMLHttpRequest");
}

#[tokio::test]
async fn missing_route_fires_error_then_always() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let (error, always) = (calls.clone(), calls.clone());

    client()
        .get("/missing")
        .done(|_, _, _| panic!("404 must not reach done"))
        .error(move |exchange| error.lock().unwrap().push(format!("error {}", exchange.status)))
        .always(move |_| always.lock().unwrap().push("always".to_string()))
        .await;

    assert_eq!(*calls.lock().unwrap(), vec!["error 404", "always"]);
}

#[tokio::test]
async fn xml_content_type_yields_document() {
    let outcome = client().get("/feed.xml").await;

    let document = outcome
        .body()
        .and_then(ResponseBody::as_document)
        .expect("xml document");
    assert_eq!(document.mime, "text/xml");
    let ids: Vec<_> = document
        .root
        .elements()
        .filter_map(|item| item.attribute("id"))
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert_eq!(document.root.text(), "firstsecond");
}

#[tokio::test]
async fn response_headers_reach_done_as_block() {
    let block = Arc::new(Mutex::new(String::new()));
    let slot = block.clone();

    client()
        .get("/feed.xml")
        .done(move |_, headers, exchange| {
            assert_eq!(exchange.response_header("content-type"), Some("text/xml; charset=utf-8"));
            *slot.lock().unwrap() = headers.to_string();
        })
        .await;

    assert!(block
        .lock()
        .unwrap()
        .contains("content-type: text/xml; charset=utf-8\r\n"));
}

#[tokio::test]
async fn basic_auth_credentials_are_sent() {
    let outcome = client()
        .ajax(&RequestSettings::get("/secure").credentials("user", "secret"))
        .await;

    assert_eq!(
        outcome.body(),
        Some(&ResponseBody::Text("Basic dXNlcjpzZWNyZXQ=".into()))
    );
}

#[tokio::test]
async fn with_credentials_keeps_cookies() {
    let ajax = client();

    ajax.ajax(&RequestSettings::get("/login").with_credentials(true))
        .await;

    let with_cookies = ajax
        .ajax(&RequestSettings::get("/whoami").with_credentials(true).data_type("text"))
        .await;
    assert_eq!(
        with_cookies.body(),
        Some(&ResponseBody::Text("session=abc123".into()))
    );

    let anonymous = ajax
        .ajax(&RequestSettings::get("/whoami").data_type("text"))
        .await;
    assert_eq!(anonymous.body(), Some(&ResponseBody::Empty));
}

#[tokio::test]
async fn timed_out_request_is_resent_once() {
    let outcome = client()
        .ajax(&RequestSettings::get("/slow").timeout_ms(50).data_type("text"))
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.exchange().attempts, 2);
    assert_eq!(outcome.body(), Some(&ResponseBody::Text("late".into())));
}

#[tokio::test]
async fn explicit_response_type_returns_raw_bytes() {
    let outcome = client()
        .ajax(&RequestSettings::get("/feed.xml").response_type(ResponseType::ArrayBuffer))
        .await;

    let bytes = outcome.body().and_then(ResponseBody::as_bytes).expect("raw bytes");
    assert!(bytes.starts_with(b"<feed>"));
}

#[tokio::test]
async fn cross_origin_legacy_transport_drops_credentials() {
    let ajax = Ajax::builder()
        .with_location(location())
        .with_transport(Arc::new(LegacyTransport::new().unwrap()))
        .with_legacy_transport(Arc::new(LegacyTransport::new().unwrap()))
        .build()
        .unwrap();

    let outcome = ajax
        .ajax(
            &RequestSettings::get("/secure")
                .cross_origin(true)
                .credentials("user", "secret"),
        )
        .await;

    assert_eq!(outcome.exchange().mode, TransportMode::Legacy);
    assert_eq!(outcome.exchange().status, 401);
    assert!(!outcome.is_success());
}
