use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use httpmock::{Method::GET, MockServer};
use mmr_summarizer::{
    api::create_router,
    embedding::HashingClient,
    ingest::HttpFetcher,
    processing::{SummarizeService, chunking::ChunkerSettings, selection::DEFAULT_LAMBDA},
    summarization::ExtractiveSummarizer,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const TOPICS: [&str; 10] = [
    "glaciers",
    "compilers",
    "orchards",
    "satellites",
    "violins",
    "volcanoes",
    "databases",
    "sailboats",
    "beekeeping",
    "telescopes",
];

fn offline_service() -> Arc<SummarizeService> {
    Arc::new(SummarizeService::new(
        Arc::new(HashingClient::new(256)),
        Arc::new(ExtractiveSummarizer::new()),
        Arc::new(HttpFetcher::new(Duration::from_secs(5)).expect("fetcher")),
        ChunkerSettings::default(),
        DEFAULT_LAMBDA,
    ))
}

fn long_document() -> String {
    TOPICS
        .iter()
        .cycle()
        .take(40)
        .enumerate()
        .map(|(index, topic)| {
            format!(
                "Section {index} is about {topic}. Observers of {topic} report that {topic} \
                 change slowly over many seasons and reward patient study."
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    (status, serde_json::from_slice(&body).expect("json body"))
}

fn summarize_request(payload: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/summarize")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

#[tokio::test]
async fn long_text_is_summarized_from_distinct_chunks() {
    let service = offline_service();
    let app = create_router(service.clone());

    let (status, json) = call(
        app,
        summarize_request(json!({ "text": long_document(), "detail": 40 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["title"], "Uploaded Text");

    let total = json["stats"]["chunks_total"].as_u64().expect("total") as usize;
    let used: Vec<usize> = json["chunks_used"]
        .as_array()
        .expect("chunks_used")
        .iter()
        .map(|value| value.as_u64().expect("index") as usize)
        .collect();
    assert!(total > 1);
    assert_eq!(used.len(), total.min(5));
    assert_eq!(json["stats"]["chunks_used"], used.len());
    assert_eq!(used.iter().collect::<BTreeSet<_>>().len(), used.len());
    assert!(used.iter().all(|&index| index < total));

    let summary = json["summary"].as_str().expect("summary");
    assert!(summary.starts_with("- "), "{summary}");
    assert!(summary.lines().count() <= used.len());

    let snapshot = service.metrics_snapshot();
    assert_eq!(snapshot.documents_summarized, 1);
    assert_eq!(snapshot.chunks_total, total as u64);
}

#[tokio::test]
async fn whitespace_text_reports_no_content() {
    let app = create_router(offline_service());

    let (status, json) = call(app, summarize_request(json!({ "text": "   \n  " }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "title": "Uploaded Text",
            "summary": "No content extracted.",
            "chunks_used": [],
            "stats": { "chunks_total": 0, "chunks_used": 0 }
        })
    );
}

#[tokio::test]
async fn url_submission_uses_page_title() {
    let server = MockServer::start_async().await;
    let page = server
        .mock_async(|when, then| {
            when.method(GET).path("/article");
            then.status(200)
                .header("content-type", "text/html")
                .body(
                    "<html><head><title>Field Notes</title></head><body>\
                     <nav>Menu</nav><article><p>Glaciers carve valleys. Ice moves slowly.</p>\
                     <p>Orchards need pruning in winter.</p></article></body></html>",
                );
        })
        .await;
    let app = create_router(offline_service());

    let (status, json) = call(
        app,
        summarize_request(json!({ "url": server.url("/article"), "text": "ignored" })),
    )
    .await;

    page.assert();
    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["title"], "Field Notes");
    assert_eq!(json["stats"], json!({ "chunks_total": 1, "chunks_used": 1 }));
    assert_eq!(json["summary"], "- Glaciers carve valleys.");
}

#[tokio::test]
async fn unreachable_url_is_bad_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/gone");
            then.status(503);
        })
        .await;
    let app = create_router(offline_service());

    let (status, json) = call(app, summarize_request(json!({ "url": server.url("/gone") }))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().is_some_and(|error| error.contains("503")));
}

#[tokio::test]
async fn text_upload_is_summarized_under_its_filename() {
    let app = create_router(offline_service());
    let boundary = "mmr-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nBeekeeping starts in spring. Hives need space.\r\n\
         --{boundary}\r\nContent-Disposition: form-data; name=\"detail\"\r\n\r\n10\r\n\
         --{boundary}--\r\n"
    );

    let (status, json) = call(
        app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request"),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["title"], "notes.txt");
    assert_eq!(json["chunks_used"], json!([0]));
    assert_eq!(json["summary"], "- Beekeeping starts in spring.");
}

#[tokio::test]
async fn binary_upload_is_rejected() {
    let app = create_router(offline_service());
    let boundary = "mmr-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"photo.png\"\r\n\
         Content-Type: image/png\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR");
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let (status, json) = call(
        app,
        Request::builder()
            .method(Method::POST)
            .uri("/api/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]
            .as_str()
            .is_some_and(|error| error.contains("photo.png"))
    );
}
