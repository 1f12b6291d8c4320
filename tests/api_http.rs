// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// The coordinator reads from an in-memory RSS fixture and an in-memory
// lexicon, so nothing touches the network or the repository.

use std::sync::{Arc, Mutex};

use serde_json::json;
use serde_json::Value as Json;
use http::{header, Request, StatusCode};
use shuttle_axum::axum::{
    body::{self, Body},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use theme_sentiment_analyzer::analyze::SentimentEngine;
use theme_sentiment_analyzer::history::History;
use theme_sentiment_analyzer::ingest::{rss::RssSource, types::ArticleSource};
use theme_sentiment_analyzer::refresh::RefreshCoordinator;
use theme_sentiment_analyzer::themes::Theme;
use theme_sentiment_analyzer::{create_router, AppState};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests
const FEED_XML: &str = include_str!("fixtures/feed_rss.xml");

/// Build the same Router the binary uses, over fixture data.
fn test_router() -> Router {
    let sources: Vec<Box<dyn ArticleSource>> =
        vec![Box::new(RssSource::from_fixture_str("fixture", FEED_XML))];
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::new(Mutex::new(SentimentEngine::in_memory())),
        sources,
        vec![
            Theme::new("Economie", &["croissance"]),
            Theme::new("Diplomatie", &["accord"]),
            Theme::new("Conflits", &["crise", "tensions"]),
        ],
        History::default(),
        500,
    ));
    create_router(AppState::new(coordinator, vec!["fixture".to_string()]))
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, headers, bytes)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let (status, _, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).expect("parse json"))
}

async fn post_json(app: &Router, uri: &str, payload: Json) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST");
    let (status, _, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).expect("parse json"))
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router();
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("build GET /health");
    let (status, _, bytes) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).expect("utf8").trim(), "ok");
}

#[tokio::test]
async fn api_analyze_returns_result_fields() {
    let app = test_router();
    let (status, v) = post_json(&app, "/api/analyze", json!({ "text": "Ce n'est pas bon" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["sentiment"], "negative");
    assert!(v["score"].as_f64().expect("score") < 0.0);
    for key in ["confidence", "emotionalIntensity", "ironyDetected", "words"] {
        assert!(v.get(key).is_some(), "missing '{key}'");
    }
}

#[tokio::test]
async fn api_analyze_without_text_is_400() {
    let app = test_router();
    let (status, v) = post_json(&app, "/api/analyze", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["success"], false);
    assert!(v["error"].is_string());
}

#[tokio::test]
async fn api_articles_refreshes_on_first_read() {
    let app = test_router();
    let (status, v) = get_json(&app, "/api/articles").await;
    assert_eq!(status, StatusCode::OK);

    let articles = v["articles"].as_array().expect("articles array");
    assert_eq!(articles.len(), 3, "duplicate link dropped");
    assert!(articles.iter().any(|a| a["title"] == "Untitled"));
    assert!(v["lastUpdate"].is_string());
    assert_eq!(v["isUpdating"], false);
    assert_eq!(v["analysis"]["totalArticles"], 3);
    assert_eq!(v["analysis"]["themes"]["Economie"]["count"], 1);
    assert_eq!(v["analysis"]["themes"]["Diplomatie"]["count"], 1);
    assert_eq!(v["analysis"]["themes"]["Conflits"]["count"], 1);
}

#[tokio::test]
async fn api_refresh_reports_not_skipped() {
    let app = test_router();
    let (status, v) = post_json(&app, "/api/refresh", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["skipped"], false);
    assert!(v["lastUpdate"].is_string());
}

#[tokio::test]
async fn api_corrections_flag_articles() {
    let app = test_router();
    post_json(&app, "/api/refresh", json!({})).await;

    let link = "https://news.example.org/monde/accord-paix";
    let payload = json!([
        { "articleId": link, "correctedScore": -0.8, "confidence": 0.9 },
        { "articleId": "https://unknown", "correctedScore": 0.5, "confidence": 0.9 }
    ]);
    let (status, v) = post_json(&app, "/api/corrections", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["received"], 2);
    assert_eq!(v["applied"], 1);

    let (_, v) = get_json(&app, "/api/articles").await;
    let art = v["articles"]
        .as_array()
        .expect("articles")
        .iter()
        .find(|a| a["link"] == link)
        .expect("corrected article present");
    assert_eq!(art["sentiment"]["iaCorrected"], true);
    assert_eq!(art["sentiment"]["score"], -0.8);
    assert_eq!(art["sentiment"]["sentiment"], "negative");
    assert_eq!(v["iaCorrections"]["stats"]["totalCorrections"], 2);

    let theme_article = &v["analysis"]["themes"]["Diplomatie"]["articles"][0];
    assert_eq!(theme_article["iaCorrected"], true);
}

#[tokio::test]
async fn api_corrections_with_bad_body_is_400() {
    let app = test_router();
    let (status, v) = post_json(&app, "/api/corrections", json!({ "articleId": 3 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["success"], false);
}

#[tokio::test]
async fn api_learn_requires_text_and_expected_score() {
    let app = test_router();
    let (status, _) = post_json(&app, "/api/sentiment/learn", json!({ "text": "une crise" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, v) = post_json(
        &app,
        "/api/sentiment/learn",
        json!({ "text": "une crise majeure", "expectedScore": 1.0 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    assert_eq!(v["correction"]["applied"], true);
    assert!(v["learningStats"]["totalWords"].as_u64().expect("totalWords") > 0);
}

#[tokio::test]
async fn api_stats_and_reset() {
    let app = test_router();
    let (status, v) = get_json(&app, "/api/sentiment/stats").await;
    assert_eq!(status, StatusCode::OK);
    let words = v["lexiconInfo"]["totalWords"].as_u64().expect("totalWords");
    assert!(words > 0);

    let (status, v) = post_json(&app, "/api/sentiment/reset", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["learningStats"]["totalUsage"], 0);
}

#[tokio::test]
async fn api_themes_lists_configured_themes() {
    let app = test_router();
    let (status, v) = get_json(&app, "/api/themes").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["themes"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn api_theme_add_and_delete_refresh_the_analysis() {
    let app = test_router();
    let (status, v) = post_json(
        &app,
        "/api/themes",
        json!({ "name": "Paix", "keywords": "paix , accord" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["success"], true);
    let theme = &v["theme"];
    assert_eq!(theme["keywords"], json!(["paix", "accord"]));
    // fourth theme takes the fourth palette colour
    assert_eq!(theme["color"], "#ef4444");
    let id = theme["id"].as_str().expect("id").to_string();

    let (_, v) = get_json(&app, "/api/themes").await;
    assert_eq!(v["themes"].as_array().map(Vec::len), Some(4));
    let (_, v) = get_json(&app, "/api/articles").await;
    assert_eq!(v["analysis"]["themes"]["Paix"]["count"], 1);

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/themes/{id}"))
        .body(Body::empty())
        .expect("build DELETE");
    let (status, _, bytes) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(v["removed"], true);

    let (_, v) = get_json(&app, "/api/articles").await;
    assert!(v["analysis"]["themes"].get("Paix").is_none());
    let (_, v) = get_json(&app, "/api/themes").await;
    assert_eq!(v["themes"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn api_theme_add_rejects_missing_keywords_and_duplicates() {
    let app = test_router();
    let (status, v) = post_json(&app, "/api/themes", json!({ "name": "Paix" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["success"], false);

    let (status, _) = post_json(
        &app,
        "/api/themes",
        json!({ "name": "Economie", "keywords": ["pib"] }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn api_aggregate_scores_an_ad_hoc_batch() {
    let app = test_router();
    let payload = json!({
        "articles": [
            { "title": "Sommet sur le climat", "content": "Un accord est trouvé.", "link": "a" },
            { "title": "Rien", "content": "", "link": "" }
        ],
        "themes": [ { "name": "Climat", "keywords": ["climat"] } ]
    });
    let (status, v) = post_json(&app, "/api/aggregate", payload).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["totalArticles"], 2);
    assert_eq!(v["themes"]["Climat"]["count"], 1);
    assert_eq!(v["themes"]["Climat"]["keywordMatches"]["climat"], 1);
}

#[tokio::test]
async fn api_aggregate_rejects_theme_without_keywords() {
    let app = test_router();
    let payload = json!({ "articles": [], "themes": [ { "name": "Climat" } ] });
    let (status, v) = post_json(&app, "/api/aggregate", payload).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["success"], false);
}

#[tokio::test]
async fn api_export_csv_has_bom_and_rows() {
    let app = test_router();
    let req = Request::builder()
        .uri("/api/export/csv")
        .body(Body::empty())
        .expect("build GET /api/export/csv");
    let (status, headers, bytes) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let ct = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(ct.starts_with("text/csv"));

    let text = String::from_utf8(bytes).expect("utf8");
    assert!(text.starts_with('\u{FEFF}'));
    // header + 3 articles
    assert_eq!(text.lines().count(), 4);
}

#[tokio::test]
async fn api_export_json_has_sections() {
    let app = test_router();
    let (status, v) = get_json(&app, "/api/export/json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["metadata"]["totalArticles"], 3);
    assert_eq!(v["configuration"]["feeds"][0], "fixture");
    assert!(v["data"]["analysis"]["themes"].is_object());
    assert!(v["sentimentLexicon"]["words"].is_object());
}
