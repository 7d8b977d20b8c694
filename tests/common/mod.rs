// tests/common/mod.rs
//
// Shared builders for the HTTP integration tests: a router over a temp dir,
// a model trained on the fixture CSVs and a scraper serving fixture pages.
#![allow(dead_code)]

use axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt as _;

use trust_verify::classifier::{Model, ModelHandle, ModelOrigin, TrainParams};
use trust_verify::mlops::{dataset, Mlops, MlopsConfig};
use trust_verify::scraper::{ArticleCache, HotCredibility, Scraper, StaticFetcher};
use trust_verify::{router, AppConfig, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

pub const ARTICLE_URL: &str = "https://www.reuters.com/world/water-budget";
pub const FAKE_SITE_URL: &str = "https://infowars.com/story";

pub fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures().join(name)).expect("read fixture")
}

pub fn trained_model() -> Model {
    let samples = dataset::load_raw(&fixtures()).expect("fixture csvs");
    let texts: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
    let labels: Vec<u8> = samples.iter().map(|s| s.label).collect();
    Model::fit(&texts, &labels, &TrainParams::default()).expect("fit fixture model")
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub dir: TempDir,
}

pub struct Opts {
    pub with_model: bool,
    pub mlops_enabled: bool,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            with_model: true,
            mlops_enabled: true,
        }
    }
}

pub fn test_app() -> TestApp {
    test_app_with(Opts::default())
}

pub fn test_app_with(opts: Opts) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig::rooted(dir.path());

    let page = fixture("article.html");
    let fetcher = StaticFetcher::new()
        .with_page(ARTICLE_URL, page.clone())
        .with_page(FAKE_SITE_URL, page);
    let scraper = Scraper::new(
        Arc::new(fetcher),
        Some(ArticleCache::new(&config.cache_dir)),
        HotCredibility::new(&config.credibility_path),
    );

    let mut mcfg = MlopsConfig::rooted(dir.path());
    mcfg.enabled = opts.mlops_enabled;
    let mlops = Mlops::new(mcfg);

    let model = if opts.with_model {
        ModelHandle::with_model(trained_model(), ModelOrigin::Local)
    } else {
        ModelHandle::new()
    };

    let state = AppState::new(config, model, scraper, mlops, None);
    TestApp {
        app: router(state.clone()),
        state,
        dir,
    }
}

pub fn json_request(method: &str, uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    b.body(Body::from(body.to_string())).expect("build request")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut b = Request::builder().method("GET").uri(uri);
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    b.body(Body::empty()).expect("build request")
}

pub fn form_request(uri: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .expect("build request")
}

/// Status and JSON body (Null for non-JSON bodies).
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    let v = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, v)
}

pub async fn send_text(app: &Router, req: Request<Body>) -> (StatusCode, String) {
    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

/// Register `email` with password `secret-pw` and return a bearer token.
pub async fn register_and_login(app: &Router, email: &str, username: &str) -> String {
    let (status, _) = send(
        app,
        json_request(
            "POST",
            "/register",
            &serde_json::json!({ "email": email, "username": username, "password": "secret-pw" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register {email}");

    let (status, v) = send(
        app,
        json_request(
            "POST",
            "/login",
            &serde_json::json!({ "email": email, "password": "secret-pw" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login {email}");
    v["access_token"].as_str().expect("access_token").to_string()
}
