//! Local chart dashboard.
//!
//! Routes:
//!   GET  /                               page
//!   GET  /api/stocks?selected=CODE       master-table codes (scanned per request)
//!   GET  /api/stocks/{code}/columns      selectable columns + chart defaults
//!   GET  /api/stocks/{code}/chart        figure for ?left=COL&right=COL
//!   POST /api/crawl                      run the scraper as a subprocess
//!
//! A crawl request is held open until the subprocess exits; there is no
//! timeout and no cancellation.

pub mod figure;

use crate::config::{AppConfig, DashboardConfig};
use crate::error::StoreError;
use crate::models::Table;
use crate::storage::Repository;
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::process::Command;
use tracing::{error, info, warn};

use self::figure::{build_figure, chart_columns, date_column};

const INDEX_HTML: &str = include_str!("index.html");

pub struct DashboardState {
    repo: Repository,
    config: DashboardConfig,
    crawler: PathBuf,
}

impl DashboardState {
    pub fn new(config: &AppConfig, crawler: PathBuf) -> Self {
        Self {
            repo: Repository::open(&config.storage),
            config: config.dashboard.clone(),
            crawler,
        }
    }
}

type SharedState = Arc<DashboardState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/stocks", get(api_stocks))
        .route("/api/stocks/{code}/columns", get(api_columns))
        .route("/api/stocks/{code}/chart", get(api_chart))
        .route("/api/crawl", post(api_crawl))
        .with_state(state)
}

/// Bind, optionally open a browser tab, and serve until the process exits.
pub async fn serve(config: &AppConfig, crawler: PathBuf) -> Result<()> {
    let addr = format!("{}:{}", config.dashboard.host, config.dashboard.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP on {}", addr))?;

    let url = format!("http://{}/", addr);
    info!(%addr, crawler = ?crawler, "dashboard ready");
    println!("Dashboard running at {}", url);

    if config.dashboard.open_browser {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            if let Err(e) = open_browser(&url) {
                warn!("Could not open browser: {}", e);
            }
        });
    }

    let state = Arc::new(DashboardState::new(config, crawler));
    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")
}

fn open_browser(url: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let mut cmd = std::process::Command::new("open");
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut cmd = std::process::Command::new("xdg-open");

    cmd.arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

// ── Page ──────────────────────────────────────────────────────────────────────

async fn index(State(state): State<SharedState>) -> Html<String> {
    Html(INDEX_HTML.replace("{{MAX_CHARTS}}", &state.config.max_charts.max(1).to_string()))
}

// ── Stock list ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StocksQuery {
    selected: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StocksResponse {
    codes: Vec<String>,
    selected: Option<String>,
}

async fn api_stocks(
    State(state): State<SharedState>,
    Query(q): Query<StocksQuery>,
) -> Response {
    match state.repo.list_codes() {
        Ok(codes) => {
            let selected = select_code(&codes, q.selected);
            Json(StocksResponse { codes, selected }).into_response()
        }
        Err(e) => {
            error!("Listing master tables failed: {}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, format!("⚠️ 錯誤: {}", e))
        }
    }
}

/// Keep the current choice if it still exists, else the first code.
fn select_code(codes: &[String], current: Option<String>) -> Option<String> {
    current
        .filter(|c| codes.contains(c))
        .or_else(|| codes.first().cloned())
}

// ── Charts ────────────────────────────────────────────────────────────────────

async fn api_columns(State(state): State<SharedState>, Path(code): Path<String>) -> Response {
    match load_master(&state, &code) {
        Ok(table) => Json(chart_columns(&table, &state.config)).into_response(),
        Err(resp) => resp,
    }
}

#[derive(Debug, Deserialize)]
pub struct ChartQuery {
    left: Option<String>,
    right: Option<String>,
}

async fn api_chart(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Query(q): Query<ChartQuery>,
) -> Response {
    let (Some(left), Some(right)) = (q.left.filter(|s| !s.is_empty()), q.right.filter(|s| !s.is_empty()))
    else {
        return Json(json!({})).into_response();
    };

    let table = match load_master(&state, &code) {
        Ok(t) => t,
        Err(resp) => return resp,
    };
    let Some(date) = date_column(&table, &state.config.date_column) else {
        return Json(json!({})).into_response();
    };

    match build_figure(&table, &date, &left, &right) {
        Ok(fig) => Json(fig).into_response(),
        Err(e) => message(StatusCode::BAD_REQUEST, format!("⚠️ 錯誤: {}", e)),
    }
}

fn load_master(state: &DashboardState, code: &str) -> Result<Table, Response> {
    match state.repo.load_master(code) {
        Ok(Some(table)) => Ok(table),
        Ok(None) => Err(message(
            StatusCode::NOT_FOUND,
            format!("⚠️ 錯誤: {}.csv 文件不存在", code),
        )),
        Err(e @ StoreError::InvalidCode(_)) => {
            Err(message(StatusCode::BAD_REQUEST, format!("⚠️ 錯誤: {}", e)))
        }
        Err(e) => {
            error!("{}: reading master failed: {}", code, e);
            Err(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("⚠️ 錯誤: {}", e),
            ))
        }
    }
}

fn message(status: StatusCode, text: String) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

// ── Crawl ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CrawlRequest {
    code: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct CrawlReply {
    pub ok: bool,
    pub message: String,
}

async fn api_crawl(State(state): State<SharedState>, Json(req): Json<CrawlRequest>) -> Json<CrawlReply> {
    let code = req.code.unwrap_or_default();
    let code = code.trim();
    if code.is_empty() {
        return Json(CrawlReply {
            ok: false,
            message: "請輸入股票代碼後點擊「執行」".to_string(),
        });
    }
    Json(run_crawler(&state.crawler, code).await)
}

/// Run `<program> run <code>` and wait for it, however long it takes.
pub async fn run_crawler(program: &std::path::Path, code: &str) -> CrawlReply {
    info!("Launching {:?} run {}", program, code);
    let output = Command::new(program)
        .arg("run")
        .arg(code)
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => CrawlReply {
            ok: true,
            message: format!("✅ 獲取成功：{}，數據已更新", code),
        },
        Ok(out) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
            let detail = [stderr, stdout]
                .into_iter()
                .find(|s| !s.is_empty())
                .unwrap_or_else(|| out.status.to_string());
            warn!("{}: crawler exited with {}", code, out.status);
            CrawlReply {
                ok: false,
                message: format!("❌ 獲取失敗：{}", detail),
            }
        }
        Err(e) => {
            error!("{}: could not launch crawler: {}", code, e);
            CrawlReply {
                ok: false,
                message: format!("⚠️ 執行錯誤：{}", e),
            }
        }
    }
}
