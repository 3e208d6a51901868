//! # Chatsplit-rs
//!
//! Splits chat-export JSON (Telegram-style) into word-budgeted, overlapping
//! context blocks and returns them as a zip of formatted parts.
//!
//! ## Pipeline
//!
//! ```text
//! ┌────────────┐     ┌──────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Upload    │────▶│  Normalizer  │────▶│  Windower   │────▶│  Exporters  │──▶ zip
//! │  (.json)   │     │  (records)   │     │  (blocks)   │     │  txt/csv/…  │
//! └────────────┘     └──────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## API Endpoints
//!
//! - `GET /health` - Server health check
//! - `POST /process` - Multipart upload, returns `split_result.zip`
//! - `POST /preview` - Multipart upload, returns the first N normalized messages

mod archive;
mod config;
mod error;
mod exporters;
mod messages;
mod normalizer;
mod windower;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::{collections::HashMap, sync::Arc, time::Instant};
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ServerConfig;
use crate::error::{AppError, Result};
use crate::exporters::{ExportFormat, ExportOptions};
use crate::messages::ChatMessage;

const DEFAULT_WORD_BUDGET: i64 = 100_000;
const DEFAULT_OVERLAP: i64 = 5;
const MAX_OVERLAP: i64 = 20;
const DEFAULT_PREVIEW_LIMIT: i64 = 5;
const MAX_PREVIEW_LIMIT: i64 = 100;

// ============================================================================
// App State
// ============================================================================

struct AppState {
    start_time: Instant,
}

// ============================================================================
// Upload Parsing
// ============================================================================

/// A drained multipart form: the `file` part plus every text field
#[derive(Default)]
struct Upload {
    filename: Option<String>,
    file: Option<Bytes>,
    fields: HashMap<String, String>,
}

impl Upload {
    async fn read(mut multipart: Multipart) -> Result<Self> {
        let mut upload = Upload::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                upload.filename = field.file_name().map(str::to_string);
                upload.file = Some(field.bytes().await?);
            } else {
                let value = field.text().await?;
                upload.fields.insert(name, value);
            }
        }
        Ok(upload)
    }

    /// Validate the file part and decode it as a JSON object
    fn document(&self) -> Result<Value> {
        let bytes = self.file.as_ref().ok_or(AppError::MissingFile)?;
        let is_json = self
            .filename
            .as_deref()
            .is_some_and(|name| name.to_lowercase().ends_with(".json"));
        if !is_json {
            return Err(AppError::NotJsonFile);
        }
        normalizer::parse_document(bytes)
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Integer field; missing or blank means `default`
    fn int_field(&self, name: &'static str, default: i64) -> Result<i64> {
        match self.field(name).map(str::trim) {
            None | Some("") => Ok(default),
            Some(raw) => raw.parse().map_err(|_| AppError::InvalidField {
                field: name,
                value: raw.to_string(),
            }),
        }
    }

    fn bool_field(&self, name: &str) -> bool {
        self.field(name).map_or(true, form_bool)
    }
}

/// Form booleans: `true`, `1`, `yes`, `on` (any case)
fn form_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Settings for one `/process` request, already clamped
#[derive(Debug, PartialEq)]
struct ProcessParams {
    format: ExportFormat,
    max_words: usize,
    overlap: usize,
    options: ExportOptions,
}

impl ProcessParams {
    fn from_upload(upload: &Upload) -> Result<Self> {
        let word_count = upload.int_field("word_count", DEFAULT_WORD_BUDGET)?;
        let overlap = upload.int_field("overlap", DEFAULT_OVERLAP)?;
        Ok(Self {
            format: ExportFormat::parse(upload.field("format").unwrap_or("txt")),
            max_words: word_count.max(1) as usize,
            overlap: overlap.clamp(0, MAX_OVERLAP) as usize,
            options: ExportOptions {
                include_timestamp: upload.bool_field("include_timestamp"),
                include_sender: upload.bool_field("include_sender"),
                include_reactions: upload.bool_field("include_reactions"),
                include_reply_id: upload.bool_field("include_reply_id"),
            },
        })
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    version: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Process & Preview Endpoints
// ============================================================================

async fn process(multipart: Multipart) -> Result<Response> {
    let upload = Upload::read(multipart).await?;
    let params = ProcessParams::from_upload(&upload)?;
    let document = upload.document()?;

    let messages = normalizer::normalize(&document);
    if messages.is_empty() {
        return Err(AppError::NoMessages);
    }

    let blocks = windower::window(&messages, params.max_words, params.overlap);
    let largest = blocks.iter().map(|b| windower::block_words(b)).max().unwrap_or(0);
    let zip = archive::build_archive(&blocks, params.format, &params.options)?;

    info!(
        "Split {} messages into {} {} parts (budget {}, overlap {}, largest {} words, {} bytes)",
        messages.len(),
        blocks.len(),
        params.format.extension(),
        params.max_words,
        params.overlap,
        largest,
        zip.len()
    );

    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", archive::ARCHIVE_NAME),
            ),
        ],
        zip,
    )
        .into_response())
}

#[derive(Serialize)]
struct PreviewResponse {
    preview: Vec<ChatMessage>,
    total: usize,
}

async fn preview(multipart: Multipart) -> Result<Json<PreviewResponse>> {
    let upload = Upload::read(multipart).await?;
    let limit = upload
        .int_field("limit", DEFAULT_PREVIEW_LIMIT)?
        .clamp(1, MAX_PREVIEW_LIMIT) as usize;
    let document = upload.document()?;

    let mut messages = normalizer::normalize(&document);
    let total = messages.len();
    messages.truncate(limit);
    info!("Previewing {} of {} messages", messages.len(), total);

    Ok(Json(PreviewResponse {
        preview: messages,
        total,
    }))
}

// ============================================================================
// Main
// ============================================================================

fn router(config: &ServerConfig) -> Router {
    let state = Arc::new(AppState {
        start_time: Instant::now(),
    });

    Router::new()
        .route("/health", get(health))
        .route("/process", post(process))
        .route("/preview", post(preview))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        // Static upload page
        .fallback_service(ServeDir::new(&config.static_dir).append_index_html_on_directories(true))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatsplit_rs=info,tower_http=info")),
        )
        .init();

    let config = ServerConfig::from_env();
    let app = router(&config);

    let addr = config.addr();
    info!("Chatsplit-rs v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
