//! Endpoint handlers and the HTTP error mapping.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{PageSelection, ParseConfig, Strategy};
use crate::error::ParseError;
use crate::metrics::TrackerSnapshot;
use crate::output::{PageRecord, ParseOutput, ParseStats};
use crate::parse::parse_from_bytes;
use crate::pipeline::input::validate_pdf_bytes;
use crate::providers::{build_provider, ProviderKind};

use super::AppState;

// ── Error mapping ────────────────────────────────────────────────────────

/// JSON error body: `{"success": false, "error": ..., "detail": ...}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

/// A handler failure carrying its HTTP status.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub error: String,
    pub detail: Option<String>,
}

impl ApiFailure {
    fn bad_request(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: error.into(),
            detail: Some(detail.into()),
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                success: false,
                error: self.error,
                detail: self.detail,
            }),
        )
            .into_response()
    }
}

impl From<ParseError> for ApiFailure {
    fn from(err: ParseError) -> Self {
        let status = match &err {
            // Caller mistakes.
            ParseError::NotAPdf { .. }
            | ParseError::EmptyUpload { .. }
            | ParseError::InvalidParameter(_)
            | ParseError::InvalidConfig(_)
            | ParseError::PageOutOfRange { .. } => StatusCode::BAD_REQUEST,
            // The upload is a PDF but we cannot process it.
            ParseError::CorruptPdf { .. }
            | ParseError::PasswordRequired { .. }
            | ParseError::WrongPassword { .. }
            | ParseError::AllPagesFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            // Service-side availability.
            ParseError::ProviderNotConfigured { .. } | ParseError::PdfiumBindingFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ParseError::AuthError { .. } => StatusCode::BAD_GATEWAY,
            ParseError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("request failed: {err}");
        } else {
            debug!("request rejected: {err}");
        }
        Self {
            status,
            error: err.to_string(),
            detail: None,
        }
    }
}

// ── Response types ───────────────────────────────────────────────────────

/// JSON response for the two POST endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParseResponse {
    pub success: bool,
    pub text: String,
    pub strategy_used: Strategy,
    pub provider: Option<ProviderKind>,
    /// Mean classifier confidence across non-failed pages.
    pub confidence: f32,
    /// Wall-clock seconds.
    pub processing_time: f64,
    pub pages: Vec<PageRecord>,
    pub stats: ParseStats,
}

impl From<ParseOutput> for ParseResponse {
    fn from(output: ParseOutput) -> Self {
        let confidence = output.mean_confidence();
        Self {
            success: true,
            confidence,
            processing_time: output.stats.total_duration_ms as f64 / 1000.0,
            text: output.text,
            strategy_used: output.strategy,
            provider: output.provider,
            pages: output.pages,
            stats: output.stats,
        }
    }
}

// ── Upload handling ──────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Upload {
    file_name: String,
    bytes: Option<Vec<u8>>,
    strategy: Option<String>,
    provider: Option<String>,
    pages: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiFailure> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiFailure::bad_request("Failed to read upload", e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" | "document" => {
                upload.file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.pdf".to_string());
                let data = field.bytes().await.map_err(|e| {
                    ApiFailure::bad_request("Failed to read file data", e.to_string())
                })?;
                upload.bytes = Some(data.to_vec());
            }
            "strategy" => upload.strategy = Some(read_text_field(field).await?),
            "llm_provider" | "provider" => upload.provider = Some(read_text_field(field).await?),
            "pages" => upload.pages = Some(read_text_field(field).await?),
            other => {
                debug!("ignoring unknown multipart field '{other}'");
            }
        }
    }

    Ok(upload)
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiFailure> {
    field
        .text()
        .await
        .map_err(|e| ApiFailure::bad_request("Failed to read form field", e.to_string()))
}

/// Apply request overrides on top of the server defaults and pre-build the
/// provider from the server's key store.
///
/// An explicitly requested provider without a key is an error even under
/// `auto` — the caller asked for that vendor specifically. A bare `auto`
/// request with no keys at all proceeds; the dispatcher degrades to
/// library-only with a warning.
fn build_request_config(state: &AppState, upload: &Upload) -> Result<ParseConfig, ParseError> {
    let mut config = state.defaults().clone();

    if let Some(ref s) = upload.strategy {
        config.strategy = s.parse()?;
    }
    if let Some(ref p) = upload.pages {
        config.pages = PageSelection::parse(p)?;
    }
    let requested: Option<ProviderKind> = match upload.provider {
        Some(ref p) => Some(p.parse()?),
        None => None,
    };
    if let Some(kind) = requested {
        config.provider_kind = Some(kind);
    }

    if config.strategy != Strategy::Library {
        let kind = config
            .provider_kind
            .or_else(|| state.keys().first_configured());
        match kind {
            Some(kind) => match state.keys().key_for(kind) {
                Some(key) => {
                    config.provider = Some(build_provider(
                        kind,
                        key,
                        config.model.as_deref(),
                        state.http(),
                    ));
                }
                None => {
                    return Err(ParseError::ProviderNotConfigured {
                        provider: kind.as_str().to_string(),
                        hint: format!("Export {} to enable it.", kind.env_var()),
                    });
                }
            },
            None if config.strategy == Strategy::Ai => {
                return Err(ParseError::ProviderNotConfigured {
                    provider: "auto".to_string(),
                    hint: "Set OPENAI_API_KEY, GEMINI_API_KEY or ANTHROPIC_API_KEY.".to_string(),
                });
            }
            None => {}
        }
    }

    Ok(config)
}

async fn run_parse(state: &AppState, upload: Upload) -> Result<Json<ParseResponse>, ApiFailure> {
    let bytes = upload
        .bytes
        .as_deref()
        .ok_or_else(|| ApiFailure::bad_request("Missing file", "expected a 'file' form field"))?;
    validate_pdf_bytes(&upload.file_name, bytes)?;

    let config = build_request_config(state, &upload)?;
    let output = parse_from_bytes(bytes, &config).await?;
    state.tracker().record(&output);

    Ok(Json(ParseResponse::from(output)))
}

// ── Endpoints ────────────────────────────────────────────────────────────

/// `POST /parse-smart/` — full smart parsing with per-request strategy,
/// provider and page selection.
pub async fn parse_smart(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ParseResponse>, ApiFailure> {
    let upload = read_upload(multipart).await?;
    run_parse(&state, upload).await
}

/// `POST /parse/` — the simple endpoint: library-first with automatic
/// escalation, no knobs. Extra form fields are ignored.
pub async fn parse_basic(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ParseResponse>, ApiFailure> {
    let mut upload = read_upload(multipart).await?;
    upload.strategy = None;
    upload.provider = None;
    upload.pages = None;
    run_parse(&state, upload).await
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: ServicesStatus,
    pub environment: String,
}

#[derive(Debug, Serialize)]
pub struct ServicesStatus {
    pub library_parser: bool,
    pub ai_fallback: bool,
    pub providers: ProvidersStatus,
}

#[derive(Debug, Serialize)]
pub struct ProvidersStatus {
    pub openai: bool,
    pub gemini: bool,
    pub anthropic: bool,
}

/// `GET /health-check/`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let keys = state.keys();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        services: ServicesStatus {
            library_parser: state.library_available(),
            ai_fallback: keys.any_configured(),
            providers: ProvidersStatus {
                openai: keys.is_configured(ProviderKind::OpenAi),
                gemini: keys.is_configured(ProviderKind::Gemini),
                anthropic: keys.is_configured(ProviderKind::Anthropic),
            },
        },
        environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    })
}

/// `GET /api/info`
pub async fn api_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    let configured: Vec<&str> = state
        .keys()
        .configured()
        .into_iter()
        .map(|k| k.as_str())
        .collect();
    Json(serde_json::json!({
        "name": "pdf-parser-pro",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Smart PDF parsing: free library extraction per page with AI-vision fallback",
        "features": {
            "library_parsing": true,
            "smart_parsing": true,
            "ai_fallback": state.keys().any_configured(),
            "providers": configured,
        },
        "endpoints": [
            "/",
            "/health-check/",
            "/api/info",
            "/metrics/",
            "/parse/",
            "/parse-smart/",
        ],
    }))
}

/// `GET /metrics/`
pub async fn metrics(State(state): State<AppState>) -> Json<TrackerSnapshot> {
    Json(state.tracker().snapshot())
}

/// `GET /` — JSON service index.
pub async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "pdf-parser-pro",
        "version": env!("CARGO_PKG_VERSION"),
        "message": "POST a PDF to /parse-smart/ (fields: file, strategy, llm_provider, pages)",
        "docs": "/api/info",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyStore;

    fn empty_state() -> AppState {
        AppState::new(KeyStore::default(), ParseConfig::default())
    }

    fn upload(strategy: Option<&str>, provider: Option<&str>, pages: Option<&str>) -> Upload {
        Upload {
            file_name: "doc.pdf".into(),
            bytes: Some(b"%PDF-1.4".to_vec()),
            strategy: strategy.map(String::from),
            provider: provider.map(String::from),
            pages: pages.map(String::from),
        }
    }

    #[test]
    fn request_config_applies_overrides() {
        let state = empty_state();
        let config =
            build_request_config(&state, &upload(Some("library"), None, Some("2-4"))).unwrap();
        assert_eq!(config.strategy, Strategy::Library);
        assert_eq!(config.pages, PageSelection::Range(2, 4));
        assert!(config.provider.is_none());
    }

    #[test]
    fn request_config_rejects_unknown_strategy() {
        let state = empty_state();
        let err = build_request_config(&state, &upload(Some("turbo"), None, None)).unwrap_err();
        assert!(matches!(err, ParseError::InvalidParameter(_)));
    }

    #[test]
    fn explicit_provider_without_key_is_unavailable() {
        let state = empty_state();
        let err = build_request_config(&state, &upload(None, Some("gemini"), None)).unwrap_err();
        assert!(matches!(err, ParseError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn ai_strategy_without_any_key_is_unavailable() {
        let state = empty_state();
        let err = build_request_config(&state, &upload(Some("ai"), None, None)).unwrap_err();
        assert!(matches!(err, ParseError::ProviderNotConfigured { .. }));
    }

    #[test]
    fn bare_auto_without_keys_degrades() {
        let state = empty_state();
        let config = build_request_config(&state, &upload(None, None, None)).unwrap();
        assert_eq!(config.strategy, Strategy::Auto);
        assert!(config.provider.is_none());
    }

    #[test]
    fn error_mapping_statuses() {
        let cases: Vec<(ParseError, StatusCode)> = vec![
            (
                ParseError::NotAPdf {
                    name: "x".into(),
                    magic: *b"GIF8",
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                ParseError::ProviderNotConfigured {
                    provider: "gemini".into(),
                    hint: String::new(),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ParseError::RateLimited {
                    provider: "openai".into(),
                    retry_after_secs: None,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ParseError::AuthError {
                    provider: "openai".into(),
                    detail: "bad key".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                ParseError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiFailure::from(err).status, expected);
        }
    }
}
