use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::error;
use valuation_backend::market::analysis::evaluate;
use valuation_backend::market::fetch::{MarketQuery, ReinfolibClient};
use valuation_backend::market::normalize::quarter_window;
use valuation_backend::market::types::{PropertyCategory, SubjectProperty, ValuationResult};

#[derive(Clone)]
struct AppState {
    source: Arc<ReinfolibClient>,
    quarter_count: usize,
}

#[derive(Serialize, Deserialize)]
struct ApiResponse {
    message: String,
    status: String,
}

/// Errors surfaced by the API; each maps to a status and a JSON error body
#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("該当エリアの取引データが見つかりませんでした。別のエリアまたは物件種別をお試しください。")]
    NoComparables,
    #[error("取引データの取得に失敗しました")]
    Upstream(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Upstream(e) = &self {
            error!("Upstream failure: {}", e);
        }
        let status = match &self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NoComparables => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[tokio::main]
async fn main() {
    println!("🏠 Starting valuation API server...");

    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_target(false).init();

    let gateway_url = std::env::var("REINFOLIB_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:8787/reinfolib".to_string());
    let quarter_count = std::env::var("QUARTER_WINDOW")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8)
        .max(1);

    let source = ReinfolibClient::new(&gateway_url, Duration::from_secs(30))
        .expect("Failed to build gateway client");
    println!("📦 Transaction gateway: {}", gateway_url);

    let state = AppState {
        source: Arc::new(source),
        quarter_count,
    };

    let app = Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/cities", get(get_cities))
        .route("/api/analyze", post(analyze))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3001));
    println!("🚀 Server running on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Valuation API is running!".to_string(),
        status: "ok".to_string(),
    })
}

#[derive(Deserialize)]
struct CitiesParams {
    area: Option<String>,
}

/// Municipality list for a prefecture, passed through from the gateway
async fn get_cities(
    State(state): State<AppState>,
    Query(params): Query<CitiesParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let area = params
        .area
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ApiError::Validation("都道府県コード（area）は必須です".to_string()))?;

    let cities = state.source.city_list(&area).await?;

    Ok(Json(serde_json::json!({ "cities": cities })))
}

/// Analyze request body; everything optional so validation can answer with
/// a field-specific message instead of a bare deserialization failure
#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(rename = "propertyType")]
    property_type: Option<PropertyCategory>,
    prefecture: Option<String>,
    city: Option<String>,
    price: Option<f64>,
    area: Option<f64>,
    age: Option<f64>,
}

/// Validate the request into a well-formed subject property.
/// The valuation core assumes these invariants and is never called without them.
fn validate_subject(request: AnalyzeRequest) -> Result<SubjectProperty, ApiError> {
    let (category, prefecture, city) = match (
        request.property_type,
        request.prefecture.filter(|p| !p.is_empty()),
        request.city.filter(|c| !c.is_empty()),
    ) {
        (Some(category), Some(prefecture), Some(city)) => (category, prefecture, city),
        _ => {
            return Err(ApiError::Validation(
                "物件種別、都道府県、市区町村は必須です".to_string(),
            ))
        }
    };

    let price = request
        .price
        .filter(|p| *p > 0.0)
        .ok_or_else(|| ApiError::Validation("物件価格は正の数で入力してください".to_string()))?;

    let area = request
        .area
        .filter(|a| *a > 0.0)
        .ok_or_else(|| ApiError::Validation("専有面積は正の数で入力してください".to_string()))?;

    let age = match request.age {
        Some(age) if age >= 0.0 => age as u32,
        _ => {
            return Err(ApiError::Validation(
                "築年数は0以上の数で入力してください".to_string(),
            ))
        }
    };

    Ok(SubjectProperty {
        category,
        prefecture,
        city,
        price,
        area,
        age,
    })
}

/// Run a valuation: validate, fetch comparables over the rolling quarter
/// window, evaluate against the market
async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<ValuationResult>, ApiError> {
    let subject = validate_subject(request)?;

    let window = quarter_window(state.quarter_count);
    let query = MarketQuery {
        area: subject.prefecture.clone(),
        city: subject.city.clone(),
        category: Some(subject.category),
    };

    let comparables = state.source.fetch_comparables(&query, &window).await;

    // Zero comparables is a user-facing "no data for this area" condition,
    // distinct from an upstream failure
    if comparables.is_empty() {
        return Err(ApiError::NoComparables);
    }

    Ok(Json(evaluate(&subject, comparables)))
}
