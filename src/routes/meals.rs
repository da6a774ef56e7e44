use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use chrono::{Days, Utc};
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::db::queries;
use crate::models::analysis::AnalyzeOutcome;
use crate::models::meal::{day_label, DailyCalories, MealRecord, NutrientTotals};
use crate::services::analysis::{recommendation_prompt, AnalysisProvider, CloudProvider};
use crate::services::classifier::ClassifierError;
use crate::services::connectivity::NetworkState;
use crate::services::scheduler::{Constraint, JobScheduler, ScheduleError};

const QUEUED_MESSAGE: &str =
    "You're offline. The photo was saved and will be analyzed automatically once a connection returns.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid multipart upload")]
    BadUpload,

    #[error("no image field in upload")]
    MissingImage,

    #[error("unsupported or corrupt image")]
    UnsupportedImage,

    #[error("that doesn't look like food")]
    NotFood,

    #[error("food screen failed: {0}")]
    Classifier(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("an internet connection is needed for this")]
    Offline,

    #[error("storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("could not schedule deferred analysis: {0}")]
    Schedule(#[from] ScheduleError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadUpload | ApiError::MissingImage => StatusCode::BAD_REQUEST,
            ApiError::UnsupportedImage => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::NotFood => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Analysis(_) => StatusCode::BAD_GATEWAY,
            ApiError::Offline => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Classifier(_) | ApiError::Database(_) | ApiError::Schedule(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<ClassifierError> for ApiError {
    fn from(e: ClassifierError) -> Self {
        match e {
            ClassifierError::Decode(_) => ApiError::UnsupportedImage,
            ClassifierError::Model(msg) => ApiError::Classifier(msg),
        }
    }
}

/// POST /api/v1/meals/analyze — upload a meal photo.
///
/// Online, the photo is analyzed and logged immediately; offline it is
/// appended to the durable queue and a network-constrained deferred job is
/// submitted. If the queue insert fails nothing is scheduled and the caller
/// gets the error.
pub async fn analyze_meal(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<AnalyzeOutcome>), ApiError> {
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadUpload)?
    {
        if field.name() == Some("image") {
            let data = field.bytes().await.map_err(|_| ApiError::BadUpload)?;
            image_data = Some(data.to_vec());
        }
    }

    let image_data = image_data.ok_or(ApiError::MissingImage)?;
    image::guess_format(&image_data).map_err(|_| ApiError::UnsupportedImage)?;

    // Screen out non-food before spending queue space or API quota.
    if let Some(gate) = &state.food_gate {
        if !gate.is_food(&image_data)? {
            metrics::counter!("meals_rejected_total").increment(1);
            return Err(ApiError::NotFood);
        }
    }

    let image_base64 = base64::engine::general_purpose::STANDARD.encode(&image_data);
    let captured_at_ms = Utc::now().timestamp_millis();

    if state.network.is_network_available() {
        let start = std::time::Instant::now();
        let info = state
            .providers
            .active()
            .analyze(&image_base64)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "online analysis failed");
                ApiError::Analysis(e.to_string())
            })?;
        metrics::histogram!("analysis_seconds").record(start.elapsed().as_secs_f64());

        let meal = queries::insert_meal(&state.db, &info, captured_at_ms).await?;
        metrics::counter!("meals_analyzed_total").increment(1);

        tracing::info!(meal_id = meal.id, food = %meal.food_name, "meal analyzed online");
        Ok((StatusCode::OK, Json(AnalyzeOutcome::Analyzed { meal })))
    } else {
        let queued = queries::enqueue_request(&state.db, &image_base64, captured_at_ms).await?;
        state.scheduler.schedule(Constraint::NetworkConnected).await?;

        metrics::counter!("offline_requests_enqueued_total").increment(1);
        if let Ok(depth) = queries::queue_depth(&state.db).await {
            metrics::gauge!("offline_queue_depth").set(depth as f64);
        }

        tracing::info!(request_id = queued.id, "no network; analysis request queued");
        Ok((
            StatusCode::ACCEPTED,
            Json(AnalyzeOutcome::Queued {
                request_id: queued.id,
                message: QUEUED_MESSAGE.to_string(),
            }),
        ))
    }
}

/// GET /api/v1/meals — the full meal log, newest first.
pub async fn list_meals(
    State(state): State<AppState>,
) -> Result<Json<Vec<MealRecord>>, ApiError> {
    Ok(Json(queries::list_meals(&state.db).await?))
}

/// GET /api/v1/meals/summary/today — macro totals for the current day label.
pub async fn today_summary(
    State(state): State<AppState>,
) -> Result<Json<NutrientTotals>, ApiError> {
    let today = day_label(Utc::now().timestamp_millis());
    Ok(Json(queries::day_totals(&state.db, &today).await?))
}

/// GET /api/v1/meals/summary/weekly — per-day calories for the last 7 days,
/// newest first, zero-filled for days with no meals.
pub async fn weekly_summary(
    State(state): State<AppState>,
) -> Result<Json<Vec<DailyCalories>>, ApiError> {
    let today = Utc::now().date_naive();
    let recorded = queries::recent_daily_calories(&state.db, 7).await?;

    let summary = (0..7)
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .map(|date| {
            let day = date.format("%Y-%m-%d").to_string();
            let total_calories = recorded
                .iter()
                .find(|r| r.day == day)
                .map(|r| r.total_calories)
                .unwrap_or(0);
            DailyCalories {
                day,
                total_calories,
            }
        })
        .collect();

    Ok(Json(summary))
}

#[derive(Serialize)]
pub struct RecommendationResponse {
    pub recommendation: String,
}

/// GET /api/v1/recommendation — ask the selected provider for a dinner
/// suggestion based on today's totals. Needs connectivity; there is no
/// offline queue for this path.
pub async fn recommendation(
    State(state): State<AppState>,
) -> Result<Json<RecommendationResponse>, ApiError> {
    if !state.network.is_network_available() {
        return Err(ApiError::Offline);
    }

    let today = day_label(Utc::now().timestamp_millis());
    let totals = queries::day_totals(&state.db, &today).await?;
    let prompt = recommendation_prompt(&totals);

    let recommendation = state
        .providers
        .active()
        .recommend(&prompt)
        .await
        .map_err(|e| ApiError::Analysis(e.to_string()))?;

    Ok(Json(RecommendationResponse { recommendation }))
}

#[derive(Deserialize)]
pub struct ProviderRequest {
    pub provider: CloudProvider,
}

#[derive(Serialize)]
pub struct ProviderResponse {
    pub provider: CloudProvider,
}

/// PUT /api/v1/provider — switch the analysis backend at runtime.
pub async fn switch_provider(
    State(state): State<AppState>,
    Json(request): Json<ProviderRequest>,
) -> Json<ProviderResponse> {
    state.providers.switch(request.provider);
    Json(ProviderResponse {
        provider: state.providers.current(),
    })
}
