use axum::{Json, Router, extract::State, routing::get};

use crate::error::{ApiError, db_error};
use crate::models::{AppState, CaseBrief, NoticeBrief, ReviewBrief};

#[derive(serde::Serialize)]
pub struct HomeSummary {
    pub notices: Vec<NoticeBrief>,
    pub cases: Vec<CaseBrief>,
    pub reviews: Vec<ReviewBrief>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/home-summary", get(home_summary))
}

pub async fn liveness() -> &'static str {
    "clinic site API server is running"
}

/// Latest three of each for the landing page.
pub async fn home_summary(State(state): State<AppState>) -> Result<Json<HomeSummary>, ApiError> {
    let notices = sqlx::query_as::<_, NoticeBrief>(
        "SELECT id, title, created_at FROM notices ORDER BY created_at DESC LIMIT 3",
    )
    .fetch_all(&state.db);
    let cases = sqlx::query_as::<_, CaseBrief>(
        "SELECT id, title, category, before_image_data FROM case_photos ORDER BY created_at DESC LIMIT 3",
    )
    .fetch_all(&state.db);
    let reviews = sqlx::query_as::<_, ReviewBrief>(
        r#"
        SELECT patient_name, rating, content
        FROM reviews
        WHERE is_approved = TRUE
        ORDER BY created_at DESC
        LIMIT 3
        "#,
    )
    .fetch_all(&state.db);

    let (notices, cases, reviews) = tokio::try_join!(notices, cases, reviews).map_err(db_error)?;

    Ok(Json(HomeSummary {
        notices,
        cases,
        reviews,
    }))
}
