// src/routes/review_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, db_error},
    images::validate_image_data,
    middleware::auth_context::AdminContext,
    middleware::json_body::ApiJson,
    models::{AppState, ListQuery, Paged, ReviewRow, non_blank},
};

const DEFAULT_LIMIT: i64 = 5;

const REVIEW_COLUMNS: &str =
    "id, patient_name, rating, content, is_approved, admin_reply, created_at, image_data";

pub fn router() -> Router<AppState> {
    Router::new().route("/reviews", get(list_approved_reviews).post(create_review))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/reviews", get(admin_list_reviews))
        .route("/reviews/{id}/approve", put(set_approval))
        .route("/reviews/{id}/reply", post(reply_to_review))
        .route("/reviews/{id}", delete(delete_review))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReviewRequest {
    pub patient_name: String,
    pub rating: i32,
    pub content: String,
    pub image_data: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub is_approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub reply: Option<String>,
}

fn validate_rating(rating: i32) -> Result<i32, ApiError> {
    if (1..=5).contains(&rating) {
        Ok(rating)
    } else {
        Err(ApiError::validation("rating must be between 1 and 5"))
    }
}

/* ============================================================
   Public
   ============================================================ */

pub async fn list_approved_reviews(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Paged<ReviewRow>>, ApiError> {
    let sql = format!(
        r#"
        SELECT {REVIEW_COLUMNS}
        FROM reviews
        WHERE is_approved = TRUE
        ORDER BY created_at DESC
        LIMIT $1 OFFSET $2
        "#
    );
    let items_fut = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(q.limit(DEFAULT_LIMIT))
        .bind(q.offset(DEFAULT_LIMIT))
        .fetch_all(&state.db);
    let count_fut =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reviews WHERE is_approved = TRUE")
            .fetch_one(&state.db);

    let (items, total) = tokio::try_join!(items_fut, count_fut).map_err(db_error)?;
    Ok(Json(Paged::new(items, total, &q, DEFAULT_LIMIT)))
}

/// New reviews stay hidden until an admin approves them.
pub async fn create_review(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> Result<(StatusCode, Json<ReviewRow>), ApiError> {
    let patient_name = non_blank(Some(req.patient_name.as_str()))
        .ok_or_else(|| ApiError::validation("patientName is required"))?
        .to_string();
    if non_blank(Some(req.content.as_str())).is_none() {
        return Err(ApiError::validation("content is required"));
    }
    let rating = validate_rating(req.rating)?;
    let image = validate_image_data(req.image_data)?;

    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        r#"
        INSERT INTO reviews (patient_name, rating, content, image_data)
        VALUES ($1, $2, $3, $4)
        RETURNING {REVIEW_COLUMNS}
        "#
    ))
    .bind(&patient_name)
    .bind(rating)
    .bind(&req.content)
    .bind(image)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    tracing::info!(review_id = row.id, rating, "review submitted");
    Ok((StatusCode::CREATED, Json(row)))
}

/* ============================================================
   Admin
   ============================================================ */

pub async fn admin_list_reviews(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<ReviewRow>>, ApiError> {
    let rows = sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY created_at DESC"
    ))
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn set_approval(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<ApprovalRequest>,
) -> Result<Json<ReviewRow>, ApiError> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "UPDATE reviews SET is_approved = $1 WHERE id = $2 RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(req.is_approved)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("review"))?;

    tracing::info!(review_id = id, approved = req.is_approved, "review moderated");
    Ok(Json(row))
}

pub async fn reply_to_review(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<ReplyRequest>,
) -> Result<Json<ReviewRow>, ApiError> {
    // A blank reply clears the existing one.
    let reply = non_blank(req.reply.as_deref()).map(str::to_string);

    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        "UPDATE reviews SET admin_reply = $1 WHERE id = $2 RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(reply)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("review"))?;

    Ok(Json(row))
}

pub async fn delete_review(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let res = sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("review"));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::validate_rating;

    #[test]
    fn rating_bounds() {
        assert!(validate_rating(0).is_err());
        assert_eq!(validate_rating(1).ok(), Some(1));
        assert_eq!(validate_rating(5).ok(), Some(5));
        assert!(validate_rating(6).is_err());
    }
}
