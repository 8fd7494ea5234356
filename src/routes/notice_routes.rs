// src/routes/notice_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

use crate::{
    error::{ApiError, db_error},
    images::{replace_or_keep, validate_image_data},
    middleware::auth_context::AdminContext,
    middleware::json_body::ApiJson,
    models::{AppState, ListQuery, NoticeRow, Paged, non_blank},
};

const DEFAULT_LIMIT: i64 = 10;

// Category filter value meaning "every category".
const ALL_CATEGORIES: &str = "전체";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notices", get(list_notices))
        .route("/notices/{id}", get(get_notice))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/notices", get(admin_list_notices).post(create_notice))
        .route(
            "/notices/{id}",
            get(admin_get_notice).put(update_notice).delete(delete_notice),
        )
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, pattern: Option<&str>, category: Option<&str>) {
    qb.push(" WHERE 1=1 ");
    if let Some(p) = pattern {
        qb.push(" AND (title ILIKE ");
        qb.push_bind(p.to_string());
        qb.push(" OR content ILIKE ");
        qb.push_bind(p.to_string());
        qb.push(")");
    }
    if let Some(c) = category {
        qb.push(" AND category = ");
        qb.push_bind(c.to_string());
    }
}

async fn page_of_notices(
    state: &AppState,
    q: &ListQuery,
    category: Option<&str>,
) -> Result<Paged<NoticeRow>, ApiError> {
    let pattern = q.search_pattern();

    let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM notices");
    push_filters(&mut count_qb, pattern.as_deref(), category);
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, title, category, content, created_at, updated_at, image_data FROM notices",
    );
    push_filters(&mut qb, pattern.as_deref(), category);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(q.limit(DEFAULT_LIMIT));
    qb.push(" OFFSET ");
    qb.push_bind(q.offset(DEFAULT_LIMIT));

    let rows = qb
        .build_query_as::<NoticeRow>()
        .fetch_all(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Paged::new(rows, total, q, DEFAULT_LIMIT))
}

async fn load_notice(state: &AppState, id: i32) -> Result<NoticeRow, ApiError> {
    sqlx::query_as::<_, NoticeRow>(
        r#"
        SELECT id, title, category, content, created_at, updated_at, image_data
        FROM notices
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("notice"))
}

/* ============================================================
   Public
   ============================================================ */

pub async fn list_notices(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Paged<NoticeRow>>, ApiError> {
    let category = non_blank(q.category.as_deref()).filter(|c| *c != ALL_CATEGORIES);
    Ok(Json(page_of_notices(&state, &q, category).await?))
}

pub async fn get_notice(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<NoticeRow>, ApiError> {
    Ok(Json(load_notice(&state, id).await?))
}

/* ============================================================
   Admin
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRequest {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub image_data: Option<String>,
    pub existing_image_data: Option<String>,
}

impl NoticeRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if non_blank(Some(self.title.as_str())).is_none() {
            return Err(ApiError::validation("title is required"));
        }
        if non_blank(Some(self.content.as_str())).is_none() {
            return Err(ApiError::validation("content is required"));
        }
        Ok(())
    }
}

pub async fn admin_list_notices(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<Paged<NoticeRow>>, ApiError> {
    Ok(Json(page_of_notices(&state, &q, None).await?))
}

pub async fn admin_get_notice(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<Json<NoticeRow>, ApiError> {
    Ok(Json(load_notice(&state, id).await?))
}

pub async fn create_notice(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<NoticeRequest>,
) -> Result<(StatusCode, Json<NoticeRow>), ApiError> {
    req.validate()?;
    let image = validate_image_data(req.image_data)?;

    let row = sqlx::query_as::<_, NoticeRow>(
        r#"
        INSERT INTO notices (title, content, category, image_data)
        VALUES ($1, $2, $3, $4)
        RETURNING id, title, category, content, created_at, updated_at, image_data
        "#,
    )
    .bind(req.title.trim())
    .bind(&req.content)
    .bind(req.category.as_deref())
    .bind(image)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    tracing::info!(notice_id = row.id, "notice created");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_notice(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<NoticeRequest>,
) -> Result<Json<NoticeRow>, ApiError> {
    req.validate()?;
    let image = replace_or_keep(req.image_data, req.existing_image_data)?;

    let row = sqlx::query_as::<_, NoticeRow>(
        r#"
        UPDATE notices
        SET title = $1, content = $2, category = $3, image_data = $4, updated_at = now()
        WHERE id = $5
        RETURNING id, title, category, content, created_at, updated_at, image_data
        "#,
    )
    .bind(req.title.trim())
    .bind(&req.content)
    .bind(req.category.as_deref())
    .bind(image)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("notice"))?;

    Ok(Json(row))
}

pub async fn delete_notice(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let res = sqlx::query("DELETE FROM notices WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("notice"));
    }
    Ok(StatusCode::NO_CONTENT)
}
