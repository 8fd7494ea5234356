// src/routes/consultation_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::{
    auth::{hash_password_blocking, verify_password_blocking},
    error::{ApiError, db_error},
    images::validate_image_data,
    middleware::auth_context::{AdminContext, MaybeUser},
    middleware::json_body::ApiJson,
    models::{
        AppState, ConsultationRow, ConsultationSummaryRow, ListQuery, Paged, PasswordRequest,
        ReplyRow, SuccessResponse, non_blank,
    },
    ownership::{self, OwnedResource},
};

const DEFAULT_LIMIT: i64 = 10;

const CONSULTATION_COLUMNS: &str = "id, author, title, content, is_secret, is_answered, \
     created_at, updated_at, image_data, user_id";

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/consultations",
            get(list_consultations).post(create_consultation),
        )
        .route(
            "/consultations/{id}",
            get(get_consultation)
                .put(update_consultation)
                .delete(delete_consultation),
        )
        .route("/consultations/{id}/verify", post(verify_consultation_password))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/consultations/{id}",
            put(admin_update_consultation).delete(admin_delete_consultation),
        )
        .route("/consultations/{id}/replies", post(create_reply))
        .route("/replies/{id}", put(update_reply).delete(delete_reply))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConsultationRequest {
    pub author: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub content: String,
    pub is_secret: Option<bool>,
    pub image_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateConsultationRequest {
    pub title: String,
    pub content: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ConsultationDetail {
    #[serde(flatten)]
    pub consultation: ConsultationRow,
    pub replies: Vec<ReplyRow>,
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    non_blank(Some(value))
        .map(|_| ())
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

/* ============================================================
   Public
   ============================================================ */

// Secret consultations never appear in the public listing.
fn push_public_filter(qb: &mut QueryBuilder<'_, Postgres>, pattern: Option<&str>) {
    qb.push(" WHERE is_secret = FALSE");
    if let Some(p) = pattern {
        qb.push(" AND (title ILIKE ");
        qb.push_bind(p.to_string());
        qb.push(" OR content ILIKE ");
        qb.push_bind(p.to_string());
        qb.push(" OR author ILIKE ");
        qb.push_bind(p.to_string());
        qb.push(")");
    }
}

pub async fn list_consultations(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Paged<ConsultationSummaryRow>>, ApiError> {
    let pattern = q.search_pattern();

    let mut count_qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM consultations");
    push_public_filter(&mut count_qb, pattern.as_deref());
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, title, author, created_at, is_secret, is_answered, user_id FROM consultations",
    );
    push_public_filter(&mut qb, pattern.as_deref());
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(q.limit(DEFAULT_LIMIT));
    qb.push(" OFFSET ");
    qb.push_bind(q.offset(DEFAULT_LIMIT));

    let rows = qb
        .build_query_as::<ConsultationSummaryRow>()
        .fetch_all(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Json(Paged::new(rows, total, &q, DEFAULT_LIMIT)))
}

pub async fn get_consultation(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ConsultationDetail>, ApiError> {
    let consultation = sqlx::query_as::<_, ConsultationRow>(&format!(
        "SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("consultation"))?;

    let replies = sqlx::query_as::<_, ReplyRow>(
        r#"
        SELECT id, consultation_id, content, created_at, updated_at
        FROM replies
        WHERE consultation_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(ConsultationDetail {
        consultation,
        replies,
    }))
}

pub async fn verify_consultation_password(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<PasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let stored: Option<String> =
        sqlx::query_scalar("SELECT password FROM consultations WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::not_found("consultation"))?;

    let success = match (req.password.filter(|p| !p.is_empty()), stored) {
        (Some(password), Some(hash)) => verify_password_blocking(password, hash).await,
        _ => false,
    };
    Ok(Json(SuccessResponse { success }))
}

pub async fn create_consultation(
    State(state): State<AppState>,
    user: MaybeUser,
    ApiJson(req): ApiJson<CreateConsultationRequest>,
) -> Result<(StatusCode, Json<ConsultationRow>), ApiError> {
    require_text("title", &req.title)?;
    require_text("content", &req.content)?;

    let author = match &user.0 {
        Some(u) => u.username.clone(),
        None => non_blank(req.author.as_deref())
            .ok_or_else(|| ApiError::validation("author is required"))?
            .to_string(),
    };
    let image = validate_image_data(req.image_data)?;
    let hashed = hash_password_blocking(req.password.unwrap_or_default())
        .await
        .map_err(ApiError::Internal)?;

    let row = sqlx::query_as::<_, ConsultationRow>(&format!(
        r#"
        INSERT INTO consultations (author, password, title, content, is_secret, image_data, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {CONSULTATION_COLUMNS}
        "#
    ))
    .bind(&author)
    .bind(&hashed)
    .bind(req.title.trim())
    .bind(&req.content)
    .bind(req.is_secret.unwrap_or(true))
    .bind(image)
    .bind(user.user_id())
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    tracing::info!(consultation_id = row.id, secret = row.is_secret, "consultation created");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn load_consultation_owner(state: &AppState, id: i32) -> Result<OwnedResource, ApiError> {
    sqlx::query_as::<_, OwnedResource>(
        "SELECT password, user_id FROM consultations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("consultation"))
}

async fn write_consultation(
    state: &AppState,
    id: i32,
    title: &str,
    content: &str,
) -> Result<ConsultationRow, ApiError> {
    sqlx::query_as::<_, ConsultationRow>(&format!(
        r#"
        UPDATE consultations
        SET title = $1, content = $2, updated_at = now()
        WHERE id = $3
        RETURNING {CONSULTATION_COLUMNS}
        "#
    ))
    .bind(title.trim())
    .bind(content)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("consultation"))
}

async fn remove_consultation(state: &AppState, id: i32) -> Result<(), ApiError> {
    let res = sqlx::query("DELETE FROM consultations WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("consultation"));
    }
    Ok(())
}

pub async fn update_consultation(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<UpdateConsultationRequest>,
) -> Result<Json<ConsultationRow>, ApiError> {
    require_text("title", &req.title)?;
    require_text("content", &req.content)?;

    let owned = load_consultation_owner(&state, id).await?;
    let grant = ownership::resolve_blocking(owned, user.user_id(), req.password).await?;

    let row = write_consultation(&state, id, &req.title, &req.content).await?;
    tracing::info!(consultation_id = id, ?grant, "consultation updated");
    Ok(Json(row))
}

pub async fn delete_consultation(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
    body: Option<ApiJson<PasswordRequest>>,
) -> Result<StatusCode, ApiError> {
    let password = body.and_then(|ApiJson(b)| b.password);

    let owned = load_consultation_owner(&state, id).await?;
    let grant = ownership::resolve_blocking(owned, user.user_id(), password).await?;

    remove_consultation(&state, id).await?;
    tracing::info!(consultation_id = id, ?grant, "consultation deleted");
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Admin
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AdminConsultationRequest {
    pub title: String,
    pub content: String,
}

pub async fn admin_update_consultation(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<AdminConsultationRequest>,
) -> Result<Json<ConsultationRow>, ApiError> {
    require_text("title", &req.title)?;
    require_text("content", &req.content)?;
    Ok(Json(
        write_consultation(&state, id, &req.title, &req.content).await?,
    ))
}

pub async fn admin_delete_consultation(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    remove_consultation(&state, id).await?;
    tracing::info!(consultation_id = id, "consultation removed by admin");
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Replies
   ============================================================ */

pub async fn create_reply(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(consultation_id): Path<i32>,
    ApiJson(req): ApiJson<ReplyRequest>,
) -> Result<(StatusCode, Json<ReplyRow>), ApiError> {
    require_text("content", &req.content)?;

    let mut tx = state.db.begin().await.map_err(db_error)?;

    let marked = sqlx::query(
        "UPDATE consultations SET is_answered = TRUE, updated_at = now() WHERE id = $1",
    )
    .bind(consultation_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    if marked.rows_affected() == 0 {
        tx.rollback().await.map_err(db_error)?;
        return Err(ApiError::not_found("consultation"));
    }

    let reply = sqlx::query_as::<_, ReplyRow>(
        r#"
        INSERT INTO replies (consultation_id, content)
        VALUES ($1, $2)
        RETURNING id, consultation_id, content, created_at, updated_at
        "#,
    )
    .bind(consultation_id)
    .bind(&req.content)
    .fetch_one(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    tracing::info!(consultation_id, reply_id = reply.id, "consultation answered");
    Ok((StatusCode::CREATED, Json(reply)))
}

pub async fn update_reply(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<ReplyRequest>,
) -> Result<Json<ReplyRow>, ApiError> {
    require_text("content", &req.content)?;

    let reply = sqlx::query_as::<_, ReplyRow>(
        r#"
        UPDATE replies
        SET content = $1, updated_at = now()
        WHERE id = $2
        RETURNING id, consultation_id, content, created_at, updated_at
        "#,
    )
    .bind(&req.content)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("reply"))?;

    Ok(Json(reply))
}

pub async fn delete_reply(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    let mut tx = state.db.begin().await.map_err(db_error)?;

    let consultation_id: i32 =
        match sqlx::query_scalar("DELETE FROM replies WHERE id = $1 RETURNING consultation_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
        {
            Some(cid) => cid,
            None => {
                tx.rollback().await.map_err(db_error)?;
                return Err(ApiError::not_found("reply"));
            }
        };

    // The last reply going away reopens the consultation.
    sqlx::query(
        r#"
        UPDATE consultations
        SET is_answered = FALSE
        WHERE id = $1
          AND NOT EXISTS (SELECT 1 FROM replies WHERE consultation_id = $1)
        "#,
    )
    .bind(consultation_id)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    tracing::info!(consultation_id, reply_id = id, "reply deleted");
    Ok(StatusCode::NO_CONTENT)
}
