// src/routes/post_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
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
        AppState, CommentRow, ListQuery, Paged, PasswordRequest, PostRow, PostSummaryRow,
        SuccessResponse, non_blank,
    },
    ownership::{self, OwnedResource},
};

const DEFAULT_LIMIT: i64 = 10;

const POST_COLUMNS: &str =
    "id, author, title, content, created_at, updated_at, image_data, user_id";

const COMMENT_COLUMNS: &str = "id, post_id, author, content, likes, tags, created_at";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/{id}/verify", post(verify_post_password))
        .route("/posts/{id}/comments", post(create_comment))
        .route("/posts/comments/{comment_id}", delete(delete_comment))
        .route("/posts/comments/{comment_id}/like", post(like_comment))
        .route("/posts/comments/{comment_id}/tags", post(tag_comment))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route(
            "/posts/{id}",
            axum::routing::put(admin_update_post).delete(admin_delete_post),
        )
        .route("/posts/comments/{comment_id}", delete(admin_delete_comment))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub author: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub content: String,
    pub image_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
    pub content: String,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub author: String,
    pub password: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostRow,
    pub comments: Vec<CommentRow>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LikesResponse {
    pub likes: i32,
}

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: String,
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    non_blank(Some(value))
        .map(|_| ())
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

/// Appends `tag` to a comma separated tag list unless it is already there.
fn merge_tag(existing: Option<&str>, tag: &str) -> String {
    let mut tags: Vec<&str> = existing
        .unwrap_or("")
        .split(',')
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.contains(&tag) {
        tags.push(tag);
    }
    tags.join(",")
}

/* ============================================================
   Posts
   ============================================================ */

fn push_search(qb: &mut QueryBuilder<'_, Postgres>, pattern: Option<&str>) {
    if let Some(p) = pattern {
        qb.push(" WHERE title ILIKE ");
        qb.push_bind(p.to_string());
        qb.push(" OR content ILIKE ");
        qb.push_bind(p.to_string());
        qb.push(" OR author ILIKE ");
        qb.push_bind(p.to_string());
    }
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Paged<PostSummaryRow>>, ApiError> {
    let pattern = q.search_pattern();

    let mut count_qb: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM posts");
    push_search(&mut count_qb, pattern.as_deref());
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT id, title, author, created_at, updated_at FROM posts");
    push_search(&mut qb, pattern.as_deref());
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(q.limit(DEFAULT_LIMIT));
    qb.push(" OFFSET ");
    qb.push_bind(q.offset(DEFAULT_LIMIT));

    let rows = qb
        .build_query_as::<PostSummaryRow>()
        .fetch_all(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Json(Paged::new(rows, total, &q, DEFAULT_LIMIT)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PostDetail>, ApiError> {
    let post = sqlx::query_as::<_, PostRow>(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("post"))?;

    let comments = sqlx::query_as::<_, CommentRow>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM post_comments WHERE post_id = $1 ORDER BY created_at ASC"
    ))
    .bind(id)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(PostDetail { post, comments }))
}

pub async fn verify_post_password(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<PasswordRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let stored: Option<String> = sqlx::query_scalar("SELECT password FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("post"))?;

    let success = match (req.password.filter(|p| !p.is_empty()), stored) {
        (Some(password), Some(hash)) => verify_password_blocking(password, hash).await,
        _ => false,
    };
    Ok(Json(SuccessResponse { success }))
}

pub async fn create_post(
    State(state): State<AppState>,
    user: MaybeUser,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostRow>), ApiError> {
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

    let row = sqlx::query_as::<_, PostRow>(&format!(
        r#"
        INSERT INTO posts (author, password, title, content, image_data, user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(&author)
    .bind(&hashed)
    .bind(req.title.trim())
    .bind(&req.content)
    .bind(image)
    .bind(user.user_id())
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    tracing::info!(post_id = row.id, user_id = ?row.user_id, "post created");
    Ok((StatusCode::CREATED, Json(row)))
}

async fn load_post_owner(state: &AppState, id: i32) -> Result<OwnedResource, ApiError> {
    sqlx::query_as::<_, OwnedResource>("SELECT password, user_id FROM posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("post"))
}

async fn write_post(
    state: &AppState,
    id: i32,
    title: &str,
    content: &str,
) -> Result<PostRow, ApiError> {
    sqlx::query_as::<_, PostRow>(&format!(
        r#"
        UPDATE posts
        SET title = $1, content = $2, updated_at = now()
        WHERE id = $3
        RETURNING {POST_COLUMNS}
        "#
    ))
    .bind(title.trim())
    .bind(content)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("post"))
}

async fn remove_post(state: &AppState, id: i32) -> Result<(), ApiError> {
    let res = sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("post"));
    }
    Ok(())
}

pub async fn update_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> Result<Json<PostRow>, ApiError> {
    require_text("title", &req.title)?;
    require_text("content", &req.content)?;

    let owned = load_post_owner(&state, id).await?;
    let grant = ownership::resolve_blocking(owned, user.user_id(), req.password).await?;

    let row = write_post(&state, id, &req.title, &req.content).await?;
    tracing::info!(post_id = id, ?grant, "post updated");
    Ok(Json(row))
}

pub async fn delete_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i32>,
    body: Option<ApiJson<PasswordRequest>>,
) -> Result<StatusCode, ApiError> {
    let password = body.and_then(|ApiJson(b)| b.password);

    let owned = load_post_owner(&state, id).await?;
    let grant = ownership::resolve_blocking(owned, user.user_id(), password).await?;

    remove_post(&state, id).await?;
    tracing::info!(post_id = id, ?grant, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Comments
   ============================================================ */

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i32>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentRow>), ApiError> {
    require_text("author", &req.author)?;
    require_text("content", &req.content)?;
    if req.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
        .bind(post_id)
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;
    if !exists {
        return Err(ApiError::not_found("post"));
    }

    let hashed = hash_password_blocking(req.password)
        .await
        .map_err(ApiError::Internal)?;

    let row = sqlx::query_as::<_, CommentRow>(&format!(
        r#"
        INSERT INTO post_comments (post_id, author, password, content)
        VALUES ($1, $2, $3, $4)
        RETURNING {COMMENT_COLUMNS}
        "#
    ))
    .bind(post_id)
    .bind(req.author.trim())
    .bind(&hashed)
    .bind(&req.content)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn like_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i32>,
) -> Result<Json<LikesResponse>, ApiError> {
    let row = sqlx::query_as::<_, LikesResponse>(
        "UPDATE post_comments SET likes = likes + 1 WHERE id = $1 RETURNING likes",
    )
    .bind(comment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("comment"))?;

    Ok(Json(row))
}

pub async fn tag_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i32>,
    ApiJson(req): ApiJson<TagRequest>,
) -> Result<Json<TagsResponse>, ApiError> {
    let tag = non_blank(req.tag.as_deref())
        .ok_or_else(|| ApiError::validation("tag is required"))?
        .to_string();

    // Row lock: concurrent tags on one comment must not overwrite each other.
    let mut tx = state.db.begin().await.map_err(db_error)?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT tags FROM post_comments WHERE id = $1 FOR UPDATE")
            .bind(comment_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?
            .ok_or_else(|| ApiError::not_found("comment"))?;

    let tags = merge_tag(current.as_deref(), &tag);
    sqlx::query("UPDATE post_comments SET tags = $1 WHERE id = $2")
        .bind(&tags)
        .bind(comment_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;
    Ok(Json(TagsResponse { tags }))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i32>,
    body: Option<ApiJson<PasswordRequest>>,
) -> Result<StatusCode, ApiError> {
    let password = body.and_then(|ApiJson(b)| b.password);

    // Comments have no account owner; only the password counts.
    let owned = sqlx::query_as::<_, OwnedResource>(
        "SELECT password, NULL::INTEGER AS user_id FROM post_comments WHERE id = $1",
    )
    .bind(comment_id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("comment"))?;

    ownership::resolve_blocking(owned, None, password).await?;

    sqlx::query("DELETE FROM post_comments WHERE id = $1")
        .bind(comment_id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Admin
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct AdminPostRequest {
    pub title: String,
    pub content: String,
}

pub async fn admin_update_post(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<AdminPostRequest>,
) -> Result<Json<PostRow>, ApiError> {
    require_text("title", &req.title)?;
    require_text("content", &req.content)?;
    Ok(Json(write_post(&state, id, &req.title, &req.content).await?))
}

pub async fn admin_delete_post(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    remove_post(&state, id).await?;
    tracing::info!(post_id = id, "post removed by admin");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_delete_comment(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(comment_id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    sqlx::query("DELETE FROM post_comments WHERE id = $1")
        .bind(comment_id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::merge_tag;

    #[test]
    fn tags_form_a_set() {
        assert_eq!(merge_tag(None, "thanks"), "thanks");
        assert_eq!(merge_tag(Some(""), "thanks"), "thanks");
        assert_eq!(merge_tag(Some("thanks"), "helpful"), "thanks,helpful");
        assert_eq!(merge_tag(Some("thanks,helpful"), "thanks"), "thanks,helpful");
    }
}
