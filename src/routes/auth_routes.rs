use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{hash_password_blocking, verify_password_blocking},
    error::{ApiError, db_error},
    middleware::auth_context::UserContext,
    middleware::json_body::ApiJson,
    models::{AppState, ConsultationRow, UserProfile, UserRow, non_blank},
    store::Reservation,
    tokens::UserClaims,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/me/consultations", get(my_consultations))
        .route("/me/reservations", get(my_reservations))
        .route("/me/posts", get(my_posts))
        .route("/me/update", put(update_me))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MyPostRow {
    pub id: i32,
    pub title: String,
    pub created_at: chrono::DateTime<Utc>,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let username = non_blank(Some(req.username.as_str()))
        .ok_or_else(|| ApiError::validation("username is required"))?
        .to_string();
    let email = non_blank(Some(req.email.as_str()))
        .ok_or_else(|| ApiError::validation("email is required"))?
        .to_string();
    if req.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let hashed = hash_password_blocking(req.password)
        .await
        .map_err(ApiError::Internal)?;

    let user: UserProfile = sqlx::query_as::<_, UserProfile>(
        r#"
        INSERT INTO users (username, email, password)
        VALUES ($1, $2, $3)
        RETURNING id, username, email
        "#,
    )
    .bind(&username)
    .bind(&email)
    .bind(&hashed)
    .fetch_one(&state.db)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(d) = &e {
            if d.is_unique_violation() {
                return ApiError::Conflict("EMAIL_TAKEN", "Email is already registered".into());
            }
        }
        db_error(e)
    })?;

    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user: UserRow = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, username, email, password
        FROM users
        WHERE email = $1
        "#,
    )
    .bind(req.email.trim())
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(ApiError::invalid_credentials)?;

    if !verify_password_blocking(req.password, user.password.clone()).await {
        return Err(ApiError::invalid_credentials());
    }

    let claims = UserClaims::new(
        user.id,
        &user.username,
        &user.email,
        Duration::hours(state.user_token_ttl_hours),
        Utc::now(),
    );
    let access_token = state.tokens.issue(&claims)?;

    Ok(Json(TokenResponse { access_token }))
}

pub async fn me(auth: UserContext) -> Json<UserProfile> {
    Json(UserProfile {
        id: auth.user_id,
        username: auth.username,
        email: auth.email,
    })
}

pub async fn my_consultations(
    State(state): State<AppState>,
    auth: UserContext,
) -> Result<Json<Vec<ConsultationRow>>, ApiError> {
    let rows = sqlx::query_as::<_, ConsultationRow>(
        r#"
        SELECT id, author, title, content, is_secret, is_answered,
               created_at, updated_at, image_data, user_id
        FROM consultations
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(rows))
}

pub async fn my_reservations(
    State(state): State<AppState>,
    auth: UserContext,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    Ok(Json(state.reservations.list_by_owner(auth.user_id).await?))
}

pub async fn my_posts(
    State(state): State<AppState>,
    auth: UserContext,
) -> Result<Json<Vec<MyPostRow>>, ApiError> {
    let rows = sqlx::query_as::<_, MyPostRow>(
        r#"
        SELECT id, title, created_at
        FROM posts
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub username: String,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: UserContext,
    ApiJson(req): ApiJson<UpdateMeRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let username = non_blank(Some(req.username.as_str()))
        .ok_or_else(|| ApiError::validation("username is required"))?
        .to_string();

    match req.new_password.filter(|p| !p.is_empty()) {
        Some(new_password) => {
            let current = req
                .current_password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    ApiError::validation("current password is required to set a new one")
                })?;

            let stored: String =
                sqlx::query_scalar("SELECT password FROM users WHERE id = $1")
                    .bind(auth.user_id)
                    .fetch_optional(&state.db)
                    .await
                    .map_err(db_error)?
                    .ok_or_else(ApiError::unauthenticated)?;

            if !verify_password_blocking(current, stored).await {
                return Err(ApiError::Forbidden(
                    "INVALID_CREDENTIAL",
                    "Current password is incorrect".into(),
                ));
            }

            let hashed = hash_password_blocking(new_password)
                .await
                .map_err(ApiError::Internal)?;
            sqlx::query("UPDATE users SET username = $1, password = $2 WHERE id = $3")
                .bind(&username)
                .bind(&hashed)
                .bind(auth.user_id)
                .execute(&state.db)
                .await
                .map_err(db_error)?;
        }
        None => {
            sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
                .bind(&username)
                .bind(auth.user_id)
                .execute(&state.db)
                .await
                .map_err(db_error)?;
        }
    }

    tracing::info!(user_id = auth.user_id, "profile updated");
    Ok(Json(MessageResponse {
        message: "profile updated".into(),
    }))
}
