// src/routes/admin_routes.rs

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::{
    error::{ApiError, db_error},
    middleware::auth_context::{AdminContext, ClientIp},
    middleware::json_body::ApiJson,
    models::{AdminLogRow, AppState},
    routes::auth_routes::TokenResponse,
    tokens::AdminClaims,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(admin_login))
        .route("/logs", get(list_logs))
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

fn same_secret(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

async fn record_admin_action(state: &AppState, action: &str, ip: Option<&str>) {
    // Best-effort: a failed audit insert never blocks the login.
    if let Err(e) = sqlx::query("INSERT INTO admin_logs (action, ip_address) VALUES ($1, $2)")
        .bind(action)
        .bind(ip)
        .execute(&state.db)
        .await
    {
        tracing::warn!(error = %e, action, "could not write admin log");
    }
}

pub async fn admin_login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(req): ApiJson<AdminLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if !same_secret(&req.password, &state.admin_password) {
        tracing::warn!(ip = ?ip, "admin login rejected");
        record_admin_action(&state, "login_failure", ip.as_deref()).await;
        return Err(ApiError::Unauthorized(
            "INVALID_CREDENTIALS",
            "Admin password is incorrect".into(),
        ));
    }

    let claims = AdminClaims::new(Duration::hours(state.admin_token_ttl_hours), Utc::now());
    let access_token = state.tokens.issue(&claims)?;

    tracing::info!(ip = ?ip, "admin logged in");
    record_admin_action(&state, "login_success", ip.as_deref()).await;

    Ok(Json(TokenResponse { access_token }))
}

pub async fn list_logs(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<AdminLogRow>>, ApiError> {
    let rows = sqlx::query_as::<_, AdminLogRow>(
        r#"
        SELECT id, action, ip_address, created_at
        FROM admin_logs
        ORDER BY created_at DESC
        LIMIT 100
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;

    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::same_secret;

    #[test]
    fn secret_comparison() {
        assert!(same_secret("hunter2", "hunter2"));
        assert!(!same_secret("hunter2", "hunter3"));
        assert!(!same_secret("hunter2", "hunter22"));
        assert!(!same_secret("", "x"));
    }
}
