// src/routes/contact_routes.rs

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, db_error},
    middleware::auth_context::AdminContext,
    middleware::json_body::ApiJson,
    models::{AppState, ContactRow, non_blank},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/contact", post(create_contact))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/contacts", get(admin_list_contacts))
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactRequest {
    fn validate(&self) -> Result<(), ApiError> {
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("message", &self.message),
        ] {
            if non_blank(Some(value.as_str())).is_none() {
                return Err(ApiError::validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Inquiry form on the public site.
pub async fn create_contact(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ContactRequest>,
) -> Result<(StatusCode, Json<ContactRow>), ApiError> {
    req.validate()?;

    let row = sqlx::query_as::<_, ContactRow>(
        r#"
        INSERT INTO contacts (name, email, message)
        VALUES ($1, $2, $3)
        RETURNING id, name, email, message, created_at
        "#,
    )
    .bind(req.name.trim())
    .bind(req.email.trim())
    .bind(&req.message)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    tracing::info!(contact_id = row.id, "contact inquiry received");
    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn admin_list_contacts(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<ContactRow>>, ApiError> {
    let rows = sqlx::query_as::<_, ContactRow>(
        "SELECT id, name, email, message, created_at FROM contacts ORDER BY created_at DESC",
    )
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::ContactRequest;

    fn request(name: &str, email: &str, message: &str) -> ContactRequest {
        ContactRequest {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn every_field_is_required() {
        assert!(request("Jane", "jane@example.com", "Do you open on Sundays?").validate().is_ok());
        assert!(request("", "jane@example.com", "hi").validate().is_err());
        assert!(request("Jane", "  ", "hi").validate().is_err());
        assert!(request("Jane", "jane@example.com", "\n").validate().is_err());
    }
}
