// src/routes/reservation_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    error::ApiError,
    middleware::auth_context::{AdminContext, MaybeUser, ReservationBearer},
    middleware::json_body::ApiJson,
    models::{AppState, non_blank},
    reservation_access::AccessGrant,
    schedule::{self, ScheduleSummary},
    store::{NewReservation, Reservation, ReservationChanges, ReservationStatus},
};

/* ============================================================
   Routers
   ============================================================ */

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/verify", post(verify_reservation))
        .route(
            "/reservations/{id}",
            get(get_own_reservation)
                .put(update_own_reservation)
                .delete(cancel_own_reservation),
        )
        .route("/schedule", get(get_schedule))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/reservations", get(list_reservations))
        .route("/reservations/{id}/status", put(update_status))
        .route("/reservations/{id}", axum::routing::delete(delete_reservation))
        .route(
            "/blocked-slots",
            post(block_slot).delete(unblock_slot),
        )
}

/* ============================================================
   Request DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    pub patient_name: Option<String>,
    pub phone_number: String,
    pub desired_date: String,
    pub desired_time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReservationRequest {
    pub patient_name: String,
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReservationRequest {
    pub desired_date: String,
    pub desired_time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub slot_date: String,
    pub slot_time: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleQuery {
    pub year: Option<String>,
    pub month: Option<String>,
}

/* ============================================================
   Validation helpers
   ============================================================ */

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("{field} must be YYYY-MM-DD")))
}

fn required(field: &str, value: &str) -> Result<String, ApiError> {
    non_blank(Some(value))
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

/* ============================================================
   Public: create / verify / self-service
   ============================================================ */

pub async fn create_reservation(
    State(state): State<AppState>,
    user: MaybeUser,
    ApiJson(req): ApiJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    // A signed-in member books under their account name.
    let patient_name = match &user.0 {
        Some(u) => u.username.clone(),
        None => required("patientName", req.patient_name.as_deref().unwrap_or(""))?,
    };

    let new = NewReservation {
        patient_name,
        phone_number: required("phoneNumber", &req.phone_number)?,
        desired_date: parse_date("desiredDate", &req.desired_date)?,
        desired_time: required("desiredTime", &req.desired_time)?,
        notes: req.notes,
        user_id: user.user_id(),
    };

    let reservation = state.reservations.create(new).await?;
    tracing::info!(
        reservation_id = reservation.id,
        date = %reservation.desired_date,
        time = %reservation.desired_time,
        "reservation created"
    );
    Ok((StatusCode::CREATED, Json(reservation)))
}

pub async fn verify_reservation(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyReservationRequest>,
) -> Result<Json<AccessGrant>, ApiError> {
    let grant = state
        .reservation_access
        .verify(
            state.reservations.as_ref(),
            &req.patient_name,
            &req.phone_number,
        )
        .await?;
    Ok(Json(grant))
}

pub async fn get_own_reservation(
    State(state): State<AppState>,
    ReservationBearer(token): ReservationBearer,
    Path(id): Path<i32>,
) -> Result<Json<Reservation>, ApiError> {
    state.reservation_access.authorize(&token, id)?;
    Ok(Json(state.reservations.get(id).await?))
}

pub async fn update_own_reservation(
    State(state): State<AppState>,
    ReservationBearer(token): ReservationBearer,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<UpdateReservationRequest>,
) -> Result<Json<Reservation>, ApiError> {
    state.reservation_access.authorize(&token, id)?;

    let changes = ReservationChanges {
        desired_date: parse_date("desiredDate", &req.desired_date)?,
        desired_time: required("desiredTime", &req.desired_time)?,
        notes: req.notes,
    };
    let reservation = state.reservations.update_details(id, changes).await?;
    tracing::info!(reservation_id = id, "reservation changed by patient");
    Ok(Json(reservation))
}

pub async fn cancel_own_reservation(
    State(state): State<AppState>,
    ReservationBearer(token): ReservationBearer,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.reservation_access.authorize(&token, id)?;
    state.reservations.delete(id).await?;
    tracing::info!(reservation_id = id, "reservation cancelled by patient");
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Public: GET /schedule
   ============================================================ */

pub async fn get_schedule(
    State(state): State<AppState>,
    Query(q): Query<ScheduleQuery>,
) -> Result<Json<ScheduleSummary>, ApiError> {
    let (year, month) = schedule::parse_year_month(q.year.as_deref(), q.month.as_deref())?;
    let summary = schedule::get_schedule(
        state.reservations.as_ref(),
        state.blocked_slots.as_ref(),
        year,
        month,
    )
    .await?;
    Ok(Json(summary))
}

/* ============================================================
   Admin
   ============================================================ */

pub async fn list_reservations(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    Ok(Json(state.reservations.list_all().await?))
}

pub async fn update_status(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<Json<Reservation>, ApiError> {
    let status: ReservationStatus = req
        .status
        .trim()
        .parse()
        .map_err(|e: crate::store::UnknownStatus| ApiError::validation(e.to_string()))?;

    let reservation = state.reservations.update_status(id, status).await?;
    tracing::info!(reservation_id = id, %status, "reservation status changed");
    Ok(Json(reservation))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state.reservations.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn block_slot(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<SlotRequest>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date("slotDate", &req.slot_date)?;
    let time = required("slotTime", &req.slot_time)?;
    state.blocked_slots.block(date, &time).await?;
    tracing::info!(%date, %time, "slot blocked");
    Ok(StatusCode::CREATED)
}

pub async fn unblock_slot(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<SlotRequest>,
) -> Result<StatusCode, ApiError> {
    let date = parse_date("slotDate", &req.slot_date)?;
    let time = required("slotTime", &req.slot_time)?;
    state.blocked_slots.unblock(date, &time).await?;
    tracing::info!(%date, %time, "slot unblocked");
    Ok(StatusCode::NO_CONTENT)
}
