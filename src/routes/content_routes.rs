// src/routes/content_routes.rs
//
// Clinic showcase content: doctors, the about page, clinic photos,
// treatment cases and FAQs. Reads are public, writes are admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{Postgres, QueryBuilder};

use crate::{
    error::{ApiError, db_error},
    images::{replace_or_keep, validate_image_data},
    middleware::auth_context::AdminContext,
    middleware::json_body::ApiJson,
    models::{
        AboutRow, AppState, CasePhotoRow, ClinicPhotoRow, DoctorRow, FaqRow, ListQuery, Paged,
        non_blank, total_pages,
    },
};

const PHOTO_PAGE_LIMIT: i64 = 8;
const CASE_PAGE_LIMIT: i64 = 9;

const DOCTOR_COLUMNS: &str = "id, name, position, history, image_data, created_at, updated_at";
const CASE_COLUMNS: &str =
    "id, title, category, description, before_image_data, after_image_data, created_at";
const FAQ_COLUMNS: &str = "id, category, question, answer, created_at, image_data";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/doctors", get(list_doctors))
        .route("/about", get(get_about))
        .route("/clinic-photos", get(list_clinic_photos))
        .route("/cases", get(list_cases))
        .route("/faqs", get(list_faqs))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/doctors", axum::routing::post(create_doctor))
        .route("/doctors/{id}", put(update_doctor).delete(delete_doctor))
        .route("/about", put(update_about))
        .route(
            "/clinic-photos",
            get(admin_list_clinic_photos).post(create_clinic_photo),
        )
        .route(
            "/clinic-photos/{id}",
            put(update_clinic_photo_caption).delete(delete_clinic_photo),
        )
        .route("/cases", axum::routing::post(create_case))
        .route("/cases/{id}", put(update_case).delete(delete_case))
        .route("/faqs", axum::routing::post(create_faq))
        .route("/faqs/{id}", put(update_faq).delete(delete_faq))
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    non_blank(Some(value))
        .map(|_| ())
        .ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

async fn delete_by_id(state: &AppState, table: &str, id: i32, what: &str) -> Result<(), ApiError> {
    let res = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1"))
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(db_error)?;
    if res.rows_affected() == 0 {
        return Err(ApiError::not_found(what));
    }
    Ok(())
}

/* ============================================================
   Doctors
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRequest {
    pub name: String,
    pub position: String,
    pub history: Option<String>,
    pub image_data: Option<String>,
    pub existing_image_data: Option<String>,
}

pub async fn list_doctors(State(state): State<AppState>) -> Result<Json<Vec<DoctorRow>>, ApiError> {
    let rows = sqlx::query_as::<_, DoctorRow>(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctors ORDER BY id ASC"
    ))
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn create_doctor(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<DoctorRequest>,
) -> Result<(StatusCode, Json<DoctorRow>), ApiError> {
    require_text("name", &req.name)?;
    require_text("position", &req.position)?;
    let image = validate_image_data(req.image_data)?;

    let row = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        INSERT INTO doctors (name, position, history, image_data)
        VALUES ($1, $2, $3, $4)
        RETURNING {DOCTOR_COLUMNS}
        "#
    ))
    .bind(req.name.trim())
    .bind(req.position.trim())
    .bind(req.history.as_deref())
    .bind(image)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<DoctorRequest>,
) -> Result<Json<DoctorRow>, ApiError> {
    require_text("name", &req.name)?;
    require_text("position", &req.position)?;
    let image = replace_or_keep(req.image_data, req.existing_image_data)?;

    let row = sqlx::query_as::<_, DoctorRow>(&format!(
        r#"
        UPDATE doctors
        SET name = $1, position = $2, history = $3, image_data = $4, updated_at = now()
        WHERE id = $5
        RETURNING {DOCTOR_COLUMNS}
        "#
    ))
    .bind(req.name.trim())
    .bind(req.position.trim())
    .bind(req.history.as_deref())
    .bind(image)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("doctor"))?;

    Ok(Json(row))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    delete_by_id(&state, "doctors", id, "doctor").await?;
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   About page (single row, id = 1)
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutRequest {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub image_data: Option<String>,
}

pub async fn get_about(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let row = sqlx::query_as::<_, AboutRow>(
        "SELECT id, title, subtitle, content, image_data, updated_at FROM about_content WHERE id = 1",
    )
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?;

    // An unseeded table reads as an empty object, not a 404.
    let body = match row {
        Some(r) => serde_json::to_value(r).map_err(|e| ApiError::Internal(e.to_string()))?,
        None => serde_json::json!({}),
    };
    Ok(Json(body))
}

pub async fn update_about(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<AboutRequest>,
) -> Result<Json<AboutRow>, ApiError> {
    let image = validate_image_data(req.image_data)?;

    let row = sqlx::query_as::<_, AboutRow>(
        r#"
        INSERT INTO about_content (id, title, subtitle, content, image_data, updated_at)
        VALUES (1, $1, $2, $3, $4, now())
        ON CONFLICT (id) DO UPDATE
        SET title = EXCLUDED.title,
            subtitle = EXCLUDED.subtitle,
            content = EXCLUDED.content,
            image_data = EXCLUDED.image_data,
            updated_at = EXCLUDED.updated_at
        RETURNING id, title, subtitle, content, image_data, updated_at
        "#,
    )
    .bind(req.title.as_deref())
    .bind(req.subtitle.as_deref())
    .bind(req.content.as_deref())
    .bind(image)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    tracing::info!("about page updated");
    Ok(Json(row))
}

/* ============================================================
   Clinic photos
   ============================================================ */

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoPage {
    pub photos: Vec<ClinicPhotoRow>,
    pub total_pages: i64,
    pub current_page: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicPhotoRequest {
    pub caption: Option<String>,
    pub image_data: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CaptionRequest {
    pub caption: Option<String>,
}

pub async fn list_clinic_photos(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<PhotoPage>, ApiError> {
    let limit = q.limit(PHOTO_PAGE_LIMIT);

    let photos_fut = sqlx::query_as::<_, ClinicPhotoRow>(
        r#"
        SELECT id, caption, image_data, display_order, created_at
        FROM clinic_photos
        ORDER BY display_order ASC, id ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(q.offset(PHOTO_PAGE_LIMIT))
    .fetch_all(&state.db);
    let count_fut = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clinic_photos")
        .fetch_one(&state.db);

    let (photos, total) = tokio::try_join!(photos_fut, count_fut).map_err(db_error)?;

    Ok(Json(PhotoPage {
        photos,
        total_pages: total_pages(total, limit),
        current_page: q.page(),
    }))
}

pub async fn admin_list_clinic_photos(
    State(state): State<AppState>,
    _admin: AdminContext,
) -> Result<Json<Vec<ClinicPhotoRow>>, ApiError> {
    let rows = sqlx::query_as::<_, ClinicPhotoRow>(
        r#"
        SELECT id, caption, image_data, display_order, created_at
        FROM clinic_photos
        ORDER BY display_order ASC, id ASC
        "#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn create_clinic_photo(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<ClinicPhotoRequest>,
) -> Result<(StatusCode, Json<ClinicPhotoRow>), ApiError> {
    let image = validate_image_data(req.image_data)?
        .ok_or_else(|| ApiError::validation("an image is required"))?;

    let row = sqlx::query_as::<_, ClinicPhotoRow>(
        r#"
        INSERT INTO clinic_photos (caption, image_data)
        VALUES ($1, $2)
        RETURNING id, caption, image_data, display_order, created_at
        "#,
    )
    .bind(req.caption.as_deref())
    .bind(&image)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_clinic_photo_caption(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<CaptionRequest>,
) -> Result<Json<ClinicPhotoRow>, ApiError> {
    let row = sqlx::query_as::<_, ClinicPhotoRow>(
        r#"
        UPDATE clinic_photos
        SET caption = $1
        WHERE id = $2
        RETURNING id, caption, image_data, display_order, created_at
        "#,
    )
    .bind(req.caption.as_deref())
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("photo"))?;

    Ok(Json(row))
}

pub async fn delete_clinic_photo(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    delete_by_id(&state, "clinic_photos", id, "photo").await?;
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   Treatment cases
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRequest {
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub before_image_data: Option<String>,
    pub after_image_data: Option<String>,
    pub existing_before_image: Option<String>,
    pub existing_after_image: Option<String>,
}

fn push_category(qb: &mut QueryBuilder<'_, Postgres>, category: Option<&str>) {
    if let Some(c) = category {
        qb.push(" WHERE category = ");
        qb.push_bind(c.to_string());
    }
}

pub async fn list_cases(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Paged<CasePhotoRow>>, ApiError> {
    let category = non_blank(q.category.as_deref());

    let mut count_qb: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM case_photos");
    push_category(&mut count_qb, category);
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(db_error)?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {CASE_COLUMNS} FROM case_photos"));
    push_category(&mut qb, category);
    qb.push(" ORDER BY created_at DESC LIMIT ");
    qb.push_bind(q.limit(CASE_PAGE_LIMIT));
    qb.push(" OFFSET ");
    qb.push_bind(q.offset(CASE_PAGE_LIMIT));

    let rows = qb
        .build_query_as::<CasePhotoRow>()
        .fetch_all(&state.db)
        .await
        .map_err(db_error)?;

    Ok(Json(Paged::new(rows, total, &q, CASE_PAGE_LIMIT)))
}

pub async fn create_case(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<CaseRequest>,
) -> Result<(StatusCode, Json<CasePhotoRow>), ApiError> {
    require_text("title", &req.title)?;
    let before = validate_image_data(req.before_image_data)?;
    let after = validate_image_data(req.after_image_data)?;

    let row = sqlx::query_as::<_, CasePhotoRow>(&format!(
        r#"
        INSERT INTO case_photos (title, category, description, before_image_data, after_image_data)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {CASE_COLUMNS}
        "#
    ))
    .bind(req.title.trim())
    .bind(req.category.as_deref())
    .bind(req.description.as_deref())
    .bind(before)
    .bind(after)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_case(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<CaseRequest>,
) -> Result<Json<CasePhotoRow>, ApiError> {
    require_text("title", &req.title)?;
    let before = replace_or_keep(req.before_image_data, req.existing_before_image)?;
    let after = replace_or_keep(req.after_image_data, req.existing_after_image)?;

    let row = sqlx::query_as::<_, CasePhotoRow>(&format!(
        r#"
        UPDATE case_photos
        SET title = $1, category = $2, description = $3,
            before_image_data = $4, after_image_data = $5
        WHERE id = $6
        RETURNING {CASE_COLUMNS}
        "#
    ))
    .bind(req.title.trim())
    .bind(req.category.as_deref())
    .bind(req.description.as_deref())
    .bind(before)
    .bind(after)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("case"))?;

    Ok(Json(row))
}

pub async fn delete_case(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    delete_by_id(&state, "case_photos", id, "case").await?;
    Ok(StatusCode::NO_CONTENT)
}

/* ============================================================
   FAQs
   ============================================================ */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqRequest {
    pub category: String,
    pub question: String,
    pub answer: String,
    pub image_data: Option<String>,
    pub existing_image_data: Option<String>,
}

impl FaqRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require_text("category", &self.category)?;
        require_text("question", &self.question)?;
        require_text("answer", &self.answer)
    }
}

pub async fn list_faqs(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<Vec<FaqRow>>, ApiError> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {FAQ_COLUMNS} FROM faqs"));
    if let Some(p) = q.search_pattern() {
        qb.push(" WHERE (question ILIKE ");
        qb.push_bind(p.clone());
        qb.push(" OR answer ILIKE ");
        qb.push_bind(p);
        qb.push(")");
    }
    qb.push(" ORDER BY category, id ASC");

    let rows = qb
        .build_query_as::<FaqRow>()
        .fetch_all(&state.db)
        .await
        .map_err(db_error)?;
    Ok(Json(rows))
}

pub async fn create_faq(
    State(state): State<AppState>,
    _admin: AdminContext,
    ApiJson(req): ApiJson<FaqRequest>,
) -> Result<(StatusCode, Json<FaqRow>), ApiError> {
    req.validate()?;
    let image = validate_image_data(req.image_data)?;

    let row = sqlx::query_as::<_, FaqRow>(&format!(
        r#"
        INSERT INTO faqs (category, question, answer, image_data)
        VALUES ($1, $2, $3, $4)
        RETURNING {FAQ_COLUMNS}
        "#
    ))
    .bind(req.category.trim())
    .bind(&req.question)
    .bind(&req.answer)
    .bind(image)
    .fetch_one(&state.db)
    .await
    .map_err(db_error)?;

    Ok((StatusCode::CREATED, Json(row)))
}

pub async fn update_faq(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
    ApiJson(req): ApiJson<FaqRequest>,
) -> Result<Json<FaqRow>, ApiError> {
    req.validate()?;
    let image = replace_or_keep(req.image_data, req.existing_image_data)?;

    let row = sqlx::query_as::<_, FaqRow>(&format!(
        r#"
        UPDATE faqs
        SET category = $1, question = $2, answer = $3, image_data = $4
        WHERE id = $5
        RETURNING {FAQ_COLUMNS}
        "#
    ))
    .bind(req.category.trim())
    .bind(&req.question)
    .bind(&req.answer)
    .bind(image)
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(db_error)?
    .ok_or_else(|| ApiError::not_found("FAQ"))?;

    Ok(Json(row))
}

pub async fn delete_faq(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    delete_by_id(&state, "faqs", id, "FAQ").await?;
    Ok(StatusCode::NO_CONTENT)
}
