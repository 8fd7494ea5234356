use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::reservation_access::ReservationAccess;
use crate::store::{BlockedSlotStore, ReservationStore};
use crate::tokens::TokenKeys;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub reservations: Arc<dyn ReservationStore>,
    pub blocked_slots: Arc<dyn BlockedSlotStore>,
    pub tokens: Arc<TokenKeys>,
    pub reservation_access: ReservationAccess,
    pub admin_password: Arc<str>,
    pub user_token_ttl_hours: i64,
    pub admin_token_ttl_hours: i64,
}

/* -------------------------
   Paging
--------------------------*/

/// Raw list query. Numbers stay strings so junk falls back to defaults
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub query: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1)
    }

    pub fn limit(&self, default: i64) -> i64 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .map(|l| l.min(100))
            .unwrap_or(default)
    }

    pub fn offset(&self, default_limit: i64) -> i64 {
        (self.page() - 1) * self.limit(default_limit)
    }

    /// Non-blank search term, wrapped for ILIKE.
    pub fn search_pattern(&self) -> Option<String> {
        non_blank(self.search.as_deref().or(self.query.as_deref())).map(|s| format!("%{s}%"))
    }
}

pub fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

pub fn total_pages(total_items: i64, limit: i64) -> i64 {
    if limit <= 0 {
        return 0;
    }
    (total_items + limit - 1) / limit
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total_items: i64,
}

impl<T> Paged<T> {
    pub fn new(items: Vec<T>, total_items: i64, q: &ListQuery, default_limit: i64) -> Self {
        Self {
            items,
            total_pages: total_pages(total_items, q.limit(default_limit)),
            current_page: q.page(),
            total_items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Body of the public "check my password" endpoints.
#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub password: Option<String>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, sqlx::FromRow)]
pub struct UserRow {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRow {
    pub id: i32,
    pub title: String,
    pub category: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub image_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct NoticeBrief {
    pub id: i32,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostSummaryRow {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PostRow {
    pub id: i32,
    pub author: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub image_data: Option<String>,
    pub user_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommentRow {
    pub id: i32,
    pub post_id: i32,
    pub author: String,
    pub content: String,
    pub likes: i32,
    pub tags: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationSummaryRow {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub is_secret: bool,
    pub is_answered: bool,
    pub user_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationRow {
    pub id: i32,
    pub author: String,
    pub title: String,
    pub content: String,
    pub is_secret: bool,
    pub is_answered: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub image_data: Option<String>,
    pub user_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRow {
    pub id: i32,
    pub consultation_id: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DoctorRow {
    pub id: i32,
    pub name: String,
    pub position: String,
    pub history: Option<String>,
    pub image_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AboutRow {
    pub id: i32,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub content: Option<String>,
    pub image_data: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ClinicPhotoRow {
    pub id: i32,
    pub caption: Option<String>,
    pub image_data: String,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CasePhotoRow {
    pub id: i32,
    pub title: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub before_image_data: Option<String>,
    pub after_image_data: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CaseBrief {
    pub id: i32,
    pub title: String,
    pub category: Option<String>,
    pub before_image_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FaqRow {
    pub id: i32,
    pub category: String,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub image_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRow {
    pub id: i32,
    pub patient_name: String,
    pub rating: i32,
    pub content: String,
    pub is_approved: bool,
    pub admin_reply: Option<String>,
    pub created_at: DateTime<Utc>,
    pub image_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBrief {
    pub patient_name: String,
    pub rating: i32,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogRow {
    pub id: i32,
    pub action: String,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactRow {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(page: Option<&str>, limit: Option<&str>) -> ListQuery {
        ListQuery {
            page: page.map(String::from),
            limit: limit.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn paging_defaults_and_junk() {
        assert_eq!(q(None, None).page(), 1);
        assert_eq!(q(Some("abc"), None).page(), 1);
        assert_eq!(q(Some("0"), None).page(), 1);
        assert_eq!(q(Some("3"), Some("10")).offset(10), 20);
        assert_eq!(q(None, Some("x")).limit(8), 8);
        assert_eq!(q(None, Some("1000")).limit(8), 100);
    }

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
    }

    #[test]
    fn blank_search_is_ignored() {
        let mut query = ListQuery::default();
        query.search = Some("   ".into());
        assert_eq!(query.search_pattern(), None);
        query.search = Some(" implant ".into());
        assert_eq!(query.search_pattern().as_deref(), Some("%implant%"));
    }
}
