use crate::models::AppState;
use axum::{Router, routing::get};

pub mod admin_routes;
pub mod auth_routes;
pub mod consultation_routes;
pub mod contact_routes;
pub mod content_routes;
pub mod home_routes;
pub mod notice_routes;
pub mod post_routes;
pub mod reservation_routes;
pub mod review_routes;

fn admin_router() -> Router<AppState> {
    Router::new()
        .merge(admin_routes::router())
        .merge(reservation_routes::admin_router())
        .merge(notice_routes::admin_router())
        .merge(post_routes::admin_router())
        .merge(consultation_routes::admin_router())
        .merge(content_routes::admin_router())
        .merge(review_routes::admin_router())
        .merge(contact_routes::admin_router())
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(reservation_routes::router())
        .merge(notice_routes::router())
        .merge(post_routes::router())
        .merge(consultation_routes::router())
        .merge(content_routes::router())
        .merge(review_routes::router())
        .merge(contact_routes::router())
        .merge(home_routes::router())
        .nest("/auth", auth_routes::router())
        .nest("/admin", admin_router());

    Router::new()
        .route("/", get(home_routes::liveness))
        .nest("/api", api)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use chrono::{Duration, Utc};
    use serde_json::{Value, json};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::router;
    use crate::models::AppState;
    use crate::reservation_access::ReservationAccess;
    use crate::store::memory::{MemoryBlockedSlotStore, MemoryReservationStore};
    use crate::tokens::{AdminClaims, ReservationClaims, TokenKeys, UserClaims};

    struct Harness {
        app: axum::Router,
        keys: Arc<TokenKeys>,
        blocked: Arc<MemoryBlockedSlotStore>,
    }

    impl Harness {
        fn new() -> Self {
            // Reservation and schedule routes never touch the pool.
            let pool = PgPoolOptions::new()
                .connect_lazy("postgres://localhost/unused")
                .unwrap();
            let keys = Arc::new(TokenKeys::from_secret("test-secret"));
            let blocked = Arc::new(MemoryBlockedSlotStore::default());

            let state = AppState {
                db: pool,
                reservations: Arc::new(MemoryReservationStore::default()),
                blocked_slots: blocked.clone(),
                tokens: keys.clone(),
                reservation_access: ReservationAccess::new(keys.clone(), Duration::minutes(60)),
                admin_password: Arc::from("admin-pw"),
                user_token_ttl_hours: 24,
                admin_token_ttl_hours: 12,
            };

            Harness {
                app: router(state),
                keys,
                blocked,
            }
        }

        fn admin_token(&self) -> String {
            self.keys
                .issue(&AdminClaims::new(Duration::hours(1), Utc::now()))
                .unwrap()
        }

        fn user_token(&self) -> String {
            self.keys
                .issue(&UserClaims::new(
                    7,
                    "jane",
                    "jane@example.com",
                    Duration::hours(1),
                    Utc::now(),
                ))
                .unwrap()
        }

        async fn send(
            &self,
            method: Method,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut req = Request::builder().method(method).uri(uri);
            if let Some(t) = token {
                req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
            }
            let req = match body {
                Some(b) => req
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(b.to_string()))
                    .unwrap(),
                None => req.body(Body::empty()).unwrap(),
            };

            let res = self.app.clone().oneshot(req).await.unwrap();
            let status = res.status();
            let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, value)
        }

        async fn book(&self, name: &str, phone: &str, date: &str, time: &str) -> i64 {
            let (status, body) = self
                .send(
                    Method::POST,
                    "/api/reservations",
                    None,
                    Some(json!({
                        "patientName": name,
                        "phoneNumber": phone,
                        "desiredDate": date,
                        "desiredTime": time,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["id"].as_i64().unwrap()
        }

        async fn access_token(&self, name: &str, phone: &str) -> (StatusCode, Value) {
            self.send(
                Method::POST,
                "/api/reservations/verify",
                None,
                Some(json!({ "patientName": name, "phoneNumber": phone })),
            )
            .await
        }
    }

    #[tokio::test]
    async fn liveness_banner() {
        let h = Harness::new();
        let res = h
            .app
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn book_verify_reschedule_and_view_schedule() {
        let h = Harness::new();
        let id = h.book("Jane Doe", "555-0100", "2025-07-01", "09:00").await;

        let (status, grant) = h.access_token("Jane Doe", "555-0100").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(grant["reservationId"].as_i64(), Some(id));
        let token = grant["accessToken"].as_str().unwrap().to_string();

        let (status, body) = h
            .send(Method::GET, &format!("/api/reservations/{id}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["desiredDate"], "2025-07-01");

        let (status, body) = h
            .send(
                Method::PUT,
                &format!("/api/reservations/{id}"),
                Some(&token),
                Some(json!({ "desiredDate": "2025-07-02", "desiredTime": "09:00" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["desiredDate"], "2025-07-02");
        assert_eq!(body["status"], "pending");

        let (status, body) = h
            .send(Method::GET, "/api/schedule?year=2025&month=7", None, None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "2025-07-02": { "09:00": { "pending": 1, "confirmed": 0, "blocked": false } }
            })
        );
    }

    #[tokio::test]
    async fn unmatched_contact_is_not_found() {
        let h = Harness::new();
        h.book("Jane Doe", "555-0100", "2025-07-01", "09:00").await;

        let (status, _) = h.access_token("jane doe", "555-0100").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = h.access_token("Jane Doe", "555-0199").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn token_only_unlocks_its_own_reservation() {
        let h = Harness::new();
        let first = h.book("Jane Doe", "555-0100", "2025-07-01", "09:00").await;
        let second = h.book("John Roe", "555-0200", "2025-07-01", "10:00").await;

        let (_, grant) = h.access_token("Jane Doe", "555-0100").await;
        let token = grant["accessToken"].as_str().unwrap().to_string();

        let (status, _) = h
            .send(Method::GET, &format!("/api/reservations/{second}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = h
            .send(Method::DELETE, &format!("/api/reservations/{second}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = h
            .send(Method::DELETE, &format!("/api/reservations/{first}"), Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_expired_and_foreign_tokens() {
        let h = Harness::new();
        let id = h.book("Jane Doe", "555-0100", "2025-07-01", "09:00").await;
        let uri = format!("/api/reservations/{id}");

        let (status, body) = h.send(Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHENTICATED");

        let expired = h
            .keys
            .issue(&ReservationClaims::new(
                id as i32,
                "Jane Doe",
                Duration::minutes(60),
                Utc::now() - Duration::hours(2),
            ))
            .unwrap();
        let (status, _) = h.send(Method::GET, &uri, Some(&expired), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = h.send(Method::GET, &uri, Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        // A member login token is not a reservation token.
        let user = h.user_token();
        let (status, _) = h.send(Method::GET, &uri, Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn schedule_rejects_bad_arguments() {
        let h = Harness::new();
        for uri in [
            "/api/schedule?year=abc&month=7",
            "/api/schedule?year=2025",
            "/api/schedule?year=2025&month=13",
        ] {
            let (status, body) = h.send(Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR", "{uri}");
        }
    }

    #[tokio::test]
    async fn admin_routes_need_an_admin_token() {
        let h = Harness::new();

        let (status, _) = h.send(Method::GET, "/api/admin/reservations", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let user = h.user_token();
        let (status, _) = h
            .send(Method::GET, "/api/admin/reservations", Some(&user), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let admin = h.admin_token();
        let (status, body) = h
            .send(Method::GET, "/api/admin/reservations", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn blocking_a_slot_is_idempotent_and_shows_in_schedule() {
        let h = Harness::new();
        let admin = h.admin_token();
        let slot = json!({ "slotDate": "2025-07-03", "slotTime": "14:00" });

        for _ in 0..2 {
            let (status, _) = h
                .send(Method::POST, "/api/admin/blocked-slots", Some(&admin), Some(slot.clone()))
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        assert_eq!(h.blocked.len(), 1);

        let (_, body) = h
            .send(Method::GET, "/api/schedule?year=2025&month=7", None, None)
            .await;
        assert_eq!(
            body["2025-07-03"]["14:00"],
            json!({ "pending": 0, "confirmed": 0, "blocked": true })
        );

        let (status, _) = h
            .send(Method::DELETE, "/api/admin/blocked-slots", Some(&admin), Some(slot))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(h.blocked.len(), 0);
    }

    #[tokio::test]
    async fn patient_change_resets_confirmed_reservation() {
        let h = Harness::new();
        let admin = h.admin_token();
        let id = h.book("Jane Doe", "555-0100", "2025-07-01", "09:00").await;

        let (status, body) = h
            .send(
                Method::PUT,
                &format!("/api/admin/reservations/{id}/status"),
                Some(&admin),
                Some(json!({ "status": "confirmed" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "confirmed");

        let (status, _) = h
            .send(
                Method::PUT,
                &format!("/api/admin/reservations/{id}/status"),
                Some(&admin),
                Some(json!({ "status": "done" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, grant) = h.access_token("Jane Doe", "555-0100").await;
        let token = grant["accessToken"].as_str().unwrap().to_string();
        let (status, body) = h
            .send(
                Method::PUT,
                &format!("/api/reservations/{id}"),
                Some(&token),
                Some(json!({ "desiredDate": "2025-07-01", "desiredTime": "11:00", "notes": "later please" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["notes"], "later please");
    }

    #[tokio::test]
    async fn signed_in_member_books_under_account_name() {
        let h = Harness::new();
        let user = h.user_token();

        let (status, body) = h
            .send(
                Method::POST,
                "/api/reservations",
                Some(&user),
                Some(json!({
                    "patientName": "ignored",
                    "phoneNumber": "555-0300",
                    "desiredDate": "2025-08-10",
                    "desiredTime": "15:00",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["patientName"], "jane");
        assert_eq!(body["userId"], 7);
    }

    #[tokio::test]
    async fn booking_validates_input() {
        let h = Harness::new();
        let (status, _) = h
            .send(
                Method::POST,
                "/api/reservations",
                None,
                Some(json!({
                    "patientName": "  ",
                    "phoneNumber": "555-0100",
                    "desiredDate": "2025-07-01",
                    "desiredTime": "09:00",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h
            .send(
                Method::POST,
                "/api/reservations",
                None,
                Some(json!({
                    "patientName": "Jane Doe",
                    "phoneNumber": "555-0100",
                    "desiredDate": "07/01/2025",
                    "desiredTime": "09:00",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_body_fields_use_the_error_envelope() {
        let h = Harness::new();
        let (status, body) = h
            .send(
                Method::POST,
                "/api/reservations",
                None,
                Some(json!({
                    "patientName": "Jane",
                    "phoneNumber": "1",
                    "desiredDate": "2025-07-01",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = h
            .send(
                Method::POST,
                "/api/reservations/verify",
                None,
                Some(json!({ "patientName": "Jane" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/reservations")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = h.app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn contact_form_rejects_missing_or_blank_fields() {
        let h = Harness::new();
        let (status, body) = h
            .send(
                Method::POST,
                "/api/contact",
                None,
                Some(json!({ "name": "Jane", "email": "jane@example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = h
            .send(
                Method::POST,
                "/api/contact",
                None,
                Some(json!({ "name": "Jane", "email": "jane@example.com", "message": " " })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "message is required");
    }

    #[tokio::test]
    async fn me_reports_the_signed_in_account() {
        let h = Harness::new();
        let (status, _) = h.send(Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let token = h.user_token();
        let (status, body) = h
            .send(Method::GET, "/api/auth/me", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "id": 7, "username": "jane", "email": "jane@example.com" })
        );
    }
}
