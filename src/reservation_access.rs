//! Account-less access to a single reservation.
//!
//! A patient proves who they are with the exact name and phone number on
//! the booking and receives a short-lived token bound to that one
//! reservation id.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::store::{ReservationStore, StoreError};
use crate::tokens::{ReservationClaims, TokenError, TokenKeys};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("no reservation matches the given name and phone number")]
    NoMatch,
    #[error("access token is missing or expired")]
    Unauthenticated,
    #[error("access token does not grant this reservation")]
    Forbidden,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(TokenError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub access_token: String,
    pub reservation_id: i32,
}

#[derive(Clone)]
pub struct ReservationAccess {
    keys: Arc<TokenKeys>,
    ttl: Duration,
}

impl ReservationAccess {
    pub fn new(keys: Arc<TokenKeys>, ttl: Duration) -> Self {
        Self { keys, ttl }
    }

    /// Matches name and phone exactly (case-sensitive). When several
    /// reservations match, the most recently created one wins.
    pub async fn verify(
        &self,
        store: &dyn ReservationStore,
        patient_name: &str,
        phone_number: &str,
    ) -> Result<AccessGrant, AccessError> {
        let reservation = store
            .find_latest_by_contact(patient_name, phone_number)
            .await?
            .ok_or(AccessError::NoMatch)?;

        let claims = ReservationClaims::new(reservation.id, patient_name, self.ttl, Utc::now());
        let access_token = self.keys.issue(&claims).map_err(AccessError::Token)?;

        tracing::info!(reservation_id = reservation.id, "reservation access granted");
        Ok(AccessGrant {
            access_token,
            reservation_id: reservation.id,
        })
    }

    /// Decodes `token` and checks it was issued for `requested_id`.
    pub fn authorize(
        &self,
        token: &str,
        requested_id: i32,
    ) -> Result<ReservationClaims, AccessError> {
        let claims = self
            .keys
            .verify::<ReservationClaims>(token)
            .map_err(|e| match e {
                TokenError::Expired => AccessError::Unauthenticated,
                TokenError::Invalid => AccessError::Forbidden,
                other => AccessError::Token(other),
            })?;
        authorize_claim(&claims, requested_id)?;
        Ok(claims)
    }
}

/// A claim only ever covers the reservation it was issued for.
pub fn authorize_claim(claims: &ReservationClaims, requested_id: i32) -> Result<(), AccessError> {
    if claims.reservation_id == requested_id {
        Ok(())
    } else {
        Err(AccessError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryReservationStore;
    use crate::store::NewReservation;
    use chrono::NaiveDate;

    fn access() -> ReservationAccess {
        ReservationAccess::new(Arc::new(TokenKeys::from_secret("secret")), Duration::hours(1))
    }

    async fn book(store: &MemoryReservationStore, name: &str, phone: &str) -> i32 {
        store
            .create(NewReservation {
                patient_name: name.into(),
                phone_number: phone.into(),
                desired_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                desired_time: "09:00".into(),
                notes: None,
                user_id: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn verify_issues_token_for_matching_reservation() {
        let store = MemoryReservationStore::default();
        let id = book(&store, "Jane Doe", "555-0100").await;
        let access = access();

        let grant = access.verify(&store, "Jane Doe", "555-0100").await.unwrap();
        assert_eq!(grant.reservation_id, id);

        let claims = access.authorize(&grant.access_token, id).unwrap();
        assert_eq!(claims.reservation_id, id);
        assert_eq!(claims.name, "Jane Doe");
    }

    #[tokio::test]
    async fn verify_is_case_sensitive() {
        let store = MemoryReservationStore::default();
        book(&store, "Jane Doe", "555-0100").await;
        let err = access().verify(&store, "jane doe", "555-0100").await.unwrap_err();
        assert!(matches!(err, AccessError::NoMatch));
    }

    #[tokio::test]
    async fn verify_picks_most_recent_reservation() {
        let store = MemoryReservationStore::default();
        book(&store, "Jane Doe", "555-0100").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newest = book(&store, "Jane Doe", "555-0100").await;

        let grant = access().verify(&store, "Jane Doe", "555-0100").await.unwrap();
        assert_eq!(grant.reservation_id, newest);
    }

    #[test]
    fn token_for_one_reservation_is_forbidden_on_another() {
        let access = access();
        let claims = ReservationClaims::new(1, "Jane Doe", Duration::hours(1), Utc::now());
        let token = access.keys.issue(&claims).unwrap();
        assert!(matches!(access.authorize(&token, 2), Err(AccessError::Forbidden)));
        assert!(access.authorize(&token, 1).is_ok());
    }

    #[test]
    fn expired_token_is_unauthenticated() {
        let access = access();
        let issued = Utc::now() - Duration::minutes(61);
        let claims = ReservationClaims::new(1, "Jane Doe", Duration::hours(1), issued);
        let token = access.keys.issue(&claims).unwrap();
        assert!(matches!(access.authorize(&token, 1), Err(AccessError::Unauthenticated)));
    }

    #[test]
    fn malformed_token_is_forbidden() {
        assert!(matches!(access().authorize("abc.def.ghi", 1), Err(AccessError::Forbidden)));
    }
}
