//! Reservation and blocked-slot persistence.
//!
//! Handlers only see the two traits; `AppState` holds whichever
//! implementation `main` wired in.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod postgres;

#[cfg(test)]
pub mod memory;

pub use postgres::{PgBlockedSlotStore, PgReservationStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown reservation status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "completed" => Ok(ReservationStatus::Completed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl TryFrom<String> for ReservationStatus {
    type Error = UnknownStatus;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: i32,
    pub patient_name: String,
    pub phone_number: String,
    pub desired_date: NaiveDate,
    pub desired_time: String,
    pub notes: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct NewReservation {
    pub patient_name: String,
    pub phone_number: String,
    pub desired_date: NaiveDate,
    pub desired_time: String,
    pub notes: Option<String>,
    pub user_id: Option<i32>,
}

/// Fields a patient may change on their own reservation.
#[derive(Debug, Clone)]
pub struct ReservationChanges {
    pub desired_date: NaiveDate,
    pub desired_time: String,
    pub notes: Option<String>,
}

/// One reservation reduced to what the schedule view needs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SlotLoad {
    #[sqlx(rename = "desired_date")]
    pub date: NaiveDate,
    #[sqlx(rename = "desired_time")]
    pub time: String,
    #[sqlx(try_from = "String")]
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BlockedSlot {
    pub slot_date: NaiveDate,
    pub slot_time: String,
}

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Always stored as `pending`. Overlapping reservations are accepted.
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError>;

    async fn get(&self, id: i32) -> Result<Reservation, StoreError>;

    /// Newest desired date first, then newest submission.
    async fn list_all(&self) -> Result<Vec<Reservation>, StoreError>;

    async fn list_by_owner(&self, user_id: i32) -> Result<Vec<Reservation>, StoreError>;

    /// Any status may follow any other.
    async fn update_status(
        &self,
        id: i32,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError>;

    /// Applies a patient edit and puts the reservation back to `pending`.
    async fn update_details(
        &self,
        id: i32,
        changes: ReservationChanges,
    ) -> Result<Reservation, StoreError>;

    async fn delete(&self, id: i32) -> Result<(), StoreError>;

    /// Most recently created reservation with exactly this name and phone.
    async fn find_latest_by_contact(
        &self,
        patient_name: &str,
        phone_number: &str,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Reservations with `start <= desired_date < end`.
    async fn slot_loads_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SlotLoad>, StoreError>;
}

#[async_trait]
pub trait BlockedSlotStore: Send + Sync {
    /// Blocking an already blocked slot is a no-op.
    async fn block(&self, date: NaiveDate, time: &str) -> Result<(), StoreError>;

    /// Unblocking a free slot is a no-op.
    async fn unblock(&self, date: NaiveDate, time: &str) -> Result<(), StoreError>;

    /// Slots with `start <= slot_date < end`.
    async fn list_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BlockedSlot>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_round_trip() {
        for s in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(s.as_str().parse::<ReservationStatus>().unwrap(), s);
        }
        assert!("Pending".parse::<ReservationStatus>().is_err());
        assert!("".parse::<ReservationStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ReservationStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
