use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use super::{
    BlockedSlot, BlockedSlotStore, NewReservation, Reservation, ReservationChanges,
    ReservationStatus, ReservationStore, SlotLoad, StoreError,
};

const RESERVATION_COLUMNS: &str = r#"
    id, patient_name, phone_number, desired_date, desired_time,
    notes, status, created_at, user_id
"#;

#[derive(Clone)]
pub struct PgReservationStore {
    db: PgPool,
}

impl PgReservationStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO reservations
                (patient_name, phone_number, desired_date, desired_time, notes, status, user_id)
            VALUES
                ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RESERVATION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, Reservation>(&sql)
            .bind(&new.patient_name)
            .bind(&new.phone_number)
            .bind(new.desired_date)
            .bind(&new.desired_time)
            .bind(new.notes.as_deref())
            .bind(ReservationStatus::Pending.as_str())
            .bind(new.user_id)
            .fetch_one(&self.db)
            .await?;
        Ok(row)
    }

    async fn get(&self, id: i32) -> Result<Reservation, StoreError> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
        sqlx::query_as::<_, Reservation>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn list_all(&self) -> Result<Vec<Reservation>, StoreError> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations ORDER BY desired_date DESC, created_at DESC"
        );
        Ok(sqlx::query_as::<_, Reservation>(&sql)
            .fetch_all(&self.db)
            .await?)
    }

    async fn list_by_owner(&self, user_id: i32) -> Result<Vec<Reservation>, StoreError> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE user_id = $1 ORDER BY desired_date DESC"
        );
        Ok(sqlx::query_as::<_, Reservation>(&sql)
            .bind(user_id)
            .fetch_all(&self.db)
            .await?)
    }

    async fn update_status(
        &self,
        id: i32,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        let sql = format!(
            "UPDATE reservations SET status = $1 WHERE id = $2 RETURNING {RESERVATION_COLUMNS}"
        );
        sqlx::query_as::<_, Reservation>(&sql)
            .bind(status.as_str())
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_details(
        &self,
        id: i32,
        changes: ReservationChanges,
    ) -> Result<Reservation, StoreError> {
        let sql = format!(
            r#"
            UPDATE reservations
            SET desired_date = $1,
                desired_time = $2,
                notes = $3,
                status = $4
            WHERE id = $5
            RETURNING {RESERVATION_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Reservation>(&sql)
            .bind(changes.desired_date)
            .bind(&changes.desired_time)
            .bind(changes.notes.as_deref())
            .bind(ReservationStatus::Pending.as_str())
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let res = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_latest_by_contact(
        &self,
        patient_name: &str,
        phone_number: &str,
    ) -> Result<Option<Reservation>, StoreError> {
        let sql = format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE patient_name = $1 AND phone_number = $2
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#
        );
        Ok(sqlx::query_as::<_, Reservation>(&sql)
            .bind(patient_name)
            .bind(phone_number)
            .fetch_optional(&self.db)
            .await?)
    }

    async fn slot_loads_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SlotLoad>, StoreError> {
        Ok(sqlx::query_as::<_, SlotLoad>(
            r#"
            SELECT desired_date, desired_time, status
            FROM reservations
            WHERE desired_date >= $1 AND desired_date < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?)
    }
}

#[derive(Clone)]
pub struct PgBlockedSlotStore {
    db: PgPool,
}

impl PgBlockedSlotStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BlockedSlotStore for PgBlockedSlotStore {
    async fn block(&self, date: NaiveDate, time: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO blocked_slots (slot_date, slot_time)
            VALUES ($1, $2)
            ON CONFLICT (slot_date, slot_time) DO NOTHING
            "#,
        )
        .bind(date)
        .bind(time)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn unblock(&self, date: NaiveDate, time: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM blocked_slots WHERE slot_date = $1 AND slot_time = $2")
            .bind(date)
            .bind(time)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn list_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BlockedSlot>, StoreError> {
        Ok(sqlx::query_as::<_, BlockedSlot>(
            r#"
            SELECT slot_date, slot_time
            FROM blocked_slots
            WHERE slot_date >= $1 AND slot_date < $2
            ORDER BY slot_date ASC, slot_time ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?)
    }
}
