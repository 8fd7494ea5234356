use std::collections::BTreeSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use super::{
    BlockedSlot, BlockedSlotStore, NewReservation, Reservation, ReservationChanges,
    ReservationStatus, ReservationStore, SlotLoad, StoreError,
};

#[derive(Default)]
pub struct MemoryReservationStore {
    rows: Mutex<Vec<Reservation>>,
}

impl MemoryReservationStore {
    fn with_row<T>(
        &self,
        id: i32,
        f: impl FnOnce(&mut Reservation) -> T,
    ) -> Result<T, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        rows.iter_mut()
            .find(|r| r.id == id)
            .map(f)
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn create(&self, new: NewReservation) -> Result<Reservation, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let row = Reservation {
            id,
            patient_name: new.patient_name,
            phone_number: new.phone_number,
            desired_date: new.desired_date,
            desired_time: new.desired_time,
            notes: new.notes,
            status: ReservationStatus::Pending,
            created_at: Utc::now(),
            user_id: new.user_id,
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: i32) -> Result<Reservation, StoreError> {
        self.with_row(id, |r| r.clone())
    }

    async fn list_all(&self) -> Result<Vec<Reservation>, StoreError> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| {
            b.desired_date
                .cmp(&a.desired_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(rows)
    }

    async fn list_by_owner(&self, user_id: i32) -> Result<Vec<Reservation>, StoreError> {
        let mut rows: Vec<Reservation> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == Some(user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.desired_date.cmp(&a.desired_date));
        Ok(rows)
    }

    async fn update_status(
        &self,
        id: i32,
        status: ReservationStatus,
    ) -> Result<Reservation, StoreError> {
        self.with_row(id, |r| {
            r.status = status;
            r.clone()
        })
    }

    async fn update_details(
        &self,
        id: i32,
        changes: ReservationChanges,
    ) -> Result<Reservation, StoreError> {
        self.with_row(id, |r| {
            r.desired_date = changes.desired_date;
            r.desired_time = changes.desired_time;
            r.notes = changes.notes;
            r.status = ReservationStatus::Pending;
            r.clone()
        })
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        if rows.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_latest_by_contact(
        &self,
        patient_name: &str,
        phone_number: &str,
    ) -> Result<Option<Reservation>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.patient_name == patient_name && r.phone_number == phone_number)
            .max_by_key(|r| (r.created_at, r.id))
            .cloned())
    }

    async fn slot_loads_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SlotLoad>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.desired_date >= start && r.desired_date < end)
            .map(|r| SlotLoad {
                date: r.desired_date,
                time: r.desired_time.clone(),
                status: r.status,
            })
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryBlockedSlotStore {
    slots: Mutex<BTreeSet<(NaiveDate, String)>>,
}

impl MemoryBlockedSlotStore {
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

#[async_trait]
impl BlockedSlotStore for MemoryBlockedSlotStore {
    async fn block(&self, date: NaiveDate, time: &str) -> Result<(), StoreError> {
        self.slots.lock().unwrap().insert((date, time.to_string()));
        Ok(())
    }

    async fn unblock(&self, date: NaiveDate, time: &str) -> Result<(), StoreError> {
        self.slots.lock().unwrap().remove(&(date, time.to_string()));
        Ok(())
    }

    async fn list_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<BlockedSlot>, StoreError> {
        Ok(self
            .slots
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| *d >= start && *d < end)
            .map(|(d, t)| BlockedSlot {
                slot_date: *d,
                slot_time: t.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn blocking_twice_keeps_one_slot() {
        let store = MemoryBlockedSlotStore::default();
        store.block(date(2025, 6, 10), "14:00").await.unwrap();
        store.block(date(2025, 6, 10), "14:00").await.unwrap();
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn unblocking_a_free_slot_is_fine() {
        let store = MemoryBlockedSlotStore::default();
        store.unblock(date(2025, 6, 10), "14:00").await.unwrap();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn details_edit_resets_status() {
        let store = MemoryReservationStore::default();
        let r = store
            .create(NewReservation {
                patient_name: "Jane Doe".into(),
                phone_number: "555-0100".into(),
                desired_date: date(2025, 7, 1),
                desired_time: "09:00".into(),
                notes: None,
                user_id: None,
            })
            .await
            .unwrap();
        store
            .update_status(r.id, ReservationStatus::Confirmed)
            .await
            .unwrap();

        let edited = store
            .update_details(
                r.id,
                ReservationChanges {
                    desired_date: date(2025, 7, 2),
                    desired_time: "09:00".into(),
                    notes: Some("later".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.status, ReservationStatus::Pending);
        assert_eq!(edited.desired_date, date(2025, 7, 2));
    }

    #[tokio::test]
    async fn missing_rows_report_not_found() {
        let store = MemoryReservationStore::default();
        assert!(matches!(store.get(9).await, Err(StoreError::NotFound)));
        assert!(matches!(store.delete(9).await, Err(StoreError::NotFound)));
        assert!(matches!(
            store.update_status(9, ReservationStatus::Completed).await,
            Err(StoreError::NotFound)
        ));
    }
}
