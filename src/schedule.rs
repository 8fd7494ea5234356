//! Monthly availability view.
//!
//! Merges reservations and blocked slots for one calendar month into
//! `date -> time -> {pending, confirmed, blocked}`. Nothing is cached; every
//! call reads both stores.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use thiserror::Error;

use crate::store::{
    BlockedSlot, BlockedSlotStore, ReservationStatus, ReservationStore, SlotLoad, StoreError,
};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub pending: u32,
    pub confirmed: u32,
    pub blocked: bool,
}

/// Keys are `YYYY-MM-DD` dates, then time labels.
pub type ScheduleSummary = BTreeMap<String, BTreeMap<String, SlotSummary>>;

/// Parses raw `year`/`month` query values.
pub fn parse_year_month(
    year: Option<&str>,
    month: Option<&str>,
) -> Result<(i32, u32), ScheduleError> {
    let (Some(year), Some(month)) = (year, month) else {
        return Err(ScheduleError::InvalidArgument(
            "year and month are required".into(),
        ));
    };
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| ScheduleError::InvalidArgument("year must be a number".into()))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| ScheduleError::InvalidArgument("month must be a number".into()))?;
    Ok((year, month))
}

/// `[first day of month, first day of next month)`.
pub fn month_range(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate), ScheduleError> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        ScheduleError::InvalidArgument(format!("no such month: {year}-{month}"))
    })?;
    let (next_year, next_month) = if start.month() == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
        ScheduleError::InvalidArgument(format!("no such month: {year}-{month}"))
    })?;
    Ok((start, end))
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Builds the summary. Completed and cancelled reservations leave the slot
/// free; a blocked flag never hides the counts.
pub fn summarize(loads: &[SlotLoad], blocked: &[BlockedSlot]) -> ScheduleSummary {
    let mut summary = ScheduleSummary::new();

    for load in loads {
        let entry = summary
            .entry(date_key(load.date))
            .or_default()
            .entry(load.time.clone())
            .or_default();
        match load.status {
            ReservationStatus::Pending => entry.pending += 1,
            ReservationStatus::Confirmed => entry.confirmed += 1,
            ReservationStatus::Completed | ReservationStatus::Cancelled => {}
        }
    }

    for slot in blocked {
        summary
            .entry(date_key(slot.slot_date))
            .or_default()
            .entry(slot.slot_time.clone())
            .or_default()
            .blocked = true;
    }

    summary
}

pub async fn get_schedule(
    reservations: &dyn ReservationStore,
    blocked_slots: &dyn BlockedSlotStore,
    year: i32,
    month: u32,
) -> Result<ScheduleSummary, ScheduleError> {
    let (start, end) = month_range(year, month)?;

    let (loads, blocked) = tokio::try_join!(
        reservations.slot_loads_in_range(start, end),
        blocked_slots.list_in_range(start, end),
    )?;

    tracing::debug!(
        %start, %end,
        reservations = loads.len(),
        blocked = blocked.len(),
        "schedule computed"
    );
    Ok(summarize(&loads, &blocked))
}
