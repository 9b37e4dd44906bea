//! Builds the merged calendar feed from meetings and on-call dates.

use crate::{Meeting, OnCallDate};
use intranet_types::time::format_date;
use intranet_types::OnCallSlot;
use serde::Serialize;

/// One item on the shared calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CalendarEntry {
    Meeting(Meeting),
    OnCall(OnCallEntry),
}

/// An on-call day or holiday rendered as a calendar block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnCallEntry {
    /// `g-<on-call date id>`, so it never collides with a meeting id.
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    pub all_day: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub slot: u8,
}

impl OnCallEntry {
    /// Holidays cover the whole day; rota groups the 10:00 to 13:00 shift.
    /// Returns `None` for a slot number that means nothing.
    pub fn from_date(date: &OnCallDate) -> Option<Self> {
        let day = format_date(&date.date);
        let (title, start, end, all_day, kind) = match date.kind()? {
            OnCallSlot::Holiday => ("HOLIDAY".to_string(), "00:00", "23:59", true, "holiday"),
            OnCallSlot::Group(n) => (format!("ON-CALL {}", n), "10:00", "13:00", false, "on_call"),
        };
        Some(Self {
            id: format!("g-{}", date.id),
            title,
            start: format!("{}T{}:00", day, start),
            end: format!("{}T{}:00", day, end),
            all_day,
            kind,
            slot: date.slot,
        })
    }
}

/// Meetings first, in the order given, then on-call dates in the order
/// given.
pub fn derive_calendar(meetings: &[Meeting], dates: &[OnCallDate]) -> Vec<CalendarEntry> {
    let mut entries: Vec<CalendarEntry> = meetings
        .iter()
        .cloned()
        .map(CalendarEntry::Meeting)
        .collect();
    for date in dates {
        match OnCallEntry::from_date(date) {
            Some(entry) => entries.push(CalendarEntry::OnCall(entry)),
            None => tracing::warn!(id = date.id, slot = date.slot, "skipping unknown on-call slot"),
        }
    }
    entries
}
