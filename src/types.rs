//! Domain model: customers, calendar events, and the reconciled meetings
//! derived from them.
//!
//! `Meeting` and `UnassociatedMeeting` are the core's work product. Both are
//! built through constructors that enforce the selection invariants, and the
//! override precedence rules live here as methods so that listing,
//! confirmation and emission all compute through the same code path.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Metadata key on a billing-system customer holding their hourly rate as a
/// string-encoded decimal.
pub const HOURLY_RATE_KEY: &str = "hourly_rate";

/// A billing-system customer. Externally owned; read-only here apart from the
/// hourly-rate metadata update side effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    /// Lowercased; the unique matching key against participant emails.
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Customer {
    /// The customer's hourly rate from metadata, falling back to
    /// `default_rate` when absent, empty or unparseable.
    pub fn hourly_rate(&self, default_rate: f64) -> f64 {
        match self.metadata.get(HOURLY_RATE_KEY) {
            Some(raw) if !raw.trim().is_empty() => match raw.trim().parse::<f64>() {
                Ok(rate) if rate > 0.0 => rate,
                _ => {
                    log::warn!(
                        "invalid hourly rate {:?} on customer {}, using default ${}",
                        raw,
                        self.name,
                        default_rate
                    );
                    default_rate
                }
            },
            _ => default_rate,
        }
    }
}

/// A normalized calendar event. Read-only input, immutable for the run.
///
/// `start`/`end` keep the source's own timestamp strings (RFC 3339, or a bare
/// date for all-day events) because the meeting identifier hashes the start
/// string verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub organizer: String,
    #[serde(default)]
    pub is_all_day: bool,
}

/// Invoice status derived by cross-referencing billing records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unbilled,
    Drafted,
    Finalized,
}

impl InvoiceStatus {
    /// Drafted and finalized meetings are terminal: never selectable again.
    pub fn is_terminal(self) -> bool {
        !matches!(self, InvoiceStatus::Unbilled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Unbilled => "unbilled",
            InvoiceStatus::Drafted => "drafted",
            InvoiceStatus::Finalized => "finalized",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which channel first associated a participant email with a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Attendee,
    Organizer,
    Description,
    ManualAssignment,
    Unknown,
}

impl DetectionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionSource::Attendee => "attendee",
            DetectionSource::Organizer => "organizer",
            DetectionSource::Description => "description",
            DetectionSource::ManualAssignment => "manual_assignment",
            DetectionSource::Unknown => "unknown",
        }
    }
}

/// A reconciled (customer, calendar event) pairing eligible for billing
/// consideration. Created once during reconciliation, mutated in place by the
/// interactive session, handed to emission; never persisted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    /// Stable identifier, pure function of (email, start, title).
    pub id: String,
    pub title: String,
    /// Display date, `YYYY-MM-DD`.
    pub date: String,
    /// Display time, e.g. `2:00 PM`.
    pub time: String,
    /// Base duration in hours, rounded to 2 decimals.
    pub duration: f64,
    pub start: String,
    pub end: String,
    pub status: InvoiceStatus,
    pub selected: bool,
    #[serde(default)]
    pub synopsis: String,
    pub edited_start_time: Option<NaiveTime>,
    pub edited_duration: Option<f64>,
    pub custom_rate: Option<f64>,
    pub source: DetectionSource,
    #[serde(default)]
    pub manually_assigned: bool,
}

impl Meeting {
    /// Construct a reconciled meeting. Selection defaults to true only for
    /// unbilled meetings; drafted/finalized start (and stay) unselected.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        title: String,
        date: String,
        time: String,
        duration: f64,
        start: String,
        end: String,
        status: InvoiceStatus,
        source: DetectionSource,
    ) -> Self {
        Meeting {
            id,
            title,
            date,
            time,
            duration,
            start,
            end,
            status,
            selected: status == InvoiceStatus::Unbilled,
            synopsis: String::new(),
            edited_start_time: None,
            edited_duration: None,
            custom_rate: None,
            source,
            manually_assigned: false,
        }
    }

    /// Derived: true iff a time or duration override is set. Never stored
    /// independently, so it cannot drift out of sync.
    pub fn is_edited(&self) -> bool {
        self.edited_start_time.is_some() || self.edited_duration.is_some()
    }

    /// Effective display time: the edited start time when set, else the
    /// observed one.
    pub fn effective_time(&self) -> String {
        match self.edited_start_time {
            Some(t) => t.format("%-I:%M %p").to_string(),
            None => self.time.clone(),
        }
    }

    /// Effective duration in hours: the override when set, else the base.
    pub fn effective_duration(&self) -> f64 {
        self.edited_duration.unwrap_or(self.duration)
    }

    /// Effective hourly rate: the per-meeting override when set, else the
    /// customer's default.
    pub fn effective_rate(&self, customer_default_rate: f64) -> f64 {
        self.custom_rate.unwrap_or(customer_default_rate)
    }

    /// Billable amount in currency units. Every display and emission path
    /// must go through this.
    pub fn amount(&self, customer_default_rate: f64) -> f64 {
        self.effective_duration() * self.effective_rate(customer_default_rate)
    }

    /// The synopsis if the operator entered one, else the meeting title.
    pub fn synopsis_or_title(&self) -> &str {
        if self.synopsis.is_empty() {
            &self.title
        } else {
            &self.synopsis
        }
    }
}

/// A calendar event with no automatically matched customer, pending manual
/// assignment. Converted into a `Meeting` (and removed from the unassociated
/// list) when the operator assigns it; selection is rejected until then, so
/// `selected` stays false for the entire life of this struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnassociatedMeeting {
    /// Provisional identifier derived from the organizer (or first attendee)
    /// email; replaced with a customer-based identifier at assignment.
    pub id: String,
    pub title: String,
    pub date: String,
    pub time: String,
    pub duration: f64,
    pub start: String,
    pub end: String,
    /// Raw participant emails as observed, for operator context.
    pub attendees: Vec<String>,
    /// First ~100 characters of the event description, for operator context.
    pub description_preview: String,
    pub selected: bool,
}

/// Truncation length for `UnassociatedMeeting::description_preview`.
pub const DESCRIPTION_PREVIEW_CHARS: usize = 100;

impl UnassociatedMeeting {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        title: String,
        date: String,
        time: String,
        duration: f64,
        start: String,
        end: String,
        attendees: Vec<String>,
        description: &str,
    ) -> Self {
        let description_preview: String =
            description.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
        UnassociatedMeeting {
            id,
            title,
            date,
            time,
            duration,
            start,
            end,
            attendees,
            description_preview,
            selected: false,
        }
    }

    /// Convert into a `Meeting` under `customer`. The identifier is
    /// recomputed from the customer's email so later runs resolve its status
    /// against whatever this run emits. Force-selected and flagged as a
    /// manual assignment.
    pub fn into_meeting(self, customer: &Customer, identity_length: usize) -> Meeting {
        let id = crate::identity::meeting_identity(
            &customer.email,
            &self.start,
            &self.title,
            identity_length,
        );
        let mut meeting = Meeting::new(
            id,
            self.title,
            self.date,
            self.time,
            self.duration,
            self.start,
            self.end,
            InvoiceStatus::Unbilled,
            DetectionSource::ManualAssignment,
        );
        meeting.selected = true;
        meeting.manually_assigned = true;
        meeting
    }
}
