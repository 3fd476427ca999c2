//! Reconciliation engine: cross-reference calendar events with the customer
//! roster and derive each matched meeting's invoice status.
//!
//! Output is a per-customer grouping of `Meeting`s plus, when enabled, the
//! list of events no customer matched. Billing-store failures for one
//! customer degrade that customer's meetings to unbilled; they never abort
//! the run.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::config::Config;
use crate::extract::scan_participants;
use crate::identity::meeting_identity;
use crate::ports::{BillingRecord, BillingStore};
use crate::status::status_from_records;
use crate::types::{
    CalendarEvent, Customer, InvoiceStatus, Meeting, UnassociatedMeeting,
};

/// One customer and the meetings reconciled for them, in event order.
#[derive(Debug, Clone)]
pub struct CustomerMeetings {
    pub customer: Customer,
    pub meetings: Vec<Meeting>,
}

/// The full result of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub groups: Vec<CustomerMeetings>,
    pub unassociated: Vec<UnassociatedMeeting>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.unassociated.is_empty()
    }

    pub fn meeting_count(&self) -> usize {
        self.groups.iter().map(|g| g.meetings.len()).sum()
    }
}

/// Parse an event timestamp: RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (taken
/// as UTC), or a bare date for all-day events (taken as midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(&s.replace('Z', "+00:00"))
            .or_else(|_| DateTime::parse_from_rfc3339(s))
        {
            return Some(dt.with_timezone(&Utc));
        }
        return NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .ok()
            .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// Duration between two event timestamps in hours, rounded to 2 decimals.
/// Malformed or inverted timestamps fall back to exactly 1.0.
pub fn event_duration_hours(start: &str, end: &str) -> f64 {
    match (parse_timestamp(start), parse_timestamp(end)) {
        (Some(s), Some(e)) if e > s => {
            let hours = (e - s).num_seconds() as f64 / 3600.0;
            (hours * 100.0).round() / 100.0
        }
        _ => 1.0,
    }
}

/// Best-effort display date and time for an event start. Unparseable
/// timestamps keep their leading date-ish characters and an explicit
/// "unknown time" marker rather than failing.
pub fn display_date_time(start: &str) -> (String, String) {
    match parse_timestamp(start) {
        Some(dt) => (
            dt.format("%Y-%m-%d").to_string(),
            dt.format("%-I:%M %p").to_string(),
        ),
        None => (start.chars().take(10).collect(), "unknown time".to_string()),
    }
}

/// Reconcile a window of calendar events against the customer roster.
pub async fn reconcile(
    roster: &[Customer],
    events: &[CalendarEvent],
    billing: &dyn BillingStore,
    config: &Config,
) -> ReconcileOutcome {
    let customer_by_email: HashMap<&str, &Customer> =
        roster.iter().map(|c| (c.email.as_str(), c)).collect();

    let mut groups: Vec<CustomerMeetings> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    let mut unassociated: Vec<UnassociatedMeeting> = Vec::new();
    // Records fetched once per customer for this pass. None records a failed
    // lookup: that customer's meetings degrade to unbilled.
    let mut records_cache: HashMap<String, Option<Vec<BillingRecord>>> = HashMap::new();

    for event in events {
        if event.start.is_empty() || event.end.is_empty() {
            continue;
        }

        let duration = event_duration_hours(&event.start, &event.end);
        let (date, time) = display_date_time(&event.start);
        let scan = scan_participants(event, roster, config.proximity_window_chars);

        let mut matched_any = false;
        for email in scan.emails() {
            let Some(customer) = customer_by_email.get(email) else {
                continue;
            };
            matched_any = true;

            let meeting_id =
                meeting_identity(email, &event.start, &event.title, config.identity_length);

            if !records_cache.contains_key(&customer.id) {
                let fetched = match billing.list_invoices(&customer.id).await {
                    Ok(records) => Some(records),
                    Err(e) => {
                        log::warn!(
                            "billing record lookup failed for {} ({}): {e}; \
                             treating their meetings as unbilled",
                            customer.name,
                            customer.id
                        );
                        None
                    }
                };
                records_cache.insert(customer.id.clone(), fetched);
            }
            let status = match records_cache.get(&customer.id).and_then(|r| r.as_ref()) {
                Some(records) => status_from_records(records, &meeting_id),
                None => InvoiceStatus::Unbilled,
            };

            let meeting = Meeting::new(
                meeting_id,
                event.title.clone(),
                date.clone(),
                time.clone(),
                duration,
                event.start.clone(),
                event.end.clone(),
                status,
                scan.source_of(email),
            );

            let idx = match group_index.get(&customer.id) {
                Some(&idx) => idx,
                None => {
                    groups.push(CustomerMeetings {
                        customer: (*customer).clone(),
                        meetings: Vec::new(),
                    });
                    group_index.insert(customer.id.clone(), groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[idx].meetings.push(meeting);
        }

        if !matched_any && config.include_unassociated {
            let provisional_owner = if !event.organizer.is_empty() {
                event.organizer.to_lowercase()
            } else {
                event
                    .attendees
                    .first()
                    .map(|a| a.to_lowercase())
                    .unwrap_or_default()
            };
            let id = meeting_identity(
                &provisional_owner,
                &event.start,
                &event.title,
                config.identity_length,
            );
            unassociated.push(UnassociatedMeeting::new(
                id,
                event.title.clone(),
                date,
                time,
                duration,
                event.start.clone(),
                event.end.clone(),
                event.attendees.iter().map(|a| a.to_lowercase()).collect(),
                &event.description,
            ));
        }
    }

    for group in &groups {
        log::info!(
            "found {} meeting(s) for customer {} ({})",
            group.meetings.len(),
            group.customer.name,
            group.customer.email
        );
    }
    log::info!(
        "reconciled {} meeting(s) across {} customer(s), {} unassociated",
        groups.iter().map(|g| g.meetings.len()).sum::<usize>(),
        groups.len(),
        unassociated.len()
    );

    ReconcileOutcome { groups, unassociated }
}
