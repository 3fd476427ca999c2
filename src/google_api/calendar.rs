//! Google Calendar API v3: the calendar event source.
//!
//! Fetches the primary calendar for the lookback window with recurring
//! events expanded and ordered by start time, then normalizes each event to
//! the shape reconciliation consumes. The raw start/end strings are kept
//! verbatim because meeting identifiers hash the start string.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{get_valid_access_token, GoogleApiError};
use crate::ports::{CalendarSource, PortError};
use crate::types::CalendarEvent;

const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

/// Page size for event listing; the API maximum.
const MAX_RESULTS: &str = "250";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<EventRaw>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRaw {
    #[serde(default)]
    id: String,
    #[serde(default)]
    summary: Option<String>,
    start: Option<EventDateTime>,
    end: Option<EventDateTime>,
    #[serde(default)]
    attendees: Vec<AttendeeRaw>,
    organizer: Option<OrganizerRaw>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventDateTime {
    date_time: Option<String>,
    date: Option<String>,
}

impl EventDateTime {
    fn as_str(&self) -> &str {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttendeeRaw {
    #[serde(default)]
    email: String,
    #[serde(default)]
    resource: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrganizerRaw {
    #[serde(default)]
    email: String,
}

impl EventRaw {
    /// Normalize to the reconciliation event model. Cancelled events return
    /// None; resource-room "attendees" are dropped.
    fn into_event(self) -> Option<CalendarEvent> {
        if self.status.as_deref() == Some("cancelled") {
            return None;
        }

        let attendees: Vec<String> = self
            .attendees
            .iter()
            .filter(|a| a.resource != Some(true))
            .map(|a| a.email.clone())
            .filter(|e| !e.is_empty())
            .collect();

        let is_all_day = self
            .start
            .as_ref()
            .map(|s| s.date_time.is_none() && s.date.is_some())
            .unwrap_or(false);

        Some(CalendarEvent {
            id: self.id,
            title: self
                .summary
                .unwrap_or_else(|| "(No title)".to_string()),
            start: self.start.as_ref().map(EventDateTime::as_str).unwrap_or("").to_string(),
            end: self.end.as_ref().map(EventDateTime::as_str).unwrap_or("").to_string(),
            description: self.description.unwrap_or_default(),
            attendees,
            organizer: self.organizer.map(|o| o.email).unwrap_or_default(),
            is_all_day,
        })
    }
}

/// Fetch events in `[start, end)`, following page tokens.
pub async fn fetch_events(
    access_token: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>, GoogleApiError> {
    let client = reqwest::Client::new();
    let time_min = start.to_rfc3339();
    let time_max = end.to_rfc3339();

    let mut events = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let mut request = client
            .get(EVENTS_URL)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
                ("maxResults", MAX_RESULTS),
            ]);
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GoogleApiError::AuthExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleApiError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: EventListResponse = response.json().await?;
        events.extend(body.items.into_iter().filter_map(EventRaw::into_event));

        page_token = body.next_page_token;
        if page_token.is_none() {
            break;
        }
    }

    log::info!("fetched {} calendar event(s)", events.len());
    Ok(events)
}

/// The production calendar source: token from disk, events over HTTP.
#[derive(Debug, Default, Clone)]
pub struct GoogleCalendarSource;

impl GoogleCalendarSource {
    pub fn new() -> Self {
        GoogleCalendarSource
    }
}

#[async_trait]
impl CalendarSource for GoogleCalendarSource {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, PortError> {
        let access_token = get_valid_access_token().await?;
        Ok(fetch_events(&access_token, start, end).await?)
    }
}
