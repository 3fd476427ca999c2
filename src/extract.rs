//! Participant extraction: who was in a meeting.
//!
//! Three detection channels, run in priority order:
//! 1. explicit attendee and organizer fields on the event,
//! 2. a regex email scan over the event description,
//! 3. a proximity scan pairing a customer's display name with their email
//!    when both occur close together in the description.
//!
//! Each detected email is tagged with the first channel that found it;
//! free-text channels never overwrite an attendee/organizer tag.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::{CalendarEvent, Customer, DetectionSource};

/// Default window, in characters, within which a customer's name and email
/// must co-occur in a description for the proximity channel to fire.
/// Configurable via `Config::proximity_window_chars`.
pub const DEFAULT_PROXIMITY_WINDOW: usize = 100;

/// Roster display name that means "no real name on file"; such customers are
/// skipped by the proximity channel.
const PLACEHOLDER_NAME: &str = "unknown";

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap())
}

/// The set of lowercased participant emails found for an event, each tagged
/// with the channel that first detected it. Iteration order is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ParticipantScan {
    by_email: BTreeMap<String, DetectionSource>,
}

impl ParticipantScan {
    fn insert(&mut self, email: String, source: DetectionSource) {
        self.by_email.entry(email).or_insert(source);
    }

    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.by_email.keys().map(String::as_str)
    }

    pub fn source_of(&self, email: &str) -> DetectionSource {
        self.by_email
            .get(email)
            .copied()
            .unwrap_or(DetectionSource::Unknown)
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }
}

/// Run all three detection channels over an event.
pub fn scan_participants(
    event: &CalendarEvent,
    roster: &[Customer],
    proximity_window: usize,
) -> ParticipantScan {
    let mut scan = ParticipantScan::default();

    // Channel 1: explicit event fields. Attendees before organizer so an
    // email appearing in both keeps the attendee tag.
    for attendee in &event.attendees {
        let email = attendee.trim().to_lowercase();
        if !email.is_empty() {
            scan.insert(email, DetectionSource::Attendee);
        }
    }
    let organizer = event.organizer.trim().to_lowercase();
    if !organizer.is_empty() {
        scan.insert(organizer, DetectionSource::Organizer);
    }

    if event.description.is_empty() {
        return scan;
    }

    // Channel 2: regex email scan of the description.
    for hit in re_email().find_iter(&event.description) {
        scan.insert(hit.as_str().to_lowercase(), DetectionSource::Description);
    }

    // Channel 3: name+email proximity. Only meaningful for customers with a
    // real display name.
    let description = event.description.to_lowercase();
    for customer in roster {
        let name = customer.name.trim().to_lowercase();
        if name.is_empty() || name == PLACEHOLDER_NAME {
            continue;
        }
        let email = customer.email.to_lowercase();
        if let (Some(name_pos), Some(email_pos)) =
            (description.find(&name), description.find(&email))
        {
            if name_pos.abs_diff(email_pos) <= proximity_window {
                scan.insert(email, DetectionSource::Description);
            }
        }
    }

    scan
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn event(attendees: &[&str], organizer: &str, description: &str) -> CalendarEvent {
        CalendarEvent {
            id: "evt_1".into(),
            title: "Sync".into(),
            start: "2025-01-15T14:00:00Z".into(),
            end: "2025-01-15T15:00:00Z".into(),
            description: description.into(),
            attendees: attendees.iter().map(|s| s.to_string()).collect(),
            organizer: organizer.into(),
            is_all_day: false,
        }
    }

    fn customer(name: &str, email: &str) -> Customer {
        Customer {
            id: format!("cus_{email}"),
            email: email.into(),
            name: name.into(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_attendee_and_organizer_channel() {
        let scan = scan_participants(
            &event(&["Alice@X.com", "bob@y.com"], "carol@z.com", ""),
            &[],
            DEFAULT_PROXIMITY_WINDOW,
        );
        assert_eq!(scan.len(), 3);
        assert_eq!(scan.source_of("alice@x.com"), DetectionSource::Attendee);
        assert_eq!(scan.source_of("bob@y.com"), DetectionSource::Attendee);
        assert_eq!(scan.source_of("carol@z.com"), DetectionSource::Organizer);
    }

    #[test]
    fn test_organizer_who_is_also_attendee_keeps_attendee_tag() {
        let scan = scan_participants(
            &event(&["alice@x.com"], "alice@x.com", ""),
            &[],
            DEFAULT_PROXIMITY_WINDOW,
        );
        assert_eq!(scan.len(), 1);
        assert_eq!(scan.source_of("alice@x.com"), DetectionSource::Attendee);
    }

    #[test]
    fn test_description_email_scan() {
        let scan = scan_participants(
            &event(&[], "", "Follow up with Dave.Smith+x@Co.Example.com about pricing"),
            &[],
            DEFAULT_PROXIMITY_WINDOW,
        );
        assert_eq!(scan.len(), 1);
        assert_eq!(
            scan.source_of("dave.smith+x@co.example.com"),
            DetectionSource::Description
        );
    }

    #[test]
    fn test_description_never_overwrites_attendee_tag() {
        let scan = scan_participants(
            &event(&["alice@x.com"], "", "ping alice@x.com after"),
            &[],
            DEFAULT_PROXIMITY_WINDOW,
        );
        assert_eq!(scan.source_of("alice@x.com"), DetectionSource::Attendee);
    }

    #[test]
    fn test_proximity_channel_matches_name_near_email() {
        let roster = [customer("Jane Doe", "jane@co.com")];
        let scan = scan_participants(
            &event(&[], "", "Notes from the call with Jane Doe jane@co.com re: Q1"),
            &roster,
            DEFAULT_PROXIMITY_WINDOW,
        );
        assert_eq!(scan.source_of("jane@co.com"), DetectionSource::Description);
    }

    #[test]
    fn test_proximity_channel_respects_window() {
        // "jane@co.comma" makes the regex scan over-extend into a different
        // address, so only the proximity channel can surface jane@co.com.
        let roster = [customer("Jane Doe", "jane@co.com")];
        let near = "call with Jane Doe, bill to jane@co.comma";
        let scan = scan_participants(&event(&[], "", near), &roster, 100);
        assert_eq!(scan.source_of("jane@co.com"), DetectionSource::Description);
        assert_eq!(scan.source_of("jane@co.comma"), DetectionSource::Description);

        let padding = "x".repeat(150);
        let far = format!("Jane Doe {padding} bill to jane@co.comma");
        let scan = scan_participants(&event(&[], "", &far), &roster, 100);
        assert_eq!(scan.source_of("jane@co.com"), DetectionSource::Unknown);
    }

    #[test]
    fn test_proximity_channel_skips_placeholder_names() {
        let roster = [customer("Unknown", "ghost@co.com"), customer("", "blank@co.com")];
        let scan = scan_participants(
            &event(&[], "", "Unknown ghost@co.comma and blank@co.comma"),
            &roster,
            DEFAULT_PROXIMITY_WINDOW,
        );
        // Channel 2 sees the over-extended addresses; channel 3 must not
        // recover the real ones for nameless customers.
        assert_eq!(scan.source_of("ghost@co.com"), DetectionSource::Unknown);
        assert_eq!(scan.source_of("blank@co.com"), DetectionSource::Unknown);
    }
}
