//! The interactive session's state machine.
//!
//! Holds the reconciled meeting groups and the unassociated list for one
//! operator session, and applies curation commands under the selection
//! invariants: drafted/finalized meetings are never selectable, unassociated
//! meetings are never selectable until assigned, and every rejected command
//! leaves state exactly as it was.

use chrono::NaiveTime;

use crate::config::Config;
use crate::error::ConsistencyViolation;
use crate::reconcile::{CustomerMeetings, ReconcileOutcome};
use crate::types::{Customer, Meeting, UnassociatedMeeting, HOURLY_RATE_KEY};

/// What to do with one editable field during `edit`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditValue<T> {
    /// Operator pressed enter: keep whatever is there now.
    Keep,
    /// Operator typed `original`: clear the override.
    Reset,
    /// Operator supplied a new value.
    Set(T),
}

/// One operator session over the reconciled meeting set. Exclusively owned;
/// there is exactly one mutator.
pub struct Session {
    roster: Vec<Customer>,
    groups: Vec<CustomerMeetings>,
    unassociated: Vec<UnassociatedMeeting>,
    default_rate: f64,
    identity_length: usize,
}

impl Session {
    pub fn new(roster: Vec<Customer>, outcome: ReconcileOutcome, config: &Config) -> Self {
        Session {
            roster,
            groups: outcome.groups,
            unassociated: outcome.unassociated,
            default_rate: config.default_hourly_rate,
            identity_length: config.identity_length,
        }
    }

    pub fn groups(&self) -> &[CustomerMeetings] {
        &self.groups
    }

    /// Mutable access for the presentation layer (synopsis entry). Selection
    /// transitions must go through the command methods below.
    pub fn groups_mut(&mut self) -> &mut [CustomerMeetings] {
        &mut self.groups
    }

    pub fn unassociated(&self) -> &[UnassociatedMeeting] {
        &self.unassociated
    }

    pub fn default_rate(&self) -> f64 {
        self.default_rate
    }

    pub fn meeting_count(&self) -> usize {
        self.groups.iter().map(|g| g.meetings.len()).sum()
    }

    pub fn selected_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| &g.meetings)
            .filter(|m| m.selected)
            .count()
    }

    pub fn has_selection(&self) -> bool {
        self.selected_count() > 0
    }

    /// Map a 1-based display index to its position in the grouping.
    fn locate(&self, index: usize) -> Option<(usize, usize)> {
        if index == 0 {
            return None;
        }
        let mut remaining = index - 1;
        for (gidx, group) in self.groups.iter().enumerate() {
            if remaining < group.meetings.len() {
                return Some((gidx, remaining));
            }
            remaining -= group.meetings.len();
        }
        None
    }

    /// The customer and meeting at a display index.
    pub fn meeting(&self, index: usize) -> Result<(&Customer, &Meeting), ConsistencyViolation> {
        let (gidx, midx) = self
            .locate(index)
            .ok_or(ConsistencyViolation::UnknownMeeting(index))?;
        let group = &self.groups[gidx];
        Ok((&group.customer, &group.meetings[midx]))
    }

    fn meeting_mut(&mut self, index: usize) -> Result<&mut Meeting, ConsistencyViolation> {
        let (gidx, midx) = self
            .locate(index)
            .ok_or(ConsistencyViolation::UnknownMeeting(index))?;
        Ok(&mut self.groups[gidx].meetings[midx])
    }

    /// Flip selection on one meeting. Returns the new selection state.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ConsistencyViolation> {
        let meeting = self.meeting_mut(index)?;
        if meeting.status.is_terminal() {
            return Err(ConsistencyViolation::AlreadyBilled {
                index,
                status: meeting.status,
            });
        }
        meeting.selected = !meeting.selected;
        Ok(meeting.selected)
    }

    /// Selection attempt on an unassociated meeting: always rejected; they
    /// become selectable only by being assigned.
    pub fn toggle_unassociated(&mut self, index: usize) -> Result<(), ConsistencyViolation> {
        if index == 0 || index > self.unassociated.len() {
            return Err(ConsistencyViolation::UnknownUnassociated(index));
        }
        Err(ConsistencyViolation::NotAssigned(index))
    }

    /// Select every unbilled meeting. Drafted/finalized are never touched.
    /// Returns how many meetings are now selected.
    pub fn select_all_unbilled(&mut self) -> usize {
        let mut count = 0;
        for meeting in self.groups.iter_mut().flat_map(|g| &mut g.meetings) {
            if !meeting.status.is_terminal() {
                meeting.selected = true;
                count += 1;
            }
        }
        count
    }

    /// Deselect every unbilled meeting (terminal meetings are unselected by
    /// invariant already). Returns how many were deselected.
    pub fn deselect_all(&mut self) -> usize {
        let mut count = 0;
        for meeting in self.groups.iter_mut().flat_map(|g| &mut g.meetings) {
            if !meeting.status.is_terminal() && meeting.selected {
                meeting.selected = false;
                count += 1;
            }
        }
        count
    }

    /// Apply time/duration overrides. Legal regardless of invoice status;
    /// editing does not imply selection.
    pub fn edit(
        &mut self,
        index: usize,
        time: EditValue<NaiveTime>,
        duration: EditValue<f64>,
    ) -> Result<(), ConsistencyViolation> {
        let meeting = self.meeting_mut(index)?;
        match time {
            EditValue::Keep => {}
            EditValue::Reset => meeting.edited_start_time = None,
            EditValue::Set(t) => meeting.edited_start_time = Some(t),
        }
        match duration {
            EditValue::Keep => {}
            EditValue::Reset => meeting.edited_duration = None,
            EditValue::Set(d) => meeting.edited_duration = Some(d),
        }
        Ok(())
    }

    /// Set a per-meeting rate override. Independent of the edited flag.
    pub fn set_rate(&mut self, index: usize, rate: f64) -> Result<(), ConsistencyViolation> {
        self.meeting_mut(index)?.custom_rate = Some(rate);
        Ok(())
    }

    /// Look up a roster customer by email.
    pub fn customer_by_email(&self, email: &str) -> Result<&Customer, ConsistencyViolation> {
        self.roster
            .iter()
            .find(|c| c.email == email)
            .ok_or_else(|| ConsistencyViolation::UnknownCustomer(email.to_string()))
    }

    /// Record a new default hourly rate on the in-memory customer copies so
    /// every later amount calculation in this session sees it. External
    /// propagation is the caller's job and happens first.
    pub fn set_customer_rate(&mut self, email: &str, rate: f64) -> Result<(), ConsistencyViolation> {
        let customer = self
            .roster
            .iter_mut()
            .find(|c| c.email == email)
            .ok_or_else(|| ConsistencyViolation::UnknownCustomer(email.to_string()))?;
        customer
            .metadata
            .insert(HOURLY_RATE_KEY.to_string(), rate.to_string());
        let id = customer.id.clone();
        if let Some(group) = self.groups.iter_mut().find(|g| g.customer.id == id) {
            group
                .customer
                .metadata
                .insert(HOURLY_RATE_KEY.to_string(), rate.to_string());
        }
        Ok(())
    }

    /// Convert an unassociated meeting into a meeting under `email`'s
    /// customer: identifier recomputed from the customer's email,
    /// force-selected, flagged manual, removed from the unassociated list.
    /// Returns the new display index.
    pub fn assign(&mut self, index: usize, email: &str) -> Result<usize, ConsistencyViolation> {
        if index == 0 || index > self.unassociated.len() {
            return Err(ConsistencyViolation::UnknownUnassociated(index));
        }
        let customer = self.customer_by_email(email)?.clone();

        let unassoc = self.unassociated.remove(index - 1);
        let meeting = unassoc.into_meeting(&customer, self.identity_length);

        let gidx = match self.groups.iter().position(|g| g.customer.id == customer.id) {
            Some(gidx) => {
                self.groups[gidx].meetings.push(meeting);
                gidx
            }
            None => {
                self.groups.push(CustomerMeetings {
                    customer,
                    meetings: vec![meeting],
                });
                self.groups.len() - 1
            }
        };

        let before: usize = self.groups[..gidx].iter().map(|g| g.meetings.len()).sum();
        Ok(before + self.groups[gidx].meetings.len())
    }
}
