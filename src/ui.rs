//! Interactive operator console.
//!
//! Line-based prompt loop over injected reader/writer handles, so tests can
//! drive a whole session from a string. The loop parses each line into a
//! typed command, applies it to the session, and prints the outcome;
//! rendering happens on request (`list`) rather than after every mutation.

use std::io::{BufRead, Write};

use crate::commands::{parse_command, Command, COMMAND_REFERENCE};
use crate::emit::EmissionReport;
use crate::parsers::{parse_duration_input, parse_time_input};
use crate::ports::CustomerSource;
use crate::session::{EditValue, Session};

const RULE: &str =
    "================================================================================";

/// Render the full meeting listing.
pub fn render_listing<W: Write>(session: &Session, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "\n{RULE}")?;
    writeln!(out, "CUSTOMER MEETINGS - INVOICE SELECTION")?;
    writeln!(out, "{RULE}")?;

    let mut index = 0;
    for group in session.groups() {
        let customer = &group.customer;
        let rate = customer.hourly_rate(session.default_rate());
        writeln!(out, "\n{} ({}) - ${}/hour", customer.name, customer.email, rate)?;

        for meeting in &group.meetings {
            index += 1;
            let marker = if meeting.selected { "[x]" } else { "[ ]" };
            let mut notes = String::new();
            if meeting.is_edited() {
                notes.push_str(" (edited)");
            }
            if meeting.custom_rate.is_some() {
                notes.push_str(" (custom rate)");
            }
            if meeting.manually_assigned {
                notes.push_str(" (manual)");
            }
            writeln!(
                out,
                "{index:3}. {marker} {:<9} {}{notes}",
                meeting.status.as_str(),
                meeting.title
            )?;
            writeln!(
                out,
                "         {} at {} ({}h) - ${:.2}",
                meeting.date,
                meeting.effective_time(),
                meeting.effective_duration(),
                meeting.amount(rate)
            )?;
        }
    }

    if !session.unassociated().is_empty() {
        writeln!(out, "\nUnassociated meetings (assign u<n> <customer-email>):")?;
        for (i, meeting) in session.unassociated().iter().enumerate() {
            writeln!(out, "u{:2}. {}", i + 1, meeting.title)?;
            writeln!(
                out,
                "         {} at {} ({}h)",
                meeting.date, meeting.time, meeting.duration
            )?;
            if !meeting.attendees.is_empty() {
                writeln!(out, "         attendees: {}", meeting.attendees.join(", "))?;
            }
            if !meeting.description_preview.is_empty() {
                writeln!(out, "         {}", meeting.description_preview)?;
            }
        }
    }

    writeln!(out)?;
    Ok(())
}

/// Run the curation loop until the operator continues, quits, or input ends.
/// Returns true when the operator confirmed emission.
pub async fn run_session<R: BufRead, W: Write>(
    session: &mut Session,
    customers: &dyn CustomerSource,
    input: &mut R,
    out: &mut W,
) -> std::io::Result<bool> {
    render_listing(session, out)?;
    writeln!(out, "{COMMAND_REFERENCE}")?;

    loop {
        write!(out, "\n> ")?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            writeln!(out, "\nInput closed; exiting without invoicing.")?;
            return Ok(false);
        };

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                writeln!(out, "{e}")?;
                continue;
            }
        };

        match command {
            Command::Quit => {
                writeln!(out, "Exiting without creating any invoices.")?;
                return Ok(false);
            }
            Command::Continue => break,
            Command::Help => writeln!(out, "{COMMAND_REFERENCE}")?,
            Command::List => render_listing(session, out)?,
            Command::Toggle(index) => match session.toggle(index) {
                Ok(true) => writeln!(out, "Selected meeting {index}")?,
                Ok(false) => writeln!(out, "Deselected meeting {index}")?,
                Err(v) => writeln!(out, "{v}")?,
            },
            Command::ToggleUnassociated(index) => {
                // Always rejected; the violation explains what to do instead.
                if let Err(v) = session.toggle_unassociated(index) {
                    writeln!(out, "{v}")?;
                }
            }
            Command::SelectAll => {
                let count = session.select_all_unbilled();
                writeln!(out, "Selected all {count} unbilled meeting(s)")?;
            }
            Command::DeselectAll => {
                session.deselect_all();
                writeln!(out, "Deselected all meetings")?;
            }
            Command::Edit(index) => edit_dialog(session, index, input, out)?,
            Command::Rate { index, rate } => match session.set_rate(index, rate) {
                Ok(()) => writeln!(out, "Meeting {index} now billed at ${rate}/hour")?,
                Err(v) => writeln!(out, "{v}")?,
            },
            Command::SetCustomerRate { email, rate } => {
                let customer_id = match session.customer_by_email(&email) {
                    Ok(customer) => customer.id.clone(),
                    Err(v) => {
                        writeln!(out, "{v}")?;
                        continue;
                    }
                };
                match customers.update_customer_rate(&customer_id, rate).await {
                    Ok(()) => {
                        // In-memory copy changes only once the external
                        // write has stuck.
                        if session.set_customer_rate(&email, rate).is_ok() {
                            writeln!(out, "Default rate for {email} is now ${rate}/hour")?;
                        }
                    }
                    Err(e) => writeln!(out, "Rate update failed: {e}")?,
                }
            }
            Command::Assign { index, email } => match session.assign(index, &email) {
                Ok(new_index) => writeln!(
                    out,
                    "Assigned to {email}; now meeting {new_index}, selected"
                )?,
                Err(v) => writeln!(out, "{v}")?,
            },
        }
    }

    if !session.has_selection() {
        writeln!(out, "No meetings selected; nothing to invoice.")?;
        return Ok(false);
    }

    collect_synopses(session, input, out)?;
    confirm(session, input, out)
}

/// Two-prompt sub-dialog for `edit`: start time, then duration. Empty input
/// keeps the current value, `original` clears the override; a parse failure
/// aborts the whole edit with nothing changed.
fn edit_dialog<R: BufRead, W: Write>(
    session: &mut Session,
    index: usize,
    input: &mut R,
    out: &mut W,
) -> std::io::Result<()> {
    let (current_time, current_duration) = match session.meeting(index) {
        Ok((_, meeting)) => (meeting.effective_time(), meeting.effective_duration()),
        Err(v) => {
            writeln!(out, "{v}")?;
            return Ok(());
        }
    };

    write!(out, "New start time [{current_time}] ('original' resets): ")?;
    out.flush()?;
    let Some(line) = read_line(input)? else {
        return Ok(());
    };
    let time = if line.trim().eq_ignore_ascii_case("original") {
        EditValue::Reset
    } else {
        match parse_time_input(&line) {
            Ok(None) => EditValue::Keep,
            Ok(Some(t)) => EditValue::Set(t),
            Err(e) => {
                writeln!(out, "{e}")?;
                writeln!(out, "Edit cancelled; meeting unchanged.")?;
                return Ok(());
            }
        }
    };

    write!(out, "New duration [{current_duration}h] ('original' resets): ")?;
    out.flush()?;
    let Some(line) = read_line(input)? else {
        return Ok(());
    };
    let duration = if line.trim().eq_ignore_ascii_case("original") {
        EditValue::Reset
    } else {
        match parse_duration_input(&line) {
            Ok(None) => EditValue::Keep,
            Ok(Some(d)) => EditValue::Set(d),
            Err(e) => {
                writeln!(out, "{e}")?;
                writeln!(out, "Edit cancelled; meeting unchanged.")?;
                return Ok(());
            }
        }
    };

    match session.edit(index, time, duration) {
        Ok(()) => writeln!(out, "Meeting {index} updated")?,
        Err(v) => writeln!(out, "{v}")?,
    }
    Ok(())
}

/// Prompt for a synopsis for each selected meeting; empty input keeps the
/// meeting title.
fn collect_synopses<R: BufRead, W: Write>(
    session: &mut Session,
    input: &mut R,
    out: &mut W,
) -> std::io::Result<()> {
    writeln!(out, "\n{RULE}")?;
    writeln!(out, "MEETING SYNOPSIS ENTRY")?;
    writeln!(out, "{RULE}")?;
    writeln!(
        out,
        "The synopsis goes into the invoice line item. Enter keeps the meeting title."
    )?;

    for group in session.groups_mut() {
        if !group.meetings.iter().any(|m| m.selected) {
            continue;
        }
        writeln!(out, "\n{} ({})", group.customer.name, group.customer.email)?;
        for meeting in group.meetings.iter_mut().filter(|m| m.selected) {
            writeln!(
                out,
                "  {} - {} at {} ({}h)",
                meeting.title,
                meeting.date,
                meeting.effective_time(),
                meeting.effective_duration()
            )?;
            write!(out, "  Synopsis [{}]: ", meeting.title)?;
            out.flush()?;
            let Some(line) = read_line(input)? else {
                return Ok(());
            };
            let line = line.trim();
            if !line.is_empty() {
                meeting.synopsis = line.to_string();
            }
        }
    }
    Ok(())
}

/// Show the emission summary and ask for a y/n confirmation.
fn confirm<R: BufRead, W: Write>(
    session: &Session,
    input: &mut R,
    out: &mut W,
) -> std::io::Result<bool> {
    writeln!(out, "\n{RULE}")?;
    writeln!(out, "INVOICE CONFIRMATION")?;
    writeln!(out, "{RULE}")?;

    let mut customer_count = 0;
    let mut total_meetings = 0;
    let mut total_amount = 0.0;
    for group in session.groups() {
        let selected: Vec<_> = group.meetings.iter().filter(|m| m.selected).collect();
        if selected.is_empty() {
            continue;
        }
        customer_count += 1;
        let rate = group.customer.hourly_rate(session.default_rate());
        let customer_amount: f64 = selected.iter().map(|m| m.amount(rate)).sum();
        let customer_hours: f64 = selected.iter().map(|m| m.effective_duration()).sum();

        writeln!(out, "\n{} ({})", group.customer.name, group.customer.email)?;
        writeln!(
            out,
            "  {} meeting(s), {customer_hours}h, ${customer_amount:.2} at ${rate}/hour default",
            selected.len()
        )?;
        for meeting in &selected {
            writeln!(
                out,
                "  - {} | {} at {} ({}h) - ${:.2}",
                meeting.synopsis_or_title(),
                meeting.date,
                meeting.effective_time(),
                meeting.effective_duration(),
                meeting.amount(rate)
            )?;
        }

        total_meetings += selected.len();
        total_amount += customer_amount;
    }

    writeln!(out, "\nTotal: {total_meetings} meeting(s), ${total_amount:.2}")?;

    loop {
        write!(
            out,
            "\nCreate {customer_count} draft invoice(s) covering {total_meetings} meeting(s)? (y/n): "
        )?;
        out.flush()?;
        let Some(line) = read_line(input)? else {
            return Ok(false);
        };
        match line.trim().to_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => {
                writeln!(out, "Invoice creation cancelled.")?;
                return Ok(false);
            }
            _ => writeln!(out, "Please enter 'y' or 'n'.")?,
        }
    }
}

/// Print the emission outcome, successes and failures both.
pub fn render_report<W: Write>(report: &EmissionReport, out: &mut W) -> std::io::Result<()> {
    writeln!(out)?;
    for emission in &report.created {
        writeln!(
            out,
            "Created draft {} for {}: {} line item(s), ${:.2}",
            emission.record_id,
            emission.customer_name,
            emission.line_count,
            emission.total_minor_units as f64 / 100.0
        )?;
    }
    for failure in &report.failures {
        writeln!(out, "FAILED for {}: {}", failure.customer_name, failure.detail)?;
    }
    if report.failures.is_empty() {
        writeln!(
            out,
            "Done: {} draft invoice(s) ready for review in the billing dashboard.",
            report.created.len()
        )?;
    } else {
        writeln!(
            out,
            "Partial success: {} draft(s) created, {} failure(s). Nothing was rolled back; \
             re-run after fixing the errors; already-drafted meetings will not be re-billed.",
            report.created.len(),
            report.failures.len()
        )?;
    }
    Ok(())
}

/// Read one line; Ok(None) means the input is exhausted.
fn read_line<R: BufRead>(input: &mut R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    use crate::config::Config;
    use crate::ports::PortError;
    use crate::reconcile::{CustomerMeetings, ReconcileOutcome};
    use crate::types::{
        Customer, DetectionSource, InvoiceStatus, Meeting, UnassociatedMeeting,
    };

    #[derive(Default)]
    struct FakeCustomers {
        rate_updates: Mutex<Vec<(String, f64)>>,
        fail_updates: bool,
    }

    #[async_trait]
    impl CustomerSource for FakeCustomers {
        async fn list_customers(&self) -> Result<Vec<Customer>, PortError> {
            Ok(vec![])
        }

        async fn update_customer_rate(&self, customer_id: &str, rate: f64) -> Result<(), PortError> {
            if self.fail_updates {
                return Err(PortError::Transport("offline".into()));
            }
            self.rate_updates
                .lock()
                .unwrap()
                .push((customer_id.to_string(), rate));
            Ok(())
        }
    }

    fn customer(id: &str, name: &str, email: &str) -> Customer {
        Customer {
            id: id.into(),
            email: email.into(),
            name: name.into(),
            metadata: HashMap::new(),
        }
    }

    fn meeting(title: &str, status: InvoiceStatus) -> Meeting {
        Meeting::new(
            format!("id-{title}"),
            title.into(),
            "2025-01-15".into(),
            "2:00 PM".into(),
            1.0,
            "2025-01-15T14:00:00".into(),
            "2025-01-15T15:00:00".into(),
            status,
            DetectionSource::Attendee,
        )
    }

    fn session() -> Session {
        let alice = customer("cus_1", "Alice", "alice@x.com");
        let outcome = ReconcileOutcome {
            groups: vec![CustomerMeetings {
                customer: alice.clone(),
                meetings: vec![
                    meeting("Strategy Session", InvoiceStatus::Unbilled),
                    meeting("Old Sync", InvoiceStatus::Drafted),
                ],
            }],
            unassociated: vec![UnassociatedMeeting::new(
                "prov".into(),
                "Mystery".into(),
                "2025-01-16".into(),
                "3:00 PM".into(),
                0.5,
                "2025-01-16T15:00:00".into(),
                "2025-01-16T15:30:00".into(),
                vec!["stranger@elsewhere.com".into()],
                "",
            )],
        };
        Session::new(vec![alice], outcome, &Config::default())
    }

    async fn drive(session: &mut Session, script: &str) -> (bool, String) {
        let customers = FakeCustomers::default();
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let confirmed = run_session(session, &customers, &mut input, &mut out)
            .await
            .unwrap();
        (confirmed, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn test_quit_confirms_nothing() {
        let mut s = session();
        let (confirmed, output) = drive(&mut s, "quit\n").await;
        assert!(!confirmed);
        assert!(output.contains("Exiting without creating any invoices."));
    }

    #[tokio::test]
    async fn test_eof_is_a_quit() {
        let mut s = session();
        let (confirmed, _) = drive(&mut s, "").await;
        assert!(!confirmed);
    }

    #[tokio::test]
    async fn test_full_flow_with_synopsis_and_confirmation() {
        let mut s = session();
        // Meeting 1 is selected by default; continue, enter a synopsis, confirm.
        let (confirmed, output) = drive(&mut s, "continue\nDiscussed Q1 roadmap\ny\n").await;
        assert!(confirmed);
        assert_eq!(s.groups()[0].meetings[0].synopsis, "Discussed Q1 roadmap");
        assert!(output.contains("INVOICE CONFIRMATION"));
        assert!(output.contains("$200.00") || output.contains("$250.00"));
    }

    #[tokio::test]
    async fn test_empty_synopsis_keeps_title() {
        let mut s = session();
        let (confirmed, _) = drive(&mut s, "continue\n\ny\n").await;
        assert!(confirmed);
        assert_eq!(s.groups()[0].meetings[0].synopsis, "");
        assert_eq!(
            s.groups()[0].meetings[0].synopsis_or_title(),
            "Strategy Session"
        );
    }

    #[tokio::test]
    async fn test_declining_confirmation_aborts() {
        let mut s = session();
        let (confirmed, output) = drive(&mut s, "continue\n\nmaybe\nn\n").await;
        assert!(!confirmed);
        assert!(output.contains("Please enter 'y' or 'n'."));
        assert!(output.contains("Invoice creation cancelled."));
    }

    #[tokio::test]
    async fn test_toggle_then_nothing_selected() {
        let mut s = session();
        let (confirmed, output) = drive(&mut s, "1\ncontinue\n").await;
        assert!(!confirmed);
        assert!(output.contains("Deselected meeting 1"));
        assert!(output.contains("No meetings selected; nothing to invoice."));
    }

    #[tokio::test]
    async fn test_drafted_meeting_toggle_rejected() {
        let mut s = session();
        let (_, output) = drive(&mut s, "2\nquit\n").await;
        assert!(output.contains("already drafted"));
        assert!(!s.groups()[0].meetings[1].selected);
    }

    #[tokio::test]
    async fn test_unassociated_toggle_rejected_then_assign_selects() {
        let mut s = session();
        let (_, output) = drive(&mut s, "u1\nassign u1 alice@x.com\nquit\n").await;
        assert!(output.contains("must be assigned to a customer"));
        assert!(output.contains("Assigned to alice@x.com"));
        assert!(s.unassociated().is_empty());
        let assigned = &s.groups()[0].meetings[2];
        assert!(assigned.selected);
        assert!(assigned.manually_assigned);
    }

    #[tokio::test]
    async fn test_edit_dialog_sets_overrides() {
        let mut s = session();
        let (_, output) = drive(&mut s, "edit 1\n3:30 PM\n2.5\nquit\n").await;
        assert!(output.contains("Meeting 1 updated"));
        let m = &s.groups()[0].meetings[0];
        assert_eq!(m.edited_start_time, chrono::NaiveTime::from_hms_opt(15, 30, 0));
        assert_eq!(m.edited_duration, Some(2.5));
    }

    #[tokio::test]
    async fn test_edit_dialog_keep_and_reset() {
        let mut s = session();
        // Set both, then reset both via 'original'.
        drive(&mut s, "edit 1\n3:30 PM\n2.5\nquit\n").await;
        drive(&mut s, "edit 1\noriginal\noriginal\nquit\n").await;
        let m = &s.groups()[0].meetings[0];
        assert!(!m.is_edited());

        // Empty input keeps current values.
        drive(&mut s, "edit 1\n\n1.5\nquit\n").await;
        let m = &s.groups()[0].meetings[0];
        assert_eq!(m.edited_start_time, None);
        assert_eq!(m.edited_duration, Some(1.5));
    }

    #[tokio::test]
    async fn test_edit_dialog_aborts_on_bad_input() {
        let mut s = session();
        let (_, output) = drive(&mut s, "edit 1\n25:00\nquit\n").await;
        assert!(output.contains("unable to parse time"));
        assert!(output.contains("Edit cancelled; meeting unchanged."));
        assert!(!s.groups()[0].meetings[0].is_edited());
    }

    #[tokio::test]
    async fn test_rate_command_sets_custom_rate() {
        let mut s = session();
        let (_, output) = drive(&mut s, "rate 1 300\nquit\n").await;
        assert!(output.contains("billed at $300/hour"));
        assert_eq!(s.groups()[0].meetings[0].custom_rate, Some(300.0));
    }

    #[tokio::test]
    async fn test_setrate_propagates_then_updates_memory() {
        let mut s = session();
        let customers = FakeCustomers::default();
        let mut input = Cursor::new(b"setrate alice@x.com 300\nquit\n".to_vec());
        let mut out = Vec::new();
        run_session(&mut s, &customers, &mut input, &mut out)
            .await
            .unwrap();
        assert_eq!(
            *customers.rate_updates.lock().unwrap(),
            vec![("cus_1".to_string(), 300.0)]
        );
        let (customer, _) = s.meeting(1).unwrap();
        assert_eq!(customer.hourly_rate(s.default_rate()), 300.0);
    }

    #[tokio::test]
    async fn test_setrate_failure_leaves_memory_untouched() {
        let mut s = session();
        let customers = FakeCustomers {
            fail_updates: true,
            ..Default::default()
        };
        let mut input = Cursor::new(b"setrate alice@x.com 300\nquit\n".to_vec());
        let mut out = Vec::new();
        run_session(&mut s, &customers, &mut input, &mut out)
            .await
            .unwrap();
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Rate update failed"));
        let (customer, _) = s.meeting(1).unwrap();
        assert_eq!(customer.hourly_rate(s.default_rate()), s.default_rate());
    }

    #[tokio::test]
    async fn test_unknown_command_reprompts() {
        let mut s = session();
        let (_, output) = drive(&mut s, "frobnicate\nquit\n").await;
        assert!(output.contains("unrecognized command 'frobnicate'"));
    }

    #[tokio::test]
    async fn test_listing_shows_effective_values() {
        let mut s = session();
        s.set_rate(1, 300.0).unwrap();
        s.edit(
            1,
            crate::session::EditValue::Keep,
            crate::session::EditValue::Set(2.0),
        )
        .unwrap();
        let mut out = Vec::new();
        render_listing(&s, &mut out).unwrap();
        let output = String::from_utf8(out).unwrap();
        // 2h at the $300 override.
        assert!(output.contains("$600.00"));
        assert!(output.contains("(edited)"));
        assert!(output.contains("(custom rate)"));
        assert!(output.contains("u 1. Mystery"));
    }
}
