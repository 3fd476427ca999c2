//! Draft-invoice emission for the confirmed selection.
//!
//! One draft per customer with a selected meeting, one line item per
//! meeting. Emission is not transactional: a failure is recorded and
//! reported, never rolled back; at-least-once per meeting is the operative
//! guarantee, and the embedded identifier plus status resolution prevent
//! duplicate billing on the next run.

use crate::ports::{BillingStore, PortError};
use crate::reconcile::CustomerMeetings;
use crate::types::Meeting;

/// Convert a currency amount to integer minor units (cents), rounding half
/// up. This is the single, externally visible monetary rounding rule.
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0 + 0.5).floor() as i64
}

/// The line-item description emitted for a meeting.
///
/// Embeds synopsis, effective date/time, effective duration, effective rate
/// and the bracketed identifier tag. The `[ID:...]` tag is what status
/// resolution scans for on later runs; its format must never change.
pub fn line_item_description(meeting: &Meeting, customer_default_rate: f64) -> String {
    format!(
        "{} - {} at {} ({}h @ ${}/h) [ID:{}]",
        meeting.synopsis_or_title(),
        meeting.date,
        meeting.effective_time(),
        meeting.effective_duration(),
        meeting.effective_rate(customer_default_rate),
        meeting.id
    )
}

/// One successfully created draft.
#[derive(Debug, Clone)]
pub struct CustomerEmission {
    pub customer_id: String,
    pub customer_name: String,
    pub record_id: String,
    pub line_count: usize,
    pub total_minor_units: i64,
}

/// One failure during emission, attributed to a customer (and meeting, for
/// line-item failures).
#[derive(Debug, Clone)]
pub struct EmissionFailure {
    pub customer_name: String,
    pub detail: String,
}

/// The explicit partial-success report for one emission pass.
#[derive(Debug, Clone, Default)]
pub struct EmissionReport {
    pub created: Vec<CustomerEmission>,
    pub failures: Vec<EmissionFailure>,
}

impl EmissionReport {
    pub fn total_minor_units(&self) -> i64 {
        self.created.iter().map(|c| c.total_minor_units).sum()
    }
}

/// Create draft invoices for every customer with selected meetings.
pub async fn emit_invoices(
    store: &dyn BillingStore,
    groups: &[CustomerMeetings],
    default_rate: f64,
    currency: &str,
) -> EmissionReport {
    let mut report = EmissionReport::default();

    for group in groups {
        let selected: Vec<&Meeting> = group.meetings.iter().filter(|m| m.selected).collect();
        if selected.is_empty() {
            continue;
        }

        let customer = &group.customer;
        let rate = customer.hourly_rate(default_rate);
        let invoice_description = format!(
            "Consultation services for {} meeting(s) @ ${}/hour",
            selected.len(),
            rate
        );

        let record_id = match store
            .create_draft_invoice(&customer.id, &invoice_description)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                log::error!("draft creation failed for {}: {e}", customer.name);
                report.failures.push(EmissionFailure {
                    customer_name: customer.name.clone(),
                    detail: failure_detail("creating draft invoice", &e),
                });
                continue;
            }
        };

        let mut line_count = 0;
        let mut total_minor = 0i64;
        for meeting in selected {
            let amount_minor = to_minor_units(meeting.amount(rate));
            let description = line_item_description(meeting, rate);
            match store
                .add_line_item(&customer.id, &record_id, amount_minor, currency, &description)
                .await
            {
                Ok(()) => {
                    line_count += 1;
                    total_minor += amount_minor;
                    log::info!(
                        "added line item for {}: {} ({} minor units)",
                        customer.name,
                        meeting.synopsis_or_title(),
                        amount_minor
                    );
                }
                Err(e) => {
                    log::error!(
                        "line item failed for {} / {}: {e}",
                        customer.name,
                        meeting.synopsis_or_title()
                    );
                    report.failures.push(EmissionFailure {
                        customer_name: customer.name.clone(),
                        detail: failure_detail(
                            &format!("adding line item '{}'", meeting.synopsis_or_title()),
                            &e,
                        ),
                    });
                }
            }
        }

        log::info!(
            "created draft {} for {} with {} line item(s)",
            record_id,
            customer.name,
            line_count
        );
        report.created.push(CustomerEmission {
            customer_id: customer.id.clone(),
            customer_name: customer.name.clone(),
            record_id,
            line_count,
            total_minor_units: total_minor,
        });
    }

    report
}

fn failure_detail(action: &str, error: &PortError) -> String {
    format!("{action}: {error}")
}
