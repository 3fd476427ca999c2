//! Invoice-status resolution: the idempotency backbone.
//!
//! A meeting's identifier is embedded in the line-item description of any
//! invoice drafted for it. Scanning a customer's billing records for that
//! identifier tells us whether the meeting is unbilled, sitting on a draft,
//! or already on a finalized invoice, re-derived fresh every run so the
//! answer tracks the billing system even if records changed since last time.

use crate::ports::{BillingRecord, BillingStore, PortError};
use crate::types::InvoiceStatus;

/// Scan already-fetched records for a meeting identifier.
///
/// The first record with a line item containing the identifier decides:
/// draft state yields `Drafted`, any post-draft state yields `Finalized`.
/// No match anywhere yields `Unbilled`.
pub fn status_from_records(records: &[BillingRecord], meeting_id: &str) -> InvoiceStatus {
    for record in records {
        let mentioned = record
            .line_descriptions
            .iter()
            .any(|line| line.contains(meeting_id));
        if mentioned {
            return if record.state.is_draft() {
                InvoiceStatus::Drafted
            } else {
                InvoiceStatus::Finalized
            };
        }
    }
    InvoiceStatus::Unbilled
}

/// Fetch a customer's records and resolve one meeting's status.
///
/// Reconciliation fetches each customer's records once and calls
/// `status_from_records` per meeting; this wrapper exists for callers that
/// only need a single answer.
pub async fn resolve_status(
    store: &dyn BillingStore,
    customer_id: &str,
    meeting_id: &str,
) -> Result<InvoiceStatus, PortError> {
    let records = store.list_invoices(customer_id).await?;
    Ok(status_from_records(&records, meeting_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::RecordState;

    fn record(id: &str, state: RecordState, lines: &[&str]) -> BillingRecord {
        BillingRecord {
            id: id.into(),
            state,
            line_descriptions: lines.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_no_match_is_unbilled() {
        let records = [record(
            "in_1",
            RecordState::Draft,
            &["Kickoff - 2025-01-10 at 9:00 AM (1h @ $200/h) [ID:aaaabbbbcccc]"],
        )];
        assert_eq!(
            status_from_records(&records, "ddddeeeeffff"),
            InvoiceStatus::Unbilled
        );
        assert_eq!(status_from_records(&[], "ddddeeeeffff"), InvoiceStatus::Unbilled);
    }

    #[test]
    fn test_draft_record_yields_drafted() {
        let records = [record(
            "in_1",
            RecordState::Draft,
            &["Sync - 2025-01-15 at 2:00 PM (1h @ $200/h) [ID:meet12345678]"],
        )];
        assert_eq!(
            status_from_records(&records, "meet12345678"),
            InvoiceStatus::Drafted
        );
    }

    #[test]
    fn test_post_draft_states_yield_finalized() {
        for state in [
            RecordState::Open,
            RecordState::Paid,
            RecordState::Uncollectible,
            RecordState::Void,
            RecordState::Unknown,
        ] {
            let records = [record("in_1", state, &["[ID:meet12345678]"])];
            assert_eq!(
                status_from_records(&records, "meet12345678"),
                InvoiceStatus::Finalized,
                "state {state:?}"
            );
        }
    }

    #[test]
    fn test_first_matching_record_decides() {
        let records = [
            record("in_1", RecordState::Open, &["[ID:meet12345678]"]),
            record("in_2", RecordState::Draft, &["[ID:meet12345678]"]),
        ];
        assert_eq!(
            status_from_records(&records, "meet12345678"),
            InvoiceStatus::Finalized
        );
    }

    #[test]
    fn test_identifier_matches_as_substring_of_line() {
        let records = [record(
            "in_1",
            RecordState::Draft,
            &["prefix text [ID:meet12345678] suffix", "unrelated line"],
        )];
        assert_eq!(
            status_from_records(&records, "meet12345678"),
            InvoiceStatus::Drafted
        );
    }
}
