//! Collaborator ports: the seams between the reconciliation core and the
//! external systems it reads from and writes to.
//!
//! Everything downstream of `main` consumes these traits, never the concrete
//! clients, so tests substitute in-memory fakes and the core stays free of
//! wire-format knowledge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{CalendarEvent, Customer};

/// Failure surfaced by any collaborator call. Callers decide whether to
/// degrade (status lookups), report (emission) or abort (roster fetch).
#[derive(Debug, Error)]
pub enum PortError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("authentication failed: {0}")]
    Auth(String),
}

/// Lifecycle state of a billing record as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Draft,
    Open,
    Paid,
    Uncollectible,
    Void,
    #[serde(other)]
    Unknown,
}

impl RecordState {
    pub fn is_draft(self) -> bool {
        matches!(self, RecordState::Draft)
    }
}

/// A billing record (invoice) with the line-item descriptions the status
/// resolver scans for embedded meeting identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingRecord {
    pub id: String,
    pub state: RecordState,
    pub line_descriptions: Vec<String>,
}

/// Source of the customer roster, plus the one write-back this tool performs
/// on customers: updating the default hourly rate.
#[async_trait]
pub trait CustomerSource {
    /// All customers that have an email address, emails lowercased.
    async fn list_customers(&self) -> Result<Vec<Customer>, PortError>;

    /// Persist a new default hourly rate on the customer record.
    async fn update_customer_rate(&self, customer_id: &str, rate: f64) -> Result<(), PortError>;
}

/// Source of calendar events for a time window, ordered by start time.
#[async_trait]
pub trait CalendarSource {
    async fn list_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, PortError>;
}

/// The billing record store: read side for status resolution, write side for
/// draft emission. Amounts cross this boundary in integer minor currency
/// units (cents).
#[async_trait]
pub trait BillingStore {
    async fn list_invoices(&self, customer_id: &str) -> Result<Vec<BillingRecord>, PortError>;

    /// Create an empty draft invoice; returns the new record's identifier.
    async fn create_draft_invoice(
        &self,
        customer_id: &str,
        description: &str,
    ) -> Result<String, PortError>;

    async fn add_line_item(
        &self,
        customer_id: &str,
        record_id: &str,
        amount_minor_units: i64,
        currency: &str,
        description: &str,
    ) -> Result<(), PortError>;
}
