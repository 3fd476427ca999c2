//! Stripe Invoices API: the billing record store.
//!
//! Read side: invoices plus their line-item descriptions, which the status
//! resolver scans for embedded meeting identifiers. Write side: draft
//! creation and line items in integer minor units.

use async_trait::async_trait;
use serde::Deserialize;

use super::{StripeApiError, StripeClient, PAGE_LIMIT};
use crate::ports::{BillingRecord, BillingStore, PortError, RecordState};

/// Drafts are sent manually from the dashboard, due 30 days after sending.
const DAYS_UNTIL_DUE: u32 = 30;

#[derive(Debug, Deserialize)]
struct InvoiceListResponse {
    #[serde(default)]
    data: Vec<StripeInvoiceRaw>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct StripeInvoiceRaw {
    id: String,
    #[serde(default)]
    status: Option<RecordState>,
}

#[derive(Debug, Deserialize)]
struct LineItemListResponse {
    #[serde(default)]
    data: Vec<LineItemRaw>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct LineItemRaw {
    id: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedInvoice {
    id: String,
}

impl StripeClient {
    /// All invoices for a customer with their line-item descriptions.
    pub async fn fetch_invoices(
        &self,
        customer_id: &str,
    ) -> Result<Vec<BillingRecord>, StripeApiError> {
        let mut records = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![
                ("customer", customer_id.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let body = self.get_json("/v1/invoices", &query).await?;
            let page: InvoiceListResponse =
                serde_json::from_value(body).map_err(|e| StripeApiError::Api {
                    status: 200,
                    message: format!("unexpected invoice list payload: {e}"),
                })?;

            let last_id = page.data.last().map(|i| i.id.clone());
            for invoice in page.data {
                let line_descriptions = self.fetch_line_descriptions(&invoice.id).await?;
                records.push(BillingRecord {
                    id: invoice.id,
                    state: invoice.status.unwrap_or(RecordState::Unknown),
                    line_descriptions,
                });
            }

            if !page.has_more {
                break;
            }
            match last_id {
                Some(id) => starting_after = Some(id),
                None => break,
            }
        }

        Ok(records)
    }

    async fn fetch_line_descriptions(
        &self,
        invoice_id: &str,
    ) -> Result<Vec<String>, StripeApiError> {
        let mut descriptions = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let body = self
                .get_json(&format!("/v1/invoices/{invoice_id}/lines"), &query)
                .await?;
            let page: LineItemListResponse =
                serde_json::from_value(body).map_err(|e| StripeApiError::Api {
                    status: 200,
                    message: format!("unexpected line item payload: {e}"),
                })?;

            let last_id = page.data.last().map(|l| l.id.clone());
            descriptions.extend(page.data.into_iter().filter_map(|l| l.description));

            if !page.has_more {
                break;
            }
            match last_id {
                Some(id) => starting_after = Some(id),
                None => break,
            }
        }

        Ok(descriptions)
    }

    /// Create an empty draft invoice for manual review and sending.
    pub async fn create_draft(
        &self,
        customer_id: &str,
        description: &str,
    ) -> Result<String, StripeApiError> {
        let form = [
            ("customer", customer_id.to_string()),
            ("auto_advance", "false".to_string()),
            ("collection_method", "send_invoice".to_string()),
            ("days_until_due", DAYS_UNTIL_DUE.to_string()),
            ("description", description.to_string()),
        ];
        let body = self.post_form("/v1/invoices", &form).await?;
        let created: CreatedInvoice =
            serde_json::from_value(body).map_err(|e| StripeApiError::Api {
                status: 200,
                message: format!("unexpected create-invoice payload: {e}"),
            })?;
        Ok(created.id)
    }

    /// Attach a line item to a draft invoice. `amount` is in minor units.
    pub async fn create_line_item(
        &self,
        customer_id: &str,
        invoice_id: &str,
        amount_minor_units: i64,
        currency: &str,
        description: &str,
    ) -> Result<(), StripeApiError> {
        let form = [
            ("customer", customer_id.to_string()),
            ("invoice", invoice_id.to_string()),
            ("amount", amount_minor_units.to_string()),
            ("currency", currency.to_string()),
            ("description", description.to_string()),
        ];
        self.post_form("/v1/invoiceitems", &form).await?;
        Ok(())
    }
}

#[async_trait]
impl BillingStore for StripeClient {
    async fn list_invoices(&self, customer_id: &str) -> Result<Vec<BillingRecord>, PortError> {
        Ok(self.fetch_invoices(customer_id).await?)
    }

    async fn create_draft_invoice(
        &self,
        customer_id: &str,
        description: &str,
    ) -> Result<String, PortError> {
        Ok(self.create_draft(customer_id, description).await?)
    }

    async fn add_line_item(
        &self,
        customer_id: &str,
        record_id: &str,
        amount_minor_units: i64,
        currency: &str,
        description: &str,
    ) -> Result<(), PortError> {
        Ok(self
            .create_line_item(customer_id, record_id, amount_minor_units, currency, description)
            .await?)
    }
}
