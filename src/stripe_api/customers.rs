//! Stripe Customers API: roster listing and rate updates.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::{StripeApiError, StripeClient, PAGE_LIMIT};
use crate::ports::{CustomerSource, PortError};
use crate::types::{Customer, HOURLY_RATE_KEY};

#[derive(Debug, Deserialize)]
struct CustomerListResponse {
    #[serde(default)]
    data: Vec<StripeCustomerRaw>,
    #[serde(default)]
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct StripeCustomerRaw {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl StripeCustomerRaw {
    /// Customers without an email cannot be matched to meetings and are
    /// dropped; emails are lowercased to form the matching key.
    fn into_customer(self) -> Option<Customer> {
        let email = self.email?.trim().to_lowercase();
        if email.is_empty() {
            return None;
        }
        Some(Customer {
            id: self.id,
            email,
            name: self.name.unwrap_or_else(|| "Unknown".to_string()),
            metadata: self.metadata,
        })
    }
}

impl StripeClient {
    /// Fetch the full roster, following `starting_after` cursors.
    pub async fn fetch_customers(&self) -> Result<Vec<Customer>, StripeApiError> {
        let mut customers = Vec::new();
        let mut starting_after: Option<String> = None;

        loop {
            let mut query = vec![("limit", PAGE_LIMIT.to_string())];
            if let Some(cursor) = &starting_after {
                query.push(("starting_after", cursor.clone()));
            }

            let body = self.get_json("/v1/customers", &query).await?;
            let page: CustomerListResponse = serde_json::from_value(body)
                .map_err(|e| StripeApiError::Api {
                    status: 200,
                    message: format!("unexpected customer list payload: {e}"),
                })?;

            let last_id = page.data.last().map(|c| c.id.clone());
            customers.extend(page.data.into_iter().filter_map(StripeCustomerRaw::into_customer));

            if !page.has_more {
                break;
            }
            match last_id {
                Some(id) => starting_after = Some(id),
                None => break,
            }
        }

        log::info!("fetched {} customer(s) with email addresses", customers.len());
        Ok(customers)
    }

    /// Write the hourly rate into the customer's metadata.
    pub async fn set_customer_rate(
        &self,
        customer_id: &str,
        rate: f64,
    ) -> Result<(), StripeApiError> {
        let key = format!("metadata[{HOURLY_RATE_KEY}]");
        let form = [(key.as_str(), rate.to_string())];
        self.post_form(&format!("/v1/customers/{customer_id}"), &form)
            .await?;
        log::info!("set hourly rate for customer {customer_id}: ${rate}/hour");
        Ok(())
    }
}

#[async_trait]
impl CustomerSource for StripeClient {
    async fn list_customers(&self) -> Result<Vec<Customer>, PortError> {
        Ok(self.fetch_customers().await?)
    }

    async fn update_customer_rate(&self, customer_id: &str, rate: f64) -> Result<(), PortError> {
        Ok(self.set_customer_rate(customer_id, rate).await?)
    }
}
