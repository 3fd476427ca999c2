//! meetledger: reconcile billing customers with calendar meetings and
//! draft invoices for the confirmed set.
//!
//! The core pipeline: fetch the customer roster and a calendar window,
//! derive one `Meeting` per (customer, event) match with an idempotent
//! invoice status, let the operator curate the selection interactively, and
//! emit one draft invoice per customer. Meeting identifiers embedded in
//! line-item descriptions make re-runs safe: already-drafted and finalized
//! meetings are recognized and never re-billed.

pub mod app;
pub mod commands;
pub mod config;
pub mod emit;
pub mod error;
pub mod extract;
pub mod google_api;
pub mod identity;
pub mod parsers;
pub mod ports;
pub mod reconcile;
pub mod session;
pub mod status;
pub mod stripe_api;
pub mod types;
pub mod ui;
