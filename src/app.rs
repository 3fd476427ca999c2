//! Run orchestration: fetch, reconcile, curate, emit.
//!
//! Each stage is a blocking request/response against one collaborator.
//! Roster and calendar fetch failures end the run (there is nothing to
//! reconcile without them); everything downstream degrades or reports
//! per item instead of aborting.

use std::io::{BufRead, Write};

use chrono::{Duration, Utc};

use crate::config::Config;
use crate::emit::emit_invoices;
use crate::error::AppError;
use crate::ports::{BillingStore, CalendarSource, CustomerSource};
use crate::reconcile::reconcile;
use crate::session::Session;
use crate::ui;

/// Run one full reconciliation-and-invoicing session.
pub async fn run_automation<R: BufRead, W: Write>(
    config: &Config,
    customers_src: &dyn CustomerSource,
    calendar_src: &dyn CalendarSource,
    billing: &dyn BillingStore,
    input: &mut R,
    out: &mut W,
) -> Result<(), AppError> {
    log::info!(
        "starting invoice run: {} day lookback, default rate ${}/hour",
        config.days_back,
        config.default_hourly_rate
    );

    let roster = customers_src.list_customers().await?;
    if roster.is_empty() {
        writeln!(out, "No customers with email addresses found; nothing to do.")?;
        return Ok(());
    }

    let end = Utc::now();
    let start = end - Duration::days(config.days_back);
    let events = calendar_src.list_events(start, end).await?;
    if events.is_empty() {
        writeln!(out, "No calendar events in the last {} day(s).", config.days_back)?;
        return Ok(());
    }

    let outcome = reconcile(&roster, &events, billing, config).await;
    if outcome.is_empty() {
        writeln!(out, "No customer meetings found in the window.")?;
        return Ok(());
    }

    let mut session = Session::new(roster, outcome, config);
    let confirmed = ui::run_session(&mut session, customers_src, input, out).await?;
    if !confirmed {
        log::info!("run ended without emission");
        return Ok(());
    }

    let report = emit_invoices(
        billing,
        session.groups(),
        config.default_hourly_rate,
        &config.currency,
    )
    .await;
    ui::render_report(&report, out)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    use chrono::{DateTime, Utc};

    use crate::ports::{BillingRecord, PortError};
    use crate::types::{CalendarEvent, Customer};

    struct FakeWorld {
        customers: Vec<Customer>,
        events: Vec<CalendarEvent>,
        records: HashMap<String, Vec<BillingRecord>>,
        created: Mutex<Vec<String>>,
        lines: Mutex<Vec<(String, i64, String)>>,
    }

    impl FakeWorld {
        fn new(customers: Vec<Customer>, events: Vec<CalendarEvent>) -> Self {
            FakeWorld {
                customers,
                events,
                records: HashMap::new(),
                created: Mutex::new(Vec::new()),
                lines: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CustomerSource for FakeWorld {
        async fn list_customers(&self) -> Result<Vec<Customer>, PortError> {
            Ok(self.customers.clone())
        }

        async fn update_customer_rate(&self, _: &str, _: f64) -> Result<(), PortError> {
            Ok(())
        }
    }

    #[async_trait]
    impl CalendarSource for FakeWorld {
        async fn list_events(
            &self,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
        ) -> Result<Vec<CalendarEvent>, PortError> {
            Ok(self.events.clone())
        }
    }

    #[async_trait]
    impl BillingStore for FakeWorld {
        async fn list_invoices(&self, customer_id: &str) -> Result<Vec<BillingRecord>, PortError> {
            Ok(self.records.get(customer_id).cloned().unwrap_or_default())
        }

        async fn create_draft_invoice(
            &self,
            customer_id: &str,
            _description: &str,
        ) -> Result<String, PortError> {
            let mut created = self.created.lock().unwrap();
            let id = format!("in_{}_{}", customer_id, created.len() + 1);
            created.push(id.clone());
            Ok(id)
        }

        async fn add_line_item(
            &self,
            _customer_id: &str,
            record_id: &str,
            amount_minor_units: i64,
            _currency: &str,
            description: &str,
        ) -> Result<(), PortError> {
            self.lines.lock().unwrap().push((
                record_id.to_string(),
                amount_minor_units,
                description.to_string(),
            ));
            Ok(())
        }
    }

    fn alice() -> Customer {
        let mut metadata = HashMap::new();
        metadata.insert("hourly_rate".to_string(), "200".to_string());
        Customer {
            id: "cus_1".into(),
            email: "alice@x.com".into(),
            name: "Alice".into(),
            metadata,
        }
    }

    fn strategy_session() -> CalendarEvent {
        CalendarEvent {
            id: "evt_1".into(),
            title: "Strategy Session".into(),
            start: "2025-01-15T14:00:00".into(),
            end: "2025-01-15T15:00:00".into(),
            description: String::new(),
            attendees: vec!["alice@x.com".into()],
            organizer: "me@consultancy.com".into(),
            is_all_day: false,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_emission() {
        let world = FakeWorld::new(vec![alice()], vec![strategy_session()]);
        let mut input = Cursor::new(b"continue\nQuarterly strategy\ny\n".to_vec());
        let mut out = Vec::new();

        run_automation(
            &Config::default(),
            &world,
            &world,
            &world,
            &mut input,
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(world.created.lock().unwrap().len(), 1);
        let lines = world.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        // 1h at Alice's $200 metadata rate, half-up to cents.
        assert_eq!(lines[0].1, 20_000);
        assert!(lines[0].2.starts_with("Quarterly strategy - 2025-01-15 at 2:00 PM"));
        assert!(lines[0].2.contains("[ID:"));

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("Created draft"));
    }

    #[tokio::test]
    async fn test_declined_confirmation_emits_nothing() {
        let world = FakeWorld::new(vec![alice()], vec![strategy_session()]);
        let mut input = Cursor::new(b"continue\n\nn\n".to_vec());
        let mut out = Vec::new();

        run_automation(
            &Config::default(),
            &world,
            &world,
            &world,
            &mut input,
            &mut out,
        )
        .await
        .unwrap();

        assert!(world.created.lock().unwrap().is_empty());
        assert!(world.lines.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_window_is_a_clean_exit() {
        let world = FakeWorld::new(vec![alice()], vec![]);
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();

        run_automation(
            &Config::default(),
            &world,
            &world,
            &world,
            &mut input,
            &mut out,
        )
        .await
        .unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("No calendar events"));
    }

    #[tokio::test]
    async fn test_no_matching_meetings_is_a_clean_exit() {
        let mut event = strategy_session();
        event.attendees = vec!["stranger@elsewhere.com".into()];
        event.organizer = String::new();
        let world = FakeWorld::new(vec![alice()], vec![event]);
        let mut input = Cursor::new(Vec::new());
        let mut out = Vec::new();

        run_automation(
            &Config::default(),
            &world,
            &world,
            &world,
            &mut input,
            &mut out,
        )
        .await
        .unwrap();

        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("No customer meetings found"));
        assert!(world.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_already_drafted_meeting_not_rebilled() {
        let mut world = FakeWorld::new(vec![alice()], vec![strategy_session()]);
        let meeting_id = crate::identity::meeting_identity(
            "alice@x.com",
            "2025-01-15T14:00:00",
            "Strategy Session",
            12,
        );
        world.records.insert(
            "cus_1".to_string(),
            vec![BillingRecord {
                id: "in_existing".into(),
                state: crate::ports::RecordState::Draft,
                line_descriptions: vec![format!("old line [ID:{meeting_id}]")],
            }],
        );

        // 'all' must not resurrect the drafted meeting; continue finds no
        // selection and the run ends with nothing emitted.
        let mut input = Cursor::new(b"all\ncontinue\n".to_vec());
        let mut out = Vec::new();
        run_automation(
            &Config::default(),
            &world,
            &world,
            &world,
            &mut input,
            &mut out,
        )
        .await
        .unwrap();

        assert!(world.created.lock().unwrap().is_empty());
        let output = String::from_utf8(out).unwrap();
        assert!(output.contains("No meetings selected"));
    }
}
