use std::io::BufReader;

use meetledger::config::{self, STRIPE_KEY_ENV};
use meetledger::google_api::calendar::GoogleCalendarSource;
use meetledger::stripe_api::StripeClient;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config::load_config();

    let Some(api_key) = config::stripe_api_key() else {
        log::error!("{STRIPE_KEY_ENV} is not set; export your billing API key and re-run");
        std::process::exit(1);
    };

    let stripe = StripeClient::new(api_key);
    let calendar = GoogleCalendarSource::new();

    let mut input = BufReader::new(std::io::stdin());
    let mut out = std::io::stdout();

    if let Err(e) =
        meetledger::app::run_automation(&config, &stripe, &calendar, &stripe, &mut input, &mut out)
            .await
    {
        log::error!("run failed: {e}");
        std::process::exit(1);
    }
}
