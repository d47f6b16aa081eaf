use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wifipanel::application::orchestrator::PurchaseOrchestrator;
use wifipanel::config::GatewayConfig;
use wifipanel::domain::plan::Plan;
use wifipanel::domain::session::{ConfirmationOutcome, REASON_TIMEOUT, SessionState};
use wifipanel::error::PurchaseError;
use wifipanel::infrastructure::mpesa::DarajaGateway;

/// Runs one voucher purchase against the configured payment gateway.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Payer phone number in international format, e.g. 254712345678
    phone: String,

    /// Label of the plan being purchased
    #[arg(long, default_value = "1 Day")]
    plan_label: String,

    /// Plan price in minor currency units (cents)
    #[arg(long, default_value_t = 7000)]
    price_minor_units: u64,

    /// Plan duration in hours
    #[arg(long, default_value_t = 24)]
    duration_hours: u32,

    /// Inject a successful confirmation after this many seconds instead of
    /// waiting for the gateway callback
    #[arg(long)]
    simulate_confirmation_after_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = GatewayConfig::from_env().into_diagnostic()?;
    let gateway = Arc::new(DarajaGateway::new(config.clone()).into_diagnostic()?);
    let orchestrator = Arc::new(PurchaseOrchestrator::new(config, gateway));

    let plan = Plan::new(cli.plan_label, cli.price_minor_units, cli.duration_hours)
        .into_diagnostic()?;
    let mut handle = orchestrator.start(plan).await.into_diagnostic()?;
    let session = orchestrator
        .submit_phone_number(handle.id, &cli.phone)
        .await
        .into_diagnostic()?;

    let reference = session
        .gateway_reference()
        .ok_or_else(|| miette!("gateway returned no reference"))?
        .to_string();
    println!("Payment prompt sent, reference {reference}. Waiting for confirmation...");

    if let Some(secs) = cli.simulate_confirmation_after_secs {
        let orchestrator = orchestrator.clone();
        let reference = reference.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            if let Err(e) = orchestrator
                .report_confirmation(&reference, ConfirmationOutcome::Success)
                .await
            {
                eprintln!("Error injecting confirmation: {e}");
            }
        });
    }

    let finished = handle.wait_terminal().await;
    match finished.state() {
        SessionState::Confirmed => {
            let voucher = finished.voucher_code().unwrap_or_default();
            println!("Payment confirmed. Your voucher: {voucher}");
            Ok(())
        }
        SessionState::Failed => {
            let reason = finished.failure_reason().unwrap_or("unknown");
            if reason == REASON_TIMEOUT {
                Err(PurchaseError::Timeout).into_diagnostic()
            } else {
                Err(miette!("purchase failed: {reason}"))
            }
        }
        other => Err(miette!("session ended in unexpected state {other:?}")),
    }
}
