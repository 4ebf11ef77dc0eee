//! Run the saved search notification job once and print a summary.
//!
//! Exits 0 when the run completes (even with per-search errors) and 1 when
//! the run itself fails.

use std::process::ExitCode;

use alsat_notifier::config::AppConfig;
use alsat_notifier::jobs::{NotificationRun, OutcomeStatus};
use alsat_notifier::{build_notifier, SERVICE_NAME};
use alsat_shared::clients::db::lazy_pool;

const RULE: &str = "============================================================";

#[tokio::main]
async fn main() -> ExitCode {
    alsat_shared::middleware::init_tracing(SERVICE_NAME);

    println!("{RULE}\nStarting Saved Search Notifications Job\n{RULE}\n");

    match run().await {
        Ok(result) => {
            print_summary(&result);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("\n{RULE}\nJob Failed\n{RULE}\n");
            eprintln!("Error: {e}\n");
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<NotificationRun> {
    let config = AppConfig::load()?;
    let db = lazy_pool(&config.database_url, 2);
    let notifier = build_notifier(&config, db).await?;
    Ok(notifier.run().await?)
}

fn print_summary(run: &NotificationRun) {
    println!("\n{RULE}\nJob Completed Successfully\n{RULE}\n");
    println!("Summary:");
    println!("  Total searches processed: {}", run.total_searches);
    println!("  Notifications sent: {}", run.notifications_sent);
    println!("  Errors: {}", run.errors);
    println!();

    if run.details.is_empty() {
        return;
    }
    println!("Details:");
    for (i, detail) in run.details.iter().enumerate() {
        println!(
            "  {}. {} ({})",
            i + 1,
            detail.search_name,
            detail.user_email.as_deref().unwrap_or("no email")
        );
        println!("     - User ID: {}", detail.user_id);
        println!("     - Matching listings: {}", detail.matching_listings);
        let status = match detail.status {
            OutcomeStatus::Success => "✅ Success",
            OutcomeStatus::Error => "❌ Error",
        };
        println!("     - Status: {status}");
        if let Some(error) = &detail.error {
            println!("     - Error: {error}");
        }
        println!();
    }
}
