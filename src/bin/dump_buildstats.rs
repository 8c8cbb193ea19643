//! Reports how many try jobs the trigger bot rebuilt over part of a month.

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;

use trigger_bot::buildapi::BuildApiClient;
use trigger_bot::config::{Credentials, ServiceConfig};
use trigger_bot::stats::{DaySummary, bot_reason, summarize};
use trigger_bot::types::Branch;

/// The identity the trigger bot rebuilds jobs as.
const DEFAULT_BOT_USER: &str = "mozci-bot@mozilla.com";

#[derive(Debug, Parser)]
#[command(version, about = "Summarize trigger bot rebuilds on try")]
struct Args {
    year: i32,

    /// Month, 1-12.
    month: u32,

    /// Number of days to cover, starting from the first of the month.
    days: u32,

    /// Build API user the bot triggers as.
    #[arg(long, default_value = DEFAULT_BOT_USER)]
    bot_user: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let service = ServiceConfig::from_env()?;
    let credentials = Credentials::load(&service.conf_path)
        .with_context(|| format!("loading credentials from {}", service.conf_path.display()))?;
    let client = BuildApiClient::new(&service.buildapi_url, credentials.ldap, service.http_timeout)
        .context("creating build API client")?;
    let branch = Branch::try_queue();
    let reason = bot_reason(&args.bot_user);

    let mut total = DaySummary::default();
    for day in 1..=args.days {
        let date = NaiveDate::from_ymd_opt(args.year, args.month, day)
            .with_context(|| format!("{}-{:02}-{:02} is not a date", args.year, args.month, day))?;
        let jobs = client
            .jobs_on(&branch, date)
            .await
            .with_context(|| format!("fetching jobs for {}", date))?;
        let summary = summarize(&jobs, &reason);

        println!("{} jobs on {}", summary.jobs, date);
        println!("\t{} trigger-bot jobs on {}", summary.bot_jobs, date);
        println!("\t({:.2} %)", summary.bot_share());
        total += summary;
    }

    println!();
    println!(
        "Summary for the first {} days of {}-{:02}:",
        args.days, args.year, args.month
    );
    println!("\t{} jobs on try", total.jobs);
    println!(
        "\t{} jobs initiated by trigger-bot on try ({:.2}% of all)",
        total.bot_jobs,
        total.bot_share()
    );
    println!(
        "\t{} jobs initiated by trigger-bot failed ({:.2}% of trigger bot jobs)",
        total.failed,
        total.failed_share()
    );
    println!(
        "\t{} jobs initiated by trigger-bot passed ({:.2}% of trigger bot jobs)",
        total.passed,
        total.passed_share()
    );
    Ok(())
}
