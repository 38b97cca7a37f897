//! # loyaltydog-admin
//!
//! Operator CLI for a LoyaltyDog program.
//!
//! ```text
//! loyaltydog-admin [--config FILE] <COMMAND>
//!
//!   check                       validate config, print setup notices
//!   init-config                 write the current config to FILE
//!   customer <EMAIL|ID>         print a customer
//!   offer <OFFER_ID>            print an offer decoded from its card
//!   points <AMOUNT>             points earned for a purchase (offline)
//!   award <CUSTOMER_ID> <N>     add N points to a customer
//!   redeem <CUSTOMER_ID>        redeem a customer's current offer
//!   push <MESSAGE>              push a message to consenting customers
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use loyaltydog_client::host::InMemoryHost;
use loyaltydog_client::notices::{check_settings, send_push_notification};
use loyaltydog_client::telemetry::init_tracing;
use loyaltydog_client::{AppContext, LoyaltyConfig, NoticeKind};
use loyaltydog_core::{CustomerId, Money, OfferId};

#[derive(Debug, Parser)]
#[command(name = "loyaltydog-admin", version, about = "LoyaltyDog program administration")]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration and show setup notices
    Check,
    /// Write the effective configuration to the config file
    InitConfig,
    /// Look a customer up by email or id
    Customer { lookup: String },
    /// Show an offer
    Offer { offer_id: String },
    /// Points earned for a purchase amount, e.g. 25.50
    Points { amount: String },
    /// Add points to a customer
    Award { customer_id: CustomerId, points: i64 },
    /// Redeem a customer's current offer
    Redeem { customer_id: CustomerId },
    /// Push a message to every consenting customer
    Push { message: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LoyaltyConfig::load(cli.config.clone()).context("failed to load configuration")?;
    init_tracing(&config.api);

    match &cli.command {
        Command::Check => {
            match check_settings(&config.api) {
                Some(notice) => println!("warning: {}", notice.plain_text()),
                None => println!("LoyaltyDog is configured for program {}", config.api.program_id),
            }
            println!("api: {} (key {})", config.api.url, config.api.masked_api_key());
            println!(
                "points: {} {} on {}",
                config.points.ratio, config.points.rounding, config.points.earn_when
            );
            return Ok(());
        }
        Command::InitConfig => {
            config.save(cli.config).context("failed to save configuration")?;
            return Ok(());
        }
        Command::Points { amount } => {
            let amount: Money = amount.parse().context("invalid amount")?;
            let points = config
                .points
                .calculator()
                .try_calculate_points(amount)
                .context("points calculation failed")?;
            println!("{points}");
            return Ok(());
        }
        _ => {}
    }

    config
        .require_credentials()
        .context("set program_id and api_key first")?;
    let context = AppContext::from_config(config, Arc::new(InMemoryHost::new()))
        .await
        .context("failed to start the LoyaltyDog client")?;
    let api = &context.api;

    match cli.command {
        Command::Customer { lookup } => {
            let customer = api.try_get_customer_details(&lookup).await?;
            println!("{}", serde_json::to_string_pretty(&customer)?);
        }
        Command::Offer { offer_id } => {
            let offer = api.try_get_offer_details(&OfferId::new(offer_id)).await?;
            println!("{}", serde_json::to_string_pretty(&offer)?);
        }
        Command::Award { customer_id, points } => {
            if points == 0 {
                bail!("points must not be zero");
            }
            api.try_update_points(customer_id, points).await?;
            println!("Added {points} points to customer {customer_id}");
        }
        Command::Redeem { customer_id } => {
            api.try_redeem_offer(customer_id).await?;
            println!("Redeemed current offer of customer {customer_id}");
        }
        Command::Push { message } => {
            send_push_notification(api, &message, &context.notices).await;
            let notices = context.notices.drain();
            for notice in &notices {
                let label = match notice.kind {
                    NoticeKind::Error => "error",
                    NoticeKind::Warning => "warning",
                    NoticeKind::Message => "ok",
                };
                println!("{label}: {}", notice.text);
            }
            if notices.is_empty() {
                println!("No customers to notify");
            }
        }
        Command::Check | Command::InitConfig | Command::Points { .. } => {}
    }

    Ok(())
}
