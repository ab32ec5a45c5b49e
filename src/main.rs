use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use campus_services::analytics::DateRange;
use campus_services::clock::SystemClock;
use campus_services::config::Config;
use campus_services::http_client::HttpClient;
use campus_services::models::ItemStatus;
use campus_services::services::{CampusServices, MatchPolicy};
use campus_services::store::ListFilter;
use campus_services::tenant::{resolve, Session};
use campus_services::AppError;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "campus-services", about = "Campus services API client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List lost-and-found items visible to the current user
    LostItems {
        /// Only items with this status (reported, found, claimed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Match a reported item with a found item
    Match {
        reported_id: String,
        found_id: String,
        /// Refuse items that are already claimed or matched
        #[arg(long)]
        strict: bool,
    },
    /// Change the status of a lost-and-found item
    SetStatus {
        id: String,
        status: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Print dashboard figures (range: 7d, 30d, 90d, all)
    Dashboard {
        #[arg(long, default_value = "30d")]
        range: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_services=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let token = config
        .token
        .clone()
        .ok_or_else(|| AppError::Config("CAMPUS_TOKEN is not set".to_string()))?;
    let secret = config
        .jwt_secret
        .clone()
        .ok_or_else(|| AppError::Config("CAMPUS_JWT_SECRET is not set".to_string()))?;
    let session = Session::from_token(&token, &secret)?;
    let ctx = resolve(&session)?;
    tracing::info!("Acting as {} ({:?}) in {:?}", ctx.user_id(), ctx.role(), ctx.scope());

    let client = HttpClient::new(&config)?.with_token(token);
    let policy = match cli.command {
        Command::Match { strict: true, .. } => MatchPolicy::Strict,
        _ => MatchPolicy::Permissive,
    };
    let services = CampusServices::new(Arc::new(client), Arc::new(SystemClock))
        .with_match_policy(policy);

    match cli.command {
        Command::LostItems { status } => {
            let filter = match status {
                Some(s) => {
                    let status: ItemStatus = s.parse()?;
                    ListFilter::new().eq("status", status.as_str())
                }
                None => ListFilter::new(),
            };
            let items = services.lost_found.store().list(&ctx, &filter).await?;
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        Command::Match {
            reported_id,
            found_id,
            ..
        } => {
            let lost_found = &services.lost_found;
            lost_found.refresh(&ctx).await?;
            let reported = lost_found
                .store()
                .get(&reported_id)
                .await
                .with_context(|| format!("lost item {} not found", reported_id))?;
            let found = lost_found
                .store()
                .get(&found_id)
                .await
                .with_context(|| format!("lost item {} not found", found_id))?;

            let outcome = lost_found.match_items(&ctx, &reported, &found).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&[outcome.reported_item, outcome.found_item])?
            );
        }
        Command::SetStatus { id, status, notes } => {
            let status: ItemStatus = status.parse()?;
            services.lost_found.refresh(&ctx).await?;
            let item = services
                .lost_found
                .store()
                .get(&id)
                .await
                .with_context(|| format!("lost item {} not found", id))?;
            let updated = services
                .lost_found
                .update_status(&ctx, &item, status, &notes)
                .await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        Command::Dashboard { range } => {
            let range: DateRange = range.parse().map_err(anyhow::Error::msg)?;
            services.refresh_all(&ctx).await?;
            let dashboard = services.dashboard(range).await;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
    }

    Ok(())
}
