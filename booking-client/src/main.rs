use anyhow::Result;
use bigdecimal::BigDecimal;
use booking_client::listings::{fetch_listings, filter_listings, ListingFilter};
use booking_client::{
    ApiConfig, CancellationOutcome, HttpBookingApi, ReservationSynchronizer, StatusFilter,
};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use shared::{Reservation, ReservationId, Scope};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "booking-client")]
struct Args {
    #[arg(long, env = "BOOKING_API_URL", default_value = booking_client::config::DEFAULT_API_URL)]
    api_url: String,

    #[arg(long, env = "BOOKING_API_TOKEN")]
    token: Option<String>,

    #[arg(long, env = "BOOKING_API_TIMEOUT_SECS", default_value = "10")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List reservations visible to a scope
    Reservations {
        #[arg(long, default_value = "host")]
        scope: Scope,

        #[arg(long, default_value = "")]
        search: String,

        #[arg(long, default_value = "all")]
        filter: StatusFilter,
    },
    /// Cancel one or more reservations
    Cancel {
        #[arg(long, default_value = "host")]
        scope: Scope,

        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Browse listings
    Listings {
        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        min_price: Option<BigDecimal>,

        #[arg(long)]
        max_price: Option<BigDecimal>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let config = ApiConfig::new(&args.api_url)?
        .with_token(args.token)
        .with_timeout(Duration::from_secs(args.timeout_secs));
    info!("Using booking API at {}", config.base_url);
    let api = HttpBookingApi::new(config)?;

    match args.command {
        Command::Reservations { scope, search, filter } => {
            let sync = ReservationSynchronizer::new(api);
            sync.load(scope).await;
            if let Some(error) = sync.snapshot().error {
                anyhow::bail!("{}", error.message);
            }

            sync.set_search_term(search);
            sync.set_status_filter(filter);
            let view = sync.view();
            println!("{} reservation(s)", view.len());
            for reservation in &view {
                println!("{}", format_reservation(reservation, scope));
            }
        }
        Command::Cancel { scope, ids } => {
            let sync = ReservationSynchronizer::new(api);
            sync.load(scope).await;
            if let Some(error) = sync.snapshot().error {
                anyhow::bail!("{}", error.message);
            }

            let mut accepted = Vec::new();
            for id in ids.into_iter().map(ReservationId::new) {
                match sync.request_cancellation(Some(&id)) {
                    Ok(prompt) => {
                        info!("Cancelling {} ({})", prompt.id, prompt.property_title);
                        accepted.push(id);
                    }
                    Err(e) => warn!("Skipping {}: {}", id, e),
                }
            }

            let outcomes = join_all(accepted.iter().map(|id| sync.confirm_cancellation(id))).await;
            for (id, outcome) in accepted.iter().zip(outcomes) {
                match outcome {
                    Ok(CancellationOutcome::Confirmed) => println!("{}: cancelled", id),
                    Ok(CancellationOutcome::RolledBack) => println!("{}: cancellation failed, restored", id),
                    Err(e) => println!("{}: {}", id, e),
                }
            }

            if let Some(error) = sync.snapshot().error {
                anyhow::bail!("{}", error.message);
            }
        }
        Command::Listings {
            location,
            min_price,
            max_price,
        } => {
            let listings = fetch_listings(&api).await?;
            let filter = ListingFilter {
                location,
                min_price,
                max_price,
            };
            let matches = filter_listings(&listings, &filter);

            if matches.is_empty() && !listings.is_empty() {
                println!("No properties found matching your filters.");
            }
            for listing in &matches {
                println!(
                    "{}  {}  {}  {} per night",
                    listing.id,
                    listing.title,
                    listing.location.as_deref().unwrap_or("-"),
                    listing.price_per_night
                );
            }
        }
    }

    Ok(())
}

fn format_reservation(reservation: &Reservation, scope: Scope) -> String {
    let mut line = format!(
        "{}  {:<9}  {} -> {} ({} night{})  {}",
        reservation.id,
        reservation.status.as_str(),
        reservation.start_date,
        reservation.end_date,
        reservation.nights(),
        if reservation.nights() == 1 { "" } else { "s" },
        reservation.property.title,
    );
    if scope.guest_visible() {
        if let Some(guest) = &reservation.guest {
            line.push_str(&format!("  guest: {}", guest.name));
        }
    }
    line.push_str(&format!("  total: {}", reservation.total_price));
    line
}
