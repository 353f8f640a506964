//! Shopfront CLI - Browse the catalog, manage a cart, and check out from the
//! terminal.
//!
//! # Usage
//!
//! ```bash
//! # List products
//! shopfront products
//!
//! # Create a cart and add two mugs
//! shopfront cart add prod_NqKE50BR4wdgBL --quantity 2
//!
//! # Show an existing cart
//! shopfront cart --cart-id cart_ypbroE658n4ea8 show
//!
//! # Check out, stopping before the order is captured
//! shopfront checkout --cart-id cart_ypbroE658n4ea8 \
//!     --first-name Ada --last-name Lovelace --email ada@example.com \
//!     --address "1 Analytical Way" --city Toronto --postal-code "M5V 2T6" \
//!     --country CA --subdivision ON --dry-run
//! ```
//!
//! # Environment
//!
//! - `CHEC_PUBLIC_KEY` (required), `CHEC_API_URL`, `CHEC_REQUEST_TIMEOUT_MS`
//! - `RUST_LOG` (default `shopfront=info`), `SHOPFRONT_LOG_FORMAT=json`
//! - `SENTRY_DSN` to report errors

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use shopfront::Storefront;
use shopfront::config::StorefrontConfig;
use shopfront_core::CartId;

mod commands;
mod render;

use commands::cart::CartAction;
use commands::checkout::CheckoutArgs;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Storefront cart and checkout client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products
    Products {
        /// Bypass the product cache
        #[arg(long)]
        refresh: bool,
    },
    /// Show or modify a cart
    Cart {
        /// Existing cart; a new cart is created when omitted
        #[arg(long, env = "SHOPFRONT_CART_ID")]
        cart_id: Option<String>,

        #[command(subcommand)]
        action: CartAction,
    },
    /// Check out a cart
    Checkout(CheckoutArgs),
}

fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Map tracing levels to Sentry: warnings and errors become events, the rest
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

/// Log output layer, text or JSON, writing to `writer`.
///
/// Command output owns stdout; logs always go to `writer`.
fn log_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront=info,shopfront_cli=info".into());
    let json = std::env::var("SHOPFRONT_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer(json, std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    let _sentry_guard = init_sentry(&config);

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &StorefrontConfig) -> Result<(), Box<dyn std::error::Error>> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Products { refresh } => {
            let storefront = Storefront::connect(config, None)?;
            commands::products::run(&storefront, refresh, &mut out).await?;
        }
        Commands::Cart { cart_id, action } => {
            let mut storefront = Storefront::connect(config, cart_id.map(CartId::new))?;
            commands::cart::run(&mut storefront, action, &mut out).await?;
        }
        Commands::Checkout(args) => {
            let cart_id = CartId::new(args.cart_id.as_str());
            let mut storefront = Storefront::connect(config, Some(cart_id))?;
            commands::checkout::run(&mut storefront, &args, &mut out).await?;
        }
    }
    Ok(())
}
