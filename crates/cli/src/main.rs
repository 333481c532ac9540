//! Shopfront CLI - drive the shopping cart from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Guest cart, kept in $SHOPFRONT_STORAGE_DIR
//! shopfront add --product-id 1 --name Lamp --price 300 --stock 5 --quantity 2
//! shopfront show
//!
//! # Sign in and merge the guest cart into the server cart
//! shopfront login --customer-id 42 --token "$TOKEN"
//!
//! # Signed-in commands take the session from flags or environment
//! SHOPFRONT_CUSTOMER_ID=42 SHOPFRONT_AUTH_TOKEN="$TOKEN" shopfront increase 0
//! ```
//!
//! # Commands
//!
//! - `show` - Print the cart (re-fetched from the server when signed in)
//! - `add`, `increase`, `decrease`, `remove`, `empty` - Cart mutations
//! - `login`, `register`, `logout` - Session changes
//! - `checkout` - Empty the cart after a completed order
//! - `watch` - Keep the cart in sync and print the badge count on change

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use shopfront_cart::{CartConfig, CartError, CartService, Credentials};
use shopfront_core::{CustomerId, ProductId};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "shopfront")]
#[command(author, version, about = "Shopfront cart client")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Signed-in customer id (overrides `SHOPFRONT_CUSTOMER_ID`)
    #[arg(long, global = true, requires = "token")]
    customer_id: Option<CustomerId>,

    /// Bearer token (overrides `SHOPFRONT_AUTH_TOKEN`)
    #[arg(long, global = true, requires = "customer_id")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the cart
    Show,
    /// Add a product to the cart
    Add {
        #[arg(long)]
        product_id: ProductId,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long)]
        stock: u32,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Raise a line's quantity (one unit unless --to is given)
    Increase {
        index: usize,
        #[arg(long)]
        to: Option<u32>,
    },
    /// Lower a line's quantity (one unit unless --to is given)
    Decrease {
        index: usize,
        #[arg(long)]
        to: Option<u32>,
    },
    /// Remove a line
    Remove { index: usize },
    /// Empty the cart
    Empty,
    /// Sign in and merge the guest cart
    Login,
    /// Register and merge the guest cart
    Register,
    /// Sign out, keeping unmerged guest lines
    Logout,
    /// Empty the cart after a completed order
    Checkout,
    /// Keep the cart in sync until interrupted
    Watch,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "shopfront_cart=info,shopfront_cli=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);
    if cli.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CartConfig::from_env()?;
    if let (Some(customer_id), Some(token)) = (cli.customer_id, cli.token) {
        config.credentials = Some(Credentials::new(customer_id, token));
    }

    match cli.command {
        Commands::Login => sign_in(&mut config, false).await?,
        Commands::Register => sign_in(&mut config, true).await?,
        Commands::Logout => {
            let cart = CartService::from_config(&config)?;
            commands::session::sign_out(&cart);
        }
        Commands::Watch => {
            let cart = CartService::from_config(&config)?;
            commands::session::watch(&cart, config.reconcile_interval).await?;
        }
        Commands::Show => commands::cart::show(&CartService::from_config(&config)?).await,
        Commands::Add {
            product_id,
            name,
            price,
            stock,
            quantity,
        } => {
            let cart = CartService::from_config(&config)?;
            commands::cart::add(&cart, product_id, name, price, stock, quantity).await?;
        }
        Commands::Increase { index, to } => {
            commands::cart::increase(&CartService::from_config(&config)?, index, to).await?;
        }
        Commands::Decrease { index, to } => {
            commands::cart::decrease(&CartService::from_config(&config)?, index, to).await?;
        }
        Commands::Remove { index } => {
            commands::cart::remove(&CartService::from_config(&config)?, index).await?;
        }
        Commands::Empty => commands::cart::empty(&CartService::from_config(&config)?, false).await,
        Commands::Checkout => {
            commands::cart::empty(&CartService::from_config(&config)?, true).await;
        }
    }
    Ok(())
}

/// Sign in with the session from flags or environment, starting from the
/// guest cart on disk.
async fn sign_in(config: &mut CartConfig, register: bool) -> Result<(), CartError> {
    let credentials = config
        .credentials
        .take()
        .ok_or(CartError::NotAuthenticated)?;
    let cart = CartService::from_config(config)?;
    commands::session::sign_in(&cart, credentials, register).await;
    Ok(())
}
