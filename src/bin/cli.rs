use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use homely_harvest::order::added_message;
use homely_harvest::{Catalog, ImageSource, StoreConfig, Storefront};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(about = "Homely Harvest storefront CLI", long_about = None)]
struct Cli {
    /// Data directory holding catalog.json and images/ (default: ./.homely-harvest)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and seed catalog.json with the built-in menu
    Init,
    /// Show every catalog item with its price and image
    Menu,
    /// Add items to a fresh cart and place the order
    Order {
        /// Items as NAME=QTY (QTY defaults to 1)
        ///
        /// Examples:
        ///   "Besan Ladoo=2"
        ///   "Grated Coconut"
        #[arg(required = true)]
        items: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.data_dir {
        Some(dir) => StoreConfig::new(dir.clone()),
        None => StoreConfig::from_current_dir()?,
    };

    match cli.command {
        Commands::Init => init(&config)?,
        Commands::Menu => print_menu(&Storefront::open_with(&config)?)?,
        Commands::Order { items } => order(&mut Storefront::open_with(&config)?, &items)?,
    }

    Ok(())
}

fn init(config: &StoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.ensure_directories()?;

    let catalog_path = config.catalog_path();
    if catalog_path.exists() {
        println!("Catalog already present: {}", catalog_path.display());
    } else {
        config.save_catalog(&Catalog::default_menu())?;
        println!("Wrote catalog: {}", catalog_path.display());
    }
    println!("Put product images in: {}", config.images_dir().display());
    Ok(())
}

fn order(shop: &mut Storefront, items: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let session = shop.create_session();

    for spec in items {
        let (name, qty) = parse_item(spec)?;
        let added = shop.add_to_cart(&session, name, qty)?;
        println!("{}", added_message(added, name));
    }

    println!("Total: {}{}", shop.currency(), shop.cart_total(&session)?);

    let receipt = shop.place_order(&session)?;
    println!("{}", receipt.message);
    println!("Order summary:");
    println!("{}", receipt.text);

    shop.end_session(&session)?;
    Ok(())
}

fn print_menu(shop: &Storefront) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = shop.catalog();
    println!("{}", catalog.store_name());
    println!("{}", catalog.tagline());
    println!();

    let currency = shop.currency();
    for entry in catalog.entries() {
        let image = match shop.resolve_image(&entry.name)? {
            ImageSource::File(path) => path.display().to_string(),
            ImageSource::Placeholder(url) => url,
        };
        println!("{}  {}{}", entry.name, currency, entry.price);
        println!("  image: {}", image);
    }
    Ok(())
}

/// Split `NAME=QTY`; a bare name means one
fn parse_item(spec: &str) -> Result<(&str, i64), String> {
    match spec.rsplit_once('=') {
        Some((name, qty)) => {
            let qty = qty
                .trim()
                .parse()
                .map_err(|_| format!("Invalid quantity in '{}'", spec))?;
            Ok((name.trim(), qty))
        }
        None => Ok((spec.trim(), 1)),
    }
}
