//! # Seed Data Generator
//!
//! Populates the database with demo orders, cash payments and lenders for
//! local development.
//!
//! ## Usage
//! ```bash
//! # Seed 20 orders (default)
//! cargo run -p payproof-db --bin seed
//!
//! # Custom amount
//! cargo run -p payproof-db --bin seed -- --count 50
//!
//! # Specify database path
//! cargo run -p payproof-db --bin seed -- --db ./data/payproof.db
//! ```
//!
//! ## Generated Data
//! - Orders `DEMO-0001..` with totals between $15.000 and $180.000
//! - Every third order gets a partial cash payment, every fifth is paid
//!   in full (and auto-advances to `ready_to_print`)
//! - Two lenders with routing keywords

use std::env;

use payproof_core::{Customer, ExternalOrder, Money, PAYMENT_TOLERANCE};
use payproof_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// Customer names for demo orders.
const CUSTOMERS: &[(&str, &str)] = &[
    ("Lucia Gomez", "5491155550101"),
    ("Martin Pereyra", "5491155550102"),
    ("Sofia Alvarez", "5493515550103"),
    ("Juan Ignacio Ruiz", "5492615550104"),
    ("Camila Fernandez", "5491155550105"),
    ("Tomas Benitez", "5493415550106"),
    ("Valentina Sosa", "5491155550107"),
];

/// Lenders with their routing keywords.
const LENDERS: &[(&str, &str, &[&str])] = &[
    ("Credito Sur", "5491140000001", &["credito sur", "csur"]),
    ("Financia Ya", "5491140000002", &["financiaya", "financia ya"]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 20;
    let mut db_path = String::from("./payproof_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(20);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("PayProof Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of orders to generate (default: 20)");
                println!("  -d, --db <PATH>    Database file path (default: ./payproof_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("PayProof Seed Data Generator");
    println!("============================");
    println!("Database: {}", db_path);
    println!("Orders:   {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.orders().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} orders", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let tolerance = Money::from_pesos(PAYMENT_TOLERANCE);
    let mut paid_in_full = 0;
    let mut partial = 0;

    for seed in 0..count {
        let external = demo_order(seed);
        let order = db.orders().upsert(&external).await?;

        if seed % 5 == 4 {
            db.payments()
                .record_cash(&order.order_number, order.total(), "seed", Some("pago en local"), tolerance)
                .await?;
            paid_in_full += 1;
        } else if seed % 3 == 2 {
            let half = Money::from_pesos(order.total_amount / 2);
            db.payments()
                .record_cash(&order.order_number, half, "seed", None, tolerance)
                .await?;
            partial += 1;
        }
    }

    println!("✓ Generated {} orders", count);
    println!("  Paid in full: {}", paid_in_full);
    println!("  Partially paid: {}", partial);

    for (name, phone, keywords) in LENDERS {
        db.lenders().insert(name, phone, keywords).await?;
    }
    println!("✓ Registered {} lenders", LENDERS.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Builds a deterministic demo order.
fn demo_order(seed: usize) -> ExternalOrder {
    let (name, phone) = CUSTOMERS[seed % CUSTOMERS.len()];

    // $15.000 - $180.000 in steps of $500
    let total = 15_000 + ((seed * 7_919) % 331) as i64 * 500;

    ExternalOrder {
        order_number: format!("DEMO-{:04}", seed + 1),
        total: Money::from_pesos(total),
        currency: Default::default(),
        customer: Customer {
            name: Some(name.to_string()),
            email: Some(format!(
                "{}@example.com",
                name.to_lowercase().replace(' ', ".")
            )),
            phone: Some(phone.to_string()),
        },
    }
}
