//! # Seed Data Generator
//!
//! Fills a development store with cached reference data and a backlog of
//! unsynced sales, as if the till had been offline for a shift.
//!
//! ## Usage
//! ```bash
//! # 25 offline sales (default)
//! cargo run -p tally-db --bin seed
//!
//! # Custom backlog size and database path
//! cargo run -p tally-db --bin seed -- --count 200 --db ./data/tally.db
//! ```

use chrono::{Duration, Utc};
use std::env;
use tally_core::{Customer, LineItem, Money, PaymentMethod, Product, TransactionDraft};
use tally_db::{Database, DbConfig};

/// (id, name, price in minor units, unit)
const MENU: &[(&str, &str, i64, &str)] = &[
    ("nasi-goreng", "Nasi Goreng", 25_000, "plate"),
    ("mie-ayam", "Mie Ayam", 18_000, "bowl"),
    ("sate-ayam", "Sate Ayam", 30_000, "portion"),
    ("es-teh", "Es Teh Manis", 5_000, "glass"),
    ("kopi-susu", "Kopi Susu", 12_000, "cup"),
    ("kerupuk", "Kerupuk", 2_000, "pcs"),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("cust-001", "Sari"),
    ("cust-002", "Budi"),
    ("cust-003", "Dewi"),
];

const METHODS: &[PaymentMethod] = &[
    PaymentMethod::Cash,
    PaymentMethod::Qris,
    PaymentMethod::Card,
    PaymentMethod::Transfer,
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 25;
    let mut db_path = String::from("./tally_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
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
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of offline sales to record (default: 25)");
                println!("  -d, --db <PATH>    Database file path (default: ./tally_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Tally POS Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", count);
    println!();

    let db = Database::open(DbConfig::new(&db_path)).await?;
    println!("✓ Store opened, migrations applied");

    let now = Utc::now();

    let products: Vec<Product> = MENU
        .iter()
        .map(|(id, name, price, unit)| Product {
            id: (*id).to_string(),
            name: (*name).to_string(),
            sku: Some(id.to_uppercase()),
            category: None,
            price: Money::from_minor(*price),
            unit: (*unit).to_string(),
            last_updated: now,
        })
        .collect();
    let customers: Vec<Customer> = CUSTOMERS
        .iter()
        .map(|(id, name)| Customer {
            id: (*id).to_string(),
            name: (*name).to_string(),
            phone: None,
            email: None,
            last_updated: now,
        })
        .collect();

    db.references().put_all(&products).await?;
    db.references().put_all(&customers).await?;
    println!(
        "✓ Cached {} products, {} customers",
        products.len(),
        customers.len()
    );

    let start = std::time::Instant::now();
    let shift_start = now - Duration::hours(8);

    for n in 0..count {
        let items: Vec<LineItem> = (0..=(n % 3))
            .map(|k| {
                let p = &products[(n + k * 2) % products.len()];
                LineItem {
                    item_id: p.id.clone(),
                    name: p.name.clone(),
                    unit_price: p.price,
                    quantity: 1 + ((n + k) % 4) as i64,
                    unit: p.unit.clone(),
                }
            })
            .collect();

        let mut draft = TransactionDraft::new(items, METHODS[n % METHODS.len()]);
        if n % 4 == 0 {
            draft.customer = Some((&customers[n % customers.len()]).into());
        }

        let at = shift_start + Duration::seconds((n as i64) * 90);
        let tx = draft.into_transaction(at)?;

        if let Err(e) = db.transactions().put(&tx).await {
            eprintln!("Failed to record {}: {}", tx.id, e);
        }
    }

    println!("✓ Recorded {} sales in {:?}", count, start.elapsed());
    println!();
    println!(
        "  Unsynced: {} / {}",
        db.transactions().count_unsynced().await?,
        db.transactions().count().await?
    );

    db.close().await;
    println!("✓ Seed complete!");

    Ok(())
}
