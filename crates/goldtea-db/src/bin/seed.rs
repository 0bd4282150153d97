//! # Seed Data Generator
//!
//! Populates a database with a sales route for development.
//!
//! ## Usage
//! ```bash
//! # 200 sales over the last 60 days (default)
//! cargo run -p goldtea-db --bin seed
//!
//! # Custom amount
//! cargo run -p goldtea-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p goldtea-db --bin seed -- --db ./data/goldtea.db
//! ```
//!
//! ## Generated Data
//! - Villages, each under its canonical id, plus one legacy duplicate
//!   stored under a random id (exercises reconciliation)
//! - Pricing for Mix and Barik in four package sizes, plus a legacy
//!   `Mix_100gm` copy
//! - Customers and sales spread over the last 60 days, about a third
//!   with an outstanding balance
//! - A handful of notes

use chrono::{Duration, Utc};
use std::env;
use uuid::Uuid;

use goldtea_core::{
    Collection, Customer, Document, Money, NewSale, Note, Pricing, Sale, Village,
};
use goldtea_db::{Database, DbConfig, DocumentRepository};

const VILLAGES: &[(&str, &str)] = &[
    ("Rampur", "Monday"),
    ("Sonpur", "Tuesday"),
    ("Navagaon", "Wednesday"),
    ("Kheri", "Thursday"),
    ("Bhimpur", "Friday"),
    ("Devgarh", "Saturday"),
];

const CUSTOMERS: &[&str] = &[
    "Asha Devi",
    "Ravi Kumar",
    "Mona Shah",
    "Imran Ali",
    "Sunita Bai",
    "Gopal Yadav",
    "Kavita Rao",
];

/// (package, Mix rate, Barik rate) in rupees.
const PACKAGES: &[(&str, i64, i64)] = &[
    ("100gm", 40, 45),
    ("250gm", 95, 105),
    ("500gm", 180, 200),
    ("1kg", 350, 390),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./goldtea_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
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
                println!("GoldTea Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of sales to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./goldtea_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 GoldTea Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let docs = db.documents();
    let existing = docs.count(Collection::Sales.as_str()).await?;
    if existing > 0 {
        println!("⚠ Database already has {} sales", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let now = Utc::now();
    let start = std::time::Instant::now();

    // Villages (+ one legacy copy under a random id)
    for (name, day) in VILLAGES {
        let village = Village::new(name, day, now);
        put(&docs, Collection::Villages, &village.canonical_id(), &village).await?;
    }
    let legacy = Village::new(VILLAGES[0].0, VILLAGES[0].1, now - Duration::days(400));
    put(&docs, Collection::Villages, &Uuid::new_v4().to_string(), &legacy).await?;
    println!("✓ {} villages (+1 legacy duplicate)", VILLAGES.len());

    // Pricing (+ one legacy copy)
    for (package, mix, barik) in PACKAGES {
        for (tea, rate) in [("Mix", *mix), ("Barik", *barik)] {
            let pricing = Pricing::new(tea, package, Money::from_rupees(rate), now);
            put(&docs, Collection::Pricing, &pricing.pricing_key(), &pricing).await?;
        }
    }
    let legacy = Pricing::new("Mix", "100gm", Money::from_rupees(35), now - Duration::days(400));
    put(&docs, Collection::Pricing, &Uuid::new_v4().to_string(), &legacy).await?;
    println!("✓ {} pricing entries (+1 legacy duplicate)", PACKAGES.len() * 2);

    // Sales and their customers
    for n in 0..count {
        let (village, _) = VILLAGES[n % VILLAGES.len()];
        let customer_name = CUSTOMERS[(n * 7 + n / 3) % CUSTOMERS.len()];
        let (package, mix, barik) = PACKAGES[(n * 5) % PACKAGES.len()];
        let (tea_type, rate) = if n % 3 == 0 { ("Barik", barik) } else { ("Mix", mix) };
        let quantity = 1.0 + (n % 4) as f64;
        let date = now - Duration::hours(((n * 37) % (60 * 24)) as i64);

        let amount_paid = if n % 3 == 1 {
            Some(Money::from_rupees(rate * (n % 2) as i64))
        } else {
            None
        };

        let sale = Sale::from_new(
            NewSale {
                date,
                village: village.to_string(),
                customer_name: customer_name.to_string(),
                brand: "GoldTea".to_string(),
                tea_type: tea_type.to_string(),
                packaging: package.to_string(),
                rate: Money::from_rupees(rate),
                quantity,
                total_amount: None,
                amount_paid,
            },
            date,
        );
        put(&docs, Collection::Sales, &sale.id, &sale).await?;

        let customer = Customer::new(village, customer_name, date);
        put(&docs, Collection::Customers, &customer.canonical_id(), &customer).await?;
    }
    println!("✓ {} sales", count);

    for (n, (title, content)) in [
        ("Stock", "Order 20kg Barik before Diwali"),
        ("Rampur", "Asha Devi pays on the 5th"),
        ("Route", "Kheri market moved to Thursday"),
    ]
    .iter()
    .enumerate()
    {
        let note = Note::new(title, content, now - Duration::minutes(n as i64));
        put(&docs, Collection::Notes, &note.id, &note).await?;
    }
    println!("✓ 3 notes");

    println!();
    println!("✓ Seed complete in {:?}", start.elapsed());

    Ok(())
}

async fn put<T: serde::Serialize>(
    docs: &DocumentRepository,
    collection: Collection,
    id: &str,
    record: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = Document::from_record(id, record)?;
    docs.upsert(collection.as_str(), &doc.id, &doc.data).await?;
    Ok(())
}
