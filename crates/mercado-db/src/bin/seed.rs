//! # Demo Data Seeder
//!
//! Fills a database with a small demo store: products in every category,
//! a handful of customers, and a mix of cash and credit sales.
//!
//! ## Usage
//! ```bash
//! cargo run -p mercado-db --bin seed
//! cargo run -p mercado-db --bin seed -- --db ./data/mercado.db --sales 40
//! ```
//!
//! Credit sales alternate between weekly, biweekly and monthly plans and
//! get some installments paid, so reports have overdue rows to show.

use std::env;

use chrono::{Duration, Utc};
use mercado_core::checkout::{CheckoutRequest, LineRequest, PlanRequest};
use mercado_core::{
    Category, Customer, Frequency, NewCustomer, NewProduct, PaymentMethod, Product, SaleType,
};
use mercado_db::{generate_id, Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// (category, name, cost, price)
const PRODUCTS: &[(Category, &str, i64, i64)] = &[
    (Category::Clothing, "Linen Shirt", 1_800, 4_500),
    (Category::Clothing, "Denim Jacket", 3_500, 8_900),
    (Category::Clothing, "Cotton Tee", 600, 1_900),
    (Category::Clothing, "Pleated Skirt", 1_500, 3_900),
    (Category::Footwear, "Canvas Sneakers", 2_200, 5_500),
    (Category::Footwear, "Leather Sandals", 1_900, 4_200),
    (Category::Accessories, "Leather Belt", 900, 2_500),
    (Category::Accessories, "Wool Scarf", 700, 2_200),
    (Category::Accessories, "Straw Hat", 800, 2_400),
    (Category::Electronics, "Wireless Earbuds", 2_500, 5_900),
    (Category::Electronics, "Phone Charger", 500, 1_500),
    (Category::Home, "Ceramic Mug", 300, 1_200),
    (Category::Home, "Scented Candle", 400, 1_400),
    (Category::Beauty, "Lip Balm", 150, 600),
    (Category::Beauty, "Hand Cream", 350, 1_100),
    (Category::Food, "Ground Coffee 500g", 700, 1_600),
    (Category::Other, "Gift Card Sleeve", 50, 200),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Ana Lima", "555-0101"),
    ("Bruno Costa", "bruno@example.com"),
    ("Carla Mendes", "555-0133"),
    ("Diego Rocha", "555-0147"),
    ("Elena Duarte", "elena@example.com"),
];

const FREQUENCIES: &[Frequency] = &[Frequency::Weekly, Frequency::Biweekly, Frequency::Monthly];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut sales: usize = 24;
    let mut db_path = String::from("./mercado_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--sales" | "-s" => {
                if i + 1 < args.len() {
                    sales = args[i + 1].parse().unwrap_or(24);
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
                println!("Mercado Demo Data Seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --sales <N>    Number of sales to record (default: 24)");
                println!("  -d, --db <PATH>    Database file path (default: ./mercado_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Mercado Demo Data Seeder");
    println!("========================");
    println!("Database: {}", db_path);
    println!("Sales:    {}", sales);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Products
    let now = Utc::now();
    let mut product_ids = Vec::with_capacity(PRODUCTS.len());
    for (index, (category, name, cost, price)) in PRODUCTS.iter().enumerate() {
        let product = Product::new(
            generate_id(),
            NewProduct {
                name: name.to_string(),
                description: Some(format!("{} from the demo collection.", name)),
                category: *category,
                cost_price_cents: *cost,
                sale_price_cents: *price,
                stock: 40 + (index as i64 * 7) % 25,
                barcode: Some(format!("779{:010}", index + 1)),
                ..Default::default()
            },
            now,
        );
        db.products().insert(&product).await?;
        product_ids.push(product.id);
    }
    println!("✓ {} products", product_ids.len());

    // Customers
    let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
    for (name, contact) in CUSTOMERS {
        let customer = Customer::new(
            generate_id(),
            NewCustomer {
                name: name.to_string(),
                contact: Some(contact.to_string()),
            },
            now,
        );
        db.customers().insert(&customer).await?;
        customer_ids.push(customer.id);
    }
    println!("✓ {} customers", customer_ids.len());

    // Sales
    let mut recorded = 0;
    let mut credit = 0;
    for n in 0..sales {
        let first = &product_ids[n % product_ids.len()];
        let second = &product_ids[(n * 5 + 3) % product_ids.len()];
        let mut request = CheckoutRequest {
            items: vec![
                LineRequest {
                    product_id: first.clone(),
                    quantity: 1 + (n as i64 % 3),
                },
                LineRequest {
                    product_id: second.clone(),
                    quantity: 1,
                },
            ],
            discount_cents: if n % 4 == 0 { 200 } else { 0 },
            sale_type: SaleType::Cash,
            customer_id: None,
            down_payment_cents: None,
            installment_plan: None,
            payment_method: [PaymentMethod::Cash, PaymentMethod::Card, PaymentMethod::Transfer][n % 3],
        };

        if n % 3 == 0 {
            let frequency = FREQUENCIES[credit % FREQUENCIES.len()];
            request.sale_type = SaleType::Credit;
            request.customer_id = Some(customer_ids[credit % customer_ids.len()].clone());
            request.down_payment_cents = Some(500);
            request.installment_plan = Some(PlanRequest {
                number_of_installments: 3 + (credit as u32 % 4),
                frequency,
                // Backdated so some rows are already overdue
                start_date: Some((now - Duration::days(30 + credit as i64 * 5)).date_naive()),
            });
            credit += 1;
        }

        let sale = match db.sales().checkout(&request, false).await {
            Ok(sale) => sale,
            Err(e) => {
                eprintln!("Failed to record sale {}: {}", n + 1, e);
                continue;
            }
        };
        recorded += 1;

        if sale.installment_plan.is_some() && n % 2 == 0 {
            db.sales()
                .pay_installments(&sale.id, &[1], PaymentMethod::Cash, None)
                .await?;
        }
    }
    println!("✓ {} sales ({} on credit)", recorded, credit);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
