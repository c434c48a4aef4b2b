//! Demo data loaded at startup so the flows run end to end.

use common::{CustomerId, Money, ProductId};
use domain::Product;
use inventory::Warehouse;
use ledger::Account;
use tracing::info;

use crate::AppState;

/// Demo customer with enough balance for several orders.
pub const DEMO_CUSTOMER: &str = "customer";
/// Demo customer whose balance covers almost nothing, for payment failures.
pub const LOW_BALANCE_CUSTOMER: &str = "low-balance";

const PRODUCTS: [(&str, &str, i64); 4] = [
    ("PROD-001", "Wireless Mouse", 2_999),
    ("PROD-002", "Mechanical Keyboard", 12_950),
    ("PROD-003", "USB-C Hub", 4_500),
    ("PROD-004", "27\" Monitor", 39_900),
];

/// Product listed in the catalog but no longer sold.
const RETIRED_PRODUCT: (&str, &str, i64) = ("PROD-900", "Parallel Port Cable", 995);

/// `(warehouse, product, units)`; the keyboard is only stocked in Melbourne.
const STOCK: [(&str, &str, u32); 6] = [
    ("WH-SYD", "PROD-001", 50),
    ("WH-SYD", "PROD-003", 20),
    ("WH-SYD", "PROD-004", 2),
    ("WH-MEL", "PROD-001", 25),
    ("WH-MEL", "PROD-002", 10),
    ("WH-MEL", "PROD-004", 3),
];

/// Loads the demo catalog, warehouses, stock and accounts.
pub async fn seed_demo_data(state: &AppState) -> saga::Result<()> {
    for (id, name, cents) in PRODUCTS {
        state
            .catalog
            .upsert(Product::new(id, name, Money::from_cents(cents)))
            .await;
    }
    let (id, name, cents) = RETIRED_PRODUCT;
    state
        .catalog
        .upsert(Product::new(id, name, Money::from_cents(cents)).inactive())
        .await;

    state
        .inventory
        .add_warehouse(Warehouse::new("WH-SYD", "Sydney DC", "Sydney NSW"))
        .await?;
    state
        .inventory
        .add_warehouse(Warehouse::new("WH-MEL", "Melbourne DC", "Melbourne VIC"))
        .await?;
    for (warehouse, product, units) in STOCK {
        state
            .inventory
            .restock(warehouse, &ProductId::new(product), units)
            .await?;
    }

    let config = state.ledger.config().clone();
    state
        .ledger
        .open_account(Account::store(
            config.store_account_id.as_str(),
            "Store",
            Money::zero(),
            config.currency.as_str(),
        ))
        .await?;
    state
        .ledger
        .open_account(Account::customer(
            "ACC-CUSTOMER",
            CustomerId::new(DEMO_CUSTOMER),
            "Test Customer",
            Money::from_units(10_000),
            config.currency.as_str(),
        ))
        .await?;
    state
        .ledger
        .open_account(Account::customer(
            "ACC-LOW-BALANCE",
            CustomerId::new(LOW_BALANCE_CUSTOMER),
            "Low Balance",
            Money::from_units(5),
            config.currency.as_str(),
        ))
        .await?;

    info!(
        products = PRODUCTS.len() + 1,
        stock_rows = STOCK.len(),
        "demo data loaded"
    );
    Ok(())
}
