use std::sync::Arc;

use common::{OrderNumber, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory::{Inventory, InventoryConfig, ReservationLine, Warehouse};
use messaging::InMemoryBroker;

fn bench_reserve_confirm(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let inventory = Inventory::new(InventoryConfig::default(), Arc::new(InMemoryBroker::new()));
    let product = ProductId::new("P-BENCH");
    rt.block_on(async {
        for i in 0..4 {
            let id = format!("WH-{i}");
            inventory
                .add_warehouse(Warehouse::new(&id, &id, "Bench"))
                .await
                .unwrap();
            inventory.restock(&id, &product, u32::MAX / 8).await.unwrap();
        }
    });
    let mut n = 0u64;

    c.bench_function("inventory/reserve_confirm", |b| {
        b.iter(|| {
            n += 1;
            let order = OrderNumber::new(format!("ORD-{n}"));
            rt.block_on(async {
                inventory
                    .reserve(&order, &[ReservationLine::new(product.clone(), 1)])
                    .await
                    .unwrap();
                inventory.confirm(&order).await.unwrap();
            });
        });
    });
}

fn bench_reserve_release(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let inventory = Inventory::new(InventoryConfig::default(), Arc::new(InMemoryBroker::new()));
    let product = ProductId::new("P-BENCH");
    rt.block_on(async {
        inventory
            .add_warehouse(Warehouse::new("WH-0", "WH-0", "Bench"))
            .await
            .unwrap();
        inventory.restock("WH-0", &product, 100).await.unwrap();
    });
    let mut n = 0u64;

    c.bench_function("inventory/reserve_release", |b| {
        b.iter(|| {
            n += 1;
            let order = OrderNumber::new(format!("ORD-{n}"));
            rt.block_on(async {
                inventory
                    .reserve(&order, &[ReservationLine::new(product.clone(), 5)])
                    .await
                    .unwrap();
                inventory.release(&order).await;
            });
        });
    });
}

criterion_group!(benches, bench_reserve_confirm, bench_reserve_release);
criterion_main!(benches);
