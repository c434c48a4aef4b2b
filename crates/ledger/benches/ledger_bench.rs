use std::sync::Arc;

use common::{CustomerId, Money, OrderNumber};
use criterion::{Criterion, criterion_group, criterion_main};
use ledger::{Account, Ledger, LedgerConfig, TransactionKind, TransferRequest};
use messaging::InMemoryBroker;

fn setup(rt: &tokio::runtime::Runtime) -> Ledger {
    let ledger = Ledger::new(LedgerConfig::default(), Arc::new(InMemoryBroker::new()));
    rt.block_on(async {
        ledger
            .open_account(Account::store("STORE-001", "Store", Money::zero(), "AUD"))
            .await
            .unwrap();
        ledger
            .open_account(Account::customer(
                "ACC-BENCH",
                CustomerId::new("bench"),
                "Bench",
                Money::from_units(1_000_000_000),
                "AUD",
            ))
            .await
            .unwrap();
    });
    ledger
}

fn bench_transfer(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = setup(&rt);

    c.bench_function("ledger/transfer", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger
                    .transfer(TransferRequest {
                        from_account: "ACC-BENCH".into(),
                        to_account: "STORE-001".into(),
                        amount: Money::from_cents(1),
                        currency: "AUD".into(),
                        kind: TransactionKind::Payment,
                        order_number: OrderNumber::new("ORD-BENCH"),
                        original_transaction_id: None,
                        description: "bench".into(),
                    })
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_pay_and_refund(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = setup(&rt);
    let owner = CustomerId::new("bench");
    let mut n = 0u64;

    c.bench_function("ledger/pay_and_refund", |b| {
        b.iter(|| {
            n += 1;
            let order = OrderNumber::new(format!("ORD-{n}"));
            rt.block_on(async {
                ledger.pay(&order, &owner, Money::from_cents(999)).await.unwrap();
                ledger.refund(&order, None, "bench").await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_transfer, bench_pay_and_refund);
criterion_main!(benches);
