//! HTTP API server for the fulfillment platform.
//!
//! Wires the engines, the broker and the saga into one process, runs the
//! queue consumers and periodic tasks, and serves the REST endpoints with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use delivery::{DeliveryService, LossProbability};
use domain::InMemoryCatalog;
use event_store::InMemoryEventStore;
use inventory::Inventory;
use ledger::Ledger;
use messaging::{InMemoryBroker, MessagingError, spawn_consumer};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{
    Collaborators, DeliveryStatusReconciler, InMemoryNotifier, OrderSaga,
    RefundSettlementListener,
};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use config::Config;

pub type Store = InMemoryEventStore;
pub type Saga = OrderSaga<Store, Inventory, Ledger, DeliveryService, InMemoryNotifier>;
pub type Reconciler = DeliveryStatusReconciler<Store, InMemoryNotifier>;

/// Shared application state accessible from all handlers.
///
/// The engines are cheap handles over shared state, so the saga, the
/// consumers and the handlers all see the same stock, balances and parcels.
pub struct AppState {
    pub store: Store,
    pub broker: InMemoryBroker,
    pub catalog: InMemoryCatalog,
    pub inventory: Inventory,
    pub ledger: Ledger,
    pub deliveries: DeliveryService,
    pub notifier: InMemoryNotifier,
    pub saga: Saga,
    pub reconciler: Reconciler,
}

impl AppState {
    /// Builds every component from the configuration, with empty stores.
    pub fn new(config: &Config) -> Self {
        let store = InMemoryEventStore::new();
        let broker = InMemoryBroker::new();
        let publisher = Arc::new(broker.clone());

        let loss = LossProbability::new(config.loss_probability).unwrap_or_else(|err| {
            warn!(error = %err, "invalid loss probability, parcels will not be lost");
            LossProbability::default()
        });

        let catalog = InMemoryCatalog::new();
        let inventory = Inventory::new(config.inventory_config(), publisher.clone());
        let ledger = Ledger::new(config.ledger_config(), publisher.clone());
        let deliveries = DeliveryService::new(config.delivery_config(), loss, publisher.clone());
        let notifier = InMemoryNotifier::new();

        let saga = OrderSaga::new(
            store.clone(),
            Collaborators {
                catalog: Arc::new(catalog.clone()),
                inventory: inventory.clone(),
                payment: ledger.clone(),
                shipping: deliveries.clone(),
                notifier: notifier.clone(),
                publisher: publisher.clone(),
            },
            config.saga_config(),
        );
        let reconciler = DeliveryStatusReconciler::new(
            store.clone(),
            notifier.clone(),
            publisher,
            config.retry_policy(),
        );

        Self {
            store,
            broker,
            catalog,
            inventory,
            ledger,
            deliveries,
            notifier,
            saga,
            reconciler,
        }
    }

    /// Declares every queue and starts its consumer.
    ///
    /// Queues are declared before anything is published, so no event
    /// emitted after this returns is missed.
    pub async fn start_consumers(&self) -> Result<Vec<JoinHandle<()>>, MessagingError> {
        let mut tasks = Vec::new();

        let queue = self
            .broker
            .declare_queue(saga::DELIVERY_STATUS_QUEUE, &saga::DELIVERY_STATUS_BINDINGS)
            .await?;
        tasks.push(spawn_consumer(queue, Arc::new(self.reconciler.clone())));

        let queue = self
            .broker
            .declare_queue(
                saga::REFUND_SETTLEMENT_QUEUE,
                &saga::REFUND_SETTLEMENT_BINDINGS,
            )
            .await?;
        tasks.push(spawn_consumer(
            queue,
            Arc::new(RefundSettlementListener::new(
                self.store.clone(),
                self.notifier.clone(),
            )),
        ));

        let queue = self
            .broker
            .declare_queue(ledger::LOST_PACKAGE_QUEUE, &ledger::LOST_PACKAGE_BINDINGS)
            .await?;
        tasks.push(spawn_consumer(
            queue,
            Arc::new(ledger::LostPackageRefunder::new(self.ledger.clone())),
        ));

        let queue = self
            .broker
            .declare_queue(
                inventory::ORDER_CANCELLED_QUEUE,
                &inventory::ORDER_CANCELLED_BINDINGS,
            )
            .await?;
        tasks.push(spawn_consumer(
            queue,
            Arc::new(inventory::OrderCancellationListener::new(
                self.inventory.clone(),
            )),
        ));

        let queue = self
            .broker
            .declare_queue(
                delivery::ORDER_CANCELLED_QUEUE,
                &delivery::ORDER_CANCELLED_BINDINGS,
            )
            .await?;
        tasks.push(spawn_consumer(
            queue,
            Arc::new(delivery::OrderCancellationListener::new(
                self.deliveries.clone(),
            )),
        ));

        info!(consumers = tasks.len(), "queue consumers started");
        Ok(tasks)
    }

    /// Starts the delivery scanner and the reservation expiry sweep.
    pub fn start_periodic_tasks(&self, config: &Config) -> Vec<JoinHandle<()>> {
        vec![
            delivery::spawn_scanner(self.deliveries.clone()),
            inventory::spawn_expiry_sweep(self.inventory.clone(), config.expiry_sweep_interval()),
        ]
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            post(routes::orders::create).get(routes::orders::list),
        )
        .route("/orders/{order_number}", get(routes::orders::get))
        .route("/orders/{order_number}/cancel", post(routes::orders::cancel))
        .route("/accounts/{owner}/balance", get(routes::accounts::balance))
        .route("/inventory/{product_id}", get(routes::inventory::levels))
        .route("/deliveries/{delivery_id}", get(routes::deliveries::get))
        .route("/deliveries/{delivery_id}/lost", post(routes::deliveries::report_lost))
        .route(
            "/admin/delivery/loss-probability",
            get(routes::admin::loss_probability).put(routes::admin::set_loss_probability),
        )
        .route("/admin/reconciler/abandoned", get(routes::admin::abandoned_events))
        .with_state(state)
        .merge(metrics_router)
        .layer(middleware::from_fn(count_requests))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

async fn count_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;
    metrics::counter!(
        "http_requests_total",
        "method" => method,
        "status" => response.status().as_u16().to_string()
    )
    .increment(1);
    response
}
