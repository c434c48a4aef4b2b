//! The reservation engine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{OrderNumber, ProductId};
use messaging::{EventPublisher, Message, StockMessage, topics};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::model::generate_reservation_id;
use crate::{
    AuditEntry, InventoryError, Reservation, ReservationLine, ReservationStatus, Result,
    StockAction, StockLevel, Warehouse,
};

#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// How long a pending reservation holds its stock.
    pub reservation_expiry: Duration,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            reservation_expiry: Duration::minutes(30),
        }
    }
}

type StockKey = (String, ProductId);

#[derive(Default)]
struct InventoryState {
    /// Scan order for first-fit placement.
    warehouses: Vec<Warehouse>,
    stock: HashMap<StockKey, StockLevel>,
    reservations: Vec<Reservation>,
    audit: Vec<AuditEntry>,
}

impl InventoryState {
    fn level_mut(&mut self, warehouse_id: &str, product_id: &ProductId) -> &mut StockLevel {
        self.stock
            .entry((warehouse_id.to_string(), product_id.clone()))
            .or_insert_with(|| StockLevel::empty(warehouse_id, product_id))
    }

    fn available(&self, warehouse_id: &str, product_id: &ProductId) -> u32 {
        self.stock
            .get(&(warehouse_id.to_string(), product_id.clone()))
            .map(|level| level.available)
            .unwrap_or(0)
    }

    fn record(&mut self, reservation: &Reservation, action: StockAction, note: String) {
        self.audit.push(AuditEntry {
            warehouse_id: reservation.warehouse_id.clone(),
            product_id: reservation.product_id.clone(),
            action,
            quantity: reservation.quantity,
            reference: reservation.id.clone(),
            note,
            recorded_at: Utc::now(),
        });
    }

    /// Picks a warehouse for every line without touching stock.
    ///
    /// Each line goes to the first warehouse, in scan order, that can hold it
    /// whole, taking earlier lines of the same batch into account.
    fn place(&self, lines: &[ReservationLine]) -> Result<Vec<String>> {
        let mut claimed: HashMap<StockKey, u32> = HashMap::new();
        let mut placement = Vec::with_capacity(lines.len());

        for line in lines {
            if line.quantity == 0 {
                return Err(InventoryError::InvalidQuantity(line.product_id.clone()));
            }
            let warehouse = self.warehouses.iter().find(|w| {
                let key = (w.id.clone(), line.product_id.clone());
                let taken = claimed.get(&key).copied().unwrap_or(0);
                self.available(&w.id, &line.product_id).saturating_sub(taken) >= line.quantity
            });
            let Some(warehouse) = warehouse else {
                return Err(InventoryError::InsufficientStock {
                    product_id: line.product_id.clone(),
                    requested: line.quantity,
                });
            };
            *claimed
                .entry((warehouse.id.clone(), line.product_id.clone()))
                .or_default() += line.quantity;
            placement.push(warehouse.id.clone());
        }
        Ok(placement)
    }

    /// Puts a pending reservation's units back on the shelf.
    fn cancel(&mut self, index: usize, note: String) -> Option<Reservation> {
        let reservation = &mut self.reservations[index];
        if !reservation.is_pending() {
            return None;
        }
        reservation.status = ReservationStatus::Cancelled;
        reservation.updated_at = Utc::now();
        let reservation = reservation.clone();

        let level = self.level_mut(&reservation.warehouse_id, &reservation.product_id);
        level.available += reservation.quantity;
        level.reserved -= reservation.quantity;
        self.record(&reservation, StockAction::Release, note);
        Some(reservation)
    }
}

/// Per-warehouse stock counters with two-phase reservations.
///
/// A reservation moves units from `available` to `reserved`; confirming it
/// removes them from `reserved` and `total`, releasing it moves them back.
/// Every counter change happens under a single lock.
#[derive(Clone)]
pub struct Inventory {
    state: Arc<Mutex<InventoryState>>,
    publisher: Arc<dyn EventPublisher>,
    config: InventoryConfig,
}

impl Inventory {
    pub fn new(config: InventoryConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InventoryState::default())),
            publisher,
            config,
        }
    }

    pub async fn add_warehouse(&self, warehouse: Warehouse) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.warehouses.iter().any(|w| w.id == warehouse.id) {
            return Err(InventoryError::WarehouseExists(warehouse.id));
        }
        info!(warehouse_id = %warehouse.id, "warehouse added");
        state.warehouses.push(warehouse);
        Ok(())
    }

    pub async fn warehouses(&self) -> Vec<Warehouse> {
        self.state.lock().await.warehouses.clone()
    }

    /// Adds units of a product to a warehouse.
    pub async fn restock(
        &self,
        warehouse_id: &str,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<StockLevel> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(product_id.clone()));
        }
        let mut state = self.state.lock().await;
        if !state.warehouses.iter().any(|w| w.id == warehouse_id) {
            return Err(InventoryError::UnknownWarehouse(warehouse_id.to_string()));
        }

        let level = state.level_mut(warehouse_id, product_id);
        level.available += quantity;
        level.total += quantity;
        let level = level.clone();

        state.audit.push(AuditEntry {
            warehouse_id: warehouse_id.to_string(),
            product_id: product_id.clone(),
            action: StockAction::Restock,
            quantity,
            reference: warehouse_id.to_string(),
            note: "Stock received".to_string(),
            recorded_at: Utc::now(),
        });
        Ok(level)
    }

    /// Stock of a product in every warehouse holding it, in scan order.
    pub async fn levels(&self, product_id: &ProductId) -> Vec<StockLevel> {
        let state = self.state.lock().await;
        state
            .warehouses
            .iter()
            .filter_map(|w| state.stock.get(&(w.id.clone(), product_id.clone())))
            .cloned()
            .collect()
    }

    /// Units of a product available across all warehouses.
    pub async fn available(&self, product_id: &ProductId) -> u32 {
        self.levels(product_id).await.iter().map(|l| l.available).sum()
    }

    /// Checks every line could be reserved right now, without reserving.
    pub async fn check(&self, lines: &[ReservationLine]) -> Result<()> {
        self.state.lock().await.place(lines).map(|_| ())
    }

    /// Reserves every line for the order, or nothing.
    ///
    /// Each line is held whole in a single warehouse. When any line cannot be
    /// placed no stock is touched and the error names its product.
    #[tracing::instrument(skip(self, lines), fields(order_number = %order_number, lines = lines.len()))]
    pub async fn reserve(
        &self,
        order_number: &OrderNumber,
        lines: &[ReservationLine],
    ) -> Result<Vec<Reservation>> {
        let result = {
            let mut state = self.state.lock().await;
            state.place(lines).map(|placement| {
                let now = Utc::now();
                let mut made = Vec::with_capacity(lines.len());
                for (line, warehouse_id) in lines.iter().zip(placement) {
                    let level = state.level_mut(&warehouse_id, &line.product_id);
                    level.available -= line.quantity;
                    level.reserved += line.quantity;

                    let reservation = Reservation {
                        id: generate_reservation_id(),
                        order_number: order_number.clone(),
                        warehouse_id,
                        product_id: line.product_id.clone(),
                        quantity: line.quantity,
                        status: ReservationStatus::Pending,
                        created_at: now,
                        expires_at: now + self.config.reservation_expiry,
                        updated_at: now,
                    };
                    state.record(
                        &reservation,
                        StockAction::Reserve,
                        format!("Reserved for order: {order_number}"),
                    );
                    state.reservations.push(reservation.clone());
                    made.push(reservation);
                }
                made
            })
        };

        match &result {
            Ok(made) => {
                metrics::counter!("inventory_reservations_total", "outcome" => "reserved")
                    .increment(made.len() as u64);
                for reservation in made {
                    info!(
                        reservation_id = %reservation.id,
                        warehouse_id = %reservation.warehouse_id,
                        product_id = %reservation.product_id,
                        quantity = reservation.quantity,
                        "stock reserved"
                    );
                    self.announce(
                        topics::STOCK_RESERVED,
                        stock_message(reservation, "RESERVED", "Stock reserved"),
                    )
                    .await;
                }
            }
            Err(InventoryError::InsufficientStock {
                product_id,
                requested,
            }) => {
                metrics::counter!("inventory_reservations_total", "outcome" => "insufficient")
                    .increment(1);
                warn!(%product_id, requested, "insufficient stock");
                self.announce(
                    topics::STOCK_INSUFFICIENT,
                    StockMessage {
                        order_number: order_number.clone(),
                        product_id: product_id.clone(),
                        warehouse_id: None,
                        reservation_id: None,
                        quantity: *requested,
                        status: "INSUFFICIENT".to_string(),
                        note: format!("Insufficient stock for product: {product_id}"),
                        timestamp: Utc::now(),
                    },
                )
                .await;
            }
            Err(err) => warn!(error = %err, "reservation rejected"),
        }
        result
    }

    /// Deducts every pending reservation of the order from stock.
    ///
    /// Returns the reservations confirmed by this call; repeating it
    /// confirms nothing more.
    #[tracing::instrument(skip(self), fields(order_number = %order_number))]
    pub async fn confirm(&self, order_number: &OrderNumber) -> Result<Vec<Reservation>> {
        let confirmed = {
            let mut state = self.state.lock().await;
            let indices: Vec<usize> = state
                .reservations
                .iter()
                .enumerate()
                .filter(|(_, r)| &r.order_number == order_number)
                .map(|(i, _)| i)
                .collect();
            if indices.is_empty() {
                return Err(InventoryError::NoReservations(order_number.clone()));
            }

            let mut confirmed = Vec::new();
            for index in indices {
                let reservation = &mut state.reservations[index];
                if !reservation.is_pending() {
                    continue;
                }
                reservation.status = ReservationStatus::Confirmed;
                reservation.updated_at = Utc::now();
                let reservation = reservation.clone();

                let level = state.level_mut(&reservation.warehouse_id, &reservation.product_id);
                level.reserved -= reservation.quantity;
                level.total -= reservation.quantity;
                state.record(
                    &reservation,
                    StockAction::Deduct,
                    format!("Inventory deducted for order: {order_number}"),
                );
                confirmed.push(reservation);
            }
            confirmed
        };

        metrics::counter!("inventory_reservations_total", "outcome" => "confirmed")
            .increment(confirmed.len() as u64);
        for reservation in &confirmed {
            self.announce(
                topics::STOCK_DEDUCTED,
                stock_message(reservation, "DEDUCTED", "Stock deducted"),
            )
            .await;
        }
        info!(count = confirmed.len(), "reservations confirmed");
        Ok(confirmed)
    }

    /// Returns every pending reservation of the order to available stock.
    ///
    /// Confirmed and cancelled reservations are left alone, so the call is
    /// safe to repeat.
    #[tracing::instrument(skip(self), fields(order_number = %order_number))]
    pub async fn release(&self, order_number: &OrderNumber) -> Vec<Reservation> {
        let released = {
            let mut state = self.state.lock().await;
            let indices: Vec<usize> = state
                .reservations
                .iter()
                .enumerate()
                .filter(|(_, r)| &r.order_number == order_number && r.is_pending())
                .map(|(i, _)| i)
                .collect();
            indices
                .into_iter()
                .filter_map(|i| {
                    state.cancel(
                        i,
                        format!("Reservation released for order: {order_number}"),
                    )
                })
                .collect::<Vec<_>>()
        };

        metrics::counter!("inventory_reservations_total", "outcome" => "released")
            .increment(released.len() as u64);
        info!(count = released.len(), "reservations released");
        released
    }

    /// Releases every pending reservation whose hold ran out by `now`.
    pub async fn release_expired(&self, now: DateTime<Utc>) -> Vec<Reservation> {
        let expired = {
            let mut state = self.state.lock().await;
            let indices: Vec<usize> = state
                .reservations
                .iter()
                .enumerate()
                .filter(|(_, r)| r.is_expired(now))
                .map(|(i, _)| i)
                .collect();
            indices
                .into_iter()
                .filter_map(|i| state.cancel(i, "Reservation expired".to_string()))
                .collect::<Vec<_>>()
        };

        if !expired.is_empty() {
            metrics::counter!("inventory_reservations_total", "outcome" => "expired")
                .increment(expired.len() as u64);
            info!(count = expired.len(), "expired reservations released");
        }
        expired
    }

    pub async fn reservations_for(&self, order_number: &OrderNumber) -> Vec<Reservation> {
        self.state
            .lock()
            .await
            .reservations
            .iter()
            .filter(|r| &r.order_number == order_number)
            .cloned()
            .collect()
    }

    /// The stock movement journal, oldest first.
    pub async fn audit_log(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    async fn announce(&self, routing_key: &str, payload: StockMessage) {
        let published = match Message::new(routing_key, &payload) {
            Ok(message) => self.publisher.publish(message).await,
            Err(err) => Err(err),
        };
        if let Err(err) = published {
            warn!(routing_key, error = %err, "failed to publish stock event");
        }
    }
}

fn stock_message(reservation: &Reservation, status: &str, note: &str) -> StockMessage {
    StockMessage {
        order_number: reservation.order_number.clone(),
        product_id: reservation.product_id.clone(),
        warehouse_id: Some(reservation.warehouse_id.clone()),
        reservation_id: Some(reservation.id.clone()),
        quantity: reservation.quantity,
        status: status.to_string(),
        note: note.to_string(),
        timestamp: reservation.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use messaging::InMemoryBroker;

    async fn inventory() -> (Inventory, InMemoryBroker) {
        let broker = InMemoryBroker::new();
        let inventory = Inventory::new(InventoryConfig::default(), Arc::new(broker.clone()));
        for id in ["WH-1", "WH-2"] {
            inventory
                .add_warehouse(Warehouse::new(id, id, "Sydney"))
                .await
                .unwrap();
        }
        (inventory, broker)
    }

    fn product(id: &str) -> ProductId {
        ProductId::new(id)
    }

    #[tokio::test]
    async fn reserve_picks_first_warehouse_with_enough_stock() {
        let (inventory, broker) = inventory().await;
        inventory.restock("WH-1", &product("P"), 2).await.unwrap();
        inventory.restock("WH-2", &product("P"), 5).await.unwrap();

        let order = OrderNumber::new("ORD-1");
        let made = inventory
            .reserve(&order, &[ReservationLine::new("P", 3)])
            .await
            .unwrap();

        assert_eq!(made.len(), 1);
        assert_eq!(made[0].warehouse_id, "WH-2");
        assert!(made[0].id.starts_with("RES-"));
        assert_eq!(made[0].expires_at - made[0].created_at, Duration::minutes(30));

        let levels = inventory.levels(&product("P")).await;
        assert_eq!((levels[0].available, levels[0].reserved), (2, 0));
        assert_eq!((levels[1].available, levels[1].reserved), (2, 3));
        assert!(levels.iter().all(StockLevel::is_balanced));
        assert_eq!(broker.published(topics::STOCK_RESERVED).await.len(), 1);
    }

    #[tokio::test]
    async fn reserve_never_splits_a_line_and_is_all_or_nothing() {
        let (inventory, broker) = inventory().await;
        inventory.restock("WH-1", &product("P"), 3).await.unwrap();
        inventory.restock("WH-2", &product("P"), 3).await.unwrap();
        inventory.restock("WH-1", &product("Q"), 10).await.unwrap();

        let err = inventory
            .reserve(
                &OrderNumber::new("ORD-1"),
                &[ReservationLine::new("Q", 1), ReservationLine::new("P", 4)],
            )
            .await
            .unwrap_err();

        assert_eq!(err.product_id(), Some(&product("P")));
        assert_eq!(inventory.available(&product("P")).await, 6);
        assert_eq!(inventory.available(&product("Q")).await, 10);
        assert!(inventory.reservations_for(&OrderNumber::new("ORD-1")).await.is_empty());
        assert_eq!(broker.published(topics::STOCK_INSUFFICIENT).await.len(), 1);
    }

    #[tokio::test]
    async fn lines_of_one_batch_share_the_stock() {
        let (inventory, _) = inventory().await;
        inventory.restock("WH-1", &product("P"), 3).await.unwrap();
        inventory.restock("WH-2", &product("P"), 2).await.unwrap();

        let made = inventory
            .reserve(
                &OrderNumber::new("ORD-1"),
                &[ReservationLine::new("P", 2), ReservationLine::new("P", 2)],
            )
            .await
            .unwrap();

        assert_eq!(made[0].warehouse_id, "WH-1");
        assert_eq!(made[1].warehouse_id, "WH-2");
    }

    #[tokio::test]
    async fn confirm_deducts_total_and_is_idempotent() {
        let (inventory, broker) = inventory().await;
        inventory.restock("WH-1", &product("P"), 5).await.unwrap();
        let order = OrderNumber::new("ORD-1");
        inventory
            .reserve(&order, &[ReservationLine::new("P", 2)])
            .await
            .unwrap();

        assert_eq!(inventory.confirm(&order).await.unwrap().len(), 1);
        assert!(inventory.confirm(&order).await.unwrap().is_empty());
        assert!(inventory.release(&order).await.is_empty());

        let level = &inventory.levels(&product("P")).await[0];
        assert_eq!((level.available, level.reserved, level.total), (3, 0, 3));
        assert_eq!(broker.published(topics::STOCK_DEDUCTED).await.len(), 1);

        let actions: Vec<StockAction> = inventory
            .audit_log()
            .await
            .iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![StockAction::Restock, StockAction::Reserve, StockAction::Deduct]
        );
    }

    #[tokio::test]
    async fn confirm_without_reservations_fails() {
        let (inventory, _) = inventory().await;
        assert!(matches!(
            inventory.confirm(&OrderNumber::new("ORD-X")).await,
            Err(InventoryError::NoReservations(_))
        ));
    }

    #[tokio::test]
    async fn release_restores_available_once() {
        let (inventory, _) = inventory().await;
        inventory.restock("WH-1", &product("P"), 5).await.unwrap();
        let order = OrderNumber::new("ORD-1");
        inventory
            .reserve(&order, &[ReservationLine::new("P", 2)])
            .await
            .unwrap();

        let level = &inventory.levels(&product("P")).await[0];
        assert_eq!((level.available, level.reserved), (3, 2));

        assert_eq!(inventory.release(&order).await.len(), 1);
        assert!(inventory.release(&order).await.is_empty());

        let level = &inventory.levels(&product("P")).await[0];
        assert_eq!((level.available, level.reserved, level.total), (5, 0, 5));
        assert_eq!(
            inventory.reservations_for(&order).await[0].status,
            ReservationStatus::Cancelled
        );
    }

    #[tokio::test]
    async fn expired_reservations_are_released() {
        let (inventory, _) = inventory().await;
        inventory.restock("WH-1", &product("P"), 5).await.unwrap();
        let fresh = OrderNumber::new("ORD-FRESH");
        let stale = OrderNumber::new("ORD-STALE");
        inventory
            .reserve(&stale, &[ReservationLine::new("P", 1)])
            .await
            .unwrap();
        inventory
            .reserve(&fresh, &[ReservationLine::new("P", 1)])
            .await
            .unwrap();
        inventory.confirm(&fresh).await.unwrap();

        assert!(inventory.release_expired(Utc::now()).await.is_empty());

        let later = Utc::now() + Duration::minutes(31);
        let expired = inventory.release_expired(later).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].order_number, stale);

        let level = &inventory.levels(&product("P")).await[0];
        assert_eq!((level.available, level.reserved, level.total), (4, 0, 4));
    }

    #[tokio::test]
    async fn rejects_zero_quantity_and_unknown_warehouse() {
        let (inventory, _) = inventory().await;
        assert!(matches!(
            inventory.restock("WH-9", &product("P"), 1).await,
            Err(InventoryError::UnknownWarehouse(_))
        ));
        assert!(matches!(
            inventory
                .reserve(&OrderNumber::new("ORD-1"), &[ReservationLine::new("P", 0)])
                .await,
            Err(InventoryError::InvalidQuantity(_))
        ));
    }
}
