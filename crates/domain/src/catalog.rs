//! Product catalog lookup.
//!
//! Catalog maintenance lives elsewhere; orders only need to know whether a
//! product exists, whether it is still sold, and its current price.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub active: bool,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_price,
            active: true,
        }
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Read access to the product catalog.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, id: &ProductId) -> Option<Product>;
}

/// In-memory catalog.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: Arc::new(RwLock::new(map)),
        }
    }

    pub async fn upsert(&self, product: Product) {
        self.products
            .write()
            .await
            .insert(product.id.clone(), product);
    }

    /// Returns all products, sorted by id.
    pub async fn list(&self) -> Vec<Product> {
        let mut products: Vec<_> = self.products.read().await.values().cloned().collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        products
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, id: &ProductId) -> Option<Product> {
        self.products.read().await.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_and_upsert() {
        let catalog = InMemoryCatalog::with_products([Product::new(
            "SKU-1",
            "Widget",
            Money::from_cents(1000),
        )]);

        let product = catalog.product(&ProductId::new("SKU-1")).await.unwrap();
        assert!(product.active);
        assert!(catalog.product(&ProductId::new("SKU-9")).await.is_none());

        catalog.upsert(product.inactive()).await;
        assert!(!catalog.product(&ProductId::new("SKU-1")).await.unwrap().active);
        assert_eq!(catalog.list().await.len(), 1);
    }
}
