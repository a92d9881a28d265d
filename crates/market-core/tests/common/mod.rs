//! Shared helpers for the engine integration tests.

use market_config::OrdersConfig;
use market_core::OrderEngine;
use market_storage::{implementations::memory::MemoryStorage, StorageService};
use market_types::{Gig, Order};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Builds an engine over a fresh in-memory store with default limits.
pub fn engine() -> OrderEngine {
	let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
	OrderEngine::new(storage, &OrdersConfig::default())
}

pub fn dec(n: i64) -> Decimal {
	Decimal::new(n, 0)
}

/// Publishes a gig for `seller` priced at `price`.
pub async fn gig(engine: &OrderEngine, seller: &str, price: i64) -> Gig {
	engine
		.create_gig(seller, "logo design", "a logo", dec(price), 7)
		.await
		.unwrap()
}

/// Places an order by `buyer` against a fresh gig of `seller`.
pub async fn order(engine: &OrderEngine, buyer: &str, seller: &str, price: i64) -> Order {
	let gig = gig(engine, seller, price).await;
	engine.create_order(buyer, &gig.id).await.unwrap()
}

/// Drives an order from `Pending` to `Active` via the seller.
pub async fn activate(engine: &OrderEngine, order: &Order) -> Order {
	engine
		.change_status(&order.id, &order.seller_id, market_types::OrderStatus::Active)
		.await
		.unwrap()
}
