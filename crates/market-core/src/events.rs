//! Event types and the event bus for order lifecycle notifications.
//!
//! Every successful engine operation publishes an event describing what
//! changed. Consumers subscribe through the bus; a consumer that falls
//! behind loses the oldest events rather than blocking the engine.

use market_types::{Order, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the order engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderEvent {
	/// A new order has been created.
	Created { order: Box<Order> },
	/// An order moved between statuses.
	StatusChanged {
		order_id: String,
		from: OrderStatus,
		to: OrderStatus,
	},
	/// Part of an order was delegated to another seller.
	Shared {
		parent_id: String,
		child_id: String,
		share_price: Decimal,
	},
	/// A seller proposed a modification.
	ModificationRequested { order_id: String, index: usize },
	/// The buyer accepted a modification.
	ModificationAccepted { order_id: String, index: usize },
	/// A dispute was opened on an order.
	DisputeOpened { order_id: String },
	/// A dispute was closed and the order returned to work.
	DisputeClosed { order_id: String },
	/// The buyer reviewed a completed order.
	ReviewSubmitted { order_id: String, rating: u8 },
}

/// Broadcast bus carrying [`OrderEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<OrderEvent>,
}

impl EventBus {
	/// Creates a new event bus with the given channel capacity.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Publishes an event to all current subscribers.
	///
	/// Returns the number of subscribers that received the event; an
	/// error means there are currently no subscribers, which callers may
	/// ignore.
	pub fn publish(
		&self,
		event: OrderEvent,
	) -> Result<usize, broadcast::error::SendError<OrderEvent>> {
		self.sender.send(event)
	}

	/// Creates a new subscription to the event stream.
	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.sender.subscribe()
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new(256)
	}
}
