//! Core order engine for the marketplace order service.
//!
//! This module provides the main orchestration logic for the order
//! lifecycle, coordinating the status transition engine, the delegation
//! (share) manager, and the modification/dispute/review sub-ledger over
//! a shared storage service. Every mutating operation is serialized
//! per order through a lock registry, and successful operations publish
//! events on a broadcast bus.

use dashmap::DashMap;
use market_config::OrdersConfig;
use market_storage::{StorageError, StorageService};
use market_types::{Deliverable, DeliverableUpload, Gig, Order, OrderStatus, StorageKey};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};
use tracing::instrument;
use uuid::Uuid;

pub mod delegation;
pub mod events;
pub mod ledger;
pub mod state;

pub use delegation::DelegationManager;
pub use events::{EventBus, OrderEvent};
pub use ledger::{LedgerLimits, LedgerManager};
pub use state::{effective_role, EdgeKind, OrderStateMachine, Party};

/// Utility function to truncate an id for display purposes.
///
/// Shows only the first 8 characters followed by ".." for longer strings.
pub(crate) fn truncate_id(id: &str) -> String {
	if id.len() <= 8 {
		id.to_string()
	} else {
		format!("{}..", &id[..8])
	}
}

/// Current unix time in seconds.
pub(crate) fn now_secs() -> Result<u64, EngineError> {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.map_err(|e| EngineError::Time(e.to_string()))
}

/// Errors that can occur during engine operations.
///
/// All failures are recoverable at the caller: the engine never panics
/// on bad input, and validation fully precedes mutation so a failed
/// operation leaves no partial state behind.
#[derive(Debug, Error)]
pub enum EngineError {
	/// The referenced order does not exist.
	#[error("Order not found: {0}")]
	OrderNotFound(String),
	/// The referenced gig does not exist.
	#[error("Gig not found: {0}")]
	GigNotFound(String),
	/// The actor lacks the role required for the attempted action.
	#[error("Unauthorized: {actor} may not {action}")]
	Unauthorized { actor: String, action: String },
	/// The attempted edge is not defined from the current state.
	#[error("Invalid transition from {from} to {to}")]
	InvalidTransition { from: OrderStatus, to: OrderStatus },
	/// A share exceeds the parent's remaining balance.
	#[error("Insufficient balance: requested {requested}, available {available}")]
	InsufficientBalance {
		requested: Decimal,
		available: Decimal,
	},
	/// A seller attempted to delegate an order to their own gig.
	#[error("Cannot share an order back to its own seller")]
	SelfShareNotAllowed,
	/// The payload is malformed or violates a business rule.
	#[error("Validation error: {0}")]
	Validation(String),
	/// The storage backend failed.
	#[error("Storage error: {0}")]
	Storage(String),
	/// System clock failure.
	#[error("Time error: {0}")]
	Time(String),
}

/// Per-order lock registry providing single-writer-per-order semantics.
///
/// Transitions are read-modify-write on status, and delegation reads a
/// balance derived from sibling orders; both must be serialized against
/// concurrent writers of the same order.
struct LockRegistry {
	locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LockRegistry {
	fn new() -> Self {
		Self {
			locks: DashMap::new(),
		}
	}

	/// Acquires the lock for a single order, creating it on first use.
	async fn acquire(&self, order_id: &str) -> OwnedMutexGuard<()> {
		let lock = self
			.locks
			.entry(order_id.to_string())
			.or_insert_with(|| Arc::new(Mutex::new(())))
			.clone();
		lock.lock_owned().await
	}
}

/// Main engine coordinating the order lifecycle.
///
/// The OrderEngine owns the per-order lock registry and wires together:
/// - the status transition engine, the single authority over `status`
/// - the delegation manager for parent/child order relationships
/// - the sub-ledger for modifications, disputes, and reviews
/// - the event bus notifying subscribers of lifecycle changes
pub struct OrderEngine {
	storage: Arc<StorageService>,
	state: Arc<OrderStateMachine>,
	delegation: DelegationManager,
	ledger: LedgerManager,
	locks: LockRegistry,
	event_bus: EventBus,
}

impl OrderEngine {
	/// Creates a new engine over the given storage with the given order
	/// limits.
	pub fn new(storage: Arc<StorageService>, orders: &OrdersConfig) -> Self {
		let state = Arc::new(OrderStateMachine::new(Arc::clone(&storage)));
		let delegation = DelegationManager::new(Arc::clone(&storage), Arc::clone(&state));
		let ledger = LedgerManager::new(
			Arc::clone(&state),
			LedgerLimits {
				max_modification_requests: orders.max_modification_requests,
				max_deliverables: orders.max_deliverables,
			},
		);

		Self {
			storage,
			state,
			delegation,
			ledger,
			locks: LockRegistry::new(),
			event_bus: EventBus::default(),
		}
	}

	/// Creates a new subscription to the engine's event stream.
	pub fn subscribe(&self) -> broadcast::Receiver<OrderEvent> {
		self.event_bus.subscribe()
	}

	/// Publishes a gig so buyers can order against it.
	pub async fn create_gig(
		&self,
		seller_id: &str,
		title: &str,
		description: &str,
		price: Decimal,
		delivery_time: u32,
	) -> Result<Gig, EngineError> {
		if seller_id.trim().is_empty() {
			return Err(EngineError::Validation("seller id cannot be empty".into()));
		}
		if title.trim().is_empty() {
			return Err(EngineError::Validation("gig title cannot be empty".into()));
		}
		if price <= Decimal::ZERO {
			return Err(EngineError::Validation(
				"gig price must be positive".into(),
			));
		}
		if delivery_time == 0 {
			return Err(EngineError::Validation(
				"gig delivery time must be positive".into(),
			));
		}

		let gig = Gig {
			id: Uuid::new_v4().to_string(),
			seller_id: seller_id.to_string(),
			title: title.to_string(),
			description: description.to_string(),
			price,
			delivery_time,
			created_at: now_secs()?,
		};

		self.storage
			.store(StorageKey::Gigs.as_str(), &gig.id, &gig)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;

		tracing::info!(gig_id = %truncate_id(&gig.id), seller_id = %gig.seller_id, "Published gig");
		Ok(gig)
	}

	/// Gets a gig by ID.
	pub async fn get_gig(&self, gig_id: &str) -> Result<Gig, EngineError> {
		self.storage
			.retrieve(StorageKey::Gigs.as_str(), gig_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => EngineError::GigNotFound(gig_id.to_string()),
				other => EngineError::Storage(other.to_string()),
			})
	}

	/// Gets an order by ID.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, EngineError> {
		self.state.get_order(order_id).await
	}

	/// Places a new order against a gig. The order starts `Pending`,
	/// awaiting the seller's decision.
	#[instrument(skip(self))]
	pub async fn create_order(&self, buyer_id: &str, gig_id: &str) -> Result<Order, EngineError> {
		if buyer_id.trim().is_empty() {
			return Err(EngineError::Validation("buyer id cannot be empty".into()));
		}

		let gig = self.get_gig(gig_id).await?;
		if gig.seller_id == buyer_id {
			return Err(EngineError::Validation(
				"buyers cannot order their own gig".into(),
			));
		}

		let now = now_secs()?;
		let order = Order {
			id: Uuid::new_v4().to_string(),
			buyer_id: buyer_id.to_string(),
			seller_id: gig.seller_id.clone(),
			gig_id: gig.id.clone(),
			price: gig.price,
			delivery_time: gig.delivery_time,
			status: OrderStatus::Pending,
			original_order_id: None,
			shared_from: None,
			original_buyer_id: None,
			modification_requests: vec![],
			dispute_details: None,
			review: None,
			deliverables: vec![],
			created_at: now,
			updated_at: now,
		};

		self.state.store_order(&order).await?;

		tracing::info!(
			order_id = %truncate_id(&order.id),
			buyer_id = %order.buyer_id,
			seller_id = %order.seller_id,
			"Created order"
		);
		self.event_bus
			.publish(OrderEvent::Created {
				order: Box::new(order.clone()),
			})
			.ok();

		Ok(order)
	}

	/// Drives one of the generic lifecycle edges: accept, reject,
	/// cancel, revision, or complete.
	#[instrument(skip(self), fields(order_id = %truncate_id(order_id)))]
	pub async fn change_status(
		&self,
		order_id: &str,
		actor_id: &str,
		target: OrderStatus,
	) -> Result<Order, EngineError> {
		let _guard = self.locks.acquire(order_id).await;

		let before = self.state.get_order(order_id).await?.status;
		let order = self.state.transition(order_id, actor_id, target).await?;

		tracing::info!(
			order_id = %truncate_id(order_id),
			from = %before,
			to = %target,
			"Order status changed"
		);
		self.event_bus
			.publish(OrderEvent::StatusChanged {
				order_id: order_id.to_string(),
				from: before,
				to: target,
			})
			.ok();

		// A cancelled or rejected child returns its share to the parent's
		// derived balance; nothing on the parent needs rewriting.
		if matches!(target, OrderStatus::Cancelled | OrderStatus::Rejected) {
			if let Some(parent_id) = &order.original_order_id {
				tracing::info!(
					parent_id = %truncate_id(parent_id),
					child_id = %truncate_id(order_id),
					share_price = %order.price,
					"Share returned to parent balance"
				);
			}
		}

		Ok(order)
	}

	/// Delegates part of an order's value to another seller's gig,
	/// creating a linked child order.
	#[instrument(skip(self), fields(order_id = %truncate_id(order_id)))]
	pub async fn share_order(
		&self,
		order_id: &str,
		actor_id: &str,
		target_gig_id: &str,
		share_price: Decimal,
	) -> Result<Order, EngineError> {
		// The parent's lock serializes the balance check against
		// concurrent shares of the same parent.
		let _guard = self.locks.acquire(order_id).await;

		let parent = self.state.get_order(order_id).await?;
		let target_gig = self.get_gig(target_gig_id).await?;

		let child = self
			.delegation
			.share_order(&parent, actor_id, &target_gig, share_price)
			.await?;

		self.event_bus
			.publish(OrderEvent::Shared {
				parent_id: parent.id.clone(),
				child_id: child.id.clone(),
				share_price,
			})
			.ok();

		Ok(child)
	}

	/// The order's remaining shareable balance: its price minus the
	/// share prices of its live children.
	pub async fn remaining_balance(&self, order_id: &str) -> Result<Decimal, EngineError> {
		let order = self.state.get_order(order_id).await?;
		self.delegation.remaining_balance(&order).await
	}

	/// Delivers an order with its artifact references.
	#[instrument(skip(self, deliverables), fields(order_id = %truncate_id(order_id)))]
	pub async fn deliver_order(
		&self,
		order_id: &str,
		actor_id: &str,
		deliverables: Vec<DeliverableUpload>,
	) -> Result<Order, EngineError> {
		let _guard = self.locks.acquire(order_id).await;

		let uploaded_at = now_secs()?;
		let deliverables = deliverables
			.into_iter()
			.map(|d| Deliverable {
				file_name: d.file_name,
				uri: d.uri,
				uploaded_at,
			})
			.collect();

		let before = self.state.get_order(order_id).await?.status;
		let order = self.ledger.deliver(order_id, actor_id, deliverables).await?;

		self.event_bus
			.publish(OrderEvent::StatusChanged {
				order_id: order_id.to_string(),
				from: before,
				to: OrderStatus::Delivered,
			})
			.ok();

		Ok(order)
	}

	/// Records a seller-proposed modification on an active order.
	#[instrument(skip(self, reason), fields(order_id = %truncate_id(order_id)))]
	pub async fn request_modification(
		&self,
		order_id: &str,
		actor_id: &str,
		price: Decimal,
		delivery_time: u32,
		reason: &str,
	) -> Result<Order, EngineError> {
		let _guard = self.locks.acquire(order_id).await;

		let order = self
			.ledger
			.request_modification(order_id, actor_id, price, delivery_time, reason)
			.await?;

		self.event_bus
			.publish(OrderEvent::ModificationRequested {
				order_id: order_id.to_string(),
				index: order.modification_requests.len() - 1,
			})
			.ok();

		Ok(order)
	}

	/// Buyer-side acceptance of a pending modification request.
	#[instrument(skip(self), fields(order_id = %truncate_id(order_id)))]
	pub async fn accept_modification(
		&self,
		order_id: &str,
		actor_id: &str,
		index: usize,
	) -> Result<Order, EngineError> {
		let _guard = self.locks.acquire(order_id).await;

		let order = self
			.ledger
			.accept_modification(order_id, actor_id, index, &self.delegation)
			.await?;

		self.event_bus
			.publish(OrderEvent::ModificationAccepted {
				order_id: order_id.to_string(),
				index,
			})
			.ok();

		Ok(order)
	}

	/// Opens a dispute on an active or delivered order.
	#[instrument(skip(self, reason), fields(order_id = %truncate_id(order_id)))]
	pub async fn open_dispute(
		&self,
		order_id: &str,
		actor_id: &str,
		reason: &str,
	) -> Result<Order, EngineError> {
		let _guard = self.locks.acquire(order_id).await;

		let order = self.ledger.open_dispute(order_id, actor_id, reason).await?;

		self.event_bus
			.publish(OrderEvent::DisputeOpened {
				order_id: order_id.to_string(),
			})
			.ok();

		Ok(order)
	}

	/// Closes a dispute, returning the order to `Active`.
	#[instrument(skip(self), fields(order_id = %truncate_id(order_id)))]
	pub async fn close_dispute(&self, order_id: &str, actor_id: &str) -> Result<Order, EngineError> {
		let _guard = self.locks.acquire(order_id).await;

		let order = self.ledger.close_dispute(order_id, actor_id).await?;

		self.event_bus
			.publish(OrderEvent::DisputeClosed {
				order_id: order_id.to_string(),
			})
			.ok();

		Ok(order)
	}

	/// Stores a buyer review of a completed order.
	#[instrument(skip(self, text), fields(order_id = %truncate_id(order_id)))]
	pub async fn submit_review(
		&self,
		order_id: &str,
		actor_id: &str,
		rating: u8,
		text: &str,
	) -> Result<Order, EngineError> {
		let _guard = self.locks.acquire(order_id).await;

		let order = self
			.ledger
			.submit_review(order_id, actor_id, rating, text)
			.await?;

		self.event_bus
			.publish(OrderEvent::ReviewSubmitted {
				order_id: order_id.to_string(),
				rating,
			})
			.ok();

		Ok(order)
	}
}
