//! Order state machine implementation.
//!
//! The single authority for mutating `order.status`. All lifecycle
//! edges live in one static transition table together with the party
//! permitted to drive them; role resolution is relative to the order
//! being acted on, so a delegating seller is treated as the buyer of the
//! child order it created. Callers never write a status directly.

use crate::{now_secs, EngineError};
use market_storage::{StorageError, StorageService};
use market_types::{Order, OrderStatus, Role, StorageKey};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

/// Which party of an order may drive a given edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
	/// Only the buyer of record.
	Buyer,
	/// Only the seller of record.
	Seller,
	/// Either participant.
	Either,
}

impl Party {
	/// Checks whether an actor holding `role` satisfies this requirement.
	pub fn permits(&self, role: Role) -> bool {
		match self {
			Party::Buyer => role == Role::Buyer,
			Party::Seller => role == Role::Seller,
			Party::Either => true,
		}
	}
}

/// How an edge is driven.
///
/// Plain edges are reachable through the generic status-change
/// operation; the others require payload (artifacts, a dispute reason, a
/// review) and are only reachable through their dedicated operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
	Plain,
	Deliver,
	Dispute,
	CloseDispute,
	Review,
}

/// A single edge of the lifecycle graph.
#[derive(Debug, Clone, Copy)]
struct Edge {
	party: Party,
	kind: EdgeKind,
}

/// The complete transition table.
///
/// Every legal (from, to) pair appears here exactly once; any pair
/// absent from the table is an invalid transition, which also makes the
/// terminal states (no outgoing edges except `Completed -> Reviewed`)
/// fall out of the table rather than being special-cased.
static TRANSITIONS: Lazy<HashMap<(OrderStatus, OrderStatus), Edge>> = Lazy::new(|| {
	use EdgeKind::*;
	use OrderStatus::*;

	let mut m = HashMap::new();
	let mut edge = |from: OrderStatus, to: OrderStatus, party: Party, kind: EdgeKind| {
		m.insert((from, to), Edge { party, kind });
	};

	// Seller decides on a fresh order.
	edge(Pending, Active, Party::Seller, Plain);
	edge(Pending, Rejected, Party::Seller, Plain);
	edge(Pending, Cancelled, Party::Either, Plain);

	// Work in progress.
	edge(Active, Delivered, Party::Seller, Deliver);
	edge(Active, Cancelled, Party::Either, Plain);
	edge(Active, Disputed, Party::Either, Dispute);

	// Buyer verdict on a delivery.
	edge(Delivered, Completed, Party::Buyer, Plain);
	edge(Delivered, Active, Party::Buyer, Plain); // revision request
	edge(Delivered, Disputed, Party::Either, Dispute);

	// Dispute resolution.
	edge(Disputed, Active, Party::Either, CloseDispute);

	// Post-completion review, the only edge out of a terminal state.
	edge(Completed, Reviewed, Party::Buyer, Review);

	m
});

/// Resolves the role an actor holds with respect to a specific order.
///
/// A delegated child order is created with the delegating seller as its
/// buyer of record, so no delegation-specific branching is needed here
/// or anywhere downstream of here.
pub fn effective_role(order: &Order, actor_id: &str) -> Option<Role> {
	if actor_id == order.buyer_id {
		Some(Role::Buyer)
	} else if actor_id == order.seller_id {
		Some(Role::Seller)
	} else {
		None
	}
}

/// Manages order state transitions and persistence.
pub struct OrderStateMachine {
	storage: Arc<StorageService>,
}

impl OrderStateMachine {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Gets an order by ID.
	pub async fn get_order(&self, order_id: &str) -> Result<Order, EngineError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), order_id)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => EngineError::OrderNotFound(order_id.to_string()),
				other => EngineError::Storage(other.to_string()),
			})
	}

	/// Stores a new order.
	pub async fn store_order(&self, order: &Order) -> Result<(), EngineError> {
		self.storage
			.store(StorageKey::Orders.as_str(), &order.id, order)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))
	}

	/// Updates an order with a closure and persists it.
	///
	/// The `updated_at` timestamp is stamped automatically. Callers must
	/// hold the order's lock; this method performs no validation of its
	/// own.
	pub async fn update_order_with<F>(
		&self,
		order_id: &str,
		updater: F,
	) -> Result<Order, EngineError>
	where
		F: FnOnce(&mut Order),
	{
		let mut order = self.get_order(order_id).await?;

		updater(&mut order);
		order.updated_at = now_secs()?;

		self.storage
			.update(StorageKey::Orders.as_str(), order_id, &order)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;

		Ok(order)
	}

	/// Validates that `actor_id` may drive `order` to `to` via an edge of
	/// the given kind, returning the actor's resolved role.
	///
	/// Validation fully precedes mutation: this method reads only.
	pub fn validate_edge(
		&self,
		order: &Order,
		actor_id: &str,
		to: OrderStatus,
		kind: EdgeKind,
	) -> Result<Role, EngineError> {
		let edge = TRANSITIONS
			.get(&(order.status, to))
			.ok_or(EngineError::InvalidTransition {
				from: order.status,
				to,
			})?;

		if edge.kind != kind {
			// The edge exists but requires payload only its dedicated
			// operation carries (or vice versa).
			return Err(EngineError::Validation(format!(
				"transition from {} to {} cannot be driven by this operation",
				order.status, to
			)));
		}

		let role = effective_role(order, actor_id).ok_or_else(|| EngineError::Unauthorized {
			actor: actor_id.to_string(),
			action: format!("transition order {} to {}", order.id, to),
		})?;

		if !edge.party.permits(role) {
			return Err(EngineError::Unauthorized {
				actor: actor_id.to_string(),
				action: format!("transition order {} to {} as {}", order.id, to, role),
			});
		}

		Ok(role)
	}

	/// Applies a validated edge: re-reads the order, validates, sets the
	/// status, runs `mutator` for any payload the edge carries, and
	/// persists.
	///
	/// Callers must hold the order's lock so the read-validate-write is
	/// serialized against other writers.
	pub async fn apply_edge<F>(
		&self,
		order_id: &str,
		actor_id: &str,
		to: OrderStatus,
		kind: EdgeKind,
		mutator: F,
	) -> Result<Order, EngineError>
	where
		F: FnOnce(&mut Order),
	{
		let order = self.get_order(order_id).await?;
		self.validate_edge(&order, actor_id, to, kind)?;

		self.update_order_with(order_id, |o| {
			o.status = to;
			mutator(o);
		})
		.await
	}

	/// Drives a plain edge (accept, reject, cancel, revision, complete).
	pub async fn transition(
		&self,
		order_id: &str,
		actor_id: &str,
		to: OrderStatus,
	) -> Result<Order, EngineError> {
		self.apply_edge(order_id, actor_id, to, EdgeKind::Plain, |_| {})
			.await
	}
}
