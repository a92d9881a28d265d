//! Delegation (share) manager.
//!
//! Creates and reconciles parent/child order relationships. A seller may
//! delegate part of an order's value to another seller's gig; the child
//! order is a real order with the delegating seller as its buyer of
//! record. The parent's shareable balance is never stored: it is derived
//! from the parent's price and the share prices of its live children, so
//! cancelling or rejecting a child restores the balance without any
//! bookkeeping write to the parent.

use crate::state::OrderStateMachine;
use crate::{now_secs, EngineError};
use market_storage::{StorageError, StorageService};
use market_types::{Gig, Order, OrderStatus, StorageKey};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Creates delegated child orders and answers balance queries.
pub struct DelegationManager {
	storage: Arc<StorageService>,
	state: Arc<OrderStateMachine>,
}

impl DelegationManager {
	pub fn new(storage: Arc<StorageService>, state: Arc<OrderStateMachine>) -> Self {
		Self { storage, state }
	}

	/// Returns the ids of all child orders ever delegated from `parent_id`.
	pub async fn child_ids(&self, parent_id: &str) -> Result<Vec<String>, EngineError> {
		match self
			.storage
			.retrieve::<Vec<String>>(StorageKey::OrderChildren.as_str(), parent_id)
			.await
		{
			Ok(ids) => Ok(ids),
			Err(StorageError::NotFound) => Ok(Vec::new()),
			Err(e) => Err(EngineError::Storage(e.to_string())),
		}
	}

	/// Sum of share prices currently allocated to live children of
	/// `parent_id`.
	///
	/// Cancelled and rejected children do not count: their share has
	/// returned to the parent's balance.
	pub async fn allocated(&self, parent_id: &str) -> Result<Decimal, EngineError> {
		let mut sum = Decimal::ZERO;
		for child_id in self.child_ids(parent_id).await? {
			let child = self.state.get_order(&child_id).await?;
			if !matches!(
				child.status,
				OrderStatus::Cancelled | OrderStatus::Rejected
			) {
				sum += child.price;
			}
		}
		Ok(sum)
	}

	/// The parent's remaining shareable balance.
	pub async fn remaining_balance(&self, parent: &Order) -> Result<Decimal, EngineError> {
		Ok(parent.price - self.allocated(&parent.id).await?)
	}

	/// Delegates `share_price` of the parent order to the seller of
	/// `target_gig`.
	///
	/// The caller must hold the parent's lock: the balance check and the
	/// child insert (including the child-index append) are atomic as a
	/// unit only under that serialization.
	pub async fn share_order(
		&self,
		parent: &Order,
		actor_id: &str,
		target_gig: &Gig,
		share_price: Decimal,
	) -> Result<Order, EngineError> {
		if actor_id != parent.seller_id {
			return Err(EngineError::Unauthorized {
				actor: actor_id.to_string(),
				action: format!("share order {}", parent.id),
			});
		}

		if parent.status.is_terminal() {
			return Err(EngineError::Validation(format!(
				"order {} is {} and can no longer be shared",
				parent.id, parent.status
			)));
		}

		if share_price <= Decimal::ZERO {
			return Err(EngineError::Validation(
				"share price must be positive".into(),
			));
		}

		if target_gig.seller_id == parent.seller_id {
			return Err(EngineError::SelfShareNotAllowed);
		}

		let available = self.remaining_balance(parent).await?;
		if share_price > available {
			return Err(EngineError::InsufficientBalance {
				requested: share_price,
				available,
			});
		}

		let now = now_secs()?;
		let child = Order {
			id: Uuid::new_v4().to_string(),
			// The delegating seller acts as buyer on the child.
			buyer_id: parent.seller_id.clone(),
			seller_id: target_gig.seller_id.clone(),
			gig_id: target_gig.id.clone(),
			price: share_price,
			delivery_time: target_gig.delivery_time,
			status: OrderStatus::Pending,
			original_order_id: Some(parent.id.clone()),
			shared_from: Some(parent.seller_id.clone()),
			original_buyer_id: Some(
				parent
					.original_buyer_id
					.clone()
					.unwrap_or_else(|| parent.buyer_id.clone()),
			),
			modification_requests: vec![],
			dispute_details: None,
			review: None,
			deliverables: vec![],
			created_at: now,
			updated_at: now,
		};

		self.state.store_order(&child).await?;

		let mut children = self.child_ids(&parent.id).await?;
		children.push(child.id.clone());
		self.storage
			.store(StorageKey::OrderChildren.as_str(), &parent.id, &children)
			.await
			.map_err(|e| EngineError::Storage(e.to_string()))?;

		tracing::info!(
			parent_id = %parent.id,
			child_id = %child.id,
			share_price = %share_price,
			"Delegated order share"
		);

		Ok(child)
	}
}
