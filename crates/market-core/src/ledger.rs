//! Modification, dispute, and review sub-ledger.
//!
//! Records auxiliary actor-initiated events on an order without touching
//! the primary status machine except where explicitly wired: opening a
//! dispute moves the order to `Disputed`, closing one returns it to
//! `Active`, and a review moves a completed order to `Reviewed`.
//! Modification requests are append-only; applying one requires a
//! separate buyer-side acceptance.

use crate::state::{effective_role, EdgeKind, OrderStateMachine};
use crate::{now_secs, DelegationManager, EngineError};
use market_types::{ModificationRequest, Order, OrderStatus, Review, Role};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Limits applied to per-order ledgers, taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct LedgerLimits {
	pub max_modification_requests: usize,
	pub max_deliverables: usize,
}

/// Manages the append-only sub-ledgers attached to orders.
pub struct LedgerManager {
	state: Arc<OrderStateMachine>,
	limits: LedgerLimits,
}

impl LedgerManager {
	pub fn new(state: Arc<OrderStateMachine>, limits: LedgerLimits) -> Self {
		Self { state, limits }
	}

	/// Requires that `actor_id` holds `required` on `order`.
	fn require_role(order: &Order, actor_id: &str, required: Role) -> Result<(), EngineError> {
		match effective_role(order, actor_id) {
			Some(role) if role == required => Ok(()),
			_ => Err(EngineError::Unauthorized {
				actor: actor_id.to_string(),
				action: format!("act as {} on order {}", required, order.id),
			}),
		}
	}

	/// Appends a seller-proposed modification to an active order.
	///
	/// Does not itself change the order's status or terms; the buyer
	/// accepts separately via [`accept_modification`].
	///
	/// [`accept_modification`]: Self::accept_modification
	pub async fn request_modification(
		&self,
		order_id: &str,
		actor_id: &str,
		price: Decimal,
		delivery_time: u32,
		reason: &str,
	) -> Result<Order, EngineError> {
		if price <= Decimal::ZERO {
			return Err(EngineError::Validation(
				"proposed price must be positive".into(),
			));
		}
		if delivery_time == 0 {
			return Err(EngineError::Validation(
				"proposed delivery time must be positive".into(),
			));
		}
		if reason.trim().is_empty() {
			return Err(EngineError::Validation(
				"modification reason cannot be empty".into(),
			));
		}

		let order = self.state.get_order(order_id).await?;
		Self::require_role(&order, actor_id, Role::Seller)?;

		if order.status != OrderStatus::Active {
			return Err(EngineError::Validation(format!(
				"modifications can only be requested while the order is Active, not {}",
				order.status
			)));
		}
		if order.modification_requests.len() >= self.limits.max_modification_requests {
			return Err(EngineError::Validation(format!(
				"order {} already carries the maximum of {} modification requests",
				order.id, self.limits.max_modification_requests
			)));
		}

		let request = ModificationRequest {
			price,
			delivery_time,
			reason: reason.to_string(),
			created_at: now_secs()?,
			accepted_at: None,
		};

		self.state
			.update_order_with(order_id, |o| o.modification_requests.push(request))
			.await
	}

	/// Buyer-side acceptance of a pending modification request.
	///
	/// Applies the request's price and delivery time to the order. The
	/// new price must still cover whatever has already been delegated to
	/// the order's own children.
	pub async fn accept_modification(
		&self,
		order_id: &str,
		actor_id: &str,
		index: usize,
		delegation: &DelegationManager,
	) -> Result<Order, EngineError> {
		let order = self.state.get_order(order_id).await?;
		Self::require_role(&order, actor_id, Role::Buyer)?;

		if order.status != OrderStatus::Active {
			return Err(EngineError::Validation(format!(
				"modifications can only be accepted while the order is Active, not {}",
				order.status
			)));
		}

		let request = order
			.modification_requests
			.get(index)
			.ok_or_else(|| {
				EngineError::Validation(format!(
					"order {} has no modification request at index {}",
					order.id, index
				))
			})?
			.clone();

		if request.accepted_at.is_some() {
			return Err(EngineError::Validation(format!(
				"modification request {} on order {} was already accepted",
				index, order.id
			)));
		}

		let allocated = delegation.allocated(order_id).await?;
		if request.price < allocated {
			return Err(EngineError::Validation(format!(
				"new price {} would undercut the {} already delegated from order {}",
				request.price, allocated, order.id
			)));
		}

		let accepted_at = now_secs()?;
		self.state
			.update_order_with(order_id, |o| {
				o.price = request.price;
				o.delivery_time = request.delivery_time;
				if let Some(r) = o.modification_requests.get_mut(index) {
					r.accepted_at = Some(accepted_at);
				}
			})
			.await
	}

	/// Opens a dispute, moving the order to `Disputed`.
	pub async fn open_dispute(
		&self,
		order_id: &str,
		actor_id: &str,
		reason: &str,
	) -> Result<Order, EngineError> {
		if reason.trim().is_empty() {
			return Err(EngineError::Validation(
				"dispute reason cannot be empty".into(),
			));
		}

		self.state
			.apply_edge(
				order_id,
				actor_id,
				OrderStatus::Disputed,
				EdgeKind::Dispute,
				|o| o.dispute_details = Some(reason.to_string()),
			)
			.await
	}

	/// Closes a dispute, returning the order to `Active` and clearing
	/// the dispute details.
	pub async fn close_dispute(&self, order_id: &str, actor_id: &str) -> Result<Order, EngineError> {
		self.state
			.apply_edge(
				order_id,
				actor_id,
				OrderStatus::Active,
				EdgeKind::CloseDispute,
				|o| o.dispute_details = None,
			)
			.await
	}

	/// Stores a buyer review of a completed order and moves it to
	/// `Reviewed`.
	pub async fn submit_review(
		&self,
		order_id: &str,
		actor_id: &str,
		rating: u8,
		text: &str,
	) -> Result<Order, EngineError> {
		if !(1..=5).contains(&rating) {
			return Err(EngineError::Validation(format!(
				"rating must be between 1 and 5, got {}",
				rating
			)));
		}

		let created_at = now_secs()?;
		self.state
			.apply_edge(
				order_id,
				actor_id,
				OrderStatus::Reviewed,
				EdgeKind::Review,
				|o| {
					o.review = Some(Review {
						rating,
						text: text.to_string(),
						created_at,
					});
				},
			)
			.await
	}

	/// Delivers an order with its artifact references, moving it to
	/// `Delivered`.
	pub async fn deliver(
		&self,
		order_id: &str,
		actor_id: &str,
		deliverables: Vec<market_types::Deliverable>,
	) -> Result<Order, EngineError> {
		if deliverables.is_empty() {
			return Err(EngineError::Validation(
				"a delivery must include at least one artifact".into(),
			));
		}

		let order = self.state.get_order(order_id).await?;
		if order.deliverables.len() + deliverables.len() > self.limits.max_deliverables {
			return Err(EngineError::Validation(format!(
				"order {} would exceed the maximum of {} deliverables",
				order.id, self.limits.max_deliverables
			)));
		}

		self.state
			.apply_edge(
				order_id,
				actor_id,
				OrderStatus::Delivered,
				EdgeKind::Deliver,
				|o| o.deliverables.extend(deliverables),
			)
			.await
	}
}
