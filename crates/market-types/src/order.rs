//! Order types for the marketplace order lifecycle.
//!
//! This module defines the order entity, its status values, the roles an
//! actor can hold with respect to an order, and the append-only sub-ledger
//! records (modification requests, reviews, deliverables) attached to it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A purchase of a gig, the unit of the order state machine.
///
/// Orders are created when a buyer purchases a gig and move through their
/// lifecycle exclusively via the status transition engine. Delegated child
/// orders carry back-references to the order they were split from; terminal
/// orders are retained for audit and never physically deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
	/// Unique identifier for this order.
	pub id: String,
	/// The buyer of record. For a delegated child order this is the
	/// delegating seller, who acts as buyer on the child.
	pub buyer_id: String,
	/// The seller of record, responsible for fulfillment.
	pub seller_id: String,
	/// The gig this order was placed against.
	pub gig_id: String,
	/// Agreed price. Positive; adjusted only through accepted
	/// modification requests.
	pub price: Decimal,
	/// Agreed delivery time in days.
	pub delivery_time: u32,
	/// Current status of the order.
	pub status: OrderStatus,
	/// Back-reference to the parent order; present iff this order is a
	/// delegated child.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub original_order_id: Option<String>,
	/// The seller who delegated this order, if any.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub shared_from: Option<String>,
	/// Buyer of the root order, preserved through delegation chains.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub original_buyer_id: Option<String>,
	/// Append-only sequence of modification requests.
	#[serde(default)]
	pub modification_requests: Vec<ModificationRequest>,
	/// Free-text dispute reason; present while the order is disputed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dispute_details: Option<String>,
	/// Review submitted by the buyer after completion.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub review: Option<Review>,
	/// Artifact references uploaded on delivery.
	#[serde(default)]
	pub deliverables: Vec<Deliverable>,
	/// Timestamp when this order was created (unix seconds).
	pub created_at: u64,
	/// Timestamp when this order was last updated (unix seconds).
	pub updated_at: u64,
}

impl Order {
	/// Returns true iff this order was created by delegating part of
	/// another order.
	pub fn is_delegated(&self) -> bool {
		self.original_order_id.is_some()
	}
}

/// Status of an order in the marketplace.
///
/// This is a closed set; the transition engine is the single authority
/// for moving orders between these values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum OrderStatus {
	/// Order has been placed and awaits the seller's decision.
	Pending,
	/// Seller accepted; work is in progress.
	Active,
	/// Seller rejected the order. Terminal.
	Rejected,
	/// Seller delivered; awaiting the buyer's verdict.
	Delivered,
	/// Buyer accepted the delivery. Terminal except for review.
	Completed,
	/// Order was cancelled by either party. Terminal.
	Cancelled,
	/// A party raised a dispute; work is on hold.
	Disputed,
	/// Buyer reviewed the completed order. Terminal.
	Reviewed,
}

impl OrderStatus {
	/// Returns true if no further status mutation is permitted from this
	/// state. `Completed` is terminal except for the explicit review
	/// edge, which the transition table carries.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			OrderStatus::Rejected
				| OrderStatus::Completed
				| OrderStatus::Cancelled
				| OrderStatus::Reviewed
		)
	}
}

impl fmt::Display for OrderStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OrderStatus::Pending => write!(f, "Pending"),
			OrderStatus::Active => write!(f, "Active"),
			OrderStatus::Rejected => write!(f, "Rejected"),
			OrderStatus::Delivered => write!(f, "Delivered"),
			OrderStatus::Completed => write!(f, "Completed"),
			OrderStatus::Cancelled => write!(f, "Cancelled"),
			OrderStatus::Disputed => write!(f, "Disputed"),
			OrderStatus::Reviewed => write!(f, "Reviewed"),
		}
	}
}

/// The role an actor holds with respect to a specific order.
///
/// This may differ from an account's global role once delegation has
/// occurred: the delegating seller is the buyer of record on the child
/// order it created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Role {
	Buyer,
	Seller,
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Role::Buyer => write!(f, "Buyer"),
			Role::Seller => write!(f, "Seller"),
		}
	}
}

/// A seller-proposed change to an order's price and delivery time.
///
/// Requests are append-only; acceptance by the buyer stamps
/// `accepted_at` and applies the terms to the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModificationRequest {
	/// Proposed price.
	pub price: Decimal,
	/// Proposed delivery time in days.
	pub delivery_time: u32,
	/// Seller's justification for the change.
	pub reason: String,
	/// Timestamp when the request was made (unix seconds).
	pub created_at: u64,
	/// Timestamp when the buyer accepted, if they did.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub accepted_at: Option<u64>,
}

/// A buyer's review of a completed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
	/// Star rating, 1 to 5 inclusive.
	pub rating: u8,
	/// Free-text review body.
	pub text: String,
	/// Timestamp when the review was submitted (unix seconds).
	pub created_at: u64,
}

/// A reference to an artifact uploaded as part of a delivery.
///
/// The upload itself happens at the transport layer; the order only
/// records where the artifact lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
	/// Original file name of the artifact.
	pub file_name: String,
	/// Location of the stored artifact.
	pub uri: String,
	/// Timestamp when the artifact was uploaded (unix seconds).
	pub uploaded_at: u64,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_statuses() {
		assert!(OrderStatus::Rejected.is_terminal());
		assert!(OrderStatus::Cancelled.is_terminal());
		assert!(OrderStatus::Completed.is_terminal());
		assert!(OrderStatus::Reviewed.is_terminal());

		assert!(!OrderStatus::Pending.is_terminal());
		assert!(!OrderStatus::Active.is_terminal());
		assert!(!OrderStatus::Delivered.is_terminal());
		assert!(!OrderStatus::Disputed.is_terminal());
	}

	#[test]
	fn status_serializes_camel_case() {
		let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
		assert_eq!(json, "\"delivered\"");

		let back: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
		assert_eq!(back, OrderStatus::Pending);
	}
}
