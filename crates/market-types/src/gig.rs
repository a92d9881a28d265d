//! Gig types for the marketplace.
//!
//! A gig is a service offering published by a seller. Orders are placed
//! against gigs, and delegation targets a gig belonging to another seller.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A service offering published by a seller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gig {
	/// Unique identifier for this gig.
	pub id: String,
	/// The seller who owns and fulfils this gig.
	pub seller_id: String,
	/// Short title shown to buyers.
	pub title: String,
	/// Longer description of the offered service.
	#[serde(default)]
	pub description: String,
	/// Listed price. Positive.
	pub price: Decimal,
	/// Promised delivery time in days.
	pub delivery_time: u32,
	/// Timestamp when this gig was created (unix seconds).
	pub created_at: u64,
}
