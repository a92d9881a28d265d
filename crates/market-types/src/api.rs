//! API types for the marketplace order HTTP API.
//!
//! This module defines the request payloads accepted by the HTTP
//! endpoints and the structured error type they return. Responses reuse
//! the domain types directly; payload field names follow the camelCase
//! convention of the JSON boundary.

use crate::OrderStatus;
use axum::{
	http::StatusCode,
	response::{IntoResponse, Json, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request to publish a new gig.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGigRequest {
	/// The seller publishing the gig.
	pub seller_id: String,
	/// Short title shown to buyers.
	pub title: String,
	/// Longer description of the offered service.
	#[serde(default)]
	pub description: String,
	/// Listed price.
	pub price: Decimal,
	/// Promised delivery time in days.
	pub delivery_time: u32,
}

/// Request to place an order against a gig.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
	/// The buyer placing the order.
	pub buyer_id: String,
	/// The gig being purchased.
	pub gig_id: String,
}

/// Request to move an order along one of the generic status edges
/// (accept, reject, cancel, revision, complete).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
	/// The actor requesting the change.
	pub actor_id: String,
	/// The target status.
	pub status: OrderStatus,
}

/// Request to delegate part of an order to another seller's gig.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOrderRequest {
	/// The actor requesting the delegation; must be the seller of record.
	pub actor_id: String,
	/// The gig the child order is placed against.
	pub target_gig_id: String,
	/// The portion of the parent's price delegated to the child.
	pub share_price: Decimal,
}

/// An artifact reference included in a delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverableUpload {
	/// Original file name of the artifact.
	pub file_name: String,
	/// Location of the stored artifact.
	pub uri: String,
}

/// Request to deliver an order with its artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverRequest {
	/// The actor delivering; must be the seller of record.
	pub actor_id: String,
	/// References to the delivered artifacts.
	pub deliverables: Vec<DeliverableUpload>,
}

/// Request to record a seller-proposed modification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestModificationRequest {
	/// The actor proposing; must be the seller of record.
	pub actor_id: String,
	/// Proposed price.
	pub price: Decimal,
	/// Proposed delivery time in days.
	pub delivery_time: u32,
	/// Justification for the change.
	pub reason: String,
}

/// Request payload carrying only the acting user.
///
/// Used by endpoints whose action is fully determined by the path,
/// such as accepting a modification or closing a dispute.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
	pub actor_id: String,
}

/// Request to open a dispute on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenDisputeRequest {
	/// The disputing party.
	pub actor_id: String,
	/// Free-text reason for the dispute.
	pub reason: String,
}

/// Request to review a completed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReviewRequest {
	/// The reviewer; must be the buyer of record.
	pub actor_id: String,
	/// Star rating, 1 to 5 inclusive.
	pub rating: u8,
	/// Free-text review body.
	pub review_text: String,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable error code.
	pub error: String,
	/// Human-readable description.
	pub message: String,
}

/// Structured API error type with appropriate HTTP status mapping.
#[derive(Debug)]
pub enum ApiError {
	/// Malformed payload (400).
	BadRequest { code: String, message: String },
	/// Actor lacks the role required for the attempted action (403).
	Forbidden { code: String, message: String },
	/// Referenced entity does not exist (404).
	NotFound { code: String, message: String },
	/// The attempted edge is not defined from the current state (409).
	Conflict { code: String, message: String },
	/// Business-rule failure on a well-formed request (422).
	UnprocessableEntity { code: String, message: String },
	/// Internal server error (500).
	InternalServerError { code: String, message: String },
}

impl ApiError {
	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
			ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
			ApiError::Conflict { .. } => StatusCode::CONFLICT,
			ApiError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
			ApiError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn into_body(self) -> ErrorResponse {
		let (code, message) = match self {
			ApiError::BadRequest { code, message }
			| ApiError::Forbidden { code, message }
			| ApiError::NotFound { code, message }
			| ApiError::Conflict { code, message }
			| ApiError::UnprocessableEntity { code, message }
			| ApiError::InternalServerError { code, message } => (code, message),
		};
		ErrorResponse {
			error: code,
			message,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		(status, Json(self.into_body())).into_response()
	}
}
