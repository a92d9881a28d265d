//! HTTP server for the marketplace order API.
//!
//! This module provides the HTTP boundary over the order engine. Every
//! handler receives the already-authenticated actor id in its payload,
//! delegates to the engine, and maps engine failures onto the shared
//! [`ApiError`] taxonomy.

use axum::{
	extract::{DefaultBodyLimit, Path, State},
	response::Json,
	routing::{get, post, put},
	Router,
};
use market_config::{ApiConfig, Config};
use market_core::{EngineError, OrderEngine};
use market_types::{
	ActorRequest, ApiError, CreateGigRequest, CreateOrderRequest, DeliverRequest, Gig,
	OpenDisputeRequest, Order, RequestModificationRequest, ShareOrderRequest, StatusChangeRequest,
	SubmitReviewRequest,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Reference to the order engine for processing requests.
	pub engine: Arc<OrderEngine>,
	/// Complete configuration.
	pub config: Config,
}

/// Maps an engine failure onto the API error taxonomy.
///
/// The mapping is total: every engine error has exactly one HTTP shape,
/// so no handler needs its own branching.
pub fn map_engine_error(err: EngineError) -> ApiError {
	let message = err.to_string();
	match err {
		EngineError::OrderNotFound(_) => ApiError::NotFound {
			code: "ORDER_NOT_FOUND".into(),
			message,
		},
		EngineError::GigNotFound(_) => ApiError::NotFound {
			code: "GIG_NOT_FOUND".into(),
			message,
		},
		EngineError::Unauthorized { .. } => ApiError::Forbidden {
			code: "UNAUTHORIZED".into(),
			message,
		},
		EngineError::InvalidTransition { .. } => ApiError::Conflict {
			code: "INVALID_TRANSITION".into(),
			message,
		},
		EngineError::InsufficientBalance { .. } => ApiError::UnprocessableEntity {
			code: "INSUFFICIENT_BALANCE".into(),
			message,
		},
		EngineError::SelfShareNotAllowed => ApiError::UnprocessableEntity {
			code: "SELF_SHARE_NOT_ALLOWED".into(),
			message,
		},
		EngineError::Validation(_) => ApiError::BadRequest {
			code: "VALIDATION_ERROR".into(),
			message,
		},
		EngineError::Storage(_) | EngineError::Time(_) => ApiError::InternalServerError {
			code: "INTERNAL_ERROR".into(),
			message: "internal error".into(),
		},
	}
}

/// Starts the HTTP server for the API.
///
/// This function creates and configures the HTTP server with routing,
/// middleware, and error handling for all order endpoints.
pub async fn start_server(
	api_config: ApiConfig,
	engine: Arc<OrderEngine>,
	config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
	let app_state = AppState { engine, config };

	let app = Router::new()
		.nest(
			"/api",
			Router::new()
				.route("/gigs", post(handle_create_gig))
				.route("/gigs/{id}", get(handle_get_gig))
				.route("/orders", post(handle_create_order))
				.route("/orders/{id}", get(handle_get_order))
				.route("/orders/{id}/status", post(handle_change_status))
				.route("/orders/{id}/share", post(handle_share_order))
				.route("/orders/{id}/deliver", post(handle_deliver))
				.route("/orders/{id}/modification", post(handle_request_modification))
				.route(
					"/orders/{id}/modification/{index}/accept",
					post(handle_accept_modification),
				)
				.route("/orders/{id}/dispute", post(handle_open_dispute))
				.route("/orders/{id}/close-dispute", put(handle_close_dispute))
				.route("/orders/{id}/review", post(handle_submit_review)),
		)
		.layer(
			ServiceBuilder::new()
				.layer(CorsLayer::permissive())
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(app_state);

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order API server starting on {}", bind_address);

	axum::serve(listener, app).await?;

	Ok(())
}

/// Handles POST /api/gigs requests.
async fn handle_create_gig(
	State(state): State<AppState>,
	Json(request): Json<CreateGigRequest>,
) -> Result<Json<Gig>, ApiError> {
	state
		.engine
		.create_gig(
			&request.seller_id,
			&request.title,
			&request.description,
			request.price,
			request.delivery_time,
		)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!("Gig creation failed: {}", e);
			map_engine_error(e)
		})
}

/// Handles GET /api/gigs/{id} requests.
async fn handle_get_gig(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Gig>, ApiError> {
	state.engine.get_gig(&id).await.map(Json).map_err(map_engine_error)
}

/// Handles POST /api/orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.create_order(&request.buyer_id, &request.gig_id)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!("Order creation failed: {}", e);
			map_engine_error(e)
		})
}

/// Handles GET /api/orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.get_order(&id)
		.await
		.map(Json)
		.map_err(map_engine_error)
}

/// Handles POST /api/orders/{id}/status requests.
///
/// Drives the generic lifecycle edges (accept, reject, cancel,
/// revision, complete). Edges that carry payload have their own
/// endpoints below.
async fn handle_change_status(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<StatusChangeRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.change_status(&id, &request.actor_id, request.status)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!(order_id = %id, "Status change failed: {}", e);
			map_engine_error(e)
		})
}

/// Handles POST /api/orders/{id}/share requests.
async fn handle_share_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<ShareOrderRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.share_order(
			&id,
			&request.actor_id,
			&request.target_gig_id,
			request.share_price,
		)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!(order_id = %id, "Share failed: {}", e);
			map_engine_error(e)
		})
}

/// Handles POST /api/orders/{id}/deliver requests.
async fn handle_deliver(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<DeliverRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.deliver_order(&id, &request.actor_id, request.deliverables)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!(order_id = %id, "Delivery failed: {}", e);
			map_engine_error(e)
		})
}

/// Handles POST /api/orders/{id}/modification requests.
async fn handle_request_modification(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<RequestModificationRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.request_modification(
			&id,
			&request.actor_id,
			request.price,
			request.delivery_time,
			&request.reason,
		)
		.await
		.map(Json)
		.map_err(map_engine_error)
}

/// Handles POST /api/orders/{id}/modification/{index}/accept requests.
async fn handle_accept_modification(
	Path((id, index)): Path<(String, usize)>,
	State(state): State<AppState>,
	Json(request): Json<ActorRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.accept_modification(&id, &request.actor_id, index)
		.await
		.map(Json)
		.map_err(map_engine_error)
}

/// Handles POST /api/orders/{id}/dispute requests.
async fn handle_open_dispute(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<OpenDisputeRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.open_dispute(&id, &request.actor_id, &request.reason)
		.await
		.map(Json)
		.map_err(|e| {
			tracing::warn!(order_id = %id, "Dispute failed: {}", e);
			map_engine_error(e)
		})
}

/// Handles PUT /api/orders/{id}/close-dispute requests.
async fn handle_close_dispute(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<ActorRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.close_dispute(&id, &request.actor_id)
		.await
		.map(Json)
		.map_err(map_engine_error)
}

/// Handles POST /api/orders/{id}/review requests.
async fn handle_submit_review(
	Path(id): Path<String>,
	State(state): State<AppState>,
	Json(request): Json<SubmitReviewRequest>,
) -> Result<Json<Order>, ApiError> {
	state
		.engine
		.submit_review(&id, &request.actor_id, request.rating, &request.review_text)
		.await
		.map(Json)
		.map_err(map_engine_error)
}
