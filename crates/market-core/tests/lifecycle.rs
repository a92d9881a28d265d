//! Integration tests for the order lifecycle: creation, the happy path
//! through review, and the transitions the engine must refuse.

mod common;

use common::{activate, dec, engine, gig, order};
use market_core::EngineError;
use market_types::{DeliverableUpload, OrderStatus};

fn upload(name: &str) -> DeliverableUpload {
	DeliverableUpload {
		file_name: name.to_string(),
		uri: format!("s3://artifacts/{}", name),
	}
}

#[tokio::test]
async fn order_starts_pending_with_gig_terms() {
	let engine = engine();
	let gig = gig(&engine, "seller-1", 150).await;
	let order = engine.create_order("buyer-1", &gig.id).await.unwrap();

	assert_eq!(order.status, OrderStatus::Pending);
	assert_eq!(order.price, dec(150));
	assert_eq!(order.delivery_time, gig.delivery_time);
	assert_eq!(order.seller_id, "seller-1");
	assert!(!order.is_delegated());
}

#[tokio::test]
async fn ordering_your_own_gig_is_rejected() {
	let engine = engine();
	let gig = gig(&engine, "seller-1", 100).await;
	let err = engine.create_order("seller-1", &gig.id).await.unwrap_err();
	assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn ordering_a_missing_gig_is_not_found() {
	let engine = engine();
	let err = engine.create_order("buyer-1", "no-such-gig").await.unwrap_err();
	assert!(matches!(err, EngineError::GigNotFound(_)));
}

#[tokio::test]
async fn full_happy_path_through_review() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;

	let order = activate(&engine, &order).await;
	assert_eq!(order.status, OrderStatus::Active);

	let order = engine
		.deliver_order(&order.id, "seller-1", vec![upload("final.zip")])
		.await
		.unwrap();
	assert_eq!(order.status, OrderStatus::Delivered);
	assert_eq!(order.deliverables.len(), 1);

	let order = engine
		.change_status(&order.id, "buyer-1", OrderStatus::Completed)
		.await
		.unwrap();
	assert_eq!(order.status, OrderStatus::Completed);

	let order = engine
		.submit_review(&order.id, "buyer-1", 5, "great work")
		.await
		.unwrap();
	assert_eq!(order.status, OrderStatus::Reviewed);
	assert_eq!(order.review.as_ref().unwrap().rating, 5);
}

#[tokio::test]
async fn reviewed_orders_refuse_all_further_mutation() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;
	let order = activate(&engine, &order).await;
	engine
		.deliver_order(&order.id, "seller-1", vec![upload("final.zip")])
		.await
		.unwrap();
	engine
		.change_status(&order.id, "buyer-1", OrderStatus::Completed)
		.await
		.unwrap();
	engine
		.submit_review(&order.id, "buyer-1", 4, "fine")
		.await
		.unwrap();

	for target in [
		OrderStatus::Active,
		OrderStatus::Delivered,
		OrderStatus::Cancelled,
		OrderStatus::Completed,
	] {
		let err = engine
			.change_status(&order.id, "buyer-1", target)
			.await
			.unwrap_err();
		assert!(matches!(err, EngineError::InvalidTransition { .. }));
	}

	let err = engine
		.open_dispute(&order.id, "buyer-1", "too late")
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn pending_cannot_jump_to_completed() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;

	let err = engine
		.change_status(&order.id, "buyer-1", OrderStatus::Completed)
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		EngineError::InvalidTransition {
			from: OrderStatus::Pending,
			to: OrderStatus::Completed
		}
	));
}

#[tokio::test]
async fn only_the_seller_of_record_may_deliver() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;
	let order = activate(&engine, &order).await;

	// Another seller on the platform is a stranger to this order.
	let err = engine
		.deliver_order(&order.id, "seller-2", vec![upload("fake.zip")])
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::Unauthorized { .. }));

	// The buyer cannot deliver either.
	let err = engine
		.deliver_order(&order.id, "buyer-1", vec![upload("fake.zip")])
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::Unauthorized { .. }));
}

#[tokio::test]
async fn seller_rejection_is_terminal() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;

	let order = engine
		.change_status(&order.id, "seller-1", OrderStatus::Rejected)
		.await
		.unwrap();
	assert_eq!(order.status, OrderStatus::Rejected);

	let err = engine
		.change_status(&order.id, "seller-1", OrderStatus::Active)
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn buyer_can_request_a_revision() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;
	let order = activate(&engine, &order).await;
	engine
		.deliver_order(&order.id, "seller-1", vec![upload("draft.zip")])
		.await
		.unwrap();

	let order = engine
		.change_status(&order.id, "buyer-1", OrderStatus::Active)
		.await
		.unwrap();
	assert_eq!(order.status, OrderStatus::Active);
	// Earlier deliverables stay on the record.
	assert_eq!(order.deliverables.len(), 1);
}

#[tokio::test]
async fn either_party_may_cancel_before_delivery() {
	let engine = engine();

	let o1 = order(&engine, "buyer-1", "seller-1", 100).await;
	let o1 = engine
		.change_status(&o1.id, "buyer-1", OrderStatus::Cancelled)
		.await
		.unwrap();
	assert_eq!(o1.status, OrderStatus::Cancelled);

	let o2 = order(&engine, "buyer-1", "seller-1", 100).await;
	let o2 = activate(&engine, &o2).await;
	let o2 = engine
		.change_status(&o2.id, "seller-1", OrderStatus::Cancelled)
		.await
		.unwrap();
	assert_eq!(o2.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_twice_fails_on_the_second_attempt() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;

	engine
		.change_status(&order.id, "buyer-1", OrderStatus::Cancelled)
		.await
		.unwrap();
	let err = engine
		.change_status(&order.id, "buyer-1", OrderStatus::Cancelled)
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::InvalidTransition { .. }));
}

#[tokio::test]
async fn status_endpoint_cannot_smuggle_a_delivery() {
	let engine = engine();
	let order = order(&engine, "buyer-1", "seller-1", 100).await;
	let order = activate(&engine, &order).await;

	// Delivered is only reachable through deliver_order, which carries
	// the artifacts.
	let err = engine
		.change_status(&order.id, "seller-1", OrderStatus::Delivered)
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn status_changes_are_published_on_the_event_bus() {
	let engine = engine();
	let mut events = engine.subscribe();

	let order = order(&engine, "buyer-1", "seller-1", 100).await;
	activate(&engine, &order).await;

	// Created, then StatusChanged.
	let first = events.recv().await.unwrap();
	assert!(matches!(first, market_core::OrderEvent::Created { .. }));

	match events.recv().await.unwrap() {
		market_core::OrderEvent::StatusChanged { order_id, from, to } => {
			assert_eq!(order_id, order.id);
			assert_eq!(from, OrderStatus::Pending);
			assert_eq!(to, OrderStatus::Active);
		}
		other => panic!("unexpected event: {:?}", other),
	}
}
