//! Integration tests for order delegation: balance accounting, the
//! failure modes, and role re-interpretation on child orders.

mod common;

use common::{activate, dec, engine, gig, order};
use market_core::EngineError;
use market_types::OrderStatus;

#[tokio::test]
async fn share_creates_a_linked_child_order() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let target = gig(&engine, "seller-b", 55).await;
	let child = engine
		.share_order(&parent.id, "seller-a", &target.id, dec(40))
		.await
		.unwrap();

	assert_eq!(child.status, OrderStatus::Pending);
	assert_eq!(child.price, dec(40));
	assert_eq!(child.buyer_id, "seller-a");
	assert_eq!(child.seller_id, "seller-b");
	assert_eq!(child.original_order_id.as_deref(), Some(parent.id.as_str()));
	assert_eq!(child.shared_from.as_deref(), Some("seller-a"));
	assert_eq!(child.original_buyer_id.as_deref(), Some("buyer-1"));
	assert!(child.is_delegated());

	assert_eq!(engine.remaining_balance(&parent.id).await.unwrap(), dec(60));
}

#[tokio::test]
async fn worked_example_100_40_50_20() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let gig_b = gig(&engine, "seller-b", 40).await;
	let gig_c = gig(&engine, "seller-c", 50).await;
	let gig_d = gig(&engine, "seller-d", 20).await;

	engine
		.share_order(&parent.id, "seller-a", &gig_b.id, dec(40))
		.await
		.unwrap();
	assert_eq!(engine.remaining_balance(&parent.id).await.unwrap(), dec(60));

	engine
		.share_order(&parent.id, "seller-a", &gig_c.id, dec(50))
		.await
		.unwrap();
	assert_eq!(engine.remaining_balance(&parent.id).await.unwrap(), dec(10));

	let err = engine
		.share_order(&parent.id, "seller-a", &gig_d.id, dec(20))
		.await
		.unwrap_err();
	match err {
		EngineError::InsufficientBalance {
			requested,
			available,
		} => {
			assert_eq!(requested, dec(20));
			assert_eq!(available, dec(10));
		}
		other => panic!("expected InsufficientBalance, got {:?}", other),
	}
}

#[tokio::test]
async fn self_share_is_not_allowed() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let own_gig = gig(&engine, "seller-a", 30).await;
	let err = engine
		.share_order(&parent.id, "seller-a", &own_gig.id, dec(30))
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::SelfShareNotAllowed));
}

#[tokio::test]
async fn only_the_parent_seller_may_share() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let target = gig(&engine, "seller-b", 30).await;
	let err = engine
		.share_order(&parent.id, "buyer-1", &target.id, dec(30))
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::Unauthorized { .. }));
}

#[tokio::test]
async fn share_price_must_be_positive() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let target = gig(&engine, "seller-b", 30).await;
	let err = engine
		.share_order(&parent.id, "seller-a", &target.id, dec(0))
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn terminal_parent_cannot_be_shared() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	engine
		.change_status(&parent.id, "buyer-1", OrderStatus::Cancelled)
		.await
		.unwrap();

	let target = gig(&engine, "seller-b", 30).await;
	let err = engine
		.share_order(&parent.id, "seller-a", &target.id, dec(30))
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn cancelling_a_child_restores_exactly_its_share() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let gig_b = gig(&engine, "seller-b", 40).await;
	let child = engine
		.share_order(&parent.id, "seller-a", &gig_b.id, dec(40))
		.await
		.unwrap();
	assert_eq!(engine.remaining_balance(&parent.id).await.unwrap(), dec(60));

	// The delegating seller acts as buyer on the child and may cancel it.
	engine
		.change_status(&child.id, "seller-a", OrderStatus::Cancelled)
		.await
		.unwrap();
	assert_eq!(
		engine.remaining_balance(&parent.id).await.unwrap(),
		dec(100)
	);

	// A second cancel fails because the child is terminal, and restores
	// nothing further.
	let err = engine
		.change_status(&child.id, "seller-a", OrderStatus::Cancelled)
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::InvalidTransition { .. }));
	assert_eq!(
		engine.remaining_balance(&parent.id).await.unwrap(),
		dec(100)
	);
}

#[tokio::test]
async fn rejected_child_also_restores_the_share() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let gig_b = gig(&engine, "seller-b", 40).await;
	let child = engine
		.share_order(&parent.id, "seller-a", &gig_b.id, dec(40))
		.await
		.unwrap();

	engine
		.change_status(&child.id, "seller-b", OrderStatus::Rejected)
		.await
		.unwrap();
	assert_eq!(
		engine.remaining_balance(&parent.id).await.unwrap(),
		dec(100)
	);
}

#[tokio::test]
async fn children_sum_never_exceeds_parent_price() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	for (seller, amount) in [("seller-b", 60), ("seller-c", 40), ("seller-d", 1)] {
		let target = gig(&engine, seller, amount).await;
		let result = engine
			.share_order(&parent.id, "seller-a", &target.id, dec(amount))
			.await;
		if amount == 1 {
			// 60 + 40 exhausted the parent; nothing is left.
			assert!(matches!(
				result,
				Err(EngineError::InsufficientBalance { .. })
			));
		} else {
			result.unwrap();
		}
	}

	assert_eq!(engine.remaining_balance(&parent.id).await.unwrap(), dec(0));
}

#[tokio::test]
async fn delegation_chain_preserves_the_root_buyer() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let gig_b = gig(&engine, "seller-b", 60).await;
	let child = engine
		.share_order(&parent.id, "seller-a", &gig_b.id, dec(60))
		.await
		.unwrap();

	// seller-b accepts, then delegates part of the child onward.
	let child = activate(&engine, &child).await;
	let gig_c = gig(&engine, "seller-c", 20).await;
	let grandchild = engine
		.share_order(&child.id, "seller-b", &gig_c.id, dec(20))
		.await
		.unwrap();

	assert_eq!(grandchild.original_buyer_id.as_deref(), Some("buyer-1"));
	assert_eq!(grandchild.shared_from.as_deref(), Some("seller-b"));
	assert_eq!(grandchild.buyer_id, "seller-b");
}

#[tokio::test]
async fn child_lifecycle_runs_with_reinterpreted_roles() {
	let engine = engine();
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let gig_b = gig(&engine, "seller-b", 40).await;
	let child = engine
		.share_order(&parent.id, "seller-a", &gig_b.id, dec(40))
		.await
		.unwrap();

	// The root buyer is a stranger to the child order.
	let err = engine
		.change_status(&child.id, "buyer-1", OrderStatus::Cancelled)
		.await
		.unwrap_err();
	assert!(matches!(err, EngineError::Unauthorized { .. }));

	// seller-b fulfils, seller-a (acting as buyer) completes.
	let child = activate(&engine, &child).await;
	engine
		.deliver_order(
			&child.id,
			"seller-b",
			vec![market_types::DeliverableUpload {
				file_name: "part.zip".into(),
				uri: "s3://artifacts/part.zip".into(),
			}],
		)
		.await
		.unwrap();
	let child = engine
		.change_status(&child.id, "seller-a", OrderStatus::Completed)
		.await
		.unwrap();
	assert_eq!(child.status, OrderStatus::Completed);

	// Completion does not return the share to the parent.
	assert_eq!(engine.remaining_balance(&parent.id).await.unwrap(), dec(60));
}

#[tokio::test]
async fn concurrent_shares_never_over_allocate() {
	use std::sync::Arc;

	let engine = Arc::new(engine());
	let parent = order(&engine, "buyer-1", "seller-a", 100).await;
	let parent = activate(&engine, &parent).await;

	let mut targets = Vec::new();
	for i in 0..4 {
		targets.push(gig(&engine, &format!("seller-{}", i + 10), 40).await);
	}

	// Four concurrent $40 shares against a $100 parent: at most two can
	// win.
	let mut handles = Vec::new();
	for target in targets {
		let engine = Arc::clone(&engine);
		let parent_id = parent.id.clone();
		handles.push(tokio::spawn(async move {
			engine
				.share_order(&parent_id, "seller-a", &target.id, dec(40))
				.await
		}));
	}

	let mut won = 0;
	for handle in handles {
		if handle.await.unwrap().is_ok() {
			won += 1;
		}
	}
	assert_eq!(won, 2);
	assert_eq!(engine.remaining_balance(&parent.id).await.unwrap(), dec(20));
}
