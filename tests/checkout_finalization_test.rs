mod common;

use common::{completed_session, FailingNotifier, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use std::sync::Arc;
use storefront_api::entities::{
    order::Entity as Order, order_item::Entity as OrderItem, promo_code::DiscountType,
};

#[tokio::test]
async fn redelivered_session_creates_exactly_one_order() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Linen Shirt", dec!(25), dec!(10), dec!(2), 10)
        .await;

    let session = completed_session(
        "pi_idempotent_1",
        Some("buyer@example.com"),
        json!({
            "items": json!([{"productId": product.id, "quantity": 2, "priceAtPurchase": "25"}]).to_string(),
            "subtotal": "50",
            "shipping": "5",
            "tax": "0",
            "total": "55",
        }),
    );

    let first = app
        .state
        .services
        .checkout
        .finalize_session(&session, None)
        .await
        .expect("first finalization failed");
    assert!(first.created);

    let second = app
        .state
        .services
        .checkout
        .finalize_session(&session, None)
        .await
        .expect("second finalization failed");
    assert!(!second.created);
    assert_eq!(first.order.id, second.order.id);

    let count = Order::find().count(&*app.state.db).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn concurrent_deliveries_settle_on_one_order() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Wool Hat", dec!(15), dec!(5), dec!(1), 10)
        .await;

    let session = completed_session(
        "pi_concurrent_1",
        Some("buyer@example.com"),
        json!({
            "items": json!([{"productId": product.id, "quantity": 1, "priceAtPurchase": "15"}]).to_string(),
            "subtotal": "15",
            "total": "15",
        }),
    );

    let (a, b) = tokio::join!(
        app.state.services.checkout.finalize_session(&session, None),
        app.state.services.checkout.finalize_session(&session, None),
    );
    let a = a.expect("first concurrent finalization failed");
    let b = b.expect("second concurrent finalization failed");

    assert_eq!(a.order.id, b.order.id);
    assert_eq!(
        u8::from(a.created) + u8::from(b.created),
        1,
        "exactly one delivery should create the order"
    );
    let count = Order::find().count(&*app.state.db).await.unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn omitted_total_is_reconstructed() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Linen Shirt", dec!(25), dec!(10), dec!(2), 10)
        .await;

    // subtotal=50, discount=5, shipping=5, tax=0, no explicit total.
    let session = completed_session(
        "pi_example_1",
        Some("buyer@example.com"),
        json!({
            "items": json!([{"productId": product.id, "quantity": 2, "priceAtPurchase": "25.00"}]).to_string(),
            "subtotal": "50",
            "discount": "5",
            "shipping": "5",
            "tax": "0",
        }),
    );

    let finalized = app
        .state
        .services
        .checkout
        .finalize_session(&session, None)
        .await
        .expect("finalization failed");

    assert_eq!(finalized.order.subtotal, dec!(50));
    assert_eq!(finalized.order.discount, dec!(5));
    assert_eq!(finalized.order.shipping, dec!(5));
    assert_eq!(finalized.order.tax, dec!(0));
    assert_eq!(finalized.order.total, dec!(50));
    assert_eq!(finalized.items.len(), 1);
    assert_eq!(finalized.items[0].quantity, 2);
    assert_eq!(finalized.items[0].price_at_purchase, dec!(25.00));
}

#[tokio::test]
async fn promo_ledger_overrides_metadata_discount_and_is_clamped() {
    let app = TestApp::new().await;
    let promo_a = app.seed_promo("STACK5", DiscountType::Fixed, dec!(5)).await;
    let promo_b = app
        .seed_promo("STACK10", DiscountType::Percentage, dec!(10))
        .await;

    let promo_list = json!([
        {"id": promo_a.id, "code": "STACK5", "discountAmount": "3"},
        {"id": promo_b.id, "code": "STACK10", "discountAmount": "2"}
    ])
    .to_string();
    let session = completed_session(
        "pi_ledger_1",
        Some("buyer@example.com"),
        json!({
            "subtotal": "40",
            "discount": "20",
            "promoCodes": promo_list,
        }),
    );

    let finalized = app
        .state
        .services
        .checkout
        .finalize_session(&session, None)
        .await
        .expect("finalization failed");

    // Ledger sum 3 + 2 = 5 beats the order-level 20.
    assert_eq!(finalized.order.discount, dec!(5));
    assert_eq!(finalized.promo_codes.len(), 2);
    assert_eq!(finalized.order.promo_code_id, Some(promo_a.id));
    assert_eq!(finalized.order.promo_code_code.as_deref(), Some("STACK5"));

    // A ledger that exceeds the subtotal clamps to it.
    let oversized = completed_session(
        "pi_ledger_2",
        Some("buyer@example.com"),
        json!({
            "subtotal": "4",
            "promoCodes": json!([
                {"id": promo_a.id, "code": "STACK5", "discountAmount": "9"}
            ]).to_string(),
        }),
    );
    let clamped = app
        .state
        .services
        .checkout
        .finalize_session(&oversized, None)
        .await
        .expect("finalization failed");
    assert_eq!(clamped.order.discount, dec!(4));
}

#[tokio::test]
async fn redemptions_increase_once_per_finalization_despite_notification_failure() {
    let app = TestApp::with_notifier(Arc::new(FailingNotifier)).await;
    let promo = app.seed_promo("SAVE10", DiscountType::Fixed, dec!(10)).await;

    for n in 0..3 {
        let session = completed_session(
            &format!("pi_redeem_{}", n),
            Some("buyer@example.com"),
            json!({
                "subtotal": "100",
                "promoCode": "SAVE10",
                "discount": "10",
            }),
        );
        let finalized = app
            .state
            .services
            .checkout
            .finalize_session(&session, None)
            .await
            .expect("finalization failed");
        assert!(finalized.created);
    }

    // Redeliver the last session; the short-circuit must not count again.
    let replay = completed_session(
        "pi_redeem_2",
        Some("buyer@example.com"),
        json!({
            "subtotal": "100",
            "promoCode": "SAVE10",
            "discount": "10",
        }),
    );
    let replayed = app
        .state
        .services
        .checkout
        .finalize_session(&replay, None)
        .await
        .expect("replay failed");
    assert!(!replayed.created);

    let reloaded = app.reload_promo(promo.id).await;
    assert_eq!(reloaded.redemptions, 3);
}

#[tokio::test]
async fn stock_policy_branches_between_deduct_and_reserve() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Canvas Tote", dec!(20), dec!(8), dec!(1), 10)
        .await;

    // Toggle off (default): deduct sellable stock directly.
    let deduct_session = completed_session(
        "pi_stock_deduct",
        Some("buyer@example.com"),
        json!({
            "items": json!([{"productId": product.id, "quantity": 3, "priceAtPurchase": "20"}]).to_string(),
            "subtotal": "60",
            "total": "60",
        }),
    );
    app.state
        .services
        .checkout
        .finalize_session(&deduct_session, None)
        .await
        .expect("finalization failed");
    let after_deduct = app.reload_product(product.id).await;
    assert_eq!(after_deduct.stock, 7);
    assert_eq!(after_deduct.reserved_stock, 0);

    // Toggle on: reserve instead, same starting state.
    let reserved_product = app
        .seed_product("Canvas Tote II", dec!(20), dec!(8), dec!(1), 10)
        .await;
    app.state
        .services
        .settings
        .set_auto_deduct_stock(true)
        .await
        .expect("failed to set stock policy");

    let reserve_session = completed_session(
        "pi_stock_reserve",
        Some("buyer@example.com"),
        json!({
            "items": json!([{"productId": reserved_product.id, "quantity": 3, "priceAtPurchase": "20"}]).to_string(),
            "subtotal": "60",
            "total": "60",
        }),
    );
    app.state
        .services
        .checkout
        .finalize_session(&reserve_session, None)
        .await
        .expect("finalization failed");
    let after_reserve = app.reload_product(reserved_product.id).await;
    assert_eq!(after_reserve.stock, 10);
    assert_eq!(after_reserve.reserved_stock, 3);
}

#[tokio::test]
async fn malformed_cart_metadata_still_creates_an_order() {
    let app = TestApp::new().await;

    let session = completed_session(
        "pi_malformed_1",
        Some("buyer@example.com"),
        json!({
            "items": "{not valid json",
            "subtotal": "30",
            "total": "30",
        }),
    );

    let finalized = app
        .state
        .services
        .checkout
        .finalize_session(&session, None)
        .await
        .expect("finalization should recover from malformed metadata");
    assert!(finalized.created);
    assert!(finalized.items.is_empty());

    let item_count = OrderItem::find().count(&*app.state.db).await.unwrap();
    assert_eq!(item_count, 0);
}

#[tokio::test]
async fn unresolvable_cart_entries_are_dropped() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Linen Shirt", dec!(25), dec!(10), dec!(2), 10)
        .await;

    let items = json!([
        {"productId": product.id, "quantity": 1, "priceAtPurchase": "25"},
        {"productId": "b2c3d4e5-0000-0000-0000-000000000000", "quantity": 1, "priceAtPurchase": "10"},
        {"quantity": 2}
    ])
    .to_string();
    let session = completed_session(
        "pi_dropped_1",
        Some("buyer@example.com"),
        json!({
            "items": items,
            "subtotal": "35",
            "total": "35",
        }),
    );

    let finalized = app
        .state
        .services
        .checkout
        .finalize_session(&session, None)
        .await
        .expect("finalization failed");
    assert_eq!(finalized.items.len(), 1);
    assert_eq!(finalized.items[0].product_id, product.id);
}

#[tokio::test]
async fn guest_checkout_defaults_and_user_linking() {
    let app = TestApp::new().await;
    let user = app.seed_user("regular@example.com", "Regular Buyer").await;

    // No email anywhere: guest order, no user link.
    let guest_session = completed_session("pi_guest_1", None, json!({"subtotal": "10", "total": "10"}));
    let guest = app
        .state
        .services
        .checkout
        .finalize_session(&guest_session, None)
        .await
        .expect("guest finalization failed");
    assert_eq!(guest.order.name, "Guest");
    assert_eq!(guest.order.email, "");
    assert_eq!(guest.order.user_id, None);

    // Email matching a registered user links the order to them.
    let linked_session = completed_session(
        "pi_linked_1",
        Some("Regular@Example.COM"),
        json!({"subtotal": "10", "total": "10"}),
    );
    let linked = app
        .state
        .services
        .checkout
        .finalize_session(&linked_session, None)
        .await
        .expect("linked finalization failed");
    assert_eq!(linked.order.email, "regular@example.com");
    assert_eq!(linked.order.user_id, Some(user.id));
}
