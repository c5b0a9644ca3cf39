mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::{completed_session, TestApp};
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use storefront_api::entities::{
    order::{Entity as Order, OrderStatus},
    order_item::Entity as OrderItem,
};
use tower::ServiceExt;

async fn finalize_simple_order(app: &TestApp, reference: &str) -> storefront_api::services::checkout::FinalizedOrder {
    let product = app
        .seed_product("Linen Shirt", dec!(25), dec!(10), dec!(2), 10)
        .await;
    let session = completed_session(
        reference,
        Some("buyer@example.com"),
        json!({
            "items": json!([{"productId": product.id, "quantity": 2, "priceAtPurchase": "25"}]).to_string(),
            "subtotal": "50",
            "total": "50",
        }),
    );
    app.state
        .services
        .checkout
        .finalize_session(&session, None)
        .await
        .expect("finalization failed")
}

#[tokio::test]
async fn status_moves_forward_and_rejects_invalid_transitions() {
    let app = TestApp::new().await;
    let finalized = finalize_simple_order(&app, "pi_lifecycle_1").await;
    let order_id = finalized.order.id;

    // Shipping straight from Pending skips Processing.
    let err = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Shipped, None)
        .await;
    assert!(err.is_err());

    let processing = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Processing, None)
        .await
        .expect("transition to processing failed");
    assert_eq!(processing.status, OrderStatus::Processing);

    let shipped = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Shipped, Some("TRK-123".to_string()))
        .await
        .expect("transition to shipped failed");
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert_eq!(shipped.tracking_number.as_deref(), Some("TRK-123"));

    // Cancelling a shipped order is not allowed.
    let cancel = app
        .state
        .services
        .orders
        .update_status(order_id, OrderStatus::Cancelled, None)
        .await;
    assert!(cancel.is_err());
}

#[tokio::test]
async fn deleting_an_order_restocks_its_items() {
    let app = TestApp::new().await;
    let finalized = finalize_simple_order(&app, "pi_delete_1").await;
    let product_id = finalized.items[0].product_id;

    // Two units were deducted at finalization.
    assert_eq!(app.reload_product(product_id).await.stock, 8);

    app.state
        .services
        .orders
        .delete_order(finalized.order.id)
        .await
        .expect("delete failed");

    assert_eq!(app.reload_product(product_id).await.stock, 10);
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 0);
    assert_eq!(OrderItem::find().count(&*app.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn webhook_endpoint_finalizes_completed_sessions() {
    let app = TestApp::new().await;
    let product = app
        .seed_product("Wool Hat", dec!(15), dec!(5), dec!(1), 10)
        .await;

    let event = json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_http_1",
                "payment_intent": "pi_http_1",
                "customer_email": "buyer@example.com",
                "metadata": {
                    "items": json!([{"productId": product.id, "quantity": 1, "priceAtPurchase": "15"}]).to_string(),
                    "subtotal": "15",
                    "total": "15",
                }
            }
        }
    });

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/checkout/webhook")
                .header("content-type", "application/json")
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["created"], json!(true));
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 1);

    // Other event types are acknowledged without side effects.
    let ignored = json!({"id": "evt_2", "type": "invoice.paid", "data": {}});
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/checkout/webhook")
                .header("content-type", "application/json")
                .body(Body::from(ignored.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(Order::find().count(&*app.state.db).await.unwrap(), 1);
}

#[tokio::test]
async fn order_endpoints_list_fetch_and_delete() {
    let app = TestApp::new().await;
    let finalized = finalize_simple_order(&app, "pi_http_admin_1").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/orders?page=1&limit=10")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["total"], json!(1));
    assert_eq!(value["items"].as_array().unwrap().len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}", finalized.order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["items"].as_array().unwrap().len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/v1/orders/{}", finalized.order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/orders/{}", finalized.order.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn promo_validation_and_stock_policy_endpoints() {
    let app = TestApp::new().await;
    app.seed_promo(
        "SAVE10",
        storefront_api::entities::promo_code::DiscountType::Percentage,
        dec!(10),
    )
    .await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/promo-codes/validate")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"code": " save10 ", "subtotal": "80"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["valid"], json!(true));
    assert_eq!(value["discount"], json!("8"));

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/v1/settings/stock-policy")
                .header("content-type", "application/json")
                .body(Body::from(json!({"auto_deduct_stock": true}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app
        .state
        .services
        .settings
        .auto_deduct_stock()
        .await
        .unwrap());
}
