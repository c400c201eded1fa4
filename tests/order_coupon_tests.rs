//! 店铺订单与优惠券的端到端用例：快照锁价、券抵扣、取货码核销。

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use linli::auth::models::Role;
use serde_json::json;
use uuid::Uuid;

use common::{create_user, get, post, test_app};

/// 开一家已过审的店，上一个商品，返回 (商户令牌, shop_id, product_id)
async fn setup_shop(
    state: &linli::server::AppState,
    app: &axum::Router,
    admin: &str,
    stock: i64,
) -> (String, String, String) {
    let (_, merchant) = create_user(state, "laowang", "13900000001", Role::Merchant).await;

    let (status, body) = post(
        app,
        "/api/merchant/shop",
        &merchant,
        json!({"name": "老王小卖部", "phone": "13900000001"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let shop_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = post(
        app,
        &format!("/api/admin/shops/{}/approve", shop_id),
        admin,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(
        app,
        "/api/merchant/products",
        &merchant,
        json!({"name": "酸奶", "price_cents": 600, "stock": stock}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    (merchant, shop_id, product_id)
}

#[tokio::test]
async fn test_order_lifecycle_with_pickup_code() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (merchant, shop_id, product_id) = setup_shop(&state, &app, &admin, 10).await;
    let (_, buyer) = create_user(&state, "buyer", "13800000002", Role::Resident).await;

    // 下单 3 件，快照价 600
    let (status, body) = post(
        &app,
        "/api/orders",
        &buyer,
        json!({"shop_id": shop_id, "items": [{"product_id": product_id, "quantity": 3}]}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_cents"], 1800);
    assert_eq!(body["data"]["payable_cents"], 1800);
    assert_eq!(body["data"]["status"], "Pending");
    assert_eq!(body["data"]["items"][0]["product_name"], "酸奶");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // 库存立即扣减
    let product = state
        .shops()
        .find_product(Uuid::parse_str(&product_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 7);

    // 接单签发取货码
    let (status, body) = post(
        &app,
        &format!("/api/merchant/orders/{}/accept", order_id),
        &merchant,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pickup_code = body["data"]["pickup_code"].as_str().unwrap().to_string();
    assert_eq!(pickup_code.len(), 6);

    // 错码核销失败
    let (status, _) = post(
        &app,
        "/api/merchant/orders/pickup",
        &merchant,
        json!({"code": "000000"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 正码核销完成订单
    let (status, body) = post(
        &app,
        "/api/merchant/orders/pickup",
        &merchant,
        json!({"code": pickup_code}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Completed");

    // 取货码一次有效
    let (status, _) = post(
        &app,
        "/api/merchant/orders/pickup",
        &merchant,
        json!({"code": pickup_code}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_order_insufficient_stock_rolls_back() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (_, shop_id, product_id) = setup_shop(&state, &app, &admin, 2).await;
    let (_, buyer) = create_user(&state, "buyer", "13800000002", Role::Resident).await;

    let (status, body) = post(
        &app,
        "/api/orders",
        &buyer,
        json!({"shop_id": shop_id, "items": [{"product_id": product_id, "quantity": 3}]}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 1005);

    // 库存原样，订单未落库
    let product = state
        .shops()
        .find_product(Uuid::parse_str(&product_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 2);

    let (_, body) = get(&app, "/api/orders/mine", &buyer).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_buyer_cancel_restocks_and_releases_coupon() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (merchant, shop_id, product_id) = setup_shop(&state, &app, &admin, 5).await;
    let (_, buyer) = create_user(&state, "buyer", "13800000002", Role::Resident).await;

    // 商户发券：满 10 减 2
    let now = Utc::now();
    let (status, body) = post(
        &app,
        "/api/merchant/coupons",
        &merchant,
        json!({
            "title": "满10减2",
            "discount_cents": 200,
            "min_spend_cents": 1000,
            "total_count": 5,
            "valid_from": now - Duration::days(1),
            "valid_until": now + Duration::days(7),
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let coupon_id = body["data"]["id"].as_str().unwrap().to_string();

    // 领券
    let (status, _) = post(
        &app,
        &format!("/api/coupons/{}/claim", coupon_id),
        &buyer,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/api/coupons/mine", &buyer).await;
    let user_coupon_id = body["data"][0]["id"].as_str().unwrap().to_string();

    // 用券下单：1800 - 200 = 1600
    let (status, body) = post(
        &app,
        "/api/orders",
        &buyer,
        json!({
            "shop_id": shop_id,
            "items": [{"product_id": product_id, "quantity": 3}],
            "user_coupon_id": user_coupon_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["discount_cents"], 200);
    assert_eq!(body["data"]["payable_cents"], 1600);
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // 下单后券置已用
    let (_, body) = get(&app, "/api/coupons/mine?status=Used", &buyer).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    // 买家取消：库存回补，券退回
    let (status, _) = post(
        &app,
        &format!("/api/orders/{}/cancel", order_id),
        &buyer,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let product = state
        .shops()
        .find_product(Uuid::parse_str(&product_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.stock, 5);

    let (_, body) = get(&app, "/api/coupons/mine?status=Unused", &buyer).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let coupon = state
        .coupons()
        .find_by_id(Uuid::parse_str(&coupon_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coupon.used_count, 0);
}

#[tokio::test]
async fn test_coupon_min_spend_and_double_claim() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (merchant, shop_id, product_id) = setup_shop(&state, &app, &admin, 5).await;
    let (_, buyer) = create_user(&state, "buyer", "13800000002", Role::Resident).await;

    let now = Utc::now();
    let (_, body) = post(
        &app,
        "/api/merchant/coupons",
        &merchant,
        json!({
            "title": "满50减5",
            "discount_cents": 500,
            "min_spend_cents": 5000,
            "total_count": 1,
            "valid_from": now - Duration::days(1),
            "valid_until": now + Duration::days(7),
        }),
    )
    .await;
    let coupon_id = body["data"]["id"].as_str().unwrap().to_string();

    let claim_uri = format!("/api/coupons/{}/claim", coupon_id);
    let (status, _) = post(&app, &claim_uri, &buyer, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // 同券二次领取被拒
    let (status, _) = post(&app, &claim_uri, &buyer, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 另一买家领取时已领完
    let (_, buyer2) = create_user(&state, "buyer2", "13800000003", Role::Resident).await;
    let (status, _) = post(&app, &claim_uri, &buyer2, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 未达门槛不可用券
    let (_, body) = get(&app, "/api/coupons/mine", &buyer).await;
    let user_coupon_id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = post(
        &app,
        "/api/orders",
        &buyer,
        json!({
            "shop_id": shop_id,
            "items": [{"product_id": product_id, "quantity": 2}],
            "user_coupon_id": user_coupon_id,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_coupon_verification_code_single_use() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (merchant, _, _) = setup_shop(&state, &app, &admin, 5).await;
    let (_, buyer) = create_user(&state, "buyer", "13800000002", Role::Resident).await;

    let now = Utc::now();
    let (_, body) = post(
        &app,
        "/api/merchant/coupons",
        &merchant,
        json!({
            "title": "无门槛减1",
            "discount_cents": 100,
            "min_spend_cents": 0,
            "total_count": 10,
            "valid_from": now - Duration::days(1),
            "valid_until": now + Duration::days(7),
        }),
    )
    .await;
    let coupon_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &app,
        &format!("/api/coupons/{}/claim", coupon_id),
        &buyer,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = body["data"]["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 12);

    // 到店核销成功，used_count 恰好加一
    let (status, body) = post(
        &app,
        "/api/merchant/coupons/verify",
        &merchant,
        json!({"code": code}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Used");

    let coupon = state
        .coupons()
        .find_by_id(Uuid::parse_str(&coupon_id).unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(coupon.used_count, 1);

    // 同码复核被拒
    let (status, _) = post(
        &app,
        "/api/merchant/coupons/verify",
        &merchant,
        json!({"code": code}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unapproved_shop_cannot_sell() {
    let (state, app) = test_app().await;
    let (_, merchant) = create_user(&state, "newshop", "13900000009", Role::Merchant).await;

    let (status, _) = post(
        &app,
        "/api/merchant/shop",
        &merchant,
        json!({"name": "待审店", "phone": "13900000009"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 未过审不能上商品
    let (status, _) = post(
        &app,
        "/api/merchant/products",
        &merchant,
        json!({"name": "货", "price_cents": 100, "stock": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 二次入驻被拒
    let (status, _) = post(
        &app,
        "/api/merchant/shop",
        &merchant,
        json!({"name": "又一家", "phone": "13900000009"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
