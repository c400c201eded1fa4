//! 工单、公告、集市、私信用例。

mod common;

use axum::http::{Method, StatusCode};
use linli::auth::models::Role;
use serde_json::json;

use common::{create_user, get, post, request, test_app};

#[tokio::test]
async fn test_repair_order_full_lifecycle() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (staff_id, staff) = create_user(&state, "worker", "13800000002", Role::Staff).await;
    let (_, resident) = create_user(&state, "res", "13800000003", Role::Resident).await;

    // 报修
    let (status, body) = post(
        &app,
        "/api/repairs",
        &resident,
        json!({"location": "1-2-301", "category": "Plumbing", "description": "厨房水管漏水"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "Pending");
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    assert!(body["data"]["no"].as_str().unwrap().starts_with("RO"));

    // 派单给住户会被拒
    let (someone_id, _) = create_user(&state, "someone", "13800000009", Role::Resident).await;
    let (status, _) = post(
        &app,
        &format!("/api/staff/repairs/{}/assign", order_id),
        &admin,
        json!({"assignee_id": someone_id}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 派单给物业员工
    let (status, _) = post(
        &app,
        &format!("/api/staff/repairs/{}/assign", order_id),
        &admin,
        json!({"assignee_id": staff_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 已派单不可撤
    let (status, _) = post(
        &app,
        &format!("/api/repairs/{}/cancel", order_id),
        &resident,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 完工前不能评价
    let (status, _) = post(
        &app,
        &format!("/api/repairs/{}/rate", order_id),
        &resident,
        json!({"rating": 5}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 开工、完工
    let (status, _) = post(
        &app,
        &format!("/api/staff/repairs/{}/start", order_id),
        &staff,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        &format!("/api/staff/repairs/{}/complete", order_id),
        &staff,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 评价一次有效
    let (status, _) = post(
        &app,
        &format!("/api/repairs/{}/rate", order_id),
        &resident,
        json!({"rating": 5, "comment": "修得很快"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        &format!("/api/repairs/{}/rate", order_id),
        &resident,
        json!({"rating": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = get(&app, "/api/repairs/mine", &resident).await;
    assert_eq!(body["data"][0]["status"], "Completed");
    assert_eq!(body["data"][0]["rating"], 5);
}

#[tokio::test]
async fn test_announcement_visibility() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;

    let (status, body) = post(
        &app,
        "/api/admin/announcements",
        &admin,
        json!({"title": "停水通知", "content": "周三上午 9 点至 12 点停水"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // 未发布的公告对外不可见
    let (status, body) = request(&app, Method::GET, "/api/announcements", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/api/announcements/{}", id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 发布后可见
    let (status, _) = post(
        &app,
        &format!("/api/admin/announcements/{}/publish", id),
        &admin,
        json!({"published": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = request(&app, Method::GET, "/api/announcements", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["title"], "停水通知");
}

#[tokio::test]
async fn test_market_item_ownership() {
    let (state, app) = test_app().await;
    let (_, seller) = create_user(&state, "seller", "13800000001", Role::Resident).await;
    let (_, other) = create_user(&state, "other", "13800000002", Role::Resident).await;

    let (status, body) = post(
        &app,
        "/api/market/items",
        &seller,
        json!({"title": "九成新婴儿车", "description": "自提", "price_cents": 15000}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // 非卖家改不动
    let (status, _) = request(
        &app,
        Method::PUT,
        &format!("/api/market/items/{}", id),
        Some(&other),
        Some(json!({"price_cents": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 卖家下架后，他人浏览不到
    let (status, _) = request(
        &app,
        Method::PUT,
        &format!("/api/market/items/{}", id),
        Some(&seller),
        Some(json!({"status": "Withdrawn"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/api/market/items", &other).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/api/market/items/{}", id),
        Some(&other),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 卖家自己仍可见
    let (status, _) = request(
        &app,
        Method::GET,
        &format!("/api/market/items/{}", id),
        Some(&seller),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_market_keyword_search() {
    let (state, app) = test_app().await;
    let (_, seller) = create_user(&state, "seller", "13800000001", Role::Resident).await;

    for title in ["山地自行车", "儿童自行车", "旧书一批"] {
        let (status, _) = post(
            &app,
            "/api/market/items",
            &seller,
            json!({"title": title, "description": "", "price_cents": 1000}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // URI 里的关键字需要百分号编码（"自行车"）
    let (_, body) = get(
        &app,
        "/api/market/items?keyword=%E8%87%AA%E8%A1%8C%E8%BD%A6",
        &seller,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chat_conversation_and_unread() {
    let (state, app) = test_app().await;
    let (a_id, a) = create_user(&state, "alice", "13800000001", Role::Resident).await;
    let (b_id, b) = create_user(&state, "bob", "13800000002", Role::Resident).await;

    // 不能给自己发
    let (status, _) = post(
        &app,
        "/api/chat/messages",
        &a,
        json!({"recipient_id": a_id, "content": "hi"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for content in ["晚上取快递吗？", "在家吗"] {
        let (status, _) = post(
            &app,
            "/api/chat/messages",
            &a,
            json!({"recipient_id": b_id, "content": content}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // b 的会话列表：一个对端、两条未读
    let (_, body) = get(&app, "/api/chat/conversations", &b).await;
    let conversations = body["data"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["peer_id"], a_id.to_string());
    assert_eq!(conversations[0]["unread_count"], 2);

    // 读聊天记录即回执已读
    let (_, body) = get(&app, &format!("/api/chat/messages?peer={}", a_id), &b).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = get(&app, "/api/chat/conversations", &b).await;
    assert_eq!(body["data"][0]["unread_count"], 0);
}
