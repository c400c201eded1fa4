//! 房屋/车位绑定两段式流程的端到端用例。

mod common;

use axum::http::{Method, StatusCode};
use linli::auth::models::Role;
use serde_json::json;

use common::{create_user, get, post, request, test_app};

#[tokio::test]
async fn test_house_binding_approval_creates_binding_and_occupies_house() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (_, resident) = create_user(&state, "zhangsan", "13800000002", Role::Resident).await;

    // 登记房屋
    let (status, body) = post(
        &app,
        "/api/admin/houses",
        &admin,
        json!({"building": "1", "unit": "2", "number": "301", "area_m2": 89.5}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let house_id = body["data"]["id"].as_str().unwrap().to_string();

    // 住户申请绑定
    let (status, body) = post(
        &app,
        "/api/houses/bindings/apply",
        &resident,
        json!({"house_id": house_id, "relation": "Owner"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let application_id = body["data"]["id"].as_str().unwrap().to_string();

    // 重复申请被拒
    let (status, _) = post(
        &app,
        "/api/houses/bindings/apply",
        &resident,
        json!({"house_id": house_id, "relation": "Owner"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 管理员批准：生成绑定、房屋入住
    let uri = format!("/api/admin/houses/bindings/applications/{}/approve", application_id);
    let (status, body) = post(&app, &uri, &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    let binding_id = body["data"]["id"].as_str().unwrap().to_string();

    // 同一申请再批是状态冲突
    let (status, _) = post(&app, &uri, &admin, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 住户能看到生效绑定
    let (status, body) = get(&app, "/api/houses/bindings/mine", &resident).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bindings"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["applications"][0]["status"], "Approved");

    // 入住中的房屋不可删除
    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/api/admin/houses/{}", house_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 解绑后房屋回到空置，可删除
    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/api/admin/houses/bindings/{}", binding_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/api/admin/houses/{}", house_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_house_binding_reject_requires_reason() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (_, resident) = create_user(&state, "lisi", "13800000003", Role::Resident).await;

    let (_, body) = post(
        &app,
        "/api/admin/houses",
        &admin,
        json!({"building": "3", "unit": "1", "number": "101", "area_m2": 60.0}),
    )
    .await;
    let house_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = post(
        &app,
        "/api/houses/bindings/apply",
        &resident,
        json!({"house_id": house_id, "relation": "Tenant"}),
    )
    .await;
    let application_id = body["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/houses/bindings/applications/{}/reject", application_id);

    let (status, _) = post(&app, &uri, &admin, json!({"reason": ""})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post(&app, &uri, &admin, json!({"reason": "材料不全"})).await;
    assert_eq!(status, StatusCode::OK);

    // 驳回后不生成绑定
    let (_, body) = get(&app, "/api/houses/bindings/mine", &resident).await;
    assert!(body["data"]["bindings"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["applications"][0]["status"], "Rejected");
    assert_eq!(body["data"]["applications"][0]["reject_reason"], "材料不全");
}

#[tokio::test]
async fn test_binding_review_requires_permission() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (_, resident) = create_user(&state, "wangwu", "13800000004", Role::Resident).await;

    let (_, body) = post(
        &app,
        "/api/admin/houses",
        &admin,
        json!({"building": "5", "unit": "1", "number": "502", "area_m2": 75.0}),
    )
    .await;
    let house_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = post(
        &app,
        "/api/houses/bindings/apply",
        &resident,
        json!({"house_id": house_id, "relation": "Family"}),
    )
    .await;
    let application_id = body["data"]["id"].as_str().unwrap().to_string();

    // 住户不能审核
    let uri = format!("/api/admin/houses/bindings/applications/{}/approve", application_id);
    let (status, body) = post(&app, &uri, &resident, json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 1003);
}

#[tokio::test]
async fn test_parking_binding_workflow() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (_, resident) = create_user(&state, "zhaoliu", "13800000005", Role::Resident).await;

    let (status, body) = post(
        &app,
        "/api/admin/parking",
        &admin,
        json!({"zone": "B", "number": "066", "kind": "Fixed", "monthly_fee_cents": 30000}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let space_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = post(
        &app,
        "/api/parking/bindings/apply",
        &resident,
        json!({"space_id": space_id, "plate": "京A12345"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let application_id = body["data"]["id"].as_str().unwrap().to_string();

    let uri = format!("/api/admin/parking/bindings/applications/{}/approve", application_id);
    let (status, body) = post(&app, &uri, &admin, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["plate"], "京A12345");

    // 车位已占用，删除被拒
    let (status, _) = request(
        &app,
        Method::DELETE,
        &format!("/api/admin/parking/{}", space_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let (_, app) = test_app().await;

    let (status, _) = request(&app, Method::GET, "/api/houses/bindings/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = request(
        &app,
        Method::GET,
        "/api/houses/bindings/mine",
        Some("not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
