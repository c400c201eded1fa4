//! 活动限额报名与访客通行码用例。

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use linli::auth::models::Role;
use serde_json::json;

use common::{create_user, get, post, test_app};

async fn create_activity(
    app: &axum::Router,
    staff: &str,
    capacity: i64,
) -> String {
    let now = Utc::now();
    let (status, body) = post(
        app,
        "/api/staff/activities",
        staff,
        json!({
            "title": "中秋游园会",
            "content": "赏月、灯谜",
            "location": "中心广场",
            "starts_at": now + Duration::days(3),
            "ends_at": now + Duration::days(3) + Duration::hours(2),
            "capacity": capacity,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_activity_capacity_is_enforced() {
    let (state, app) = test_app().await;
    let (_, staff) = create_user(&state, "staff", "13700000001", Role::Staff).await;
    let activity_id = create_activity(&app, &staff, 2).await;

    let (_, a) = create_user(&state, "res_a", "13700000002", Role::Resident).await;
    let (_, b) = create_user(&state, "res_b", "13700000003", Role::Resident).await;
    let (_, c) = create_user(&state, "res_c", "13700000004", Role::Resident).await;

    let uri = format!("/api/activities/{}/register", activity_id);

    let (status, _) = post(&app, &uri, &a, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = post(&app, &uri, &b, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    // 名额满，第三人报名失败
    let (status, body) = post(&app, &uri, &c, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 1005);

    // 计数与报名行一致
    let (_, body) = get(&app, &format!("/api/activities/{}", activity_id), &staff).await;
    assert_eq!(body["data"]["participant_count"], 2);

    let (_, body) = get(
        &app,
        &format!("/api/staff/activities/{}/registrations", activity_id),
        &staff,
    )
    .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // 取消后腾出名额
    let (status, _) = post(
        &app,
        &format!("/api/activities/{}/cancel", activity_id),
        &a,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(&app, &uri, &c, json!({})).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_activity_duplicate_registration_rejected() {
    let (state, app) = test_app().await;
    let (_, staff) = create_user(&state, "staff", "13700000001", Role::Staff).await;
    let activity_id = create_activity(&app, &staff, 10).await;
    let (_, resident) = create_user(&state, "res", "13700000005", Role::Resident).await;

    let uri = format!("/api/activities/{}/register", activity_id);
    let (status, _) = post(&app, &uri, &resident, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post(&app, &uri, &resident, json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "您已报名该活动");

    // 重复报名不虚增计数
    let (_, body) = get(&app, &format!("/api/activities/{}", activity_id), &resident).await;
    assert_eq!(body["data"]["participant_count"], 1);
}

#[tokio::test]
async fn test_closed_activity_rejects_registration() {
    let (state, app) = test_app().await;
    let (_, staff) = create_user(&state, "staff", "13700000001", Role::Staff).await;
    let activity_id = create_activity(&app, &staff, 10).await;
    let (_, resident) = create_user(&state, "res", "13700000006", Role::Resident).await;

    let (status, _) = post(
        &app,
        &format!("/api/staff/activities/{}/close", activity_id),
        &staff,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        &format!("/api/activities/{}/register", activity_id),
        &resident,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_visitor_pass_verify_once() {
    let (state, app) = test_app().await;
    let (_, host) = create_user(&state, "host", "13700000007", Role::Resident).await;
    let (_, guard) = create_user(&state, "guard", "13700000008", Role::Staff).await;

    let today = Utc::now().date_naive();
    let (status, body) = post(
        &app,
        "/api/visitors",
        &host,
        json!({
            "visitor_name": "王师傅",
            "visitor_phone": "13600000001",
            "plate": "京B88888",
            "visit_date": today,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = body["data"]["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 8);

    // 住户无权核验
    let (status, _) = post(
        &app,
        "/api/staff/visitors/verify",
        &host,
        json!({"code": code}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 门岗核验通过
    let (status, body) = post(
        &app,
        "/api/staff/visitors/verify",
        &guard,
        json!({"code": code}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visitor_name"], "王师傅");

    // 一码一次
    let (status, _) = post(
        &app,
        "/api/staff/visitors/verify",
        &guard,
        json!({"code": code}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 未知码
    let (status, _) = post(
        &app,
        "/api/staff/visitors/verify",
        &guard,
        json!({"code": "XXXXXXXX"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_visitor_pass_rejects_past_date() {
    let (state, app) = test_app().await;
    let (_, host) = create_user(&state, "host", "13700000009", Role::Resident).await;

    let yesterday = Utc::now().date_naive() - Duration::days(1);
    let (status, _) = post(
        &app,
        "/api/visitors",
        &host,
        json!({
            "visitor_name": "迟到的客人",
            "visitor_phone": "13600000002",
            "visit_date": yesterday,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
