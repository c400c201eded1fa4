//! 账号体系与账单流程用例。

mod common;

use axum::http::{Method, StatusCode};
use linli::auth::models::Role;
use serde_json::json;

use common::{create_user, get, post, request, test_app};

#[tokio::test]
async fn test_register_login_profile_round_trip() {
    let (_, app) = test_app().await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"username": "chenqi", "phone": "13811112222", "password": "secret66"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "Resident");

    // 重复手机号
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({"username": "other", "phone": "13811112222", "password": "secret66"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 手机号也能登录
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"login": "13811112222", "password": "secret66"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["token_type"], "Bearer");

    // 错误口令
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({"login": "chenqi", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 改资料后读回
    let (status, _) = request(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Some(&token),
        Some(json!({"nickname": "七哥"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(&app, "/api/auth/profile", &token).await;
    assert_eq!(body["data"]["nickname"], "七哥");
}

#[tokio::test]
async fn test_sms_login_auto_registers_and_code_single_use() {
    let (state, app) = test_app().await;

    let (status, _) = request(
        &app,
        Method::POST,
        "/api/auth/sms/send",
        None,
        Some(json!({"phone": "13822223333"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 一分钟内重发被节流
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/auth/sms/send",
        None,
        Some(json!({"phone": "13822223333"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // 从库里取下发的验证码
    let code = state
        .users()
        .latest_sms_code("13822223333")
        .await
        .unwrap()
        .unwrap()
        .code;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/sms/login",
        None,
        Some(json!({"phone": "13822223333", "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["phone"], "13822223333");

    // 同码复用被拒
    let (status, _) = request(
        &app,
        Method::POST,
        "/api/auth/sms/login",
        None,
        Some(json!({"phone": "13822223333", "code": code})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_wechat_login_creates_account_by_openid() {
    let (_, app) = test_app().await;

    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/wechat/login",
        None,
        Some(json!({"js_code": "abc123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first_id = body["data"]["user"]["id"].as_str().unwrap().to_string();

    // 同一 js_code（同 openid）再登录命中同一账号
    let (status, body) = request(
        &app,
        Method::POST,
        "/api/auth/wechat/login",
        None,
        Some(json!({"js_code": "abc123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"].as_str().unwrap(), first_id);
}

#[tokio::test]
async fn test_deactivated_user_loses_access() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (resident_id, resident) = create_user(&state, "res", "13800000002", Role::Resident).await;

    let (_, body) = get(&app, "/api/auth/profile", &resident).await;
    assert_eq!(body["code"], 0);

    let (status, _) = request(
        &app,
        Method::PUT,
        &format!("/api/admin/users/{}/status", resident_id),
        Some(&admin),
        Some(json!({"is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 旧令牌即刻失效
    let (status, _) = request(&app, Method::GET, "/api/auth/profile", Some(&resident), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bill_generation_is_idempotent_and_pay_once() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;
    let (_, resident) = create_user(&state, "owner", "13800000002", Role::Resident).await;

    // 一套入住房屋：88 平米
    let (_, body) = post(
        &app,
        "/api/admin/houses",
        &admin,
        json!({"building": "2", "unit": "1", "number": "202", "area_m2": 88.0}),
    )
    .await;
    let house_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = post(
        &app,
        "/api/houses/bindings/apply",
        &resident,
        json!({"house_id": house_id, "relation": "Owner"}),
    )
    .await;
    let application_id = body["data"]["id"].as_str().unwrap().to_string();
    let (status, _) = post(
        &app,
        &format!("/api/admin/houses/bindings/applications/{}/approve", application_id),
        &admin,
        json!({}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // 生成账单：88 m2 × 280 分 = 24640 分
    let (status, body) = post(
        &app,
        "/api/admin/bills/generate",
        &admin,
        json!({"period": "2026-08"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created"], 1);

    // 重复生成跳过已有账单
    let (status, body) = post(
        &app,
        "/api/admin/bills/generate",
        &admin,
        json!({"period": "2026-08"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["created"], 0);
    assert_eq!(body["data"]["skipped"], 1);

    let (_, body) = get(&app, "/api/bills/mine?status=Unpaid", &resident).await;
    let bills = body["data"].as_array().unwrap();
    assert_eq!(bills.len(), 1);
    assert_eq!(bills[0]["amount_cents"], 24640);
    let bill_id = bills[0]["id"].as_str().unwrap().to_string();

    // 他人不能代缴
    let (_, stranger) = create_user(&state, "stranger", "13800000003", Role::Resident).await;
    let (status, _) = post(
        &app,
        &format!("/api/bills/{}/pay", bill_id),
        &stranger,
        json!({"payment_method": "Wechat"}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // 本人缴费，一次有效
    let (status, _) = post(
        &app,
        &format!("/api/bills/{}/pay", bill_id),
        &resident,
        json!({"payment_method": "Wechat"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post(
        &app,
        &format!("/api/bills/{}/pay", bill_id),
        &resident,
        json!({"payment_method": "Wechat"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_period_format_validation() {
    let (state, app) = test_app().await;
    let (_, admin) = create_user(&state, "admin", "13800000001", Role::Admin).await;

    for bad in ["2026-13", "202608", "26-08", "2026/08"] {
        let (status, _) = post(
            &app,
            "/api/admin/bills/generate",
            &admin,
            json!({"period": bad}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "period {bad} should fail");
    }
}
