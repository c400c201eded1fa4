//! 启动时执行的建表脚本。全部语句可重复执行。

use sqlx::SqlitePool;
use tracing::info;

use super::{DatabaseError, DatabaseResult};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL UNIQUE,
        email TEXT,
        nickname TEXT,
        avatar TEXT,
        password_salt TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        wechat_openid TEXT UNIQUE,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        last_login TEXT
    )",
    "CREATE TABLE IF NOT EXISTS sms_codes (
        id TEXT PRIMARY KEY,
        phone TEXT NOT NULL,
        code TEXT NOT NULL,
        expires_at TEXT NOT NULL,
        consumed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS houses (
        id TEXT PRIMARY KEY,
        building TEXT NOT NULL,
        unit TEXT NOT NULL,
        number TEXT NOT NULL,
        area_m2 REAL NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(building, unit, number)
    )",
    "CREATE TABLE IF NOT EXISTS house_binding_applications (
        id TEXT PRIMARY KEY,
        house_id TEXT NOT NULL,
        applicant_id TEXT NOT NULL,
        relation TEXT NOT NULL,
        status TEXT NOT NULL,
        reject_reason TEXT,
        reviewer_id TEXT,
        created_at TEXT NOT NULL,
        reviewed_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS house_bindings (
        id TEXT PRIMARY KEY,
        house_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        relation TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(house_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS parking_spaces (
        id TEXT PRIMARY KEY,
        zone TEXT NOT NULL,
        number TEXT NOT NULL,
        kind TEXT NOT NULL,
        monthly_fee_cents INTEGER NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(zone, number)
    )",
    "CREATE TABLE IF NOT EXISTS parking_binding_applications (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL,
        applicant_id TEXT NOT NULL,
        plate TEXT NOT NULL,
        status TEXT NOT NULL,
        reject_reason TEXT,
        reviewer_id TEXT,
        created_at TEXT NOT NULL,
        reviewed_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS parking_bindings (
        id TEXT PRIMARY KEY,
        space_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        plate TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(space_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS repair_orders (
        id TEXT PRIMARY KEY,
        no TEXT NOT NULL UNIQUE,
        reporter_id TEXT NOT NULL,
        location TEXT NOT NULL,
        category TEXT NOT NULL,
        description TEXT NOT NULL,
        photos TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL,
        assignee_id TEXT,
        rating INTEGER,
        rating_comment TEXT,
        created_at TEXT NOT NULL,
        assigned_at TEXT,
        completed_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS bills (
        id TEXT PRIMARY KEY,
        no TEXT NOT NULL UNIQUE,
        house_id TEXT,
        user_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        period TEXT NOT NULL,
        amount_cents INTEGER NOT NULL,
        status TEXT NOT NULL,
        paid_at TEXT,
        payment_method TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_bills_house_kind_period
        ON bills(house_id, kind, period) WHERE house_id IS NOT NULL",
    "CREATE TABLE IF NOT EXISTS visitor_passes (
        id TEXT PRIMARY KEY,
        host_id TEXT NOT NULL,
        visitor_name TEXT NOT NULL,
        visitor_phone TEXT NOT NULL,
        plate TEXT,
        visit_date TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        used_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS announcements (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author_id TEXT NOT NULL,
        published INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS market_items (
        id TEXT PRIMARY KEY,
        seller_id TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        price_cents INTEGER NOT NULL,
        images TEXT NOT NULL DEFAULT '[]',
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chat_messages (
        id TEXT PRIMARY KEY,
        sender_id TEXT NOT NULL,
        recipient_id TEXT NOT NULL,
        content TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS activities (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        location TEXT NOT NULL,
        starts_at TEXT NOT NULL,
        ends_at TEXT NOT NULL,
        capacity INTEGER NOT NULL,
        participant_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS activity_registrations (
        id TEXT PRIMARY KEY,
        activity_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(activity_id, user_id)
    )",
    "CREATE TABLE IF NOT EXISTS shops (
        id TEXT PRIMARY KEY,
        owner_id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT,
        logo TEXT,
        license_image TEXT,
        phone TEXT NOT NULL,
        status TEXT NOT NULL,
        total_orders INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY,
        shop_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        image TEXT,
        price_cents INTEGER NOT NULL,
        stock INTEGER NOT NULL,
        on_shelf INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS shop_orders (
        id TEXT PRIMARY KEY,
        no TEXT NOT NULL UNIQUE,
        shop_id TEXT NOT NULL,
        buyer_id TEXT NOT NULL,
        total_cents INTEGER NOT NULL,
        discount_cents INTEGER NOT NULL DEFAULT 0,
        payable_cents INTEGER NOT NULL,
        user_coupon_id TEXT,
        pickup_code TEXT,
        status TEXT NOT NULL,
        remark TEXT,
        cancelled_reason TEXT,
        created_at TEXT NOT NULL,
        accepted_at TEXT,
        completed_at TEXT
    )",
    "CREATE TABLE IF NOT EXISTS shop_order_items (
        id TEXT PRIMARY KEY,
        order_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        product_name TEXT NOT NULL,
        unit_price_cents INTEGER NOT NULL,
        quantity INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS coupons (
        id TEXT PRIMARY KEY,
        shop_id TEXT NOT NULL,
        title TEXT NOT NULL,
        discount_cents INTEGER NOT NULL,
        min_spend_cents INTEGER NOT NULL DEFAULT 0,
        total_count INTEGER NOT NULL,
        claimed_count INTEGER NOT NULL DEFAULT 0,
        used_count INTEGER NOT NULL DEFAULT 0,
        valid_from TEXT NOT NULL,
        valid_until TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS user_coupons (
        id TEXT PRIMARY KEY,
        coupon_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        claimed_at TEXT NOT NULL,
        used_at TEXT,
        UNIQUE(coupon_id, user_id)
    )",
];

/// 执行全部建表语句
pub async fn run(pool: &SqlitePool) -> DatabaseResult<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    }

    info!("Database schema ready ({} statements)", SCHEMA.len());
    Ok(())
}
