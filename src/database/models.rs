//! 数据库行模型与状态枚举。行内 id 一律以 TEXT 存储，出库后在边界处转换。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::{DatabaseError, DatabaseResult};
use crate::auth::models::{Role, User};

fn parse_id(id: &str) -> DatabaseResult<Uuid> {
    Uuid::parse_str(id).map_err(|e| DatabaseError::Other(format!("Failed to parse UUID: {}", e)))
}

// ---------------------------------------------------------------------------
// 状态枚举
// ---------------------------------------------------------------------------

macro_rules! status_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(DatabaseError::Other(format!(
                        concat!("unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

status_enum!(AssetStatus { Vacant => "Vacant", Occupied => "Occupied" });
status_enum!(ApplicationStatus { Pending => "Pending", Approved => "Approved", Rejected => "Rejected" });
status_enum!(RepairStatus {
    Pending => "Pending",
    Assigned => "Assigned",
    Processing => "Processing",
    Completed => "Completed",
    Cancelled => "Cancelled",
});
status_enum!(BillStatus { Unpaid => "Unpaid", Paid => "Paid" });
status_enum!(PassStatus { Active => "Active", Used => "Used" });
status_enum!(MarketStatus { OnSale => "OnSale", Sold => "Sold", Withdrawn => "Withdrawn" });
status_enum!(ActivityStatus { Open => "Open", Closed => "Closed" });
status_enum!(ShopStatus {
    Pending => "Pending",
    Approved => "Approved",
    Rejected => "Rejected",
    Closed => "Closed",
});
status_enum!(OrderStatus {
    Pending => "Pending",
    Accepted => "Accepted",
    Completed => "Completed",
    Cancelled => "Cancelled",
});
status_enum!(CouponStatus { Unused => "Unused", Used => "Used" });

// ---------------------------------------------------------------------------
// 行模型
// ---------------------------------------------------------------------------

/// 数据库用户模型。含口令字段，不直接序列化给客户端。
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbUser {
    pub id: String,
    pub username: String,
    pub phone: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub password_salt: String,
    pub password_hash: String,
    pub role: String,
    pub wechat_openid: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl DbUser {
    /// 转换为领域模型
    pub fn to_domain(&self) -> DatabaseResult<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            username: self.username.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            nickname: self.nickname.clone(),
            avatar: self.avatar.clone(),
            role: self.role.parse::<Role>().unwrap_or(Role::Resident),
            is_active: self.is_active,
            created_at: self.created_at,
            last_login: self.last_login,
        })
    }
}

/// 短信验证码
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbSmsCode {
    pub id: String,
    pub phone: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbHouse {
    pub id: String,
    pub building: String,
    pub unit: String,
    pub number: String,
    pub area_m2: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbHouseBindingApplication {
    pub id: String,
    pub house_id: String,
    pub applicant_id: String,
    pub relation: String,
    pub status: String,
    pub reject_reason: Option<String>,
    pub reviewer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbHouseBinding {
    pub id: String,
    pub house_id: String,
    pub user_id: String,
    pub relation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbParkingSpace {
    pub id: String,
    pub zone: String,
    pub number: String,
    pub kind: String,
    pub monthly_fee_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbParkingBindingApplication {
    pub id: String,
    pub space_id: String,
    pub applicant_id: String,
    pub plate: String,
    pub status: String,
    pub reject_reason: Option<String>,
    pub reviewer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbParkingBinding {
    pub id: String,
    pub space_id: String,
    pub user_id: String,
    pub plate: String,
    pub created_at: DateTime<Utc>,
}

/// 报修工单。photos 为 JSON 数组文本。
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbRepairOrder {
    pub id: String,
    pub no: String,
    pub reporter_id: String,
    pub location: String,
    pub category: String,
    pub description: String,
    pub photos: String,
    pub status: String,
    pub assignee_id: Option<String>,
    pub rating: Option<i64>,
    pub rating_comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DbRepairOrder {
    pub fn photo_list(&self) -> Vec<String> {
        serde_json::from_str(&self.photos).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbBill {
    pub id: String,
    pub no: String,
    pub house_id: Option<String>,
    pub user_id: String,
    pub kind: String,
    pub period: String,
    pub amount_cents: i64,
    pub status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbVisitorPass {
    pub id: String,
    pub host_id: String,
    pub visitor_name: String,
    pub visitor_phone: String,
    pub plate: Option<String>,
    pub visit_date: NaiveDate,
    pub code: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbAnnouncement {
    pub id: String,
    pub title: String,
    pub content: String,
    pub author_id: String,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 二手集市商品。images 为 JSON 数组文本。
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbMarketItem {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub description: String,
    pub price_cents: i64,
    pub images: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbMarketItem {
    pub fn image_list(&self) -> Vec<String> {
        serde_json::from_str(&self.images).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbChatMessage {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbActivity {
    pub id: String,
    pub title: String,
    pub content: String,
    pub location: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: i64,
    pub participant_count: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbActivityRegistration {
    pub id: String,
    pub activity_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbShop {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    pub license_image: Option<String>,
    pub phone: String,
    pub status: String,
    pub total_orders: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbProduct {
    pub id: String,
    pub shop_id: String,
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price_cents: i64,
    pub stock: i64,
    pub on_shelf: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbShopOrder {
    pub id: String,
    pub no: String,
    pub shop_id: String,
    pub buyer_id: String,
    pub total_cents: i64,
    pub discount_cents: i64,
    pub payable_cents: i64,
    pub user_coupon_id: Option<String>,
    pub pickup_code: Option<String>,
    pub status: String,
    pub remark: Option<String>,
    pub cancelled_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbShopOrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbCoupon {
    pub id: String,
    pub shop_id: String,
    pub title: String,
    pub discount_cents: i64,
    pub min_spend_cents: i64,
    pub total_count: i64,
    pub claimed_count: i64,
    pub used_count: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DbCoupon {
    pub fn in_validity(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DbUserCoupon {
    pub id: String,
    pub coupon_id: String,
    pub user_id: String,
    pub code: String,
    pub status: String,
    pub claimed_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_enum_round_trip() {
        assert_eq!("Pending".parse::<OrderStatus>().unwrap(), OrderStatus::Pending);
        assert_eq!(OrderStatus::Accepted.as_str(), "Accepted");
        assert!("Bogus".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_coupon_validity_window() {
        let now = Utc::now();
        let coupon = DbCoupon {
            id: Uuid::new_v4().to_string(),
            shop_id: Uuid::new_v4().to_string(),
            title: "满10减2".to_string(),
            discount_cents: 200,
            min_spend_cents: 1000,
            total_count: 10,
            claimed_count: 0,
            used_count: 0,
            valid_from: now - chrono::Duration::days(1),
            valid_until: now + chrono::Duration::days(1),
            created_at: now,
        };
        assert!(coupon.in_validity(now));
        assert!(!coupon.in_validity(now + chrono::Duration::days(2)));
    }

    #[test]
    fn test_photo_list_tolerates_garbage() {
        let order = DbRepairOrder {
            id: Uuid::new_v4().to_string(),
            no: "RO1".to_string(),
            reporter_id: Uuid::new_v4().to_string(),
            location: "1-1-101".to_string(),
            category: "Plumbing".to_string(),
            description: "漏水".to_string(),
            photos: "not json".to_string(),
            status: "Pending".to_string(),
            assignee_id: None,
            rating: None,
            rating_comment: None,
            created_at: Utc::now(),
            assigned_at: None,
            completed_at: None,
        };
        assert!(order.photo_list().is_empty());
    }
}
