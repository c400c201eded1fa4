use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

/// 用户模型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub phone: String,
    pub email: Option<String>,
    pub nickname: Option<String>,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    /// 业主/住户
    Resident,
    /// 物业员工
    Staff,
    /// 商户
    Merchant,
    /// 管理员
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Resident => "Resident",
            Role::Staff => "Staff",
            Role::Merchant => "Merchant",
            Role::Admin => "Admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Resident" => Ok(Role::Resident),
            "Staff" => Ok(Role::Staff),
            "Merchant" => Ok(Role::Merchant),
            "Admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// 权限枚举
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Permission {
    // 房产/车位台账
    AssetManage,
    // 绑定申请审核
    BindingReview,
    // 工单派单与处理
    RepairManage,
    // 账单生成与管理
    BillManage,
    // 公告管理
    AnnouncementManage,
    // 活动创建与管理
    ActivityManage,
    // 访客核验
    VisitorVerify,
    // 用户管理
    UserManage,
    // 商铺入驻审核
    ShopReview,
    // 店铺经营（商品、接单、核销）
    ShopOperate,
}

impl Role {
    /// 获取角色的默认权限
    pub fn permissions(&self) -> HashSet<Permission> {
        match self {
            Role::Admin => vec![
                Permission::AssetManage,
                Permission::BindingReview,
                Permission::RepairManage,
                Permission::BillManage,
                Permission::AnnouncementManage,
                Permission::ActivityManage,
                Permission::VisitorVerify,
                Permission::UserManage,
                Permission::ShopReview,
            ]
            .into_iter()
            .collect(),
            Role::Staff => vec![
                Permission::RepairManage,
                Permission::ActivityManage,
                Permission::VisitorVerify,
            ]
            .into_iter()
            .collect(),
            Role::Merchant => vec![Permission::ShopOperate].into_iter().collect(),
            Role::Resident => HashSet::new(),
        }
    }

    /// 检查角色是否具有指定权限
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions().contains(permission)
    }
}

impl User {
    /// 检查用户是否具有指定权限
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.is_active && self.role.has_permission(permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [Role::Resident, Role::Staff, Role::Merchant, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_admin_cannot_operate_shop() {
        assert!(!Role::Admin.has_permission(&Permission::ShopOperate));
        assert!(Role::Merchant.has_permission(&Permission::ShopOperate));
    }

    #[test]
    fn test_staff_permissions() {
        assert!(Role::Staff.has_permission(&Permission::RepairManage));
        assert!(!Role::Staff.has_permission(&Permission::BillManage));
    }

    #[test]
    fn test_inactive_user_has_no_permissions() {
        let user = User {
            id: Uuid::new_v4(),
            username: "frozen".to_string(),
            phone: "13800000000".to_string(),
            email: None,
            nickname: None,
            avatar: None,
            role: Role::Admin,
            is_active: false,
            created_at: Utc::now(),
            last_login: None,
        };
        assert!(!user.has_permission(&Permission::UserManage));
    }
}
