use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::{UserBanData, UserData};

/// 用户主表行，封禁信息按附属列平铺存储
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub user_id: String,
    pub user_type: String,
    pub last_display_name: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub ban_instigator_id: Option<String>,
    pub ban_instigator_type: Option<String>,
    pub ban_expire_date: Option<DateTime<Utc>>,
    pub ban_reason: Option<String>,
}

/// 用户权限关联行
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserGrantedPermissionEntity {
    pub user_id: String,
    pub user_type: String,
    pub permission: String,
}

/// 用户角色关联行
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserGrantedRoleEntity {
    pub user_id: String,
    pub user_type: String,
    pub role_id: String,
}

/// 用户附加数据行，复合主键为 (key, user_id, user_type)
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct UserGenericDataEntity {
    pub key: String,
    pub user_id: String,
    pub user_type: String,
    pub serialized_value: Option<String>,
}

impl UserRow {
    /// 与关联行装配成完整的用户记录
    pub fn into_user_data(
        self,
        permissions: Vec<UserGrantedPermissionEntity>,
        roles: Vec<UserGrantedRoleEntity>,
        generic_data: Vec<UserGenericDataEntity>,
    ) -> Result<UserData, serde_json::Error> {
        let ban_info = match (self.ban_instigator_id, self.ban_instigator_type) {
            (Some(instigator_id), Some(instigator_type)) => Some(UserBanData {
                instigator_id,
                instigator_type,
                expire_date: self.ban_expire_date,
                reason: self.ban_reason,
            }),
            _ => None,
        };

        let mut data = HashMap::with_capacity(generic_data.len());
        for entity in generic_data {
            let value = match entity.serialized_value {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::Value::Null,
            };
            data.insert(entity.key, value);
        }

        Ok(UserData {
            user_id: self.user_id,
            user_type: self.user_type,
            last_display_name: self.last_display_name,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
            ban_info,
            permissions: permissions.into_iter().map(|p| p.permission).collect(),
            roles: roles.into_iter().map(|r| r.role_id).collect(),
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user_id: &str) -> UserRow {
        UserRow {
            user_id: user_id.to_string(),
            user_type: "player".to_string(),
            last_display_name: Some("昵称".to_string()),
            first_seen: None,
            last_seen: None,
            ban_instigator_id: None,
            ban_instigator_type: None,
            ban_expire_date: None,
            ban_reason: None,
        }
    }

    #[test]
    fn assembles_collections() {
        let permissions = vec![UserGrantedPermissionEntity {
            user_id: "1001".to_string(),
            user_type: "player".to_string(),
            permission: "kit.vip".to_string(),
        }];
        let roles = vec![UserGrantedRoleEntity {
            user_id: "1001".to_string(),
            user_type: "player".to_string(),
            role_id: "vip".to_string(),
        }];
        let generic = vec![UserGenericDataEntity {
            key: "balance".to_string(),
            user_id: "1001".to_string(),
            user_type: "player".to_string(),
            serialized_value: Some("42.5".to_string()),
        }];

        let user = row("1001").into_user_data(permissions, roles, generic).unwrap();
        assert!(user.permissions.contains("kit.vip"));
        assert!(user.roles.contains("vip"));
        assert_eq!(user.data["balance"], serde_json::json!(42.5));
        assert!(user.ban_info.is_none());
    }

    #[test]
    fn ban_columns_become_ban_info() {
        let mut banned = row("1001");
        banned.ban_instigator_id = Some("admin".to_string());
        banned.ban_instigator_type = Some("console".to_string());
        banned.ban_reason = Some("作弊".to_string());

        let user = banned.into_user_data(vec![], vec![], vec![]).unwrap();
        let ban = user.ban_info.unwrap();
        assert_eq!(ban.instigator_id, "admin");
        assert_eq!(ban.instigator_type, "console");
        assert_eq!(ban.reason.as_deref(), Some("作弊"));
        assert!(ban.expire_date.is_none());
    }

    #[test]
    fn invalid_stored_json_is_an_error() {
        let generic = vec![UserGenericDataEntity {
            key: "broken".to_string(),
            user_id: "1001".to_string(),
            user_type: "player".to_string(),
            serialized_value: Some("{not json".to_string()),
        }];

        assert!(row("1001").into_user_data(vec![], vec![], generic).is_err());
    }
}
