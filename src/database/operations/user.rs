use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::UserStore;
use crate::database::models::user::{
    UserGenericDataEntity, UserGrantedPermissionEntity, UserGrantedRoleEntity, UserRow,
};
use crate::error::UserDataError;
use crate::models::UserData;

const SELECT_USER_COLUMNS: &str = "SELECT user_id, user_type, last_display_name, first_seen, \
     last_seen, ban_instigator_id, ban_instigator_type, ban_expire_date, ban_reason FROM users";

/// 用户存储库，处理所有与用户记录相关的数据库操作
///
/// 每个方法各自构成一个存储层事务，写入失败不会留下半成品状态。
pub struct PgUserStore {
    db: Arc<PgPool>,
}

impl PgUserStore {
    /// 创建新的用户存储库实例
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }

    /// 把存储层的 JSON 解析错误映射为存储错误
    fn stored_json_error(e: serde_json::Error) -> UserDataError {
        UserDataError::Storage(sqlx::Error::Protocol(format!(
            "Invalid serialized value at rest: {}",
            e
        )))
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_user(
        &self,
        user_id: &str,
        user_type: &str,
    ) -> Result<Option<UserData>, UserDataError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE user_id = $1 AND user_type = $2",
            SELECT_USER_COLUMNS
        ))
        .bind(user_id)
        .bind(user_type)
        .fetch_optional(&*self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let permissions = sqlx::query_as::<_, UserGrantedPermissionEntity>(
            "SELECT user_id, user_type, permission FROM user_granted_permissions \
             WHERE user_id = $1 AND user_type = $2",
        )
        .bind(user_id)
        .bind(user_type)
        .fetch_all(&*self.db)
        .await?;

        let roles = sqlx::query_as::<_, UserGrantedRoleEntity>(
            "SELECT user_id, user_type, role_id FROM user_granted_roles \
             WHERE user_id = $1 AND user_type = $2",
        )
        .bind(user_id)
        .bind(user_type)
        .fetch_all(&*self.db)
        .await?;

        let generic_data = sqlx::query_as::<_, UserGenericDataEntity>(
            "SELECT key, user_id, user_type, serialized_value FROM user_generic_data \
             WHERE user_id = $1 AND user_type = $2",
        )
        .bind(user_id)
        .bind(user_type)
        .fetch_all(&*self.db)
        .await?;

        row.into_user_data(permissions, roles, generic_data)
            .map(Some)
            .map_err(Self::stored_json_error)
    }

    async fn find_users_by_type(&self, user_type: &str) -> Result<Vec<UserData>, UserDataError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "{} WHERE user_type = $1",
            SELECT_USER_COLUMNS
        ))
        .bind(user_type)
        .fetch_all(&*self.db)
        .await?;

        // 三个关联表各查一次，按 user_id 分组后在内存中装配
        let mut permissions: HashMap<String, Vec<UserGrantedPermissionEntity>> = HashMap::new();
        for entity in sqlx::query_as::<_, UserGrantedPermissionEntity>(
            "SELECT user_id, user_type, permission FROM user_granted_permissions WHERE user_type = $1",
        )
        .bind(user_type)
        .fetch_all(&*self.db)
        .await?
        {
            permissions.entry(entity.user_id.clone()).or_default().push(entity);
        }

        let mut roles: HashMap<String, Vec<UserGrantedRoleEntity>> = HashMap::new();
        for entity in sqlx::query_as::<_, UserGrantedRoleEntity>(
            "SELECT user_id, user_type, role_id FROM user_granted_roles WHERE user_type = $1",
        )
        .bind(user_type)
        .fetch_all(&*self.db)
        .await?
        {
            roles.entry(entity.user_id.clone()).or_default().push(entity);
        }

        let mut generic_data: HashMap<String, Vec<UserGenericDataEntity>> = HashMap::new();
        for entity in sqlx::query_as::<_, UserGenericDataEntity>(
            "SELECT key, user_id, user_type, serialized_value FROM user_generic_data WHERE user_type = $1",
        )
        .bind(user_type)
        .fetch_all(&*self.db)
        .await?
        {
            generic_data.entry(entity.user_id.clone()).or_default().push(entity);
        }

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id = row.user_id.clone();
            let user = row
                .into_user_data(
                    permissions.remove(&user_id).unwrap_or_default(),
                    roles.remove(&user_id).unwrap_or_default(),
                    generic_data.remove(&user_id).unwrap_or_default(),
                )
                .map_err(Self::stored_json_error)?;
            users.push(user);
        }

        Ok(users)
    }

    async fn find_generic_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
    ) -> Result<Option<String>, UserDataError> {
        let value: Option<Option<String>> = sqlx::query_scalar(
            "SELECT serialized_value FROM user_generic_data \
             WHERE key = $1 AND user_id = $2 AND user_type = $3",
        )
        .bind(key)
        .bind(user_id)
        .bind(user_type)
        .fetch_optional(&*self.db)
        .await?;

        Ok(value.flatten())
    }

    async fn upsert_generic_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
        value: Option<String>,
    ) -> Result<(), UserDataError> {
        match value {
            None => {
                // 无值且行不存在时 DELETE 自然为空操作
                sqlx::query(
                    "DELETE FROM user_generic_data \
                     WHERE key = $1 AND user_id = $2 AND user_type = $3",
                )
                .bind(key)
                .bind(user_id)
                .bind(user_type)
                .execute(&*self.db)
                .await?;
            }
            Some(serialized) => {
                let mut tx = self.db.begin().await?;

                // 第一次写入某个用户时先落主表行
                sqlx::query(
                    "INSERT INTO users (user_id, user_type) VALUES ($1, $2) \
                     ON CONFLICT (user_id, user_type) DO NOTHING",
                )
                .bind(user_id)
                .bind(user_type)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "INSERT INTO user_generic_data (key, user_id, user_type, serialized_value) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (key, user_id, user_type) \
                     DO UPDATE SET serialized_value = EXCLUDED.serialized_value",
                )
                .bind(key)
                .bind(user_id)
                .bind(user_type)
                .bind(serialized)
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
            }
        }

        Ok(())
    }

    async fn upsert_user(&self, user_data: &UserData) -> Result<(), UserDataError> {
        let ban = user_data.ban_info.as_ref();
        let mut tx = self.db.begin().await?;

        sqlx::query(
            "INSERT INTO users (user_id, user_type, last_display_name, first_seen, last_seen, \
             ban_instigator_id, ban_instigator_type, ban_expire_date, ban_reason) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (user_id, user_type) DO UPDATE SET \
             last_display_name = EXCLUDED.last_display_name, \
             first_seen = EXCLUDED.first_seen, \
             last_seen = EXCLUDED.last_seen, \
             ban_instigator_id = EXCLUDED.ban_instigator_id, \
             ban_instigator_type = EXCLUDED.ban_instigator_type, \
             ban_expire_date = EXCLUDED.ban_expire_date, \
             ban_reason = EXCLUDED.ban_reason",
        )
        .bind(&user_data.user_id)
        .bind(&user_data.user_type)
        .bind(&user_data.last_display_name)
        .bind(user_data.first_seen)
        .bind(user_data.last_seen)
        .bind(ban.map(|b| b.instigator_id.clone()))
        .bind(ban.map(|b| b.instigator_type.clone()))
        .bind(ban.and_then(|b| b.expire_date))
        .bind(ban.and_then(|b| b.reason.clone()))
        .execute(&mut *tx)
        .await?;

        // 三个集合整体替换为记录中的内容
        sqlx::query("DELETE FROM user_granted_permissions WHERE user_id = $1 AND user_type = $2")
            .bind(&user_data.user_id)
            .bind(&user_data.user_type)
            .execute(&mut *tx)
            .await?;
        for permission in &user_data.permissions {
            sqlx::query(
                "INSERT INTO user_granted_permissions (user_id, user_type, permission) \
                 VALUES ($1, $2, $3)",
            )
            .bind(&user_data.user_id)
            .bind(&user_data.user_type)
            .bind(permission)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM user_granted_roles WHERE user_id = $1 AND user_type = $2")
            .bind(&user_data.user_id)
            .bind(&user_data.user_type)
            .execute(&mut *tx)
            .await?;
        for role_id in &user_data.roles {
            sqlx::query(
                "INSERT INTO user_granted_roles (user_id, user_type, role_id) VALUES ($1, $2, $3)",
            )
            .bind(&user_data.user_id)
            .bind(&user_data.user_type)
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM user_generic_data WHERE user_id = $1 AND user_type = $2")
            .bind(&user_data.user_id)
            .bind(&user_data.user_type)
            .execute(&mut *tx)
            .await?;
        for (key, value) in &user_data.data {
            let serialized = serde_json::to_string(value).map_err(|e| {
                UserDataError::Storage(sqlx::Error::Protocol(format!(
                    "Failed to serialize generic value '{}': {}",
                    key, e
                )))
            })?;
            sqlx::query(
                "INSERT INTO user_generic_data (key, user_id, user_type, serialized_value) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(key)
            .bind(&user_data.user_id)
            .bind(&user_data.user_type)
            .bind(serialized)
            .execute(&mut *tx)
            .await?;
        }

        let result = tx.commit().await;
        if let Err(e) = &result {
            tracing::error!(
                "Failed to persist user ({}, {}): {:?}",
                user_data.user_id,
                user_data.user_type,
                e
            );
        }
        result?;

        Ok(())
    }
}
