use std::sync::{Arc, RwLock};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::{CacheRefreshTimer, UserDataCache};
use crate::config::{CacheSettings, Config};
use crate::database::UserStore;
use crate::error::UserDataError;
use crate::models::UserData;

/// 用户数据服务
///
/// 对外操作入口，负责参数校验、缓存命中与回填、写后失效以及附加数据的
/// 序列化，实际落盘交给 UserStore。存储句柄在构造时就绪，启动失败在
/// 进程引导阶段暴露，不会推迟到首次调用。
pub struct UserDataService<S: UserStore> {
    store: Arc<S>,
    cache: Arc<UserDataCache>,
    refresh_timer: CacheRefreshTimer,
    settings: RwLock<CacheSettings>,
}

impl<S: UserStore> UserDataService<S> {
    pub fn new(store: Arc<S>, settings: CacheSettings) -> Self {
        let cache = Arc::new(UserDataCache::new());
        Self {
            store,
            refresh_timer: CacheRefreshTimer::new(Arc::clone(&cache)),
            cache,
            settings: RwLock::new(settings),
        }
    }

    /// 子系统启动触发点
    pub fn handle_started(&self, config: &Config) {
        tracing::info!("User data subsystem started");
        self.apply_cache_settings(config.cache_settings());
    }

    /// 配置变更触发点，重复应用同一配置是安全的
    pub fn handle_config_changed(&self, config: &Config) {
        tracing::info!("User data configuration changed");
        self.apply_cache_settings(config.cache_settings());
    }

    /// 应用缓存设置快照并重建刷新定时器
    pub fn apply_cache_settings(&self, settings: CacheSettings) {
        {
            let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
            *current = settings;
        }

        // 关闭缓存时立即清空，避免之后重新开启时把旧条目当作有效数据
        if !settings.use_cache {
            self.cache.clear();
        }

        self.refresh_timer.apply(settings);
    }

    /// 读取单个用户记录
    ///
    /// 启用缓存时优先返回缓存命中，不访问存储；未命中（或未启用缓存）则
    /// 回源读取，读到后在启用缓存的情况下回填。
    pub async fn get_user(
        &self,
        user_id: &str,
        user_type: &str,
    ) -> Result<Option<UserData>, UserDataError> {
        ensure_not_empty(user_id, "user_id")?;
        ensure_not_empty(user_type, "user_type")?;

        let use_cache = self.use_cache();
        if use_cache && let Some(cached) = self.cache.lookup(user_id, user_type) {
            return Ok(Some(cached));
        }

        let fetched = self.store.find_user(user_id, user_type).await?;

        if use_cache && let Some(user) = &fetched {
            self.cache.insert(user.clone());
        }

        Ok(fetched)
    }

    /// 读取某一类型下的全部用户记录，始终绕过缓存直接回源
    pub async fn get_users_by_type(&self, user_type: &str) -> Result<Vec<UserData>, UserDataError> {
        ensure_not_empty(user_type, "user_type")?;

        self.store.find_users_by_type(user_type).await
    }

    /// 读取单条附加数据并反序列化为目标类型
    ///
    /// 直接读存储，不经过用户缓存（缓存只保存完整记录，不按键缓存）。
    /// 存储中的值无法还原为目标类型时按不存在处理。
    pub async fn get_value<T: DeserializeOwned>(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
    ) -> Result<Option<T>, UserDataError> {
        ensure_not_empty(user_id, "user_id")?;
        ensure_not_empty(user_type, "user_type")?;
        ensure_not_empty(key, "key")?;

        let raw = self.store.find_generic_value(user_id, user_type, key).await?;

        Ok(raw.and_then(|value| serde_json::from_str(&value).ok()))
    }

    /// 写入单条附加数据，None 表示删除
    ///
    /// 写入成功后使该用户的缓存条目失效（缓存记录中的附加数据已过期），
    /// 与缓存是否启用无关；写入失败则缓存保持原样。
    pub async fn set_value<T: Serialize + Sync>(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
        value: Option<&T>,
    ) -> Result<(), UserDataError> {
        ensure_not_empty(user_id, "user_id")?;
        ensure_not_empty(user_type, "user_type")?;
        ensure_not_empty(key, "key")?;

        let serialized = value
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| {
                UserDataError::Storage(sqlx::Error::Protocol(format!(
                    "Failed to serialize value for key '{}': {}",
                    key, e
                )))
            })?;

        self.store
            .upsert_generic_value(user_id, user_type, key, serialized)
            .await?;

        self.cache.invalidate(user_id, user_type);
        Ok(())
    }

    /// 写入整条用户记录，不存在则创建
    pub async fn set_user(&self, user_data: &UserData) -> Result<(), UserDataError> {
        ensure_not_empty(&user_data.user_id, "user_data.user_id")?;
        ensure_not_empty(&user_data.user_type, "user_data.user_type")?;

        self.store.upsert_user(user_data).await?;

        self.cache.invalidate(&user_data.user_id, &user_data.user_type);
        Ok(())
    }

    fn use_cache(&self) -> bool {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .use_cache
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &UserDataCache {
        &self.cache
    }
}

fn ensure_not_empty(value: &str, name: &'static str) -> Result<(), UserDataError> {
    if value.is_empty() {
        return Err(UserDataError::InvalidArgument(name));
    }
    Ok(())
}
