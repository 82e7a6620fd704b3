use dashmap::DashMap;

use crate::models::UserData;

/// 用户记录内存缓存
///
/// 以 (user_id, user_type) 为键，内部已同步，可被多个调用方并发读写。
/// 不做容量淘汰：整体 clear 由刷新定时器负责，缓存规模受在线用户数约束。
#[derive(Debug, Default)]
pub struct UserDataCache {
    entries: DashMap<(String, String), UserData>,
}

impl UserDataCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 非阻塞读取，未命中返回 None
    pub fn lookup(&self, user_id: &str, user_type: &str) -> Option<UserData> {
        self.entries
            .get(&(user_id.to_string(), user_type.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// 插入或覆盖，同键并发插入时后写者胜出
    pub fn insert(&self, user_data: UserData) {
        self.entries.insert(
            (user_data.user_id.clone(), user_data.user_type.clone()),
            user_data,
        );
    }

    /// 移除单个条目，不存在时为幂等空操作
    pub fn invalidate(&self, user_id: &str, user_type: &str) {
        self.entries
            .remove(&(user_id.to_string(), user_type.to_string()));
    }

    /// 清空全部条目
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_lookup() {
        let cache = UserDataCache::new();
        let mut user = UserData::new("1001", "player");
        user.last_display_name = Some("测试用户".to_string());

        cache.insert(user.clone());
        let cached = cache.lookup("1001", "player").unwrap();
        assert_eq!(cached, user);

        // 未命中
        assert!(cache.lookup("1001", "console").is_none());
        assert!(cache.lookup("1002", "player").is_none());
    }

    #[test]
    fn insert_overwrites_same_key() {
        let cache = UserDataCache::new();
        let mut first = UserData::new("1001", "player");
        first.last_display_name = Some("旧昵称".to_string());
        let mut second = UserData::new("1001", "player");
        second.last_display_name = Some("新昵称".to_string());

        cache.insert(first);
        cache.insert(second.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("1001", "player").unwrap(), second);
    }

    #[test]
    fn invalidate_is_idempotent() {
        let cache = UserDataCache::new();
        cache.insert(UserData::new("1001", "player"));

        cache.invalidate("1001", "player");
        assert!(cache.lookup("1001", "player").is_none());

        // 再次失效不报错
        cache.invalidate("1001", "player");
        cache.invalidate("404", "player");
    }

    #[test]
    fn clear_removes_all_entries() {
        let cache = UserDataCache::new();
        cache.insert(UserData::new("1001", "player"));
        cache.insert(UserData::new("1002", "player"));
        cache.insert(UserData::new("1001", "console"));
        assert_eq!(cache.len(), 3);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(UserDataCache::new());
        let mut handles = Vec::new();

        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    let user = UserData::new(format!("user-{}-{}", i, j), "player");
                    cache.insert(user);
                    cache.lookup(&format!("user-{}-{}", i, j), "player");
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 800);
    }
}
