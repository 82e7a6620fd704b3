use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 用户完整记录
///
/// 以 (user_id, user_type) 为身份标识，user_type 用于区分不同的用户命名空间
/// （例如 player 与 console）。没有 ban_info 即视为未封禁。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserData {
    pub user_id: String,
    pub user_type: String,
    pub last_display_name: Option<String>,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub ban_info: Option<UserBanData>,
    #[serde(default)]
    pub permissions: HashSet<String>,
    #[serde(default)]
    pub roles: HashSet<String>,
    /// 附加的命名数据，值为任意 JSON
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl UserData {
    /// 创建一条空记录
    pub fn new(user_id: impl Into<String>, user_type: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_type: user_type.into(),
            last_display_name: None,
            first_seen: None,
            last_seen: None,
            ban_info: None,
            permissions: HashSet::new(),
            roles: HashSet::new(),
            data: HashMap::new(),
        }
    }
}

/// 用户封禁信息，由 UserData 独占持有
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserBanData {
    pub instigator_id: String,
    pub instigator_type: String,
    pub expire_date: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}
