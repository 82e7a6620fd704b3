use serde::Deserialize;

#[derive(Deserialize)]
pub struct GetUserQuery {
    pub user_id: String,
    pub user_type: String,
}

#[derive(Deserialize)]
pub struct GetUsersQuery {
    pub user_type: String,
}

#[derive(Deserialize)]
pub struct GetValueQuery {
    pub user_id: String,
    pub user_type: String,
    pub key: String,
}

#[derive(Deserialize)]
pub struct SetValueRequest {
    pub user_id: String,
    pub user_type: String,
    pub key: String,
    /// 缺省或为 null 时删除该条数据
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}
