// 数据库模块
// 持久化协作方契约与 Postgres 实现

pub mod models;
pub mod operations;

use async_trait::async_trait;

use crate::error::UserDataError;
use crate::models::UserData;

pub use operations::user::PgUserStore;

/// 持久化协作方契约
///
/// 核心只依赖这组操作；每个调用在存储层各自成一个事务，核心不跨调用
/// 编排事务。所有失败以 UserDataError::Storage 形式原样上抛。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 按身份读取单条记录，需要同时带出权限、角色与附加数据
    async fn find_user(
        &self,
        user_id: &str,
        user_type: &str,
    ) -> Result<Option<UserData>, UserDataError>;

    /// 读取某一类型下的全部记录，逐条完整装配
    async fn find_users_by_type(&self, user_type: &str) -> Result<Vec<UserData>, UserDataError>;

    /// 读取单条附加数据的序列化文本
    async fn find_generic_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
    ) -> Result<Option<String>, UserDataError>;

    /// 写入单条附加数据
    ///
    /// value 为 None 且行不存在时为空操作；为 None 且行存在时删除该行；
    /// 否则创建或覆盖。
    async fn upsert_generic_value(
        &self,
        user_id: &str,
        user_type: &str,
        key: &str,
        value: Option<String>,
    ) -> Result<(), UserDataError>;

    /// 写入整条记录，不存在则创建
    ///
    /// 权限、角色、附加数据三个集合整体替换为记录中的内容（替换而非合并）。
    async fn upsert_user(&self, user_data: &UserData) -> Result<(), UserDataError>;
}
