// 服务模块
// 用户数据操作的对外门面

pub mod user_data;

pub use user_data::UserDataService;
