// 缓存模块
// 用户记录内存缓存与周期刷新定时器

pub mod refresh;
pub mod user_cache;

pub use refresh::CacheRefreshTimer;
pub use user_cache::UserDataCache;
