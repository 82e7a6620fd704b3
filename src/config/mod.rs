use std::env;
use std::time::Duration;

use crate::error::UserDataError;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    /// 是否启用用户记录缓存
    pub use_cache: bool,
    /// 缓存整体刷新间隔（秒，允许小数）
    pub cache_refresh_interval_secs: f64,
}

impl Config {
    pub fn from_env() -> Result<Self, UserDataError> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| UserDataError::NotLoaded("DATABASE_URL is not set".to_string()))?;

        Ok(Config {
            database_url,
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "::".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            use_cache: env::var("USE_CACHE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            cache_refresh_interval_secs: env::var("CACHE_REFRESH_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60.0),
        })
    }

    /// 当前配置对应的缓存设置快照
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            use_cache: self.use_cache,
            refresh_interval: Duration::from_secs_f64(self.cache_refresh_interval_secs.max(0.0)),
        }
    }
}

/// 缓存设置快照
///
/// 只在"子系统启动"和"配置变更"两个触发点重新读取，定时器间隔在重建时
/// 一次性取值，不会在周期中途变化。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSettings {
    pub use_cache: bool,
    pub refresh_interval: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_settings_snapshot() {
        let config = Config {
            database_url: "postgres://localhost/test".to_string(),
            server_host: "::".to_string(),
            server_port: 3000,
            use_cache: true,
            cache_refresh_interval_secs: 1.5,
        };

        let settings = config.cache_settings();
        assert!(settings.use_cache);
        assert_eq!(settings.refresh_interval, Duration::from_millis(1500));
    }

    #[test]
    fn negative_interval_clamped() {
        let config = Config {
            database_url: "postgres://localhost/test".to_string(),
            server_host: "::".to_string(),
            server_port: 3000,
            use_cache: true,
            cache_refresh_interval_secs: -5.0,
        };

        assert_eq!(config.cache_settings().refresh_interval, Duration::ZERO);
    }
}
